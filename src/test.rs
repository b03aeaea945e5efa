// Copyright (c) Microsoft Corporation.
// SPDX-License-Identifier: MIT
use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use super::*;

const LOGS_DIR: &str = "data/logs/";
const EXPECTED_RULES_DIR: &str = "data/expected_rules/";

fn rules_text(rules: &BTreeSet<String>) -> String {
    rules.iter().map(|r| format!("{r}\n")).collect()
}

fn generate(lines: &[&str]) -> (BTreeSet<String>, Warnings) {
    let text = lines.join("\n");
    let mut warnings = Warnings::new();
    let rules = generate_rules(&[("test.log", text)]).inner(&mut warnings);
    (rules, warnings)
}

#[test]
fn characterization_tests() {
    let mut count = 0;

    for f in fs::read_dir(LOGS_DIR).unwrap() {
        let log_path = f.unwrap().path();
        let rules_path = match log_path.extension() {
            Some(e) if e == "log" => Path::new(EXPECTED_RULES_DIR).join(
                log_path
                    .with_extension("te")
                    .file_name()
                    .unwrap_or_else(|| {
                        panic!(
                            "failed to extract file name from `{}`",
                            log_path.to_string_lossy()
                        )
                    }),
            ),
            _ => continue,
        };
        count += 1;

        let log_name = log_path.to_string_lossy().into_owned();
        let rules = generate_rules_from_files(&[log_name.as_str()])
            .unwrap_or_else(|e| panic!("Failed to read '{}': {}", log_path.display(), e))
            .inner(&mut Warnings::new());
        let rules_ref = fs::read_to_string(&rules_path).unwrap_or_else(|e| {
            panic!(
                "Failed to read file '{}': {}. \
                 Every sample log needs a reference rule file.",
                rules_path.to_string_lossy(),
                e
            )
        });
        let rules_gen = rules_text(&rules);
        if rules_gen != rules_ref {
            panic!(
                "Rule generation doesn't match the recorded rules for '{}'.\n\
                 Generated:\n{}\nExpected:\n{}",
                log_path.to_string_lossy(),
                rules_gen,
                rules_ref
            );
        }
    }
    assert!(count >= 4, "only {} sample logs found", count);
}

#[test]
fn all_logs_together() {
    let mut inputs = Vec::new();
    for entry in WalkDir::new(LOGS_DIR) {
        let entry = entry.unwrap();
        if entry.file_type().is_file() {
            inputs.push(entry.path().display().to_string());
        }
    }
    inputs.sort_unstable();
    let inputs: Vec<&str> = inputs.iter().map(|s| s as &str).collect();
    let mut warnings = Warnings::new();
    let rules = generate_rules_from_files(&inputs)
        .unwrap()
        .inner(&mut warnings);

    // The sample logs share no (verdict, source, target, class) keys, so the
    // combined output is the union of the per-file references
    let mut expected = BTreeSet::new();
    for f in fs::read_dir(EXPECTED_RULES_DIR).unwrap() {
        let text = fs::read_to_string(f.unwrap().path()).unwrap();
        expected.extend(text.lines().map(str::to_string));
    }
    assert_eq!(rules, expected);
    // Only malformed.log should complain
    assert_eq!(warnings.count(), 7);
}

#[test]
fn malformed_lines_are_reported() {
    let mut warnings = Warnings::new();
    let rules = generate_rules_from_files(&["data/logs/malformed.log"])
        .unwrap()
        .inner(&mut warnings);
    assert_eq!(rules_text(&rules), "allow shell sysfs:file open;\n");
    assert_eq!(warnings.count(), 7);
    assert_eq!(warnings.iter().filter(|w| w.is_fatal()).count(), 6);
    assert!(warnings
        .iter()
        .any(|w| w.message().contains("Missing 'for'")));
}

#[test]
fn missing_input_file() {
    let res = generate_rules_from_files(&["data/logs/does_not_exist.log"]);
    assert!(matches!(res, Err(ErrorItem::IO(_))));
}

#[test]
fn end_to_end_sample() {
    let (rules, warnings) = generate(&[
        "avc: denied { read write } for name=\"x\" dev=\"sda\" ino=123 scontext=u:r:untrusted_app:s0 tcontext=u:object_r:system_file:s0 tclass=file permissive=0",
    ]);
    assert!(warnings.is_empty());
    assert_eq!(
        rules_text(&rules),
        "allow untrusted_app system_file:file { read write };\n"
    );
}

#[test]
fn single_operation_has_no_braces() {
    let (rules, _) = generate(&[
        "avc: denied { search } for scontext=u:r:zygote:s0 tcontext=u:object_r:apex_mnt_dir:s0 tclass=dir permissive=0",
    ]);
    assert_eq!(rules_text(&rules), "allow zygote apex_mnt_dir:dir search;\n");
}

#[test]
fn merge_is_order_independent() {
    let lines = [
        "avc: denied { read } for scontext=u:r:app_zygote:s0 tcontext=u:object_r:proc:s0 tclass=file permissive=0",
        "avc: denied { open } for scontext=u:r:app_zygote:s0 tcontext=u:object_r:proc:s0 tclass=file permissive=0",
        "avc: denied { getattr } for scontext=u:r:app_zygote:s0 tcontext=u:object_r:proc:s0 tclass=file permissive=0",
        "avc: denied { ioctl } for scontext=u:r:app_zygote:s0 tcontext=u:object_r:proc:s0 tclass=file permissive=0",
    ];
    let expected = "allow app_zygote proc:file { getattr ioctl open read };\n";

    let (forward, _) = generate(&lines);
    assert_eq!(rules_text(&forward), expected);

    let mut reversed = lines;
    reversed.reverse();
    let (backward, _) = generate(&reversed);
    assert_eq!(rules_text(&backward), expected);

    let rotated = [lines[2], lines[0], lines[3], lines[1]];
    let (shuffled, _) = generate(&rotated);
    assert_eq!(rules_text(&shuffled), expected);
}

#[test]
fn sys_admin_suppresses_merged_rule() {
    let (rules, _) = generate(&[
        "avc: denied { net_admin } for capability=12 scontext=u:r:netd:s0 tcontext=u:r:netd:s0 tclass=capability permissive=0",
        "avc: denied { sys_admin } for capability=21 scontext=u:r:netd:s0 tcontext=u:r:netd:s0 tclass=capability permissive=0",
        "avc: denied { read } for scontext=u:r:netd:s0 tcontext=u:object_r:proc_net:s0 tclass=file permissive=0",
    ]);
    assert_eq!(rules_text(&rules), "allow netd proc_net:file read;\n");
}

#[test]
fn identical_rules_collapse() {
    // Not mergeable (different verdicts), but they render the same
    let (rules, _) = generate(&[
        "avc: denied { use } for scontext=u:r:surfaceflinger:s0 tcontext=u:r:init:s0 tclass=fd permissive=0",
        "avc: granted { use } for scontext=u:r:surfaceflinger:s0 tcontext=u:r:init:s0 tclass=fd permissive=0",
    ]);
    assert_eq!(rules.len(), 1);
    assert_eq!(rules_text(&rules), "allow surfaceflinger init:fd use;\n");
}

#[test]
fn misc_attributes_do_not_block_merge() {
    let (rules, _) = generate(&[
        "avc: denied { read } for name=\"a\" ino=1 scontext=u:r:mediaserver:s0 tcontext=u:object_r:media_data_file:s0 tclass=file permissive=0",
        "avc: denied { write } for name=\"b\" ino=2 scontext=u:r:mediaserver:s0 tcontext=u:object_r:media_data_file:s0 tclass=file permissive=0",
    ]);
    assert_eq!(
        rules_text(&rules),
        "allow mediaserver media_data_file:file { read write };\n"
    );
}

#[test]
fn invalid_permissive_is_dropped() {
    let (rules, warnings) = generate(&[
        "avc: denied { read } for scontext=u:r:shell:s0 tcontext=u:object_r:sysfs:s0 tclass=file permissive=maybe",
    ]);
    assert!(rules.is_empty());
    assert_eq!(warnings.count(), 1);
    assert!(warnings.iter().all(|w| w.is_fatal()));
}

#[test]
fn property_denials_reported_once() {
    let mut filter = PropertyDenialFilter::new();
    let bare = "W libc    : Access denied finding property \"ro.foo\"";
    let with_value =
        "W libc    : Unable to set property \"ro.foo\" to \"bar\"";
    assert!(filter.matches(bare));
    assert!(!filter.matches(bare));
    assert!(filter.matches(with_value));
    assert!(filter.matches(with_value));
}

#[test]
fn normalizer_is_idempotent() {
    for raw in [
        "u:r:untrusted_app:s0:c512,c768",
        "u:object_r:system_file:s0",
        "kernel",
    ] {
        let once = SecurityContext::new(raw);
        let twice = SecurityContext::new(once.as_str());
        assert_eq!(once, twice);
    }
}
