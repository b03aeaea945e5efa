// Copyright (c) Microsoft Corporation.
// SPDX-License-Identifier: MIT
use std::collections::{BTreeSet, HashSet};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::info;

use crate::audit::AuditRecord;
use crate::av_rule::render_rules;
use crate::constants::{self, AVC_MARKER};
use crate::merge::merge_records;
use crate::warning::Warnings;

/// Picks interesting lines out of a log stream and turns them into a
/// derived artifact once capture stops.
pub trait Filter: Send {
    /// Used in the derived file name
    fn name(&self) -> &'static str;
    fn matches(&mut self, line: &str) -> bool;
    fn accumulate(&mut self, line: &str);
    fn is_empty(&self) -> bool;
    fn write(&self, path: &Path) -> io::Result<()>;
}

fn write_lines<'a, I>(path: &Path, lines: I) -> io::Result<()>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut out = BufWriter::new(File::create(path)?);
    for line in lines {
        writeln!(out, "{}", line)?;
    }
    out.flush()
}

fn raw_denial_regex() -> &'static Regex {
    static RAW_DENIAL_RE: OnceLock<Regex> = OnceLock::new();
    // avc: denied { ioctl } for comm=...
    RAW_DENIAL_RE.get_or_init(|| {
        Regex::new(r"avc:\s+denied\s+\{(\s\w+)+\s\}\sfor\s").expect("denial pattern is valid")
    })
}

fn property_denial_regex() -> &'static Regex {
    static PROPERTY_DENIAL_RE: OnceLock<Regex> = OnceLock::new();
    // libc : Access denied finding property "ro.foo"
    // libc : Unable to set property "ctl.start" to "vendor.foo"
    PROPERTY_DENIAL_RE.get_or_init(|| {
        Regex::new(r#"libc\s+:\s+\w+\s\w+\s\w+\s\w+\s"([\w.\-]+)"(?:\sto\s"([\w.@:/\-]+)")?"#)
            .expect("property pattern is valid")
    })
}

/// Raw `avc: denied` lines, minus untrusted apps
#[derive(Debug, Default)]
pub struct RawDenialFilter {
    results: BTreeSet<String>,
}

impl RawDenialFilter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Filter for RawDenialFilter {
    fn name(&self) -> &'static str {
        constants::RAW_DENIAL_FILTER_NAME
    }

    fn matches(&mut self, line: &str) -> bool {
        raw_denial_regex().is_match(line) && !line.contains(constants::IGNORED_DOMAIN)
    }

    fn accumulate(&mut self, line: &str) {
        self.results.insert(line.to_string());
    }

    fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    fn write(&self, path: &Path) -> io::Result<()> {
        if self.results.is_empty() {
            return Ok(());
        }
        write_lines(path, &self.results)
    }
}

/// Every well-formed avc message, granted or denied, turned into allow rules
#[derive(Debug, Default)]
pub struct RecordGeneratorFilter {
    // Arrival order, duplicates kept: the merge works on structure, not text
    lines: Vec<String>,
}

impl RecordGeneratorFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse, merge and render what was collected so far
    pub fn rules(&self) -> BTreeSet<String> {
        // Diagnostics were already reported when the lines were matched
        let mut ignored = Warnings::new();
        let mut records: Vec<AuditRecord> = self
            .lines
            .iter()
            .map(|line| AuditRecord::parse(line).inner(&mut ignored))
            .collect();
        merge_records(&mut records);
        render_rules(&records)
    }
}

impl Filter for RecordGeneratorFilter {
    fn name(&self) -> &'static str {
        constants::RECORD_GENERATOR_FILTER_NAME
    }

    fn matches(&mut self, line: &str) -> bool {
        if !line.contains(AVC_MARKER) {
            return false;
        }
        let mut warnings = Warnings::new();
        let record = AuditRecord::parse(line).inner(&mut warnings);
        warnings.log();
        record.is_valid()
    }

    fn accumulate(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }

    fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn write(&self, path: &Path) -> io::Result<()> {
        if self.lines.is_empty() {
            return Ok(());
        }
        write_lines(path, &self.rules())
    }
}

/// Property lookups bionic refused, each bare property reported once
#[derive(Debug, Default)]
pub struct PropertyDenialFilter {
    seen: HashSet<String>,
    results: BTreeSet<String>,
}

impl PropertyDenialFilter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Filter for PropertyDenialFilter {
    fn name(&self) -> &'static str {
        constants::PROPERTY_DENIAL_FILTER_NAME
    }

    fn matches(&mut self, line: &str) -> bool {
        let caps = match property_denial_regex().captures(line) {
            Some(c) => c,
            None => return false,
        };
        let property = &caps[1];
        match caps.get(2) {
            Some(value) => {
                info!(
                    "Control message {} was unable to be set for {}",
                    property,
                    value.as_str()
                );
                true
            }
            None => {
                info!("Couldn't set prop {}", property);
                self.seen.insert(property.to_string())
            }
        }
    }

    fn accumulate(&mut self, line: &str) {
        self.results.insert(line.to_string());
    }

    fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    fn write(&self, path: &Path) -> io::Result<()> {
        if self.results.is_empty() {
            return Ok(());
        }
        write_lines(path, &self.results)
    }
}
