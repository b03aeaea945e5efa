// Copyright (c) Microsoft Corporation.
// SPDX-License-Identifier: MIT
#![allow(clippy::new_without_default)]

//! Boot-time log capture for Android-style systems.
//!
//! During boot, the kernel log and the userspace log are each copied to a
//! raw file while a set of filters picks out SELinux denials and property
//! access denials.  Once boot completes (or logging is switched off) every
//! filter writes what it found, and the avc messages are reduced to a
//! minimal set of `allow` rules.
//!
//! The same rule generation is available offline through
//! [`generate_rules`] and [`generate_rules_from_files`].

extern crate thiserror;

mod audit;
mod av_rule;
mod constants;
mod context;
mod coordinator;
pub mod error;
mod filter;
mod kernel_config;
mod merge;
mod pipeline;
mod properties;
mod source;
mod util;
pub mod warning;

#[cfg(test)]
mod test;

use std::collections::BTreeSet;
use std::fs;

pub use crate::audit::AuditRecord;
pub use crate::av_rule::{render_rules, AvRule};
pub use crate::constants::{KERNEL_CONFIG_PATH, LOGGER_MODE_SYSTEM_ENV};
pub use crate::context::SecurityContext;
pub use crate::coordinator::{
    Coordinator, CoordinatorConfig, SessionReport, StopCondition,
};
pub use crate::filter::{Filter, PropertyDenialFilter, RawDenialFilter, RecordGeneratorFilter};
pub use crate::kernel_config::{read_kernel_config, ConfigValue, KernelConfig};
pub use crate::merge::merge_records;
pub use crate::pipeline::{CapturePipeline, CaptureSummary, PipelineState, ShutdownFlag};
pub use crate::properties::{PropertyStore, SystemProperties};
pub use crate::source::{KernelLogSource, LogcatSource, Source};
pub use crate::util::{recreate_dir, session_timestamp};
pub use crate::warning::{Warning, Warnings, WithWarnings};

use crate::constants::AVC_MARKER;
use crate::error::ErrorItem;

/// Turn captured logs into allow rules
///
/// Each log is a name (used to label diagnostics) and its full text.  Only
/// lines carrying an avc message are considered; malformed ones are skipped
/// and reported in the returned warnings.
/// Returns the rules sorted, one `allow` statement per entry.
pub fn generate_rules<N, T>(logs: &[(N, T)]) -> WithWarnings<BTreeSet<String>>
where
    N: AsRef<str>,
    T: AsRef<str>,
{
    let mut warnings = Warnings::new();
    let mut records = Vec::new();
    for (name, text) in logs {
        for (i, line) in text.as_ref().lines().enumerate() {
            if !line.contains(AVC_MARKER) {
                continue;
            }
            let origin = format!("{}:{}", name.as_ref(), i + 1);
            let record = AuditRecord::parse_from(line, &origin).inner(&mut warnings);
            if record.is_valid() {
                records.push(record);
            }
        }
    }
    merge_records(&mut records);
    WithWarnings::new(render_rules(&records), warnings)
}

/// Read each file and turn its contents into allow rules
///
/// Files are processed in the order given.  The first file that cannot be
/// read aborts the run.
pub fn generate_rules_from_files(
    input_files: &[&str],
) -> Result<WithWarnings<BTreeSet<String>>, ErrorItem> {
    let mut logs = Vec::new();
    for f in input_files {
        let bytes = fs::read(f)?;
        // Captured logs are not guaranteed to be valid UTF-8
        logs.push((f.to_string(), String::from_utf8_lossy(&bytes).into_owned()));
    }
    Ok(generate_rules(&logs))
}
