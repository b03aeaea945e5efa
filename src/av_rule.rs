// Copyright (c) Microsoft Corporation.
// SPDX-License-Identifier: MIT
use std::collections::BTreeSet;
use std::fmt;

use crate::audit::AuditRecord;
use crate::constants;
use crate::context::SecurityContext;

/// One `allow` statement in policy language
#[derive(Clone, Debug)]
pub struct AvRule<'a> {
    pub source: &'a SecurityContext,
    pub target: &'a SecurityContext,
    pub class: &'a str,
    pub perms: Vec<&'a str>,
}

impl<'a> AvRule<'a> {
    /// Build the rule for a merged record.  Invalid, consumed and empty
    /// records have no rule, and neither does anything asking for
    /// `sys_admin`.
    pub fn from_record(record: &'a AuditRecord) -> Option<Self> {
        if !record.is_renderable()
            || record.operations.contains(constants::SUPPRESSED_PERMISSION)
        {
            return None;
        }
        Some(AvRule {
            source: &record.scontext,
            target: &record.tcontext,
            class: &record.tclass,
            // BTreeSet iteration is already sorted
            perms: record.operations.iter().map(|p| p.as_str()).collect(),
        })
    }
}

impl fmt::Display for AvRule<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} {}:{}",
            constants::ALLOW_RULE,
            self.source,
            self.target,
            self.class
        )?;
        match self.perms.as_slice() {
            [perm] => write!(f, " {};", perm),
            perms => write!(f, " {{ {} }};", perms.join(" ")),
        }
    }
}

/// Render all surviving records, dropping textual duplicates.  The result
/// iterates in sorted order.
pub fn render_rules(records: &[AuditRecord]) -> BTreeSet<String> {
    records
        .iter()
        .filter_map(AvRule::from_record)
        .map(|rule| rule.to_string())
        .collect()
}
