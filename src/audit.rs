// Copyright (c) Microsoft Corporation.
// SPDX-License-Identifier: MIT

//! Parsing of SELinux access vector cache messages
//!
//! A typical kernel line looks like
//!
//! ```text
//! avc: denied { read write } for pid=123 comm="foo" name="x" dev="sda" ino=123
//!     scontext=u:r:vendor_init:s0 tcontext=u:object_r:system_file:s0 tclass=file permissive=0
//! ```
//!
//! Everything before `avc:` is ignored, so the same parser handles dmesg and
//! logcat framing.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use codespan_reporting::files::SimpleFile;

use crate::constants::{
    AVC_MARKER, DENIED, FOR_KEYWORD, GRANTED, PERMISSIVE, SCONTEXT, TCLASS, TCONTEXT,
};
use crate::context::SecurityContext;
use crate::warning::{Warning, Warnings, WithWarnings};

const DEFAULT_ORIGIN: &str = "audit";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
enum RecordState {
    /// Not (yet) successfully parsed
    #[default]
    Invalid,
    Valid,
    /// Merged into another record
    Consumed,
}

#[derive(Clone, Debug, Default)]
pub struct AuditRecord {
    pub granted: bool,
    pub operations: BTreeSet<String>,
    pub scontext: SecurityContext,
    pub tcontext: SecurityContext,
    pub tclass: String,
    /// ino, dev, name, comm...
    pub misc_attributes: BTreeMap<String, String>,
    pub permissive: bool,
    state: RecordState,
}

#[derive(Clone, Debug)]
struct Token<'a> {
    text: &'a str,
    range: Range<usize>,
}

// Split on whitespace, keeping byte offsets into the full line so diagnostics
// can point at the token.
fn tokenize(line: &str, start: usize) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut token_start = None;
    for (i, c) in line[start..].char_indices() {
        let i = start + i;
        if c.is_whitespace() {
            if let Some(s) = token_start.take() {
                tokens.push(Token {
                    text: &line[s..i],
                    range: s..i,
                });
            }
        } else if token_start.is_none() {
            token_start = Some(i);
        }
    }
    if let Some(s) = token_start {
        tokens.push(Token {
            text: &line[s..],
            range: s..line.len(),
        });
    }
    tokens
}

fn trim_double_quote(value: &str) -> &str {
    // At least one character inside the quotes
    if value.len() > 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

impl AuditRecord {
    pub fn parse(line: &str) -> WithWarnings<AuditRecord> {
        Self::parse_from(line, DEFAULT_ORIGIN)
    }

    /// Parse one log line.  `origin` names the line in diagnostics, e.g.
    /// `logcat` or `boot.log:42`.
    pub fn parse_from(line: &str, origin: &str) -> WithWarnings<AuditRecord> {
        let file = SimpleFile::new(origin.to_string(), line.to_string());
        let mut record = AuditRecord::default();
        let mut warnings = Warnings::new();
        match record.fill(line, &file, &mut warnings) {
            Ok(()) => record.state = RecordState::Valid,
            Err(w) => warnings.push(w),
        }
        WithWarnings::new(record, warnings)
    }

    fn fill(
        &mut self,
        line: &str,
        file: &SimpleFile<String, String>,
        warnings: &mut Warnings,
    ) -> Result<(), Warning> {
        let start = line.find(AVC_MARKER).ok_or_else(|| {
            Warning::invalid(
                "Line does not contain an avc: message",
                file,
                None,
                "",
            )
        })?;
        let marker = start..start + AVC_MARKER.len();
        let mut tokens = tokenize(line, marker.end).into_iter();

        let status = tokens.next().ok_or_else(|| {
            Warning::invalid(
                "Missing ACL status",
                file,
                Some(marker.clone()),
                "Expected granted or denied after this",
            )
        })?;
        self.granted = match status.text {
            GRANTED => true,
            DENIED => false,
            other => {
                return Err(Warning::invalid(
                    &format!("Unknown value for ACL status: '{}'", other),
                    file,
                    Some(status.range),
                    "Expected granted or denied",
                ))
            }
        };

        let open = match tokens.next() {
            Some(t) if t.text == "{" => t.range,
            Some(t) => {
                return Err(Warning::invalid(
                    "Expected an operation list",
                    file,
                    Some(t.range),
                    "Expected '{'",
                ))
            }
            None => {
                return Err(Warning::invalid(
                    "Missing operation list",
                    file,
                    Some(status.range),
                    "Expected '{' after this",
                ))
            }
        };
        let close = loop {
            match tokens.next() {
                Some(t) if t.text == "}" => break t.range,
                Some(t) => {
                    self.operations.insert(t.text.to_string());
                }
                None => {
                    return Err(Warning::invalid(
                        "Unterminated operation list",
                        file,
                        Some(open),
                        "This '{' is never closed",
                    ))
                }
            }
        };

        match tokens.next() {
            Some(t) if t.text == FOR_KEYWORD => {}
            _ => {
                return Err(Warning::invalid(
                    "Missing 'for' after the operation list",
                    file,
                    Some(close.clone()),
                    "Expected 'for'",
                ))
            }
        }
        let mut tokens = tokens.peekable();
        if tokens.peek().is_none() {
            return Err(Warning::invalid(
                "Missing attributes",
                file,
                Some(close),
                "Expected key=value pairs after the operation list",
            ));
        }

        let mut ranges = BTreeMap::new();
        for t in tokens {
            match t.text.split_once('=') {
                Some((key, value)) => {
                    if !self.misc_attributes.contains_key(key) {
                        self.misc_attributes
                            .insert(key.to_string(), trim_double_quote(value).to_string());
                        ranges.insert(key.to_string(), t.range);
                    }
                }
                None => warnings.push(Warning::new(
                    &format!("Unparsable attribute: '{}'", t.text),
                    file,
                    t.range,
                    "Expected key=value",
                )),
            }
        }

        // Always strip the required keys, even if the record ends up invalid
        let scontext = self.misc_attributes.remove(SCONTEXT);
        let tcontext = self.misc_attributes.remove(TCONTEXT);
        let tclass = self.misc_attributes.remove(TCLASS);
        let permissive = self.misc_attributes.remove(PERMISSIVE);

        let missing: Vec<&str> = [
            (SCONTEXT, scontext.is_none()),
            (TCONTEXT, tcontext.is_none()),
            (TCLASS, tclass.is_none()),
            (PERMISSIVE, permissive.is_none()),
        ]
        .iter()
        .filter(|(_, absent)| *absent)
        .map(|(key, _)| *key)
        .collect();
        if !missing.is_empty() {
            return Err(Warning::invalid(
                &format!("Empty value for key: '{}'", missing.join("', '")),
                file,
                Some(start..line.len()),
                "Required by every audit record",
            ));
        }

        if let (Some(s), Some(t), Some(c)) = (scontext, tcontext, tclass) {
            self.scontext = SecurityContext::new(&s);
            self.tcontext = SecurityContext::new(&t);
            self.tclass = c;
        }

        let permissive = permissive.unwrap_or_default();
        self.permissive = match permissive.parse::<u8>() {
            Ok(0) => false,
            Ok(1) => true,
            _ => {
                return Err(Warning::invalid(
                    &format!("Invalid permissive status: '{}'", permissive),
                    file,
                    ranges.remove(PERMISSIVE),
                    "Expected 0 or 1",
                ))
            }
        };
        Ok(())
    }

    /// Fully parsed and not merged away
    pub fn is_valid(&self) -> bool {
        self.state == RecordState::Valid
    }

    pub fn is_consumed(&self) -> bool {
        self.state == RecordState::Consumed
    }

    pub fn is_renderable(&self) -> bool {
        self.is_valid() && !self.operations.is_empty()
    }

    /// Records with the same verdict, source, target and class describe the
    /// same rule.  Misc attributes are ignored.
    pub fn mergeable_with(&self, other: &AuditRecord) -> bool {
        self.granted == other.granted
            && self.scontext == other.scontext
            && self.tcontext == other.tcontext
            && self.tclass == other.tclass
    }

    /// Fold `other`'s operations into `self` and mark `other` consumed.
    /// Returns false, touching nothing, unless both records are valid and
    /// mergeable.
    pub fn absorb(&mut self, other: &mut AuditRecord) -> bool {
        if !self.is_valid() || !other.is_valid() || !self.mergeable_with(other) {
            return false;
        }
        self.operations
            .extend(other.operations.iter().cloned());
        other.state = RecordState::Consumed;
        true
    }
}
