// Copyright (c) Microsoft Corporation.
// SPDX-License-Identifier: MIT

//! Module for audit parse diagnostics
//!
//! Parsing an audit line never fails outright.  Instead the parser returns a
//! WithWarnings wrapping the (possibly invalid) record.  Callers create a
//! Warnings object, call inner() to take the record and move the diagnostics
//! into their Warnings, then either log() them or print them with
//! print_warnings().

use codespan_reporting::diagnostic::Severity;
use codespan_reporting::files::SimpleFile;
use std::ops::Range;
use termcolor::ColorChoice;
use tracing::{error, warn};

use crate::error::ParseError;

#[derive(Clone, Debug)]
pub struct Warning {
    inner: ParseError,
}

impl Warning {
    /// A problem that only drops part of the input
    pub fn new(
        msg: &str,
        file: &SimpleFile<String, String>,
        range: Range<usize>,
        help: &str,
    ) -> Self {
        let mut error = ParseError::new(msg, file, Some(range), help);
        error.diagnostic.inner.severity = Severity::Warning;
        Warning { inner: error }
    }

    /// A problem that invalidates the whole record
    pub fn invalid(
        msg: &str,
        file: &SimpleFile<String, String>,
        range: Option<Range<usize>>,
        help: &str,
    ) -> Self {
        Warning {
            inner: ParseError::new(msg, file, range, help),
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.inner.severity() >= Severity::Error
    }

    pub fn print_diagnostic(&self, color: ColorChoice) {
        self.inner.print_diagnostic(color)
    }

    pub fn log(&self) {
        if self.is_fatal() {
            error!(origin = self.inner.origin(), "{}", self.inner);
        } else {
            warn!(origin = self.inner.origin(), "{}", self.inner);
        }
    }

    pub fn message(&self) -> &str {
        &self.inner.diagnostic.inner.message
    }
}

#[derive(Clone, Debug, Default)]
pub struct Warnings {
    inner: Vec<Warning>,
}

impl Warnings {
    pub fn new() -> Self {
        Warnings { inner: Vec::new() }
    }

    pub fn append(&mut self, other: &mut Self) {
        self.inner.append(&mut other.inner)
    }

    pub fn push(&mut self, w: Warning) {
        self.inner.push(w)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn print_warnings(&self, color: ColorChoice) {
        for e in &self.inner {
            e.print_diagnostic(color)
        }
    }

    pub fn log(&self) {
        for e in &self.inner {
            e.log()
        }
    }

    pub fn count(&self) -> usize {
        self.inner.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Warning> {
        self.inner.iter()
    }
}

/// Wraps a parsed object with the diagnostics produced while parsing it
pub struct WithWarnings<T> {
    inner: T,
    warnings: Warnings,
}

impl<T> WithWarnings<T> {
    pub fn new(inner: T, warnings: Warnings) -> Self {
        WithWarnings { inner, warnings }
    }

    /// Return the inner, extract the warnings to the warnings variable
    pub fn inner(mut self, warnings: &mut Warnings) -> T {
        warnings.append(&mut self.warnings);
        self.inner
    }

    pub fn add_warning(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &Warnings {
        &self.warnings
    }
}

impl<T> From<T> for WithWarnings<T> {
    fn from(inner: T) -> Self {
        WithWarnings {
            inner,
            warnings: Warnings::new(),
        }
    }
}
