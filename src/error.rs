// Copyright (c) Microsoft Corporation.
// SPDX-License-Identifier: MIT
use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};
use codespan_reporting::files::SimpleFile;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use std::fmt;
use std::io;
use std::ops::Range;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct Diag {
    pub inner: Diagnostic<()>,
}

impl From<Diagnostic<()>> for Diag {
    fn from(d: Diagnostic<()>) -> Self {
        Self { inner: d }
    }
}

impl fmt::Display for Diag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.inner.message)?;
        if let Some(label) = self.inner.labels.first() {
            if !label.message.is_empty() {
                write!(f, " ({})", label.message)?;
            }
        }
        Ok(())
    }
}

/// A problem found while parsing one audit line.
///
/// The "file" is the line itself, named after where it came from, so the
/// label range points straight at the offending token.
#[derive(Error, Clone, Debug)]
#[error("{diagnostic}")]
pub struct ParseError {
    pub diagnostic: Diag,
    pub file: SimpleFile<String, String>,
}

impl ParseError {
    pub fn new(
        msg: &str,
        file: &SimpleFile<String, String>,
        range: Option<Range<usize>>,
        help: &str,
    ) -> Self {
        let diagnostic = Diagnostic::error().with_message(msg);

        let diagnostic = match range {
            None => diagnostic,
            Some(r) => diagnostic.with_labels(vec![Label::primary((), r).with_message(help)]),
        };
        ParseError {
            diagnostic: diagnostic.into(),
            file: file.clone(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.diagnostic.inner.severity
    }

    pub fn origin(&self) -> &str {
        self.file.name()
    }

    pub fn print_diagnostic(&self, color: ColorChoice) {
        let writer = StandardStream::stderr(color);
        let config = term::Config::default();
        // Ignores print errors.
        let _ = term::emit(
            &mut writer.lock(),
            &config,
            &self.file,
            &self.diagnostic.inner,
        );
    }
}

#[derive(Error, Debug)]
pub enum ErrorItem {
    #[error("Failed to open source for logger {name}: {reason}")]
    SourceOpen { name: &'static str, reason: String },
    #[error("Process {program} exited early with status {status}")]
    EarlyExit { program: String, status: String },
    #[error("Failed to {action} directory '{}': {err}", .path.display())]
    Directory {
        action: &'static str,
        path: PathBuf,
        err: io::Error,
    },
    #[error("Failed to read kernel configuration '{}': {err}", .path.display())]
    KernelConfig { path: PathBuf, err: io::Error },
    #[error("Failed to query property {key}: {reason}")]
    Property { key: String, reason: String },
    #[error("I/O error: {0}")]
    IO(#[from] io::Error),
}

impl ErrorItem {
    pub fn source_open<E: fmt::Display>(name: &'static str, err: E) -> Self {
        ErrorItem::SourceOpen {
            name,
            reason: err.to_string(),
        }
    }

    pub fn directory(action: &'static str, path: impl Into<PathBuf>, err: io::Error) -> Self {
        ErrorItem::Directory {
            action,
            path: path.into(),
            err,
        }
    }
}
