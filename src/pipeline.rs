// Copyright (c) Microsoft Corporation.
// SPDX-License-Identifier: MIT

//! One source, a fixed set of filters, and a raw capture file.
//!
//! A pipeline moves through Opening, Running, Draining and Closed.  Opening
//! failures go straight to Closed and produce nothing.  Running reads until
//! the shared shutdown flag is set.  Draining releases the source, closes the
//! raw file (deleting it if empty) and asks each filter that matched
//! something to write its derived file.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::filter::Filter;
use crate::source::Source;
use crate::util::session_timestamp;

// Back-off when a read returns nothing, so a drained source doesn't spin
const IDLE_BACKOFF: Duration = Duration::from_millis(10);

/// Set once by the coordinator, polled by every pipeline
#[derive(Clone, Debug, Default)]
pub struct ShutdownFlag {
    inner: Arc<AtomicBool>,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.inner.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.inner.load(Ordering::Acquire)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Opening,
    Running,
    Draining,
    Closed,
}

/// What a pipeline left behind once closed
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CaptureSummary {
    pub raw_log: Option<PathBuf>,
    pub artifacts: Vec<PathBuf>,
    pub lines: usize,
}

pub struct CapturePipeline {
    source: Box<dyn Source>,
    filters: Vec<Box<dyn Filter>>,
    directory: PathBuf,
    shutdown: ShutdownFlag,
    state: PipelineState,
}

impl CapturePipeline {
    pub fn new(
        source: Box<dyn Source>,
        filters: Vec<Box<dyn Filter>>,
        directory: &Path,
        shutdown: ShutdownFlag,
    ) -> Self {
        CapturePipeline {
            source,
            filters,
            directory: directory.to_path_buf(),
            shutdown,
            state: PipelineState::Opening,
        }
    }

    pub fn name(&self) -> &'static str {
        self.source.name()
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn transition(&mut self, next: PipelineState) {
        debug!(logger = self.name(), from = ?self.state, to = ?next, "pipeline state");
        self.state = next;
    }

    /// Capture until shutdown.  Never fails: every problem is logged and the
    /// artifact it would have produced is skipped.
    pub fn run(&mut self) -> CaptureSummary {
        let mut summary = CaptureSummary::default();

        if let Err(e) = self.source.open() {
            error!("{}", e);
            self.transition(PipelineState::Closed);
            return summary;
        }

        let raw_path = self.directory.join(format!(
            "{}-{}.log",
            self.name(),
            session_timestamp()
        ));
        let raw_file = match File::create(&raw_path) {
            Ok(f) => f,
            Err(e) => {
                error!(
                    "Failed to open {} for logging: {}",
                    raw_path.display(),
                    e
                );
                self.source.close();
                self.transition(PipelineState::Closed);
                return summary;
            }
        };
        info!(logger = self.name(), "Capturing to {}", raw_path.display());

        self.transition(PipelineState::Running);
        let mut raw = BufWriter::new(raw_file);
        summary.lines = self.capture(&mut raw);

        self.transition(PipelineState::Draining);
        self.source.close();
        if let Err(e) = raw.flush() {
            error!("Failed to flush {}: {}", raw_path.display(), e);
        }
        drop(raw);

        let empty = fs::metadata(&raw_path).map(|m| m.len() == 0).unwrap_or(true);
        if empty {
            if let Err(e) = fs::remove_file(&raw_path) {
                warn!("Failed to remove {}: {}", raw_path.display(), e);
            }
            info!("No log entries found for logger {}", self.name());
        } else {
            summary.raw_log = Some(raw_path);
            summary.artifacts = self.write_artifacts();
        }

        self.transition(PipelineState::Closed);
        summary
    }

    fn capture<W: Write>(&mut self, raw: &mut W) -> usize {
        let mut count = 0;
        while !self.shutdown.is_set() {
            let chunk = match self.source.read_chunk() {
                Ok(Some(c)) => c,
                Ok(None) => {
                    thread::sleep(IDLE_BACKOFF);
                    continue;
                }
                Err(e) => {
                    debug!(logger = self.name(), "read failed: {}", e);
                    thread::sleep(IDLE_BACKOFF);
                    continue;
                }
            };
            for line in chunk.lines() {
                for filter in self.filters.iter_mut() {
                    if filter.matches(line) {
                        filter.accumulate(line);
                    }
                }
                if let Err(e) = writeln!(raw, "{}", line) {
                    error!(logger = self.source.name(), "Failed to write log line: {}", e);
                }
                count += 1;
            }
        }
        count
    }

    fn write_artifacts(&self) -> Vec<PathBuf> {
        let mut written = Vec::new();
        for filter in self.filters.iter().filter(|f| !f.is_empty()) {
            let path = self.directory.join(format!(
                "{}.{}-{}.log",
                self.name(),
                filter.name(),
                session_timestamp()
            ));
            match filter.write(&path) {
                Ok(()) => written.push(path),
                Err(e) => error!(
                    "Failed to write to log file {} for logger {}: {}",
                    path.display(),
                    self.name(),
                    e
                ),
            }
        }
        written
    }
}
