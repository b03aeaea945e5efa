// Copyright (c) Microsoft Corporation.
// SPDX-License-Identifier: MIT
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, ChildStdout, Command, Stdio};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::{debug, error, info};

use crate::constants;
use crate::error::ErrorItem;

/// A log stream a capture pipeline can read from
pub trait Source: Send {
    fn name(&self) -> &'static str;
    fn open(&mut self) -> Result<(), ErrorItem>;
    /// Blocking read of the next chunk of text, which may hold several lines.
    /// `Ok(None)` means nothing was available (end of stream for now).
    fn read_chunk(&mut self) -> io::Result<Option<String>>;
    fn close(&mut self);
}

fn read_line<R: BufRead>(reader: &mut R) -> io::Result<Option<String>> {
    let mut buf = Vec::new();
    match reader.read_until(b'\n', &mut buf)? {
        0 => Ok(None),
        _ => Ok(Some(String::from_utf8_lossy(&buf).into_owned())),
    }
}

/// The kernel ring buffer, read through a file such as `/proc/kmsg`
#[derive(Debug)]
pub struct KernelLogSource {
    path: PathBuf,
    reader: Option<BufReader<File>>,
}

impl KernelLogSource {
    pub fn new() -> Self {
        Self::with_path(constants::KERNEL_LOG_PATH)
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        KernelLogSource {
            path: path.into(),
            reader: None,
        }
    }
}

impl Default for KernelLogSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Source for KernelLogSource {
    fn name(&self) -> &'static str {
        constants::KERNEL_SOURCE_NAME
    }

    fn open(&mut self) -> Result<(), ErrorItem> {
        let file = File::open(&self.path).map_err(|e| ErrorItem::source_open(self.name(), e))?;
        self.reader = Some(BufReader::new(file));
        Ok(())
    }

    fn read_chunk(&mut self) -> io::Result<Option<String>> {
        match self.reader.as_mut() {
            Some(reader) => read_line(reader),
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        self.reader = None;
    }
}

/// A running log dumper.  Dropping it terminates and reaps the child,
/// whichever way the owner exits.
#[derive(Debug)]
struct ChildGuard {
    child: Child,
    program: String,
}

impl ChildGuard {
    /// Fails with EarlyExit if the child has already exited
    fn ensure_running(&mut self) -> Result<(), ErrorItem> {
        match self.child.try_wait()? {
            Some(status) => Err(ErrorItem::EarlyExit {
                program: self.program.clone(),
                status: status.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Stop and reap the child, then log anything it wrote to stderr.
    /// Returns whether SIGTERM was sent.  Once the child has been reaped its
    /// pid may belong to another process, so it is never signaled again.
    fn terminate(&mut self) -> bool {
        let signaled = match self.child.try_wait() {
            Ok(Some(status)) => {
                debug!(program = %self.program, "child already exited with {}", status);
                false
            }
            Ok(None) => {
                let pid = Pid::from_raw(self.child.id() as i32);
                if let Err(e) = signal::kill(pid, Signal::SIGTERM) {
                    debug!(pid = self.child.id(), "SIGTERM failed: {}", e);
                }
                match self.child.wait() {
                    Ok(status) => debug!(program = %self.program, "child exited with {}", status),
                    Err(e) => error!(program = %self.program, "Failed to wait for child: {}", e),
                }
                true
            }
            Err(e) => {
                error!(program = %self.program, "Failed to check child status: {}", e);
                false
            }
        };
        if let Some(mut stderr) = self.child.stderr.take() {
            let mut output = String::new();
            if stderr.read_to_string(&mut output).is_ok() && !output.trim().is_empty() {
                error!(program = %self.program, "standard error output: {}", output.trim_end());
            }
        }
        signaled
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        let _ = self.terminate();
    }
}

/// Output of a forked log dumping program, `logcat` by default
#[derive(Debug)]
pub struct LogcatSource {
    program: OsString,
    args: Vec<OsString>,
    reader: Option<BufReader<ChildStdout>>,
    child: Option<ChildGuard>,
}

impl LogcatSource {
    pub fn new() -> Self {
        Self::with_command(constants::LOGCAT_PROGRAM, Vec::<OsString>::new())
    }

    pub fn with_command<P, I, A>(program: P, args: I) -> Self
    where
        P: Into<OsString>,
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        LogcatSource {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            reader: None,
            child: None,
        }
    }
}

impl Default for LogcatSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Source for LogcatSource {
    fn name(&self) -> &'static str {
        constants::LOGCAT_SOURCE_NAME
    }

    fn open(&mut self) -> Result<(), ErrorItem> {
        let program = self.program.to_string_lossy().into_owned();
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ErrorItem::source_open(self.name(), e))?;
        let stdout = child.stdout.take();
        let mut guard = ChildGuard { child, program };

        guard.ensure_running()?;
        let stdout = stdout.ok_or_else(|| {
            ErrorItem::source_open(self.name(), "child stdout was not captured")
        })?;
        info!(program = %guard.program, pid = guard.child.id(), "Forked log source");

        self.reader = Some(BufReader::new(stdout));
        self.child = Some(guard);
        Ok(())
    }

    fn read_chunk(&mut self) -> io::Result<Option<String>> {
        match self.reader.as_mut() {
            Some(reader) => read_line(reader),
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        // Dropping the guard kills and reaps the child
        self.child = None;
        self.reader = None;
    }
}
