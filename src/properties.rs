// Copyright (c) Microsoft Corporation.
// SPDX-License-Identifier: MIT
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::constants;
use crate::error::ErrorItem;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Read access to system properties
pub trait PropertyStore: Send + Sync {
    /// Empty values read as missing
    fn get(&self, key: &str) -> Option<String>;

    fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key).as_deref() {
            Some("1") | Some("y") | Some("yes") | Some("on") | Some("true") => true,
            Some("0") | Some("n") | Some("no") | Some("off") | Some("false") => false,
            _ => default,
        }
    }

    fn poll_interval(&self) -> Duration {
        POLL_INTERVAL
    }

    /// Block until `key` reads `value`.  With no timeout this waits forever;
    /// otherwise returns false once the timeout passes.
    fn wait_for(&self, key: &str, value: &str, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if self.get(key).as_deref() == Some(value) {
                return true;
            }
            if let Some(d) = deadline {
                if Instant::now() >= d {
                    return false;
                }
            }
            thread::sleep(self.poll_interval());
        }
    }
}

/// Properties as reported by the platform `getprop` tool
#[derive(Clone, Debug)]
pub struct SystemProperties {
    program: String,
}

impl SystemProperties {
    pub fn new() -> Self {
        SystemProperties {
            program: constants::GETPROP_PROGRAM.to_string(),
        }
    }

    pub fn with_program(program: &str) -> Self {
        SystemProperties {
            program: program.to_string(),
        }
    }

    fn query(&self, key: &str) -> Result<String, ErrorItem> {
        let output = Command::new(&self.program).arg(key).output()?;
        if !output.status.success() {
            return Err(ErrorItem::Property {
                key: key.to_string(),
                reason: format!("{} exited with {}", self.program, output.status),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Default for SystemProperties {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertyStore for SystemProperties {
    fn get(&self, key: &str) -> Option<String> {
        match self.query(key) {
            Ok(v) if v.is_empty() => None,
            Ok(v) => {
                debug!(key, value = %v, "property read");
                Some(v)
            }
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }
}
