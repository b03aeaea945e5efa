// Copyright (c) Microsoft Corporation.
// SPDX-License-Identifier: MIT
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::Local;
use tracing::{error, info};

use crate::constants;
use crate::error::ErrorItem;

/// Local time, sortable and unique per second
pub fn session_timestamp() -> String {
    Local::now().format(constants::TIMESTAMP_FORMAT).to_string()
}

/// Delete everything under `path` and recreate it empty
pub fn recreate_dir(path: &Path) -> Result<(), ErrorItem> {
    info!("Deleting everything in {}", path.display());
    if path.is_dir() {
        fs::remove_dir_all(path).map_err(|e| ErrorItem::directory("remove", path, e))?;
    }
    info!("Recreating directory...");
    fs::create_dir_all(path).map_err(|e| ErrorItem::directory("create", path, e))
}

// /proc/uptime: "<uptime seconds> <idle seconds>"
fn parse_uptime(contents: &str) -> Option<u64> {
    let secs: f64 = contents.split_whitespace().next()?.parse().ok()?;
    if secs.is_finite() && secs >= 0.0 {
        Some(secs as u64)
    } else {
        None
    }
}

pub fn format_boot_time(uptime_secs: u64) -> String {
    format!(
        "Boot completed in {:02}m{:02}s",
        uptime_secs / 60,
        uptime_secs % 60
    )
}

/// Log how long boot took and leave a marker in the kernel log.  Failures are
/// only logged.
pub fn record_boot_time(uptime_path: &Path, kmsg_path: &Path) {
    let uptime = match fs::read_to_string(uptime_path)
        .ok()
        .as_deref()
        .and_then(parse_uptime)
    {
        Some(u) => u,
        None => {
            error!("Failed to read uptime from {}", uptime_path.display());
            return;
        }
    };
    let message = format_boot_time(uptime);
    info!("{}", message);
    let written = OpenOptions::new()
        .append(true)
        .open(kmsg_path)
        .and_then(|mut kmsg| kmsg.write_all(message.as_bytes()));
    if let Err(e) = written {
        error!("Failed to write to {}: {}", kmsg_path.display(), e);
    }
}
