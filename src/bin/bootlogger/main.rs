// Copyright (c) Microsoft Corporation.
// SPDX-License-Identifier: MIT
use selinux_bootlogger::{
    generate_rules_from_files, read_kernel_config, recreate_dir, Coordinator, CoordinatorConfig,
    StopCondition, SystemProperties, KERNEL_CONFIG_PATH, LOGGER_MODE_SYSTEM_ENV,
};

mod args;
use args::{Args, ColorArg, Command};

use clap::Parser;
use is_terminal::IsTerminal;
use nix::sys::stat::{umask, Mode};
use std::fs::File;
use std::io::{Error, ErrorKind, Write};
use std::path::{Path, PathBuf};
use termcolor::ColorChoice;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Capture {
            log_dir,
            dir_name,
            system,
        } => {
            let system = system || std::env::var_os(LOGGER_MODE_SYSTEM_ENV).is_some();
            capture(Path::new(&log_dir).join(dir_name), system)
        }
        Command::Audit2allow {
            input_file,
            out_filename,
            color,
        } => audit2allow(input_file, out_filename, color),
    }
}

fn capture(directory: PathBuf, system: bool) -> std::io::Result<()> {
    // Logs must stay readable by the tools that collect them
    umask(Mode::from_bits_truncate(0o022));

    if let Err(e) = recreate_dir(&directory) {
        error!("{}", e);
        return Err(Error::new(ErrorKind::Other, e.to_string()));
    }

    let has_audit = match read_kernel_config(Path::new(KERNEL_CONFIG_PATH)) {
        Ok(config) => config.has_audit(),
        Err(e) => {
            warn!("{}", e);
            false
        }
    };
    if !has_audit {
        info!("Kernel audit support not detected, skipping kernel log filters");
    }

    let stop = if system {
        StopCondition::Disabled
    } else {
        StopCondition::BootCompleted
    };
    let config = CoordinatorConfig::new(&directory, has_audit, stop);
    let report = Coordinator::new(config, SystemProperties::new()).run();
    for (name, summary) in report.pipelines {
        info!(
            logger = name,
            lines = summary.lines,
            artifacts = summary.artifacts.len(),
            "Logger finished"
        );
    }
    Ok(())
}

fn audit2allow(
    inputs: Vec<String>,
    out_filename: Option<String>,
    color: Option<ColorArg>,
) -> std::io::Result<()> {
    let logs: Vec<String> = match get_log_files(inputs) {
        Ok(mut s) => {
            // Process files in a fixed order so diagnostics come out the same every run
            s.sort_unstable();
            s
        }
        Err(e) => {
            eprintln!("{e}");
            return Err(e);
        }
    };
    if logs.is_empty() {
        return Err(Error::new(ErrorKind::InvalidData, "No log files found"));
    }

    // termcolor doesn't handle automatic terminal detection
    // https://docs.rs/termcolor/latest/termcolor/#detecting-presence-of-a-terminal
    let color = match color {
        Some(ColorArg::Always) => ColorChoice::Always,
        Some(ColorArg::Auto) | None => {
            if std::io::stderr().is_terminal() {
                ColorChoice::Auto
            } else {
                ColorChoice::Never
            }
        }
        Some(ColorArg::Never) => ColorChoice::Never,
    };

    let logs: Vec<&str> = logs.iter().map(|s| s as &str).collect();
    let rules = match generate_rules_from_files(&logs) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{e}");
            return Err(Error::new(ErrorKind::InvalidData, e.to_string()));
        }
    };
    rules.warnings().print_warnings(color);

    let mut out: Box<dyn Write> = match out_filename {
        Some(f) => Box::new(File::create(f)?),
        None => Box::new(std::io::stdout().lock()),
    };
    for rule in rules.inner(&mut Default::default()) {
        writeln!(out, "{rule}")?;
    }
    out.flush()
}

// Create a list of log files
fn get_log_files(filenames: Vec<String>) -> Result<Vec<String>, Error> {
    let mut log_files = Vec::new();
    for file in filenames {
        for entry in WalkDir::new(file) {
            let entry = entry?;
            if entry.file_type().is_file() {
                log_files.push(entry.path().display().to_string());
            }
        }
    }
    Ok(log_files)
}
