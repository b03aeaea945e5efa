// Copyright (c) Microsoft Corporation.
// SPDX-License-Identifier: MIT

//! Reader for the running kernel's build configuration (`/proc/config.gz`)

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;

use crate::constants;
use crate::error::ErrorItem;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ConfigValue {
    #[default]
    Unknown,
    /// `=y`
    BuiltIn,
    /// `="..."`
    String,
    /// `=1`, `=0x10`
    Int,
    /// `=m`
    Module,
    /// `# CONFIG_FOO is not set`
    Unset,
}

impl ConfigValue {
    fn from_value(value: &str) -> Self {
        match value {
            "y" => ConfigValue::BuiltIn,
            "m" => ConfigValue::Module,
            "n" => ConfigValue::Unset,
            v if v.len() >= 2 && v.starts_with('"') && v.ends_with('"') => ConfigValue::String,
            v if v.parse::<i64>().is_ok() => ConfigValue::Int,
            v if v
                .strip_prefix("0x")
                .or_else(|| v.strip_prefix("0X"))
                .map(|hex| !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()))
                .unwrap_or(false) =>
            {
                ConfigValue::Int
            }
            _ => ConfigValue::Unknown,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct KernelConfig {
    values: HashMap<String, ConfigValue>,
}

impl KernelConfig {
    pub fn parse(contents: &str) -> Self {
        let mut values = HashMap::new();
        for line in contents.lines().map(str::trim) {
            if let Some(rest) = line.strip_prefix("# ") {
                if let Some(symbol) = rest.strip_suffix(" is not set") {
                    if symbol.starts_with("CONFIG_") {
                        values.insert(symbol.to_string(), ConfigValue::Unset);
                    }
                }
                continue;
            }
            if let Some((symbol, value)) = line.split_once('=') {
                values.insert(symbol.to_string(), ConfigValue::from_value(value));
            }
        }
        KernelConfig { values }
    }

    /// Missing symbols read as Unknown
    pub fn get(&self, symbol: &str) -> ConfigValue {
        self.values.get(symbol).copied().unwrap_or_default()
    }

    pub fn has_audit(&self) -> bool {
        self.get(constants::CONFIG_AUDIT) == ConfigValue::BuiltIn
    }
}

/// Read a gzip compressed kernel config
pub fn read_kernel_config(path: &Path) -> Result<KernelConfig, ErrorItem> {
    let file = File::open(path).map_err(|err| ErrorItem::KernelConfig {
        path: path.into(),
        err,
    })?;
    let mut contents = String::new();
    GzDecoder::new(file)
        .read_to_string(&mut contents)
        .map_err(|err| ErrorItem::KernelConfig {
            path: path.into(),
            err,
        })?;
    Ok(KernelConfig::parse(&contents))
}
