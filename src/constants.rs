// Copyright (c) Microsoft Corporation.
// SPDX-License-Identifier: MIT
pub const AVC_MARKER: &str = "avc:";
pub const GRANTED: &str = "granted";
pub const DENIED: &str = "denied";
pub const FOR_KEYWORD: &str = "for";

pub const SCONTEXT: &str = "scontext";
pub const TCONTEXT: &str = "tcontext";
pub const TCLASS: &str = "tclass";
pub const PERMISSIVE: &str = "permissive";

pub const REQUIRED_ATTRIBUTES: &[&str] = &[SCONTEXT, TCONTEXT, TCLASS, PERMISSIVE];

pub const ALLOW_RULE: &str = "allow";
// Never emit a rule handing out this capability
pub const SUPPRESSED_PERMISSION: &str = "sys_admin";
// Denials from regular apps are expected
pub const IGNORED_DOMAIN: &str = "untrusted_app";

pub const KERNEL_SOURCE_NAME: &str = "dmesg";
pub const KERNEL_LOG_PATH: &str = "/proc/kmsg";
pub const LOGCAT_SOURCE_NAME: &str = "logcat";
pub const LOGCAT_PROGRAM: &str = "logcat";

pub const RAW_DENIAL_FILTER_NAME: &str = "avc";
pub const RECORD_GENERATOR_FILTER_NAME: &str = "sepolicy.gen";
pub const PROPERTY_DENIAL_FILTER_NAME: &str = "libc_properties";

pub const KERNEL_CONFIG_PATH: &str = "/proc/config.gz";
pub const CONFIG_AUDIT: &str = "CONFIG_AUDIT";

pub const KMSG_DEVICE: &str = "/dev/kmsg";
pub const UPTIME_PATH: &str = "/proc/uptime";

pub const GETPROP_PROGRAM: &str = "getprop";
pub const LOGD_KERNEL_PROP: &str = "ro.logd.kernel";
pub const BOOT_COMPLETED_PROP: &str = "sys.boot_completed";
pub const LOGGER_ENABLED_PROP: &str = "persist.ext.logdump.enabled";

pub const LOGGER_MODE_SYSTEM_ENV: &str = "LOGGER_MODE_SYSTEM";

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H_%M_%S";
