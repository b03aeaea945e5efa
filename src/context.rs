// Copyright (c) Microsoft Corporation.
// SPDX-License-Identifier: MIT
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

// u:r:init:s0, u:object_r:system_file:s0:c512,c768 ...
fn context_regex() -> &'static Regex {
    static CONTEXT_RE: OnceLock<Regex> = OnceLock::new();
    CONTEXT_RE.get_or_init(|| {
        Regex::new(r"^u:(object_)?r:([\w-]+):s0(.+)?$").expect("context pattern is valid")
    })
}

/// The type portion of an SELinux security context.
///
/// Contexts in the usual `u:r:<type>:s0` or `u:object_r:<type>:s0[...]` shape
/// are reduced to the bare type.  Anything else is kept verbatim, so a
/// malformed context still round-trips into the generated rule.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SecurityContext {
    context: String,
}

impl SecurityContext {
    pub fn new(raw: &str) -> Self {
        let context = match context_regex().captures(raw).and_then(|c| c.get(2)) {
            Some(t) => t.as_str().to_string(),
            None => raw.to_string(),
        };
        SecurityContext { context }
    }

    pub fn as_str(&self) -> &str {
        &self.context
    }
}

impl fmt::Display for SecurityContext {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.context)
    }
}
