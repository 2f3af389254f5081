//! POSIX shell rendering of provisioned variables.

use sessionforge_core::Secret;
use std::collections::BTreeMap;

/// Quote `value` so a POSIX shell reads it back verbatim.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// One `export NAME='value'` line per variable, in name order.
pub fn export_lines(env: &BTreeMap<String, Secret>) -> Vec<String> {
    env.iter()
        .map(|(name, value)| format!("export {}={}", name, quote(value.expose())))
        .collect()
}
