use std::sync::LazyLock;

use regex::Regex;

use crate::error::{LoadError, Result};

// Every name accepted here ends up interpolated into generated SQL, so the
// gate is an allow-list, never an escaping pass.
static DEFAULT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("valid identifier pattern"));

pub fn default_pattern() -> &'static Regex {
    &DEFAULT_PATTERN
}

pub fn validate(pattern: &Regex, what: &'static str, value: &str) -> Result<()> {
    if pattern.is_match(value) {
        Ok(())
    } else {
        Err(LoadError::InvalidIdentifier {
            what,
            value: value.to_string(),
        })
    }
}

pub fn validate_graph_name(name: &str) -> Result<()> {
    validate(default_pattern(), "graph name", name)
}
