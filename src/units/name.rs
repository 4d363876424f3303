//! Unit identity normalization.
//!
//! # Rules
//! - Every run of characters outside `[A-Za-z0-9 ]` becomes a single `_`
//! - The result is lowercased
//! - A result that does not start with an ASCII letter or digit gets the
//!   `nqkd_` prefix
//!
//! Normalizing an already normalized name returns it unchanged.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Prefix applied to names whose first character is not alphanumeric.
pub const NAME_PREFIX: &str = "nqkd_";

static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9 ]+").expect("static pattern compiles"));

/// Errors produced while normalizing a unit name.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    /// Nothing was left to build an identifier from.
    #[error("unit name is empty")]
    Empty,
}

/// Turn an arbitrary unit name into its canonical identifier.
pub fn normalize_name(raw: &str) -> Result<String, NameError> {
    let replaced = DISALLOWED.replace_all(raw, "_").to_lowercase();

    match replaced.chars().next() {
        None => Err(NameError::Empty),
        Some(first) if first.is_ascii_alphanumeric() => Ok(replaced),
        // The replacement already supplies the separator.
        Some('_') => Ok(format!("{NAME_PREFIX}{}", &replaced[1..])),
        Some(_) => Ok(format!("{NAME_PREFIX}{replaced}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercases_and_replaces_runs() {
        assert_eq!(normalize_name("My.Web--App").unwrap(), "my_web_app");
        assert_eq!(normalize_name("media server").unwrap(), "media server");
    }

    #[test]
    fn test_prefixes_leading_symbol() {
        assert_eq!(normalize_name("-grafana").unwrap(), "nqkd_grafana");
        assert_eq!(normalize_name("!!!").unwrap(), "nqkd_");
        assert_eq!(normalize_name(" spaced").unwrap(), "nqkd_ spaced");
    }

    #[test]
    fn test_leading_digit_is_kept() {
        assert_eq!(normalize_name("1password").unwrap(), "1password");
    }

    #[test]
    fn test_idempotent() {
        for raw in ["Plex", "-grafana", "a/b/c", "Über Service", "x__y", " spaced", "1.2.3", "!!!", "__init", "_"] {
            let once = normalize_name(raw).unwrap();
            let twice = normalize_name(&once).unwrap();
            assert_eq!(once, twice, "normalizing {raw:?} twice changed the result");
        }
    }

    #[test]
    fn test_empty_input_rejected() {
        assert_eq!(normalize_name(""), Err(NameError::Empty));
    }
}
