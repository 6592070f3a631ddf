//! Runtime configuration (§6 "Environment").
//!
//! A single recognised variable, `BSDIFF_LOWMEM` (renamed from the source's
//! `JULIA_BSDIFF_LOWMEM` per the REDESIGN FLAGS note on config), read once at
//! startup via [`Config::from_env`] and threaded explicitly through encoder
//! constructors from there on — never re-read mid-operation. Parsed the way
//! `lz4r`'s `cli/op_mode.rs` and `cascette-protocol`'s `config.rs` read their
//! own environment variables: `std::env::var`, case-insensitive match
//! against the accepted value sets, hard error on anything else.

use crate::error::{BsdiffError, Result};

pub const LOWMEM_VAR: &str = "BSDIFF_LOWMEM";

const TRUE_VALUES: &[&str] = &["1", "true", "t", "yes", "y"];
const FALSE_VALUES: &[&str] = &["0", "false", "f", "no", "n"];

/// Runtime knobs threaded through the format encoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Config {
    /// When set, use a small bzip2 block size on encode and small-memory
    /// mode on decode.
    pub low_mem: bool,
}

impl Config {
    /// Read [`LOWMEM_VAR`] from the environment. An unset variable defaults
    /// to `low_mem: false`; any value outside the accepted sets is a hard
    /// `ConfigError`, per spec.md §6.
    pub fn from_env() -> Result<Self> {
        match std::env::var(LOWMEM_VAR) {
            Ok(raw) => Ok(Config {
                low_mem: parse_lowmem(&raw)?,
            }),
            Err(std::env::VarError::NotPresent) => Ok(Config::default()),
            Err(std::env::VarError::NotUnicode(_)) => Err(BsdiffError::ConfigError(format!(
                "{LOWMEM_VAR} is not valid unicode"
            ))),
        }
    }
}

fn parse_lowmem(raw: &str) -> Result<bool> {
    let lower = raw.to_ascii_lowercase();
    if TRUE_VALUES.contains(&lower.as_str()) {
        Ok(true)
    } else if FALSE_VALUES.contains(&lower.as_str()) {
        Ok(false)
    } else {
        Err(BsdiffError::ConfigError(format!(
            "{LOWMEM_VAR}={raw:?} is not one of {TRUE_VALUES:?} or {FALSE_VALUES:?}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falsy_zero_parses_to_normal_mode() {
        assert_eq!(parse_lowmem("0").unwrap(), false);
    }

    #[test]
    fn defaults_to_normal_mode_when_env_var_unset() {
        std::env::remove_var(LOWMEM_VAR);
        assert_eq!(Config::from_env().unwrap(), Config::default());
    }

    #[test]
    fn accepts_truthy_values_case_insensitively() {
        for v in ["1", "true", "T", "YES", "y"] {
            assert!(parse_lowmem(v).unwrap(), "{v} should parse true");
        }
    }

    #[test]
    fn accepts_falsy_values_case_insensitively() {
        for v in ["0", "false", "F", "NO", "n"] {
            assert!(!parse_lowmem(v).unwrap(), "{v} should parse false");
        }
    }

    #[test]
    fn rejects_unrecognised_values() {
        assert!(parse_lowmem("maybe").is_err());
        assert!(parse_lowmem("").is_err());
    }
}
