use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, GenError};

/// Stem appended to a library's directory to form its include path.
pub const DEFAULT_INCLUDE_STEM: &str = "rust/wire";

/// Which parts of the bindings to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Domain objects, protocol bindings and the test base.
    #[default]
    Monolithic,
    /// Constants, enums, bits, structs, tables, unions and protocol markers
    /// only.
    DomainObjectsOnly,
}

/// Generator settings. Built once and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Path prefix of every output file, e.g. `out/demo/geometry`.
    pub output_base:  String,
    /// Root that include paths are expressed under.
    pub include_base: String,
    pub include_stem: String,
    pub mode:         Mode,
}

impl Config {
    pub fn new(output_base: impl Into<String>, include_base: impl Into<String>) -> Config {
        Config {
            output_base:  output_base.into(),
            include_base: include_base.into(),
            include_stem: DEFAULT_INCLUDE_STEM.to_string(),
            mode:         Mode::default(),
        }
    }

    pub fn with_include_stem(mut self, include_stem: impl Into<String>) -> Config {
        self.include_stem = include_stem.into();
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Config {
        self.mode = mode;
        self
    }

    /// Checks that every required option is present.
    pub fn validate(&self) -> Result<(), GenError> {
        if self.output_base.is_empty() {
            return Err(ConfigError::MissingOption("output_base").into());
        }
        if self.include_base.is_empty() {
            return Err(ConfigError::MissingOption("include_base").into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::new("out/a", "out");
        assert_eq!(config.include_stem, DEFAULT_INCLUDE_STEM);
        assert_eq!(config.mode, Mode::Monolithic);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_options() {
        let err = Config::new("", "out").validate().unwrap_err();
        assert!(err.is_config_error());
        assert_eq!(err.to_string(), "Configuration error: Missing required option `output_base`");

        let err = Config::new("out/a", "").validate().unwrap_err();
        assert!(matches!(err, GenError::Config(ConfigError::MissingOption("include_base"))));
    }
}
