//! Emitter settings.
//!
//! Everything an emitter needs beyond the IR lives here, so identical
//! `(FormatSpec, Config)` pairs always render identical text.

use crate::naming::RenameRules;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Command line recorded in every banner as the way to regenerate the artifact.
    pub invocation: String,
    /// SPDX expression written under the banner.
    pub license: Option<String>,
    /// Type renaming shared by the Rust and Python backends.
    pub renames: RenameRules,
    /// Emit per-field offset assertions next to the size assertions.
    pub offset_asserts: bool,
    pub c: CConfig,
    pub python: PythonConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CConfig {
    pub guard: String,
    pub assert_macro: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PythonConfig {
    /// Prepended to named constants unless already present, e.g. `EEPROM_`.
    pub constant_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            invocation: "packspec".to_string(),
            license: None,
            renames: RenameRules::default(),
            offset_asserts: true,
            c: CConfig::with_prefix("FORMAT"),
            python: PythonConfig::default(),
        }
    }
}

impl CConfig {
    /// `JEEFS` -> guard `JEEFS_GENERATED_H`, macro `JEEFS_STATIC_ASSERT`.
    pub fn with_prefix(prefix: &str) -> Self {
        let prefix = prefix.to_ascii_uppercase();
        CConfig {
            guard: format!("{}_GENERATED_H", prefix),
            assert_macro: format!("{}_STATIC_ASSERT", prefix),
        }
    }
}

impl Config {
    pub fn with_invocation(mut self, invocation: impl Into<String>) -> Self {
        self.invocation = invocation.into();
        self
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.c = CConfig::with_prefix(prefix);
        self
    }
}
