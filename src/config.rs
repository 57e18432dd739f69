//! Settings for code generation, read from a `typed-ir.toml` file.
//!
//! ```toml
//! [target]
//! triple = "x86_64-unknown-linux-gnu"
//!
//! [profile.release]
//! release = true
//! opt_level = 3
//! ```

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("profile {0} is not defined")]
    UnknownProfile(String),
}

/// A code generation config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub profile: HashMap<String, Profile>,
}

/// The machine to generate code for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Defaults to the host triple.
    pub triple: Option<String>,
}

/// Defines a compilation profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Whether this profile is the --release profile.
    #[serde(default)]
    pub release: bool,
    /// The optimization level.
    #[serde(default)]
    pub opt_level: u8,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum OptLevel {
    #[default]
    None, // -O0
    Less,       // -O1
    Default,    // -O2
    Aggressive, // -O3
}

impl From<u8> for OptLevel {
    fn from(value: u8) -> Self {
        match value {
            0 => OptLevel::None,
            1 => OptLevel::Less,
            2 => OptLevel::Default,
            _ => OptLevel::Aggressive,
        }
    }
}

/// The resolved settings a code generator is created with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOptions {
    pub optlevel: OptLevel,
    pub target_triple: Option<String>,
}

impl Config {
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&source)
    }

    /// The profile used when none is named: `dev`, or with `release` set the
    /// profile marked `release = true` (`release` if none is).
    pub fn default_profile(&self, release: bool) -> &str {
        if !release {
            return "dev";
        }
        self.profile
            .iter()
            .filter(|(_, profile)| profile.release)
            .map(|(name, _)| name.as_str())
            .min()
            .unwrap_or("release")
    }

    /// Resolves the options for the named profile.
    ///
    /// `dev` and `release` exist even when the file does not define them, at
    /// `-O0` and `-O3` respectively.
    pub fn compile_options(&self, profile: &str) -> Result<CompileOptions, ConfigError> {
        let optlevel = match (self.profile.get(profile), profile) {
            (Some(profile), _) => OptLevel::from(profile.opt_level),
            (None, "dev") => OptLevel::None,
            (None, "release") => OptLevel::Aggressive,
            (None, name) => return Err(ConfigError::UnknownProfile(name.to_string())),
        };

        Ok(CompileOptions {
            optlevel,
            target_triple: self.target.triple.clone(),
        })
    }
}
