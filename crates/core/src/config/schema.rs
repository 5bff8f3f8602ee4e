//! Configuration schema definitions
//!
//! Input names are kept compatible with the hosting CI system
//! (`project_location`, `apk_path_pattern`, ...).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Glob used when `apk_path_pattern` is not set
pub const DEFAULT_APK_PATH_PATTERN: &str = "*/build/outputs/apk/*.apk";

/// How much of the Gradle state is handed to the dependency cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheLevel {
    /// Collect nothing
    None,
    /// Collect Gradle dependency caches only
    #[default]
    OnlyDeps,
    /// Collect dependencies and project build outputs
    All,
}

impl CacheLevel {
    /// The wire name of the level
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheLevel::None => "none",
            CacheLevel::OnlyDeps => "only_deps",
            CacheLevel::All => "all",
        }
    }
}

impl fmt::Display for CacheLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "none" => Ok(CacheLevel::None),
            "only_deps" => Ok(CacheLevel::OnlyDeps),
            "all" => Ok(CacheLevel::All),
            other => Err(Error::config_validation(format!(
                "Invalid cache_level: {:?}, expected one of: none, only_deps, all",
                other
            ))),
        }
    }
}

/// Raw step inputs, every field optional.
///
/// Used both for values coming from flags/environment and for the optional
/// defaults file, which is read from its `[step]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StepInputs {
    pub project_location: Option<String>,
    pub apk_path_pattern: Option<String>,
    pub variant: Option<String>,
    pub module: Option<String>,
    pub arguments: Option<String>,
    pub cache_level: Option<String>,
    pub deploy_dir: Option<String>,
}

impl StepInputs {
    /// Fill every unset (or blank) field from `defaults`
    pub fn or(self, defaults: StepInputs) -> StepInputs {
        fn pick(value: Option<String>, fallback: Option<String>) -> Option<String> {
            value.filter(|v| !v.trim().is_empty()).or(fallback)
        }

        StepInputs {
            project_location: pick(self.project_location, defaults.project_location),
            apk_path_pattern: pick(self.apk_path_pattern, defaults.apk_path_pattern),
            variant: pick(self.variant, defaults.variant),
            module: pick(self.module, defaults.module),
            arguments: pick(self.arguments, defaults.arguments),
            cache_level: pick(self.cache_level, defaults.cache_level),
            deploy_dir: pick(self.deploy_dir, defaults.deploy_dir),
        }
    }
}

/// Layout of the optional TOML defaults file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigSchema {
    pub step: StepInputs,
}

/// Validated step configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepConfig {
    /// Gradle project root
    pub project_location: PathBuf,
    /// Glob matched against full artifact paths
    pub apk_path_pattern: String,
    /// Requested app variant
    pub variant: String,
    /// Gradle module owning the variant
    pub module: String,
    /// Raw extra Gradle arguments, tokenized later
    pub arguments: String,
    pub cache_level: CacheLevel,
    /// Directory the CI system collects artifacts from
    pub deploy_dir: PathBuf,
}
