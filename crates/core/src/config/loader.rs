//! Configuration loading and validation

use super::schema::{CacheLevel, ConfigSchema, StepConfig, StepInputs, DEFAULT_APK_PATH_PATTERN};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Name of the defaults file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = ".android-build-for-test.toml";

/// Configuration wrapper
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub schema: ConfigSchema,
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load the defaults file from `path`, or from the working directory when
    /// present, or fall back to empty defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(Path::to_path_buf).or_else(find_config_file);

        let schema = match config_path {
            Some(ref p) => load_config_file(p)?,
            None => ConfigSchema::default(),
        };

        Ok(Self {
            schema,
            path: config_path,
        })
    }

    /// Merge `inputs` over the loaded defaults and validate the result
    pub fn resolve(&self, inputs: StepInputs) -> Result<StepConfig> {
        StepConfig::from_inputs(inputs.or(self.schema.step.clone()))
    }
}

impl StepConfig {
    /// Validate raw inputs into a usable configuration.
    ///
    /// The deploy directory is created when it does not exist yet.
    pub fn from_inputs(inputs: StepInputs) -> Result<Self> {
        let variant = required(inputs.variant, "variant")?;
        let module = required(inputs.module, "module")?;
        let deploy_dir = PathBuf::from(required(inputs.deploy_dir, "deploy_dir")?);

        let project_location =
            PathBuf::from(inputs.project_location.unwrap_or_else(|| ".".to_string()));
        if !project_location.is_dir() {
            return Err(Error::directory_not_found(&project_location)
                .with_context("Validating input: project_location"));
        }

        if deploy_dir.exists() {
            if !deploy_dir.is_dir() {
                return Err(Error::config_validation(format!(
                    "deploy_dir is not a directory: {}",
                    deploy_dir.display()
                )));
            }
        } else {
            std::fs::create_dir_all(&deploy_dir).map_err(|e| {
                Error::from(e).with_context(format!(
                    "Creating deploy directory {}",
                    deploy_dir.display()
                ))
            })?;
        }

        let apk_path_pattern = inputs
            .apk_path_pattern
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_APK_PATH_PATTERN.to_string());

        let cache_level = match inputs.cache_level {
            Some(level) => level.parse()?,
            None => CacheLevel::default(),
        };

        Ok(Self {
            project_location,
            apk_path_pattern,
            variant,
            module,
            arguments: inputs.arguments.unwrap_or_default(),
            cache_level,
            deploy_dir,
        })
    }

    /// `(name, value)` rows for printing the effective configuration
    pub fn summary(&self) -> Vec<(&'static str, String)> {
        vec![
            ("project_location", self.project_location.display().to_string()),
            ("apk_path_pattern", self.apk_path_pattern.clone()),
            ("variant", self.variant.clone()),
            ("module", self.module.clone()),
            ("arguments", self.arguments.clone()),
            ("cache_level", self.cache_level.to_string()),
            ("deploy_dir", self.deploy_dir.display().to_string()),
        ]
    }
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            Error::config_validation(format!("Required input is missing: {}", name))
                .with_suggestion(format!("Set the `{}` input", name))
        })
}

fn find_config_file() -> Option<PathBuf> {
    let candidate = Path::new(DEFAULT_CONFIG_FILE);
    candidate.exists().then(|| candidate.to_path_buf())
}

/// Load and parse a TOML configuration file
fn load_config_file(path: &Path) -> Result<ConfigSchema> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    toml::from_str(&content).map_err(|e| {
        Error::from(e).with_context(format!("Parsing config file {}", path.display()))
    })
}
