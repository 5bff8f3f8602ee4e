//! Publishing step outputs to the pipeline environment

use crate::artifacts::ExportedArtifacts;
use std::path::Path;
use testpair_cli::output::Status;
use testpair_core::error::{Error, ErrorCode, Result};
use testpair_core::process::{command_exists, run_command};

/// Environment key holding the exported app APK path
pub const APK_ENV_KEY: &str = "BITRISE_APK_PATH";

/// Environment key holding the exported test APK path
pub const TEST_APK_ENV_KEY: &str = "BITRISE_TEST_APK_PATH";

/// Sink for `KEY=value` outputs of the step
pub trait EnvExporter {
    /// Publish one value; must fail loudly rather than drop it
    fn export(&self, key: &str, value: &str) -> Result<()>;
}

/// Exports through the `envman` tool used by Bitrise pipelines
#[derive(Debug, Default, Clone, Copy)]
pub struct Envman;

impl Envman {
    /// Whether `envman` is on PATH
    pub fn is_available() -> bool {
        command_exists("envman")
    }
}

impl EnvExporter for Envman {
    fn export(&self, key: &str, value: &str) -> Result<()> {
        let result = run_command("envman", &["add", "--key", key, "--value", value])?;
        if !result.success {
            return Err(Error::process(format!(
                "envman exited with code {}: {}",
                result.exit_code,
                result.combined_output().trim()
            )));
        }
        Ok(())
    }
}

/// Publish the two APK paths under their well-known keys
pub fn export_outputs(exporter: &dyn EnvExporter, exported: &ExportedArtifacts) -> Result<()> {
    export_path(exporter, APK_ENV_KEY, &exported.app)?;
    export_path(exporter, TEST_APK_ENV_KEY, &exported.test)?;
    Ok(())
}

fn export_path(exporter: &dyn EnvExporter, key: &str, path: &Path) -> Result<()> {
    exporter
        .export(key, &path.to_string_lossy())
        .map_err(|e| environment_export_failed(key, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    Status::print(&format!(
        "  Env    [ ${} = $BITRISE_DEPLOY_DIR/{} ]",
        key, file_name
    ));
    Ok(())
}

/// Wrap any exporter failure as `EnvironmentExportFailed` for `key`
pub fn environment_export_failed(key: &str, source: Error) -> Error {
    Error::new(
        ErrorCode::EnvironmentExportFailed,
        format!("Failed to export environment variable: {}", key),
    )
    .with_context(source.to_string())
    .with_source(source)
}
