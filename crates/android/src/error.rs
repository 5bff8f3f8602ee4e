//! Android-side error kinds
//!
//! Each kind converts into a coded [`testpair_core::Error`] so the binary can
//! report it uniformly.

use std::path::PathBuf;
use testpair_core::error::{Error, ErrorCode};
use thiserror::Error;

/// Requested variant could not be paired with its AndroidTest variant
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VariantError {
    #[error("variant: {variant} not found in {module} module")]
    AppVariantNotFound { variant: String, module: String },

    #[error("variant: {variant} not found in {module} module")]
    TestVariantNotFound { variant: String, module: String },
}

/// Failures while locating, exporting or classifying APKs
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Failed to search for artifacts with pattern: {pattern}: {source}")]
    Discovery {
        pattern: String,
        #[source]
        source: Error,
    },

    #[error("Failed to check path: {}: {source}", path.display())]
    ExportProbe {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not find the exported app APK")]
    AppArtifactMissing,

    #[error("Could not find the exported test APK")]
    TestArtifactMissing,
}

/// Failures of the Gradle invocation itself
#[derive(Error, Debug)]
pub enum GradleError {
    #[error("No Gradle wrapper found at {}", path.display())]
    WrapperNotFound { path: PathBuf },

    #[error("Failed to list Gradle tasks (exit code {exit_code})")]
    TaskListing { exit_code: i32, output: String },

    #[error("Build task failed: `{command}` exited with code {exit_code}")]
    BuildFailed { command: String, exit_code: i32 },
}

impl From<VariantError> for Error {
    fn from(err: VariantError) -> Self {
        let code = match err {
            VariantError::AppVariantNotFound { .. } => ErrorCode::AppVariantNotFound,
            VariantError::TestVariantNotFound { .. } => ErrorCode::TestVariantNotFound,
        };
        Error::new(code, format!("Failed to find buildable variants: {}", err))
            .with_suggestion("Pick a variant listed above that has an AndroidTest pair")
    }
}

impl From<ArtifactError> for Error {
    fn from(err: ArtifactError) -> Self {
        let (code, suggestion) = match &err {
            ArtifactError::Discovery { .. } => (ErrorCode::ArtifactDiscoveryFailed, None),
            ArtifactError::ExportProbe { .. } => (ErrorCode::ArtifactExportFailed, None),
            ArtifactError::AppArtifactMissing => (
                ErrorCode::AppArtifactMissing,
                Some("Check that apk_path_pattern matches the app APK"),
            ),
            ArtifactError::TestArtifactMissing => (
                ErrorCode::TestArtifactMissing,
                Some("Check that apk_path_pattern matches the *AndroidTest.apk file"),
            ),
        };
        let mut converted = Error::new(code, err.to_string());
        if let Some(suggestion) = suggestion {
            converted = converted.with_suggestion(suggestion);
        }
        converted.with_source(err)
    }
}

impl From<GradleError> for Error {
    fn from(err: GradleError) -> Self {
        match err {
            GradleError::WrapperNotFound { .. } => Error::gradle(err.to_string())
                .with_suggestion("Commit the Gradle wrapper (gradlew) to the project root"),
            GradleError::TaskListing { ref output, .. } => {
                let context = last_lines(output, 20);
                Error::new(ErrorCode::VariantListingFailed, err.to_string()).with_context(context)
            }
            GradleError::BuildFailed { .. } => {
                Error::new(ErrorCode::BuildInvocationFailed, err.to_string())
            }
        }
    }
}

fn last_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(count)..].join("\n")
}
