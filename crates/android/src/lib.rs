//! Android build-for-test logic
//!
//! This crate provides the Android side of the step:
//! - Build / AndroidTest variant pairing and selection
//! - Gradle project, task listing and build invocation
//! - APK discovery, collision-safe export and role classification
//! - Publishing outputs and dependency-cache paths to the pipeline

pub mod artifacts;
pub mod cache;
pub mod env;
pub mod error;
pub mod gradle;
pub mod variants;

pub use artifacts::{Artifact, ExportedArtifacts};
pub use gradle::GradleProject;
pub use variants::{Variants, TEST_SUFFIX};
