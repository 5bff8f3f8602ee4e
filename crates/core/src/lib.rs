//! Core utilities for the Android build-for-test step
//!
//! This crate provides the plumbing shared by the step's crates:
//!
//! - **Error handling**: errors with codes, context, and recovery suggestions
//! - **Process execution**: captured and streaming command execution
//! - **Shell splitting**: tokenizing the raw `arguments` input
//! - **File scanning**: glob + modification-time file discovery
//! - **Configuration**: step inputs, TOML defaults, and validation

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod file_scanner;
pub mod process;
pub mod shell;

pub use error::{Error, ErrorCode, Result, ResultExt};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{CacheLevel, Config, StepConfig, StepInputs};
    pub use crate::error::{exit_codes, Error, ErrorCode, Result, ResultExt};
    pub use crate::file_scanner::FileScanner;
}
