//! CLI utilities for the Android build-for-test step
//!
//! Provides shared CLI functionality:
//! - Step log formatting
//! - Progress spinners

#![warn(missing_docs)]

pub mod output;
pub mod progress;
