//! POSIX-shell style word splitting
//!
//! Turns a raw `arguments` string into the argv tokens forwarded to Gradle.
//! Supports single quotes, double quotes and backslash escapes; no variable
//! expansion or globbing is performed.

use crate::error::{Error, Result};

/// Split `input` into words the way `sh` would.
///
/// ```
/// use testpair_core::shell::split;
///
/// let args = split(r#"--stacktrace -Pmsg="hello world" 'a b'"#).unwrap();
/// assert_eq!(args, vec!["--stacktrace", "-Pmsg=hello world", "a b"]);
/// ```
pub fn split(input: &str) -> Result<Vec<String>> {
    shell_words::split(input).map_err(|e| {
        Error::argument_parse(format!("Invalid arguments: {}", e))
            .with_context(format!("arguments: {}", input))
            .with_source(e)
    })
}
