//! Step configuration: schema, defaults file loading and validation

mod loader;
mod schema;

pub use loader::{Config, DEFAULT_CONFIG_FILE};
pub use schema::*;
