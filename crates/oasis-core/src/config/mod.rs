//! Configuration — typed schema plus JSON file/env loading.

pub mod loader;
pub mod schema;

pub use loader::{load_config, save_config};
pub use schema::Config;
