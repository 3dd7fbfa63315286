//! Core building blocks shared by every Oasis crate: chat wire types,
//! persisted entity models, configuration, and small utilities.

pub mod config;
pub mod model;
pub mod schedule;
pub mod types;
pub mod utils;
