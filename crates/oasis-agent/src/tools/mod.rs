//! Agent tools: the trait, the registry, and the concrete tool suite.

pub mod base;
pub mod code;
pub mod memory;
pub mod registry;
pub mod schedule;
pub mod skill;
pub mod web;

pub use base::Tool;
pub use registry::ToolRegistry;
