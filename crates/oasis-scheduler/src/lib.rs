//! Scheduled-action service: polls the store for due rows, runs their
//! tool calls, synthesises a report, and advances `next_run`.

pub mod service;

pub use service::{ActionNotifier, SchedulerService};
