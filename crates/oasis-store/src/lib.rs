//! Storage layer: the `Store` trait with its optional keyword-search and
//! graph capabilities, and the embedded SQLite adapter.

pub mod error;
pub mod filter;
pub mod keyword;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use error::StoreError;
pub use filter::{ChunkFilter, FilterField, FilterOp};
pub use sqlite::SqliteStore;
pub use traits::{GraphStore, KeywordSearch, Scored, Store};
