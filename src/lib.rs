/// Core structs of the aggregator
pub mod aggregator_core;
pub use aggregator_core as core;

/// Command registry and the built-in commands
pub mod commands;
pub mod config;
pub mod error;
pub use error::{Error, Result};

/// Feed retrieval and decoding
pub mod fetch;
pub mod ingest;
pub mod middleware;
pub mod scheduler;
pub mod state;
/// Module with storage traits and their SQLite implementation
pub mod storage;
pub mod timestamp;
