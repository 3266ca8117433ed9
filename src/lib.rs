//! Felix - TCP file server with a bounded in-memory content cache
//!
//! This library provides the core functionality for the Felix server and
//! client: the LRU file-content cache with staleness detection, the wire
//! protocol, the serving loop, configuration, and logging.

pub mod cache_types;
pub mod cache_validator;
pub mod client;
pub mod config;
pub mod error;
pub mod eviction;
pub mod file_cache;
pub mod file_metadata;
pub mod logging;
pub mod protocol;
pub mod ram_cache;
pub mod server;
pub mod shutdown;

pub use error::{FelixError, Result};
pub use file_cache::FileCache;
pub use file_metadata::FileMetadata;
