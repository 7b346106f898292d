//! # In-Memory Data-Structure Store Engine
//!
//! The polymorphic collection-value engine of an in-memory key-value
//! store: hashes, lists and sorted sets that each switch transparently
//! from a compact packed representation to an indexed one as they grow.
//!
//! ## Core idea
//! Small collections live in a single contiguous byte buffer — cheap to
//! allocate, cache-friendly, O(n) over a tiny n. Past a configured
//! threshold each collection converts once to an indexed structure
//! (hash table, skip list + member map, segmented list) and stays there.
//! Commands never see the difference.

pub mod blocking;
pub mod commands;
pub mod config;
pub mod db;
pub mod dict;
pub mod error;
pub mod hash;
pub mod list;
pub mod num;
pub mod packed;
pub mod reply;
pub mod seglist;
pub mod server;
pub mod set;
pub mod skiplist;
pub mod value;
pub mod zset;

// Public re-exports for the top-level API
pub use config::Config;
pub use error::{Error, Result};
pub use reply::Reply;
pub use server::Server;
