//! Domain services sitting between the HTTP handlers and the datastore.
//!
//! Reads go through the shared [`ReadCache`](crate::cache::ReadCache); writes
//! go through the retry wrapper and invalidate the cache on success.

mod questions;
mod topics;

pub use questions::*;
pub use topics::*;
