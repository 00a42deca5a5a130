//! Data models for the question bank.
//!
//! Field names serialize in camelCase to match the web client.

mod question;
mod search;
mod topic;

pub use question::*;
pub use search::*;
pub use topic::*;
