//! # Error Handling
//!
//! Custom error types for the sync pipeline, built on `thiserror`.

pub mod types;

pub use types::{Result, SyncError};
