//! # Observability Infrastructure
//!
//! Structured logging through `tracing`, with text or JSON output on stderr.

pub mod logging;

pub use logging::{default_directives, init_logging, LogFormat};
