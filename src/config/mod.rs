//! # Configuration Management
//!
//! Settings for a sync run come from command-line flags, each of which can
//! also be supplied through an environment variable (see [`crate::cli`]).
//! Boolean switches are read with [`env_flag`], which only accepts the usual
//! spellings of true.

pub mod settings;

pub use settings::{env_flag, parse_truthy, SyncConfig, SyncContext};
