//! Core types for benchlog.
//!
//! Holds the data model shared by every crate in the workspace: prompt
//! catalog entries, model families, benchmark log records, and the
//! process-wide configuration.

pub mod config;
pub mod error;
pub mod family;
pub mod types;

pub use config::*;
pub use error::{CoreError, Result};
pub use family::{ModelDescriptor, ModelFamily};
pub use types::{BenchmarkRecord, LogKey, PromptEntry, Rating};
