//! CLI command implementations

pub mod catalog;
pub mod history;
pub mod rate;
pub mod review;
pub mod run;

/// Exit code when the configuration could not be loaded
pub const EXIT_CONFIGURATION: u8 = 78;

/// Exit code for a run where some pairs failed
pub const EXIT_PARTIAL_FAILURE: u8 = 2;
