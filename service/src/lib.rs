//! Process-level infrastructure shared by the binaries: command line and
//! environment configuration, and console logging.

pub mod config;
pub mod logging;

pub use config::{BackoffKind, Config, RustEnv};
