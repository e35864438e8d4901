//! Logging utilities.
//!
//! Library code logs through the `log` facade only; this module wires up the
//! `env_logger` backend for binaries and tests that want output.

mod init;

pub use init::{init_logging, LoggingConfig};
