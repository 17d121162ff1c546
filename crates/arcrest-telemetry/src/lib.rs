//! Logging setup shared by the arcrest binaries.
//!
//! Subscribers write to stderr so command output on stdout stays parseable.

pub mod init;

pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, init_logging};
