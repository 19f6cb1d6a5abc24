//! # CLI Module
//!
//! Argument parsing, logging setup and terminal output shared by both
//! binaries.

pub mod client;
pub mod logging;
pub mod output;
pub mod server;

/// Exit status for configuration and flag errors
pub const EXIT_CONFIG: i32 = 2;
/// Exit status for any other failure
pub const EXIT_FAILURE: i32 = 1;

/// `--port` values must lie in (0, 65536)
pub fn parse_port_arg(s: &str) -> Result<u16, String> {
    box_core::config::parse_port(s).map_err(|e| e.to_string())
}
