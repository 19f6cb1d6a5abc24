//! # Platform Module
//!
//! Platform-specific implementations with conditional compilation.

#[cfg(unix)]
pub mod unix;

#[cfg(unix)]
pub use unix::*;
