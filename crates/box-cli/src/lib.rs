//! # box-cli
//!
//! Command-line front ends for the box queue service: the `boxd` server
//! and the `box` client.

pub mod cli;
