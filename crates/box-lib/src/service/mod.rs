//! # Service Module
//!
//! Server state machine and runtime, and the matching client.

pub mod client;
pub mod state;

#[cfg(unix)]
pub mod events;
#[cfg(unix)]
pub mod server;

pub use client::{Client, Reply};
pub use state::{Channel, ServerStateMachine, SessionPhase};

#[cfg(unix)]
pub use events::{InputEvent, MainEvent, OutputEvent};
#[cfg(unix)]
pub use server::Server;
