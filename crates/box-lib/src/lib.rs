//! # box-lib
//!
//! Runtime library for the box queue service.
//!
//! This crate provides:
//! - Secure datagram transport (session, sending and receiving halves)
//! - Bounded event runloops with an optional readiness reactor
//! - Platform-specific implementations (UDP, admin socket, signals)
//! - The `boxd` server runtime and the client

pub mod service;
pub mod transport;

#[cfg(unix)]
pub mod platform;
#[cfg(unix)]
pub mod runloop;

/// Version reported by the admin channel
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export commonly used types
pub use service::{Channel, Client, Reply, ServerStateMachine, SessionPhase};
pub use transport::{retry_eintr, TransportReceiver, TransportSender, TransportSession};

#[cfg(unix)]
pub use platform::{
    install_signal_handlers, is_running, received_signal, refuse_root, request_shutdown,
    AdminListener, Reactor, UdpEndpoint,
};
#[cfg(unix)]
pub use runloop::{Phase, PostError, Runloop, RunloopHandle};
#[cfg(unix)]
pub use service::Server;
