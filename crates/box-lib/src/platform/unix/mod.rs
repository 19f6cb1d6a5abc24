//! # Unix Platform Module
//!
//! Sockets, readiness, signals and runtime directories for Unix systems.

pub mod admin;
pub mod network;
pub mod process;
pub mod reactor;

pub use admin::{admin_reply, AdminListener, AdminRequest, AdminStatus, AdminThread};
pub use network::{poll_readable, send_datagram, UdpEndpoint};
pub use process::{
    ensure_private_dir, install_signal_handlers, is_root, is_running, received_signal,
    refuse_root, request_shutdown, restrict_file,
};
pub use reactor::Reactor;
