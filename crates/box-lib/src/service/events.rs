//! Events exchanged between the server's runloops.
//!
//! Every payload is owned; it moves with the event and is dropped after
//! the handler returns or when a runloop discards its queue.

use std::fmt;
use std::net::SocketAddr;

use crate::platform::AdminRequest;
use crate::transport::TransportSender;

/// Network-input runloop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// The UDP socket became readable (reactor template)
    Readable,
    /// Poll once for a datagram and re-post (no reactor)
    DrainOne,
}

/// Main runloop
#[derive(Debug)]
pub enum MainEvent {
    /// Cleartext datagram
    Datagram { peer: SocketAddr, bytes: Vec<u8> },
    /// Decrypted secure datagram
    Plaintext { peer: SocketAddr, bytes: Vec<u8> },
    Admin(AdminRequest),
}

/// Network-output runloop
pub enum OutputEvent {
    SendClear { peer: SocketAddr, bytes: Vec<u8> },
    /// Encrypt for the session peer
    SendSecure { bytes: Vec<u8> },
    /// Hand the sending half of a new session to the output thread
    Attach(TransportSender),
}

impl fmt::Debug for OutputEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputEvent::SendClear { peer, bytes } => f
                .debug_struct("SendClear")
                .field("peer", peer)
                .field("len", &bytes.len())
                .finish(),
            OutputEvent::SendSecure { bytes } => f
                .debug_struct("SendSecure")
                .field("len", &bytes.len())
                .finish(),
            OutputEvent::Attach(sender) => f.debug_tuple("Attach").field(&sender.peer()).finish(),
        }
    }
}
