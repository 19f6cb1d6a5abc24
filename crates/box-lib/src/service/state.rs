//! # Server State Machine
//!
//! Turns one received datagram into at most one reply. The first datagram
//! from a peer (normally the cleartext probe) is answered with HELLO and
//! moves the session to `Ready`; from then on datagrams are decoded as v1
//! frames and a repeated probe is answered with HELLO again. Every reply
//! carries the request id plus one.
//!
//! The machine owns no sockets. The caller tells it which channel the
//! datagram arrived on and sends the reply back over the same channel.

use std::net::SocketAddr;
use std::sync::Arc;

use box_core::{ProtocolMode, ServerConfig, Store, TransportMode};
use box_protocol::{
    Command, HelloPayload, ProtocolError, PutPayload, QueuePayload, StatusCode, V1Frame,
    MAX_UDP_PAYLOAD, PROBE, SECURE_MAX_PLAINTEXT, SUPPORTED_VERSIONS,
};

type Reply = Result<V1Frame, ProtocolError>;

/// Transport a datagram arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Clear,
    Secure,
}

impl Channel {
    /// Largest packed reply this channel can carry
    pub fn reply_limit(self) -> usize {
        match self {
            Channel::Clear => MAX_UDP_PAYLOAD,
            Channel::Secure => SECURE_MAX_PLAINTEXT,
        }
    }

    pub fn transport(self) -> TransportMode {
        match self {
            Channel::Clear => TransportMode::Clear,
            Channel::Secure => TransportMode::Noise,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Unhandshaken,
    Ready,
}

pub struct ServerStateMachine {
    phase: SessionPhase,
    config: Arc<ServerConfig>,
    store: Arc<Store>,
}

impl ServerStateMachine {
    pub fn new(config: Arc<ServerConfig>, store: Arc<Store>) -> Self {
        ServerStateMachine {
            phase: SessionPhase::Unhandshaken,
            config,
            store,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Packed reply for one datagram, if any
    pub fn handle(&mut self, peer: SocketAddr, datagram: &[u8], channel: Channel) -> Option<Vec<u8>> {
        if self.config.protocol == ProtocolMode::Simple {
            log::trace!("Echoing {} bytes to {}", datagram.len(), peer);
            return Some(datagram.to_vec());
        }

        let reply = match self.phase {
            SessionPhase::Unhandshaken => {
                log::debug!("Handshake with {} ({:?}), session ready", peer, channel);
                self.phase = SessionPhase::Ready;
                V1Frame::hello(1, StatusCode::Ok, SUPPORTED_VERSIONS)
            }
            SessionPhase::Ready => self.dispatch(peer, datagram, channel),
        };

        let frame = match reply {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("Failed to build reply for {}: {}", peer, e);
                return None;
            }
        };
        self.pack_within(frame, channel.reply_limit())
    }

    fn pack_within(&self, frame: V1Frame, limit: usize) -> Option<Vec<u8>> {
        let reply_id = frame.request_id;
        let packed = frame.pack().and_then(|bytes| {
            if bytes.len() <= limit {
                return Ok(bytes);
            }
            log::warn!("Reply of {} bytes exceeds {}; sending too-large", bytes.len(), limit);
            V1Frame::status(reply_id, StatusCode::TooLarge, "too-large")?.pack()
        });
        match packed {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                log::error!("Failed to pack reply: {}", e);
                None
            }
        }
    }

    fn dispatch(&self, peer: SocketAddr, datagram: &[u8], channel: Channel) -> Reply {
        if datagram == PROBE {
            log::debug!("Repeated probe from {}", peer);
            return V1Frame::hello(1, StatusCode::Ok, SUPPORTED_VERSIONS);
        }
        let frame = match V1Frame::unpack(datagram) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Malformed frame from {}: {}", peer, e);
                return V1Frame::status(1, StatusCode::BadRequest, "bad-frame");
            }
        };
        let id = frame.request_id.wrapping_add(1);
        log::debug!("{} #{} from {} ({:?})", frame.command, frame.request_id, peer, channel);

        if self.config.required_transport(frame.command) == TransportMode::Noise
            && channel.transport() != TransportMode::Noise
        {
            log::warn!("{} from {} refused: secure transport required", frame.command, peer);
            return V1Frame::status(id, StatusCode::Forbidden, "secure-transport-required");
        }

        match frame.command {
            Command::Hello => self.on_hello(&frame, id),
            Command::Put => self.on_put(&frame, id),
            Command::Get => self.on_get(&frame, id),
            Command::Delete => self.on_delete(&frame, id),
            Command::Status => {
                log::info!("Status request from {}", peer);
                V1Frame::status(id, StatusCode::Ok, "pong")
            }
            _ => V1Frame::status(id, StatusCode::BadRequest, "unknown-command"),
        }
    }

    fn on_hello(&self, frame: &V1Frame, id: u64) -> Reply {
        match frame.decode::<HelloPayload>() {
            Ok(hello) if SUPPORTED_VERSIONS.iter().any(|v| hello.supports(*v)) => {
                V1Frame::hello(id, StatusCode::Ok, SUPPORTED_VERSIONS)
            }
            Ok(hello) => {
                log::warn!("Client offered versions {:?}", hello.versions);
                V1Frame::status(id, StatusCode::BadRequest, "unsupported-version")
            }
            Err(_) => V1Frame::status(id, StatusCode::BadRequest, "bad-hello"),
        }
    }

    fn on_put(&self, frame: &V1Frame, id: u64) -> Reply {
        match frame.decode::<PutPayload>() {
            Ok(put) => {
                self.store.put(&put.queue, &put.content_type, &put.data);
                log::debug!("Stored {} bytes in '{}'", put.data.len(), put.queue);
                V1Frame::status(id, StatusCode::Ok, "stored")
            }
            Err(_) => V1Frame::status(id, StatusCode::BadRequest, "bad-put"),
        }
    }

    fn on_get(&self, frame: &V1Frame, id: u64) -> Reply {
        let query = match frame.decode::<QueuePayload>() {
            Ok(query) => query,
            Err(_) => return V1Frame::status(id, StatusCode::BadRequest, "bad-get"),
        };
        self.store
            .get(&query.queue, |object| {
                V1Frame::put(id, &query.queue, &object.content_type, &object.bytes)
            })
            .unwrap_or_else(|| V1Frame::status(id, StatusCode::BadRequest, "not-found"))
    }

    fn on_delete(&self, frame: &V1Frame, id: u64) -> Reply {
        let query = match frame.decode::<QueuePayload>() {
            Ok(query) => query,
            Err(_) => return V1Frame::status(id, StatusCode::BadRequest, "bad-delete"),
        };
        match self.store.delete(&query.queue) {
            Some(_) => V1Frame::status(id, StatusCode::Ok, "deleted"),
            None => V1Frame::status(id, StatusCode::BadRequest, "not-found"),
        }
    }
}
