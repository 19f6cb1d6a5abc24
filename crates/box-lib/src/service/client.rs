//! # Client
//!
//! Request/response driver for `boxd`. A client probes in cleartext,
//! optionally opens a secure session with the same `SecurityConfig` as the
//! server, then sends one request at a time and waits for the matching
//! reply. Each command travels over the transport its configuration names.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::Arc;

use box_core::{ClientConfig, TransportMode};
use box_protocol::{
    is_secure_frame, looks_like_v1, BoxError, Command, HelloPayload, ProtocolError, PutPayload,
    StatusCode, StatusPayload, V1Frame, MAX_DATAGRAM_SIZE, PROBE, SUPPORTED_VERSIONS,
};

use crate::transport::{retry_eintr, TransportSession};

/// Decoded server reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Hello(HelloPayload),
    Status(StatusPayload),
    Object(PutPayload),
}

impl Reply {
    fn from_frame(frame: &V1Frame) -> Result<Self, ProtocolError> {
        match frame.command {
            Command::Hello => Ok(Reply::Hello(frame.decode()?)),
            Command::Status => Ok(Reply::Status(frame.decode()?)),
            Command::Put => Ok(Reply::Object(frame.decode()?)),
            _ => Err(ProtocolError::MalformedPayload("reply")),
        }
    }

    /// Status code carried by the reply
    pub fn status(&self) -> StatusCode {
        match self {
            Reply::Hello(hello) => hello.status,
            Reply::Status(status) => status.status,
            Reply::Object(_) => StatusCode::Ok,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status() == StatusCode::Ok
    }
}

pub struct Client {
    config: ClientConfig,
    socket: Arc<UdpSocket>,
    server: SocketAddr,
    session: Option<TransportSession>,
    next_request_id: u64,
    recv_buffer: Vec<u8>,
}

impl Client {
    /// Bind an ephemeral socket facing the configured server
    pub fn connect(config: ClientConfig) -> Result<Self, BoxError> {
        let server = config.server_addr()?;
        let local = match server.ip() {
            IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let socket = UdpSocket::bind(local)?;
        socket.set_read_timeout(Some(config.timeout))?;
        log::debug!("Client bound to {}, server {}", socket.local_addr()?, server);

        Ok(Client {
            config,
            socket: Arc::new(socket),
            server,
            session: None,
            next_request_id: 1,
            recv_buffer: vec![0u8; MAX_DATAGRAM_SIZE],
        })
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Send the cleartext probe and wait for the server's HELLO
    pub fn probe(&mut self) -> Result<HelloPayload, BoxError> {
        retry_eintr(|| self.socket.send_to(PROBE, self.server))?;
        let frame = self.recv_frame(|frame| frame.command == Command::Hello)?;
        let hello: HelloPayload = frame.decode()?;
        log::debug!("Server speaks versions {:?}", hello.versions);
        Ok(hello)
    }

    /// Derive the session key and bind a secure session to the server
    pub fn establish_session(&mut self) -> Result<(), BoxError> {
        if self.session.is_none() {
            let session =
                TransportSession::new(self.socket.clone(), self.server, &self.config.security)?;
            self.session = Some(session);
        }
        Ok(())
    }

    /// Exchange HELLO over the default transport
    pub fn hello(&mut self) -> Result<Reply, BoxError> {
        let id = self.take_request_id();
        let frame = V1Frame::hello(id, StatusCode::Ok, SUPPORTED_VERSIONS)?;
        self.request(frame, self.config.transport)
    }

    /// STATUS request; a healthy server answers `pong`
    pub fn ping(&mut self) -> Result<Reply, BoxError> {
        let id = self.take_request_id();
        let frame = V1Frame::new(Command::Status, id, Vec::new());
        self.request(frame, self.config.status_transport())
    }

    pub fn put(&mut self, queue: &str, content_type: &str, data: &[u8]) -> Result<Reply, BoxError> {
        let id = self.take_request_id();
        let frame = V1Frame::put(id, queue, content_type, data)?;
        self.request(frame, self.config.put_transport())
    }

    pub fn get(&mut self, queue: &str) -> Result<Reply, BoxError> {
        let id = self.take_request_id();
        let frame = V1Frame::get(id, queue)?;
        self.request(frame, self.config.get_transport())
    }

    pub fn delete(&mut self, queue: &str) -> Result<Reply, BoxError> {
        let id = self.take_request_id();
        let frame = V1Frame::delete(id, queue)?;
        self.request(frame, self.config.get_transport())
    }

    /// Send one frame over `transport` and wait for the reply to it
    pub fn request(&mut self, frame: V1Frame, transport: TransportMode) -> Result<Reply, BoxError> {
        let expected = frame.request_id.wrapping_add(1);
        let packed = frame.pack()?;
        log::debug!("{} #{} via {:?}", frame.command, frame.request_id, transport);

        match transport {
            TransportMode::Clear => {
                retry_eintr(|| self.socket.send_to(&packed, self.server))?;
            }
            TransportMode::Noise => {
                self.establish_session()?;
                if let Some(ref mut session) = self.session {
                    session.send(&packed)?;
                }
            }
        }

        let reply = self.recv_frame(|reply| reply.request_id == expected)?;
        Ok(Reply::from_frame(&reply)?)
    }

    fn take_request_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(2);
        id
    }

    /// Next v1 frame from the server accepted by `wanted`
    fn recv_frame(&mut self, wanted: impl Fn(&V1Frame) -> bool) -> Result<V1Frame, BoxError> {
        loop {
            let (len, from) = match retry_eintr(|| self.socket.recv_from(&mut self.recv_buffer)) {
                Ok(received) => received,
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut =>
                {
                    return Err(BoxError::Io(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("no reply from {} within {:?}", self.server, self.config.timeout),
                    )));
                }
                Err(e) => return Err(e.into()),
            };
            if from != self.server {
                log::debug!("Ignoring datagram from {}", from);
                continue;
            }

            let datagram = &self.recv_buffer[..len];
            let plaintext = match self.session {
                Some(ref mut session) if is_secure_frame(datagram) => match session.open(datagram) {
                    Ok(plaintext) => plaintext,
                    Err(e) => {
                        log::warn!("Dropping secure reply: {}", e);
                        continue;
                    }
                },
                _ => datagram.to_vec(),
            };
            if !looks_like_v1(&plaintext) {
                log::debug!("Skipping {} byte non-v1 datagram", plaintext.len());
                continue;
            }

            match V1Frame::unpack(&plaintext) {
                Ok(frame) if wanted(&frame) => return Ok(frame),
                Ok(frame) => log::debug!("Skipping stale reply #{}", frame.request_id),
                Err(e) => log::debug!("Skipping undecodable reply: {}", e),
            }
        }
    }

    /// Drop the session and socket
    pub fn close(self) {
        if let Some(session) = self.session {
            session.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_reply_status() {
        let reply = Reply::Status(StatusPayload {
            status: StatusCode::BadRequest,
            message: "not-found".into(),
        });
        assert!(!reply.is_ok());
        let reply = Reply::Object(PutPayload {
            queue: "q".into(),
            content_type: "t".into(),
            data: vec![],
        });
        assert!(reply.is_ok());
    }

    #[test]
    fn test_timeout_without_server() {
        let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut config = ClientConfig::new("127.0.0.1", silent.local_addr().unwrap().port());
        config.timeout = Duration::from_millis(50);
        let mut client = Client::connect(config).unwrap();
        match client.probe() {
            Err(BoxError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::TimedOut),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_non_v1_datagrams_skipped() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut config = ClientConfig::new("127.0.0.1", server.local_addr().unwrap().port());
        config.timeout = Duration::from_millis(500);
        let mut client = Client::connect(config).unwrap();

        let responder = std::thread::spawn(move || {
            let mut buf = [0u8; 64];
            let (_, from) = server.recv_from(&mut buf).unwrap();
            server.send_to(b"hello", from).unwrap();
            let hello = V1Frame::hello(1, StatusCode::Ok, &[1]).unwrap().pack().unwrap();
            server.send_to(&hello, from).unwrap();
        });

        let hello = client.probe().unwrap();
        assert_eq!(hello.versions, vec![1]);
        responder.join().unwrap();
    }

    #[test]
    fn test_request_ids_advance() {
        let mut client = Client::connect(ClientConfig::new("127.0.0.1", 9)).unwrap();
        assert_eq!(client.take_request_id(), 1);
        assert_eq!(client.take_request_id(), 3);
    }
}
