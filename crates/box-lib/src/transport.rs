//! # Secure Transport
//!
//! One peer, one session key. Outgoing frames use `local_salt || counter`
//! nonces with a strictly increasing counter starting at 1; incoming frames
//! are bound to the first salt that authenticates and filtered through a
//! 64-counter replay window.
//!
//! A session can be split into a sending half and a receiving half so the
//! output thread encrypts and the input thread decrypts without sharing
//! mutable state. Key material is zeroed when the last half is dropped.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use zeroize::Zeroizing;

use box_core::crypto::{self, random_array, XChaCha20Poly1305};
use box_core::SecurityConfig;
use box_protocol::secure::frame_len;
use box_protocol::{
    build_nonce, BoxError, ReplayWindow, SecureFrame, TransportError, INITIAL_COUNTER, KEY_SIZE,
    MAX_DATAGRAM_SIZE, NONCE_SIZE, SALT_SIZE, SECURE_HEADER, SECURE_HEADER_SIZE,
};

type SessionKey = Arc<Zeroizing<[u8; KEY_SIZE]>>;

/// Retry a socket call until it is not interrupted by a signal
#[inline]
pub fn retry_eintr<T>(mut f: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    loop {
        match f() {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SESSION
// ═══════════════════════════════════════════════════════════════════════════

pub struct TransportSession {
    tx: TransportSender,
    rx: TransportReceiver,
    transcript_hash: [u8; 32],
}

impl TransportSession {
    /// Derive keys from `security` and bind to `peer`
    pub fn new(
        socket: Arc<UdpSocket>,
        peer: SocketAddr,
        security: &SecurityConfig,
    ) -> Result<Self, BoxError> {
        let keys = crypto::derive(security)?;
        let key: Option<SessionKey> = keys.session_key.map(Arc::new);
        if key.is_none() {
            log::warn!("No secret material configured; secure session to {} is inert", peer);
        }

        let local_salt: [u8; SALT_SIZE] = random_array();
        log::debug!("Secure session with {} ({:?})", peer, security.pattern);

        Ok(TransportSession {
            tx: TransportSender {
                socket: socket.clone(),
                peer,
                key: key.clone(),
                local_salt,
                next_counter: INITIAL_COUNTER,
                #[cfg(feature = "replay-hook")]
                last_frame: None,
                #[cfg(feature = "replay-hook")]
                replay_frame: None,
            },
            rx: TransportReceiver {
                socket,
                peer,
                key,
                peer_salt: None,
                window: ReplayWindow::new(),
                recv_buffer: vec![0u8; MAX_DATAGRAM_SIZE],
            },
            transcript_hash: keys.transcript_hash,
        })
    }

    #[inline]
    pub fn has_key(&self) -> bool {
        self.tx.key.is_some()
    }

    pub fn peer(&self) -> SocketAddr {
        self.tx.peer
    }

    pub fn transcript_hash(&self) -> &[u8; 32] {
        &self.transcript_hash
    }

    pub fn sender(&mut self) -> &mut TransportSender {
        &mut self.tx
    }

    pub fn receiver(&mut self) -> &mut TransportReceiver {
        &mut self.rx
    }

    /// Encrypt and send one datagram
    pub fn send(&mut self, plaintext: &[u8]) -> Result<usize, TransportError> {
        self.tx.send(plaintext)
    }

    /// Build a frame without sending it
    pub fn seal(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, TransportError> {
        self.tx.seal(plaintext)
    }

    /// Receive and decrypt one datagram from the peer
    pub fn recv(&mut self) -> Result<Vec<u8>, TransportError> {
        self.rx.recv()
    }

    /// Decrypt a datagram obtained elsewhere
    pub fn open(&mut self, datagram: &[u8]) -> Result<Vec<u8>, TransportError> {
        self.rx.open(datagram)
    }

    pub fn split(self) -> (TransportSender, TransportReceiver) {
        (self.tx, self.rx)
    }

    /// Drop the session; key material is zeroed once both halves are gone
    pub fn close(self) {
        log::debug!("Closing secure session with {}", self.tx.peer);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SENDING HALF
// ═══════════════════════════════════════════════════════════════════════════

pub struct TransportSender {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    key: Option<SessionKey>,
    local_salt: [u8; SALT_SIZE],
    next_counter: u64,
    #[cfg(feature = "replay-hook")]
    last_frame: Option<Vec<u8>>,
    #[cfg(feature = "replay-hook")]
    replay_frame: Option<Vec<u8>>,
}

impl TransportSender {
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_salt(&self) -> &[u8; SALT_SIZE] {
        &self.local_salt
    }

    /// Counter the next frame will carry
    #[inline]
    pub fn next_counter(&self) -> u64 {
        self.next_counter
    }

    /// `header || nonce || ciphertext`, consuming one counter
    pub fn seal(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, TransportError> {
        let key = self.key.as_ref().ok_or(TransportError::NoSessionKey)?;
        let total = frame_len(plaintext.len())?;

        let counter = self.next_counter;
        let nonce = build_nonce(&self.local_salt, counter);

        let mut frame = vec![0u8; total];
        frame[..SECURE_HEADER_SIZE].copy_from_slice(&SECURE_HEADER);
        frame[SECURE_HEADER_SIZE..SECURE_HEADER_SIZE + NONCE_SIZE].copy_from_slice(&nonce);
        let body = SECURE_HEADER_SIZE + NONCE_SIZE;
        XChaCha20Poly1305::new(key)
            .encrypt_into(&nonce, &SECURE_HEADER, plaintext, &mut frame[body..])
            .map_err(|_| TransportError::AeadFailure)?;

        self.next_counter += 1;
        Ok(frame)
    }

    /// Seal and emit one datagram
    pub fn send(&mut self, plaintext: &[u8]) -> Result<usize, TransportError> {
        let frame = self.seal(plaintext)?;
        let sent = retry_eintr(|| self.socket.send_to(&frame, self.peer))?;
        log::trace!(
            "Sent secure frame #{} ({} bytes) to {}",
            self.next_counter - 1,
            sent,
            self.peer
        );
        #[cfg(feature = "replay-hook")]
        self.remember(frame);
        Ok(sent)
    }

    #[cfg(feature = "replay-hook")]
    fn remember(&mut self, frame: Vec<u8>) {
        self.replay_frame = self.last_frame.replace(frame);
    }

    /// Re-emit the last sent frame, or the one before it when `previous`.
    /// Counters and window state are untouched.
    #[cfg(feature = "replay-hook")]
    pub fn resend(&self, previous: bool) -> Result<usize, TransportError> {
        let frame = if previous {
            self.replay_frame.as_ref()
        } else {
            self.last_frame.as_ref()
        };
        match frame {
            Some(frame) => Ok(retry_eintr(|| self.socket.send_to(frame, self.peer))?),
            None => Err(TransportError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                "no frame to replay",
            ))),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// RECEIVING HALF
// ═══════════════════════════════════════════════════════════════════════════

pub struct TransportReceiver {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    key: Option<SessionKey>,
    peer_salt: Option<[u8; SALT_SIZE]>,
    window: ReplayWindow,
    recv_buffer: Vec<u8>,
}

impl TransportReceiver {
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn peer_salt(&self) -> Option<&[u8; SALT_SIZE]> {
        self.peer_salt.as_ref()
    }

    pub fn window(&self) -> &ReplayWindow {
        &self.window
    }

    /// Authenticate and decrypt one frame
    pub fn open(&mut self, datagram: &[u8]) -> Result<Vec<u8>, TransportError> {
        let key = self.key.as_ref().ok_or(TransportError::NoSessionKey)?;
        let frame = SecureFrame::parse(datagram)?;

        let salt = frame.salt();
        if let Some(ref expected) = self.peer_salt {
            if *expected != salt {
                return Err(TransportError::SaltMismatch);
            }
        }

        let counter = frame.counter();
        self.window.check(counter)?;

        let plaintext = XChaCha20Poly1305::new(key)
            .decrypt(frame.nonce, frame.header, frame.ciphertext)
            .map_err(|_| TransportError::AeadFailure)?;

        self.window.commit(counter);
        if self.peer_salt.is_none() {
            self.peer_salt = Some(salt);
        }
        log::trace!("Accepted secure frame #{} from {}", counter, self.peer);
        Ok(plaintext)
    }

    /// Read one datagram from the socket and open it
    pub fn recv(&mut self) -> Result<Vec<u8>, TransportError> {
        if self.key.is_none() {
            return Err(TransportError::NoSessionKey);
        }
        let (len, from) = retry_eintr(|| self.socket.recv_from(&mut self.recv_buffer))?;
        if from != self.peer {
            return Err(TransportError::UnexpectedPeer);
        }
        let datagram = self.recv_buffer[..len].to_vec();
        self.open(&datagram)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use box_protocol::{SECURE_MAX_FRAME, SECURE_MAX_PLAINTEXT, SECURE_MIN_FRAME};
    use std::time::Duration;

    fn pair(psk: &[u8]) -> (TransportSession, TransportSession) {
        let a = Arc::new(UdpSocket::bind("127.0.0.1:0").unwrap());
        let b = Arc::new(UdpSocket::bind("127.0.0.1:0").unwrap());
        for s in [&a, &b] {
            s.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        }
        let cfg = SecurityConfig::default().with_pre_shared_key(psk);
        let a_addr = a.local_addr().unwrap();
        let b_addr = b.local_addr().unwrap();
        (
            TransportSession::new(a, b_addr, &cfg).unwrap(),
            TransportSession::new(b, a_addr, &cfg).unwrap(),
        )
    }

    #[test]
    fn test_send_recv() {
        let (mut client, mut server) = pair(b"psk123");
        client.send(b"ping").unwrap();
        assert_eq!(server.recv().unwrap(), b"ping");
        server.send(b"pong").unwrap();
        assert_eq!(client.recv().unwrap(), b"pong");
        assert_eq!(client.transcript_hash(), server.transcript_hash());
    }

    #[test]
    fn test_frame_layout_and_counter() {
        let (mut client, _server) = pair(b"k");
        let salt = *client.sender().local_salt();
        let f1 = client.seal(b"ab").unwrap();
        let f2 = client.seal(b"ab").unwrap();

        assert_eq!(&f1[..4], b"NZ\x01\x00");
        assert_eq!(&f1[4..20], &salt);
        assert_eq!(&f1[20..28], &1u64.to_be_bytes());
        assert_eq!(&f2[20..28], &2u64.to_be_bytes());
        assert_eq!(f1.len(), SECURE_MIN_FRAME + 2);
        assert_eq!(client.sender().next_counter(), 3);
    }

    #[test]
    fn test_replay_rejected() {
        let (mut client, mut server) = pair(b"psk123");
        let frame = client.seal(b"ping").unwrap();
        assert_eq!(server.open(&frame).unwrap(), b"ping");
        let err = server.open(&frame).unwrap_err();
        assert!(matches!(err, TransportError::Replayed(1)));
        assert!(err.is_replay());
    }

    #[test]
    fn test_salt_binding() {
        let (mut client, mut server) = pair(b"k");
        let first = client.seal(b"one").unwrap();
        server.open(&first).unwrap();

        let mut forged = client.seal(b"two").unwrap();
        forged[4] ^= 0xff;
        assert!(matches!(server.open(&forged), Err(TransportError::SaltMismatch)));
        // the window did not move
        assert_eq!(server.receiver().window().max(), 1);
    }

    #[test]
    fn test_tamper_does_not_commit() {
        let (mut client, mut server) = pair(b"k");
        let mut frame = client.seal(b"data").unwrap();
        let last = frame.len() - 1;
        frame[last] ^= 1;
        assert!(matches!(server.open(&frame), Err(TransportError::AeadFailure)));
        assert_eq!(server.receiver().window().max(), 0);
        assert!(server.receiver().peer_salt().is_none());

        frame[last] ^= 1;
        assert_eq!(server.open(&frame).unwrap(), b"data");
    }

    #[test]
    fn test_wrong_key() {
        let (mut client, _) = pair(b"one");
        let (_, mut server) = pair(b"two");
        let frame = client.seal(b"x").unwrap();
        assert!(matches!(server.open(&frame), Err(TransportError::AeadFailure)));
    }

    #[test]
    fn test_bad_header_and_short() {
        let (_, mut server) = pair(b"k");
        assert!(matches!(server.open(&[0u8; 10]), Err(TransportError::BadHeader)));
        let mut frame = vec![0u8; SECURE_MIN_FRAME];
        frame[..3].copy_from_slice(b"NX\x01");
        assert!(matches!(server.open(&frame), Err(TransportError::BadHeader)));
    }

    #[test]
    fn test_size_limit() {
        let (mut client, _) = pair(b"k");
        let ok = client.seal(&vec![0u8; SECURE_MAX_PLAINTEXT]).unwrap();
        assert_eq!(ok.len(), SECURE_MAX_FRAME);
        assert!(matches!(
            client.seal(&vec![0u8; SECURE_MAX_PLAINTEXT + 1]),
            Err(TransportError::FrameTooLarge { .. })
        ));
        // a rejected frame does not burn a counter
        assert_eq!(client.sender().next_counter(), 2);
    }

    #[test]
    fn test_inert_session() {
        let sock = Arc::new(UdpSocket::bind("127.0.0.1:0").unwrap());
        let peer = sock.local_addr().unwrap();
        let mut session = TransportSession::new(sock, peer, &SecurityConfig::default()).unwrap();
        assert!(!session.has_key());
        assert!(matches!(session.send(b"x"), Err(TransportError::NoSessionKey)));
        assert!(matches!(session.recv(), Err(TransportError::NoSessionKey)));
    }

    #[test]
    fn test_split_halves() {
        let (client, mut server) = pair(b"k");
        let (mut tx, _rx) = client.split();
        tx.send(b"a").unwrap();
        tx.send(b"b").unwrap();
        assert_eq!(server.recv().unwrap(), b"a");
        assert_eq!(server.recv().unwrap(), b"b");
    }

    #[cfg(feature = "replay-hook")]
    #[test]
    fn test_replay_hook() {
        let (mut client, mut server) = pair(b"k");
        client.send(b"first").unwrap();
        client.send(b"second").unwrap();
        assert_eq!(server.recv().unwrap(), b"first");
        assert_eq!(server.recv().unwrap(), b"second");

        client.sender().resend(true).unwrap();
        assert!(matches!(server.recv(), Err(TransportError::Replayed(1))));
        client.sender().resend(false).unwrap();
        assert!(matches!(server.recv(), Err(TransportError::Replayed(2))));
        assert_eq!(client.sender().next_counter(), 3);
    }
}
