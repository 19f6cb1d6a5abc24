//! # Network Module (Unix)
//!
//! Non-blocking UDP endpoint shared by the input and output runloops, and a
//! small `poll(2)` helper for the paths that run without a reactor.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::Arc;

use box_protocol::{BoxError, MAX_DATAGRAM_SIZE};

use crate::transport::retry_eintr;

/// UDP socket for box traffic
pub struct UdpEndpoint {
    socket: Arc<UdpSocket>,
    recv_buffer: Vec<u8>,
}

impl UdpEndpoint {
    /// Bind and switch to non-blocking mode
    pub fn bind(addr: SocketAddr) -> Result<Self, BoxError> {
        log::info!("Binding UDP socket on {}", addr);
        let socket = UdpSocket::bind(addr)
            .map_err(|e| BoxError::Fatal(format!("cannot bind UDP {}: {}", addr, e)))?;
        socket.set_nonblocking(true)?;
        Ok(UdpEndpoint {
            socket: Arc::new(socket),
            recv_buffer: vec![0u8; MAX_DATAGRAM_SIZE],
        })
    }

    #[inline]
    pub fn fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Shared handle for the transport session and the output runloop
    pub fn socket(&self) -> Arc<UdpSocket> {
        self.socket.clone()
    }

    /// One datagram if any is queued
    pub fn try_recv(&mut self) -> io::Result<Option<(SocketAddr, Vec<u8>)>> {
        match retry_eintr(|| self.socket.recv_from(&mut self.recv_buffer)) {
            Ok((len, src)) => {
                log::trace!("Received {} bytes from {}", len, src);
                Ok(Some((src, self.recv_buffer[..len].to_vec())))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Wait up to `timeout_ms` for a datagram
    pub fn recv_timeout(&mut self, timeout_ms: i32) -> io::Result<Option<(SocketAddr, Vec<u8>)>> {
        if !poll_readable(self.fd(), timeout_ms)? {
            return Ok(None);
        }
        self.try_recv()
    }
}

/// Send a datagram on a shared socket
pub fn send_datagram(socket: &UdpSocket, bytes: &[u8], peer: SocketAddr) -> io::Result<usize> {
    let sent = retry_eintr(|| socket.send_to(bytes, peer))?;
    log::trace!("Sent {} bytes to {}", sent, peer);
    Ok(sent)
}

/// True when `fd` becomes readable within `timeout_ms`
pub fn poll_readable(fd: RawFd, timeout_ms: i32) -> io::Result<bool> {
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let result = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
    if result < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err);
    }
    Ok(result > 0 && pfd.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0)
}
