//! # V1 Frames
//!
//! Fixed-header request/response framing used above the transport.
//!
//! ```text
//! ┌───────┬─────────┬──────────────┬──────────┬──────────────┬─────────────┐
//! │ Magic │ Version │  Remainder   │ Command  │  Request ID  │   Payload   │
//! │ (1)   │  (1)    │  (4, be)     │ (4, be)  │   (8, be)    │ (rem - 16)  │
//! └───────┴─────────┴──────────────┴──────────┴──────────────┴─────────────┘
//! ```
//!
//! `remainder` counts itself, the command, the request id and the payload,
//! so a frame occupies exactly `remainder + 2` bytes.

use crate::constants::{V1_HEADER_SIZE, V1_MAGIC, V1_MAX_PAYLOAD, V1_REMAINDER_OVERHEAD, V1_VERSION};
use crate::error::ProtocolError;
use crate::payload::{HelloPayload, Payload, PutPayload, QueuePayload, StatusPayload};

type Result<T> = std::result::Result<T, ProtocolError>;

/// Command codes carried in the frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Hello,
    Put,
    Get,
    Delete,
    Status,
    Search,
    Bye,
    /// Any code this implementation does not know
    Other(u32),
}

impl Command {
    #[inline]
    pub fn from_u32(code: u32) -> Self {
        match code {
            1 => Command::Hello,
            2 => Command::Put,
            3 => Command::Get,
            4 => Command::Delete,
            5 => Command::Status,
            6 => Command::Search,
            7 => Command::Bye,
            other => Command::Other(other),
        }
    }

    #[inline]
    pub fn code(self) -> u32 {
        match self {
            Command::Hello => 1,
            Command::Put => 2,
            Command::Get => 3,
            Command::Delete => 4,
            Command::Status => 5,
            Command::Search => 6,
            Command::Bye => 7,
            Command::Other(code) => code,
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Hello => f.write_str("HELLO"),
            Command::Put => f.write_str("PUT"),
            Command::Get => f.write_str("GET"),
            Command::Delete => f.write_str("DELETE"),
            Command::Status => f.write_str("STATUS"),
            Command::Search => f.write_str("SEARCH"),
            Command::Bye => f.write_str("BYE"),
            Command::Other(code) => write!(f, "command {}", code),
        }
    }
}

/// Status codes shared by HELLO and STATUS payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StatusCode {
    Ok = 0,
    Unauthorized = 1,
    Forbidden = 2,
    NotFound = 3,
    Conflict = 4,
    BadRequest = 5,
    TooLarge = 6,
    RateLimited = 7,
    Internal = 8,
}

impl StatusCode {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(StatusCode::Ok),
            1 => Ok(StatusCode::Unauthorized),
            2 => Ok(StatusCode::Forbidden),
            3 => Ok(StatusCode::NotFound),
            4 => Ok(StatusCode::Conflict),
            5 => Ok(StatusCode::BadRequest),
            6 => Ok(StatusCode::TooLarge),
            7 => Ok(StatusCode::RateLimited),
            8 => Ok(StatusCode::Internal),
            other => Err(ProtocolError::UnknownStatus(other)),
        }
    }

    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StatusCode::Ok => "OK",
            StatusCode::Unauthorized => "UNAUTHORIZED",
            StatusCode::Forbidden => "FORBIDDEN",
            StatusCode::NotFound => "NOT_FOUND",
            StatusCode::Conflict => "CONFLICT",
            StatusCode::BadRequest => "BAD_REQUEST",
            StatusCode::TooLarge => "TOO_LARGE",
            StatusCode::RateLimited => "RATE_LIMITED",
            StatusCode::Internal => "INTERNAL",
        };
        f.write_str(name)
    }
}

/// One decoded v1 frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V1Frame {
    pub command: Command,
    pub request_id: u64,
    pub payload: Vec<u8>,
}

impl V1Frame {
    pub fn new(command: Command, request_id: u64, payload: Vec<u8>) -> Self {
        V1Frame {
            command,
            request_id,
            payload,
        }
    }

    /// Build a frame around an encoded payload
    pub fn with_payload<P: Payload>(command: Command, request_id: u64, payload: &P) -> Result<Self> {
        Ok(V1Frame::new(command, request_id, payload.to_bytes()?))
    }

    /// HELLO carrying `versions`
    ///
    /// The remainder field counts command, request id and payload, so
    /// `hello(1, Ok, &[1])` packs to 22 bytes with remainder `0x14`:
    /// `42 01 | 00 00 00 14 | 00 00 00 01 | 00 .. 01 | 00 | 00 01 | 00 01`.
    pub fn hello(request_id: u64, status: StatusCode, versions: &[u16]) -> Result<Self> {
        let payload = HelloPayload {
            status,
            versions: versions.to_vec(),
        };
        Self::with_payload(Command::Hello, request_id, &payload)
    }

    pub fn status(request_id: u64, status: StatusCode, message: &str) -> Result<Self> {
        let payload = StatusPayload {
            status,
            message: message.to_string(),
        };
        Self::with_payload(Command::Status, request_id, &payload)
    }

    pub fn put(request_id: u64, queue: &str, content_type: &str, data: &[u8]) -> Result<Self> {
        let payload = PutPayload {
            queue: queue.to_string(),
            content_type: content_type.to_string(),
            data: data.to_vec(),
        };
        Self::with_payload(Command::Put, request_id, &payload)
    }

    pub fn get(request_id: u64, queue: &str) -> Result<Self> {
        Self::with_payload(Command::Get, request_id, &QueuePayload::new(queue))
    }

    pub fn delete(request_id: u64, queue: &str) -> Result<Self> {
        Self::with_payload(Command::Delete, request_id, &QueuePayload::new(queue))
    }

    /// Total packed size in bytes
    #[inline]
    pub fn packed_len(&self) -> usize {
        V1_HEADER_SIZE + self.payload.len()
    }

    /// Pack into an existing buffer, returning the bytes written
    pub fn pack_into(&self, buf: &mut [u8]) -> Result<usize> {
        if self.payload.len() > V1_MAX_PAYLOAD {
            return Err(ProtocolError::PayloadTooLarge(self.payload.len()));
        }
        let needed = self.packed_len();
        if buf.len() < needed {
            return Err(ProtocolError::BufferTooSmall {
                needed,
                available: buf.len(),
            });
        }

        // command + request id + payload; see `hello` for the 22-byte HELLO
        let remainder = (V1_REMAINDER_OVERHEAD + self.payload.len()) as u32;
        buf[0] = V1_MAGIC;
        buf[1] = V1_VERSION;
        buf[2..6].copy_from_slice(&remainder.to_be_bytes());
        buf[6..10].copy_from_slice(&self.command.code().to_be_bytes());
        buf[10..18].copy_from_slice(&self.request_id.to_be_bytes());
        buf[V1_HEADER_SIZE..needed].copy_from_slice(&self.payload);
        Ok(needed)
    }

    /// Pack into a freshly allocated buffer
    pub fn pack(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.packed_len()];
        self.pack_into(&mut buf)?;
        Ok(buf)
    }

    /// Unpack one frame; bytes past the declared length are ignored
    pub fn unpack(buf: &[u8]) -> Result<Self> {
        if buf.len() < V1_HEADER_SIZE {
            return Err(ProtocolError::TooShort {
                min: V1_HEADER_SIZE,
                got: buf.len(),
            });
        }
        if buf[0] != V1_MAGIC {
            return Err(ProtocolError::BadMagic(buf[0]));
        }
        if buf[1] != V1_VERSION {
            return Err(ProtocolError::BadVersion(buf[1]));
        }

        let remainder = u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]) as usize;
        if remainder < V1_REMAINDER_OVERHEAD {
            return Err(ProtocolError::TooShort {
                min: V1_REMAINDER_OVERHEAD,
                got: remainder,
            });
        }
        let total = remainder + 2;
        if buf.len() < total {
            return Err(ProtocolError::Truncated {
                declared: total,
                got: buf.len(),
            });
        }

        let command = Command::from_u32(u32::from_be_bytes([buf[6], buf[7], buf[8], buf[9]]));
        let mut id = [0u8; 8];
        id.copy_from_slice(&buf[10..18]);

        Ok(V1Frame {
            command,
            request_id: u64::from_be_bytes(id),
            payload: buf[V1_HEADER_SIZE..total].to_vec(),
        })
    }

    /// Decode the payload as `P`
    pub fn decode<P: Payload>(&self) -> Result<P> {
        P::decode(&self.payload)
    }
}

/// Cheap check used to route datagrams before a full unpack
#[inline]
pub fn looks_like_v1(buf: &[u8]) -> bool {
    buf.len() >= 2 && buf[0] == V1_MAGIC && buf[1] == V1_VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hello_layout() {
        let frame = V1Frame::hello(1, StatusCode::Ok, &[1]).unwrap();
        let bytes = frame.pack().unwrap();
        assert_eq!(
            bytes,
            vec![
                0x42, 0x01, 0x00, 0x00, 0x00, 0x14, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
                0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x01
            ]
        );
    }

    #[test]
    fn test_frame_roundtrip() {
        let frame = V1Frame::new(Command::Other(999), 30, Vec::new());
        let bytes = frame.pack().unwrap();
        assert_eq!(bytes.len(), V1_HEADER_SIZE);
        assert_eq!(V1Frame::unpack(&bytes).unwrap(), frame);
    }

    #[test]
    fn test_unpack_rejects_short() {
        assert_eq!(
            V1Frame::unpack(&[0x42, 0x01, 0x00]),
            Err(ProtocolError::TooShort { min: 18, got: 3 })
        );
    }

    #[test]
    fn test_unpack_rejects_magic_and_version() {
        let mut bytes = V1Frame::new(Command::Status, 1, vec![0]).pack().unwrap();
        bytes[0] = 0x43;
        assert_eq!(V1Frame::unpack(&bytes), Err(ProtocolError::BadMagic(0x43)));
        bytes[0] = 0x42;
        bytes[1] = 0x02;
        assert_eq!(V1Frame::unpack(&bytes), Err(ProtocolError::BadVersion(0x02)));
    }

    #[test]
    fn test_unpack_rejects_truncated() {
        let bytes = V1Frame::new(Command::Put, 5, vec![1, 2, 3, 4]).pack().unwrap();
        let err = V1Frame::unpack(&bytes[..bytes.len() - 1]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::Truncated {
                declared: 22,
                got: 21
            }
        );
    }

    #[test]
    fn test_unpack_ignores_trailing_bytes() {
        let mut bytes = V1Frame::new(Command::Get, 9, vec![7]).pack().unwrap();
        bytes.extend_from_slice(b"junk");
        let frame = V1Frame::unpack(&bytes).unwrap();
        assert_eq!(frame.payload, vec![7]);
    }

    #[test]
    fn test_pack_into_small_buffer() {
        let frame = V1Frame::new(Command::Get, 9, vec![7, 7]);
        let mut buf = [0u8; 19];
        assert_eq!(
            frame.pack_into(&mut buf),
            Err(ProtocolError::BufferTooSmall {
                needed: 20,
                available: 19
            })
        );
    }

    #[test]
    fn test_command_codes() {
        for code in 0..10u32 {
            assert_eq!(Command::from_u32(code).code(), code);
        }
        assert_eq!(Command::from_u32(999), Command::Other(999));
    }
}
