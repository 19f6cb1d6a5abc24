//! # Payloads
//!
//! Command-specific payload layouts (all integers big-endian).
//!
//! ```text
//! HELLO   status(1) | count(1) | version(2) * count
//! PUT     queue_len(2) | queue | ctype_len(2) | ctype | data_len(4) | data
//! GET     queue_len(2) | queue
//! DELETE  queue_len(2) | queue
//! STATUS  status(1) | utf-8 message (rest of payload, may be empty)
//! ```

use crate::error::ProtocolError;
use crate::v1::StatusCode;

type Result<T> = std::result::Result<T, ProtocolError>;

/// A payload with a fixed binary layout
pub trait Payload: Sized {
    /// Name used in error messages
    const NAME: &'static str;

    fn encoded_len(&self) -> usize;

    /// Encode into `buf`, returning the bytes written
    fn encode_into(&self, buf: &mut [u8]) -> Result<usize>;

    /// Decode a whole payload; trailing bytes are malformed
    fn decode(buf: &[u8]) -> Result<Self>;

    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.encoded_len()];
        let n = self.encode_into(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CURSORS
// ═══════════════════════════════════════════════════════════════════════════

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    name: &'static str,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8], name: &'static str) -> Self {
        Reader { buf, pos: 0, name }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or(ProtocolError::MalformedPayload(self.name))?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn string(&mut self, len: usize) -> Result<String> {
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::MalformedPayload(self.name))
    }

    fn rest(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos..];
        self.pos = self.buf.len();
        out
    }

    fn finish(self) -> Result<()> {
        if self.pos == self.buf.len() {
            Ok(())
        } else {
            Err(ProtocolError::MalformedPayload(self.name))
        }
    }
}

struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    fn new(buf: &'a mut [u8], needed: usize) -> Result<Self> {
        if buf.len() < needed {
            return Err(ProtocolError::BufferTooSmall {
                needed,
                available: buf.len(),
            });
        }
        Ok(Writer { buf, pos: 0 })
    }

    fn put(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    fn u8(&mut self, v: u8) {
        self.put(&[v]);
    }

    fn u16(&mut self, v: u16) {
        self.put(&v.to_be_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.put(&v.to_be_bytes());
    }
}

fn short_len(s: &str) -> Result<u16> {
    u16::try_from(s.len()).map_err(|_| ProtocolError::PayloadTooLarge(s.len()))
}

// ═══════════════════════════════════════════════════════════════════════════
// HELLO
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloPayload {
    pub status: StatusCode,
    pub versions: Vec<u16>,
}

impl HelloPayload {
    pub fn supports(&self, version: u16) -> bool {
        self.versions.contains(&version)
    }
}

impl Payload for HelloPayload {
    const NAME: &'static str = "HELLO";

    fn encoded_len(&self) -> usize {
        2 + 2 * self.versions.len()
    }

    fn encode_into(&self, buf: &mut [u8]) -> Result<usize> {
        let count = u8::try_from(self.versions.len())
            .map_err(|_| ProtocolError::PayloadTooLarge(self.versions.len()))?;
        let mut w = Writer::new(buf, self.encoded_len())?;
        w.u8(self.status.as_u8());
        w.u8(count);
        for v in &self.versions {
            w.u16(*v);
        }
        Ok(w.pos)
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf, Self::NAME);
        let status = StatusCode::from_u8(r.u8()?).map_err(|_| ProtocolError::MalformedPayload(Self::NAME))?;
        let count = r.u8()? as usize;
        let mut versions = Vec::with_capacity(count);
        for _ in 0..count {
            versions.push(r.u16()?);
        }
        r.finish()?;
        Ok(HelloPayload { status, versions })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PUT
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutPayload {
    pub queue: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl Payload for PutPayload {
    const NAME: &'static str = "PUT";

    fn encoded_len(&self) -> usize {
        2 + self.queue.len() + 2 + self.content_type.len() + 4 + self.data.len()
    }

    fn encode_into(&self, buf: &mut [u8]) -> Result<usize> {
        let queue_len = short_len(&self.queue)?;
        let ctype_len = short_len(&self.content_type)?;
        let data_len =
            u32::try_from(self.data.len()).map_err(|_| ProtocolError::PayloadTooLarge(self.data.len()))?;

        let mut w = Writer::new(buf, self.encoded_len())?;
        w.u16(queue_len);
        w.put(self.queue.as_bytes());
        w.u16(ctype_len);
        w.put(self.content_type.as_bytes());
        w.u32(data_len);
        w.put(&self.data);
        Ok(w.pos)
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf, Self::NAME);
        let queue_len = r.u16()? as usize;
        let queue = r.string(queue_len)?;
        let ctype_len = r.u16()? as usize;
        let content_type = r.string(ctype_len)?;
        let data_len = r.u32()? as usize;
        let data = r.take(data_len)?.to_vec();
        r.finish()?;
        Ok(PutPayload {
            queue,
            content_type,
            data,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// GET / DELETE
// ═══════════════════════════════════════════════════════════════════════════

/// Queue reference shared by GET and DELETE
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuePayload {
    pub queue: String,
}

impl QueuePayload {
    pub fn new(queue: &str) -> Self {
        QueuePayload {
            queue: queue.to_string(),
        }
    }
}

impl Payload for QueuePayload {
    const NAME: &'static str = "queue";

    fn encoded_len(&self) -> usize {
        2 + self.queue.len()
    }

    fn encode_into(&self, buf: &mut [u8]) -> Result<usize> {
        let queue_len = short_len(&self.queue)?;
        let mut w = Writer::new(buf, self.encoded_len())?;
        w.u16(queue_len);
        w.put(self.queue.as_bytes());
        Ok(w.pos)
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf, Self::NAME);
        let len = r.u16()? as usize;
        let queue = r.string(len)?;
        r.finish()?;
        Ok(QueuePayload { queue })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// STATUS
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPayload {
    pub status: StatusCode,
    pub message: String,
}

impl Payload for StatusPayload {
    const NAME: &'static str = "STATUS";

    fn encoded_len(&self) -> usize {
        1 + self.message.len()
    }

    fn encode_into(&self, buf: &mut [u8]) -> Result<usize> {
        let mut w = Writer::new(buf, self.encoded_len())?;
        w.u8(self.status.as_u8());
        w.put(self.message.as_bytes());
        Ok(w.pos)
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf, Self::NAME);
        let status = StatusCode::from_u8(r.u8()?).map_err(|_| ProtocolError::MalformedPayload(Self::NAME))?;
        let message = String::from_utf8(r.rest().to_vec())
            .map_err(|_| ProtocolError::MalformedPayload(Self::NAME))?;
        Ok(StatusPayload { status, message })
    }
}
