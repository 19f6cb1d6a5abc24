//! # Constants
//!
//! Shared constants for the box wire protocol and secure transport.

// ═══════════════════════════════════════════════════════════════════════════
// V1 FRAMING
// ═══════════════════════════════════════════════════════════════════════════

/// First byte of every v1 frame
pub const V1_MAGIC: u8 = 0x42;

/// Protocol version carried in the second byte of every v1 frame
pub const V1_VERSION: u8 = 0x01;

/// Fixed v1 header size in bytes
/// Magic(1) + Version(1) + Remainder(4) + Command(4) + RequestId(8)
pub const V1_HEADER_SIZE: usize = 18;

/// Bytes counted by `remainder_length` before the payload starts
/// Remainder(4) + Command(4) + RequestId(8)
pub const V1_REMAINDER_OVERHEAD: usize = 16;

/// Largest payload a v1 frame can describe (`remainder_length` is a u32)
pub const V1_MAX_PAYLOAD: usize = u32::MAX as usize - V1_REMAINDER_OVERHEAD - 2;

/// Protocol versions this implementation speaks
pub const SUPPORTED_VERSIONS: &[u16] = &[1];

// ═══════════════════════════════════════════════════════════════════════════
// SECURE TRANSPORT
// ═══════════════════════════════════════════════════════════════════════════

/// Associated header prefixed to every secure frame: 'N' 'Z' 0x01 0x00
pub const SECURE_HEADER: [u8; 4] = [b'N', b'Z', 0x01, 0x00];

/// Secure header size in bytes
pub const SECURE_HEADER_SIZE: usize = 4;

/// Bytes of the header that identify a secure frame on receive
pub const SECURE_HEADER_MATCH: usize = 3;

/// XChaCha20 key size in bytes
pub const KEY_SIZE: usize = 32;

/// XChaCha20 nonce size in bytes
pub const NONCE_SIZE: usize = 24;

/// Random per-session salt occupying the front of each nonce
pub const SALT_SIZE: usize = 16;

/// Big-endian counter occupying the back of each nonce
pub const COUNTER_SIZE: usize = 8;

/// Poly1305 authentication tag size in bytes
pub const TAG_SIZE: usize = 16;

/// Smallest well-formed secure frame: header + nonce + empty ciphertext tag
pub const SECURE_MIN_FRAME: usize = SECURE_HEADER_SIZE + NONCE_SIZE + TAG_SIZE;

/// Largest secure frame ever emitted
pub const SECURE_MAX_FRAME: usize = 1200;

/// Largest plaintext that fits in one secure frame
pub const SECURE_MAX_PLAINTEXT: usize = SECURE_MAX_FRAME - SECURE_MIN_FRAME;

/// First counter used by a fresh session
pub const INITIAL_COUNTER: u64 = 1;

/// Replay window width in counters
pub const REPLAY_WINDOW_SIZE: u64 = 64;

// ═══════════════════════════════════════════════════════════════════════════
// KEY DERIVATION
// ═══════════════════════════════════════════════════════════════════════════

/// Label mixed first into every transcript hash
pub const TRANSCRIPT_LABEL: &[u8] = b"box/noise/scaffold/v1";

/// Static public/private key size in bytes
pub const STATIC_KEY_SIZE: usize = 32;

/// BLAKE2b accepts keys of at most this many bytes
pub const MAX_SECRET_SIZE: usize = 64;

// ═══════════════════════════════════════════════════════════════════════════
// NETWORK
// ═══════════════════════════════════════════════════════════════════════════

/// Default UDP port for boxd
pub const DEFAULT_PORT: u16 = 12567;

/// Receive buffer large enough for any UDP datagram
pub const MAX_DATAGRAM_SIZE: usize = 65536;

/// Largest UDP payload over IPv4, the limit for cleartext replies
pub const MAX_UDP_PAYLOAD: usize = 65507;

/// Cleartext probe sent by clients before anything else
pub const PROBE: &[u8] = b"hello";

// ═══════════════════════════════════════════════════════════════════════════
// RUNTIME
// ═══════════════════════════════════════════════════════════════════════════

/// Capacity of every runloop queue
pub const RUNLOOP_CAPACITY: usize = 512;

/// Longest admin request line read from a client
pub const ADMIN_MAX_REQUEST: usize = 127;

/// Bucket count of the shared map
pub const MAP_BUCKETS: usize = 256;
