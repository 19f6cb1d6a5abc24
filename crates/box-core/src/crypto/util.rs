//! # Cryptographic Utilities
//!
//! Constant-time comparison, memory wiping and OS randomness.

use rand_core::{OsRng, RngCore};
use zeroize::Zeroize;

/// Constant-time comparison
#[inline(never)]
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Secure memory zeroing
#[inline]
pub fn secure_zero(data: &mut [u8]) {
    data.zeroize();
}

/// Fill `buf` from the operating system RNG
pub fn fill_random(buf: &mut [u8]) {
    OsRng.fill_bytes(buf);
}

/// Fresh random array
pub fn random_array<const N: usize>() -> [u8; N] {
    let mut out = [0u8; N];
    fill_random(&mut out);
    out
}
