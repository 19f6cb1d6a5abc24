//! # Replay Protection
//!
//! 64-counter sliding window. Checking and committing are separate so a
//! counter is only marked once its frame has authenticated.

use crate::constants::REPLAY_WINDOW_SIZE;
use crate::error::TransportError;

/// Sliding window for replay attack protection
#[derive(Debug, Clone, Default)]
pub struct ReplayWindow {
    max: u64,
    bitmap: u64,
}

impl ReplayWindow {
    /// Create a new replay window
    pub fn new() -> Self {
        ReplayWindow { max: 0, bitmap: 0 }
    }

    /// Highest accepted counter
    #[inline]
    pub fn max(&self) -> u64 {
        self.max
    }

    /// Bit `n` set means counter `max - n` was accepted
    #[inline]
    pub fn bitmap(&self) -> u64 {
        self.bitmap
    }

    /// Check a counter without recording it
    #[inline]
    pub fn check(&self, counter: u64) -> Result<(), TransportError> {
        if counter > self.max {
            return Ok(());
        }

        let diff = self.max - counter;
        if diff >= REPLAY_WINDOW_SIZE {
            return Err(TransportError::TooOld {
                counter,
                max: self.max,
            });
        }
        if self.bitmap & (1u64 << diff) != 0 {
            return Err(TransportError::Replayed(counter));
        }
        Ok(())
    }

    /// Record a counter previously accepted by `check`
    #[inline]
    pub fn commit(&mut self, counter: u64) {
        if counter > self.max {
            let shift = counter - self.max;
            self.bitmap = if shift >= REPLAY_WINDOW_SIZE {
                0
            } else {
                self.bitmap << shift
            };
            self.bitmap |= 1;
            self.max = counter;
        } else {
            let diff = self.max - counter;
            if diff < REPLAY_WINDOW_SIZE {
                self.bitmap |= 1u64 << diff;
            }
        }
    }

    /// Check and record in one step
    pub fn check_and_update(&mut self, counter: u64) -> Result<(), TransportError> {
        self.check(counter)?;
        self.commit(counter);
        Ok(())
    }
}
