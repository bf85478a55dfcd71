//! In-memory holding-register image.
//!
//! A [`RegisterImage`] is the connector's local copy of one device's register
//! space: a fixed-length array of 16-bit words, refreshed wholesale by each
//! poll cycle and read by the codec.
//!
//! # Bounds policy
//!
//! Register access never panics and never fails. A read past the end of the
//! image logs a diagnostic and yields [`OUT_OF_RANGE_WORD`]; a write past the
//! end logs and is dropped. A schema/device mismatch therefore degrades to
//! sentinel values in the decoded output instead of killing the polling loop.
//! The API names make the policy explicit: [`get_or_sentinel`] and
//! [`set_or_log`].
//!
//! [`get_or_sentinel`]: RegisterImage::get_or_sentinel
//! [`set_or_log`]: RegisterImage::set_or_log

use tracing::warn;

use crate::schema::RegisterSchema;

/// Word returned for reads beyond the end of the image: `-1` in the register's
/// signed 16-bit representation.
pub const OUT_OF_RANGE_WORD: u16 = -1i16 as u16;

/// Fixed-length array of 16-bit holding registers.
///
/// The length is set at construction and never changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterImage {
    words: Vec<u16>,
}

impl RegisterImage {
    /// Create a zero-initialized image of `len` registers.
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len],
        }
    }

    /// Create a zero-initialized image sized for a schema's register span.
    pub fn for_schema(schema: &RegisterSchema) -> Self {
        Self::new(schema.register_span())
    }

    /// Number of registers in the image.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Check if the image holds no registers.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Read the register at `index`, or [`OUT_OF_RANGE_WORD`] if `index` is
    /// beyond the image.
    pub fn get_or_sentinel(&self, index: usize) -> u16 {
        match self.words.get(index) {
            Some(word) => *word,
            None => {
                warn!(
                    index,
                    len = self.words.len(),
                    "register read out of range, returning sentinel"
                );
                OUT_OF_RANGE_WORD
            }
        }
    }

    /// Write the register at `index`; out-of-range writes are dropped.
    pub fn set_or_log(&mut self, index: usize, word: u16) {
        match self.words.get_mut(index) {
            Some(slot) => *slot = word,
            None => {
                warn!(
                    index,
                    len = self.words.len(),
                    "register write out of range, dropped"
                );
            }
        }
    }

    /// Replace the image contents with freshly read registers.
    ///
    /// Copies `min(len, words.len())` registers from the start; a length
    /// mismatch is logged but tolerated (short responses leave the tail of
    /// the image unchanged).
    pub fn load(&mut self, words: &[u16]) {
        let n = self.words.len().min(words.len());
        self.words[..n].copy_from_slice(&words[..n]);
        if words.len() != self.words.len() {
            warn!(
                received = words.len(),
                expected = self.words.len(),
                "register read length mismatch"
            );
        }
    }

    /// Borrow the raw register words.
    pub fn words(&self) -> &[u16] {
        &self.words
    }
}
