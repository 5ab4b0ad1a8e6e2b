// Owned wire buffer with exact-length field access
//
// A WireMessage is created per send/receive operation and discarded right
// after encoding/decoding. Field writes are all-or-nothing: supplying data
// whose length differs from the computed field length is a programming
// error, reported as FieldSizeMismatch with no partial write.

use crate::wire::layout::{Field, MessageLayout};
use crate::wire::WireError;

/// A message buffer bound to a layout and a hop position.
#[derive(Debug)]
pub struct WireMessage<'l> {
    layout: &'l MessageLayout,
    hops_remaining: usize,
    buf: Vec<u8>,
}

impl<'l> WireMessage<'l> {
    /// Allocate a zeroed message for `hops_remaining` relays ahead.
    pub fn new(layout: &'l MessageLayout, hops_remaining: usize) -> Self {
        Self {
            layout,
            hops_remaining,
            buf: vec![0u8; layout.total_len(hops_remaining)],
        }
    }

    /// Wrap received bytes, verifying they match the layout's length.
    pub fn from_bytes(
        layout: &'l MessageLayout,
        hops_remaining: usize,
        bytes: Vec<u8>,
    ) -> Result<Self, WireError> {
        let expected = layout.total_len(hops_remaining);
        if bytes.len() != expected {
            return Err(WireError::LengthMismatch {
                expected,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            layout,
            hops_remaining,
            buf: bytes,
        })
    }

    pub fn hops_remaining(&self) -> usize {
        self.hops_remaining
    }

    fn range(&self, field: Field) -> Result<std::ops::Range<usize>, WireError> {
        let start = self.layout.start_position(field, self.hops_remaining)?;
        let end = self.layout.end_position(field, self.hops_remaining)?;
        Ok(start..end)
    }

    /// Write a field. `data` must exactly fill the field.
    pub fn set(&mut self, field: Field, data: &[u8]) -> Result<(), WireError> {
        let range = self.range(field)?;
        if data.len() != range.len() {
            return Err(WireError::FieldSizeMismatch {
                field,
                expected: range.len(),
                actual: data.len(),
            });
        }
        self.buf[range].copy_from_slice(data);
        Ok(())
    }

    /// Read a field.
    pub fn get(&self, field: Field) -> Result<&[u8], WireError> {
        let range = self.range(field)?;
        Ok(&self.buf[range])
    }

    /// Mutable view of a field, for in-place cipher application.
    pub fn get_mut(&mut self, field: Field) -> Result<&mut [u8], WireError> {
        let range = self.range(field)?;
        Ok(&mut self.buf[range])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
