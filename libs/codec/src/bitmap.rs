//! Presence bitmap
//!
//! Bit 1 (MSB of the first byte) of the primary block flags an extension block
//! carrying fields 65-128. The extension is only emitted when such a field is present.

use crate::constants::{BITMAP_LEN, MAX_FIELD};
use crate::error::{ProtocolError, ProtocolResult};

/// 128-bit field presence set, bit for field `n` at position `n - 1` from the MSB
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bitmap(u128);

impl Bitmap {
    pub fn new() -> Self {
        Self(0)
    }

    fn mask(field: u8) -> u128 {
        1u128 << (128 - field as u32)
    }

    /// Mark `field` (1..=128) present
    pub fn set(&mut self, field: u8) {
        debug_assert!((1..=MAX_FIELD).contains(&field));
        self.0 |= Self::mask(field);
        if field > 64 {
            self.0 |= Self::mask(1);
        }
    }

    pub fn is_set(&self, field: u8) -> bool {
        (1..=MAX_FIELD).contains(&field) && self.0 & Self::mask(field) != 0
    }

    /// Whether the extension block is present
    pub fn has_extension(&self) -> bool {
        self.is_set(1)
    }

    /// Data fields present, ascending, excluding the extension flag
    pub fn fields(&self) -> impl Iterator<Item = u8> + '_ {
        (2..=MAX_FIELD).filter(move |f| self.is_set(*f))
    }

    /// Wire length of this bitmap: 8 or 16 bytes
    pub fn encoded_len(&self) -> usize {
        if self.has_extension() {
            BITMAP_LEN * 2
        } else {
            BITMAP_LEN
        }
    }

    /// Wire bytes, primary block first
    pub fn to_bytes(&self) -> Vec<u8> {
        let bytes = self.0.to_be_bytes();
        bytes[..self.encoded_len()].to_vec()
    }

    /// Read a bitmap at `offset`; returns it and the offset past it
    pub fn read(data: &[u8], offset: usize) -> ProtocolResult<(Self, usize)> {
        let primary = data.get(offset..offset + BITMAP_LEN).ok_or_else(|| {
            ProtocolError::frame_too_small(
                offset + BITMAP_LEN,
                data.len(),
                "primary bitmap",
            )
        })?;
        let mut raw = [0u8; 16];
        raw[..BITMAP_LEN].copy_from_slice(primary);
        let mut next = offset + BITMAP_LEN;

        if primary[0] & 0x80 != 0 {
            let extension = data.get(next..next + BITMAP_LEN).ok_or_else(|| {
                ProtocolError::frame_too_small(next + BITMAP_LEN, data.len(), "extension bitmap")
            })?;
            raw[BITMAP_LEN..].copy_from_slice(extension);
            next += BITMAP_LEN;
        }

        Ok((Self(u128::from_be_bytes(raw)), next))
    }
}
