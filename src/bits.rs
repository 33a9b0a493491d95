//! Conversion between logical bit sequences and the bridge's wire format.
//! The bridge clocks whole bytes through its shift registers and has a
//! separate register variant for a final partial byte, so every sequence
//! travels as zero or more full bytes plus one width-tagged tail.

use bitvec::prelude::*;

use crate::error::{Error, Result};

/// An ordered bit sequence; index 0 is the first bit clocked on the wire.
pub type BitString = BitVec<u8, Lsb0>;

/// Wire representation of a bit sequence: full bytes in transmission order,
/// then a tail of `tail_width` valid bits.  A `tail_width` of 0 means the
/// tail is itself a full byte, so a frame always carries at least one bit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitFrame {
    pub bytes: Vec<u8>,
    pub tail_width: u8,
    pub tail: u8,
}

impl BitFrame {
    pub fn total_bits(&self) -> usize {
        let tail = if self.tail_width > 0 {
            self.tail_width as usize
        } else {
            8
        };
        self.bytes.len() * 8 + tail
    }
}

/// Pack `bits` into a [`BitFrame`].  Bit `i` of each eight-bit group lands
/// at value bit `i`, so the first transmitted bit sits at the least
/// significant position of its byte.  The final group of 1 to 8 bits becomes
/// the tail.
pub fn encode(bits: &BitSlice<u8, Lsb0>) -> Result<BitFrame> {
    if bits.is_empty() {
        return Err(Error::EmptyPayload);
    }
    let tail_width = (bits.len() % 8) as u8;
    let tail_len = if tail_width == 0 { 8 } else { tail_width as usize };
    let split = bits.len() - tail_len;

    let bytes = bits[..split].chunks(8).map(|c| c.load_le::<u8>()).collect();
    let tail = bits[split..].load_le::<u8>();
    Ok(BitFrame {
        bytes,
        tail_width,
        tail,
    })
}

/// Unpack a [`BitFrame`] back into its bit sequence.  Each byte is expanded
/// least-significant bit first, full bytes before the tail, which makes
/// `decode` the exact inverse of [`encode`] for frames of any length.
pub fn decode(frame: &BitFrame) -> BitString {
    let mut bits = BitString::with_capacity(frame.total_bits());
    for byte in &frame.bytes {
        bits.extend_from_bitslice(byte.view_bits::<Lsb0>());
    }
    let tail_len = if frame.tail_width == 0 {
        8
    } else {
        frame.tail_width as usize
    };
    bits.extend_from_bitslice(&frame.tail.view_bits::<Lsb0>()[..tail_len]);
    bits
}
