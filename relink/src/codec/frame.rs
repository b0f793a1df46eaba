//! Frame definition and wire codec.
//!
//! A frame is the atomic on-wire unit. Layout (multi-byte fields are
//! little-endian):
//!
//! ```text
//! offset 0      dest      u8
//! offset 1      src       u8
//! offset 2      seq       u16   chunk count on START/ACCEPT/DONE,
//!                               chunk index on a data frame
//! offset 4      flags     u8    bits 7..3 = START/ACCEPT/IGNORE/FAILURE/DONE
//!                               bits 2,1  = reserved, must be zero
//!                               bit 0     = end-of-padding marker
//! [offset 5     padding   u8    present only when needed for parity]
//! offset p      size      u16   present iff flags & (START|ACCEPT|DONE)
//! offset p+2    data      up to `size` bytes
//! offset end-2  checksum  u16
//! ```
//!
//! The padding byte exists exactly when needed to keep the total frame
//! length even, so the checksum always covers whole words. The marker
//! bit sits in the last byte of the flags region: on the flags byte
//! itself when no padding follows, on the padding byte otherwise.

use super::checksum::Checksum;
use crate::config::{MAX_CHUNK_LEN, MIN_FRAME_LEN};
use crate::error::{Error, Result};

/// Flag bits carried in the high five bits of the flags byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(u8);

impl Flags {
    /// Opens a transfer; `seq` holds the total chunk count.
    pub const START: Self = Self(0b1000_0000);

    /// Accepts a START, echoing the sender's `seq` and `size`.
    pub const ACCEPT: Self = Self(0b0100_0000);

    /// The peer exists but refuses to talk right now.
    pub const IGNORE: Self = Self(0b0010_0000);

    /// The receiver gave up on the current transfer.
    pub const FAILURE: Self = Self(0b0001_0000);

    /// The receiver holds every chunk; the transfer is complete.
    pub const DONE: Self = Self(0b0000_1000);

    /// A data frame carries no flag bits at all.
    pub const EMPTY: Self = Self(0);

    /// Flags whose frames carry the `size` field.
    const SIZED: Self = Self(Self::START.0 | Self::ACCEPT.0 | Self::DONE.0);

    /// Reserved low bits; a frame decoding with either set is invalid.
    pub(crate) const RESERVED: u8 = 0b0000_0110;

    /// End-of-padding marker bit.
    pub(crate) const PAD_MARK: u8 = 0b0000_0001;

    /// Creates flags from a raw byte.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Returns the raw byte.
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Checks that every bit of `other` is set.
    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Checks that at least one bit of `other` is set.
    pub const fn intersects(&self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    /// Combines two flag sets.
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// True when frames with these flags carry the `size` field.
    pub(crate) const fn carries_size(&self) -> bool {
        self.intersects(Self::SIZED)
    }
}

impl core::ops::BitOr for Flags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// A single frame, decoded or about to be encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Destination endpoint id.
    pub dest: u8,

    /// Source endpoint id.
    pub src: u8,

    /// Chunk count on START/ACCEPT/DONE frames, chunk index on data frames.
    pub seq: u16,

    /// Flag bits (padding marker already stripped on decode).
    pub flags: Flags,

    /// Window size in bytes; zero on frames that do not carry it.
    pub size: u16,

    /// Payload; empty on every control frame.
    pub data: Vec<u8>,

    /// Checksum matched and no reserved bit was set. Meaningful on
    /// decoded frames only; callers decide what an invalid frame means.
    pub valid: bool,
}

impl Frame {
    /// Builds a bare control frame with the given flags.
    pub fn control(dest: u8, src: u8, seq: u16, flags: Flags, size: u16) -> Self {
        Self {
            dest,
            src,
            seq,
            flags,
            size,
            data: Vec::new(),
            valid: true,
        }
    }

    /// START frame opening a transfer of `total` chunks of up to
    /// `window` bytes each.
    pub fn start(dest: u8, src: u8, total: u16, window: u16) -> Self {
        Self::control(dest, src, total, Flags::START, window)
    }

    /// ACCEPT frame answering a START.
    pub fn accept(dest: u8, src: u8, total: u16, window: u16) -> Self {
        Self::control(dest, src, total, Flags::ACCEPT, window)
    }

    /// Combined ACCEPT|DONE answering a START that carries no data.
    pub fn accept_done(dest: u8, src: u8, total: u16, window: u16) -> Self {
        Self::control(dest, src, total, Flags::ACCEPT | Flags::DONE, window)
    }

    /// FAILURE frame abandoning the current transfer. The FAILURE flag
    /// carries no `size` field on the wire; the window argument is kept
    /// for symmetry with the other responses.
    pub fn failure(dest: u8, src: u8, total: u16, window: u16) -> Self {
        Self::control(dest, src, total, Flags::FAILURE, window)
    }

    /// DONE frame completing a transfer.
    pub fn done(dest: u8, src: u8, total: u16, window: u16) -> Self {
        Self::control(dest, src, total, Flags::DONE, window)
    }

    /// Data frame carrying one chunk of the payload.
    pub fn chunk(dest: u8, src: u8, seq: u16, data: Vec<u8>) -> Self {
        Self {
            dest,
            src,
            seq,
            flags: Flags::EMPTY,
            size: 0,
            data,
            valid: true,
        }
    }

    /// Encodes the frame, choosing the padding that keeps the total
    /// length even and appending the checksum.
    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.data.len() > MAX_CHUNK_LEN {
            return Err(Error::WindowExceeded);
        }
        let sized = self.flags.carries_size();
        // dest + src + seq + checksum + data, the flags region excluded;
        // even here means the one-byte flags region would leave the
        // total odd, so a padding byte is owed
        let mut length = 1 + 1 + 2 + 2 + self.data.len();
        if sized {
            length += 2;
        }

        let mut buf = Vec::with_capacity(length + 2);
        buf.push(self.dest);
        buf.push(self.src);
        buf.extend_from_slice(&self.seq.to_le_bytes());
        buf.push(self.flags.bits());
        if length % 2 == 0 {
            buf.push(0);
        }
        // the marker lands on the flags byte itself or on the padding byte
        let mark = buf.len() - 1;
        buf[mark] |= Flags::PAD_MARK;

        if sized {
            buf.extend_from_slice(&self.size.to_le_bytes());
        }
        buf.extend_from_slice(&self.data);
        let checksum = Checksum::compute(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());
        Ok(buf)
    }

    /// Decodes a raw frame.
    ///
    /// `Err(Corrupt)` means the buffer cannot be parsed at all. An `Ok`
    /// frame may still carry `valid == false` when the checksum failed
    /// or a reserved bit was set; the switch routes such frames
    /// unchanged while the transfer layer restarts on them.
    pub fn decode(raw: &[u8]) -> Result<Frame> {
        let mut valid = Checksum::verify(raw);
        if raw.len() < MIN_FRAME_LEN {
            return Err(Error::Corrupt);
        }

        let dest = raw[0];
        let src = raw[1];
        let seq = u16::from_le_bytes([raw[2], raw[3]]);
        let mut bits = raw[4];
        let mut offset = 5;
        if bits & Flags::PAD_MARK == Flags::PAD_MARK {
            bits &= !Flags::PAD_MARK;
        } else {
            // the marker sits on a padding byte instead; its content
            // only ever participated in the checksum
            offset += 1;
        }
        if bits & Flags::RESERVED != 0 {
            valid = false;
            return Ok(Frame {
                dest,
                src,
                seq,
                flags: Flags::from_bits(bits),
                size: 0,
                data: Vec::new(),
                valid,
            });
        }
        if offset + 2 > raw.len() {
            return Err(Error::Corrupt);
        }

        let flags = Flags::from_bits(bits);
        let mut size = 0;
        if flags.carries_size() {
            size = u16::from_le_bytes([raw[offset], raw[offset + 1]]);
            offset += 2;
        }
        let data = if offset < raw.len() - 2 {
            raw[offset..raw.len() - 2].to_vec()
        } else {
            Vec::new()
        };

        Ok(Frame {
            dest,
            src,
            seq,
            flags,
            size,
            data,
            valid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recode_checksum(raw: &mut [u8]) {
        let body = raw.len() - 2;
        let checksum = Checksum::compute(&raw[..body]);
        raw[body..].copy_from_slice(&checksum.to_le_bytes());
    }

    #[test]
    fn test_control_round_trip() {
        for flags in [
            Flags::START,
            Flags::ACCEPT,
            Flags::IGNORE,
            Flags::FAILURE,
            Flags::DONE,
            Flags::ACCEPT | Flags::DONE,
        ] {
            let frame = Frame::control(b'a', b'b', 513, flags, 7);
            let raw = frame.encode().unwrap();
            let decoded = Frame::decode(&raw).unwrap();
            assert!(decoded.valid, "{flags:?}");
            assert_eq!(decoded.dest, b'a');
            assert_eq!(decoded.src, b'b');
            assert_eq!(decoded.seq, 513);
            assert_eq!(decoded.flags, flags);
            // only START/ACCEPT/DONE carry the window on the wire
            let expect_size = if flags.carries_size() { 7 } else { 0 };
            assert_eq!(decoded.size, expect_size);
            assert!(decoded.data.is_empty());
        }
    }

    #[test]
    fn test_chunk_round_trip() {
        let frame = Frame::chunk(b'a', b'b', 3, b"hunk of payload".to_vec());
        let raw = frame.encode().unwrap();
        let decoded = Frame::decode(&raw).unwrap();
        assert!(decoded.valid);
        assert_eq!(decoded.flags, Flags::EMPTY);
        assert_eq!(decoded.seq, 3);
        assert_eq!(decoded.data, b"hunk of payload");
    }

    #[test]
    fn test_every_encoding_is_even() {
        for len in 0..9 {
            let frame = Frame::chunk(1, 2, 0, vec![0xAA; len]);
            assert_eq!(frame.encode().unwrap().len() % 2, 0, "data len {len}");
            let frame = Frame::control(1, 2, len as u16, Flags::START, 4);
            assert_eq!(frame.encode().unwrap().len() % 2, 0);
        }
    }

    #[test]
    fn test_padding_parity() {
        // odd pre-padding length: marker on the flags byte, no padding
        let raw = Frame::chunk(1, 2, 0, vec![0xAA]).encode().unwrap();
        assert_eq!(raw.len(), 8);
        assert_eq!(raw[4], Flags::PAD_MARK);
        assert_eq!(raw[5], 0xAA);

        // even pre-padding length: zero padding byte carries the marker
        let raw = Frame::chunk(1, 2, 0, vec![0xAA, 0xBB]).encode().unwrap();
        assert_eq!(raw.len(), 10);
        assert_eq!(raw[4], 0);
        assert_eq!(raw[5], Flags::PAD_MARK);

        // the size field flips the parity the other way
        let raw = Frame::control(1, 2, 9, Flags::START, 4).encode().unwrap();
        assert_eq!(raw.len(), 10);
        assert_eq!(raw[4], Flags::START.bits());
        assert_eq!(raw[5], Flags::PAD_MARK);

        let mut with_data = Frame::control(1, 2, 9, Flags::ACCEPT, 4);
        with_data.data = vec![0xCC];
        let raw = with_data.encode().unwrap();
        assert_eq!(raw.len(), 10);
        assert_eq!(raw[4], Flags::ACCEPT.bits() | Flags::PAD_MARK);
        let decoded = Frame::decode(&raw).unwrap();
        assert!(decoded.valid);
        assert_eq!(decoded.data, vec![0xCC]);
    }

    #[test]
    fn test_single_bit_flips_are_detected() {
        let raw = Frame::chunk(b'a', b'b', 1, b"sensitive".to_vec())
            .encode()
            .unwrap();
        for byte in 0..raw.len() {
            for bit in 0..8 {
                let mut damaged = raw.clone();
                damaged[byte] ^= 1 << bit;
                match Frame::decode(&damaged) {
                    Ok(frame) => assert!(!frame.valid, "byte {byte} bit {bit} slipped through"),
                    Err(Error::Corrupt) => {}
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
        }
    }

    #[test]
    fn test_zeroed_third_from_last_byte_is_invalid() {
        // the switch's corruption zeroes the byte at len-3, the last
        // byte before the checksum
        let raw = Frame::chunk(b'a', b'b', 0, b"hello".to_vec()).encode().unwrap();
        let at = raw.len() - 3;
        assert_ne!(raw[at], 0, "pick a payload whose third-from-last byte is nonzero");
        let mut damaged = raw;
        damaged[at] = 0;
        let decoded = Frame::decode(&damaged).unwrap();
        assert!(!decoded.valid);
    }

    #[test]
    fn test_reserved_bits_invalidate() {
        for reserved in [0b0000_0010u8, 0b0000_0100] {
            let mut raw = Frame::start(1, 2, 3, 4).encode().unwrap();
            raw[4] |= reserved;
            recode_checksum(&mut raw);
            let decoded = Frame::decode(&raw).unwrap();
            assert!(!decoded.valid);
        }
    }

    #[test]
    fn test_short_buffers_are_corrupt() {
        assert!(matches!(Frame::decode(&[]), Err(Error::Corrupt)));
        assert!(matches!(Frame::decode(&[0u8; 6]), Err(Error::Corrupt)));
    }

    #[test]
    fn test_oversize_chunk_refused() {
        let frame = Frame::chunk(1, 2, 0, vec![0; MAX_CHUNK_LEN + 1]);
        assert!(matches!(frame.encode(), Err(Error::WindowExceeded)));
    }
}
