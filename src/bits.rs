//! Arbitrary-width bit container used for signal values and side-channels.
//!
//! Bits are stored little-endian: bit `i` lives in byte `i / 8` at position
//! `i % 8`. The unused high bits of the last byte are kept at zero after every
//! mutation, so equality and hashing can work on the raw bytes.
//!
//! There is no ordering between bit vectors of different widths, so
//! `BitVector` implements `Hash` + `Eq` but not `Ord`.

use std::fmt;
use std::hash::{Hash, Hasher};

const BITS: usize = 8;

#[inline]
fn bytes_for(width: usize) -> usize {
    (width + BITS - 1) / BITS
}

#[inline]
fn low_mask(bits: usize) -> u8 {
    if bits >= BITS {
        0xFF
    } else {
        !(0xFFu8 << bits)
    }
}

#[derive(Clone, Default)]
pub struct BitVector {
    bytes: Vec<u8>,
    width: usize,
}

impl BitVector {
    pub fn new(width: usize) -> Self {
        Self {
            bytes: vec![0; bytes_for(width)],
            width,
        }
    }

    pub fn from_value(value: u64, width: usize) -> Self {
        let mut bits = Self::new(width);
        bits.assign_value(value, 64);
        bits
    }

    pub fn from_bytes(src: &[u8], width: usize) -> Self {
        let mut bits = Self::new(width);
        bits.assign_bytes(src, width);
        bits
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0
    }

    /// Changes the width, preserving the low-order bits. Growing zero-extends,
    /// shrinking truncates.
    pub fn resize(&mut self, width: usize) -> &mut Self {
        if width != self.width {
            self.bytes.resize(bytes_for(width), 0);
            self.width = width;
            self.mask_tail();
        }
        self
    }

    /// Like [`resize`](Self::resize) but consuming.
    pub fn resized(mut self, width: usize) -> Self {
        self.resize(width);
        self
    }

    /// Sets every bit to zero, keeping the width.
    pub fn clear(&mut self) -> &mut Self {
        self.bytes.iter_mut().for_each(|b| *b = 0);
        self
    }

    pub fn get(&self, index: usize) -> Option<bool> {
        if index < self.width {
            Some((self.bytes[index / BITS] >> (index % BITS)) & 1 == 1)
        } else {
            None
        }
    }

    /// Panics if `index` is out of range.
    pub fn bit(&self, index: usize) -> bool {
        match self.get(index) {
            Some(bit) => bit,
            None => panic!("bit index {} out of range for width {}", index, self.width),
        }
    }

    /// Panics if `index` is out of range.
    pub fn set_bit(&mut self, index: usize, value: bool) -> &mut Self {
        assert!(
            index < self.width,
            "bit index {} out of range for width {}",
            index,
            self.width
        );
        let mask = 1u8 << (index % BITS);
        if value {
            self.bytes[index / BITS] |= mask;
        } else {
            self.bytes[index / BITS] &= !mask;
        }
        self
    }

    /// Mutable reference to a single bit.
    pub fn bit_mut(&mut self, index: usize) -> BitMut<'_> {
        assert!(
            index < self.width,
            "bit index {} out of range for width {}",
            index,
            self.width
        );
        BitMut { bits: self, index }
    }

    /// Byte `index` (bits `8*index .. 8*index+8`). Missing bytes read as zero.
    pub fn byte(&self, index: usize) -> u8 {
        self.bytes.get(index).copied().unwrap_or(0)
    }

    /// Writes byte `index`. Bits beyond the width are dropped.
    pub fn set_byte(&mut self, index: usize, value: u8) -> &mut Self {
        if let Some(byte) = self.bytes.get_mut(index) {
            *byte = value;
            self.mask_tail();
        }
        self
    }

    /// Overwrites the low `bits` bits (clipped to the width) with the low bits
    /// of `value`; higher bits are kept.
    pub fn assign_value(&mut self, mut value: u64, bits: usize) -> &mut Self {
        let mut bits = bits.min(self.width).min(64);
        let mut index = 0;
        while bits >= BITS {
            self.bytes[index] = value as u8;
            value >>= BITS;
            bits -= BITS;
            index += 1;
        }
        if bits > 0 {
            let mask = low_mask(bits);
            self.bytes[index] = (self.bytes[index] & !mask) | (value as u8 & mask);
        }
        self
    }

    /// Overwrites the low `bits` bits (clipped to the width and to the source
    /// length) with bits taken from `src`; higher bits are kept.
    pub fn assign_bytes(&mut self, src: &[u8], bits: usize) -> &mut Self {
        let bits = bits.min(self.width).min(src.len() * BITS);
        let whole = bits / BITS;
        self.bytes[..whole].copy_from_slice(&src[..whole]);
        let rest = bits % BITS;
        if rest > 0 {
            let mask = low_mask(rest);
            self.bytes[whole] = (self.bytes[whole] & !mask) | (src[whole] & mask);
        }
        self
    }

    /// Value of the whole vector, truncated to 64 bits.
    pub fn value(&self) -> u64 {
        self.value_bits(64)
    }

    /// Value of the low `bits` bits (clipped to the width and to 64 bits).
    pub fn value_bits(&self, bits: usize) -> u64 {
        let mut bits = bits.min(self.width).min(64);
        let mut value = 0u64;
        let mut offset = 0;
        let mut index = 0;
        while bits >= BITS {
            value |= (self.bytes[index] as u64) << offset;
            offset += BITS;
            bits -= BITS;
            index += 1;
        }
        if bits > 0 {
            value |= ((self.bytes[index] & low_mask(bits)) as u64) << offset;
        }
        value
    }

    /// Copies the low `bits` bits (clipped to the width and to the destination
    /// length) into `dst`. Bits of `dst` above the copied range are kept.
    pub fn copy_to(&self, dst: &mut [u8], bits: usize) {
        let bits = bits.min(self.width).min(dst.len() * BITS);
        let whole = bits / BITS;
        dst[..whole].copy_from_slice(&self.bytes[..whole]);
        let rest = bits % BITS;
        if rest > 0 {
            let mask = low_mask(rest);
            dst[whole] = (dst[whole] & !mask) | (self.bytes[whole] & mask);
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.width).map(move |i| self.bit(i))
    }

    pub fn is_zero(&self) -> bool {
        self.bytes.iter().all(|b| *b == 0)
    }

    /// Truthiness of bit 0, the way a 1-bit signal is read.
    pub fn to_bool(&self) -> bool {
        self.width > 0 && self.bytes[0] & 1 == 1
    }

    fn mask_tail(&mut self) {
        let rest = self.width % BITS;
        if rest > 0 {
            if let Some(last) = self.bytes.last_mut() {
                *last &= low_mask(rest);
            }
        }
    }

    /// Bytes without trailing zero bytes: the width-independent logical value.
    fn significant(&self) -> &[u8] {
        let len = self
            .bytes
            .iter()
            .rposition(|b| *b != 0)
            .map_or(0, |i| i + 1);
        &self.bytes[..len]
    }
}

impl From<bool> for BitVector {
    fn from(value: bool) -> Self {
        Self::from_value(value as u64, 1)
    }
}

/// Logical equality: the narrower operand is zero-extended.
impl PartialEq for BitVector {
    fn eq(&self, other: &Self) -> bool {
        self.significant() == other.significant()
    }
}

impl Eq for BitVector {}

impl Hash for BitVector {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant().hash(state);
    }
}

impl fmt::LowerHex for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let significant = self.significant();
        match significant.split_last() {
            None => write!(f, "0"),
            Some((msb, rest)) => {
                write!(f, "{:x}", msb)?;
                for byte in rest.iter().rev() {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}'h{:x}", self.width, self)
    }
}

impl fmt::Debug for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitVector({})", self)
    }
}

/// Proxy for one bit of a [`BitVector`].
pub struct BitMut<'a> {
    bits: &'a mut BitVector,
    index: usize,
}

impl BitMut<'_> {
    pub fn get(&self) -> bool {
        self.bits.bit(self.index)
    }

    pub fn set(&mut self, value: bool) {
        self.bits.set_bit(self.index, value);
    }

    pub fn flip(&mut self) {
        let value = self.get();
        self.set(!value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(bits: &BitVector) -> u64 {
        let mut hasher = DefaultHasher::new();
        bits.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn resize_same_width_twice_is_stable() {
        let mut bits = BitVector::from_value(0b1011_0110_1, 9);
        let before = bits.as_bytes().to_vec();
        bits.resize(9).resize(9);
        assert_eq!(bits.as_bytes(), &before[..]);
        assert_eq!(bits.width(), 9);
    }

    #[test]
    fn grow_then_shrink_restores_low_bits() {
        let mut bits = BitVector::from_value(0x5a5, 11);
        let original = bits.clone();
        bits.resize(100);
        assert_eq!(bits.value(), 0x5a5);
        bits.set_bit(99, true);
        bits.resize(11);
        assert_eq!(bits.as_bytes(), original.as_bytes());
    }

    #[test]
    fn shrinking_truncates_and_keeps_tail_zero() {
        let mut bits = BitVector::from_value(0xFFFF, 16);
        bits.resize(5);
        assert_eq!(bits.as_bytes(), &[0x1F]);
        bits.resize(16);
        assert_eq!(bits.value(), 0x1F);
    }

    #[test]
    fn equality_zero_extends_narrower_operand() {
        let narrow = BitVector::from_value(0x3, 2);
        let wide = BitVector::from_value(0x3, 70);
        assert_eq!(narrow, wide);
        assert_eq!(hash_of(&narrow), hash_of(&wide));
        assert_ne!(narrow, BitVector::from_value(0x103, 70));
        assert_eq!(BitVector::default(), BitVector::new(33));
    }

    #[test]
    fn assign_value_truncates_at_requested_bits() {
        let mut bits = BitVector::from_value(0xFF, 12);
        bits.assign_value(0x0, 4);
        assert_eq!(bits.value(), 0xF0);
        bits.assign_value(0xABCD, 64);
        assert_eq!(bits.value(), 0xBCD);
    }

    #[test]
    fn value_of_wide_vector_is_low_64_bits() {
        let mut bits = BitVector::new(128);
        bits.set_bit(127, true);
        bits.set_bit(3, true);
        assert_eq!(bits.value(), 8);
        assert_eq!(bits.value_bits(2), 0);
        assert_eq!(bits.value_bits(4), 8);
    }

    #[test]
    fn assign_bytes_and_copy_to_respect_partial_bytes() {
        let mut bits = BitVector::new(20);
        bits.assign_bytes(&[0x12, 0x34, 0xFF], 20);
        assert_eq!(bits.value(), 0xF3412);

        let mut dst = [0xAA, 0xAA, 0xAA];
        bits.copy_to(&mut dst, 12);
        assert_eq!(dst, [0x12, 0xA4, 0xAA]);
    }

    #[test]
    fn bit_access() {
        let mut bits = BitVector::new(10);
        bits.bit_mut(9).set(true);
        assert!(bits.bit(9));
        bits.bit_mut(9).flip();
        assert!(!bits.bit(9));
        assert_eq!(bits.get(10), None);
        bits.set_byte(1, 0xFF);
        assert_eq!(bits.byte(1), 0x03);
        assert_eq!(bits.iter().filter(|b| *b).count(), 2);
    }

    #[test]
    fn formatting() {
        assert_eq!(BitVector::from_value(0x1ab, 12).to_string(), "12'h1ab");
        assert_eq!(format!("{:x}", BitVector::new(4)), "0");
        assert!(BitVector::from(true).to_bool());
    }
}
