//! Fixed-width encodings for keys and values: every key and value type
//! this tree stores must serialise to the same number of bytes on every
//! call, so node records stay a constant size.
//!
//! Byte order is fixed to little-endian throughout, via `byteorder`, so
//! encoded files are reproducible across machines rather than depending on
//! host endianness.

use byteorder::{ByteOrder, LittleEndian};

/// A type that can be serialised to and from a fixed-size little-endian
/// byte buffer, suitable for use as a B-tree key or value.
///
/// Every implementation must encode to exactly [`FixedSize::ENCODED_LEN`]
/// bytes and round-trip through [`FixedSize::decode`].
pub trait FixedSize: Clone {
    /// The exact number of bytes `encode` writes and `decode` reads.
    const ENCODED_LEN: usize;

    /// Writes `self` into the first [`FixedSize::ENCODED_LEN`] bytes of
    /// `buf`. `buf` is at least that long.
    fn encode(&self, buf: &mut [u8]);

    /// Reads a value back out of the first [`FixedSize::ENCODED_LEN`]
    /// bytes of `buf`. `buf` is at least that long.
    fn decode(buf: &[u8]) -> Self;
}

macro_rules! impl_fixed_size_int {
    ($ty:ty, $len:expr, $read:ident, $write:ident) => {
        impl FixedSize for $ty {
            const ENCODED_LEN: usize = $len;

            fn encode(&self, buf: &mut [u8]) {
                LittleEndian::$write(&mut buf[..$len], *self);
            }

            fn decode(buf: &[u8]) -> Self {
                LittleEndian::$read(&buf[..$len])
            }
        }
    };
}

impl_fixed_size_int!(u16, 2, read_u16, write_u16);
impl_fixed_size_int!(u32, 4, read_u32, write_u32);
impl_fixed_size_int!(u64, 8, read_u64, write_u64);
impl_fixed_size_int!(i16, 2, read_i16, write_i16);
impl_fixed_size_int!(i32, 4, read_i32, write_i32);
impl_fixed_size_int!(i64, 8, read_i64, write_i64);

impl FixedSize for i8 {
    const ENCODED_LEN: usize = 1;

    fn encode(&self, buf: &mut [u8]) {
        buf[0] = *self as u8;
    }

    fn decode(buf: &[u8]) -> Self {
        buf[0] as i8
    }
}

impl FixedSize for u8 {
    const ENCODED_LEN: usize = 1;

    fn encode(&self, buf: &mut [u8]) {
        buf[0] = *self;
    }

    fn decode(buf: &[u8]) -> Self {
        buf[0]
    }
}

/// A UTF-8 string clamped to `N` bytes, null-padded, for use as a
/// fixed-width B-tree key or value (e.g. the `(10, "ten")` scenario in
/// spec.md §8 needs a fixed-width string value).
///
/// Construction truncates at the nearest character boundary at or before
/// `N` bytes rather than panicking or splitting a multi-byte character.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FixedString<const N: usize>(String);

impl<const N: usize> FixedString<N> {
    /// Builds a clamped fixed-width string from `s`.
    pub fn new(s: impl Into<String>) -> Self {
        let mut s = s.into();
        if s.len() > N {
            let mut cut = N;
            while !s.is_char_boundary(cut) {
                cut -= 1;
            }
            s.truncate(cut);
        }
        Self(s)
    }

    /// Borrows the underlying string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<const N: usize> From<&str> for FixedString<N> {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl<const N: usize> FixedSize for FixedString<N> {
    const ENCODED_LEN: usize = N;

    fn encode(&self, buf: &mut [u8]) {
        let bytes = self.0.as_bytes();
        buf[..N].fill(0);
        buf[..bytes.len()].copy_from_slice(bytes);
    }

    fn decode(buf: &[u8]) -> Self {
        let end = buf[..N].iter().position(|&b| b == 0).unwrap_or(N);
        let s = String::from_utf8_lossy(&buf[..end]).into_owned();
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_round_trip() {
        let mut buf = [0u8; 8];
        42u64.encode(&mut buf);
        assert_eq!(u64::decode(&buf), 42);

        let mut buf = [0u8; 4];
        (-7i32).encode(&mut buf);
        assert_eq!(i32::decode(&buf), -7);
    }

    #[test]
    fn fixed_string_round_trips_within_capacity() {
        let value: FixedString<16> = FixedString::new("seventeen");
        let mut buf = [0u8; 16];
        value.encode(&mut buf);
        let decoded: FixedString<16> = FixedString::decode(&buf);
        assert_eq!(decoded.as_str(), "seventeen");
    }

    #[test]
    fn fixed_string_truncates_on_char_boundary() {
        let value: FixedString<4> = FixedString::new("hello");
        assert_eq!(value.as_str(), "hell");
    }

    #[test]
    fn fixed_string_orders_like_its_underlying_string() {
        let a: FixedString<8> = FixedString::new("five");
        let b: FixedString<8> = FixedString::new("ten");
        assert!(a < b);
    }
}
