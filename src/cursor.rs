/* Copyright 2018 Mozilla Foundation
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use crate::bitint::{BitInt, Storage};
use core::fmt;

/// An error produced while decoding a WebAssembly binary module.
///
/// Every error is terminal for the decode that produced it: no partial
/// module is ever returned. The error carries a human-readable message and
/// the byte offset within the input at which decoding failed.
#[derive(Debug, Clone)]
pub struct DecodeError {
    // Wrap the actual error data in a `Box` so that the error is just one
    // word. This means that we can continue returning small `Result`s in
    // registers.
    inner: Box<DecodeErrorInner>,
}

#[derive(Debug, Clone)]
struct DecodeErrorInner {
    message: String,
    offset: usize,
}

/// The result type used throughout this crate.
pub type Result<T, E = DecodeError> = core::result::Result<T, E>;

impl std::error::Error for DecodeError {}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} (at offset 0x{:x})",
            self.inner.message, self.inner.offset
        )
    }
}

impl DecodeError {
    #[cold]
    pub(crate) fn new(message: impl Into<String>, offset: usize) -> Self {
        DecodeError {
            inner: Box::new(DecodeErrorInner {
                message: message.into(),
                offset,
            }),
        }
    }

    #[cold]
    pub(crate) fn fmt(args: fmt::Arguments<'_>, offset: usize) -> Self {
        DecodeError::new(args.to_string(), offset)
    }

    #[cold]
    pub(crate) fn eof(offset: usize) -> Self {
        DecodeError::new("unexpected end of input", offset)
    }

    #[cold]
    pub(crate) fn segment_mismatch(offset: usize) -> Self {
        DecodeError::new("declared size does not match actual decoded size", offset)
    }

    /// Get this error's message.
    pub fn message(&self) -> &str {
        &self.inner.message
    }

    /// Get the offset within the input where the error occurred.
    pub fn offset(&self) -> usize {
        self.inner.offset
    }
}

/// A byte reader over an in-memory module with a stack of nested bounds.
///
/// The cursor reads from a borrowed buffer between its current position and
/// an exclusive upper bound. Length-prefixed regions of the format (sections
/// and function bodies) are entered by pushing a tighter bound and left by
/// popping it; the position is shared across the whole stack, so reads inside
/// a nested view advance the enclosing view as well, and the enclosing view
/// resumes exactly where the nested one stopped.
///
/// Running out of bytes at the outermost bound means the input itself was
/// truncated; running out at a pushed bound means a declared size was smaller
/// than the content actually decoded, and the two produce distinct errors.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    buffer: &'a [u8],
    position: usize,
    max: usize,
    outer: Vec<usize>,
}

impl<'a> Cursor<'a> {
    /// Creates a new cursor over the whole of `data`.
    pub fn new(data: &'a [u8]) -> Cursor<'a> {
        Cursor {
            buffer: data,
            position: 0,
            max: data.len(),
            outer: Vec::new(),
        }
    }

    /// Returns the cursor's current byte offset within the input.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Returns the number of bytes left before the innermost bound.
    #[inline]
    pub fn bytes_remaining(&self) -> usize {
        self.max - self.position
    }

    #[cold]
    fn eof_err(&self) -> DecodeError {
        if self.outer.is_empty() {
            DecodeError::eof(self.position)
        } else {
            DecodeError::segment_mismatch(self.position)
        }
    }

    /// Reads and consumes the next byte if one is available before the
    /// innermost bound.
    #[inline]
    pub fn try_next_byte(&mut self) -> Option<u8> {
        if self.position < self.max {
            let byte = self.buffer[self.position];
            self.position += 1;
            Some(byte)
        } else {
            None
        }
    }

    /// Reads and consumes the next byte, erroring if the innermost bound has
    /// been reached.
    #[inline]
    pub fn next_byte(&mut self) -> Result<u8> {
        match self.try_next_byte() {
            Some(byte) => Ok(byte),
            None => Err(self.eof_err()),
        }
    }

    /// Consumes exactly `count` bytes, returning them as a slice of the
    /// underlying buffer.
    pub fn next_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        if count > self.max - self.position {
            return Err(self.eof_err());
        }
        let start = self.position;
        self.position += count;
        Ok(&self.buffer[start..self.position])
    }

    /// Restricts the cursor to the next `length` bytes, suspending the
    /// current bound. Returns `false` (without changing any state) if
    /// `length` exceeds the space remaining before the current bound.
    pub(crate) fn push_bound(&mut self, length: usize) -> bool {
        match self.position.checked_add(length) {
            Some(inner) if inner <= self.max => {
                self.outer.push(self.max);
                self.max = inner;
                true
            }
            _ => false,
        }
    }

    /// Pops the innermost bound, restoring the enclosing one, and returns
    /// the number of bytes of the popped view left unconsumed.
    pub(crate) fn pop_bound(&mut self) -> usize {
        debug_assert!(!self.outer.is_empty());
        let leftover = self.max - self.position;
        if let Some(outer) = self.outer.pop() {
            self.max = outer;
        }
        leftover
    }

    /// Reads a little-endian `u32` from the next four bytes.
    pub fn read_u32_le(&mut self) -> Result<u32> {
        let bytes = self.next_bytes(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
    }

    /// Decodes a LEB128 integer with `bits` effective bits into storage `T`.
    ///
    /// Each input byte contributes its low seven bits to the result, lowest
    /// group first, until a byte without the continuation bit terminates the
    /// value. Once fewer than seven effective bits remain the final group is
    /// range-checked: unsigned values must fit the remaining magnitude, and
    /// signed values must either fit the remaining positive range or carry
    /// an all-ones sign-extension pattern in the leftover payload bits.
    /// Exactly one byte past the declared width is consumed before erroring,
    /// so the error offset reflects the true truncation point.
    pub(crate) fn read_leb128<T: Storage>(&mut self, bits: u8) -> Result<T> {
        let total = bits.min(T::WIDTH);
        let mut value = BitInt::<T>::new(total);
        let mut remaining = total;
        while remaining > 0 {
            let offset = self.position;
            let byte = self.next_byte()?;
            let magnitude = byte & 0x7f;

            let fits = if remaining >= 7 {
                true
            } else if T::SIGNED && magnitude & (1 << (remaining - 1)) != 0 {
                // The group's top effective bit is a sign bit; the payload
                // bits above it must all be ones.
                magnitude >> (remaining - 1) == 0x7f >> (remaining - 1)
            } else {
                magnitude <= BitInt::<u8>::new(remaining).max().value()
            };
            if !fits {
                return Err(Self::leb_overflow::<T>(total, offset, false));
            }

            value = value.or(BitInt::from_byte(total, magnitude).lshift(total - remaining));
            if byte & 0x80 == 0 {
                if remaining <= 7 {
                    return Ok(value.value());
                }
                // Terminated before the full width was supplied; shift the
                // unused bits out and back in, which sign-extends signed
                // storage.
                remaining -= 7;
                return Ok(value.lshift(remaining).rshift(remaining).value());
            } else if remaining <= 7 {
                return Err(Self::leb_overflow::<T>(total, offset, true));
            }
            remaining -= 7;
        }
        Ok(value.value())
    }

    #[cold]
    fn leb_overflow<T: Storage>(bits: u8, offset: usize, too_long: bool) -> DecodeError {
        let sign = if T::SIGNED { "s" } else { "u" };
        let what = if too_long {
            "integer representation too long"
        } else {
            "integer too large"
        };
        format_err!(offset, "invalid var_{sign}{bits}: {what}")
    }

    /// Decodes a variable-length integer as a `u32`.
    pub fn read_var_u32(&mut self) -> Result<u32> {
        self.read_leb128::<u32>(32)
    }

    /// Decodes a variable-length integer as an `i32`.
    pub fn read_var_i32(&mut self) -> Result<i32> {
        self.read_leb128::<i32>(32)
    }

    /// Decodes a variable-length signed 33-bit integer, returned as an
    /// `i64`. This width is used by block type discriminants.
    pub fn read_var_s33(&mut self) -> Result<i64> {
        self.read_leb128::<i64>(33)
    }

    /// Decodes a variable-length integer as an `i64`.
    pub fn read_var_i64(&mut self) -> Result<i64> {
        self.read_leb128::<i64>(64)
    }

    /// Reads a 32-bit IEEE-754 float from the next four little-endian bytes.
    pub fn read_f32(&mut self) -> Result<f32> {
        let bytes = self.next_bytes(4)?;
        Ok(f32::from_le_bytes(bytes.try_into().unwrap()))
    }

    /// Reads a 64-bit IEEE-754 float from the next eight little-endian bytes.
    pub fn read_f64(&mut self) -> Result<f64> {
        let bytes = self.next_bytes(8)?;
        Ok(f64::from_le_bytes(bytes.try_into().unwrap()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_starts_at_beginning() {
        let cursor = Cursor::new(&[0, 1]);
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn try_next_byte_none_when_empty() {
        let mut cursor = Cursor::new(&[]);
        assert!(cursor.try_next_byte().is_none());
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn try_next_byte_produces_bytes_in_order() {
        let mut cursor = Cursor::new(&[0xf0, 0xa0]);
        assert_eq!(cursor.try_next_byte(), Some(0xf0));
        assert_eq!(cursor.position(), 1);
        assert_eq!(cursor.try_next_byte(), Some(0xa0));
        assert_eq!(cursor.position(), 2);
        assert_eq!(cursor.try_next_byte(), None);
    }

    #[test]
    fn next_bytes_is_all_or_nothing() {
        let mut cursor = Cursor::new(&[1, 2, 3]);
        assert!(cursor.next_bytes(4).is_err());
        assert_eq!(cursor.next_bytes(3).unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn eof_at_root_is_unexpected_end() {
        let mut cursor = Cursor::new(&[]);
        let err = cursor.next_byte().unwrap_err();
        assert!(err.message().contains("unexpected end of input"));
    }

    #[test]
    fn bounds_share_the_position() {
        let mut cursor = Cursor::new(&[1, 2, 3, 4]);
        assert!(cursor.push_bound(2));
        assert_eq!(cursor.next_byte().unwrap(), 1);
        assert_eq!(cursor.next_byte().unwrap(), 2);
        assert_eq!(cursor.pop_bound(), 0);
        // The outer view resumes where the inner one stopped.
        assert_eq!(cursor.next_byte().unwrap(), 3);
    }

    #[test]
    fn reading_past_a_bound_is_a_size_mismatch() {
        let mut cursor = Cursor::new(&[1, 2, 3, 4]);
        assert!(cursor.push_bound(1));
        cursor.next_byte().unwrap();
        let err = cursor.next_byte().unwrap_err();
        assert!(err.message().contains("size does not match"));
        assert_eq!(cursor.pop_bound(), 0);
    }

    #[test]
    fn bound_larger_than_remaining_is_rejected() {
        let mut cursor = Cursor::new(&[1, 2]);
        assert!(!cursor.push_bound(3));
        assert!(cursor.push_bound(2));
        // A child bound can never widen its parent.
        assert!(!cursor.push_bound(3));
    }

    #[test]
    fn pop_reports_unconsumed_bytes() {
        let mut cursor = Cursor::new(&[1, 2, 3]);
        assert!(cursor.push_bound(3));
        cursor.next_byte().unwrap();
        assert_eq!(cursor.pop_bound(), 2);
    }

    #[test]
    fn uleb_u8_valid() {
        let cases: &[(&[u8], u8)] = &[
            (&[0b0111_1111], 0b0111_1111),
            (&[0b1111_1111, 0b0000_0000], 0b0111_1111),
            (&[0b1000_0000, 0b0000_0001], 0b1000_0000),
            (&[0b1000_1010, 0b0000_0001], 0b1000_1010),
            (&[0b1111_1111, 0b0000_0001], 0b1111_1111),
        ];
        for (input, expected) in cases {
            let mut cursor = Cursor::new(input);
            assert_eq!(cursor.read_leb128::<u8>(8).unwrap(), *expected);
            assert_eq!(cursor.position(), input.len());
        }
    }

    #[test]
    fn uleb_u8_too_large() {
        let cases: &[&[u8]] = &[
            &[0b1111_1111, 0b0000_0010],
            &[0b1000_0000, 0b1000_0000],
            &[0b1000_1010, 0b0001_0001],
            &[0b1000_0000, 0b0000_0010],
        ];
        for input in cases {
            let mut cursor = Cursor::new(input);
            let err = cursor.read_leb128::<u8>(8).unwrap_err();
            assert!(err.message().contains("invalid var_u8"), "{err}");
            // Exactly one byte past the width is consumed before erroring.
            assert_eq!(cursor.position(), 2);
        }
    }

    #[test]
    fn uleb_u16_valid() {
        let cases: &[(&[u8], u16)] = &[
            (&[0b0111_1111], 0b0_0000000_1111111),
            (&[0b1111_1111, 0b0000_0000], 0b0_0000000_1111111),
            (&[0b1000_0000, 0b0000_0001], 0b0_0000001_0000000),
            (&[0b1000_1010, 0b0000_0001], 0b0_0000001_0001010),
            (&[0b1000_1010, 0b0001_0001], 0b0_0010001_0001010),
            (
                &[0b1000_1010, 0b1001_0001, 0b0000_0010],
                0b10_0010001_0001010,
            ),
            (
                &[0b1111_1111, 0b1111_1111, 0b0000_0011],
                0b11_1111111_1111111,
            ),
        ];
        for (input, expected) in cases {
            let mut cursor = Cursor::new(input);
            assert_eq!(cursor.read_leb128::<u16>(16).unwrap(), *expected);
            assert_eq!(cursor.position(), input.len());
        }
    }

    #[test]
    fn uleb_u16_too_large() {
        let cases: &[&[u8]] = &[
            &[0b1000_1010, 0b1001_0001, 0b0100_0010],
            &[0b1000_0000, 0b1000_0000, 0b0000_0100],
            &[0b1000_0000, 0b1000_0000, 0b1000_0000],
        ];
        for input in cases {
            let mut cursor = Cursor::new(input);
            let err = cursor.read_leb128::<u16>(16).unwrap_err();
            assert!(err.message().contains("invalid var_u16"), "{err}");
            assert_eq!(cursor.position(), 3);
        }
    }

    #[test]
    fn sleb_i16_valid() {
        let cases: &[(&[u8], i16)] = &[
            (&[0b0111_1111], -1),
            (&[0b1111_1111, 0b0000_0000], 0b0_0000000_1111111),
            (&[0b1000_0000, 0b0000_0001], 0b0_0000001_0000000),
            (
                &[0b1000_0000, 0b0100_0001],
                0b11_1000001_0000000_u16 as i16,
            ),
            (&[0b1000_1010, 0b0000_0001], 0b0_0000001_0001010),
            (&[0b1111_1111, 0b0000_0001], 0b0_0000001_1111111),
            (
                &[0b1000_1010, 0b1001_0001, 0b0111_1110],
                0b10_0010001_0001010_u16 as i16,
            ),
            (
                &[0b1000_1010, 0b1001_0001, 0b0000_0001],
                0b01_0010001_0001010,
            ),
            (&[0b1111_1111, 0b1111_1111, 0b0111_1111], -1),
        ];
        for (input, expected) in cases {
            let mut cursor = Cursor::new(input);
            assert_eq!(cursor.read_leb128::<i16>(16).unwrap(), *expected);
            assert_eq!(cursor.position(), input.len());
        }
    }

    #[test]
    fn sleb_final_group_must_be_canonical() {
        // Two effective bits remain; a set sign bit requires the payload
        // bits above it to be all ones.
        let cases: &[&[u8]] = &[
            &[0b1000_0000, 0b1000_0000, 0b0100_0010],
            &[0b1111_1111, 0b1111_1111, 0b0000_0011],
            &[0b1000_1010, 0b1001_0001, 0b0000_0010],
        ];
        for input in cases {
            let mut cursor = Cursor::new(input);
            let err = cursor.read_leb128::<i16>(16).unwrap_err();
            assert!(err.message().contains("invalid var_s16"), "{err}");
            assert_eq!(cursor.position(), 3);
        }
    }

    #[test]
    fn sleb_s33_sign_extends() {
        let mut cursor = Cursor::new(&[0x7f]);
        assert_eq!(cursor.read_var_s33().unwrap(), -1);

        // Maximum positive s33: five groups, high group 0x0f.
        let mut cursor = Cursor::new(&[0xff, 0xff, 0xff, 0xff, 0x0f]);
        assert_eq!(cursor.read_var_s33().unwrap(), (1i64 << 32) - 1);

        // Minimum negative s33.
        let mut cursor = Cursor::new(&[0x80, 0x80, 0x80, 0x80, 0x70]);
        assert_eq!(cursor.read_var_s33().unwrap(), -(1i64 << 32));
    }

    #[test]
    fn uleb_u32_boundary() {
        let mut cursor = Cursor::new(&[0xff, 0xff, 0xff, 0xff, 0x0f]);
        assert_eq!(cursor.read_var_u32().unwrap(), u32::MAX);

        let mut cursor = Cursor::new(&[0xff, 0xff, 0xff, 0xff, 0x1f]);
        let err = cursor.read_var_u32().unwrap_err();
        assert!(err.message().contains("invalid var_u32"), "{err}");
    }

    #[test]
    fn float_little_endian() {
        let mut cursor = Cursor::new(&[0b0000_0000, 0b0000_0000, 0b0100_0110, 0b0100_0001]);
        assert_eq!(cursor.read_f32().unwrap(), 12.375);
        assert_eq!(cursor.position(), 4);

        let bytes = 12.375f64.to_le_bytes();
        let mut cursor = Cursor::new(&bytes);
        assert_eq!(cursor.read_f64().unwrap(), 12.375);
    }

    #[test]
    fn varint_truncated_input() {
        let mut cursor = Cursor::new(&[0x80]);
        let err = cursor.read_var_u32().unwrap_err();
        assert!(err.message().contains("unexpected end of input"), "{err}");
    }
}
