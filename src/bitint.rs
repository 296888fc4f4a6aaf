//! Fixed-storage integers carrying a declared *effective* bit width.
//!
//! The LEB128 codec is generic over the width of the integer it decodes, and
//! that width is not always the width of a native type (block types use a
//! 33-bit signed integer). `BitInt` pairs a native storage type with a
//! runtime effective width no larger than the storage width; every operation
//! truncates back to the effective width, sign-extending for signed storage,
//! so overflow handling stays a policy decision of the codec above.

/// A native integer type usable as backing storage for a [`BitInt`].
pub(crate) trait Storage: Copy + Eq + core::fmt::Debug {
    /// Bit width of the storage type itself.
    const WIDTH: u8;
    /// Whether the storage type is two's-complement signed.
    const SIGNED: bool;

    fn zero() -> Self;
    fn from_byte(byte: u8) -> Self;
    fn bitor(self, other: Self) -> Self;
    fn shl(self, amount: u8) -> Self;
    /// Right shift; arithmetic (sign-propagating) for signed storage.
    fn shr(self, amount: u8) -> Self;
    /// Little-endian byte `index` of the value, `0` past the storage width.
    #[allow(dead_code)]
    fn le_byte(self, index: u8) -> u8;
    /// Truncate to the low `bits` bits, sign-extending the result for signed
    /// storage. A width of `Self::WIDTH` or more is the identity.
    fn mask_to(self, bits: u8) -> Self;
    /// The largest magnitude representable in `bits` effective bits.
    fn max_value(bits: u8) -> Self;
}

macro_rules! impl_storage {
    ($($ty:ident = $signed:expr;)*) => ($(
        impl Storage for $ty {
            const WIDTH: u8 = <$ty>::BITS as u8;
            const SIGNED: bool = $signed;

            fn zero() -> Self {
                0
            }

            fn from_byte(byte: u8) -> Self {
                byte as $ty
            }

            fn bitor(self, other: Self) -> Self {
                self | other
            }

            fn shl(self, amount: u8) -> Self {
                if amount >= Self::WIDTH {
                    0
                } else {
                    self << amount
                }
            }

            fn shr(self, amount: u8) -> Self {
                if amount >= Self::WIDTH {
                    self >> (Self::WIDTH - 1)
                } else {
                    self >> amount
                }
            }

            fn le_byte(self, index: u8) -> u8 {
                if u32::from(index) * 8 >= u32::from(Self::WIDTH) {
                    0
                } else {
                    (self >> (index * 8)) as u8
                }
            }

            fn mask_to(self, bits: u8) -> Self {
                if bits == 0 {
                    0
                } else if bits >= Self::WIDTH {
                    self
                } else {
                    let unused = Self::WIDTH - bits;
                    (self << unused) >> unused
                }
            }

            fn max_value(bits: u8) -> Self {
                let bits = bits.min(Self::WIDTH);
                if $signed {
                    if bits <= 1 {
                        0
                    } else if bits == Self::WIDTH {
                        <$ty>::MAX
                    } else {
                        (1 << (bits - 1)) - 1
                    }
                } else if bits == Self::WIDTH {
                    <$ty>::MAX
                } else {
                    (1 << bits) - 1
                }
            }
        }
    )*)
}

impl_storage! {
    u8 = false;
    u16 = false;
    u32 = false;
    u64 = false;
    i8 = true;
    i16 = true;
    i32 = true;
    i64 = true;
}

/// An immutable integer value with a declared effective bit width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BitInt<T: Storage> {
    bits: u8,
    value: T,
}

impl<T: Storage> BitInt<T> {
    /// A zero value of `bits` effective bits, clamped to the storage width.
    pub fn new(bits: u8) -> Self {
        BitInt {
            bits: bits.min(T::WIDTH),
            value: T::zero(),
        }
    }

    /// Widens `byte` into a value of `bits` effective bits, truncating any
    /// bits beyond the declared width.
    pub fn from_byte(bits: u8, byte: u8) -> Self {
        let bits = bits.min(T::WIDTH);
        BitInt {
            bits,
            value: T::from_byte(byte).mask_to(bits),
        }
    }

    /// Bitwise OR, keeping this value's declared width.
    pub fn or(self, other: Self) -> Self {
        BitInt {
            bits: self.bits,
            value: self.value.bitor(other.value).mask_to(self.bits),
        }
    }

    /// Shift left by `amount`, dropping bits beyond the declared width.
    pub fn lshift(self, amount: u8) -> Self {
        BitInt {
            bits: self.bits,
            value: self.value.shl(amount).mask_to(self.bits),
        }
    }

    /// Shift right by `amount`; sign-propagating for signed storage, which
    /// is what performs sign extension after [`BitInt::lshift`].
    pub fn rshift(self, amount: u8) -> Self {
        BitInt {
            bits: self.bits,
            value: self.value.shr(amount).mask_to(self.bits),
        }
    }

    /// The largest magnitude representable in the declared width.
    pub fn max(self) -> Self {
        BitInt {
            bits: self.bits,
            value: T::max_value(self.bits),
        }
    }

    /// Little-endian byte `index` of the value, `0` past the storage width.
    #[allow(dead_code)]
    pub fn le_byte(self, index: u8) -> u8 {
        self.value.le_byte(index)
    }

    /// The underlying storage value.
    pub fn value(self) -> T {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_max_tracks_effective_width() {
        assert_eq!(BitInt::<u8>::new(8).max().value(), 0xff);
        assert_eq!(BitInt::<u8>::new(3).max().value(), 0b111);
        assert_eq!(BitInt::<u32>::new(32).max().value(), u32::MAX);
        assert_eq!(BitInt::<u32>::new(7).max().value(), 0x7f);
        assert_eq!(BitInt::<u64>::new(33).max().value(), (1u64 << 33) - 1);
    }

    #[test]
    fn signed_max_tracks_effective_width() {
        assert_eq!(BitInt::<i8>::new(8).max().value(), 0x7f);
        assert_eq!(BitInt::<i16>::new(16).max().value(), i16::MAX);
        assert_eq!(BitInt::<i64>::new(33).max().value(), (1i64 << 32) - 1);
    }

    #[test]
    fn from_byte_truncates_to_width() {
        assert_eq!(BitInt::<u8>::from_byte(4, 0xff).value(), 0x0f);
        assert_eq!(BitInt::<u16>::from_byte(16, 0x7f).value(), 0x7f);
    }

    #[test]
    fn signed_truncation_sign_extends() {
        // 0b1010 in four effective bits is -6.
        assert_eq!(BitInt::<i8>::from_byte(4, 0b1010).value(), -6);
        assert_eq!(BitInt::<i16>::from_byte(4, 0b0101).value(), 5);
    }

    #[test]
    fn lshift_drops_high_bits() {
        let v = BitInt::<u8>::from_byte(4, 0b0110).lshift(2);
        assert_eq!(v.value(), 0b1000);
    }

    #[test]
    fn shift_pair_sign_extends() {
        // Loading 0x7f into a wider signed value and shifting it up to the
        // top then back down is how the codec sign-extends terminated reads.
        let v = BitInt::<i16>::from_byte(16, 0x7f);
        assert_eq!(v.lshift(9).rshift(9).value(), -1);
    }

    #[test]
    fn le_byte_extraction() {
        let v = BitInt::<u32>::from_byte(32, 0xab).lshift(8);
        assert_eq!(v.le_byte(0), 0);
        assert_eq!(v.le_byte(1), 0xab);
        assert_eq!(v.le_byte(4), 0);
        assert_eq!(BitInt::<u8>::from_byte(8, 0x12).le_byte(1), 0);
    }
}
