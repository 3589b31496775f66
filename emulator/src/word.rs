//! Integer semantics of memory cells
//!
//! Every machine stores [`Word`]s in its memory. The fixed-width
//! implementations wrap around on overflow exactly like the hardware they
//! model, while [`BigInt`] never overflows.

use std::cmp::Ordering;
use std::fmt::{Debug, Display};

use num_bigint::BigInt;
use num_traits::{Num, ToPrimitive, Zero};

/// Arithmetic needed by the machines on a memory cell
pub trait Word: Clone + Default + PartialEq + Debug + Display + 'static {
    /// Short name of the representation, used in diagnostics
    const NAME: &'static str;

    /// Build a word from an assembled value, truncating it to the word width
    fn from_i64(value: i64) -> Self;

    /// Build a word from an assembled value, if the word can represent it
    fn checked_from_i64(value: i64) -> Option<Self>;

    /// Build a word from the digits of a literal in base `radix`
    fn from_literal(negative: bool, digits: &str, radix: u32) -> Option<Self> {
        literal_value(negative, digits, radix).and_then(Self::checked_from_i64)
    }

    /// Read the word as a signed integer, if it fits in one
    fn to_i64(&self) -> Option<i64>;

    fn plus(&self, rhs: &Self) -> Self;

    fn minus(&self, rhs: &Self) -> Self;

    fn and(&self, rhs: &Self) -> Self;

    fn or(&self, rhs: &Self) -> Self;

    /// Logical shift to the left, dropping the bits shifted past the width
    fn shifted_left(&self, bits: u32) -> Self;

    /// Compare the word with zero
    fn cmp_zero(&self) -> Ordering;

    /// Compare two words with the signedness of the representation
    fn compare(&self, other: &Self) -> Ordering;

    fn is_zero(&self) -> bool {
        self.cmp_zero() == Ordering::Equal
    }

    fn increment(&self) -> Self {
        self.plus(&Self::from_i64(1))
    }

    fn decrement(&self) -> Self {
        self.minus(&Self::from_i64(1))
    }

    /// Interpret the word as a shift amount
    fn shift_amount(&self) -> Option<u32> {
        self.to_i64().and_then(|bits| u32::try_from(bits).ok())
    }
}

/// Value of a literal, if it fits in an `i64`
#[must_use]
pub fn literal_value(negative: bool, digits: &str, radix: u32) -> Option<i64> {
    let magnitude = i128::from(u64::from_str_radix(digits, radix).ok()?);
    i64::try_from(if negative { -magnitude } else { magnitude }).ok()
}

/// Unsigned 32-bit cells. Sign tests reinterpret the bits as a two's
/// complement integer.
impl Word for u32 {
    const NAME: &'static str = "u32";

    fn from_i64(value: i64) -> Self {
        value as u32
    }

    /// Negative values down to `i32::MIN` are stored in two's complement
    fn checked_from_i64(value: i64) -> Option<Self> {
        u32::try_from(value)
            .ok()
            .or_else(|| i32::try_from(value).ok().map(|value| value as u32))
    }

    fn to_i64(&self) -> Option<i64> {
        Some(i64::from(*self))
    }

    fn plus(&self, rhs: &Self) -> Self {
        self.wrapping_add(*rhs)
    }

    fn minus(&self, rhs: &Self) -> Self {
        self.wrapping_sub(*rhs)
    }

    fn and(&self, rhs: &Self) -> Self {
        self & rhs
    }

    fn or(&self, rhs: &Self) -> Self {
        self | rhs
    }

    fn shifted_left(&self, bits: u32) -> Self {
        self.checked_shl(bits).unwrap_or(0)
    }

    fn cmp_zero(&self) -> Ordering {
        (*self as i32).cmp(&0)
    }

    fn compare(&self, other: &Self) -> Ordering {
        (*self as i32).cmp(&(*other as i32))
    }
}

impl Word for i32 {
    const NAME: &'static str = "i32";

    fn from_i64(value: i64) -> Self {
        value as i32
    }

    fn checked_from_i64(value: i64) -> Option<Self> {
        i32::try_from(value).ok()
    }

    fn to_i64(&self) -> Option<i64> {
        Some(i64::from(*self))
    }

    fn plus(&self, rhs: &Self) -> Self {
        self.wrapping_add(*rhs)
    }

    fn minus(&self, rhs: &Self) -> Self {
        self.wrapping_sub(*rhs)
    }

    fn and(&self, rhs: &Self) -> Self {
        self & rhs
    }

    fn or(&self, rhs: &Self) -> Self {
        self | rhs
    }

    fn shifted_left(&self, bits: u32) -> Self {
        self.checked_shl(bits).unwrap_or(0)
    }

    fn cmp_zero(&self) -> Ordering {
        self.cmp(&0)
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

impl Word for i64 {
    const NAME: &'static str = "i64";

    fn from_i64(value: i64) -> Self {
        value
    }

    fn checked_from_i64(value: i64) -> Option<Self> {
        Some(value)
    }

    fn to_i64(&self) -> Option<i64> {
        Some(*self)
    }

    fn plus(&self, rhs: &Self) -> Self {
        self.wrapping_add(*rhs)
    }

    fn minus(&self, rhs: &Self) -> Self {
        self.wrapping_sub(*rhs)
    }

    fn and(&self, rhs: &Self) -> Self {
        self & rhs
    }

    fn or(&self, rhs: &Self) -> Self {
        self | rhs
    }

    fn shifted_left(&self, bits: u32) -> Self {
        self.checked_shl(bits).unwrap_or(0)
    }

    fn cmp_zero(&self) -> Ordering {
        self.cmp(&0)
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

/// Arbitrary precision cells. Bitwise operations use an infinite two's
/// complement representation.
impl Word for BigInt {
    const NAME: &'static str = "bigint";

    fn from_i64(value: i64) -> Self {
        BigInt::from(value)
    }

    fn checked_from_i64(value: i64) -> Option<Self> {
        Some(BigInt::from(value))
    }

    fn from_literal(negative: bool, digits: &str, radix: u32) -> Option<Self> {
        let magnitude = <BigInt as Num>::from_str_radix(digits, radix).ok()?;
        Some(if negative { -magnitude } else { magnitude })
    }

    fn to_i64(&self) -> Option<i64> {
        ToPrimitive::to_i64(self)
    }

    fn plus(&self, rhs: &Self) -> Self {
        self + rhs
    }

    fn minus(&self, rhs: &Self) -> Self {
        self - rhs
    }

    fn and(&self, rhs: &Self) -> Self {
        self & rhs
    }

    fn or(&self, rhs: &Self) -> Self {
        self | rhs
    }

    fn shifted_left(&self, bits: u32) -> Self {
        self << bits
    }

    fn cmp_zero(&self) -> Ordering {
        if Zero::is_zero(self) {
            Ordering::Equal
        } else if self.sign() == num_bigint::Sign::Minus {
            Ordering::Less
        } else {
            Ordering::Greater
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u32_wraps_test() {
        assert_eq!(u32::MAX.plus(&1), 0);
        assert_eq!(0_u32.minus(&1), u32::MAX);
        assert_eq!(4094_u32.plus(&6), 4100);
        assert_eq!(0x8000_0000_u32.shifted_left(1), 0);
        assert_eq!(1_u32.shifted_left(40), 0);
        assert_eq!(u32::from_i64(-1), u32::MAX);
    }

    #[test]
    fn u32_sign_is_reinterpreted_test() {
        assert_eq!(0_u32.cmp_zero(), Ordering::Equal);
        assert_eq!(5_u32.cmp_zero(), Ordering::Greater);
        assert_eq!(u32::MAX.cmp_zero(), Ordering::Less);
        assert_eq!(u32::MAX.compare(&1), Ordering::Less);
    }

    #[test]
    fn i32_wraps_test() {
        assert_eq!(i32::MAX.minus(&-1), i32::MIN);
        assert_eq!(i32::MIN.decrement(), i32::MAX);
        assert_eq!(i32::from_i64(0x1_0000_0005), 5);
        assert_eq!((-3_i32).cmp_zero(), Ordering::Less);
    }

    #[test]
    fn i64_wraps_test() {
        assert_eq!(i64::MAX.increment(), i64::MIN);
        assert_eq!(1_i64.shifted_left(63), i64::MIN);
        assert_eq!(1_i64.shifted_left(64), 0);
    }

    #[test]
    fn bigint_never_wraps_test() {
        let big = BigInt::from(i64::MAX).increment();
        assert_eq!(Word::to_i64(&big), None);
        assert_eq!(big.cmp_zero(), Ordering::Greater);
        assert_eq!(
            BigInt::from(1).shifted_left(100),
            BigInt::from(1_u128 << 100)
        );
        assert_eq!(BigInt::from(-5).cmp_zero(), Ordering::Less);
        assert!(Word::is_zero(&BigInt::default()));
    }

    #[test]
    fn bigint_bitwise_test() {
        let a = BigInt::from(0b1100);
        let b = BigInt::from(0b1010);
        assert_eq!(a.and(&b), BigInt::from(0b1000));
        assert_eq!(a.or(&b), BigInt::from(0b1110));
    }

    #[test]
    fn checked_from_i64_test() {
        assert_eq!(u32::checked_from_i64(4_294_967_295), Some(u32::MAX));
        assert_eq!(u32::checked_from_i64(-1), Some(u32::MAX));
        assert_eq!(u32::checked_from_i64(-2_147_483_648), Some(0x8000_0000));
        assert_eq!(u32::checked_from_i64(4_294_967_296), None);
        assert_eq!(u32::checked_from_i64(-2_147_483_649), None);
        assert_eq!(i32::checked_from_i64(4_294_967_295), None);
        assert_eq!(i32::checked_from_i64(-5), Some(-5));
        assert_eq!(i64::checked_from_i64(i64::MIN), Some(i64::MIN));
    }

    #[test]
    fn from_literal_test() {
        assert_eq!(literal_value(true, "8000000000000000", 16), Some(i64::MIN));
        assert_eq!(literal_value(false, "8000000000000000", 16), None);
        assert_eq!(i64::from_literal(false, "ff", 16), Some(255));
        assert_eq!(u32::from_literal(false, "100000000", 16), None);
        assert_eq!(
            BigInt::from_literal(false, "100000000000000000000", 10),
            Some(BigInt::from(10_u128.pow(20)))
        );
        assert_eq!(
            BigInt::from_literal(true, "10000000000000000", 16),
            Some(-BigInt::from(1_u128 << 64))
        );
    }

    #[test]
    fn shift_amount_test() {
        assert_eq!(3_i64.shift_amount(), Some(3));
        assert_eq!((-3_i64).shift_amount(), None);
        assert_eq!(BigInt::from(1).shifted_left(70).shift_amount(), None);
    }
}
