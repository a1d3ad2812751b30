//! 256-bit integers with an exact two's-complement byte layout.
//!
//! The widest column types carry 256-bit integers on the wire. These are
//! plain value types over four little-endian 64-bit limbs; round-tripping
//! through `to_le_bytes`/`from_le_bytes` reproduces the wire bytes exactly.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Unsigned 256-bit integer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct U256(pub(crate) [u64; 4]);

/// Signed 256-bit integer (two's complement).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct I256(pub(crate) [u64; 4]);

impl U256 {
    /// Zero.
    pub const ZERO: U256 = U256([0; 4]);

    /// Maximum representable value.
    pub const MAX: U256 = U256([u64::MAX; 4]);

    /// Reconstructs a value from 32 little-endian bytes.
    pub fn from_le_bytes(bytes: [u8; 32]) -> Self {
        let mut limbs = [0u64; 4];
        for (i, limb) in limbs.iter_mut().enumerate() {
            let mut word = [0u8; 8];
            word.copy_from_slice(&bytes[i * 8..i * 8 + 8]);
            *limb = u64::from_le_bytes(word);
        }
        U256(limbs)
    }

    /// Returns the 32 little-endian bytes of this value.
    pub fn to_le_bytes(self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        for (i, limb) in self.0.iter().enumerate() {
            bytes[i * 8..i * 8 + 8].copy_from_slice(&limb.to_le_bytes());
        }
        bytes
    }

    /// Converts a `u128` without loss.
    pub fn from_u128(value: u128) -> Self {
        U256([value as u64, (value >> 64) as u64, 0, 0])
    }

    /// Converts back to `u128` if the value fits.
    pub fn to_u128(self) -> Option<u128> {
        if self.0[2] != 0 || self.0[3] != 0 {
            return None;
        }
        Some(self.0[0] as u128 | (self.0[1] as u128) << 64)
    }

    /// Converts back to `u64` if the value fits.
    pub fn to_u64(self) -> Option<u64> {
        self.to_u128().and_then(|v| u64::try_from(v).ok())
    }

    /// Approximate conversion to `f64`.
    pub fn to_f64(self) -> f64 {
        self.0
            .iter()
            .enumerate()
            .map(|(i, &limb)| limb as f64 * 2f64.powi(64 * i as i32))
            .sum()
    }

    /// Two's-complement negation.
    pub(crate) fn wrapping_neg(self) -> Self {
        let mut limbs = [0u64; 4];
        let mut carry = 1u64;
        for (out, &limb) in limbs.iter_mut().zip(self.0.iter()) {
            let (v, c) = (!limb).overflowing_add(carry);
            *out = v;
            carry = u64::from(c);
        }
        U256(limbs)
    }

    /// `self * 10 + digit`, or `None` on overflow.
    pub(crate) fn checked_mul10_add(self, digit: u64) -> Option<Self> {
        let mut limbs = [0u64; 4];
        let mut carry = digit as u128;
        for (out, &limb) in limbs.iter_mut().zip(self.0.iter()) {
            let cur = limb as u128 * 10 + carry;
            *out = cur as u64;
            carry = cur >> 64;
        }
        if carry != 0 {
            return None;
        }
        Some(U256(limbs))
    }

    /// Divides by a small divisor, returning quotient and remainder.
    pub(crate) fn divmod_u64(self, divisor: u64) -> (Self, u64) {
        let mut quotient = [0u64; 4];
        let mut remainder = 0u128;
        for i in (0..4).rev() {
            let cur = (remainder << 64) | self.0[i] as u128;
            quotient[i] = (cur / divisor as u128) as u64;
            remainder = cur % divisor as u128;
        }
        (U256(quotient), remainder as u64)
    }

    fn is_zero(self) -> bool {
        self.0 == [0; 4]
    }
}

impl I256 {
    /// Zero.
    pub const ZERO: I256 = I256([0; 4]);

    /// Minimum representable value.
    pub const MIN: I256 = I256([0, 0, 0, 1 << 63]);

    /// Maximum representable value.
    pub const MAX: I256 = I256([u64::MAX, u64::MAX, u64::MAX, u64::MAX >> 1]);

    /// Reconstructs a value from 32 little-endian bytes.
    pub fn from_le_bytes(bytes: [u8; 32]) -> Self {
        I256(U256::from_le_bytes(bytes).0)
    }

    /// Returns the 32 little-endian bytes of this value.
    pub fn to_le_bytes(self) -> [u8; 32] {
        U256(self.0).to_le_bytes()
    }

    /// Sign-extends an `i128`.
    pub fn from_i128(value: i128) -> Self {
        let ext = if value < 0 { u64::MAX } else { 0 };
        I256([value as u64, (value >> 64) as u64, ext, ext])
    }

    /// Converts an unsigned value that fits in the positive range.
    pub fn from_u128(value: u128) -> Self {
        I256([value as u64, (value >> 64) as u64, 0, 0])
    }

    /// True if the sign bit is set.
    pub fn is_negative(self) -> bool {
        self.0[3] >> 63 == 1
    }

    /// Converts back to `i128` if the value fits.
    pub fn to_i128(self) -> Option<i128> {
        let low = self.0[0] as u128 | (self.0[1] as u128) << 64;
        let ext = if (low >> 127) & 1 == 1 { u64::MAX } else { 0 };
        if self.0[2] != ext || self.0[3] != ext {
            return None;
        }
        Some(low as i128)
    }

    /// Converts back to `i64` if the value fits.
    pub fn to_i64(self) -> Option<i64> {
        self.to_i128().and_then(|v| i64::try_from(v).ok())
    }

    /// Converts to `u128` if the value is non-negative and fits.
    pub fn to_u128(self) -> Option<u128> {
        if self.is_negative() {
            return None;
        }
        U256(self.0).to_u128()
    }

    /// Approximate conversion to `f64`.
    pub fn to_f64(self) -> f64 {
        if self.is_negative() {
            -U256(self.0).wrapping_neg().to_f64()
        } else {
            U256(self.0).to_f64()
        }
    }

    /// Magnitude as an unsigned value.
    pub(crate) fn unsigned_abs(self) -> U256 {
        if self.is_negative() {
            U256(self.0).wrapping_neg()
        } else {
            U256(self.0)
        }
    }

    /// Two's-complement negation.
    pub fn wrapping_neg(self) -> Self {
        I256(U256(self.0).wrapping_neg().0)
    }

    /// Multiplies by 10^exp, or `None` on overflow.
    pub(crate) fn checked_mul_pow10(self, exp: u32) -> Option<Self> {
        let negative = self.is_negative();
        let mut magnitude = self.unsigned_abs();
        for _ in 0..exp {
            magnitude = magnitude.checked_mul10_add(0)?;
        }
        let limit = if negative { I256::MIN.unsigned_abs() } else { I256::MAX.unsigned_abs() };
        if magnitude > limit {
            return None;
        }
        Some(if negative {
            I256(magnitude.wrapping_neg().0)
        } else {
            I256(magnitude.0)
        })
    }
}

impl From<u64> for U256 {
    fn from(value: u64) -> Self {
        U256::from_u128(value as u128)
    }
}

impl From<u128> for U256 {
    fn from(value: u128) -> Self {
        U256::from_u128(value)
    }
}

impl From<i64> for I256 {
    fn from(value: i64) -> Self {
        I256::from_i128(value as i128)
    }
}

impl From<i128> for I256 {
    fn from(value: i128) -> Self {
        I256::from_i128(value)
    }
}

impl Ord for U256 {
    fn cmp(&self, other: &Self) -> Ordering {
        for i in (0..4).rev() {
            match self.0[i].cmp(&other.0[i]) {
                Ordering::Equal => continue,
                ordering => return ordering,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for U256 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for I256 {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_negative(), other.is_negative()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => U256(self.0).cmp(&U256(other.0)),
        }
    }
}

impl PartialOrd for I256 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("0");
        }
        // Peel 19 decimal digits at a time; 10^19 is the largest power of
        // ten that fits in a u64.
        const CHUNK: u64 = 10_000_000_000_000_000_000;
        let mut chunks = Vec::new();
        let mut value = *self;
        while !value.is_zero() {
            let (quotient, remainder) = value.divmod_u64(CHUNK);
            chunks.push(remainder);
            value = quotient;
        }
        let mut out = chunks.pop().unwrap_or(0).to_string();
        for chunk in chunks.iter().rev() {
            out.push_str(&format!("{:019}", chunk));
        }
        f.write_str(&out)
    }
}

impl fmt::Display for I256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            write!(f, "-{}", self.unsigned_abs())
        } else {
            U256(self.0).fmt(f)
        }
    }
}

impl fmt::Debug for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U256({})", self)
    }
}

impl fmt::Debug for I256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I256({})", self)
    }
}

/// Error returned when parsing a 256-bit integer from text fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIntError;

impl fmt::Display for ParseIntError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid 256-bit integer literal")
    }
}

impl std::error::Error for ParseIntError {}

impl FromStr for U256 {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseIntError);
        }
        let mut value = U256::ZERO;
        for c in s.chars() {
            let digit = c.to_digit(10).ok_or(ParseIntError)? as u64;
            value = value.checked_mul10_add(digit).ok_or(ParseIntError)?;
        }
        Ok(value)
    }
}

impl FromStr for I256 {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let magnitude: U256 = digits.parse()?;
        let limit = if negative { I256::MIN.unsigned_abs() } else { I256::MAX.unsigned_abs() };
        if magnitude > limit {
            return Err(ParseIntError);
        }
        Ok(if negative {
            I256(magnitude.wrapping_neg().0)
        } else {
            I256(magnitude.0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_le_bytes_roundtrip() {
        let value = I256::from_i128(-123456789012345678901234567890i128);
        let bytes = value.to_le_bytes();
        assert_eq!(I256::from_le_bytes(bytes), value);

        let value = U256::from_u128(u128::MAX);
        assert_eq!(U256::from_le_bytes(value.to_le_bytes()), value);
    }

    #[test]
    fn test_negative_layout_is_twos_complement() {
        let minus_one = I256::from_i128(-1);
        assert_eq!(minus_one.to_le_bytes(), [0xFF; 32]);
        assert!(minus_one.is_negative());
        assert_eq!(minus_one.to_i64(), Some(-1));
    }

    #[test]
    fn test_display() {
        assert_eq!(U256::ZERO.to_string(), "0");
        assert_eq!(U256::from_u128(12345).to_string(), "12345");
        assert_eq!(I256::from_i128(-42).to_string(), "-42");
        assert_eq!(
            U256::from_u128(u128::MAX).to_string(),
            "340282366920938463463374607431768211455"
        );
        assert_eq!(
            U256::MAX.to_string(),
            "115792089237316195423570985008687907853269984665640564039457584007913129639935"
        );
        assert_eq!(
            I256::MIN.to_string(),
            "-57896044618658097711785492504343953926634992332820282019728792003956564819968"
        );
    }

    #[test]
    fn test_parse() {
        let value: U256 = "340282366920938463463374607431768211456".parse().unwrap();
        assert_eq!(value.to_string(), "340282366920938463463374607431768211456");
        assert_eq!(value.to_u128(), None);

        let value: I256 = "-9223372036854775808".parse().unwrap();
        assert_eq!(value.to_i64(), Some(i64::MIN));

        assert!("".parse::<U256>().is_err());
        assert!("12a".parse::<U256>().is_err());
        assert!(U256::MAX.to_string().parse::<U256>().is_ok());
    }

    #[test]
    fn test_parse_overflow() {
        let over = format!("{}0", U256::MAX);
        assert!(over.parse::<U256>().is_err());
        let over = format!("{}0", I256::MAX);
        assert!(over.parse::<I256>().is_err());
    }

    #[test]
    fn test_narrowing() {
        assert_eq!(I256::from_i128(i128::MAX).to_i128(), Some(i128::MAX));
        assert_eq!(I256::from_i128(i128::MIN).to_i128(), Some(i128::MIN));
        assert_eq!(I256::MIN.to_i128(), None);
        assert_eq!(I256::from_i128(-1).to_u128(), None);
        assert_eq!(U256::from_u128(42).to_u64(), Some(42));
    }

    #[test]
    fn test_ordering() {
        assert!(I256::from_i128(-1) < I256::ZERO);
        assert!(I256::from_i128(1) > I256::from_i128(-100));
        assert!(U256::MAX > U256::from_u128(u128::MAX));
    }

    #[test]
    fn test_mul_pow10() {
        let value = I256::from_i128(-123).checked_mul_pow10(3).unwrap();
        assert_eq!(value.to_i128(), Some(-123000));
        assert!(I256::MAX.checked_mul_pow10(1).is_none());
    }
}
