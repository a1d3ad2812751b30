//! Fixed-point decimals.
//!
//! A decimal is an unscaled 256-bit integer plus a scale; the numeric value
//! is `unscaled * 10^(-scale)`. Equality and ordering are defined on the
//! (unscaled, scale) pair, which is also how round-trip equality is checked.

use std::fmt;
use std::str::FromStr;

use crate::int256::I256;

/// Maximum number of decimal digits a column can declare.
pub const MAX_PRECISION: u8 = 76;

/// An exact fixed-point decimal value.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    unscaled: I256,
    scale: u8,
}

impl Decimal {
    /// Creates a decimal from an unscaled integer and a scale.
    pub fn new(unscaled: impl Into<I256>, scale: u8) -> Self {
        Decimal {
            unscaled: unscaled.into(),
            scale,
        }
    }

    /// The unscaled integer.
    pub fn unscaled(&self) -> I256 {
        self.unscaled
    }

    /// Digits after the decimal point.
    pub fn scale(&self) -> u8 {
        self.scale
    }

    /// Re-expresses the value at a different scale.
    ///
    /// Scaling up multiplies the unscaled integer; scaling down is only
    /// possible when no non-zero digits are dropped. Returns `None` when the
    /// conversion would lose digits or overflow.
    pub fn rescale(&self, scale: u8) -> Option<Decimal> {
        if scale == self.scale {
            return Some(*self);
        }
        if scale > self.scale {
            let unscaled = self
                .unscaled
                .checked_mul_pow10(u32::from(scale - self.scale))?;
            return Some(Decimal { unscaled, scale });
        }
        let mut magnitude = self.unscaled.unsigned_abs();
        for _ in 0..self.scale - scale {
            let (quotient, remainder) = magnitude.divmod_u64(10);
            if remainder != 0 {
                return None;
            }
            magnitude = quotient;
        }
        let unscaled = if self.unscaled.is_negative() {
            I256(magnitude.wrapping_neg().0)
        } else {
            I256(magnitude.0)
        };
        Some(Decimal { unscaled, scale })
    }

    /// Approximate conversion to `f64`.
    pub fn to_f64(&self) -> f64 {
        self.unscaled.to_f64() / 10f64.powi(i32::from(self.scale))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let magnitude = self.unscaled.unsigned_abs().to_string();
        let sign = if self.unscaled.is_negative() { "-" } else { "" };
        if self.scale == 0 {
            return write!(f, "{}{}", sign, magnitude);
        }
        let scale = usize::from(self.scale);
        if magnitude.len() > scale {
            let (int_part, frac_part) = magnitude.split_at(magnitude.len() - scale);
            write!(f, "{}{}.{}", sign, int_part, frac_part)
        } else {
            write!(f, "{}0.{:0>width$}", sign, magnitude, width = scale)
        }
    }
}

impl fmt::Debug for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Decimal({})", self)
    }
}

/// Error returned when parsing a decimal literal fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDecimalError;

impl fmt::Display for ParseDecimalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid decimal literal")
    }
}

impl std::error::Error for ParseDecimalError {}

impl FromStr for Decimal {
    type Err = ParseDecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (int_part, frac_part) = match s.split_once('.') {
            Some((int_part, frac_part)) => (int_part, frac_part),
            None => (s, ""),
        };
        if frac_part.len() > usize::from(MAX_PRECISION) {
            return Err(ParseDecimalError);
        }
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(ParseDecimalError);
        }
        if !frac_part.chars().all(|c| c.is_ascii_digit()) {
            return Err(ParseDecimalError);
        }
        let mut digits = String::with_capacity(int_part.len() + frac_part.len());
        digits.push_str(if int_part.is_empty() { "0" } else { int_part });
        digits.push_str(frac_part);
        let unscaled: I256 = digits.parse().map_err(|_| ParseDecimalError)?;
        Ok(Decimal {
            unscaled,
            scale: frac_part.len() as u8,
        })
    }
}
