//! Signed Q32.32 fixed-point numbers.

use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub};

/// A signed fixed-point number with 32 integer bits and 32 fractional bits.
///
/// This is the representation of the biquad taps. Multiplying a tap by an `i32` sample gives
/// a product whose upper 32 bits are the scaled sample, so the filter can multiply-accumulate
/// in plain 64-bit integer arithmetic and descale with a single shift.
///
/// All arithmetic wraps on overflow. Absurd taps (from a frequency above Nyquist, say) make
/// garbage samples rather than a panic in the audio loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Q32(i64);

impl Q32 {
    /// The number of fractional bits.
    pub const FRAC_BITS: u32 = 32;
    /// Zero.
    pub const ZERO: Q32 = Q32(0);
    /// One.
    pub const ONE: Q32 = Q32(1 << Q32::FRAC_BITS);

    /// Converts from floating point by adding half an ulp and truncating toward zero.
    ///
    /// That rounds positive values to nearest, but leaves most negative values one ulp closer
    /// to zero. The conversion saturates: `NaN` maps to zero and values outside the
    /// representable range map to `i64::MIN` or `i64::MAX`.
    pub fn from_f64(x: f64) -> Q32 {
        Q32((0.5 + x * (1u64 << Q32::FRAC_BITS) as f64) as i64)
    }

    /// Wraps a raw Q32 bit pattern.
    pub const fn from_bits(bits: i64) -> Q32 {
        Q32(bits)
    }

    /// The raw Q32 bit pattern.
    pub const fn to_bits(self) -> i64 {
        self.0
    }

    /// Converts to floating point.
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / (1u64 << Q32::FRAC_BITS) as f64
    }

    /// Multiplies by an integer sample, leaving the result in Q32.
    #[inline]
    pub fn mul_sample(self, sample: i32) -> i64 {
        self.0.wrapping_mul(sample as i64)
    }

    /// Divides by a step count, truncating toward zero.
    pub(crate) fn div_steps(self, steps: u32) -> Q32 {
        Q32(self.0.wrapping_div(steps as i64))
    }
}

impl Add for Q32 {
    type Output = Q32;

    fn add(self, rhs: Q32) -> Q32 {
        Q32(self.0.wrapping_add(rhs.0))
    }
}

impl AddAssign for Q32 {
    fn add_assign(&mut self, rhs: Q32) {
        self.0 = self.0.wrapping_add(rhs.0);
    }
}

impl Sub for Q32 {
    type Output = Q32;

    fn sub(self, rhs: Q32) -> Q32 {
        Q32(self.0.wrapping_sub(rhs.0))
    }
}

impl Neg for Q32 {
    type Output = Q32;

    fn neg(self) -> Q32 {
        Q32(self.0.wrapping_neg())
    }
}

impl fmt::Display for Q32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}
