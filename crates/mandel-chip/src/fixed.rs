//! Q-format fixed-point codec.
//!
//! Two formats are in use on this accelerator:
//!
//! ```text
//! Format  Frac bits  Range          Used by
//! ──────  ─────────  ─────────────  ─────────────────────────────────────
//! Q5.27   27         [-16, 16)      Viewport words written to registers
//! Q6.26   26         [-32, 32)      Escape-iteration datapath (reference)
//! ```
//!
//! Encoding truncates toward zero, exactly like the C cast the host
//! programs and the HDL testbench generator were built with. Rounding to
//! nearest would move some values by one LSB and break bit compatibility.

// Fixed-point conversion is a deliberate width change
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]

/// A signed 32-bit Q-format: `fixed = trunc(real * 2^frac_bits)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QFormat {
    frac_bits: u32,
}

impl QFormat {
    /// Q5.27, the format of the viewport words on the register bus.
    pub const PROTOCOL: Self = Self::new(27);

    /// Q6.26, the format of the escape-iteration datapath.
    pub const REFERENCE: Self = Self::new(26);

    /// Create a format with `frac_bits` fractional bits.
    ///
    /// # Panics
    ///
    /// Panics if `frac_bits > 30`; at least one integer bit besides the
    /// sign is required.
    pub const fn new(frac_bits: u32) -> Self {
        assert!(frac_bits <= 30, "Q-format needs an integer bit");
        Self { frac_bits }
    }

    /// Number of fractional bits (`F`).
    pub const fn frac_bits(self) -> u32 {
        self.frac_bits
    }

    /// Scale factor `2^F`.
    pub fn scale(self) -> f64 {
        f64::from(1u32 << self.frac_bits)
    }

    /// Smallest representable step, `2^-F`.
    pub fn resolution(self) -> f64 {
        1.0 / self.scale()
    }

    /// Exclusive magnitude bound of representable reals, `2^(31-F)`.
    pub fn limit(self) -> f64 {
        f64::from(1u32 << (31 - self.frac_bits))
    }

    /// Whether `real` encodes without wrapping.
    pub fn is_representable(self, real: f64) -> bool {
        real.is_finite() && real.abs() < self.limit()
    }

    /// Encode `real`, truncating toward zero.
    ///
    /// Values outside `±2^(31-F)` wrap modulo 2^32 the way a two's-complement
    /// store of the truncated product would. Use [`encode_checked`] when the
    /// input is not already known to be in range.
    ///
    /// [`encode_checked`]: Self::encode_checked
    pub fn encode(self, real: f64) -> i32 {
        // f64 -> i64 truncates toward zero; i64 -> i32 keeps the low 32 bits.
        (real * self.scale()) as i64 as i32
    }

    /// Encode `real`, or `None` if it is not representable.
    pub fn encode_checked(self, real: f64) -> Option<i32> {
        self.is_representable(real).then(|| self.encode(real))
    }

    /// Decode a fixed-point value to a double.
    pub fn decode(self, fixed: i32) -> f64 {
        f64::from(fixed) / self.scale()
    }

    /// Snap `real` onto this format's grid (`decode(encode(real))`).
    pub fn quantize(self, real: f64) -> f64 {
        self.decode(self.encode(real))
    }

    /// Convert a value of this format into `target` by shifting.
    ///
    /// Narrowing the fraction is an arithmetic right shift (floor), which is
    /// what the datapath does when it drops the low bits of a wire word.
    pub fn convert(self, fixed: i32, target: Self) -> i32 {
        if target.frac_bits <= self.frac_bits {
            fixed >> (self.frac_bits - target.frac_bits)
        } else {
            fixed.wrapping_shl(target.frac_bits - self.frac_bits)
        }
    }

    /// Fixed-point multiply: 64-bit product, arithmetic shift by `F`,
    /// low 32 bits kept.
    pub fn mul(self, a: i32, b: i32) -> i32 {
        ((i64::from(a) * i64::from(b)) >> self.frac_bits) as i32
    }
}
