//! Register map of the Mandelbrot accelerator build.
//!
//! The board exposes a flat byte-addressable register window starting at
//! `0x2000`. The reference build decodes:
//!
//! ```text
//! 0x2004..0x2007  STATUS          remaining scanlines, then 0x55555555
//! 0x2060..0x2063  VIEW_X          top-left X, Q5.27
//! 0x2064..0x2067  VIEW_Y          top-left Y, Q5.27
//! 0x2068..0x206B  STEP_X          horizontal step, Q5.27
//! 0x206C..0x206F  STEP_Y          vertical step, Q5.27
//! 0x2080          TRANSFER_START  write 1 to stream the frame out
//! ```
//!
//! Offsets differ between accelerator builds, so drivers take a
//! [`RegisterMap`] value; the constants here are its defaults.

/// Base of the register window.
pub const REGISTER_BASE: u32 = 0x2000;

/// Status word: remaining scanlines while busy, [`STATUS_DONE`] when done.
pub const STATUS: u32 = 0x2004;

/// Top-left X of the viewport.
pub const VIEW_X: u32 = 0x2060;
/// Top-left Y of the viewport.
pub const VIEW_Y: u32 = 0x2064;
/// Horizontal step between adjacent pixels.
pub const STEP_X: u32 = 0x2068;
/// Vertical step between adjacent scanlines.
pub const STEP_Y: u32 = 0x206C;

/// Transfer trigger byte.
pub const TRANSFER_START: u32 = 0x2080;
/// Value written to [`TRANSFER_START`] to start the bulk transfer.
pub const TRANSFER_GO: u8 = 1;

/// Bulk data port offset (the board streams from a dedicated endpoint).
pub const BULK_PORT: u64 = 0;

/// Status word reported once every scanline has been computed.
///
/// An intermediate build signalled `0x9999_9999`; it is superseded.
pub const STATUS_DONE: u32 = 0x5555_5555;

/// Width of every parameter and status word on the bus, in bytes.
pub const WORD_BYTES: u32 = 4;

/// Register offsets of one accelerator build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterMap {
    /// Top-left X word.
    pub view_x: u32,
    /// Top-left Y word.
    pub view_y: u32,
    /// Horizontal step word.
    pub step_x: u32,
    /// Vertical step word.
    pub step_y: u32,
    /// Status / remaining-scanlines word.
    pub status: u32,
    /// Transfer trigger byte.
    pub transfer_start: u32,
    /// Bulk data port base.
    pub bulk_port: u64,
}

impl RegisterMap {
    /// The four viewport words in write order: X, Y, step X, step Y.
    pub const fn viewport_words(&self) -> [u32; 4] {
        [self.view_x, self.view_y, self.step_x, self.step_y]
    }

    /// Check that no two words overlap and the trigger byte is not inside
    /// a word.
    ///
    /// # Errors
    ///
    /// Returns a description of the first overlap found.
    pub fn validate(&self) -> Result<(), String> {
        let words = [
            ("view_x", self.view_x),
            ("view_y", self.view_y),
            ("step_x", self.step_x),
            ("step_y", self.step_y),
            ("status", self.status),
        ];
        for (i, (name_a, a)) in words.iter().enumerate() {
            for (name_b, b) in &words[i + 1..] {
                if a.abs_diff(*b) < WORD_BYTES {
                    return Err(format!("{name_a} ({a:#06x}) overlaps {name_b} ({b:#06x})"));
                }
            }
            if (*a..a + WORD_BYTES).contains(&self.transfer_start) {
                return Err(format!(
                    "transfer_start ({:#06x}) lies inside {name_a} ({a:#06x})",
                    self.transfer_start
                ));
            }
        }
        Ok(())
    }
}

impl Default for RegisterMap {
    fn default() -> Self {
        Self {
            view_x: VIEW_X,
            view_y: VIEW_Y,
            step_x: STEP_X,
            step_y: STEP_Y,
            status: STATUS,
            transfer_start: TRANSFER_START,
            bulk_port: BULK_PORT,
        }
    }
}
