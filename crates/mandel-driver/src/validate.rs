//! Hardware against reference parity
//!
//! The reference frame is computed on the host from the same wire words the
//! accelerator latches, stepping pixels in the wire format exactly as the
//! hardware does, so a correct accelerator matches it byte for byte.

use mandel_chip::MandelCore;

use crate::config::ProtocolConfig;
use crate::error::Result;
use crate::frame::Frame;
use crate::viewport::Viewport;

/// Reference frame for `viewport` under `config`
///
/// # Errors
///
/// Returns `InvalidViewport` if the viewport cannot be encoded.
pub fn reference_frame(
    viewport: &Viewport,
    config: &ProtocolConfig,
    core: &MandelCore,
) -> Result<Frame> {
    let view = viewport.reference(config.wire_format)?;
    let mut data = vec![0u8; config.frame_len()];
    view.render(core, config.geometry, &mut data);
    Frame::new(data, config.geometry)
}

/// First differing pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    /// Column
    pub x: u32,
    /// Row
    pub y: u32,
    /// Value in the checked frame
    pub got: u8,
    /// Value in the reference frame
    pub expected: u8,
}

/// Pixel comparison of a retrieved frame with its reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParityReport {
    /// Pixels compared
    pub pixels: usize,
    /// Pixels that differ
    pub mismatches: usize,
    /// Largest absolute difference
    pub max_delta: u8,
    /// First differing pixel in row-major order
    pub first_mismatch: Option<Mismatch>,
}

impl ParityReport {
    /// Compare `frame` with `reference`
    ///
    /// Frames of different geometry compare over their common prefix and
    /// count every missing pixel as a mismatch.
    pub fn compare(frame: &Frame, reference: &Frame) -> Self {
        let width = reference.geometry().width.max(1);
        let mut report = Self {
            pixels: reference.data().len(),
            mismatches: reference.data().len().abs_diff(frame.data().len()),
            max_delta: 0,
            first_mismatch: None,
        };

        for (i, (&got, &expected)) in (0u32..).zip(frame.data().iter().zip(reference.data().iter())) {
            if got == expected {
                continue;
            }
            report.mismatches += 1;
            report.max_delta = report.max_delta.max(got.abs_diff(expected));
            if report.first_mismatch.is_none() {
                report.first_mismatch = Some(Mismatch {
                    x: i % width,
                    y: i / width,
                    got,
                    expected,
                });
            }
        }
        report
    }

    /// Whether the frames are identical
    pub const fn is_exact(&self) -> bool {
        self.mismatches == 0
    }
}

impl std::fmt::Display for ParityReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_exact() {
            return write!(f, "{} pixels match", self.pixels);
        }
        write!(
            f,
            "{}/{} pixels differ (max delta {})",
            self.mismatches, self.pixels, self.max_delta
        )?;
        if let Some(m) = self.first_mismatch {
            write!(
                f,
                ", first at ({}, {}): got {} expected {}",
                m.x, m.y, m.got, m.expected
            )?;
        }
        Ok(())
    }
}
