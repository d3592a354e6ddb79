//! View parameters for one frame
//!
//! [`ViewBounds`] is the user-facing rectangle (lower-left and upper-right
//! corners) that zoom and pan operate on. [`Viewport`] is what the
//! accelerator latches: the top-left corner and per-pixel steps. Rows walk
//! downward from the upper edge.

use mandel_chip::{FrameGeometry, QFormat, ReferenceView, RegisterMap};

use crate::error::{FpgaError, Result};

/// Fraction of the range moved per zoom step
pub const ZOOM_STEP: f64 = 0.01;

/// Horizontal range below which zooming in is refused
pub const MIN_X_RANGE: f64 = 0.00002;

/// Left-edge shift per frame of a multi-frame run
pub const FRAME_SHIFT: f64 = 0.3;

/// Zoom direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zoom {
    /// Shrink the range around the pixel
    In,
    /// Grow the range around the pixel
    Out,
}

impl Zoom {
    const fn sign(self) -> f64 {
        match self {
            Self::In => 1.0,
            Self::Out => -1.0,
        }
    }
}

/// Viewport corners in the complex plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewBounds {
    /// Left edge
    pub xld: f64,
    /// Lower edge
    pub yld: f64,
    /// Right edge
    pub xru: f64,
    /// Upper edge
    pub yru: f64,
}

impl Default for ViewBounds {
    fn default() -> Self {
        Self::new(-2.2, -1.1, 1.1, 1.1)
    }
}

impl ViewBounds {
    /// Rectangle from lower-left `(xld, yld)` to upper-right `(xru, yru)`
    pub const fn new(xld: f64, yld: f64, xru: f64, yru: f64) -> Self {
        Self { xld, yld, xru, yru }
    }

    /// Horizontal extent
    pub fn x_range(&self) -> f64 {
        self.xru - self.xld
    }

    /// Vertical extent
    pub fn y_range(&self) -> f64 {
        self.yru - self.yld
    }

    /// Accelerator parameters for `geometry`
    ///
    /// # Errors
    ///
    /// Returns `InvalidViewport` if a corner is not finite or the rectangle
    /// is empty.
    pub fn viewport(&self, geometry: FrameGeometry) -> Result<Viewport> {
        Viewport::from_corners(self.xld, self.yld, self.xru, self.yru, geometry)
    }

    /// Zoom by one step toward (`In`) or away from (`Out`) pixel `(px, py)`.
    ///
    /// The pixel keeps its position in the frame. Returns `false`, leaving
    /// the bounds unchanged, when zooming in past [`MIN_X_RANGE`].
    pub fn zoom(&mut self, px: u32, py: u32, geometry: FrameGeometry, direction: Zoom) -> bool {
        if direction == Zoom::In && self.x_range() < MIN_X_RANGE {
            return false;
        }
        let rx = f64::from(px) / f64::from(geometry.width);
        let ry = f64::from(py) / f64::from(geometry.height);
        let (xr, yr) = (self.x_range(), self.y_range());
        let d = direction.sign() * ZOOM_STEP;

        self.xld += d * rx * xr;
        self.xru -= d * (1.0 - rx) * xr;
        // Pixel rows count down from the upper edge
        self.yld += d * (1.0 - ry) * yr;
        self.yru -= d * ry * yr;
        true
    }

    /// Move by whole pixels; positive `dy` moves the view down the image
    pub fn pan(&mut self, dx: i32, dy: i32, geometry: FrameGeometry) {
        let sx = f64::from(dx) * self.x_range() / f64::from(geometry.width);
        let sy = f64::from(dy) * self.y_range() / f64::from(geometry.height);
        self.xld += sx;
        self.xru += sx;
        self.yld -= sy;
        self.yru -= sy;
    }

    /// Same rectangle moved right by `dx`
    #[must_use]
    pub fn shifted(mut self, dx: f64) -> Self {
        self.xld += dx;
        self.xru += dx;
        self
    }
}

impl std::fmt::Display for ViewBounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {}] x [{}, {}]",
            self.xld, self.xru, self.yld, self.yru
        )
    }
}

/// Accelerator view parameters: top-left corner and per-pixel steps
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Real part of the top-left pixel
    pub top_left_x: f64,
    /// Imaginary part of the top-left pixel
    pub top_left_y: f64,
    /// Real increment per column
    pub step_x: f64,
    /// Imaginary decrement per row
    pub step_y: f64,
}

impl Viewport {
    /// Viewport from explicit corner and steps
    pub const fn new(top_left_x: f64, top_left_y: f64, step_x: f64, step_y: f64) -> Self {
        Self {
            top_left_x,
            top_left_y,
            step_x,
            step_y,
        }
    }

    /// Viewport covering lower-left `(xld, yld)` to upper-right `(xru, yru)`
    ///
    /// # Errors
    ///
    /// Returns `InvalidViewport` if a corner is not finite, the rectangle is
    /// empty, or the geometry has no pixels.
    pub fn from_corners(
        xld: f64,
        yld: f64,
        xru: f64,
        yru: f64,
        geometry: FrameGeometry,
    ) -> Result<Self> {
        if ![xld, yld, xru, yru].iter().all(|v| v.is_finite()) {
            return Err(FpgaError::invalid_viewport("corners must be finite"));
        }
        if xru <= xld || yru <= yld {
            return Err(FpgaError::invalid_viewport(format!(
                "empty rectangle ({xld}, {yld}) to ({xru}, {yru})"
            )));
        }
        if geometry.is_empty() {
            return Err(FpgaError::invalid_viewport(format!(
                "no pixels in {geometry}"
            )));
        }
        Ok(Self {
            top_left_x: xld,
            top_left_y: yru,
            step_x: (xru - xld) / f64::from(geometry.width),
            step_y: (yru - yld) / f64::from(geometry.height),
        })
    }

    /// Values in register order: top-left X, top-left Y, step X, step Y
    pub const fn values(&self) -> [f64; 4] {
        [self.top_left_x, self.top_left_y, self.step_x, self.step_y]
    }

    /// Encode the four values in `format`
    ///
    /// # Errors
    ///
    /// Returns `InvalidViewport` if a value is outside the format's range or
    /// a step truncates to zero.
    pub fn encode(&self, format: QFormat) -> Result<[i32; 4]> {
        let mut words = [0i32; 4];
        for (word, value) in words.iter_mut().zip(self.values()) {
            *word = format.encode_checked(value).ok_or_else(|| {
                FpgaError::invalid_viewport(format!(
                    "{value} outside Q{}.{} range ±{}",
                    32 - format.frac_bits(),
                    format.frac_bits(),
                    format.limit()
                ))
            })?;
        }
        if words[2] == 0 || words[3] == 0 {
            return Err(FpgaError::invalid_viewport(format!(
                "step below resolution {}",
                format.resolution()
            )));
        }
        Ok(words)
    }

    /// `(register, word)` pairs to write for this viewport
    ///
    /// # Errors
    ///
    /// Returns `InvalidViewport` if the values cannot be encoded.
    #[allow(clippy::cast_sign_loss)]
    pub fn register_words(&self, map: &RegisterMap, format: QFormat) -> Result<[(u32, u32); 4]> {
        let words = self.encode(format)?;
        let addrs = map.viewport_words();
        Ok(std::array::from_fn(|i| (addrs[i], words[i] as u32)))
    }

    /// The latched view as the reference renderer sees it
    ///
    /// # Errors
    ///
    /// Returns `InvalidViewport` if the values cannot be encoded.
    pub fn reference(&self, format: QFormat) -> Result<ReferenceView> {
        let [x0, y0, dx, dy] = self.encode(format)?;
        Ok(ReferenceView {
            x0,
            y0,
            dx,
            dy,
            wire: format,
        })
    }
}
