//! Reference escape-iteration core.
//!
//! This is the golden model of the accelerator's datapath. The HDL
//! implements exactly this recurrence, and the host reproduces it to check
//! retrieved frames and to generate testbench vectors.
//!
//! ## Recurrence
//!
//! Each step needs `re(z)²`, `im(z)²` and `2·re(z)·im(z)`. The cross term
//! is rebuilt from a third squaring so the datapath only instantiates
//! squarers:
//!
//! ```text
//! o1 = rez²           >> F
//! o2 = imz²           >> F
//! o3 = (rez - imz)²   >> F          // = o1 + o2 - 2·rez·imz
//!
//! rez' = o1 - o2       + re
//! imz' = o1 + o2 - o3  + im
//!
//! escape when o1 + o2 > FOUR        // |z_k|² of the current z
//! ```
//!
//! `k` is the index of the first `z_k` (with `z_0 = 0`) whose squared
//! magnitude exceeds 4, so `c = 2.5` escapes at `k = 1` and the result is
//! never 0. Every add and every narrowed product wraps, as the 32-bit
//! datapath does. A square of 32 or more wraps negative in Q6.26, so a point
//! sitting exactly on the threshold (`c = 2`: `|z_1|² = 4`, then `z_2 = 6`)
//! wraps past the test and reports the bound, on silicon and here alike.

use crate::fixed::QFormat;
use crate::frame::FrameGeometry;

/// Iteration bound of the reference build.
pub const ITERATIONS: u32 = 240;

/// Bounded Mandelbrot iteration in fixed point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MandelCore {
    format: QFormat,
    iterations: u32,
    four: i32,
}

impl MandelCore {
    /// Core with an explicit format and iteration bound.
    pub fn new(format: QFormat, iterations: u32) -> Self {
        Self {
            format,
            iterations,
            four: format.encode(4.0),
        }
    }

    /// Same format, different iteration bound.
    #[must_use]
    pub fn with_iterations(self, iterations: u32) -> Self {
        Self { iterations, ..self }
    }

    /// Datapath format.
    pub const fn format(&self) -> QFormat {
        self.format
    }

    /// Iteration bound.
    pub const fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Escape iteration of `c = re + i·im`, or the bound if it never escapes.
    pub fn iterate(&self, re: i32, im: i32) -> u32 {
        let square = |v: i32| self.format.mul(v, v);

        let mut rez: i32 = 0;
        let mut imz: i32 = 0;
        let mut k = 0;

        while k < self.iterations {
            let o1 = square(rez);
            let o2 = square(imz);
            let o3 = square(rez.wrapping_sub(imz));
            let magnitude = o1.wrapping_add(o2);

            if magnitude > self.four {
                break;
            }

            rez = o1.wrapping_sub(o2).wrapping_add(re);
            imz = magnitude.wrapping_sub(o3).wrapping_add(im);
            k += 1;
        }

        k
    }

    /// [`iterate`](Self::iterate) on doubles, encoded in the core's format.
    pub fn iterate_f64(&self, re: f64, im: f64) -> u32 {
        self.iterate(self.format.encode(re), self.format.encode(im))
    }
}

impl Default for MandelCore {
    fn default() -> Self {
        Self::new(QFormat::REFERENCE, ITERATIONS)
    }
}

/// Viewport as the accelerator latches it: four wire-format words.
///
/// Pixel `(x, y)` samples `re = x0 + x·dx`, `im = y0 - y·dy`, accumulated
/// in the wire format and narrowed into the core format per sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceView {
    /// Top-left X.
    pub x0: i32,
    /// Top-left Y.
    pub y0: i32,
    /// Horizontal step.
    pub dx: i32,
    /// Vertical step (the frame walks downward).
    pub dy: i32,
    /// Format of the four words above.
    pub wire: QFormat,
}

impl ReferenceView {
    /// Wire words for a viewport given as top-left corner and steps.
    pub fn from_f64(x0: f64, y0: f64, dx: f64, dy: f64, wire: QFormat) -> Self {
        Self {
            x0: wire.encode(x0),
            y0: wire.encode(y0),
            dx: wire.encode(dx),
            dy: wire.encode(dy),
            wire,
        }
    }

    /// Wire-format sample point of pixel `(x, y)`.
    #[allow(clippy::cast_possible_wrap)]
    pub fn sample(&self, x: u32, y: u32) -> (i32, i32) {
        let re = self.x0.wrapping_add(self.dx.wrapping_mul(x as i32));
        let im = self.y0.wrapping_sub(self.dy.wrapping_mul(y as i32));
        (re, im)
    }

    /// Render one scanline into `row` (`row.len()` pixels).
    #[allow(clippy::cast_possible_truncation)]
    pub fn render_row(&self, core: &MandelCore, y: u32, row: &mut [u8]) {
        for (x, px) in (0u32..).zip(row.iter_mut()) {
            let (re, im) = self.sample(x, y);
            let re = self.wire.convert(re, core.format());
            let im = self.wire.convert(im, core.format());
            *px = core.iterate(re, im).min(u32::from(u8::MAX)) as u8;
        }
    }

    /// Render a whole frame into `frame`, which must hold `geometry.len()`
    /// bytes.
    ///
    /// # Panics
    ///
    /// Panics if `frame` is shorter than the geometry.
    pub fn render(&self, core: &MandelCore, geometry: FrameGeometry, frame: &mut [u8]) {
        assert!(frame.len() >= geometry.len(), "frame buffer too small");
        if geometry.is_empty() {
            return;
        }
        let width = geometry.width as usize;
        for (y, row) in (0u32..).zip(frame[..geometry.len()].chunks_exact_mut(width)) {
            self.render_row(core, y, row);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core() -> MandelCore {
        MandelCore::default()
    }

    #[test]
    fn origin_never_escapes() {
        assert_eq!(core().iterate(0, 0), ITERATIONS);
    }

    #[test]
    fn pinned_escape_counts() {
        let c = core();
        assert_eq!(c.iterate_f64(2.5, 0.0), 1);
        assert_eq!(c.iterate_f64(-2.2, -0.9), 1);
        assert_eq!(c.iterate_f64(-1.0, 0.0), ITERATIONS);
        assert_eq!(c.iterate_f64(-0.75, 0.1), 33);
    }

    #[test]
    fn threshold_point_wraps_to_bound() {
        // |z_1|² = 4 is not > 4; z_2 = 6 squares to 36, outside Q6.26
        assert_eq!(core().iterate_f64(2.0, 0.0), ITERATIONS);
    }

    #[test]
    fn interior_points_stay() {
        let c = core();
        for (re, im) in [(-0.1, 0.1), (0.25, 0.0), (-1.2, 0.1), (-0.5, 0.5)] {
            assert_eq!(c.iterate_f64(re, im), ITERATIONS, "({re}, {im})");
        }
    }

    #[test]
    fn matches_float_recurrence_for_fast_escapes() {
        let c = core();
        for (re, im) in [(0.5, 0.5), (-2.0, 1.0), (0.3, -0.6), (1.0, 1.0)] {
            let (mut zr, mut zi) = (0.0f64, 0.0f64);
            let mut k = 0;
            while k < ITERATIONS && zr * zr + zi * zi <= 4.0 {
                (zr, zi) = (zr * zr - zi * zi + re, 2.0 * zr * zi + im);
                k += 1;
            }
            assert_eq!(c.iterate_f64(re, im), k, "({re}, {im})");
        }
    }

    #[test]
    fn raising_bound_keeps_escaped_points() {
        let low = core().with_iterations(40);
        let high = core().with_iterations(400);
        for i in 0..200 {
            let re = -2.2 + f64::from(i) * 0.0165;
            let im = 0.35 - f64::from(i) * 0.002;
            let k_low = low.iterate_f64(re, im);
            let k_high = high.iterate_f64(re, im);
            if k_low < 40 {
                assert_eq!(k_low, k_high, "({re}, {im})");
            } else {
                assert!(k_high >= 40);
            }
        }
    }

    #[test]
    fn lowering_bound_saturates() {
        let full = core();
        let k = full.iterate_f64(-0.75, 0.1);
        assert!(k > 5);
        assert_eq!(full.with_iterations(5).iterate_f64(-0.75, 0.1), 5);
        assert_eq!(full.with_iterations(k).iterate_f64(-0.75, 0.1), k);
    }

    #[test]
    fn reference_view_samples_downward() {
        let view = ReferenceView::from_f64(-2.2, 1.1, 3.3 / 320.0, 2.2 / 240.0, QFormat::PROTOCOL);
        assert_eq!(view.sample(0, 0), (view.x0, view.y0));
        let (re, im) = view.sample(10, 3);
        assert_eq!(re, view.x0 + 10 * view.dx);
        assert_eq!(im, view.y0 - 3 * view.dy);
    }

    #[test]
    fn render_marks_set_interior() {
        let geometry = FrameGeometry::new(32, 24);
        let view = ReferenceView::from_f64(-2.2, 1.1, 3.3 / 32.0, 2.2 / 24.0, QFormat::PROTOCOL);
        let mut frame = vec![0u8; geometry.len()];
        view.render(&core(), geometry, &mut frame);

        // (-2.2, 1.1) is far outside the set
        assert!(frame[0] < 4);
        // Column nearest re = -0.2 on the scanline nearest im = 0 is inside
        let x = ((-0.2 + 2.2) / (3.3 / 32.0)) as u32;
        let y = (1.1 / (2.2 / 24.0)) as u32;
        assert_eq!(u32::from(frame[geometry.index(x, y)]), ITERATIONS);
    }
}
