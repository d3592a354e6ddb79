//! Frame geometry of the accelerator build.
//!
//! The frame is one byte per pixel, row-major, top scanline first. Each
//! byte is the escape-iteration count and doubles as a palette index.

/// Width of the reference build's frame in pixels.
pub const WIDTH: u32 = 320;
/// Height of the reference build's frame in scanlines.
pub const HEIGHT: u32 = 240;

/// Frame dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameGeometry {
    /// Pixels per scanline.
    pub width: u32,
    /// Scanlines per frame.
    pub height: u32,
}

impl FrameGeometry {
    /// Create a geometry.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Bytes in one frame (`width * height`).
    pub const fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether the frame holds no pixels.
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Portable graymap header for a raw 8-bit frame of this size.
    pub fn pgm_header(&self) -> String {
        format!("P5\n{} {}\n255\n", self.width, self.height)
    }

    /// Byte index of pixel `(x, y)`.
    pub const fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

impl Default for FrameGeometry {
    fn default() -> Self {
        Self::new(WIDTH, HEIGHT)
    }
}

impl std::fmt::Display for FrameGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_geometry() {
        let g = FrameGeometry::default();
        assert_eq!(g.len(), 76_800);
        assert_eq!(g.pgm_header(), "P5\n320 240\n255\n");
        assert_eq!(g.index(319, 239), 76_799);
        assert_eq!(g.to_string(), "320x240");
    }
}
