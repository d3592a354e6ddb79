//! Retrieved frames and where they go

use std::path::{Path, PathBuf};

use bytes::{BufMut, Bytes, BytesMut};
use mandel_chip::FrameGeometry;

use crate::error::{FpgaError, Result};

/// One escape-count raster, row-major, one byte per pixel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    data: Bytes,
    geometry: FrameGeometry,
}

impl Frame {
    /// Wrap `data` as a frame of `geometry`
    ///
    /// # Errors
    ///
    /// Returns `BufferSize` if `data` does not hold exactly one frame.
    pub fn new(data: impl Into<Bytes>, geometry: FrameGeometry) -> Result<Self> {
        let data = data.into();
        if data.len() != geometry.len() {
            return Err(FpgaError::BufferSize {
                expected: geometry.len(),
                got: data.len(),
            });
        }
        Ok(Self { data, geometry })
    }

    /// Pixel bytes
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Dimensions
    pub const fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    /// Escape count at `(x, y)`, if inside the frame
    pub fn pixel(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.geometry.width || y >= self.geometry.height {
            return None;
        }
        self.data.get(self.geometry.index(x, y)).copied()
    }

    /// Binary PGM image (`P5`, maxval 255)
    pub fn to_pgm(&self) -> Bytes {
        let header = self.geometry.pgm_header();
        let mut out = BytesMut::with_capacity(header.len() + self.data.len());
        out.put_slice(header.as_bytes());
        out.put_slice(&self.data);
        out.freeze()
    }
}

/// Consumer of finished frames: an image file, a display, a checker
pub trait FrameSink {
    /// Take one frame
    ///
    /// # Errors
    ///
    /// Returns error if the frame cannot be stored or presented.
    fn consume(&mut self, frame: &Frame) -> Result<()>;
}

impl<F> FrameSink for F
where
    F: FnMut(&Frame) -> Result<()>,
{
    fn consume(&mut self, frame: &Frame) -> Result<()> {
        self(frame)
    }
}

/// Writes each frame to the same PGM file, replacing the previous one
#[derive(Debug, Clone)]
pub struct PgmWriter {
    path: PathBuf,
    written: usize,
}

impl PgmWriter {
    /// Writer targeting `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            written: 0,
        }
    }

    /// Output path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Frames written so far
    pub const fn written(&self) -> usize {
        self.written
    }
}

impl FrameSink for PgmWriter {
    fn consume(&mut self, frame: &Frame) -> Result<()> {
        write_pgm(&self.path, frame)?;
        self.written += 1;
        Ok(())
    }
}

/// Write `frame` as a binary PGM file
///
/// # Errors
///
/// Returns `Io` if the file cannot be written.
pub fn write_pgm(path: impl AsRef<Path>, frame: &Frame) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path, frame.to_pgm())?;
    tracing::info!("Wrote {} frame to {}", frame.geometry(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_size_must_match_geometry() {
        let g = FrameGeometry::new(4, 2);
        assert!(Frame::new(vec![0u8; 8], g).is_ok());
        assert!(matches!(
            Frame::new(vec![0u8; 7], g),
            Err(FpgaError::BufferSize { expected: 8, got: 7 })
        ));
    }

    #[test]
    fn pixel_lookup_is_row_major() {
        let g = FrameGeometry::new(3, 2);
        let frame = Frame::new(vec![0u8, 1, 2, 3, 4, 5], g).unwrap();
        assert_eq!(frame.pixel(2, 0), Some(2));
        assert_eq!(frame.pixel(0, 1), Some(3));
        assert_eq!(frame.pixel(3, 0), None);
    }

    #[test]
    fn pgm_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mandel.pgm");
        let frame = Frame::new(vec![7u8; 6], FrameGeometry::new(3, 2)).unwrap();

        let mut sink = PgmWriter::new(&path);
        sink.consume(&frame).unwrap();
        sink.consume(&frame).unwrap();
        assert_eq!(sink.written(), 2);

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..11], b"P5\n3 2\n255\n");
        assert_eq!(&bytes[11..], &[7u8; 6]);
    }

    #[test]
    fn closures_are_sinks() {
        let mut seen = 0;
        let mut sink = |f: &Frame| -> Result<()> {
            seen += f.data().len();
            Ok(())
        };
        let frame = Frame::new(vec![0u8; 4], FrameGeometry::new(2, 2)).unwrap();
        sink.consume(&frame).unwrap();
        assert_eq!(seen, 4);
    }
}
