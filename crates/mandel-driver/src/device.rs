//! Board handle and bitstream configuration
//!
//! A [`Board`] is the single open handle to one accelerator card. It owns
//! the register and data nodes, loads the bitstream, and is released
//! exactly once: by [`Board::close`] or, on early-exit paths, by drop.

use bytes::Bytes;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::backend::{AcceleratorPort, BackendType};
use crate::channel::{BulkTransport, RegisterChannel};
use crate::discovery::BoardInfo;
use crate::error::{FpgaError, Result};
use crate::io::IoHandle;

/// Synchronisation word that opens the configuration stream in every
/// Xilinx bitstream.
pub const SYNC_WORD: [u8; 4] = [0xAA, 0x99, 0x55, 0x66];

/// A validated FPGA configuration file
#[derive(Debug, Clone)]
pub struct Bitstream {
    path: PathBuf,
    data: Bytes,
    sync_offset: usize,
}

impl Bitstream {
    /// Read and validate a bitstream file
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationFailed` if the file is unreadable, empty, or
    /// carries no sync word.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| FpgaError::configuration_failed(path, format!("cannot read: {e}")))?;
        Self::from_bytes(path, data)
    }

    /// Validate an in-memory bitstream
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationFailed` if the data is empty or carries no
    /// sync word.
    pub fn from_bytes(path: impl Into<PathBuf>, data: impl Into<Bytes>) -> Result<Self> {
        let path = path.into();
        let data = data.into();

        if data.is_empty() {
            return Err(FpgaError::configuration_failed(path, "empty bitstream"));
        }

        let sync_offset = data
            .windows(SYNC_WORD.len())
            .position(|w| w == SYNC_WORD)
            .ok_or_else(|| FpgaError::configuration_failed(&path, "no sync word found"))?;

        tracing::debug!(
            "Bitstream {}: {} bytes, sync word at {:#x}",
            path.display(),
            data.len(),
            sync_offset
        );

        Ok(Self {
            path,
            data,
            sync_offset,
        })
    }

    /// Source path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whole file contents
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Offset of the sync word (length of the file header)
    pub const fn sync_offset(&self) -> usize {
        self.sync_offset
    }

    /// Bytes of configuration payload from the sync word on
    pub fn payload_len(&self) -> usize {
        self.data.len() - self.sync_offset
    }
}

/// Open accelerator board
#[derive(Debug)]
pub struct Board {
    info: BoardInfo,
    io: IoHandle,
    configured: Option<PathBuf>,
}

impl Board {
    /// Open a board's register and data nodes
    ///
    /// # Errors
    ///
    /// Returns error if the nodes are missing or cannot be opened.
    pub fn open(info: &BoardInfo, bulk_port: u64) -> Result<Self> {
        tracing::debug!("Opening board {}: {}", info.index, info.path.display());

        let io = IoHandle::open(&info.path, &info.data_path, bulk_port)?;

        tracing::info!(
            "Opened board {} (card {:#010x}, serial {:#010x})",
            info.index,
            info.card_id,
            info.serial
        );

        Ok(Self {
            info: info.clone(),
            io,
            configured: None,
        })
    }

    /// Board information
    pub const fn info(&self) -> &BoardInfo {
        &self.info
    }

    /// Bitstream the board was configured with, if any
    pub fn configured_with(&self) -> Option<&Path> {
        self.configured.as_deref()
    }

    /// Load a bitstream onto the FPGA
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationFailed` if the file is invalid or the board
    /// rejects it.
    pub fn configure(&mut self, bitstream_path: impl AsRef<Path>) -> Result<()> {
        let bitstream = Bitstream::from_file(bitstream_path)?;
        self.configure_with(&bitstream)
    }

    /// Load an already validated bitstream onto the FPGA
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationFailed` if the configuration node is missing or
    /// the write fails.
    pub fn configure_with(&mut self, bitstream: &Bitstream) -> Result<()> {
        let config_path = &self.info.config_path;
        tracing::info!(
            "Configuring board {} from {} ({} payload bytes)",
            self.info.index,
            bitstream.path().display(),
            bitstream.payload_len()
        );

        let mut node = std::fs::OpenOptions::new()
            .write(true)
            .open(config_path)
            .map_err(|e| {
                FpgaError::configuration_failed(
                    bitstream.path(),
                    format!("cannot open {}: {e}", config_path.display()),
                )
            })?;

        node.write_all(bitstream.data())
            .and_then(|()| node.flush())
            .map_err(|e| {
                FpgaError::configuration_failed(bitstream.path(), format!("board rejected bitstream: {e}"))
            })?;

        self.configured = Some(bitstream.path().to_path_buf());
        tracing::info!("Board {} configured", self.info.index);
        Ok(())
    }

    /// Release the board
    pub fn close(self) {
        // Released by Drop
        drop(self);
    }
}

impl RegisterChannel for Board {
    fn write_byte(&mut self, addr: u32, value: u8) -> Result<()> {
        self.io.write_register(addr, value)
    }

    fn read_byte(&mut self, addr: u32) -> Result<u8> {
        self.io.read_register(addr)
    }
}

impl BulkTransport for Board {
    fn read_bulk(&mut self, buffer: &mut [u8]) -> Result<usize> {
        self.io.read_data(buffer)
    }
}

impl AcceleratorPort for Board {
    fn backend_type(&self) -> BackendType {
        BackendType::DeviceFile
    }

    fn describe(&self) -> String {
        format!(
            "board {} @ {} (card {:#010x})",
            self.info.index,
            self.info.path.display(),
            self.info.card_id
        )
    }
}

impl Drop for Board {
    fn drop(&mut self) {
        tracing::info!(
            "Releasing board {}: {}",
            self.info.index,
            self.info.path.display()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bitstream() -> Vec<u8> {
        let mut data = b"\x00\x09\x0f\xf0header a Example3.ncd".to_vec();
        data.extend_from_slice(&[0xFF; 8]);
        data.extend_from_slice(&SYNC_WORD);
        data.extend_from_slice(&[0x30, 0x00, 0x80, 0x01]);
        data
    }

    #[test]
    fn bitstream_finds_sync_word() {
        let data = sample_bitstream();
        let bs = Bitstream::from_bytes("Example3.bit", data.clone()).unwrap();
        assert_eq!(bs.sync_offset(), data.len() - 8);
        assert_eq!(bs.payload_len(), 8);
    }

    #[test]
    fn bitstream_rejects_garbage() {
        let err = Bitstream::from_bytes("x.bit", vec![1u8, 2, 3, 4, 5]).unwrap_err();
        assert!(matches!(err, FpgaError::ConfigurationFailed { .. }));
        let err = Bitstream::from_bytes("x.bit", Vec::<u8>::new()).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn bitstream_missing_file() {
        let err = Bitstream::from_file("/nonexistent/Example3.bit").unwrap_err();
        assert!(matches!(err, FpgaError::ConfigurationFailed { .. }));
    }

    #[test]
    fn open_configure_and_access_file_backed_board() {
        let dir = tempfile::tempdir().unwrap();
        let info = BoardInfo {
            index: 0,
            card_id: 0x1234,
            serial: 0xCAFE,
            path: dir.path().join("zestsc1-0"),
            data_path: dir.path().join("zestsc1-0-data"),
            config_path: dir.path().join("zestsc1-0-config"),
        };
        std::fs::write(&info.path, vec![0u8; 0x2100]).unwrap();
        std::fs::write(&info.data_path, [1u8, 2, 3]).unwrap();
        std::fs::write(&info.config_path, b"").unwrap();
        let bit = dir.path().join("Example3.bit");
        std::fs::write(&bit, sample_bitstream()).unwrap();

        let mut board = Board::open(&info, 0).unwrap();
        board.configure(&bit).unwrap();
        assert_eq!(board.configured_with(), Some(bit.as_path()));
        assert_eq!(std::fs::read(&info.config_path).unwrap(), sample_bitstream());

        board.write_byte(0x2080, 1).unwrap();
        assert_eq!(board.read_byte(0x2080).unwrap(), 1);
        let mut buf = [0u8; 3];
        assert_eq!(board.read_bulk(&mut buf).unwrap(), 3);
        assert_eq!(board.backend_type(), BackendType::DeviceFile);
        board.close();
    }
}
