//! Low-level I/O on the board's device nodes
//!
//! The board driver exposes two nodes per card:
//!
//! ```text
//! /dev/zestsc1-N        register window, byte-addressed: offset = register
//! /dev/zestsc1-N-data   bulk data port, read from the configured base
//! ```
//!
//! Register access is one `pread`/`pwrite` of a single byte at the register
//! offset, matching the one-byte bus on the board.

use crate::error::{FpgaError, Result};
use rustix::fs::OFlags;
use rustix::io::{pread, pwrite, Errno};
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

/// Open register and data nodes of one board
#[derive(Debug)]
pub struct IoHandle {
    registers: File,
    data: File,
    bulk_port: u64,
}

impl IoHandle {
    /// Open both nodes read/write
    ///
    /// # Errors
    ///
    /// Returns error if either node is missing or cannot be opened.
    pub fn open(register_path: &Path, data_path: &Path, bulk_port: u64) -> Result<Self> {
        Ok(Self {
            registers: open_node(register_path)?,
            data: open_node(data_path)?,
            bulk_port,
        })
    }

    /// Read one register byte
    ///
    /// # Errors
    ///
    /// Returns error if the read fails or returns no data.
    pub fn read_register(&self, addr: u32) -> Result<u8> {
        let mut byte = [0u8; 1];
        let n = retry_intr(|| pread(&self.registers, &mut byte, u64::from(addr)))
            .map_err(|e| FpgaError::transport(format!("Register read {addr:#06x} failed: {e}")))?;
        if n != 1 {
            return Err(FpgaError::transport(format!(
                "Register read {addr:#06x} returned no data"
            )));
        }
        Ok(byte[0])
    }

    /// Write one register byte
    ///
    /// # Errors
    ///
    /// Returns error if the write fails or is not accepted.
    pub fn write_register(&self, addr: u32, value: u8) -> Result<()> {
        let n = retry_intr(|| pwrite(&self.registers, &[value], u64::from(addr)))
            .map_err(|e| FpgaError::transport(format!("Register write {addr:#06x} failed: {e}")))?;
        if n != 1 {
            return Err(FpgaError::transport(format!(
                "Register write {addr:#06x} not accepted"
            )));
        }
        Ok(())
    }

    /// Read from the bulk data port until `buffer` is full or the port
    /// reports end of data
    ///
    /// # Errors
    ///
    /// Returns error if a read fails.
    pub fn read_data(&self, buffer: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buffer.len() {
            let offset = self.bulk_port + filled as u64;
            let n = retry_intr(|| pread(&self.data, &mut buffer[filled..], offset))
                .map_err(|e| FpgaError::transport(format!("Bulk read failed at {filled}: {e}")))?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }
}

fn open_node(path: &Path) -> Result<File> {
    if !path.exists() {
        return Err(FpgaError::device_not_found(path));
    }

    // OFlags::SYNC bits are a small positive value
    #[allow(clippy::cast_possible_wrap)]
    let sync_flag = OFlags::SYNC.bits() as i32;

    Ok(OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(sync_flag)
        .open(path)?)
}

fn retry_intr<T>(mut op: impl FnMut() -> rustix::io::Result<T>) -> rustix::io::Result<T> {
    loop {
        match op() {
            Err(Errno::INTR) => continue,
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_node_is_device_not_found() {
        let err = IoHandle::open(
            Path::new("/nonexistent/zestsc1-0"),
            Path::new("/nonexistent/zestsc1-0-data"),
            0,
        )
        .unwrap_err();
        assert!(matches!(err, FpgaError::DeviceNotFound { .. }));
    }

    #[test]
    fn byte_registers_over_plain_files() {
        let dir = tempfile::tempdir().unwrap();
        let regs = dir.path().join("regs");
        let data = dir.path().join("data");
        std::fs::write(&regs, vec![0u8; 0x2100]).unwrap();
        std::fs::File::create(&data)
            .unwrap()
            .write_all(&[9, 8, 7, 6, 5])
            .unwrap();

        let io = IoHandle::open(&regs, &data, 1).unwrap();
        io.write_register(0x2060, 0xab).unwrap();
        assert_eq!(io.read_register(0x2060).unwrap(), 0xab);
        assert_eq!(io.read_register(0x2061).unwrap(), 0);

        // Bulk base 1 skips the first byte; short data stops at EOF
        let mut buf = [0u8; 8];
        assert_eq!(io.read_data(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], &[8, 7, 6, 5]);
    }

    #[test]
    fn read_past_end_is_transport_error() {
        let dir = tempfile::tempdir().unwrap();
        let regs = dir.path().join("regs");
        std::fs::write(&regs, [0u8; 4]).unwrap();
        let io = IoHandle::open(&regs, &regs, 0).unwrap();
        assert!(matches!(
            io.read_register(0x2004),
            Err(FpgaError::Transport { .. })
        ));
    }
}
