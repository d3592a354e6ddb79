//! Register and bulk access to the accelerator
//!
//! The board's register bus is one byte wide. Every word-sized quantity is
//! composed from single-byte accesses here, so each transport only has to
//! provide `read_byte`/`write_byte` and one bulk read.
//!
//! No atomicity is promised across the bytes of a word: the accelerator
//! latches a word once its last byte lands. Callers must not interleave
//! other register traffic inside a word, which `&mut self` guarantees for a
//! single owner.

use mandel_chip::regs::WORD_BYTES;
use mandel_chip::ByteOrder;

use crate::error::{FpgaError, Result};

/// Byte-addressable register space of an open accelerator
pub trait RegisterChannel {
    /// Write one register byte
    ///
    /// # Errors
    ///
    /// Returns error if the handle is invalid or the transport fails.
    fn write_byte(&mut self, addr: u32, value: u8) -> Result<()>;

    /// Read one register byte
    ///
    /// # Errors
    ///
    /// Returns error if the handle is invalid or the transport fails.
    fn read_byte(&mut self, addr: u32) -> Result<u8>;

    /// Write a 32-bit word as four sequential byte writes, `addr + 0` first
    ///
    /// # Errors
    ///
    /// Returns the first byte write error; earlier bytes stay written.
    fn write_word(&mut self, addr: u32, value: u32, order: ByteOrder) -> Result<()> {
        for (offset, byte) in (0u32..).zip(order.decompose(value)) {
            self.write_byte(addr.wrapping_add(offset), byte)?;
        }
        Ok(())
    }

    /// Read an `n_bytes`-wide word as sequential byte reads, most
    /// significant byte first
    ///
    /// # Errors
    ///
    /// Returns error if `n_bytes` exceeds a word or any byte read fails.
    fn read_word(&mut self, addr: u32, n_bytes: u32, order: ByteOrder) -> Result<u32> {
        if n_bytes > WORD_BYTES {
            return Err(FpgaError::invalid_state(format!(
                "read_word of {n_bytes} bytes exceeds a {WORD_BYTES}-byte word"
            )));
        }

        let mut bytes = [0u8; WORD_BYTES as usize];
        for offset in order.msb_first_offsets(n_bytes) {
            bytes[offset as usize] = self.read_byte(addr.wrapping_add(offset))?;
        }
        Ok(order.compose(&bytes[..n_bytes as usize]))
    }
}

/// Block transfer out of the accelerator's bulk data port
pub trait BulkTransport {
    /// Read up to `buffer.len()` bytes, returning the count received
    ///
    /// # Errors
    ///
    /// Returns error if the transport fails.
    fn read_bulk(&mut self, buffer: &mut [u8]) -> Result<usize>;
}

impl<T: RegisterChannel + ?Sized> RegisterChannel for &mut T {
    fn write_byte(&mut self, addr: u32, value: u8) -> Result<()> {
        (**self).write_byte(addr, value)
    }

    fn read_byte(&mut self, addr: u32) -> Result<u8> {
        (**self).read_byte(addr)
    }
}

impl<T: RegisterChannel + ?Sized> RegisterChannel for Box<T> {
    fn write_byte(&mut self, addr: u32, value: u8) -> Result<()> {
        (**self).write_byte(addr, value)
    }

    fn read_byte(&mut self, addr: u32) -> Result<u8> {
        (**self).read_byte(addr)
    }
}

impl<T: BulkTransport + ?Sized> BulkTransport for &mut T {
    fn read_bulk(&mut self, buffer: &mut [u8]) -> Result<usize> {
        (**self).read_bulk(buffer)
    }
}

impl<T: BulkTransport + ?Sized> BulkTransport for Box<T> {
    fn read_bulk(&mut self, buffer: &mut [u8]) -> Result<usize> {
        (**self).read_bulk(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryChannel {
        bytes: HashMap<u32, u8>,
        log: Vec<(char, u32)>,
    }

    impl RegisterChannel for MemoryChannel {
        fn write_byte(&mut self, addr: u32, value: u8) -> Result<()> {
            self.log.push(('w', addr));
            self.bytes.insert(addr, value);
            Ok(())
        }

        fn read_byte(&mut self, addr: u32) -> Result<u8> {
            self.log.push(('r', addr));
            Ok(self.bytes.get(&addr).copied().unwrap_or(0))
        }
    }

    #[test]
    fn write_word_little_endian_lsb_at_base() {
        let mut ch = MemoryChannel::default();
        ch.write_word(0x2060, 0x1122_3344, ByteOrder::LittleEndian).unwrap();
        assert_eq!(ch.bytes[&0x2060], 0x44);
        assert_eq!(ch.bytes[&0x2063], 0x11);
        let order: Vec<u32> = ch.log.iter().map(|(_, a)| *a).collect();
        assert_eq!(order, [0x2060, 0x2061, 0x2062, 0x2063]);
    }

    #[test]
    fn write_word_big_endian_msb_at_base() {
        let mut ch = MemoryChannel::default();
        ch.write_word(0x2060, 0x1122_3344, ByteOrder::BigEndian).unwrap();
        assert_eq!(ch.bytes[&0x2060], 0x11);
        assert_eq!(ch.bytes[&0x2063], 0x44);
    }

    #[test]
    fn word_round_trip_both_orders() {
        for order in [ByteOrder::LittleEndian, ByteOrder::BigEndian] {
            let mut ch = MemoryChannel::default();
            for v in [0u32, 0x5555_5555, 0xfee1_dead, u32::MAX] {
                ch.write_word(0x2004, v, order).unwrap();
                assert_eq!(ch.read_word(0x2004, 4, order).unwrap(), v);
            }
        }
    }

    #[test]
    fn read_word_walks_high_byte_first() {
        let mut ch = MemoryChannel::default();
        ch.read_word(0x2004, 4, ByteOrder::LittleEndian).unwrap();
        let order: Vec<u32> = ch.log.iter().map(|(_, a)| *a).collect();
        assert_eq!(order, [0x2007, 0x2006, 0x2005, 0x2004]);
    }

    #[test]
    fn read_partial_word() {
        let mut ch = MemoryChannel::default();
        ch.write_word(0x2004, 0x0000_00f0, ByteOrder::LittleEndian).unwrap();
        assert_eq!(ch.read_word(0x2004, 1, ByteOrder::LittleEndian).unwrap(), 0xf0);
        assert!(ch.read_word(0x2004, 5, ByteOrder::LittleEndian).is_err());
    }

    #[test]
    fn forwarding_through_box() {
        let mut ch: Box<dyn RegisterChannel> = Box::new(MemoryChannel::default());
        ch.write_word(0x10, 7, ByteOrder::LittleEndian).unwrap();
        assert_eq!(ch.read_word(0x10, 4, ByteOrder::LittleEndian).unwrap(), 7);
    }
}
