// SPDX-License-Identifier: AGPL-3.0-only

//! Software accelerator
//!
//! Serves the register protocol from memory and renders with the same
//! fixed-point core the hardware implements. It is what CI runs frames
//! against, and what hardware frames are compared with.
//!
//! ## Behaviour
//!
//! ```text
//! write viewport byte   → new frame: status = HEIGHT (remaining scanlines)
//! read status word      → remaining -= scanlines_per_poll, once per word
//! remaining reaches 0   → frame rendered, status = sentinel
//! write trigger = 1     → bulk port armed (only after completion)
//! bulk read             → frame bytes, port disarmed
//! ```
//!
//! The countdown advances when the most significant status byte is read,
//! which is the first byte of every word read.

use std::collections::HashMap;

use mandel_chip::regs::{TRANSFER_GO, WORD_BYTES};
use mandel_chip::{MandelCore, ReferenceView};
use tracing::{debug, info};

use crate::backend::{AcceleratorPort, BackendType};
use crate::channel::{BulkTransport, RegisterChannel};
use crate::config::ProtocolConfig;
use crate::error::{FpgaError, Result};

/// Counters of protocol traffic seen by the software accelerator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrafficStats {
    /// Full status word reads
    pub status_polls: u64,
    /// Trigger writes accepted
    pub triggers: u64,
    /// Bulk reads served
    pub bulk_reads: u64,
    /// Frames rendered
    pub frames: u64,
}

/// In-memory accelerator.
#[derive(Debug)]
pub struct SoftwareAccelerator {
    config: ProtocolConfig,
    core: MandelCore,
    /// Register bytes as last written
    registers: HashMap<u32, u8>,
    /// Scanlines left in the current frame; `None` when idle
    remaining: Option<u32>,
    /// Scanlines retired per status poll
    scanlines_per_poll: u32,
    /// Never finish a frame
    stalled: bool,
    frame: Vec<u8>,
    armed: bool,
    /// Cap on bytes served per bulk read
    bulk_limit: Option<usize>,
    /// Bulk reads still to fail
    bulk_failures: u32,
    stats: TrafficStats,
}

impl SoftwareAccelerator {
    /// Accelerator speaking `config`, rendering with the reference core
    pub fn new(config: ProtocolConfig) -> Self {
        info!(
            "Software accelerator: {} frame, sentinel {:#010x}, {} byte order",
            config.geometry, config.sentinel, config.byte_order
        );
        Self {
            frame: vec![0; config.geometry.len()],
            config,
            core: MandelCore::default(),
            registers: HashMap::new(),
            remaining: None,
            scanlines_per_poll: 1,
            stalled: false,
            armed: false,
            bulk_limit: None,
            bulk_failures: 0,
            stats: TrafficStats::default(),
        }
    }

    /// Retire `n` scanlines per status poll (at least one)
    #[must_use]
    pub fn with_scanlines_per_poll(mut self, n: u32) -> Self {
        self.scanlines_per_poll = n.max(1);
        self
    }

    /// Render with a different core
    #[must_use]
    pub const fn with_core(mut self, core: MandelCore) -> Self {
        self.core = core;
        self
    }

    /// Never report completion
    #[must_use]
    pub const fn stalled(mut self) -> Self {
        self.stalled = true;
        self
    }

    /// Serve at most `limit` bytes per bulk read
    #[must_use]
    pub const fn with_bulk_limit(mut self, limit: usize) -> Self {
        self.bulk_limit = Some(limit);
        self
    }

    /// Fail the next `count` bulk reads with a transport error
    #[must_use]
    pub const fn with_bulk_failures(mut self, count: u32) -> Self {
        self.bulk_failures = count;
        self
    }

    /// Traffic counters
    pub const fn stats(&self) -> TrafficStats {
        self.stats
    }

    /// Last rendered frame
    pub fn frame(&self) -> &[u8] {
        &self.frame
    }

    fn word_range(base: u32) -> std::ops::Range<u32> {
        base..base.wrapping_add(WORD_BYTES)
    }

    fn is_viewport_byte(&self, addr: u32) -> bool {
        self.config
            .registers
            .viewport_words()
            .iter()
            .any(|&base| Self::word_range(base).contains(&addr))
    }

    fn latched_word(&self, base: u32) -> u32 {
        let bytes: Vec<u8> = Self::word_range(base)
            .map(|a| self.registers.get(&a).copied().unwrap_or(0))
            .collect();
        self.config.byte_order.compose(&bytes)
    }

    fn status_word(&self) -> u32 {
        match self.remaining {
            Some(0) => self.config.sentinel,
            Some(n) => n,
            None => 0,
        }
    }

    fn advance(&mut self) {
        self.stats.status_polls += 1;
        let Some(remaining) = self.remaining else {
            return;
        };
        if remaining == 0 || self.stalled {
            return;
        }
        let left = remaining.saturating_sub(self.scanlines_per_poll);
        self.remaining = Some(left);
        if left == 0 {
            self.render();
        }
    }

    #[allow(clippy::cast_possible_wrap)]
    fn render(&mut self) {
        let regs = self.config.registers;
        let view = ReferenceView {
            x0: self.latched_word(regs.view_x) as i32,
            y0: self.latched_word(regs.view_y) as i32,
            dx: self.latched_word(regs.step_x) as i32,
            dy: self.latched_word(regs.step_y) as i32,
            wire: self.config.wire_format,
        };
        self.frame.resize(self.config.geometry.len(), 0);
        view.render(&self.core, self.config.geometry, &mut self.frame);
        self.stats.frames += 1;
        debug!("Rendered frame {} from {view:?}", self.stats.frames);
    }
}

impl RegisterChannel for SoftwareAccelerator {
    fn write_byte(&mut self, addr: u32, value: u8) -> Result<()> {
        self.registers.insert(addr, value);

        if self.is_viewport_byte(addr) {
            self.remaining = Some(self.config.geometry.height);
            self.armed = false;
        } else if addr == self.config.registers.transfer_start && value == TRANSFER_GO {
            if self.remaining != Some(0) {
                return Err(FpgaError::invalid_state(
                    "transfer triggered before frame completion",
                ));
            }
            self.armed = true;
            self.stats.triggers += 1;
        }
        Ok(())
    }

    fn read_byte(&mut self, addr: u32) -> Result<u8> {
        let status = self.config.registers.status;
        if !Self::word_range(status).contains(&addr) {
            return Ok(self.registers.get(&addr).copied().unwrap_or(0));
        }

        let offset = addr - status;
        if self.config.byte_order.msb_first_offsets(WORD_BYTES).next() == Some(offset) {
            self.advance();
        }
        let bytes = self.config.byte_order.decompose(self.status_word());
        Ok(bytes[offset as usize])
    }
}

impl BulkTransport for SoftwareAccelerator {
    fn read_bulk(&mut self, buffer: &mut [u8]) -> Result<usize> {
        if self.bulk_failures > 0 {
            self.bulk_failures -= 1;
            return Err(FpgaError::transport("injected bulk failure"));
        }
        if !self.armed {
            return Err(FpgaError::transport("bulk read without transfer trigger"));
        }
        self.armed = false;
        self.stats.bulk_reads += 1;

        let mut n = buffer.len().min(self.frame.len());
        if let Some(limit) = self.bulk_limit {
            n = n.min(limit);
        }
        buffer[..n].copy_from_slice(&self.frame[..n]);
        Ok(n)
    }
}

impl AcceleratorPort for SoftwareAccelerator {
    fn backend_type(&self) -> BackendType {
        BackendType::Software
    }

    fn describe(&self) -> String {
        format!("software accelerator ({})", self.config.geometry)
    }
}
