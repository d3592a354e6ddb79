//! Protocol and deployment configuration
//!
//! [`ProtocolConfig`] carries everything that is specific to one accelerator
//! build: register offsets, byte order, wire format, sentinel and frame
//! geometry, plus the host-side poll and retry budgets. [`BoardConfig`]
//! carries where the board lives on this machine.

use std::path::PathBuf;
use std::time::Duration;

use mandel_chip::regs::STATUS_DONE;
use mandel_chip::{ByteOrder, FrameGeometry, QFormat, RegisterMap};

use crate::error::{FpgaError, Result};

/// Device node directory override
pub const ENV_DEV_DIR: &str = "MANDEL_FPGA_DEV_DIR";
/// Board sysfs class directory override
pub const ENV_SYSFS: &str = "MANDEL_FPGA_SYSFS";
/// Bitstream path override
pub const ENV_BITSTREAM: &str = "MANDEL_FPGA_BITSTREAM";

/// Bound on the completion poll
///
/// At least one of `max_polls` and `timeout` must be set; whichever runs out
/// first ends the frame with `ProtocolTimeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Maximum status reads per frame
    pub max_polls: Option<u64>,
    /// Wall-clock budget per frame
    pub timeout: Option<Duration>,
    /// Pause between status reads
    pub interval: Duration,
}

impl PollPolicy {
    /// Budget by poll count only, polling back to back
    pub const fn polls(max_polls: u64) -> Self {
        Self {
            max_polls: Some(max_polls),
            timeout: None,
            interval: Duration::ZERO,
        }
    }

    /// Budget by wall-clock time only
    pub const fn timeout(timeout: Duration, interval: Duration) -> Self {
        Self {
            max_polls: None,
            timeout: Some(timeout),
            interval,
        }
    }

    /// Whether `polls` reads or `elapsed` time exhaust the budget
    pub fn exhausted(&self, polls: u64, elapsed: Duration) -> bool {
        self.max_polls.is_some_and(|max| polls >= max)
            || self.timeout.is_some_and(|limit| elapsed >= limit)
    }

    /// Whether the poll loop is guaranteed to end
    pub const fn is_bounded(&self) -> bool {
        self.max_polls.is_some() || self.timeout.is_some()
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_polls: Some(1_000_000),
            timeout: Some(Duration::from_secs(5)),
            interval: Duration::from_micros(50),
        }
    }
}

/// Whole-frame retry budget for recoverable errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per frame, including the first
    pub frame_attempts: u32,
    /// Pause before each retry
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            frame_attempts: 3,
            backoff: Duration::from_millis(10),
        }
    }
}

/// Accelerator build and host protocol parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolConfig {
    /// Register offsets
    pub registers: RegisterMap,
    /// Byte order of multi-byte registers
    pub byte_order: ByteOrder,
    /// Fixed-point format of the viewport words
    pub wire_format: QFormat,
    /// Status value meaning "frame complete"
    pub sentinel: u32,
    /// Frame dimensions
    pub geometry: FrameGeometry,
    /// Completion poll budget
    pub poll: PollPolicy,
    /// Whole-frame retry budget
    pub retry: RetryPolicy,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            registers: RegisterMap::default(),
            byte_order: ByteOrder::default(),
            wire_format: QFormat::PROTOCOL,
            sentinel: STATUS_DONE,
            geometry: FrameGeometry::default(),
            poll: PollPolicy::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl ProtocolConfig {
    /// Use a different register map
    #[must_use]
    pub const fn with_registers(mut self, registers: RegisterMap) -> Self {
        self.registers = registers;
        self
    }

    /// Use a different byte order
    #[must_use]
    pub const fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    /// Use a different wire format
    #[must_use]
    pub const fn with_wire_format(mut self, wire_format: QFormat) -> Self {
        self.wire_format = wire_format;
        self
    }

    /// Use a different completion sentinel
    #[must_use]
    pub const fn with_sentinel(mut self, sentinel: u32) -> Self {
        self.sentinel = sentinel;
        self
    }

    /// Use a different frame geometry
    #[must_use]
    pub const fn with_geometry(mut self, geometry: FrameGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    /// Use a different poll budget
    #[must_use]
    pub const fn with_poll(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Use a different retry budget
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Frame size in bytes
    pub const fn frame_len(&self) -> usize {
        self.geometry.len()
    }

    /// Check the configuration can drive a frame
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` for overlapping registers, an empty frame, an
    /// unbounded poll, or zero frame attempts.
    pub fn validate(&self) -> Result<()> {
        self.registers.validate().map_err(FpgaError::invalid_state)?;
        if self.geometry.is_empty() {
            return Err(FpgaError::invalid_state(format!(
                "empty frame geometry {}",
                self.geometry
            )));
        }
        if !self.poll.is_bounded() {
            return Err(FpgaError::invalid_state(
                "poll policy needs a poll cap or a timeout",
            ));
        }
        if self.retry.frame_attempts == 0 {
            return Err(FpgaError::invalid_state("retry policy allows no attempts"));
        }
        Ok(())
    }
}

/// Where boards and bitstreams live on this host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardConfig {
    /// Directory holding `zestsc1-N` device nodes
    pub dev_dir: PathBuf,
    /// Sysfs class directory with per-board `card_id`/`serial`
    pub sysfs_dir: PathBuf,
    /// Bitstream loaded by `configure`
    pub bitstream: PathBuf,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            dev_dir: PathBuf::from("/dev"),
            sysfs_dir: PathBuf::from("/sys/class/zestsc1"),
            bitstream: PathBuf::from("FPGA-VHDL/Example3.bit"),
        }
    }
}

impl BoardConfig {
    /// Defaults overridden by `MANDEL_FPGA_DEV_DIR`, `MANDEL_FPGA_SYSFS` and
    /// `MANDEL_FPGA_BITSTREAM`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(dir) = std::env::var_os(ENV_DEV_DIR) {
            config.dev_dir = dir.into();
        }
        if let Some(dir) = std::env::var_os(ENV_SYSFS) {
            config.sysfs_dir = dir.into();
        }
        if let Some(path) = std::env::var_os(ENV_BITSTREAM) {
            config.bitstream = path.into();
        }
        tracing::debug!(
            "Board config: dev {}, sysfs {}, bitstream {}",
            config.dev_dir.display(),
            config.sysfs_dir.display(),
            config.bitstream.display()
        );
        config
    }

    /// Use a different device node directory
    #[must_use]
    pub fn with_dev_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dev_dir = dir.into();
        self
    }

    /// Use a different sysfs directory
    #[must_use]
    pub fn with_sysfs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sysfs_dir = dir.into();
        self
    }

    /// Use a different bitstream
    #[must_use]
    pub fn with_bitstream(mut self, path: impl Into<PathBuf>) -> Self {
        self.bitstream = path.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_reference_build() {
        let config = ProtocolConfig::default();
        assert_eq!(config.sentinel, 0x5555_5555);
        assert_eq!(config.wire_format.frac_bits(), 27);
        assert_eq!(config.byte_order, ByteOrder::LittleEndian);
        assert_eq!(config.frame_len(), 320 * 240);
        config.validate().unwrap();
    }

    #[test]
    fn poll_budget_by_count_or_time() {
        let by_count = PollPolicy::polls(3);
        assert!(!by_count.exhausted(2, Duration::from_secs(3600)));
        assert!(by_count.exhausted(3, Duration::ZERO));

        let by_time = PollPolicy::timeout(Duration::from_millis(10), Duration::ZERO);
        assert!(!by_time.exhausted(u64::MAX, Duration::from_millis(9)));
        assert!(by_time.exhausted(0, Duration::from_millis(10)));
    }

    #[test]
    fn validate_rejects_unbounded_poll() {
        let poll = PollPolicy {
            max_polls: None,
            timeout: None,
            interval: Duration::ZERO,
        };
        let err = ProtocolConfig::default().with_poll(poll).validate().unwrap_err();
        assert!(matches!(err, FpgaError::InvalidState { .. }));
    }

    #[test]
    fn validate_rejects_empty_geometry_and_zero_attempts() {
        let config = ProtocolConfig::default().with_geometry(FrameGeometry::new(0, 240));
        assert!(config.validate().is_err());
        let config = ProtocolConfig::default().with_retry(RetryPolicy {
            frame_attempts: 0,
            backoff: Duration::ZERO,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn board_config_builders() {
        let config = BoardConfig::default()
            .with_dev_dir("/tmp/dev")
            .with_bitstream("a.bit");
        assert_eq!(config.dev_dir, PathBuf::from("/tmp/dev"));
        assert_eq!(config.sysfs_dir, PathBuf::from("/sys/class/zestsc1"));
        assert_eq!(config.bitstream, PathBuf::from("a.bit"));
    }
}
