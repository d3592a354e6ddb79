//! Error types for accelerator operations

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for accelerator operations
pub type Result<T> = std::result::Result<T, FpgaError>;

/// Errors that can occur while driving the accelerator
#[derive(Debug, Error)]
pub enum FpgaError {
    /// Device node not found at the expected path
    #[error("Device not found: {path}")]
    DeviceNotFound {
        /// Path that was checked
        path: PathBuf,
    },

    /// No accelerator boards detected on the system
    #[error("No FPGA boards detected")]
    NoDevicesFound,

    /// Board index out of range
    #[error("Board index {index} out of range (have {count} boards)")]
    InvalidIndex {
        /// Requested index
        index: usize,
        /// Number of available boards
        count: usize,
    },

    /// Loading the bitstream onto the board failed
    #[error("Configuration from {path} failed: {reason}")]
    ConfigurationFailed {
        /// Bitstream path
        path: PathBuf,
        /// Reason for failure
        reason: String,
    },

    /// Register or bulk access failed at the transport layer
    #[error("Transport error: {reason}")]
    Transport {
        /// Reason for failure
        reason: String,
    },

    /// Bulk transfer returned fewer bytes than a frame holds
    #[error("Short transfer: got {got} of {expected} bytes")]
    ShortTransfer {
        /// Frame size in bytes
        expected: usize,
        /// Bytes actually received
        got: usize,
    },

    /// Completion poll exceeded its budget
    #[error("Accelerator did not complete after {polls} polls ({elapsed_ms}ms)")]
    ProtocolTimeout {
        /// Status reads performed
        polls: u64,
        /// Time spent polling in milliseconds
        elapsed_ms: u64,
    },

    /// Frame cancelled while polling
    #[error("Frame cancelled after {polls} polls")]
    Cancelled {
        /// Status reads performed before cancellation
        polls: u64,
    },

    /// Device or controller in an invalid state
    #[error("Device in invalid state: {state}")]
    InvalidState {
        /// Current state description
        state: String,
    },

    /// Viewport cannot be encoded on the wire
    #[error("Invalid viewport: {reason}")]
    InvalidViewport {
        /// Reason for rejection
        reason: String,
    },

    /// Caller-supplied frame buffer has the wrong size
    #[error("Frame buffer holds {got} bytes, frame needs {expected}")]
    BufferSize {
        /// Frame size in bytes
        expected: usize,
        /// Buffer size in bytes
        got: usize,
    },

    /// I/O error during device communication
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

impl FpgaError {
    /// Create a device not found error
    pub fn device_not_found(path: impl Into<PathBuf>) -> Self {
        Self::DeviceNotFound { path: path.into() }
    }

    /// Create a configuration failed error
    pub fn configuration_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ConfigurationFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a transport error
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(state: impl Into<String>) -> Self {
        Self::InvalidState {
            state: state.into(),
        }
    }

    /// Create an invalid viewport error
    pub fn invalid_viewport(reason: impl Into<String>) -> Self {
        Self::InvalidViewport {
            reason: reason.into(),
        }
    }

    /// Whether retrying the whole frame may succeed.
    ///
    /// Transport hiccups, short transfers and poll timeouts are transient;
    /// discovery, configuration and caller errors are not, and a cancelled
    /// frame must not be restarted behind the caller's back.
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. }
                | Self::ShortTransfer { .. }
                | Self::ProtocolTimeout { .. }
                | Self::Io { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_classification() {
        assert!(FpgaError::transport("usb stall").is_recoverable());
        assert!(FpgaError::ProtocolTimeout { polls: 10, elapsed_ms: 5 }.is_recoverable());
        assert!(FpgaError::ShortTransfer { expected: 4, got: 1 }.is_recoverable());
        assert!(!FpgaError::Cancelled { polls: 3 }.is_recoverable());
        assert!(!FpgaError::NoDevicesFound.is_recoverable());
        assert!(!FpgaError::configuration_failed("a.bit", "no sync word").is_recoverable());
    }

    #[test]
    fn messages_name_the_failure() {
        let e = FpgaError::ProtocolTimeout { polls: 1000, elapsed_ms: 250 };
        assert_eq!(e.to_string(), "Accelerator did not complete after 1000 polls (250ms)");
        let e = FpgaError::configuration_failed("FPGA-VHDL/Example3.bit", "empty file");
        assert!(e.to_string().contains("Example3.bit"));
    }
}
