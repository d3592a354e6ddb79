//! Backend abstraction for accelerator ports
//!
//! A port is anything that speaks the register protocol: a real board
//! behind its device nodes, or the in-memory software accelerator.

use std::fmt::Debug;

use crate::backends::software::SoftwareAccelerator;
use crate::channel::{BulkTransport, RegisterChannel};
use crate::config::{BoardConfig, ProtocolConfig};
use crate::device::Board;
use crate::discovery::BoardManager;
use crate::error::Result;

/// Register channel plus bulk port of one accelerator
pub trait AcceleratorPort: RegisterChannel + BulkTransport + Debug + Send {
    /// Get backend type for debugging
    fn backend_type(&self) -> BackendType;

    /// One-line description for logs
    fn describe(&self) -> String;
}

impl<T: AcceleratorPort + ?Sized> AcceleratorPort for Box<T> {
    fn backend_type(&self) -> BackendType {
        (**self).backend_type()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Backend type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// Board device nodes (`/dev/zestsc1-*`)
    DeviceFile,

    /// Software accelerator: fixed-point reference core, no hardware required
    Software,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeviceFile => write!(f, "DeviceFile"),
            Self::Software => write!(f, "Software (reference core)"),
        }
    }
}

/// Backend selection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendSelection {
    /// Use a board if one can be opened and configured, else software
    #[default]
    Auto,

    /// Force a board
    DeviceFile,

    /// Force the software accelerator, for CI and parity runs
    Software,
}

/// Open the first board and load the configured bitstream onto it
///
/// # Errors
///
/// Returns error if no board is found, it cannot be opened, or the
/// bitstream is rejected.
pub fn open_board(board: &BoardConfig, protocol: &ProtocolConfig) -> Result<Board> {
    let mut handle = BoardManager::discover_with(board)?
        .with_register_map(&protocol.registers)
        .open_first()?;
    handle.configure(&board.bitstream)?;
    Ok(handle)
}

/// Select a port based on availability
///
/// # Errors
///
/// Returns error if a forced board cannot be opened and configured.
pub fn select_backend(
    selection: BackendSelection,
    board: &BoardConfig,
    protocol: &ProtocolConfig,
) -> Result<Box<dyn AcceleratorPort>> {
    match selection {
        BackendSelection::Auto => match open_board(board, protocol) {
            Ok(handle) => {
                tracing::info!("Using {}", handle.describe());
                Ok(Box::new(handle))
            }
            Err(e) => {
                tracing::warn!("No usable board ({e}), using software accelerator");
                Ok(Box::new(SoftwareAccelerator::new(protocol.clone())))
            }
        },

        BackendSelection::DeviceFile => {
            open_board(board, protocol).map(|b| Box::new(b) as Box<dyn AcceleratorPort>)
        }

        BackendSelection::Software => {
            tracing::info!("Using software accelerator");
            Ok(Box::new(SoftwareAccelerator::new(protocol.clone())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nowhere() -> BoardConfig {
        BoardConfig::default()
            .with_dev_dir("/nonexistent/dev")
            .with_sysfs_dir("/nonexistent/sys")
    }

    #[test]
    fn auto_falls_back_to_software() {
        let port = select_backend(BackendSelection::Auto, &nowhere(), &ProtocolConfig::default())
            .unwrap();
        assert_eq!(port.backend_type(), BackendType::Software);
    }

    #[test]
    fn forced_device_reports_missing_board() {
        let err = select_backend(
            BackendSelection::DeviceFile,
            &nowhere(),
            &ProtocolConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, crate::FpgaError::NoDevicesFound));
    }

    #[test]
    fn display_names() {
        assert_eq!(BackendType::DeviceFile.to_string(), "DeviceFile");
        assert!(BackendType::Software.to_string().starts_with("Software"));
    }
}
