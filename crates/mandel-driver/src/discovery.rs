//! Runtime board discovery
//!
//! Boards appear as `zestsc1-N` register nodes with `-data` and `-config`
//! siblings. Card id and serial number come from sysfs when the board driver
//! publishes them.

use std::path::{Path, PathBuf};

use mandel_chip::RegisterMap;

use crate::config::BoardConfig;
use crate::device::Board;
use crate::error::{FpgaError, Result};

/// Device node prefix
pub const NODE_PREFIX: &str = "zestsc1";

/// Highest board index scanned
const MAX_BOARDS: usize = 16;

/// Information about a discovered board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardInfo {
    /// Board index (0, 1, 2, ...)
    pub index: usize,

    /// Card id reported by the board
    pub card_id: u32,

    /// Serial number reported by the board
    pub serial: u32,

    /// Register node (`/dev/zestsc1-0`, etc.)
    pub path: PathBuf,

    /// Bulk data node
    pub data_path: PathBuf,

    /// Bitstream configuration node
    pub config_path: PathBuf,
}

impl BoardInfo {
    /// Node paths for board `index` under `dev_dir`
    pub fn at(dev_dir: &Path, index: usize) -> Self {
        let base = format!("{NODE_PREFIX}-{index}");
        Self {
            index,
            card_id: 0,
            serial: 0,
            path: dev_dir.join(&base),
            data_path: dev_dir.join(format!("{base}-data")),
            config_path: dev_dir.join(format!("{base}-config")),
        }
    }
}

/// Board manager for discovery and access
#[derive(Debug)]
pub struct BoardManager {
    boards: Vec<BoardInfo>,
    bulk_port: u64,
}

impl BoardManager {
    /// Discover boards using the environment's [`BoardConfig`]
    ///
    /// # Errors
    ///
    /// Returns `FpgaError::NoDevicesFound` if no boards are detected.
    pub fn discover() -> Result<Self> {
        Self::discover_with(&BoardConfig::from_env())
    }

    /// Discover boards under the configured directories
    ///
    /// # Errors
    ///
    /// Returns `FpgaError::NoDevicesFound` if no boards are detected.
    pub fn discover_with(config: &BoardConfig) -> Result<Self> {
        tracing::info!("Discovering FPGA boards in {}...", config.dev_dir.display());

        let mut boards = Vec::new();

        for index in 0..MAX_BOARDS {
            let mut info = BoardInfo::at(&config.dev_dir, index);
            if !info.path.exists() {
                continue;
            }

            tracing::debug!("Found board node: {}", info.path.display());

            let sysfs = config.sysfs_dir.join(format!("{NODE_PREFIX}-{index}"));
            match (
                read_hex_sysfs(&sysfs.join("card_id")),
                read_hex_sysfs(&sysfs.join("serial")),
            ) {
                (Ok(card_id), Ok(serial)) => {
                    info.card_id = card_id;
                    info.serial = serial;
                }
                (Err(e), _) | (_, Err(e)) => {
                    // Card id falls back to the node index
                    tracing::warn!("No identity for board {index}: {e}");
                    info.card_id = u32::try_from(index).unwrap_or(u32::MAX);
                }
            }

            tracing::info!(
                "Board {}: card {:#010x}, serial {:#010x}",
                index,
                info.card_id,
                info.serial
            );
            boards.push(info);
        }

        if boards.is_empty() {
            tracing::error!("No FPGA boards found");
            return Err(FpgaError::NoDevicesFound);
        }

        tracing::info!("Discovered {} board(s)", boards.len());

        Ok(Self {
            boards,
            bulk_port: RegisterMap::default().bulk_port,
        })
    }

    /// Open boards with the bulk port of a different register map
    #[must_use]
    pub const fn with_register_map(mut self, registers: &RegisterMap) -> Self {
        self.bulk_port = registers.bulk_port;
        self
    }

    /// Number of discovered boards
    #[must_use]
    pub const fn device_count(&self) -> usize {
        self.boards.len()
    }

    /// All discovered boards
    #[must_use]
    pub fn devices(&self) -> &[BoardInfo] {
        &self.boards
    }

    /// Board info by index
    ///
    /// # Errors
    ///
    /// Returns `FpgaError::InvalidIndex` if no board has that index.
    pub fn device(&self, index: usize) -> Result<&BoardInfo> {
        self.boards
            .iter()
            .find(|b| b.index == index)
            .ok_or(FpgaError::InvalidIndex {
                index,
                count: self.boards.len(),
            })
    }

    /// Open board by index
    ///
    /// # Errors
    ///
    /// Returns an error if the index is invalid or the board cannot be opened.
    pub fn open(&self, index: usize) -> Result<Board> {
        Board::open(self.device(index)?, self.bulk_port)
    }

    /// Open board by card id
    ///
    /// # Errors
    ///
    /// Returns `DeviceNotFound` if no board carries the card id.
    pub fn open_card(&self, card_id: u32) -> Result<Board> {
        let info = self
            .boards
            .iter()
            .find(|b| b.card_id == card_id)
            .ok_or_else(|| FpgaError::device_not_found(format!("card {card_id:#010x}")))?;
        Board::open(info, self.bulk_port)
    }

    /// Open first available board
    ///
    /// # Errors
    ///
    /// Returns an error if no boards are available or the board cannot be opened.
    pub fn open_first(&self) -> Result<Board> {
        let info = self.boards.first().ok_or(FpgaError::NoDevicesFound)?;
        Board::open(info, self.bulk_port)
    }
}

/// Read a hexadecimal value from sysfs
fn read_hex_sysfs(path: &Path) -> Result<u32> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| FpgaError::transport(format!("Cannot read {}: {e}", path.display())))?;

    let trimmed = content.trim().trim_start_matches("0x");
    u32::from_str_radix(trimmed, 16).map_err(|e| {
        FpgaError::transport(format!("Invalid hex in {}: {e}", path.display()))
    })
}
