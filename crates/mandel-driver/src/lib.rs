//! Host driver for the fixed-point Mandelbrot FPGA accelerator.
//!
//! The accelerator renders a 320×240 escape-iteration frame from four
//! Q5.27 view words. This crate speaks its register protocol, owns the
//! board handle, and checks retrieved frames against the reference core in
//! [`mandel_chip`].
//!
//! # Ports
//!
//! ```text
//! Board                /dev/zestsc1-N register window + bulk data node
//! SoftwareAccelerator  same protocol served in memory (CI, parity)
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use mandel_driver::{AcceleratorController, BoardManager, ProtocolConfig, ViewBounds};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut board = BoardManager::discover()?.open_first()?;
//! board.configure("FPGA-VHDL/Example3.bit")?;
//!
//! let config = ProtocolConfig::default();
//! let viewport = ViewBounds::default().viewport(config.geometry)?;
//! let mut ctl = AcceleratorController::new(board, config)?;
//! let (frame, metrics) = ctl.render(&viewport)?;
//! mandel_driver::write_pgm("mandel.pgm", &frame)?;
//! println!("{metrics}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

mod backend;
pub mod backends;
pub mod channel;
pub mod config;
pub mod controller;
mod device;
mod discovery;
mod error;
mod frame;
mod io;
pub mod validate;
pub mod viewport;

pub use backend::{open_board, select_backend, AcceleratorPort, BackendSelection, BackendType};
pub use backends::software::{SoftwareAccelerator, TrafficStats};
pub use channel::{BulkTransport, RegisterChannel};
pub use config::{BoardConfig, PollPolicy, ProtocolConfig, RetryPolicy};
pub use controller::{
    frames_per_second, AcceleratorController, CancellationToken, Clock, FrameMetrics, FrameState,
    ManualClock, Progress, SystemClock,
};
pub use device::{Bitstream, Board};
pub use discovery::{BoardInfo, BoardManager};
pub use error::{FpgaError, Result};
pub use frame::{write_pgm, Frame, FrameSink, PgmWriter};
pub use validate::{reference_frame, Mismatch, ParityReport};
pub use viewport::{ViewBounds, Viewport, Zoom};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        AcceleratorController, AcceleratorPort, BoardManager, Frame, FpgaError, ProtocolConfig,
        RegisterChannel, BulkTransport, Result, SoftwareAccelerator, ViewBounds, Viewport,
    };
}
