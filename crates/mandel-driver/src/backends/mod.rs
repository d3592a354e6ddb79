//! Accelerator port implementations
//!
//! - **DeviceFile**: [`crate::device::Board`], a real board behind its device nodes
//! - **Software**: [`SoftwareAccelerator`], the register protocol served in memory

pub mod software;

pub use software::SoftwareAccelerator;
