//! Silicon model for the fixed-point Mandelbrot accelerator.
//!
//! This crate has **no dependencies** and **no hardware access**; it is a
//! pure model of the accelerator build: register offsets, the Q-format
//! fixed-point codec used on the wire, the escape-iteration core that the
//! HDL mirrors bit-for-bit, and the test-vector table fed to the HDL
//! testbench.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`fixed`] | Q5.27 (protocol) and Q6.26 (reference) codec |
//! | [`word`] | 32-bit word ⇄ byte decomposition, both byte orders |
//! | [`regs`] | Register map of the reference build, completion sentinel |
//! | [`core`] | Reference escape-iteration core and reference frame |
//! | [`frame`] | Frame geometry and PGM header |
//! | [`patterns`] | VHDL `pattern_array` test vectors |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod core;
pub mod fixed;
pub mod frame;
pub mod patterns;
pub mod regs;
pub mod word;

pub use crate::core::{MandelCore, ReferenceView, ITERATIONS};
pub use fixed::QFormat;
pub use frame::FrameGeometry;
pub use regs::RegisterMap;
pub use word::ByteOrder;
