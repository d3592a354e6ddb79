//! Test vectors for the HDL testbench.
//!
//! The testbench drives the datapath with `(re, im)` pairs and checks the
//! escape count against a `pattern_array` constant generated here from
//! [`MandelCore`]. Regenerate the constant whenever the recurrence changes.

use std::fmt::Write as _;

use crate::core::MandelCore;

/// One testbench vector in the core's fixed-point format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pattern {
    /// Real part of `c`.
    pub re: i32,
    /// Imaginary part of `c`.
    pub im: i32,
    /// Expected escape iteration.
    pub iterations: u32,
}

/// Vectors along `im = -0.9` for `re` from `-2.2` stepping `0.05` while
/// negative, then `re = 0`.
///
/// `re` is accumulated in `f64`, so the sweep visits exactly the values the
/// testbench has always been generated with.
pub fn sweep(core: &MandelCore) -> Vec<Pattern> {
    let q = core.format();
    let im = q.encode(-0.9);
    let mut out = Vec::new();

    let mut re = -2.2f64;
    while re < 0.0 {
        let re_fixed = q.encode(re);
        out.push(Pattern {
            re: re_fixed,
            im,
            iterations: core.iterate(re_fixed, im),
        });
        re += 0.05;
    }

    let origin = q.encode(0.0);
    out.push(Pattern {
        re: origin,
        im,
        iterations: core.iterate(origin, im),
    });
    out
}

/// Render vectors as the VHDL `pattern_array` constant.
pub fn to_vhdl(patterns: &[Pattern]) -> String {
    let mut s = String::from("    constant patterns : pattern_array := (\n");
    for (i, p) in patterns.iter().enumerate() {
        let sep = if i + 1 == patterns.len() { "" } else { "," };
        // {:08x} on i32 prints the two's-complement bit pattern
        let _ = writeln!(
            s,
            "      (X\"{:08x}\", X\"{:08x}\", X\"{:08x}\"){sep}",
            p.re, p.im, p.iterations
        );
    }
    s.push_str(");\n");
    s
}
