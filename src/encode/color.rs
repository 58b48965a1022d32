//! Tolerance-based color equality

use crate::capture::Color;

/// Default per-channel tolerance
pub const DEFAULT_EPS: u8 = 2;

/// Two colors match iff every channel differs by strictly less than `eps`.
///
/// Reflexive (for `eps >= 1`) and symmetric, but not transitive: a slow
/// gradient can drift arbitrarily far while each neighbouring pair matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorApprox {
    eps: u8,
}

impl ColorApprox {
    pub const fn new(eps: u8) -> Self {
        Self { eps }
    }

    pub fn eps(&self) -> u8 {
        self.eps
    }

    pub fn same(&self, a: Color, b: Color) -> bool {
        a.r.abs_diff(b.r) < self.eps && a.g.abs_diff(b.g) < self.eps && a.b.abs_diff(b.b) < self.eps
    }
}

impl Default for ColorApprox {
    fn default() -> Self {
        Self::new(DEFAULT_EPS)
    }
}
