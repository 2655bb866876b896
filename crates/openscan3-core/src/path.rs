//! Scan path geometry — consumed as opaque data, produced by an external
//! path generator (path geometry math itself is out of scope, per the
//! subsystem's non-goals).

use serde::{Deserialize, Serialize};

/// A point on the scanning sphere in polar coordinates.
///
/// `theta` and `fi` are in degrees; `r` is the normalized radius (1.0 at the
/// default working distance). Ordering and equality are derived so a path
/// can be stored as an insertion-ordered map key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolarPoint3D {
    pub theta: f64,
    pub fi: f64,
    pub r: f64,
}

impl PolarPoint3D {
    pub fn new(theta: f64, fi: f64, r: f64) -> Self {
        Self { theta, fi, r }
    }

    /// The safe home position motors are returned to after a scan.
    pub fn home() -> Self {
        Self::new(90.0, 90.0, 1.0)
    }
}

/// An ordered scan path: execution order is the vector order, the `usize`
/// preserves each point's index in the *un-optimized* sequence so saved
/// photos stay linked to the original scan-setting positions.
pub type ScanPath = Vec<(PolarPoint3D, usize)>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn home_is_ninety_ninety() {
        let home = PolarPoint3D::home();
        assert_eq!(home.theta, 90.0);
        assert_eq!(home.fi, 90.0);
    }
}
