//! Normalised heading angle type
//!
//! All headings handled by the motion software are represented as a
//! [`NormAngle`], an angle in radians normalised into the range (-pi, pi].
//! Wrap-around is handled by the type itself so that callers never need ad
//! hoc `atan2`/modulo corrections.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use std::ops::{Add, Neg, Sub};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An angle in radians, normalised to the range (-pi, pi].
#[derive(Debug, Default, Copy, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct NormAngle(f64);

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl NormAngle {
    /// Create a new angle from a raw radians value, normalising it into
    /// (-pi, pi].
    pub fn new(rad: f64) -> Self {
        Self(normalise(rad))
    }

    /// Get the normalised radians value.
    pub fn as_f64(&self) -> f64 {
        self.0
    }

    /// Get the sine of the angle.
    pub fn sin(&self) -> f64 {
        self.0.sin()
    }

    /// Get the cosine of the angle.
    pub fn cos(&self) -> f64 {
        self.0.cos()
    }

    /// Get the shortest signed difference `self - other`, in (-pi, pi].
    pub fn diff(&self, other: NormAngle) -> f64 {
        normalise(self.0 - other.0)
    }

    /// Get the signed angular distance from `self` to `target` when forced
    /// to travel in a fixed direction.
    ///
    /// With `negative_dir` false the distance is accumulated
    /// counter-clockwise and is always >= 0; with it true the distance is
    /// accumulated clockwise and is always <= 0.
    pub fn directed_dist(&self, target: NormAngle, negative_dir: bool) -> f64 {
        let d = target.diff(*self);
        if negative_dir {
            if d > 0.0 {
                d - std::f64::consts::TAU
            } else {
                d
            }
        } else if d < 0.0 {
            d + std::f64::consts::TAU
        } else {
            d
        }
    }

    /// True if the two angles are within `tol_rad` of each other, accounting
    /// for wrap-around.
    pub fn near(&self, other: NormAngle, tol_rad: f64) -> bool {
        self.diff(other).abs() <= tol_rad
    }
}

impl From<f64> for NormAngle {
    fn from(rad: f64) -> Self {
        Self::new(rad)
    }
}

impl Add for NormAngle {
    type Output = NormAngle;

    fn add(self, rhs: NormAngle) -> NormAngle {
        NormAngle::new(self.0 + rhs.0)
    }
}

impl Add<f64> for NormAngle {
    type Output = NormAngle;

    fn add(self, rhs: f64) -> NormAngle {
        NormAngle::new(self.0 + rhs)
    }
}

impl Sub for NormAngle {
    type Output = NormAngle;

    fn sub(self, rhs: NormAngle) -> NormAngle {
        NormAngle::new(self.0 - rhs.0)
    }
}

impl Sub<f64> for NormAngle {
    type Output = NormAngle;

    fn sub(self, rhs: f64) -> NormAngle {
        NormAngle::new(self.0 - rhs)
    }
}

impl Neg for NormAngle {
    type Output = NormAngle;

    fn neg(self) -> NormAngle {
        NormAngle::new(-self.0)
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Normalise a radians value into (-pi, pi].
fn normalise(rad: f64) -> f64 {
    let mut a = rad.rem_euclid(std::f64::consts::TAU);
    if a > std::f64::consts::PI {
        a -= std::f64::consts::TAU;
    }
    a
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
