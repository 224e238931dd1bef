//! Points, four-momenta and the beam frame.
//!
//! Units are MeV and mm throughout.

use std::ops::Add;

use serde::{Deserialize, Serialize};

/// Proton mass (MeV).
pub const PROTON_MASS: f64 = 938.272;
/// Muon mass (MeV).
pub const MUON_MASS: f64 = 105.658;
/// Neutral pion mass (MeV).
pub const PI0_MASS: f64 = 134.977;
/// MeV → GeV.
pub const MEV_TO_GEV: f64 = 1.0e-3;

/// A point in detector coordinates (mm).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    /// x (mm)
    pub x: f64,
    /// y (mm)
    pub y: f64,
    /// z (mm), along the detector axis
    pub z: f64,
}

impl Point3 {
    /// Construct a point.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// All coordinates finite (no NaN, no infinity).
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point3) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2))
            .sqrt()
    }
}

/// A four-momentum (MeV).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FourMomentum {
    /// p_x
    pub px: f64,
    /// p_y
    pub py: f64,
    /// p_z
    pub pz: f64,
    /// Energy
    pub e: f64,
}

impl FourMomentum {
    /// Construct from components.
    pub fn new(px: f64, py: f64, pz: f64, e: f64) -> Self {
        Self { px, py, pz, e }
    }

    /// Build from a scalar momentum, polar angle and azimuth, for a particle of `mass`.
    pub fn from_polar(p: f64, theta: f64, phi: f64, mass: f64) -> Self {
        let px = p * theta.sin() * phi.cos();
        let py = p * theta.sin() * phi.sin();
        let pz = p * theta.cos();
        Self { px, py, pz, e: (p * p + mass * mass).sqrt() }
    }

    /// |p|
    pub fn p(&self) -> f64 {
        (self.px * self.px + self.py * self.py + self.pz * self.pz).sqrt()
    }

    /// Invariant mass. Negative mass² is clamped to zero.
    pub fn mass(&self) -> f64 {
        let m2 = self.e * self.e - self.p().powi(2);
        if m2 > 0.0 { m2.sqrt() } else { 0.0 }
    }

    /// Polar angle w.r.t. the detector z axis.
    pub fn theta(&self) -> f64 {
        let p = self.p();
        if p == 0.0 { 0.0 } else { (self.pz / p).clamp(-1.0, 1.0).acos() }
    }

    /// Azimuth.
    pub fn phi(&self) -> f64 {
        self.py.atan2(self.px)
    }
}

impl Add for FourMomentum {
    type Output = FourMomentum;

    fn add(self, rhs: FourMomentum) -> FourMomentum {
        FourMomentum {
            px: self.px + rhs.px,
            py: self.py + rhs.py,
            pz: self.pz + rhs.pz,
            e: self.e + rhs.e,
        }
    }
}

/// Neutrino beam direction in detector coordinates.
///
/// The beam points downward by `angle` radians about the x axis (the beam
/// line dips into the detector hall).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeamFrame {
    /// Beam angle about x (rad).
    pub angle: f64,
}

impl BeamFrame {
    /// Nominal beam angle (rad).
    pub const NOMINAL_ANGLE: f64 = -0.05887;

    /// Frame with the nominal beam angle.
    pub fn new() -> Self {
        Self { angle: Self::NOMINAL_ANGLE }
    }

    /// Polar angle of `p` w.r.t. the beam, with the beam rotated by an extra
    /// `bias` radians. Returns `None` for a null momentum.
    pub fn theta_wrt_beam(&self, p: &FourMomentum, bias: f64) -> Option<f64> {
        let angle = self.angle + bias;
        let pyp = -angle.sin() * p.pz + angle.cos() * p.py;
        let pzp = angle.cos() * p.pz + angle.sin() * p.py;
        let denom2 = p.px * p.px + pyp * pyp + pzp * pzp;
        if denom2 == 0.0 {
            return None;
        }
        Some((pzp / denom2.sqrt()).clamp(-1.0, 1.0).acos())
    }
}

impl Default for BeamFrame {
    fn default() -> Self {
        Self::new()
    }
}
