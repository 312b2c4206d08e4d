//! Two-body Kepler propagation.
//!
//! Mean anomaly is advanced linearly from the element epoch, Kepler's
//! equation is solved for the eccentric anomaly by Newton-Raphson, and the
//! resulting perifocal state is rotated into the inertial (ECI) frame.
//!
//! No perturbations are modelled: drag, J2 and third bodies are ignored.
use log::trace;
use nalgebra::{Rotation3, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::*;
use crate::elements::{normalize_angle, Orbit};
use crate::time::UtcInstant;

/// Eccentricity above which Newton-Raphson is seeded at π instead of M.
pub const HIGH_ECCENTRICITY: f64 = 0.8;

/// Errors raised by propagation, frame conversions and windowed searches.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum CalcError {
    #[error("Singularity reached: eccentricity >= 1 or root finding did not converge")]
    SingularityReached,

    #[error("Invalid time range: {to} is before {from}")]
    InvalidRange { from: UtcInstant, to: UtcInstant },

    #[error("Invalid step size: {0} s")]
    InvalidStep(f64),

    #[error("Invalid orbital element '{field}': {value}")]
    InvalidElement { field: &'static str, value: f64 },
}

// ── State vector ──

/// Reference frame of a [`StateVector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frame {
    /// Earth-centered inertial
    Eci,
    /// Earth-centered Earth-fixed
    Ecef,
}

/// Cartesian state tagged with its frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateVector {
    /// Frame the vectors are expressed in
    pub frame: Frame,
    /// Instant of this state
    pub time: UtcInstant,
    /// Position (km)
    pub position_km: Vector3<f64>,
    /// Velocity (km/s), when known
    pub velocity_km_s: Option<Vector3<f64>>,
}

impl StateVector {
    /// Position magnitude (km).
    pub fn r_mag(&self) -> f64 {
        self.position_km.norm()
    }

    /// Velocity magnitude (km/s).
    pub fn v_mag(&self) -> Option<f64> {
        self.velocity_km_s.map(|v| v.norm())
    }

    /// Specific orbital energy (km²/s²), meaningful in the inertial frame.
    pub fn energy(&self) -> Option<f64> {
        self.v_mag().map(|v| v.powi(2) / 2.0 - MU_EARTH / self.r_mag())
    }
}

// ── Kepler's equation solver ──

/// Newton-Raphson settings for Kepler's equation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeplerSolver {
    /// Convergence threshold on |ΔE| (rad).
    pub tolerance: f64,
    /// Iteration cap; exceeding it is an error.
    pub max_iterations: usize,
}

impl Default for KeplerSolver {
    fn default() -> Self {
        KeplerSolver {
            tolerance: KEPLER_TOLERANCE,
            max_iterations: KEPLER_MAX_ITERATIONS,
        }
    }
}

impl KeplerSolver {
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        KeplerSolver {
            tolerance,
            max_iterations,
        }
    }

    /// Solve M = E − e·sin(E) for the eccentric anomaly E (rad).
    ///
    /// Newton-Raphson is seeded at E₀ = M, except for e ≥ [`HIGH_ECCENTRICITY`]
    /// where it starts from E₀ = π; the iteration is then monotone and
    /// converges for any e < 1. `mean_anomaly` is expected in [0, 2π).
    pub fn eccentric_anomaly(&self, mean_anomaly: f64, e: f64) -> Result<f64, CalcError> {
        if !(0.0..1.0).contains(&e) || !mean_anomaly.is_finite() {
            return Err(CalcError::SingularityReached);
        }

        let mut ea = if e < HIGH_ECCENTRICITY {
            mean_anomaly
        } else {
            std::f64::consts::PI
        };

        for iteration in 0..self.max_iterations {
            let f = ea - e * ea.sin() - mean_anomaly;
            let fp = 1.0 - e * ea.cos();
            let delta = f / fp;
            ea -= delta;
            if !ea.is_finite() {
                return Err(CalcError::SingularityReached);
            }
            if delta.abs() < self.tolerance {
                trace!("kepler: e={e} M={mean_anomaly} converged after {} iterations", iteration + 1);
                return Ok(ea);
            }
        }

        trace!("kepler: e={e} M={mean_anomaly} exceeded {} iterations", self.max_iterations);
        Err(CalcError::SingularityReached)
    }

    /// Propagate `orbit` to `t`, returning position and velocity in ECI.
    pub fn propagate<O: Orbit + ?Sized>(&self, orbit: &O, t: UtcInstant) -> Result<StateVector, CalcError> {
        let a = orbit.semimajor_axis_km();
        let e = orbit.eccentricity();
        if !(a.is_finite() && a > 0.0) {
            return Err(CalcError::InvalidElement {
                field: "semimajor_axis_km",
                value: a,
            });
        }

        let ea = self.eccentric_anomaly(orbit.mean_anomaly_at(t), e)?;
        let nu = true_anomaly(ea, e);

        // Perifocal frame
        let p = a * (1.0 - e.powi(2));
        let r = p / (1.0 + e * nu.cos());
        let r_pqw = Vector3::new(r * nu.cos(), r * nu.sin(), 0.0);
        let v_pqw = (MU_EARTH / p).sqrt() * Vector3::new(-nu.sin(), e + nu.cos(), 0.0);

        let rot = perifocal_to_eci(
            orbit.raan_deg() * DEG2RAD,
            orbit.inclination_deg() * DEG2RAD,
            orbit.arg_perigee_deg() * DEG2RAD,
        );

        Ok(StateVector {
            frame: Frame::Eci,
            time: t,
            position_km: rot * r_pqw,
            velocity_km_s: Some(rot * v_pqw),
        })
    }
}

/// Solve Kepler's equation with the default tolerance and iteration cap.
///
/// See [`KeplerSolver::eccentric_anomaly`] for the starting guess.
pub fn eccentric_anomaly(mean_anomaly: f64, e: f64) -> Result<f64, CalcError> {
    KeplerSolver::default().eccentric_anomaly(mean_anomaly, e)
}

/// True anomaly (rad, in [0, 2π)) from eccentric anomaly.
///
/// Half-angle form, quadrant-correct for all E.
pub fn true_anomaly(eccentric_anomaly: f64, e: f64) -> f64 {
    let half = eccentric_anomaly / 2.0;
    normalize_angle(2.0 * ((1.0 + e).sqrt() * half.sin()).atan2((1.0 - e).sqrt() * half.cos()))
}

/// Rotation PQW → ECI: R_z(Ω)·R_x(i)·R_z(ω).
pub fn perifocal_to_eci(raan: f64, inclination: f64, arg_perigee: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Vector3::z_axis(), raan)
        * Rotation3::from_axis_angle(&Vector3::x_axis(), inclination)
        * Rotation3::from_axis_angle(&Vector3::z_axis(), arg_perigee)
}

/// Propagate `orbit` to `t` in the ECI frame with the default solver.
pub fn propagate<O: Orbit + ?Sized>(orbit: &O, t: UtcInstant) -> Result<StateVector, CalcError> {
    KeplerSolver::default().propagate(orbit, t)
}
