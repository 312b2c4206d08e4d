//! Classical (Keplerian) orbital elements.
//!
//! [`OrbitalElements`] is the single concrete orbit type of the crate. It is
//! built once, either from a parsed TLE or by direct construction, and is
//! immutable afterwards. Everything that only needs "something with an
//! orbit" is written against the [`Orbit`] trait.

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::propagator::CalcError;
use crate::time::UtcInstant;

/// The capability of describing a two-body orbit.
///
/// Angles are in degrees, lengths in km.
pub trait Orbit {
    /// Semi-major axis (km)
    fn semimajor_axis_km(&self) -> f64;
    /// Eccentricity (dimensionless)
    fn eccentricity(&self) -> f64;
    /// Inclination (deg)
    fn inclination_deg(&self) -> f64;
    /// Right ascension of ascending node (deg)
    fn raan_deg(&self) -> f64;
    /// Argument of perigee (deg)
    fn arg_perigee_deg(&self) -> f64;
    /// Mean anomaly at epoch (deg)
    fn mean_anomaly_deg(&self) -> f64;
    /// Mean motion (rev/day)
    fn mean_motion_rev_day(&self) -> f64;
    /// Element epoch
    fn epoch(&self) -> UtcInstant;

    /// Mean motion (rad/s).
    fn mean_motion_rad_per_sec(&self) -> f64 {
        self.mean_motion_rev_day() * TAU / SOLAR_DAY
    }

    /// Orbital period (seconds).
    fn period_seconds(&self) -> f64 {
        SOLAR_DAY / self.mean_motion_rev_day()
    }

    /// Mean anomaly at `t` (rad, in [0, 2π)).
    ///
    /// M(t) = M0 + n·(t − epoch)
    fn mean_anomaly_at(&self, t: UtcInstant) -> f64 {
        let dt = t - self.epoch();
        normalize_angle(self.mean_anomaly_deg() * DEG2RAD + self.mean_motion_rad_per_sec() * dt)
    }
}

/// Classical orbital elements at an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitalElements {
    semimajor_axis_km: f64,
    eccentricity: f64,
    inclination_deg: f64,
    raan_deg: f64,
    arg_perigee_deg: f64,
    mean_anomaly_deg: f64,
    mean_motion_rev_day: f64,
    epoch: UtcInstant,
}

impl OrbitalElements {
    /// Build elements from a semi-major axis; mean motion follows from Kepler's third law.
    pub fn new(
        semimajor_axis_km: f64,
        eccentricity: f64,
        inclination_deg: f64,
        raan_deg: f64,
        arg_perigee_deg: f64,
        mean_anomaly_deg: f64,
        epoch: UtcInstant,
    ) -> Result<Self, CalcError> {
        check_positive("semimajor_axis_km", semimajor_axis_km)?;
        let mean_motion_rev_day = mean_motion_from_semimajor_axis(semimajor_axis_km);
        Self::validated(
            semimajor_axis_km,
            eccentricity,
            inclination_deg,
            raan_deg,
            arg_perigee_deg,
            mean_anomaly_deg,
            mean_motion_rev_day,
            epoch,
        )
    }

    /// Build elements from a mean motion (rev/day), as supplied by a TLE.
    pub fn from_mean_motion(
        mean_motion_rev_day: f64,
        eccentricity: f64,
        inclination_deg: f64,
        raan_deg: f64,
        arg_perigee_deg: f64,
        mean_anomaly_deg: f64,
        epoch: UtcInstant,
    ) -> Result<Self, CalcError> {
        check_positive("mean_motion_rev_day", mean_motion_rev_day)?;
        let semimajor_axis_km = semimajor_axis_from_mean_motion(mean_motion_rev_day);
        Self::validated(
            semimajor_axis_km,
            eccentricity,
            inclination_deg,
            raan_deg,
            arg_perigee_deg,
            mean_anomaly_deg,
            mean_motion_rev_day,
            epoch,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn validated(
        semimajor_axis_km: f64,
        eccentricity: f64,
        inclination_deg: f64,
        raan_deg: f64,
        arg_perigee_deg: f64,
        mean_anomaly_deg: f64,
        mean_motion_rev_day: f64,
        epoch: UtcInstant,
    ) -> Result<Self, CalcError> {
        if !(0.0..1.0).contains(&eccentricity) {
            return Err(CalcError::SingularityReached);
        }
        if !(0.0..=180.0).contains(&inclination_deg) {
            return Err(CalcError::InvalidElement {
                field: "inclination_deg",
                value: inclination_deg,
            });
        }
        for (field, value) in [
            ("raan_deg", raan_deg),
            ("arg_perigee_deg", arg_perigee_deg),
            ("mean_anomaly_deg", mean_anomaly_deg),
        ] {
            if !value.is_finite() {
                return Err(CalcError::InvalidElement { field, value });
            }
        }
        if !epoch.unix_seconds().is_finite() {
            return Err(CalcError::InvalidElement {
                field: "epoch",
                value: epoch.unix_seconds(),
            });
        }

        Ok(Self {
            semimajor_axis_km,
            eccentricity,
            inclination_deg,
            raan_deg: normalize_degrees(raan_deg),
            arg_perigee_deg: normalize_degrees(arg_perigee_deg),
            mean_anomaly_deg: normalize_degrees(mean_anomaly_deg),
            mean_motion_rev_day,
            epoch,
        })
    }

    /// Perigee altitude above the WGS84 equatorial radius (km).
    pub fn perigee_altitude_km(&self) -> f64 {
        self.semimajor_axis_km * (1.0 - self.eccentricity) - WGS84_A
    }

    /// Apogee altitude above the WGS84 equatorial radius (km).
    pub fn apogee_altitude_km(&self) -> f64 {
        self.semimajor_axis_km * (1.0 + self.eccentricity) - WGS84_A
    }
}

impl Orbit for OrbitalElements {
    fn semimajor_axis_km(&self) -> f64 {
        self.semimajor_axis_km
    }
    fn eccentricity(&self) -> f64 {
        self.eccentricity
    }
    fn inclination_deg(&self) -> f64 {
        self.inclination_deg
    }
    fn raan_deg(&self) -> f64 {
        self.raan_deg
    }
    fn arg_perigee_deg(&self) -> f64 {
        self.arg_perigee_deg
    }
    fn mean_anomaly_deg(&self) -> f64 {
        self.mean_anomaly_deg
    }
    fn mean_motion_rev_day(&self) -> f64 {
        self.mean_motion_rev_day
    }
    fn epoch(&self) -> UtcInstant {
        self.epoch
    }
}

impl std::fmt::Display for OrbitalElements {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "a={:.3} km, e={:.7}, i={:.4}°, Ω={:.4}°, ω={:.4}°, M={:.4}°, n={:.8} rev/day @ {}",
            self.semimajor_axis_km,
            self.eccentricity,
            self.inclination_deg,
            self.raan_deg,
            self.arg_perigee_deg,
            self.mean_anomaly_deg,
            self.mean_motion_rev_day,
            self.epoch,
        )
    }
}

/// Semi-major axis (km) from mean motion (rev/day).
///
/// Kepler's third law: a = (μ / n²)^(1/3) with n in rad/s.
pub fn semimajor_axis_from_mean_motion(mean_motion_rev_day: f64) -> f64 {
    let n_rad_s = mean_motion_rev_day * TAU / SOLAR_DAY;
    (MU_EARTH / n_rad_s.powi(2)).cbrt()
}

/// Mean motion (rev/day) from semi-major axis (km).
pub fn mean_motion_from_semimajor_axis(semimajor_axis_km: f64) -> f64 {
    (MU_EARTH / semimajor_axis_km.powi(3)).sqrt() * SOLAR_DAY / TAU
}

fn check_positive(field: &'static str, value: f64) -> Result<(), CalcError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(CalcError::InvalidElement { field, value })
    }
}

/// Normalize angle to [0, 2π).
pub fn normalize_angle(angle: f64) -> f64 {
    wrap(angle, TAU)
}

/// Normalize angle to [0, 360).
pub fn normalize_degrees(angle: f64) -> f64 {
    wrap(angle, 360.0)
}

/// `rem_euclid` can round up to exactly `period` for tiny negative inputs.
fn wrap(angle: f64, period: f64) -> f64 {
    let a = angle.rem_euclid(period);
    if a >= period { 0.0 } else { a }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn epoch() -> UtcInstant {
        UtcInstant::from_calendar(2024, 1, 1, 0, 0, 0.0)
    }

    #[test]
    fn test_geostationary_semimajor_axis() {
        let a = semimajor_axis_from_mean_motion(1.00271173);
        assert_relative_eq!(a, 42165.0, epsilon = 1.0);
    }

    #[test]
    fn test_mean_motion_round_trip() {
        let a = WGS84_A + 420.0;
        let n = mean_motion_from_semimajor_axis(a);
        assert_relative_eq!(semimajor_axis_from_mean_motion(n), a, epsilon = 1e-9);
    }

    #[test]
    fn test_angles_are_normalized() {
        let elems = OrbitalElements::new(7000.0, 0.01, 45.0, -30.0, 370.0, 720.0, epoch()).unwrap();
        assert_relative_eq!(elems.raan_deg(), 330.0, epsilon = 1e-12);
        assert_relative_eq!(elems.arg_perigee_deg(), 10.0, epsilon = 1e-12);
        assert_relative_eq!(elems.mean_anomaly_deg(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_open_orbits() {
        let err = OrbitalElements::new(7000.0, 1.0, 45.0, 0.0, 0.0, 0.0, epoch()).unwrap_err();
        assert_eq!(err, CalcError::SingularityReached);
        assert!(OrbitalElements::new(7000.0, -0.1, 45.0, 0.0, 0.0, 0.0, epoch()).is_err());
    }

    #[test]
    fn test_rejects_bad_geometry() {
        assert!(matches!(
            OrbitalElements::new(-7000.0, 0.0, 45.0, 0.0, 0.0, 0.0, epoch()),
            Err(CalcError::InvalidElement { field: "semimajor_axis_km", .. })
        ));
        assert!(matches!(
            OrbitalElements::new(7000.0, 0.0, 181.0, 0.0, 0.0, 0.0, epoch()),
            Err(CalcError::InvalidElement { field: "inclination_deg", .. })
        ));
        assert!(matches!(
            OrbitalElements::from_mean_motion(0.0, 0.0, 45.0, 0.0, 0.0, 0.0, epoch()),
            Err(CalcError::InvalidElement { field: "mean_motion_rev_day", .. })
        ));
    }

    #[test]
    fn test_mean_anomaly_advances_one_orbit() {
        let elems = OrbitalElements::new(WGS84_A + 500.0, 0.0, 53.0, 0.0, 0.0, 90.0, epoch()).unwrap();
        let t = elems.epoch() + elems.period_seconds();
        assert_relative_eq!(elems.mean_anomaly_at(t), 90.0 * DEG2RAD, epsilon = 1e-9);
        let half = elems.epoch() + elems.period_seconds() / 2.0;
        assert_relative_eq!(elems.mean_anomaly_at(half), 270.0 * DEG2RAD, epsilon = 1e-9);
    }

    #[test]
    fn test_normalize_never_returns_period() {
        assert_eq!(normalize_degrees(-1e-15), 0.0);
        assert!(normalize_angle(-1e-17) < TAU);
        assert_relative_eq!(normalize_degrees(-90.0), 270.0);
    }

    #[test]
    fn test_altitudes() {
        let elems = OrbitalElements::new(WGS84_A + 1000.0, 0.1, 63.4, 0.0, 270.0, 0.0, epoch()).unwrap();
        assert!(elems.perigee_altitude_km() < 1000.0);
        assert!(elems.apogee_altitude_km() > 1000.0);
    }
}
