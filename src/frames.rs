//! Reference-frame conversions.
//!
//! The chain used for look angles is
//! ECI → ECEF (GMST rotation) → ENU (observer tangent plane) → horizontal
//! (azimuth, elevation, range), with geodetic ↔ ECEF on the WGS84 ellipsoid
//! for observers and ground tracks.
//!
//! Distances are in km, angles at the public surface in degrees.
use nalgebra::{Rotation3, Vector3};
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::elements::{normalize_degrees, Orbit};
use crate::propagator::{CalcError, Frame, KeplerSolver, StateVector};
use crate::time::UtcInstant;

/// A point on or above the WGS84 ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geodetic {
    /// Geodetic latitude (deg), in [-90, 90]
    pub latitude_deg: f64,
    /// Longitude (deg), in [-180, 180]
    pub longitude_deg: f64,
    /// Height above the ellipsoid (km), may be negative
    pub altitude_km: f64,
}

impl Geodetic {
    pub fn new(latitude_deg: f64, longitude_deg: f64, altitude_km: f64) -> Self {
        Geodetic {
            latitude_deg,
            longitude_deg,
            altitude_km,
        }
    }

    /// ECEF position (km).
    pub fn to_ecef(&self) -> Vector3<f64> {
        geodetic_to_ecef(self)
    }
}

/// A fixed ground station.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observer {
    /// Geodetic latitude (deg)
    pub latitude_deg: f64,
    /// Longitude (deg, east positive)
    pub longitude_deg: f64,
    /// Height above the ellipsoid (km)
    pub altitude_km: f64,
}

impl Observer {
    pub fn new(latitude_deg: f64, longitude_deg: f64, altitude_km: f64) -> Self {
        Observer {
            latitude_deg,
            longitude_deg,
            altitude_km,
        }
    }

    pub fn geodetic(&self) -> Geodetic {
        Geodetic::new(self.latitude_deg, self.longitude_deg, self.altitude_km)
    }

    /// Station position in ECEF (km).
    pub fn ecef(&self) -> Vector3<f64> {
        geodetic_to_ecef(&self.geodetic())
    }
}

impl From<Geodetic> for Observer {
    fn from(g: Geodetic) -> Self {
        Observer::new(g.latitude_deg, g.longitude_deg, g.altitude_km)
    }
}

/// East-North-Up offset of a target from an observer (km).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Enu {
    pub east: f64,
    pub north: f64,
    pub up: f64,
}

/// Observer-relative look angles at an instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Topocentric {
    pub time: UtcInstant,
    /// Azimuth clockwise from north (deg), in [0, 360)
    pub azimuth_deg: f64,
    /// Elevation above the local horizon (deg), in [-90, 90]
    pub elevation_deg: f64,
    /// Slant range (km)
    pub range_km: f64,
    /// Range rate (km/s), positive when receding
    pub range_rate_km_s: f64,
}

// ── ECI ↔ ECEF ──

/// Rotate an ECI state into ECEF using GMST at the state's time.
///
/// Velocity, when present, also loses the ω⊕ × r transport term.
pub fn eci_to_ecef(state: &StateVector) -> StateVector {
    if state.frame == Frame::Ecef {
        return *state;
    }
    let rot = Rotation3::from_axis_angle(&Vector3::z_axis(), -state.time.gmst());
    let position_km = rot * state.position_km;
    let omega = Vector3::new(0.0, 0.0, OMEGA_EARTH);
    let velocity_km_s = state
        .velocity_km_s
        .map(|v| rot * v - omega.cross(&position_km));

    StateVector {
        frame: Frame::Ecef,
        time: state.time,
        position_km,
        velocity_km_s,
    }
}

/// Inverse of [`eci_to_ecef`].
pub fn ecef_to_eci(state: &StateVector) -> StateVector {
    if state.frame == Frame::Eci {
        return *state;
    }
    let rot = Rotation3::from_axis_angle(&Vector3::z_axis(), state.time.gmst());
    let omega = Vector3::new(0.0, 0.0, OMEGA_EARTH);
    let velocity_km_s = state
        .velocity_km_s
        .map(|v| rot * (v + omega.cross(&state.position_km)));

    StateVector {
        frame: Frame::Eci,
        time: state.time,
        position_km: rot * state.position_km,
        velocity_km_s,
    }
}

// ── Geodetic ↔ ECEF ──

/// Closed-form WGS84 geodetic → ECEF (km).
pub fn geodetic_to_ecef(g: &Geodetic) -> Vector3<f64> {
    let lat = g.latitude_deg * DEG2RAD;
    let lon = g.longitude_deg * DEG2RAD;
    let n = prime_vertical_radius(lat.sin());

    Vector3::new(
        (n + g.altitude_km) * lat.cos() * lon.cos(),
        (n + g.altitude_km) * lat.cos() * lon.sin(),
        (n * (1.0 - WGS84_E2) + g.altitude_km) * lat.sin(),
    )
}

/// ECEF (km) → WGS84 geodetic using Bowring's method.
///
/// Typically converges in one or two iterations; capped at five.
pub fn ecef_to_geodetic(r: &Vector3<f64>) -> Geodetic {
    let (x, y, z) = (r.x, r.y, r.z);
    let a = WGS84_A;
    let b = wgs84_b();
    let e2 = WGS84_E2;
    let ep2 = e2 / (1.0 - e2);

    let p = (x * x + y * y).sqrt();

    // On the polar axis longitude is undefined
    if p < 1e-9 {
        let latitude_deg = if z < 0.0 { -90.0 } else { 90.0 };
        return Geodetic::new(latitude_deg, 0.0, z.abs() - b);
    }

    let longitude = y.atan2(x);

    // Bowring initial estimate from the parametric latitude
    let theta = (z * a).atan2(p * b);
    let mut latitude = (z + ep2 * b * theta.sin().powi(3)).atan2(p - e2 * a * theta.cos().powi(3));

    for _ in 0..BOWRING_MAX_ITERATIONS {
        let n = prime_vertical_radius(latitude.sin());
        let h = height_above_ellipsoid(p, z, latitude);
        let prev = latitude;
        latitude = z.atan2(p * (1.0 - e2 * n / (n + h)));
        if (latitude - prev).abs() < BOWRING_TOLERANCE {
            break;
        }
    }

    Geodetic::new(
        latitude * RAD2DEG,
        longitude * RAD2DEG,
        height_above_ellipsoid(p, z, latitude),
    )
}

fn prime_vertical_radius(sin_lat: f64) -> f64 {
    WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt()
}

/// Ellipsoidal height, stable at all latitudes (no 1/cos φ).
fn height_above_ellipsoid(p: f64, z: f64, latitude: f64) -> f64 {
    let (sin_lat, cos_lat) = latitude.sin_cos();
    p * cos_lat + z * sin_lat - WGS84_A * (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt()
}

// ── Topocentric ──

/// ECEF target relative to an observer, in the observer's ENU frame (km).
pub fn ecef_to_enu(target_ecef: &Vector3<f64>, observer: &Observer) -> Enu {
    relative_to_enu(&(target_ecef - observer.ecef()), observer)
}

/// Rotate an ECEF offset from the observer into the observer's ENU frame.
fn relative_to_enu(d: &Vector3<f64>, observer: &Observer) -> Enu {
    let (sin_lat, cos_lat) = (observer.latitude_deg * DEG2RAD).sin_cos();
    let (sin_lon, cos_lon) = (observer.longitude_deg * DEG2RAD).sin_cos();

    Enu {
        east: -sin_lon * d.x + cos_lon * d.y,
        north: -sin_lat * cos_lon * d.x - sin_lat * sin_lon * d.y + cos_lat * d.z,
        up: cos_lat * cos_lon * d.x + cos_lat * sin_lon * d.y + sin_lat * d.z,
    }
}

/// ENU → (azimuth deg, elevation deg, range km).
pub fn enu_to_horizontal(enu: &Enu) -> (f64, f64, f64) {
    let horizontal = enu.east.hypot(enu.north);
    let azimuth = normalize_degrees(enu.east.atan2(enu.north) * RAD2DEG);
    let elevation = enu.up.atan2(horizontal) * RAD2DEG;
    let range = (horizontal * horizontal + enu.up * enu.up).sqrt();
    (azimuth, elevation, range)
}

/// Range rate (km/s): projection of the satellite velocity on the line of sight.
///
/// Both arguments must share a frame; the observer is assumed at rest in it.
pub fn range_rate(relative_position: &Vector3<f64>, satellite_velocity: &Vector3<f64>) -> f64 {
    let range = relative_position.norm();
    if range > 0.0 {
        relative_position.dot(satellite_velocity) / range
    } else {
        0.0
    }
}

/// Apparent elevation after Bennett's refraction correction (deg).
///
/// Below −1° geometric elevation the formula diverges and the input is
/// returned unchanged.
pub fn apply_refraction(elevation_deg: f64) -> f64 {
    if elevation_deg <= -1.0 {
        return elevation_deg;
    }
    let h = elevation_deg + 7.31 / (elevation_deg + 4.4);
    let correction_arcmin = 1.0 / (h * DEG2RAD).tan();
    (elevation_deg + correction_arcmin / 60.0).min(90.0)
}

/// Look angles of an already propagated ECI state from `observer`.
pub fn look_angles(state: &StateVector, observer: &Observer, apply_refraction_correction: bool) -> Topocentric {
    look_angles_from(state, observer, &observer.ecef(), apply_refraction_correction)
}

/// [`look_angles`] with the observer's ECEF position supplied by the caller,
/// for repeated evaluations against the same observer.
pub fn look_angles_from(
    state: &StateVector,
    observer: &Observer,
    observer_ecef: &Vector3<f64>,
    apply_refraction_correction: bool,
) -> Topocentric {
    let ecef = eci_to_ecef(state);
    let relative = ecef.position_km - observer_ecef;
    let enu = relative_to_enu(&relative, observer);
    let (azimuth_deg, mut elevation_deg, range_km) = enu_to_horizontal(&enu);
    if apply_refraction_correction {
        elevation_deg = apply_refraction(elevation_deg);
    }

    let range_rate_km_s = ecef
        .velocity_km_s
        .map(|v| range_rate(&relative, &v))
        .unwrap_or(0.0);

    Topocentric {
        time: state.time,
        azimuth_deg,
        elevation_deg,
        range_km,
        range_rate_km_s,
    }
}

/// Azimuth, elevation, range and range rate of `orbit` seen from `observer` at `t`.
pub fn topocentric<O: Orbit + ?Sized>(
    orbit: &O,
    observer: &Observer,
    t: UtcInstant,
    apply_refraction_correction: bool,
) -> Result<Topocentric, CalcError> {
    let state = KeplerSolver::default().propagate(orbit, t)?;
    Ok(look_angles(&state, observer, apply_refraction_correction))
}

/// Sub-satellite point of `orbit` at `t`.
pub fn subpoint<O: Orbit + ?Sized>(orbit: &O, t: UtcInstant) -> Result<Geodetic, CalcError> {
    let state = KeplerSolver::default().propagate(orbit, t)?;
    Ok(ecef_to_geodetic(&eci_to_ecef(&state).position_km))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::OrbitalElements;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_geodetic_round_trip_louisville() {
        let g = Geodetic::new(38.2542, -85.7594, 0.140);
        let back = ecef_to_geodetic(&geodetic_to_ecef(&g));
        let err = (geodetic_to_ecef(&back) - geodetic_to_ecef(&g)).norm();
        assert!(err < 1e-6, "round trip error {err} km");
        assert_relative_eq!(back.latitude_deg, g.latitude_deg, epsilon = 1e-9);
        assert_relative_eq!(back.longitude_deg, g.longitude_deg, epsilon = 1e-9);
        assert_relative_eq!(back.altitude_km, g.altitude_km, epsilon = 1e-6);
    }

    #[rstest]
    #[case(0.0, 0.0, 0.0)]
    #[case(45.0, 90.0, 10.0)]
    #[case(-33.9, 18.4, -0.05)]
    #[case(89.9, -170.0, 400.0)]
    #[case(-60.0, 179.5, 35786.0)]
    fn test_geodetic_round_trip(#[case] lat: f64, #[case] lon: f64, #[case] alt: f64) {
        let g = Geodetic::new(lat, lon, alt);
        let back = ecef_to_geodetic(&g.to_ecef());
        assert!((back.to_ecef() - g.to_ecef()).norm() < 1e-6);
        assert_relative_eq!(back.altitude_km, alt, epsilon = 1e-6);
    }

    #[test]
    fn test_equator_prime_meridian() {
        let r = geodetic_to_ecef(&Geodetic::new(0.0, 0.0, 0.0));
        assert_relative_eq!(r.x, WGS84_A, epsilon = 1e-9);
        assert!(r.y.abs() < 1e-9 && r.z.abs() < 1e-9);
    }

    #[test]
    fn test_poles() {
        let b = wgs84_b();
        let north = ecef_to_geodetic(&Vector3::new(0.0, 0.0, b + 1.0));
        assert_eq!(north.latitude_deg, 90.0);
        assert_eq!(north.longitude_deg, 0.0);
        assert_relative_eq!(north.altitude_km, 1.0, epsilon = 1e-9);

        let south = ecef_to_geodetic(&Vector3::new(0.0, 0.0, -b));
        assert_eq!(south.latitude_deg, -90.0);
        assert!(south.altitude_km.abs() < 1e-9);
    }

    #[test]
    fn test_eci_ecef_round_trip() {
        let t = UtcInstant::from_calendar(2021, 3, 20, 9, 37, 0.0);
        let eci = StateVector {
            frame: Frame::Eci,
            time: t,
            position_km: Vector3::new(6524.834, 6862.875, 6448.296),
            velocity_km_s: Some(Vector3::new(4.901327, 5.533756, -1.976341)),
        };
        let ecef = eci_to_ecef(&eci);
        assert_eq!(ecef.frame, Frame::Ecef);
        assert_relative_eq!(ecef.r_mag(), eci.r_mag(), epsilon = 1e-9);
        assert_relative_eq!(ecef.position_km.z, eci.position_km.z, epsilon = 1e-9);

        let back = ecef_to_eci(&ecef);
        assert!((back.position_km - eci.position_km).norm() < 1e-9);
        assert!((back.velocity_km_s.unwrap() - eci.velocity_km_s.unwrap()).norm() < 1e-12);
    }

    #[test]
    fn test_geostationary_is_fixed_in_ecef() {
        let t = UtcInstant::from_calendar(2022, 7, 1, 0, 0, 0.0);
        let a = 42164.17;
        let theta = t.gmst();
        let eci = StateVector {
            frame: Frame::Eci,
            time: t,
            position_km: Vector3::new(a * theta.cos(), a * theta.sin(), 0.0),
            velocity_km_s: Some(OMEGA_EARTH * a * Vector3::new(-theta.sin(), theta.cos(), 0.0)),
        };
        let ecef = eci_to_ecef(&eci);
        assert!(ecef.position_km.y.abs() < 1e-6);
        assert!(ecef.velocity_km_s.unwrap().norm() < 1e-9);
    }

    #[test]
    fn test_zenith_look_angles() {
        let observer = Observer::new(10.0, 20.0, 0.0);
        let overhead = Geodetic::new(10.0, 20.0, 500.0).to_ecef();
        let (_, el, range) = enu_to_horizontal(&ecef_to_enu(&overhead, &observer));
        assert_relative_eq!(el, 90.0, epsilon = 1e-9);
        assert_relative_eq!(range, 500.0, epsilon = 1e-9);
    }

    #[test]
    fn test_azimuth_cardinal_points() {
        let north = enu_to_horizontal(&Enu { east: 0.0, north: 10.0, up: 0.0 });
        let east = enu_to_horizontal(&Enu { east: 10.0, north: 0.0, up: 0.0 });
        let west = enu_to_horizontal(&Enu { east: -10.0, north: 0.0, up: 0.0 });
        assert_eq!(north.0, 0.0);
        assert_relative_eq!(east.0, 90.0);
        assert_relative_eq!(west.0, 270.0);
        let (az, _, _) = enu_to_horizontal(&Enu { east: -1e-18, north: 1.0, up: 0.0 });
        assert!(az < 360.0);
    }

    #[test]
    fn test_refraction() {
        // About 34.5' at the horizon, vanishing at zenith
        assert_relative_eq!(apply_refraction(0.0), 34.48 / 60.0, epsilon = 0.01);
        assert!(apply_refraction(45.0) - 45.0 < 0.02);
        assert!(apply_refraction(90.0) <= 90.0);
        assert_eq!(apply_refraction(-1.0), -1.0);
        assert_eq!(apply_refraction(-30.0), -30.0);
        assert!(apply_refraction(-0.9) > -0.9);
    }

    #[test]
    fn test_range_rate_sign() {
        let rel = Vector3::new(1000.0, 0.0, 0.0);
        assert_relative_eq!(range_rate(&rel, &Vector3::new(2.0, 5.0, 0.0)), 2.0);
        assert_relative_eq!(range_rate(&rel, &Vector3::new(-3.0, 0.0, 1.0)), -3.0);
        assert_eq!(range_rate(&Vector3::zeros(), &Vector3::new(1.0, 1.0, 1.0)), 0.0);
    }

    #[test]
    fn test_topocentric_ranges() {
        let epoch = UtcInstant::from_calendar(2024, 5, 1, 0, 0, 0.0);
        let elems = OrbitalElements::new(WGS84_A + 550.0, 0.001, 53.0, 10.0, 20.0, 30.0, epoch).unwrap();
        let observer = Observer::new(47.37, 8.54, 0.4);
        for k in 0..300 {
            let topo = topocentric(&elems, &observer, epoch + k as f64 * 37.0, k % 2 == 0).unwrap();
            assert!((0.0..360.0).contains(&topo.azimuth_deg));
            assert!((-90.0..=90.0).contains(&topo.elevation_deg));
            assert!(topo.range_km >= 0.0);
            // A LEO satellite never recedes faster than its orbital speed
            assert!(topo.range_rate_km_s.abs() < 8.0);
        }
    }

    #[test]
    fn test_look_angles_with_known_observer_ecef() {
        let epoch = UtcInstant::from_calendar(2024, 5, 1, 0, 0, 0.0);
        let elems = OrbitalElements::new(WGS84_A + 550.0, 0.001, 53.0, 10.0, 20.0, 30.0, epoch).unwrap();
        let observer = Observer::new(47.37, 8.54, 0.4);
        let site = observer.ecef();
        let solver = KeplerSolver::default();
        for k in 0..50 {
            let state = solver.propagate(&elems, epoch + k as f64 * 113.0).unwrap();
            for refraction in [false, true] {
                assert_eq!(
                    look_angles_from(&state, &observer, &site, refraction),
                    look_angles(&state, &observer, refraction)
                );
            }
        }
    }

    #[test]
    fn test_range_rate_matches_finite_difference() {
        let epoch = UtcInstant::from_calendar(2024, 5, 1, 0, 0, 0.0);
        let elems = OrbitalElements::new(WGS84_A + 550.0, 0.001, 53.0, 10.0, 20.0, 30.0, epoch).unwrap();
        let observer = Observer::new(0.0, 0.0, 0.0);
        let t = epoch + 600.0;
        let before = topocentric(&elems, &observer, t - 0.5, false).unwrap();
        let after = topocentric(&elems, &observer, t + 0.5, false).unwrap();
        let now = topocentric(&elems, &observer, t, false).unwrap();
        assert_relative_eq!(now.range_rate_km_s, after.range_km - before.range_km, epsilon = 1e-3);
    }

    #[test]
    fn test_subpoint_latitude_bounded_by_inclination() {
        let epoch = UtcInstant::from_calendar(2024, 5, 1, 0, 0, 0.0);
        let elems = OrbitalElements::new(WGS84_A + 420.0, 0.0005, 51.6, 0.0, 0.0, 0.0, epoch).unwrap();
        for k in 0..100 {
            let g = subpoint(&elems, epoch + k as f64 * 60.0).unwrap();
            assert!(g.latitude_deg.abs() <= 52.0);
            assert!((-180.0..=180.0).contains(&g.longitude_deg));
        }
    }
}
