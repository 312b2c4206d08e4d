//! Physical, geodetic and numerical constants.
//!
//! Everything here is fixed at compile time; tunable behaviour lives in the
//! config structs of the modules that use it.

/// Earth gravitational parameter (km³/s², WGS84)
pub const MU_EARTH: f64 = 398600.4418;

/// WGS84 semi-major axis (km)
pub const WGS84_A: f64 = 6378.137;

/// WGS84 first eccentricity squared
pub const WGS84_E2: f64 = 0.00669437999014;

/// WGS84 semi-minor axis (km), b = a·√(1 − e²)
pub fn wgs84_b() -> f64 {
    WGS84_A * (1.0 - WGS84_E2).sqrt()
}

/// Earth rotation rate (rad/s)
pub const OMEGA_EARTH: f64 = 7.2921159e-5;

/// Seconds per solar day
pub const SOLAR_DAY: f64 = 86400.0;

/// Julian Day of J2000.0 (2000-01-01 12:00)
pub const JD_J2000: f64 = 2_451_545.0;

/// Julian Day of the Unix epoch (1970-01-01 00:00 UTC)
pub const JD_UNIX_EPOCH: f64 = 2_440_587.5;

/// Days per Julian century
pub const DAYS_PER_JULIAN_CENTURY: f64 = 36525.0;

/// Ratio of sidereal to solar time rate
pub const SIDEREAL_RATE: f64 = 1.00273790935;

/// Default Newton-Raphson tolerance on |ΔE| (rad)
pub const KEPLER_TOLERANCE: f64 = 1e-5;

/// Default Newton-Raphson iteration cap
pub const KEPLER_MAX_ITERATIONS: usize = 500;

/// Bowring geodetic latitude convergence threshold (rad)
pub const BOWRING_TOLERANCE: f64 = 1e-12;

/// Bowring iteration cap
pub const BOWRING_MAX_ITERATIONS: usize = 5;

/// Two pi
pub const TAU: f64 = std::f64::consts::TAU;

/// Degrees to radians
pub const DEG2RAD: f64 = std::f64::consts::PI / 180.0;

/// Radians to degrees
pub const RAD2DEG: f64 = 180.0 / std::f64::consts::PI;
