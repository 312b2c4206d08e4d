//! UTC instants, Julian dates and Greenwich Mean Sidereal Time.
//!
//! Time is carried as an explicit [`UtcInstant`] (UTC seconds since the Unix
//! epoch) so the rest of the crate never touches a platform calendar. Leap
//! seconds are not modelled and UT1 is taken equal to UTC.
//!
//! # Example
//! ```
//! use skywatch::time::UtcInstant;
//!
//! let t = UtcInstant::from_calendar(2000, 1, 1, 12, 0, 0.0);
//! assert!((t.julian_day() - 2_451_545.0).abs() < 1e-9);
//! ```

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::constants::*;

/// An instant in UTC, stored as seconds since 1970-01-01T00:00:00 UTC.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct UtcInstant {
    unix_seconds: f64,
}

impl UtcInstant {
    // ── Constructors ──────────────────────────────────────────────

    /// Create an instant from seconds since the Unix epoch.
    pub const fn from_unix_seconds(unix_seconds: f64) -> Self {
        Self { unix_seconds }
    }

    /// Create an instant from a Gregorian calendar date and time of day.
    ///
    /// Valid for dates after the 1582 Gregorian reform.
    pub fn from_calendar(year: i32, month: u8, day: u8, hour: u8, minute: u8, second: f64) -> Self {
        let days = julian_day_at_midnight(year, month, day) - JD_UNIX_EPOCH;
        let time_of_day = hour as f64 * 3600.0 + minute as f64 * 60.0 + second;
        Self {
            unix_seconds: days * SOLAR_DAY + time_of_day,
        }
    }

    /// Create an instant from a year and fractional day of year (1.0 = Jan 1, 00:00).
    pub fn from_year_day(year: i32, day_of_year: f64) -> Self {
        Self::from_calendar(year, 1, 1, 0, 0, 0.0) + (day_of_year - 1.0) * SOLAR_DAY
    }

    /// Create an instant from a Julian Day.
    pub fn from_julian_day(jd: f64) -> Self {
        Self {
            unix_seconds: (jd - JD_UNIX_EPOCH) * SOLAR_DAY,
        }
    }

    /// Current instant from the system clock.
    pub fn now() -> Self {
        let unix_seconds = match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => elapsed.as_secs_f64(),
            Err(before) => -before.duration().as_secs_f64(),
        };
        Self { unix_seconds }
    }

    // ── Accessors ─────────────────────────────────────────────────

    /// Seconds since the Unix epoch.
    pub const fn unix_seconds(&self) -> f64 {
        self.unix_seconds
    }

    /// Julian Day. The integer part rolls over at 12:00 UTC.
    pub fn julian_day(&self) -> f64 {
        JD_UNIX_EPOCH + self.unix_seconds / SOLAR_DAY
    }

    /// Julian centuries elapsed since J2000.0.
    pub fn julian_centuries(&self) -> f64 {
        julian_centuries(self.julian_day())
    }

    /// Greenwich Mean Sidereal Time (rad, in [0, 2π)).
    pub fn gmst(&self) -> f64 {
        gmst(*self)
    }

    /// Calendar year of this instant.
    pub fn year(&self) -> i32 {
        self.to_calendar().year
    }

    /// Break the instant down into Gregorian calendar fields.
    pub fn to_calendar(&self) -> CalendarDate {
        let days = (self.unix_seconds / SOLAR_DAY).floor();
        let seconds_of_day = (self.unix_seconds - days * SOLAR_DAY).clamp(0.0, SOLAR_DAY);
        // Saturate far-off instants so the year still fits an i32
        let (year, month, day) = civil_from_days(days.clamp(-MAX_CALENDAR_DAYS, MAX_CALENDAR_DAYS) as i64);

        let hour = (seconds_of_day / 3600.0).floor();
        let minute = ((seconds_of_day - hour * 3600.0) / 60.0).floor();
        let second = seconds_of_day - hour * 3600.0 - minute * 60.0;

        CalendarDate {
            year,
            month,
            day,
            hour: hour as u8,
            minute: minute as u8,
            second,
        }
    }

    // ── Arithmetic ────────────────────────────────────────────────

    /// Seconds elapsed from `other` to `self` (negative if `other` is later).
    pub fn seconds_since(&self, other: UtcInstant) -> f64 {
        self.unix_seconds - other.unix_seconds
    }

    /// Midpoint between two instants.
    pub fn midpoint(&self, other: UtcInstant) -> Self {
        Self {
            unix_seconds: 0.5 * (self.unix_seconds + other.unix_seconds),
        }
    }
}

/// Calendar fields of a [`UtcInstant`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalendarDate {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: f64,
}

impl std::fmt::Display for UtcInstant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let c = self.to_calendar();
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:06.3}Z",
            c.year, c.month, c.day, c.hour, c.minute, c.second
        )
    }
}

impl std::ops::Add<f64> for UtcInstant {
    type Output = UtcInstant;
    fn add(self, seconds: f64) -> UtcInstant {
        UtcInstant {
            unix_seconds: self.unix_seconds + seconds,
        }
    }
}

impl std::ops::Sub<f64> for UtcInstant {
    type Output = UtcInstant;
    fn sub(self, seconds: f64) -> UtcInstant {
        UtcInstant {
            unix_seconds: self.unix_seconds - seconds,
        }
    }
}

impl std::ops::Sub for UtcInstant {
    type Output = f64;
    /// Returns the difference in seconds.
    fn sub(self, rhs: Self) -> f64 {
        self.seconds_since(rhs)
    }
}

/// Julian centuries since J2000.0 for a Julian Day.
pub fn julian_centuries(jd: f64) -> f64 {
    (jd - JD_J2000) / DAYS_PER_JULIAN_CENTURY
}

/// Greenwich Mean Sidereal Time (rad) using the IAU 1982 polynomial.
///
/// The polynomial is evaluated at 0h UT of the date; the time of day is then
/// added at the sidereal rate.
pub fn gmst(t: UtcInstant) -> f64 {
    let days = (t.unix_seconds / SOLAR_DAY).floor();
    let fractional_day = (t.unix_seconds - days * SOLAR_DAY) / SOLAR_DAY;
    let jd_midnight = JD_UNIX_EPOCH + days;

    let tc = julian_centuries(jd_midnight);
    let gmst0 = 24110.54841 + 8640184.812866 * tc + 0.093104 * tc.powi(2) - 6.2e-6 * tc.powi(3);
    let seconds = (gmst0 + SIDEREAL_RATE * SOLAR_DAY * fractional_day).rem_euclid(SOLAR_DAY);

    seconds * TAU / SOLAR_DAY
}

// ── Calendar helpers ───────────────────────────────────────────────

/// Julian Day at 00:00 UTC of a Gregorian date (Meeus, ch. 7).
fn julian_day_at_midnight(year: i32, month: u8, day: u8) -> f64 {
    let (y, m) = if month <= 2 {
        (year - 1, month as i32 + 12)
    } else {
        (year, month as i32)
    };
    let a = y.div_euclid(100);
    let b = 2 - a + a.div_euclid(4);

    (365.25 * (y + 4716) as f64).floor() + (30.6001 * (m + 1) as f64).floor() + day as f64 + b as f64
        - 1524.5
}

/// Gregorian (year, month, day) from days since 1970-01-01.
/// Largest day offset from the Unix epoch that [`civil_from_days`] accepts
/// (about ±900 million years).
const MAX_CALENDAR_DAYS: f64 = 3.3e11;

fn civil_from_days(days: i64) -> (i32, u8, u8) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };
    (year as i32, month as u8, day as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_j2000_julian_day() {
        let t = UtcInstant::from_calendar(2000, 1, 1, 12, 0, 0.0);
        assert_relative_eq!(t.julian_day(), JD_J2000, epsilon = 1e-9);
        assert_relative_eq!(t.julian_centuries(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_julian_day_rolls_over_at_noon() {
        let morning = UtcInstant::from_calendar(2024, 3, 10, 11, 59, 0.0);
        let afternoon = UtcInstant::from_calendar(2024, 3, 10, 12, 1, 0.0);
        assert_eq!(morning.julian_day().floor() + 1.0, afternoon.julian_day().floor());

        let midnight = UtcInstant::from_calendar(2024, 3, 10, 0, 0, 0.0);
        assert_relative_eq!(midnight.julian_day().fract(), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_unix_epoch() {
        let t = UtcInstant::from_calendar(1970, 1, 1, 0, 0, 0.0);
        assert_eq!(t.unix_seconds(), 0.0);
        assert_relative_eq!(t.julian_day(), JD_UNIX_EPOCH, epsilon = 1e-9);
    }

    #[test]
    fn test_gmst_vallado_example() {
        // Vallado, example 3-5: 1992-08-20 12:14 UT1 → 152.578787886°
        let t = UtcInstant::from_calendar(1992, 8, 20, 12, 14, 0.0);
        assert_relative_eq!(t.gmst() * RAD2DEG, 152.578787886, epsilon = 1e-5);
    }

    #[test]
    fn test_gmst_in_range() {
        let start = UtcInstant::from_calendar(2023, 12, 31, 0, 0, 0.0);
        for k in 0..200 {
            let theta = (start + k as f64 * 977.0).gmst();
            assert!((0.0..TAU).contains(&theta), "gmst={theta}");
        }
    }

    #[test]
    fn test_calendar_round_trip() {
        let t = UtcInstant::from_calendar(2020, 2, 29, 23, 45, 12.5);
        let c = t.to_calendar();
        assert_eq!((c.year, c.month, c.day, c.hour, c.minute), (2020, 2, 29, 23, 45));
        assert_relative_eq!(c.second, 12.5, epsilon = 1e-6);

        let before_epoch = UtcInstant::from_calendar(1957, 10, 4, 19, 28, 34.0);
        let c = before_epoch.to_calendar();
        assert_eq!((c.year, c.month, c.day, c.hour, c.minute), (1957, 10, 4, 19, 28));
    }

    #[test]
    fn test_year_day() {
        let t = UtcInstant::from_year_day(2020, 97.82871450);
        let c = t.to_calendar();
        assert_eq!((c.year, c.month, c.day), (2020, 4, 6));
        assert_eq!(c.hour, 19);
    }

    #[test]
    fn test_display() {
        let t = UtcInstant::from_calendar(2024, 1, 2, 3, 4, 5.25);
        assert_eq!(t.to_string(), "2024-01-02T03:04:05.250Z");
    }

    #[test]
    fn test_display_far_off_instants() {
        for seconds in [1e30, -1e30, f64::MAX, f64::MIN, f64::NAN, f64::INFINITY] {
            let t = UtcInstant::from_unix_seconds(seconds);
            assert!(t.to_string().ends_with('Z'));
            let c = t.to_calendar();
            assert!((1..=12).contains(&c.month));
            assert!((1..=31).contains(&c.day));
        }
        assert!(UtcInstant::from_unix_seconds(1e30).year() > 900_000_000);
        assert!(UtcInstant::from_unix_seconds(-1e30).year() < -900_000_000);

        let err = crate::propagator::CalcError::InvalidRange {
            from: UtcInstant::from_unix_seconds(1e30),
            to: UtcInstant::from_unix_seconds(0.0),
        };
        assert!(err.to_string().contains("1970-01-01T00:00:00.000Z"));
    }

    #[test]
    fn test_arithmetic() {
        let t1 = UtcInstant::from_unix_seconds(1_000.0);
        let t2 = t1 + 250.0;
        assert_eq!(t2 - t1, 250.0);
        assert_eq!((t2 - 250.0), t1);
        assert_eq!(t1.midpoint(t2).unix_seconds(), 1_125.0);
        assert!(t1 < t2);
    }
}
