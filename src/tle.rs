//! Two-Line Element (TLE) set parser.
//!
//! Parses the standard NORAD fixed-column format, with or without a name
//! line, and converts it to [`OrbitalElements`]. Parsing is strict: line
//! count, line length, checksums and every numeric field are validated.
//!
//! # TLE Format Reference
//! ```text
//! Line 0 (optional): Satellite Name
//! Line 1: 1 NNNNNC NNNNNAAA NNNNN.NNNNNNNN +.NNNNNNNN +NNNNN-N +NNNNN-N N NNNNN
//! Line 2: 2 NNNNN NNN.NNNN NNN.NNNN NNNNNNN NNN.NNNN NNN.NNNN NN.NNNNNNNNNNNNNN
//! ```
//!
//! # Example
//! ```
//! use skywatch::tle::TleRecord;
//!
//! let text = "ISS (ZARYA)
//! 1 25544U 98067A   20097.82871450  .00000874  00000-0  24271-4 0  9992
//! 2 25544  51.6465 341.5807 0003880  94.4223  26.1197 15.48685836220958";
//!
//! let tle = TleRecord::parse(text).unwrap();
//! assert_eq!(tle.catalog_number, 25544);
//! assert_eq!(tle.epoch_year, 2020);
//! ```

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::*;
use crate::elements::{normalize_degrees, semimajor_axis_from_mean_motion, OrbitalElements};
use crate::propagator::CalcError;
use crate::time::UtcInstant;

/// Minimum length of a data line: the checksum sits in column 69.
const DATA_LINE_LEN: usize = 69;

/// TLE parsing errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Expected {expected} lines (or 2 without a name), got {actual}")]
    MissingLine { expected: usize, actual: usize },

    #[error("Invalid TLE format: {0}")]
    InvalidFormat(String),

    #[error("Failed to parse field '{field}': '{raw_value}'")]
    InvalidNumber { field: &'static str, raw_value: String },

    #[error("Checksum failed on line {line}: TLE says {expected}, computed {actual}")]
    InvalidChecksum { line: u8, expected: u8, actual: u8 },

    #[error("Eccentricity {value} is not below 1")]
    InvalidEccentricity { value: f64 },
}

/// A parsed Two-Line Element set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TleRecord {
    /// Satellite name (from line 0, if present).
    pub name: Option<String>,
    /// NORAD catalog number.
    pub catalog_number: u32,
    /// Classification (U=unclassified, C=classified, S=secret).
    pub classification: char,
    /// International designator (launch year, launch number, piece).
    pub intl_designator: String,
    /// Epoch year (full 4-digit year).
    pub epoch_year: i32,
    /// Epoch day of year (fractional, 1.0 = Jan 1 00:00 UTC).
    pub epoch_day: f64,
    /// First derivative of mean motion (rev/day²) / 2.
    pub mean_motion_dot: f64,
    /// Second derivative of mean motion (rev/day³) / 6.
    pub mean_motion_ddot: f64,
    /// B* drag term (1/Earth radii).
    pub bstar: f64,
    /// Ephemeris type (usually 0).
    pub ephemeris_type: u8,
    /// Element set number.
    pub element_set: u16,
    /// Inclination (degrees).
    pub inclination_deg: f64,
    /// Right ascension of ascending node (degrees).
    pub raan_deg: f64,
    /// Eccentricity (dimensionless).
    pub eccentricity: f64,
    /// Argument of perigee (degrees).
    pub arg_perigee_deg: f64,
    /// Mean anomaly (degrees).
    pub mean_anomaly_deg: f64,
    /// Mean motion (revolutions per day).
    pub mean_motion_rev_day: f64,
    /// Revolution number at epoch.
    pub rev_number: u32,
}

impl TleRecord {
    /// Parse a 2- or 3-line TLE, resolving the epoch year against the current year.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        Self::parse_with_reference_year(text, UtcInstant::now().year())
    }

    /// Parse a 2- or 3-line TLE, resolving two-digit years within ±50 years of `reference_year`.
    pub fn parse_with_reference_year(text: &str, reference_year: i32) -> Result<Self, ParseError> {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.is_empty())
            .collect();

        match lines.as_slice() {
            &[line1, line2] => Self::from_lines(None, line1, line2, reference_year),
            &[name, line1, line2] => Self::from_lines(Some(name), line1, line2, reference_year),
            _ => Err(ParseError::MissingLine {
                expected: 3,
                actual: lines.len(),
            }),
        }
    }

    /// Parse a string containing multiple TLEs (2-line or 3-line format).
    ///
    /// Lines starting with '1' followed by a line starting with '2' form a
    /// 2-line set; any other line directly before such a pair is its name.
    /// Anything else is skipped.
    pub fn parse_batch(input: &str) -> Result<Vec<Self>, ParseError> {
        Self::parse_batch_with_reference_year(input, UtcInstant::now().year())
    }

    /// [`TleRecord::parse_batch`] with an explicit reference year.
    pub fn parse_batch_with_reference_year(input: &str, reference_year: i32) -> Result<Vec<Self>, ParseError> {
        let lines: Vec<&str> = input
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.is_empty())
            .collect();

        let is_pair = |i: usize| {
            i + 1 < lines.len() && lines[i].starts_with('1') && lines[i + 1].starts_with('2')
        };

        let mut tles = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            if is_pair(i) {
                tles.push(Self::from_lines(None, lines[i], lines[i + 1], reference_year)?);
                i += 2;
            } else if is_pair(i + 1) {
                tles.push(Self::from_lines(Some(lines[i]), lines[i + 1], lines[i + 2], reference_year)?);
                i += 3;
            } else {
                warn!("skipping unrecognised TLE line {}: {:?}", i + 1, lines[i]);
                i += 1;
            }
        }

        if tles.is_empty() {
            return Err(ParseError::MissingLine {
                expected: 3,
                actual: 0,
            });
        }

        debug!("parsed {} TLE sets", tles.len());
        Ok(tles)
    }

    fn from_lines(name: Option<&str>, line1: &str, line2: &str, reference_year: i32) -> Result<Self, ParseError> {
        let l1 = check_data_line(line1, 1)?;
        let l2 = check_data_line(line2, 2)?;

        // ── Parse Line 1 ──
        let catalog_1 = parse_u32("catalog_number", cols(l1, 3, 7))?;
        let classification = l1.as_bytes()[7] as char;
        let intl_designator = cols(l1, 10, 17).trim().to_string();

        let epoch_yy = cols(l1, 19, 20);
        if !epoch_yy.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid_number("epoch_year", epoch_yy));
        }
        let epoch_year = resolve_epoch_year(parse_u32("epoch_year", epoch_yy)? as i32, reference_year);

        let epoch_day = parse_f64("epoch_day", cols(l1, 21, 32))?;
        if !(1.0..367.0).contains(&epoch_day) {
            return Err(invalid_number("epoch_day", cols(l1, 21, 32)));
        }

        let mean_motion_dot = parse_f64("mean_motion_dot", cols(l1, 34, 43))?;
        let mean_motion_ddot = parse_exponential("mean_motion_ddot", cols(l1, 45, 52))?;
        let bstar = parse_exponential("bstar", cols(l1, 54, 61))?;
        let ephemeris_type = parse_u32_or_zero("ephemeris_type", cols(l1, 63, 63))? as u8;
        let element_set = parse_u32_or_zero("element_set", cols(l1, 65, 68))? as u16;

        // ── Parse Line 2 ──
        let catalog_2 = parse_u32("catalog_number", cols(l2, 3, 7))?;
        if catalog_1 != catalog_2 {
            return Err(ParseError::InvalidFormat(format!(
                "Catalog numbers don't match between lines: {catalog_1} vs {catalog_2}"
            )));
        }

        let inclination_deg = parse_f64("inclination", cols(l2, 9, 16))?;
        if !(0.0..=180.0).contains(&inclination_deg) {
            return Err(ParseError::InvalidFormat(format!(
                "Inclination {inclination_deg} outside [0, 180]"
            )));
        }

        let raan_deg = normalize_degrees(parse_f64("raan", cols(l2, 18, 25))?);
        let eccentricity = parse_eccentricity(cols(l2, 27, 33))?;
        let arg_perigee_deg = normalize_degrees(parse_f64("arg_perigee", cols(l2, 35, 42))?);
        let mean_anomaly_deg = normalize_degrees(parse_f64("mean_anomaly", cols(l2, 44, 51))?);

        let mean_motion_rev_day = parse_f64("mean_motion", cols(l2, 53, 63))?;
        if mean_motion_rev_day <= 0.0 {
            return Err(invalid_number("mean_motion", cols(l2, 53, 63)));
        }

        let rev_number = parse_u32_or_zero("rev_number", cols(l2, 64, 68))?;

        let name = name
            .map(|n| n.strip_prefix("0 ").unwrap_or(n).trim().to_string())
            .filter(|n| !n.is_empty());

        Ok(TleRecord {
            name,
            catalog_number: catalog_1,
            classification,
            intl_designator,
            epoch_year,
            epoch_day,
            mean_motion_dot,
            mean_motion_ddot,
            bstar,
            ephemeris_type,
            element_set,
            inclination_deg,
            raan_deg,
            eccentricity,
            arg_perigee_deg,
            mean_anomaly_deg,
            mean_motion_rev_day,
            rev_number,
        })
    }

    /// Element epoch as a UTC instant.
    pub fn epoch(&self) -> UtcInstant {
        UtcInstant::from_year_day(self.epoch_year, self.epoch_day)
    }

    /// Semi-major axis derived from mean motion (km).
    pub fn semimajor_axis_km(&self) -> f64 {
        semimajor_axis_from_mean_motion(self.mean_motion_rev_day)
    }

    /// Altitude above the equatorial radius (km), assuming a circular orbit.
    pub fn altitude_km(&self) -> f64 {
        self.semimajor_axis_km() - WGS84_A
    }

    /// Orbital period (seconds).
    pub fn period_seconds(&self) -> f64 {
        SOLAR_DAY / self.mean_motion_rev_day
    }

    /// Convert to Keplerian elements at the TLE epoch.
    pub fn to_elements(&self) -> Result<OrbitalElements, ParseError> {
        OrbitalElements::from_mean_motion(
            self.mean_motion_rev_day,
            self.eccentricity,
            self.inclination_deg,
            self.raan_deg,
            self.arg_perigee_deg,
            self.mean_anomaly_deg,
            self.epoch(),
        )
        .map_err(|err| match err {
            CalcError::InvalidElement { field, value } => invalid_number(field, &value.to_string()),
            _ => ParseError::InvalidEccentricity {
                value: self.eccentricity,
            },
        })
    }
}

impl std::fmt::Display for TleRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (NORAD {}) — {:.1} km, {:.1}° inc, {:.4} ecc, {:.2} rev/day",
            self.name.as_deref().unwrap_or("UNKNOWN"),
            self.catalog_number,
            self.altitude_km(),
            self.inclination_deg,
            self.eccentricity,
            self.mean_motion_rev_day,
        )
    }
}

/// Parse TLE text (2 or 3 lines) straight into orbital elements.
pub fn parse_tle(text: &str) -> Result<OrbitalElements, ParseError> {
    TleRecord::parse(text)?.to_elements()
}

/// Resolve a two-digit year into the window [reference − 50, reference + 50].
pub fn resolve_epoch_year(two_digit_year: i32, reference_year: i32) -> i32 {
    let century = reference_year.div_euclid(100) * 100;
    let candidate = century + two_digit_year;
    if candidate > reference_year + 50 {
        candidate - 100
    } else if candidate < reference_year - 50 {
        candidate + 100
    } else {
        candidate
    }
}

/// Compute TLE checksum (mod-10 of sum of digits, '-' counts as 1).
pub fn compute_checksum(line: &str) -> u8 {
    let sum: u32 = line
        .bytes()
        .map(|b| match b {
            b'0'..=b'9' => (b - b'0') as u32,
            b'-' => 1,
            _ => 0,
        })
        .sum();
    (sum % 10) as u8
}

/// Length, character set, line number and checksum of a data line.
fn check_data_line(line: &str, number: u8) -> Result<&str, ParseError> {
    if line.len() < DATA_LINE_LEN {
        return Err(ParseError::InvalidFormat(format!("Line {number} too short")));
    }
    if !line.is_ascii() {
        return Err(ParseError::InvalidFormat(format!(
            "Line {number} contains non-ASCII characters"
        )));
    }

    let first = line.as_bytes()[0];
    if first != b'0' + number {
        return Err(ParseError::InvalidFormat(format!(
            "Line {number} must start with '{number}', got '{}'",
            first as char
        )));
    }

    let found = cols(line, 69, 69);
    let expected = match found.as_bytes()[0] {
        b @ b'0'..=b'9' => b - b'0',
        _ => return Err(invalid_number("checksum", found)),
    };
    let actual = compute_checksum(cols(line, 1, 68));
    if expected != actual {
        return Err(ParseError::InvalidChecksum {
            line: number,
            expected,
            actual,
        });
    }

    Ok(line)
}

/// Columns `start..=end`, 1-indexed as in the format reference.
fn cols(line: &str, start: usize, end: usize) -> &str {
    &line[start - 1..end]
}

fn invalid_number(field: &'static str, raw: &str) -> ParseError {
    ParseError::InvalidNumber {
        field,
        raw_value: raw.to_string(),
    }
}

fn parse_f64(field: &'static str, raw: &str) -> Result<f64, ParseError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid_number(field, raw))
}

fn parse_u32(field: &'static str, raw: &str) -> Result<u32, ParseError> {
    raw.trim().parse::<u32>().map_err(|_| invalid_number(field, raw))
}

/// Optional integer fields: blank means zero.
fn parse_u32_or_zero(field: &'static str, raw: &str) -> Result<u32, ParseError> {
    if raw.trim().is_empty() {
        Ok(0)
    } else {
        parse_u32(field, raw)
    }
}

/// Eccentricity with its implied leading "0.".
fn parse_eccentricity(raw: &str) -> Result<f64, ParseError> {
    let digits = raw.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid_number("eccentricity", raw));
    }
    let value = format!("0.{digits}")
        .parse::<f64>()
        .map_err(|_| invalid_number("eccentricity", raw))?;
    if value >= 1.0 {
        return Err(ParseError::InvalidEccentricity { value });
    }
    Ok(value)
}

/// Parse the TLE exponential format: "±MMMMM±E" → ±0.MMMMM × 10^±E.
///
/// Examples: " 16538-4" → 0.16538e-4, "-11606-4" → -0.11606e-4
fn parse_exponential(field: &'static str, raw: &str) -> Result<f64, ParseError> {
    let s = raw.trim();
    if s.is_empty() {
        return Ok(0.0);
    }

    let (sign, rest) = match s.as_bytes()[0] {
        b'-' => ("-", &s[1..]),
        b'+' => ("", &s[1..]),
        _ => ("", s),
    };
    if rest.len() < 3 {
        return Err(invalid_number(field, raw));
    }

    let (mantissa, exponent) = rest.split_at(rest.len() - 2);
    let exp_bytes = exponent.as_bytes();
    let exp_ok = matches!(exp_bytes[0], b'+' | b'-') && exp_bytes[1].is_ascii_digit();
    if !exp_ok || !mantissa.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid_number(field, raw));
    }

    format!("{sign}0.{mantissa}e{exponent}")
        .parse::<f64>()
        .map_err(|_| invalid_number(field, raw))
}
