//! Ground tracks and sky tracks.
//!
//! Both sample the propagator over `[from, to]` at a fixed step. The
//! sequence always starts exactly at `from` and ends exactly at `to`, even
//! when the span is not a multiple of the step.
use serde::{Deserialize, Serialize};

use crate::elements::Orbit;
use crate::frames::{ecef_to_geodetic, eci_to_ecef, look_angles, Geodetic, Observer, Topocentric};
use crate::propagator::{CalcError, KeplerSolver};
use crate::time::UtcInstant;

/// Remainder (s) below which the last stepped sample is treated as landing on `to`.
const END_SNAP_SECONDS: f64 = 1e-9;

/// A sub-satellite point at an instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeodeticPoint {
    pub time: UtcInstant,
    pub geodetic: Geodetic,
}

/// Sample instants `from, from + step, …, to`, generated lazily.
///
/// `floor((to − from) / step) + 1` instants for an aligned span, one more
/// when the span leaves a remainder. `from == to` yields a single instant.
/// A span holding more steps than `usize` can count is rejected as
/// [`CalcError::InvalidStep`].
pub fn sample_times(
    from: UtcInstant,
    to: UtcInstant,
    step_seconds: f64,
) -> Result<impl Iterator<Item = UtcInstant> + Clone, CalcError> {
    if !(step_seconds.is_finite() && step_seconds > 0.0) {
        return Err(CalcError::InvalidStep(step_seconds));
    }
    let span = to - from;
    if !span.is_finite() || span < 0.0 {
        return Err(CalcError::InvalidRange { from, to });
    }

    let steps = (span / step_seconds).floor();
    // usize::MAX rounds up to 2^64 as f64, so `<` keeps the cast exact
    if !(steps < usize::MAX as f64) {
        return Err(CalcError::InvalidStep(step_seconds));
    }
    let steps = steps as usize;

    let remainder = span - steps as f64 * step_seconds;
    let stepped = if remainder <= END_SNAP_SECONDS.max(4.0 * f64::EPSILON * span) {
        steps
    } else {
        steps + 1
    };

    Ok((0..stepped)
        .map(move |k| from + k as f64 * step_seconds)
        .chain(std::iter::once(to)))
}

/// Sub-satellite points of `orbit` over `[from, to]`.
pub fn ground_track<O: Orbit + ?Sized>(
    orbit: &O,
    from: UtcInstant,
    to: UtcInstant,
    step_seconds: f64,
) -> Result<Vec<GeodeticPoint>, CalcError> {
    let solver = KeplerSolver::default();
    sample_times(from, to, step_seconds)?
        .map(|t| {
            let state = solver.propagate(orbit, t)?;
            Ok(GeodeticPoint {
                time: t,
                geodetic: ecef_to_geodetic(&eci_to_ecef(&state).position_km),
            })
        })
        .collect()
}

/// Look angles of `orbit` from `observer` over `[from, to]` (geometric, no refraction).
pub fn sky_track<O: Orbit + ?Sized>(
    orbit: &O,
    observer: &Observer,
    from: UtcInstant,
    to: UtcInstant,
    step_seconds: f64,
) -> Result<Vec<Topocentric>, CalcError> {
    let solver = KeplerSolver::default();
    sample_times(from, to, step_seconds)?
        .map(|t| Ok(look_angles(&solver.propagate(orbit, t)?, observer, false)))
        .collect()
}
