//! Pass prediction over an observer.
//!
//! The window is scanned at a coarse step for elevation crossings of the
//! threshold. Each crossing is refined by bisection to one second, and the
//! culmination between AOS and LOS is located by golden-section search.
//!
//! Passes already in progress at the window start, or still in progress at
//! its end, are skipped or clipped to the window according to
//! [`PartialPasses`].
use log::debug;
use nalgebra::Vector3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::elements::Orbit;
use crate::frames::{look_angles_from, Observer, Topocentric};
use crate::propagator::{CalcError, KeplerSolver};
use crate::time::UtcInstant;
use crate::tracks::sample_times;

/// Refinement stops once the bracket is this narrow (s).
const REFINE_TOLERANCE_SECONDS: f64 = 1.0;
const MAX_BISECTIONS: usize = 64;
const MAX_GOLDEN_ITERATIONS: usize = 100;
/// 1/φ
const INV_GOLDEN_RATIO: f64 = 0.618_033_988_749_894_9;

/// Handling of passes cut by the edges of the search window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PartialPasses {
    /// Report only passes whose AOS and LOS both fall inside the window.
    #[default]
    Skip,
    /// Report cut passes with AOS/LOS pinned to the window edges.
    Clip,
}

/// Pass search configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PassSearch {
    /// Elevation threshold (deg)
    pub min_elevation_deg: f64,
    /// Coarse scan step (s)
    pub step_seconds: f64,
    pub partial_passes: PartialPasses,
    /// Compare apparent (refracted) elevation against the threshold
    pub refraction: bool,
}

impl Default for PassSearch {
    fn default() -> Self {
        Self {
            min_elevation_deg: 0.0,
            step_seconds: 60.0,
            partial_passes: PartialPasses::Skip,
            refraction: false,
        }
    }
}

/// One end or the culmination of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PassPoint {
    pub time: UtcInstant,
    pub azimuth_deg: f64,
    pub elevation_deg: f64,
}

impl From<Topocentric> for PassPoint {
    fn from(look: Topocentric) -> Self {
        Self {
            time: look.time,
            azimuth_deg: look.azimuth_deg,
            elevation_deg: look.elevation_deg,
        }
    }
}

/// A visibility window: acquisition, culmination, loss of signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PassWindow {
    pub aos: PassPoint,
    pub max: PassPoint,
    pub los: PassPoint,
    pub duration_seconds: f64,
}

impl PassWindow {
    /// Assemble a window, rejecting one whose points are out of order or
    /// whose culmination is below `threshold_deg`.
    fn checked(aos: PassPoint, max: PassPoint, los: PassPoint, threshold_deg: f64) -> Option<Self> {
        let ordered = aos.time < max.time && max.time <= los.time;
        if !ordered || max.elevation_deg < threshold_deg {
            debug!(
                "dropping degenerate pass aos={} max={} ({:.3}°) los={}",
                aos.time, max.time, max.elevation_deg, los.time
            );
            return None;
        }
        Some(Self {
            aos,
            max,
            los,
            duration_seconds: los.time - aos.time,
        })
    }
}

impl std::fmt::Display for PassWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "AOS {} az {:.1}° | MAX {} el {:.1}° | LOS {} az {:.1}° | {:.0} s",
            self.aos.time,
            self.aos.azimuth_deg,
            self.max.time,
            self.max.elevation_deg,
            self.los.time,
            self.los.azimuth_deg,
            self.duration_seconds
        )
    }
}

/// Scanner state between two coarse samples.
enum Scan {
    Below,
    /// Above the threshold, but the pass started before the window.
    Skipping,
    Tracking { aos: PassPoint, best: Topocentric },
}

/// Borrowed context for refining one satellite's crossings.
struct Tracker<'a, O: Orbit + ?Sized> {
    orbit: &'a O,
    observer: &'a Observer,
    observer_ecef: Vector3<f64>,
    solver: KeplerSolver,
    threshold_deg: f64,
    refraction: bool,
}

impl<O: Orbit + ?Sized> Tracker<'_, O> {
    fn look(&self, t: UtcInstant) -> Result<Topocentric, CalcError> {
        let state = self.solver.propagate(self.orbit, t)?;
        Ok(look_angles_from(&state, self.observer, &self.observer_ecef, self.refraction))
    }

    fn is_above(&self, look: &Topocentric) -> bool {
        look.elevation_deg >= self.threshold_deg
    }

    /// Threshold crossing between two samples on opposite sides of it.
    fn bisect(&self, left: &Topocentric, right: &Topocentric) -> Result<PassPoint, CalcError> {
        let rising = !self.is_above(left);
        let (mut lo, mut hi) = (left.time, right.time);

        for _ in 0..MAX_BISECTIONS {
            if hi - lo <= REFINE_TOLERANCE_SECONDS {
                return self.look(lo.midpoint(hi)).map(PassPoint::from);
            }
            let mid = lo.midpoint(hi);
            if self.is_above(&self.look(mid)?) == rising {
                hi = mid;
            } else {
                lo = mid;
            }
        }

        Err(CalcError::SingularityReached)
    }

    /// Elevation maximum on `[from, to]`, assuming a single hump.
    fn culmination(&self, from: UtcInstant, to: UtcInstant) -> Result<Topocentric, CalcError> {
        let (mut a, mut b) = (from, to);
        let mut c = b - INV_GOLDEN_RATIO * (b - a);
        let mut d = a + INV_GOLDEN_RATIO * (b - a);
        let mut fc = self.look(c)?.elevation_deg;
        let mut fd = self.look(d)?.elevation_deg;

        for _ in 0..MAX_GOLDEN_ITERATIONS {
            if b - a <= REFINE_TOLERANCE_SECONDS {
                return self.look(a.midpoint(b));
            }
            if fc > fd {
                b = d;
                d = c;
                fd = fc;
                c = b - INV_GOLDEN_RATIO * (b - a);
                fc = self.look(c)?.elevation_deg;
            } else {
                a = c;
                c = d;
                fc = fd;
                d = a + INV_GOLDEN_RATIO * (b - a);
                fd = self.look(d)?.elevation_deg;
            }
        }

        Err(CalcError::SingularityReached)
    }

    fn close(&self, aos: PassPoint, best: Topocentric, los: PassPoint) -> Result<Option<PassWindow>, CalcError> {
        let golden = self.culmination(aos.time, los.time)?;
        let max = if best.elevation_deg > golden.elevation_deg && best.time > aos.time && best.time <= los.time {
            best
        } else {
            golden
        };
        Ok(PassWindow::checked(aos, max.into(), los, self.threshold_deg))
    }
}

impl PassSearch {
    pub fn new(min_elevation_deg: f64, step_seconds: f64) -> Self {
        Self {
            min_elevation_deg,
            step_seconds,
            ..Self::default()
        }
    }

    pub fn with_partial_passes(mut self, partial_passes: PartialPasses) -> Self {
        self.partial_passes = partial_passes;
        self
    }

    pub fn with_refraction(mut self, refraction: bool) -> Self {
        self.refraction = refraction;
        self
    }

    /// All passes of `orbit` over `observer` in `[from, to]`, in time order.
    pub fn run<O: Orbit + ?Sized>(
        &self,
        orbit: &O,
        observer: &Observer,
        from: UtcInstant,
        to: UtcInstant,
    ) -> Result<Vec<PassWindow>, CalcError> {
        let mut times = sample_times(from, to, self.step_seconds)?;
        let tracker = Tracker {
            orbit,
            observer,
            observer_ecef: observer.ecef(),
            solver: KeplerSolver::default(),
            threshold_deg: self.min_elevation_deg,
            refraction: self.refraction,
        };

        let mut passes = Vec::new();
        let Some(first) = times.next() else {
            return Ok(passes);
        };

        let mut prev = tracker.look(first)?;
        let mut scan = if !tracker.is_above(&prev) {
            Scan::Below
        } else {
            match self.partial_passes {
                PartialPasses::Skip => {
                    debug!("skipping pass in progress at window start {from}");
                    Scan::Skipping
                }
                PartialPasses::Clip => Scan::Tracking {
                    aos: prev.into(),
                    best: prev,
                },
            }
        };

        for t in times {
            let cur = tracker.look(t)?;
            let above = tracker.is_above(&cur);
            scan = match (scan, above) {
                (Scan::Below, false) => Scan::Below,
                (Scan::Below, true) => Scan::Tracking {
                    aos: tracker.bisect(&prev, &cur)?,
                    best: cur,
                },
                (Scan::Skipping, true) => Scan::Skipping,
                (Scan::Skipping, false) => Scan::Below,
                (Scan::Tracking { aos, best }, true) => Scan::Tracking {
                    aos,
                    best: if cur.elevation_deg > best.elevation_deg { cur } else { best },
                },
                (Scan::Tracking { aos, best }, false) => {
                    let los = tracker.bisect(&prev, &cur)?;
                    passes.extend(tracker.close(aos, best, los)?);
                    Scan::Below
                }
            };
            prev = cur;
        }

        if let Scan::Tracking { aos, best } = scan {
            match self.partial_passes {
                PartialPasses::Clip => passes.extend(tracker.close(aos, best, prev.into())?),
                PartialPasses::Skip => debug!("skipping pass still in progress at window end {to}"),
            }
        }

        debug!("found {} passes between {from} and {to}", passes.len());
        Ok(passes)
    }

    /// Run the search for every satellite of a catalog in parallel.
    ///
    /// Results keep the catalog order; a failure for one satellite does
    /// not affect the others.
    pub fn run_catalog<O: Orbit + Sync>(
        &self,
        satellites: &[(u32, O)],
        observer: &Observer,
        from: UtcInstant,
        to: UtcInstant,
    ) -> Vec<(u32, Result<Vec<PassWindow>, CalcError>)> {
        satellites
            .par_iter()
            .map(|(id, orbit)| (*id, self.run(orbit, observer, from, to)))
            .collect()
    }
}

/// Passes of `orbit` above `min_elevation_deg` in `[from, to]`, skipping
/// passes cut by the window edges.
pub fn predict_passes<O: Orbit + ?Sized>(
    orbit: &O,
    observer: &Observer,
    from: UtcInstant,
    to: UtcInstant,
    min_elevation_deg: f64,
    step_seconds: f64,
) -> Result<Vec<PassWindow>, CalcError> {
    PassSearch::new(min_elevation_deg, step_seconds).run(orbit, observer, from, to)
}
