//! # skywatch
//!
//! Satellite pass prediction from Two-Line Element sets.
//!
//! Parses TLEs into Keplerian elements, propagates them with a two-body
//! Kepler solver, converts between inertial, Earth-fixed, geodetic and
//! topocentric frames, and predicts visibility passes and ground/sky tracks
//! for an observer on the WGS84 ellipsoid.
//!
//! ```no_run
//! use skywatch::{parse_tle, predict_passes, Observer, UtcInstant};
//!
//! let elements = parse_tle(
//!     "ISS (ZARYA)\n\
//!      1 25544U 98067A   20097.82871450  .00000874  00000-0  24271-4 0  9992\n\
//!      2 25544  51.6465 341.5807 0003880  94.4223  26.1197 15.48685836220958",
//! )?;
//! let louisville = Observer::new(38.2542, -85.7594, 0.140);
//! let from = UtcInstant::from_calendar(2020, 4, 7, 0, 0, 0.0);
//! for pass in predict_passes(&elements, &louisville, from, from + 86_400.0, 10.0, 60.0)? {
//!     println!("{pass}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod constants;
pub mod elements;
pub mod frames;
pub mod passes;
pub mod propagator;
pub mod time;
pub mod tle;
pub mod tracks;

pub use elements::{Orbit, OrbitalElements};
pub use frames::{subpoint, topocentric, Geodetic, Observer, Topocentric};
pub use passes::{predict_passes, PartialPasses, PassPoint, PassSearch, PassWindow};
pub use propagator::{propagate, CalcError, Frame, KeplerSolver, StateVector};
pub use time::UtcInstant;
pub use tle::{parse_tle, ParseError, TleRecord};
pub use tracks::{ground_track, sky_track, GeodeticPoint};
