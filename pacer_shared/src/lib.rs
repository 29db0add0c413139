pub mod geo;
pub mod params;
pub mod time;
pub mod tracker;

pub use geo::{haversine_distance, LocationFix, EARTH_RADIUS_METERS};
pub use params::{ParamError, ParamKind, TempoParams, Waveform};
pub use time::{format_pace, format_time, ElapsedTimer};
pub use tracker::{DistanceTracker, LocationEvent, LocationProvider, TrackerError, WatchId};

/// How far ahead of the clock the scheduler commits clicks, in seconds.
pub const LOOKAHEAD_SECONDS: f64 = 0.1;

/// Envelope floor a click decays to. Exponential ramps cannot target zero.
pub const ENVELOPE_FLOOR: f64 = 0.001;
