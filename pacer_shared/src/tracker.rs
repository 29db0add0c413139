use crate::geo::{haversine_distance, LocationFix};
use crate::time::ElapsedTimer;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackerError {
    #[error("geolocation is not supported on this platform")]
    Unsupported,
    #[error("location error: {0}")]
    Position(String),
}

/// Push-based updates delivered by a location provider.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationEvent {
    Fix(LocationFix),
    Error(String),
}

/// Platform source of location fixes. Fixes themselves arrive as
/// [`LocationEvent`]s handed to [`DistanceTracker::handle`].
pub trait LocationProvider {
    fn watch(&mut self) -> Result<WatchId, TrackerError>;
    fn clear_watch(&mut self, id: WatchId);
}

/// Accumulates traveled distance and elapsed time from periodic fixes.
#[derive(Debug, Default)]
pub struct DistanceTracker {
    distance_m: f64,
    positions: Vec<LocationFix>,
    error: Option<String>,
    watch: Option<WatchId>,
    previous: Option<LocationFix>,
    elapsed: ElapsedTimer,
}

impl DistanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start<P: LocationProvider>(&mut self, provider: &mut P) -> Result<(), TrackerError> {
        if self.watch.is_some() {
            return Ok(());
        }
        match provider.watch() {
            Ok(id) => {
                self.watch = Some(id);
                self.elapsed.start();
                Ok(())
            }
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Stop watching. Distance and trail are kept; the next fix after a
    /// restart does not count the gap from the last fix before the stop.
    pub fn stop<P: LocationProvider>(&mut self, provider: &mut P) {
        if let Some(id) = self.watch.take() {
            provider.clear_watch(id);
        }
        self.previous = None;
        self.elapsed.stop();
    }

    pub fn reset(&mut self) {
        self.distance_m = 0.0;
        self.positions.clear();
        self.error = None;
        self.previous = None;
        self.elapsed.reset();
    }

    pub fn handle(&mut self, event: LocationEvent) {
        match event {
            LocationEvent::Fix(fix) => {
                self.positions.push(fix);
                if let Some(prev) = self.previous {
                    self.distance_m += haversine_distance(prev, fix);
                }
                self.previous = Some(fix);
            }
            LocationEvent::Error(message) => {
                self.error = Some(message);
            }
        }
    }

    /// Driven by the ~1 Hz display tick.
    pub fn on_second_tick(&mut self) {
        self.elapsed.on_second_tick();
    }

    pub fn is_tracking(&self) -> bool {
        self.watch.is_some()
    }

    pub fn distance_meters(&self) -> f64 {
        self.distance_m
    }

    pub fn positions(&self) -> &[LocationFix] {
        &self.positions
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn elapsed(&self) -> &ElapsedTimer {
        &self.elapsed
    }

    pub fn pace_seconds_per_km(&self) -> Option<f64> {
        if self.distance_m <= 0.0 {
            return None;
        }
        Some(self.elapsed.seconds() as f64 / (self.distance_m / 1000.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::EARTH_RADIUS_METERS;
    use approx::assert_relative_eq;

    #[derive(Default)]
    struct FakeProvider {
        supported: bool,
        next: u64,
        cleared: Vec<WatchId>,
    }

    impl LocationProvider for FakeProvider {
        fn watch(&mut self) -> Result<WatchId, TrackerError> {
            if !self.supported {
                return Err(TrackerError::Unsupported);
            }
            self.next += 1;
            Ok(WatchId(self.next))
        }

        fn clear_watch(&mut self, id: WatchId) {
            self.cleared.push(id);
        }
    }

    fn supported() -> FakeProvider {
        FakeProvider { supported: true, ..Default::default() }
    }

    #[test]
    fn test_accumulates_distance_between_fixes() {
        let mut provider = supported();
        let mut tracker = DistanceTracker::new();
        tracker.start(&mut provider).unwrap();

        tracker.handle(LocationEvent::Fix(LocationFix::new(0.0, 0.0)));
        assert_eq!(tracker.distance_meters(), 0.0);
        tracker.handle(LocationEvent::Fix(LocationFix::new(0.001, 0.0)));
        tracker.handle(LocationEvent::Fix(LocationFix::new(0.002, 0.0)));

        let expected = 2.0 * EARTH_RADIUS_METERS * 0.001_f64.to_radians();
        assert_relative_eq!(tracker.distance_meters(), expected, max_relative = 1e-9);
        assert_eq!(tracker.positions().len(), 3);
    }

    #[test]
    fn test_unsupported_provider_records_error() {
        let mut provider = FakeProvider::default();
        let mut tracker = DistanceTracker::new();
        assert_eq!(tracker.start(&mut provider), Err(TrackerError::Unsupported));
        assert!(!tracker.is_tracking());
        assert!(tracker.error().unwrap().contains("not supported"));
    }

    #[test]
    fn test_stop_forgets_previous_fix_but_keeps_distance() {
        let mut provider = supported();
        let mut tracker = DistanceTracker::new();
        tracker.start(&mut provider).unwrap();
        tracker.handle(LocationEvent::Fix(LocationFix::new(0.0, 0.0)));
        tracker.handle(LocationEvent::Fix(LocationFix::new(0.0, 0.001)));
        let before = tracker.distance_meters();

        tracker.stop(&mut provider);
        assert_eq!(provider.cleared, vec![WatchId(1)]);

        tracker.start(&mut provider).unwrap();
        // Far away: must not be bridged to the pre-stop fix
        tracker.handle(LocationEvent::Fix(LocationFix::new(10.0, 10.0)));
        assert_eq!(tracker.distance_meters(), before);
    }

    #[test]
    fn test_error_event_is_kept() {
        let mut tracker = DistanceTracker::new();
        tracker.handle(LocationEvent::Error("User denied Geolocation".into()));
        assert_eq!(tracker.error(), Some("User denied Geolocation"));
    }

    #[test]
    fn test_elapsed_and_pace() {
        let mut provider = supported();
        let mut tracker = DistanceTracker::new();
        assert_eq!(tracker.pace_seconds_per_km(), None);

        tracker.start(&mut provider).unwrap();
        tracker.handle(LocationEvent::Fix(LocationFix::new(0.0, 0.0)));
        tracker.handle(LocationEvent::Fix(LocationFix::new(0.0, 1.0)));
        for _ in 0..600 {
            tracker.on_second_tick();
        }
        tracker.stop(&mut provider);
        tracker.on_second_tick();

        assert_eq!(tracker.elapsed().seconds(), 600);
        let km = tracker.distance_meters() / 1000.0;
        assert_relative_eq!(tracker.pace_seconds_per_km().unwrap(), 600.0 / km);
    }

    #[test]
    fn test_reset() {
        let mut tracker = DistanceTracker::new();
        tracker.handle(LocationEvent::Fix(LocationFix::new(0.0, 0.0)));
        tracker.handle(LocationEvent::Fix(LocationFix::new(0.0, 0.1)));
        tracker.handle(LocationEvent::Error("timeout".into()));
        tracker.reset();
        assert_eq!(tracker.distance_meters(), 0.0);
        assert!(tracker.positions().is_empty());
        assert_eq!(tracker.error(), None);
    }
}
