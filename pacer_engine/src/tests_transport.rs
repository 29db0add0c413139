#[cfg(test)]
mod tests {
    use crate::config::EngineConfig;
    use crate::error::EngineError;
    use crate::offline::{ManualTicks, OfflineBackend, OfflineHandle, ResumeBehavior, TickProbe};
    use crate::params::LiveParams;
    use crate::transport::{PlaybackState, Transport};
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;

    const SAMPLE_RATE: u32 = 8000;
    // 10 ms at 8 kHz
    const STEP_FRAMES: usize = 80;

    type OfflineTransport = Transport<OfflineBackend, ManualTicks>;

    fn rig_with(backend: OfflineBackend, config: &EngineConfig) -> (OfflineTransport, OfflineHandle, TickProbe) {
        let handle = backend.handle();
        let ticks = ManualTicks::new();
        let probe = ticks.probe();
        let transport = Transport::new(backend, ticks, Arc::new(LiveParams::default()), config);
        (transport, handle, probe)
    }

    fn rig() -> (OfflineTransport, OfflineHandle, TickProbe) {
        rig_with(OfflineBackend::new(SAMPLE_RATE), &EngineConfig::default())
    }

    /// Render in 10 ms blocks, delivering one tick per block, until `until`.
    fn run_until(t: &mut OfflineTransport, h: &OfflineHandle, until: f64) {
        while h.now() < until - 1e-9 {
            h.advance_frames(STEP_FRAMES);
            t.pump();
        }
    }

    #[test]
    fn test_first_click_and_lookahead_edge() {
        let (mut t, h, _) = rig();
        t.play().unwrap();
        assert_eq!(h.click_times(), vec![0.0]);

        // Horizon 0.49: the 0.5 click is not committed yet
        h.advance(0.39);
        assert!(t.pump());
        assert_eq!(h.click_times(), vec![0.0]);

        // Horizon 0.51
        h.advance(0.02);
        assert!(t.pump());
        let clicks = h.click_times();
        assert_eq!(clicks.len(), 2);
        assert_abs_diff_eq!(clicks[1], 0.5);
    }

    #[test]
    fn test_tempo_extremes() {
        let (mut t, h, _) = rig();
        t.params().set_bpm(240.0).unwrap();
        t.play().unwrap();
        run_until(&mut t, &h, 1.0);
        assert_eq!(h.click_times(), vec![0.0, 0.25, 0.5, 0.75, 1.0]);

        let (mut t, h, _) = rig();
        t.params().set_bpm(40.0).unwrap();
        t.play().unwrap();
        run_until(&mut t, &h, 3.0);
        assert_eq!(h.click_times(), vec![0.0, 1.5, 3.0]);
    }

    #[test]
    fn test_jittered_ticks_keep_clicks_on_grid() {
        let (mut t, h, _) = rig();
        let mut rng = fastrand::Rng::with_seed(7);
        t.play().unwrap();

        let mut seen = h.click_times().len();
        while h.now() < 5.0 {
            // Anywhere from 0.125 ms to just under the lookahead window
            h.advance_frames(rng.usize(1..800));
            t.pump();

            let now = h.now();
            let clicks = h.click_times();
            for &start in &clicks[seen..] {
                assert!(start >= now - 1e-9, "click at {} committed late at {}", start, now);
            }
            seen = clicks.len();

            let ahead = clicks.iter().filter(|&&c| c >= now).count();
            assert!(ahead <= 1, "{} clicks queued ahead of {}", ahead, now);
        }

        let clicks = h.click_times();
        assert_eq!(clicks[0], 0.0);
        for pair in clicks.windows(2) {
            assert_abs_diff_eq!(pair[1] - pair[0], 0.5, epsilon = 1e-9);
        }
        assert!(clicks.len() >= 10);
    }

    #[test]
    fn test_stalled_tick_drains_backlog() {
        let (mut t, h, _) = rig();
        t.play().unwrap();
        // One tick arriving a full second late
        h.advance(1.0);
        t.pump();
        assert_eq!(h.click_times(), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_play_and_stop_are_idempotent() {
        let (mut t, h, probe) = rig();
        t.play().unwrap();
        t.play().unwrap();
        assert_eq!(h.click_times().len(), 1);
        assert_eq!(probe.requested(), 1);

        t.stop();
        t.stop();
        assert_eq!(t.state(), PlaybackState::Idle);
        assert_eq!(probe.cancelled(), 1);
        assert_eq!(probe.pending(), None);
        assert!(!t.pump());
    }

    #[test]
    fn test_live_bpm_change_keeps_phase() {
        let (mut t, h, _) = rig();
        t.play().unwrap();
        run_until(&mut t, &h, 0.3);

        t.params().set_bpm(60.0).unwrap();
        // The 0.5 click still follows the old grid, the change applies after it
        run_until(&mut t, &h, 2.5);
        assert_eq!(h.click_times(), vec![0.0, 0.5, 1.5, 2.5]);
        assert_eq!(t.params().current().bpm, 60.0);
    }

    #[test]
    fn test_restart_realigns_to_clock() {
        let (mut t, h, _) = rig();
        t.play().unwrap();
        run_until(&mut t, &h, 1.2);
        t.stop();
        assert_eq!(h.click_times(), vec![0.0, 0.5, 1.0]);

        h.advance(0.05);
        t.play().unwrap();
        let clicks = h.click_times();
        assert_abs_diff_eq!(*clicks.last().unwrap(), 1.25, epsilon = 1e-9);

        run_until(&mut t, &h, 1.7);
        let clicks = h.click_times();
        assert_eq!(clicks.len(), 5);
        assert_abs_diff_eq!(clicks[4], 1.75, epsilon = 1e-9);
    }

    #[test]
    fn test_clock_created_once_across_sessions() {
        let (mut t, h, _) = rig();
        assert_eq!(t.status().clock_time, None);
        for _ in 0..3 {
            t.play().unwrap();
            run_until(&mut t, &h, h.now() + 0.2);
            t.stop();
        }
        assert_eq!(h.opens(), 1);
        assert!(t.status().clock_time.is_some());
    }

    #[test]
    fn test_unavailable_clock_stays_idle() {
        let (mut t, h, probe) = rig_with(OfflineBackend::unavailable(SAMPLE_RATE), &EngineConfig::default());
        assert!(matches!(t.play(), Err(EngineError::ClockUnavailable(_))));
        assert_eq!(t.state(), PlaybackState::Idle);
        assert!(!t.playing_flag().load(std::sync::atomic::Ordering::Relaxed));
        assert_eq!(probe.requested(), 0);
        assert!(h.journal().is_empty());
    }

    #[test]
    fn test_failed_resume_stays_idle_and_can_retry() {
        let (mut t, h, probe) = rig();
        h.set_resume_behavior(ResumeBehavior::Fail("not allowed".to_string()));
        assert!(matches!(t.play(), Err(EngineError::ResumeFailure(_))));
        assert_eq!(t.state(), PlaybackState::Idle);
        assert_eq!(probe.requested(), 0);
        assert!(h.click_times().is_empty());

        h.set_resume_behavior(ResumeBehavior::Complete);
        t.play().unwrap();
        assert!(t.is_playing());
        assert_eq!(h.opens(), 1);
        assert_eq!(h.click_times(), vec![0.0]);
    }

    #[test]
    fn test_resume_that_never_completes() {
        let config = EngineConfig { resume_timeout_ms: 20, ..Default::default() };
        let (mut t, h, probe) = rig_with(OfflineBackend::new(SAMPLE_RATE), &config);
        h.set_resume_behavior(ResumeBehavior::Never);
        assert!(matches!(t.play(), Err(EngineError::ResumeFailure(_))));
        assert_eq!(t.state(), PlaybackState::Idle);
        assert_eq!(probe.pending(), None);
    }

    #[test]
    fn test_graph_failure_skips_but_keeps_grid() {
        let (mut t, h, _) = rig();
        t.play().unwrap();
        h.set_graph_failure(true);
        run_until(&mut t, &h, 1.2);
        h.set_graph_failure(false);
        run_until(&mut t, &h, 1.7);

        assert_eq!(h.click_times(), vec![0.0, 1.5]);
        let status = t.status();
        assert_eq!(status.clicks_skipped, 2);
        assert_eq!(status.clicks_scheduled, 2);
        assert!(t.is_playing());
    }

    #[test]
    fn test_stale_tick_is_ignored() {
        let (mut t, h, probe) = rig();
        t.play().unwrap();
        let stale = probe.pending().unwrap();
        h.advance(0.45);
        t.pump();
        let requested = probe.requested();
        let clicks = h.click_times().len();

        t.on_tick(stale);
        assert_eq!(probe.requested(), requested);
        assert_eq!(h.click_times().len(), clicks);
    }

    #[test]
    fn test_drop_cancels_pending_tick() {
        let (mut t, _h, probe) = rig();
        t.play().unwrap();
        assert!(probe.pending().is_some());
        drop(t);
        assert_eq!(probe.pending(), None);
        assert_eq!(probe.cancelled(), 1);
    }

    #[test]
    fn test_boundary_decays() {
        let (mut t, h, _) = rig();
        t.params().set_decay(0.001).unwrap();
        t.play().unwrap();
        t.params().set_decay(1.0).unwrap();
        run_until(&mut t, &h, 0.45);

        let starts = h.click_times();
        let stops = h.stop_times();
        assert_abs_diff_eq!(stops[0] - starts[0], 0.001, epsilon = 1e-12);
        assert_abs_diff_eq!(stops[1] - starts[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_clicks_are_audible_then_released() {
        let (mut t, h, _) = rig();
        t.play().unwrap();
        let block = h.advance(0.1);
        // Default decay is 10 ms: 80 frames of tone, then silence
        assert!(block[..80].iter().any(|s| s.abs() > 0.1));
        assert!(block[90..].iter().all(|&s| s == 0.0));
        assert_eq!(h.live_tones(), 0);
    }

    #[test]
    fn test_status_snapshot() {
        let (mut t, h, _) = rig();
        t.play().unwrap();
        let status = t.status();
        assert_eq!(status.state, PlaybackState::Running);
        assert_eq!(status.clock_time, Some(0.0));
        assert_eq!(status.next_click_time, Some(0.5));

        h.advance(0.1);
        t.stop();
        let status = t.status();
        assert_eq!(status.next_click_time, None);
        assert_abs_diff_eq!(status.clock_time.unwrap(), 0.1);
    }
}
