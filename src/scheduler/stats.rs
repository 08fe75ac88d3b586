//! Rolling frame statistics.

use std::time::{Duration, Instant};

/// Length of one statistics window.
pub(crate) const STATS_WINDOW: Duration = Duration::from_secs(1);

/// Mean frame timing over one closed window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTiming {
    /// Mean time between completed frames.
    pub frame_time: Duration,
    /// Frames per second over the window.
    pub fps: f64,
    /// Frames completed in the window.
    pub frames: u32,
}

/// Counts completed frames and closes a window once it is at least
/// [`STATS_WINDOW`] long.
///
/// The first recorded frame opens the first window, so idle time before it
/// does not count.
#[derive(Debug, Clone, Default)]
pub(crate) struct FrameStats {
    frames: u32,
    window_start: Option<Instant>,
}

impl FrameStats {
    /// Records a completed frame; returns the timing when a window closes.
    pub(crate) fn record(&mut self, now: Instant) -> Option<FrameTiming> {
        let Some(window_start) = self.window_start else {
            self.window_start = Some(now);
            return None;
        };
        self.frames += 1;
        let elapsed = now.saturating_duration_since(window_start);
        if elapsed < STATS_WINDOW {
            return None;
        }
        let frames = self.frames;
        let frame_time = elapsed / frames;
        let fps = f64::from(frames) / elapsed.as_secs_f64();
        self.frames = 0;
        self.window_start = Some(now);
        Some(FrameTiming {
            frame_time,
            fps,
            frames,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_only_when_window_closes() {
        let start = Instant::now();
        let mut stats = FrameStats::default();
        assert!(stats.record(start).is_none(), "first frame opens the window");
        for i in 1..10 {
            assert!(stats.record(start + Duration::from_millis(100 * i)).is_none());
        }
        let timing = stats
            .record(start + Duration::from_millis(1000))
            .expect("window closed");
        assert_eq!(timing.frames, 10);
        assert_eq!(timing.frame_time, Duration::from_millis(100));
        assert!((timing.fps - 10.0).abs() < 1e-9);

        // Fresh window afterwards.
        assert!(stats.record(start + Duration::from_millis(1100)).is_none());
    }

    #[test]
    fn idle_time_before_the_first_frame_is_ignored() {
        let start = Instant::now();
        let mut stats = FrameStats::default();
        // First frame long after the scheduler was created.
        let first = start + Duration::from_secs(5);
        assert!(stats.record(first).is_none());
        for i in 1..4 {
            assert!(stats.record(first + Duration::from_millis(250 * i)).is_none());
        }
        let timing = stats
            .record(first + Duration::from_millis(1000))
            .expect("window closed");
        assert_eq!(timing.frames, 4);
        assert_eq!(timing.frame_time, Duration::from_millis(250));
    }
}
