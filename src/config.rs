//! # Runtime configuration.
//!
//! Provides [`LoopConfig`] (settings for one [`EventLoop`](crate::EventLoop)) and
//! [`SchedulerConfig`] (per-surface pacing settings for a
//! [`DrawScheduler`](crate::DrawScheduler)).
//!
//! Both are plain structs with public fields and a `Default` impl. Validation of
//! fps values happens when a scheduler is built from the config, so invalid values
//! surface as a [`LoopError`] to the caller that constructs the scheduler.
//!
//! ## Sentinel values
//! - `LoopConfig::force_threshold = 0` → treated as 1 (every stop forces teardown)
//! - `SchedulerConfig::min_fps = 0.0` → no minimum frame rate in `ondemand` mode

use std::time::Duration;

use crate::error::LoopError;
use crate::scheduler::UpdateMode;

/// Configuration for an event loop.
///
/// ## Field semantics
/// - `housekeeping_interval`: how often the housekeeping task wakes (default 100ms)
/// - `force_threshold`: stop count at which teardown no longer waits for surfaces
/// - `spam_threshold`: stop count at which `stop()` tears down on the spot
/// - `handle_signals`: intercept SIGINT/SIGTERM while inside `run()`
/// - `bus_capacity`: ring-buffer size of the observability [`Bus`](crate::Bus)
#[derive(Clone, Debug)]
pub struct LoopConfig {
    /// Wake-up interval of the housekeeping task.
    ///
    /// Also bounds how long `run()` takes to notice that no surfaces are left.
    pub housekeeping_interval: Duration,

    /// Number of accumulated stop requests that forces teardown.
    ///
    /// The first interrupt asks surfaces to close; reaching this count tears the
    /// loop down whether or not they did.
    pub force_threshold: u32,

    /// Number of accumulated stop requests after which `stop()` tears down
    /// immediately, without waiting for the housekeeping task.
    pub spam_threshold: u32,

    /// Install interrupt/termination listeners for the duration of `run()`.
    pub handle_signals: bool,

    /// Capacity of the event bus broadcast channel.
    pub bus_capacity: usize,
}

impl LoopConfig {
    /// Returns the force threshold clamped to a minimum of 1.
    #[inline]
    pub fn force_threshold_clamped(&self) -> u32 {
        self.force_threshold.max(1)
    }

    /// Returns the spam threshold, never below the force threshold.
    #[inline]
    pub fn spam_threshold_clamped(&self) -> u32 {
        self.spam_threshold.max(self.force_threshold_clamped())
    }

    /// Returns the bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for LoopConfig {
    /// Default configuration:
    ///
    /// - `housekeeping_interval = 100ms`
    /// - `force_threshold = 2` (second interrupt forces teardown)
    /// - `spam_threshold = 4`
    /// - `handle_signals = true`
    /// - `bus_capacity = 256`
    fn default() -> Self {
        Self {
            housekeeping_interval: Duration::from_millis(100),
            force_threshold: 2,
            spam_threshold: 4,
            handle_signals: true,
            bus_capacity: 256,
        }
    }
}

/// Pacing configuration for one surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SchedulerConfig {
    /// Draw scheduling policy.
    pub mode: UpdateMode,
    /// Minimum frame rate in `ondemand` mode (`0` = none).
    pub min_fps: f64,
    /// Maximum frame rate for `ondemand` and `continuous` (must be >= 1).
    pub max_fps: f64,
}

impl SchedulerConfig {
    /// Creates a config with the given mode and default fps bounds.
    pub fn with_mode(mode: UpdateMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Checks fps bounds; returns the normalized config.
    ///
    /// `max_fps < 1` is rejected rather than clamped, so callers trying to lift the
    /// cap with `-1` get pointed to [`UpdateMode::Fastest`] instead.
    pub fn validated(self) -> Result<Self, LoopError> {
        Ok(Self {
            mode: self.mode,
            min_fps: validate_min_fps(self.min_fps)?,
            max_fps: validate_max_fps(self.max_fps)?,
        })
    }
}

impl Default for SchedulerConfig {
    /// `ondemand` at 1..30 fps.
    fn default() -> Self {
        Self {
            mode: UpdateMode::default(),
            min_fps: 1.0,
            max_fps: 30.0,
        }
    }
}

pub(crate) fn validate_min_fps(min_fps: f64) -> Result<f64, LoopError> {
    if min_fps.is_nan() || min_fps < 0.0 {
        return Err(LoopError::InvalidMinFps(min_fps));
    }
    Ok(min_fps)
}

pub(crate) fn validate_max_fps(max_fps: f64) -> Result<f64, LoopError> {
    if max_fps.is_nan() || max_fps < 1.0 {
        return Err(LoopError::InvalidMaxFps(max_fps));
    }
    Ok(max_fps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = LoopConfig::default();
        assert_eq!(cfg.housekeeping_interval, Duration::from_millis(100));
        assert_eq!(cfg.force_threshold_clamped(), 2);
        assert_eq!(cfg.spam_threshold_clamped(), 4);

        let sched = SchedulerConfig::default();
        assert_eq!(sched.mode, UpdateMode::Ondemand);
        assert_eq!(sched.max_fps, 30.0);
    }

    #[test]
    fn thresholds_are_clamped() {
        let cfg = LoopConfig {
            force_threshold: 0,
            spam_threshold: 0,
            bus_capacity: 0,
            ..LoopConfig::default()
        };
        assert_eq!(cfg.force_threshold_clamped(), 1);
        assert_eq!(cfg.spam_threshold_clamped(), 1);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }

    #[test]
    fn fps_validation() {
        let ok = SchedulerConfig {
            mode: UpdateMode::Continuous,
            min_fps: 0.0,
            max_fps: 1.0,
        };
        assert!(ok.validated().is_ok());

        let bad_max = SchedulerConfig {
            max_fps: 0.5,
            ..SchedulerConfig::default()
        };
        assert!(matches!(
            bad_max.validated(),
            Err(LoopError::InvalidMaxFps(_))
        ));

        let bad_min = SchedulerConfig {
            min_fps: -1.0,
            ..SchedulerConfig::default()
        };
        assert!(matches!(
            bad_min.validated(),
            Err(LoopError::InvalidMinFps(_))
        ));

        let nan = SchedulerConfig {
            max_fps: f64::NAN,
            ..SchedulerConfig::default()
        };
        assert!(nan.validated().is_err());
    }
}
