//! Update modes.

use std::fmt;
use std::str::FromStr;

use crate::error::LoopError;

/// Draw scheduling policy of a [`DrawScheduler`](crate::DrawScheduler).
///
/// | Mode         | Draws when                                         | Pace            |
/// |--------------|----------------------------------------------------|-----------------|
/// | `Manual`     | only on a forced draw by the surface               | n/a             |
/// | `Ondemand`   | a draw was requested, or `1/min_fps` has elapsed   | ≤ `max_fps`     |
/// | `Continuous` | every tick                                         | `max_fps`       |
/// | `Fastest`    | every tick, no wait between ticks                  | draw completion |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UpdateMode {
    /// Never draws on its own.
    Manual,
    /// Draws on request, with an optional minimum rate.
    #[default]
    Ondemand,
    /// Draws at `max_fps`.
    Continuous,
    /// Draws as fast as the surface completes frames.
    Fastest,
}

impl UpdateMode {
    /// All modes, in documentation order.
    pub const ALL: [UpdateMode; 4] = [
        UpdateMode::Manual,
        UpdateMode::Ondemand,
        UpdateMode::Continuous,
        UpdateMode::Fastest,
    ];

    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateMode::Manual => "manual",
            UpdateMode::Ondemand => "ondemand",
            UpdateMode::Continuous => "continuous",
            UpdateMode::Fastest => "fastest",
        }
    }
}

impl fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateMode {
    type Err = LoopError;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        UpdateMode::ALL
            .into_iter()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| LoopError::InvalidUpdateMode(s.to_string()))
    }
}
