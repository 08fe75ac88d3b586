//! Error types used by the loop runtime and by tasks.
//!
//! This module defines two main error enums:
//!
//! - [`LoopError`]: synchronous, pre-flight errors returned to the immediate caller
//!   (bad fps values, re-entrant `run()`, unsupported host capability, ...).
//! - [`TaskError`]: errors produced inside a task. They never cross a task
//!   boundary: the executor logs them and closes only the offending task.
//!
//! Both types provide `as_label` for logs/metrics, like the rest of the crate's
//! observability surface.

use thiserror::Error;

/// # Errors returned synchronously by loop, group and scheduler APIs.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LoopError {
    /// `max_fps` below 1 (or not a number).
    #[error(
        "invalid max_fps {0}: must be >= 1; use update mode 'fastest' to lift the fps cap"
    )]
    InvalidMaxFps(f64),

    /// `min_fps` negative (or not a number).
    #[error("invalid min_fps {0}: must be >= 0")]
    InvalidMinFps(f64),

    /// Unknown update-mode name.
    #[error("invalid update mode '{0}': expected one of manual, ondemand, continuous, fastest")]
    InvalidUpdateMode(String),

    /// `run()` was called from inside `run()`.
    #[error("loop.run() is not reentrant")]
    NotReentrant,

    /// The active host driver does not support the requested capability.
    #[error("host '{host}' does not support {capability}")]
    HostIncompatible {
        /// Host name.
        host: &'static str,
        /// The capability that was requested.
        capability: &'static str,
    },

    /// A canvas group cannot switch loops while it still has live surfaces.
    #[error("cannot select a new loop while {live} surface(s) are alive")]
    GroupInUse {
        /// Number of live surfaces at the time of the call.
        live: usize,
    },

    /// The hand-off queue to the loop thread is gone.
    #[error("loop is gone; cannot queue callback")]
    RemoteClosed,

    /// Building the host runtime failed.
    #[error("failed to start host runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

impl LoopError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use renderloop::LoopError;
    ///
    /// assert_eq!(LoopError::NotReentrant.as_label(), "loop_not_reentrant");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            LoopError::InvalidMaxFps(_) => "loop_invalid_max_fps",
            LoopError::InvalidMinFps(_) => "loop_invalid_min_fps",
            LoopError::InvalidUpdateMode(_) => "loop_invalid_update_mode",
            LoopError::NotReentrant => "loop_not_reentrant",
            LoopError::HostIncompatible { .. } => "loop_host_incompatible",
            LoopError::GroupInUse { .. } => "loop_group_in_use",
            LoopError::RemoteClosed => "loop_remote_closed",
            LoopError::Runtime(_) => "loop_runtime",
        }
    }
}

/// # Errors produced inside tasks.
///
/// `Canceled` is control flow rather than failure: the suspension primitives
/// return it to unwind a task that was asked to stop. The other variants are
/// logged at the task boundary.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Task body failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Task was cancelled.
    #[error("task cancelled")]
    Canceled,

    /// Task body panicked.
    #[error("task panicked: {info}")]
    Panicked {
        /// Panic payload, if it was a string.
        info: String,
    },

    /// Task suspended on something the driver does not understand.
    #[error("protocol error: {detail}")]
    Protocol {
        /// What went wrong.
        detail: String,
    },
}

impl TaskError {
    /// Convenience constructor for [`TaskError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use renderloop::TaskError;
    ///
    /// assert_eq!(TaskError::Canceled.as_label(), "task_canceled");
    /// assert_eq!(TaskError::fail("boom").as_label(), "task_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Canceled => "task_canceled",
            TaskError::Panicked { .. } => "task_panicked",
            TaskError::Protocol { .. } => "task_protocol",
        }
    }

    /// Returns `true` for the cancellation signal.
    pub fn is_canceled(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }
}

/// Turns a panic payload into a readable message.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(LoopError::InvalidMaxFps(0.5).as_label(), "loop_invalid_max_fps");
        assert_eq!(
            LoopError::GroupInUse { live: 2 }.as_label(),
            "loop_group_in_use"
        );
        assert_eq!(
            TaskError::Panicked { info: "x".into() }.as_label(),
            "task_panicked"
        );
    }

    #[test]
    fn max_fps_message_points_to_fastest() {
        let msg = LoopError::InvalidMaxFps(-1.0).to_string();
        assert!(msg.contains("fastest"), "{msg}");
    }

    #[test]
    fn panic_payloads_are_decoded() {
        let s: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_message(s.as_ref()), "static");
        let s: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(s.as_ref()), "owned");
        let s: Box<dyn std::any::Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(s.as_ref()), "unknown panic");
    }
}
