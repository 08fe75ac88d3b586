//! Runtime core: loop lifecycle, hosts and canvas groups.
//!
//! The public API from this module is [`EventLoop`] (with [`LoopBuilder`]),
//! [`CanvasGroup`], [`LoopState`] and the [`Host`] seam with its two bundled
//! drivers.
//!
//! Internal modules:
//! - [`lifecycle`]: the loop state machine, stop/teardown, run entry points;
//! - [`housekeeping`]: periodic task sweeping groups and consuming interrupts;
//! - [`group`]: weak surface registries bound to a loop;
//! - [`host`]: the driver seam, native and tokio implementations;
//! - [`shutdown`]: cross-platform signal handling for `run()`;
//! - [`builder`]: loop construction.

mod builder;
mod group;
mod host;
mod housekeeping;
mod lifecycle;
mod shutdown;
mod state;

pub use builder::{HostKind, LoopBuilder};
pub use group::CanvasGroup;
pub use host::{Capabilities, Host, LoopRemote, NativeHost, TokioHost};
pub use lifecycle::EventLoop;
pub use shutdown::wait_for_shutdown_signal;
pub use state::LoopState;
