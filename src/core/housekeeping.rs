//! Housekeeping task.
//!
//! Scheduled once per loop initialization. It holds only a weak reference to
//! the loop, so a dropped loop ends it at the next wake-up.

use std::rc::Weak;
use std::time::Duration;

use tracing::trace;

use super::lifecycle::{EventLoop, LoopInner};
use crate::error::TaskError;
use crate::executor::sleep;

pub(crate) async fn run(event_loop: Weak<LoopInner>, interval: Duration) -> Result<(), TaskError> {
    match event_loop.upgrade() {
        Some(inner) => EventLoop::from_inner(inner).mark_active(),
        None => return Ok(()),
    }
    loop {
        sleep(interval).await?;
        let Some(inner) = event_loop.upgrade() else {
            break;
        };
        if !EventLoop::from_inner(inner).housekeeping_tick() {
            break;
        }
    }
    trace!("housekeeping done");
    Ok(())
}
