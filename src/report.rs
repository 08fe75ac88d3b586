//! # Deduplicating error reporter.
//!
//! Errors raised by user code (handlers, draw functions, scheduled callbacks) are
//! caught at the task boundary and reported here. A draw function that fails every
//! frame would otherwise flood the log, so identical reports are collapsed:
//!
//! ```text
//! ERROR renderloop: Error in draw task: execution failed: index out of range
//! ERROR renderloop: Error in draw task: execution failed: index out of range (recurred 2)
//! ERROR renderloop: Error in draw task: execution failed: index out of range (recurred 3)
//! ```
//!
//! Counters are per thread, which matches the one-loop-per-thread model.

use std::cell::RefCell;
use std::collections::HashMap;

thread_local! {
    static SEEN: RefCell<HashMap<(String, String), u32>> = RefCell::new(HashMap::new());
}

/// Logs an error, collapsing repeats of the same `(context, message)` pair.
///
/// Returns how many times this pair has been reported so far (1 on first sight).
pub fn report_error(context: &str, message: &str) -> u32 {
    let count = SEEN.with(|seen| {
        let mut seen = seen.borrow_mut();
        let n = seen
            .entry((context.to_string(), message.to_string()))
            .or_insert(0);
        *n += 1;
        *n
    });

    if count == 1 {
        tracing::error!(target: "renderloop", "{context} {message}");
    } else {
        tracing::error!(target: "renderloop", "{context} {message} (recurred {count})");
    }
    count
}

/// Forgets all collapsed reports on this thread.
pub fn reset_reports() {
    SEEN.with(|seen| seen.borrow_mut().clear());
}
