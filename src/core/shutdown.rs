//! # Cross-platform interrupt handling.
//!
//! Provides [`wait_for_shutdown_signal`], an async helper that completes when the
//! process receives an interrupt or termination signal, and [`SignalListener`],
//! which intercepts those signals for the duration of a blocking `run()`.
//!
//! ## Signals
//! **Unix platforms:**
//! - `SIGINT` (Ctrl-C in terminal)
//! - `SIGTERM` (default kill signal)
//!
//! **Other platforms:**
//! - `Ctrl-C` via [`tokio::signal::ctrl_c`]
//!
//! The listener does not act on the loop itself: it only bumps a shared counter
//! that the loop's housekeeping task consumes on its own thread.
//!
//! ## Unix
//! ```text
//!  install()  ──► first listener: sigaction(SIGINT|SIGTERM, on_signal), keep previous
//!  on_signal  ──► RECEIVED += 1                      (async-signal-safe)
//!  pump()     ──► counter += RECEIVED - seen          (housekeeping, loop thread)
//!  drop()     ──► last listener: sigaction(previous)
//! ```
//!
//! Unlike tokio's signal streams, the handlers are uninstalled again: once
//! `run()` returns, Ctrl-C behaves as it did before.

/// Waits for an interrupt or termination signal.
///
/// Each call creates independent signal listeners. tokio keeps them registered
/// for the rest of the process.
///
/// Returns `Ok(())` when any signal is received, or `Err` if signal registration fails.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
    }
    Ok(())
}

/// Waits for an interrupt signal.
///
/// Each call creates independent signal listeners.
///
/// Returns `Ok(())` when any signal is received, or `Err` if signal registration fails.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[cfg(unix)]
pub(crate) use self::unix::SignalListener;

#[cfg(not(unix))]
pub(crate) use self::fallback::SignalListener;

#[cfg(unix)]
mod unix {
    use std::cell::Cell;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex, PoisonError};

    use nix::libc::c_int;
    use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
    use tracing::{debug, warn};

    const INTERCEPTED: [Signal; 2] = [Signal::SIGINT, Signal::SIGTERM];

    /// Signals received since the process started.
    static RECEIVED: AtomicU32 = AtomicU32::new(0);

    struct Installed {
        users: usize,
        previous: Vec<(Signal, SigAction)>,
    }

    /// Shared by every listener in the process; the first one installs, the
    /// last one restores.
    static INSTALLED: Mutex<Option<Installed>> = Mutex::new(None);

    extern "C" fn on_signal(_: c_int) {
        RECEIVED.fetch_add(1, Ordering::SeqCst);
    }

    /// Intercepts SIGINT/SIGTERM until dropped.
    pub(crate) struct SignalListener {
        counter: Arc<AtomicU32>,
        seen: Cell<u32>,
    }

    impl SignalListener {
        /// Installs the handlers; [`pump`](Self::pump) moves received signals
        /// into `counter`.
        ///
        /// Returns `None` (after logging) if the handlers cannot be installed.
        pub(crate) fn install(counter: Arc<AtomicU32>) -> Option<Self> {
            let mut installed = INSTALLED.lock().unwrap_or_else(PoisonError::into_inner);
            match installed.as_mut() {
                Some(shared) => shared.users += 1,
                None => {
                    let previous = install_handlers()?;
                    *installed = Some(Installed { users: 1, previous });
                    debug!("signal handlers installed");
                }
            }
            Some(Self {
                counter,
                seen: Cell::new(RECEIVED.load(Ordering::SeqCst)),
            })
        }

        /// Adds the signals received since the last pump to the counter.
        pub(crate) fn pump(&self) {
            let total = RECEIVED.load(Ordering::SeqCst);
            let fresh = total.wrapping_sub(self.seen.replace(total));
            if fresh > 0 {
                self.counter.fetch_add(fresh, Ordering::SeqCst);
            }
        }
    }

    fn install_handlers() -> Option<Vec<(Signal, SigAction)>> {
        let ours = SigAction::new(
            SigHandler::Handler(on_signal),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );
        let mut previous = Vec::with_capacity(INTERCEPTED.len());
        for signal in INTERCEPTED {
            // SAFETY: `on_signal` only touches an atomic.
            match unsafe { sigaction(signal, &ours) } {
                Ok(prev) => previous.push((signal, prev)),
                Err(err) => {
                    warn!(%signal, error = %err, "cannot install signal handler");
                    restore(&previous);
                    return None;
                }
            }
        }
        Some(previous)
    }

    fn restore(previous: &[(Signal, SigAction)]) {
        for (signal, action) in previous {
            // SAFETY: reinstates the disposition that was active before ours.
            if let Err(err) = unsafe { sigaction(*signal, action) } {
                warn!(%signal, error = %err, "cannot restore signal handler");
            }
        }
    }

    impl Drop for SignalListener {
        fn drop(&mut self) {
            let mut installed = INSTALLED.lock().unwrap_or_else(PoisonError::into_inner);
            let last = match installed.as_mut() {
                Some(shared) => {
                    shared.users = shared.users.saturating_sub(1);
                    shared.users == 0
                }
                None => false,
            };
            if last {
                if let Some(shared) = installed.take() {
                    restore(&shared.previous);
                    debug!("signal handlers restored");
                }
            }
        }
    }

}

#[cfg(not(unix))]
mod fallback {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread::JoinHandle;

    use tokio_util::sync::CancellationToken;
    use tracing::{debug, warn};

    use super::wait_for_shutdown_signal;

    /// Counts Ctrl-C presses on a helper thread until dropped.
    pub(crate) struct SignalListener {
        token: CancellationToken,
        thread: Option<JoinHandle<()>>,
    }

    impl SignalListener {
        /// Starts listening; every signal increments `counter`.
        ///
        /// Returns `None` (after logging) if the helper thread cannot be started.
        pub(crate) fn install(counter: Arc<AtomicU32>) -> Option<Self> {
            let token = CancellationToken::new();
            let child = token.clone();
            let spawned = std::thread::Builder::new()
                .name("renderloop-signals".into())
                .spawn(move || listen(counter, child));
            match spawned {
                Ok(thread) => Some(Self {
                    token,
                    thread: Some(thread),
                }),
                Err(err) => {
                    warn!(error = %err, "cannot start signal listener");
                    None
                }
            }
        }

        /// Signals land in the counter directly.
        pub(crate) fn pump(&self) {}
    }

    fn listen(counter: Arc<AtomicU32>, token: CancellationToken) {
        let rt = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(err) => {
                warn!(error = %err, "cannot build signal runtime");
                return;
            }
        };
        rt.block_on(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    res = wait_for_shutdown_signal() => match res {
                        Ok(()) => {
                            counter.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(err) => {
                            warn!(error = %err, "signal registration failed");
                            break;
                        }
                    },
                }
            }
        });
    }

    impl Drop for SignalListener {
        fn drop(&mut self) {
            self.token.cancel();
            if let Some(thread) = self.thread.take() {
                let _ = thread.join();
            }
            debug!("signal listener removed");
        }
    }
}
