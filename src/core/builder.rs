use tracing::debug;

use super::host::{Host, NativeHost, TokioHost};
use super::lifecycle::EventLoop;
use crate::config::LoopConfig;

/// Which host driver a [`LoopBuilder`] should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostKind {
    /// Tokio if a runtime is current on the building thread, otherwise native.
    #[default]
    Auto,
    /// Built-in executor.
    Native,
    /// Tokio current-thread runtime.
    Tokio,
}

/// Builder for constructing an [`EventLoop`] with optional features.
pub struct LoopBuilder {
    cfg: LoopConfig,
    kind: HostKind,
    custom: Option<Box<dyn Host>>,
}

impl LoopBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: LoopConfig) -> Self {
        Self {
            cfg,
            kind: HostKind::Auto,
            custom: None,
        }
    }

    /// Selects one of the bundled host drivers.
    pub fn with_host(mut self, kind: HostKind) -> Self {
        self.kind = kind;
        self
    }

    /// Uses a caller-provided host; overrides [`with_host`](Self::with_host).
    pub fn with_custom_host(mut self, host: impl Host + 'static) -> Self {
        self.custom = Some(Box::new(host));
        self
    }

    /// Disables signal interception inside `run()`.
    pub fn without_signals(mut self) -> Self {
        self.cfg.handle_signals = false;
        self
    }

    /// Builds the loop. The loop starts `Off`; nothing is scheduled yet.
    pub fn build(self) -> EventLoop {
        let host: Box<dyn Host> = match (self.custom, self.kind) {
            (Some(host), _) => host,
            (None, HostKind::Native) => Box::new(NativeHost::new()),
            (None, HostKind::Tokio) => Box::new(TokioHost::new()),
            (None, HostKind::Auto) => {
                if tokio::runtime::Handle::try_current().is_ok() {
                    Box::new(TokioHost::new())
                } else {
                    Box::new(NativeHost::new())
                }
            }
        };
        debug!(host = host.name(), "loop built");
        EventLoop::from_boxed(self.cfg, host)
    }
}
