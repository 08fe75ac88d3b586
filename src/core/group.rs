//! # Canvas groups: weak registries of surfaces bound to one loop.
//!
//! A [`CanvasGroup`] gathers surfaces that share a backend and therefore an
//! [`EventLoop`]. It never keeps a surface alive:
//!
//! ```text
//!  CanvasGroup ──strong──► EventLoop
//!       ▲                      │
//!       └─────────weak─────────┘        (housekeeping sweeps groups)
//!  CanvasGroup ──weak──► Surface ──strong──► DrawScheduler ──weak──► Surface
//! ```
//!
//! ## Rules
//! - A closed surface is finalized (`notify_closed`) exactly once, by the first
//!   sweep that sees it, and then forgotten.
//! - A dropped surface is forgotten silently.
//! - The loop can only be swapped while no surface is alive.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};

use tracing::debug;

use super::lifecycle::EventLoop;
use crate::error::{LoopError, TaskError};
use crate::events::{Event, EventKind};
use crate::executor::TaskHandle;
use crate::surface::Surface;

struct Entry {
    key: u64,
    surface: Weak<dyn Surface>,
    closed_by_loop: bool,
}

pub(crate) struct GroupInner {
    event_loop: RefCell<Option<EventLoop>>,
    entries: RefCell<Vec<Entry>>,
    next_key: Cell<u64>,
}

/// Weak registry of surfaces that share an event loop.
///
/// Cheap to clone; clones share the registry.
#[derive(Clone)]
pub struct CanvasGroup {
    inner: Rc<GroupInner>,
}

impl CanvasGroup {
    /// Creates a group bound to `event_loop` (`None` for offscreen groups).
    pub fn new(event_loop: Option<EventLoop>) -> Self {
        Self {
            inner: Rc::new(GroupInner {
                event_loop: RefCell::new(event_loop),
                entries: RefCell::new(Vec::new()),
                next_key: Cell::new(0),
            }),
        }
    }

    /// The loop this group is bound to.
    pub fn get_loop(&self) -> Option<EventLoop> {
        self.inner.event_loop.borrow().clone()
    }

    /// Binds the group to another loop (or to none).
    ///
    /// Fails with [`LoopError::GroupInUse`] while any surface is alive.
    pub fn select_loop(&self, event_loop: Option<EventLoop>) -> Result<(), LoopError> {
        let live = self.inner.get_surfaces(false).len();
        if live > 0 {
            return Err(LoopError::GroupInUse { live });
        }
        let old = self.inner.event_loop.replace(event_loop);
        if let Some(old) = old {
            old.unregister_group(&self.inner);
        }
        Ok(())
    }

    /// Registers a surface and schedules its draw task on the group's loop.
    ///
    /// Binding the group into its loop starts the loop's housekeeping. Without a
    /// loop the surface is still tracked but `draw_task` is dropped and `None`
    /// is returned.
    pub fn register(
        &self,
        surface: Weak<dyn Surface>,
        draw_task: impl Future<Output = Result<(), TaskError>> + 'static,
    ) -> Option<TaskHandle> {
        let name = surface
            .upgrade()
            .map(|s| s.name().to_string())
            .unwrap_or_else(|| "surface".to_string());

        let key = self.inner.next_key.get();
        self.inner.next_key.set(key + 1);
        self.inner.entries.borrow_mut().push(Entry {
            key,
            surface,
            closed_by_loop: false,
        });
        debug!(surface = %name, "surface registered");

        let event_loop = self.get_loop()?;
        event_loop.register_group(&self.inner);
        event_loop
            .bus()
            .publish(Event::new(EventKind::SurfaceRegistered).with_name(name.as_str()));
        let task_name: Cow<'static, str> = format!("{name} draw").into();
        Some(event_loop.add_task(task_name, draw_task))
    }

    /// Returns live surfaces.
    ///
    /// With `sweep_closed`, closed surfaces are finalized and forgotten.
    pub fn get_surfaces(&self, sweep_closed: bool) -> Vec<Rc<dyn Surface>> {
        self.inner.get_surfaces(sweep_closed)
    }
}

impl GroupInner {
    pub(crate) fn get_surfaces(&self, sweep_closed: bool) -> Vec<Rc<dyn Surface>> {
        // Upgrade first, then release the borrow: surface hooks may re-enter.
        let snapshot: Vec<(u64, Option<Rc<dyn Surface>>)> = self
            .entries
            .borrow()
            .iter()
            .map(|e| (e.key, e.surface.upgrade()))
            .collect();

        let mut live = Vec::new();
        let mut forget = Vec::new();
        let mut finalize = Vec::new();
        for (key, surface) in snapshot {
            match surface {
                None => forget.push(key),
                Some(s) if s.is_closed() => {
                    if sweep_closed {
                        forget.push(key);
                        finalize.push(s);
                    }
                }
                Some(s) => live.push(s),
            }
        }
        if !forget.is_empty() {
            self.entries
                .borrow_mut()
                .retain(|e| !forget.contains(&e.key));
        }

        let event_loop = self.event_loop.borrow().clone();
        for surface in finalize {
            debug!(surface = surface.name(), "surface closed");
            surface.notify_closed();
            if let Some(lp) = &event_loop {
                lp.bus()
                    .publish(Event::new(EventKind::SurfaceClosed).with_name(surface.name()));
            }
        }
        live
    }

    /// Asks every live surface not yet asked by the loop to close.
    pub(crate) fn close_live(&self) {
        let to_close: Vec<Rc<dyn Surface>> = self
            .entries
            .borrow_mut()
            .iter_mut()
            .filter(|e| !e.closed_by_loop)
            .filter_map(|e| {
                let surface = e.surface.upgrade().filter(|s| !s.is_closed())?;
                e.closed_by_loop = true;
                Some(surface)
            })
            .collect();
        for surface in to_close {
            debug!(surface = surface.name(), "closing surface");
            surface.close();
        }
    }
}

impl fmt::Debug for CanvasGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanvasGroup")
            .field("entries", &self.inner.entries.borrow().len())
            .field("bound", &self.inner.event_loop.borrow().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[derive(Default)]
    struct Dummy {
        closed: Cell<bool>,
        notified: Cell<u32>,
    }

    #[async_trait(?Send)]
    impl Surface for Dummy {
        async fn process_events(&self) {}
        fn request_draw(&self) {}
        fn is_closed(&self) -> bool {
            self.closed.get()
        }
        fn close(&self) {
            self.closed.set(true);
        }
        fn notify_closed(&self) {
            self.notified.set(self.notified.get() + 1);
        }
    }

    #[test]
    fn offscreen_group_drops_the_draw_task() {
        let group = CanvasGroup::new(None);
        let surface = Rc::new(Dummy::default());
        let handle = group.register(Rc::downgrade(&surface) as Weak<dyn Surface>, async { Ok(()) });
        assert!(handle.is_none());
        assert_eq!(group.get_surfaces(false).len(), 1);
    }

    #[test]
    fn double_close_finalizes_once() {
        let group = CanvasGroup::new(None);
        let surface = Rc::new(Dummy::default());
        group.register(Rc::downgrade(&surface) as Weak<dyn Surface>, async { Ok(()) });

        surface.close();
        surface.close();
        assert!(group.get_surfaces(false).is_empty());
        assert_eq!(surface.notified.get(), 0);

        assert!(group.get_surfaces(true).is_empty());
        assert!(group.get_surfaces(true).is_empty());
        assert_eq!(surface.notified.get(), 1);
    }

    #[test]
    fn dropped_surfaces_are_forgotten() {
        let group = CanvasGroup::new(None);
        let surface = Rc::new(Dummy::default());
        group.register(Rc::downgrade(&surface) as Weak<dyn Surface>, async { Ok(()) });
        drop(surface);
        assert!(group.get_surfaces(true).is_empty());
        assert!(group.inner.entries.borrow().is_empty());
    }

    #[test]
    fn select_loop_refuses_while_surfaces_live() {
        let group = CanvasGroup::new(None);
        let surface = Rc::new(Dummy::default());
        group.register(Rc::downgrade(&surface) as Weak<dyn Surface>, async { Ok(()) });
        assert!(matches!(
            group.select_loop(None),
            Err(LoopError::GroupInUse { live: 1 })
        ));
        surface.close();
        assert!(group.select_loop(None).is_ok());
    }

    #[test]
    fn close_live_asks_each_surface_once() {
        let group = CanvasGroup::new(None);
        let surface = Rc::new(Dummy::default());
        group.register(Rc::downgrade(&surface) as Weak<dyn Surface>, async { Ok(()) });
        group.inner.close_live();
        assert!(surface.is_closed());
        surface.closed.set(false);
        group.inner.close_live();
        assert!(!surface.is_closed());
    }
}
