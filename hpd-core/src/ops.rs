//! Capability contract implemented by display interface drivers.
//!
//! Some of the work done on a hotplug event is platform or interface
//! specific: sampling the line, talking DDC, powering the pipeline down. The
//! state machine reaches that work exclusively through [`HpdOps`]. Every
//! mandatory operation is a required trait method, so a provider missing one
//! does not compile. The two hooks that are genuinely optional live in
//! [`HpdHooks`] as `Option` fields.
//!
//! The controller never calls into a provider concurrently: at most one
//! capability call is outstanding per controller instance.

use crate::state::{HpdLevel, RecheckOutcome};

/// Interface-specific operations the hotplug state machine calls out to.
pub trait HpdOps {
    /// Returns the current HPD level. Must not have side effects.
    fn hpd_level(&mut self) -> HpdLevel;

    /// Disables the display output. Called repeatedly; must be idempotent.
    fn disable(&mut self);

    /// Performs one EDID read attempt, returning `true` on success.
    fn edid_read(&mut self) -> bool;

    /// A fresh EDID is available; enable the pipeline and notify listeners.
    fn edid_ready(&mut self);

    /// Re-reads the EDID after HPD re-asserted and compares it with the
    /// identity captured by the last successful [`HpdOps::edid_read`].
    fn edid_recheck(&mut self) -> RecheckOutcome;
}

impl<T: HpdOps + ?Sized> HpdOps for &mut T {
    fn hpd_level(&mut self) -> HpdLevel {
        (**self).hpd_level()
    }

    fn disable(&mut self) {
        (**self).disable();
    }

    fn edid_read(&mut self) -> bool {
        (**self).edid_read()
    }

    fn edid_ready(&mut self) {
        (**self).edid_ready();
    }

    fn edid_recheck(&mut self) -> RecheckOutcome {
        (**self).edid_recheck()
    }
}

/// Optional lifecycle hooks invoked around the controller's lifetime.
pub struct HpdHooks<O> {
    /// Invoked once, synchronously, while the controller is constructed.
    pub init: Option<fn(&mut O)>,
    /// Invoked once, synchronously, after shutdown has drained the worker.
    pub release: Option<fn(&mut O)>,
}

impl<O> HpdHooks<O> {
    /// Hooks that do nothing.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            init: None,
            release: None,
        }
    }

    /// Sets the initialization hook.
    #[must_use]
    pub const fn with_init(mut self, init: fn(&mut O)) -> Self {
        self.init = Some(init);
        self
    }

    /// Sets the release hook.
    #[must_use]
    pub const fn with_release(mut self, release: fn(&mut O)) -> Self {
        self.release = Some(release);
        self
    }

    pub(crate) fn run_init(&self, ops: &mut O) {
        if let Some(init) = self.init {
            init(ops);
        }
    }

    pub(crate) fn run_release(&self, ops: &mut O) {
        if let Some(release) = self.release {
            release(ops);
        }
    }
}

impl<O> Default for HpdHooks<O> {
    fn default() -> Self {
        Self::none()
    }
}

impl<O> Clone for HpdHooks<O> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<O> Copy for HpdHooks<O> {}

impl<O> core::fmt::Debug for HpdHooks<O> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HpdHooks")
            .field("init", &self.init.is_some())
            .field("release", &self.release.is_some())
            .finish()
    }
}
