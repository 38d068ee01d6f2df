// SPDX-License-Identifier: Apache-2.0
//! Scoped enable/disable wrappers around a [`Patch`].
//!
//! A toggle applies its patch for the duration of a scope and puts the owner
//! back afterwards, without disturbing a patch the caller had already
//! applied: `start` records whether application was needed, and `stop` only
//! reverts when it was. [`ToggleGuard`] carries the stop in its `Drop` impl,
//! so an unwinding closure still restores the owner.

use tracing::debug;

use crate::patch::Patch;

/// A start/stop wrapper for one patch.
///
/// `started` and `prevent_revert` are captured per toggle; a patch may have
/// several independent toggles.
#[derive(Clone)]
pub struct PatchToggle {
    patch: Patch,
    prevent_revert: bool,
}

impl PatchToggle {
    pub(crate) fn new(patch: Patch, prevent_revert: bool) -> Self {
        Self {
            patch,
            prevent_revert,
        }
    }

    /// The patch this toggle drives.
    #[must_use]
    pub fn patch(&self) -> &Patch {
        &self.patch
    }

    /// True when [`ToggleGuard::drop`] will leave the patch applied.
    #[must_use]
    pub fn preventing_revert(&self) -> bool {
        self.prevent_revert
    }

    /// Applies the patch if it is not already applied and returns a guard
    /// whose drop undoes exactly what this call did.
    ///
    /// Starting an already-applied patch yields a guard that reverts
    /// nothing, so nesting a toggle inside a wider application is safe.
    #[must_use]
    pub fn start(&self) -> ToggleGuard {
        let needs_application = !self.patch.applied();
        if needs_application {
            debug!(patch = %self.patch.display_name(), "toggle applying patch");
            let _report = self.patch.apply();
        }
        ToggleGuard {
            toggle: self.clone(),
            needs_application,
            stopped: false,
        }
    }

    /// Runs `body` with the patch applied, restoring the owner afterwards
    /// even if `body` panics.
    pub fn run<R>(&self, body: impl FnOnce(&Patch) -> R) -> R {
        let guard = self.start();
        let result = body(&self.patch);
        drop(guard);
        result
    }
}

/// Active span of a started toggle. Dropping it stops the toggle.
pub struct ToggleGuard {
    toggle: PatchToggle,
    needs_application: bool,
    stopped: bool,
}

impl ToggleGuard {
    /// Stops the toggle now instead of at drop. Idempotent.
    pub fn stop(mut self) {
        self.stop_inner();
    }

    fn stop_inner(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        if self.needs_application && !self.toggle.prevent_revert {
            debug!(
                patch = %self.toggle.patch.display_name(),
                "toggle reverting patch"
            );
            let _report = self.toggle.patch.revert();
        }
    }
}

impl Drop for ToggleGuard {
    fn drop(&mut self) {
        self.stop_inner();
    }
}
