// SPDX-License-Identifier: Apache-2.0
//! Deferred teardown for a patch that may already have been reverted.

use tracing::debug;

use crate::patch::{Patch, RevertReport};

/// Reverts a patch at teardown time, but only when its overlay is actually
/// still in place.
///
/// The check guards against double teardown: a patch someone else already
/// reverted, or whose keys were externally removed, is left alone. Dropping
/// the cleaner runs the same conditional clean, which makes it usable as a
/// scope guard.
pub struct PatchCleaner {
    patch: Patch,
}

impl PatchCleaner {
    /// A cleaner for `patch`.
    #[must_use]
    pub fn new(patch: &Patch) -> Self {
        Self {
            patch: patch.clone(),
        }
    }

    /// The patch this cleaner watches.
    #[must_use]
    pub fn patch(&self) -> &Patch {
        &self.patch
    }

    /// True when the patch counts as applied and every patched key is still
    /// present on the owner.
    #[must_use]
    pub fn needs_cleanup(&self) -> bool {
        self.patch.applied()
            && self
                .patch
                .entries()
                .iter()
                .all(|(key, _)| self.patch.owner().has(key))
    }

    /// Reverts the patch when [`Self::needs_cleanup`] holds; `None` when no
    /// cleanup was needed.
    pub fn clean(&self) -> Option<RevertReport> {
        if !self.needs_cleanup() {
            return None;
        }
        debug!(patch = %self.patch.display_name(), "cleaner reverting patch");
        self.patch.revert()
    }
}

impl Drop for PatchCleaner {
    fn drop(&mut self) {
        let _report = self.clean();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::object::Object;
    use crate::patch::PatchOptions;
    use crate::registry::PatchRegistry;
    use crate::value::Value;

    fn applied_patch() -> (PatchRegistry, Object, Patch) {
        let registry = PatchRegistry::new();
        let owner = Object::new();
        let spec = Object::new();
        spec.set("x", Value::from(1)).unwrap();
        let patch = Patch::new_in(&registry, &owner, &spec, PatchOptions::new());
        patch.apply();
        (registry, owner, patch)
    }

    #[test]
    fn cleans_a_still_applied_patch() {
        let (_registry, owner, patch) = applied_patch();
        let cleaner = PatchCleaner::new(&patch);
        assert!(cleaner.needs_cleanup());
        let report = cleaner.clean().unwrap();
        assert!(report.is_clean());
        assert!(!cleaner.needs_cleanup());
        assert!(owner.is_empty());
    }

    #[test]
    fn already_reverted_patch_needs_no_cleanup() {
        let (_registry, _owner, patch) = applied_patch();
        patch.revert().unwrap();
        let cleaner = PatchCleaner::new(&patch);
        assert!(!cleaner.needs_cleanup());
        assert!(cleaner.clean().is_none());
    }

    #[test]
    fn externally_stripped_owner_is_left_alone() {
        let (_registry, owner, patch) = applied_patch();
        // Someone else removed the patched key; cleanup would now restore
        // nothing meaningful, so the cleaner stands down.
        assert!(owner.delete(&"x".into()));
        let cleaner = PatchCleaner::new(&patch);
        assert!(!cleaner.needs_cleanup());
        assert!(cleaner.clean().is_none());
    }

    #[test]
    fn drop_cleans_conditionally() {
        let (_registry, owner, patch) = applied_patch();
        {
            let _cleaner = PatchCleaner::new(&patch);
        }
        assert!(!owner.has(&"x".into()));
        assert!(!patch.applied());
    }
}
