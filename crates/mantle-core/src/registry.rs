// SPDX-License-Identifier: Apache-2.0
//! Patch bookkeeping: which patches exist for which owner.
//!
//! Every [`Patch`] registers itself here at construction and stays until
//! [`Patch::release`]. The registry is what the bulk operations and the
//! aggregation views enumerate. Per-owner order is registration order; the
//! flattened views lean on it for their later-registered-wins rule.
//!
//! A thread-local default registry backs the convenience associated
//! functions on [`Patch`]; tests and embedders that need isolation construct
//! their own.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::object::{Object, ObjectId};
use crate::patch::Patch;
use crate::views::ScopedViews;

struct RegistryInner {
    by_owner: RefCell<FxHashMap<ObjectId, Vec<Patch>>>,
    global_owner: Object,
}

/// A collection of live patches, grouped by owner identity.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct PatchRegistry {
    inner: Rc<RegistryInner>,
}

impl PatchRegistry {
    /// Creates an empty registry with a fresh global owner.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RegistryInner {
                by_owner: RefCell::new(FxHashMap::default()),
                global_owner: Object::new(),
            }),
        }
    }

    /// The owner the no-argument views target, the registry's stand-in for
    /// an ambient global object.
    #[must_use]
    pub fn global_owner(&self) -> Object {
        self.inner.global_owner.clone()
    }

    /// Every registered patch for `owner`, in registration order.
    #[must_use]
    pub fn patches_for(&self, owner: &Object) -> Vec<Patch> {
        self.inner
            .by_owner
            .borrow()
            .get(&owner.id())
            .cloned()
            .unwrap_or_default()
    }

    /// Number of registered patches across all owners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.by_owner.borrow().values().map(Vec::len).sum()
    }

    /// True when no patch is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Applies every patch registered for `owner`.
    pub fn enable_for(&self, owner: &Object) {
        for patch in self.patches_for(owner) {
            let _report = patch.apply();
        }
    }

    /// Reverts every patch registered for `owner`.
    pub fn disable_for(&self, owner: &Object) {
        for patch in self.patches_for(owner) {
            let _report = patch.revert();
        }
    }

    /// Applies every registered patch, across all owners.
    pub fn enable_all(&self) {
        for patch in self.all_patches() {
            let _report = patch.apply();
        }
    }

    /// Reverts every registered patch, across all owners.
    pub fn disable_all(&self) {
        for patch in self.all_patches() {
            let _report = patch.revert();
        }
    }

    /// Aggregation views over the patches registered for `owner`.
    #[must_use]
    pub fn scoped_to(&self, owner: &Object) -> ScopedViews {
        ScopedViews::new(self.clone(), owner.clone())
    }

    /// Aggregation views over the patches registered for the global owner.
    #[must_use]
    pub fn global_views(&self) -> ScopedViews {
        self.scoped_to(&self.global_owner())
    }

    pub(crate) fn register(&self, patch: &Patch) {
        debug!(patch = %patch.display_name(), owner = %patch.owner().id(), "registering patch");
        self.inner
            .by_owner
            .borrow_mut()
            .entry(patch.owner().id())
            .or_default()
            .push(patch.clone());
    }

    pub(crate) fn unregister(&self, patch: &Patch) {
        let mut by_owner = self.inner.by_owner.borrow_mut();
        if let Some(patches) = by_owner.get_mut(&patch.owner().id()) {
            patches.retain(|registered| !registered.ptr_eq(patch));
            if patches.is_empty() {
                by_owner.remove(&patch.owner().id());
            }
        }
    }

    pub(crate) fn downgrade(&self) -> WeakPatchRegistry {
        WeakPatchRegistry {
            inner: Rc::downgrade(&self.inner),
        }
    }

    fn all_patches(&self) -> Vec<Patch> {
        self.inner
            .by_owner
            .borrow()
            .values()
            .flat_map(|patches| patches.iter().cloned())
            .collect()
    }
}

impl Default for PatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-owning handle a [`Patch`] keeps back to its registry, so patches do
/// not keep a dropped registry alive.
pub(crate) struct WeakPatchRegistry {
    inner: Weak<RegistryInner>,
}

impl WeakPatchRegistry {
    pub(crate) fn upgrade(&self) -> Option<PatchRegistry> {
        self.inner.upgrade().map(|inner| PatchRegistry { inner })
    }
}

/// The thread's default registry.
#[must_use]
pub fn default_registry() -> PatchRegistry {
    thread_local! {
        static DEFAULT: PatchRegistry = PatchRegistry::new();
    }
    DEFAULT.with(Clone::clone)
}
