// SPDX-License-Identifier: Apache-2.0
//! Flattened aggregation surfaces over an owner's registered patches.
//!
//! Each view walks the owner's patches in registration order and projects
//! entries onto a fresh object, so a key present in several patches resolves
//! to the later-registered one. Accessor entries are rebound to their
//! original spec object before projection; reading them through a surface
//! behaves exactly as reading them through a patched owner would.
//!
//! Surfaces are snapshots of the entry set at call time, not live proxies.
//! Values still flow through the entries' closures, so a getter read twice
//! may legitimately differ.

use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::debug;

use crate::descriptor::{Descriptor, GetterFn};
use crate::entry::PatchEntry;
use crate::key::PropertyKey;
use crate::object::Object;
use crate::patch::Patch;
use crate::registry::PatchRegistry;
use crate::value::Value;

/// Aggregation views over the patches one registry holds for one owner.
#[derive(Clone)]
pub struct ScopedViews {
    registry: PatchRegistry,
    owner: Object,
}

impl ScopedViews {
    pub(crate) fn new(registry: PatchRegistry, owner: Object) -> Self {
        Self { registry, owner }
    }

    /// The owner these views aggregate over.
    #[must_use]
    pub fn owner(&self) -> &Object {
        &self.owner
    }

    /// Entries currently live on the owner, flattened onto one surface.
    ///
    /// Only entries whose own state is applied are projected; a patch that
    /// is partially applied contributes exactly its live keys.
    #[must_use]
    pub fn applied(&self) -> Object {
        self.project_entries(|patch, key| patch.entry_state(key) == Some(true))
    }

    /// Every registered entry, applied or not, flattened onto one surface.
    #[must_use]
    pub fn known(&self) -> Object {
        self.project_entries(|_, _| true)
    }

    /// Resolves the winning entry per key first (later registration
    /// overwrites earlier), then projects the winners onto a fresh surface.
    /// Projecting as-you-walk would let an earlier non-configurable entry
    /// block a later patch's same-key define and steal the tie.
    fn project_entries(&self, keep: impl Fn(&Patch, &PropertyKey) -> bool) -> Object {
        let mut winners: BTreeMap<PropertyKey, Rc<PatchEntry>> = BTreeMap::new();
        for patch in self.registry.patches_for(&self.owner) {
            for (key, entry) in patch.entries() {
                if keep(&patch, &key) {
                    winners.insert(key, entry);
                }
            }
        }
        let surface = Object::new();
        for (key, entry) in winners {
            project(&surface, &key, |s| entry.apply_to(s, true));
        }
        surface
    }

    /// A surface of accessors that apply their owning patch on first read.
    ///
    /// Reading a key applies the whole owning patch (if not yet applied) and
    /// then resolves the key through the owner, so one read can make a whole
    /// patch live.
    #[must_use]
    pub fn lazy(&self) -> Object {
        let surface = Object::new();
        for patch in self.registry.patches_for(&self.owner) {
            for (key, _entry) in patch.entries() {
                let get = lazy_getter(&patch, &key);
                project(&surface, &key, |s| {
                    s.define_property(key.clone(), Descriptor::accessor(Some(get), None))
                });
            }
        }
        surface
    }

    /// One [`UseHandle`] per registered key, later-registered patches
    /// winning key ties.
    #[must_use]
    pub fn use_view(&self) -> BTreeMap<PropertyKey, UseHandle> {
        let mut handles = BTreeMap::new();
        for patch in self.registry.patches_for(&self.owner) {
            for (key, entry) in patch.entries() {
                handles.insert(
                    key,
                    UseHandle {
                        patch: patch.clone(),
                        entry,
                    },
                );
            }
        }
        handles
    }
}

/// Scoped application of one entry's owning patch.
#[derive(Clone)]
pub struct UseHandle {
    patch: Patch,
    entry: Rc<PatchEntry>,
}

impl UseHandle {
    /// The entry this handle exposes.
    #[must_use]
    pub fn entry(&self) -> &PatchEntry {
        &self.entry
    }

    /// Applies the owning patch (if not already applied), runs `body` with
    /// the entry's computed value, then reverts whatever this call applied.
    ///
    /// Restoration happens in a guard drop, so a panicking `body` still
    /// leaves the owner as it was found. A patch the caller had applied
    /// beforehand stays applied.
    pub fn with<R>(&self, body: impl FnOnce(Option<Value>, &PatchEntry) -> R) -> R {
        let guard = self.patch.create_toggle(false).start();
        let result = body(self.entry.computed(), &self.entry);
        drop(guard);
        result
    }
}

fn lazy_getter(patch: &Patch, key: &PropertyKey) -> GetterFn {
    let patch = patch.clone();
    let owner = patch.owner().clone();
    let key = key.clone();
    Rc::new(move |_this: &Object| {
        if patch.entry_state(&key) != Some(true) {
            debug!(patch = %patch.display_name(), key = %key, "lazy read applying patch");
            let _report = patch.apply();
        }
        owner.get(&key).unwrap_or(Value::Null)
    })
}

fn project<E: std::fmt::Display>(
    surface: &Object,
    key: &PropertyKey,
    define: impl FnOnce(&Object) -> Result<(), E>,
) {
    // Earlier projections may have pinned the key non-configurable; views
    // are best-effort, so losers of the collision are logged and skipped.
    if let Err(cause) = define(surface) {
        debug!(key = %key, error = %cause, "view skipped colliding entry");
    }
}
