// SPDX-License-Identifier: Apache-2.0
//! The patch orchestrator: conflict capture, apply/revert, per-entry state.
//!
//! A [`Patch`] builds one [`PatchEntry`] per own key of a spec object,
//! capturing any pre-existing owner descriptor for the same key as a
//! *conflict* entry so a later revert restores the owner exactly. Apply and
//! revert never abort on a failing entry: every per-entry failure is
//! recorded in the returned report and the loop keeps going. Whether a write
//! actually took is decided by reading the descriptor back and comparing it
//! field by field — the engine's substitute for exclusion (there is none).
//!
//! Per-entry state machine: Unapplied → (admitted, write verified) →
//! Applied → (delete succeeds) → Unapplied. A failed delete records an error
//! without forcing the state flip. Patch-level `applied` is always derived
//! from the counters, never stored independently.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::error;

use crate::descriptor::DescriptorTemplate;
use crate::entry::{ConditionFn, EntryError, PatchEntry};
use crate::key::PropertyKey;
use crate::object::{Object, ObjectError};
use crate::registry::{default_registry, PatchRegistry, WeakPatchRegistry};
use crate::toggle::PatchToggle;
use crate::value::Value;
use crate::views::ScopedViews;

/// Errors recorded per entry during apply/revert.
#[derive(Debug, Error)]
pub enum PatchError {
    /// The written descriptor did not read back equal to the requested one.
    #[error("could not apply patch for key `{0}`")]
    ApplyFailed(PropertyKey),
    /// Deleting a patched key failed (it became non-configurable).
    #[error("failed to revert patch `{0}`")]
    RevertFailed(PropertyKey),
    /// A captured conflict could not be re-established verbatim.
    #[error("failed to restore original `{0}`")]
    RestoreFailed(PropertyKey),
    /// The underlying define was rejected outright.
    #[error(transparent)]
    Object(#[from] ObjectError),
}

/// Outcome summary of [`Patch::apply`].
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// Entries this patch tracks.
    pub patches: usize,
    /// Entries verified as live on the owner by this call.
    pub applied: usize,
    /// Per-entry failures, in entry order.
    pub errors: Vec<(Rc<PatchEntry>, PatchError)>,
    /// Entries not applied (gated off or failed).
    pub not_applied: usize,
}

impl ApplyReport {
    /// True when every tracked entry went live.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.applied == self.patches && self.errors.is_empty() && self.not_applied == 0
    }
}

/// Outcome summary of [`Patch::revert`].
#[derive(Debug, Default)]
pub struct RevertReport {
    /// Entries this patch tracks.
    pub patches: usize,
    /// Patched keys removed from the owner.
    pub reverted: usize,
    /// Captured conflicts re-established and verified.
    pub restored: usize,
    /// Conflicts this patch captured at construction.
    pub conflicts: usize,
    /// Per-entry failures, in entry order.
    pub errors: Vec<(Rc<PatchEntry>, PatchError)>,
    /// Entries still counted as applied after the pass; non-zero means
    /// something interfered.
    pub still_applied: usize,
}

impl RevertReport {
    /// True when the owner was restored exactly; any deviation signals
    /// concurrent external mutation of the owner.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.reverted == self.patches
            && self.restored == self.conflicts
            && self.errors.is_empty()
            && self.still_applied == 0
    }
}

/// Options accepted by [`Patch::new`].
#[derive(Clone, Default)]
pub struct PatchOptions {
    condition: Option<ConditionFn>,
    conditions: FxHashMap<PropertyKey, ConditionFn>,
    display_name: Option<Rc<str>>,
}

impl PatchOptions {
    /// No conditions, no display name.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Patch-wide admission condition, used for every key without a
    /// per-key override.
    #[must_use]
    pub fn condition(mut self, f: impl Fn() -> bool + 'static) -> Self {
        self.condition = Some(Rc::new(f));
        self
    }

    /// Admission condition for a single key; wins over the patch-wide one.
    #[must_use]
    pub fn condition_for(
        mut self,
        key: impl Into<PropertyKey>,
        f: impl Fn() -> bool + 'static,
    ) -> Self {
        self.conditions.insert(key.into(), Rc::new(f));
        self
    }

    /// Human-readable name for logs and `Display`.
    #[must_use]
    pub fn display_name(mut self, name: impl Into<Rc<str>>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    fn condition_of(&self, key: &PropertyKey) -> Option<ConditionFn> {
        self.conditions
            .get(key)
            .cloned()
            .or_else(|| self.condition.clone())
    }
}

struct PatchInner {
    owner: Object,
    spec: Object,
    display_name: Rc<str>,
    entries: BTreeMap<PropertyKey, Rc<PatchEntry>>,
    conflicts: BTreeMap<PropertyKey, Rc<PatchEntry>>,
    patches_applied: Cell<usize>,
    state: RefCell<BTreeMap<PropertyKey, bool>>,
    stores: FxHashMap<DescriptorTemplate, Object>,
    registry: WeakPatchRegistry,
}

/// A set of property overlays against one owner object.
///
/// Cheap to clone; clones share state. Construction registers the patch in
/// its registry; only [`Patch::release`] removes it.
#[derive(Clone)]
pub struct Patch {
    inner: Rc<PatchInner>,
}

impl Patch {
    /// Builds a patch in the thread's default registry.
    #[must_use]
    pub fn new(owner: &Object, spec: &Object, options: PatchOptions) -> Self {
        Self::new_in(&default_registry(), owner, spec, options)
    }

    /// Builds a patch in an explicit registry.
    ///
    /// One entry is generated per own key of `spec` (symbol keys included).
    /// A malformed entry is logged and skipped without aborting the rest.
    /// Keys grouped under a [`DescriptorTemplate`] symbol are expanded
    /// recursively with the template's flags forced onto every inner key.
    #[must_use]
    pub fn new_in(
        registry: &PatchRegistry,
        owner: &Object,
        spec: &Object,
        options: PatchOptions,
    ) -> Self {
        let mut builder = EntryBuilder {
            owner,
            options: &options,
            entries: BTreeMap::new(),
            conflicts: BTreeMap::new(),
            stores: FxHashMap::default(),
        };
        builder.generate(spec, None);

        let display_name = options
            .display_name
            .clone()
            .unwrap_or_else(|| Rc::from(owner.id().to_string()));

        let patch = Self {
            inner: Rc::new(PatchInner {
                owner: owner.clone(),
                spec: spec.clone(),
                display_name,
                entries: builder.entries,
                conflicts: builder.conflicts,
                patches_applied: Cell::new(0),
                state: RefCell::new(BTreeMap::new()),
                stores: builder.stores,
                registry: registry.downgrade(),
            }),
        };
        registry.register(&patch);
        patch
    }

    /// The object this patch overlays.
    #[must_use]
    pub fn owner(&self) -> &Object {
        &self.inner.owner
    }

    /// The spec object the entries were captured from.
    #[must_use]
    pub fn spec(&self) -> &Object {
        &self.inner.spec
    }

    /// Name used in `Display` output and log events.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.inner.display_name
    }

    /// The entries as (key, entry) pairs in key order.
    #[must_use]
    pub fn entries(&self) -> Vec<(PropertyKey, Rc<PatchEntry>)> {
        self.inner
            .entries
            .iter()
            .map(|(k, e)| (k.clone(), Rc::clone(e)))
            .collect()
    }

    /// Captured pre-existing owner descriptors, as (key, entry) pairs.
    #[must_use]
    pub fn conflicts(&self) -> Vec<(PropertyKey, Rc<PatchEntry>)> {
        self.inner
            .conflicts
            .iter()
            .map(|(k, e)| (k.clone(), Rc::clone(e)))
            .collect()
    }

    /// Current computed value per key (getters invoked at call time).
    #[must_use]
    pub fn computed_values(&self) -> BTreeMap<PropertyKey, Option<Value>> {
        self.inner
            .entries
            .iter()
            .map(|(k, e)| (k.clone(), e.computed()))
            .collect()
    }

    /// Number of entries tracked.
    #[must_use]
    pub fn patch_count(&self) -> usize {
        self.inner.entries.len()
    }

    /// Number of entries currently verified as live on the owner.
    #[must_use]
    pub fn patches_applied(&self) -> usize {
        self.inner.patches_applied.get()
    }

    /// True when at least one entry is live.
    #[must_use]
    pub fn applied(&self) -> bool {
        self.patches_applied() > 0
    }

    /// Synonym for [`Patch::applied`], kept for call-site readability.
    #[must_use]
    pub fn is_partially_patched(&self) -> bool {
        self.applied()
    }

    /// True when every tracked entry is live.
    #[must_use]
    pub fn is_fully_patched(&self) -> bool {
        self.patch_count() == self.patches_applied()
    }

    /// Live-on-owner state of one entry, if tracked.
    #[must_use]
    pub fn entry_state(&self, key: &PropertyKey) -> Option<bool> {
        self.inner.state.borrow().get(key).copied()
    }

    /// The memoized store object handed to the template function for
    /// `template` during construction, if one was created.
    #[must_use]
    pub fn store(&self, template: DescriptorTemplate) -> Option<Object> {
        self.inner.stores.get(&template).cloned()
    }

    /// Applies every admitted entry to the owner and verifies each write by
    /// reading the descriptor back. Failures are recorded, never thrown;
    /// the loop always runs to completion.
    pub fn apply(&self) -> ApplyReport {
        let inner = &self.inner;
        let mut report = ApplyReport {
            patches: inner.entries.len(),
            applied: 0,
            errors: Vec::new(),
            not_applied: inner.entries.len(),
        };

        inner.state.borrow_mut().clear();
        for (key, entry) in &inner.entries {
            // Admission conditions are user code that may read back into
            // this patch, so no state borrow is held while they run.
            if !entry.is_allowed() {
                inner.state.borrow_mut().insert(key.clone(), false);
                continue;
            }
            let defined = inner
                .owner
                .define_property(key.clone(), entry.descriptor().clone());
            let verified = defined.is_ok()
                && inner
                    .owner
                    .own_descriptor(key)
                    .is_some_and(|read_back| read_back.matches(entry.descriptor()));
            if verified {
                report.applied += 1;
                report.not_applied -= 1;
            } else {
                let cause = match defined {
                    Err(object_error) => PatchError::Object(object_error),
                    Ok(()) => PatchError::ApplyFailed(key.clone()),
                };
                report.errors.push((Rc::clone(entry), cause));
            }
            inner.state.borrow_mut().insert(key.clone(), verified);
        }

        inner.patches_applied.set(report.applied);
        report
    }

    /// Reverts the overlay: deletes every patched key, then re-establishes
    /// every captured conflict and verifies the restoration.
    ///
    /// Returns `None` when nothing is applied. On a clean revert the report
    /// satisfies [`RevertReport::is_clean`].
    pub fn revert(&self) -> Option<RevertReport> {
        if !self.applied() {
            return None;
        }
        let inner = &self.inner;
        let mut report = RevertReport {
            patches: inner.entries.len(),
            reverted: 0,
            restored: 0,
            conflicts: inner.conflicts.len(),
            errors: Vec::new(),
            still_applied: 0,
        };

        let mut state = inner.state.borrow_mut();
        for (key, entry) in &inner.entries {
            if inner.owner.delete(key) {
                inner
                    .patches_applied
                    .set(inner.patches_applied.get().saturating_sub(1));
                report.reverted += 1;
                state.insert(key.clone(), false);
            } else {
                report
                    .errors
                    .push((Rc::clone(entry), PatchError::RevertFailed(key.clone())));
            }
        }
        drop(state);

        for (key, conflict) in &inner.conflicts {
            let defined = inner
                .owner
                .define_property(key.clone(), conflict.descriptor().clone());
            let verified = defined.is_ok()
                && inner
                    .owner
                    .own_descriptor(key)
                    .is_some_and(|read_back| read_back.matches(conflict.descriptor()));
            if verified {
                report.restored += 1;
            } else {
                report
                    .errors
                    .push((Rc::clone(conflict), PatchError::RestoreFailed(key.clone())));
            }
        }

        report.still_applied = inner.patches_applied.get();
        Some(report)
    }

    /// Creates a scoped start/stop wrapper for this patch.
    #[must_use]
    pub fn create_toggle(&self, prevent_revert: bool) -> PatchToggle {
        PatchToggle::new(self.clone(), prevent_revert)
    }

    /// Removes this patch from its registry. Does not revert first.
    pub fn release(&self) {
        if let Some(registry) = self.inner.registry.upgrade() {
            registry.unregister(self);
        }
    }

    /// Aggregation views over every patch registered for `owner` in the
    /// thread's default registry.
    #[must_use]
    pub fn scoped_to(owner: &Object) -> ScopedViews {
        default_registry().scoped_to(owner)
    }

    /// Applies every patch registered for `owner` in the default registry.
    pub fn enable_for(owner: &Object) {
        default_registry().enable_for(owner);
    }

    /// Reverts every patch registered for `owner` in the default registry.
    pub fn disable_for(owner: &Object) {
        default_registry().disable_for(owner);
    }

    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Display for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self
            .inner
            .entries
            .keys()
            .map(ToString::to_string)
            .collect();
        write!(f, "Patch[{}] {{ {} }}", self.display_name(), keys.join(", "))
    }
}

impl fmt::Debug for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

struct EntryBuilder<'a> {
    owner: &'a Object,
    options: &'a PatchOptions,
    entries: BTreeMap<PropertyKey, Rc<PatchEntry>>,
    conflicts: BTreeMap<PropertyKey, Rc<PatchEntry>>,
    stores: FxHashMap<DescriptorTemplate, Object>,
}

impl EntryBuilder<'_> {
    /// Walks one spec object. `template` carries the flags inherited from an
    /// enclosing template group; an outer template wins over a nested one.
    fn generate(&mut self, spec: &Object, template: Option<DescriptorTemplate>) {
        for key in spec.own_keys() {
            if let Some(found) = DescriptorTemplate::from_key(&key) {
                self.expand_template(spec, &key, found, template.unwrap_or(found));
                continue;
            }

            let condition = self.options.condition_of(&key);
            match PatchEntry::new(key.clone(), spec, condition, template) {
                Ok(entry) => {
                    self.entries.insert(key.clone(), Rc::new(entry));
                }
                Err(cause) => {
                    error!(key = %key, error = %cause, "failed to process patch entry; skipping");
                }
            }

            if self.owner.has(&key) {
                match PatchEntry::new(key.clone(), self.owner, None, None) {
                    Ok(conflict) => {
                        self.conflicts.insert(key, Rc::new(conflict));
                    }
                    Err(cause) => {
                        error!(key = %key, error = %cause, "cannot capture conflicting descriptor");
                    }
                }
            }
        }
    }

    /// Resolves a template-grouped spec entry: invokes the grouping function
    /// with the store memoized for (this construction, `found`), then
    /// recurses into the produced sub-object under `effective`'s flags.
    fn expand_template(
        &mut self,
        spec: &Object,
        key: &PropertyKey,
        found: DescriptorTemplate,
        effective: DescriptorTemplate,
    ) {
        let store = self
            .stores
            .entry(found)
            .or_insert_with(Object::new)
            .clone();
        let produced = match spec.get(key) {
            Some(Value::Function(group)) => group.call(&[Value::Object(store)]),
            Some(other) => other,
            None => {
                error!(key = %key, "template key has no readable value; skipping");
                return;
            }
        };
        match produced.as_object() {
            Some(sub_spec) => self.generate(sub_spec, Some(effective)),
            None => {
                let cause = EntryError::InvalidOwner(produced.type_name());
                error!(
                    key = %key,
                    error = %cause,
                    "descriptor template did not produce an object; skipping"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn owner_and_spec() -> (Object, Object) {
        let owner = Object::new();
        owner.set("original", Value::from("kept")).unwrap();
        let spec = Object::new();
        spec.set("introduced", Value::from(1)).unwrap();
        spec.set("original", Value::from("overlaid")).unwrap();
        (owner, spec)
    }

    #[test]
    fn construction_captures_conflicts() {
        let (owner, spec) = owner_and_spec();
        let patch = Patch::new(&owner, &spec, PatchOptions::new());
        assert_eq!(patch.patch_count(), 2);
        let conflicts = patch.conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].0, "original".into());
        assert_eq!(
            conflicts[0].1.computed(),
            Some(Value::from("kept"))
        );
        patch.release();
    }

    #[test]
    fn applied_is_derived_from_counters() {
        let (owner, spec) = owner_and_spec();
        let patch = Patch::new(&owner, &spec, PatchOptions::new());
        assert!(!patch.applied());
        assert!(!patch.is_fully_patched());
        let report = patch.apply();
        assert!(report.is_clean());
        assert!(patch.applied());
        assert!(patch.is_partially_patched());
        assert!(patch.is_fully_patched());
        patch.release();
    }

    #[test]
    fn per_key_condition_overrides_patch_wide() {
        let owner = Object::new();
        let spec = Object::new();
        spec.set("a", Value::from(1)).unwrap();
        spec.set("b", Value::from(2)).unwrap();
        let options = PatchOptions::new()
            .condition(|| false)
            .condition_for("b", || true);
        let patch = Patch::new(&owner, &spec, options);
        let report = patch.apply();
        assert_eq!(report.applied, 1);
        assert_eq!(report.not_applied, 1);
        assert!(report.errors.is_empty());
        assert!(!owner.has(&"a".into()));
        assert_eq!(owner.get(&"b".into()), Some(Value::from(2)));
        assert_eq!(patch.entry_state(&"a".into()), Some(false));
        assert_eq!(patch.entry_state(&"b".into()), Some(true));
        patch.release();
    }

    #[test]
    fn condition_may_read_the_patch_state_it_gates() {
        let owner = Object::new();
        let spec = Object::new();
        spec.set("a", Value::from(1)).unwrap();
        spec.set("b", Value::from(2)).unwrap();

        // "b" admits itself only once "a" is live; keys are walked in
        // order, so the condition observes "a" mid-apply.
        let slot: Rc<std::cell::RefCell<Option<Patch>>> =
            Rc::new(std::cell::RefCell::new(None));
        let seen = Rc::clone(&slot);
        let options = PatchOptions::new().condition_for("b", move || {
            seen.borrow()
                .as_ref()
                .is_some_and(|patch| patch.entry_state(&"a".into()) == Some(true))
        });
        let patch = Patch::new(&owner, &spec, options);
        *slot.borrow_mut() = Some(patch.clone());

        let report = patch.apply();
        assert!(report.is_clean());
        assert_eq!(patch.entry_state(&"b".into()), Some(true));
        patch.release();
    }

    #[test]
    fn display_names_the_patch_keys() {
        let (owner, spec) = owner_and_spec();
        let patch = Patch::new(
            &owner,
            &spec,
            PatchOptions::new().display_name("demo"),
        );
        assert_eq!(
            patch.to_string(),
            "Patch[demo] { introduced, original }"
        );
        patch.release();
    }
}
