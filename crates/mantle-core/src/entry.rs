// SPDX-License-Identifier: Apache-2.0
//! Patch entries: one (key, descriptor, owner, condition) unit.
//!
//! An entry snapshots its descriptor at construction time and is immutable
//! afterwards; staleness against an externally mutated spec object is not
//! tracked. The `owner` here is the object the descriptor was captured
//! *from* (the patch specification), which is also what accessor closures
//! are rebound to when an entry is projected onto an aggregation surface.

use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::descriptor::{Descriptor, DescriptorKind, DescriptorTemplate};
use crate::key::PropertyKey;
use crate::object::{Object, ObjectError};
use crate::value::Value;

/// Zero-argument admission predicate attached to an entry.
pub type ConditionFn = Rc<dyn Fn() -> bool>;

/// Errors raised while constructing a [`PatchEntry`].
#[derive(Debug, Error)]
pub enum EntryError {
    /// The property key is unusable (empty string).
    #[error("property key must be a non-empty string or a symbol")]
    InvalidKey,
    /// A value that should host descriptors is not an object.
    #[error("cannot create patch entry: owning value is {0}, not an object")]
    InvalidOwner(&'static str),
    /// The owning object has no descriptor for the requested key.
    #[error("owning object has no property `{0}`")]
    MissingDescriptor(PropertyKey),
}

/// One property to introduce (or one pre-existing property captured for
/// restoration).
pub struct PatchEntry {
    key: PropertyKey,
    descriptor: Descriptor,
    owner: Object,
    condition: Option<ConditionFn>,
}

impl PatchEntry {
    /// Captures an entry for `key` from `owning_object`'s current
    /// descriptor, optionally forcing a template's enumerable/configurable
    /// flags over the captured ones.
    pub fn new(
        key: PropertyKey,
        owning_object: &Object,
        condition: Option<ConditionFn>,
        template: Option<DescriptorTemplate>,
    ) -> Result<Self, EntryError> {
        if key.is_empty_str() {
            return Err(EntryError::InvalidKey);
        }
        let captured = owning_object
            .own_descriptor(&key)
            .ok_or_else(|| EntryError::MissingDescriptor(key.clone()))?;
        let descriptor = match template {
            Some(t) => captured.with_template(t),
            None => captured,
        };
        Ok(Self {
            key,
            descriptor,
            owner: owning_object.clone(),
            condition,
        })
    }

    /// The property key this entry patches.
    #[must_use]
    pub fn key(&self) -> &PropertyKey {
        &self.key
    }

    /// The descriptor snapshot taken at construction.
    #[must_use]
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// The object the descriptor was captured from.
    #[must_use]
    pub fn owner(&self) -> &Object {
        &self.owner
    }

    /// True for data entries.
    #[must_use]
    pub fn is_data(&self) -> bool {
        self.descriptor.is_data()
    }

    /// True for accessor entries.
    #[must_use]
    pub fn is_accessor(&self) -> bool {
        self.descriptor.is_accessor()
    }

    /// True when the entry is non-configurable, or a non-writable data
    /// entry.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        !self.descriptor.is_configurable() || (self.is_data() && !self.descriptor.is_writable())
    }

    /// Admission gate: the condition's verdict when present, true otherwise.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.condition.as_ref().map_or(true, |cond| cond())
    }

    /// The entry's current value: the stored value for data entries, the
    /// getter invoked against the entry's owner for accessor entries.
    ///
    /// Returns `None` for an accessor with no getter.
    #[must_use]
    pub fn computed(&self) -> Option<Value> {
        match self.descriptor.kind() {
            DescriptorKind::Data { value, .. } => Some(value.clone()),
            DescriptorKind::Accessor { get, .. } => get.as_ref().map(|g| g(&self.owner)),
        }
    }

    /// Defines this entry's descriptor onto an arbitrary `target`.
    ///
    /// With `bind_accessors`, getter/setter closures are rebound to the
    /// entry's original owner first, so reads through `target` still resolve
    /// against the object the accessors were written for — the building
    /// block of the flattened aggregation surfaces.
    pub fn apply_to(&self, target: &Object, bind_accessors: bool) -> Result<(), ObjectError> {
        let descriptor = if bind_accessors {
            self.descriptor.bound_to(&self.owner)
        } else {
            self.descriptor.clone()
        };
        target.define_property(self.key.clone(), descriptor)
    }
}

impl fmt::Display for PatchEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_data() { "Data" } else { "Accessor" };
        let read_only = if self.is_read_only() { " [ReadOnly]" } else { "" };
        write!(f, "PatchEntry<{} {kind}{read_only}>", self.key)
    }
}

impl fmt::Debug for PatchEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
