// SPDX-License-Identifier: Apache-2.0
//! mantle-ext: single-value extensions on top of the patch engine.
//!
//! An [`Extension`] is a one-key [`Patch`] with an admission check: it
//! refuses to shadow an owner property that could never be restored
//! faithfully. The key can be given explicitly or derived from a named
//! function value, which makes "install this function on that object" a
//! one-liner. [`ExtensionSet`] groups extensions for bulk apply/revert.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self,
    clippy::cognitive_complexity,
    clippy::option_if_let_else,
    clippy::significant_drop_tightening,
    clippy::doc_markdown,
    clippy::too_many_lines,
    clippy::too_long_first_doc_paragraph,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::similar_names,
    clippy::manual_let_else,
    clippy::needless_pass_by_value,
    clippy::multiple_crate_versions
)]

use std::fmt;

use thiserror::Error;

use mantle_core::{
    default_registry, ApplyReport, NativeFn, Object, ObjectError, ObjectId, Patch, PatchOptions,
    PatchRegistry, PropertyKey, RevertReport, Value,
};

/// Errors raised while constructing an [`Extension`].
#[derive(Debug, Error)]
pub enum ExtensionError {
    /// The owner already holds `key` as a property that a revert could not
    /// restore faithfully (non-configurable, or non-writable data).
    #[error("`{key}` on {owner} cannot be extended")]
    CannotBeExtended {
        /// The key that was refused.
        key: PropertyKey,
        /// Identity of the owner holding the immovable property.
        owner: ObjectId,
    },
    /// No property key could be derived from the extension value (an
    /// anonymous function, or a non-function with no explicit key).
    #[error("no property key could be derived for the extension value")]
    MissingOwnerValue,
    /// The spec object could not be populated.
    #[error(transparent)]
    Object(#[from] ObjectError),
}

/// A reversible single-property extension of an owner object.
pub struct Extension {
    patch: Patch,
    key: PropertyKey,
    value: Value,
}

impl Extension {
    /// Extends `owner` with `value` under an explicit `key`, in the
    /// thread's default registry.
    pub fn new(
        owner: &Object,
        key: impl Into<PropertyKey>,
        value: Value,
    ) -> Result<Self, ExtensionError> {
        Self::new_in(&default_registry(), owner, key, value)
    }

    /// Extends `owner` with `value` under an explicit `key`, in `registry`.
    pub fn new_in(
        registry: &PatchRegistry,
        owner: &Object,
        key: impl Into<PropertyKey>,
        value: Value,
    ) -> Result<Self, ExtensionError> {
        Self::build(registry, owner, key.into(), value)
    }

    /// Installs a named function on the default registry's global owner,
    /// deriving the key from the function's name.
    pub fn function(f: NativeFn) -> Result<Self, ExtensionError> {
        let registry = default_registry();
        let owner = registry.global_owner();
        Self::function_on(&registry, &owner, f)
    }

    /// Installs a named function on `owner`, deriving the key from the
    /// function's name.
    pub fn function_on(
        registry: &PatchRegistry,
        owner: &Object,
        f: NativeFn,
    ) -> Result<Self, ExtensionError> {
        let key = f
            .name()
            .map(PropertyKey::from)
            .ok_or(ExtensionError::MissingOwnerValue)?;
        Self::build(registry, owner, key, Value::Function(f))
    }

    fn build(
        registry: &PatchRegistry,
        owner: &Object,
        key: PropertyKey,
        value: Value,
    ) -> Result<Self, ExtensionError> {
        if key.is_empty_str() {
            return Err(ExtensionError::MissingOwnerValue);
        }
        if let Some(existing) = owner.own_descriptor(&key) {
            let immovable = !existing.is_configurable()
                || (existing.is_data() && !existing.is_writable());
            if immovable {
                return Err(ExtensionError::CannotBeExtended {
                    key,
                    owner: owner.id(),
                });
            }
        }
        let spec = Object::new();
        spec.set(key.clone(), value.clone())?;
        let patch = Patch::new_in(
            registry,
            owner,
            &spec,
            PatchOptions::new().display_name(key.to_string()),
        );
        Ok(Self { patch, key, value })
    }

    /// The key this extension introduces.
    #[must_use]
    pub fn key(&self) -> &PropertyKey {
        &self.key
    }

    /// The value this extension introduces.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The underlying single-entry patch.
    #[must_use]
    pub fn patch(&self) -> &Patch {
        &self.patch
    }

    /// True when the extension value is a function.
    #[must_use]
    pub fn is_function(&self) -> bool {
        self.value.as_function().is_some()
    }

    /// True when the extension value is an object.
    #[must_use]
    pub fn is_object(&self) -> bool {
        self.value.as_object().is_some()
    }

    /// True when the extension value is a primitive.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        self.value.is_primitive()
    }

    /// True when the extension is live on its owner.
    #[must_use]
    pub fn applied(&self) -> bool {
        self.patch.applied()
    }

    /// Applies the extension to its owner.
    pub fn apply(&self) -> ApplyReport {
        self.patch.apply()
    }

    /// Reverts the extension; `None` when it was not applied.
    pub fn revert(&self) -> Option<RevertReport> {
        self.patch.revert()
    }

    /// Releases the underlying patch from its registry.
    pub fn release(&self) {
        self.patch.release();
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Extension<{}>", self.key)
    }
}

impl fmt::Debug for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A named group of extensions driven as one unit.
#[derive(Default)]
pub struct ExtensionSet {
    name: String,
    extensions: Vec<Extension>,
}

impl ExtensionSet {
    /// An empty set.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extensions: Vec::new(),
        }
    }

    /// The set's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds an extension to the set.
    pub fn add(&mut self, extension: Extension) {
        self.extensions.push(extension);
    }

    /// Number of extensions in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    /// True when the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// The extensions, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Extension> {
        self.extensions.iter()
    }

    /// Applies every extension, in insertion order.
    pub fn apply_all(&self) {
        for extension in &self.extensions {
            let _report = extension.apply();
        }
    }

    /// Reverts every extension, newest first.
    pub fn revert_all(&self) {
        for extension in self.extensions.iter().rev() {
            let _report = extension.revert();
        }
    }

    /// Reverts and releases every extension, emptying the set.
    pub fn release_all(&mut self) {
        for extension in self.extensions.drain(..).rev() {
            let _report = extension.revert();
            extension.release();
        }
    }
}

impl<'a> IntoIterator for &'a ExtensionSet {
    type Item = &'a Extension;
    type IntoIter = std::slice::Iter<'a, Extension>;

    fn into_iter(self) -> Self::IntoIter {
        self.extensions.iter()
    }
}
