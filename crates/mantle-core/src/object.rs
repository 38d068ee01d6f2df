// SPDX-License-Identifier: Apache-2.0
//! The dynamic object substrate patches are applied to.
//!
//! An [`Object`] is a cheap-clone shared handle over a descriptor table.
//! Own-key enumeration is deterministic (`BTreeMap` order). Identity — not
//! structure — is what makes two handles "the same object"; the registry
//! keys patches by [`ObjectId`].
//!
//! `define_property` enforces the usual constraints on non-configurable
//! properties; `delete` refuses to remove them. Both behaviors are what the
//! patch engine's conflict bookkeeping and revert verification lean on.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::descriptor::{Descriptor, DescriptorKind};
use crate::key::PropertyKey;
use crate::value::Value;

/// Unique identity of an [`Object`], stable for the object's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object#{}", self.0)
    }
}

/// Errors raised by property mutation on an [`Object`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObjectError {
    /// Redefinition would relax or reshape a non-configurable property.
    #[error("cannot redefine non-configurable property `{0}`")]
    NonConfigurable(PropertyKey),
    /// Assignment to a non-writable data property or an accessor without a
    /// setter.
    #[error("cannot assign to read-only property `{0}`")]
    ReadOnly(PropertyKey),
}

struct ObjectInner {
    id: ObjectId,
    props: RefCell<BTreeMap<PropertyKey, Descriptor>>,
}

/// A shared handle to a dynamic object.
#[derive(Clone)]
pub struct Object {
    inner: Rc<ObjectInner>,
}

impl Object {
    /// Creates an empty object.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ObjectInner {
                id: next_object_id(),
                props: RefCell::new(BTreeMap::new()),
            }),
        }
    }

    /// The object's identity.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.inner.id
    }

    /// True when both handles refer to the same object.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Defines or redefines an own property.
    ///
    /// Redefinition of a non-configurable property is rejected when it would
    /// make the property configurable again, change its enumerability, swap
    /// its kind, relax a non-writable data property, change the value of a
    /// non-writable data property, or replace accessor closures.
    pub fn define_property(
        &self,
        key: impl Into<PropertyKey>,
        descriptor: Descriptor,
    ) -> Result<(), ObjectError> {
        let key = key.into();
        let mut props = self.inner.props.borrow_mut();
        if let Some(existing) = props.get(&key) {
            if !existing.is_configurable() {
                check_non_configurable_redefinition(&key, existing, &descriptor)?;
            }
        }
        props.insert(key, descriptor);
        Ok(())
    }

    /// Removes an own property.
    ///
    /// Returns true when the property was removed or did not exist; false
    /// when it exists but is non-configurable.
    pub fn delete(&self, key: &PropertyKey) -> bool {
        let mut props = self.inner.props.borrow_mut();
        match props.get(key) {
            None => true,
            Some(descriptor) if !descriptor.is_configurable() => false,
            Some(_) => {
                props.remove(key);
                true
            }
        }
    }

    /// Reads a property value, invoking the getter for accessor properties.
    ///
    /// Returns `None` when the property is missing or is an accessor with no
    /// getter.
    #[must_use]
    pub fn get(&self, key: &PropertyKey) -> Option<Value> {
        // Clone the descriptor out before invoking closures: a getter may
        // re-enter this object.
        let descriptor = self.inner.props.borrow().get(key).cloned()?;
        match descriptor.kind() {
            DescriptorKind::Data { value, .. } => Some(value.clone()),
            DescriptorKind::Accessor { get, .. } => get.as_ref().map(|g| g(self)),
        }
    }

    /// Writes a property value.
    ///
    /// Creates a writable/enumerable/configurable data property when the key
    /// is absent; otherwise updates the data value or invokes the setter.
    pub fn set(&self, key: impl Into<PropertyKey>, value: Value) -> Result<(), ObjectError> {
        let key = key.into();
        let setter = {
            let mut props = self.inner.props.borrow_mut();
            match props.get(&key) {
                None => {
                    props.insert(key, Descriptor::data(value));
                    return Ok(());
                }
                Some(existing) => match existing.kind() {
                    DescriptorKind::Data { writable: false, .. } => {
                        return Err(ObjectError::ReadOnly(key));
                    }
                    DescriptorKind::Data { .. } => {
                        let updated = replace_data_value(existing, value);
                        props.insert(key, updated);
                        return Ok(());
                    }
                    DescriptorKind::Accessor { set: None, .. } => {
                        return Err(ObjectError::ReadOnly(key));
                    }
                    DescriptorKind::Accessor { set: Some(s), .. } => Rc::clone(s),
                },
            }
        };
        setter(self, value);
        Ok(())
    }

    /// True when the object has an own property named `key`.
    #[must_use]
    pub fn has(&self, key: &PropertyKey) -> bool {
        self.inner.props.borrow().contains_key(key)
    }

    /// Snapshot of the descriptor stored under `key`, if any.
    #[must_use]
    pub fn own_descriptor(&self, key: &PropertyKey) -> Option<Descriptor> {
        self.inner.props.borrow().get(key).cloned()
    }

    /// Every own key, in deterministic order.
    #[must_use]
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        self.inner.props.borrow().keys().cloned().collect()
    }

    /// Number of own properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.props.borrow().len()
    }

    /// True when the object has no own properties.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.props.borrow().is_empty()
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Object {}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({} props)", self.inner.id, self.len())
    }
}

fn check_non_configurable_redefinition(
    key: &PropertyKey,
    existing: &Descriptor,
    incoming: &Descriptor,
) -> Result<(), ObjectError> {
    if incoming.is_configurable() || incoming.is_enumerable() != existing.is_enumerable() {
        return Err(ObjectError::NonConfigurable(key.clone()));
    }
    match (existing.kind(), incoming.kind()) {
        (
            DescriptorKind::Data { value, writable },
            DescriptorKind::Data {
                value: new_value,
                writable: new_writable,
            },
        ) => {
            if !writable && (*new_writable || new_value != value) {
                return Err(ObjectError::NonConfigurable(key.clone()));
            }
            Ok(())
        }
        (DescriptorKind::Accessor { .. }, DescriptorKind::Accessor { .. }) => {
            if existing.matches(incoming) {
                Ok(())
            } else {
                Err(ObjectError::NonConfigurable(key.clone()))
            }
        }
        _ => Err(ObjectError::NonConfigurable(key.clone())),
    }
}

fn replace_data_value(existing: &Descriptor, value: Value) -> Descriptor {
    Descriptor::data(value)
        .writable(existing.is_writable())
        .enumerable(existing.is_enumerable())
        .configurable(existing.is_configurable())
}

fn next_object_id() -> ObjectId {
    thread_local! {
        static NEXT: Cell<u64> = const { Cell::new(0) };
    }
    NEXT.with(|next| {
        let id = next.get();
        next.set(id + 1);
        ObjectId(id)
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::rc::Rc;

    use super::*;
    use crate::descriptor::GetterFn;

    #[test]
    fn set_and_get_round_trip() {
        let obj = Object::new();
        obj.set("x", Value::from(42)).unwrap();
        assert_eq!(obj.get(&"x".into()), Some(Value::from(42)));
        assert!(obj.has(&"x".into()));
        assert_eq!(obj.get(&"missing".into()), None);
    }

    #[test]
    fn getters_receive_the_read_through_object() {
        let obj = Object::new();
        let get: GetterFn = Rc::new(|this: &Object| Value::from(this.id().to_string()));
        obj.define_property("me", Descriptor::accessor(Some(get), None))
            .unwrap();
        assert_eq!(
            obj.get(&"me".into()),
            Some(Value::from(obj.id().to_string()))
        );
    }

    #[test]
    fn assignment_to_read_only_is_rejected() {
        let obj = Object::new();
        obj.define_property("ro", Descriptor::data(Value::from(1)).writable(false))
            .unwrap();
        assert_eq!(
            obj.set("ro", Value::from(2)),
            Err(ObjectError::ReadOnly("ro".into()))
        );
        assert_eq!(obj.get(&"ro".into()), Some(Value::from(1)));
    }

    #[test]
    fn non_configurable_cannot_be_deleted_or_relaxed() {
        let obj = Object::new();
        obj.define_property("nc", Descriptor::data(Value::from(1)).configurable(false))
            .unwrap();
        assert!(!obj.delete(&"nc".into()));
        assert!(obj
            .define_property("nc", Descriptor::data(Value::from(2)))
            .is_err());
        // Same flags, still-writable value replacement is allowed.
        obj.define_property(
            "nc",
            Descriptor::data(Value::from(2)).configurable(false),
        )
        .unwrap();
        assert_eq!(obj.get(&"nc".into()), Some(Value::from(2)));
    }

    #[test]
    fn frozen_data_property_rejects_value_change() {
        let obj = Object::new();
        obj.define_property(
            "frozen",
            Descriptor::data(Value::from(1))
                .writable(false)
                .configurable(false),
        )
        .unwrap();
        let err = obj.define_property(
            "frozen",
            Descriptor::data(Value::from(2))
                .writable(false)
                .configurable(false),
        );
        assert_eq!(err, Err(ObjectError::NonConfigurable("frozen".into())));
    }

    #[test]
    fn delete_missing_key_reports_success() {
        let obj = Object::new();
        assert!(obj.delete(&"ghost".into()));
        obj.set("k", Value::from(1)).unwrap();
        assert!(obj.delete(&"k".into()));
        assert!(!obj.has(&"k".into()));
    }

    #[test]
    fn own_keys_are_deterministic() {
        let obj = Object::new();
        obj.set("b", Value::from(2)).unwrap();
        obj.set("a", Value::from(1)).unwrap();
        let keys = obj.own_keys();
        assert_eq!(keys, vec!["a".into(), "b".into()]);
    }

    #[test]
    fn identity_not_structure() {
        let a = Object::new();
        let b = Object::new();
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_ne!(a.id(), b.id());
    }
}
