// SPDX-License-Identifier: Apache-2.0
//! Property descriptors and the four well-known descriptor templates.
//!
//! A [`Descriptor`] is an immutable snapshot: the patch engine captures one
//! at entry-construction time and never mutates it afterwards. Whether a
//! write to an owner actually took is decided by [`Descriptor::matches`],
//! field by field, with closures compared by identity — the read-back
//! verification that stands in for lock discipline in this engine.

use std::fmt;
use std::rc::Rc;

use crate::key::{PropertyKey, SymbolId};
use crate::object::Object;
use crate::value::Value;

/// Getter closure; invoked with the object the property is read through.
pub type GetterFn = Rc<dyn Fn(&Object) -> Value>;

/// Setter closure; invoked with the object the property is written through.
pub type SetterFn = Rc<dyn Fn(&Object, Value)>;

/// The variant-specific half of a descriptor.
#[derive(Clone)]
pub enum DescriptorKind {
    /// A data property: a stored value plus its writability.
    Data {
        /// The stored value.
        value: Value,
        /// Whether assignment through [`Object::set`] may replace the value.
        writable: bool,
    },
    /// An accessor property backed by optional get/set closures.
    Accessor {
        /// Getter, if readable.
        get: Option<GetterFn>,
        /// Setter, if writable.
        set: Option<SetterFn>,
    },
}

/// A property descriptor: kind plus the shared attribute flags.
#[derive(Clone)]
pub struct Descriptor {
    kind: DescriptorKind,
    enumerable: bool,
    configurable: bool,
}

impl Descriptor {
    /// A writable, enumerable, configurable data descriptor — the default
    /// shape of a plain spec entry.
    #[must_use]
    pub fn data(value: Value) -> Self {
        Self {
            kind: DescriptorKind::Data {
                value,
                writable: true,
            },
            enumerable: true,
            configurable: true,
        }
    }

    /// An enumerable, configurable accessor descriptor.
    #[must_use]
    pub fn accessor(get: Option<GetterFn>, set: Option<SetterFn>) -> Self {
        Self {
            kind: DescriptorKind::Accessor { get, set },
            enumerable: true,
            configurable: true,
        }
    }

    /// Returns a copy with `writable` replaced (data descriptors only;
    /// accessor descriptors are returned unchanged).
    #[must_use]
    pub fn writable(mut self, writable: bool) -> Self {
        if let DescriptorKind::Data { writable: w, .. } = &mut self.kind {
            *w = writable;
        }
        self
    }

    /// Returns a copy with `enumerable` replaced.
    #[must_use]
    pub fn enumerable(mut self, enumerable: bool) -> Self {
        self.enumerable = enumerable;
        self
    }

    /// Returns a copy with `configurable` replaced.
    #[must_use]
    pub fn configurable(mut self, configurable: bool) -> Self {
        self.configurable = configurable;
        self
    }

    /// The variant-specific half.
    #[must_use]
    pub fn kind(&self) -> &DescriptorKind {
        &self.kind
    }

    /// True for data descriptors.
    #[must_use]
    pub fn is_data(&self) -> bool {
        matches!(self.kind, DescriptorKind::Data { .. })
    }

    /// True for accessor descriptors.
    #[must_use]
    pub fn is_accessor(&self) -> bool {
        matches!(self.kind, DescriptorKind::Accessor { .. })
    }

    /// True when the descriptor is enumerable.
    #[must_use]
    pub fn is_enumerable(&self) -> bool {
        self.enumerable
    }

    /// True when the descriptor is configurable.
    #[must_use]
    pub fn is_configurable(&self) -> bool {
        self.configurable
    }

    /// True for writable data descriptors.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        matches!(self.kind, DescriptorKind::Data { writable: true, .. })
    }

    /// The stored value of a data descriptor.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match &self.kind {
            DescriptorKind::Data { value, .. } => Some(value),
            DescriptorKind::Accessor { .. } => None,
        }
    }

    /// The getter of an accessor descriptor.
    #[must_use]
    pub fn getter(&self) -> Option<&GetterFn> {
        match &self.kind {
            DescriptorKind::Accessor { get, .. } => get.as_ref(),
            DescriptorKind::Data { .. } => None,
        }
    }

    /// The setter of an accessor descriptor.
    #[must_use]
    pub fn setter(&self) -> Option<&SetterFn> {
        match &self.kind {
            DescriptorKind::Accessor { set, .. } => set.as_ref(),
            DescriptorKind::Data { .. } => None,
        }
    }

    /// Field-by-field equality: flags, then value (primitive equality,
    /// identity for objects/functions) or get/set closure identity.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        if self.configurable != other.configurable || self.enumerable != other.enumerable {
            return false;
        }
        match (&self.kind, &other.kind) {
            (
                DescriptorKind::Data { value, writable },
                DescriptorKind::Data {
                    value: other_value,
                    writable: other_writable,
                },
            ) => writable == other_writable && value == other_value,
            (
                DescriptorKind::Accessor { get, set },
                DescriptorKind::Accessor {
                    get: other_get,
                    set: other_set,
                },
            ) => closure_eq(get, other_get) && setter_eq(set, other_set),
            _ => false,
        }
    }

    /// Returns a copy with the template's enumerable/configurable flags
    /// forced on (overrides win over the captured flags).
    #[must_use]
    pub fn with_template(&self, template: DescriptorTemplate) -> Self {
        self.clone()
            .enumerable(template.is_enumerable())
            .configurable(template.is_configurable())
    }

    /// Returns a copy whose accessors are rebound to `owner`: reads and
    /// writes through whatever object the copy is later defined on still
    /// resolve against `owner`. Data descriptors are returned unchanged.
    #[must_use]
    pub fn bound_to(&self, owner: &Object) -> Self {
        match &self.kind {
            DescriptorKind::Data { .. } => self.clone(),
            DescriptorKind::Accessor { get, set } => {
                let bound_get: Option<GetterFn> = get.as_ref().map(|g| {
                    let g = Rc::clone(g);
                    let owner = owner.clone();
                    Rc::new(move |_this: &Object| g(&owner)) as GetterFn
                });
                let bound_set: Option<SetterFn> = set.as_ref().map(|s| {
                    let s = Rc::clone(s);
                    let owner = owner.clone();
                    Rc::new(move |_this: &Object, value: Value| s(&owner, value)) as SetterFn
                });
                Self {
                    kind: DescriptorKind::Accessor {
                        get: bound_get,
                        set: bound_set,
                    },
                    enumerable: self.enumerable,
                    configurable: self.configurable,
                }
            }
        }
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct("Descriptor");
        match &self.kind {
            DescriptorKind::Data { value, writable } => {
                dbg.field("value", value).field("writable", writable);
            }
            DescriptorKind::Accessor { get, set } => {
                dbg.field("get", &get.is_some()).field("set", &set.is_some());
            }
        }
        dbg.field("enumerable", &self.enumerable)
            .field("configurable", &self.configurable)
            .finish()
    }
}

fn closure_eq(a: &Option<GetterFn>, b: &Option<GetterFn>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

fn setter_eq(a: &Option<SetterFn>, b: &Option<SetterFn>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

/// The four well-known descriptor templates: visibility (enumerable) crossed
/// with mutability (configurable).
///
/// A spec entry keyed by a template's symbol groups a whole sub-object of
/// entries under these flags, so a caller declares "all of these are
/// non-enumerable" once instead of per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorTemplate {
    /// Non-enumerable, configurable.
    MutablyHidden,
    /// Enumerable, configurable.
    MutablyVisible,
    /// Non-enumerable, non-configurable.
    ImmutablyHidden,
    /// Enumerable, non-configurable.
    ImmutablyVisible,
}

impl DescriptorTemplate {
    /// All four templates, in a fixed order.
    pub const ALL: [Self; 4] = [
        Self::MutablyHidden,
        Self::MutablyVisible,
        Self::ImmutablyHidden,
        Self::ImmutablyVisible,
    ];

    /// Whether entries under this template are enumerable.
    #[must_use]
    pub fn is_enumerable(self) -> bool {
        matches!(self, Self::MutablyVisible | Self::ImmutablyVisible)
    }

    /// Whether entries under this template are configurable.
    #[must_use]
    pub fn is_configurable(self) -> bool {
        matches!(self, Self::MutablyHidden | Self::MutablyVisible)
    }

    /// The interned description of this template's well-known symbol.
    #[must_use]
    pub fn symbol_description(self) -> &'static str {
        match self {
            Self::MutablyHidden => "mantle.template.mutably_hidden",
            Self::MutablyVisible => "mantle.template.mutably_visible",
            Self::ImmutablyHidden => "mantle.template.immutably_hidden",
            Self::ImmutablyVisible => "mantle.template.immutably_visible",
        }
    }

    /// The well-known symbol under which a spec groups entries for this
    /// template.
    #[must_use]
    pub fn symbol(self) -> SymbolId {
        SymbolId::named(self.symbol_description())
    }

    /// This template's symbol as a property key.
    #[must_use]
    pub fn key(self) -> PropertyKey {
        PropertyKey::Sym(self.symbol())
    }

    /// Recognises a property key as one of the four well-known template
    /// symbols.
    #[must_use]
    pub fn from_key(key: &PropertyKey) -> Option<Self> {
        let PropertyKey::Sym(sym) = key else {
            return None;
        };
        Self::ALL.into_iter().find(|t| t.symbol() == *sym)
    }
}
