// SPDX-License-Identifier: Apache-2.0
//! Dynamic values stored in object properties.
//!
//! Primitives compare by value; objects and functions compare by identity.
//! That identity semantic is what the patch engine's read-back verification
//! relies on: a descriptor written to an owner is only counted as applied if
//! the descriptor read back holds the *same* value, not a look-alike.

use std::fmt;
use std::rc::Rc;

use crate::object::Object;

/// Callable backing a [`NativeFn`].
pub type CallFn = Rc<dyn Fn(&[Value]) -> Value>;

/// A host function value.
///
/// The optional name exists so higher layers can derive a property key from
/// a function value alone (the way the extension layer builds a single-key
/// patch from a named function).
#[derive(Clone)]
pub struct NativeFn {
    name: Option<Rc<str>>,
    call: CallFn,
}

impl NativeFn {
    /// Creates a named function value.
    pub fn new<F>(name: impl Into<Rc<str>>, f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + 'static,
    {
        Self {
            name: Some(name.into()),
            call: Rc::new(f),
        }
    }

    /// Creates an anonymous function value.
    pub fn anonymous<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + 'static,
    {
        Self {
            name: None,
            call: Rc::new(f),
        }
    }

    /// The function's name, if it has one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Invokes the function.
    #[must_use]
    pub fn call(&self, args: &[Value]) -> Value {
        (self.call)(args)
    }

    /// Identity comparison: true only for clones of the same function value.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.call, &other.call)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "NativeFn({name})"),
            None => write!(f, "NativeFn(<anonymous>)"),
        }
    }
}

/// A dynamic value.
#[derive(Debug, Clone)]
pub enum Value {
    /// Absence of a value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// IEEE-754 double. `NaN` is unequal to itself, as usual.
    Float(f64),
    /// Immutable string.
    Str(Rc<str>),
    /// Object handle (identity-compared).
    Object(Object),
    /// Function value (identity-compared).
    Function(NativeFn),
}

impl Value {
    /// Returns the contained object handle, if this is an object.
    #[must_use]
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Returns the contained function, if this is a function value.
    #[must_use]
    pub fn as_function(&self) -> Option<&NativeFn> {
        match self {
            Self::Function(f) => Some(f),
            _ => None,
        }
    }

    /// True for `Bool`, `Int`, `Float`, and `Str`.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Self::Bool(_) | Self::Int(_) | Self::Float(_) | Self::Str(_)
        )
    }

    /// Short type tag for diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Object(_) => "object",
            Self::Function(_) => "function",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Function(a), Self::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(Rc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(Rc::from(v))
    }
}

impl From<Object> for Value {
    fn from(v: Object) -> Self {
        Self::Object(v)
    }
}

impl From<NativeFn> for Value {
    fn from(v: NativeFn) -> Self {
        Self::Function(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_compare_by_value() {
        assert_eq!(Value::from(3), Value::Int(3));
        assert_eq!(Value::from("hi"), Value::from(String::from("hi")));
        assert_ne!(Value::from(3), Value::Float(3.0));
    }

    #[test]
    fn functions_compare_by_identity() {
        let f = NativeFn::new("id", |args| args.first().cloned().unwrap_or(Value::Null));
        let g = NativeFn::new("id", |args| args.first().cloned().unwrap_or(Value::Null));
        assert_eq!(Value::from(f.clone()), Value::from(f.clone()));
        assert_ne!(Value::from(f), Value::from(g));
    }

    #[test]
    fn objects_compare_by_identity() {
        let a = Object::new();
        let b = Object::new();
        assert_eq!(Value::from(a.clone()), Value::from(a.clone()));
        assert_ne!(Value::from(a), Value::from(b));
    }

    #[test]
    fn named_functions_expose_their_name() {
        let f = NativeFn::new("greet", |_| Value::from("hi"));
        assert_eq!(f.name(), Some("greet"));
        assert_eq!(f.call(&[]), Value::from("hi"));
        assert!(NativeFn::anonymous(|_| Value::Null).name().is_none());
    }
}
