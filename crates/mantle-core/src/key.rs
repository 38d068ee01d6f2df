// SPDX-License-Identifier: Apache-2.0
//! Property keys: interned symbols and plain string keys.
//!
//! Keys are `Ord` so that own-key enumeration over a [`crate::Object`] is
//! deterministic. Symbols are interned per thread: two calls to
//! [`SymbolId::named`] with the same description yield the same id, which is
//! what makes the well-known descriptor-template keys recognisable across
//! independently built patch specifications.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

/// Identifier of an interned symbol.
///
/// Symbols compare by id, never by description; two symbols with the same
/// description obtained through [`SymbolId::named`] are the *same* symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolId(u32);

impl SymbolId {
    /// Returns the symbol interned under `description`, creating it on first
    /// use (the registry-wide analogue of a `Symbol.for` lookup).
    #[must_use]
    pub fn named(description: &str) -> Self {
        SYMBOLS.with(|table| table.borrow_mut().intern(description))
    }

    /// Returns the description this symbol was interned under, if the symbol
    /// was produced by this thread's interner.
    #[must_use]
    pub fn description(self) -> Option<Rc<str>> {
        SYMBOLS.with(|table| table.borrow().names.get(self.0 as usize).cloned())
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.description() {
            Some(name) => write!(f, "Symbol({name})"),
            None => write!(f, "Symbol(#{})", self.0),
        }
    }
}

/// A property key: either a plain string or an interned symbol.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PropertyKey {
    /// String key.
    Str(Rc<str>),
    /// Symbol key.
    Sym(SymbolId),
}

impl PropertyKey {
    /// Returns true for the empty string key, which no entry may use.
    #[must_use]
    pub fn is_empty_str(&self) -> bool {
        matches!(self, Self::Str(s) if s.is_empty())
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s}"),
            Self::Sym(id) => write!(f, "{id}"),
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        Self::Str(Rc::from(s))
    }
}

impl From<String> for PropertyKey {
    fn from(s: String) -> Self {
        Self::Str(Rc::from(s))
    }
}

impl From<SymbolId> for PropertyKey {
    fn from(id: SymbolId) -> Self {
        Self::Sym(id)
    }
}

struct SymbolTable {
    by_name: FxHashMap<Rc<str>, SymbolId>,
    names: Vec<Rc<str>>,
}

impl SymbolTable {
    fn new() -> Self {
        Self {
            by_name: FxHashMap::default(),
            names: Vec::new(),
        }
    }

    fn intern(&mut self, description: &str) -> SymbolId {
        if let Some(id) = self.by_name.get(description) {
            return *id;
        }
        let name: Rc<str> = Rc::from(description);
        let id = SymbolId(u32::try_from(self.names.len()).unwrap_or(u32::MAX));
        self.names.push(Rc::clone(&name));
        self.by_name.insert(name, id);
        id
    }
}

thread_local! {
    static SYMBOLS: RefCell<SymbolTable> = RefCell::new(SymbolTable::new());
}
