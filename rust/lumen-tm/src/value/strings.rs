//! Immutable interned strings and the intern table that owns them.

use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::rc::Rc;

/// An immutable VM string.
///
/// Equality and hashing go by content, so an `LStr` built outside the
/// intern table still finds entries keyed by an interned one.
#[derive(Clone)]
pub struct LStr(Rc<str>);

impl LStr {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether both handles point at the same allocation.
    pub fn ptr_eq(a: &LStr, b: &LStr) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }

    fn is_unreferenced(&self) -> bool {
        Rc::strong_count(&self.0) == 1
    }
}

impl From<&str> for LStr {
    fn from(s: &str) -> Self {
        LStr(Rc::from(s))
    }
}

impl From<String> for LStr {
    fn from(s: String) -> Self {
        LStr(Rc::from(s))
    }
}

impl Deref for LStr {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for LStr {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq for LStr {
    fn eq(&self, other: &Self) -> bool {
        LStr::ptr_eq(self, other) || *self.0 == *other.0
    }
}

impl Eq for LStr {}

impl Hash for LStr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state)
    }
}

impl fmt::Debug for LStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for LStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intern table. Fixed strings survive [`StringTable::sweep`] for the
/// lifetime of the table.
#[derive(Debug, Default)]
pub struct StringTable {
    strings: HashSet<LStr>,
    fixed: HashSet<LStr>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, s: &str) -> LStr {
        if let Some(existing) = self.strings.get(s) {
            return existing.clone();
        }
        let interned = LStr::from(s);
        self.strings.insert(interned.clone());
        interned
    }

    /// Pin an interned string so it is never collected.
    pub fn fix(&mut self, s: &LStr) {
        let interned = self.intern(s);
        self.fixed.insert(interned);
    }

    pub fn is_fixed(&self, s: &str) -> bool {
        self.fixed.contains(s)
    }

    pub fn contains(&self, s: &str) -> bool {
        self.strings.contains(s)
    }

    /// Drop every string that is neither fixed nor referenced outside the
    /// table. Returns how many were dropped.
    pub fn sweep(&mut self) -> usize {
        let before = self.strings.len();
        let fixed = &self.fixed;
        self.strings
            .retain(|s| fixed.contains(s.as_str()) || !s.is_unreferenced());
        before - self.strings.len()
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}
