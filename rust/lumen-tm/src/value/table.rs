//! Composite values: tables, full userdata, proxies, and the override maps
//! they may carry.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::strings::LStr;
use super::Value;
use crate::error::VmError;

/// Per-value mapping from event name to handler.
///
/// The absence mask records events known to be unbound. Binding or removing
/// keys never clears it: once a bit is set, a handler added later for that
/// event may stay invisible to cached lookups until
/// [`OverrideMap::clear_absence_cache`] is called.
#[derive(Default)]
pub struct OverrideMap {
    entries: RefCell<HashMap<LStr, Value>>,
    absent: Cell<u8>,
}

impl OverrideMap {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Build a map from `(key, value)` pairs.
    pub fn from_entries<K, I>(entries: I) -> Rc<Self>
    where
        K: Into<LStr>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let map = Self::default();
        for (k, v) in entries {
            map.set(k, v);
        }
        Rc::new(map)
    }

    /// Lookup by short string key. A key bound to nil reads as absent.
    pub fn get_short_str(&self, key: &str) -> Option<Value> {
        self.entries.borrow().get(key).cloned()
    }

    /// Bind `key` to `value`; binding nil removes the key.
    pub fn set(&self, key: impl Into<LStr>, value: Value) {
        let key = key.into();
        let mut entries = self.entries.borrow_mut();
        if value.is_nil() {
            entries.remove(&key);
        } else {
            entries.insert(key, value);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn absence_bits(&self) -> u8 {
        self.absent.get()
    }

    pub fn is_marked_absent(&self, bit: usize) -> bool {
        debug_assert!(bit < 8);
        self.absent.get() & (1u8 << bit) != 0
    }

    pub(crate) fn mark_absent(&self, bit: usize) {
        debug_assert!(bit < 8);
        self.absent.set(self.absent.get() | (1u8 << bit));
    }

    pub fn clear_absence_cache(&self) {
        self.absent.set(0);
    }
}

impl fmt::Debug for OverrideMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.borrow();
        let mut keys: Vec<&str> = entries.keys().map(|k| k.as_str()).collect();
        keys.sort_unstable();
        f.debug_struct("OverrideMap")
            .field("keys", &keys)
            .field("absent", &format_args!("{:#010b}", self.absent.get()))
            .finish()
    }
}

/// Slot holding the optional override map of a composite value.
#[derive(Debug, Default)]
pub(crate) struct OverrideSlot(RefCell<Option<Rc<OverrideMap>>>);

impl OverrideSlot {
    pub(crate) fn get(&self) -> Option<Rc<OverrideMap>> {
        self.0.borrow().clone()
    }

    pub(crate) fn set(&self, map: Option<Rc<OverrideMap>>) {
        *self.0.borrow_mut() = map;
    }
}

#[derive(Debug, Default)]
pub struct Table {
    hash: RefCell<HashMap<Value, Value>>,
    overrides: OverrideSlot,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw_get(&self, key: &Value) -> Value {
        self.hash.borrow().get(key).cloned().unwrap_or_default()
    }

    pub fn raw_get_str(&self, key: &str) -> Value {
        self.raw_get(&Value::Str(LStr::from(key)))
    }

    /// Raw assignment. Nil and NaN keys are rejected; a nil value removes
    /// the key.
    pub fn raw_set(&self, key: Value, value: Value) -> Result<(), VmError> {
        match &key {
            Value::Nil => return Err(VmError::InvalidKey("nil")),
            Value::Float(f) if f.is_nan() => return Err(VmError::InvalidKey("NaN")),
            _ => {}
        }
        let key = key.normalize_key();
        let mut hash = self.hash.borrow_mut();
        if value.is_nil() {
            hash.remove(&key);
        } else {
            hash.insert(key, value);
        }
        Ok(())
    }

    /// Border length: the largest `n` such that keys `1..=n` are all bound.
    pub fn raw_len(&self) -> i64 {
        let hash = self.hash.borrow();
        let mut n = 0i64;
        while hash.contains_key(&Value::Int(n + 1)) {
            n += 1;
        }
        n
    }

    pub fn overrides(&self) -> Option<Rc<OverrideMap>> {
        self.overrides.get()
    }

    pub fn set_overrides(&self, map: Option<Rc<OverrideMap>>) {
        self.overrides.set(map);
    }
}

/// Full userdata: an opaque host payload plus an optional override map.
pub struct Userdata {
    payload: Box<dyn Any>,
    overrides: OverrideSlot,
}

impl Userdata {
    pub fn new(payload: impl Any) -> Self {
        Self {
            payload: Box::new(payload),
            overrides: OverrideSlot::default(),
        }
    }

    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref()
    }

    pub fn overrides(&self) -> Option<Rc<OverrideMap>> {
        self.overrides.get()
    }

    pub fn set_overrides(&self, map: Option<Rc<OverrideMap>>) {
        self.overrides.set(map);
    }
}

impl fmt::Debug for Userdata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Userdata")
            .field("overrides", &self.overrides)
            .finish_non_exhaustive()
    }
}

/// Wrapper forwarding to exactly one inner value.
#[derive(Debug)]
pub struct Proxy {
    inner: Value,
    overrides: OverrideSlot,
}

impl Proxy {
    pub fn new(inner: Value) -> Self {
        Self {
            inner,
            overrides: OverrideSlot::default(),
        }
    }

    pub fn inner(&self) -> &Value {
        &self.inner
    }

    pub fn overrides(&self) -> Option<Rc<OverrideMap>> {
        self.overrides.get()
    }

    pub fn set_overrides(&self, map: Option<Rc<OverrideMap>>) {
        self.overrides.set(map);
    }
}
