//! Overridable events and the pinned name registry.

use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{EnumCount, EnumIter, IntoEnumIterator};

use crate::value::{LStr, StringTable, ValueKind};

/// Operations user code may intercept. Declaration order is the ordinal
/// order; everything up to and including `Eq` is cacheable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumCount, EnumIter,
)]
#[repr(u8)]
pub enum Event {
    Index,
    NewIndex,
    Gc,
    Mode,
    Len,
    Eq,
    Add,
    Sub,
    Mul,
    Mod,
    Pow,
    Div,
    IDiv,
    BAnd,
    BOr,
    BXor,
    Shl,
    Shr,
    Unm,
    BNot,
    Lt,
    Le,
    Concat,
    Call,
}

const EVENT_NAMES: [&str; Event::COUNT] = [
    "__index", "__newindex", "__gc", "__mode", "__len", "__eq", "__add", "__sub", "__mul",
    "__mod", "__pow", "__div", "__idiv", "__band", "__bor", "__bxor", "__shl", "__shr",
    "__unm", "__bnot", "__lt", "__le", "__concat", "__call",
];

/// Override-map key holding a value's display name.
pub const TYPE_KEY: &str = "__type";

// Absence bits live in a u8.
const _: () = assert!((Event::Eq as usize) < 8);

impl Event {
    pub fn ordinal(self) -> usize {
        self as usize
    }

    pub fn raw_name(self) -> &'static str {
        EVENT_NAMES[self.ordinal()]
    }

    pub fn from_name(name: &str) -> Option<Event> {
        Event::iter().find(|e| e.raw_name() == name)
    }

    /// Events eligible for the per-map absence cache.
    pub fn is_cacheable(self) -> bool {
        self.ordinal() <= Event::Eq.ordinal()
    }

    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            Event::BAnd | Event::BOr | Event::BXor | Event::Shl | Event::Shr | Event::BNot
        )
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Event::Add
                | Event::Sub
                | Event::Mul
                | Event::Mod
                | Event::Pow
                | Event::Div
                | Event::IDiv
                | Event::Unm
        )
    }

    pub fn is_unary(self) -> bool {
        matches!(self, Event::Unm | Event::BNot)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.raw_name())
    }
}

/// Interned event and type names, pinned in the VM's string table.
#[derive(Debug)]
pub struct Registry {
    event_names: [LStr; Event::COUNT],
    type_names: [LStr; ValueKind::COUNT],
    type_key: LStr,
}

impl Registry {
    /// Intern and pin every name. Runs once per VM, before any dispatch.
    pub fn initialize(strings: &mut StringTable) -> Self {
        let mut pin = |s: &str| {
            let interned = strings.intern(s);
            strings.fix(&interned);
            interned
        };
        let event_names = std::array::from_fn(|i| pin(EVENT_NAMES[i]));
        let type_names: [LStr; ValueKind::COUNT] = {
            let kinds: Vec<ValueKind> = ValueKind::iter().collect();
            std::array::from_fn(|i| pin(kinds[i].builtin_name()))
        };
        let type_key = pin(TYPE_KEY);
        Self {
            event_names,
            type_names,
            type_key,
        }
    }

    pub fn event_name(&self, event: Event) -> &LStr {
        &self.event_names[event.ordinal()]
    }

    pub fn type_name(&self, kind: ValueKind) -> &LStr {
        &self.type_names[kind.ordinal()]
    }

    pub fn type_key(&self) -> &LStr {
        &self.type_key
    }
}
