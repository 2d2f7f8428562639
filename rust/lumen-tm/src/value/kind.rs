//! Runtime value kinds and their built-in display names.

use serde::{Deserialize, Serialize};
use strum::{EnumCount, EnumIter};

/// Kind tag of a runtime value.
///
/// `NoValue` and `Proto` are internal-only: no [`Value`](super::Value)
/// reports them, but they keep a slot in the name table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumCount, EnumIter,
)]
#[repr(u8)]
pub enum ValueKind {
    NoValue,
    Nil,
    Boolean,
    LightUserdata,
    Number,
    String,
    Table,
    Function,
    Userdata,
    Thread,
    Proxy,
    Proto,
}

// Indexed by `ValueKind as usize`; the array length ties it to the enum.
const TYPE_NAMES: [&str; ValueKind::COUNT] = [
    "no value", "nil", "boolean", "userdata", "number", "string", "table", "function",
    "userdata", "thread", "proxy", "proto",
];

impl ValueKind {
    pub fn ordinal(self) -> usize {
        self as usize
    }

    pub fn builtin_name(self) -> &'static str {
        TYPE_NAMES[self.ordinal()]
    }

    pub fn is_internal(self) -> bool {
        matches!(self, ValueKind::NoValue | ValueKind::Proto)
    }

    /// Kinds that may have an override map attached.
    pub fn carries_overrides(self) -> bool {
        matches!(self, ValueKind::Table | ValueKind::Userdata | ValueKind::Proxy)
    }
}
