//! Display names, honoring a string-valued `__type` override.

use super::event::Registry;
use crate::value::{LStr, Value};
use crate::vm::VM;

pub fn type_name(value: &Value, registry: &Registry) -> LStr {
    if value.kind().carries_overrides() {
        if let Some(map) = value.overrides() {
            if let Some(Value::Str(name)) = map.get_short_str(registry.type_key()) {
                return name;
            }
        }
    }
    registry.type_name(value.kind()).clone()
}

impl VM {
    pub fn type_name(&self, value: &Value) -> LStr {
        type_name(value, self.registry())
    }
}
