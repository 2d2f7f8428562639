//! Diagnostics for operations that found no handler.

use tracing::debug;

use super::event::Event;
use crate::error::VmError;
use crate::value::number::to_number;
use crate::value::Value;
use crate::vm::VM;

/// Pick the failure category for `event` on `(p1, p2)` when neither operand
/// has a handler.
pub fn classify(vm: &VM, p1: &Value, p2: &Value, event: Event) -> VmError {
    debug!(
        %event,
        lhs = %vm.type_name(p1),
        rhs = %vm.type_name(p2),
        "no handler for event"
    );
    match event {
        Event::Concat => concat_error(vm, p1, p2),
        e if e.is_bitwise() => {
            if to_number(p1).is_some() && to_number(p2).is_some() {
                VmError::NoIntegerRep
            } else {
                arith_operand_error(vm, p1, p2, "perform bitwise operation on")
            }
        }
        Event::Lt | Event::Le => VmError::Compare {
            lhs: vm.type_name(p1).to_string(),
            rhs: vm.type_name(p2).to_string(),
        },
        _ => arith_operand_error(vm, p1, p2, "perform arithmetic on"),
    }
}

/// "attempt to {action} a {type} value" naming `value`'s display type.
pub fn operand_type_error(vm: &VM, action: &'static str, value: &Value) -> VmError {
    VmError::OperandType {
        action,
        type_name: vm.type_name(value).to_string(),
    }
}

// Blame the first operand that is not numerically convertible.
fn arith_operand_error(vm: &VM, p1: &Value, p2: &Value, action: &'static str) -> VmError {
    let culprit = if to_number(p1).is_none() { p1 } else { p2 };
    operand_type_error(vm, action, culprit)
}

fn concat_error(vm: &VM, p1: &Value, p2: &Value) -> VmError {
    let concatenable = |v: &Value| matches!(v, Value::Str(_) | Value::Int(_) | Value::Float(_));
    let culprit = if concatenable(p1) { p2 } else { p1 };
    VmError::Concat {
        lhs: vm.type_name(p1).to_string(),
        rhs: vm.type_name(p2).to_string(),
        operand: vm.type_name(culprit).to_string(),
    }
}
