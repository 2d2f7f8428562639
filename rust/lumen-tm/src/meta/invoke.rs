//! Building and running the call frame for a resolved handler.

use bitflags::bitflags;
use std::rc::Rc;
use tracing::debug;

use crate::error::VmError;
use crate::value::Value;
use crate::vm::{CallOrigin, VM};

bitflags! {
    /// How a handler is called and what happens to its result.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CallShape: u8 {
        /// Store the single result into the target slot. Without it the
        /// slot's current value is passed as one extra argument.
        const HAS_RESULT = 1 << 0;
        /// Binary operator: the owner is passed first as receiver.
        const BINARY_OP = 1 << 1;
        /// The handler was resolved on the second operand.
        const OWNER_IS_SECOND = 1 << 2;
    }
}

fn unwrap_proxy(v: &Value) -> Value {
    v.as_proxy().map_or_else(|| v.clone(), |p| p.inner().clone())
}

/// Values presented to the handler for `(operand1, operand2)`.
///
/// The non-owning operand is unwrapped if it is a proxy. When both operands
/// are the same proxy and the call is a binary operator, both are
/// unwrapped whichever side owns the handler.
pub fn unwrap_operands(operand1: &Value, operand2: &Value, shape: CallShape) -> (Value, Value) {
    let same_proxy = match (operand1.as_proxy(), operand2.as_proxy()) {
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        _ => false,
    };
    if same_proxy && shape.contains(CallShape::BINARY_OP) {
        return (unwrap_proxy(operand1), unwrap_proxy(operand2));
    }
    if shape.contains(CallShape::OWNER_IS_SECOND) {
        (unwrap_proxy(operand1), operand2.clone())
    } else {
        (operand1.clone(), unwrap_proxy(operand2))
    }
}

/// Call `handler` for `(operand1, operand2)`.
///
/// Binary operators are called as `handler(owner, a1, a2)`, everything else
/// as `handler(a1, a2)`. With [`CallShape::HAS_RESULT`] the handler's first
/// result lands in `slot`; otherwise the value staged in `slot` is appended
/// as a third argument and results are dropped. `slot` is a stack index, so
/// it stays valid however far the stack grows during the call. Handler
/// failures are returned unchanged.
pub fn invoke(
    vm: &mut VM,
    handler: &Value,
    operand1: &Value,
    operand2: &Value,
    slot: usize,
    shape: CallShape,
    origin: CallOrigin,
) -> Result<(), VmError> {
    let (a1, a2) = unwrap_operands(operand1, operand2, shape);
    let func = vm.top();
    debug!(?handler, ?shape, ?origin, "invoking handler");
    if let Err(e) = push_frame(vm, handler, a1, a2, slot, shape) {
        vm.truncate(func);
        return Err(e);
    }
    let has_result = shape.contains(CallShape::HAS_RESULT);
    vm.call(func, Some(usize::from(has_result)), origin)?;
    if has_result {
        let result = vm.pop();
        vm.set(slot, result)?;
    }
    Ok(())
}

fn push_frame(
    vm: &mut VM,
    handler: &Value,
    a1: Value,
    a2: Value,
    slot: usize,
    shape: CallShape,
) -> Result<(), VmError> {
    vm.push(handler.clone())?;
    if shape.contains(CallShape::BINARY_OP) {
        let owner = if shape.contains(CallShape::OWNER_IS_SECOND) {
            a2.clone()
        } else {
            a1.clone()
        };
        vm.push(owner)?;
    }
    vm.push(a1)?;
    vm.push(a2)?;
    if !shape.contains(CallShape::HAS_RESULT) {
        let staged = vm.get(slot);
        vm.push(staged)?;
    }
    Ok(())
}
