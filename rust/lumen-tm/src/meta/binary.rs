//! Two-operand dispatch: owner selection and the tri-state order result.

use super::event::Event;
use super::failure::classify;
use super::invoke::{invoke, CallShape};
use super::resolve::resolve_by_value;
use crate::error::VmError;
use crate::value::Value;
use crate::vm::{CallOrigin, VM};

/// A handler found for a binary event, and which operand supplied it.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub handler: Value,
    pub owner_is_second: bool,
}

/// Outcome of an ordering dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderResult {
    True,
    False,
    NoHandler,
}

/// Resolve `event` on `p1`, then on `p2`. No side effects.
pub fn find_binary(vm: &VM, p1: &Value, p2: &Value, event: Event) -> Option<Resolved> {
    if let Some(handler) = resolve_by_value(p1, event, vm.registry()) {
        return Some(Resolved {
            handler,
            owner_is_second: false,
        });
    }
    resolve_by_value(p2, event, vm.registry()).map(|handler| Resolved {
        handler,
        owner_is_second: true,
    })
}

/// Dispatch a binary event, storing the handler's result at `dest`.
/// Returns `None`, having called nothing, when neither operand has a handler.
pub fn try_binary(
    vm: &mut VM,
    p1: &Value,
    p2: &Value,
    dest: usize,
    event: Event,
    origin: CallOrigin,
) -> Result<Option<Resolved>, VmError> {
    let Some(resolved) = find_binary(vm, p1, p2, event) else {
        return Ok(None);
    };
    let mut shape = CallShape::HAS_RESULT | CallShape::BINARY_OP;
    if resolved.owner_is_second {
        shape |= CallShape::OWNER_IS_SECOND;
    }
    invoke(vm, &resolved.handler, p1, p2, dest, shape, origin)?;
    Ok(Some(resolved))
}

/// [`try_binary`], raising the classified failure when no handler exists.
pub fn try_binary_or_fail(
    vm: &mut VM,
    p1: &Value,
    p2: &Value,
    dest: usize,
    event: Event,
    origin: CallOrigin,
) -> Result<(), VmError> {
    match try_binary(vm, p1, p2, dest, event, origin)? {
        Some(_) => Ok(()),
        None => Err(classify(vm, p1, p2, event)),
    }
}

/// Unary events dispatch with the operand in both positions.
pub fn try_unary(
    vm: &mut VM,
    operand: &Value,
    dest: usize,
    event: Event,
    origin: CallOrigin,
) -> Result<(), VmError> {
    try_binary_or_fail(vm, operand, operand, dest, event, origin)
}

/// Ordering dispatch through a scratch slot at the stack top.
pub fn try_order(
    vm: &mut VM,
    p1: &Value,
    p2: &Value,
    event: Event,
    origin: CallOrigin,
) -> Result<OrderResult, VmError> {
    let scratch = vm.push(Value::Nil)?;
    let found = try_binary(vm, p1, p2, scratch, event, origin);
    let result = vm.get(scratch);
    vm.truncate(scratch);
    Ok(match found? {
        None => OrderResult::NoHandler,
        Some(_) if result.is_truthy() => OrderResult::True,
        Some(_) => OrderResult::False,
    })
}
