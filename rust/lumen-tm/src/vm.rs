//! VM state shared by every dispatch path: the evaluation stack, the pinned
//! name registry, and the call primitive handlers run through.

use std::rc::Rc;
use tracing::trace;

use crate::config::DispatchConfig;
use crate::error::VmError;
use crate::meta::{self, Event, Registry};
use crate::value::{Function, LStr, StringTable, Value};

/// Where a call came from. Only calls made on behalf of interpreted code
/// may suspend; native-originated calls reject suspension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOrigin {
    Interpreted,
    Native,
}

pub struct VM {
    pub strings: StringTable,
    registry: Registry,
    /// Evaluation stack. Slots are addressed by index, never by reference,
    /// because any nested call may grow and reallocate it.
    pub(crate) stack: Vec<Value>,
    config: DispatchConfig,
    call_depth: usize,
    non_yieldable: usize,
}

impl Default for VM {
    fn default() -> Self {
        Self::new()
    }
}

impl VM {
    pub fn new() -> Self {
        Self::with_config(DispatchConfig::default())
    }

    pub fn with_config(config: DispatchConfig) -> Self {
        let mut strings = StringTable::new();
        let registry = Registry::initialize(&mut strings);
        Self {
            strings,
            registry,
            stack: Vec::new(),
            config,
            call_depth: 0,
            non_yieldable: 0,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn intern(&mut self, s: &str) -> LStr {
        self.strings.intern(s)
    }

    // --- Stack ---

    pub fn top(&self) -> usize {
        self.stack.len()
    }

    /// Push a value, returning the slot it landed in.
    pub fn push(&mut self, value: Value) -> Result<usize, VmError> {
        if self.stack.len() >= self.config.max_stack_slots {
            return Err(VmError::StackExhausted(self.config.max_stack_slots));
        }
        self.stack.push(value);
        Ok(self.stack.len() - 1)
    }

    pub fn pop(&mut self) -> Value {
        self.stack.pop().unwrap_or_default()
    }

    /// Value at `slot`; nil above the top.
    pub fn get(&self, slot: usize) -> Value {
        self.stack.get(slot).cloned().unwrap_or_default()
    }

    /// Store into `slot`, filling any gap below it with nil.
    pub fn set(&mut self, slot: usize, value: Value) -> Result<(), VmError> {
        if slot >= self.config.max_stack_slots {
            return Err(VmError::StackExhausted(self.config.max_stack_slots));
        }
        if slot >= self.stack.len() {
            self.stack.resize(slot + 1, Value::Nil);
        }
        self.stack[slot] = value;
        Ok(())
    }

    pub fn truncate(&mut self, top: usize) {
        self.stack.truncate(top);
    }

    // --- Calls ---

    pub fn call_depth(&self) -> usize {
        self.call_depth
    }

    /// Whether a running handler may suspend right now.
    pub fn is_yieldable(&self) -> bool {
        self.non_yieldable == 0
    }

    /// Request suspension of the running context. Handlers return the
    /// produced error: [`VmError::Yield`] for the interpreter loop to catch,
    /// or the fatal [`VmError::YieldAcrossNative`] when a native-originated
    /// call is active.
    pub fn suspend(&self) -> VmError {
        if self.is_yieldable() {
            VmError::Yield
        } else {
            VmError::YieldAcrossNative
        }
    }

    /// Call the value at `func` with every slot above it as arguments.
    ///
    /// On return the frame is replaced by the results, adjusted to
    /// `nresults` when given. On failure the stack is cut back to `func`
    /// and the error is returned as raised.
    pub fn call(
        &mut self,
        func: usize,
        nresults: Option<usize>,
        origin: CallOrigin,
    ) -> Result<(), VmError> {
        let result = self.call_frame(func, nresults, origin);
        if result.is_err() {
            self.stack.truncate(func);
        }
        result
    }

    fn call_frame(
        &mut self,
        func: usize,
        nresults: Option<usize>,
        origin: CallOrigin,
    ) -> Result<(), VmError> {
        if self.call_depth >= self.config.max_call_depth {
            return Err(VmError::StackOverflow(self.config.max_call_depth));
        }
        let callee = self.callable_at(func)?;
        let args = self.stack.split_off(func + 1);
        self.stack.truncate(func);
        trace!(function = %callee.name, nargs = args.len(), ?origin, "call");

        self.call_depth += 1;
        let native_origin = origin == CallOrigin::Native;
        if native_origin {
            self.non_yieldable += 1;
        }
        let outcome = callee.invoke(self, &args);
        if native_origin {
            self.non_yieldable -= 1;
        }
        self.call_depth -= 1;

        let mut results = outcome?;
        if let Some(n) = nresults {
            results.resize(n, Value::Nil);
        }
        self.stack.truncate(func);
        for r in results {
            self.push(r)?;
        }
        Ok(())
    }

    /// Resolve the function to run for the frame at `func`, inserting
    /// `__call` handlers below non-function callees. At most `max_tag_loop`
    /// handlers are followed.
    fn callable_at(&mut self, func: usize) -> Result<Rc<Function>, VmError> {
        for _ in 0..self.config.max_tag_loop {
            let callee = self.get(func);
            if let Value::Function(f) = callee {
                return Ok(f);
            }
            match meta::resolve_by_value(&callee, Event::Call, &self.registry) {
                Some(handler) => {
                    if self.stack.len() >= self.config.max_stack_slots {
                        return Err(VmError::StackExhausted(self.config.max_stack_slots));
                    }
                    self.stack.insert(func, handler);
                }
                None => return Err(meta::operand_type_error(self, "call", &callee)),
            }
        }
        Err(VmError::TagLoop("__call"))
    }

    /// Push `f` and `args`, call with all results, and pop them.
    pub fn call_value(
        &mut self,
        f: &Value,
        args: &[Value],
        origin: CallOrigin,
    ) -> Result<Vec<Value>, VmError> {
        let func = self.top();
        for v in std::iter::once(f).chain(args) {
            if let Err(e) = self.push(v.clone()) {
                self.stack.truncate(func);
                return Err(e);
            }
        }
        self.call(func, None, origin)?;
        Ok(self.stack.split_off(func))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{OverrideMap, Table};

    fn adder() -> Value {
        Value::function("adder", |_vm, args| {
            let sum = args.iter().filter_map(|v| match v {
                Value::Int(n) => Some(*n),
                _ => None,
            });
            Ok(vec![Value::Int(sum.sum())])
        })
    }

    #[test]
    fn call_replaces_frame_with_adjusted_results() {
        let mut vm = VM::new();
        vm.push(Value::from("below")).unwrap();
        let func = vm.push(adder()).unwrap();
        vm.push(Value::Int(2)).unwrap();
        vm.push(Value::Int(3)).unwrap();
        vm.call(func, Some(2), CallOrigin::Interpreted).unwrap();
        assert_eq!(vm.top(), func + 2);
        assert_eq!(vm.get(func), Value::Int(5));
        assert_eq!(vm.get(func + 1), Value::Nil);
        assert_eq!(vm.get(0), Value::from("below"));
    }

    #[test]
    fn call_depth_is_bounded() {
        let config = DispatchConfig {
            max_call_depth: 8,
            ..DispatchConfig::default()
        };
        let mut vm = VM::with_config(config);
        let recurse = Value::function("recurse", |vm, args| {
            vm.call_value(&args[0], &[args[0].clone()], CallOrigin::Interpreted)
        });
        let err = vm
            .call_value(&recurse, &[recurse.clone()], CallOrigin::Interpreted)
            .unwrap_err();
        assert_eq!(err, VmError::StackOverflow(8));
        assert_eq!(vm.top(), 0);
        assert_eq!(vm.call_depth(), 0);
    }

    #[test]
    fn stack_limit_is_enforced() {
        let config = DispatchConfig {
            max_stack_slots: 5,
            ..DispatchConfig::default()
        };
        let mut vm = VM::with_config(config);
        for _ in 0..5 {
            vm.push(Value::Nil).unwrap();
        }
        assert_eq!(vm.push(Value::Nil), Err(VmError::StackExhausted(5)));
    }

    #[test]
    fn native_origin_rejects_suspension() {
        let mut vm = VM::new();
        let yielder = Value::function("yielder", |vm, _| Err(vm.suspend()));
        let err = vm.call_value(&yielder, &[], CallOrigin::Native).unwrap_err();
        assert_eq!(err, VmError::YieldAcrossNative);
        assert!(err.is_fatal());
        assert!(vm.is_yieldable());

        let err = vm
            .call_value(&yielder, &[], CallOrigin::Interpreted)
            .unwrap_err();
        assert_eq!(err, VmError::Yield);
    }

    #[test]
    fn native_boundary_covers_nested_interpreted_calls() {
        let mut vm = VM::new();
        let yielder = Value::function("yielder", |vm, _| Err(vm.suspend()));
        let outer = Value::function("outer", move |vm, _| {
            vm.call_value(&yielder, &[], CallOrigin::Interpreted)
        });
        let err = vm.call_value(&outer, &[], CallOrigin::Native).unwrap_err();
        assert_eq!(err, VmError::YieldAcrossNative);
    }

    #[test]
    fn call_handler_is_inserted_below_callee() {
        let mut vm = VM::new();
        let map = OverrideMap::new();
        map.set(
            "__call",
            Value::function("call", |_vm, args| Ok(vec![Value::Int(args.len() as i64)])),
        );
        let callable = Value::table_with(map);
        let results = vm
            .call_value(&callable, &[Value::Int(1)], CallOrigin::Interpreted)
            .unwrap();
        // Handler receives the table itself followed by the call arguments.
        assert_eq!(results, vec![Value::Int(2)]);
    }

    #[test]
    fn self_referential_call_handler_is_bounded() {
        let config = DispatchConfig {
            max_tag_loop: 50,
            ..DispatchConfig::default()
        };
        let mut vm = VM::with_config(config);
        let map = OverrideMap::new();
        let t = Value::table_with(map.clone());
        map.set("__call", t.clone());
        let err = vm
            .call_value(&t, &[Value::Int(1)], CallOrigin::Interpreted)
            .unwrap_err();
        assert_eq!(err, VmError::TagLoop("__call"));
        assert_eq!(vm.top(), 0);
    }

    #[test]
    fn call_handler_chain_reaches_function() {
        let mut vm = VM::new();
        let f = Value::function("f", |_vm, args| Ok(vec![Value::Int(args.len() as i64)]));
        let inner = Value::table_with(OverrideMap::from_entries([("__call", f)]));
        let outer = Value::table_with(OverrideMap::from_entries([("__call", inner)]));
        let results = vm
            .call_value(&outer, &[], CallOrigin::Interpreted)
            .unwrap();
        // f(inner, outer)
        assert_eq!(results, vec![Value::Int(2)]);
    }

    #[test]
    fn calling_a_plain_table_fails_with_its_type() {
        let mut vm = VM::new();
        let err = vm
            .call_value(&Value::table(Table::new()), &[], CallOrigin::Interpreted)
            .unwrap_err();
        assert_eq!(err.to_string(), "attempt to call a table value");
        assert_eq!(vm.top(), 0);
    }
}
