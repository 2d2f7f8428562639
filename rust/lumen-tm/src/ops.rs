//! Interpreter-facing operations: built-in semantics first, handlers when
//! the built-in case does not apply.

use std::cmp::Ordering;

use crate::error::VmError;
use crate::meta::{
    invoke, operand_type_error, try_binary_or_fail, try_order, try_unary, CallShape, Event,
    OrderResult,
};
use crate::value::number::{number_to_string, to_integer, to_numeric};
use crate::value::{LStr, Value};
use crate::vm::{CallOrigin, VM};

/// Weakness declared by a table's `__mode` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WeakMode {
    pub keys: bool,
    pub values: bool,
}

const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;

impl VM {
    /// Arithmetic and bitwise operators. Unary events ignore `b`.
    pub fn arith(
        &mut self,
        event: Event,
        a: &Value,
        b: &Value,
        dest: usize,
        origin: CallOrigin,
    ) -> Result<(), VmError> {
        let b = if event.is_unary() { a } else { b };
        if let Some(v) = builtin_arith(event, a, b)? {
            return self.set(dest, v);
        }
        if event.is_unary() {
            try_unary(self, a, dest, event, origin)
        } else {
            try_binary_or_fail(self, a, b, dest, event, origin)
        }
    }

    pub fn concat(
        &mut self,
        a: &Value,
        b: &Value,
        dest: usize,
        origin: CallOrigin,
    ) -> Result<(), VmError> {
        if let (Some(x), Some(y)) = (concat_piece(a), concat_piece(b)) {
            return self.set(dest, Value::Str(LStr::from(x + &y)));
        }
        try_binary_or_fail(self, a, b, dest, Event::Concat, origin)
    }

    /// Equality with `__eq` for two distinct composites of the same kind.
    pub fn equals(&mut self, a: &Value, b: &Value, origin: CallOrigin) -> Result<bool, VmError> {
        if a.raw_equal(b) {
            return Ok(true);
        }
        let same_composite_kind = matches!(
            (a, b),
            (Value::Table(_), Value::Table(_))
                | (Value::Userdata(_), Value::Userdata(_))
                | (Value::Proxy(_), Value::Proxy(_))
        );
        if !same_composite_kind {
            return Ok(false);
        }
        let (ma, mb) = (a.overrides(), b.overrides());
        let mut shape = CallShape::HAS_RESULT;
        let handler = match self.fast_tm(ma.as_deref(), Event::Eq) {
            Some(h) => h,
            None => match self.fast_tm(mb.as_deref(), Event::Eq) {
                Some(h) => {
                    shape |= CallShape::OWNER_IS_SECOND;
                    h
                }
                None => return Ok(false),
            },
        };
        let result = self.invoke_into_scratch(&handler, a, b, shape, origin)?;
        Ok(result.is_truthy())
    }

    pub fn less_than(&mut self, a: &Value, b: &Value, origin: CallOrigin) -> Result<bool, VmError> {
        if let Some(ord) = builtin_compare(a, b) {
            return Ok(ord == Some(Ordering::Less));
        }
        match try_order(self, a, b, Event::Lt, origin)? {
            OrderResult::True => Ok(true),
            OrderResult::False => Ok(false),
            OrderResult::NoHandler => Err(self.compare_error(a, b)),
        }
    }

    /// `a <= b`; without `__le`, falls back to `not (b < a)` through `__lt`.
    pub fn less_equal(&mut self, a: &Value, b: &Value, origin: CallOrigin) -> Result<bool, VmError> {
        if let Some(ord) = builtin_compare(a, b) {
            return Ok(matches!(ord, Some(Ordering::Less | Ordering::Equal)));
        }
        match try_order(self, a, b, Event::Le, origin)? {
            OrderResult::True => return Ok(true),
            OrderResult::False => return Ok(false),
            OrderResult::NoHandler => {}
        }
        match try_order(self, b, a, Event::Lt, origin)? {
            OrderResult::True => Ok(false),
            OrderResult::False => Ok(true),
            OrderResult::NoHandler => Err(self.compare_error(a, b)),
        }
    }

    pub fn length(&mut self, v: &Value, dest: usize, origin: CallOrigin) -> Result<(), VmError> {
        let handler = match v {
            Value::Str(s) => return self.set(dest, Value::Int(s.len() as i64)),
            Value::Table(t) => {
                let map = t.overrides();
                match self.fast_tm(map.as_deref(), Event::Len) {
                    Some(h) => h,
                    None => return self.set(dest, Value::Int(t.raw_len())),
                }
            }
            Value::Proxy(p) => match self.tm_by_value(v, Event::Len) {
                Some(h) => h,
                None => {
                    let inner = p.inner().clone();
                    return self.length(&inner, dest, origin);
                }
            },
            other => self
                .tm_by_value(other, Event::Len)
                .ok_or_else(|| operand_type_error(self, "get length of", other))?,
        };
        invoke(self, &handler, v, v, dest, CallShape::HAS_RESULT, origin)
    }

    /// `t[key]`, following `__index` chains.
    pub fn index(
        &mut self,
        t: &Value,
        key: &Value,
        dest: usize,
        origin: CallOrigin,
    ) -> Result<(), VmError> {
        let mut current = t.clone();
        for _ in 0..self.config().max_tag_loop {
            let handler = match &current {
                Value::Table(table) => {
                    let raw = table.raw_get(key);
                    if !raw.is_nil() {
                        return self.set(dest, raw);
                    }
                    let map = table.overrides();
                    match self.fast_tm(map.as_deref(), Event::Index) {
                        Some(h) => h,
                        None => return self.set(dest, Value::Nil),
                    }
                }
                Value::Proxy(p) => match self.tm_by_value(&current, Event::Index) {
                    Some(h) => h,
                    None => {
                        let inner = p.inner().clone();
                        current = inner;
                        continue;
                    }
                },
                other => self
                    .tm_by_value(other, Event::Index)
                    .ok_or_else(|| operand_type_error(self, "index", other))?,
            };
            if let Value::Function(_) = handler {
                return invoke(self, &handler, &current, key, dest, CallShape::HAS_RESULT, origin);
            }
            current = handler;
        }
        Err(VmError::TagLoop("__index"))
    }

    /// `t[key] = val`, following `__newindex` chains.
    pub fn new_index(
        &mut self,
        t: &Value,
        key: &Value,
        val: &Value,
        origin: CallOrigin,
    ) -> Result<(), VmError> {
        let mut current = t.clone();
        for _ in 0..self.config().max_tag_loop {
            let handler = match &current {
                Value::Table(table) => {
                    if !table.raw_get(key).is_nil() {
                        return table.raw_set(key.clone(), val.clone());
                    }
                    let map = table.overrides();
                    match self.fast_tm(map.as_deref(), Event::NewIndex) {
                        Some(h) => h,
                        None => return table.raw_set(key.clone(), val.clone()),
                    }
                }
                Value::Proxy(p) => match self.tm_by_value(&current, Event::NewIndex) {
                    Some(h) => h,
                    None => {
                        let inner = p.inner().clone();
                        current = inner;
                        continue;
                    }
                },
                other => self
                    .tm_by_value(other, Event::NewIndex)
                    .ok_or_else(|| operand_type_error(self, "index", other))?,
            };
            if let Value::Function(_) = handler {
                let staged = self.push(val.clone())?;
                let result = invoke(self, &handler, &current, key, staged, CallShape::empty(), origin);
                self.truncate(staged);
                return result;
            }
            current = handler;
        }
        Err(VmError::TagLoop("__newindex"))
    }

    /// Run `v`'s `__gc` handler, if any. Returns whether one ran.
    ///
    /// The handler is called as `__gc(v)`, a one-argument frame that none of
    /// the [`CallShape`]s produce.
    pub fn finalize(&mut self, v: &Value) -> Result<bool, VmError> {
        let map = v.overrides();
        let Some(handler) = self.fast_tm(map.as_deref(), Event::Gc) else {
            return Ok(false);
        };
        let func = self.top();
        self.push(handler)
            .and_then(|_| self.push(v.clone()))
            .and_then(|_| self.call(func, Some(0), CallOrigin::Native))
            .map_err(|e| {
                self.truncate(func);
                VmError::Finalizer(e.to_string())
            })?;
        Ok(true)
    }

    pub fn weak_mode(&self, v: &Value) -> WeakMode {
        let map = v.overrides();
        match self.fast_tm(map.as_deref(), Event::Mode) {
            Some(Value::Str(mode)) => WeakMode {
                keys: mode.contains('k'),
                values: mode.contains('v'),
            },
            _ => WeakMode::default(),
        }
    }

    fn invoke_into_scratch(
        &mut self,
        handler: &Value,
        a: &Value,
        b: &Value,
        shape: CallShape,
        origin: CallOrigin,
    ) -> Result<Value, VmError> {
        let scratch = self.push(Value::Nil)?;
        let outcome = invoke(self, handler, a, b, scratch, shape, origin);
        let result = self.get(scratch);
        self.truncate(scratch);
        outcome.map(|_| result)
    }

    fn compare_error(&self, a: &Value, b: &Value) -> VmError {
        VmError::Compare {
            lhs: self.type_name(a).to_string(),
            rhs: self.type_name(b).to_string(),
        }
    }
}

fn concat_piece(v: &Value) -> Option<String> {
    match v {
        Value::Str(s) => Some(s.to_string()),
        Value::Int(_) | Value::Float(_) => number_to_string(v),
        _ => None,
    }
}

/// Built-in result, or `None` when the operands need a handler.
fn builtin_arith(event: Event, a: &Value, b: &Value) -> Result<Option<Value>, VmError> {
    if event.is_bitwise() {
        let (Some(x), Some(y)) = (to_integer(a), to_integer(b)) else {
            return Ok(None);
        };
        let r = match event {
            Event::BAnd => x & y,
            Event::BOr => x | y,
            Event::BXor => x ^ y,
            Event::Shl => shift_left(x, y),
            Event::Shr => shift_left(x, y.wrapping_neg()),
            Event::BNot => !x,
            _ => return Ok(None),
        };
        return Ok(Some(Value::Int(r)));
    }
    if !event.is_arithmetic() {
        return Ok(None);
    }
    let (Some(x), Some(y)) = (to_numeric(a), to_numeric(b)) else {
        return Ok(None);
    };
    if let (Value::Int(i), Value::Int(j)) = (&x, &y) {
        if !matches!(event, Event::Div | Event::Pow) {
            return int_arith(event, *i, *j).map(|r| r.map(Value::Int));
        }
    }
    let (Some(x), Some(y)) = (as_float(&x), as_float(&y)) else {
        return Ok(None);
    };
    Ok(float_arith(event, x, y).map(Value::Float))
}

fn as_float(v: &Value) -> Option<f64> {
    match v {
        Value::Int(n) => Some(*n as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn int_arith(event: Event, i: i64, j: i64) -> Result<Option<i64>, VmError> {
    Ok(Some(match event {
        Event::Add => i.wrapping_add(j),
        Event::Sub => i.wrapping_sub(j),
        Event::Mul => i.wrapping_mul(j),
        Event::Unm => i.wrapping_neg(),
        Event::IDiv => {
            if j == 0 {
                return Err(VmError::IntegerDivideByZero("//"));
            }
            if j == -1 {
                i.wrapping_neg()
            } else {
                let q = i / j;
                if (i ^ j) < 0 && i % j != 0 {
                    q - 1
                } else {
                    q
                }
            }
        }
        Event::Mod => {
            if j == 0 {
                return Err(VmError::IntegerDivideByZero("%"));
            }
            if j == -1 {
                0
            } else {
                let r = i % j;
                if r != 0 && (r ^ j) < 0 {
                    r + j
                } else {
                    r
                }
            }
        }
        _ => return Ok(None),
    }))
}

fn float_arith(event: Event, x: f64, y: f64) -> Option<f64> {
    Some(match event {
        Event::Add => x + y,
        Event::Sub => x - y,
        Event::Mul => x * y,
        Event::Div => x / y,
        Event::Pow => x.powf(y),
        Event::IDiv => (x / y).floor(),
        Event::Unm => -x,
        Event::Mod => {
            let m = x % y;
            if m != 0.0 && (m < 0.0) != (y < 0.0) {
                m + y
            } else {
                m
            }
        }
        _ => return None,
    })
}

// Logical shift; negative counts shift the other way.
fn shift_left(x: i64, n: i64) -> i64 {
    if n <= -64 || n >= 64 {
        0
    } else if n >= 0 {
        ((x as u64) << n) as i64
    } else {
        ((x as u64) >> (-n)) as i64
    }
}

/// Built-in ordering for number/number and string/string pairs. The outer
/// `None` means no built-in order applies; the inner one marks NaN.
fn builtin_compare(a: &Value, b: &Value) -> Option<Option<Ordering>> {
    Some(match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
        (Value::Int(i), Value::Float(f)) => int_float_cmp(*i, *f),
        (Value::Float(f), Value::Int(i)) => int_float_cmp(*i, *f).map(Ordering::reverse),
        (Value::Str(x), Value::Str(y)) => Some(x.as_bytes().cmp(y.as_bytes())),
        _ => return None,
    })
}

// Exact comparison of an integer against a float, without rounding `i`.
fn int_float_cmp(i: i64, f: f64) -> Option<Ordering> {
    if f.is_nan() {
        return None;
    }
    if f >= TWO_POW_63 {
        return Some(Ordering::Less);
    }
    if f < -TWO_POW_63 {
        return Some(Ordering::Greater);
    }
    let floor = f.floor();
    match i.cmp(&(floor as i64)) {
        Ordering::Equal if f > floor => Some(Ordering::Less),
        ord => Some(ord),
    }
}
