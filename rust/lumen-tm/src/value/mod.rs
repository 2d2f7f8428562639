//! Runtime value representation: just enough of it for dispatch.

pub mod kind;
pub mod number;
pub mod strings;
pub mod table;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

pub use kind::ValueKind;
pub use strings::{LStr, StringTable};
pub use table::{OverrideMap, Proxy, Table, Userdata};

use crate::error::VmError;
use crate::vm::VM;

/// Signature of a host function callable from the VM.
pub type NativeFn = dyn Fn(&mut VM, &[Value]) -> Result<Vec<Value>, VmError>;

pub struct Function {
    pub name: String,
    native: Box<NativeFn>,
}

impl Function {
    pub fn new<F>(name: impl Into<String>, native: F) -> Self
    where
        F: Fn(&mut VM, &[Value]) -> Result<Vec<Value>, VmError> + 'static,
    {
        Self {
            name: name.into(),
            native: Box::new(native),
        }
    }

    pub(crate) fn invoke(&self, vm: &mut VM, args: &[Value]) -> Result<Vec<Value>, VmError> {
        (self.native)(vm, args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.name)
    }
}

/// Runtime values. Reference kinds compare by identity.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(LStr),
    Table(Rc<Table>),
    Function(Rc<Function>),
    LightUserdata(usize),
    Userdata(Rc<Userdata>),
    Thread(u64),
    Proxy(Rc<Proxy>),
}

impl Value {
    pub fn table(table: Table) -> Value {
        Value::Table(Rc::new(table))
    }

    /// A fresh table with `map` attached.
    pub fn table_with(map: Rc<OverrideMap>) -> Value {
        let t = Table::new();
        t.set_overrides(Some(map));
        Value::table(t)
    }

    pub fn function<F>(name: impl Into<String>, native: F) -> Value
    where
        F: Fn(&mut VM, &[Value]) -> Result<Vec<Value>, VmError> + 'static,
    {
        Value::Function(Rc::new(Function::new(name, native)))
    }

    pub fn userdata(u: Userdata) -> Value {
        Value::Userdata(Rc::new(u))
    }

    pub fn proxy(inner: Value) -> Value {
        Value::Proxy(Rc::new(Proxy::new(inner)))
    }

    pub fn proxy_with(inner: Value, map: Rc<OverrideMap>) -> Value {
        let p = Proxy::new(inner);
        p.set_overrides(Some(map));
        Value::Proxy(Rc::new(p))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Nil => ValueKind::Nil,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Int(_) | Value::Float(_) => ValueKind::Number,
            Value::Str(_) => ValueKind::String,
            Value::Table(_) => ValueKind::Table,
            Value::Function(_) => ValueKind::Function,
            Value::LightUserdata(_) => ValueKind::LightUserdata,
            Value::Userdata(_) => ValueKind::Userdata,
            Value::Thread(_) => ValueKind::Thread,
            Value::Proxy(_) => ValueKind::Proxy,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Only nil and false are falsy.
    pub fn is_falsy(&self) -> bool {
        matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn is_truthy(&self) -> bool {
        !self.is_falsy()
    }

    pub fn as_str(&self) -> Option<&LStr> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Rc<Table>> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_proxy(&self) -> Option<&Rc<Proxy>> {
        match self {
            Value::Proxy(p) => Some(p),
            _ => None,
        }
    }

    /// Override map of a table, full userdata or proxy, if one is attached.
    pub fn overrides(&self) -> Option<Rc<OverrideMap>> {
        match self {
            Value::Table(t) => t.overrides(),
            Value::Userdata(u) => u.overrides(),
            Value::Proxy(p) => p.overrides(),
            _ => None,
        }
    }

    /// Attach or detach an override map. Returns `false` for kinds that
    /// cannot carry one.
    pub fn set_overrides(&self, map: Option<Rc<OverrideMap>>) -> bool {
        match self {
            Value::Table(t) => t.set_overrides(map),
            Value::Userdata(u) => u.set_overrides(map),
            Value::Proxy(p) => p.set_overrides(map),
            _ => return false,
        }
        true
    }

    /// Primitive equality, no handlers consulted. Numbers compare across
    /// integer and float representations.
    pub fn raw_equal(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(i), Value::Float(f)) | (Value::Float(f), Value::Int(i)) => {
                number::float_to_integer(*f) == Some(*i)
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::LightUserdata(a), Value::LightUserdata(b)) => a == b,
            (Value::Userdata(a), Value::Userdata(b)) => Rc::ptr_eq(a, b),
            (Value::Thread(a), Value::Thread(b)) => a == b,
            (Value::Proxy(a), Value::Proxy(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub(crate) fn normalize_key(self) -> Value {
        match self {
            Value::Float(f) => match number::float_to_integer(f) {
                Some(i) => Value::Int(i),
                None => Value::Float(f),
            },
            other => other,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.raw_equal(other)
    }
}

// NaN never reaches a table key, which keeps `Eq` reflexive where it matters.
impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(&self.clone().normalize_key()).hash(state);
        match self {
            Value::Nil => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(n) => n.hash(state),
            Value::Float(f) => match number::float_to_integer(*f) {
                Some(i) => i.hash(state),
                None => f.to_bits().hash(state),
            },
            Value::Str(s) => s.hash(state),
            Value::Table(t) => Rc::as_ptr(t).hash(state),
            Value::Function(f) => Rc::as_ptr(f).cast::<()>().hash(state),
            Value::LightUserdata(p) => p.hash(state),
            Value::Userdata(u) => Rc::as_ptr(u).hash(state),
            Value::Thread(id) => id.hash(state),
            Value::Proxy(p) => Rc::as_ptr(p).hash(state),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Table(t) => write!(f, "table: {:p}", Rc::as_ptr(t)),
            Value::Function(func) => write!(f, "function: {}", func.name),
            Value::LightUserdata(p) => write!(f, "userdata: {:#x}", p),
            Value::Userdata(u) => write!(f, "userdata: {:p}", Rc::as_ptr(u)),
            Value::Thread(id) => write!(f, "thread: {}", id),
            Value::Proxy(p) => write!(f, "proxy: {:p} -> {:?}", Rc::as_ptr(p), p.inner()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(LStr::from(s))
    }
}

impl From<LStr> for Value {
    fn from(s: LStr) -> Self {
        Value::Str(s)
    }
}
