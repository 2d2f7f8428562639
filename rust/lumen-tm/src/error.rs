//! Categorized failures raised by dispatch and the operations built on it.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum VmError {
    /// Concatenation with no `__concat` handler on either side.
    #[error("attempt to concatenate a {operand} value ({lhs} .. {rhs})")]
    Concat {
        lhs: String,
        rhs: String,
        operand: String,
    },
    /// Bitwise operation on numbers without an exact integer representation.
    #[error("number has no integer representation")]
    NoIntegerRep,
    #[error("attempt to {action} a {type_name} value")]
    OperandType {
        action: &'static str,
        type_name: String,
    },
    #[error("attempt to compare {}", describe_compare(.lhs, .rhs))]
    Compare { lhs: String, rhs: String },
    #[error("attempt to perform 'n{0}0'")]
    IntegerDivideByZero(&'static str),
    #[error("table index is {0}")]
    InvalidKey(&'static str),
    #[error("'{0}' chain too long; possible loop")]
    TagLoop(&'static str),
    #[error("stack overflow: call depth exceeded {0}")]
    StackOverflow(usize),
    #[error("stack overflow: more than {0} stack slots")]
    StackExhausted(usize),
    #[error("attempt to yield across a native call boundary")]
    YieldAcrossNative,
    /// Suspension request travelling up to the interpreter loop.
    #[error("yield")]
    Yield,
    #[error("error in __gc handler ({0})")]
    Finalizer(String),
    #[error("runtime error: {0}")]
    Runtime(String),
}

fn describe_compare(lhs: &str, rhs: &str) -> String {
    if lhs == rhs {
        format!("two {} values", lhs)
    } else {
        format!("{} with {}", lhs, rhs)
    }
}

impl VmError {
    /// Fatal misuses that an interpreter must not try to recover from.
    pub fn is_fatal(&self) -> bool {
        matches!(self, VmError::YieldAcrossNative)
    }
}
