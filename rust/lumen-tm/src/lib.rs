//! Lumen TM: tag-method dispatch for a dynamically typed VM.
//!
//! Values may carry an override map binding event names (`__add`,
//! `__index`, ...) to handlers. This crate resolves those handlers, calls
//! them through the VM's call primitive, and produces the categorized
//! failure when an operation has no built-in meaning and no handler.

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod meta;
pub mod ops;
pub mod value;
pub mod vm;

pub use config::{ConfigError, DispatchConfig};
pub use error::VmError;
pub use meta::{CallShape, Event, OrderResult, Registry};
pub use ops::WeakMode;
pub use value::{LStr, OverrideMap, Proxy, Table, Userdata, Value, ValueKind};
pub use vm::{CallOrigin, VM};
