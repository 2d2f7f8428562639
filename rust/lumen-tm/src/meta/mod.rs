//! Tag-method dispatch: resolving, invoking and classifying handlers bound
//! to events through override maps.

pub mod binary;
pub mod event;
pub mod failure;
pub mod invoke;
pub mod resolve;
pub mod typename;

pub use binary::{find_binary, try_binary, try_binary_or_fail, try_order, try_unary, OrderResult, Resolved};
pub use event::{Event, Registry, TYPE_KEY};
pub use failure::{classify, operand_type_error};
pub use invoke::{invoke, unwrap_operands, CallShape};
pub use resolve::{fast_resolve, resolve_by_value, resolve_cached};
pub use typename::type_name;
