#![forbid(unsafe_code)]

//! Bidirectional synchronization between ripple observables.
//!
//! Two binding families:
//!
//! - value bindings ([`bind`], [`bind_with`], [`unbind`]): keep two [`Var`]s
//!   equal, optionally through a [`ValueConverter`];
//! - content bindings ([`bind_list_content`] and the set/map variants): keep
//!   two same-typed collections equal by replaying change reports.
//!
//! Both families share the same shape: a single listener object installed on
//! both endpoints, an `updating` flag as the loop guard, weakly-held
//! endpoints with lazy self-detachment, and unordered-pair identity so that
//! binding and unbinding are order-insensitive.
//!
//! [`Var`]: ripple_core::Var

pub mod content;
pub mod convert;
pub mod value;

pub use content::{
    ContentBinding, bind_list_content, bind_map_content, bind_set_content, unbind_list_content,
    unbind_map_content, unbind_set_content,
};
pub use convert::{ConvertError, FnConverter, IdentityConverter, ValueConverter};
pub use value::{BindError, ValueBinding, bind, bind_with, unbind};
