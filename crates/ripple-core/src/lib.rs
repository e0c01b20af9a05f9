#![forbid(unsafe_code)]

//! Core change-notification primitives for ripple.
//!
//! This crate provides the building blocks the rest of the workspace is
//! assembled from:
//!
//! - [`ListenerList`]: the generic listener registry. Snapshot-before-dispatch
//!   delivery, buffered reentrant mutation, per-listener panic isolation.
//! - [`InvalidationListener`] / [`ChangeListener`]: the listener capability
//!   traits, implemented for free by closures.
//! - [`Var`]: a shared, writable observable value (`Rc<RefCell<..>>` handle;
//!   clones share state).
//! - [`uncaught`]: the process-wide sink that listener panics are forwarded
//!   to instead of unwinding into the mutator.
//!
//! # Concurrency model
//!
//! Single-threaded, cooperative, reentrant-by-design. All handles are
//! `Rc`-based and `!Send`; there is no internal locking. Listeners may freely
//! mutate the observable they are registered on from inside their own
//! callback — the registry defers such mutations until the current delivery
//! completes.
//!
//! # Invariants
//!
//! 1. Listeners fire in registration order.
//! 2. Within one fire, invalidation listeners are fully delivered before
//!    change listeners.
//! 3. A listener added during dispatch is first notified by the *next* fire,
//!    never the current one.
//! 4. A panicking listener never prevents delivery to the remaining
//!    listeners and never unwinds into the code that triggered the fire.

pub mod listener;
pub mod registry;
pub mod uncaught;
pub mod value;

pub use listener::{ChangeListener, InvalidationListener, listener_eq};
pub use registry::ListenerList;
pub use uncaught::{UncaughtError, report, reset_uncaught_hook, set_uncaught_hook};
pub use value::{Var, WeakVar};
