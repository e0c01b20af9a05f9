#![forbid(unsafe_code)]

//! Change notification and synchronization for single-threaded, event-loop
//! style programs.
//!
//! This facade re-exports the whole workspace:
//!
//! - [`Var`]: a writable observable value with invalidation and change
//!   listeners.
//! - [`ObservableList`] / [`ObservableSet`] / [`ObservableMap`] /
//!   [`ObservableArray`]: observable collections with typed change reports;
//!   list edits coalesce into minimal batched reports.
//! - [`bind`] / [`bind_list_content`] and friends: bidirectional value and
//!   content synchronization with loop guards and weak endpoints.
//!
//! # Example
//!
//! ```
//! use ripple::{Var, bind};
//!
//! let celsius = Var::new(0.0_f64);
//! let mirror = Var::new(21.5_f64);
//!
//! // The second endpoint's value wins at bind time.
//! bind(&celsius, &mirror).unwrap();
//! assert_eq!(celsius.get(), 21.5);
//!
//! celsius.set(25.0);
//! assert_eq!(mirror.get(), 25.0);
//! ```

pub use ripple_binding::{
    BindError, ContentBinding, ConvertError, FnConverter, IdentityConverter, ValueBinding,
    ValueConverter, bind, bind_list_content, bind_map_content, bind_set_content, bind_with,
    unbind, unbind_list_content, unbind_map_content, unbind_set_content,
};
pub use ripple_collections::{
    ArrayChange, ArrayChangeListener, ListChange, ListChangeBuilder, ListChangeListener,
    ListSubChange, MapChange, MapChangeListener, ObservableArray, ObservableList, ObservableMap,
    ObservableSet, SetChange, SetChangeListener, WeakObservableList, WeakObservableMap,
    WeakObservableSet,
};
pub use ripple_core::{
    ChangeListener, InvalidationListener, ListenerList, UncaughtError, Var, WeakVar, listener_eq,
    report, reset_uncaught_hook, set_uncaught_hook,
};
