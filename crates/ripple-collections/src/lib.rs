#![forbid(unsafe_code)]

//! Observable collections with coalesced change reports.
//!
//! Four collection kinds, each a shared `Rc<RefCell<..>>` handle pairing the
//! storage with its listener registries:
//!
//! - [`ObservableList`]: ordered sequence; batched edits coalesce through a
//!   [`ListChangeBuilder`] into one minimal [`ListChange`] per batch.
//! - [`ObservableSet`] / [`ObservableMap`]: hashed membership (on `ahash`);
//!   one change event per element or key touched.
//! - [`ObservableArray`]: flat `Copy` payloads; changes reported as index
//!   ranges.
//!
//! All kinds share the dispatch contract of `ripple-core`: snapshot before
//! dispatch, invalidation listeners before typed change listeners, panics
//! trapped per listener.

pub mod array;
pub mod builder;
pub mod change;
pub mod list;
pub mod map;
pub mod set;

pub use array::ObservableArray;
pub use builder::ListChangeBuilder;
pub use change::{
    ArrayChange, ArrayChangeListener, ListChange, ListChangeListener, ListSubChange, MapChange,
    MapChangeListener, SetChange, SetChangeListener,
};
pub use list::{ObservableList, WeakObservableList};
pub use map::{ObservableMap, WeakObservableMap};
pub use set::{ObservableSet, WeakObservableSet};
