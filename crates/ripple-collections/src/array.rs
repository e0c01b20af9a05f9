#![forbid(unsafe_code)]

//! Observable flat array of primitives.
//!
//! A bulk-value cousin of the list for `Copy` payloads (samples, vertex
//! data). Changes are reported as one [`ArrayChange`] index range per
//! mutation rather than element-wise blocks.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use ripple_core::listener::{InvalidationListener, listener_eq};
use ripple_core::registry::{ListenerList, dispatch_guarded};

use crate::change::{ArrayChange, ArrayChangeListener};

struct ArrayInner<T: Copy> {
    items: Vec<T>,
    invalidation: ListenerList<dyn InvalidationListener<ObservableArray<T>>>,
    changes: ListenerList<dyn ArrayChangeListener<T>>,
}

/// A shared, observable array.
pub struct ObservableArray<T: Copy> {
    inner: Rc<RefCell<ArrayInner<T>>>,
}

impl<T: Copy> Clone for ObservableArray<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Copy + std::fmt::Debug> std::fmt::Debug for ObservableArray<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ObservableArray")
            .field(&self.inner.borrow().items)
            .finish()
    }
}

impl<T: Copy + PartialEq + 'static> Default for ObservableArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy + PartialEq + 'static> ObservableArray<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    #[must_use]
    pub fn from_vec(items: Vec<T>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ArrayInner {
                items,
                invalidation: ListenerList::new(),
                changes: ListenerList::new(),
            })),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().items.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<T> {
        self.inner.borrow().items.get(index).copied()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.inner.borrow().items.clone()
    }

    /// Read the elements in place. The borrow is held for the duration of
    /// `f`; do not mutate the array from inside it.
    pub fn with<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.inner.borrow().items)
    }

    /// Overwrite one slot; a write of an equal value fires nothing. Panics
    /// if out of bounds.
    pub fn set(&self, index: usize, value: T) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.items[index] == value {
                return;
            }
            inner.items[index] = value;
        }
        self.fire(index, index + 1, false);
    }

    /// Overwrite `values.len()` slots starting at `index`; fires only if
    /// some slot actually changed. Panics if the range is out of bounds.
    pub fn set_range(&self, index: usize, values: &[T]) {
        let changed = {
            let mut inner = self.inner.borrow_mut();
            let slice = &mut inner.items[index..index + values.len()];
            if slice == values {
                false
            } else {
                slice.copy_from_slice(values);
                true
            }
        };
        if changed {
            self.fire(index, index + values.len(), false);
        }
    }

    /// Append `values`, reporting the grown range.
    pub fn push_all(&self, values: &[T]) {
        if values.is_empty() {
            return;
        }
        let from = {
            let mut inner = self.inner.borrow_mut();
            let from = inner.items.len();
            inner.items.extend_from_slice(values);
            from
        };
        self.fire(from, from + values.len(), true);
    }

    /// Replace the entire contents in one report.
    pub fn set_all(&self, values: &[T]) {
        let (old_len, changed) = {
            let mut inner = self.inner.borrow_mut();
            if inner.items == values {
                return;
            }
            let old_len = inner.items.len();
            inner.items.clear();
            inner.items.extend_from_slice(values);
            (old_len, true)
        };
        debug_assert!(changed);
        self.fire(0, values.len(), old_len != values.len());
    }

    /// Grow or shrink to `len`, filling new slots with `fill`.
    pub fn resize(&self, len: usize, fill: T) {
        let old_len = self.len();
        if old_len == len {
            return;
        }
        self.inner.borrow_mut().items.resize(len, fill);
        // Shrinking touches no surviving slot; growing touches the new tail.
        self.fire(old_len.min(len), len, true);
    }

    pub fn truncate(&self, len: usize) {
        if len >= self.len() {
            return;
        }
        self.inner.borrow_mut().items.truncate(len);
        self.fire(len, len, true);
    }

    pub fn clear(&self) {
        self.truncate(0);
    }

    pub fn add_invalidation_listener(
        &self,
        listener: Rc<dyn InvalidationListener<ObservableArray<T>>>,
    ) {
        self.inner.borrow_mut().invalidation.add(listener);
    }

    pub fn remove_invalidation_listener(
        &self,
        listener: &Rc<dyn InvalidationListener<ObservableArray<T>>>,
    ) -> bool {
        let probe = Rc::clone(listener);
        self.inner.borrow_mut().invalidation.remove_first(move |e| {
            listener_eq(e, &*probe) || e.matches(probe.as_any()) || probe.matches(e.as_any())
        })
    }

    pub fn add_array_listener(&self, listener: Rc<dyn ArrayChangeListener<T>>) {
        self.inner.borrow_mut().changes.add(listener);
    }

    pub fn add_weak_array_listener(&self, listener: Weak<dyn ArrayChangeListener<T>>) {
        self.inner.borrow_mut().changes.add_weak(listener);
    }

    pub fn remove_array_listener(&self, listener: &Rc<dyn ArrayChangeListener<T>>) -> bool {
        let probe = Rc::clone(listener);
        self.inner.borrow_mut().changes.remove_first(move |e| {
            listener_eq(e, &*probe) || e.matches(probe.as_any()) || probe.matches(e.as_any())
        })
    }

    #[must_use]
    pub fn contains_array_listener(&self, listener: &Rc<dyn ArrayChangeListener<T>>) -> bool {
        let probe = Rc::clone(listener);
        self.inner.borrow().changes.contains(move |e| {
            listener_eq(e, &*probe) || e.matches(probe.as_any()) || probe.matches(e.as_any())
        })
    }

    /// Convenience: register a closure change listener and return its handle.
    pub fn listen(&self, f: impl Fn(&ArrayChange<T>) + 'static) -> Rc<dyn ArrayChangeListener<T>> {
        let listener: Rc<dyn ArrayChangeListener<T>> = Rc::new(f);
        self.add_array_listener(Rc::clone(&listener));
        listener
    }

    #[must_use]
    pub fn array_listener_count(&self) -> usize {
        self.inner.borrow().changes.len()
    }

    #[must_use]
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn fire(&self, from: usize, to: usize, size_changed: bool) {
        let (inv, chg) = {
            let mut inner = self.inner.borrow_mut();
            (inner.invalidation.begin_fire(), inner.changes.begin_fire())
        };

        let source = self.clone();
        for l in &inv {
            dispatch_guarded("array invalidation listener", || l.invalidated(&source));
        }
        let change = ArrayChange::new(self.clone(), from, to, size_changed);
        for l in &chg {
            dispatch_guarded("array change listener", || l.array_changed(&change));
        }

        let mut inner = self.inner.borrow_mut();
        inner.invalidation.end_fire();
        inner.changes.end_fire();
    }
}
