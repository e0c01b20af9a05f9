#![forbid(unsafe_code)]

//! Observable sequence with coalesced change reports.
//!
//! [`ObservableList<E>`] is a shared handle (`Rc<RefCell<..>>`) to a `Vec<E>`
//! plus its listener registries and a [`ListChangeBuilder`]. Every mutator
//! runs as a batch: the structural edits are reported to the builder as they
//! happen, and exactly one coalesced [`ListChange`] fires when the outermost
//! batch ends. [`batch`] groups several mutations into one report.
//!
//! Listener callbacks run outside the cell's borrow; a listener may read or
//! mutate the list it is registered on. Closure arguments to [`retain`],
//! [`sort_by`] and friends run *under* the borrow and must not touch the
//! list.
//!
//! [`batch`]: ObservableList::batch
//! [`retain`]: ObservableList::retain
//! [`sort_by`]: ObservableList::sort_by

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use ripple_core::listener::{InvalidationListener, listener_eq};
use ripple_core::registry::{ListenerList, dispatch_guarded};

use crate::builder::ListChangeBuilder;
use crate::change::{ListChange, ListChangeListener, ListSubChange};

struct ListInner<E> {
    items: Vec<E>,
    builder: ListChangeBuilder<E>,
    invalidation: ListenerList<dyn InvalidationListener<ObservableList<E>>>,
    changes: ListenerList<dyn ListChangeListener<E>>,
}

/// A shared, observable list.
pub struct ObservableList<E> {
    inner: Rc<RefCell<ListInner<E>>>,
}

impl<E> Clone for ObservableList<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E: std::fmt::Debug> std::fmt::Debug for ObservableList<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ObservableList")
            .field(&self.inner.borrow().items)
            .finish()
    }
}

impl<E: Clone + 'static> Default for ObservableList<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone + 'static> FromIterator<E> for ObservableList<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl<E: Clone + 'static> ObservableList<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    #[must_use]
    pub fn from_vec(items: Vec<E>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ListInner {
                items,
                builder: ListChangeBuilder::new(),
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
    pub fn get(&self, index: usize) -> Option<E> {
        self.inner.borrow().items.get(index).cloned()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<E> {
        self.inner.borrow().items.clone()
    }

    /// Read the elements in place without cloning. The borrow is held for
    /// the duration of `f`; do not mutate the list from inside it.
    pub fn with<R>(&self, f: impl FnOnce(&[E]) -> R) -> R {
        f(&self.inner.borrow().items)
    }

    #[must_use]
    pub fn contains(&self, element: &E) -> bool
    where
        E: PartialEq,
    {
        self.inner.borrow().items.contains(element)
    }

    pub fn push(&self, element: E) {
        self.mutate(|inner| {
            let at = inner.items.len();
            inner.items.push(element);
            inner.builder.next_add(at, at + 1);
        });
    }

    /// Insert at `index`, shifting later elements. Panics if out of bounds.
    pub fn insert(&self, index: usize, element: E) {
        self.mutate(|inner| {
            inner.items.insert(index, element);
            inner.builder.next_add(index, index + 1);
        });
    }

    pub fn insert_all(&self, index: usize, elements: impl IntoIterator<Item = E>) {
        // Collected up front: the source may be this very list's contents.
        let elements: Vec<E> = elements.into_iter().collect();
        if elements.is_empty() {
            return;
        }
        self.mutate(|inner| {
            let n = elements.len();
            inner.items.splice(index..index, elements);
            inner.builder.next_add(index, index + n);
        });
    }

    pub fn extend(&self, elements: impl IntoIterator<Item = E>) {
        let at = self.len();
        self.insert_all(at, elements);
    }

    /// Remove and return the element at `index`. Panics if out of bounds.
    pub fn remove_at(&self, index: usize) -> E {
        self.mutate(|inner| {
            let removed = inner.items.remove(index);
            inner.builder.next_remove(index, removed.clone());
            removed
        })
    }

    /// Remove the first occurrence of `element`, if present.
    pub fn remove_item(&self, element: &E) -> bool
    where
        E: PartialEq,
    {
        let found = self.inner.borrow().items.iter().position(|e| e == element);
        match found {
            Some(index) => {
                self.remove_at(index);
                true
            }
            None => false,
        }
    }

    pub fn pop(&self) -> Option<E> {
        if self.is_empty() {
            return None;
        }
        Some(self.remove_at(self.len() - 1))
    }

    /// Replace the element at `index`, returning the old one. Panics if out
    /// of bounds.
    pub fn set(&self, index: usize, element: E) -> E {
        self.mutate(|inner| {
            let old = std::mem::replace(&mut inner.items[index], element);
            inner.builder.next_set(index, old.clone());
            old
        })
    }

    /// Replace the entire contents in one coalesced report.
    pub fn set_all(&self, elements: impl IntoIterator<Item = E>) {
        let elements: Vec<E> = elements.into_iter().collect();
        self.mutate(|inner| {
            let n = elements.len();
            let old = std::mem::replace(&mut inner.items, elements);
            inner.builder.next_replace(0, n, old);
        });
    }

    /// Replace `from..to` with `elements`, reporting one replace block.
    pub fn replace_range(&self, from: usize, to: usize, elements: impl IntoIterator<Item = E>) {
        let elements: Vec<E> = elements.into_iter().collect();
        self.mutate(|inner| {
            let n = elements.len();
            let removed: Vec<E> = inner.items.splice(from..to, elements).collect();
            inner.builder.next_replace(from, from + n, removed);
        });
    }

    pub fn clear(&self) {
        self.mutate(|inner| {
            let old = std::mem::take(&mut inner.items);
            inner.builder.next_remove_all(0, old);
        });
    }

    /// Keep only the elements `pred` accepts. `pred` runs under the borrow.
    pub fn retain(&self, mut pred: impl FnMut(&E) -> bool) {
        self.mutate(|inner| {
            let mut i = 0;
            while i < inner.items.len() {
                if pred(&inner.items[i]) {
                    i += 1;
                } else {
                    let removed = inner.items.remove(i);
                    inner.builder.next_remove(i, removed);
                }
            }
        });
    }

    /// Stable sort reported as a single permutation. `cmp` runs under the
    /// borrow.
    pub fn sort_by(&self, mut cmp: impl FnMut(&E, &E) -> std::cmp::Ordering) {
        self.mutate(|inner| {
            let n = inner.items.len();
            let mut order: Vec<usize> = (0..n).collect();
            order.sort_by(|&a, &b| cmp(&inner.items[a], &inner.items[b]));
            if order.iter().enumerate().all(|(new, &old)| new == old) {
                return;
            }
            let mut mapping = vec![0; n];
            for (new, &old) in order.iter().enumerate() {
                mapping[old] = new;
            }
            inner.items = order.iter().map(|&old| inner.items[old].clone()).collect();
            inner.builder.next_permutation(0, n, &mapping);
        });
    }

    pub fn sort(&self)
    where
        E: Ord,
    {
        self.sort_by(E::cmp);
    }

    /// Reorder `from..to` according to `mapping` (absolute new indices),
    /// reported as a permutation. An identity mapping fires nothing.
    pub fn apply_permutation(&self, from: usize, to: usize, mapping: &[usize]) {
        assert_eq!(mapping.len(), to - from, "mapping must cover the range");
        self.mutate(|inner| {
            if mapping.iter().enumerate().all(|(k, &m)| m == from + k) {
                return;
            }
            let section: Vec<E> = inner.items[from..to].to_vec();
            for (k, e) in section.into_iter().enumerate() {
                inner.items[mapping[k]] = e;
            }
            inner.builder.next_permutation(from, to, mapping);
        });
    }

    /// Reverse in place, reported as a permutation.
    pub fn reverse(&self) {
        self.mutate(|inner| {
            let n = inner.items.len();
            if n < 2 {
                return;
            }
            inner.items.reverse();
            let mapping: Vec<usize> = (0..n).map(|i| n - 1 - i).collect();
            inner.builder.next_permutation(0, n, &mapping);
        });
    }

    /// Report that the element at `index` mutated in place (same identity,
    /// changed content).
    pub fn mark_updated(&self, index: usize) {
        self.mutate(|inner| inner.builder.next_update(index));
    }

    /// Group several mutations into one coalesced change report.
    ///
    /// Batches nest; only the outermost fires.
    pub fn batch<R>(&self, f: impl FnOnce(&Self) -> R) -> R {
        self.inner.borrow_mut().builder.begin_change();
        let guard = BatchGuard { list: self };
        let result = f(self);
        drop(guard);
        result
    }

    pub fn add_invalidation_listener(
        &self,
        listener: Rc<dyn InvalidationListener<ObservableList<E>>>,
    ) {
        self.inner.borrow_mut().invalidation.add(listener);
    }

    pub fn add_weak_invalidation_listener(
        &self,
        listener: Weak<dyn InvalidationListener<ObservableList<E>>>,
    ) {
        self.inner.borrow_mut().invalidation.add_weak(listener);
    }

    pub fn remove_invalidation_listener(
        &self,
        listener: &Rc<dyn InvalidationListener<ObservableList<E>>>,
    ) -> bool {
        let probe = Rc::clone(listener);
        self.inner.borrow_mut().invalidation.remove_first(move |e| {
            listener_eq(e, &*probe) || e.matches(probe.as_any()) || probe.matches(e.as_any())
        })
    }

    pub fn add_list_listener(&self, listener: Rc<dyn ListChangeListener<E>>) {
        self.inner.borrow_mut().changes.add(listener);
    }

    pub fn add_weak_list_listener(&self, listener: Weak<dyn ListChangeListener<E>>) {
        self.inner.borrow_mut().changes.add_weak(listener);
    }

    pub fn remove_list_listener(&self, listener: &Rc<dyn ListChangeListener<E>>) -> bool {
        let probe = Rc::clone(listener);
        self.inner.borrow_mut().changes.remove_first(move |e| {
            listener_eq(e, &*probe) || e.matches(probe.as_any()) || probe.matches(e.as_any())
        })
    }

    #[must_use]
    pub fn contains_list_listener(&self, listener: &Rc<dyn ListChangeListener<E>>) -> bool {
        let probe = Rc::clone(listener);
        self.inner.borrow().changes.contains(move |e| {
            listener_eq(e, &*probe) || e.matches(probe.as_any()) || probe.matches(e.as_any())
        })
    }

    /// Convenience: register a closure change listener and return the handle
    /// needed to remove it later.
    pub fn listen(&self, f: impl Fn(&ListChange<E>) + 'static) -> Rc<dyn ListChangeListener<E>> {
        let listener: Rc<dyn ListChangeListener<E>> = Rc::new(f);
        self.add_list_listener(Rc::clone(&listener));
        listener
    }

    #[must_use]
    pub fn invalidation_listener_count(&self) -> usize {
        self.inner.borrow().invalidation.len()
    }

    #[must_use]
    pub fn list_listener_count(&self) -> usize {
        self.inner.borrow().changes.len()
    }

    /// Stable identity of the underlying cell, usable as a map key for
    /// binding bookkeeping.
    #[must_use]
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> WeakObservableList<E> {
        WeakObservableList {
            inner: Rc::downgrade(&self.inner),
        }
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut ListInner<E>) -> R) -> R {
        let (result, subs) = {
            let mut inner = self.inner.borrow_mut();
            inner.builder.begin_change();
            let result = f(&mut inner);
            let subs = inner.builder.end_change();
            (result, subs)
        };
        self.fire(subs);
        result
    }

    fn fire(&self, subs: Option<Vec<ListSubChange<E>>>) {
        // A batch with no net effect fires nothing, invalidation included.
        let Some(subs) = subs else { return };
        tracing::trace!(sub_changes = subs.len(), "list change fired");
        let (inv, chg) = {
            let mut inner = self.inner.borrow_mut();
            (inner.invalidation.begin_fire(), inner.changes.begin_fire())
        };

        let source = self.clone();
        for l in &inv {
            dispatch_guarded("list invalidation listener", || l.invalidated(&source));
        }
        let change = ListChange::new(self.clone(), subs);
        for l in &chg {
            dispatch_guarded("list change listener", || l.list_changed(&change));
        }

        let mut inner = self.inner.borrow_mut();
        inner.invalidation.end_fire();
        inner.changes.end_fire();
    }
}

struct BatchGuard<'a, E: Clone + 'static> {
    list: &'a ObservableList<E>,
}

impl<E: Clone + 'static> Drop for BatchGuard<'_, E> {
    fn drop(&mut self) {
        let subs = self.list.inner.borrow_mut().builder.end_change();
        if !std::thread::panicking() {
            self.list.fire(subs);
        }
    }
}

/// Non-owning handle to an [`ObservableList`]'s cell.
pub struct WeakObservableList<E> {
    inner: Weak<RefCell<ListInner<E>>>,
}

impl<E> Clone for WeakObservableList<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<E> WeakObservableList<E> {
    #[must_use]
    pub fn upgrade(&self) -> Option<ObservableList<E>> {
        self.inner.upgrade().map(|inner| ObservableList { inner })
    }
}
