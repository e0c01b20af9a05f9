#![forbid(unsafe_code)]

//! Observable hash set.
//!
//! Unlike lists, set changes are not coalesced: every element entering or
//! leaving the set fires its own [`SetChange`]. Membership is the only
//! observable property, so there is nothing to coalesce.

use std::cell::RefCell;
use std::hash::Hash;
use std::rc::{Rc, Weak};

use ahash::AHashSet;
use ripple_core::listener::{InvalidationListener, listener_eq};
use ripple_core::registry::{ListenerList, dispatch_guarded};

use crate::change::{SetChange, SetChangeListener};

struct SetInner<E> {
    items: AHashSet<E>,
    invalidation: ListenerList<dyn InvalidationListener<ObservableSet<E>>>,
    changes: ListenerList<dyn SetChangeListener<E>>,
}

/// A shared, observable set.
pub struct ObservableSet<E> {
    inner: Rc<RefCell<SetInner<E>>>,
}

impl<E> Clone for ObservableSet<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E: std::fmt::Debug> std::fmt::Debug for ObservableSet<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ObservableSet")
            .field(&self.inner.borrow().items)
            .finish()
    }
}

impl<E: Clone + Eq + Hash + 'static> Default for ObservableSet<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone + Eq + Hash + 'static> FromIterator<E> for ObservableSet<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        let set = Self::new();
        {
            let mut inner = set.inner.borrow_mut();
            inner.items.extend(iter);
        }
        set
    }
}

impl<E: Clone + Eq + Hash + 'static> ObservableSet<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SetInner {
                items: AHashSet::new(),
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
    pub fn contains(&self, element: &E) -> bool {
        self.inner.borrow().items.contains(element)
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<E> {
        self.inner.borrow().items.iter().cloned().collect()
    }

    /// Read the elements in place. The borrow is held for the duration of
    /// `f`; do not mutate the set from inside it.
    pub fn with<R>(&self, f: impl FnOnce(&AHashSet<E>) -> R) -> R {
        f(&self.inner.borrow().items)
    }

    /// Add `element`; fires only if it was not already present.
    pub fn insert(&self, element: E) -> bool {
        let fresh = self.inner.borrow_mut().items.insert(element.clone());
        if fresh {
            self.fire(SetChange::added(self.clone(), element));
        }
        fresh
    }

    /// Remove `element`; fires only if it was present.
    pub fn remove(&self, element: &E) -> bool {
        let removed = self.inner.borrow_mut().items.take(element);
        match removed {
            Some(e) => {
                self.fire(SetChange::removed(self.clone(), e));
                true
            }
            None => false,
        }
    }

    pub fn extend(&self, elements: impl IntoIterator<Item = E>) {
        for e in elements {
            self.insert(e);
        }
    }

    /// One removal event per element.
    pub fn clear(&self) {
        let drained: Vec<E> = {
            let mut inner = self.inner.borrow_mut();
            inner.items.drain().collect()
        };
        for e in drained {
            self.fire(SetChange::removed(self.clone(), e));
        }
    }

    /// Keep only the elements `pred` accepts; one removal event each.
    pub fn retain(&self, mut pred: impl FnMut(&E) -> bool) {
        let doomed: Vec<E> = self
            .inner
            .borrow()
            .items
            .iter()
            .filter(|e| !pred(e))
            .cloned()
            .collect();
        for e in &doomed {
            self.remove(e);
        }
    }

    /// Replace the contents: removal events for departed elements, addition
    /// events for new ones, nothing for elements present on both sides.
    pub fn set_all(&self, elements: impl IntoIterator<Item = E>) {
        let target: AHashSet<E> = elements.into_iter().collect();
        let departed: Vec<E> = self
            .inner
            .borrow()
            .items
            .iter()
            .filter(|e| !target.contains(e))
            .cloned()
            .collect();
        for e in &departed {
            self.remove(e);
        }
        for e in target {
            self.insert(e);
        }
    }

    pub fn add_invalidation_listener(
        &self,
        listener: Rc<dyn InvalidationListener<ObservableSet<E>>>,
    ) {
        self.inner.borrow_mut().invalidation.add(listener);
    }

    pub fn remove_invalidation_listener(
        &self,
        listener: &Rc<dyn InvalidationListener<ObservableSet<E>>>,
    ) -> bool {
        let probe = Rc::clone(listener);
        self.inner.borrow_mut().invalidation.remove_first(move |e| {
            listener_eq(e, &*probe) || e.matches(probe.as_any()) || probe.matches(e.as_any())
        })
    }

    pub fn add_set_listener(&self, listener: Rc<dyn SetChangeListener<E>>) {
        self.inner.borrow_mut().changes.add(listener);
    }

    pub fn add_weak_set_listener(&self, listener: Weak<dyn SetChangeListener<E>>) {
        self.inner.borrow_mut().changes.add_weak(listener);
    }

    pub fn remove_set_listener(&self, listener: &Rc<dyn SetChangeListener<E>>) -> bool {
        let probe = Rc::clone(listener);
        self.inner.borrow_mut().changes.remove_first(move |e| {
            listener_eq(e, &*probe) || e.matches(probe.as_any()) || probe.matches(e.as_any())
        })
    }

    #[must_use]
    pub fn contains_set_listener(&self, listener: &Rc<dyn SetChangeListener<E>>) -> bool {
        let probe = Rc::clone(listener);
        self.inner.borrow().changes.contains(move |e| {
            listener_eq(e, &*probe) || e.matches(probe.as_any()) || probe.matches(e.as_any())
        })
    }

    /// Convenience: register a closure change listener and return its handle.
    pub fn listen(&self, f: impl Fn(&SetChange<E>) + 'static) -> Rc<dyn SetChangeListener<E>> {
        let listener: Rc<dyn SetChangeListener<E>> = Rc::new(f);
        self.add_set_listener(Rc::clone(&listener));
        listener
    }

    #[must_use]
    pub fn set_listener_count(&self) -> usize {
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

    pub fn downgrade(&self) -> WeakObservableSet<E> {
        WeakObservableSet {
            inner: Rc::downgrade(&self.inner),
        }
    }

    fn fire(&self, change: SetChange<E>) {
        let (inv, chg) = {
            let mut inner = self.inner.borrow_mut();
            (inner.invalidation.begin_fire(), inner.changes.begin_fire())
        };

        let source = self.clone();
        for l in &inv {
            dispatch_guarded("set invalidation listener", || l.invalidated(&source));
        }
        for l in &chg {
            dispatch_guarded("set change listener", || l.set_changed(&change));
        }

        let mut inner = self.inner.borrow_mut();
        inner.invalidation.end_fire();
        inner.changes.end_fire();
    }
}

/// Non-owning handle to an [`ObservableSet`]'s cell.
pub struct WeakObservableSet<E> {
    inner: Weak<RefCell<SetInner<E>>>,
}

impl<E> Clone for WeakObservableSet<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<E> WeakObservableSet<E> {
    #[must_use]
    pub fn upgrade(&self) -> Option<ObservableSet<E>> {
        self.inner.upgrade().map(|inner| ObservableSet { inner })
    }
}
