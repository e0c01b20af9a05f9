#![forbid(unsafe_code)]

//! Observable hash map.
//!
//! Each key touched fires its own [`MapChange`] carrying the displaced and
//! the new value. Re-inserting a value equal (per `PartialEq`) to the one
//! already stored is a complete no-op.

use std::cell::RefCell;
use std::hash::Hash;
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use ripple_core::listener::{InvalidationListener, listener_eq};
use ripple_core::registry::{ListenerList, dispatch_guarded};

use crate::change::{MapChange, MapChangeListener};

struct MapInner<K, V> {
    entries: AHashMap<K, V>,
    invalidation: ListenerList<dyn InvalidationListener<ObservableMap<K, V>>>,
    changes: ListenerList<dyn MapChangeListener<K, V>>,
}

/// A shared, observable map.
pub struct ObservableMap<K, V> {
    inner: Rc<RefCell<MapInner<K, V>>>,
}

impl<K, V> Clone for ObservableMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<K: std::fmt::Debug, V: std::fmt::Debug> std::fmt::Debug for ObservableMap<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ObservableMap")
            .field(&self.inner.borrow().entries)
            .finish()
    }
}

impl<K: Clone + Eq + Hash + 'static, V: Clone + PartialEq + 'static> Default
    for ObservableMap<K, V>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone + Eq + Hash + 'static, V: Clone + PartialEq + 'static> FromIterator<(K, V)>
    for ObservableMap<K, V>
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let map = Self::new();
        {
            let mut inner = map.inner.borrow_mut();
            inner.entries.extend(iter);
        }
        map
    }
}

impl<K: Clone + Eq + Hash + 'static, V: Clone + PartialEq + 'static> ObservableMap<K, V> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(MapInner {
                entries: AHashMap::new(),
                invalidation: ListenerList::new(),
                changes: ListenerList::new(),
            })),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().entries.is_empty()
    }

    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.borrow().entries.contains_key(key)
    }

    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.borrow().entries.get(key).cloned()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<(K, V)> {
        self.inner
            .borrow()
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Read the entries in place. The borrow is held for the duration of
    /// `f`; do not mutate the map from inside it.
    pub fn with<R>(&self, f: impl FnOnce(&AHashMap<K, V>) -> R) -> R {
        f(&self.inner.borrow().entries)
    }

    /// Associate `value` with `key`, returning the displaced value.
    ///
    /// Storing a value equal to the current one fires nothing.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        let old = {
            let mut inner = self.inner.borrow_mut();
            // Equal-value no-op still hands back the stored value, not the
            // argument; `PartialEq` may not compare every field.
            if let Some(stored) = inner.entries.get(&key) {
                if *stored == value {
                    return Some(stored.clone());
                }
            }
            inner.entries.insert(key.clone(), value.clone())
        };
        self.fire(MapChange::new(
            self.clone(),
            key,
            old.clone(),
            Some(value),
        ));
        old
    }

    /// Remove `key`'s entry, returning its value.
    pub fn remove(&self, key: &K) -> Option<V> {
        let old = self.inner.borrow_mut().entries.remove(key)?;
        self.fire(MapChange::new(
            self.clone(),
            key.clone(),
            Some(old.clone()),
            None,
        ));
        Some(old)
    }

    pub fn extend(&self, entries: impl IntoIterator<Item = (K, V)>) {
        for (k, v) in entries {
            self.insert(k, v);
        }
    }

    /// One removal event per entry.
    pub fn clear(&self) {
        let drained: Vec<(K, V)> = {
            let mut inner = self.inner.borrow_mut();
            inner.entries.drain().collect()
        };
        for (k, v) in drained {
            self.fire(MapChange::new(self.clone(), k, Some(v), None));
        }
    }

    /// Replace the contents: removals for departed keys, per-key updates for
    /// the rest, skipping keys whose value is unchanged.
    pub fn set_all(&self, entries: impl IntoIterator<Item = (K, V)>) {
        let target: AHashMap<K, V> = entries.into_iter().collect();
        let departed: Vec<K> = self
            .inner
            .borrow()
            .entries
            .keys()
            .filter(|k| !target.contains_key(k))
            .cloned()
            .collect();
        for k in &departed {
            self.remove(k);
        }
        for (k, v) in target {
            self.insert(k, v);
        }
    }

    pub fn add_invalidation_listener(
        &self,
        listener: Rc<dyn InvalidationListener<ObservableMap<K, V>>>,
    ) {
        self.inner.borrow_mut().invalidation.add(listener);
    }

    pub fn remove_invalidation_listener(
        &self,
        listener: &Rc<dyn InvalidationListener<ObservableMap<K, V>>>,
    ) -> bool {
        let probe = Rc::clone(listener);
        self.inner.borrow_mut().invalidation.remove_first(move |e| {
            listener_eq(e, &*probe) || e.matches(probe.as_any()) || probe.matches(e.as_any())
        })
    }

    pub fn add_map_listener(&self, listener: Rc<dyn MapChangeListener<K, V>>) {
        self.inner.borrow_mut().changes.add(listener);
    }

    pub fn add_weak_map_listener(&self, listener: Weak<dyn MapChangeListener<K, V>>) {
        self.inner.borrow_mut().changes.add_weak(listener);
    }

    pub fn remove_map_listener(&self, listener: &Rc<dyn MapChangeListener<K, V>>) -> bool {
        let probe = Rc::clone(listener);
        self.inner.borrow_mut().changes.remove_first(move |e| {
            listener_eq(e, &*probe) || e.matches(probe.as_any()) || probe.matches(e.as_any())
        })
    }

    #[must_use]
    pub fn contains_map_listener(&self, listener: &Rc<dyn MapChangeListener<K, V>>) -> bool {
        let probe = Rc::clone(listener);
        self.inner.borrow().changes.contains(move |e| {
            listener_eq(e, &*probe) || e.matches(probe.as_any()) || probe.matches(e.as_any())
        })
    }

    /// Convenience: register a closure change listener and return its handle.
    pub fn listen(
        &self,
        f: impl Fn(&MapChange<K, V>) + 'static,
    ) -> Rc<dyn MapChangeListener<K, V>> {
        let listener: Rc<dyn MapChangeListener<K, V>> = Rc::new(f);
        self.add_map_listener(Rc::clone(&listener));
        listener
    }

    #[must_use]
    pub fn map_listener_count(&self) -> usize {
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

    pub fn downgrade(&self) -> WeakObservableMap<K, V> {
        WeakObservableMap {
            inner: Rc::downgrade(&self.inner),
        }
    }

    fn fire(&self, change: MapChange<K, V>) {
        let (inv, chg) = {
            let mut inner = self.inner.borrow_mut();
            (inner.invalidation.begin_fire(), inner.changes.begin_fire())
        };

        let source = self.clone();
        for l in &inv {
            dispatch_guarded("map invalidation listener", || l.invalidated(&source));
        }
        for l in &chg {
            dispatch_guarded("map change listener", || l.map_changed(&change));
        }

        let mut inner = self.inner.borrow_mut();
        inner.invalidation.end_fire();
        inner.changes.end_fire();
    }
}

/// Non-owning handle to an [`ObservableMap`]'s cell.
pub struct WeakObservableMap<K, V> {
    inner: Weak<RefCell<MapInner<K, V>>>,
}

impl<K, V> Clone for WeakObservableMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<K, V> WeakObservableMap<K, V> {
    #[must_use]
    pub fn upgrade(&self) -> Option<ObservableMap<K, V>> {
        self.inner.upgrade().map(|inner| ObservableMap { inner })
    }
}
