#![forbid(unsafe_code)]

//! Bidirectional content bindings for observable collections.
//!
//! A content binding keeps two same-typed collections equal by replaying
//! every change report from the side that fired onto the other side, guarded
//! by the same `updating` flag pattern as value bindings. List replays
//! preserve the change shape (replaced ranges stay replaced ranges,
//! permutations stay permutations); update blocks are ignored, since content
//! bindings track membership, not in-place element mutation.
//!
//! At bind time the *first* collection wins: `b`'s contents are replaced by
//! `a`'s in one coalesced report.

use std::any::Any;
use std::cell::Cell;
use std::hash::Hash;
use std::rc::Rc;

use ripple_collections::change::{
    ListChange, ListChangeListener, ListSubChange, MapChange, MapChangeListener, SetChange,
    SetChangeListener,
};
use ripple_collections::list::{ObservableList, WeakObservableList};
use ripple_collections::map::{ObservableMap, WeakObservableMap};
use ripple_collections::set::{ObservableSet, WeakObservableSet};

use crate::value::{BindError, PairKey, UpdatingGuard};

/// Handle identifying one bidirectional content binding.
///
/// Equality and hashing are over the unordered endpoint pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentBinding {
    key: PairKey,
}

/// Inert stand-in carrying only the pair identity, used for structural
/// removal of content-binding listeners.
struct ContentProbe {
    key: PairKey,
}

impl<E: 'static> ListChangeListener<E> for ContentProbe {
    fn list_changed(&self, _change: &ListChange<E>) {}

    fn as_any(&self) -> &dyn Any {
        &self.key
    }

    fn matches(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<PairKey>() == Some(&self.key)
    }
}

impl<E: 'static> SetChangeListener<E> for ContentProbe {
    fn set_changed(&self, _change: &SetChange<E>) {}

    fn as_any(&self) -> &dyn Any {
        &self.key
    }

    fn matches(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<PairKey>() == Some(&self.key)
    }
}

impl<K: 'static, V: 'static> MapChangeListener<K, V> for ContentProbe {
    fn map_changed(&self, _change: &MapChange<K, V>) {}

    fn as_any(&self) -> &dyn Any {
        &self.key
    }

    fn matches(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<PairKey>() == Some(&self.key)
    }
}

/// The listener installed on both lists of one content binding.
struct ListContentListener<E> {
    key: PairKey,
    a: WeakObservableList<E>,
    a_id: usize,
    b: WeakObservableList<E>,
    updating: Cell<bool>,
}

impl<E: Clone + 'static> ListChangeListener<E> for ListContentListener<E> {
    fn list_changed(&self, change: &ListChange<E>) {
        if self.updating.get() {
            return;
        }
        let source = change.list();
        let target = if source.id() == self.a_id {
            self.b.upgrade()
        } else {
            self.a.upgrade()
        };
        let Some(target) = target else {
            let probe: Rc<dyn ListChangeListener<E>> = Rc::new(ContentProbe { key: self.key });
            source.remove_list_listener(&probe);
            return;
        };

        let _guard = UpdatingGuard::arm(&self.updating);
        target.batch(|t| {
            for sub in change.iter() {
                match sub {
                    ListSubChange::Replaced { from, to, removed } => {
                        let content = source.with(|items| items[*from..*to].to_vec());
                        t.replace_range(*from, *from + removed.len(), content);
                    }
                    ListSubChange::Permuted { from, to, mapping } => {
                        t.apply_permutation(*from, *to, mapping);
                    }
                    // Membership is unchanged by in-place mutation.
                    ListSubChange::Updated { .. } => {}
                }
            }
        });
    }

    fn as_any(&self) -> &dyn Any {
        &self.key
    }

    fn matches(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<PairKey>() == Some(&self.key)
    }
}

/// Keep two lists' contents equal until unbound.
///
/// `b` is overwritten with `a`'s contents in one coalesced replace.
pub fn bind_list_content<E: Clone + 'static>(
    a: &ObservableList<E>,
    b: &ObservableList<E>,
) -> Result<ContentBinding, BindError> {
    if a.ptr_eq(b) {
        return Err(BindError::SelfBinding);
    }
    let key = PairKey::new(a.id(), b.id());
    b.set_all(a.to_vec());

    let listener = Rc::new(ListContentListener {
        key,
        a: a.downgrade(),
        a_id: a.id(),
        b: b.downgrade(),
        updating: Cell::new(false),
    });
    a.add_list_listener(Rc::clone(&listener) as Rc<dyn ListChangeListener<E>>);
    b.add_list_listener(listener);
    tracing::debug!(binding = ?key, "list content binding installed");
    Ok(ContentBinding { key })
}

/// Remove the content binding between `a` and `b`, in either order.
pub fn unbind_list_content<E: Clone + 'static>(
    a: &ObservableList<E>,
    b: &ObservableList<E>,
) -> bool {
    let key = PairKey::new(a.id(), b.id());
    let probe_a: Rc<dyn ListChangeListener<E>> = Rc::new(ContentProbe { key });
    let probe_b: Rc<dyn ListChangeListener<E>> = Rc::new(ContentProbe { key });
    let removed_a = a.remove_list_listener(&probe_a);
    let removed_b = b.remove_list_listener(&probe_b);
    removed_a || removed_b
}

/// The listener installed on both sets of one content binding.
struct SetContentListener<E> {
    key: PairKey,
    a: WeakObservableSet<E>,
    a_id: usize,
    b: WeakObservableSet<E>,
    updating: Cell<bool>,
}

impl<E: Clone + Eq + Hash + 'static> SetChangeListener<E> for SetContentListener<E> {
    fn set_changed(&self, change: &SetChange<E>) {
        if self.updating.get() {
            return;
        }
        let source = change.set();
        let target = if source.id() == self.a_id {
            self.b.upgrade()
        } else {
            self.a.upgrade()
        };
        let Some(target) = target else {
            let probe: Rc<dyn SetChangeListener<E>> = Rc::new(ContentProbe { key: self.key });
            source.remove_set_listener(&probe);
            return;
        };

        let _guard = UpdatingGuard::arm(&self.updating);
        if change.was_added() {
            target.insert(change.element().clone());
        } else {
            target.remove(change.element());
        }
    }

    fn as_any(&self) -> &dyn Any {
        &self.key
    }

    fn matches(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<PairKey>() == Some(&self.key)
    }
}

/// Keep two sets' membership equal until unbound.
pub fn bind_set_content<E: Clone + Eq + Hash + 'static>(
    a: &ObservableSet<E>,
    b: &ObservableSet<E>,
) -> Result<ContentBinding, BindError> {
    if a.ptr_eq(b) {
        return Err(BindError::SelfBinding);
    }
    let key = PairKey::new(a.id(), b.id());
    b.set_all(a.to_vec());

    let listener = Rc::new(SetContentListener {
        key,
        a: a.downgrade(),
        a_id: a.id(),
        b: b.downgrade(),
        updating: Cell::new(false),
    });
    a.add_set_listener(Rc::clone(&listener) as Rc<dyn SetChangeListener<E>>);
    b.add_set_listener(listener);
    Ok(ContentBinding { key })
}

/// Remove the content binding between `a` and `b`, in either order.
pub fn unbind_set_content<E: Clone + Eq + Hash + 'static>(
    a: &ObservableSet<E>,
    b: &ObservableSet<E>,
) -> bool {
    let key = PairKey::new(a.id(), b.id());
    let probe_a: Rc<dyn SetChangeListener<E>> = Rc::new(ContentProbe { key });
    let probe_b: Rc<dyn SetChangeListener<E>> = Rc::new(ContentProbe { key });
    let removed_a = a.remove_set_listener(&probe_a);
    let removed_b = b.remove_set_listener(&probe_b);
    removed_a || removed_b
}

/// The listener installed on both maps of one content binding.
struct MapContentListener<K, V> {
    key: PairKey,
    a: WeakObservableMap<K, V>,
    a_id: usize,
    b: WeakObservableMap<K, V>,
    updating: Cell<bool>,
}

impl<K, V> MapChangeListener<K, V> for MapContentListener<K, V>
where
    K: Clone + Eq + Hash + 'static,
    V: Clone + PartialEq + 'static,
{
    fn map_changed(&self, change: &MapChange<K, V>) {
        if self.updating.get() {
            return;
        }
        let source = change.map();
        let target = if source.id() == self.a_id {
            self.b.upgrade()
        } else {
            self.a.upgrade()
        };
        let Some(target) = target else {
            let probe: Rc<dyn MapChangeListener<K, V>> = Rc::new(ContentProbe { key: self.key });
            source.remove_map_listener(&probe);
            return;
        };

        let _guard = UpdatingGuard::arm(&self.updating);
        match change.added() {
            Some(value) => {
                target.insert(change.key().clone(), value.clone());
            }
            None => {
                target.remove(change.key());
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        &self.key
    }

    fn matches(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<PairKey>() == Some(&self.key)
    }
}

/// Keep two maps' entries equal until unbound.
pub fn bind_map_content<K, V>(
    a: &ObservableMap<K, V>,
    b: &ObservableMap<K, V>,
) -> Result<ContentBinding, BindError>
where
    K: Clone + Eq + Hash + 'static,
    V: Clone + PartialEq + 'static,
{
    if a.ptr_eq(b) {
        return Err(BindError::SelfBinding);
    }
    let key = PairKey::new(a.id(), b.id());
    b.set_all(a.to_vec());

    let listener = Rc::new(MapContentListener {
        key,
        a: a.downgrade(),
        a_id: a.id(),
        b: b.downgrade(),
        updating: Cell::new(false),
    });
    a.add_map_listener(Rc::clone(&listener) as Rc<dyn MapChangeListener<K, V>>);
    b.add_map_listener(listener);
    Ok(ContentBinding { key })
}

/// Remove the content binding between `a` and `b`, in either order.
pub fn unbind_map_content<K, V>(a: &ObservableMap<K, V>, b: &ObservableMap<K, V>) -> bool
where
    K: Clone + Eq + Hash + 'static,
    V: Clone + PartialEq + 'static,
{
    let key = PairKey::new(a.id(), b.id());
    let probe_a: Rc<dyn MapChangeListener<K, V>> = Rc::new(ContentProbe { key });
    let probe_b: Rc<dyn MapChangeListener<K, V>> = Rc::new(ContentProbe { key });
    let removed_a = a.remove_map_listener(&probe_a);
    let removed_b = b.remove_map_listener(&probe_b);
    removed_a || removed_b
}
