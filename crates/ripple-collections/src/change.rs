#![forbid(unsafe_code)]

//! Change payloads and the typed listener traits that receive them.
//!
//! Each observable collection has its own change shape:
//!
//! - lists report a [`ListChange`]: an ordered sequence of coalesced
//!   [`ListSubChange`] blocks in ascending index order, expressed in final
//!   coordinates (a permutation block, if any, always comes first);
//! - sets report one [`SetChange`] per element added or removed;
//! - maps report one [`MapChange`] per key touched;
//! - arrays report a [`ArrayChange`] index range.
//!
//! Every change carries a handle to its source collection, so a listener
//! registered on several collections can tell them apart.

use std::any::Any;

use crate::array::ObservableArray;
use crate::list::ObservableList;
use crate::map::ObservableMap;
use crate::set::ObservableSet;

/// One coalesced block of a list change report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListSubChange<E> {
    /// Elements `from..to` (final coordinates) replaced `removed`.
    ///
    /// A pure addition has `removed` empty; a pure removal has `from == to`.
    Replaced {
        from: usize,
        to: usize,
        removed: Vec<E>,
    },
    /// Elements within `from..to` were reordered: the element previously at
    /// index `from + i` is now at `mapping[i]`.
    Permuted {
        from: usize,
        to: usize,
        mapping: Vec<usize>,
    },
    /// Elements `from..to` were mutated in place, identity unchanged.
    Updated { from: usize, to: usize },
}

impl<E> ListSubChange<E> {
    pub fn from(&self) -> usize {
        match self {
            Self::Replaced { from, .. } | Self::Permuted { from, .. } | Self::Updated { from, .. } => {
                *from
            }
        }
    }

    pub fn to(&self) -> usize {
        match self {
            Self::Replaced { to, .. } | Self::Permuted { to, .. } | Self::Updated { to, .. } => *to,
        }
    }

    /// Index range the block covers, in final coordinates.
    pub fn range(&self) -> std::ops::Range<usize> {
        self.from()..self.to()
    }

    /// Whether this block only adds elements.
    pub fn is_pure_addition(&self) -> bool {
        matches!(self, Self::Replaced { from, to, removed } if from < to && removed.is_empty())
    }

    /// Whether this block only removes elements.
    pub fn is_pure_removal(&self) -> bool {
        matches!(self, Self::Replaced { from, to, removed } if from == to && !removed.is_empty())
    }

    /// New index of the element previously at `old_index`, for permutation
    /// blocks. Identity outside the permuted range.
    pub fn permuted_index(&self, old_index: usize) -> usize {
        match self {
            Self::Permuted { from, to, mapping } if (*from..*to).contains(&old_index) => {
                mapping[old_index - from]
            }
            _ => old_index,
        }
    }
}

/// A coalesced list change report.
pub struct ListChange<E> {
    list: ObservableList<E>,
    changes: Vec<ListSubChange<E>>,
}

impl<E> ListChange<E> {
    pub(crate) fn new(list: ObservableList<E>, changes: Vec<ListSubChange<E>>) -> Self {
        Self { list, changes }
    }

    /// The list this change happened on, in its post-change state.
    pub fn list(&self) -> &ObservableList<E> {
        &self.list
    }

    /// The coalesced blocks, ascending by `from` (permutation first).
    pub fn changes(&self) -> &[ListSubChange<E>] {
        &self.changes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ListSubChange<E>> {
        self.changes.iter()
    }
}

/// One element entering or leaving a set.
pub struct SetChange<E> {
    set: ObservableSet<E>,
    element: E,
    added: bool,
}

impl<E> SetChange<E> {
    pub(crate) fn added(set: ObservableSet<E>, element: E) -> Self {
        Self {
            set,
            element,
            added: true,
        }
    }

    pub(crate) fn removed(set: ObservableSet<E>, element: E) -> Self {
        Self {
            set,
            element,
            added: false,
        }
    }

    pub fn set(&self) -> &ObservableSet<E> {
        &self.set
    }

    pub fn element(&self) -> &E {
        &self.element
    }

    pub fn was_added(&self) -> bool {
        self.added
    }

    pub fn was_removed(&self) -> bool {
        !self.added
    }
}

/// One key's value entering, leaving, or being replaced in a map.
pub struct MapChange<K, V> {
    map: ObservableMap<K, V>,
    key: K,
    removed: Option<V>,
    added: Option<V>,
}

impl<K, V> MapChange<K, V> {
    pub(crate) fn new(map: ObservableMap<K, V>, key: K, removed: Option<V>, added: Option<V>) -> Self {
        Self {
            map,
            key,
            removed,
            added,
        }
    }

    pub fn map(&self) -> &ObservableMap<K, V> {
        &self.map
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    /// The value displaced by this change, if any.
    pub fn removed(&self) -> Option<&V> {
        self.removed.as_ref()
    }

    /// The value now associated with the key, if any.
    pub fn added(&self) -> Option<&V> {
        self.added.as_ref()
    }

    pub fn was_added(&self) -> bool {
        self.added.is_some()
    }

    pub fn was_removed(&self) -> bool {
        self.removed.is_some()
    }
}

/// A contiguous range of array slots that changed.
pub struct ArrayChange<T: Copy> {
    array: ObservableArray<T>,
    from: usize,
    to: usize,
    size_changed: bool,
}

impl<T: Copy> ArrayChange<T> {
    pub(crate) fn new(array: ObservableArray<T>, from: usize, to: usize, size_changed: bool) -> Self {
        Self {
            array,
            from,
            to,
            size_changed,
        }
    }

    pub fn array(&self) -> &ObservableArray<T> {
        &self.array
    }

    pub fn from(&self) -> usize {
        self.from
    }

    pub fn to(&self) -> usize {
        self.to
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        self.from..self.to
    }

    /// Whether the array's length changed (as opposed to in-place writes).
    pub fn size_changed(&self) -> bool {
        self.size_changed
    }
}

/// Receives coalesced list change reports.
pub trait ListChangeListener<E>: 'static {
    fn list_changed(&self, change: &ListChange<E>);

    /// Identity hook used for structural-equality removal.
    fn as_any(&self) -> &dyn Any;

    /// Structural equality against another listener's `as_any` view.
    fn matches(&self, _other: &dyn Any) -> bool {
        false
    }
}

impl<E: 'static, F: Fn(&ListChange<E>) + 'static> ListChangeListener<E> for F {
    fn list_changed(&self, change: &ListChange<E>) {
        self(change);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Receives per-element set change reports.
pub trait SetChangeListener<E>: 'static {
    fn set_changed(&self, change: &SetChange<E>);

    fn as_any(&self) -> &dyn Any;

    fn matches(&self, _other: &dyn Any) -> bool {
        false
    }
}

impl<E: 'static, F: Fn(&SetChange<E>) + 'static> SetChangeListener<E> for F {
    fn set_changed(&self, change: &SetChange<E>) {
        self(change);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Receives per-key map change reports.
pub trait MapChangeListener<K, V>: 'static {
    fn map_changed(&self, change: &MapChange<K, V>);

    fn as_any(&self) -> &dyn Any;

    fn matches(&self, _other: &dyn Any) -> bool {
        false
    }
}

impl<K: 'static, V: 'static, F: Fn(&MapChange<K, V>) + 'static> MapChangeListener<K, V> for F {
    fn map_changed(&self, change: &MapChange<K, V>) {
        self(change);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Receives array range change reports.
pub trait ArrayChangeListener<T: Copy>: 'static {
    fn array_changed(&self, change: &ArrayChange<T>);

    fn as_any(&self) -> &dyn Any;

    fn matches(&self, _other: &dyn Any) -> bool {
        false
    }
}

impl<T: Copy + 'static, F: Fn(&ArrayChange<T>) + 'static> ArrayChangeListener<T> for F {
    fn array_changed(&self, change: &ArrayChange<T>) {
        self(change);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
