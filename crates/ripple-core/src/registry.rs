#![forbid(unsafe_code)]

//! Generic listener registry with reentrancy-safe dispatch.
//!
//! [`ListenerList`] stores an ordered list of strong and weak listener
//! handles for one observable. It is the storage half of the dispatch
//! protocol; the observable drives it:
//!
//! ```text
//! let snapshot = list.begin_fire();   // under a short borrow
//! for l in &snapshot { dispatch_guarded(ctx, || l.notify(..)); }
//! list.end_fire();                    // under a short borrow again
//! ```
//!
//! # Invariants
//!
//! 1. Listeners are stored and delivered in registration order. Duplicates
//!    are allowed and each occurrence fires independently.
//! 2. `remove` drops only the first matching occurrence.
//! 3. Between `begin_fire` and `end_fire` the entry array is frozen: adds and
//!    removes are buffered and applied when the outermost fire ends, so a
//!    listener added during dispatch is first notified by the next fire and a
//!    listener removed during dispatch still receives the current one.
//! 4. Dead weak entries are compacted whenever the array is touched outside a
//!    fire; cleanup is lazy, never asynchronous.
//!
//! # Growth policy
//!
//! The array starts unallocated and grows by exactly one slot for the first
//! two adds, then doubles. Observables overwhelmingly carry zero, one or two
//! listeners; this keeps that case allocation-light.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};

use crate::uncaught::{self, UncaughtError};

enum Entry<L: ?Sized> {
    Strong(Rc<L>),
    Weak(Weak<L>),
}

impl<L: ?Sized> Entry<L> {
    fn live(&self) -> bool {
        match self {
            Entry::Strong(_) => true,
            Entry::Weak(w) => w.strong_count() > 0,
        }
    }

    fn upgrade(&self) -> Option<Rc<L>> {
        match self {
            Entry::Strong(rc) => Some(Rc::clone(rc)),
            Entry::Weak(w) => w.upgrade(),
        }
    }
}

enum PendingOp<L: ?Sized> {
    AddStrong(Rc<L>),
    AddWeak(Weak<L>),
    RemoveFirst(Box<dyn Fn(&L) -> bool>),
}

/// Ordered listener storage for a single observable.
pub struct ListenerList<L: ?Sized> {
    entries: Vec<Entry<L>>,
    /// Nesting depth of in-flight fires; entries are frozen while non-zero.
    lock: usize,
    pending: Vec<PendingOp<L>>,
}

impl<L: ?Sized> Default for ListenerList<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: ?Sized> ListenerList<L> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            lock: 0,
            pending: Vec::new(),
        }
    }

    /// Append a strong listener handle.
    pub fn add(&mut self, listener: Rc<L>) {
        if self.lock > 0 {
            self.pending.push(PendingOp::AddStrong(listener));
            return;
        }
        self.compact();
        self.push_entry(Entry::Strong(listener));
    }

    /// Append a weak listener handle.
    ///
    /// The entry is silently dropped during compaction once the referent is
    /// gone (`strong_count == 0` is the reclaimed-listener signal).
    pub fn add_weak(&mut self, listener: Weak<L>) {
        if self.lock > 0 {
            self.pending.push(PendingOp::AddWeak(listener));
            return;
        }
        self.compact();
        self.push_entry(Entry::Weak(listener));
    }

    /// Remove the first entry matching `pred`. Returns whether a live entry
    /// matched.
    ///
    /// During a fire the removal is buffered; the return value reflects the
    /// pre-fire entries, which is also the set the current dispatch uses.
    pub fn remove_first(&mut self, pred: impl Fn(&L) -> bool + 'static) -> bool {
        let found = self.position(&pred).is_some();
        if self.lock > 0 {
            self.pending.push(PendingOp::RemoveFirst(Box::new(pred)));
            return found;
        }
        if let Some(idx) = self.position(&pred) {
            self.entries.remove(idx);
        }
        self.compact();
        found
    }

    /// Whether any live entry matches `pred`.
    #[must_use]
    pub fn contains(&self, pred: impl Fn(&L) -> bool) -> bool {
        self.position(&pred).is_some()
    }

    /// Number of live entries (dead weak entries excluded).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.live()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot the live listeners and freeze the array for dispatch.
    ///
    /// Every `begin_fire` must be paired with an [`end_fire`], even when the
    /// snapshot is empty.
    ///
    /// [`end_fire`]: ListenerList::end_fire
    pub fn begin_fire(&mut self) -> Vec<Rc<L>> {
        if self.lock == 0 {
            self.compact();
        }
        self.lock += 1;
        self.entries.iter().filter_map(Entry::upgrade).collect()
    }

    /// Unfreeze after dispatch; applies mutations buffered during the fire
    /// once the outermost fire ends.
    pub fn end_fire(&mut self) {
        debug_assert!(self.lock > 0, "end_fire without matching begin_fire");
        self.lock -= 1;
        if self.lock > 0 {
            return;
        }
        for op in std::mem::take(&mut self.pending) {
            match op {
                PendingOp::AddStrong(rc) => self.push_entry(Entry::Strong(rc)),
                PendingOp::AddWeak(w) => self.push_entry(Entry::Weak(w)),
                PendingOp::RemoveFirst(pred) => {
                    if let Some(idx) = self.position(&pred) {
                        self.entries.remove(idx);
                    }
                }
            }
        }
        self.compact();
    }

    fn position(&self, pred: &impl Fn(&L) -> bool) -> Option<usize> {
        self.entries.iter().position(|e| match e.upgrade() {
            Some(rc) => pred(&rc),
            None => false,
        })
    }

    fn push_entry(&mut self, entry: Entry<L>) {
        if self.entries.len() == self.entries.capacity() {
            let additional = if self.entries.len() < 2 {
                1
            } else {
                self.entries.len()
            };
            self.entries.reserve_exact(additional);
        }
        self.entries.push(entry);
    }

    fn compact(&mut self) {
        self.entries.retain(Entry::live);
    }
}

/// Run one listener callback, trapping any panic and forwarding it to the
/// uncaught-error sink so delivery to the remaining listeners continues.
pub fn dispatch_guarded(context: &'static str, f: impl FnOnce()) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(f)) {
        uncaught::report(UncaughtError::new(context, payload));
    }
}
