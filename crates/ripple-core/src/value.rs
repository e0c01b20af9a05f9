#![forbid(unsafe_code)]

//! Writable observable values.
//!
//! [`Var<T>`] is a shared handle (`Rc<RefCell<..>>`) to a single value plus
//! its listener registries. Cloning the handle clones the *handle*, not the
//! value: all clones observe and mutate the same cell.
//!
//! # Invariants
//!
//! 1. [`set`] fires only when the new value differs per `PartialEq`.
//! 2. Within one fire, every invalidation listener is delivered before any
//!    change listener.
//! 3. All listener callbacks run outside the cell's borrow, so a listener may
//!    read — or write — the `Var` it is registered on.
//!
//! [`set`]: Var::set

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::listener::{ChangeListener, InvalidationListener, listener_eq};
use crate::registry::{ListenerList, dispatch_guarded};

struct VarInner<T> {
    value: T,
    invalidation: ListenerList<dyn InvalidationListener<Var<T>>>,
    changes: ListenerList<dyn ChangeListener<Var<T>, T>>,
}

/// A shared, writable observable value.
pub struct Var<T> {
    inner: Rc<RefCell<VarInner<T>>>,
}

impl<T> Clone for Var<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Var<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Var").field(&self.inner.borrow().value).finish()
    }
}

impl<T: Default + Clone + PartialEq + 'static> Default for Var<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + PartialEq + 'static> Var<T> {
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(VarInner {
                value,
                invalidation: ListenerList::new(),
                changes: ListenerList::new(),
            })),
        }
    }

    /// Current value, cloned out of the cell.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Read the value in place without cloning.
    ///
    /// The borrow is held for the duration of `f`; do not call [`set`] from
    /// inside it.
    ///
    /// [`set`]: Var::set
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    /// Replace the value, notifying listeners if it actually changed.
    ///
    /// Equal values (per `PartialEq`) are a complete no-op: no listener of
    /// either kind fires.
    pub fn set(&self, value: T) {
        let (old, new, inv, chg) = {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return;
            }
            let old = std::mem::replace(&mut inner.value, value);
            let new = inner.value.clone();
            let inv = inner.invalidation.begin_fire();
            let chg = inner.changes.begin_fire();
            (old, new, inv, chg)
        };

        let source = self.clone();
        for l in &inv {
            dispatch_guarded("invalidation listener", || l.invalidated(&source));
        }
        for l in &chg {
            dispatch_guarded("change listener", || l.changed(&source, &old, &new));
        }

        let mut inner = self.inner.borrow_mut();
        inner.invalidation.end_fire();
        inner.changes.end_fire();
    }

    /// Compute a new value from the current one and [`set`] it.
    ///
    /// [`set`]: Var::set
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let new = f(&self.inner.borrow().value);
        self.set(new);
    }

    pub fn add_invalidation_listener(&self, listener: Rc<dyn InvalidationListener<Var<T>>>) {
        self.inner.borrow_mut().invalidation.add(listener);
    }

    /// Register a weakly-held invalidation listener. The entry is dropped
    /// once the last strong handle to the listener goes away.
    pub fn add_weak_invalidation_listener(&self, listener: Weak<dyn InvalidationListener<Var<T>>>) {
        self.inner.borrow_mut().invalidation.add_weak(listener);
    }

    /// Remove the first registered invalidation listener equal to `listener`
    /// (reference equality, or structural equality via `matches`).
    pub fn remove_invalidation_listener(
        &self,
        listener: &Rc<dyn InvalidationListener<Var<T>>>,
    ) -> bool {
        let probe = Rc::clone(listener);
        self.inner.borrow_mut().invalidation.remove_first(move |e| {
            listener_eq(e, &*probe) || e.matches(probe.as_any()) || probe.matches(e.as_any())
        })
    }

    #[must_use]
    pub fn contains_invalidation_listener(
        &self,
        listener: &Rc<dyn InvalidationListener<Var<T>>>,
    ) -> bool {
        let probe = Rc::clone(listener);
        self.inner.borrow().invalidation.contains(move |e| {
            listener_eq(e, &*probe) || e.matches(probe.as_any()) || probe.matches(e.as_any())
        })
    }

    pub fn add_change_listener(&self, listener: Rc<dyn ChangeListener<Var<T>, T>>) {
        self.inner.borrow_mut().changes.add(listener);
    }

    pub fn add_weak_change_listener(&self, listener: Weak<dyn ChangeListener<Var<T>, T>>) {
        self.inner.borrow_mut().changes.add_weak(listener);
    }

    /// Remove the first registered change listener equal to `listener`
    /// (reference equality, or structural equality via `matches`).
    pub fn remove_change_listener(&self, listener: &Rc<dyn ChangeListener<Var<T>, T>>) -> bool {
        let probe = Rc::clone(listener);
        self.inner.borrow_mut().changes.remove_first(move |e| {
            listener_eq(e, &*probe) || e.matches(probe.as_any()) || probe.matches(e.as_any())
        })
    }

    #[must_use]
    pub fn contains_change_listener(&self, listener: &Rc<dyn ChangeListener<Var<T>, T>>) -> bool {
        let probe = Rc::clone(listener);
        self.inner.borrow().changes.contains(move |e| {
            listener_eq(e, &*probe) || e.matches(probe.as_any()) || probe.matches(e.as_any())
        })
    }

    /// Convenience: register a closure change listener and return the handle
    /// needed to remove it later.
    pub fn listen(
        &self,
        f: impl Fn(&Var<T>, &T, &T) + 'static,
    ) -> Rc<dyn ChangeListener<Var<T>, T>> {
        let listener: Rc<dyn ChangeListener<Var<T>, T>> = Rc::new(f);
        self.add_change_listener(Rc::clone(&listener));
        listener
    }

    /// Convenience: register a closure invalidation listener and return its
    /// handle.
    pub fn on_invalidated(
        &self,
        f: impl Fn(&Var<T>) + 'static,
    ) -> Rc<dyn InvalidationListener<Var<T>>> {
        let listener: Rc<dyn InvalidationListener<Var<T>>> = Rc::new(f);
        self.add_invalidation_listener(Rc::clone(&listener));
        listener
    }

    #[must_use]
    pub fn invalidation_listener_count(&self) -> usize {
        self.inner.borrow().invalidation.len()
    }

    #[must_use]
    pub fn change_listener_count(&self) -> usize {
        self.inner.borrow().changes.len()
    }

    /// Stable identity of the underlying cell, usable as a map key for
    /// binding bookkeeping. Valid for the lifetime of the cell.
    #[must_use]
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }

    /// Whether two handles share the same underlying cell.
    #[must_use]
    pub fn ptr_eq(&self, other: &Var<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> WeakVar<T> {
        WeakVar {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

/// Non-owning handle to a [`Var`]'s cell.
pub struct WeakVar<T> {
    inner: Weak<RefCell<VarInner<T>>>,
}

impl<T> Clone for WeakVar<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T> WeakVar<T> {
    #[must_use]
    pub fn upgrade(&self) -> Option<Var<T>> {
        self.inner.upgrade().map(|inner| Var { inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn set_updates_value() {
        let v = Var::new(1);
        v.set(5);
        assert_eq!(v.get(), 5);
    }

    #[test]
    fn clones_share_state() {
        let a = Var::new(String::from("x"));
        let b = a.clone();
        b.set(String::from("y"));
        assert_eq!(a.get(), "y");
        assert!(a.ptr_eq(&b));
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn equal_set_is_a_complete_noop() {
        let v = Var::new(3);
        let fired = Rc::new(Cell::new(0u32));
        let f = Rc::clone(&fired);
        v.on_invalidated(move |_| f.set(f.get() + 1));
        let f = Rc::clone(&fired);
        v.listen(move |_, _, _| f.set(f.get() + 1));

        v.set(3);
        assert_eq!(fired.get(), 0);
        v.set(4);
        assert_eq!(fired.get(), 2);
    }

    #[test]
    fn change_listener_sees_old_and_new() {
        let v = Var::new(10);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        v.listen(move |_, old, new| s.borrow_mut().push((*old, *new)));

        v.set(11);
        v.set(12);
        assert_eq!(seen.borrow().as_slice(), [(10, 11), (11, 12)]);
    }

    #[test]
    fn invalidation_delivered_before_change() {
        let v = Var::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));
        // Registration order deliberately reversed.
        let l = Rc::clone(&log);
        v.listen(move |_, _, _| l.borrow_mut().push("change"));
        let l = Rc::clone(&log);
        v.on_invalidated(move |_| l.borrow_mut().push("invalidation"));

        v.set(1);
        assert_eq!(*log.borrow(), ["invalidation", "change"]);
    }

    #[test]
    fn listener_may_read_source_during_dispatch() {
        let v = Var::new(1);
        let seen = Rc::new(Cell::new(0));
        let s = Rc::clone(&seen);
        v.listen(move |source, _, _| s.set(source.get()));
        v.set(42);
        assert_eq!(seen.get(), 42);
    }

    #[test]
    fn listener_may_write_source_during_dispatch() {
        // A listener clamping the value writes back from inside its own
        // notification; the nested set must not deadlock or drop events.
        let v = Var::new(0);
        let clamped = v.clone();
        v.listen(move |_, _, new| {
            if *new > 10 {
                clamped.set(10);
            }
        });
        v.set(99);
        assert_eq!(v.get(), 10);
    }

    #[test]
    fn self_removing_listener_fires_exactly_once() {
        let v = Var::new(0);
        let count = Rc::new(Cell::new(0u32));
        let slot: Rc<RefCell<Option<Rc<dyn ChangeListener<Var<i32>, i32>>>>> =
            Rc::new(RefCell::new(None));

        let c = Rc::clone(&count);
        let s = Rc::clone(&slot);
        let handle = v.listen(move |source, _, _| {
            c.set(c.get() + 1);
            if let Some(me) = s.borrow_mut().take() {
                source.remove_change_listener(&me);
            }
        });
        *slot.borrow_mut() = Some(handle);

        v.set(1);
        v.set(2);
        assert_eq!(count.get(), 1);
        assert_eq!(v.change_listener_count(), 0);
    }

    #[test]
    fn listener_added_during_dispatch_starts_next_fire() {
        let v = Var::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));

        let l = Rc::clone(&log);
        let inner_log = Rc::clone(&log);
        let target = v.clone();
        let armed = Rc::new(Cell::new(false));
        let a = Rc::clone(&armed);
        v.listen(move |_, _, _| {
            l.borrow_mut().push("outer");
            if !a.get() {
                a.set(true);
                let il = Rc::clone(&inner_log);
                target.listen(move |_, _, _| il.borrow_mut().push("inner"));
            }
        });

        v.set(1);
        assert_eq!(*log.borrow(), ["outer"]);
        v.set(2);
        assert_eq!(*log.borrow(), ["outer", "outer", "inner"]);
    }

    #[test]
    fn panicking_listener_isolated_from_peers_and_mutator() {
        let errors = Rc::new(RefCell::new(Vec::new()));
        let e = Rc::clone(&errors);
        crate::uncaught::set_uncaught_hook(move |err| {
            e.borrow_mut().push(err.context());
        });

        let v = Var::new(0);
        let reached = Rc::new(Cell::new(false));
        v.listen(|_: &Var<i32>, _: &i32, _: &i32| panic!("bad listener"));
        let r = Rc::clone(&reached);
        v.listen(move |_, _, _| r.set(true));

        v.set(1);
        assert!(reached.get());
        assert_eq!(errors.borrow().as_slice(), ["change listener"]);
        assert_eq!(v.get(), 1);
        crate::uncaught::reset_uncaught_hook();
    }

    #[test]
    fn weak_change_listener_unregisters_on_drop() {
        let v = Var::new(0);
        let count = Rc::new(Cell::new(0u32));
        let c = Rc::clone(&count);
        let listener: Rc<dyn ChangeListener<Var<i32>, i32>> =
            Rc::new(move |_: &Var<i32>, _: &i32, _: &i32| c.set(c.get() + 1));
        v.add_weak_change_listener(Rc::downgrade(&listener));

        v.set(1);
        assert_eq!(count.get(), 1);

        drop(listener);
        v.set(2);
        assert_eq!(count.get(), 1);
        assert_eq!(v.change_listener_count(), 0);
    }

    #[test]
    fn remove_by_handle() {
        let v = Var::new(0);
        let count = Rc::new(Cell::new(0u32));
        let c = Rc::clone(&count);
        let handle = v.listen(move |_, _, _| c.set(c.get() + 1));

        v.set(1);
        assert!(v.remove_change_listener(&handle));
        assert!(!v.remove_change_listener(&handle));
        v.set(2);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn update_applies_function() {
        let v = Var::new(20);
        v.update(|n| n * 2);
        assert_eq!(v.get(), 40);
    }

    #[test]
    fn weak_var_upgrade() {
        let v = Var::new(7);
        let w = v.downgrade();
        assert_eq!(w.upgrade().map(|v| v.get()), Some(7));
        drop(v);
        assert!(w.upgrade().is_none());
    }
}
