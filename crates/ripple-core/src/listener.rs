#![forbid(unsafe_code)]

//! Listener capability traits.
//!
//! Two kinds of listener exist at the value level:
//!
//! - [`InvalidationListener`]: "the value may be stale" — no payload beyond
//!   the source identity.
//! - [`ChangeListener`]: "the value changed from `old` to `new`" — fired only
//!   when the observable actually changed.
//!
//! Both traits are implemented for free by closures, so the common case reads
//! like the usual `subscribe(|v| ..)` style. Non-closure implementors (the
//! bidirectional bindings) additionally override [`matches`] so a registry
//! can remove them by structural equality — removal by an equal probe is what
//! makes order-insensitive `unbind(a, b)` possible without keeping the
//! original listener handle around.
//!
//! [`matches`]: InvalidationListener::matches

use std::any::Any;

/// Notified when an observable's value may no longer be valid.
///
/// `S` is the concrete source handle type (e.g. `Var<T>`).
pub trait InvalidationListener<S>: 'static {
    /// Called after the source mutated.
    fn invalidated(&self, source: &S);

    /// Identity hook used for structural-equality removal.
    fn as_any(&self) -> &dyn Any;

    /// Structural equality against another listener's [`as_any`] view.
    ///
    /// The default is "never equal"; registries fall back to reference
    /// equality ([`listener_eq`]) for plain listeners.
    ///
    /// [`as_any`]: InvalidationListener::as_any
    fn matches(&self, _other: &dyn Any) -> bool {
        false
    }
}

impl<S: 'static, F: Fn(&S) + 'static> InvalidationListener<S> for F {
    fn invalidated(&self, source: &S) {
        self(source);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Notified with the old and new value when an observable changes.
pub trait ChangeListener<S, T>: 'static {
    /// Called after the source's value changed from `old` to `new`.
    fn changed(&self, source: &S, old: &T, new: &T);

    /// Identity hook used for structural-equality removal.
    fn as_any(&self) -> &dyn Any;

    /// Structural equality against another listener's `as_any` view.
    fn matches(&self, _other: &dyn Any) -> bool {
        false
    }
}

impl<S: 'static, T: 'static, F: Fn(&S, &T, &T) + 'static> ChangeListener<S, T> for F {
    fn changed(&self, source: &S, old: &T, new: &T) {
        self(source, old, new);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Reference equality for (possibly unsized) listener objects.
///
/// Compares the data-pointer addresses, ignoring vtable metadata, so two
/// `&dyn` views of the same allocation compare equal.
pub fn listener_eq<L: ?Sized>(a: &L, b: &L) -> bool {
    std::ptr::addr_eq(a as *const L, b as *const L)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn closures_implement_invalidation_listener() {
        let l: Rc<dyn InvalidationListener<u32>> = Rc::new(|_source: &u32| {});
        l.invalidated(&7);
    }

    #[test]
    fn listener_eq_same_allocation() {
        let l: Rc<dyn InvalidationListener<u32>> = Rc::new(|_: &u32| {});
        let l2 = Rc::clone(&l);
        assert!(listener_eq(&*l, &*l2));
    }

    #[test]
    fn listener_eq_distinct_allocations() {
        let a: Rc<dyn InvalidationListener<u32>> = Rc::new(|_: &u32| {});
        let b: Rc<dyn InvalidationListener<u32>> = Rc::new(|_: &u32| {});
        assert!(!listener_eq(&*a, &*b));
    }

    #[test]
    fn default_matches_is_false() {
        let a: Rc<dyn ChangeListener<u32, u32>> = Rc::new(|_: &u32, _: &u32, _: &u32| {});
        let b: Rc<dyn ChangeListener<u32, u32>> = Rc::new(|_: &u32, _: &u32, _: &u32| {});
        assert!(!a.matches(b.as_any()));
    }
}
