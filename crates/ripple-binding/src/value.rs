#![forbid(unsafe_code)]

//! Bidirectional value bindings.
//!
//! [`bind`] links two [`Var`]s so that a write to either propagates to the
//! other. The shared listener object carries an `updating` flag armed (via a
//! scoped guard) for the duration of each propagated write, so the echo from
//! the far endpoint is swallowed instead of ping-ponging.
//!
//! # Invariants
//!
//! 1. Binding identity is the unordered endpoint pair: `bind(a, b)` and
//!    `bind(b, a)` yield equal [`ValueBinding`]s, and `unbind` accepts the
//!    endpoints in either order.
//! 2. At bind time the *second* endpoint's value wins: `a` is set from `b`.
//! 3. Endpoints are held weakly; once one side's cell is reclaimed, the
//!    surviving side's listener removes itself on its next invocation.
//! 4. A conversion failure mid-propagation reverts the triggering endpoint
//!    to its previous value and reports through the uncaught-error sink; the
//!    far endpoint is never left half-updated.

use std::any::Any;
use std::cell::Cell;
use std::rc::Rc;

use thiserror::Error;

use ripple_core::listener::ChangeListener;
use ripple_core::uncaught::{self, UncaughtError};
use ripple_core::value::{Var, WeakVar};

use crate::convert::{ConvertError, IdentityConverter, ValueConverter};

/// Why a bind attempt was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("cannot bind an observable to itself")]
    SelfBinding,
    #[error(transparent)]
    Convert(#[from] ConvertError),
}

/// Unordered endpoint-pair identity shared by all binding kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct PairKey {
    lo: usize,
    hi: usize,
}

impl PairKey {
    pub(crate) fn new(a: usize, b: usize) -> Self {
        if a <= b { Self { lo: a, hi: b } } else { Self { lo: b, hi: a } }
    }
}

/// Handle identifying one bidirectional value binding.
///
/// Equality and hashing are over the unordered endpoint pair, so the handles
/// returned by `bind(a, b)` and `bind(b, a)` compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueBinding {
    key: PairKey,
}

/// Arms a reentrancy flag for the current scope; released on all exit paths.
pub(crate) struct UpdatingGuard<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> UpdatingGuard<'a> {
    pub(crate) fn arm(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self { flag }
    }
}

impl Drop for UpdatingGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

/// The listener installed on both endpoints of one binding.
struct BidirectionalListener<A, B, C> {
    key: PairKey,
    a: WeakVar<A>,
    b: WeakVar<B>,
    converter: C,
    updating: Cell<bool>,
}

impl<A, B, C> BidirectionalListener<A, B, C>
where
    A: Clone + PartialEq + 'static,
    B: Clone + PartialEq + 'static,
    C: ValueConverter<A, B>,
{
    fn propagate<S, T>(
        &self,
        source: &Var<S>,
        old: &S,
        target: Option<Var<T>>,
        convert: impl FnOnce() -> Result<T, ConvertError>,
    ) where
        S: Clone + PartialEq + 'static,
        T: Clone + PartialEq + 'static,
    {
        if self.updating.get() {
            return;
        }
        let Some(target) = target else {
            // Far endpoint reclaimed: detach from the surviving side.
            let probe: Rc<dyn ChangeListener<Var<S>, S>> =
                Rc::new(BindingProbe { key: self.key });
            source.remove_change_listener(&probe);
            return;
        };
        let _guard = UpdatingGuard::arm(&self.updating);
        match convert() {
            Ok(value) => target.set(value),
            Err(err) => {
                // Leave both sides in their last consistent state.
                source.set(old.clone());
                uncaught::report(UncaughtError::new(
                    "bidirectional binding converter",
                    Box::new(err.to_string()),
                ));
            }
        }
    }
}

/// Per-endpoint wrappers over the shared listener state. The `Var<A>` and
/// `Var<B>` impls must live on distinct types so they don't overlap when
/// `A == B` (the same-typed `bind` case).
struct SideA<A, B, C>(Rc<BidirectionalListener<A, B, C>>);
struct SideB<A, B, C>(Rc<BidirectionalListener<A, B, C>>);

impl<A, B, C> ChangeListener<Var<A>, A> for SideA<A, B, C>
where
    A: Clone + PartialEq + 'static,
    B: Clone + PartialEq + 'static,
    C: ValueConverter<A, B>,
{
    fn changed(&self, source: &Var<A>, old: &A, new: &A) {
        self.0.propagate(source, old, self.0.b.upgrade(), || self.0.converter.to_target(new));
    }

    fn as_any(&self) -> &dyn Any {
        &self.0.key
    }

    fn matches(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<PairKey>() == Some(&self.0.key)
    }
}

impl<A, B, C> ChangeListener<Var<B>, B> for SideB<A, B, C>
where
    A: Clone + PartialEq + 'static,
    B: Clone + PartialEq + 'static,
    C: ValueConverter<A, B>,
{
    fn changed(&self, source: &Var<B>, old: &B, new: &B) {
        self.0.propagate(source, old, self.0.a.upgrade(), || self.0.converter.to_source(new));
    }

    fn as_any(&self) -> &dyn Any {
        &self.0.key
    }

    fn matches(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<PairKey>() == Some(&self.0.key)
    }
}

/// Inert stand-in carrying only the pair identity, used to remove a binding
/// listener by structural equality without holding the original handle.
pub(crate) struct BindingProbe {
    pub(crate) key: PairKey,
}

impl<T: Clone + PartialEq + 'static> ChangeListener<Var<T>, T> for BindingProbe {
    fn changed(&self, _source: &Var<T>, _old: &T, _new: &T) {}

    fn as_any(&self) -> &dyn Any {
        &self.key
    }

    fn matches(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<PairKey>() == Some(&self.key)
    }
}

/// Bind two same-typed values bidirectionally.
///
/// The second endpoint's value wins: `a` is set from `b` before the
/// listeners are installed.
pub fn bind<T: Clone + PartialEq + 'static>(
    a: &Var<T>,
    b: &Var<T>,
) -> Result<ValueBinding, BindError> {
    bind_with(a, b, IdentityConverter)
}

/// Bind two differently-typed values through `converter`.
///
/// `a` is initialized from `b` through `converter.to_source`; a failure
/// there rejects the bind with nothing mutated.
pub fn bind_with<A, B, C>(a: &Var<A>, b: &Var<B>, converter: C) -> Result<ValueBinding, BindError>
where
    A: Clone + PartialEq + 'static,
    B: Clone + PartialEq + 'static,
    C: ValueConverter<A, B>,
{
    if a.id() == b.id() {
        return Err(BindError::SelfBinding);
    }
    let key = PairKey::new(a.id(), b.id());
    let initial = converter.to_source(&b.get())?;

    let listener = Rc::new(BidirectionalListener {
        key,
        a: a.downgrade(),
        b: b.downgrade(),
        converter,
        updating: Cell::new(false),
    });
    a.set(initial);
    a.add_change_listener(Rc::new(SideA(Rc::clone(&listener))) as Rc<dyn ChangeListener<Var<A>, A>>);
    b.add_change_listener(Rc::new(SideB(listener)) as Rc<dyn ChangeListener<Var<B>, B>>);
    tracing::debug!(binding = ?key, "bidirectional value binding installed");
    Ok(ValueBinding { key })
}

/// Remove the binding between `a` and `b`, in either endpoint order.
///
/// Returns whether a binding listener was found on either side; a no-op on
/// unbound pairs.
pub fn unbind<A, B>(a: &Var<A>, b: &Var<B>) -> bool
where
    A: Clone + PartialEq + 'static,
    B: Clone + PartialEq + 'static,
{
    let key = PairKey::new(a.id(), b.id());
    let probe_a: Rc<dyn ChangeListener<Var<A>, A>> = Rc::new(BindingProbe { key });
    let probe_b: Rc<dyn ChangeListener<Var<B>, B>> = Rc::new(BindingProbe { key });
    let removed_a = a.remove_change_listener(&probe_a);
    let removed_b = b.remove_change_listener(&probe_b);
    if removed_a || removed_b {
        tracing::debug!(binding = ?key, "bidirectional value binding removed");
    }
    removed_a || removed_b
}
