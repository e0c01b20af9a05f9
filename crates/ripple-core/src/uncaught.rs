#![forbid(unsafe_code)]

//! Process-wide sink for errors escaping listener callbacks.
//!
//! A panic escaping a listener during dispatch is caught per-listener,
//! wrapped in an [`UncaughtError`], and handed to the hook registered here.
//! Delivery to the remaining listeners continues; the mutator that triggered
//! the fire never observes the panic.
//!
//! The hook is an injectable collaborator rather than a global panic hook:
//! hosts register it at startup with [`set_uncaught_hook`], tests swap it for
//! a capturing closure. It is thread-local, consistent with the
//! single-threaded model of the rest of the crate. The default hook logs via
//! `tracing::error!`.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

/// An error that escaped a listener callback.
pub struct UncaughtError {
    context: &'static str,
    payload: Box<dyn Any + Send>,
}

impl UncaughtError {
    /// Wrap a panic payload (or other boxed error) with a dispatch context.
    pub fn new(context: &'static str, payload: Box<dyn Any + Send>) -> Self {
        Self { context, payload }
    }

    /// Where the error escaped from, e.g. `"change listener"`.
    pub fn context(&self) -> &'static str {
        self.context
    }

    /// Best-effort human-readable message extracted from the payload.
    pub fn message(&self) -> &str {
        if let Some(s) = self.payload.downcast_ref::<&'static str>() {
            s
        } else if let Some(s) = self.payload.downcast_ref::<String>() {
            s
        } else {
            "listener failed with a non-string payload"
        }
    }

    /// The raw payload, for hooks that want to downcast it themselves.
    pub fn payload(&self) -> &(dyn Any + Send) {
        &*self.payload
    }
}

impl std::fmt::Debug for UncaughtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UncaughtError")
            .field("context", &self.context)
            .field("message", &self.message())
            .finish()
    }
}

type Hook = Rc<dyn Fn(UncaughtError)>;

thread_local! {
    static HOOK: RefCell<Option<Hook>> = const { RefCell::new(None) };
}

/// Install the hook that receives uncaught listener errors on this thread.
///
/// Replaces any previously installed hook.
pub fn set_uncaught_hook(hook: impl Fn(UncaughtError) + 'static) {
    HOOK.with(|h| *h.borrow_mut() = Some(Rc::new(hook)));
}

/// Restore the default hook (log via `tracing::error!`).
pub fn reset_uncaught_hook() {
    HOOK.with(|h| *h.borrow_mut() = None);
}

/// Forward an error to the installed hook (or the default log-based one).
///
/// The hook is cloned out before invocation, so a hook may itself call
/// [`set_uncaught_hook`] without deadlocking the registry cell.
pub fn report(error: UncaughtError) {
    let hook = HOOK.with(|h| h.borrow().clone());
    match hook {
        Some(hook) => hook(error),
        None => {
            tracing::error!(
                context = error.context(),
                detail = error.message(),
                "uncaught listener error"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn hook_receives_reported_errors() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        set_uncaught_hook(move |e| s.borrow_mut().push(e.message().to_string()));

        report(UncaughtError::new("test", Box::new("boom".to_string())));
        assert_eq!(seen.borrow().as_slice(), ["boom"]);
        reset_uncaught_hook();
    }

    #[test]
    fn message_extracts_static_str() {
        let e = UncaughtError::new("test", Box::new("static message"));
        assert_eq!(e.message(), "static message");
    }

    #[test]
    fn message_falls_back_for_opaque_payloads() {
        let e = UncaughtError::new("test", Box::new(42u32));
        assert_eq!(e.message(), "listener failed with a non-string payload");
    }

    #[test]
    fn default_hook_emits_error_event() {
        use std::sync::{Arc, Mutex};
        use tracing_subscriber::layer::SubscriberExt;

        #[derive(Default)]
        struct Fields(Vec<(String, String)>);

        impl tracing::field::Visit for Fields {
            fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
                self.0.push((field.name().to_string(), value.to_string()));
            }

            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                self.0.push((field.name().to_string(), format!("{value:?}")));
            }
        }

        struct ErrorCapture {
            events: Arc<Mutex<Vec<Vec<(String, String)>>>>,
        }

        impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for ErrorCapture {
            fn on_event(
                &self,
                event: &tracing::Event<'_>,
                _ctx: tracing_subscriber::layer::Context<'_, S>,
            ) {
                if *event.metadata().level() == tracing::Level::ERROR {
                    let mut fields = Fields::default();
                    event.record(&mut fields);
                    self.events.lock().unwrap().push(fields.0);
                }
            }
        }

        reset_uncaught_hook();
        let events = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(ErrorCapture {
            events: Arc::clone(&events),
        });
        tracing::subscriber::with_default(subscriber, || {
            report(UncaughtError::new(
                "change listener",
                Box::new("boom".to_string()),
            ));
        });

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        let fields = &events[0];
        assert!(fields.contains(&("context".to_string(), "change listener".to_string())));
        assert!(fields.contains(&("detail".to_string(), "boom".to_string())));
    }

    #[test]
    fn hook_replacement_takes_effect() {
        let first = Rc::new(Cell::new(0u32));
        let second = Rc::new(Cell::new(0u32));

        let f = Rc::clone(&first);
        set_uncaught_hook(move |_| f.set(f.get() + 1));
        report(UncaughtError::new("test", Box::new(String::new())));

        let s = Rc::clone(&second);
        set_uncaught_hook(move |_| s.set(s.get() + 1));
        report(UncaughtError::new("test", Box::new(String::new())));

        assert_eq!(first.get(), 1);
        assert_eq!(second.get(), 1);
        reset_uncaught_hook();
    }
}
