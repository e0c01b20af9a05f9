#![forbid(unsafe_code)]

//! Value conversion at binding boundaries.
//!
//! A bidirectional binding between differently-typed endpoints carries a
//! [`ValueConverter`] that translates in both directions. Either direction
//! may fail; the binding then leaves both endpoints in their last consistent
//! state and surfaces the failure (see the binding module).

use thiserror::Error;

/// A value could not be translated across a binding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("conversion failed: {reason}")]
pub struct ConvertError {
    reason: String,
}

impl ConvertError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Two-way translation between the endpoint types of a binding.
///
/// `to_target` maps the first endpoint's type to the second's; `to_source`
/// is the inverse direction. The two should round-trip for values that
/// convert at all, or the binding will oscillate toward a fixed point.
pub trait ValueConverter<A, B>: 'static {
    fn to_target(&self, value: &A) -> Result<B, ConvertError>;
    fn to_source(&self, value: &B) -> Result<A, ConvertError>;
}

/// The trivial converter for same-typed endpoints.
pub struct IdentityConverter;

impl<T: Clone + 'static> ValueConverter<T, T> for IdentityConverter {
    fn to_target(&self, value: &T) -> Result<T, ConvertError> {
        Ok(value.clone())
    }

    fn to_source(&self, value: &T) -> Result<T, ConvertError> {
        Ok(value.clone())
    }
}

/// Converter built from a pair of closures.
pub struct FnConverter<F, G> {
    forward: F,
    back: G,
}

impl<F, G> FnConverter<F, G> {
    pub fn new(forward: F, back: G) -> Self {
        Self { forward, back }
    }
}

impl<A, B, F, G> ValueConverter<A, B> for FnConverter<F, G>
where
    F: Fn(&A) -> Result<B, ConvertError> + 'static,
    G: Fn(&B) -> Result<A, ConvertError> + 'static,
{
    fn to_target(&self, value: &A) -> Result<B, ConvertError> {
        (self.forward)(value)
    }

    fn to_source(&self, value: &B) -> Result<A, ConvertError> {
        (self.back)(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric() -> impl ValueConverter<i32, String> {
        FnConverter::new(
            |n: &i32| Ok(n.to_string()),
            |s: &String| s.parse().map_err(|_| ConvertError::new(format!("not a number: {s}"))),
        )
    }

    #[test]
    fn identity_round_trips() {
        let c = IdentityConverter;
        assert_eq!(c.to_target(&7), Ok(7));
        assert_eq!(c.to_source(&7), Ok(7));
    }

    #[test]
    fn fn_converter_translates_both_ways() {
        let c = numeric();
        assert_eq!(c.to_target(&42), Ok("42".to_string()));
        assert_eq!(c.to_source(&"42".to_string()), Ok(42));
    }

    #[test]
    fn fn_converter_reports_failure() {
        let c = numeric();
        let err = c.to_source(&"nope".to_string()).unwrap_err();
        assert!(err.reason().contains("nope"));
    }
}
