//! Output, value and error comparators
//!
//! Defaults: encoded output compares byte for byte, decoded values with
//! `PartialEq`, errors only by presence. Each can be replaced by a hook.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Hook comparing two encoded outputs
pub type EncodedEq = Arc<dyn Fn(&[u8], &[u8]) -> bool + Send + Sync>;

/// Hook comparing two decoded values of the same type
pub type DecodedEq = Arc<dyn Fn(&dyn Any, &dyn Any) -> bool + Send + Sync>;

/// Hook comparing the errors of the two paths
pub type ErrorsEq<E> = Arc<dyn Fn(Option<&E>, Option<&E>) -> bool + Send + Sync>;

/// Hook producing an independent copy of a decode target
///
/// Returning `None`, or a box of another type, means the value cannot be
/// cloned by the hook.
pub type CloneHook = Arc<dyn Fn(&dyn Any) -> Option<Box<dyn Any>> + Send + Sync>;

/// Equality hooks used to decide whether two paths diverged
pub struct Comparators<E> {
    encoded: Option<EncodedEq>,
    decoded: Option<DecodedEq>,
    errors: Option<ErrorsEq<E>>,
}

impl<E> Default for Comparators<E> {
    fn default() -> Self {
        Self {
            encoded: None,
            decoded: None,
            errors: None,
        }
    }
}

impl<E> Clone for Comparators<E> {
    fn clone(&self) -> Self {
        Self {
            encoded: self.encoded.clone(),
            decoded: self.decoded.clone(),
            errors: self.errors.clone(),
        }
    }
}

impl<E> fmt::Debug for Comparators<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Comparators")
            .field("encoded", &self.encoded.is_some())
            .field("decoded", &self.decoded.is_some())
            .field("errors", &self.errors.is_some())
            .finish()
    }
}

impl<E> Comparators<E> {
    /// Default comparators
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the encoded output comparator
    #[must_use]
    pub fn with_encoded<F>(mut self, f: F) -> Self
    where
        F: Fn(&[u8], &[u8]) -> bool + Send + Sync + 'static,
    {
        self.encoded = Some(Arc::new(f));
        self
    }

    /// Replace the decoded value comparator
    #[must_use]
    pub fn with_decoded<F>(mut self, f: F) -> Self
    where
        F: Fn(&dyn Any, &dyn Any) -> bool + Send + Sync + 'static,
    {
        self.decoded = Some(Arc::new(f));
        self
    }

    /// Replace the error comparator
    #[must_use]
    pub fn with_errors<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&E>, Option<&E>) -> bool + Send + Sync + 'static,
    {
        self.errors = Some(Arc::new(f));
        self
    }

    /// Compare encoded outputs
    #[must_use]
    pub fn encoded_eq(&self, old: &[u8], new: &[u8]) -> bool {
        match &self.encoded {
            Some(f) => f(old, new),
            None => old == new,
        }
    }

    /// Compare decoded values
    #[must_use]
    pub fn decoded_eq<T: PartialEq + 'static>(&self, old: &T, new: &T) -> bool {
        match &self.decoded {
            Some(f) => f(old, new),
            None => old == new,
        }
    }

    /// Compare errors
    #[must_use]
    pub fn errors_eq(&self, old: Option<&E>, new: Option<&E>) -> bool {
        match &self.errors {
            Some(f) => f(old, new),
            None => old.is_some() == new.is_some(),
        }
    }
}

/// Clone a decode target
///
/// Tries `hook` first. Without a hook, or when it declines, only a target
/// equal to `T::default()` can be cloned, by allocating a fresh default.
#[must_use]
pub fn clone_target<T>(hook: Option<&CloneHook>, target: &T) -> Option<T>
where
    T: Default + PartialEq + 'static,
{
    if let Some(hook) = hook {
        if let Some(cloned) = hook(target).and_then(|b| b.downcast::<T>().ok()) {
            return Some(*cloned);
        }
    }
    let zero = T::default();
    (*target == zero).then_some(zero)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Doc {
        body: String,
    }

    #[test]
    fn default_comparators() {
        let c = Comparators::<std::io::Error>::new();
        assert!(c.encoded_eq(b"abc", b"abc"));
        assert!(!c.encoded_eq(b"abc", b"abd"));
        assert!(c.decoded_eq(&1u32, &1u32));

        let e1 = std::io::Error::other("one");
        let e2 = std::io::Error::other("two");
        assert!(c.errors_eq(None, None));
        assert!(c.errors_eq(Some(&e1), Some(&e2)));
        assert!(!c.errors_eq(Some(&e1), None));
    }

    #[test]
    fn hooks_override_defaults() {
        let c = Comparators::<std::io::Error>::new()
            .with_encoded(|a, b| a.eq_ignore_ascii_case(b))
            .with_decoded(|_, _| true)
            .with_errors(|a, b| match (a, b) {
                (Some(a), Some(b)) => a.to_string() == b.to_string(),
                (a, b) => a.is_none() && b.is_none(),
            });

        assert!(c.encoded_eq(b"ABC", b"abc"));
        assert!(c.decoded_eq(&1u32, &2u32));
        let e1 = std::io::Error::other("one");
        let e2 = std::io::Error::other("two");
        assert!(!c.errors_eq(Some(&e1), Some(&e2)));
    }

    #[test]
    fn clone_without_hook_only_for_default() {
        assert_eq!(clone_target(None, &Doc::default()), Some(Doc::default()));
        let filled = Doc {
            body: "x".into(),
        };
        assert_eq!(clone_target(None, &filled), None);
    }

    #[test]
    fn clone_hook_is_downcast() {
        let hook: CloneHook = Arc::new(|v: &dyn Any| {
            v.downcast_ref::<Doc>().map(|d| {
                Box::new(Doc {
                    body: d.body.clone(),
                }) as Box<dyn Any>
            })
        });
        let filled = Doc {
            body: "x".into(),
        };
        assert_eq!(clone_target(Some(&hook), &filled), Some(Doc { body: "x".into() }));

        // Hook handles another type only; falls back to the default rule.
        assert_eq!(clone_target(Some(&hook), &0u8), Some(0u8));
        assert_eq!(clone_target(Some(&hook), &3u8), None);
    }
}
