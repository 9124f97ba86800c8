//! Shadow gating
//!
//! A [`Gate`] decides, after the primary has answered, whether the secondary
//! is consulted at all.

use std::fmt;

/// Decision on whether to shadow a call
pub enum Gate<T> {
    /// Fixed decision
    Always(bool),
    /// Decision computed from the primary result
    When(Box<dyn FnOnce(&T) -> bool + Send>),
}

impl<T> Gate<T> {
    /// Always compare
    #[inline]
    #[must_use]
    pub fn open() -> Self {
        Self::Always(true)
    }

    /// Never compare
    #[inline]
    #[must_use]
    pub fn closed() -> Self {
        Self::Always(false)
    }

    /// Compare when `predicate` holds for the primary result
    #[inline]
    #[must_use]
    pub fn when(predicate: impl FnOnce(&T) -> bool + Send + 'static) -> Self {
        Self::When(Box::new(predicate))
    }

    /// Evaluate against the primary result
    #[inline]
    pub fn allows(self, primary: &T) -> bool {
        match self {
            Self::Always(decision) => decision,
            Self::When(predicate) => predicate(primary),
        }
    }
}

impl<T> From<bool> for Gate<T> {
    #[inline]
    fn from(decision: bool) -> Self {
        Self::Always(decision)
    }
}

impl<T> fmt::Debug for Gate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always(decision) => f.debug_tuple("Always").field(decision).finish(),
            Self::When(_) => f.write_str("When(..)"),
        }
    }
}
