//! Attach human context to foreign errors.

use super::{BeadsError, Result};

/// Extension for results carrying a foreign error type.
pub trait ResultExt<T> {
    /// Wrap the error with a static description of what was being attempted.
    ///
    /// # Errors
    ///
    /// Returns [`BeadsError::WithContext`] if `self` is an error.
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Like [`ResultExt::context`], building the description lazily.
    ///
    /// # Errors
    ///
    /// Returns [`BeadsError::WithContext`] if `self` is an error.
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|source| BeadsError::WithContext {
            context: context.into(),
            source: Box::new(source),
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|source| BeadsError::WithContext {
            context: f(),
            source: Box::new(source),
        })
    }
}

/// Turn a missing value into a described error.
pub trait OptionExt<T> {
    /// # Errors
    ///
    /// Returns [`BeadsError::Other`] carrying `context` if `self` is `None`.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| BeadsError::Other(anyhow::anyhow!(context.into())))
    }
}
