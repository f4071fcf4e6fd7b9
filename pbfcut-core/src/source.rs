//! The seam through which theme workers load their features.

use thiserror::Error;

use crate::{FeatureSet, Theme};

/// Error returned by a [`ThemeSource`].
#[derive(Debug, Error)]
#[error("failed to load theme {theme}: {message}")]
pub struct SourceError {
    /// Theme being loaded.
    pub theme: Theme,
    /// What went wrong.
    pub message: String,
    /// Underlying error.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl SourceError {
    /// Wrap a reader error.
    pub fn new<E>(theme: Theme, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            theme,
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// An error described only by text.
    pub fn message(theme: Theme, message: impl Into<String>) -> Self {
        Self {
            theme,
            message: message.into(),
            source: None,
        }
    }
}

/// Supplies the features of one theme.
///
/// `Ok(None)` means the source holds nothing for the theme, which is not an
/// error.
pub trait ThemeSource {
    /// Load every feature tagged with `theme`.
    ///
    /// # Errors
    /// Returns [`SourceError`] when the underlying data cannot be read.
    fn load_theme(&self, theme: Theme) -> Result<Option<FeatureSet>, SourceError>;
}
