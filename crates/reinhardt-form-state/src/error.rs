//! Error types for the form state engine
//!
//! Validation failures are not errors: a validator reports them as issue
//! lists inside a [`ValidationResult`](crate::ValidationResult). `FormError`
//! covers the cases where a validation run itself could not complete.

/// Errors produced while validating or submitting a form.
///
/// The type is `Clone` because a single coalesced validation run is fanned
/// out to every caller that joined it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormError {
	/// A user-supplied schema failed to run
	#[error("Schema failed: {0}")]
	Schema(String),
	/// The scope that owned a pending validation request was dropped
	#[error("Validation scope was disposed before the request completed")]
	Disposed,
	/// Form output could not be serialized
	#[error("Failed to serialize form data: {0}")]
	Serialization(String),
}

pub type FormResult<T> = Result<T, FormError>;

/// Errors produced while loading a [`FormConfig`](crate::FormConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("Invalid form configuration: {0}")]
	Parse(#[from] toml::de::Error),
	#[error("The global form configuration has already been set")]
	AlreadyConfigured,
}
