//! Form configuration
//!
//! [`FormConfig`] carries the settings the engine reads from its host:
//! whether native constraint validation runs, the locale handed to schemas,
//! the debounce window for batched validation requests, and whether fields
//! keep their values when they unmount.
//!
//! A configuration can be built in code, parsed from TOML, or installed once
//! as the process-wide default that every new form starts from.
//!
//! # Examples
//!
//! ```
//! use reinhardt_form_state::FormConfig;
//! use std::time::Duration;
//!
//! let config = FormConfig::new()
//!     .with_locale("de")
//!     .with_validation_debounce(Duration::from_millis(20));
//!
//! assert_eq!(config.locale, "de");
//! assert_eq!(config.validation_debounce(), Duration::from_millis(20));
//! assert!(!config.disable_html_validation);
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

/// Default debounce window for batched validation requests, in milliseconds
pub const DEFAULT_VALIDATION_DEBOUNCE_MS: u64 = 5;

static GLOBAL_CONFIG: OnceLock<FormConfig> = OnceLock::new();

/// Settings consumed by forms, fields and validation providers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormConfig {
	/// Skip native constraint validation on every field
	pub disable_html_validation: bool,
	/// Locale passed to schemas through their context
	pub locale: String,
	/// Debounce window for batched validation requests
	pub validation_debounce_ms: u64,
	/// Keep a field's value in the form when the field unmounts
	pub keep_values_on_unmount: bool,
}

impl Default for FormConfig {
	fn default() -> Self {
		Self {
			disable_html_validation: false,
			locale: "en".to_string(),
			validation_debounce_ms: DEFAULT_VALIDATION_DEBOUNCE_MS,
			keep_values_on_unmount: false,
		}
	}
}

impl FormConfig {
	/// Create a configuration with default values
	///
	/// Defaults:
	/// - `disable_html_validation`: false
	/// - `locale`: "en"
	/// - `validation_debounce_ms`: 5
	/// - `keep_values_on_unmount`: false
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_html_validation_disabled(mut self, disabled: bool) -> Self {
		self.disable_html_validation = disabled;
		self
	}

	pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
		self.locale = locale.into();
		self
	}

	pub fn with_validation_debounce(mut self, window: Duration) -> Self {
		self.validation_debounce_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
		self
	}

	pub fn with_keep_values_on_unmount(mut self, keep: bool) -> Self {
		self.keep_values_on_unmount = keep;
		self
	}

	/// The debounce window as a `Duration`
	pub fn validation_debounce(&self) -> Duration {
		Duration::from_millis(self.validation_debounce_ms)
	}

	/// Parse a configuration from TOML. Missing keys take their defaults.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_form_state::FormConfig;
	///
	/// let config = FormConfig::from_toml_str(r#"
	///     locale = "fr"
	///     disable_html_validation = true
	/// "#).unwrap();
	///
	/// assert_eq!(config.locale, "fr");
	/// assert!(config.disable_html_validation);
	/// assert_eq!(config.validation_debounce_ms, 5);
	/// ```
	pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(source)?)
	}

	/// Install the process-wide default configuration.
	///
	/// Can only be called once; later calls return
	/// [`ConfigError::AlreadyConfigured`].
	pub fn configure(config: FormConfig) -> Result<(), ConfigError> {
		GLOBAL_CONFIG
			.set(config)
			.map_err(|_| ConfigError::AlreadyConfigured)
	}

	/// The process-wide default, or `FormConfig::default()` if none was installed
	pub fn global() -> FormConfig {
		GLOBAL_CONFIG.get().cloned().unwrap_or_default()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_defaults() {
		let config = FormConfig::default();
		assert!(!config.disable_html_validation);
		assert_eq!(config.locale, "en");
		assert_eq!(config.validation_debounce(), Duration::from_millis(5));
		assert!(!config.keep_values_on_unmount);
	}

	#[rstest]
	fn test_from_toml_full() {
		let config = FormConfig::from_toml_str(
			r#"
			disable_html_validation = true
			locale = "ja"
			validation_debounce_ms = 50
			keep_values_on_unmount = true
			"#,
		)
		.unwrap();

		assert_eq!(
			config,
			FormConfig::new()
				.with_html_validation_disabled(true)
				.with_locale("ja")
				.with_validation_debounce(Duration::from_millis(50))
				.with_keep_values_on_unmount(true)
		);
	}

	#[rstest]
	fn test_from_toml_rejects_wrong_types() {
		let result = FormConfig::from_toml_str("validation_debounce_ms = \"soon\"");
		assert!(matches!(result, Err(ConfigError::Parse(_))));
	}
}
