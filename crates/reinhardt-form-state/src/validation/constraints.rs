//! Native constraint validation
//!
//! [`Constraints`] mirrors the constraint attributes of an HTML control
//! (`required`, `minlength`, `maxlength`, `pattern`, `min`, `max`, `step`
//! and the `email`/`url`/`number` input types). Checking a value yields at
//! most one message, the first failing constraint in validity order:
//!
//! 1. value missing
//! 2. type mismatch
//! 3. pattern mismatch
//! 4. too long / too short
//! 5. range underflow / overflow
//! 6. step mismatch
//!
//! Empty values only fail `required`; every other constraint is skipped.

use crate::value::FormValue;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

static EMAIL_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
static URL_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

fn email_regex() -> Option<&'static Regex> {
	EMAIL_REGEX
		.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok())
		.as_ref()
}

fn url_regex() -> Option<&'static Regex> {
	URL_REGEX
		.get_or_init(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.\-]*://[^\s/?#]+[^\s]*$").ok())
		.as_ref()
}

/// Compiled form of [`Constraints::pattern`], built on first use
#[derive(Debug, Clone, Default)]
struct CompiledPattern(OnceLock<(String, Option<Regex>)>);

impl CompiledPattern {
	fn is_match(&self, pattern: &str, text: &str) -> Option<bool> {
		let (source, regex) = self.0.get_or_init(|| (pattern.to_string(), compile_pattern(pattern)));
		if source == pattern {
			regex.as_ref().map(|regex| regex.is_match(text))
		} else {
			compile_pattern(pattern).map(|regex| regex.is_match(text))
		}
	}
}

// equality ignores the cache
impl PartialEq for CompiledPattern {
	fn eq(&self, _: &Self) -> bool {
		true
	}
}

fn compile_pattern(pattern: &str) -> Option<Regex> {
	Regex::new(&format!("^(?:{pattern})$"))
		.inspect_err(|error| tracing::warn!(%pattern, %error, "ignoring invalid pattern constraint"))
		.ok()
}

/// Control type, as far as validation is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
	#[default]
	Text,
	Email,
	Url,
	Number,
}

/// Constraint attributes of one control
///
/// # Examples
///
/// ```
/// use reinhardt_form_state::{Constraints, FormValue, InputType};
///
/// let constraints = Constraints::new()
///     .required()
///     .with_input_type(InputType::Email);
///
/// assert_eq!(constraints.check(None).as_deref(), Some("This field is required"));
/// assert_eq!(
///     constraints.check(Some(&FormValue::from("nope"))).as_deref(),
///     Some("Enter a valid email address")
/// );
/// assert_eq!(constraints.check(Some(&FormValue::from("a@b.co"))), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraints {
	pub required: bool,
	pub min_length: Option<usize>,
	pub max_length: Option<usize>,
	/// Matched against the whole value, like the HTML attribute
	pub pattern: Option<String>,
	pub min: Option<f64>,
	pub max: Option<f64>,
	pub step: Option<f64>,
	pub input_type: InputType,
	#[serde(skip)]
	compiled: CompiledPattern,
}

impl Constraints {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn required(mut self) -> Self {
		self.required = true;
		self
	}

	pub fn with_min_length(mut self, min: usize) -> Self {
		self.min_length = Some(min);
		self
	}

	pub fn with_max_length(mut self, max: usize) -> Self {
		self.max_length = Some(max);
		self
	}

	pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
		self.pattern = Some(pattern.into());
		self
	}

	pub fn with_min(mut self, min: f64) -> Self {
		self.min = Some(min);
		self
	}

	pub fn with_max(mut self, max: f64) -> Self {
		self.max = Some(max);
		self
	}

	pub fn with_step(mut self, step: f64) -> Self {
		self.step = Some(step);
		self
	}

	pub fn with_input_type(mut self, input_type: InputType) -> Self {
		self.input_type = input_type;
		self
	}

	/// Whether any constraint is configured
	pub fn is_empty(&self) -> bool {
		*self == Self::default()
	}

	/// The first failing constraint's message, if any
	pub fn check(&self, value: Option<&FormValue>) -> Option<String> {
		let value = match value {
			Some(value) if !is_missing(value) => value,
			_ => {
				return self
					.required
					.then(|| "This field is required".to_string());
			}
		};

		if let FormValue::Bool(_) | FormValue::File(_) = value {
			return None;
		}

		if let Some(message) = self.check_type(value) {
			return Some(message);
		}

		if let Some(text) = value_text(value) {
			if let Some(message) = self.check_text(&text) {
				return Some(message);
			}
		}

		let number = match value {
			FormValue::Number(number) => number.as_f64(),
			FormValue::String(text) if self.input_type == InputType::Number => {
				text.trim().parse::<f64>().ok()
			}
			_ => None,
		};
		number.and_then(|number| self.check_range(number))
	}

	fn check_type(&self, value: &FormValue) -> Option<String> {
		let text = value.as_str();
		match self.input_type {
			InputType::Text => None,
			InputType::Email => text
				.filter(|text| !email_regex().is_some_and(|regex| regex.is_match(text)))
				.map(|_| "Enter a valid email address".to_string()),
			InputType::Url => text
				.filter(|text| !url_regex().is_some_and(|regex| regex.is_match(text)))
				.map(|_| "Enter a valid URL".to_string()),
			InputType::Number => match value {
				FormValue::Number(_) => None,
				FormValue::String(text) if text.trim().parse::<f64>().is_ok() => None,
				_ => Some("Enter a number".to_string()),
			},
		}
	}

	fn check_text(&self, text: &str) -> Option<String> {
		if let Some(pattern) = &self.pattern {
			if self.compiled.is_match(pattern, text) == Some(false) {
				return Some("Please match the requested format".to_string());
			}
		}

		let length = text.chars().count();
		if let Some(max) = self.max_length.filter(|max| length > *max) {
			return Some(format!("This field must be at most {} characters long", max));
		}
		if let Some(min) = self.min_length.filter(|min| length < *min) {
			return Some(format!("This field must be at least {} characters long", min));
		}
		None
	}

	fn check_range(&self, number: f64) -> Option<String> {
		if let Some(min) = self.min.filter(|min| number < *min) {
			return Some(format!("Value must be greater than or equal to {}", min));
		}
		if let Some(max) = self.max.filter(|max| number > *max) {
			return Some(format!("Value must be less than or equal to {}", max));
		}
		if let Some(step) = self.step.filter(|step| *step > 0.0) {
			let base = self.min.unwrap_or(0.0);
			let steps = (number - base) / step;
			if (steps - steps.round()).abs() > 1e-9 {
				return Some(format!("Value must be a multiple of {}", step));
			}
		}
		None
	}
}

fn is_missing(value: &FormValue) -> bool {
	match value {
		FormValue::Null => true,
		FormValue::String(text) => text.is_empty(),
		FormValue::Bool(checked) => !checked,
		FormValue::Array(items) => items.is_empty(),
		_ => false,
	}
}

fn value_text(value: &FormValue) -> Option<String> {
	match value {
		FormValue::String(text) => Some(text.clone()),
		FormValue::Number(number) => Some(number.to_string()),
		_ => None,
	}
}
