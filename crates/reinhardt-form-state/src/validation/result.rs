//! Validation results
//!
//! Every validator, whatever its scope, reports a [`ValidationResult`]. An
//! invalid result carries one [`IssueCollection`] per offending path.

use crate::path::Path;
use crate::value::FormValue;
use serde::{Deserialize, Serialize};

/// The scope a validation result was produced for.
///
/// The declaration order is the stitching order: group outputs are applied
/// before field outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValidationScope {
	Group,
	Field,
	Form,
}

/// How a scope's output was assembled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
	/// Stitched together from every source's output
	#[default]
	Aggregate,
	/// Produced by the scope's own schema
	Schema,
}

/// Messages reported for one path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCollection {
	pub path: Path,
	pub messages: Vec<String>,
}

impl IssueCollection {
	pub fn new<P, I, S>(path: P, messages: I) -> Self
	where
		P: Into<Path>,
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			path: path.into(),
			messages: messages.into_iter().map(Into::into).collect(),
		}
	}

	/// An entry with no messages counts as absent
	pub fn is_empty(&self) -> bool {
		self.messages.is_empty()
	}
}

/// Drop collections without messages
pub fn retain_non_empty(issues: Vec<IssueCollection>) -> Vec<IssueCollection> {
	issues.into_iter().filter(|issue| !issue.is_empty()).collect()
}

/// Outcome of validating one scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
	pub scope: ValidationScope,
	/// Root for pathless fields and for the form scope
	pub path: Path,
	pub is_valid: bool,
	pub errors: Vec<IssueCollection>,
	/// The scope's parsed output, if it produced one
	pub output: Option<FormValue>,
	pub mode: ValidationMode,
}

impl ValidationResult {
	/// Build a result, deriving `is_valid` from the non-empty errors
	pub fn new(
		scope: ValidationScope,
		path: Path,
		errors: Vec<IssueCollection>,
		output: Option<FormValue>,
		mode: ValidationMode,
	) -> Self {
		let errors = retain_non_empty(errors);
		Self {
			scope,
			path,
			is_valid: errors.is_empty(),
			errors,
			output,
			mode,
		}
	}

	/// A valid field result carrying `output`
	pub fn valid_field(path: Path, output: Option<FormValue>) -> Self {
		Self::new(
			ValidationScope::Field,
			path,
			Vec::new(),
			output,
			ValidationMode::Aggregate,
		)
	}

	/// All messages, in order
	pub fn messages(&self) -> impl Iterator<Item = &str> {
		self.errors
			.iter()
			.flat_map(|issue| issue.messages.iter().map(String::as_str))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_empty_collections_are_filtered() {
		let result = ValidationResult::new(
			ValidationScope::Form,
			Path::root(),
			vec![
				IssueCollection::new("a", Vec::<String>::new()),
				IssueCollection::new("b", ["required"]),
			],
			None,
			ValidationMode::Aggregate,
		);

		assert!(!result.is_valid);
		assert_eq!(result.errors, vec![IssueCollection::new("b", ["required"])]);
		assert_eq!(result.messages().collect::<Vec<_>>(), vec!["required"]);
	}

	#[rstest]
	fn test_only_empty_collections_is_valid() {
		let result = ValidationResult::new(
			ValidationScope::Field,
			Path::parse("a"),
			vec![IssueCollection::new("a", Vec::<String>::new())],
			None,
			ValidationMode::Aggregate,
		);
		assert!(result.is_valid);
	}

	#[rstest]
	fn test_groups_sort_before_fields() {
		let mut scopes = vec![ValidationScope::Field, ValidationScope::Group];
		scopes.sort();
		assert_eq!(scopes, vec![ValidationScope::Group, ValidationScope::Field]);
	}

	#[rstest]
	fn test_serialized_shape() {
		let result = ValidationResult::new(
			ValidationScope::Field,
			Path::parse("user.name"),
			vec![IssueCollection::new("user.name", ["too short"])],
			None,
			ValidationMode::Schema,
		);
		let json = serde_json::to_value(&result).unwrap();

		assert_eq!(json["scope"], "FIELD");
		assert_eq!(json["mode"], "schema");
		assert_eq!(json["errors"][0]["path"], "user.name");
	}
}
