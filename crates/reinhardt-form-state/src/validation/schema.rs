//! Schema contracts
//!
//! Two shapes of external validator plug into the engine:
//!
//! - [`TypedSchema`]: `parse(values, context)` resolving to an optional output
//!   plus path-addressed issue lists. Fields and groups use this shape.
//! - [`StandardSchema`]: `validate(value)` resolving to an optional value plus
//!   a flat list of issues whose paths are key/index lists. Forms accept it
//!   through [`StandardSchemaAdapter`].
//!
//! The engine never looks inside a schema beyond these contracts. An `Err`
//! returned by a schema propagates to whoever awaited the validation.

use crate::error::FormResult;
use crate::path::Path;
use crate::validation::result::IssueCollection;
use crate::value::FormValue;
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// Context handed to [`TypedSchema::parse`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaContext {
	/// Locale from the form configuration
	pub locale: String,
	/// Path of the scope being validated; root for the form
	pub path: Path,
}

/// Result of [`TypedSchema::parse`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaResult {
	pub output: Option<FormValue>,
	pub errors: Vec<IssueCollection>,
}

impl SchemaResult {
	pub fn valid(output: FormValue) -> Self {
		Self {
			output: Some(output),
			errors: Vec::new(),
		}
	}

	pub fn invalid(errors: Vec<IssueCollection>) -> Self {
		Self {
			output: None,
			errors,
		}
	}
}

/// A validator exposing `parse(values, context)`
pub trait TypedSchema {
	fn parse(
		&self,
		values: FormValue,
		context: SchemaContext,
	) -> LocalBoxFuture<'_, FormResult<SchemaResult>>;
}

/// Shared handle to a schema
pub type SharedSchema = Rc<dyn TypedSchema>;

/// One key of a standard issue path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathKey {
	Index(usize),
	Key(String),
}

impl fmt::Display for PathKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PathKey::Index(index) => write!(f, "{index}"),
			PathKey::Key(key) => f.write_str(key),
		}
	}
}

impl From<&str> for PathKey {
	fn from(value: &str) -> Self {
		PathKey::Key(value.to_string())
	}
}

impl From<usize> for PathKey {
	fn from(value: usize) -> Self {
		PathKey::Index(value)
	}
}

/// An issue reported by a [`StandardSchema`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardIssue {
	pub message: String,
	#[serde(default)]
	pub path: Vec<PathKey>,
}

impl StandardIssue {
	pub fn new(path: impl IntoIterator<Item = PathKey>, message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
			path: path.into_iter().collect(),
		}
	}
}

/// Outcome of [`StandardSchema::validate`]; `issues: None` means success
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StandardOutcome {
	pub value: Option<FormValue>,
	pub issues: Option<Vec<StandardIssue>>,
}

/// A validator exposing the standard `validate(value)` contract
pub trait StandardSchema {
	fn validate(&self, value: FormValue) -> LocalBoxFuture<'_, FormResult<StandardOutcome>>;
}

/// Bridges a [`StandardSchema`] to [`TypedSchema`].
///
/// Issues are grouped by path in order of first appearance. Each key of an
/// issue path becomes one literal segment.
pub struct StandardSchemaAdapter<S> {
	schema: S,
}

impl<S: StandardSchema> StandardSchemaAdapter<S> {
	pub fn new(schema: S) -> Self {
		Self { schema }
	}
}

impl<S: StandardSchema> TypedSchema for StandardSchemaAdapter<S> {
	fn parse(
		&self,
		values: FormValue,
		_context: SchemaContext,
	) -> LocalBoxFuture<'_, FormResult<SchemaResult>> {
		async move {
			let outcome = self.schema.validate(values).await?;
			let Some(issues) = outcome.issues else {
				return Ok(SchemaResult {
					output: outcome.value,
					errors: Vec::new(),
				});
			};

			let mut grouped: IndexMap<Path, Vec<String>> = IndexMap::new();
			for issue in issues {
				let path = Path::from_segments(issue.path.iter().map(PathKey::to_string));
				grouped.entry(path).or_default().push(issue.message);
			}

			Ok(SchemaResult {
				output: None,
				errors: grouped
					.into_iter()
					.map(|(path, messages)| IssueCollection { path, messages })
					.collect(),
			})
		}
		.boxed_local()
	}
}

impl<S> fmt::Debug for StandardSchemaAdapter<S> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("StandardSchemaAdapter").finish_non_exhaustive()
	}
}

/// A synchronous schema built from a closure
///
/// # Examples
///
/// ```
/// use reinhardt_form_state::{FnSchema, IssueCollection, SchemaResult};
///
/// let schema = FnSchema::new(|values, _| {
///     if values.get_key("name").and_then(|v| v.as_str()).unwrap_or_default().is_empty() {
///         Ok(SchemaResult::invalid(vec![IssueCollection::new("name", ["Name is required"])]))
///     } else {
///         Ok(SchemaResult::valid(values.clone()))
///     }
/// });
/// # let _ = schema;
/// ```
pub struct FnSchema<F> {
	parse: F,
}

impl<F> FnSchema<F>
where
	F: Fn(&FormValue, &SchemaContext) -> FormResult<SchemaResult>,
{
	pub fn new(parse: F) -> Self {
		Self { parse }
	}
}

impl<F> TypedSchema for FnSchema<F>
where
	F: Fn(&FormValue, &SchemaContext) -> FormResult<SchemaResult>,
{
	fn parse(
		&self,
		values: FormValue,
		context: SchemaContext,
	) -> LocalBoxFuture<'_, FormResult<SchemaResult>> {
		let result = (self.parse)(&values, &context);
		futures::future::ready(result).boxed_local()
	}
}

impl<F> fmt::Debug for FnSchema<F> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FnSchema").finish_non_exhaustive()
	}
}

/// Wrap a closure as a shared schema
pub fn schema_fn<F>(parse: F) -> SharedSchema
where
	F: Fn(&FormValue, &SchemaContext) -> FormResult<SchemaResult> + 'static,
{
	Rc::new(FnSchema::new(parse))
}

/// Wrap a standard schema as a shared schema
pub fn standard_schema<S>(schema: S) -> SharedSchema
where
	S: StandardSchema + 'static,
{
	Rc::new(StandardSchemaAdapter::new(schema))
}
