//! Form groups
//!
//! A [`FormGroup`] owns a named subtree of a form. Fields created with
//! [`FormField::in_group`](crate::FormField::in_group) resolve their paths
//! under the group's name and report to the group's own validation provider.
//! The group in turn reports to the form as one source, so a group schema
//! validates its subtree and its output is stitched into the form output.

use crate::config::FormConfig;
use crate::context::FormContext;
use crate::error::FormResult;
use crate::field::FieldHost;
use crate::form::Form;
use crate::path::Path;
use crate::validation::batch::BatchFuture;
use crate::validation::provider::{SourceRegistration, ValidationProvider, ValidationSource};
use crate::validation::result::{IssueCollection, ValidationResult};
use crate::validation::schema::SharedSchema;
use crate::value::FormValue;
use futures::future::LocalBoxFuture;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

struct GroupInner {
	path: Path,
	context: Option<FormContext>,
	provider: ValidationProvider,
	form_provider: Option<ValidationProvider>,
	config: FormConfig,
	registration: RefCell<Option<SourceRegistration>>,
}

impl ValidationSource for GroupInner {
	fn validate_for_provider(&self) -> LocalBoxFuture<'static, FormResult<ValidationResult>> {
		self.provider.validate()
	}
}

/// A named subtree with its own validation scope. Cloning shares the group.
#[derive(Clone)]
pub struct FormGroup {
	inner: Rc<GroupInner>,
}

impl FormGroup {
	/// Create the group `name` inside `form`.
	///
	/// Without a form the group still validates its own fields but has no
	/// values to read.
	pub fn new(form: Option<&Form>, name: impl Into<Path>, schema: Option<SharedSchema>) -> Self {
		let path = name.into();
		let context = form.map(|form| form.context().clone());
		if context.is_none() {
			tracing::warn!(group = %path, "form group created outside of a form");
		}

		let provider = ValidationProvider::for_group(path.clone(), context.as_ref(), schema);
		let config = context
			.as_ref()
			.map(|context| context.config().clone())
			.unwrap_or_else(FormConfig::global);
		let inner = Rc::new(GroupInner {
			path,
			context,
			provider,
			form_provider: form.map(|form| form.provider().clone()),
			config,
			registration: RefCell::new(None),
		});

		if let Some(form_provider) = &inner.form_provider {
			let weak: Weak<GroupInner> = Rc::downgrade(&inner);
			let source: Weak<dyn ValidationSource> = weak;
			inner.registration.replace(Some(form_provider.register(source)));
		}

		Self { inner }
	}

	pub fn path(&self) -> &Path {
		&self.inner.path
	}

	pub fn provider(&self) -> &ValidationProvider {
		&self.inner.provider
	}

	pub(crate) fn field_host(&self) -> FieldHost {
		FieldHost {
			context: self.inner.context.clone(),
			provider: Some(self.inner.provider.clone()),
			form_provider: self.inner.form_provider.clone(),
			prefix: self.inner.path.clone(),
			config: self.inner.config.clone(),
		}
	}

	/// The group's subtree; an empty object when nothing is stored
	pub fn value(&self) -> FormValue {
		self.inner
			.context
			.as_ref()
			.and_then(|context| context.get_value(&self.inner.path))
			.unwrap_or_else(FormValue::object)
	}

	pub fn is_dirty(&self) -> bool {
		self.inner
			.context
			.as_ref()
			.is_some_and(|context| context.is_dirty(Some(&self.inner.path)))
	}

	pub fn is_touched(&self) -> bool {
		self.inner
			.context
			.as_ref()
			.is_some_and(|context| context.is_touched(Some(&self.inner.path)))
	}

	pub fn is_valid(&self) -> bool {
		self.get_errors().is_empty()
	}

	/// Every error stored at or below the group
	pub fn get_errors(&self) -> Vec<IssueCollection> {
		let Some(context) = &self.inner.context else {
			return Vec::new();
		};
		context
			.get_errors(None)
			.into_iter()
			.filter(|issue| issue.path.starts_with(&self.inner.path))
			.collect()
	}

	/// First error at `path`, relative to the group
	pub fn get_error(&self, path: impl Into<Path>) -> Option<String> {
		let context = self.inner.context.as_ref()?;
		context.get_error(&self.inner.path.join(&path.into()))
	}

	/// First error at `path`, relative to the group, once it is touched
	pub fn display_error(&self, path: impl Into<Path>) -> Option<String> {
		let context = self.inner.context.as_ref()?;
		context.display_error(&self.inner.path.join(&path.into()))
	}

	/// Validate the group and publish the errors under its prefix
	pub fn validate(&self) -> LocalBoxFuture<'static, FormResult<ValidationResult>> {
		self.inner.provider.validate()
	}

	/// Debounced [`validate`](Self::validate)
	pub fn request_validation(&self) -> BatchFuture<ValidationResult> {
		self.inner.provider.request_validation()
	}
}

impl fmt::Debug for FormGroup {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FormGroup")
			.field("path", &self.inner.path)
			.field("in_form", &self.inner.context.is_some())
			.field("provider", &self.inner.provider)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::field::{FieldOptions, FormField};
	use crate::form::FormOptions;
	use crate::validation::constraints::Constraints;
	use crate::validation::schema::{SchemaResult, schema_fn};
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_fields_resolve_under_group_name() {
		let form = Form::new(FormOptions::new());
		let group = FormGroup::new(Some(&form), "address", None);
		let street = FormField::in_group(&group, FieldOptions::new().with_path("street").with_initial_value("Main"));
		form.flush();

		assert_eq!(street.path(), Some(Path::parse("address.street")));
		assert_eq!(group.value().to_json(), json!({"street": "Main"}));
		assert!(!group.is_dirty());

		street.set_value("Side");
		assert!(group.is_dirty());
		assert_eq!(form.provider().source_count(), 1);
		assert_eq!(group.provider().source_count(), 1);
	}

	#[tokio::test]
	async fn test_group_schema_writes_errors_under_prefix() {
		let form = Form::new(FormOptions::new().with_initial_values(json!({"other": "x"})));
		form.set_errors("other", vec!["kept".into()]);
		let group = FormGroup::new(
			Some(&form),
			"address",
			Some(schema_fn(|_, _| {
				Ok(SchemaResult::invalid(vec![IssueCollection::new("zip", ["Invalid zip"])]))
			})),
		);
		let _zip = FormField::in_group(&group, FieldOptions::new().with_path("zip").with_initial_value("abc"));

		let result = group.validate().await.unwrap();

		assert!(!result.is_valid);
		assert_eq!(group.get_error("zip").as_deref(), Some("Invalid zip"));
		assert_eq!(form.get_error("other").as_deref(), Some("kept"));
		assert!(!group.is_valid());
	}

	#[tokio::test]
	async fn test_valid_group_output_is_stitched_into_form_output() {
		let form = Form::new(FormOptions::new());
		let group = FormGroup::new(
			Some(&form),
			"age",
			Some(schema_fn(|value, _| {
				let years = value.get_key("years").and_then(FormValue::as_str).and_then(|s| s.parse::<i64>().ok());
				Ok(SchemaResult::valid(FormValue::from(json!({"years": years}))))
			})),
		);
		let _years = FormField::in_group(&group, FieldOptions::new().with_path("years").with_initial_value("7"));

		let result = form.validate().await.unwrap();

		assert!(result.is_valid);
		assert_eq!(result.output.unwrap().to_json(), json!({"age": {"years": 7}}));
	}

	#[tokio::test]
	async fn test_group_without_form_validates_its_fields() {
		let group = FormGroup::new(None, "loose", None);
		let field = FormField::in_group(
			&group,
			FieldOptions::new()
				.with_path("name")
				.with_constraints(Constraints::new().required()),
		);

		let result = group.validate().await.unwrap();

		assert!(field.is_pathless());
		assert!(result.is_valid);
		assert!(group.value().is_empty_container());
	}
}
