//! The form facade
//!
//! [`Form`] bundles a [`FormContext`] (the state), the form-scope
//! [`ValidationProvider`] and [`FormActions`] (submit and reset) behind one
//! handle. Paths are accepted as strings or [`Path`]s.
//!
//! ## Example
//!
//! ```
//! use reinhardt_form_state::{FieldOptions, Form, FormField, FormOptions};
//! use serde_json::json;
//!
//! # futures::executor::block_on(async {
//! let form = Form::new(FormOptions::new().with_initial_values(json!({"email": "a@example.com"})));
//! let email = FormField::in_form(&form, FieldOptions::new().with_path("email"));
//!
//! email.set_value("b@example.com");
//! assert!(form.is_dirty(Some("email")));
//!
//! let submit = form.handle_submit(|data| async move { data.to_json() });
//! let sent = submit(None).await.unwrap();
//! assert_eq!(sent, Some(json!({"email": "b@example.com"})));
//! # });
//! ```

use crate::actions::{ConsumableData, FormActions, ResetOptions, ResetState, SubmitEvent};
use crate::config::FormConfig;
use crate::context::{ContextSeed, FormContext};
use crate::error::FormResult;
use crate::form_data::FormData;
use crate::observer::{FormEvent, Subscription};
use crate::path::Path;
use crate::snapshot::ValueSource;
use crate::validation::batch::BatchFuture;
use crate::validation::provider::ValidationProvider;
use crate::validation::result::{IssueCollection, ValidationResult};
use crate::validation::schema::SharedSchema;
use crate::value::{FormValue, UpdateBehavior};
use futures::future::LocalBoxFuture;
use std::fmt;

/// Options for [`Form::new`]
pub struct FormOptions {
	/// Generated when unset
	pub id: Option<String>,
	pub initial_values: ValueSource,
	pub initial_touched: FormValue,
	pub schema: Option<SharedSchema>,
	pub config: FormConfig,
}

impl Default for FormOptions {
	fn default() -> Self {
		Self {
			id: None,
			initial_values: ValueSource::default(),
			initial_touched: FormValue::object(),
			schema: None,
			config: FormConfig::global(),
		}
	}
}

impl FormOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_id(mut self, id: impl Into<String>) -> Self {
		self.id = Some(id.into());
		self
	}

	pub fn with_initial_values(mut self, values: impl Into<ValueSource>) -> Self {
		self.initial_values = values.into();
		self
	}

	pub fn with_initial_touched(mut self, touched: impl Into<FormValue>) -> Self {
		self.initial_touched = touched.into();
		self
	}

	pub fn with_schema(mut self, schema: SharedSchema) -> Self {
		self.schema = Some(schema);
		self
	}

	pub fn with_config(mut self, config: FormConfig) -> Self {
		self.config = config;
		self
	}
}

impl fmt::Debug for FormOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FormOptions")
			.field("id", &self.id)
			.field("initial_touched", &self.initial_touched)
			.field("has_schema", &self.schema.is_some())
			.field("config", &self.config)
			.finish()
	}
}

/// A form: state, validation and submit handling. Cloning shares the form.
///
/// Field registrations, path moves and unmounts are queued. Hosts must drive
/// [`ready`](Self::ready) or [`flush`](Self::flush) once per tick; until
/// then form-level reads such as [`get_value`](Self::get_value) and
/// [`is_dirty`](Self::is_dirty) do not see a new field's seed.
#[derive(Clone)]
pub struct Form {
	context: FormContext,
	provider: ValidationProvider,
	actions: FormActions,
}

impl Form {
	pub fn new(options: FormOptions) -> Self {
		let context = FormContext::new(ContextSeed {
			id: options.id,
			initial_values: options.initial_values,
			initial_touched: options.initial_touched,
			config: options.config,
		});
		let provider = ValidationProvider::for_form(&context, options.schema);
		let actions = FormActions::new(context.clone(), provider.clone());
		tracing::debug!(form_id = %context.id(), "form created");

		Self {
			context,
			provider,
			actions,
		}
	}

	pub fn id(&self) -> &str {
		self.context.id()
	}

	pub fn context(&self) -> &FormContext {
		&self.context
	}

	pub fn provider(&self) -> &ValidationProvider {
		&self.provider
	}

	pub fn actions(&self) -> &FormActions {
		&self.actions
	}

	/// Resolves once asynchronous initial values are in place
	pub fn ready(&self) -> impl Future<Output = ()> + 'static {
		self.context.ready()
	}

	/// Apply queued field registrations, moves and unmounts as one batch
	pub fn flush(&self) {
		self.context.flush();
	}

	pub fn subscribe<F>(&self, filter: Option<&str>, callback: F) -> Subscription
	where
		F: Fn(&FormEvent) + 'static,
	{
		self.context.subscribe(filter.map(Path::parse), callback)
	}

	// Values

	pub fn values(&self) -> FormValue {
		self.context.values()
	}

	pub fn get_value(&self, path: impl Into<Path>) -> Option<FormValue> {
		self.context.get_value(&path.into())
	}

	pub fn set_value(&self, path: impl Into<Path>, value: impl Into<FormValue>) {
		self.context.set_value(&path.into(), value);
	}

	pub fn set_values(&self, values: impl Into<FormValue>, behavior: UpdateBehavior) {
		self.context.set_values(values.into(), behavior);
	}

	pub fn initial_values(&self) -> FormValue {
		self.context.initial_values()
	}

	pub fn get_initial_value(&self, path: impl Into<Path>) -> Option<FormValue> {
		self.context.get_initial(&path.into())
	}

	pub fn set_initial_values(&self, values: impl Into<FormValue>, behavior: UpdateBehavior) {
		self.context.set_initial_values(values.into(), behavior);
	}

	pub fn is_dirty(&self, path: Option<&str>) -> bool {
		self.context.is_dirty(path.map(Path::parse).as_ref())
	}

	// Touched

	pub fn is_touched(&self, path: Option<&str>) -> bool {
		self.context.is_touched(path.map(Path::parse).as_ref())
	}

	pub fn set_touched(&self, path: Option<&str>, touched: bool) {
		self.context.set_touched(path.map(Path::parse).as_ref(), touched);
	}

	pub fn touched(&self) -> FormValue {
		self.context.touched()
	}

	pub fn set_initial_touched(&self, touched: impl Into<FormValue>, behavior: UpdateBehavior) {
		self.context.set_initial_touched(touched.into(), behavior);
	}

	// Disabled

	pub fn is_disabled(&self, path: impl Into<Path>) -> bool {
		self.context.is_disabled(&path.into())
	}

	pub fn set_disabled(&self, path: impl Into<Path>, disabled: bool) {
		self.context.set_disabled(&path.into(), disabled);
	}

	// Errors

	pub fn is_valid(&self) -> bool {
		self.context.get_errors(None).is_empty()
	}

	pub fn get_errors(&self, path: Option<&str>) -> Vec<IssueCollection> {
		self.context.get_errors(path.map(Path::parse).as_ref())
	}

	pub fn get_error(&self, path: impl Into<Path>) -> Option<String> {
		self.context.get_error(&path.into())
	}

	pub fn display_error(&self, path: impl Into<Path>) -> Option<String> {
		self.context.display_error(&path.into())
	}

	pub fn set_errors(&self, path: impl Into<Path>, messages: Vec<String>) {
		self.context.set_errors(&path.into(), messages);
	}

	pub fn clear_errors(&self, path: Option<&str>) {
		self.context.clear_errors(path.map(Path::parse).as_ref());
	}

	pub fn get_submit_errors(&self, path: Option<&str>) -> Vec<IssueCollection> {
		self.context.get_submit_errors(path.map(Path::parse).as_ref())
	}

	pub fn get_submit_error(&self, path: impl Into<Path>) -> Option<String> {
		self.context.get_submit_error(&path.into())
	}

	// Validation

	/// Replace the form schema; `None` removes it
	pub fn set_schema(&self, schema: Option<SharedSchema>) {
		self.provider.set_schema(schema);
	}

	/// Validate every field, group and the form schema now
	pub fn validate(&self) -> LocalBoxFuture<'static, FormResult<ValidationResult>> {
		self.provider.validate()
	}

	/// Debounced [`validate`](Self::validate); concurrent requests share a run
	pub fn request_validation(&self) -> BatchFuture<ValidationResult> {
		self.provider.request_validation()
	}

	// Actions

	/// See [`FormActions::handle_submit`]
	pub fn handle_submit<F, Fut, R>(
		&self,
		on_success: F,
	) -> impl Fn(Option<&mut dyn SubmitEvent>) -> LocalBoxFuture<'static, FormResult<Option<R>>> + use<F, Fut, R>
	where
		F: Fn(ConsumableData) -> Fut + 'static,
		Fut: Future<Output = R> + 'static,
		R: 'static,
	{
		self.actions.handle_submit(on_success)
	}

	/// See [`FormActions::reset`]
	pub fn reset(
		&self,
		state: ResetState,
		options: ResetOptions,
	) -> LocalBoxFuture<'static, FormResult<Option<ValidationResult>>> {
		self.actions.reset(state, options)
	}

	pub fn is_submitting(&self) -> bool {
		self.actions.is_submitting()
	}

	pub fn submit_attempts(&self) -> usize {
		self.actions.submit_attempts()
	}

	pub fn was_submitted(&self) -> bool {
		self.actions.was_submitted()
	}

	/// The current submittable values as form data
	pub fn form_data(&self) -> FormData {
		let mut data = FormData::new();
		self.actions.populate_form_data(&mut data);
		data
	}

	pub fn populate_form_data(&self, target: &mut FormData) {
		self.actions.populate_form_data(target);
	}
}

impl fmt::Debug for Form {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Form")
			.field("context", &self.context)
			.field("provider", &self.provider)
			.field("is_submitting", &self.is_submitting())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::field::{FieldOptions, FormField};
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_explicit_id_is_kept() {
		let form = Form::new(FormOptions::new().with_id("signup"));
		assert_eq!(form.id(), "signup");
	}

	#[rstest]
	fn test_string_paths_address_nested_values() {
		let form = Form::new(FormOptions::new().with_initial_values(json!({"user": {"tags": ["a"]}})));

		form.set_value("user.tags[1]", "b");

		assert_eq!(form.get_value("user.tags").unwrap().to_json(), json!(["a", "b"]));
		assert!(form.is_dirty(Some("user.tags")));
		assert!(!form.is_dirty(Some("user.name")));
	}

	#[rstest]
	fn test_form_data_skips_disabled_paths() {
		let form = Form::new(FormOptions::new().with_initial_values(json!({"a": "1", "b": "2"})));
		let _b = FormField::in_form(&form, FieldOptions::new().with_path("b").with_disabled(true));

		let data = form.form_data();

		assert!(data.contains("a"));
		assert!(!data.contains("b"));
		assert_eq!(form.get_value("b"), Some(FormValue::from("2")));
	}

	#[tokio::test]
	async fn test_async_initial_values_are_awaited_by_validation() {
		let form = Form::new(FormOptions::new().with_initial_values(ValueSource::future(async {
			FormValue::from(json!({"name": "loaded"}))
		})));
		assert!(form.context().is_initializing());

		let result = form.validate().await.unwrap();

		assert_eq!(result.output.unwrap().to_json(), json!({"name": "loaded"}));
		assert!(!form.context().is_initializing());
	}
}
