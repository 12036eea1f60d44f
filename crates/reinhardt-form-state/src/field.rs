//! Field binding
//!
//! A [`FormField`] attaches to zero or one path of a form.
//!
//! - **Pathed** fields are views into the form's trees: reads resolve through
//!   the path, registration and path changes go through transactions, and
//!   the field reports to its scope's validation provider.
//! - **Pathless** fields (and fields created without a form) keep their value,
//!   touched flag and errors locally and never reach the form's trees.
//!
//! A field may be bound to a [`Model`], a shared value that mirrors the
//! field in both directions.
//!
//! ## Example
//!
//! ```
//! use reinhardt_form_state::{FieldOptions, Form, FormField, FormOptions, Model};
//! use serde_json::json;
//!
//! let form = Form::new(FormOptions::new());
//! let model = Model::new(json!("draft"));
//! let title = FormField::in_form(&form, FieldOptions::new().with_path("title").with_model(model.clone()));
//!
//! form.flush();
//! assert_eq!(form.get_value("title").unwrap().to_json(), json!("draft"));
//!
//! title.set_value("final");
//! assert_eq!(model.get().to_json(), json!("final"));
//!
//! model.set("edited");
//! assert_eq!(title.value().to_json(), json!("edited"));
//! ```

use crate::config::FormConfig;
use crate::context::{FormContext, trees_differ};
use crate::error::FormResult;
use crate::form::Form;
use crate::group::FormGroup;
use crate::observer::{FormEvent, Subscription};
use crate::path::Path;
use crate::transaction::{FormTransaction, PathBundle, TransactionId};
use crate::validation::constraints::Constraints;
use crate::validation::provider::{SourceRegistration, ValidationProvider, ValidationSource};
use crate::validation::result::{IssueCollection, ValidationMode, ValidationResult, ValidationScope};
use crate::validation::schema::{SchemaContext, SharedSchema};
use crate::value::FormValue;
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

type ModelListener = Rc<dyn Fn(&FormValue)>;

struct ModelInner {
	value: RefCell<FormValue>,
	listeners: RefCell<Vec<(u64, ModelListener)>>,
	next_id: Cell<u64>,
}

/// A shared value bound to a field in both directions.
///
/// Writes only notify listeners when the value actually changes.
#[derive(Clone)]
pub struct Model {
	inner: Rc<ModelInner>,
}

impl Model {
	pub fn new(value: impl Into<FormValue>) -> Self {
		Self {
			inner: Rc::new(ModelInner {
				value: RefCell::new(value.into()),
				listeners: RefCell::new(Vec::new()),
				next_id: Cell::new(0),
			}),
		}
	}

	pub fn get(&self) -> FormValue {
		self.inner.value.borrow().clone()
	}

	/// Store `value`; returns whether it changed
	pub fn set(&self, value: impl Into<FormValue>) -> bool {
		let value = value.into();
		{
			let mut current = self.inner.value.borrow_mut();
			if *current == value {
				return false;
			}
			*current = value.clone();
		}

		let listeners: Vec<ModelListener> = self
			.inner
			.listeners
			.borrow()
			.iter()
			.map(|(_, listener)| listener.clone())
			.collect();
		for listener in listeners {
			listener(&value);
		}
		true
	}

	#[must_use = "dropping the subscription unsubscribes immediately"]
	pub fn subscribe<F>(&self, listener: F) -> ModelSubscription
	where
		F: Fn(&FormValue) + 'static,
	{
		let id = self.inner.next_id.get();
		self.inner.next_id.set(id + 1);
		self.inner
			.listeners
			.borrow_mut()
			.push((id, Rc::new(listener)));
		ModelSubscription {
			id,
			model: Rc::downgrade(&self.inner),
		}
	}
}

impl Default for Model {
	fn default() -> Self {
		Self::new(FormValue::Null)
	}
}

impl fmt::Debug for Model {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Model").field(&self.inner.value.borrow()).finish()
	}
}

/// Handle returned by [`Model::subscribe`]; unsubscribes on drop
pub struct ModelSubscription {
	id: u64,
	model: Weak<ModelInner>,
}

impl Drop for ModelSubscription {
	fn drop(&mut self) {
		if let Some(model) = self.model.upgrade() {
			model.listeners.borrow_mut().retain(|(id, _)| *id != self.id);
		}
	}
}

/// Options for a new field
#[derive(Clone, Default)]
pub struct FieldOptions {
	pub path: Option<Path>,
	pub initial_value: Option<FormValue>,
	pub initial_touched: bool,
	pub disabled: bool,
	pub constraints: Constraints,
	pub schema: Option<SharedSchema>,
	pub model: Option<Model>,
	/// Falls back to the form configuration when unset
	pub keep_value_on_unmount: Option<bool>,
}

impl FieldOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_path(mut self, path: impl Into<Path>) -> Self {
		self.path = Some(path.into());
		self
	}

	pub fn with_initial_value(mut self, value: impl Into<FormValue>) -> Self {
		self.initial_value = Some(value.into());
		self
	}

	pub fn with_initial_touched(mut self, touched: bool) -> Self {
		self.initial_touched = touched;
		self
	}

	pub fn with_disabled(mut self, disabled: bool) -> Self {
		self.disabled = disabled;
		self
	}

	pub fn with_constraints(mut self, constraints: Constraints) -> Self {
		self.constraints = constraints;
		self
	}

	pub fn with_schema(mut self, schema: SharedSchema) -> Self {
		self.schema = Some(schema);
		self
	}

	pub fn with_model(mut self, model: Model) -> Self {
		self.model = Some(model);
		self
	}

	pub fn with_keep_value_on_unmount(mut self, keep: bool) -> Self {
		self.keep_value_on_unmount = Some(keep);
		self
	}
}

impl fmt::Debug for FieldOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FieldOptions")
			.field("path", &self.path)
			.field("initial_value", &self.initial_value)
			.field("initial_touched", &self.initial_touched)
			.field("disabled", &self.disabled)
			.field("constraints", &self.constraints)
			.field("has_schema", &self.schema.is_some())
			.field("model", &self.model)
			.finish()
	}
}

/// Where a field lives
#[derive(Default)]
pub(crate) struct FieldHost {
	pub context: Option<FormContext>,
	/// Provider the field reports to (its group's, or the form's)
	pub provider: Option<ValidationProvider>,
	/// The form-scope provider, used to join debounced form validation
	pub form_provider: Option<ValidationProvider>,
	pub prefix: Path,
	pub config: FormConfig,
}

/// A registration or move the field queued that the form has not applied
#[derive(Clone)]
struct Staged {
	id: TransactionId,
	/// Where the field's state lives until the queue is flushed
	from: Option<Path>,
	/// What the field carries when `from` holds nothing
	fallback: PathBundle,
}

#[derive(Default)]
struct LocalState {
	value: RefCell<FormValue>,
	original: RefCell<FormValue>,
	touched: Cell<bool>,
	disabled: Cell<bool>,
	errors: RefCell<Vec<String>>,
}

struct FieldInner {
	this: Weak<FieldInner>,
	context: Option<FormContext>,
	provider: Option<ValidationProvider>,
	form_provider: Option<ValidationProvider>,
	config: FormConfig,
	path: RefCell<Option<Path>>,
	local: LocalState,
	constraints: Constraints,
	schema: Option<SharedSchema>,
	model: Option<Model>,
	keep_value_on_unmount: bool,
	staged: RefCell<Option<Staged>>,
	registration: RefCell<Option<SourceRegistration>>,
	subscription: RefCell<Option<Subscription>>,
	model_subscription: RefCell<Option<ModelSubscription>>,
	unmounted: Cell<bool>,
}

/// A form control's state. Cloning shares the field.
#[derive(Clone)]
pub struct FormField {
	inner: Rc<FieldInner>,
}

impl FormField {
	/// A field with local state only
	pub fn standalone(options: FieldOptions) -> Self {
		Self::mount(
			FieldHost {
				config: FormConfig::global(),
				..FieldHost::default()
			},
			options,
		)
	}

	/// A field bound to `form`
	pub fn in_form(form: &Form, options: FieldOptions) -> Self {
		Self::mount(
			FieldHost {
				context: Some(form.context().clone()),
				provider: Some(form.provider().clone()),
				form_provider: Some(form.provider().clone()),
				prefix: Path::root(),
				config: form.context().config().clone(),
			},
			options,
		)
	}

	/// A field inside `group`; its path is relative to the group
	pub fn in_group(group: &FormGroup, options: FieldOptions) -> Self {
		Self::mount(group.field_host(), options)
	}

	fn mount(host: FieldHost, options: FieldOptions) -> Self {
		let path = options.path.map(|path| host.prefix.join(&path));
		let keep_value_on_unmount = options
			.keep_value_on_unmount
			.unwrap_or(host.config.keep_values_on_unmount);

		let model_value = options
			.model
			.as_ref()
			.map(Model::get)
			.filter(|value| !value.is_null());
		let seed = model_value.or(options.initial_value);

		let inner = Rc::new_cyclic(|this| FieldInner {
			this: this.clone(),
			context: host.context,
			provider: host.provider,
			form_provider: host.form_provider,
			config: host.config,
			path: RefCell::new(path.clone()),
			local: LocalState {
				value: RefCell::new(seed.clone().unwrap_or_default()),
				original: RefCell::new(seed.clone().unwrap_or_default()),
				touched: Cell::new(options.initial_touched),
				disabled: Cell::new(options.disabled),
				errors: RefCell::new(Vec::new()),
			},
			constraints: options.constraints,
			schema: options.schema,
			model: options.model,
			keep_value_on_unmount,
			staged: RefCell::new(None),
			registration: RefCell::new(None),
			subscription: RefCell::new(None),
			model_subscription: RefCell::new(None),
			unmounted: Cell::new(false),
		});

		if let (Some(context), Some(path)) = (&inner.context, &path) {
			let fallback = PathBundle {
				path: path.clone(),
				value: seed,
				touched: options.initial_touched,
				disabled: options.disabled,
				errors: Vec::new(),
			};
			let bundle = fallback.clone();
			let id = context.transaction(move |_| FormTransaction::InitPath(bundle.clone()));
			inner.staged.replace(Some(Staged {
				id,
				from: Some(path.clone()),
				fallback,
			}));
			if let (Some(model), Some(existing)) = (&inner.model, context.get_value(path)) {
				model.set(existing);
			}
		}

		inner.attach();
		tracing::debug!(path = ?inner.path.borrow().as_ref().map(ToString::to_string), "field mounted");
		Self { inner }
	}

	/// The field's path, `None` for pathless fields
	pub fn path(&self) -> Option<Path> {
		self.inner.path.borrow().clone()
	}

	pub fn is_pathless(&self) -> bool {
		self.inner.form_path().is_none()
	}

	pub fn value(&self) -> FormValue {
		self.inner.value()
	}

	/// Write a value; the model follows and native constraints are rechecked
	pub fn set_value(&self, value: impl Into<FormValue>) {
		self.inner.set_value(value.into());
	}

	pub fn is_touched(&self) -> bool {
		self.inner.is_touched()
	}

	pub fn set_touched(&self, touched: bool) {
		self.inner.set_touched(touched);
	}

	/// Whether the value differs from the original at the field's path
	pub fn is_dirty(&self) -> bool {
		match (&self.inner.context, self.inner.form_path()) {
			(Some(context), Some(path)) => context.is_dirty(Some(&path)),
			_ => trees_differ(
				Some(&self.inner.local.value.borrow()),
				Some(&self.inner.local.original.borrow()),
			),
		}
	}

	pub fn errors(&self) -> Vec<String> {
		self.inner.errors()
	}

	pub fn error(&self) -> Option<String> {
		self.inner.errors().into_iter().next()
	}

	pub fn is_valid(&self) -> bool {
		self.inner.errors().is_empty()
	}

	/// The first error, once the field is touched
	pub fn display_error(&self) -> Option<String> {
		if self.is_touched() { self.error() } else { None }
	}

	pub fn set_errors(&self, messages: Vec<String>) {
		self.inner.set_errors(messages);
	}

	pub fn is_disabled(&self) -> bool {
		self.inner.is_disabled()
	}

	pub fn set_disabled(&self, disabled: bool) {
		self.inner.settle();
		self.inner.local.disabled.set(disabled);
		if let (Some(context), Some(path)) = (&self.inner.context, self.inner.form_path()) {
			context.set_disabled(&path, disabled);
		}
	}

	/// Move the field to `path`, or make it pathless with `None`.
	///
	/// The field's value, touched flag, disabled flag and errors move with
	/// it in one transaction, applied at the form's next flush. Until then
	/// the field reads the state it is carrying; writing to the field
	/// flushes first.
	pub fn set_path(&self, path: Option<Path>) {
		self.inner.set_path(path);
	}

	/// Validate the field now and publish its errors
	pub fn validate(&self) -> LocalBoxFuture<'static, FormResult<ValidationResult>> {
		self.inner.validate()
	}

	/// Validate through the form's debounced request when the form has a
	/// schema, otherwise validate the field directly
	pub fn request_validation(&self) -> LocalBoxFuture<'static, FormResult<ValidationResult>> {
		let form_provider = self
			.inner
			.form_provider
			.as_ref()
			.filter(|provider| provider.has_schema());
		let (Some(provider), Some(path)) = (form_provider, self.inner.form_path()) else {
			return self.inner.validate();
		};

		let request = provider.request_validation();
		async move {
			let form_result = request.await?;
			let errors = form_result
				.errors
				.into_iter()
				.filter(|issue| issue.path.starts_with(&path))
				.collect();
			let output = form_result
				.output
				.as_ref()
				.and_then(|output| crate::path::get(output, &path).cloned());
			Ok(ValidationResult::new(
				ValidationScope::Field,
				path,
				errors,
				output,
				form_result.mode,
			))
		}
		.boxed_local()
	}

	/// Detach the field; its path is destroyed unless configured to keep
	/// its value. Dropping the last handle does the same.
	pub fn unmount(&self) {
		self.inner.teardown();
	}

	pub fn is_unmounted(&self) -> bool {
		self.inner.unmounted.get()
	}
}

impl fmt::Debug for FormField {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FormField")
			.field("path", &self.path())
			.field("value", &self.value())
			.field("touched", &self.is_touched())
			.field("errors", &self.errors())
			.finish()
	}
}

impl FieldInner {
	/// The path inside a form, if the field has both
	fn form_path(&self) -> Option<Path> {
		self.context.as_ref()?;
		self.path.borrow().clone()
	}

	/// The queued operation, while the form has not flushed it
	fn staged(&self) -> Option<Staged> {
		let context = self.context.as_ref()?;
		let staged = self.staged.borrow().clone()?;
		if context.is_queued(staged.id) {
			Some(staged)
		} else {
			self.staged.replace(None);
			None
		}
	}

	/// The state the field will hold once its queued operation is applied
	fn staged_bundle(&self) -> Option<PathBundle> {
		let context = self.context.as_ref()?;
		let staged = self.staged()?;
		Some(context.with_view(|view| view.carry(staged.from.as_ref(), &staged.fallback)))
	}

	/// Apply the field's queued operation before writing through its path
	fn settle(&self) {
		if let (Some(context), Some(_)) = (&self.context, self.staged()) {
			context.flush();
		}
	}

	fn value(&self) -> FormValue {
		let local = || self.local.value.borrow().clone();
		match (&self.context, self.form_path()) {
			(Some(context), Some(path)) => match self.staged_bundle() {
				Some(bundle) => bundle.value.unwrap_or_else(local),
				None => context.get_value(&path).unwrap_or_else(local),
			},
			_ => local(),
		}
	}

	fn set_value(&self, value: FormValue) {
		self.settle();
		match (&self.context, self.form_path()) {
			(Some(context), Some(path)) => {
				self.local.value.replace(value.clone());
				context.set_value(&path, value);
			}
			_ => {
				self.local.value.replace(value);
				self.sync_model();
			}
		}

		if !self.config.disable_html_validation && !self.constraints.is_empty() && !self.is_disabled() {
			let message = self.constraints.check(Some(&self.value()));
			self.set_errors(message.into_iter().collect());
		}
	}

	fn sync_model(&self) {
		if let Some(model) = &self.model {
			model.set(self.value());
		}
	}

	fn is_touched(&self) -> bool {
		if let Some(bundle) = self.staged_bundle() {
			return bundle.touched;
		}
		match (&self.context, self.form_path()) {
			(Some(context), Some(path)) if crate::path::is_path_set(&context.inner.touched.borrow(), &path) => {
				context.is_touched(Some(&path))
			}
			_ => self.local.touched.get(),
		}
	}

	fn set_touched(&self, touched: bool) {
		self.settle();
		self.local.touched.set(touched);
		if let (Some(context), Some(path)) = (&self.context, self.form_path()) {
			context.set_touched(Some(&path), touched);
		}
	}

	fn is_disabled(&self) -> bool {
		if let Some(bundle) = self.staged_bundle() {
			return self.local.disabled.get() || bundle.disabled;
		}
		match (&self.context, self.form_path()) {
			(Some(context), Some(path)) => self.local.disabled.get() || context.is_disabled(&path),
			_ => self.local.disabled.get(),
		}
	}

	fn errors(&self) -> Vec<String> {
		if let Some(bundle) = self.staged_bundle() {
			return bundle.errors;
		}
		match (&self.context, self.form_path()) {
			(Some(context), Some(path)) => context
				.get_errors(Some(&path))
				.into_iter()
				.flat_map(|issue| issue.messages)
				.collect(),
			_ => self.local.errors.borrow().clone(),
		}
	}

	fn set_errors(&self, messages: Vec<String>) {
		self.settle();
		match (&self.context, self.form_path()) {
			(Some(context), Some(path)) => context.set_errors(&path, messages),
			_ => {
				if !messages.is_empty() && self.local.disabled.get() {
					tracing::warn!("ignoring errors written to a disabled field");
					return;
				}
				self.local.errors.replace(messages);
			}
		}
	}

	/// Register with the provider and subscribe to form and model events
	fn attach(&self) {
		let path = self.form_path();

		if let (Some(provider), Some(_)) = (&self.provider, &path) {
			let source: Weak<dyn ValidationSource> = self.this.clone();
			self.registration.replace(Some(provider.register(source)));
		}

		if let Some(context) = &self.context {
			let field = self.this.clone();
			let subscription = context.subscribe(path.clone(), move |event| {
				let Some(field) = field.upgrade() else {
					return;
				};
				match event {
					FormEvent::SubmitAttempted => field.set_touched(true),
					FormEvent::ValueChanged(_) | FormEvent::Reset => field.sync_model(),
					_ => {}
				}
			});
			self.subscription.replace(Some(subscription));
		}

		if let Some(model) = &self.model {
			let field = self.this.clone();
			let subscription = model.subscribe(move |value| {
				if let Some(field) = field.upgrade() {
					if field.value() != *value {
						field.set_value(value.clone());
					}
				}
			});
			self.model_subscription.replace(Some(subscription));
		}
	}

	fn set_path(&self, new_path: Option<Path>) {
		let old_path = self.path.borrow().clone();
		if old_path == new_path {
			return;
		}

		let Some(context) = self.context.clone() else {
			self.path.replace(new_path);
			return;
		};

		// capture the current state while it is still addressable
		let carried = PathBundle {
			path: Path::root(),
			value: Some(self.value()),
			touched: self.is_touched(),
			disabled: self.is_disabled(),
			errors: self.errors(),
		};
		self.local.value.replace(carried.value.clone().unwrap_or_default());
		self.local.touched.set(carried.touched);
		self.local.errors.replace(carried.errors.clone());

		// an operation still in the queue is folded into this one
		let from = match self.staged() {
			Some(staged) => {
				context.cancel_transaction(staged.id);
				staged.from
			}
			None => old_path.clone(),
		};
		self.staged.replace(None);
		self.registration.replace(None);
		self.subscription.replace(None);

		match &new_path {
			Some(to) => {
				let fallback = PathBundle {
					path: to.clone(),
					..carried
				};
				let (source, carried) = (from.clone(), fallback.clone());
				let id = context.transaction(move |view| FormTransaction::SetPath {
					from: source.clone(),
					bundle: view.carry(source.as_ref(), &carried),
				});
				self.staged.replace(Some(Staged { id, from, fallback }));
			}
			None => {
				if let Some(from) = &from {
					context.unset_path(from);
				}
			}
		}

		tracing::debug!(
			from = ?old_path.as_ref().map(ToString::to_string),
			to = ?new_path.as_ref().map(ToString::to_string),
			"field path changed"
		);
		self.path.replace(new_path);
		self.attach();
	}

	fn validate(&self) -> LocalBoxFuture<'static, FormResult<ValidationResult>> {
		let Some(field) = self.this.upgrade() else {
			return futures::future::ready(Err(crate::error::FormError::Disposed)).boxed_local();
		};
		let result_path = self.form_path().unwrap_or_default();
		let value = self.value();

		if self.is_disabled() {
			return futures::future::ready(Ok(ValidationResult::valid_field(result_path, Some(value))))
				.boxed_local();
		}

		let native = if self.config.disable_html_validation {
			None
		} else {
			self.constraints.check(Some(&value))
		};

		async move {
			let (errors, output, mode) = match (native, &field.schema) {
				(Some(message), _) => (
					vec![IssueCollection::new(result_path.clone(), [message])],
					None,
					ValidationMode::Aggregate,
				),
				(None, Some(schema)) => {
					let parsed = schema
						.parse(
							value,
							SchemaContext {
								locale: field.config.locale.clone(),
								path: result_path.clone(),
							},
						)
						.await?;
					let errors = parsed
						.errors
						.into_iter()
						.map(|issue| IssueCollection {
							path: result_path.join(&issue.path),
							messages: issue.messages,
						})
						.collect();
					(errors, parsed.output, ValidationMode::Schema)
				}
				(None, None) => (Vec::new(), Some(value), ValidationMode::Aggregate),
			};

			let result = ValidationResult::new(ValidationScope::Field, result_path, errors, output, mode);
			field.publish(&result);
			Ok(result)
		}
		.boxed_local()
	}

	/// Write a field result's errors to wherever the field keeps them
	fn publish(&self, result: &ValidationResult) {
		self.settle();
		match (&self.context, self.form_path()) {
			(Some(context), Some(path)) => context.replace_errors(Some(&path), result.errors.clone()),
			_ => {
				self.local
					.errors
					.replace(result.messages().map(str::to_string).collect());
			}
		}
	}

	fn teardown(&self) {
		if self.unmounted.replace(true) {
			return;
		}
		self.subscription.replace(None);
		self.model_subscription.replace(None);
		self.registration.replace(None);

		if let (Some(context), Some(path)) = (&self.context, self.form_path()) {
			if !self.keep_value_on_unmount {
				let owned = match self.staged() {
					Some(staged) => {
						context.cancel_transaction(staged.id);
						staged.from
					}
					None => Some(path.clone()),
				};
				if let Some(owned) = &owned {
					context.destroy_path(owned);
				}
			}
			tracing::debug!(%path, kept = self.keep_value_on_unmount, "field unmounted");
		}
	}
}

impl ValidationSource for FieldInner {
	fn validate_for_provider(&self) -> LocalBoxFuture<'static, FormResult<ValidationResult>> {
		self.validate()
	}
}

impl Drop for FieldInner {
	fn drop(&mut self) {
		self.teardown();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::form::FormOptions;
	use crate::validation::schema::{SchemaResult, schema_fn};
	use rstest::rstest;
	use serde_json::json;

	fn form(values: serde_json::Value) -> Form {
		Form::new(FormOptions::new().with_initial_values(values))
	}

	#[rstest]
	fn test_pathless_field_keeps_local_state() {
		let form = form(json!({"a": 1}));
		let field = FormField::in_form(&form, FieldOptions::new().with_initial_value("local"));
		form.flush();

		field.set_value("changed");
		field.set_touched(true);

		assert!(field.is_pathless());
		assert_eq!(field.value(), FormValue::from("changed"));
		assert!(field.is_dirty());
		assert_eq!(form.values().to_json(), json!({"a": 1}));
		assert!(!form.is_touched(None));
		assert!(!form.is_dirty(None));
	}

	#[rstest]
	fn test_value_before_flush_uses_seed() {
		let form = form(json!({}));
		let field = FormField::in_form(&form, FieldOptions::new().with_path("name").with_initial_value("seed"));

		assert_eq!(form.get_value("name"), None);
		assert_eq!(field.value(), FormValue::from("seed"));

		form.flush();
		assert_eq!(form.get_value("name"), Some(FormValue::from("seed")));
		assert!(!field.is_dirty());
	}

	#[rstest]
	fn test_form_initial_value_wins_over_field_seed() {
		let form = form(json!({"name": "form"}));
		let field = FormField::in_form(&form, FieldOptions::new().with_path("name").with_initial_value("field"));
		form.flush();

		assert_eq!(field.value(), FormValue::from("form"));
	}

	#[rstest]
	fn test_native_constraints_run_on_write() {
		let form = form(json!({}));
		let field = FormField::in_form(
			&form,
			FieldOptions::new()
				.with_path("email")
				.with_constraints(Constraints::new().required()),
		);
		form.flush();

		field.set_value("");
		assert_eq!(field.errors(), vec!["This field is required".to_string()]);
		assert_eq!(field.display_error(), None);

		field.set_touched(true);
		assert_eq!(field.display_error().as_deref(), Some("This field is required"));

		field.set_value("someone");
		assert!(field.is_valid());
	}

	#[rstest]
	fn test_disabled_field_skips_native_check_on_write() {
		let form = form(json!({}));
		let field = FormField::in_form(
			&form,
			FieldOptions::new()
				.with_path("code")
				.with_disabled(true)
				.with_constraints(Constraints::new().required()),
		);

		field.set_value("");

		assert_eq!(form.get_value("code"), Some(FormValue::from("")));
		assert!(field.is_valid());
		assert!(form.get_errors(None).is_empty());
	}

	#[rstest]
	fn test_disabled_html_validation_skips_constraints() {
		let form = Form::new(
			FormOptions::new().with_config(FormConfig::new().with_html_validation_disabled(true)),
		);
		let field = FormField::in_form(
			&form,
			FieldOptions::new()
				.with_path("x")
				.with_constraints(Constraints::new().required()),
		);

		field.set_value("");
		assert!(field.is_valid());
	}

	#[rstest]
	fn test_model_initial_value_wins_over_option() {
		let form = form(json!({}));
		let model = Model::new("from model");
		let field = FormField::in_form(
			&form,
			FieldOptions::new()
				.with_path("x")
				.with_initial_value("from options")
				.with_model(model.clone()),
		);
		form.flush();

		assert_eq!(field.value(), FormValue::from("from model"));
	}

	#[rstest]
	fn test_model_follows_form_writes_and_reset() {
		let form = form(json!({"x": "start"}));
		let model = Model::default();
		let _field = FormField::in_form(&form, FieldOptions::new().with_path("x").with_model(model.clone()));
		assert_eq!(model.get(), FormValue::from("start"));

		form.set_value("x", "external");
		assert_eq!(model.get(), FormValue::from("external"));

		form.context().revert_values();
		assert_eq!(model.get(), FormValue::from("start"));
	}

	#[rstest]
	fn test_set_path_moves_state() {
		let form = form(json!({}));
		let field = FormField::in_form(&form, FieldOptions::new().with_path("old").with_initial_value("v"));
		form.flush();
		field.set_touched(true);
		field.set_errors(vec!["bad".into()]);

		field.set_path(Some(Path::parse("new")));
		assert_eq!(field.value(), FormValue::from("v"));
		assert!(field.is_touched());
		form.flush();

		assert_eq!(form.values().to_json(), json!({"new": "v"}));
		assert!(form.is_touched(Some("new")));
		assert_eq!(form.get_error("new").as_deref(), Some("bad"));
		assert_eq!(form.get_error("old"), None);
		assert_eq!(field.value(), FormValue::from("v"));
	}

	#[rstest]
	fn test_list_fields_swapping_indices_keep_their_values() {
		let form = form(json!({"items": ["a", "b"]}));
		let a = FormField::in_form(&form, FieldOptions::new().with_path("items[0]"));
		let b = FormField::in_form(&form, FieldOptions::new().with_path("items[1]"));
		form.flush();
		b.set_touched(true);

		a.set_path(Some(Path::parse("items[1]")));
		b.set_path(Some(Path::parse("items[0]")));
		assert_eq!(a.value(), FormValue::from("a"));
		assert_eq!(b.value(), FormValue::from("b"));
		form.flush();

		assert_eq!(form.values().to_json(), json!({"items": ["b", "a"]}));
		assert_eq!(a.value(), FormValue::from("a"));
		assert_eq!(b.value(), FormValue::from("b"));
		assert!(b.is_touched());
		assert!(!a.is_touched());
	}

	#[rstest]
	fn test_removing_first_item_shifts_the_rest() {
		let form = form(json!({"items": ["a", "b", "c"]}));
		let fields: Vec<FormField> = (0..3)
			.map(|index| FormField::in_form(&form, FieldOptions::new().with_path(format!("items[{index}]"))))
			.collect();
		form.flush();

		fields[0].unmount();
		fields[1].set_path(Some(Path::parse("items[0]")));
		fields[2].set_path(Some(Path::parse("items[1]")));
		form.flush();

		assert_eq!(form.values().to_json(), json!({"items": ["b", "c"]}));
		assert_eq!(fields[1].value(), FormValue::from("b"));
		assert_eq!(fields[2].value(), FormValue::from("c"));
	}

	#[rstest]
	fn test_moving_twice_before_flush_leaves_one_copy() {
		let form = form(json!({}));
		let field = FormField::in_form(&form, FieldOptions::new().with_path("a").with_initial_value("v"));

		field.set_path(Some(Path::parse("b")));
		field.set_path(Some(Path::parse("c")));
		form.flush();

		assert_eq!(form.values().to_json(), json!({"c": "v"}));
	}

	#[rstest]
	fn test_write_during_pending_move_lands_at_new_path() {
		let form = form(json!({"old": "v"}));
		let field = FormField::in_form(&form, FieldOptions::new().with_path("old"));
		form.flush();

		field.set_path(Some(Path::parse("new")));
		field.set_value("w");

		assert_eq!(form.context().pending_transactions(), 0);
		assert_eq!(form.values().to_json(), json!({"new": "w"}));
	}

	#[rstest]
	fn test_becoming_pathless_unsets_and_keeps_local_copy() {
		let form = form(json!({"list": ["a", "b"]}));
		let field = FormField::in_form(&form, FieldOptions::new().with_path("list[0]"));
		form.flush();

		field.set_path(None);
		form.flush();

		assert_eq!(form.values().to_json(), json!({"list": [null, "b"]}));
		assert!(field.is_pathless());
		assert_eq!(field.value(), FormValue::from("a"));
		assert_eq!(form.provider().source_count(), 0);
	}

	#[rstest]
	fn test_unmount_destroys_path_unless_kept() {
		let form = form(json!({}));
		let dropped = FormField::in_form(&form, FieldOptions::new().with_path("a").with_initial_value(1));
		let kept = FormField::in_form(
			&form,
			FieldOptions::new()
				.with_path("b")
				.with_initial_value(2)
				.with_keep_value_on_unmount(true),
		);
		form.flush();

		drop(dropped);
		kept.unmount();
		form.flush();

		assert!(kept.is_unmounted());
		assert_eq!(form.values().to_json(), json!({"b": 2}));
		assert_eq!(form.provider().source_count(), 0);
	}

	#[rstest]
	fn test_mount_and_unmount_in_one_tick_leaves_nothing() {
		let form = form(json!({}));
		let field = FormField::in_form(&form, FieldOptions::new().with_path("temp").with_initial_value(1));
		field.unmount();
		form.flush();

		assert_eq!(form.values().to_json(), json!({}));
	}

	#[rstest]
	fn test_submit_attempt_touches_fields() {
		let form = form(json!({}));
		let pathed = FormField::in_form(&form, FieldOptions::new().with_path("a"));
		let pathless = FormField::in_form(&form, FieldOptions::new());
		form.flush();

		form.context().emit(FormEvent::SubmitAttempted);

		assert!(pathed.is_touched());
		assert!(pathless.is_touched());
	}

	#[tokio::test]
	async fn test_field_schema_errors_are_published() {
		let form = form(json!({}));
		let field = FormField::in_form(
			&form,
			FieldOptions::new()
				.with_path("age")
				.with_initial_value("abc")
				.with_schema(schema_fn(|value, _| match value.as_str().map(str::parse::<i64>) {
					Some(Ok(age)) => Ok(SchemaResult::valid(FormValue::from(age))),
					_ => Ok(SchemaResult::invalid(vec![IssueCollection::new("", ["Not a number"])])),
				})),
		);
		form.flush();

		let result = field.validate().await.unwrap();
		assert!(!result.is_valid);
		assert_eq!(form.get_error("age").as_deref(), Some("Not a number"));

		field.set_value("42");
		let result = field.validate().await.unwrap();
		assert!(result.is_valid);
		assert_eq!(result.output, Some(FormValue::from(42)));
		assert_eq!(form.get_error("age"), None);
	}

	#[tokio::test]
	async fn test_disabled_field_validates_as_valid() {
		let form = form(json!({}));
		let field = FormField::in_form(
			&form,
			FieldOptions::new()
				.with_path("x")
				.with_disabled(true)
				.with_constraints(Constraints::new().required()),
		);

		let result = field.validate().await.unwrap();
		assert!(result.is_valid);
		assert!(form.get_errors(None).is_empty());
	}

	#[tokio::test]
	async fn test_standalone_field_validates_locally() {
		let field = FormField::standalone(
			FieldOptions::new().with_constraints(Constraints::new().with_min_length(3)),
		);
		field.set_value("ab");

		assert_eq!(field.error().as_deref(), Some("This field must be at least 3 characters long"));
		let result = field.validate().await.unwrap();
		assert!(!result.is_valid);
		assert!(result.path.is_root());
	}

	#[tokio::test(start_paused = true)]
	async fn test_request_validation_joins_form_schema_run() {
		let form = Form::new(
			FormOptions::new()
				.with_initial_values(json!({"a": "", "b": ""}))
				.with_schema(schema_fn(|_, _| {
					Ok(SchemaResult::invalid(vec![
						IssueCollection::new("a", ["a is bad"]),
						IssueCollection::new("b", ["b is bad"]),
					]))
				})),
		);
		let a = FormField::in_form(&form, FieldOptions::new().with_path("a"));
		let b = FormField::in_form(&form, FieldOptions::new().with_path("b"));

		let (ra, rb) = futures::join!(a.request_validation(), b.request_validation());

		assert_eq!(form.provider().batched_runs(), 1);
		assert_eq!(ra.unwrap().errors, vec![IssueCollection::new("a", ["a is bad"])]);
		assert_eq!(rb.unwrap().errors, vec![IssueCollection::new("b", ["b is bad"])]);
	}
}
