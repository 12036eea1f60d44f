//! Submit and reset
//!
//! [`FormActions`] drives the form-level flows:
//!
//! - **submit**: touch every field, validate, publish the errors on the
//!   submit channel, and hand the validated output (minus disabled paths) to
//!   the success callback when the form is valid
//! - **reset**: optionally replace the initial state, revert values and
//!   touched state, and revalidate only when asked to
//! - **form data**: fill a [`FormData`] with the current submittable values

use crate::context::FormContext;
use crate::error::FormResult;
use crate::form_data::FormData;
use crate::observer::FormEvent;
use crate::path::{self, Path, compare_paths};
use crate::validation::provider::ValidationProvider;
use crate::validation::result::ValidationResult;
use crate::value::{FormValue, UpdateBehavior};
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use std::cell::Cell;
use std::rc::Rc;

/// The event that triggered a submit (a DOM submit event, for instance)
pub trait SubmitEvent {
	fn prevent_default(&mut self);
}

/// Validated output handed to a submit handler
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumableData {
	output: FormValue,
}

impl ConsumableData {
	pub fn new(output: FormValue) -> Self {
		Self { output }
	}

	/// The raw output tree
	pub fn to_object(&self) -> FormValue {
		self.output.clone()
	}

	pub fn into_object(self) -> FormValue {
		self.output
	}

	/// The output as JSON; file leaves become `{}`
	pub fn to_json(&self) -> serde_json::Value {
		self.output.to_json()
	}

	/// The output flattened into bracketed form data entries
	pub fn to_form_data(&self) -> FormData {
		FormData::from_value(&self.output)
	}
}

/// State to reset to; `None` fields keep the current initial state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResetState {
	pub values: Option<FormValue>,
	pub touched: Option<FormValue>,
}

impl ResetState {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_values(mut self, values: impl Into<FormValue>) -> Self {
		self.values = Some(values.into());
		self
	}

	pub fn with_touched(mut self, touched: impl Into<FormValue>) -> Self {
		self.touched = Some(touched.into());
		self
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetOptions {
	pub behavior: UpdateBehavior,
	pub revalidate: bool,
}

impl ResetOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_behavior(mut self, behavior: UpdateBehavior) -> Self {
		self.behavior = behavior;
		self
	}

	pub fn with_revalidate(mut self, revalidate: bool) -> Self {
		self.revalidate = revalidate;
		self
	}
}

struct ActionsInner {
	context: FormContext,
	provider: ValidationProvider,
	is_submitting: Cell<bool>,
	submit_attempts: Cell<usize>,
	was_submitted: Cell<bool>,
}

/// Submit/reset flows of a form. Cloning shares the submit state.
#[derive(Clone)]
pub struct FormActions {
	inner: Rc<ActionsInner>,
}

/// Marks a submit in progress; clears the flag on every exit path
struct SubmittingGuard {
	actions: Rc<ActionsInner>,
}

impl SubmittingGuard {
	fn start(actions: Rc<ActionsInner>) -> Self {
		actions.is_submitting.set(true);
		actions.submit_attempts.set(actions.submit_attempts.get() + 1);
		Self { actions }
	}
}

impl Drop for SubmittingGuard {
	fn drop(&mut self) {
		self.actions.is_submitting.set(false);
	}
}

impl FormActions {
	pub(crate) fn new(context: FormContext, provider: ValidationProvider) -> Self {
		Self {
			inner: Rc::new(ActionsInner {
				context,
				provider,
				is_submitting: Cell::new(false),
				submit_attempts: Cell::new(0),
				was_submitted: Cell::new(false),
			}),
		}
	}

	pub fn is_submitting(&self) -> bool {
		self.inner.is_submitting.get()
	}

	pub fn submit_attempts(&self) -> usize {
		self.inner.submit_attempts.get()
	}

	pub fn was_submitted(&self) -> bool {
		self.inner.was_submitted.get()
	}

	/// Build a submit handler around `on_success`.
	///
	/// The handler resolves to `Ok(None)` when validation fails and to
	/// `Ok(Some(_))` with the callback's result otherwise. A failing schema
	/// surfaces as `Err`.
	pub fn handle_submit<F, Fut, R>(
		&self,
		on_success: F,
	) -> impl Fn(Option<&mut dyn SubmitEvent>) -> LocalBoxFuture<'static, FormResult<Option<R>>> + use<F, Fut, R>
	where
		F: Fn(ConsumableData) -> Fut + 'static,
		Fut: Future<Output = R> + 'static,
		R: 'static,
	{
		let inner = self.inner.clone();
		let on_success = Rc::new(on_success);
		move |event: Option<&mut dyn SubmitEvent>| {
			if let Some(event) = event {
				event.prevent_default();
			}
			submit(inner.clone(), on_success.clone()).boxed_local()
		}
	}

	/// Reset the form.
	///
	/// The reset is applied before this returns; the returned future only
	/// carries the optional revalidation and resolves to `None` without it.
	pub fn reset(
		&self,
		state: ResetState,
		options: ResetOptions,
	) -> LocalBoxFuture<'static, FormResult<Option<ValidationResult>>> {
		let context = &self.inner.context;
		context.flush();

		if let Some(values) = state.values {
			context.set_initial_values(values, options.behavior);
		}
		if let Some(touched) = state.touched {
			context.set_initial_touched(touched, options.behavior);
		}
		context.revert_values();
		context.revert_touched();
		context.clear_submit_errors();
		self.inner.submit_attempts.set(0);
		self.inner.was_submitted.set(false);
		tracing::debug!(form_id = %context.id(), revalidate = options.revalidate, "form reset");

		if !options.revalidate {
			context.clear_errors(None);
			context.emit(FormEvent::Reset);
			return futures::future::ready(Ok(None)).boxed_local();
		}

		context.emit(FormEvent::Reset);
		let provider = self.inner.provider.clone();
		async move { provider.validate().await.map(Some) }.boxed_local()
	}

	/// Replace `target`'s entries with the current submittable values
	pub fn populate_form_data(&self, target: &mut FormData) {
		let context = &self.inner.context;
		context.flush();
		let mut values = context.values();
		strip_disabled(&mut values, context.disabled_paths());
		target.replace_with(FormData::from_value(&values));
	}
}

async fn submit<F, Fut, R>(inner: Rc<ActionsInner>, on_success: Rc<F>) -> FormResult<Option<R>>
where
	F: Fn(ConsumableData) -> Fut,
	Fut: Future<Output = R>,
{
	let _guard = SubmittingGuard::start(inner.clone());
	let context = &inner.context;
	tracing::debug!(form_id = %context.id(), attempt = inner.submit_attempts.get(), "submitting form");

	context.emit(FormEvent::SubmitAttempted);
	let result = inner.provider.validate().await?;
	context.set_submit_errors(result.errors.clone());

	if !result.is_valid {
		tracing::debug!(form_id = %context.id(), errors = result.errors.len(), "submit aborted by validation");
		return Ok(None);
	}

	let mut output = result.output.unwrap_or_else(|| context.values());
	strip_disabled(&mut output, context.disabled_paths());

	let value = on_success(ConsumableData::new(output)).await;
	inner.was_submitted.set(true);
	Ok(Some(value))
}

/// Remove `disabled` paths from `output`, deepest and highest index first
pub(crate) fn strip_disabled(output: &mut FormValue, mut disabled: Vec<Path>) {
	disabled.sort_by(|a, b| compare_paths(b, a));
	for path in &disabled {
		path::unset(output, path, true);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::cmp::Ordering;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_strip_disabled_keeps_sibling_indices() {
		let mut output = FormValue::from(json!({"list": ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k"]}));
		strip_disabled(
			&mut output,
			vec![Path::parse("list.2"), Path::parse("list.10"), Path::parse("list.0")],
		);
		assert_eq!(
			output.to_json(),
			json!({"list": ["b", "d", "e", "f", "g", "h", "i", "j"]})
		);
	}

	#[rstest]
	fn test_strip_disabled_nested() {
		let mut output = FormValue::from(json!({"a": 1, "b": {"c": 2}}));
		strip_disabled(&mut output, vec![Path::parse("b"), Path::parse("b.c")]);
		assert_eq!(output.to_json(), json!({"a": 1}));
	}

	#[rstest]
	#[case("a.10", "a.2", Ordering::Greater)]
	#[case("a", "a.b", Ordering::Less)]
	#[case("b", "a.z", Ordering::Greater)]
	fn test_compare_paths(#[case] a: &str, #[case] b: &str, #[case] expected: Ordering) {
		assert_eq!(compare_paths(&Path::parse(a), &Path::parse(b)), expected);
	}

	#[rstest]
	fn test_consumable_data_views() {
		let data = ConsumableData::new(FormValue::from(json!({"hobbies": ["x", null]})));

		assert_eq!(data.to_json(), json!({"hobbies": ["x", null]}));
		assert_eq!(data.to_form_data().len(), 2);
		assert_eq!(data.into_object().to_json(), json!({"hobbies": ["x", null]}));
	}
}
