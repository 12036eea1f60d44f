//! Form State Integration Tests
//!
//! End-to-end behavior of forms, fields and the submit flow through the
//! public API only.
//!
//! Test Categories:
//! - Category 1: Values and Dirty Tracking
//! - Category 2: Validation and Batching
//! - Category 3: Submit and Output
//! - Category 4: Reset

use futures::FutureExt;
use futures::future::{LocalBoxFuture, join_all};
use reinhardt_form_state::{
	Constraints, FieldOptions, Form, FormField, FormOptions, FormResult, FormValue, InputType,
	IssueCollection, Path, PathKey, ResetOptions, ResetState, SchemaResult, StandardIssue,
	StandardOutcome, StandardSchema, SubmitEvent, UpdateBehavior, schema_fn, standard_schema,
};
use rstest::rstest;
use serde_json::json;
use std::cell::Cell;
use std::rc::Rc;

fn form_with(values: serde_json::Value) -> Form {
	Form::new(FormOptions::new().with_initial_values(values))
}

fn required_field(form: &Form, path: &str) -> FormField {
	FormField::in_form(
		form,
		FieldOptions::new()
			.with_path(path)
			.with_constraints(Constraints::new().required()),
	)
}

// ============================================================================
// Category 1: Values and Dirty Tracking
// ============================================================================

#[rstest]
#[case("name", json!("Ada"))]
#[case("address.city", json!("Lyon"))]
#[case("hobbies[2]", json!({"kind": "chess"}))]
#[case("matrix[0][1]", json!([1, 2]))]
fn test_set_then_get_returns_equal_copy(#[case] path: &str, #[case] value: serde_json::Value) {
	let form = form_with(json!({"name": "John"}));

	form.set_value(path, value.clone());
	let stored = form.get_value(path).unwrap();

	assert_eq!(stored.to_json(), value);
}

#[rstest]
fn test_stored_objects_are_independent_of_the_caller() {
	let form = form_with(json!({}));
	let mut value = FormValue::from(json!({"a": 1}));

	form.set_value("obj", value.clone());
	value.deep_merge(FormValue::from(json!({"a": 2})));

	assert_eq!(form.get_value("obj").unwrap().to_json(), json!({"a": 1}));
}

#[rstest]
fn test_revert_restores_originals_after_many_writes() {
	let form = form_with(json!({"user": {"name": "John", "tags": ["a"]}}));

	form.set_value("user.name", "Jane");
	form.set_value("user.tags[3]", "d");
	form.set_value("extra", true);
	form.set_values(json!({"user": {"age": 3}}), UpdateBehavior::Merge);
	form.context().revert_values();

	assert_eq!(form.values().to_json(), json!({"user": {"name": "John", "tags": ["a"]}}));
	assert!(!form.is_dirty(None));
}

#[rstest]
fn test_replacing_initial_values_clears_dirty() {
	let form = form_with(json!({"name": "John"}));
	form.set_value("name", "Jane");
	assert!(form.is_dirty(Some("name")));

	form.set_initial_values(json!({"name": "Bob"}), UpdateBehavior::Replace);

	assert!(!form.is_dirty(Some("name")));
	assert!(!form.is_dirty(None));
	assert_eq!(form.get_value("name"), Some(FormValue::from("Bob")));
}

#[rstest]
fn test_set_field_value_marks_dirty() {
	let form = form_with(json!({"foo": "bar"}));

	form.set_value("foo", "baz");

	assert!(form.is_dirty(None));
	assert!(form.is_dirty(Some("foo")));
}

// ============================================================================
// Category 2: Validation and Batching
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_requests_within_window_share_one_run() {
	let runs = Rc::new(Cell::new(0));
	let counter = runs.clone();
	let form = Form::new(
		FormOptions::new()
			.with_initial_values(json!({"name": ""}))
			.with_schema(schema_fn(move |_, _| {
				counter.set(counter.get() + 1);
				Ok(SchemaResult::invalid(vec![IssueCollection::new("name", ["Required"])]))
			})),
	);

	let results = join_all((0..5).map(|_| form.request_validation())).await;

	assert_eq!(runs.get(), 1);
	assert_eq!(form.provider().batched_runs(), 1);
	let first = results[0].as_ref().unwrap();
	assert!(!first.is_valid);
	for result in &results {
		assert_eq!(result.as_ref().unwrap(), first);
	}
}

#[tokio::test(start_paused = true)]
async fn test_requests_after_window_start_a_new_run() {
	let form = form_with(json!({}));

	form.request_validation().await.unwrap();
	form.request_validation().await.unwrap();

	assert_eq!(form.provider().batched_runs(), 2);
}

#[tokio::test]
async fn test_validate_aggregates_fields_and_schema() {
	let form = Form::new(
		FormOptions::new()
			.with_initial_values(json!({"email": "nope", "age": 10}))
			.with_schema(schema_fn(|values, _| {
				let age = values.get_key("age").and_then(FormValue::as_f64).unwrap_or_default();
				if age < 18.0 {
					Ok(SchemaResult::invalid(vec![IssueCollection::new("age", ["Too young"])]))
				} else {
					Ok(SchemaResult::valid(values.clone()))
				}
			})),
	);
	let _email = FormField::in_form(
		&form,
		FieldOptions::new()
			.with_path("email")
			.with_constraints(Constraints::new().with_input_type(InputType::Email)),
	);

	let result = form.validate().await.unwrap();

	assert!(!result.is_valid);
	assert_eq!(form.get_error("email").as_deref(), Some("Enter a valid email address"));
	assert_eq!(form.get_error("age").as_deref(), Some("Too young"));
	assert_eq!(form.get_errors(None).len(), 2);
}

// ============================================================================
// Category 3: Submit and Output
// ============================================================================

#[derive(Default)]
struct RecordingEvent {
	prevented: bool,
}

impl SubmitEvent for RecordingEvent {
	fn prevent_default(&mut self) {
		self.prevented = true;
	}
}

#[tokio::test]
async fn test_submit_skips_callback_when_any_validator_fails() {
	let form = form_with(json!({"a": "ok", "b": ""}));
	let _a = required_field(&form, "a");
	let _b = required_field(&form, "b");
	let calls = Rc::new(Cell::new(0));
	let counter = calls.clone();
	let submit = form.handle_submit(move |_| {
		counter.set(counter.get() + 1);
		async {}
	});

	let mut event = RecordingEvent::default();
	let outcome = submit(Some(&mut event)).await.unwrap();

	assert!(event.prevented);
	assert!(outcome.is_none());
	assert_eq!(calls.get(), 0);
	assert_eq!(form.get_submit_error("b").as_deref(), Some("This field is required"));
	assert_eq!(form.submit_attempts(), 1);
	assert!(!form.was_submitted());
	assert!(!form.is_submitting());
}

#[tokio::test]
async fn test_submit_invokes_callback_when_all_validators_pass() {
	let form = form_with(json!({"a": "ok", "b": "fine"}));
	let _a = required_field(&form, "a");
	let _b = required_field(&form, "b");
	let submit = form.handle_submit(|data| async move { data.to_json() });

	let outcome = submit(None).await.unwrap();

	assert_eq!(outcome, Some(json!({"a": "ok", "b": "fine"})));
	assert!(form.was_submitted());
	assert!(form.get_submit_errors(None).is_empty());
}

#[tokio::test]
async fn test_disabled_paths_are_stripped_from_output_only() {
	let form = form_with(json!({"a": 1, "b": {"c": 2}}));
	form.set_disabled("b.c", true);
	let submit = form.handle_submit(|data| async move { data.to_object() });

	let output = submit(None).await.unwrap().unwrap();

	assert_eq!(output.get_key("b").and_then(|b| b.get_key("c")), None);
	assert_eq!(output.get_key("a"), Some(&FormValue::from(1)));
	assert_eq!(form.get_value("b.c"), Some(FormValue::from(2)));
}

#[tokio::test]
async fn test_renamed_field_is_submitted_under_its_new_path_only() {
	let form = form_with(json!({}));
	let field = FormField::in_form(&form, FieldOptions::new().with_path("old").with_initial_value("v"));
	form.flush();
	let submit = form.handle_submit(|data| async move { data.to_json() });

	field.set_path(Some(Path::parse("new")));
	let outcome = submit(None).await.unwrap();

	assert_eq!(outcome, Some(json!({"new": "v"})));
	assert_eq!(form.values().to_json(), json!({"new": "v"}));
}

#[tokio::test]
async fn test_reordered_list_fields_submit_in_new_order() {
	let form = form_with(json!({"items": ["a", "b", "c"]}));
	let fields: Vec<FormField> = (0..3)
		.map(|index| required_field(&form, &format!("items[{index}]")))
		.collect();
	form.flush();
	let submit = form.handle_submit(|data| async move { data.to_json() });

	fields[0].set_path(Some(Path::parse("items[2]")));
	fields[2].set_path(Some(Path::parse("items[0]")));
	let outcome = submit(None).await.unwrap();

	assert_eq!(outcome, Some(json!({"items": ["c", "b", "a"]})));
	assert_eq!(fields[0].value(), FormValue::from("a"));
}

#[rstest]
fn test_form_data_flattens_array_with_null() {
	let form = form_with(json!({"hobbies": ["x", null]}));

	let data = form.form_data();

	let entries: Vec<(String, String)> = data
		.entries()
		.iter()
		.map(|(name, entry)| (name.clone(), entry.as_text().unwrap_or_default().to_string()))
		.collect();
	assert_eq!(
		entries,
		vec![
			("hobbies[0]".to_string(), "x".to_string()),
			("hobbies[1]".to_string(), String::new()),
		]
	);
	assert!(!data.contains("hobbies"));
}

/// Reports an issue at `test` while `failing` is set
struct ToggleSchema {
	failing: Rc<Cell<bool>>,
}

impl StandardSchema for ToggleSchema {
	fn validate(&self, value: FormValue) -> LocalBoxFuture<'_, FormResult<StandardOutcome>> {
		let outcome = if self.failing.get() {
			StandardOutcome {
				value: None,
				issues: Some(vec![StandardIssue::new([PathKey::from("test")], "error")]),
			}
		} else {
			StandardOutcome {
				value: Some(value),
				issues: None,
			}
		};
		async move { Ok(outcome) }.boxed_local()
	}
}

#[tokio::test]
async fn test_schema_issue_is_reported_then_cleared() {
	let failing = Rc::new(Cell::new(true));
	let form = Form::new(
		FormOptions::new()
			.with_initial_values(json!({"test": "value"}))
			.with_schema(standard_schema(ToggleSchema {
				failing: failing.clone(),
			})),
	);
	let submit = form.handle_submit(|_| async {});

	assert_eq!(submit(None).await.unwrap(), None);
	assert_eq!(form.get_error("test").as_deref(), Some("error"));
	assert_eq!(form.get_submit_error(Path::parse("test")).as_deref(), Some("error"));

	failing.set(false);
	assert_eq!(submit(None).await.unwrap(), Some(()));
	assert_eq!(form.get_error("test"), None);
	assert_eq!(form.get_submit_error("test"), None);
}

// ============================================================================
// Category 4: Reset
// ============================================================================

#[tokio::test]
async fn test_reset_restores_initial_values() {
	let form = form_with(json!({"foo": "bar"}));
	let field = FormField::in_form(&form, FieldOptions::new().with_path("foo"));

	field.set_value("baz");
	assert!(form.is_dirty(None));

	let revalidated = form.reset(ResetState::new(), ResetOptions::new()).await.unwrap();

	assert!(revalidated.is_none());
	assert_eq!(form.values().to_json(), json!({"foo": "bar"}));
	assert!(!form.is_dirty(None));
	assert_eq!(field.value(), FormValue::from("bar"));
}

#[tokio::test]
async fn test_reset_with_new_state_and_revalidation() {
	let form = form_with(json!({"name": "John"}));
	let name = FormField::in_form(
		&form,
		FieldOptions::new().with_path("name").with_constraints(Constraints::new().required()),
	);
	name.set_touched(true);

	let result = form
		.reset(
			ResetState::new()
				.with_values(json!({"name": ""}))
				.with_touched(json!({"name": false})),
			ResetOptions::new()
				.with_behavior(UpdateBehavior::Replace)
				.with_revalidate(true),
		)
		.await
		.unwrap()
		.unwrap();

	assert!(!result.is_valid);
	assert!(!name.is_touched());
	assert_eq!(name.error().as_deref(), Some("This field is required"));
	assert_eq!(name.display_error(), None);
	assert!(!form.is_dirty(None));
}
