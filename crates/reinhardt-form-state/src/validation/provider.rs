//! Validation providers
//!
//! A [`ValidationProvider`] collects one [`ValidationResult`] for a scope (the
//! whole form or a group) from every registered [`ValidationSource`]:
//!
//! 1. apply queued path registrations and wait for asynchronous initial
//!    values
//! 2. fan out to every live source and await all of them
//! 3. flatten their errors
//! 4. if the scope has a schema, parse the scope's values with it; its errors
//!    join the source errors and its output becomes the base
//! 5. stitch source outputs onto the base, groups before fields, skipping
//!    pathless sources and invalid groups; in schema mode a source output
//!    only fills paths the schema output left unset
//! 6. write the errors back to the form: everything for the form scope, the
//!    errors under its prefix for a group
//!
//! [`ValidationProvider::request_validation`] debounces and coalesces calls
//! to [`ValidationProvider::validate`] through a [`BatchedRequest`].
//!
//! Runs are never cancelled: a slow run applies its result even if newer
//! values were written in the meantime.

use crate::config::FormConfig;
use crate::context::FormContext;
use crate::error::FormResult;
use crate::path::{self, Path};
use crate::validation::batch::{BatchFuture, BatchedRequest};
use crate::validation::result::{IssueCollection, ValidationMode, ValidationResult, ValidationScope};
use crate::validation::schema::{SchemaContext, SharedSchema};
use crate::value::FormValue;
use futures::FutureExt;
use futures::future::{LocalBoxFuture, try_join_all};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// Anything that reports a result to a provider (fields and groups)
pub trait ValidationSource {
	fn validate_for_provider(&self) -> LocalBoxFuture<'static, FormResult<ValidationResult>>;
}

struct SourceEntry {
	id: u64,
	source: Weak<dyn ValidationSource>,
}

struct ProviderInner {
	scope: ValidationScope,
	path: Path,
	context: Option<FormContext>,
	locale: String,
	schema: RefCell<Option<SharedSchema>>,
	sources: RefCell<Vec<SourceEntry>>,
	next_id: Cell<u64>,
	batch: BatchedRequest<ValidationResult>,
}

/// Aggregates validation for one scope.
///
/// Cloning shares the provider.
#[derive(Clone)]
pub struct ValidationProvider {
	inner: Rc<ProviderInner>,
}

impl ValidationProvider {
	/// Provider for a whole form
	pub(crate) fn for_form(context: &FormContext, schema: Option<SharedSchema>) -> Self {
		Self::new(
			ValidationScope::Form,
			Path::root(),
			Some(context.clone()),
			schema,
			context.config(),
		)
	}

	/// Provider for the group at `path`; `context` is `None` for a group
	/// created outside a form
	pub(crate) fn for_group(
		path: Path,
		context: Option<&FormContext>,
		schema: Option<SharedSchema>,
	) -> Self {
		let config = context
			.map(|context| context.config().clone())
			.unwrap_or_else(FormConfig::global);
		Self::new(
			ValidationScope::Group,
			path,
			context.cloned(),
			schema,
			&config,
		)
	}

	fn new(
		scope: ValidationScope,
		path: Path,
		context: Option<FormContext>,
		schema: Option<SharedSchema>,
		config: &FormConfig,
	) -> Self {
		let inner = Rc::new_cyclic(|weak: &Weak<ProviderInner>| {
			let owner = weak.clone();
			let batch = BatchedRequest::new(config.validation_debounce(), move || {
				let owner = owner.clone();
				async move {
					match owner.upgrade() {
						Some(inner) => run_validation(inner).await,
						None => Err(crate::error::FormError::Disposed),
					}
				}
			});

			ProviderInner {
				scope,
				path,
				context,
				locale: config.locale.clone(),
				schema: RefCell::new(schema),
				sources: RefCell::new(Vec::new()),
				next_id: Cell::new(0),
				batch,
			}
		});
		Self { inner }
	}

	pub fn scope(&self) -> ValidationScope {
		self.inner.scope
	}

	pub fn path(&self) -> &Path {
		&self.inner.path
	}

	pub fn has_schema(&self) -> bool {
		self.inner.schema.borrow().is_some()
	}

	pub fn set_schema(&self, schema: Option<SharedSchema>) {
		*self.inner.schema.borrow_mut() = schema;
	}

	/// Register a source; it stays registered until the returned handle is
	/// dropped or the source itself is dropped
	#[must_use = "dropping the registration unregisters the source"]
	pub fn register(&self, source: Weak<dyn ValidationSource>) -> SourceRegistration {
		let id = self.inner.next_id.get();
		self.inner.next_id.set(id + 1);
		self.inner.sources.borrow_mut().push(SourceEntry { id, source });
		SourceRegistration {
			id,
			provider: Rc::downgrade(&self.inner),
		}
	}

	/// Number of live registered sources
	pub fn source_count(&self) -> usize {
		self.inner
			.sources
			.borrow()
			.iter()
			.filter(|entry| entry.source.strong_count() > 0)
			.count()
	}

	/// Ask every live source for its result, synchronously
	pub fn dispatch_validate(&self) -> Vec<LocalBoxFuture<'static, FormResult<ValidationResult>>> {
		dispatch(&self.inner)
	}

	/// Run validation for this scope now
	pub fn validate(&self) -> LocalBoxFuture<'static, FormResult<ValidationResult>> {
		run_validation(self.inner.clone()).boxed_local()
	}

	/// Debounced [`validate`](Self::validate); concurrent callers share one run
	pub fn request_validation(&self) -> BatchFuture<ValidationResult> {
		self.inner.batch.request()
	}

	/// Number of debounced runs started so far
	pub fn batched_runs(&self) -> usize {
		self.inner.batch.runs()
	}
}

impl fmt::Debug for ValidationProvider {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ValidationProvider")
			.field("scope", &self.inner.scope)
			.field("path", &self.inner.path)
			.field("sources", &self.source_count())
			.field("has_schema", &self.has_schema())
			.finish()
	}
}

/// Handle returned by [`ValidationProvider::register`]
pub struct SourceRegistration {
	id: u64,
	provider: Weak<ProviderInner>,
}

impl Drop for SourceRegistration {
	fn drop(&mut self) {
		if let Some(provider) = self.provider.upgrade() {
			provider
				.sources
				.borrow_mut()
				.retain(|entry| entry.id != self.id);
		}
	}
}

impl fmt::Debug for SourceRegistration {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SourceRegistration").field("id", &self.id).finish()
	}
}

fn dispatch(inner: &ProviderInner) -> Vec<LocalBoxFuture<'static, FormResult<ValidationResult>>> {
	let sources: Vec<Rc<dyn ValidationSource>> = {
		let mut entries = inner.sources.borrow_mut();
		entries.retain(|entry| entry.source.strong_count() > 0);
		entries
			.iter()
			.filter_map(|entry| entry.source.upgrade())
			.collect()
	};
	sources
		.iter()
		.map(|source| source.validate_for_provider())
		.collect()
}

async fn run_validation(inner: Rc<ProviderInner>) -> FormResult<ValidationResult> {
	if let Some(context) = &inner.context {
		context.ready().await;
	}

	let mut results = try_join_all(dispatch(&inner)).await?;
	let mut errors: Vec<IssueCollection> = results
		.iter()
		.flat_map(|result| result.errors.iter().cloned())
		.collect();

	let base = match &inner.context {
		Some(context) if inner.path.is_root() => context.values(),
		Some(context) => context.get_value(&inner.path).unwrap_or_else(FormValue::object),
		None => FormValue::object(),
	};

	let schema = inner.schema.borrow().clone();
	let (mode, mut output) = match schema {
		Some(schema) => {
			let parsed = schema
				.parse(
					base.clone(),
					SchemaContext {
						locale: inner.locale.clone(),
						path: inner.path.clone(),
					},
				)
				.await?;
			errors.extend(parsed.errors.into_iter().map(|issue| IssueCollection {
				path: inner.path.join(&issue.path),
				messages: issue.messages,
			}));
			(ValidationMode::Schema, parsed.output.unwrap_or(base))
		}
		None => (ValidationMode::Aggregate, base),
	};

	results.sort_by_key(|result| result.scope);
	stitch(&mut output, &results, &inner.path, mode);

	let result = ValidationResult::new(inner.scope, inner.path.clone(), errors, Some(output), mode);
	tracing::debug!(
		scope = ?result.scope,
		path = %result.path,
		sources = results.len(),
		is_valid = result.is_valid,
		"validation run finished"
	);

	if let Some(context) = &inner.context {
		let prefix = (!inner.path.is_root()).then_some(&inner.path);
		context.replace_errors(prefix, result.errors.clone());
	}

	Ok(result)
}

/// Apply source outputs onto `output`, which is rooted at `scope_path`
fn stitch(output: &mut FormValue, results: &[ValidationResult], scope_path: &Path, mode: ValidationMode) {
	for result in results {
		if result.path.is_root() {
			continue;
		}
		if result.scope == ValidationScope::Group && !result.is_valid {
			continue;
		}
		let Some(value) = &result.output else {
			continue;
		};
		let Some(relative) = result.path.strip_prefix(scope_path) else {
			continue;
		};
		if relative.is_root() {
			continue;
		}
		if mode == ValidationMode::Schema && path::is_path_set(output, &relative) {
			continue;
		}
		path::set(output, &relative, value.clone(), true);
	}
}
