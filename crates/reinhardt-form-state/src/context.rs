//! Form context
//!
//! [`FormContext`] owns the four parallel shadow trees of a form:
//!
//! - **values**: the live value tree
//! - **touched**: a boolean tree with the same shape as the values
//! - **disabled**: a flat map of path to disabled flag
//! - **errors**: a flat map of path to messages, plus a separate map for the
//!   errors of the last submit attempt
//!
//! Dirty state is not stored; it is derived by comparing the live values with
//! the originals of the value snapshot.
//!
//! Ordinary writes go through the setters below. Path lifecycle changes
//! (field registration, path migration, unmount) go through
//! [`FormContext::transaction`].
//!
//! Every mutation is announced on the form's [`EventBus`] once all internal
//! borrows have been released.

use crate::config::FormConfig;
use crate::observer::{EventBus, FormEvent, Subscription};
use crate::path::{self, Path};
use crate::snapshot::{FormSnapshot, ValueSource};
use crate::transaction::TransactionQueue;
use crate::validation::result::IssueCollection;
use crate::value::{FormValue, UpdateBehavior};
use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

pub(crate) type ErrorMap = IndexMap<Path, Vec<String>>;

/// Seed data for a new [`FormContext`]
#[derive(Debug, Default)]
pub(crate) struct ContextSeed {
	pub id: Option<String>,
	pub initial_values: ValueSource,
	pub initial_touched: FormValue,
	pub config: FormConfig,
}

pub(crate) struct ContextInner {
	pub(crate) id: String,
	pub(crate) config: FormConfig,
	pub(crate) values: RefCell<FormValue>,
	pub(crate) touched: RefCell<FormValue>,
	pub(crate) disabled: RefCell<IndexMap<Path, bool>>,
	pub(crate) errors: RefCell<ErrorMap>,
	pub(crate) submit_errors: RefCell<ErrorMap>,
	pub(crate) value_snapshot: FormSnapshot,
	pub(crate) touched_snapshot: FormSnapshot,
	pub(crate) queue: TransactionQueue,
	pending_init: RefCell<Option<Shared<LocalBoxFuture<'static, ()>>>>,
	events: EventBus,
}

/// Shared handle to a form's state.
///
/// Cloning is cheap and every clone sees the same state. Path lifecycle
/// transactions wait in a queue; hosts must call [`ready`](Self::ready) or
/// [`flush`](Self::flush) once per tick for registrations, moves and
/// unmounts to reach the trees.
#[derive(Clone)]
pub struct FormContext {
	pub(crate) inner: Rc<ContextInner>,
}

impl FormContext {
	pub(crate) fn new(seed: ContextSeed) -> Self {
		let inner = Rc::new_cyclic(|weak: &Weak<ContextInner>| {
			let owner = weak.clone();
			let (value_snapshot, pending) = FormSnapshot::new(seed.initial_values, move |resolved| {
				if let Some(inner) = owner.upgrade() {
					FormContext { inner }.merge_resolved_values(resolved);
				}
			});
			let initial_touched = if seed.initial_touched.is_container() {
				seed.initial_touched
			} else {
				FormValue::object()
			};
			let touched_snapshot = FormSnapshot::from_value(initial_touched);

			ContextInner {
				id: seed
					.id
					.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
				config: seed.config,
				values: RefCell::new(value_snapshot.originals()),
				touched: RefCell::new(touched_snapshot.originals()),
				disabled: RefCell::new(IndexMap::new()),
				errors: RefCell::new(IndexMap::new()),
				submit_errors: RefCell::new(IndexMap::new()),
				value_snapshot,
				touched_snapshot,
				queue: TransactionQueue::default(),
				pending_init: RefCell::new(pending.map(FutureExt::shared)),
				events: EventBus::new(),
			}
		});

		tracing::debug!(form_id = %inner.id, "form context created");
		Self { inner }
	}

	pub fn id(&self) -> &str {
		&self.inner.id
	}

	pub fn config(&self) -> &FormConfig {
		&self.inner.config
	}

	/// Whether two handles point at the same form
	pub fn ptr_eq(&self, other: &FormContext) -> bool {
		Rc::ptr_eq(&self.inner, &other.inner)
	}

	pub(crate) fn downgrade(&self) -> Weak<ContextInner> {
		Rc::downgrade(&self.inner)
	}

	pub(crate) fn upgrade(weak: &Weak<ContextInner>) -> Option<FormContext> {
		weak.upgrade().map(|inner| FormContext { inner })
	}

	/// Resolves once the asynchronous initial values (if any) are merged in.
	///
	/// Also applies queued path registrations before and after waiting.
	pub fn ready(&self) -> impl Future<Output = ()> + 'static {
		let context = self.clone();
		async move {
			context.flush();
			let pending = context.inner.pending_init.borrow().clone();
			if let Some(pending) = pending {
				pending.await;
				context.inner.pending_init.borrow_mut().take();
			}
			context.flush();
		}
	}

	/// Whether asynchronous initial values are still outstanding
	pub fn is_initializing(&self) -> bool {
		self.inner.pending_init.borrow().is_some()
	}

	fn merge_resolved_values(&self, resolved: FormValue) {
		self.inner.values.borrow_mut().deep_merge(resolved);
		self.emit(FormEvent::ValueChanged(Path::root()));
	}

	// Events

	pub fn subscribe<F>(&self, filter: Option<Path>, callback: F) -> Subscription
	where
		F: Fn(&FormEvent) + 'static,
	{
		self.inner.events.subscribe(filter, callback)
	}

	pub fn emit(&self, event: FormEvent) {
		self.inner.events.emit(event);
	}

	// Values

	/// The value at `path`; `None` when nothing is stored there
	pub fn get_value(&self, path: &Path) -> Option<FormValue> {
		path::get(&self.inner.values.borrow(), path).cloned()
	}

	/// A copy of the whole value tree
	pub fn values(&self) -> FormValue {
		self.inner.values.borrow().clone()
	}

	/// Write `value` at `path`
	pub fn set_value(&self, path: &Path, value: impl Into<FormValue>) {
		path::set(&mut self.inner.values.borrow_mut(), path, value.into(), true);
		self.emit(FormEvent::ValueChanged(path.clone()));
	}

	/// Write a whole tree.
	///
	/// `Merge` deep-merges onto the current values. `Replace` clears every
	/// top-level key first, then writes each incoming top-level key as a
	/// literal key, so `"foo.bar"` stays a single key.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_form_state::{Form, FormOptions, UpdateBehavior};
	/// use serde_json::json;
	///
	/// let form = Form::new(FormOptions::new().with_initial_values(json!({"a": 1})));
	/// form.set_values(json!({"foo.bar": 2}), UpdateBehavior::Replace);
	///
	/// assert_eq!(form.values().to_json(), json!({"foo.bar": 2}));
	/// assert_eq!(form.get_value("foo.bar"), None);
	/// ```
	pub fn set_values(&self, values: FormValue, behavior: UpdateBehavior) {
		{
			let mut current = self.inner.values.borrow_mut();
			match (behavior, values) {
				(UpdateBehavior::Merge, incoming) => current.deep_merge(incoming),
				(UpdateBehavior::Replace, FormValue::Object(incoming)) => {
					*current = path::object_from_literal_keys(incoming);
				}
				(UpdateBehavior::Replace, incoming) => *current = incoming,
			}
		}
		self.emit(FormEvent::ValueChanged(Path::root()));
	}

	pub fn get_initial(&self, path: &Path) -> Option<FormValue> {
		self.inner
			.value_snapshot
			.with_initials(|initials| path::get(initials, path).cloned())
	}

	pub fn get_original(&self, path: &Path) -> Option<FormValue> {
		self.inner
			.value_snapshot
			.with_originals(|originals| path::get(originals, path).cloned())
	}

	pub fn initial_values(&self) -> FormValue {
		self.inner.value_snapshot.initials()
	}

	/// Update the initial values, the originals and the live tree
	pub fn set_initial_values(&self, values: FormValue, behavior: UpdateBehavior) {
		self.inner.value_snapshot.update(values.clone(), behavior);
		self.set_values(values, behavior);
	}

	/// Replace the live values with a copy of the originals
	pub fn revert_values(&self) {
		*self.inner.values.borrow_mut() = self.inner.value_snapshot.originals();
		self.emit(FormEvent::ValueChanged(Path::root()));
	}

	// Dirty

	/// Whether `path` (or, without a path, any path) differs from its
	/// original value. `Null` and a missing value compare equal.
	pub fn is_dirty(&self, path: Option<&Path>) -> bool {
		let values = self.inner.values.borrow();
		self.inner.value_snapshot.with_originals(|originals| match path {
			Some(path) => trees_differ(path::get(&values, path), path::get(originals, path)),
			None => trees_differ(Some(&values), Some(originals)),
		})
	}

	// Touched

	/// Whether `path` (or, without a path, any leaf) is touched
	pub fn is_touched(&self, path: Option<&Path>) -> bool {
		let touched = self.inner.touched.borrow();
		let node = match path {
			Some(path) => path::get(&touched, path),
			None => Some(&*touched),
		};
		node.is_some_and(|node| path::find_leaf(node, |_, leaf| leaf.as_bool() == Some(true)).is_some())
	}

	/// Set one touched leaf, or every touched leaf when `path` is `None`
	pub fn set_touched(&self, path: Option<&Path>, touched: bool) {
		{
			let mut tree = self.inner.touched.borrow_mut();
			match path {
				Some(path) => path::set(&mut tree, path, FormValue::Bool(touched), true),
				None => path::visit_leaves_mut(&mut tree, |leaf| *leaf = FormValue::Bool(touched)),
			}
		}
		self.emit(FormEvent::TouchedChanged(path.cloned()));
	}

	/// A copy of the touched tree
	pub fn touched(&self) -> FormValue {
		self.inner.touched.borrow().clone()
	}

	/// Update the initial touched state, its originals and the live tree
	pub fn set_initial_touched(&self, touched: FormValue, behavior: UpdateBehavior) {
		self.inner.touched_snapshot.update(touched.clone(), behavior);
		{
			let mut tree = self.inner.touched.borrow_mut();
			match behavior {
				UpdateBehavior::Merge => tree.deep_merge(touched),
				UpdateBehavior::Replace => *tree = touched,
			}
		}
		self.emit(FormEvent::TouchedChanged(None));
	}

	/// Replace the live touched tree with a copy of the originals
	pub fn revert_touched(&self) {
		*self.inner.touched.borrow_mut() = self.inner.touched_snapshot.originals();
		self.emit(FormEvent::TouchedChanged(None));
	}

	// Disabled

	/// Whether `path` or any of its ancestors is disabled
	pub fn is_disabled(&self, path: &Path) -> bool {
		is_disabled_in(&self.inner.disabled.borrow(), path)
	}

	pub fn set_disabled(&self, path: &Path, disabled: bool) {
		{
			let mut map = self.inner.disabled.borrow_mut();
			if disabled {
				map.insert(path.clone(), true);
			} else {
				map.shift_remove(path);
			}
		}
		self.emit(FormEvent::DisabledChanged(path.clone()));
	}

	/// Every path explicitly marked disabled
	pub fn disabled_paths(&self) -> Vec<Path> {
		self.inner
			.disabled
			.borrow()
			.iter()
			.filter(|(_, disabled)| **disabled)
			.map(|(path, _)| path.clone())
			.collect()
	}

	// Errors

	/// Stored errors.
	///
	/// Without a path, every entry. With a path, every entry stored at that
	/// path or at one of its ancestors, most specific first; a group error at
	/// `address` is therefore visible when asking for `address.street`.
	pub fn get_errors(&self, path: Option<&Path>) -> Vec<IssueCollection> {
		collect_errors(&self.inner.errors.borrow(), path)
	}

	/// The first message visible at `path`
	pub fn get_error(&self, path: &Path) -> Option<String> {
		first_message(self.get_errors(Some(path)))
	}

	/// [`get_error`](Self::get_error), but only once `path` is touched
	pub fn display_error(&self, path: &Path) -> Option<String> {
		if self.is_touched(Some(path)) {
			self.get_error(path)
		} else {
			None
		}
	}

	/// Store `messages` at `path`. An empty list removes the entry.
	///
	/// Writing messages onto a disabled path is a no-op.
	pub fn set_errors(&self, path: &Path, messages: Vec<String>) {
		if !messages.is_empty() && self.is_disabled(path) {
			tracing::warn!(%path, "ignoring errors written to a disabled path");
			return;
		}

		{
			let mut errors = self.inner.errors.borrow_mut();
			if messages.is_empty() {
				errors.shift_remove(path);
			} else {
				errors.insert(path.clone(), messages);
			}
		}
		self.emit(FormEvent::ErrorsChanged(Some(path.clone())));
	}

	/// Replace every error under `prefix` (everything when `None`) with
	/// `issues`. Issues on disabled paths are dropped.
	pub fn replace_errors(&self, prefix: Option<&Path>, issues: Vec<IssueCollection>) {
		{
			let disabled = self.inner.disabled.borrow();
			let mut errors = self.inner.errors.borrow_mut();
			remove_under(&mut errors, prefix);
			for issue in issues {
				if issue.is_empty() || is_disabled_in(&disabled, &issue.path) {
					continue;
				}
				errors
					.entry(issue.path)
					.or_default()
					.extend(issue.messages);
			}
		}
		self.emit(FormEvent::ErrorsChanged(prefix.cloned()));
	}

	/// Remove every error under `prefix` (everything when `None`)
	pub fn clear_errors(&self, prefix: Option<&Path>) {
		remove_under(&mut self.inner.errors.borrow_mut(), prefix);
		self.emit(FormEvent::ErrorsChanged(prefix.cloned()));
	}

	// Submit errors

	pub fn get_submit_errors(&self, path: Option<&Path>) -> Vec<IssueCollection> {
		collect_errors(&self.inner.submit_errors.borrow(), path)
	}

	pub fn get_submit_error(&self, path: &Path) -> Option<String> {
		first_message(self.get_submit_errors(Some(path)))
	}

	/// Replace the submit-error channel
	pub fn set_submit_errors(&self, issues: Vec<IssueCollection>) {
		{
			let mut errors = self.inner.submit_errors.borrow_mut();
			errors.clear();
			for issue in issues.into_iter().filter(|issue| !issue.is_empty()) {
				errors
					.entry(issue.path)
					.or_default()
					.extend(issue.messages);
			}
		}
		self.emit(FormEvent::SubmitErrorsChanged);
	}

	pub fn clear_submit_errors(&self) {
		self.inner.submit_errors.borrow_mut().clear();
		self.emit(FormEvent::SubmitErrorsChanged);
	}
}

impl fmt::Debug for FormContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FormContext")
			.field("id", &self.inner.id)
			.field("values", &self.inner.values.borrow())
			.field("touched", &self.inner.touched.borrow())
			.field("disabled", &self.inner.disabled.borrow())
			.field("errors", &self.inner.errors.borrow())
			.finish_non_exhaustive()
	}
}

pub(crate) fn is_disabled_in(disabled: &IndexMap<Path, bool>, path: &Path) -> bool {
	disabled
		.iter()
		.any(|(key, flag)| *flag && path.starts_with(key))
}

/// Drop every entry whose key lies under `prefix`
pub(crate) fn remove_under<V>(map: &mut IndexMap<Path, V>, prefix: Option<&Path>) {
	match prefix {
		Some(prefix) => map.retain(|key, _| !key.starts_with(prefix)),
		None => map.clear(),
	}
}

fn collect_errors(errors: &ErrorMap, path: Option<&Path>) -> Vec<IssueCollection> {
	let mut matches: Vec<IssueCollection> = errors
		.iter()
		.filter(|(key, messages)| {
			!messages.is_empty() && path.is_none_or(|path| path.starts_with(key))
		})
		.map(|(key, messages)| IssueCollection {
			path: key.clone(),
			messages: messages.clone(),
		})
		.collect();
	if path.is_some() {
		matches.sort_by_key(|issue| std::cmp::Reverse(issue.path.len()));
	}
	matches
}

fn first_message(issues: Vec<IssueCollection>) -> Option<String> {
	issues
		.into_iter()
		.find_map(|issue| issue.messages.into_iter().next())
}

/// Leaf-wise comparison of two subtrees where `Null`, a missing value and a
/// container holding only nulls are all equivalent
pub(crate) fn trees_differ(current: Option<&FormValue>, original: Option<&FormValue>) -> bool {
	let null = FormValue::Null;
	let current = current.unwrap_or(&null);
	let original = original.unwrap_or(&null);

	let one_way = |from: &FormValue, to: &FormValue| {
		path::find_leaf(from, |at, leaf| !same_leaf(leaf, path::get(to, at))).is_some()
	};
	one_way(current, original) || one_way(original, current)
}

fn same_leaf(leaf: &FormValue, other: Option<&FormValue>) -> bool {
	match other {
		None => leaf.is_null(),
		Some(other) if leaf.is_null() => {
			path::find_leaf(other, |_, nested| !nested.is_null()).is_none()
		}
		Some(other) => leaf == other,
	}
}
