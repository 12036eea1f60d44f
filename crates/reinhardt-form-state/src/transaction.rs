//! Path lifecycle transactions
//!
//! Fields register, move and leave the form through one entry point,
//! [`FormContext::transaction`]. The mutator receives a read-only
//! [`TransactionView`] of the form and returns a single [`FormTransaction`].
//!
//! Mutators are queued and run by [`FormContext::flush`]. Every mutator of a
//! batch reads the same pre-apply view, so fields trading places in a list
//! each carry their own state forward. The batch is then applied by one
//! reducer in a fixed order:
//!
//! 1. `UnsetPath` and slots vacated by `SetPath` inside arrays are nulled,
//!    keeping sibling indices
//! 2. `DestroyPath` and object keys vacated by `SetPath` are pruned, deepest
//!    and highest index first
//! 3. `SetPath` bundles are written at their new paths
//! 4. `InitPath` seeds paths that still hold nothing (first write wins)
//!
//! Releases therefore address the tree as it was before the batch, and
//! writes address it as it is after.
//!
//! # Examples
//!
//! ```
//! use reinhardt_form_state::{Form, FormOptions, FormTransaction, PathBundle};
//! use serde_json::json;
//!
//! let form = Form::new(FormOptions::new());
//! let context = form.context();
//!
//! context.transaction(|_| FormTransaction::InitPath(PathBundle::new("name").with_value("a")));
//! context.transaction(|_| FormTransaction::InitPath(PathBundle::new("name").with_value("b")));
//! assert_eq!(form.get_value("name"), None);
//!
//! context.flush();
//! assert_eq!(form.get_value("name").unwrap().to_json(), json!("a"));
//! ```

use crate::context::{ContextInner, FormContext, is_disabled_in, remove_under};
use crate::observer::FormEvent;
use crate::path::{self, Path, compare_paths};
use crate::value::FormValue;
use std::cell::{Cell, RefCell};
use std::fmt;

/// Everything a field owns at one path
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathBundle {
	pub path: Path,
	/// `None` leaves the value untouched
	pub value: Option<FormValue>,
	pub touched: bool,
	pub disabled: bool,
	pub errors: Vec<String>,
}

impl PathBundle {
	pub fn new(path: impl Into<Path>) -> Self {
		Self {
			path: path.into(),
			..Self::default()
		}
	}

	pub fn with_value(mut self, value: impl Into<FormValue>) -> Self {
		self.value = Some(value.into());
		self
	}

	pub fn with_touched(mut self, touched: bool) -> Self {
		self.touched = touched;
		self
	}

	pub fn with_disabled(mut self, disabled: bool) -> Self {
		self.disabled = disabled;
		self
	}

	pub fn with_errors(mut self, errors: Vec<String>) -> Self {
		self.errors = errors;
		self
	}
}

/// A single path lifecycle operation
#[derive(Debug, Clone, PartialEq)]
pub enum FormTransaction {
	/// Seed a path unless it already holds state
	InitPath(PathBundle),
	/// Move a field's state from `from` to `bundle.path`
	SetPath { from: Option<Path>, bundle: PathBundle },
	/// Null the leaf, keeping containers and sibling indices
	UnsetPath(Path),
	/// Prune the path from every shadow tree
	DestroyPath(Path),
}

impl FormTransaction {
	pub fn kind(&self) -> &'static str {
		match self {
			FormTransaction::InitPath(_) => "INIT_PATH",
			FormTransaction::SetPath { .. } => "SET_PATH",
			FormTransaction::UnsetPath(_) => "UNSET_PATH",
			FormTransaction::DestroyPath(_) => "DESTROY_PATH",
		}
	}
}

/// Handle to a queued transaction, valid until the next flush
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(u64);

type Mutator = Box<dyn Fn(&TransactionView<'_>) -> FormTransaction>;

struct QueuedTransaction {
	id: TransactionId,
	mutator: Mutator,
}

#[derive(Default)]
pub(crate) struct TransactionQueue {
	pending: RefCell<Vec<QueuedTransaction>>,
	next_id: Cell<u64>,
}

impl TransactionQueue {
	fn push(&self, mutator: Mutator) -> TransactionId {
		let id = TransactionId(self.next_id.get());
		self.next_id.set(id.0 + 1);
		self.pending.borrow_mut().push(QueuedTransaction { id, mutator });
		id
	}

	fn remove(&self, id: TransactionId) -> bool {
		let mut pending = self.pending.borrow_mut();
		let before = pending.len();
		pending.retain(|queued| queued.id != id);
		pending.len() != before
	}

	fn contains(&self, id: TransactionId) -> bool {
		self.pending.borrow().iter().any(|queued| queued.id == id)
	}

	fn take(&self) -> Vec<QueuedTransaction> {
		std::mem::take(&mut *self.pending.borrow_mut())
	}

	pub(crate) fn len(&self) -> usize {
		self.pending.borrow().len()
	}
}

impl fmt::Debug for TransactionQueue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TransactionQueue")
			.field("pending", &self.len())
			.finish()
	}
}

/// Read-only access to the form while building a transaction
pub struct TransactionView<'a> {
	inner: &'a ContextInner,
}

impl TransactionView<'_> {
	pub fn value(&self, path: &Path) -> Option<FormValue> {
		path::get(&self.inner.values.borrow(), path).cloned()
	}

	/// Whether `path` holds a non-null value
	pub fn holds(&self, path: &Path) -> bool {
		path::is_path_set(&self.inner.values.borrow(), path)
	}

	pub fn is_touched(&self, path: &Path) -> bool {
		path::get(&self.inner.touched.borrow(), path).and_then(FormValue::as_bool) == Some(true)
	}

	pub fn is_disabled(&self, path: &Path) -> bool {
		is_disabled_in(&self.inner.disabled.borrow(), path)
	}

	pub fn errors(&self, path: &Path) -> Vec<String> {
		self.inner
			.errors
			.borrow()
			.get(path)
			.cloned()
			.unwrap_or_default()
	}

	/// Capture the state stored at `from` as a bundle addressed to `to`
	pub fn bundle_at(&self, from: &Path, to: Path) -> PathBundle {
		PathBundle {
			path: to,
			value: self.value(from),
			touched: self.is_touched(from),
			disabled: self.is_disabled(from),
			errors: self.errors(from),
		}
	}

	/// The state a field leaving `from` carries to `fallback.path`: what the
	/// tree holds at `from`, or `fallback` when it holds nothing there
	pub fn carry(&self, from: Option<&Path>, fallback: &PathBundle) -> PathBundle {
		match from {
			Some(from) if self.holds(from) => self.bundle_at(from, fallback.path.clone()),
			_ => fallback.clone(),
		}
	}

	fn in_array(&self, path: &Path) -> bool {
		let values = self.inner.values.borrow();
		path.parent()
			.and_then(|parent| path::get(&values, &parent))
			.is_some_and(|node| matches!(node, FormValue::Array(_)))
	}
}

impl FormContext {
	/// Queue one lifecycle operation. The mutator runs at the next
	/// [`flush`](Self::flush) against the same view as the rest of the batch.
	pub fn transaction<F>(&self, mutator: F) -> TransactionId
	where
		F: Fn(&TransactionView<'_>) -> FormTransaction + 'static,
	{
		let id = self.inner.queue.push(Box::new(mutator));
		tracing::trace!(form_id = %self.inner.id, ?id, "queued form transaction");
		id
	}

	/// Drop a queued transaction; returns whether it was still pending
	pub fn cancel_transaction(&self, id: TransactionId) -> bool {
		self.inner.queue.remove(id)
	}

	pub fn is_queued(&self, id: TransactionId) -> bool {
		self.inner.queue.contains(id)
	}

	/// Number of operations waiting for [`flush`](Self::flush)
	pub fn pending_transactions(&self) -> usize {
		self.inner.queue.len()
	}

	pub(crate) fn with_view<R>(&self, read: impl FnOnce(&TransactionView<'_>) -> R) -> R {
		read(&TransactionView { inner: &self.inner })
	}

	/// Build and apply every queued transaction as one batch
	pub fn flush(&self) {
		let queued = self.inner.queue.take();
		if queued.is_empty() {
			return;
		}

		let batch = self.with_view(|view| {
			let operations = queued.iter().map(|queued| (queued.mutator)(view)).collect();
			Batch::plan(view, operations)
		});
		tracing::debug!(form_id = %self.inner.id, operations = queued.len(), "flushing form transactions");

		let mut events = Vec::new();
		for operation in batch.into_operations() {
			tracing::debug!(form_id = %self.inner.id, kind = operation.kind(), "applying form transaction");
			events.extend(reduce(&self.inner, operation));
		}
		for event in events {
			self.emit(event);
		}
	}

	pub fn destroy_path(&self, path: &Path) -> TransactionId {
		let path = path.clone();
		self.transaction(move |_| FormTransaction::DestroyPath(path.clone()))
	}

	pub fn unset_path(&self, path: &Path) -> TransactionId {
		let path = path.clone();
		self.transaction(move |_| FormTransaction::UnsetPath(path.clone()))
	}
}

/// A flushed queue, grouped in application order
#[derive(Default)]
struct Batch {
	unsets: Vec<Path>,
	destroys: Vec<Path>,
	moves: Vec<PathBundle>,
	inits: Vec<PathBundle>,
}

impl Batch {
	fn plan(view: &TransactionView<'_>, operations: Vec<FormTransaction>) -> Self {
		let mut batch = Self::default();
		for operation in operations {
			match operation {
				FormTransaction::InitPath(bundle) => batch.inits.push(bundle),
				FormTransaction::SetPath { from, bundle } => {
					if let Some(from) = from.filter(|from| *from != bundle.path) {
						batch.vacate(view, from);
					}
					batch.moves.push(bundle);
				}
				FormTransaction::UnsetPath(path) => batch.unsets.push(path),
				FormTransaction::DestroyPath(path) => batch.destroys.push(path),
			}
		}
		batch.destroys.sort_by(|a, b| compare_paths(b, a));
		batch.destroys.dedup();
		batch
	}

	fn vacate(&mut self, view: &TransactionView<'_>, path: Path) {
		if view.in_array(&path) {
			self.unsets.push(path);
		} else {
			self.destroys.push(path);
		}
	}

	fn into_operations(self) -> impl Iterator<Item = FormTransaction> {
		self.unsets
			.into_iter()
			.map(FormTransaction::UnsetPath)
			.chain(self.destroys.into_iter().map(FormTransaction::DestroyPath))
			.chain(
				self.moves
					.into_iter()
					.map(|bundle| FormTransaction::SetPath { from: None, bundle }),
			)
			.chain(self.inits.into_iter().map(FormTransaction::InitPath))
	}
}

/// The single reducer every path lifecycle change goes through.
///
/// `SetPath` only writes; releasing `from` is planned by the batch.
fn reduce(inner: &ContextInner, operation: FormTransaction) -> Vec<FormEvent> {
	match operation {
		FormTransaction::InitPath(bundle) => init_path(inner, bundle),
		FormTransaction::SetPath { bundle, .. } => write_bundle(inner, bundle),
		FormTransaction::UnsetPath(path) => {
			path::unset(&mut inner.values.borrow_mut(), &path, false);
			path::unset(&mut inner.touched.borrow_mut(), &path, false);
			remove_under(&mut inner.errors.borrow_mut(), Some(&path));
			remove_under(&mut inner.disabled.borrow_mut(), Some(&path));
			vec![
				FormEvent::ValueChanged(path.clone()),
				FormEvent::ErrorsChanged(Some(path)),
			]
		}
		FormTransaction::DestroyPath(path) => {
			path::unset(&mut inner.values.borrow_mut(), &path, true);
			path::unset(&mut inner.touched.borrow_mut(), &path, true);
			remove_under(&mut inner.errors.borrow_mut(), Some(&path));
			remove_under(&mut inner.submit_errors.borrow_mut(), Some(&path));
			remove_under(&mut inner.disabled.borrow_mut(), Some(&path));
			vec![FormEvent::PathDestroyed(path)]
		}
	}
}

fn init_path(inner: &ContextInner, bundle: PathBundle) -> Vec<FormEvent> {
	let path = bundle.path;
	let mut events = Vec::new();

	if let Some(value) = bundle.value {
		inner.value_snapshot.seed(&path, &value);
		let mut values = inner.values.borrow_mut();
		if !path::is_path_set(&values, &path) {
			path::set(&mut values, &path, value, true);
			events.push(FormEvent::ValueChanged(path.clone()));
		}
	}

	let touched = FormValue::Bool(bundle.touched);
	inner.touched_snapshot.seed(&path, &FormValue::Bool(false));
	{
		let mut tree = inner.touched.borrow_mut();
		if path::get(&tree, &path).is_none_or(FormValue::is_null) {
			path::set(&mut tree, &path, touched, true);
			events.push(FormEvent::TouchedChanged(Some(path.clone())));
		}
	}

	if bundle.disabled {
		let mut disabled = inner.disabled.borrow_mut();
		if !disabled.contains_key(&path) {
			disabled.insert(path.clone(), true);
			events.push(FormEvent::DisabledChanged(path.clone()));
		}
	}

	if !bundle.errors.is_empty() && !is_disabled_in(&inner.disabled.borrow(), &path) {
		let mut errors = inner.errors.borrow_mut();
		if !errors.contains_key(&path) {
			errors.insert(path.clone(), bundle.errors);
			events.push(FormEvent::ErrorsChanged(Some(path)));
		}
	}

	events
}

fn write_bundle(inner: &ContextInner, bundle: PathBundle) -> Vec<FormEvent> {
	let path = bundle.path;

	if let Some(value) = bundle.value {
		path::set(&mut inner.values.borrow_mut(), &path, value, true);
	}
	path::set(
		&mut inner.touched.borrow_mut(),
		&path,
		FormValue::Bool(bundle.touched),
		true,
	);
	if bundle.disabled {
		inner.disabled.borrow_mut().insert(path.clone(), true);
	}
	if !bundle.errors.is_empty() && !bundle.disabled {
		inner.errors.borrow_mut().insert(path.clone(), bundle.errors);
	}

	vec![
		FormEvent::ValueChanged(path.clone()),
		FormEvent::TouchedChanged(Some(path.clone())),
		FormEvent::DisabledChanged(path.clone()),
		FormEvent::ErrorsChanged(Some(path)),
	]
}
