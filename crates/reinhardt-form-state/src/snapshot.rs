//! Initial/original snapshots
//!
//! A [`FormSnapshot`] keeps two deep copies of a tree:
//!
//! - **initials**: the values a form (or a reset) starts from
//! - **originals**: the baseline `is_dirty` and `revert_*` compare against
//!
//! The snapshot is seeded from a [`ValueSource`]. Plain values and getters
//! resolve immediately. Futures resolve later: the snapshot starts empty and
//! hands back an init future that, once driven, merges the resolved tree into
//! both copies and calls `on_async_init` exactly once.

use crate::path::{self, Path};
use crate::value::{FormValue, UpdateBehavior};
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Where a snapshot's content comes from
pub enum ValueSource {
	/// A value known up front
	Value(FormValue),
	/// A getter evaluated once, synchronously
	Getter(Box<dyn FnOnce() -> FormValue>),
	/// A value that resolves later
	Future(LocalBoxFuture<'static, FormValue>),
	/// A getter producing a future, evaluated once
	AsyncGetter(Box<dyn FnOnce() -> LocalBoxFuture<'static, FormValue>>),
}

impl ValueSource {
	pub fn getter<F>(getter: F) -> Self
	where
		F: FnOnce() -> FormValue + 'static,
	{
		ValueSource::Getter(Box::new(getter))
	}

	pub fn future<F>(future: F) -> Self
	where
		F: Future<Output = FormValue> + 'static,
	{
		ValueSource::Future(future.boxed_local())
	}

	pub fn async_getter<F, Fut>(getter: F) -> Self
	where
		F: FnOnce() -> Fut + 'static,
		Fut: Future<Output = FormValue> + 'static,
	{
		ValueSource::AsyncGetter(Box::new(move || getter().boxed_local()))
	}

	/// Resolve synchronous sources right away; hand back asynchronous ones
	fn into_parts(self) -> Result<FormValue, LocalBoxFuture<'static, FormValue>> {
		match self {
			ValueSource::Value(value) => Ok(value),
			ValueSource::Getter(getter) => Ok(getter()),
			ValueSource::Future(future) => Err(future),
			ValueSource::AsyncGetter(getter) => Err(getter()),
		}
	}
}

impl Default for ValueSource {
	fn default() -> Self {
		ValueSource::Value(FormValue::object())
	}
}

impl From<FormValue> for ValueSource {
	fn from(value: FormValue) -> Self {
		ValueSource::Value(value)
	}
}

impl From<serde_json::Value> for ValueSource {
	fn from(value: serde_json::Value) -> Self {
		ValueSource::Value(value.into())
	}
}

impl fmt::Debug for ValueSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ValueSource::Value(value) => f.debug_tuple("Value").field(value).finish(),
			ValueSource::Getter(_) => f.write_str("Getter(..)"),
			ValueSource::Future(_) => f.write_str("Future(..)"),
			ValueSource::AsyncGetter(_) => f.write_str("AsyncGetter(..)"),
		}
	}
}

/// Future returned for asynchronous sources; drive it to completion once
pub type SnapshotInit = LocalBoxFuture<'static, ()>;

#[derive(Debug, Default)]
struct SnapshotState {
	initials: FormValue,
	originals: FormValue,
}

/// The `(initials, originals)` pair of a form tree.
///
/// Cloning shares the underlying state.
///
/// # Examples
///
/// ```
/// use reinhardt_form_state::{FormSnapshot, FormValue, ValueSource};
/// use serde_json::json;
///
/// let (snapshot, pending) = FormSnapshot::new(
///     ValueSource::getter(|| FormValue::from(json!({"name": "John"}))),
///     |_| unreachable!("synchronous sources never call back"),
/// );
///
/// assert!(pending.is_none());
/// assert_eq!(snapshot.initials(), FormValue::from(json!({"name": "John"})));
/// assert_eq!(snapshot.originals(), snapshot.initials());
/// ```
#[derive(Debug, Clone, Default)]
pub struct FormSnapshot {
	state: Rc<RefCell<SnapshotState>>,
}

impl FormSnapshot {
	/// Resolve `source` into a snapshot.
	///
	/// For asynchronous sources the snapshot starts as an empty object and the
	/// returned [`SnapshotInit`] must be driven; on completion it merges the
	/// resolved tree into initials and originals and then calls
	/// `on_async_init` with it.
	pub fn new<F>(source: ValueSource, on_async_init: F) -> (Self, Option<SnapshotInit>)
	where
		F: FnOnce(FormValue) + 'static,
	{
		match source.into_parts() {
			Ok(value) => (Self::from_value(value), None),
			Err(pending) => {
				let snapshot = Self::from_value(FormValue::object());
				let target = snapshot.clone();
				let init = async move {
					let resolved = pending.await;
					target.update(resolved.clone(), UpdateBehavior::Merge);
					tracing::debug!("async form snapshot resolved");
					on_async_init(resolved);
				}
				.boxed_local();
				(snapshot, Some(init))
			}
		}
	}

	/// A snapshot with both copies set to `value`
	pub fn from_value(value: FormValue) -> Self {
		Self {
			state: Rc::new(RefCell::new(SnapshotState {
				initials: value.clone(),
				originals: value,
			})),
		}
	}

	pub fn initials(&self) -> FormValue {
		self.state.borrow().initials.clone()
	}

	pub fn originals(&self) -> FormValue {
		self.state.borrow().originals.clone()
	}

	/// Run `f` against the originals without cloning them
	pub fn with_originals<R>(&self, f: impl FnOnce(&FormValue) -> R) -> R {
		f(&self.state.borrow().originals)
	}

	/// Run `f` against the initials without cloning them
	pub fn with_initials<R>(&self, f: impl FnOnce(&FormValue) -> R) -> R {
		f(&self.state.borrow().initials)
	}

	/// Write `value` at `path` in both copies unless the originals already
	/// hold a value there. Returns whether anything was written.
	pub fn seed(&self, path: &Path, value: &FormValue) -> bool {
		let mut state = self.state.borrow_mut();
		if path::is_path_set(&state.originals, path) {
			return false;
		}
		path::set(&mut state.initials, path, value.clone(), true);
		path::set(&mut state.originals, path, value.clone(), true);
		true
	}

	/// Update both copies with `value`
	pub fn update(&self, value: FormValue, behavior: UpdateBehavior) {
		let mut state = self.state.borrow_mut();
		match behavior {
			UpdateBehavior::Merge => {
				state.initials.deep_merge(value.clone());
				state.originals.deep_merge(value);
			}
			UpdateBehavior::Replace => {
				state.initials = value.clone();
				state.originals = value;
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;
	use std::cell::Cell;

	#[rstest]
	fn test_plain_value_resolves_synchronously() {
		let (snapshot, pending) =
			FormSnapshot::new(FormValue::from(json!({"a": 1})).into(), |_| {});

		assert!(pending.is_none());
		assert_eq!(snapshot.originals().to_json(), json!({"a": 1}));
	}

	#[tokio::test]
	async fn test_future_resolves_once_and_merges() {
		let calls = Rc::new(Cell::new(0));
		let seen = calls.clone();
		let (snapshot, pending) = FormSnapshot::new(
			ValueSource::future(async { FormValue::from(json!({"name": "async"})) }),
			move |resolved| {
				seen.set(seen.get() + 1);
				assert_eq!(resolved.to_json(), json!({"name": "async"}));
			},
		);

		assert_eq!(snapshot.initials(), FormValue::object());
		pending.expect("async source returns an init future").await;

		assert_eq!(calls.get(), 1);
		assert_eq!(snapshot.initials().to_json(), json!({"name": "async"}));
		assert_eq!(snapshot.originals().to_json(), json!({"name": "async"}));
	}

	#[tokio::test]
	async fn test_async_getter_is_lazy_until_constructed() {
		let evaluated = Rc::new(Cell::new(false));
		let flag = evaluated.clone();
		let source = ValueSource::async_getter(move || {
			flag.set(true);
			async { FormValue::from(json!({"x": true})) }
		});
		assert!(!evaluated.get());

		let (snapshot, pending) = FormSnapshot::new(source, |_| {});
		assert!(evaluated.get());
		pending.unwrap().await;
		assert_eq!(snapshot.initials().to_json(), json!({"x": true}));
	}

	#[rstest]
	fn test_replace_and_merge_updates() {
		let snapshot = FormSnapshot::from_value(FormValue::from(json!({"a": 1, "b": 2})));

		snapshot.update(FormValue::from(json!({"b": 3})), UpdateBehavior::Merge);
		assert_eq!(snapshot.originals().to_json(), json!({"a": 1, "b": 3}));

		snapshot.update(FormValue::from(json!({"c": 4})), UpdateBehavior::Replace);
		assert_eq!(snapshot.originals().to_json(), json!({"c": 4}));
		assert_eq!(snapshot.initials().to_json(), json!({"c": 4}));
	}

	#[rstest]
	fn test_seed_is_first_write_wins() {
		let snapshot = FormSnapshot::from_value(FormValue::from(json!({"a": 1})));

		assert!(!snapshot.seed(&Path::parse("a"), &FormValue::from(2)));
		assert!(snapshot.seed(&Path::parse("list[1]"), &FormValue::from("x")));

		assert_eq!(
			snapshot.originals().to_json(),
			json!({"a": 1, "list": [null, "x"]})
		);
		assert_eq!(snapshot.initials(), snapshot.originals());
	}
}
