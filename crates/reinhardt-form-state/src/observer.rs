//! Observable form store
//!
//! Every mutation of a form's shadow trees is announced as a [`FormEvent`]
//! on the form's [`EventBus`]. Subscribers pick the part of the tree they
//! care about with a path filter: a filtered listener sees events whose path
//! overlaps the filter (ancestors and descendants alike) plus every form-wide
//! event that carries no path.
//!
//! Listeners run after the bus has released its own borrows, so a listener
//! may mutate the form (and trigger further events) from inside its callback.
//!
//! ## Example
//!
//! ```
//! use reinhardt_form_state::{EventBus, FormEvent, Path};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let bus = EventBus::new();
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = seen.clone();
//! let _subscription = bus.subscribe(Some(Path::parse("address")), move |event| {
//!     sink.borrow_mut().push(event.clone());
//! });
//!
//! bus.emit(FormEvent::ValueChanged(Path::parse("address.street")));
//! bus.emit(FormEvent::ValueChanged(Path::parse("name")));
//! bus.emit(FormEvent::Reset);
//!
//! assert_eq!(seen.borrow().len(), 2);
//! ```

use crate::path::Path;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// A change notification emitted by a form
#[derive(Debug, Clone, PartialEq)]
pub enum FormEvent {
	/// The value at a path was written
	ValueChanged(Path),
	/// Touched state changed; `None` means every leaf
	TouchedChanged(Option<Path>),
	/// Disabled state of a path changed
	DisabledChanged(Path),
	/// Live errors changed; `None` means the whole error map
	ErrorsChanged(Option<Path>),
	/// The submit-error channel changed
	SubmitErrorsChanged,
	/// A path was pruned from every shadow tree
	PathDestroyed(Path),
	/// A submit was attempted; fields mark themselves touched
	SubmitAttempted,
	/// Values and touched state were reverted to the originals
	Reset,
}

impl FormEvent {
	/// The path the event is scoped to, if any
	pub fn path(&self) -> Option<&Path> {
		match self {
			FormEvent::ValueChanged(path)
			| FormEvent::DisabledChanged(path)
			| FormEvent::PathDestroyed(path) => Some(path),
			FormEvent::TouchedChanged(path) | FormEvent::ErrorsChanged(path) => path.as_ref(),
			FormEvent::SubmitErrorsChanged | FormEvent::SubmitAttempted | FormEvent::Reset => None,
		}
	}

	fn matches(&self, filter: Option<&Path>) -> bool {
		match (filter, self.path()) {
			(Some(filter), Some(path)) => filter.overlaps(path),
			_ => true,
		}
	}
}

type Listener = Rc<dyn Fn(&FormEvent)>;

struct ListenerEntry {
	id: u64,
	filter: Option<Path>,
	callback: Listener,
}

#[derive(Default)]
struct BusInner {
	next_id: Cell<u64>,
	listeners: RefCell<Vec<ListenerEntry>>,
}

/// Path-filtered publish/subscribe channel.
///
/// Cloning shares the listener list.
#[derive(Clone, Default)]
pub struct EventBus {
	inner: Rc<BusInner>,
}

impl EventBus {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register `callback` for events overlapping `filter`.
	///
	/// With `filter = None` the listener receives every event. The listener
	/// stays registered until the returned [`Subscription`] is dropped.
	#[must_use = "dropping the subscription unsubscribes immediately"]
	pub fn subscribe<F>(&self, filter: Option<Path>, callback: F) -> Subscription
	where
		F: Fn(&FormEvent) + 'static,
	{
		let id = self.inner.next_id.get();
		self.inner.next_id.set(id + 1);
		self.inner.listeners.borrow_mut().push(ListenerEntry {
			id,
			filter,
			callback: Rc::new(callback),
		});

		Subscription {
			id,
			bus: Rc::downgrade(&self.inner),
		}
	}

	/// Deliver `event` to every matching listener
	pub fn emit(&self, event: FormEvent) {
		let targets: Vec<Listener> = self
			.inner
			.listeners
			.borrow()
			.iter()
			.filter(|entry| event.matches(entry.filter.as_ref()))
			.map(|entry| entry.callback.clone())
			.collect();

		for callback in targets {
			callback(&event);
		}
	}

	/// Number of live subscriptions
	pub fn listener_count(&self) -> usize {
		self.inner.listeners.borrow().len()
	}
}

impl fmt::Debug for EventBus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EventBus")
			.field("listeners", &self.listener_count())
			.finish()
	}
}

/// Handle returned by [`EventBus::subscribe`]; unsubscribes on drop
pub struct Subscription {
	id: u64,
	bus: Weak<BusInner>,
}

impl Drop for Subscription {
	fn drop(&mut self) {
		if let Some(bus) = self.bus.upgrade() {
			bus.listeners.borrow_mut().retain(|entry| entry.id != self.id);
		}
	}
}

impl fmt::Debug for Subscription {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Subscription").field("id", &self.id).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn recorder(bus: &EventBus, filter: Option<&str>) -> (Subscription, Rc<RefCell<Vec<FormEvent>>>) {
		let seen = Rc::new(RefCell::new(Vec::new()));
		let sink = seen.clone();
		let subscription = bus.subscribe(filter.map(Path::parse), move |event| {
			sink.borrow_mut().push(event.clone());
		});
		(subscription, seen)
	}

	#[rstest]
	#[case("address", "address.street", true)]
	#[case("address.street", "address", true)]
	#[case("address", "addressLine", false)]
	#[case("a.b", "a.c", false)]
	fn test_filter_overlap(#[case] filter: &str, #[case] path: &str, #[case] delivered: bool) {
		let bus = EventBus::new();
		let (_subscription, seen) = recorder(&bus, Some(filter));

		bus.emit(FormEvent::ValueChanged(Path::parse(path)));

		assert_eq!(seen.borrow().len(), usize::from(delivered));
	}

	#[rstest]
	fn test_pathless_events_reach_filtered_listeners() {
		let bus = EventBus::new();
		let (_subscription, seen) = recorder(&bus, Some("x"));

		bus.emit(FormEvent::SubmitAttempted);
		bus.emit(FormEvent::TouchedChanged(None));

		assert_eq!(
			*seen.borrow(),
			vec![FormEvent::SubmitAttempted, FormEvent::TouchedChanged(None)]
		);
	}

	#[rstest]
	fn test_drop_unsubscribes() {
		let bus = EventBus::new();
		let (subscription, seen) = recorder(&bus, None);
		assert_eq!(bus.listener_count(), 1);

		drop(subscription);
		bus.emit(FormEvent::Reset);

		assert_eq!(bus.listener_count(), 0);
		assert!(seen.borrow().is_empty());
	}

	#[rstest]
	fn test_listener_may_emit_and_subscribe() {
		let bus = EventBus::new();
		let (_outer, seen) = recorder(&bus, None);
		let inner_bus = bus.clone();
		let spawned = Rc::new(RefCell::new(Vec::new()));
		let keep = spawned.clone();
		let _reentrant = bus.subscribe(None, move |event| {
			if *event == FormEvent::SubmitAttempted {
				keep.borrow_mut().push(inner_bus.subscribe(None, |_| {}));
				inner_bus.emit(FormEvent::Reset);
			}
		});

		bus.emit(FormEvent::SubmitAttempted);

		assert_eq!(
			*seen.borrow(),
			vec![FormEvent::SubmitAttempted, FormEvent::Reset]
		);
		assert_eq!(bus.listener_count(), 3);
	}
}
