//! Debounced, coalesced requests
//!
//! [`BatchedRequest`] wraps an expensive asynchronous operation (a validation
//! run) so that bursts of requests collapse into one execution:
//!
//! - the run starts once no new request has arrived for the debounce window
//!   (trailing debounce)
//! - every request made while the window is open, or while the run is in
//!   flight, receives the same run's result
//! - a request made after the run completed starts a new window
//!
//! The pending run is a [`Shared`] future; nothing is spawned. The run is
//! driven by whichever caller polls it, and the debounce sleeps on
//! `tokio::time`, so callers need a Tokio runtime with the time driver.
//!
//! ```text
//! request ─┐  request ─┐        request ─┐
//!          ▼           ▼                 ▼
//!   ───────[window ────────────]─[ run ]─────────► all three share one result
//! ```

use crate::error::{FormError, FormResult};
use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tokio::time::{Instant, sleep_until};

/// Handle every caller of [`BatchedRequest::request`] awaits
pub type BatchFuture<T> = Shared<LocalBoxFuture<'static, FormResult<T>>>;

type RunFn<T> = Box<dyn Fn() -> LocalBoxFuture<'static, FormResult<T>>>;

struct BatchInner<T: Clone> {
	window: Duration,
	run: RunFn<T>,
	last_request: Cell<Instant>,
	pending: RefCell<Option<BatchFuture<T>>>,
	runs: Cell<usize>,
}

/// A trailing debounce with join-latest-call semantics
///
/// # Examples
///
/// ```
/// use reinhardt_form_state::BatchedRequest;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let batch = BatchedRequest::new(Duration::from_millis(5), || async { Ok(42) });
///
/// let (a, b) = futures::join!(batch.request(), batch.request());
/// assert_eq!(a, Ok(42));
/// assert_eq!(b, Ok(42));
/// assert_eq!(batch.runs(), 1);
/// # }
/// ```
pub struct BatchedRequest<T: Clone + 'static> {
	inner: Rc<BatchInner<T>>,
}

impl<T: Clone + 'static> BatchedRequest<T> {
	pub fn new<F, Fut>(window: Duration, run: F) -> Self
	where
		F: Fn() -> Fut + 'static,
		Fut: Future<Output = FormResult<T>> + 'static,
	{
		Self {
			inner: Rc::new(BatchInner {
				window,
				run: Box::new(move || run().boxed_local()),
				last_request: Cell::new(Instant::now()),
				pending: RefCell::new(None),
				runs: Cell::new(0),
			}),
		}
	}

	/// Request a run, joining the pending one if there is one.
	///
	/// Resolves to [`FormError::Disposed`] if the batch is dropped before the
	/// run starts.
	pub fn request(&self) -> BatchFuture<T> {
		self.inner.last_request.set(Instant::now());

		if let Some(pending) = self.inner.pending.borrow().as_ref() {
			return pending.clone();
		}

		let future = debounced_run(Rc::downgrade(&self.inner)).boxed_local().shared();
		*self.inner.pending.borrow_mut() = Some(future.clone());
		future
	}

	/// Whether a run is waiting or in flight
	pub fn is_pending(&self) -> bool {
		self.inner.pending.borrow().is_some()
	}

	/// Number of underlying runs started so far
	pub fn runs(&self) -> usize {
		self.inner.runs.get()
	}

	pub fn window(&self) -> Duration {
		self.inner.window
	}
}

async fn debounced_run<T: Clone + 'static>(batch: Weak<BatchInner<T>>) -> FormResult<T> {
	loop {
		let deadline = {
			let inner = batch.upgrade().ok_or(FormError::Disposed)?;
			inner.last_request.get() + inner.window
		};
		if Instant::now() >= deadline {
			break;
		}
		sleep_until(deadline).await;
	}

	let run = {
		let inner = batch.upgrade().ok_or(FormError::Disposed)?;
		inner.runs.set(inner.runs.get() + 1);
		tracing::debug!(run = inner.runs.get(), "starting batched request");
		(inner.run)()
	};
	let result = run.await;

	if let Some(inner) = batch.upgrade() {
		inner.pending.borrow_mut().take();
	}
	result
}

impl<T: Clone + 'static> fmt::Debug for BatchedRequest<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("BatchedRequest")
			.field("window", &self.inner.window)
			.field("pending", &self.is_pending())
			.field("runs", &self.runs())
			.finish()
	}
}
