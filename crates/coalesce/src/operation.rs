//! Awaitable settlement shared by every caller of one coalesced run.

use std::fmt;
use std::future::IntoFuture;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Notify;

/// Ways a coalesced run can end without producing a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettleError {
	/// The wrapped function panicked while running.
	#[error("coalesced operation panicked: {0}")]
	Panicked(String),
	/// The run was dropped before it produced a value, e.g. because the
	/// runtime shut down.
	#[error("coalesced operation was dropped before settling")]
	Dropped,
}

struct Slot<R> {
	outcome: Mutex<Option<Result<R, SettleError>>>,
	notify: Notify,
}

/// Handle to the eventual outcome of one coalesced run.
///
/// Clones observe the same settlement. Awaiting (or [`Operation::wait`])
/// yields the wrapped function's return value, or a [`SettleError`] when the
/// run never produced one. Dropping a handle does not affect the run.
pub struct Operation<R> {
	slot: Arc<Slot<R>>,
}

impl<R> Clone for Operation<R> {
	fn clone(&self) -> Self {
		Self {
			slot: Arc::clone(&self.slot),
		}
	}
}

impl<R> fmt::Debug for Operation<R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Operation").field("settled", &self.is_settled()).finish()
	}
}

impl<R> Operation<R> {
	/// Creates an unsettled operation.
	pub(crate) fn new() -> Self {
		Self {
			slot: Arc::new(Slot {
				outcome: Mutex::new(None),
				notify: Notify::new(),
			}),
		}
	}

	/// Stores the outcome and wakes every waiter. Only the first call has
	/// any effect.
	pub(crate) fn settle(&self, outcome: Result<R, SettleError>) -> bool {
		{
			let mut slot = self.slot.outcome.lock();
			if slot.is_some() {
				return false;
			}
			*slot = Some(outcome);
		}
		self.slot.notify.notify_waiters();
		true
	}

	/// Returns `true` once the outcome is available.
	pub fn is_settled(&self) -> bool {
		self.slot.outcome.lock().is_some()
	}

	/// Returns `true` if both handles refer to the same run outcome.
	pub fn ptr_eq(a: &Self, b: &Self) -> bool {
		Arc::ptr_eq(&a.slot, &b.slot)
	}
}

impl<R: Clone> Operation<R> {
	/// Waits for the outcome without consuming the handle.
	pub async fn wait(&self) -> Result<R, SettleError> {
		loop {
			// Register before checking so a settle in between is not missed.
			let notified = self.slot.notify.notified();
			let outcome = self.slot.outcome.lock().clone();
			if let Some(outcome) = outcome {
				return outcome;
			}
			notified.await;
		}
	}

	/// Returns the outcome if it is already available.
	pub fn try_outcome(&self) -> Option<Result<R, SettleError>> {
		self.slot.outcome.lock().clone()
	}
}

impl<R> IntoFuture for Operation<R>
where
	R: Clone + Send + 'static,
{
	type Output = Result<R, SettleError>;
	type IntoFuture = BoxFuture<'static, Result<R, SettleError>>;

	fn into_future(self) -> Self::IntoFuture {
		Box::pin(async move { self.wait().await })
	}
}
