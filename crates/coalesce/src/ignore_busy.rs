//! "Ignore while busy" coalescing.
//!
//! Calls that arrive while a run is in flight are dropped: the caller gets a
//! clone of the in-flight [`Operation`] and its arguments are never used.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::latest::LatestRef;
use crate::run::{self, RunOwner};
use crate::token::{RunClock, RunId};
use crate::{Coalesce, Operation, SettleError, TaskFn, task_fn};

struct Inner<P, R> {
	task: LatestRef<TaskFn<P, R>>,
	clock: RunClock,
	pending: Mutex<Option<(RunId, Operation<R>)>>,
}

/// Coalescer that hands busy callers the in-flight operation.
///
/// Cloning yields another handle to the same coalescer.
pub struct IgnoreWhileBusyCoalescer<P, R> {
	inner: Arc<Inner<P, R>>,
}

impl<P, R> Clone for IgnoreWhileBusyCoalescer<P, R> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<P, R> fmt::Debug for IgnoreWhileBusyCoalescer<P, R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let running = self.inner.pending.lock().as_ref().map(|(run, _)| *run);
		f.debug_struct("IgnoreWhileBusyCoalescer").field("running", &running).finish()
	}
}

impl<P, R> IgnoreWhileBusyCoalescer<P, R>
where
	P: Send + 'static,
	R: Clone + Send + 'static,
{
	/// Wraps `f`.
	pub fn new<F, Fut>(f: F) -> Self
	where
		F: Fn(P) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = R> + Send + 'static,
	{
		Self::with_task(task_fn(f))
	}

	/// Replaces the wrapped function; see [`Coalesce::set_task`].
	pub fn replace<F, Fut>(&self, f: F)
	where
		F: Fn(P) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = R> + Send + 'static,
	{
		self.set_task(task_fn(f));
	}

	/// Returns `true` if both handles refer to the same coalescer.
	pub fn ptr_eq(a: &Self, b: &Self) -> bool {
		Arc::ptr_eq(&a.inner, &b.inner)
	}
}

impl<P, R> Coalesce for IgnoreWhileBusyCoalescer<P, R>
where
	P: Send + 'static,
	R: Clone + Send + 'static,
{
	type Args = P;
	type Output = R;

	fn with_task(task: TaskFn<P, R>) -> Self {
		Self {
			inner: Arc::new(Inner {
				task: LatestRef::new(task),
				clock: RunClock::new(),
				pending: Mutex::new(None),
			}),
		}
	}

	fn set_task(&self, task: TaskFn<P, R>) {
		self.inner.task.set(task);
	}

	fn invoke(&self, args: P) -> Operation<R> {
		let mut pending = self.inner.pending.lock();
		if let Some((run, op)) = pending.as_ref() {
			tracing::trace!(%run, "coalesce.ignore_busy.dropped");
			return op.clone();
		}

		let run = self.inner.clock.next();
		let op = Operation::new();
		*pending = Some((run, op.clone()));
		drop(pending);

		run::start(&self.inner, &self.inner.task, run, args);
		op
	}

	fn is_busy(&self) -> bool {
		self.inner.pending.lock().is_some()
	}
}

impl<P, R> RunOwner<R> for Inner<P, R>
where
	P: Send + 'static,
	R: Clone + Send + 'static,
{
	const POLICY: &'static str = "ignore_busy";

	fn finish(self: &Arc<Self>, run: RunId, outcome: Result<R, SettleError>) {
		let Some((pending_run, op)) = self.pending.lock().take() else {
			tracing::warn!(%run, "coalesce.ignore_busy.finish_while_idle");
			return;
		};
		debug_assert_eq!(pending_run, run, "finished run is not the pending one");
		op.settle(outcome);
	}
}
