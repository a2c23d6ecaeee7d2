//! "Latest arguments win" coalescing.
//!
//! While a run is in flight, incoming calls do not start work. Their
//! arguments overwrite one queued slot and every such caller receives the
//! same follow-up [`Operation`]. When the run ends the coalescer starts
//! exactly one follow-up with the last queued arguments, so intermediate
//! arguments are discarded.
//!
//! # Failure
//!
//! The follow-up is started however the previous run ended: with a value
//! (including an `Err` value of the wrapped function), a panic, or a drop.
//! Callers of the previous run observe its outcome verbatim; callers queued
//! behind it observe the follow-up's outcome, since their arguments were
//! never tried.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::latest::LatestRef;
use crate::run::{self, RunOwner};
use crate::token::{RunClock, RunId};
use crate::{Coalesce, Operation, SettleError, TaskFn, task_fn};

struct Running<R> {
	run: RunId,
	op: Operation<R>,
}

struct State<P, R> {
	running: Option<Running<R>>,
	/// Arguments of the most recent call received while busy.
	latest: Option<P>,
	/// Operation handed to every caller of the current busy window.
	follow_up: Option<Operation<R>>,
}

struct Inner<P, R> {
	task: LatestRef<TaskFn<P, R>>,
	clock: RunClock,
	state: Mutex<State<P, R>>,
}

/// Coalescer that queues at most one follow-up run with the latest arguments.
///
/// Cloning yields another handle to the same coalescer.
pub struct LatestWinsCoalescer<P, R> {
	inner: Arc<Inner<P, R>>,
}

impl<P, R> Clone for LatestWinsCoalescer<P, R> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<P, R> fmt::Debug for LatestWinsCoalescer<P, R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.inner.state.lock();
		f.debug_struct("LatestWinsCoalescer")
			.field("running", &state.running.as_ref().map(|r| r.run))
			.field("queued", &state.latest.is_some())
			.finish()
	}
}

impl<P, R> LatestWinsCoalescer<P, R>
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

impl<P, R> Coalesce for LatestWinsCoalescer<P, R>
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
				state: Mutex::new(State {
					running: None,
					latest: None,
					follow_up: None,
				}),
			}),
		}
	}

	fn set_task(&self, task: TaskFn<P, R>) {
		self.inner.task.set(task);
	}

	fn invoke(&self, args: P) -> Operation<R> {
		let mut state = self.inner.state.lock();

		if let Some(run) = state.running.as_ref().map(|r| r.run) {
			let replaced = state.latest.replace(args).is_some();
			let op = state.follow_up.get_or_insert_with(Operation::new).clone();
			drop(state);
			tracing::trace!(%run, replaced, "coalesce.latest_wins.queued");
			return op;
		}

		let run = self.inner.clock.next();
		let op = Operation::new();
		state.running = Some(Running { run, op: op.clone() });
		drop(state);

		run::start(&self.inner, &self.inner.task, run, args);
		op
	}

	fn is_busy(&self) -> bool {
		self.inner.state.lock().running.is_some()
	}
}

impl<P, R> RunOwner<R> for Inner<P, R>
where
	P: Send + 'static,
	R: Clone + Send + 'static,
{
	const POLICY: &'static str = "latest_wins";

	fn finish(self: &Arc<Self>, run: RunId, outcome: Result<R, SettleError>) {
		let (finished, follow_up) = {
			let mut state = self.state.lock();
			let Some(running) = state.running.take() else {
				tracing::warn!(%run, "coalesce.latest_wins.finish_while_idle");
				return;
			};
			debug_assert_eq!(running.run, run, "finished run is not the pending one");

			let follow_up = state.latest.take().map(|args| {
				let op = state.follow_up.take().unwrap_or_else(Operation::new);
				let next = self.clock.next();
				state.running = Some(Running { run: next, op });
				(next, args)
			});
			(running.op, follow_up)
		};

		finished.settle(outcome);

		if let Some((next, args)) = follow_up {
			tracing::debug!(finished = %run, follow_up = %next, "coalesce.latest_wins.follow_up");
			run::start(self, &self.task, next, args);
		}
	}
}
