use std::any::Any;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};

use futures::FutureExt;
use tokio::task::JoinHandle;

use crate::latest::LatestRef;
use crate::token::RunId;
use crate::{SettleError, TaskFn};

/// Coalescer state that is told when one of its runs ends.
pub(crate) trait RunOwner<R>: Send + Sync + 'static {
	/// Policy name carried on log events.
	const POLICY: &'static str;

	/// Handles the end of `run`. Called exactly once per started run.
	fn finish(self: &Arc<Self>, run: RunId, outcome: Result<R, SettleError>);
}

/// Reports the end of a run to its owner, on success and failure paths alike.
///
/// A guard that is dropped without [`RunGuard::finish`] (the run future was
/// dropped with its task, e.g. on runtime shutdown) reports
/// [`SettleError::Dropped`].
struct RunGuard<R, O: RunOwner<R>> {
	owner: Arc<O>,
	run: RunId,
	armed: bool,
	_outcome: PhantomData<fn() -> R>,
}

impl<R, O: RunOwner<R>> RunGuard<R, O> {
	fn new(owner: Arc<O>, run: RunId) -> Self {
		Self {
			owner,
			run,
			armed: true,
			_outcome: PhantomData,
		}
	}

	fn finish(mut self, outcome: Result<R, SettleError>) {
		self.armed = false;
		self.owner.finish(self.run, outcome);
	}
}

impl<R, O: RunOwner<R>> Drop for RunGuard<R, O> {
	fn drop(&mut self) {
		if self.armed {
			self.armed = false;
			self.owner.finish(self.run, Err(SettleError::Dropped));
		}
	}
}

/// Starts `run`: calls the current function with `args` and drives the
/// resulting future to completion on the runtime.
///
/// Panics in the wrapped function, whether raised while building the future
/// or while polling it, settle the run as [`SettleError::Panicked`].
///
/// Must be called without holding the owner's state lock; the owner's
/// [`RunOwner::finish`] may run synchronously from here.
pub(crate) fn start<O, P, R>(owner: &Arc<O>, task: &LatestRef<TaskFn<P, R>>, run: RunId, args: P)
where
	O: RunOwner<R>,
	P: Send + 'static,
	R: Send + 'static,
{
	tracing::trace!(policy = O::POLICY, %run, "coalesce.run.start");
	let guard = RunGuard::new(Arc::clone(owner), run);
	let task = task.get();
	let fut = match std::panic::catch_unwind(AssertUnwindSafe(|| task(args))) {
		Ok(fut) => fut,
		Err(payload) => {
			let message = panic_message(payload);
			tracing::debug!(policy = O::POLICY, %run, %message, "coalesce.run.panicked_on_call");
			guard.finish(Err(SettleError::Panicked(message)));
			return;
		}
	};

	spawn(O::POLICY, async move {
		let outcome = AssertUnwindSafe(fut).catch_unwind().await.map_err(|payload| SettleError::Panicked(panic_message(payload)));
		tracing::trace!(policy = O::POLICY, %run, panicked = outcome.is_err(), "coalesce.run.settled");
		guard.finish(outcome);
	});
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
	if let Some(msg) = payload.downcast_ref::<&'static str>() {
		return (*msg).to_owned();
	}
	if let Some(msg) = payload.downcast_ref::<String>() {
		return msg.clone();
	}
	String::from("non-string panic payload")
}

fn runtime_handle() -> tokio::runtime::Handle {
	if let Ok(handle) = tokio::runtime::Handle::try_current() {
		return handle;
	}

	static FALLBACK_RT: OnceLock<tokio::runtime::Runtime> = OnceLock::new();
	FALLBACK_RT
		.get_or_init(|| {
			tokio::runtime::Builder::new_multi_thread()
				.enable_all()
				.worker_threads(2)
				.thread_name(FALLBACK_THREAD_NAME)
				.build()
				.expect("failed to build coalescer fallback runtime")
		})
		.handle()
		.clone()
}

const FALLBACK_THREAD_NAME: &str = "settle-coalesce-run";

/// Spawns a run onto the caller's runtime, or onto a shared fallback runtime
/// when the coalescer is invoked outside of tokio.
#[allow(clippy::disallowed_methods)]
fn spawn<F>(policy: &'static str, fut: F) -> JoinHandle<F::Output>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	tracing::trace!(policy, "coalesce.spawn");
	runtime_handle().spawn(fut)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests;
