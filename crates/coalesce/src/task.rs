use std::future::Future;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::Operation;

/// Type-erased async function wrapped by a coalescer.
pub type TaskFn<P, R> = Box<dyn Fn(P) -> BoxFuture<'static, R> + Send + Sync>;

/// Erases an async function into a [`TaskFn`].
pub fn task_fn<P, R, F, Fut>(f: F) -> TaskFn<P, R>
where
	F: Fn(P) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = R> + Send + 'static,
{
	Box::new(move |args| f(args).boxed())
}

/// Common surface of the coalescing policies.
///
/// Implementors are cheap handles over shared state: cloning one yields the
/// same coalescer, not a fresh one.
pub trait Coalesce: Clone + Send + Sync + 'static {
	/// Arguments of one call.
	type Args: Send + 'static;
	/// Value produced by the wrapped function.
	type Output: Clone + Send + 'static;

	/// Builds an idle coalescer around `task`.
	fn with_task(task: TaskFn<Self::Args, Self::Output>) -> Self;

	/// Replaces the wrapped function. Runs already started keep the function
	/// they were started with.
	fn set_task(&self, task: TaskFn<Self::Args, Self::Output>);

	/// Calls the wrapped function according to the coalescing policy.
	fn invoke(&self, args: Self::Args) -> Operation<Self::Output>;

	/// Returns `true` while an underlying execution is in flight.
	fn is_busy(&self) -> bool;
}
