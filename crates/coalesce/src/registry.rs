use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::{Coalesce, TaskFn, task_fn};

/// Keeps one coalescer per owner key.
///
/// Owners that rebuild their wrapper repeatedly (once per frame, request,
/// render, ...) call [`CoalescerRegistry::obtain`] each time. The first call
/// creates the coalescer; later calls return the same one with its wrapped
/// function replaced, so in-flight runs and queued calls survive the rebuild.
pub struct CoalescerRegistry<K, C> {
	inner: Arc<RwLock<HashMap<K, C>>>,
}

impl<K, C> Default for CoalescerRegistry<K, C> {
	fn default() -> Self {
		Self {
			inner: Arc::new(RwLock::new(HashMap::new())),
		}
	}
}

impl<K, C> Clone for CoalescerRegistry<K, C> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<K: fmt::Debug, C> fmt::Debug for CoalescerRegistry<K, C> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_set().entries(self.inner.read().keys()).finish()
	}
}

impl<K, C> CoalescerRegistry<K, C>
where
	K: Eq + Hash,
	C: Coalesce,
{
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the coalescer for `key`, creating it around `f` on first use
	/// and otherwise replacing its wrapped function with `f`.
	pub fn obtain<F, Fut>(&self, key: K, f: F) -> C
	where
		F: Fn(C::Args) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = C::Output> + Send + 'static,
	{
		self.obtain_task(key, task_fn(f))
	}

	/// [`Self::obtain`] for an already erased function.
	pub fn obtain_task(&self, key: K, task: TaskFn<C::Args, C::Output>) -> C {
		let mut guard = self.inner.write();
		if let Some(existing) = guard.get(&key) {
			existing.set_task(task);
			tracing::trace!(owners = guard.len(), "coalesce.registry.reused");
			return existing.clone();
		}

		let coalescer = C::with_task(task);
		guard.insert(key, coalescer.clone());
		tracing::debug!(owners = guard.len(), "coalesce.registry.created");
		coalescer
	}

	/// Returns the coalescer for `key` without creating one.
	pub fn get<Q>(&self, key: &Q) -> Option<C>
	where
		K: Borrow<Q>,
		Q: Eq + Hash + ?Sized,
	{
		self.inner.read().get(key).cloned()
	}

	/// Discards the owner's coalescer. Runs already started still settle for
	/// callers holding their operations.
	pub fn remove<Q>(&self, key: &Q) -> Option<C>
	where
		K: Borrow<Q>,
		Q: Eq + Hash + ?Sized,
	{
		let removed = self.inner.write().remove(key);
		if removed.is_some() {
			tracing::debug!("coalesce.registry.removed");
		}
		removed
	}

	/// Returns the number of owners.
	pub fn len(&self) -> usize {
		self.inner.read().len()
	}

	/// Returns `true` if no owner is registered.
	pub fn is_empty(&self) -> bool {
		self.inner.read().is_empty()
	}

	/// Returns owner keys sorted.
	pub fn keys(&self) -> Vec<K>
	where
		K: Clone + Ord,
	{
		let mut keys: Vec<_> = self.inner.read().keys().cloned().collect();
		keys.sort();
		keys
	}
}
