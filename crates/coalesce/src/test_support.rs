use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::{TaskFn, task_fn};

pub(crate) fn init_tracing() {
	let _ = tracing_subscriber::fmt::try_init();
}

/// Gated test function: every run records its argument when called, then
/// waits for a permit from [`Bench::release`] before producing its value.
pub(crate) struct Bench {
	calls: Mutex<Vec<u32>>,
	gate: Semaphore,
	in_flight: AtomicUsize,
	max_in_flight: AtomicUsize,
}

impl Bench {
	pub fn new() -> Arc<Self> {
		init_tracing();
		Arc::new(Self {
			calls: Mutex::new(Vec::new()),
			gate: Semaphore::new(0),
			in_flight: AtomicUsize::new(0),
			max_in_flight: AtomicUsize::new(0),
		})
	}

	pub fn gated<R, F>(self: &Arc<Self>, f: F) -> TaskFn<u32, R>
	where
		F: Fn(u32) -> R + Send + Sync + 'static,
		R: Send + 'static,
	{
		let bench = Arc::clone(self);
		let f = Arc::new(f);
		task_fn(move |x: u32| {
			bench.calls.lock().push(x);
			let bench = Arc::clone(&bench);
			let f = Arc::clone(&f);
			async move {
				let now = bench.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
				bench.max_in_flight.fetch_max(now, Ordering::SeqCst);
				if let Ok(permit) = bench.gate.acquire().await {
					permit.forget();
				}
				bench.in_flight.fetch_sub(1, Ordering::SeqCst);
				f(x)
			}
		})
	}

	pub fn plus_one(self: &Arc<Self>) -> TaskFn<u32, u32> {
		self.gated(|x| x + 1)
	}

	/// Lets `n` runs complete.
	pub fn release(&self, n: usize) {
		self.gate.add_permits(n);
	}

	pub fn calls(&self) -> Vec<u32> {
		self.calls.lock().clone()
	}

	pub fn max_in_flight(&self) -> usize {
		self.max_in_flight.load(Ordering::SeqCst)
	}
}
