use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of one underlying execution within a coalescer. Numbers start
/// at 1 per coalescer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct RunId(u64);

impl fmt::Display for RunId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "run#{}", self.0)
	}
}

/// Monotonic run clock owned by one coalescer.
#[derive(Debug, Default)]
pub(crate) struct RunClock {
	next: AtomicU64,
}

impl RunClock {
	/// Creates a clock whose first run is 1.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the next run ID.
	pub fn next(&self) -> RunId {
		RunId(self.next.fetch_add(1, Ordering::AcqRel).wrapping_add(1))
	}
}
