use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;

/// Single-slot holder that always exposes the most recently supplied value.
///
/// Long-lived wrappers keep one of these for the function they call, so a run
/// started after [`LatestRef::set`] uses the new value even though the wrapper
/// itself was built earlier.
pub struct LatestRef<T> {
	current: ArcSwap<T>,
}

impl<T> LatestRef<T> {
	/// Creates a holder seeded with `value`.
	pub fn new(value: T) -> Self {
		Self {
			current: ArcSwap::from_pointee(value),
		}
	}

	/// Overwrites the held value.
	pub fn set(&self, value: T) {
		self.current.store(Arc::new(value));
	}

	/// Returns the most recently set value.
	pub fn get(&self) -> Arc<T> {
		self.current.load_full()
	}
}

impl<T> fmt::Debug for LatestRef<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LatestRef").finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn get_returns_seed_value() {
		let latest = LatestRef::new(7u32);
		assert_eq!(*latest.get(), 7);
	}

	#[test]
	fn set_overwrites_previous_value() {
		let latest = LatestRef::new("first");
		latest.set("second");
		latest.set("third");
		assert_eq!(*latest.get(), "third");
	}

	#[test]
	fn earlier_reads_keep_their_snapshot() {
		let latest = LatestRef::new(String::from("old"));
		let before = latest.get();
		latest.set(String::from("new"));
		assert_eq!(before.as_str(), "old");
		assert_eq!(latest.get().as_str(), "new");
	}
}
