use std::sync::Arc;

use parking_lot::Mutex;

use super::*;
use crate::task_fn;
use crate::token::RunClock;

#[test]
fn extracts_static_str_payload() {
	let payload = std::panic::catch_unwind(|| -> u8 { panic!("boom-str") }).unwrap_err();
	assert_eq!(panic_message(payload), "boom-str");
}

#[test]
fn extracts_string_payload() {
	let payload = std::panic::catch_unwind(|| -> u8 { panic!("{}", String::from("boom-string")) }).unwrap_err();
	assert_eq!(panic_message(payload), "boom-string");
}

#[test]
fn names_opaque_payloads() {
	let payload = std::panic::catch_unwind(|| -> u8 { std::panic::panic_any(17u8) }).unwrap_err();
	assert_eq!(panic_message(payload), "non-string panic payload");
}

#[derive(Default)]
struct Recorder {
	finished: Mutex<Vec<(RunId, Result<u32, SettleError>)>>,
	done: tokio::sync::Notify,
}

impl RunOwner<u32> for Recorder {
	const POLICY: &'static str = "recorder";

	fn finish(self: &Arc<Self>, run: RunId, outcome: Result<u32, SettleError>) {
		self.finished.lock().push((run, outcome));
		self.done.notify_one();
	}
}

#[tokio::test]
async fn start_reports_value_to_owner() {
	let owner = Arc::new(Recorder::default());
	let task = LatestRef::new(task_fn(|x: u32| async move { x * 2 }));
	let run = RunClock::new().next();

	start(&owner, &task, run, 21);
	owner.done.notified().await;

	assert_eq!(*owner.finished.lock(), vec![(run, Ok(42))]);
}

#[tokio::test]
async fn start_reports_panic_to_owner() {
	let owner = Arc::new(Recorder::default());
	let task = LatestRef::new(task_fn(|_: u32| async move {
		if true {
			panic!("run exploded");
		}
		0u32
	}));
	let run = RunClock::new().next();

	start(&owner, &task, run, 0);
	owner.done.notified().await;

	let finished = owner.finished.lock();
	assert_eq!(finished.len(), 1);
	assert!(matches!(&finished[0].1, Err(SettleError::Panicked(msg)) if msg.contains("run exploded")));
}

#[test]
fn dropped_guard_reports_dropped() {
	let owner = Arc::new(Recorder::default());
	let run = RunClock::new().next();
	drop(RunGuard::<u32, _>::new(Arc::clone(&owner), run));
	assert_eq!(*owner.finished.lock(), vec![(run, Err(SettleError::Dropped))]);
}

#[test]
fn finished_guard_reports_once() {
	let owner = Arc::new(Recorder::default());
	let run = RunClock::new().next();
	RunGuard::new(Arc::clone(&owner), run).finish(Ok(5));
	assert_eq!(*owner.finished.lock(), vec![(run, Ok(5))]);
}

#[tokio::test]
async fn start_reports_panic_while_building_future() {
	let owner = Arc::new(Recorder::default());
	let task = LatestRef::new(task_fn(|x: u32| {
		assert_ne!(x, 0, "zero is rejected");
		async move { x }
	}));
	let run = RunClock::new().next();

	start(&owner, &task, run, 0);

	let finished = owner.finished.lock();
	assert_eq!(finished.len(), 1, "a synchronous panic settles before start returns");
	assert!(matches!(&finished[0].1, Err(SettleError::Panicked(msg)) if msg.contains("zero is rejected")));
}

#[test]
fn spawns_on_fallback_runtime_outside_tokio() {
	let handle = spawn("test", async { std::thread::current().name().map(str::to_owned) });
	let name = futures::executor::block_on(handle).expect("task should complete");
	assert_eq!(name.as_deref(), Some(FALLBACK_THREAD_NAME));
}

#[tokio::test]
async fn spawns_on_ambient_runtime() {
	let caller = std::thread::current().id();
	let handle = spawn("test", async { std::thread::current().id() });
	assert_eq!(handle.await.unwrap(), caller);
}
