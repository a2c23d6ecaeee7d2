//! Call-coalescing wrappers for asynchronous operations.
//!
//! This crate wraps a user-supplied async function so that at most one
//! execution is in flight per wrapper, and defines what happens to calls that
//! arrive while one is running:
//! * `LatestWinsCoalescer`: queues one follow-up run with the most recent
//!   arguments; every caller of that busy window resolves to its outcome
//! * `IgnoreWhileBusyCoalescer`: hands busy callers the in-flight operation
//!   and drops their arguments
//! * `CoalescerRegistry`: get-or-create one wrapper per owner key so repeated
//!   construction keeps the same state
//! * `LatestRef`: single-slot holder so runs always call the newest function

#![warn(missing_docs)]

mod ignore_busy;
mod latest;
mod latest_wins;
mod operation;
mod registry;
mod run;
mod task;
mod token;

pub use ignore_busy::IgnoreWhileBusyCoalescer;
pub use latest::LatestRef;
pub use latest_wins::LatestWinsCoalescer;
pub use operation::{Operation, SettleError};
pub use registry::CoalescerRegistry;
pub use task::{Coalesce, TaskFn, task_fn};

#[cfg(test)]
mod test_support;
