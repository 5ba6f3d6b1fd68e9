#![cfg_attr(test, allow(unused_crate_dependencies))]
//! Threading primitives for the editing core.
//!
//! Everything here is synchronous and built on OS threads:
//!
//! * [`Dispatcher`] / [`OwnerLoop`]: FIFO hand-off of closures to the single
//!   thread that owns UI state, plus cancellable timers.
//! * [`SerialExecutor`]: a persistent named thread running jobs in order.
//! * [`TaggedMutex`]: a mutex that remembers which subsystem holds it.
//! * [`StateCell`]: a small state machine slot with compare-and-swap and
//!   condition waits.
//! * [`ThreadGauge`]: live/peak counters for spawned workers.

mod class;
mod dispatcher;
mod executor;
mod gauge;
mod lock;
mod spawn;
mod state;

pub use class::TaskClass;
pub use dispatcher::{DispatchError, Dispatcher, Job, OwnerLoop, PumpReport, TimerHandle, channel};
pub use executor::{ExecutorError, SerialExecutor};
pub use gauge::{GaugeGuard, ThreadGauge};
pub use lock::{TaggedGuard, TaggedMutex};
pub use spawn::{spawn_named_thread, spawn_tracked_thread};
pub use state::StateCell;
