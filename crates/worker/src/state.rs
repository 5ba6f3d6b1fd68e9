//! State shared between an owner thread and one background worker.

use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// A small state value with change notification.
///
/// Every mutation wakes waiters, so a worker can park in [`Self::wait_until`]
/// instead of spinning on the value.
pub struct StateCell<S> {
	value: Mutex<S>,
	changed: Condvar,
}

impl<S: Copy + PartialEq + fmt::Debug> StateCell<S> {
	pub fn new(value: S) -> Self {
		Self {
			value: Mutex::new(value),
			changed: Condvar::new(),
		}
	}

	pub fn get(&self) -> S {
		*self.value.lock()
	}

	/// Replaces the value and returns the previous one.
	pub fn set(&self, value: S) -> S {
		let prev = std::mem::replace(&mut *self.value.lock(), value);
		self.changed.notify_all();
		prev
	}

	/// Sets `new` only if the value equals `current`.
	///
	/// Returns the value observed before the attempt on both paths, like
	/// `AtomicU8::compare_exchange`.
	pub fn compare_exchange(&self, current: S, new: S) -> Result<S, S> {
		let mut value = self.value.lock();
		if *value != current {
			return Err(*value);
		}
		*value = new;
		drop(value);
		self.changed.notify_all();
		Ok(current)
	}

	/// Mutates the value in place and wakes waiters.
	pub fn update<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
		let result = f(&mut self.value.lock());
		self.changed.notify_all();
		result
	}

	/// Wakes waiters without changing the value.
	pub fn notify(&self) {
		self.changed.notify_all();
	}

	/// Parks until `ready` holds or `timeout` elapses; returns the last value seen.
	pub fn wait_until(&self, timeout: Duration, mut ready: impl FnMut(&S) -> bool) -> S {
		let deadline = Instant::now() + timeout;
		let mut value = self.value.lock();
		while !ready(&value) {
			if self.changed.wait_until(&mut value, deadline).timed_out() {
				break;
			}
		}
		*value
	}
}

impl<S: Copy + PartialEq + fmt::Debug + Default> Default for StateCell<S> {
	fn default() -> Self {
		Self::new(S::default())
	}
}

impl<S: Copy + PartialEq + fmt::Debug> fmt::Debug for StateCell<S> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("StateCell").field(&self.get()).finish()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use super::*;

	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	enum Phase {
		Idle,
		Busy,
		Done,
	}

	#[test]
	fn compare_exchange_reports_observed_value() {
		let cell = StateCell::new(Phase::Idle);
		assert_eq!(cell.compare_exchange(Phase::Busy, Phase::Done), Err(Phase::Idle));
		assert_eq!(cell.compare_exchange(Phase::Idle, Phase::Busy), Ok(Phase::Idle));
		assert_eq!(cell.get(), Phase::Busy);
	}

	#[test]
	fn waiter_wakes_on_change() {
		let cell = Arc::new(StateCell::new(Phase::Idle));
		let waiter = {
			let cell = Arc::clone(&cell);
			std::thread::spawn(move || cell.wait_until(Duration::from_secs(5), |p| *p == Phase::Done))
		};
		cell.set(Phase::Busy);
		cell.set(Phase::Done);
		assert_eq!(waiter.join().unwrap(), Phase::Done);
	}

	#[test]
	fn wait_times_out() {
		let cell = StateCell::new(Phase::Idle);
		let start = Instant::now();
		assert_eq!(cell.wait_until(Duration::from_millis(15), |p| *p == Phase::Done), Phase::Idle);
		assert!(start.elapsed() >= Duration::from_millis(15));
	}
}
