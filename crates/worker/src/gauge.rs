use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

#[derive(Debug, Default)]
struct GaugeInner {
	live: AtomicUsize,
	peak: AtomicUsize,
	spawned: AtomicU64,
}

/// Counts live worker threads of one owner and remembers the high-water mark.
#[derive(Debug, Default, Clone)]
pub struct ThreadGauge {
	inner: Arc<GaugeInner>,
}

impl ThreadGauge {
	pub fn new() -> Self {
		Self::default()
	}

	/// Marks one thread as live until the returned guard is dropped.
	pub fn enter(&self) -> GaugeGuard {
		let live = self.inner.live.fetch_add(1, Ordering::AcqRel) + 1;
		self.inner.peak.fetch_max(live, Ordering::AcqRel);
		self.inner.spawned.fetch_add(1, Ordering::Relaxed);
		GaugeGuard {
			inner: Arc::clone(&self.inner),
		}
	}

	/// Threads currently live.
	pub fn live(&self) -> usize {
		self.inner.live.load(Ordering::Acquire)
	}

	/// Highest number of simultaneously live threads observed.
	pub fn peak(&self) -> usize {
		self.inner.peak.load(Ordering::Acquire)
	}

	/// Threads ever started.
	pub fn spawned(&self) -> u64 {
		self.inner.spawned.load(Ordering::Relaxed)
	}
}

/// Keeps one thread counted as live.
#[derive(Debug)]
pub struct GaugeGuard {
	inner: Arc<GaugeInner>,
}

impl Drop for GaugeGuard {
	fn drop(&mut self) {
		self.inner.live.fetch_sub(1, Ordering::AcqRel);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{TaskClass, spawn_tracked_thread};

	#[test]
	fn peak_tracks_overlap() {
		let gauge = ThreadGauge::new();
		let a = gauge.enter();
		let b = gauge.enter();
		drop(a);
		let c = gauge.enter();
		assert_eq!(gauge.live(), 2);
		assert_eq!(gauge.peak(), 2);
		drop((b, c));
		assert_eq!(gauge.live(), 0);
		assert_eq!(gauge.spawned(), 3);
	}

	#[test]
	fn join_observes_decrement() {
		let gauge = ThreadGauge::new();
		let handle = spawn_tracked_thread(TaskClass::CpuBlocking, "gauge-test", &gauge, || 7).unwrap();
		assert_eq!(handle.join().unwrap(), 7);
		assert_eq!(gauge.live(), 0);
		assert_eq!(gauge.peak(), 1);
	}
}
