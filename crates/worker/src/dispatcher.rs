//! Cross-thread job queue drained by a single owner thread.
//!
//! Background workers never touch owner state directly. They post closures
//! through a [`Dispatcher`]; the owner thread drains them in its
//! [`OwnerLoop`] and hands each one exclusive access to the owner context
//! `C`. Because `C` never crosses threads, it does not need to be `Send`.
//!
//! ```text
//! worker thread ─┐
//!                ├──► Dispatcher::post ──► OwnerLoop::pump(&mut C) ──► job(&mut C)
//! worker thread ─┘
//! ```
//!
//! Timers ride on the same queue: [`Dispatcher::post_after`] schedules a job
//! for later and returns a [`TimerHandle`] that can cancel it. Jobs run in
//! FIFO order per dispatcher; timers run in deadline order once due.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use thiserror::Error;

/// A unit of work for the owner thread.
pub type Job<C> = Box<dyn FnOnce(&mut C) + Send + 'static>;

/// Posting failed because the owner loop is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DispatchError {
	#[error("owner loop closed")]
	Closed,
}

enum Envelope<C> {
	Job(Job<C>),
	Timer { deadline: Instant, handle: TimerHandle, job: Job<C> },
}

/// Cancels a job scheduled with [`Dispatcher::post_after`].
#[derive(Debug, Clone, Default)]
pub struct TimerHandle {
	cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
	/// Prevents the timer from firing. Cancelling a fired timer is a no-op.
	pub fn cancel(&self) {
		self.cancelled.store(true, Ordering::Release);
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancelled.load(Ordering::Acquire)
	}
}

/// Cloneable producer side; safe to use from any thread.
pub struct Dispatcher<C> {
	tx: Sender<Envelope<C>>,
}

impl<C> Clone for Dispatcher<C> {
	fn clone(&self) -> Self {
		Self { tx: self.tx.clone() }
	}
}

impl<C> std::fmt::Debug for Dispatcher<C> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Dispatcher").field("queued", &self.tx.len()).finish()
	}
}

impl<C: 'static> Dispatcher<C> {
	/// Queues `job` to run on the owner thread.
	pub fn post(&self, job: impl FnOnce(&mut C) + Send + 'static) -> Result<(), DispatchError> {
		tracing::trace!(queued = self.tx.len(), "dispatch.post");
		self.tx.send(Envelope::Job(Box::new(job))).map_err(|_| DispatchError::Closed)
	}

	/// Queues `job` to run on the owner thread once `delay` has elapsed.
	pub fn post_after(&self, delay: Duration, job: impl FnOnce(&mut C) + Send + 'static) -> Result<TimerHandle, DispatchError> {
		let handle = TimerHandle::default();
		tracing::trace!(delay_ms = delay.as_millis() as u64, "dispatch.post_after");
		self.tx
			.send(Envelope::Timer {
				deadline: Instant::now() + delay,
				handle: handle.clone(),
				job: Box::new(job),
			})
			.map_err(|_| DispatchError::Closed)?;
		Ok(handle)
	}
}

struct PendingTimer<C> {
	deadline: Instant,
	seq: u64,
	handle: TimerHandle,
	job: Job<C>,
}

impl<C> PartialEq for PendingTimer<C> {
	fn eq(&self, other: &Self) -> bool {
		self.deadline == other.deadline && self.seq == other.seq
	}
}

impl<C> Eq for PendingTimer<C> {}

impl<C> PartialOrd for PendingTimer<C> {
	fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
		Some(self.cmp(other))
	}
}

impl<C> Ord for PendingTimer<C> {
	// Reversed so the max-heap yields the earliest deadline first.
	fn cmp(&self, other: &Self) -> CmpOrdering {
		other.deadline.cmp(&self.deadline).then_with(|| other.seq.cmp(&self.seq))
	}
}

/// Outcome of one [`OwnerLoop::pump`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpReport {
	/// Posted jobs executed.
	pub jobs: usize,
	/// Timer jobs executed.
	pub timers: usize,
	/// Cancelled timers discarded.
	pub cancelled: usize,
}

impl PumpReport {
	pub fn ran(&self) -> usize {
		self.jobs + self.timers
	}
}

/// Consumer side, owned by the owner thread.
pub struct OwnerLoop<C> {
	rx: Receiver<Envelope<C>>,
	tx: Sender<Envelope<C>>,
	timers: BinaryHeap<PendingTimer<C>>,
	seq: u64,
	owner: Option<ThreadId>,
}

/// Creates a connected dispatcher and owner loop.
pub fn channel<C: 'static>() -> (Dispatcher<C>, OwnerLoop<C>) {
	let (tx, rx) = crossbeam_channel::unbounded();
	let dispatcher = Dispatcher { tx: tx.clone() };
	let owner_loop = OwnerLoop {
		rx,
		tx,
		timers: BinaryHeap::new(),
		seq: 0,
		owner: None,
	};
	(dispatcher, owner_loop)
}

impl<C: 'static> OwnerLoop<C> {
	/// Another producer handle for this loop.
	pub fn dispatcher(&self) -> Dispatcher<C> {
		Dispatcher { tx: self.tx.clone() }
	}

	/// Jobs posted but not yet drained.
	pub fn queued(&self) -> usize {
		self.rx.len()
	}

	/// Timers accepted by the loop and not yet fired or discarded.
	pub fn pending_timers(&self) -> usize {
		self.timers.iter().filter(|t| !t.handle.is_cancelled()).count()
	}

	/// Earliest deadline among live timers.
	pub fn next_deadline(&self) -> Option<Instant> {
		self.timers.iter().filter(|t| !t.handle.is_cancelled()).map(|t| t.deadline).min()
	}

	/// Runs everything that is ready now without waiting.
	pub fn run_pending(&mut self, ctx: &mut C) -> PumpReport {
		self.pump(ctx, Duration::ZERO)
	}

	/// Waits up to `wait` for work, then runs every queued job and every due timer.
	///
	/// Jobs posted while the batch runs are left for the next pump so a job
	/// that re-posts itself cannot starve the caller.
	pub fn pump(&mut self, ctx: &mut C, wait: Duration) -> PumpReport {
		self.assert_owner();
		let first = self.wait_for_work(wait);

		let mut report = PumpReport::default();
		let batch = self.rx.len();
		let drained = (0..batch).map_while(|_| self.rx.try_recv().ok()).collect::<Vec<_>>();
		for envelope in first.into_iter().chain(drained) {
			match envelope {
				Envelope::Job(job) => {
					job(ctx);
					report.jobs += 1;
				}
				Envelope::Timer { deadline, handle, job } => self.schedule(deadline, handle, job),
			}
		}

		let now = Instant::now();
		while self.timers.peek().is_some_and(|t| t.deadline <= now) {
			let Some(timer) = self.timers.pop() else {
				break;
			};
			if timer.handle.is_cancelled() {
				report.cancelled += 1;
				continue;
			}
			timer.handle.cancel();
			(timer.job)(ctx);
			report.timers += 1;
		}

		if report.ran() > 0 {
			tracing::trace!(jobs = report.jobs, timers = report.timers, "dispatch.pump");
		}
		report
	}

	/// Pumps until `done` holds for the context or `timeout` elapses.
	///
	/// Returns whether `done` was satisfied.
	pub fn run_until(&mut self, ctx: &mut C, timeout: Duration, mut done: impl FnMut(&C) -> bool) -> bool {
		let deadline = Instant::now() + timeout;
		loop {
			if done(ctx) {
				return true;
			}
			let now = Instant::now();
			if now >= deadline {
				return false;
			}
			self.pump(ctx, (deadline - now).min(Duration::from_millis(5)));
		}
	}

	/// Pumps for `duration`, regardless of what runs.
	pub fn run_for(&mut self, ctx: &mut C, duration: Duration) {
		self.run_until(ctx, duration, |_| false);
	}

	fn schedule(&mut self, deadline: Instant, handle: TimerHandle, job: Job<C>) {
		self.seq += 1;
		self.timers.push(PendingTimer {
			deadline,
			seq: self.seq,
			handle,
			job,
		});
	}

	/// Blocks until a message arrives, a timer falls due, or `wait` elapses.
	///
	/// A received message is returned so it runs ahead of the rest of the batch.
	fn wait_for_work(&mut self, wait: Duration) -> Option<Envelope<C>> {
		if wait.is_zero() || !self.rx.is_empty() {
			return None;
		}
		let now = Instant::now();
		let mut wake_at = now + wait;
		if let Some(deadline) = self.next_deadline() {
			if deadline <= now {
				return None;
			}
			wake_at = wake_at.min(deadline);
		}
		match self.rx.recv_deadline(wake_at) {
			Ok(envelope) => Some(envelope),
			Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
		}
	}

	fn assert_owner(&mut self) {
		let current = thread::current().id();
		let owner = *self.owner.get_or_insert(current);
		debug_assert_eq!(owner, current, "owner loop pumped from a foreign thread");
	}
}
