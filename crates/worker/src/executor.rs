//! Persistent background thread that runs submitted jobs one at a time.
//!
//! A [`SerialExecutor`] keeps a single named thread alive for the lifetime of
//! its owner instead of spawning a thread per request. Jobs run in
//! submission order, so two jobs from the same executor never overlap.
//!
//! Caller tracing spans are captured at submit time and entered on the worker
//! thread, so events emitted by a job nest under the span that queued it.
//!
//! Dropping the handle (or calling [`SerialExecutor::shutdown`]) sends a
//! `Shutdown` job behind the queued work and joins the thread. A job that panics is logged and discarded; the thread keeps serving.

use std::panic::AssertUnwindSafe;
use std::thread::JoinHandle;

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use thiserror::Error;

use crate::class::TaskClass;
use crate::gauge::ThreadGauge;
use crate::spawn::spawn_tracked_thread;

type Task = Box<dyn FnOnce() + Send + 'static>;

enum Job {
	Run { task: Task, span: tracing::Span },
	Shutdown,
}

/// Submitting to an executor that already shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExecutorError {
	#[error("executor `{0}` is shut down")]
	Closed(&'static str),
}

/// Handle to a persistent worker thread that runs jobs sequentially.
pub struct SerialExecutor {
	name: &'static str,
	tx: Sender<Job>,
	/// Taken by the first shutdown.
	thread: Mutex<Option<JoinHandle<()>>>,
}

impl SerialExecutor {
	/// Spawns the worker thread, counting it against `gauge` while it lives.
	pub fn spawn(class: TaskClass, name: &'static str, gauge: &ThreadGauge) -> std::io::Result<Self> {
		let (tx, rx) = crossbeam_channel::unbounded::<Job>();
		let handle = spawn_tracked_thread(class, name, gauge, move || {
			while let Ok(job) = rx.recv() {
				match job {
					Job::Run { task, span } => {
						let _guard = span.enter();
						if std::panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
							tracing::error!(executor = name, "executor.job_panicked");
						}
					}
					Job::Shutdown => break,
				}
			}
			tracing::trace!(executor = name, "executor.exit");
		})?;

		Ok(Self {
			name,
			tx,
			thread: Mutex::new(Some(handle)),
		})
	}

	pub fn name(&self) -> &'static str {
		self.name
	}

	/// Queues `task` behind every job already submitted.
	pub fn submit(&self, task: impl FnOnce() + Send + 'static) -> Result<(), ExecutorError> {
		self.tx
			.send(Job::Run {
				task: Box::new(task),
				span: tracing::Span::current(),
			})
			.map_err(|_| ExecutorError::Closed(self.name))
	}

	/// Stops accepting work after the queued jobs and joins the thread.
	///
	/// Idempotent.
	pub fn shutdown(&self) {
		let Some(handle) = self.thread.lock().take() else {
			return;
		};
		let _ = self.tx.send(Job::Shutdown);
		if handle.join().is_err() {
			tracing::error!(executor = self.name, "executor.join_failed");
		}
	}
}

impl std::fmt::Debug for SerialExecutor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SerialExecutor")
			.field("name", &self.name)
			.field("queued", &self.tx.len())
			.field("running", &self.thread.lock().is_some())
			.finish()
	}
}

impl Drop for SerialExecutor {
	fn drop(&mut self) {
		self.shutdown();
	}
}
