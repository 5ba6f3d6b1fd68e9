//! The persistent per-document parse worker.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};

use quire_primitives::DocumentId;
use quire_worker::Dispatcher;
use tracing::{debug, trace, warn};

use super::{PARSE_TAG, ParsePhase, ParseShared, ParseState, ProcessState, REBUILD_TAG};
use crate::engine::{ParseResults, SemanticEngine};
use crate::error::EngineError;
use crate::view::DocumentView;

pub(super) struct ParseWorker {
	document: DocumentId,
	shared: Arc<ParseShared>,
	engine: Arc<dyn SemanticEngine>,
	dispatcher: Dispatcher<DocumentView>,
	poll: Duration,
	last_snapshot_request: Option<Instant>,
}

impl ParseWorker {
	pub(super) fn new(
		document: DocumentId,
		shared: Arc<ParseShared>,
		engine: Arc<dyn SemanticEngine>,
		dispatcher: Dispatcher<DocumentView>,
		poll: Duration,
	) -> Self {
		Self {
			document,
			shared,
			engine,
			dispatcher,
			poll,
			last_snapshot_request: None,
		}
	}

	/// Runs until the session shuts down.
	///
	/// Each pass performs at most one step for the phase it observed, then
	/// parks until the phase changes or the poll interval elapses.
	pub(super) fn run(mut self) {
		debug!(document = %self.document, "parse.worker.start");
		while !self.shared.is_shutdown() {
			let observed = self.shared.phase.get();
			match (observed.state, observed.process) {
				(ParseState::Restarting, _) => self.rebuild(),
				(ParseState::Processing, ProcessState::Starting) => self.request_snapshot(),
				(ParseState::Processing, ProcessState::Processing) => self.reparse(),
				_ => {}
			}
			let shared = &self.shared;
			shared.phase.wait_until(self.poll, |phase| *phase != observed || shared.is_shutdown());
		}
		debug!(document = %self.document, "parse.worker.exit");
	}

	fn request_snapshot(&mut self) {
		// The owner reverts to Starting when the lock is busy; pace retries.
		if self.last_snapshot_request.is_some_and(|at| at.elapsed() < self.poll) {
			return;
		}
		let started = self
			.shared
			.phase
			.compare_exchange(ParsePhase::processing(ProcessState::Starting), ParsePhase::processing(ProcessState::Preprocessing));
		if started.is_err() {
			return;
		}
		self.last_snapshot_request = Some(Instant::now());
		trace!(document = %self.document, "parse.cycle.preprocess");
		if self.dispatcher.post(|view| view.capture_parse_snapshot()).is_err() {
			trace!(document = %self.document, "parse.worker.owner_gone");
		}
	}

	fn reparse(&mut self) {
		let Some(mut slot) = self.shared.analysis.try_lock(PARSE_TAG) else {
			return;
		};
		if self.shared.phase.get() != ParsePhase::processing(ProcessState::Processing) {
			return;
		}
		let Some(snapshot) = slot.pending.take() else {
			return;
		};
		if slot.unit.is_none() {
			drop(slot);
			self.fail(EngineError::Internal("no analysis unit to reparse".into()));
			return;
		}
		let Some(unit) = slot.unit.as_mut() else {
			return;
		};

		let started = Instant::now();
		let result = catch_unwind(AssertUnwindSafe(|| unit.reparse(&snapshot))).unwrap_or(Err(EngineError::Panicked));
		if let Err(error) = result {
			drop(slot);
			self.fail(error);
			return;
		}

		let finished = self
			.shared
			.phase
			.compare_exchange(ParsePhase::processing(ProcessState::Processing), ParsePhase::processing(ProcessState::Postprocessing));
		if finished.is_err() {
			trace!(document = %self.document, version = snapshot.version(), "parse.cycle.preempted");
			return;
		}
		let results = ParseResults::collect(&**unit);
		drop(slot);
		trace!(
			document = %self.document,
			version = snapshot.version(),
			elapsed_ms = started.elapsed().as_millis() as u64,
			"parse.cycle.done"
		);
		self.post_install(results);
	}

	fn rebuild(&mut self) {
		let snapshot = {
			let mut rebuild = self.shared.rebuild.lock();
			let Some(snapshot) = rebuild.queued.take() else {
				return;
			};
			rebuild.running = Some(snapshot.version());
			snapshot
		};
		debug!(document = %self.document, version = snapshot.version(), "parse.rebuild.start");

		let started = Instant::now();
		let outcome = {
			let mut slot = self.shared.analysis.lock(REBUILD_TAG);
			slot.unit = None;
			slot.pending = None;
			let engine = &self.engine;
			match catch_unwind(AssertUnwindSafe(|| engine.create_unit(&snapshot))).unwrap_or(Err(EngineError::Panicked)) {
				Ok(unit) => {
					let results = ParseResults::collect(&*unit);
					slot.unit = Some(unit);
					Ok(results)
				}
				Err(error) => Err(error),
			}
		};
		self.shared.rebuild.lock().running = None;

		match outcome {
			Ok(results) => {
				debug!(
					document = %self.document,
					version = snapshot.version(),
					elapsed_ms = started.elapsed().as_millis() as u64,
					"parse.rebuild.done"
				);
				let shared = &self.shared;
				let installing = shared.phase.update(|phase| {
					// Another request landed while building; the loop rebuilds again.
					if shared.rebuild.lock().queued.is_some() {
						return false;
					}
					*phase = ParsePhase::processing(ProcessState::Postprocessing);
					true
				});
				if installing {
					self.post_install(results);
				}
			}
			Err(error) => self.fail(error),
		}
	}

	fn post_install(&self, results: ParseResults) {
		if self.dispatcher.post(move |view| view.install_parse(results)).is_err() {
			trace!(document = %self.document, "parse.worker.owner_gone");
		}
	}

	/// Stops the session and reports `error`, unless the owner queued a
	/// rebuild meanwhile: that rebuild replaces the failed unit.
	fn fail(&self, error: EngineError) {
		let shared = &self.shared;
		let stopped = shared.phase.update(|phase| {
			if phase.state == ParseState::Restarting && shared.rebuild.lock().queued.is_some() {
				return false;
			}
			*phase = ParsePhase::new(ParseState::Stopped, ProcessState::Idle);
			true
		});
		if !stopped {
			debug!(document = %self.document, %error, "parse.failed.superseded");
			return;
		}
		warn!(document = %self.document, %error, "parse.failed");
		if self.dispatcher.post(move |view| view.fail_parse(error)).is_err() {
			trace!(document = %self.document, "parse.worker.owner_gone");
		}
	}
}
