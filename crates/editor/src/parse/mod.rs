//! Parse coordinator.
//!
//! Keeps one document's analysis unit current in the background. A single
//! persistent worker thread per document does every slow engine call; the
//! owner thread only flips state, captures snapshots when the analysis lock
//! is free, and installs results.
//!
//! # Phases
//!
//! The coordinator state is one [`ParsePhase`] value held in a [`StateCell`],
//! so multi-field transitions are atomic and the worker can park on change
//! notifications instead of sleeping blindly.
//!
//! A normal reparse cycle moves `process` through
//! `Idle → Starting → Preprocessing → Processing → Postprocessing → Idle`:
//!
//! 1. Owner: [`ParseSession::soft_reparse`] resets `process` to `Idle` and,
//!    after the debounce interval, CASes it to `Starting`.
//! 2. Worker: CASes `Starting → Preprocessing` and posts a snapshot capture.
//! 3. Owner: if the analysis lock is free, stores a snapshot and CASes
//!    `Preprocessing → Processing`; otherwise reverts to `Starting`.
//! 4. Worker: reparses while holding the analysis lock, CASes
//!    `Processing → Postprocessing`, collects results and posts an install.
//! 5. Owner: CASes `Postprocessing → Idle` and publishes the results.
//!
//! Every CAS tolerates failure: a failed CAS means another actor preempted
//! the cycle and the stale work is dropped.
//!
//! A full reparse sets `state` to `Restarting`; the worker discards the
//! unit, builds a new one from the queued snapshot and rejoins the cycle at
//! `Postprocessing`.

mod worker;


use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use quire_primitives::{DocumentId, Snapshot};
use quire_worker::{Dispatcher, StateCell, TaggedGuard, TaggedMutex, TaskClass, ThreadGauge, TimerHandle, spawn_tracked_thread};
use tracing::{debug, trace, warn};

use self::worker::ParseWorker;
use crate::completion::ParseGate;
use crate::config::EditorConfig;
use crate::document::Document;
use crate::engine::{AnalysisUnit, DiagnosticCounts, ParseResults, SemanticEngine};
use crate::error::{EngineError, ViewError};
use crate::ui::{DiagnosticMark, MessageLevel, StatusUi};
use crate::view::DocumentView;

/// Status text shown while a parse is outstanding.
pub const PARSING_STATUS: &str = "parsing...";

/// Lock tags, visible through [`ParseSession::lock_holder`].
pub(crate) const SNAPSHOT_TAG: &str = "snapshot";
pub(crate) const PARSE_TAG: &str = "parse";
pub(crate) const REBUILD_TAG: &str = "rebuild";
pub(crate) const COMPLETION_TAG: &str = "completion";

/// Coarse coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseState {
	/// No unit has been requested yet.
	#[default]
	Idle,
	/// A unit exists and incremental reparses may run.
	Processing,
	/// A new unit is being built from scratch.
	Restarting,
	/// An engine call failed; only a full reparse leaves this state.
	Stopped,
}

/// Progress of the current incremental cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessState {
	#[default]
	Idle,
	Starting,
	Preprocessing,
	Processing,
	Postprocessing,
}

/// Combined coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParsePhase {
	pub state: ParseState,
	pub process: ProcessState,
}

impl ParsePhase {
	pub const fn new(state: ParseState, process: ProcessState) -> Self {
		Self { state, process }
	}

	const fn processing(process: ProcessState) -> Self {
		Self::new(ParseState::Processing, process)
	}
}

/// How a full reparse request was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullReparse {
	/// A rebuild was queued.
	Queued,
	/// A rebuild was already queued; its snapshot was replaced.
	Merged,
	/// The running rebuild already covers the current document version.
	Coalesced,
	/// A rebuild of an older version is running; retried shortly.
	Deferred,
	/// No unit was ever requested.
	Ignored,
}

/// State guarded by the analysis lock.
#[derive(Default)]
pub(crate) struct AnalysisSlot {
	pub(crate) unit: Option<Box<dyn AnalysisUnit>>,
	/// Snapshot captured by the owner for the next incremental reparse.
	pub(crate) pending: Option<Snapshot>,
}

#[derive(Debug, Default)]
struct RebuildSlot {
	queued: Option<Snapshot>,
	/// Version of the snapshot the worker is currently building from.
	running: Option<u64>,
}

/// Exclusive access to the analysis unit, held by a completion computation.
pub struct AnalysisGuard<'a> {
	guard: TaggedGuard<'a, AnalysisSlot>,
}

impl AnalysisGuard<'_> {
	pub fn unit(&mut self) -> Option<&mut dyn AnalysisUnit> {
		match &mut self.guard.unit {
			Some(unit) => Some(&mut **unit),
			None => None,
		}
	}

	pub fn tag(&self) -> &'static str {
		self.guard.tag()
	}
}

/// State shared between the owner, the parse worker and completion workers.
pub(crate) struct ParseShared {
	phase: StateCell<ParsePhase>,
	analysis: TaggedMutex<AnalysisSlot>,
	rebuild: Mutex<RebuildSlot>,
	parsed: AtomicBool,
	shutdown: AtomicBool,
}

impl ParseShared {
	fn new(initial: Snapshot) -> Self {
		Self {
			phase: StateCell::new(ParsePhase::new(ParseState::Restarting, ProcessState::Idle)),
			analysis: TaggedMutex::new(AnalysisSlot::default()),
			rebuild: Mutex::new(RebuildSlot {
				queued: Some(initial),
				running: None,
			}),
			parsed: AtomicBool::new(false),
			shutdown: AtomicBool::new(false),
		}
	}

	fn is_shutdown(&self) -> bool {
		self.shutdown.load(Ordering::Acquire)
	}
}

impl ParseGate for ParseShared {
	fn is_processing(&self) -> bool {
		self.phase.get().state == ParseState::Processing
	}

	fn stop_parse(&self) {
		self.phase.update(|phase| {
			if phase.state == ParseState::Processing {
				phase.process = ProcessState::Idle;
			}
		});
	}

	fn lock(&self) -> Option<AnalysisGuard<'_>> {
		Some(AnalysisGuard {
			guard: self.analysis.lock(COMPLETION_TAG),
		})
	}
}

#[derive(Debug, Clone, Copy)]
struct ParseTiming {
	debounce: Duration,
	full_retry: Duration,
}

/// Owner-side handle of a document's parse coordinator.
///
/// Lives on the owner thread inside a [`DocumentView`]. Dropping the session
/// stops and joins the worker.
pub struct ParseSession {
	name: String,
	shared: Arc<ParseShared>,
	dispatcher: Dispatcher<DocumentView>,
	timing: ParseTiming,
	worker: Option<JoinHandle<()>>,
	debounce: Option<TimerHandle>,
	full_retry: Option<TimerHandle>,
	results: ParseResults,
	soft_reparse_needed: bool,
	full_reparse_needed: bool,
}

impl ParseSession {
	/// Queues the initial build and starts the document's parse worker.
	pub(crate) fn spawn(
		document: DocumentId,
		name: String,
		initial: Snapshot,
		engine: Arc<dyn SemanticEngine>,
		dispatcher: Dispatcher<DocumentView>,
		config: &EditorConfig,
		gauge: &ThreadGauge,
	) -> Result<Self, ViewError> {
		let shared = Arc::new(ParseShared::new(initial));
		let worker = ParseWorker::new(document, Arc::clone(&shared), engine, dispatcher.clone(), config.worker_poll());
		let handle = spawn_tracked_thread(TaskClass::CpuBlocking, format!("quire-parse-{}", document.0), gauge, move || worker.run())
			.map_err(|error| ViewError::Spawn { worker: "parse", error })?;
		debug!(%document, name = %name, "parse.session.spawned");

		Ok(Self {
			name,
			shared,
			dispatcher,
			timing: ParseTiming {
				debounce: config.reparse_debounce(),
				full_retry: config.full_reparse_retry(),
			},
			worker: Some(handle),
			debounce: None,
			full_retry: None,
			results: ParseResults::default(),
			soft_reparse_needed: false,
			full_reparse_needed: false,
		})
	}

	pub fn phase(&self) -> ParsePhase {
		self.shared.phase.get()
	}

	pub fn state(&self) -> ParseState {
		self.phase().state
	}

	pub fn process_state(&self) -> ProcessState {
		self.phase().process
	}

	/// True once the latest requested parse has been installed.
	pub fn parsed(&self) -> bool {
		self.shared.parsed.load(Ordering::Acquire)
	}

	/// Results of the last installed cycle.
	pub fn results(&self) -> &ParseResults {
		&self.results
	}

	/// Tag of the current analysis lock holder, if any.
	pub fn lock_holder(&self) -> Option<&'static str> {
		self.shared.analysis.holder()
	}

	/// Thread-safe reader of the lock holder, for instrumented engines.
	#[cfg(test)]
	pub(crate) fn holder_probe(&self) -> impl Fn() -> Option<&'static str> + Send + Sync + 'static {
		let shared = Arc::clone(&self.shared);
		move || shared.analysis.holder()
	}

	pub fn soft_reparse_needed(&self) -> bool {
		self.soft_reparse_needed
	}

	pub fn full_reparse_needed(&self) -> bool {
		self.full_reparse_needed
	}

	pub fn mark_soft_reparse_needed(&mut self) {
		self.soft_reparse_needed = true;
	}

	pub fn mark_full_reparse_needed(&mut self) {
		self.full_reparse_needed = true;
	}

	pub(crate) fn gate(&self) -> Arc<dyn ParseGate> {
		Arc::clone(&self.shared) as Arc<dyn ParseGate>
	}

	/// Requests an incremental reparse, optionally after the debounce
	/// interval. Each call restarts the interval.
	pub fn soft_reparse(&mut self, delayed: bool, status: &mut dyn StatusUi) {
		self.soft_reparse_needed = false;
		self.shared.parsed.store(false, Ordering::Release);
		self.cancel_pending_reparse();

		let processing = self.shared.phase.update(|phase| {
			if phase.state != ParseState::Processing {
				return false;
			}
			phase.process = ProcessState::Idle;
			true
		});
		if !processing {
			return;
		}

		if !delayed {
			self.start_cycle(status);
			return;
		}
		match self.dispatcher.post_after(self.timing.debounce, |view| view.start_parse_cycle()) {
			Ok(timer) => self.debounce = Some(timer),
			Err(_) => trace!(name = %self.name, "parse.debounce.closed"),
		}
	}

	/// Cancels a debounced reparse that has not fired yet.
	pub fn cancel_pending_reparse(&mut self) {
		if let Some(timer) = self.debounce.take() {
			timer.cancel();
		}
	}

	pub(crate) fn start_cycle(&mut self, status: &mut dyn StatusUi) {
		self.debounce = None;
		self.shared.parsed.store(false, Ordering::Release);
		if self
			.shared
			.phase
			.compare_exchange(ParsePhase::processing(ProcessState::Idle), ParsePhase::processing(ProcessState::Starting))
			.is_ok()
		{
			trace!(name = %self.name, "parse.cycle.requested");
			status.update_status(PARSING_STATUS);
		}
	}

	/// Discards the unit and rebuilds it from `snapshot`.
	///
	/// Back-to-back requests collapse into one rebuild: a queued rebuild has
	/// its snapshot replaced, and a running rebuild that already covers the
	/// snapshot's version absorbs the request.
	pub fn full_reparse(&mut self, snapshot: Snapshot, status: &mut dyn StatusUi) -> FullReparse {
		self.soft_reparse_needed = false;
		self.shared.parsed.store(false, Ordering::Release);
		self.cancel_pending_reparse();
		if let Some(timer) = self.full_retry.take() {
			timer.cancel();
		}

		let outcome = match self.state() {
			ParseState::Idle => FullReparse::Ignored,
			ParseState::Restarting => {
				let mut rebuild = self.shared.rebuild.lock();
				if rebuild.queued.is_some() {
					rebuild.queued = Some(snapshot);
					FullReparse::Merged
				} else if rebuild.running.is_some_and(|version| version >= snapshot.version()) {
					FullReparse::Coalesced
				} else {
					drop(rebuild);
					self.schedule_full_retry();
					FullReparse::Deferred
				}
			}
			ParseState::Processing | ParseState::Stopped => {
				self.full_reparse_needed = false;
				self.shared.rebuild.lock().queued = Some(snapshot);
				self.shared.phase.set(ParsePhase::new(ParseState::Restarting, ProcessState::Idle));
				status.hide_tooltips();
				status.update_status(PARSING_STATUS);
				FullReparse::Queued
			}
		};
		debug!(name = %self.name, ?outcome, "parse.full_reparse");
		outcome
	}

	fn schedule_full_retry(&mut self) {
		match self.dispatcher.post_after(self.timing.full_retry, |view| {
			view.full_reparse();
		}) {
			Ok(timer) => self.full_retry = Some(timer),
			Err(_) => trace!(name = %self.name, "parse.full_retry.closed"),
		}
	}

	/// Owner half of step 3: snapshot the document if the lock is free.
	pub(crate) fn capture(&mut self, document: &dyn Document) {
		let preprocessing = ParsePhase::processing(ProcessState::Preprocessing);
		{
			let Some(mut slot) = self.shared.analysis.try_lock(SNAPSHOT_TAG) else {
				trace!(name = %self.name, "parse.snapshot.busy");
				let _ = self.shared.phase.compare_exchange(preprocessing, ParsePhase::processing(ProcessState::Starting));
				return;
			};
			slot.pending = Some(document.snapshot());
		}
		if self.shared.phase.compare_exchange(preprocessing, ParsePhase::processing(ProcessState::Processing)).is_err() {
			trace!(name = %self.name, "parse.snapshot.preempted");
		}
	}

	/// Publishes results posted by the worker. Returns false when the cycle
	/// was preempted after the worker finished.
	pub(crate) fn install(&mut self, results: ParseResults, status: &mut dyn StatusUi) -> bool {
		if self
			.shared
			.phase
			.compare_exchange(ParsePhase::processing(ProcessState::Postprocessing), ParsePhase::processing(ProcessState::Idle))
			.is_err()
		{
			trace!(name = %self.name, "parse.install.stale");
			return false;
		}

		status.update_syntax(&results.tokens);
		status.set_diagnostics(diagnostic_marks(&results.diagnostics));
		status.update_diagnostic_counts(results.counts());
		self.results = results;
		self.shared.parsed.store(true, Ordering::Release);
		status.update_status("");
		debug!(name = %self.name, tokens = self.results.tokens.len(), diagnostics = self.results.diagnostics.len(), "parse.installed");
		true
	}

	/// Surfaces an engine failure reported by the worker.
	pub(crate) fn report_failure(&mut self, error: &EngineError, status: &mut dyn StatusUi) {
		status.message(MessageLevel::Error, &format!("failed to reparse {}: {error}", self.name));
		status.update_status("");
		status.update_diagnostic_counts(DiagnosticCounts::default());
	}

	/// Stops the worker and waits for it to exit.
	pub(crate) fn shutdown(&mut self) {
		self.cancel_pending_reparse();
		if let Some(timer) = self.full_retry.take() {
			timer.cancel();
		}
		let Some(handle) = self.worker.take() else {
			return;
		};
		self.shared.shutdown.store(true, Ordering::Release);
		self.shared.phase.update(|phase| phase.state = ParseState::Stopped);
		if handle.join().is_err() {
			warn!(name = %self.name, "parse.worker.panicked");
		}
		debug!(name = %self.name, "parse.session.shutdown");
	}
}

impl Drop for ParseSession {
	fn drop(&mut self) {
		self.shutdown();
	}
}

impl std::fmt::Debug for ParseSession {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ParseSession")
			.field("name", &self.name)
			.field("phase", &self.phase())
			.field("parsed", &self.parsed())
			.finish_non_exhaustive()
	}
}

fn diagnostic_marks(diagnostics: &Arc<[crate::engine::Diagnostic]>) -> Vec<DiagnosticMark> {
	(0..diagnostics.len())
		.map(|idx| {
			let all = Arc::clone(diagnostics);
			let diagnostic = &diagnostics[idx];
			DiagnosticMark {
				range: diagnostic.range,
				severity: diagnostic.severity,
				tooltip: Box::new(move || format!("{}: {}", all[idx].severity, all[idx].message)),
			}
		})
		.collect()
}
