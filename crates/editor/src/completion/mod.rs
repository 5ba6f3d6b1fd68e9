//! Autocomplete coordinator.
//!
//! Decides from keystrokes when to start a completion, computes candidate
//! rows on a persistent background thread, and hands them to the owner
//! thread for display. At most one computation is outstanding per view.
//!
//! # State machine
//!
//! | From         | Event                           | To           |
//! |--------------|---------------------------------|--------------|
//! | `Idle`       | `run()` passes its checks       | `Starting`   |
//! | `Starting`   | `run()` again                   | `Restarting` |
//! | `Starting`   | `stop()`                        | `Canceled`   |
//! | `Restarting` | `stop()`                        | `Canceled`   |
//! | `Canceled`   | `run()` while still in flight   | `Restarting` |
//! | `Restarting` | computation finishes            | `Idle`, then `run()` |
//! | `Canceled`   | computation finishes            | `Idle`       |
//! | `Starting`   | rows shown or none found        | `Idle`       |
//!
//! While a computation is outstanding the parse coordinator is told to stop
//! its cycle and the computation holds the analysis lock, so the unit is
//! never used by both at once.

mod dictionary;
mod prefix;
mod provider;
mod semantic;


use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use quire_primitives::CharIdx;
use quire_worker::{Dispatcher, SerialExecutor, TaskClass, ThreadGauge};
use tracing::{debug, trace, warn};

pub use self::dictionary::{DictionaryCompletion, SnippetEntry};
pub use self::prefix::PrefixBuffer;
pub use self::provider::{CompletionProvider, CompletionRequest, CompletionRow, Insert};
pub use self::semantic::SemanticCompletion;
use crate::config::EditorConfig;
use crate::document::Document;
use crate::error::{CompletionError, ViewError};
use crate::parse::AnalysisGuard;
use crate::ui::StatusUi;
use crate::view::DocumentView;

/// Status text shown while a computation is outstanding.
pub const COMPLETION_STATUS: &str = "autocomplete...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionState {
	#[default]
	Idle,
	Starting,
	Restarting,
	Canceled,
}

/// Access to the parse coordinator from a completion computation.
pub(crate) trait ParseGate: Send + Sync {
	/// Whether a usable unit exists.
	fn is_processing(&self) -> bool;

	/// Preempts the current incremental cycle.
	fn stop_parse(&self);

	/// Blocks until the analysis lock is held. `None` when there is no lock
	/// to take.
	fn lock(&self) -> Option<AnalysisGuard<'_>>;
}

/// Gate for views without a semantic engine.
pub(crate) struct NoParse;

impl ParseGate for NoParse {
	fn is_processing(&self) -> bool {
		true
	}

	fn stop_parse(&self) {}

	fn lock(&self) -> Option<AnalysisGuard<'_>> {
		None
	}
}

/// Result of one background computation, posted to the owner.
#[derive(Debug)]
pub(crate) enum RowsOutcome {
	Rows(Vec<CompletionRow>),
	/// The parse coordinator left `Processing` before rows were computed.
	Aborted,
	Failed(CompletionError),
}

/// What the view does with a finished computation.
#[derive(Debug)]
pub(crate) enum Finish {
	/// Present these rows.
	Show(Vec<CompletionRow>),
	/// Nothing to show; resume parsing.
	Discarded,
	/// A newer request arrived meanwhile; resume parsing and run again.
	Rerun,
	Aborted,
	Failed(CompletionError),
}

/// Owner-side completion state of one view.
pub struct CompletionSession {
	provider: Arc<dyn CompletionProvider>,
	gate: Arc<dyn ParseGate>,
	executor: SerialExecutor,
	dispatcher: Dispatcher<DocumentView>,
	prefix: PrefixBuffer,
	state: CompletionState,
	in_flight: bool,
	interactive: bool,
	computations: u64,
	rows: Vec<CompletionRow>,
	anchor: Option<CharIdx>,
	max_rows: Option<usize>,
}

impl CompletionSession {
	pub(crate) fn spawn(
		provider: Arc<dyn CompletionProvider>,
		gate: Arc<dyn ParseGate>,
		dispatcher: Dispatcher<DocumentView>,
		config: &EditorConfig,
		gauge: &ThreadGauge,
	) -> Result<Self, ViewError> {
		let executor =
			SerialExecutor::spawn(TaskClass::CpuBlocking, "quire-complete", gauge).map_err(|error| ViewError::Spawn { worker: "completion", error })?;
		Ok(Self {
			provider,
			gate,
			executor,
			dispatcher,
			prefix: PrefixBuffer::new(),
			state: CompletionState::Idle,
			in_flight: false,
			interactive: config.interactive_completion,
			computations: 0,
			rows: Vec::new(),
			anchor: None,
			max_rows: config.completion.max_rows,
		})
	}

	pub fn state(&self) -> CompletionState {
		self.state
	}

	pub fn provider(&self) -> &Arc<dyn CompletionProvider> {
		&self.provider
	}

	pub fn prefix(&self) -> &PrefixBuffer {
		&self.prefix
	}

	/// Whether a computation has been submitted and not yet finished.
	pub fn in_flight(&self) -> bool {
		self.in_flight
	}

	/// Computations started since the view opened.
	pub fn computations(&self) -> u64 {
		self.computations
	}

	/// Rows of the list currently shown.
	pub fn rows(&self) -> &[CompletionRow] {
		&self.rows
	}

	pub fn row(&self, index: usize) -> Option<&CompletionRow> {
		self.rows.get(index)
	}

	/// Start of the word the shown list completes.
	pub fn anchor(&self) -> Option<CharIdx> {
		self.anchor
	}

	pub(crate) fn interactive(&self) -> bool {
		self.interactive
	}

	fn transition(&mut self, next: CompletionState) {
		if self.state != next {
			trace!(provider = self.provider.name(), from = ?self.state, to = ?next, "completion.state");
			self.state = next;
		}
	}

	/// Cancels an outstanding computation. Idempotent.
	pub fn stop(&mut self) {
		if matches!(self.state, CompletionState::Starting | CompletionState::Restarting) {
			self.transition(CompletionState::Canceled);
		}
	}

	/// Starts a computation if the provider's trigger matches and nothing
	/// is outstanding; a request made while one is outstanding is remembered
	/// and served once it finishes.
	///
	/// Returns true while the session is busy, in which case the caller
	/// should hold back debounced reparses.
	pub(crate) fn run(&mut self, document: &dyn Document, interactive: bool, status: &mut dyn StatusUi) -> bool {
		let snapshot = document.snapshot();
		let cursor = document.cursor();
		let Some(prefix) = self.provider.run_check(&snapshot, cursor, interactive) else {
			return self.state != CompletionState::Idle;
		};
		if !self.gate.is_processing() {
			return self.state != CompletionState::Idle;
		}

		self.interactive = interactive;
		match self.state {
			CompletionState::Idle => {}
			CompletionState::Canceled if !self.in_flight => {}
			CompletionState::Restarting => return true,
			CompletionState::Starting | CompletionState::Canceled => {
				self.transition(CompletionState::Restarting);
				return true;
			}
		}

		self.prefix.set(prefix);
		let (snapshot, position) = if self.provider.strips_word() {
			snapshot.with_word_blanked(cursor)
		} else {
			let position = snapshot.position_of(cursor);
			(snapshot, position)
		};
		let request = CompletionRequest {
			snapshot,
			position,
			cursor,
			interactive,
			prefix: self.prefix.clone(),
		};
		self.transition(CompletionState::Starting);
		status.update_status(COMPLETION_STATUS);
		self.submit(request);
		self.state != CompletionState::Idle
	}

	fn submit(&mut self, request: CompletionRequest) {
		let gate = Arc::clone(&self.gate);
		let provider = Arc::clone(&self.provider);
		let dispatcher = self.dispatcher.clone();
		let max_rows = self.max_rows;
		self.computations += 1;
		debug!(provider = provider.name(), prefix = %request.prefix(), computation = self.computations, "completion.submit");

		let submitted = self.executor.submit(move || {
			let outcome = compute_rows(&*gate, &*provider, &request, max_rows);
			if dispatcher.post(move |view| view.finish_completion(outcome)).is_err() {
				trace!("completion.owner_gone");
			}
		});
		match submitted {
			Ok(()) => self.in_flight = true,
			Err(error) => {
				warn!(%error, "completion.submit_failed");
				self.transition(CompletionState::Idle);
			}
		}
	}

	/// Applies a finished computation to the state machine.
	pub(crate) fn finish(&mut self, outcome: RowsOutcome) -> Finish {
		self.in_flight = false;
		match outcome {
			RowsOutcome::Aborted => {
				self.transition(CompletionState::Idle);
				Finish::Aborted
			}
			RowsOutcome::Failed(error) => {
				self.transition(CompletionState::Canceled);
				Finish::Failed(error)
			}
			RowsOutcome::Rows(rows) => match self.state {
				CompletionState::Restarting => {
					self.transition(CompletionState::Idle);
					Finish::Rerun
				}
				CompletionState::Starting if !rows.is_empty() => Finish::Show(rows),
				CompletionState::Starting | CompletionState::Canceled | CompletionState::Idle => {
					self.transition(CompletionState::Idle);
					Finish::Discarded
				}
			},
		}
	}

	/// Records the list the view just opened.
	pub(crate) fn opened(&mut self, anchor: CharIdx, rows: Vec<CompletionRow>) {
		debug!(provider = self.provider.name(), rows = rows.len(), anchor, "completion.shown");
		self.anchor = Some(anchor);
		self.rows = rows;
		self.transition(CompletionState::Idle);
	}

	/// Forgets the shown list.
	pub(crate) fn closed(&mut self) {
		self.anchor = None;
		self.rows.clear();
	}

	/// A full reparse invalidates whatever is being computed.
	pub(crate) fn reset_for_full_reparse(&mut self) {
		let next = if self.in_flight { CompletionState::Canceled } else { CompletionState::Idle };
		self.transition(next);
	}

	/// Returns to `Idle` when nothing is outstanding.
	pub(crate) fn settle(&mut self) {
		if !self.in_flight {
			self.transition(CompletionState::Idle);
		}
	}

	pub(crate) fn shutdown(&mut self) {
		self.executor.shutdown();
	}
}

impl std::fmt::Debug for CompletionSession {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CompletionSession")
			.field("provider", &self.provider.name())
			.field("state", &self.state)
			.field("in_flight", &self.in_flight)
			.field("rows", &self.rows.len())
			.finish_non_exhaustive()
	}
}

/// Body of one background computation.
fn compute_rows(gate: &dyn ParseGate, provider: &dyn CompletionProvider, request: &CompletionRequest, max_rows: Option<usize>) -> RowsOutcome {
	gate.stop_parse();
	let mut guard = gate.lock();
	if !gate.is_processing() {
		return RowsOutcome::Aborted;
	}

	let mut rows = Vec::new();
	let unit = guard.as_mut().and_then(|guard| guard.unit());
	let result = catch_unwind(AssertUnwindSafe(|| provider.add_rows(request, unit, &mut rows)));
	drop(guard);

	match result {
		Ok(Ok(())) => {
			if let Some(max) = max_rows {
				rows.truncate(max);
			}
			RowsOutcome::Rows(rows)
		}
		Ok(Err(error)) => RowsOutcome::Failed(error),
		Err(_) => RowsOutcome::Failed(CompletionError::Panicked),
	}
}
