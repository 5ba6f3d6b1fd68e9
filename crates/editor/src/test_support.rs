//! Shared fixtures: a controllable engine, recording UI collaborators and a
//! view harness that pumps the owner loop on the test thread.

use std::cell::{RefCell, RefMut};
use std::ops::Deref;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use quire_primitives::{CharIdx, CharRange, Key, Position, Snapshot};
use quire_worker::{OwnerLoop, channel};

use crate::completion::{CompletionProvider, SemanticCompletion};
use crate::config::EditorConfig;
use crate::document::RopeDocument;
use crate::engine::{AnalysisUnit, Candidate, Diagnostic, DiagnosticCounts, SemanticEngine, Severity, Token, TokenKind};
use crate::error::EngineError;
use crate::ui::{DiagnosticMark, MessageLevel, SelectionUi, StatusUi};
use crate::view::{CloseOutcome, DocumentView, ViewParts};

/// Upper bound for anything a test waits on.
pub(crate) const WAIT: Duration = Duration::from_secs(5);

pub(crate) fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}

/// Timings short enough for tests.
pub(crate) fn fast_config() -> EditorConfig {
	EditorConfig {
		reparse_debounce_ms: 30,
		worker_poll_ms: 2,
		full_reparse_retry_ms: 10,
		teardown_timeout_ms: 2_000,
		..EditorConfig::default()
	}
}

/// Polls `done` from the test thread until it holds or `WAIT` elapses.
pub(crate) fn eventually(mut done: impl FnMut() -> bool) -> bool {
	let deadline = Instant::now() + WAIT;
	while Instant::now() < deadline {
		if done() {
			return true;
		}
		std::thread::sleep(Duration::from_millis(1));
	}
	done()
}

/// Blocks callers of [`Gate::pass`] while held.
#[derive(Debug, Default)]
pub(crate) struct Gate {
	held: Mutex<bool>,
	changed: Condvar,
	blocked: AtomicUsize,
}

impl Gate {
	pub(crate) fn hold(&self) {
		*self.held.lock() = true;
	}

	pub(crate) fn release(&self) {
		*self.held.lock() = false;
		self.changed.notify_all();
	}

	pub(crate) fn pass(&self) {
		let mut held = self.held.lock();
		if !*held {
			return;
		}
		self.blocked.fetch_add(1, Ordering::SeqCst);
		while *held {
			self.changed.wait(&mut held);
		}
		self.blocked.fetch_sub(1, Ordering::SeqCst);
	}

	/// Callers currently parked in [`Self::pass`].
	pub(crate) fn blocked(&self) -> usize {
		self.blocked.load(Ordering::SeqCst)
	}
}

type HolderProbe = Box<dyn Fn() -> Option<&'static str> + Send + Sync>;

/// Counters and switches shared by a [`MockEngine`] and its units.
#[derive(Default)]
pub(crate) struct EngineState {
	pub(crate) constructions: AtomicUsize,
	pub(crate) reparses: AtomicUsize,
	pub(crate) completions: AtomicUsize,
	pub(crate) build_gate: Gate,
	pub(crate) reparse_gate: Gate,
	pub(crate) complete_gate: Gate,
	pub(crate) fail_builds: AtomicBool,
	pub(crate) fail_reparses: AtomicBool,
	pub(crate) fail_completions: AtomicBool,
	pub(crate) candidates: Mutex<Vec<Candidate>>,
	pub(crate) diagnostics: Mutex<Vec<Diagnostic>>,
	/// Texts passed to reparse, in order.
	pub(crate) reparsed: Mutex<Vec<String>>,
	/// Unit calls currently executing; more than one is an exclusion bug.
	active: AtomicUsize,
	pub(crate) overlaps: AtomicUsize,
	probe: Mutex<Option<HolderProbe>>,
	/// Lock holder seen by each unit call, tagged with the call name.
	pub(crate) observed: Mutex<Vec<(&'static str, Option<&'static str>)>>,
}

impl EngineState {
	pub(crate) fn set_candidates(&self, candidates: impl IntoIterator<Item = Candidate>) {
		*self.candidates.lock() = candidates.into_iter().collect();
	}

	/// Records the analysis lock holder on every later unit call.
	pub(crate) fn set_probe(&self, probe: impl Fn() -> Option<&'static str> + Send + Sync + 'static) {
		*self.probe.lock() = Some(Box::new(probe));
	}

	pub(crate) fn release_all(&self) {
		self.build_gate.release();
		self.reparse_gate.release();
		self.complete_gate.release();
	}

	fn enter(&self, call: &'static str) -> ActiveCall<'_> {
		if self.active.fetch_add(1, Ordering::SeqCst) > 0 {
			self.overlaps.fetch_add(1, Ordering::SeqCst);
		}
		if let Some(probe) = &*self.probe.lock() {
			self.observed.lock().push((call, probe()));
		}
		ActiveCall(self)
	}
}

struct ActiveCall<'a>(&'a EngineState);

impl Drop for ActiveCall<'_> {
	fn drop(&mut self) {
		self.0.active.fetch_sub(1, Ordering::SeqCst);
	}
}

/// Engine whose every call can be gated or made to fail.
#[derive(Clone, Default)]
pub(crate) struct MockEngine {
	state: Arc<EngineState>,
}

impl MockEngine {
	pub(crate) fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}
}

impl Deref for MockEngine {
	type Target = EngineState;

	fn deref(&self) -> &EngineState {
		&self.state
	}
}

impl SemanticEngine for MockEngine {
	fn create_unit(&self, snapshot: &Snapshot) -> Result<Box<dyn AnalysisUnit>, EngineError> {
		let _call = self.enter("create");
		self.constructions.fetch_add(1, Ordering::SeqCst);
		self.build_gate.pass();
		if self.fail_builds.load(Ordering::SeqCst) {
			return Err(EngineError::Status(1));
		}
		Ok(Box::new(MockUnit {
			state: Arc::clone(&self.state),
			text: snapshot.text(),
		}))
	}
}

struct MockUnit {
	state: Arc<EngineState>,
	text: String,
}

impl AnalysisUnit for MockUnit {
	fn reparse(&mut self, snapshot: &Snapshot) -> Result<(), EngineError> {
		let _call = self.state.enter("reparse");
		self.state.reparses.fetch_add(1, Ordering::SeqCst);
		self.state.reparse_gate.pass();
		if self.state.fail_reparses.load(Ordering::SeqCst) {
			return Err(EngineError::Status(2));
		}
		self.text = snapshot.text();
		self.state.reparsed.lock().push(self.text.clone());
		Ok(())
	}

	fn tokens(&self) -> Vec<Token> {
		let mut tokens = Vec::new();
		let mut start = None;
		for (idx, c) in self.text.chars().chain(std::iter::once(' ')).enumerate() {
			match (start, quire_primitives::is_token_char(c)) {
				(None, true) => start = Some(idx),
				(Some(begin), false) => {
					tokens.push(Token {
						range: CharRange::new(begin, idx),
						kind: TokenKind::Identifier,
					});
					start = None;
				}
				_ => {}
			}
		}
		tokens
	}

	fn diagnostics(&self) -> Vec<Diagnostic> {
		self.state.diagnostics.lock().clone()
	}

	fn complete_at(&mut self, _snapshot: &Snapshot, _position: Position) -> Result<Vec<Candidate>, EngineError> {
		let _call = self.state.enter("complete");
		self.state.completions.fetch_add(1, Ordering::SeqCst);
		self.state.complete_gate.pass();
		if self.state.fail_completions.load(Ordering::SeqCst) {
			return Err(EngineError::Internal("completion crashed".into()));
		}
		Ok(self.state.candidates.lock().clone())
	}
}

pub(crate) fn diagnostic(start: CharIdx, end: CharIdx, severity: Severity, message: &str) -> Diagnostic {
	Diagnostic {
		range: CharRange::new(start, end),
		severity,
		message: message.into(),
	}
}

#[derive(Debug, Default)]
pub(crate) struct StatusLog {
	pub(crate) statuses: Vec<String>,
	pub(crate) messages: Vec<(MessageLevel, String)>,
	pub(crate) counts: Vec<DiagnosticCounts>,
	pub(crate) syntax_updates: usize,
	pub(crate) marks: Vec<DiagnosticMark>,
	pub(crate) tooltips: Vec<(Position, String)>,
	pub(crate) tooltip_hides: usize,
}

impl StatusLog {
	pub(crate) fn status(&self) -> &str {
		self.statuses.last().map_or("", String::as_str)
	}
}

/// Status UI that records every call.
#[derive(Clone, Default)]
pub(crate) struct RecordingStatus(Rc<RefCell<StatusLog>>);

impl RecordingStatus {
	pub(crate) fn log(&self) -> RefMut<'_, StatusLog> {
		self.0.borrow_mut()
	}
}

impl StatusUi for RecordingStatus {
	fn update_status(&mut self, status: &str) {
		self.log().statuses.push(status.to_owned());
	}

	fn update_diagnostic_counts(&mut self, counts: DiagnosticCounts) {
		self.log().counts.push(counts);
	}

	fn set_diagnostics(&mut self, marks: Vec<DiagnosticMark>) {
		self.log().marks = marks;
	}

	fn update_syntax(&mut self, _tokens: &[Token]) {
		self.log().syntax_updates += 1;
	}

	fn show_tooltip(&mut self, at: Position, text: &str) {
		self.log().tooltips.push((at, text.to_owned()));
	}

	fn hide_tooltips(&mut self) {
		self.log().tooltip_hides += 1;
	}

	fn message(&mut self, level: MessageLevel, text: &str) {
		self.log().messages.push((level, text.to_owned()));
	}
}

#[derive(Debug, Default)]
pub(crate) struct SelectionLog {
	pub(crate) anchors: Vec<CharIdx>,
	pub(crate) rows: Vec<String>,
	pub(crate) visible: bool,
	pub(crate) shows: usize,
}

/// Selection UI that records every call.
#[derive(Clone, Default)]
pub(crate) struct RecordingSelection(Rc<RefCell<SelectionLog>>);

impl RecordingSelection {
	pub(crate) fn log(&self) -> RefMut<'_, SelectionLog> {
		self.0.borrow_mut()
	}
}

impl SelectionUi for RecordingSelection {
	fn open_session(&mut self, anchor: CharIdx) {
		let mut log = self.log();
		log.anchors.push(anchor);
		log.rows.clear();
	}

	fn add_row(&mut self, text: &str) {
		self.log().rows.push(text.to_owned());
	}

	fn show(&mut self) {
		let mut log = self.log();
		log.visible = true;
		log.shows += 1;
	}

	fn hide(&mut self) {
		self.log().visible = false;
	}

	fn is_visible(&self) -> bool {
		self.0.borrow().visible
	}
}

/// Releases every engine gate when dropped, so a failing test never leaves
/// a worker parked while the view joins it.
struct EngineGuard(Arc<MockEngine>);

impl Drop for EngineGuard {
	fn drop(&mut self) {
		self.0.release_all();
	}
}

/// A view plus its owner loop, driven from the test thread.
pub(crate) struct Harness {
	_release: EngineGuard,
	pub(crate) view: DocumentView,
	pub(crate) owner: OwnerLoop<DocumentView>,
	pub(crate) engine: Arc<MockEngine>,
	pub(crate) selection: RecordingSelection,
	pub(crate) status: RecordingStatus,
}

impl Harness {
	/// Semantic view over `text` with the cursor at the end.
	pub(crate) fn semantic(text: &str) -> Self {
		Self::semantic_with(text, fast_config(), MockEngine::new())
	}

	pub(crate) fn semantic_with(text: &str, config: EditorConfig, engine: Arc<MockEngine>) -> Self {
		let provider = SemanticCompletion::new().with_config(&config.completion);
		Self::build(text, config, Arc::new(provider), engine, true)
	}

	/// View without an engine.
	pub(crate) fn plain(text: &str, provider: Arc<dyn CompletionProvider>) -> Self {
		Self::build(text, fast_config(), provider, MockEngine::new(), false)
	}

	fn build(text: &str, config: EditorConfig, provider: Arc<dyn CompletionProvider>, engine: Arc<MockEngine>, semantic: bool) -> Self {
		init_tracing();
		let (_, owner) = channel::<DocumentView>();
		let selection = RecordingSelection::default();
		let status = RecordingStatus::default();
		let mut parts = ViewParts::new(
			"main.cpp",
			Box::new(RopeDocument::new(text)),
			provider,
			Box::new(selection.clone()),
			Box::new(status.clone()),
		);
		if semantic {
			parts = parts.with_engine(Arc::clone(&engine) as Arc<dyn SemanticEngine>);
		}
		let view = DocumentView::open(parts, config, &owner).unwrap();
		Self {
			_release: EngineGuard(Arc::clone(&engine)),
			view,
			owner,
			engine,
			selection,
			status,
		}
	}

	pub(crate) fn pump_until(&mut self, done: impl FnMut(&DocumentView) -> bool) -> bool {
		self.owner.run_until(&mut self.view, WAIT, done)
	}

	pub(crate) fn pump_for(&mut self, duration: Duration) {
		self.owner.run_for(&mut self.view, duration);
	}

	/// Pumps until the latest parse is installed.
	pub(crate) fn wait_parsed(&mut self) {
		assert!(self.pump_until(|view| view.parse().is_some_and(|parse| parse.parsed())), "parse never installed");
	}

	/// Types `c` at the cursor and reports the edit.
	pub(crate) fn type_char(&mut self, c: char) {
		let document = self.view.document_mut();
		let cursor = document.cursor();
		document.insert(cursor, &c.to_string());
		self.view.on_changed(Key::char(c));
	}

	pub(crate) fn text(&self) -> String {
		self.view.document().snapshot().text()
	}

	pub(crate) fn close(self) -> CloseOutcome {
		let Self { view, mut owner, .. } = self;
		view.close(&mut owner)
	}
}
