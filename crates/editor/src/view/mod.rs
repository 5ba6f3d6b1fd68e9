//! A document view: one document with its parse and completion
//! coordinators and UI collaborators.
//!
//! A view lives on its owner thread. Background workers reach it only
//! through jobs posted to the view's [`OwnerLoop`], which the host pumps from
//! its event loop; every UI call therefore happens on the owner thread.


use std::sync::Arc;

use quire_primitives::{CharRange, DocumentId, Key, KeyHistory};
use quire_worker::{OwnerLoop, ThreadGauge};
use tracing::{debug, info, warn};

use crate::completion::{
	CompletionProvider, CompletionSession, CompletionState, Finish, Insert, NoParse, ParseGate, RowsOutcome,
};
use crate::config::EditorConfig;
use crate::document::Document;
use crate::engine::{ParseResults, SemanticEngine};
use crate::error::{EngineError, ViewError};
use crate::parse::{FullReparse, ParseSession, ParseState};
use crate::snippet::{SnippetExpander, TemplateExpander};
use crate::ui::{MessageLevel, SelectionEvents, SelectionUi, StatusUi};

/// Collaborators a view is built from.
pub struct ViewParts {
	/// Shown in messages, usually the file name.
	pub name: String,
	pub document: Box<dyn Document>,
	/// Absent for languages without semantic support.
	pub engine: Option<Arc<dyn SemanticEngine>>,
	pub provider: Arc<dyn CompletionProvider>,
	pub selection: Box<dyn SelectionUi>,
	pub status: Box<dyn StatusUi>,
	pub snippets: Box<dyn SnippetExpander>,
}

impl ViewParts {
	pub fn new(
		name: impl Into<String>,
		document: Box<dyn Document>,
		provider: Arc<dyn CompletionProvider>,
		selection: Box<dyn SelectionUi>,
		status: Box<dyn StatusUi>,
	) -> Self {
		Self {
			name: name.into(),
			document,
			engine: None,
			provider,
			selection,
			status,
			snippets: Box::new(TemplateExpander),
		}
	}

	pub fn with_engine(mut self, engine: Arc<dyn SemanticEngine>) -> Self {
		self.engine = Some(engine);
		self
	}

	pub fn with_snippets(mut self, snippets: Box<dyn SnippetExpander>) -> Self {
		self.snippets = snippets;
		self
	}
}

/// How [`DocumentView::close`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
	/// The last requested parse was installed before shutdown.
	Parsed,
	/// The parser had stopped on an engine failure.
	Stopped,
	/// The teardown timeout elapsed first.
	TimedOut,
	/// The view had no semantic engine.
	Unparsed,
}

pub struct DocumentView {
	id: DocumentId,
	name: String,
	config: EditorConfig,
	document: Box<dyn Document>,
	selection: Box<dyn SelectionUi>,
	status: Box<dyn StatusUi>,
	snippets: Box<dyn SnippetExpander>,
	parse: Option<ParseSession>,
	completion: CompletionSession,
	keys: KeyHistory,
	parse_workers: ThreadGauge,
	completion_workers: ThreadGauge,
}

impl DocumentView {
	/// Builds a view whose background work reports to `owner`.
	///
	/// With an engine, the initial parse is queued immediately and runs on
	/// the document's parse worker.
	pub fn open(parts: ViewParts, config: EditorConfig, owner: &OwnerLoop<DocumentView>) -> Result<Self, ViewError> {
		let ViewParts {
			name,
			document,
			engine,
			provider,
			selection,
			mut status,
			snippets,
		} = parts;
		let id = DocumentId::next();
		let parse_workers = ThreadGauge::new();
		let completion_workers = ThreadGauge::new();

		let parse = match engine {
			Some(engine) => {
				let session = ParseSession::spawn(
					id,
					name.clone(),
					document.snapshot(),
					engine,
					owner.dispatcher(),
					&config,
					&parse_workers,
				)?;
				status.update_status(crate::parse::PARSING_STATUS);
				Some(session)
			}
			None => None,
		};
		let gate: Arc<dyn ParseGate> = match &parse {
			Some(session) => session.gate(),
			None => Arc::new(NoParse),
		};
		let completion = CompletionSession::spawn(provider, gate, owner.dispatcher(), &config, &completion_workers)?;
		info!(%id, name = %name, semantic = parse.is_some(), completion = completion.provider().name(), "view.open");

		Ok(Self {
			id,
			name,
			config,
			document,
			selection,
			status,
			snippets,
			parse,
			completion,
			keys: KeyHistory::new(),
			parse_workers,
			completion_workers,
		})
	}

	pub fn id(&self) -> DocumentId {
		self.id
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn config(&self) -> &EditorConfig {
		&self.config
	}

	pub fn document(&self) -> &dyn Document {
		&*self.document
	}

	pub fn document_mut(&mut self) -> &mut dyn Document {
		&mut *self.document
	}

	pub fn parse(&self) -> Option<&ParseSession> {
		self.parse.as_ref()
	}

	pub fn completion(&self) -> &CompletionSession {
		&self.completion
	}

	pub fn completion_state(&self) -> CompletionState {
		self.completion.state()
	}

	/// Last installed parse results; empty without an engine.
	pub fn parse_results(&self) -> Option<&ParseResults> {
		self.parse.as_ref().map(ParseSession::results)
	}

	/// Parse worker threads started by this view.
	pub fn parse_workers(&self) -> &ThreadGauge {
		&self.parse_workers
	}

	pub fn completion_workers(&self) -> &ThreadGauge {
		&self.completion_workers
	}

	/// The buffer changed because of `key`.
	pub fn on_changed(&mut self, key: Key) {
		self.keys.record(key);
		let snapshot = self.document.snapshot();
		self.completion.provider().on_buffer_changed(&snapshot);
		if let Some(parse) = &mut self.parse {
			parse.soft_reparse(true, &mut *self.status);
		}

		if self.selection.is_visible() {
			self.cancel_reparse();
			return;
		}

		let interactive = self.config.interactive_completion;
		let provider = Arc::clone(self.completion.provider());
		let continues = self.keys.last().is_some_and(|key| provider.is_continue_key(key));
		if continues && (interactive || self.completion.state() != CompletionState::Idle) {
			self.run_completion(interactive);
		} else {
			self.completion.stop();
			if interactive && provider.is_restart_key(&self.keys) {
				self.run_completion(interactive);
			}
		}
	}

	/// The insertion cursor moved without an edit.
	pub fn on_cursor_moved(&mut self) {
		self.completion.stop();
	}

	pub fn on_focus_out(&mut self) {
		self.completion.stop();
		self.keys.clear();
	}

	/// Explicit completion request, e.g. a keyboard shortcut. Works with
	/// interactive completion disabled and without a minimum prefix.
	pub fn request_completion(&mut self) {
		if self.selection.is_visible() {
			return;
		}
		self.run_completion(false);
	}

	fn run_completion(&mut self, interactive: bool) {
		let busy = self.completion.run(&*self.document, interactive, &mut *self.status);
		if busy {
			self.cancel_reparse();
		}
	}

	/// Drops a debounced reparse that has not started yet.
	pub fn cancel_reparse(&mut self) {
		if let Some(parse) = &mut self.parse {
			parse.cancel_pending_reparse();
		}
	}

	pub fn soft_reparse(&mut self, delayed: bool) {
		if let Some(parse) = &mut self.parse {
			parse.soft_reparse(delayed, &mut *self.status);
		}
	}

	/// Rebuilds the analysis unit from the current buffer. `None` without an
	/// engine.
	pub fn full_reparse(&mut self) -> Option<FullReparse> {
		let parse = self.parse.as_mut()?;
		let outcome = parse.full_reparse(self.document.snapshot(), &mut *self.status);
		if matches!(outcome, FullReparse::Queued | FullReparse::Merged) {
			self.completion.reset_for_full_reparse();
		}
		Some(outcome)
	}

	/// Notes an external change, e.g. to a header, that warrants an
	/// incremental reparse before close.
	pub fn mark_soft_reparse_needed(&mut self) {
		if let Some(parse) = &mut self.parse {
			parse.mark_soft_reparse_needed();
		}
	}

	/// Notes a change that invalidates the unit, e.g. new compile flags.
	pub fn mark_full_reparse_needed(&mut self) {
		if let Some(parse) = &mut self.parse {
			parse.mark_full_reparse_needed();
		}
	}

	pub(crate) fn start_parse_cycle(&mut self) {
		if let Some(parse) = &mut self.parse {
			parse.start_cycle(&mut *self.status);
		}
	}

	pub(crate) fn capture_parse_snapshot(&mut self) {
		if let Some(parse) = &mut self.parse {
			parse.capture(&*self.document);
		}
	}

	pub(crate) fn install_parse(&mut self, results: ParseResults) {
		if let Some(parse) = &mut self.parse {
			parse.install(results, &mut *self.status);
		}
	}

	pub(crate) fn fail_parse(&mut self, error: EngineError) {
		if let Some(parse) = &mut self.parse {
			parse.report_failure(&error, &mut *self.status);
		}
	}

	/// Resumes parsing after completion is done with the unit.
	fn reparse_after_completion(&mut self) {
		self.soft_reparse(true);
	}

	pub(crate) fn finish_completion(&mut self, outcome: RowsOutcome) {
		self.status.update_status("");
		match self.completion.finish(outcome) {
			Finish::Aborted => {}
			Finish::Discarded => self.reparse_after_completion(),
			Finish::Rerun => {
				self.reparse_after_completion();
				let interactive = self.completion.interactive();
				self.run_completion(interactive);
			}
			Finish::Failed(error) => {
				warn!(name = %self.name, %error, "completion.failed");
				self.status.message(MessageLevel::Warning, &format!("completion failed, reparsing {}: {error}", self.name));
				self.full_reparse();
				self.completion.settle();
			}
			Finish::Show(rows) => {
				let cursor = self.document.cursor();
				let Some(anchor) = cursor.checked_sub(self.completion.prefix().len_chars()) else {
					debug!(name = %self.name, cursor, "completion.anchor_invalid");
					self.completion.settle();
					self.reparse_after_completion();
					return;
				};
				self.selection.open_session(anchor);
				for row in &rows {
					self.selection.add_row(&row.label);
				}
				self.completion.opened(anchor, rows);
				self.document.begin_user_action();
				self.status.hide_tooltips();
				self.selection.show();
			}
		}
	}

	/// Finishes outstanding parse work and stops the view's workers.
	///
	/// Pending reparse requests are flushed first, then the owner loop is
	/// pumped until the parse is installed or has stopped, bounded by the
	/// configured teardown timeout.
	pub fn close(mut self, owner: &mut OwnerLoop<DocumentView>) -> CloseOutcome {
		let pending = self.parse.as_ref().map(|parse| (parse.full_reparse_needed(), parse.soft_reparse_needed() || !parse.parsed()));
		match pending {
			Some((true, _)) => {
				self.full_reparse();
			}
			Some((false, true)) => self.soft_reparse(false),
			_ => {}
		}

		let timeout = self.config.teardown_timeout();
		let settled = owner.run_until(&mut self, timeout, |view| {
			view.parse.as_ref().is_none_or(|parse| parse.parsed() || parse.state() == ParseState::Stopped)
		});
		let outcome = match &self.parse {
			None => CloseOutcome::Unparsed,
			Some(_) if !settled => CloseOutcome::TimedOut,
			Some(parse) if parse.parsed() => CloseOutcome::Parsed,
			Some(_) => CloseOutcome::Stopped,
		};

		if let Some(parse) = &mut self.parse {
			parse.shutdown();
		}
		self.completion.shutdown();
		info!(id = %self.id, name = %self.name, ?outcome, "view.close");
		outcome
	}
}

impl SelectionEvents for DocumentView {
	fn on_change(&mut self, index: Option<usize>) {
		let detail = index.and_then(|index| self.completion.row(index)).and_then(|row| row.detail.clone());
		match (detail, self.completion.anchor()) {
			(Some(detail), Some(anchor)) => {
				let at = self.document.snapshot().position_of(anchor);
				self.status.show_tooltip(at, &detail);
			}
			_ => self.status.hide_tooltips(),
		}
	}

	fn on_select(&mut self, index: usize, text: &str, commit: bool) {
		let Some(anchor) = self.completion.anchor() else {
			return;
		};
		let cursor = self.document.cursor();
		self.document.erase(CharRange::new(anchor, cursor));
		let at = anchor.min(cursor);

		let insert = if commit { self.completion.row(index).map(|row| row.insert.clone()) } else { None };
		match insert {
			Some(Insert::Snippet(template)) => match self.snippets.expand(&template) {
				Ok(rendered) => {
					self.document.insert(at, &rendered.text);
					self.document.set_cursor(at + rendered.first_stop().start);
				}
				Err(error) => {
					warn!(name = %self.name, %error, "completion.snippet_invalid");
					self.document.insert(at, text);
				}
			},
			Some(Insert::Plain(plain)) => self.document.insert(at, &plain),
			None => self.document.insert(at, text),
		}
	}

	fn on_hide(&mut self) {
		self.document.end_user_action();
		self.status.hide_tooltips();
		self.completion.closed();
		let snapshot = self.document.snapshot();
		self.completion.provider().on_buffer_changed(&snapshot);
		self.reparse_after_completion();
	}
}

impl std::fmt::Debug for DocumentView {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DocumentView")
			.field("id", &self.id)
			.field("name", &self.name)
			.field("parse", &self.parse)
			.field("completion", &self.completion)
			.finish_non_exhaustive()
	}
}
