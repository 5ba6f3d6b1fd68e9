//! Completion provider seam.

use quire_primitives::{CharIdx, Key, KeyHistory, Position, Snapshot, is_token_char};

use super::PrefixBuffer;
use crate::engine::AnalysisUnit;
use crate::error::CompletionError;

/// What a row inserts when committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Insert {
	Plain(String),
	/// Snippet template, expanded on commit.
	Snippet(String),
}

/// One entry of a completion list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRow {
	/// Text shown in the list and inserted while cycling.
	pub label: String,
	pub insert: Insert,
	/// Shown as a tooltip while the row is highlighted.
	pub detail: Option<String>,
}

impl CompletionRow {
	pub fn plain(label: impl Into<String>) -> Self {
		let label = label.into();
		Self {
			insert: Insert::Plain(label.clone()),
			label,
			detail: None,
		}
	}

	pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
		self.detail = Some(detail.into());
		self
	}
}

/// Input of one background computation.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
	/// Buffer copy handed to the provider. For providers that strip the word
	/// being completed, the word is already blanked.
	pub snapshot: Snapshot,
	/// Where the engine should complete: the start of the word being
	/// completed.
	pub position: Position,
	/// Cursor at request time, in the unmodified buffer.
	pub cursor: CharIdx,
	pub interactive: bool,
	pub(crate) prefix: PrefixBuffer,
}

impl CompletionRequest {
	/// Current value of the shared prefix buffer.
	pub fn prefix(&self) -> String {
		self.prefix.get()
	}
}

/// Language-specific completion behavior.
///
/// Everything except [`Self::add_rows`] runs on the owner thread.
/// `add_rows` runs on the completion worker and must not touch UI state.
pub trait CompletionProvider: Send + Sync {
	fn name(&self) -> &'static str;

	/// Keys that keep a completion going while typed.
	fn is_continue_key(&self, key: Key) -> bool {
		key.as_char().is_some_and(is_token_char)
	}

	/// Key sequences that start a new completion, e.g. a member accessor.
	fn is_restart_key(&self, _history: &KeyHistory) -> bool {
		false
	}

	/// Decides whether completion should start at `cursor` and, if so,
	/// returns the prefix typed so far.
	fn run_check(&self, snapshot: &Snapshot, cursor: CharIdx, interactive: bool) -> Option<String>;

	/// Whether the request snapshot has the word at the cursor blanked.
	fn strips_word(&self) -> bool {
		false
	}

	/// Produces rows for `request`. `unit` is present when the view has a
	/// semantic engine and the analysis lock is held.
	fn add_rows(&self, request: &CompletionRequest, unit: Option<&mut dyn AnalysisUnit>, rows: &mut Vec<CompletionRow>) -> Result<(), CompletionError>;

	/// Called on the owner thread after each buffer edit.
	fn on_buffer_changed(&self, _snapshot: &Snapshot) {}
}
