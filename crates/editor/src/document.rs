//! Live document seam and a rope-backed reference implementation.

use quire_primitives::{CharIdx, CharRange, Snapshot};
use ropey::Rope;

/// The editable buffer a view works on.
///
/// The host owns the real widget; the core only snapshots the text, reads
/// the cursor and performs the edits completion needs.
pub trait Document {
	/// Immutable copy of the current text.
	fn snapshot(&self) -> Snapshot;

	/// Monotonic edit counter.
	fn version(&self) -> u64;

	/// Character index of the insertion cursor.
	fn cursor(&self) -> CharIdx;

	fn set_cursor(&mut self, idx: CharIdx);

	/// Inserts `text` at `idx`, moving the cursor to the end of the insertion
	/// when it sat at or after `idx`.
	fn insert(&mut self, idx: CharIdx, text: &str);

	fn erase(&mut self, range: CharRange);

	/// Opens an undo group.
	fn begin_user_action(&mut self);

	/// Closes the undo group opened by [`Self::begin_user_action`].
	fn end_user_action(&mut self);
}

/// In-memory document backed by a [`Rope`].
#[derive(Debug, Clone, Default)]
pub struct RopeDocument {
	text: Rope,
	version: u64,
	cursor: CharIdx,
	user_action_depth: usize,
}

impl RopeDocument {
	/// Creates a document with the cursor at the end of `text`.
	pub fn new(text: &str) -> Self {
		let text = Rope::from_str(text);
		let cursor = text.len_chars();
		Self {
			text,
			version: 0,
			cursor,
			user_action_depth: 0,
		}
	}

	pub fn text(&self) -> String {
		self.text.to_string()
	}

	/// Inserts at the cursor, as typing would.
	pub fn type_text(&mut self, text: &str) {
		self.insert(self.cursor, text);
	}

	/// Nesting depth of open undo groups.
	pub fn user_action_depth(&self) -> usize {
		self.user_action_depth
	}
}

impl Document for RopeDocument {
	fn snapshot(&self) -> Snapshot {
		Snapshot::new(self.text.clone(), self.version)
	}

	fn version(&self) -> u64 {
		self.version
	}

	fn cursor(&self) -> CharIdx {
		self.cursor
	}

	fn set_cursor(&mut self, idx: CharIdx) {
		self.cursor = idx.min(self.text.len_chars());
	}

	fn insert(&mut self, idx: CharIdx, text: &str) {
		let idx = idx.min(self.text.len_chars());
		self.text.insert(idx, text);
		if self.cursor >= idx {
			self.cursor += text.chars().count();
		}
		self.version += 1;
	}

	fn erase(&mut self, range: CharRange) {
		let range = range.clamp(self.text.len_chars());
		if range.is_empty() {
			return;
		}
		self.text.remove(range.start..range.end);
		if self.cursor >= range.end {
			self.cursor -= range.len();
		} else if self.cursor > range.start {
			self.cursor = range.start;
		}
		self.version += 1;
	}

	fn begin_user_action(&mut self) {
		self.user_action_depth += 1;
	}

	fn end_user_action(&mut self) {
		self.user_action_depth = self.user_action_depth.saturating_sub(1);
	}
}
