//! Immutable buffer snapshots.
//!
//! A [`Snapshot`] is what crosses thread boundaries: the owner thread captures
//! one from the live document and background workers only ever read it. Rope
//! clones share structure, so capturing is cheap regardless of buffer size.

use ropey::Rope;

use crate::position::Position;
use crate::range::CharIdx;

/// Returns true for characters that belong to identifiers.
///
/// Non-ASCII characters are treated as identifier characters so completion
/// keeps working on UTF-8 identifiers.
pub fn is_token_char(c: char) -> bool {
	c.is_ascii_alphanumeric() || c == '_' || !c.is_ascii()
}

/// Immutable view of a document at one version.
#[derive(Debug, Clone)]
pub struct Snapshot {
	rope: Rope,
	version: u64,
}

impl Snapshot {
	pub fn new(rope: Rope, version: u64) -> Self {
		Self { rope, version }
	}

	pub fn from_text(text: &str, version: u64) -> Self {
		Self::new(Rope::from_str(text), version)
	}

	pub fn rope(&self) -> &Rope {
		&self.rope
	}

	/// Document version the snapshot was taken at.
	pub fn version(&self) -> u64 {
		self.version
	}

	pub fn len_chars(&self) -> usize {
		self.rope.len_chars()
	}

	pub fn is_empty(&self) -> bool {
		self.rope.len_chars() == 0
	}

	/// Full text as an owned string.
	pub fn text(&self) -> String {
		self.rope.to_string()
	}

	/// Character at `idx`, if in bounds.
	pub fn char_at(&self, idx: CharIdx) -> Option<char> {
		(idx < self.rope.len_chars()).then(|| self.rope.char(idx))
	}

	/// Line/column of a character index, clamped to the end of the text.
	pub fn position_of(&self, idx: CharIdx) -> Position {
		let idx = idx.min(self.rope.len_chars());
		let line = self.rope.char_to_line(idx);
		Position::new(line, idx - self.rope.line_to_char(line))
	}

	/// Character index of a line/column, clamped to the line and text.
	pub fn char_of(&self, pos: Position) -> CharIdx {
		if pos.line >= self.rope.len_lines() {
			return self.rope.len_chars();
		}
		let start = self.rope.line_to_char(pos.line);
		let line_len = self.rope.line(pos.line).len_chars();
		start + pos.column.min(line_len)
	}

	/// Text from the start of the line containing `idx` up to `idx`.
	pub fn line_before(&self, idx: CharIdx) -> String {
		let idx = idx.min(self.rope.len_chars());
		let start = self.rope.line_to_char(self.rope.char_to_line(idx));
		self.rope.slice(start..idx).to_string()
	}

	/// Start of the identifier that ends at `idx`.
	pub fn word_start_before(&self, idx: CharIdx) -> CharIdx {
		let mut start = idx.min(self.rope.len_chars());
		while start > 0 && is_token_char(self.rope.char(start - 1)) {
			start -= 1;
		}
		start
	}

	/// Copy of this snapshot with the identifier ending at `idx` replaced by
	/// spaces, together with the position where that identifier starts.
	///
	/// Some engines only complete correctly when asked at the start of a word;
	/// blanking keeps every other offset in the buffer stable.
	pub fn with_word_blanked(&self, idx: CharIdx) -> (Self, Position) {
		let idx = idx.min(self.rope.len_chars());
		let start = self.word_start_before(idx);
		let mut rope = self.rope.clone();
		if start < idx {
			rope.remove(start..idx);
			rope.insert(start, &" ".repeat(idx - start));
		}
		let pos = self.position_of(start);
		(Self::new(rope, self.version), pos)
	}
}
