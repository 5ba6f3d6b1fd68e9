use std::sync::Arc;

use parking_lot::Mutex;
use quire_primitives::{CharIdx, Snapshot, is_token_char};

/// The partial identifier being completed.
///
/// Written by the owner when a computation starts and read by the
/// completion worker while filtering, so it sits behind its own lock.
#[derive(Debug, Clone, Default)]
pub struct PrefixBuffer(Arc<Mutex<String>>);

impl PrefixBuffer {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self) -> String {
		self.0.lock().clone()
	}

	pub fn set(&self, prefix: impl Into<String>) {
		*self.0.lock() = prefix.into();
	}

	/// Length in characters.
	pub fn len_chars(&self) -> usize {
		self.0.lock().chars().count()
	}

	pub fn clear(&self) {
		self.0.lock().clear();
	}
}

/// Token characters immediately before `cursor`.
pub(crate) fn word_before(snapshot: &Snapshot, cursor: CharIdx) -> String {
	let start = snapshot.word_start_before(cursor);
	snapshot.rope().slice(start..cursor.min(snapshot.len_chars())).to_string()
}

/// Characters of `line` from the last run of characters matching `keep`.
pub(crate) fn trailing_run(line: &str, keep: impl Fn(char) -> bool) -> &str {
	let start = line.char_indices().rev().take_while(|&(_, c)| keep(c)).last().map_or(line.len(), |(idx, _)| idx);
	&line[start..]
}

pub(crate) fn is_identifier_start(c: char) -> bool {
	is_token_char(c) && !c.is_ascii_digit()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn word_before_stops_at_punctuation() {
		let snapshot = Snapshot::from_text("foo.bar_1", 0);
		assert_eq!(word_before(&snapshot, 9), "bar_1");
		assert_eq!(word_before(&snapshot, 4), "");
		assert_eq!(word_before(&snapshot, 3), "foo");
	}

	#[test]
	fn trailing_run_handles_whole_line_and_none() {
		assert_eq!(trailing_run("abc", |c| c.is_ascii_alphabetic()), "abc");
		assert_eq!(trailing_run("ab.", |c| c.is_ascii_alphabetic()), "");
		assert_eq!(trailing_run("x->yz", |c| c.is_ascii_alphabetic()), "yz");
	}

	#[test]
	fn buffer_is_shared_between_clones() {
		let owner = PrefixBuffer::new();
		let worker = owner.clone();
		owner.set("ret");
		assert_eq!(worker.get(), "ret");
		assert_eq!(worker.len_chars(), 3);
		worker.clear();
		assert_eq!(owner.get(), "");
	}
}
