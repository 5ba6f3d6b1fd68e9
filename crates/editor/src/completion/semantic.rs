//! Completion backed by the semantic engine.

use std::sync::LazyLock;

use quire_primitives::{CharIdx, Key, KeyHistory, Snapshot, is_token_char};
use regex::Regex;
use tracing::warn;

use super::prefix::trailing_run;
use super::provider::{CompletionProvider, CompletionRequest, CompletionRow, Insert};
use crate::config::CompletionConfig;
use crate::engine::AnalysisUnit;
use crate::error::CompletionError;

/// Identifier characters as a regex class body: ASCII word characters plus
/// everything non-ASCII, as in [`is_token_char`].
const WORD: &str = r"a-zA-Z0-9_\x{80}-\x{10FFFF}";
const WORD_START: &str = r"a-zA-Z_\x{80}-\x{10FFFF}";

/// Member access (`x.`, `x->`), scope resolution (`::`), or a bare
/// identifier, matched against the line before the cursor with a leading
/// space. Captures 3 and 5 hold the member prefix, 6 the bare identifier.
static TRIGGER: LazyLock<Option<Regex>> = LazyLock::new(|| {
	let member = format!(r"^.*([{WORD_START}\)\]>]|[^{WORD}][{WORD_START}][{WORD}]*)(\.|->)([{WORD}]*)$");
	let scope = format!(r"^.*(::)([{WORD}]*)$");
	let bare = format!(r"^.*[^{WORD}]([{WORD_START}][{WORD}]*)$");
	Regex::new(&format!("{member}|{scope}|{bare}"))
		.map_err(|error| warn!(%error, "completion.trigger_regex_invalid"))
		.ok()
});

/// Completion for C-family languages using the document's analysis unit.
///
/// The word being completed is blanked before the engine is queried, so the
/// engine sees the cursor at the start of an empty identifier and returns
/// every candidate; rows are then filtered by the typed prefix.
#[derive(Debug, Clone, Copy)]
pub struct SemanticCompletion {
	min_word_len: usize,
}

impl Default for SemanticCompletion {
	fn default() -> Self {
		Self { min_word_len: 3 }
	}
}

impl SemanticCompletion {
	pub fn new() -> Self {
		Self::default()
	}

	/// Identifier length that triggers interactive completion on a bare word.
	/// Member access and scope resolution trigger regardless.
	pub fn with_min_word_len(mut self, len: usize) -> Self {
		self.min_word_len = len.max(1);
		self
	}

	/// Applies the `[completion]` section of the editor config.
	pub fn with_config(self, config: &CompletionConfig) -> Self {
		self.with_min_word_len(config.min_word_len)
	}

	/// Prefix typed after the trigger on `line`, if the trigger matches.
	fn match_trigger(&self, line: &str) -> Option<String> {
		let captures = TRIGGER.as_ref()?.captures(line)?;
		if let Some(member) = captures.get(3).or_else(|| captures.get(5)) {
			return Some(member.as_str().to_owned());
		}
		let word = captures.get(6)?.as_str();
		(word.chars().count() >= self.min_word_len).then(|| word.to_owned())
	}
}

impl CompletionProvider for SemanticCompletion {
	fn name(&self) -> &'static str {
		"semantic"
	}

	fn is_restart_key(&self, history: &KeyHistory) -> bool {
		let last = history.last().and_then(Key::as_char);
		let previous = history.previous().and_then(Key::as_char);
		match last {
			Some('.') => true,
			Some(':') => previous == Some(':'),
			Some('>') => previous == Some('-'),
			_ => false,
		}
	}

	fn run_check(&self, snapshot: &Snapshot, cursor: CharIdx, interactive: bool) -> Option<String> {
		let line = format!(" {}", snapshot.line_before(cursor));
		if let Some(prefix) = self.match_trigger(&line) {
			return Some(prefix);
		}
		if interactive {
			return None;
		}
		Some(trailing_run(&line, is_token_char).to_owned())
	}

	fn strips_word(&self) -> bool {
		true
	}

	fn add_rows(&self, request: &CompletionRequest, unit: Option<&mut dyn AnalysisUnit>, rows: &mut Vec<CompletionRow>) -> Result<(), CompletionError> {
		let unit = unit.ok_or(CompletionError::NoUnit)?;
		let prefix = request.prefix();
		let candidates = unit.complete_at(&request.snapshot, request.position)?;
		rows.extend(candidates.into_iter().filter(|candidate| candidate.text.starts_with(&prefix)).map(|candidate| CompletionRow {
			insert: match candidate.snippet {
				Some(snippet) => Insert::Snippet(snippet),
				None => Insert::Plain(candidate.text.clone()),
			},
			label: candidate.text,
			detail: candidate.detail,
		}));
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	#[rstest]
	#[case::member_access("obj.", Some(""))]
	#[case::member_access_prefix("obj.le", Some("le"))]
	#[case::arrow("ptr->da", Some("da"))]
	#[case::call_result("f().x", Some("x"))]
	#[case::scope("std::vec", Some("vec"))]
	#[case::identifier("int main() { ret", Some("ret"))]
	#[case::short_identifier("int main() { re", None)]
	#[case::leading_digit("x = 1ab", None)]
	#[case::operator_only("a + ", None)]
	fn interactive_trigger(#[case] line: &str, #[case] expected: Option<&str>) {
		let snapshot = Snapshot::from_text(line, 0);
		let prefix = SemanticCompletion::new().run_check(&snapshot, snapshot.len_chars(), true);
		assert_eq!(prefix.as_deref(), expected);
	}

	#[test]
	fn identifier_at_line_start_matches() {
		let snapshot = Snapshot::from_text("int x;\nret", 0);
		let prefix = SemanticCompletion::new().run_check(&snapshot, snapshot.len_chars(), true);
		assert_eq!(prefix.as_deref(), Some("ret"));
	}

	#[test]
	fn explicit_request_uses_trailing_word() {
		let snapshot = Snapshot::from_text("a + re", 0);
		let provider = SemanticCompletion::new();
		assert_eq!(provider.run_check(&snapshot, 6, false).as_deref(), Some("re"));
		assert_eq!(provider.run_check(&snapshot, 4, false).as_deref(), Some(""));
	}

	#[rstest]
	#[case::dot(&['.'], true)]
	#[case::double_colon(&[':', ':'], true)]
	#[case::single_colon(&['a', ':'], false)]
	#[case::arrow(&['-', '>'], true)]
	#[case::greater(&['a', '>'], false)]
	#[case::letter(&['a'], false)]
	fn restart_keys(#[case] keys: &[char], #[case] expected: bool) {
		let mut history = KeyHistory::new();
		for &c in keys {
			history.record(Key::char(c));
		}
		assert_eq!(SemanticCompletion::new().is_restart_key(&history), expected);
	}

	#[test]
	fn continue_keys_are_identifier_chars() {
		let provider = SemanticCompletion::new();
		assert!(provider.is_continue_key(Key::char('a')));
		assert!(provider.is_continue_key(Key::char('_')));
		assert!(provider.is_continue_key(Key::char('7')));
		assert!(provider.is_continue_key(Key::char('é')));
		assert!(!provider.is_continue_key(Key::char('.')));
	}

	#[rstest]
	#[case::default_length(3, "int main() { re", None)]
	#[case::two_chars(2, "int main() { re", Some("re"))]
	#[case::below_configured(2, "int main() { r", None)]
	#[case::member_access_ignores_length(5, "obj.x", Some("x"))]
	#[case::scope_ignores_length(5, "std::v", Some("v"))]
	fn trigger_length_follows_config(#[case] min_word_len: usize, #[case] line: &str, #[case] expected: Option<&str>) {
		let config = CompletionConfig {
			min_word_len,
			..CompletionConfig::default()
		};
		let snapshot = Snapshot::from_text(line, 0);
		let prefix = SemanticCompletion::new().with_config(&config).run_check(&snapshot, snapshot.len_chars(), true);
		assert_eq!(prefix.as_deref(), expected);
	}

	/// The prefix must cover exactly the span that gets blanked, or the
	/// anchor and the erased range disagree.
	#[rstest]
	#[case::ascii("int x = größe_1 + val")]
	#[case::non_ascii_word("auto größe")]
	#[case::non_ascii_member("obj.straße")]
	#[case::explicit("x = ü")]
	fn prefix_matches_blanked_word(#[case] text: &str) {
		let snapshot = Snapshot::from_text(text, 0);
		let cursor = snapshot.len_chars();
		let prefix = SemanticCompletion::new().run_check(&snapshot, cursor, false).unwrap();
		assert_eq!(cursor - snapshot.word_start_before(cursor), prefix.chars().count(), "{text:?} gave {prefix:?}");
	}
}
