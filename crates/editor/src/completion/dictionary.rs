//! Completion from keywords, words already in the buffer, and snippets.
//!
//! Used for languages without a semantic engine. Needs no analysis unit.

use std::borrow::Cow;
use std::collections::BTreeSet;

use parking_lot::Mutex;
use quire_primitives::{CharIdx, Snapshot, is_token_char};
use rustc_hash::FxHashMap;

use super::prefix::{is_identifier_start, word_before};
use super::provider::{CompletionProvider, CompletionRequest, CompletionRow, Insert};
use crate::config::CompletionConfig;
use crate::engine::AnalysisUnit;
use crate::error::CompletionError;

/// A snippet offered by its trigger word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetEntry {
	pub prefix: String,
	pub body: String,
	pub description: Option<String>,
}

impl SnippetEntry {
	pub fn new(prefix: impl Into<String>, body: impl Into<String>) -> Self {
		Self {
			prefix: prefix.into(),
			body: body.into(),
			description: None,
		}
	}

	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());
		self
	}
}

/// Identifier occurrences in the buffer, kept current from edits.
#[derive(Debug, Default)]
struct WordIndex {
	indexed: Option<Snapshot>,
	counts: FxHashMap<String, usize>,
}

impl WordIndex {
	/// Brings the counts up to `snapshot`. Only lines that differ from the
	/// last indexed snapshot are recounted.
	fn refresh(&mut self, snapshot: &Snapshot, min_len: usize) {
		if self.indexed.as_ref().is_some_and(|old| old.version() == snapshot.version()) {
			return;
		}
		let new = snapshot.rope();
		let new_len = new.len_lines();
		let mut head = 0;
		let mut tail = 0;
		if let Some(old) = self.indexed.take() {
			let old = old.rope();
			let old_len = old.len_lines();
			let shared = old_len.min(new_len);
			head = (0..shared).take_while(|&i| old.line(i) == new.line(i)).count();
			tail = (0..shared - head).take_while(|&i| old.line(old_len - 1 - i) == new.line(new_len - 1 - i)).count();
			for line in head..old_len - tail {
				for word in words(&Cow::from(old.line(line)), min_len) {
					if let Some(count) = self.counts.get_mut(word) {
						*count -= 1;
						if *count == 0 {
							self.counts.remove(word);
						}
					}
				}
			}
		}
		for line in head..new_len - tail {
			for word in words(&Cow::from(new.line(line)), min_len) {
				*self.counts.entry(word.to_owned()).or_default() += 1;
			}
		}
		self.indexed = Some(snapshot.clone());
	}
}

fn words(line: &str, min_len: usize) -> impl Iterator<Item = &str> {
	line.split(|c: char| !is_token_char(c))
		.filter(move |word| word.chars().next().is_some_and(is_identifier_start) && word.chars().count() >= min_len)
}

#[derive(Debug)]
pub struct DictionaryCompletion {
	keywords: BTreeSet<String>,
	snippets: Vec<SnippetEntry>,
	min_word_len: usize,
	words: Mutex<WordIndex>,
}

impl DictionaryCompletion {
	pub fn new<I, S>(keywords: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			keywords: keywords.into_iter().map(Into::into).collect(),
			snippets: Vec::new(),
			min_word_len: 3,
			words: Mutex::new(WordIndex::default()),
		}
	}

	pub fn with_snippets(mut self, snippets: impl IntoIterator<Item = SnippetEntry>) -> Self {
		self.snippets.extend(snippets);
		self
	}

	/// Minimum identifier length that triggers interactive completion and
	/// that buffer words must have to be offered.
	pub fn with_min_word_len(mut self, len: usize) -> Self {
		self.min_word_len = len.max(1);
		self
	}

	/// Applies the `[completion]` section of the editor config.
	pub fn with_config(self, config: &CompletionConfig) -> Self {
		self.with_min_word_len(config.min_word_len)
	}
}

impl CompletionProvider for DictionaryCompletion {
	fn name(&self) -> &'static str {
		"dictionary"
	}

	fn run_check(&self, snapshot: &Snapshot, cursor: CharIdx, interactive: bool) -> Option<String> {
		let word = word_before(snapshot, cursor);
		if !interactive {
			return Some(word);
		}
		let starts_ok = word.chars().next().is_some_and(is_identifier_start);
		(starts_ok && word.chars().count() >= self.min_word_len).then_some(word)
	}

	fn add_rows(&self, request: &CompletionRequest, _unit: Option<&mut dyn AnalysisUnit>, rows: &mut Vec<CompletionRow>) -> Result<(), CompletionError> {
		let prefix = request.prefix();

		rows.extend(self.keywords.iter().filter(|keyword| keyword.starts_with(&prefix)).map(CompletionRow::plain));

		let mut words = self.words.lock();
		// No-op when edits already brought the index to this version.
		words.refresh(&request.snapshot, self.min_word_len);
		// The word being typed is itself in the buffer; offer it only if it
		// also appears somewhere else.
		let mut found: Vec<&String> = words
			.counts
			.iter()
			.filter(|&(word, &count)| word.starts_with(&prefix) && !self.keywords.contains(word) && (*word != prefix || count > 1))
			.map(|(word, _)| word)
			.collect();
		found.sort_unstable();
		rows.extend(found.into_iter().map(|word| CompletionRow::plain(word.as_str())));
		drop(words);

		rows.extend(self.snippets.iter().filter(|snippet| snippet.prefix.starts_with(&prefix)).map(|snippet| CompletionRow {
			label: snippet.prefix.clone(),
			insert: Insert::Snippet(snippet.body.clone()),
			detail: snippet.description.clone(),
		}));
		Ok(())
	}

	fn on_buffer_changed(&self, snapshot: &Snapshot) {
		self.words.lock().refresh(snapshot, self.min_word_len);
	}
}
