//! Semantic engine seam.
//!
//! The engine is opaque: the core only knows how to build an analysis unit
//! from a snapshot, ask it to reparse, and read back tokens, diagnostics and
//! completion candidates. Every call is treated as slow and fallible and is
//! only ever made from a worker thread.

use std::fmt;
use std::sync::Arc;

use quire_primitives::{CharRange, Position, Snapshot};

use crate::error::EngineError;

/// Builds analysis units for one language.
pub trait SemanticEngine: Send + Sync {
	/// Parses `snapshot` from scratch.
	fn create_unit(&self, snapshot: &Snapshot) -> Result<Box<dyn AnalysisUnit>, EngineError>;
}

/// Opaque semantic model of one document.
///
/// Callers guarantee exclusive access: a unit is only touched while its
/// owner holds the analysis lock.
pub trait AnalysisUnit: Send {
	/// Incrementally updates the unit to match `snapshot`.
	fn reparse(&mut self, snapshot: &Snapshot) -> Result<(), EngineError>;

	fn tokens(&self) -> Vec<Token>;

	fn diagnostics(&self) -> Vec<Diagnostic>;

	/// Candidates valid at `position` of `snapshot`.
	fn complete_at(&mut self, snapshot: &Snapshot, position: Position) -> Result<Vec<Candidate>, EngineError>;
}

/// Highlighting class of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
	Keyword,
	Identifier,
	Type,
	Function,
	Literal,
	Comment,
	Punctuation,
	Preprocessor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
	pub range: CharRange,
	pub kind: TokenKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
	Note,
	Warning,
	Error,
}

impl fmt::Display for Severity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Note => "note",
			Self::Warning => "warning",
			Self::Error => "error",
		})
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
	pub range: CharRange,
	pub severity: Severity,
	pub message: String,
}

/// Warning and error totals shown in the status bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagnosticCounts {
	pub warnings: usize,
	pub errors: usize,
}

impl DiagnosticCounts {
	pub fn tally(diagnostics: &[Diagnostic]) -> Self {
		diagnostics.iter().fold(Self::default(), |mut counts, diagnostic| {
			match diagnostic.severity {
				Severity::Warning => counts.warnings += 1,
				Severity::Error => counts.errors += 1,
				Severity::Note => {}
			}
			counts
		})
	}
}

/// One completion result from the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
	/// Text the user types to select this candidate.
	pub text: String,
	/// Templated insertion, when the candidate expands to more than `text`.
	pub snippet: Option<String>,
	/// Signature or return type shown next to the label.
	pub detail: Option<String>,
}

impl Candidate {
	pub fn plain(text: impl Into<String>) -> Self {
		Self {
			text: text.into(),
			snippet: None,
			detail: None,
		}
	}
}

/// Immutable results of one successful parse cycle.
#[derive(Debug, Clone, Default)]
pub struct ParseResults {
	pub tokens: Arc<[Token]>,
	pub diagnostics: Arc<[Diagnostic]>,
}

impl ParseResults {
	pub(crate) fn collect(unit: &dyn AnalysisUnit) -> Self {
		Self {
			tokens: unit.tokens().into(),
			diagnostics: unit.diagnostics().into(),
		}
	}

	pub fn counts(&self) -> DiagnosticCounts {
		DiagnosticCounts::tally(&self.diagnostics)
	}
}
