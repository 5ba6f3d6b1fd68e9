#![cfg_attr(test, allow(unused_crate_dependencies))]
//! Editing core: background semantic parsing and autocompletion for open
//! documents, coordinated with a single owner thread.
//!
//! # Main Types
//!
//! - [`DocumentView`] - One document with its coordinators and UI seams
//! - [`ParseSession`] - Keeps a document's analysis unit current on a
//!   persistent worker thread
//! - [`CompletionSession`] - Computes completion rows in the background
//! - [`EditorConfig`] - Timing and behavior knobs, loaded from TOML
//!
//! # Architecture
//!
//! ```text
//! owner thread                      background
//! ────────────                      ──────────
//! OwnerLoop<DocumentView>  ◀─post── parse worker (one per document)
//!   └── DocumentView       ◀─post── completion executor (one per view)
//!         ├── ParseSession ──StateCell/TaggedMutex──▶ analysis unit
//!         └── CompletionSession
//! ```
//!
//! Workers never touch UI state. They post closures to the view's
//! [`OwnerLoop`](quire_worker::OwnerLoop), which the host pumps from its
//! event loop. The analysis unit is only ever used by one thread at a time:
//! every use happens under the analysis lock.

pub mod completion;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
/// Shared long-lived helper process.
pub mod helper;
pub mod parse;
pub mod snippet;
pub mod ui;
pub mod view;

#[cfg(test)]
pub(crate) mod test_support;

pub use completion::{
	CompletionProvider, CompletionRequest, CompletionRow, CompletionSession, CompletionState, DictionaryCompletion, Insert,
	SemanticCompletion, SnippetEntry,
};
pub use config::{CompletionConfig, EditorConfig};
pub use document::{Document, RopeDocument};
pub use engine::{AnalysisUnit, Candidate, Diagnostic, DiagnosticCounts, ParseResults, SemanticEngine, Severity, Token, TokenKind};
pub use error::{CompletionError, ConfigError, EngineError, HelperError, SnippetParseError, ViewError};
pub use helper::{BackgroundHelper, HelperCommand};
pub use parse::{FullReparse, ParsePhase, ParseSession, ParseState, ProcessState};
pub use ui::{DiagnosticMark, MessageLevel, SelectionEvents, SelectionUi, StatusUi, TooltipProducer};
pub use view::{CloseOutcome, DocumentView, ViewParts};
