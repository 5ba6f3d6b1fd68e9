//! UI collaborator seams.
//!
//! The core never renders. It drives a selection list and a status area
//! through these traits; all calls happen on the owner thread.

use quire_primitives::{CharIdx, CharRange, Position};

use crate::engine::{DiagnosticCounts, Severity, Token};

/// Builds tooltip text on demand.
pub type TooltipProducer = Box<dyn Fn() -> String>;

/// Completion list collaborator.
pub trait SelectionUi {
	/// Starts a new list anchored at the start of the word being completed.
	fn open_session(&mut self, anchor: CharIdx);

	fn add_row(&mut self, text: &str);

	fn show(&mut self);

	fn hide(&mut self);

	fn is_visible(&self) -> bool;
}

/// Callbacks the selection UI delivers back to its view.
pub trait SelectionEvents {
	/// Highlight moved to `index`, or off every row.
	fn on_change(&mut self, index: Option<usize>);

	/// Row `index` chosen. `commit` is false while the user is still cycling
	/// through rows and true when the choice is final.
	fn on_select(&mut self, index: usize, text: &str, commit: bool);

	/// The list closed.
	fn on_hide(&mut self);
}

/// Severity of a user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
	Info,
	Warning,
	Error,
}

/// A diagnostic range with its lazily formatted tooltip.
pub struct DiagnosticMark {
	pub range: CharRange,
	pub severity: Severity,
	pub tooltip: TooltipProducer,
}

impl std::fmt::Debug for DiagnosticMark {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DiagnosticMark")
			.field("range", &self.range)
			.field("severity", &self.severity)
			.finish_non_exhaustive()
	}
}

/// Status bar, tooltips and message log.
pub trait StatusUi {
	/// Busy indicator; empty when idle.
	fn update_status(&mut self, status: &str);

	fn update_diagnostic_counts(&mut self, counts: DiagnosticCounts);

	fn set_diagnostics(&mut self, marks: Vec<DiagnosticMark>);

	fn update_syntax(&mut self, tokens: &[Token]);

	fn show_tooltip(&mut self, at: Position, text: &str);

	fn hide_tooltips(&mut self);

	fn message(&mut self, level: MessageLevel, text: &str);
}
