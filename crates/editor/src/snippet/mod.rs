//! Snippet templates: `$1`, `${2:placeholder}`, escapes and the `$0` final stop.

mod render;
mod syntax;

pub use render::{RenderedSnippet, render};
pub use syntax::{Field, FieldKind, Node, SnippetTemplate, parse_snippet_template};

use crate::error::SnippetParseError;

/// Turns a templated completion insertion into text plus tabstops.
pub trait SnippetExpander {
	fn expand(&self, template: &str) -> Result<RenderedSnippet, SnippetParseError>;
}

/// Default expander using the built-in template syntax.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateExpander;

impl SnippetExpander for TemplateExpander {
	fn expand(&self, template: &str) -> Result<RenderedSnippet, SnippetParseError> {
		parse_snippet_template(template).map(|parsed| render(&parsed))
	}
}
