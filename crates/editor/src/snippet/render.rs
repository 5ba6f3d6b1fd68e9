use std::collections::BTreeMap;
use std::ops::Range;

use super::syntax::{FieldKind, Node, SnippetTemplate};

/// Expanded snippet text with tabstop ranges in character offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSnippet {
	pub text: String,
	pub tabstops: BTreeMap<u32, Vec<Range<usize>>>,
}

impl RenderedSnippet {
	/// Where the cursor goes after insertion: the lowest positive tabstop,
	/// else `$0`, else the end of the text.
	pub fn first_stop(&self) -> Range<usize> {
		let positive = self.tabstops.range(1..).next().map(|(_, ranges)| ranges);
		positive
			.or_else(|| self.tabstops.get(&0))
			.and_then(|ranges| ranges.first().cloned())
			.unwrap_or_else(|| {
				let end = self.text.chars().count();
				end..end
			})
	}
}

/// Expands `template`, recording each field's span in the output.
pub fn render(template: &SnippetTemplate) -> RenderedSnippet {
	let mut renderer = Renderer::default();
	renderer.push_nodes(&template.nodes);
	RenderedSnippet {
		text: renderer.text,
		tabstops: renderer.tabstops,
	}
}

#[derive(Default)]
struct Renderer {
	text: String,
	/// Output length in chars; tabstop ranges are char offsets.
	chars: usize,
	tabstops: BTreeMap<u32, Vec<Range<usize>>>,
}

impl Renderer {
	fn push_nodes(&mut self, nodes: &[Node]) {
		for node in nodes {
			match node {
				Node::Text(literal) => {
					self.text.push_str(literal);
					self.chars += literal.chars().count();
				}
				Node::Field(field) => {
					let start = self.chars;
					if let FieldKind::Placeholder(children) = &field.kind {
						self.push_nodes(children);
					}
					self.tabstops.entry(field.index).or_default().push(start..self.chars);
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::render;
	use crate::snippet::parse_snippet_template;

	#[test]
	fn renders_simple_tabstops() {
		let rendered = render(&parse_snippet_template("foo $1 bar $0").unwrap());

		assert_eq!(rendered.text, "foo  bar ");
		assert_eq!(rendered.tabstops[&1], vec![4..4]);
		assert_eq!(rendered.tabstops[&0], vec![9..9]);
		assert_eq!(rendered.first_stop(), 4..4);
	}

	#[test]
	fn renders_nested_placeholder_ranges() {
		let rendered = render(&parse_snippet_template("${1:foo ${2:bar}} baz").unwrap());

		assert_eq!(rendered.text, "foo bar baz");
		assert_eq!(rendered.tabstops[&1], vec![0..7]);
		assert_eq!(rendered.tabstops[&2], vec![4..7]);
	}

	#[test]
	fn ranges_count_characters_not_bytes() {
		let rendered = render(&parse_snippet_template("é ${1:ü}").unwrap());
		assert_eq!(rendered.tabstops[&1], vec![2..3]);
	}

	#[test]
	fn final_stop_used_when_no_numbered_stops() {
		let rendered = render(&parse_snippet_template("return $0;").unwrap());
		assert_eq!(rendered.first_stop(), 7..7);
	}

	#[test]
	fn plain_text_puts_cursor_at_end() {
		let rendered = render(&parse_snippet_template("while").unwrap());
		assert!(rendered.tabstops.is_empty());
		assert_eq!(rendered.first_stop(), 5..5);
	}
}
