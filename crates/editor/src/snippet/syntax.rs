//! Snippet template parser.
//!
//! Grammar:
//!
//! ```text
//! template    := node*
//! node        := text | tabstop | placeholder
//! tabstop     := '$' int | '${' int '}'
//! placeholder := '${' int ':' node* '}'
//! ```
//!
//! `\$`, `\\` and `` \` `` escape anywhere; `\}` escapes inside a
//! placeholder. A `$` that does not start a field is literal text.

use crate::error::SnippetParseError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetTemplate {
	pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
	Text(String),
	Field(Field),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
	/// Tab order; `0` is the final cursor position.
	pub index: u32,
	pub kind: FieldKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
	Tabstop,
	Placeholder(Vec<Node>),
}

pub fn parse_snippet_template(source: &str) -> Result<SnippetTemplate, SnippetParseError> {
	let mut parser = Parser {
		chars: source.chars().collect(),
		pos: 0,
	};
	let nodes = parser.parse_nodes(false)?;
	Ok(SnippetTemplate { nodes })
}

struct Parser {
	chars: Vec<char>,
	pos: usize,
}

impl Parser {
	fn peek(&self) -> Option<char> {
		self.chars.get(self.pos).copied()
	}

	fn peek_at(&self, ahead: usize) -> Option<char> {
		self.chars.get(self.pos + ahead).copied()
	}

	fn parse_nodes(&mut self, in_placeholder: bool) -> Result<Vec<Node>, SnippetParseError> {
		let mut nodes = Vec::new();
		let mut text = String::new();

		while let Some(c) = self.peek() {
			match c {
				'}' if in_placeholder => break,
				'\\' => match self.peek_at(1) {
					Some(next @ ('$' | '\\' | '`')) => {
						text.push(next);
						self.pos += 2;
					}
					Some('}') if in_placeholder => {
						text.push('}');
						self.pos += 2;
					}
					_ => {
						text.push('\\');
						self.pos += 1;
					}
				},
				'$' => match self.parse_field()? {
					Some(field) => {
						if !text.is_empty() {
							nodes.push(Node::Text(std::mem::take(&mut text)));
						}
						nodes.push(Node::Field(field));
					}
					None => {
						text.push('$');
						self.pos += 1;
					}
				},
				_ => {
					text.push(c);
					self.pos += 1;
				}
			}
		}

		if !text.is_empty() {
			nodes.push(Node::Text(text));
		}
		Ok(nodes)
	}

	/// Parses a field starting at the `$` under the cursor. Leaves the cursor
	/// untouched and returns `None` when the `$` is literal.
	fn parse_field(&mut self) -> Result<Option<Field>, SnippetParseError> {
		let start = self.pos;
		match self.peek_at(1) {
			Some(c) if c.is_ascii_digit() => {
				self.pos += 1;
				let index = self.parse_index()?;
				Ok(Some(Field {
					index,
					kind: FieldKind::Tabstop,
				}))
			}
			Some('{') if self.peek_at(2).is_some_and(|c| c.is_ascii_digit()) => {
				self.pos += 2;
				let index = self.parse_index()?;
				let kind = match self.peek() {
					Some('}') => FieldKind::Tabstop,
					Some(':') => {
						self.pos += 1;
						let children = self.parse_nodes(true)?;
						if self.peek() != Some('}') {
							return Err(SnippetParseError::Unclosed(start));
						}
						FieldKind::Placeholder(children)
					}
					Some(_) => return Err(SnippetParseError::Unclosed(start)),
					None => return Err(SnippetParseError::UnexpectedEnd(self.pos)),
				};
				self.pos += 1;
				Ok(Some(Field { index, kind }))
			}
			_ => Ok(None),
		}
	}

	fn parse_index(&mut self) -> Result<u32, SnippetParseError> {
		let start = self.pos;
		let mut index: u32 = 0;
		while let Some(digit) = self.peek().and_then(|c| c.to_digit(10)) {
			index = index
				.checked_mul(10)
				.and_then(|n| n.checked_add(digit))
				.ok_or(SnippetParseError::IndexOverflow(start))?;
			self.pos += 1;
		}
		Ok(index)
	}
}
