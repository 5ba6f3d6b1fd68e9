/// A position in the text, measured in characters (not bytes).
pub type CharIdx = usize;

/// A length or count in the text, measured in characters (not bytes).
pub type CharLen = usize;

/// A half-open character range `start..end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CharRange {
	pub start: CharIdx,
	pub end: CharIdx,
}

impl CharRange {
	/// Creates a range, swapping the ends if given in reverse.
	pub fn new(start: CharIdx, end: CharIdx) -> Self {
		if start <= end { Self { start, end } } else { Self { start: end, end: start } }
	}

	pub fn point(pos: CharIdx) -> Self {
		Self { start: pos, end: pos }
	}

	pub fn len(&self) -> CharLen {
		self.end - self.start
	}

	pub fn is_empty(&self) -> bool {
		self.start == self.end
	}

	pub fn contains(&self, pos: CharIdx) -> bool {
		self.start <= pos && pos < self.end
	}

	/// Clamps both ends to `max`.
	pub fn clamp(self, max: CharIdx) -> Self {
		Self {
			start: self.start.min(max),
			end: self.end.min(max),
		}
	}
}

impl From<std::ops::Range<CharIdx>> for CharRange {
	fn from(range: std::ops::Range<CharIdx>) -> Self {
		Self::new(range.start, range.end)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reversed_ends_are_normalized() {
		let range = CharRange::new(7, 3);
		assert_eq!(range, CharRange { start: 3, end: 7 });
		assert_eq!(range.len(), 4);
		assert!(range.contains(3));
		assert!(!range.contains(7));
	}

	#[test]
	fn clamp_keeps_range_inside_text() {
		assert_eq!(CharRange::new(2, 20).clamp(10), CharRange::new(2, 10));
		assert!(CharRange::new(12, 20).clamp(10).is_empty());
	}
}
