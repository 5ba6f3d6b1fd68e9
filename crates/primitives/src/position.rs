use std::fmt;

/// A zero-based line and character column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Position {
	pub line: usize,
	pub column: usize,
}

impl Position {
	pub const fn new(line: usize, column: usize) -> Self {
		Self { line, column }
	}

	/// Line and column counted from one, as most engines and compilers report them.
	pub const fn one_based(self) -> (usize, usize) {
		(self.line + 1, self.column + 1)
	}
}

impl fmt::Display for Position {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let (line, column) = self.one_based();
		write!(f, "{line}:{column}")
	}
}
