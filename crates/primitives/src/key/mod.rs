//! Key events as seen by the trigger policy.
//!
//! Only the key identity matters to the editing core: it decides whether a
//! keystroke continues, restarts, or stops an autocomplete session. Pure
//! modifier presses never count as "the last key".

mod modifiers;

pub use modifiers::Modifiers;

/// Keys without a printable representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
	Enter,
	Tab,
	Backspace,
	Delete,
	Escape,
	Up,
	Down,
	Left,
	Right,
	Home,
	End,
	Shift,
	Control,
	Alt,
	Super,
}

impl NamedKey {
	/// Returns true for keys that only modify other keys.
	pub const fn is_modifier(self) -> bool {
		matches!(self, Self::Shift | Self::Control | Self::Alt | Self::Super)
	}
}

/// Key identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
	Char(char),
	Named(NamedKey),
}

/// A key press together with the modifiers held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key {
	pub code: KeyCode,
	pub modifiers: Modifiers,
}

impl Key {
	/// Unmodified printable key.
	pub const fn char(c: char) -> Self {
		Self {
			code: KeyCode::Char(c),
			modifiers: Modifiers::NONE,
		}
	}

	/// Unmodified named key.
	pub const fn named(key: NamedKey) -> Self {
		Self {
			code: KeyCode::Named(key),
			modifiers: Modifiers::NONE,
		}
	}

	/// Returns a copy with the given modifiers.
	pub const fn with_modifiers(self, modifiers: Modifiers) -> Self {
		Self { modifiers, ..self }
	}

	/// Printable character, if this key produces one.
	pub fn as_char(self) -> Option<char> {
		match self.code {
			KeyCode::Char(c) if !self.modifiers.is_shortcut() => Some(c),
			_ => None,
		}
	}

	/// Returns true for pure modifier presses.
	pub fn is_modifier(self) -> bool {
		matches!(self.code, KeyCode::Named(key) if key.is_modifier())
	}
}

/// The two most recent non-modifier keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyHistory {
	last: Option<Key>,
	previous: Option<Key>,
}

impl KeyHistory {
	pub fn new() -> Self {
		Self::default()
	}

	/// Records a key press. Modifier-only presses are ignored.
	pub fn record(&mut self, key: Key) {
		if key.is_modifier() {
			return;
		}
		self.previous = self.last;
		self.last = Some(key);
	}

	pub fn last(&self) -> Option<Key> {
		self.last
	}

	pub fn previous(&self) -> Option<Key> {
		self.previous
	}

	/// Forgets both keys, e.g. after focus loss.
	pub fn clear(&mut self) {
		*self = Self::default();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn modifier_presses_do_not_shift_history() {
		let mut history = KeyHistory::new();
		history.record(Key::char('-'));
		history.record(Key::named(NamedKey::Shift));
		history.record(Key::char('>'));

		assert_eq!(history.last(), Some(Key::char('>')));
		assert_eq!(history.previous(), Some(Key::char('-')));
	}

	#[test]
	fn shortcut_keys_have_no_char() {
		let key = Key::char(' ').with_modifiers(Modifiers::CTRL);
		assert_eq!(key.as_char(), None);
		assert_eq!(Key::char('x').as_char(), Some('x'));
	}
}
