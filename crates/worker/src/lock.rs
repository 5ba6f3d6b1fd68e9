//! Mutual exclusion with an observable holder tag.
//!
//! The analysis lock is contended by two very different parties: the parse
//! worker, which holds it for the length of an engine call, and the
//! completion worker, which must wait for it. Recording who holds the lock
//! lets status code and tests tell the two apart without touching the value.

use std::fmt;
use std::ops::{Deref, DerefMut};

use parking_lot::{Mutex, MutexGuard};

/// A mutex that remembers which party currently holds it.
pub struct TaggedMutex<T> {
	value: Mutex<T>,
	holder: Mutex<Option<&'static str>>,
}

impl<T> TaggedMutex<T> {
	pub fn new(value: T) -> Self {
		Self {
			value: Mutex::new(value),
			holder: Mutex::new(None),
		}
	}

	/// Blocks until the lock is acquired. Never call this from the owner thread.
	pub fn lock(&self, tag: &'static str) -> TaggedGuard<'_, T> {
		let guard = self.value.lock();
		self.acquired(guard, tag)
	}

	/// Acquires the lock only if it is free right now.
	pub fn try_lock(&self, tag: &'static str) -> Option<TaggedGuard<'_, T>> {
		let guard = self.value.try_lock()?;
		Some(self.acquired(guard, tag))
	}

	/// Tag of the current holder, if any.
	pub fn holder(&self) -> Option<&'static str> {
		*self.holder.lock()
	}

	pub fn is_locked(&self) -> bool {
		self.value.is_locked()
	}

	pub fn into_inner(self) -> T {
		self.value.into_inner()
	}

	fn acquired<'a>(&'a self, guard: MutexGuard<'a, T>, tag: &'static str) -> TaggedGuard<'a, T> {
		*self.holder.lock() = Some(tag);
		TaggedGuard {
			guard,
			holder: &self.holder,
			tag,
		}
	}
}

impl<T> fmt::Debug for TaggedMutex<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TaggedMutex").field("holder", &self.holder()).finish_non_exhaustive()
	}
}

/// Scoped access to a [`TaggedMutex`]; clears the holder tag on drop.
pub struct TaggedGuard<'a, T> {
	guard: MutexGuard<'a, T>,
	holder: &'a Mutex<Option<&'static str>>,
	tag: &'static str,
}

impl<T> TaggedGuard<'_, T> {
	pub fn tag(&self) -> &'static str {
		self.tag
	}
}

impl<T> Deref for TaggedGuard<'_, T> {
	type Target = T;

	fn deref(&self) -> &T {
		&self.guard
	}
}

impl<T> DerefMut for TaggedGuard<'_, T> {
	fn deref_mut(&mut self) -> &mut T {
		&mut self.guard
	}
}

impl<T> Drop for TaggedGuard<'_, T> {
	fn drop(&mut self) {
		*self.holder.lock() = None;
	}
}
