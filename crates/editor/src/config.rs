//! Editor core configuration.
//!
//! Loaded from TOML. Every key is optional; missing keys take the defaults
//! below and unknown keys are rejected.
//!
//! ```toml
//! reparse_debounce_ms = 1000
//! worker_poll_ms = 10
//! full_reparse_retry_ms = 100
//! teardown_timeout_ms = 5000
//! interactive_completion = true
//!
//! [completion]
//! min_word_len = 3
//! max_rows = 200
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Timing and behavior knobs for the parse and completion coordinators.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EditorConfig {
	/// Editing idleness required before a delayed soft reparse starts.
	pub reparse_debounce_ms: u64,
	/// Upper bound on how long a parked worker goes without re-checking its state.
	pub worker_poll_ms: u64,
	/// Delay before retrying a full reparse that arrived mid-rebuild.
	pub full_reparse_retry_ms: u64,
	/// How long closing a document waits for an outstanding reparse.
	pub teardown_timeout_ms: u64,
	/// Open completion automatically while typing.
	pub interactive_completion: bool,
	pub completion: CompletionConfig,
}

/// Completion-specific settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompletionConfig {
	/// Token characters needed before interactive completion triggers on a bare word.
	pub min_word_len: usize,
	/// Cap on rows handed to the selection UI.
	pub max_rows: Option<usize>,
}

impl Default for EditorConfig {
	fn default() -> Self {
		Self {
			reparse_debounce_ms: 1000,
			worker_poll_ms: 10,
			full_reparse_retry_ms: 100,
			teardown_timeout_ms: 5000,
			interactive_completion: true,
			completion: CompletionConfig::default(),
		}
	}
}

impl Default for CompletionConfig {
	fn default() -> Self {
		Self {
			min_word_len: 3,
			max_rows: None,
		}
	}
}

impl EditorConfig {
	/// Parses configuration from TOML text.
	pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(text)?;
		config.validate()?;
		Ok(config)
	}

	/// Reads and parses a configuration file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let text = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		let config = Self::from_toml_str(&text)?;
		tracing::debug!(path = %path.display(), "config.loaded");
		Ok(config)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.worker_poll_ms == 0 {
			return Err(ConfigError::Invalid {
				key: "worker_poll_ms",
				reason: "must be at least 1",
			});
		}
		if self.completion.min_word_len == 0 {
			return Err(ConfigError::Invalid {
				key: "completion.min_word_len",
				reason: "must be at least 1",
			});
		}
		Ok(())
	}

	pub fn reparse_debounce(&self) -> Duration {
		Duration::from_millis(self.reparse_debounce_ms)
	}

	pub fn worker_poll(&self) -> Duration {
		Duration::from_millis(self.worker_poll_ms)
	}

	pub fn full_reparse_retry(&self) -> Duration {
		Duration::from_millis(self.full_reparse_retry_ms)
	}

	pub fn teardown_timeout(&self) -> Duration {
		Duration::from_millis(self.teardown_timeout_ms)
	}
}
