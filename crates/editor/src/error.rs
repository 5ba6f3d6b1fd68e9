//! Error types for the editing core.

use std::path::PathBuf;

use thiserror::Error;

/// Failure reported by a semantic engine call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
	/// Reparse or unit construction returned a non-zero status.
	#[error("engine returned status {0}")]
	Status(i32),
	/// The engine reported an internal failure.
	#[error("engine failure: {0}")]
	Internal(String),
	/// The engine panicked; the panic was caught at the worker boundary.
	#[error("engine panicked")]
	Panicked,
}

/// Failure while producing completion rows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
	#[error(transparent)]
	Engine(#[from] EngineError),
	/// The provider needs an analysis unit but none is installed.
	#[error("no analysis unit available")]
	NoUnit,
	/// The provider panicked.
	#[error("completion provider panicked")]
	Panicked,
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// TOML syntax or schema error, including unknown keys.
	#[error("invalid configuration: {0}")]
	Toml(#[from] toml::de::Error),

	/// A value parsed but is out of range.
	#[error("invalid value for `{key}`: {reason}")]
	Invalid { key: &'static str, reason: &'static str },
}

/// Failures of the shared background helper process.
#[derive(Debug, Error)]
pub enum HelperError {
	#[error("failed to start helper `{program}`: {error}")]
	Spawn { program: String, error: std::io::Error },
	#[error("helper I/O failed: {0}")]
	Io(#[from] std::io::Error),
	/// The helper did not answer within the request timeout.
	#[error("helper did not respond within {0:?}")]
	Timeout(std::time::Duration),
	/// The helper exited while a request was outstanding.
	#[error("helper exited")]
	Exited,
}

/// Errors surfaced by document view lifecycle operations.
#[derive(Debug, Error)]
pub enum ViewError {
	/// A worker thread could not be created.
	#[error("failed to spawn {worker} worker: {error}")]
	Spawn { worker: &'static str, error: std::io::Error },
}

/// A snippet template could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnippetParseError {
	#[error("unexpected end of snippet at offset {0}")]
	UnexpectedEnd(usize),
	#[error("missing closing `}}` for field opened at offset {0}")]
	Unclosed(usize),
	#[error("tabstop index out of range at offset {0}")]
	IndexOverflow(usize),
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn spawn_error_names_the_worker() {
		let error = ViewError::Spawn {
			worker: "completion",
			error: std::io::Error::other("resource temporarily unavailable"),
		};
		assert_eq!(error.to_string(), "failed to spawn completion worker: resource temporarily unavailable");
	}
}
