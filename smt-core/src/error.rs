use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised by the translation toolkit.
///
/// Missing probability entries are never errors: they are reported as
/// `Option::None` or resolved by a fallback rule at the call site.
#[derive(Debug, Error)]
pub enum SmtError {
	#[error("I/O error while {context} `{}`: {source}", path.display())]
	Io {
		context: &'static str,
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("parse error while {context} (line {line}): {message}")]
	Parse {
		context: &'static str,
		line: usize,
		message: String,
	},
	#[error("snapshot error while {context}: {message}")]
	Snapshot {
		context: &'static str,
		message: String,
	},
	#[error("invalid configuration: {message}")]
	InvalidConfig { message: String },
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, SmtError>;

impl SmtError {
	pub(crate) fn io<P: AsRef<Path>>(context: &'static str, path: P, source: std::io::Error) -> Self {
		Self::Io { context, path: path.as_ref().to_path_buf(), source }
	}

	pub(crate) fn parse(context: &'static str, line: usize, message: impl Into<String>) -> Self {
		Self::Parse { context, line, message: message.into() }
	}

	pub(crate) fn snapshot(context: &'static str, err: impl std::fmt::Display) -> Self {
		Self::Snapshot { context, message: err.to_string() }
	}

	pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
		Self::InvalidConfig { message: message.into() }
	}
}
