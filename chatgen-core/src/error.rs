//! Error type shared by every stage of the pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Convenient result type used throughout the crate.
pub type Result<T, E = ChatgenError> = std::result::Result<T, E>;

/// Failures raised while building vocabularies, encoding, training or sampling.
#[derive(Debug, Error)]
pub enum ChatgenError {
	/// A character absent from the vocabulary was met while encoding.
	#[error("unknown symbol {0:?}")]
	UnknownSymbol(char),

	/// An index outside the codec range was met while decoding.
	#[error("unknown symbol index {0}")]
	UnknownIndex(usize),

	/// Tensor or sequence dimensions disagree with what a stage expects.
	#[error("shape mismatch: {0}")]
	ShapeMismatch(String),

	/// The training loss became NaN or infinite.
	#[error("non-finite loss {loss} during epoch {epoch}")]
	NonFiniteLoss {
		epoch: usize,
		loss: f32,
	},

	/// A configuration value is outside its valid range.
	#[error("invalid configuration: {0}")]
	InvalidConfig(String),

	/// A checkpoint for this epoch is already on disk.
	#[error("checkpoint already exists: {0:?}")]
	CheckpointExists(PathBuf),

	/// Filesystem IO error with optional context path.
	#[error("io error while processing {path:?}: {source}")]
	Io {
		source: std::io::Error,
		path: Option<PathBuf>,
	},

	/// Serialization or deserialization failure of a persisted artifact.
	#[error("serialization error: {0}")]
	Serialization(String),

	/// Error reported by the burn recorders while saving or loading weights.
	#[error("model record error: {0}")]
	Record(String),
}

impl ChatgenError {
	/// Wraps an IO error, attaching the path it concerns when known.
	pub fn io(source: std::io::Error, path: Option<PathBuf>) -> Self {
		Self::Io { source, path }
	}
}

impl From<std::io::Error> for ChatgenError {
	fn from(err: std::io::Error) -> Self {
		Self::io(err, None)
	}
}

impl From<postcard::Error> for ChatgenError {
	fn from(err: postcard::Error) -> Self {
		Self::Serialization(err.to_string())
	}
}

impl From<burn::record::RecorderError> for ChatgenError {
	fn from(err: burn::record::RecorderError) -> Self {
		Self::Record(err.to_string())
	}
}
