//! Character-level text generation library.
//!
//! This crate learns to produce short strings (chat names, nicknames...)
//! from a corpus of examples, one character at a time:
//! - Vocabulary building, deterministic symbol indexing and windowing
//! - A stacked LSTM -> GRU -> softmax classifier built with `burn`
//! - Mini-batch training with per-epoch checkpoints
//! - Temperature sampling with an injectable random source
//!
//! Low-level file helpers are kept internal.

/// Crate-wide error type.
pub mod error;

/// Corpus, vocabulary, index codec and sequence encoding.
pub mod text;

/// Recurrent next-symbol model and its persistence.
pub mod model;

/// Training loop, checkpoints and metrics.
pub mod train;

/// Temperature sampling of new texts.
pub mod generate;

/// Corpus-to-model run and the generation context.
pub mod pipeline;

/// I/O utilities (line reading, postcard files, directory listing).
///
/// Not exposed
pub(crate) mod io;

pub use error::{ChatgenError, Result};
pub use pipeline::{GenerationContext, Pipeline, PipelineConfig};
