//! Text side of the pipeline: corpus, vocabulary, index codec and windowing.
//!
//! Everything here is pure CPU work on strings and indices; tensors are only
//! produced at the very end, by [`encoder::EncodedDataset`].

/// Corpus adapter reading the cleaned text column.
pub mod corpus;

/// Symbol set of the corpus plus the start/end sentinels.
pub mod vocabulary;

/// Deterministic symbol <-> index mapping.
pub mod codec;

/// Sliding windows and one-hot vectorisation.
pub mod encoder;

/// Default start sentinel.
pub const START_TOKEN: char = '\t';

/// Default end sentinel.
pub const END_TOKEN: char = '\n';
