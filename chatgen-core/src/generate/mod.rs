//! Text generation from a trained model.
//!
//! A [`Sampler`] repeatedly asks a [`NextSymbol`] predictor for the
//! distribution of the next symbol, sharpens or flattens it with a
//! temperature and draws from it with a caller-supplied RNG.

/// Sliding one-hot window over the generated symbols.
pub mod buffer;

/// Temperature sampling state machine.
pub mod sampler;

pub use buffer::GenerationBuffer;
pub use sampler::{NextSymbol, Sampler, SamplerState};
