//! Stacked recurrent classifier: LSTM -> GRU -> dense softmax.

use burn::config::Config;
use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation;

use super::gru::{Gru, GruConfig};
use super::lstm::{Lstm, LstmConfig};

// ─── Configuration ────────────────────────────────────────────────

/// Architecture and optimiser settings of the character model.
#[derive(Config, Debug)]
pub struct CharRnnConfig {
	/// Number of symbols, i.e. one-hot width of inputs and outputs.
	pub vocab_size: usize,
	/// Context length minus one; the model reads `seq_length + 1` symbols.
	pub seq_length: usize,
	/// Hidden units of both recurrent layers.
	#[config(default = 128)]
	pub rnn_units: usize,
	/// Input dropout of both recurrent layers.
	#[config(default = 0.15)]
	pub dropout: f64,
	/// Recurrent dropout of both recurrent layers.
	#[config(default = 0.15)]
	pub recurrent_dropout: f64,
	/// Adam learning rate.
	#[config(default = 3e-4)]
	pub learning_rate: f64,
}

// ─── Network ──────────────────────────────────────────────────────

/// Next-symbol classifier over a one-hot context window.
#[derive(Module, Debug)]
pub struct CharRnn<B: Backend> {
	/// Reads the window, emits a state per position.
	lstm: Lstm<B>,
	/// Summarises the LSTM sequence into its last state.
	gru: Gru<B>,
	/// rnn_units -> vocab_size
	output: Linear<B>,
}

impl CharRnnConfig {
	/// Number of symbols in a context window.
	pub fn window_len(&self) -> usize {
		self.seq_length + 1
	}

	/// Initialize the network.
	pub fn init<B: Backend>(&self, device: &B::Device) -> CharRnn<B> {
		CharRnn {
			lstm: LstmConfig::new(self.vocab_size, self.rnn_units)
				.with_dropout(self.dropout)
				.with_recurrent_dropout(self.recurrent_dropout)
				.init(device),
			gru: GruConfig::new(self.rnn_units, self.rnn_units)
				.with_dropout(self.dropout)
				.with_recurrent_dropout(self.recurrent_dropout)
				.init(device),
			output: LinearConfig::new(self.rnn_units, self.vocab_size).init(device),
		}
	}

	/// Exact number of trainable parameters.
	pub fn param_count(&self) -> usize {
		let (v, u) = (self.vocab_size, self.rnn_units);
		let lstm = 4 * u * v + 4 * u + 4 * u * u;
		let gru = 3 * u * u + 3 * u + 3 * u * u + 3 * u;
		let dense = u * v + v;
		lstm + gru + dense
	}
}

impl<B: Backend> CharRnn<B> {
	/// Forward pass.
	///
	/// - `contexts`: [batch, window_len, vocab_size], one-hot windows
	///
	/// Returns: [batch, vocab_size], unnormalised scores of the next symbol
	pub fn forward(&self, contexts: Tensor<B, 3>) -> Tensor<B, 2> {
		let sequence = self.lstm.forward(contexts);
		let last = self.gru.forward(sequence);
		self.output.forward(last)
	}

	/// Next-symbol probabilities: softmax over [`CharRnn::forward`].
	pub fn forward_proba(&self, contexts: Tensor<B, 3>) -> Tensor<B, 2> {
		activation::softmax(self.forward(contexts), 1)
	}
}

/// Categorical cross-entropy between scores and one-hot targets.
///
/// - `logits`: [batch, vocab]
/// - `targets`: [batch, vocab], one-hot
///
/// Returns: [1], mean over the batch
pub fn cross_entropy<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
	let log_probs = activation::log_softmax(logits, 1);
	(log_probs * targets).sum_dim(1).mean().neg()
}

// ─── Tests ────────────────────────────────────────────────────────
