//! Character-level recurrent model.
//!
//! This module provides:
//! - The recurrent layers (`Lstm`, `Gru`) with input and recurrent dropout
//! - The stacked next-symbol classifier (`CharRnn`) and its configuration
//! - `CharModel`, pairing the network with its architecture for prediction
//!   and persistence
//! - Single-file snapshots of a trained model

/// LSTM layer returning every hidden state.
pub mod lstm;

/// GRU layer returning its last hidden state.
pub mod gru;

/// LSTM -> GRU -> dense softmax classifier and its loss.
pub mod network;

/// Architecture + weights in one file.
pub mod snapshot;

use std::path::Path;

use burn::module::AutodiffModule;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use log::info;

use crate::error::{ChatgenError, Result};
use network::{CharRnn, CharRnnConfig};

/// A character model together with the configuration that shaped it.
///
/// # Responsibilities
/// - Expose next-symbol probabilities for one-hot context windows
/// - Check context shapes before they reach the network
/// - Save and reload itself as a single snapshot file
///
/// # Invariants
/// - `network` was initialised from `config`
#[derive(Debug, Clone)]
pub struct CharModel<B: Backend> {
	network: CharRnn<B>,
	config: CharRnnConfig,
	device: B::Device,
}

/// Builds a freshly initialised model.
///
/// The learning rate is stored with the architecture and used by the
/// trainer's Adam optimiser.
pub fn build<B: Backend>(
	vocab_size: usize,
	seq_length: usize,
	rnn_units: usize,
	learning_rate: f64,
	device: &B::Device,
) -> CharModel<B> {
	let config = CharRnnConfig::new(vocab_size, seq_length)
		.with_rnn_units(rnn_units)
		.with_learning_rate(learning_rate);
	CharModel::new(config, device)
}

impl<B: Backend> CharModel<B> {
	/// Initialises a model from its configuration.
	pub fn new(config: CharRnnConfig, device: &B::Device) -> Self {
		let network = config.init::<B>(device);
		info!(
			"model: lstm({0}) -> gru({0}) -> dense({1}) over windows of {2}, {3} parameters",
			config.rnn_units,
			config.vocab_size,
			config.window_len(),
			config.param_count()
		);
		Self::from_parts(network, config, device.clone())
	}

	pub(crate) fn from_parts(network: CharRnn<B>, config: CharRnnConfig, device: B::Device) -> Self {
		Self { network, config, device }
	}

	pub fn config(&self) -> &CharRnnConfig {
		&self.config
	}

	pub fn network(&self) -> &CharRnn<B> {
		&self.network
	}

	pub fn device(&self) -> &B::Device {
		&self.device
	}

	pub(crate) fn into_network(self) -> CharRnn<B> {
		self.network
	}

	/// Checks that `dims` describes a batch of context windows for this model.
	pub fn check_contexts(&self, dims: [usize; 3]) -> Result<()> {
		let expected = [self.config.window_len(), self.config.vocab_size];
		if dims[1..] != expected {
			return Err(ChatgenError::ShapeMismatch(format!(
				"contexts shaped {dims:?}, model expects [_, {}, {}]",
				expected[0], expected[1]
			)));
		}
		Ok(())
	}

	/// Next-symbol probabilities for a batch of windows.
	///
	/// - `contexts`: [batch, window_len, vocab_size]
	///
	/// Returns: [batch, vocab_size]
	pub fn predict_batch(&self, contexts: Tensor<B, 3>) -> Result<Tensor<B, 2>> {
		self.check_contexts(contexts.dims())?;
		Ok(self.network.forward_proba(contexts))
	}

	/// Probability vector for a single window shaped [1, window_len, vocab_size].
	pub fn predict(&self, context: Tensor<B, 3>) -> Result<Vec<f32>> {
		let batch = context.dims()[0];
		if batch != 1 {
			return Err(ChatgenError::ShapeMismatch(format!("expected a single window, got {batch}")));
		}
		self.predict_batch(context)?
			.into_data()
			.convert::<f32>()
			.to_vec::<f32>()
			.map_err(|e| ChatgenError::ShapeMismatch(format!("{e:?}")))
	}

	/// Writes a snapshot holding the architecture and all weights.
	pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
		snapshot::save_snapshot(self, path)
	}

	/// Loads a snapshot written by [`CharModel::save`].
	pub fn load<P: AsRef<Path>>(path: P, device: &B::Device) -> Result<Self> {
		snapshot::load_snapshot(path, device)
	}
}

impl<B: AutodiffBackend> CharModel<B> {
	/// Same model on the inner backend, with dropout disabled.
	pub fn valid(&self) -> CharModel<B::InnerBackend> {
		CharModel {
			network: self.network.valid(),
			config: self.config.clone(),
			device: self.device.clone(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use burn::backend::{Autodiff, NdArray};

	type B = NdArray;

	#[test]
	fn predict_returns_a_distribution() {
		let device = Default::default();
		let model = build::<B>(9, 3, 8, 3e-4, &device);
		let probs = model.predict(Tensor::zeros([1, 4, 9], &device)).unwrap();
		assert_eq!(probs.len(), 9);
		assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-5);
	}

	#[test]
	fn wrong_shapes_fail_before_the_network() {
		let device = Default::default();
		let model = build::<B>(9, 3, 8, 3e-4, &device);
		assert!(matches!(
			model.predict(Tensor::zeros([1, 5, 9], &device)),
			Err(ChatgenError::ShapeMismatch(_))
		));
		assert!(matches!(
			model.predict(Tensor::zeros([2, 4, 9], &device)),
			Err(ChatgenError::ShapeMismatch(_))
		));
	}

	#[test]
	fn snapshot_restores_predictions() {
		let device = Default::default();
		let model = build::<B>(7, 2, 6, 1e-3, &device);
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("model.snapshot");
		model.save(&path).unwrap();

		let loaded = CharModel::<B>::load(&path, &device).unwrap();
		assert_eq!(loaded.config().rnn_units, 6);
		assert_eq!(loaded.config().learning_rate, 1e-3);

		let context = Tensor::<B, 3>::ones([1, 3, 7], &device);
		let before = model.predict(context.clone()).unwrap();
		let after = loaded.predict(context).unwrap();
		for (a, b) in before.iter().zip(after) {
			assert!((a - b).abs() < 1e-6);
		}
	}

	#[test]
	fn snapshot_from_garbage_fails() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("model.snapshot");
		std::fs::write(&path, b"not a model").unwrap();
		assert!(CharModel::<B>::load(&path, &Default::default()).is_err());
	}

	#[test]
	fn valid_model_predicts_deterministically() {
		let device = Default::default();
		let config = CharRnnConfig::new(9, 3)
			.with_rnn_units(8)
			.with_dropout(0.5)
			.with_recurrent_dropout(0.5);
		let training = CharModel::<Autodiff<B>>::new(config, &device);
		let context = Tensor::<Autodiff<B>, 3>::ones([8, 4, 9], &device);
		let a = training.network().forward(context.clone()).into_data().to_vec::<f32>().unwrap();
		let b = training.network().forward(context).into_data().to_vec::<f32>().unwrap();
		assert_ne!(a, b);

		let inference = training.valid();
		let context = Tensor::<B, 3>::ones([1, 4, 9], &device);
		let first = inference.predict(context.clone()).unwrap();
		let second = inference.predict(context).unwrap();
		assert_eq!(first, second);
	}
}
