//! Mini-batch training loop with per-epoch checkpoints.

use std::path::{Path, PathBuf};
use std::time::Instant;

use burn::config::Config;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::ElementConversion;
use burn::tensor::backend::AutodiffBackend;
use log::{error, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::error::{ChatgenError, Result};
use crate::model::CharModel;
use crate::model::network::cross_entropy;

use super::checkpoint::CheckpointDir;
use super::metrics::{EpochMetrics, LossTracker, TrainingReport};

/// Adam epsilon matching the usual Keras default.
const ADAM_EPSILON: f32 = 1e-7;

/// Training loop settings.
#[derive(Config, Debug)]
pub struct TrainingConfig {
	/// Number of passes over the windows.
	#[config(default = 10)]
	pub epochs: usize,
	/// Windows per optimiser step; the last batch of an epoch may be smaller.
	#[config(default = 64)]
	pub batch_size: usize,
	/// Seed of the per-epoch shuffle.
	#[config(default = 42)]
	pub seed: u64,
	#[config(default = true)]
	pub shuffle: bool,
	/// Start from the weights of the latest checkpoint, if any.
	#[config(default = false)]
	pub resume: bool,
}

/// Fits a [`CharModel`] against encoded windows.
///
/// # Responsibilities
/// - Validate the training tensors against the model
/// - Run Adam over shuffled mini-batches for every epoch
/// - Write one checkpoint per completed epoch and a final snapshot
///
/// # Invariants
/// - Checkpoint epochs grow monotonically across runs sharing a directory
/// - Only a resuming run may add checkpoints to a directory that has some
/// - Nothing is written for an epoch whose loss was not finite
/// - The running loss is empty whenever `fit` returns
#[derive(Debug)]
pub struct Trainer {
	config: TrainingConfig,
	checkpoints: CheckpointDir,
	snapshot_path: PathBuf,
	running_loss: LossTracker,
}

impl Trainer {
	pub fn new<C: Into<PathBuf>, S: Into<PathBuf>>(
		config: TrainingConfig,
		checkpoint_dir: C,
		snapshot_path: S,
	) -> Self {
		Self {
			config,
			checkpoints: CheckpointDir::new(checkpoint_dir),
			snapshot_path: snapshot_path.into(),
			running_loss: LossTracker::default(),
		}
	}

	pub fn config(&self) -> &TrainingConfig {
		&self.config
	}

	pub fn checkpoints(&self) -> &CheckpointDir {
		&self.checkpoints
	}

	pub fn snapshot_path(&self) -> &Path {
		&self.snapshot_path
	}

	pub fn running_loss(&self) -> &LossTracker {
		&self.running_loss
	}

	/// Trains `model` on `contexts` [n, window_len, vocab] against one-hot
	/// `targets` [n, vocab].
	///
	/// # Errors
	/// - `InvalidConfig` for a zero batch size or an empty training set
	/// - `ShapeMismatch` if the tensors do not fit the model
	/// - `NonFiniteLoss` as soon as a batch loss is NaN or infinite
	/// - `CheckpointExists` if the checkpoint directory is not empty and
	///   `resume` is off, or if an epoch was already saved
	/// - `Io` or `Record` if persisting fails
	pub fn fit<B: AutodiffBackend>(
		&mut self,
		model: CharModel<B>,
		contexts: Tensor<B, 3>,
		targets: Tensor<B, 2>,
	) -> Result<(CharModel<B>, TrainingReport)> {
		let examples = self.check_inputs(&model, &contexts, &targets)?;
		let result = self.run(model, contexts, targets, examples);
		self.running_loss.reset();
		result
	}

	fn check_inputs<B: Backend>(
		&self,
		model: &CharModel<B>,
		contexts: &Tensor<B, 3>,
		targets: &Tensor<B, 2>,
	) -> Result<usize> {
		if self.config.batch_size == 0 {
			return Err(ChatgenError::InvalidConfig("batch size must be positive".into()));
		}
		let dims = contexts.dims();
		model.check_contexts(dims)?;
		let expected = [dims[0], model.config().vocab_size];
		if targets.dims() != expected {
			return Err(ChatgenError::ShapeMismatch(format!(
				"targets shaped {:?}, expected {expected:?}",
				targets.dims()
			)));
		}
		if dims[0] == 0 {
			return Err(ChatgenError::InvalidConfig("no training windows".into()));
		}
		Ok(dims[0])
	}

	fn run<B: AutodiffBackend>(
		&mut self,
		model: CharModel<B>,
		contexts: Tensor<B, 3>,
		targets: Tensor<B, 2>,
		examples: usize,
	) -> Result<(CharModel<B>, TrainingReport)> {
		let started = Instant::now();
		let device = model.device().clone();
		let config = model.config().clone();
		let mut network = model.into_network();

		let first_epoch = match self.checkpoints.latest()? {
			Some(latest) if !self.config.resume => {
				error!(
					"{} already holds checkpoints up to epoch {latest}; resume or pick another directory",
					self.checkpoints.root().display()
				);
				return Err(ChatgenError::CheckpointExists(self.checkpoints.path_for(latest)));
			}
			Some(latest) => {
				if let Some(loaded) = self.checkpoints.load::<B, _>(network.clone(), latest, &device)? {
					info!("resumed from checkpoint {latest}");
					network = loaded;
				}
				latest + 1
			}
			None => {
				if self.config.resume {
					warn!("no checkpoint to resume from in {}", self.checkpoints.root().display());
				}
				1
			}
		};

		let mut optimizer = AdamConfig::new().with_epsilon(ADAM_EPSILON).init();
		let mut rng = StdRng::seed_from_u64(self.config.seed);
		let mut order: Vec<i32> = (0..examples as i32).collect();
		let mut report = TrainingReport::default();

		info!(
			"training on {examples} windows for {} epochs (batch {}, lr {})",
			self.config.epochs, self.config.batch_size, config.learning_rate
		);

		for epoch in first_epoch..first_epoch + self.config.epochs {
			let epoch_started = Instant::now();
			if self.config.shuffle {
				order.shuffle(&mut rng);
			}

			let mut batches = 0;
			for chunk in order.chunks(self.config.batch_size) {
				let indices = Tensor::<B, 1, Int>::from_data(TensorData::new(chunk.to_vec(), [chunk.len()]), &device);
				let batch_contexts = contexts.clone().select(0, indices.clone());
				let batch_targets = targets.clone().select(0, indices);

				let loss = cross_entropy(network.forward(batch_contexts), batch_targets);
				let value: f32 = loss.clone().into_scalar().elem();
				if !value.is_finite() {
					error!("epoch {epoch}: loss became {value} at batch {batches}, aborting");
					return Err(ChatgenError::NonFiniteLoss { epoch, loss: value });
				}
				self.running_loss.update(value, chunk.len());

				let grads = loss.backward();
				let grads = GradientsParams::from_grads(grads, &network);
				network = optimizer.step(config.learning_rate, network, grads);
				batches += 1;
			}

			let mean_loss = self.running_loss.mean();
			self.running_loss.reset();
			let path = self.checkpoints.save::<B, _>(&network, epoch)?;

			let metrics = EpochMetrics {
				epoch,
				mean_loss,
				batches,
				elapsed: epoch_started.elapsed(),
			};
			info!(
				"epoch {epoch}: loss {mean_loss:.4} over {batches} batches in {:.1?} -> {}",
				metrics.elapsed,
				path.display()
			);
			report.epochs.push(metrics);
		}

		let model = CharModel::from_parts(network, config, device);
		model.valid().save(&self.snapshot_path)?;
		report.total_duration = started.elapsed();
		info!(
			"training done in {:.1?}, snapshot written to {}",
			report.total_duration,
			self.snapshot_path.display()
		);

		Ok((model, report))
	}
}
