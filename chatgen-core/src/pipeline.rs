//! End-to-end training and the context handed over to generation.
//!
//! [`Pipeline::run`] goes from a corpus to a trained model, writing every
//! artifact into one output directory:
//!
//! - `vocab.bin`: the [`Vocabulary`]
//! - `dataset.bin`: the encoded windows
//! - `training_checkpoints/ckpt_{epoch}.mpk`: per-epoch weights
//! - `model.snapshot`: the final model
//!
//! A [`GenerationContext`] carries the vocabulary, its codec and the model
//! from training to sampling, or rebuilds them from those artifacts.

use std::path::{Path, PathBuf};

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use log::info;
use rand::Rng;

use crate::error::{ChatgenError, Result};
use crate::generate::Sampler;
use crate::model::CharModel;
use crate::model::network::CharRnnConfig;
use crate::text::codec::IndexCodec;
use crate::text::corpus::Corpus;
use crate::text::encoder::SequenceEncoder;
use crate::text::vocabulary::Vocabulary;
use crate::text::{END_TOKEN, START_TOKEN};
use crate::train::{CheckpointDir, Trainer, TrainingConfig, TrainingReport};

pub const VOCAB_FILE: &str = "vocab.bin";
pub const DATASET_FILE: &str = "dataset.bin";
pub const CHECKPOINT_DIR: &str = "training_checkpoints";
pub const SNAPSHOT_FILE: &str = "model.snapshot";

/// Settings of a full training run.
///
/// Architecture settings other than the vocabulary size live here; the
/// vocabulary size is only known once the corpus has been read.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
	/// Context length minus one.
	pub seq_length: usize,
	/// Stride between consecutive windows of a text.
	pub step: usize,
	/// Texts with this many characters or more are skipped.
	pub max_chars: Option<usize>,
	pub start: char,
	pub end: char,
	pub rnn_units: usize,
	pub dropout: f64,
	pub recurrent_dropout: f64,
	pub learning_rate: f64,
	pub training: TrainingConfig,
}

impl Default for PipelineConfig {
	fn default() -> Self {
		Self {
			seq_length: 20,
			step: 1,
			max_chars: Some(120),
			start: START_TOKEN,
			end: END_TOKEN,
			rnn_units: 128,
			dropout: 0.15,
			recurrent_dropout: 0.15,
			learning_rate: 3e-4,
			training: TrainingConfig::new(),
		}
	}
}

impl PipelineConfig {
	/// Model configuration for a vocabulary of `vocab_size` symbols.
	pub fn model_config(&self, vocab_size: usize) -> CharRnnConfig {
		CharRnnConfig::new(vocab_size, self.seq_length)
			.with_rnn_units(self.rnn_units)
			.with_dropout(self.dropout)
			.with_recurrent_dropout(self.recurrent_dropout)
			.with_learning_rate(self.learning_rate)
	}
}

/// Corpus-to-model training run writing its artifacts to `out_dir`.
#[derive(Debug, Clone)]
pub struct Pipeline {
	config: PipelineConfig,
	out_dir: PathBuf,
}

impl Pipeline {
	pub fn new<P: Into<PathBuf>>(config: PipelineConfig, out_dir: P) -> Self {
		Self {
			config,
			out_dir: out_dir.into(),
		}
	}

	pub fn config(&self) -> &PipelineConfig {
		&self.config
	}

	pub fn out_dir(&self) -> &Path {
		&self.out_dir
	}

	/// Builds the vocabulary, encodes the corpus and trains a fresh model.
	///
	/// # Errors
	/// Propagates the failures of every stage; see [`Trainer::fit`] for
	/// the training ones.
	pub fn run<B: AutodiffBackend>(
		&self,
		corpus: Corpus,
		device: &B::Device,
	) -> Result<(GenerationContext<B::InnerBackend>, TrainingReport)> {
		let config = &self.config;
		let checkpoints = CheckpointDir::new(self.out_dir.join(CHECKPOINT_DIR));
		if !config.training.resume {
			if let Some(latest) = checkpoints.latest()? {
				return Err(ChatgenError::CheckpointExists(checkpoints.path_for(latest)));
			}
		}
		let corpus = corpus.shorter_than(config.max_chars);

		let vocabulary = Vocabulary::build_parallel(corpus.texts(), config.start, config.end)?;
		vocabulary.save(self.out_dir.join(VOCAB_FILE))?;
		let codec = IndexCodec::new(&vocabulary);

		let (inputs, targets) = corpus.framed(config.start, config.end);
		let dataset = SequenceEncoder::new(&codec, config.seq_length)?
			.with_step(config.step)?
			.encode(&inputs, &targets)?;
		dataset.save(self.out_dir.join(DATASET_FILE))?;
		info!(
			"{} texts encoded into {} windows of {} symbols",
			corpus.len(),
			dataset.len(),
			dataset.window_len()
		);

		let (contexts, targets) = dataset.to_tensors::<B>(device);
		let model = CharModel::<B>::new(config.model_config(codec.len()), device);
		let mut trainer = Trainer::new(
			config.training.clone(),
			self.out_dir.join(CHECKPOINT_DIR),
			self.out_dir.join(SNAPSHOT_FILE),
		);
		let (model, report) = trainer.fit(model, contexts, targets)?;

		let context = GenerationContext::new(vocabulary, model.valid())?;
		Ok((context, report))
	}
}

/// Everything the sampler needs: vocabulary, codec and model.
///
/// # Invariants
/// - The model predicts exactly `codec.len()` symbols
#[derive(Debug, Clone)]
pub struct GenerationContext<B: Backend> {
	vocabulary: Vocabulary,
	codec: IndexCodec,
	model: CharModel<B>,
}

impl<B: Backend> GenerationContext<B> {
	/// # Errors
	/// Returns `ShapeMismatch` if the model was trained for another vocabulary size.
	pub fn new(vocabulary: Vocabulary, model: CharModel<B>) -> Result<Self> {
		let codec = IndexCodec::new(&vocabulary);
		if model.config().vocab_size != codec.len() {
			return Err(ChatgenError::ShapeMismatch(format!(
				"model trained on {} symbols, vocabulary has {}",
				model.config().vocab_size,
				codec.len()
			)));
		}
		Ok(Self {
			vocabulary,
			codec,
			model,
		})
	}

	/// Rebuilds a context from a model snapshot and a saved vocabulary.
	pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(snapshot: P, vocabulary: Q, device: &B::Device) -> Result<Self> {
		let vocabulary = Vocabulary::load(vocabulary)?;
		let model = CharModel::load(snapshot, device)?;
		Self::new(vocabulary, model)
	}

	/// Same as [`GenerationContext::load`] with the default artifact names of `out_dir`.
	pub fn from_dir<P: AsRef<Path>>(out_dir: P, device: &B::Device) -> Result<Self> {
		let out_dir = out_dir.as_ref();
		Self::load(out_dir.join(SNAPSHOT_FILE), out_dir.join(VOCAB_FILE), device)
	}

	pub fn vocabulary(&self) -> &Vocabulary {
		&self.vocabulary
	}

	pub fn codec(&self) -> &IndexCodec {
		&self.codec
	}

	pub fn model(&self) -> &CharModel<B> {
		&self.model
	}

	pub fn sampler(&self) -> Result<Sampler<'_, CharModel<B>>> {
		Sampler::new(&self.model, &self.vocabulary, &self.codec)
	}

	/// Generates `n` texts of at most `max_len` symbols.
	pub fn generate<R: Rng>(&self, n: usize, max_len: usize, temperature: f64, rng: &mut R) -> Result<Vec<String>> {
		self.sampler()?.generate(n, max_len, temperature, rng)
	}
}
