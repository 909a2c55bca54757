//! Per-epoch checkpoints.
//!
//! Uses burn's native record format (NamedMpk) for model weights.
//! One weights-only file per completed epoch: `{dir}/ckpt_{epoch}.mpk`.

use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};

use crate::error::{ChatgenError, Result};
use crate::io::{create_dir, list_file_stems};

const PREFIX: &str = "ckpt_";
const EXTENSION: &str = "mpk";

/// Directory holding the checkpoints of a training run.
///
/// # Invariants
/// - A checkpoint file, once written, is never overwritten
#[derive(Debug, Clone)]
pub struct CheckpointDir {
	root: PathBuf,
}

impl CheckpointDir {
	pub fn new<P: Into<PathBuf>>(root: P) -> Self {
		Self { root: root.into() }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Path burn is given for `epoch`; the recorder appends `.mpk`.
	fn stem_path(&self, epoch: usize) -> PathBuf {
		self.root.join(format!("{PREFIX}{epoch}"))
	}

	/// Full path of the checkpoint file of `epoch`.
	pub fn path_for(&self, epoch: usize) -> PathBuf {
		self.stem_path(epoch).with_extension(EXTENSION)
	}

	/// Save the weights of `model` as the checkpoint of `epoch`.
	///
	/// Uses NamedMpk format with full precision (lossless).
	///
	/// # Errors
	/// Returns `CheckpointExists` if this epoch was already saved.
	pub fn save<B: Backend, M: Module<B>>(&self, model: &M, epoch: usize) -> Result<PathBuf> {
		let full_path = self.path_for(epoch);
		if full_path.exists() {
			return Err(ChatgenError::CheckpointExists(full_path));
		}
		create_dir(&self.root)?;

		let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
		model.clone().save_file(self.stem_path(epoch), &recorder)?;
		Ok(full_path)
	}

	/// Load the weights of `epoch` into `model`.
	///
	/// Returns `None` if that checkpoint does not exist.
	pub fn load<B: Backend, M: Module<B>>(
		&self,
		model: M,
		epoch: usize,
		device: &B::Device,
	) -> Result<Option<M>> {
		if !self.path_for(epoch).exists() {
			return Ok(None);
		}
		let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
		let loaded = model.load_file(self.stem_path(epoch), &recorder, device)?;
		Ok(Some(loaded))
	}

	/// Epochs with a checkpoint on disk, in increasing order.
	pub fn epochs(&self) -> Result<Vec<usize>> {
		let mut epochs: Vec<usize> = list_file_stems(&self.root, EXTENSION)?
			.iter()
			.filter_map(|stem| stem.strip_prefix(PREFIX)?.parse().ok())
			.collect();
		epochs.sort_unstable();
		Ok(epochs)
	}

	/// Most recent checkpointed epoch.
	pub fn latest(&self) -> Result<Option<usize>> {
		Ok(self.epochs()?.last().copied())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::network::CharRnnConfig;
	use burn::backend::NdArray;

	type B = NdArray;

	#[test]
	fn checkpoints_are_listed_by_epoch() {
		let dir = tempfile::tempdir().unwrap();
		let checkpoints = CheckpointDir::new(dir.path().join("ckpt"));
		assert_eq!(checkpoints.latest().unwrap(), None);

		let device = Default::default();
		let network = CharRnnConfig::new(5, 2).with_rnn_units(4).init::<B>(&device);
		for epoch in [2, 10, 1] {
			let path = checkpoints.save::<B, _>(&network, epoch).unwrap();
			assert!(path.exists());
		}
		std::fs::write(dir.path().join("ckpt").join("notes.mpk"), b"").unwrap();

		assert_eq!(checkpoints.epochs().unwrap(), vec![1, 2, 10]);
		assert_eq!(checkpoints.latest().unwrap(), Some(10));
		assert!(checkpoints.path_for(10).ends_with("ckpt_10.mpk"));
	}

	#[test]
	fn existing_checkpoint_is_never_overwritten() {
		let dir = tempfile::tempdir().unwrap();
		let checkpoints = CheckpointDir::new(dir.path());
		let device = Default::default();
		let network = CharRnnConfig::new(5, 2).with_rnn_units(4).init::<B>(&device);

		checkpoints.save::<B, _>(&network, 1).unwrap();
		assert!(matches!(
			checkpoints.save::<B, _>(&network, 1),
			Err(ChatgenError::CheckpointExists(_))
		));
	}

	#[test]
	fn load_round_trips_weights() {
		let dir = tempfile::tempdir().unwrap();
		let checkpoints = CheckpointDir::new(dir.path());
		let device = Default::default();
		let config = CharRnnConfig::new(5, 2).with_rnn_units(4);
		let saved = config.init::<B>(&device);
		checkpoints.save::<B, _>(&saved, 3).unwrap();

		assert!(checkpoints.load::<B, _>(config.init::<B>(&device), 4, &device).unwrap().is_none());
		let loaded = checkpoints.load::<B, _>(config.init::<B>(&device), 3, &device).unwrap().unwrap();

		let x = Tensor::<B, 3>::ones([1, 3, 5], &device);
		let a = saved.forward(x.clone()).into_data().to_vec::<f32>().unwrap();
		let b = loaded.forward(x).into_data().to_vec::<f32>().unwrap();
		assert_eq!(a, b);
	}
}
