//! Single-file snapshot of a trained model: architecture plus weights.
//!
//! The weights are encoded with burn's named MessagePack recorder at full
//! precision and wrapped, together with the [`CharRnnConfig`], in a
//! postcard envelope. A snapshot is enough to rebuild the model for
//! inference; the vocabulary travels separately.

use std::path::Path;

use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkBytesRecorder, Recorder};
use serde::{Deserialize, Serialize};

use crate::error::{ChatgenError, Result};
use crate::io::{read_postcard, write_postcard};

use super::CharModel;
use super::network::CharRnnConfig;

/// Version of the envelope layout.
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct ModelSnapshot {
	version: u32,
	config: CharRnnConfig,
	weights: Vec<u8>,
}

/// Writes `model` to `path`, replacing any previous snapshot.
pub fn save_snapshot<B: Backend, P: AsRef<Path>>(model: &CharModel<B>, path: P) -> Result<()> {
	let recorder = NamedMpkBytesRecorder::<FullPrecisionSettings>::default();
	let record = model.network().clone().into_record();
	let weights = Recorder::<B>::record(&recorder, record, ())?;

	let snapshot = ModelSnapshot {
		version: SNAPSHOT_VERSION,
		config: model.config().clone(),
		weights,
	};
	write_postcard(&snapshot, path)
}

/// Rebuilds a model from a snapshot written by [`save_snapshot`].
///
/// # Errors
/// Returns an error if the file is unreadable, comes from another envelope
/// version, or holds weights that do not fit its own architecture.
pub fn load_snapshot<B: Backend, P: AsRef<Path>>(path: P, device: &B::Device) -> Result<CharModel<B>> {
	let snapshot: ModelSnapshot = read_postcard(path)?;
	if snapshot.version != SNAPSHOT_VERSION {
		return Err(ChatgenError::Serialization(format!(
			"unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
			snapshot.version
		)));
	}

	let recorder = NamedMpkBytesRecorder::<FullPrecisionSettings>::default();
	let record = Recorder::<B>::load(&recorder, snapshot.weights, device)?;
	let network = snapshot.config.init::<B>(device).load_record(record);

	Ok(CharModel::from_parts(network, snapshot.config, device.clone()))
}
