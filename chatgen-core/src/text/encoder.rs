use std::path::Path;

use burn::prelude::*;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{ChatgenError, Result};
use crate::io::{read_postcard, write_postcard};

use super::codec::IndexCodec;

/// One training window: `seq_length + 1` context indices and the index
/// of the symbol that follows them.
///
/// Context positions may hold the pad index (`vocab_size`); the target
/// never does.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EncodedExample {
	context: Vec<usize>,
	target: usize,
}

impl EncodedExample {
	pub fn context(&self) -> &[usize] {
		&self.context
	}

	pub fn target(&self) -> usize {
		self.target
	}
}

/// Writes the one-hot encoding of `indices` into a flat row-major buffer.
///
/// Every index in `0..vocab_size` sets exactly one cell of its row; any
/// other index (the pad index) leaves its row at zero.
pub fn one_hot(indices: &[usize], vocab_size: usize) -> Vec<f32> {
	let mut data = vec![0.0f32; indices.len() * vocab_size];
	for (row, &index) in indices.iter().enumerate() {
		if index < vocab_size {
			data[row * vocab_size + index] = 1.0;
		}
	}
	data
}

/// Turns framed strings into sliding windows over their padded indices.
///
/// # Behavior
/// - Every row is pre-padded to `max_len` with the codec's pad index.
/// - Window `i` of a row is `input[i..=i + seq_length]`, its target is
///   `target[i + seq_length]`, for `i = 0, step, 2 * step, ...` while the
///   window fits in the row.
/// - The number of windows depends on the row's own length only; a row
///   shorter than a window yields none.
/// - Windows whose target is padding are dropped.
#[derive(Debug, Clone)]
pub struct SequenceEncoder<'a> {
	codec: &'a IndexCodec,
	seq_length: usize,
	step: usize,
	max_len: Option<usize>,
}

impl<'a> SequenceEncoder<'a> {
	/// Creates an encoder producing windows of `seq_length + 1` symbols with a stride of 1.
	///
	/// # Errors
	/// Returns an error if `seq_length` is zero.
	pub fn new(codec: &'a IndexCodec, seq_length: usize) -> Result<Self> {
		if seq_length == 0 {
			return Err(ChatgenError::InvalidConfig("seq_length must be > 0".to_owned()));
		}
		Ok(Self { codec, seq_length, step: 1, max_len: None })
	}

	/// Sets the stride between two consecutive windows of a row.
	pub fn with_step(mut self, step: usize) -> Result<Self> {
		if step == 0 {
			return Err(ChatgenError::InvalidConfig("step must be > 0".to_owned()));
		}
		self.step = step;
		Ok(self)
	}

	/// Pads to a fixed length instead of the longest input.
	pub fn with_max_len(mut self, max_len: usize) -> Self {
		self.max_len = Some(max_len);
		self
	}

	/// Number of symbols in one context window.
	pub fn window_len(&self) -> usize {
		self.seq_length + 1
	}

	/// Encodes paired inputs and targets into a dataset of windows.
	///
	/// # Errors
	/// - `ShapeMismatch` if the lists differ in length, if an input and its
	///   target differ in length, or if an input exceeds a fixed `max_len`.
	/// - `UnknownSymbol` if a string holds a character outside the codec.
	pub fn encode<S: AsRef<str>>(&self, inputs: &[S], targets: &[S]) -> Result<EncodedDataset> {
		if inputs.len() != targets.len() {
			return Err(ChatgenError::ShapeMismatch(format!(
				"{} inputs but {} targets",
				inputs.len(),
				targets.len()
			)));
		}

		let longest = inputs.iter().map(|s| s.as_ref().chars().count()).max().unwrap_or(0);
		let max_len = match self.max_len {
			Some(max_len) if longest > max_len => {
				return Err(ChatgenError::ShapeMismatch(format!(
					"input of {longest} symbols exceeds max_len {max_len}"
				)));
			}
			Some(max_len) => max_len,
			None => longest,
		};

		let mut examples = Vec::new();
		for (input, target) in inputs.iter().zip(targets) {
			let input = self.codec.encode(input.as_ref())?;
			let target = self.codec.encode(target.as_ref())?;
			if input.len() != target.len() {
				return Err(ChatgenError::ShapeMismatch(format!(
					"input of {} symbols paired with target of {}",
					input.len(),
					target.len()
				)));
			}
			if target.len() > max_len {
				return Err(ChatgenError::ShapeMismatch(format!(
					"target of {} symbols exceeds max_len {max_len}",
					target.len()
				)));
			}

			let input = self.pad(input, max_len);
			let target = self.pad(target, max_len);
			self.push_windows(&input, &target, &mut examples);
		}

		info!(
			"encoded {} rows (max_len {}) into {} windows of {} symbols",
			inputs.len(),
			max_len,
			examples.len(),
			self.window_len()
		);

		Ok(EncodedDataset {
			examples,
			window_len: self.window_len(),
			vocab_size: self.codec.len(),
			max_len,
		})
	}

	/// Left-pads `row` to `max_len` with the pad index.
	fn pad(&self, row: Vec<usize>, max_len: usize) -> Vec<usize> {
		let mut padded = vec![self.codec.pad_index(); max_len - row.len()];
		padded.extend(row);
		padded
	}

	fn push_windows(&self, input: &[usize], target: &[usize], out: &mut Vec<EncodedExample>) {
		let pad = self.codec.pad_index();
		let before = out.len();

		for i in (0..input.len().saturating_sub(self.seq_length)).step_by(self.step) {
			let next = target[i + self.seq_length];
			if next == pad {
				continue;
			}
			out.push(EncodedExample {
				context: input[i..=i + self.seq_length].to_vec(),
				target: next,
			});
		}

		debug!("row of {} symbols gave {} windows", input.len(), out.len() - before);
	}
}

/// Windows produced by a [`SequenceEncoder`], with the shape they map to.
///
/// Kept on disk for audit and reuse; tensors are rebuilt from it on demand.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EncodedDataset {
	examples: Vec<EncodedExample>,
	window_len: usize,
	vocab_size: usize,
	max_len: usize,
}

impl EncodedDataset {
	pub fn examples(&self) -> &[EncodedExample] {
		&self.examples
	}

	pub fn len(&self) -> usize {
		self.examples.len()
	}

	pub fn is_empty(&self) -> bool {
		self.examples.is_empty()
	}

	pub fn window_len(&self) -> usize {
		self.window_len
	}

	pub fn vocab_size(&self) -> usize {
		self.vocab_size
	}

	pub fn max_len(&self) -> usize {
		self.max_len
	}

	/// Flat one-hot contexts, shaped `[len, window_len, vocab_size]`.
	pub fn context_one_hot(&self) -> Vec<f32> {
		let indices: Vec<usize> = self.examples.iter().flat_map(|e| e.context.iter().copied()).collect();
		one_hot(&indices, self.vocab_size)
	}

	/// Flat one-hot targets, shaped `[len, vocab_size]`.
	pub fn target_one_hot(&self) -> Vec<f32> {
		let indices: Vec<usize> = self.examples.iter().map(|e| e.target).collect();
		one_hot(&indices, self.vocab_size)
	}

	/// Builds the context batch `[len, window_len, vocab_size]` and the
	/// target batch `[len, vocab_size]`.
	pub fn to_tensors<B: Backend>(&self, device: &B::Device) -> (Tensor<B, 3>, Tensor<B, 2>) {
		let n = self.len();
		let contexts = Tensor::from_data(
			TensorData::new(self.context_one_hot(), [n, self.window_len, self.vocab_size]),
			device,
		);
		let targets = Tensor::from_data(TensorData::new(self.target_one_hot(), [n, self.vocab_size]), device);
		(contexts, targets)
	}

	/// Writes the dataset to `path` (postcard).
	pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
		write_postcard(self, path)
	}

	/// Reads a dataset written by [`EncodedDataset::save`].
	///
	/// # Errors
	/// Returns an error if the file is unreadable or if an example does not
	/// match the recorded shape.
	pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
		let dataset: Self = read_postcard(path)?;
		let consistent = dataset.examples.iter().all(|e| {
			e.context.len() == dataset.window_len
				&& e.context.iter().all(|&i| i <= dataset.vocab_size)
				&& e.target < dataset.vocab_size
		});
		if !consistent {
			return Err(ChatgenError::Serialization(
				"persisted dataset does not match its recorded shape".to_owned(),
			));
		}
		Ok(dataset)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::text::corpus::Corpus;
	use crate::text::vocabulary::Vocabulary;
	use crate::text::{END_TOKEN, START_TOKEN};
	use burn::backend::NdArray;

	type B = NdArray;

	fn setup(texts: &[&str]) -> (IndexCodec, Vec<String>, Vec<String>) {
		let corpus = Corpus::from_texts(texts.iter().copied());
		let vocabulary = Vocabulary::build(corpus.texts(), START_TOKEN, END_TOKEN).unwrap();
		let (inputs, targets) = corpus.framed(START_TOKEN, END_TOKEN);
		(IndexCodec::new(&vocabulary), inputs, targets)
	}

	#[test]
	fn windows_predict_the_following_symbol() {
		let (codec, inputs, targets) = setup(&["Dogs", "Cats"]);
		let dataset = SequenceEncoder::new(&codec, 2).unwrap().encode(&inputs, &targets).unwrap();

		// "\tDogs" has 5 symbols -> 3 windows of 3 symbols per row
		assert_eq!(dataset.len(), 6);
		let first = &dataset.examples()[0];
		assert_eq!(codec.decode(first.context()).unwrap(), "\tDo");
		assert_eq!(codec.symbol_of(first.target()).unwrap(), 'g');
		let last = &dataset.examples()[2];
		assert_eq!(codec.decode(last.context()).unwrap(), "ogs");
		assert_eq!(codec.symbol_of(last.target()).unwrap(), '\n');
	}

	#[test]
	fn short_padded_row_gives_no_windows() {
		let (codec, inputs, targets) = setup(&["a short name"]);
		let dataset = SequenceEncoder::new(&codec, 20).unwrap().encode(&inputs, &targets).unwrap();
		assert!(dataset.is_empty());
	}

	#[test]
	fn window_count_follows_row_length_not_row_count() {
		let (codec, inputs, targets) = setup(&["abcdefghij"]);
		let dataset = SequenceEncoder::new(&codec, 3).unwrap().encode(&inputs, &targets).unwrap();
		// 11 symbols, windows of 4 -> 8 windows from a single row
		assert_eq!(dataset.len(), 8);

		let strided = SequenceEncoder::new(&codec, 3)
			.unwrap()
			.with_step(3)
			.unwrap()
			.encode(&inputs, &targets)
			.unwrap();
		assert_eq!(strided.len(), 3);
	}

	#[test]
	fn padding_never_becomes_a_target() {
		let (codec, inputs, targets) = setup(&["abcdefgh", "ab"]);
		let dataset = SequenceEncoder::new(&codec, 2).unwrap().encode(&inputs, &targets).unwrap();
		let pad = codec.pad_index();
		assert!(dataset.examples().iter().all(|e| e.target() != pad));
		// the short row is padded from 3 to 9 symbols; only windows ending in real text survive
		let padded: Vec<_> = dataset.examples().iter().filter(|e| e.context().contains(&pad)).collect();
		assert_eq!(padded.len(), 2);
		assert_eq!(dataset.len(), 7 + 3);
	}

	#[test]
	fn tensors_have_expected_shape_and_rows_sum_to_one() {
		let (codec, inputs, targets) = setup(&["Dogs", "Cats", "Birds"]);
		let dataset = SequenceEncoder::new(&codec, 3).unwrap().encode(&inputs, &targets).unwrap();
		let device = Default::default();
		let (contexts, targets) = dataset.to_tensors::<B>(&device);
		let n = dataset.len();
		assert_eq!(contexts.dims(), [n, 4, codec.len()]);
		assert_eq!(targets.dims(), [n, codec.len()]);

		let target_sums = targets.sum_dim(1).into_data().to_vec::<f32>().unwrap();
		assert!(target_sums.iter().all(|&s| s == 1.0));

		let context_sums = contexts.sum_dim(2).into_data().to_vec::<f32>().unwrap();
		let indices: Vec<usize> = dataset.examples().iter().flat_map(|e| e.context().to_vec()).collect();
		for (sum, index) in context_sums.iter().zip(indices) {
			let expected = if index == codec.pad_index() { 0.0 } else { 1.0 };
			assert_eq!(*sum, expected);
		}
	}

	#[test]
	fn equal_length_rows_are_fully_one_hot() {
		let (codec, inputs, targets) = setup(&["Dogs", "Cats"]);
		let dataset = SequenceEncoder::new(&codec, 1).unwrap().encode(&inputs, &targets).unwrap();
		let (contexts, _) = dataset.to_tensors::<B>(&Default::default());
		let sums = contexts.sum_dim(2).into_data().to_vec::<f32>().unwrap();
		assert!(sums.iter().all(|&s| s == 1.0));
	}

	#[test]
	fn mismatched_inputs_are_rejected() {
		let (codec, inputs, targets) = setup(&["Dogs", "Cats"]);
		let encoder = SequenceEncoder::new(&codec, 2).unwrap();
		assert!(matches!(
			encoder.encode(&inputs[..1], &targets),
			Err(ChatgenError::ShapeMismatch(_))
		));
		assert!(matches!(
			encoder.clone().with_max_len(3).encode(&inputs, &targets),
			Err(ChatgenError::ShapeMismatch(_))
		));
		let unknown = vec!["\tDogz".to_owned()];
		let unknown_targets = vec!["Dogz\n".to_owned()];
		assert!(matches!(
			encoder.encode(&unknown, &unknown_targets),
			Err(ChatgenError::UnknownSymbol('z'))
		));
	}

	#[test]
	fn zero_sizes_are_invalid() {
		let (codec, _, _) = setup(&["Dogs"]);
		assert!(SequenceEncoder::new(&codec, 0).is_err());
		assert!(SequenceEncoder::new(&codec, 2).unwrap().with_step(0).is_err());
	}

	#[test]
	fn dataset_survives_disk() {
		let (codec, inputs, targets) = setup(&["Dogs", "Cats"]);
		let dataset = SequenceEncoder::new(&codec, 2).unwrap().encode(&inputs, &targets).unwrap();
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("nested").join("dataset.bin");
		dataset.save(&path).unwrap();
		assert_eq!(EncodedDataset::load(&path).unwrap(), dataset);
	}
}
