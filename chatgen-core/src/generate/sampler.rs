use burn::prelude::*;
use log::debug;
use rand::Rng;

use crate::error::{ChatgenError, Result};
use crate::model::CharModel;
use crate::text::codec::IndexCodec;
use crate::text::vocabulary::Vocabulary;

use super::buffer::GenerationBuffer;

/// Floor applied to probabilities before taking their logarithm.
const EPSILON: f64 = 1e-12;

/// Anything able to predict the next symbol from a generation buffer.
///
/// Implemented by [`CharModel`]; tests plug in fixed distributions.
pub trait NextSymbol {
	/// Number of symbols the predictor reads.
	fn window_len(&self) -> usize;

	/// Length of the distributions it returns.
	fn vocab_size(&self) -> usize;

	/// Probability of every symbol following the buffer's content.
	fn next_distribution(&self, buffer: &GenerationBuffer) -> Result<Vec<f32>>;
}

impl<B: Backend> NextSymbol for CharModel<B> {
	fn window_len(&self) -> usize {
		self.config().window_len()
	}

	fn vocab_size(&self) -> usize {
		self.config().vocab_size
	}

	fn next_distribution(&self, buffer: &GenerationBuffer) -> Result<Vec<f32>> {
		let context = Tensor::<B, 3>::from_data(TensorData::new(buffer.to_one_hot(), buffer.dims()), self.device());
		self.predict(context)
	}
}

/// State of a single generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
	Generating,
	Done,
}

/// Temperature-controlled text generation.
///
/// # Responsibilities
/// - Feed the model a sliding window of what was generated so far
/// - Rescale each distribution by the temperature and draw from it
/// - Stop on the end sentinel or once `max_len` symbols were produced
///
/// # Invariants
/// - Generated texts never contain the end sentinel
/// - Generated texts hold at most `max_len` symbols
#[derive(Debug)]
pub struct Sampler<'a, M> {
	model: &'a M,
	codec: &'a IndexCodec,
	start: usize,
	end: usize,
}

impl<'a, M: NextSymbol> Sampler<'a, M> {
	/// # Errors
	/// - `ShapeMismatch` if the model's vocabulary size differs from the codec's
	/// - `UnknownSymbol` if a sentinel of `vocabulary` is missing from `codec`
	pub fn new(model: &'a M, vocabulary: &Vocabulary, codec: &'a IndexCodec) -> Result<Self> {
		if model.vocab_size() != codec.len() {
			return Err(ChatgenError::ShapeMismatch(format!(
				"model predicts {} symbols, codec knows {}",
				model.vocab_size(),
				codec.len()
			)));
		}
		Ok(Self {
			model,
			codec,
			start: codec.index_of(vocabulary.start())?,
			end: codec.index_of(vocabulary.end())?,
		})
	}

	/// Generates `n` independent texts.
	pub fn generate<R: Rng>(
		&self,
		n: usize,
		max_len: usize,
		temperature: f64,
		rng: &mut R,
	) -> Result<Vec<String>> {
		check_temperature(temperature)?;
		(0..n).map(|_| self.generate_one(max_len, temperature, rng)).collect()
	}

	/// Generates a single text of at most `max_len` symbols.
	pub fn generate_one<R: Rng>(&self, max_len: usize, temperature: f64, rng: &mut R) -> Result<String> {
		check_temperature(temperature)?;
		let mut buffer = GenerationBuffer::new(self.model.window_len(), self.codec.len(), self.start)?;
		let mut text = String::new();
		let mut state = SamplerState::Generating;

		while state == SamplerState::Generating {
			state = self.step(&mut buffer, &mut text, max_len, temperature, rng)?;
		}
		debug!("generated {:?} after {} symbols", text, buffer.written());
		Ok(text)
	}

	fn step<R: Rng>(
		&self,
		buffer: &mut GenerationBuffer,
		text: &mut String,
		max_len: usize,
		temperature: f64,
		rng: &mut R,
	) -> Result<SamplerState> {
		if buffer.written() > max_len {
			return Ok(SamplerState::Done);
		}

		let distribution = self.model.next_distribution(buffer)?;
		if distribution.len() != self.codec.len() {
			return Err(ChatgenError::ShapeMismatch(format!(
				"distribution over {} symbols, expected {}",
				distribution.len(),
				self.codec.len()
			)));
		}

		let index = sample_index(&rescale(&distribution, temperature), rng);
		if index == self.end {
			return Ok(SamplerState::Done);
		}
		text.push(self.codec.symbol_of(index)?);
		buffer.push(index);
		Ok(SamplerState::Generating)
	}
}

fn check_temperature(temperature: f64) -> Result<()> {
	if temperature.is_finite() && temperature > 0.0 {
		Ok(())
	} else {
		Err(ChatgenError::InvalidConfig(format!(
			"temperature must be finite and positive, got {temperature}"
		)))
	}
}

/// Raises every probability to `1 / temperature` and renormalises.
///
/// Computed as `exp(ln(max(p, EPSILON)) / temperature)`, shifted by the
/// largest term so low temperatures do not underflow. Zero probabilities
/// stay at zero. A distribution without any positive entry becomes uniform.
pub fn rescale(distribution: &[f32], temperature: f64) -> Vec<f64> {
	let logs: Vec<Option<f64>> = distribution
		.iter()
		.map(|&p| {
			let p = f64::from(p);
			(p > 0.0).then(|| p.max(EPSILON).ln() / temperature)
		})
		.collect();

	let Some(max) = logs.iter().flatten().copied().reduce(f64::max) else {
		let uniform = 1.0 / distribution.len().max(1) as f64;
		return vec![uniform; distribution.len()];
	};

	let weights: Vec<f64> = logs.iter().map(|l| l.map_or(0.0, |l| (l - max).exp())).collect();
	let total: f64 = weights.iter().sum();
	weights.into_iter().map(|w| w / total).collect()
}

/// Draws an index from a normalised distribution.
pub fn sample_index<R: Rng>(probabilities: &[f64], rng: &mut R) -> usize {
	let mut r = rng.random::<f64>();

	let mut fallback = 0;
	for (index, &p) in probabilities.iter().enumerate() {
		if p <= 0.0 {
			continue;
		}
		if r < p {
			return index;
		}
		r -= p;
		fallback = index;
	}

	// Rounding left `r` just above the total mass.
	fallback
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::build;
	use burn::backend::NdArray;
	use rand::SeedableRng;
	use rand::rngs::StdRng;

	/// Predictor returning the same distribution whatever the context.
	struct Fixed {
		window_len: usize,
		distribution: Vec<f32>,
	}

	impl NextSymbol for Fixed {
		fn window_len(&self) -> usize {
			self.window_len
		}

		fn vocab_size(&self) -> usize {
			4
		}

		fn next_distribution(&self, buffer: &GenerationBuffer) -> Result<Vec<f32>> {
			assert_eq!(buffer.window_len(), self.window_len);
			Ok(self.distribution.clone())
		}
	}

	// Symbols sort as ['\t', '\n', 'a', 'b'].
	fn vocabulary() -> (Vocabulary, IndexCodec) {
		let vocabulary = Vocabulary::build(&["ab"], '\t', '\n').unwrap();
		let codec = IndexCodec::new(&vocabulary);
		(vocabulary, codec)
	}

	fn fixed(distribution: [f32; 4]) -> Fixed {
		Fixed {
			window_len: 3,
			distribution: distribution.to_vec(),
		}
	}

	#[test]
	fn certain_end_gives_empty_texts_at_any_temperature() {
		let (vocabulary, codec) = vocabulary();
		let model = fixed([0.0, 1.0, 0.0, 0.0]);
		let sampler = Sampler::new(&model, &vocabulary, &codec).unwrap();
		let mut rng = StdRng::seed_from_u64(0);

		for temperature in [0.01, 1.0, 50.0] {
			let texts = sampler.generate(5, 10, temperature, &mut rng).unwrap();
			assert_eq!(texts, vec![String::new(); 5]);
		}
	}

	#[test]
	fn texts_stop_at_max_len() {
		let (vocabulary, codec) = vocabulary();
		let model = fixed([0.0, 0.0, 0.5, 0.5]);
		let sampler = Sampler::new(&model, &vocabulary, &codec).unwrap();
		let mut rng = StdRng::seed_from_u64(1);

		for text in sampler.generate(4, 7, 1.0, &mut rng).unwrap() {
			assert_eq!(text.chars().count(), 7);
			assert!(text.chars().all(|c| c == 'a' || c == 'b'));
		}
		assert_eq!(sampler.generate_one(0, 1.0, &mut rng).unwrap(), "");
	}

	#[test]
	fn seeded_generation_is_reproducible() {
		let (vocabulary, codec) = vocabulary();
		let model = fixed([0.0, 0.2, 0.4, 0.4]);
		let sampler = Sampler::new(&model, &vocabulary, &codec).unwrap();

		let first = sampler.generate(8, 12, 0.8, &mut StdRng::seed_from_u64(42)).unwrap();
		let second = sampler.generate(8, 12, 0.8, &mut StdRng::seed_from_u64(42)).unwrap();
		assert_eq!(first, second);
	}

	#[test]
	fn low_temperature_picks_the_mode() {
		let (vocabulary, codec) = vocabulary();
		let model = fixed([0.0, 0.1, 0.6, 0.3]);
		let sampler = Sampler::new(&model, &vocabulary, &codec).unwrap();
		let mut rng = StdRng::seed_from_u64(3);

		assert_eq!(sampler.generate_one(6, 0.01, &mut rng).unwrap(), "aaaaaa");
	}

	#[test]
	fn invalid_temperature_is_rejected() {
		let (vocabulary, codec) = vocabulary();
		let model = fixed([0.0, 1.0, 0.0, 0.0]);
		let sampler = Sampler::new(&model, &vocabulary, &codec).unwrap();
		let mut rng = StdRng::seed_from_u64(0);

		for temperature in [0.0, -1.0, f64::NAN, f64::INFINITY] {
			assert!(matches!(
				sampler.generate(1, 5, temperature, &mut rng),
				Err(ChatgenError::InvalidConfig(_))
			));
		}
	}

	#[test]
	fn wrong_distribution_length_is_rejected() {
		let (vocabulary, codec) = vocabulary();
		let model = Fixed {
			window_len: 3,
			distribution: vec![0.5, 0.5],
		};
		let sampler = Sampler::new(&model, &vocabulary, &codec).unwrap();
		let mut rng = StdRng::seed_from_u64(0);

		assert!(matches!(
			sampler.generate_one(5, 1.0, &mut rng),
			Err(ChatgenError::ShapeMismatch(_))
		));
	}

	#[test]
	fn model_and_codec_must_agree() {
		let vocabulary = Vocabulary::build(&["abc"], '\t', '\n').unwrap();
		let codec = IndexCodec::new(&vocabulary);
		let model = fixed([0.25; 4]);
		assert!(matches!(
			Sampler::new(&model, &vocabulary, &codec),
			Err(ChatgenError::ShapeMismatch(_))
		));
	}

	#[test]
	fn rescale_keeps_a_distribution() {
		let distribution = [0.1, 0.2, 0.0, 0.7];

		let same = rescale(&distribution, 1.0);
		for (a, b) in same.iter().zip(distribution) {
			assert!((a - f64::from(b)).abs() < 1e-6);
		}

		let flat = rescale(&distribution, 10.0);
		assert!((flat.iter().sum::<f64>() - 1.0).abs() < 1e-9);
		assert_eq!(flat[2], 0.0);
		assert!(flat[0] > 0.1 && flat[3] < 0.7);

		assert_eq!(rescale(&[0.0, 0.0], 1.0), vec![0.5, 0.5]);
	}

	#[test]
	fn untrained_model_generates_known_symbols() {
		let (vocabulary, codec) = vocabulary();
		let device = Default::default();
		let model = build::<NdArray>(codec.len(), 2, 8, 3e-4, &device);
		let sampler = Sampler::new(&model, &vocabulary, &codec).unwrap();
		let mut rng = StdRng::seed_from_u64(9);

		for text in sampler.generate(3, 6, 1.0, &mut rng).unwrap() {
			assert!(text.chars().count() <= 6);
			assert!(text.chars().all(|c| vocabulary.contains(c) && c != '\n'));
		}
	}
}
