//! Long short-term memory layer returning its full hidden sequence.

use burn::config::Config;
use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Initializer, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::{sigmoid, tanh};

/// LSTM layer configuration.
#[derive(Config, Debug)]
pub struct LstmConfig {
	/// Width of each input step.
	pub d_input: usize,
	/// Number of hidden units.
	pub d_hidden: usize,
	/// Dropout applied to the inputs.
	#[config(default = 0.15)]
	pub dropout: f64,
	/// Dropout applied to the recurrent state.
	#[config(default = 0.15)]
	pub recurrent_dropout: f64,
}

/// LSTM layer with input and recurrent dropout.
///
/// Gates are laid out as `[input, forget, cell, output]` along the last
/// axis of both projections. Dropout masks are drawn once per sequence
/// and reused at every step; outside autodiff they are all ones.
#[derive(Module, Debug)]
pub struct Lstm<B: Backend> {
	/// Input projection: d_input -> 4 * d_hidden (with bias)
	input: Linear<B>,
	/// Recurrent projection: d_hidden -> 4 * d_hidden
	recurrent: Linear<B>,
	dropout: Dropout,
	recurrent_dropout: Dropout,
	d_hidden: usize,
}

impl LstmConfig {
	/// Initialize the layer.
	pub fn init<B: Backend>(&self, device: &B::Device) -> Lstm<B> {
		let glorot = Initializer::XavierUniform { gain: 1.0 };
		Lstm {
			input: LinearConfig::new(self.d_input, 4 * self.d_hidden)
				.with_initializer(glorot.clone())
				.init(device),
			recurrent: LinearConfig::new(self.d_hidden, 4 * self.d_hidden)
				.with_bias(false)
				.with_initializer(glorot)
				.init(device),
			dropout: DropoutConfig::new(self.dropout).init(),
			recurrent_dropout: DropoutConfig::new(self.recurrent_dropout).init(),
			d_hidden: self.d_hidden,
		}
	}
}

impl<B: Backend> Lstm<B> {
	/// Forward pass.
	///
	/// - `x`: [batch, seq, d_input]
	///
	/// Returns: [batch, seq, d_hidden], the hidden state after every step
	pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
		let [batch, seq, d_input] = x.dims();
		let device = x.device();
		let d = self.d_hidden;

		let input_mask = self
			.dropout
			.forward(Tensor::<B, 3>::ones([batch, 1, d_input], &device))
			.expand([batch, seq, d_input]);
		let recurrent_mask = self.recurrent_dropout.forward(Tensor::<B, 2>::ones([batch, d], &device));

		// Input contribution for all steps at once: [batch, seq, 4d]
		let projected = self.input.forward(x * input_mask);

		let mut hidden = Tensor::<B, 2>::zeros([batch, d], &device);
		let mut cell = Tensor::<B, 2>::zeros([batch, d], &device);
		let mut outputs = Vec::with_capacity(seq);

		for t in 0..seq {
			let step = projected.clone().narrow(1, t, 1).reshape([batch, 4 * d]);
			let gates = step + self.recurrent.forward(hidden * recurrent_mask.clone());
			let gate = |k: usize| gates.clone().narrow(1, k * d, d);

			let input_gate = sigmoid(gate(0));
			let forget_gate = sigmoid(gate(1));
			let candidate = tanh(gate(2));
			let output_gate = sigmoid(gate(3));

			cell = forget_gate * cell + input_gate * candidate;
			hidden = output_gate * tanh(cell.clone());
			outputs.push(hidden.clone());
		}

		Tensor::stack(outputs, 1)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use burn::backend::{Autodiff, NdArray};

	type B = NdArray;

	#[test]
	fn lstm_forward_shape() {
		let device = Default::default();
		let lstm = LstmConfig::new(5, 8).init::<B>(&device);
		let x = Tensor::<B, 3>::ones([2, 4, 5], &device);
		assert_eq!(lstm.forward(x).dims(), [2, 4, 8]);
	}

	#[test]
	fn hidden_state_is_bounded() {
		let device = Default::default();
		let lstm = LstmConfig::new(3, 4).init::<B>(&device);
		let x = Tensor::<B, 3>::ones([1, 6, 3], &device).mul_scalar(50.0);
		let values = lstm.forward(x).into_data().to_vec::<f32>().unwrap();
		assert!(values.iter().all(|v| v.abs() <= 1.0));
	}

	#[test]
	fn inference_ignores_dropout() {
		let device = Default::default();
		let lstm = LstmConfig::new(3, 4).with_dropout(0.9).with_recurrent_dropout(0.9).init::<B>(&device);
		let x = Tensor::<B, 3>::ones([1, 3, 3], &device);
		let a = lstm.forward(x.clone()).into_data().to_vec::<f32>().unwrap();
		let b = lstm.forward(x).into_data().to_vec::<f32>().unwrap();
		assert_eq!(a, b);
	}

	#[test]
	fn dropout_fires_while_training() {
		let device = Default::default();
		let lstm = LstmConfig::new(3, 4)
			.with_dropout(0.5)
			.with_recurrent_dropout(0.5)
			.init::<Autodiff<B>>(&device);
		let x = Tensor::<Autodiff<B>, 3>::ones([8, 3, 3], &device);
		let a = lstm.forward(x.clone()).into_data().to_vec::<f32>().unwrap();
		let b = lstm.forward(x).into_data().to_vec::<f32>().unwrap();
		assert_ne!(a, b);
	}
}
