//! Gated recurrent unit layer returning only its last hidden state.

use burn::config::Config;
use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Initializer, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::{sigmoid, tanh};

/// GRU layer configuration.
#[derive(Config, Debug)]
pub struct GruConfig {
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

/// GRU layer with input and recurrent dropout.
///
/// Gates are laid out as `[update, reset, candidate]`. The reset gate is
/// applied after the recurrent projection, which therefore carries its own
/// bias.
#[derive(Module, Debug)]
pub struct Gru<B: Backend> {
	/// Input projection: d_input -> 3 * d_hidden
	input: Linear<B>,
	/// Recurrent projection: d_hidden -> 3 * d_hidden
	recurrent: Linear<B>,
	dropout: Dropout,
	recurrent_dropout: Dropout,
	d_hidden: usize,
}

impl GruConfig {
	/// Initialize the layer.
	pub fn init<B: Backend>(&self, device: &B::Device) -> Gru<B> {
		let glorot = Initializer::XavierUniform { gain: 1.0 };
		Gru {
			input: LinearConfig::new(self.d_input, 3 * self.d_hidden)
				.with_initializer(glorot.clone())
				.init(device),
			recurrent: LinearConfig::new(self.d_hidden, 3 * self.d_hidden)
				.with_initializer(glorot)
				.init(device),
			dropout: DropoutConfig::new(self.dropout).init(),
			recurrent_dropout: DropoutConfig::new(self.recurrent_dropout).init(),
			d_hidden: self.d_hidden,
		}
	}
}

impl<B: Backend> Gru<B> {
	/// Forward pass.
	///
	/// - `x`: [batch, seq, d_input]
	///
	/// Returns: [batch, d_hidden], the hidden state after the last step
	pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 2> {
		let [batch, seq, d_input] = x.dims();
		let device = x.device();
		let d = self.d_hidden;

		let input_mask = self
			.dropout
			.forward(Tensor::<B, 3>::ones([batch, 1, d_input], &device))
			.expand([batch, seq, d_input]);
		let recurrent_mask = self.recurrent_dropout.forward(Tensor::<B, 2>::ones([batch, d], &device));

		let projected = self.input.forward(x * input_mask);
		let mut hidden = Tensor::<B, 2>::zeros([batch, d], &device);

		for t in 0..seq {
			let step = projected.clone().narrow(1, t, 1).reshape([batch, 3 * d]);
			let recurrent = self.recurrent.forward(hidden.clone() * recurrent_mask.clone());

			let x_gate = |k: usize| step.clone().narrow(1, k * d, d);
			let h_gate = |k: usize| recurrent.clone().narrow(1, k * d, d);

			let update = sigmoid(x_gate(0) + h_gate(0));
			let reset = sigmoid(x_gate(1) + h_gate(1));
			let candidate = tanh(x_gate(2) + reset * h_gate(2));

			hidden = update.clone() * hidden + update.neg().add_scalar(1.0) * candidate;
		}

		hidden
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use burn::backend::{Autodiff, NdArray};

	type B = NdArray;

	#[test]
	fn gru_forward_shape() {
		let device = Default::default();
		let gru = GruConfig::new(6, 8).init::<B>(&device);
		let x = Tensor::<B, 3>::ones([3, 5, 6], &device);
		assert_eq!(gru.forward(x).dims(), [3, 8]);
	}

	#[test]
	fn batch_rows_are_independent() {
		let device = Default::default();
		let gru = GruConfig::new(2, 4).init::<B>(&device);
		let a = Tensor::<B, 3>::from_data([[[1.0, 0.0], [0.0, 1.0], [1.0, 0.0]]], &device);
		let b = Tensor::<B, 3>::from_data([[[0.0, 1.0], [0.0, 1.0], [1.0, 1.0]]], &device);

		let batched = gru.forward(Tensor::cat(vec![a.clone(), b], 0));
		let single = gru.forward(a);
		let batched = batched.narrow(0, 0, 1).into_data().to_vec::<f32>().unwrap();
		let single = single.into_data().to_vec::<f32>().unwrap();
		for (x, y) in batched.iter().zip(single) {
			assert!((x - y).abs() < 1e-5);
		}
	}

	#[test]
	fn dropout_fires_while_training() {
		let device = Default::default();
		let gru = GruConfig::new(3, 4)
			.with_dropout(0.5)
			.with_recurrent_dropout(0.5)
			.init::<Autodiff<B>>(&device);
		let x = Tensor::<Autodiff<B>, 3>::ones([8, 3, 3], &device);
		let a = gru.forward(x.clone()).into_data().to_vec::<f32>().unwrap();
		let b = gru.forward(x).into_data().to_vec::<f32>().unwrap();
		assert_ne!(a, b);
	}
}
