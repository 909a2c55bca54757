use crate::error::{ChatgenError, Result};
use crate::text::encoder::one_hot;

/// Most recent symbols of a generation, as fed to the model.
///
/// The buffer is left-aligned: it starts with the start sentinel at
/// position 0 and padding everywhere else. Once every position is
/// filled, each push slides the history left by one.
///
/// ## Invariants
/// - `window` always holds exactly `window_len` indices
/// - Unfilled positions hold the pad index `vocab_size` (an all-zero row)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationBuffer {
	window: Vec<usize>,
	vocab_size: usize,
	/// Symbols pushed so far, start sentinel included.
	written: usize,
}

impl GenerationBuffer {
	/// Creates a buffer holding only `start_index` at position 0.
	///
	/// # Errors
	/// - `InvalidConfig` if `window_len` is zero
	/// - `UnknownIndex` if `start_index` is not below `vocab_size`
	pub fn new(window_len: usize, vocab_size: usize, start_index: usize) -> Result<Self> {
		if window_len == 0 {
			return Err(ChatgenError::InvalidConfig("window length must be positive".into()));
		}
		if start_index >= vocab_size {
			return Err(ChatgenError::UnknownIndex(start_index));
		}
		let mut window = vec![vocab_size; window_len];
		window[0] = start_index;
		Ok(Self {
			window,
			vocab_size,
			written: 1,
		})
	}

	/// Appends a symbol, dropping the oldest one when the buffer is full.
	pub fn push(&mut self, index: usize) {
		let len = self.window.len();
		if self.written < len {
			self.window[self.written] = index;
		} else {
			self.window.rotate_left(1);
			self.window[len - 1] = index;
		}
		self.written += 1;
	}

	pub fn window(&self) -> &[usize] {
		&self.window
	}

	pub fn window_len(&self) -> usize {
		self.window.len()
	}

	pub fn vocab_size(&self) -> usize {
		self.vocab_size
	}

	/// Number of symbols pushed so far, the start sentinel included.
	pub fn written(&self) -> usize {
		self.written
	}

	/// Row-major one-hot encoding shaped like [`GenerationBuffer::dims`].
	pub fn to_one_hot(&self) -> Vec<f32> {
		one_hot(&self.window, self.vocab_size)
	}

	/// [1, window_len, vocab_size]
	pub fn dims(&self) -> [usize; 3] {
		[1, self.window.len(), self.vocab_size]
	}
}
