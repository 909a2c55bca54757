//! Metrics describing the evolution of a training run.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Running mean of the per-example loss within an epoch.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LossTracker {
	sum: f64,
	examples: usize,
}

impl LossTracker {
	/// Records the mean loss of a batch of `examples` windows.
	pub fn update(&mut self, batch_loss: f32, examples: usize) {
		self.sum += f64::from(batch_loss) * examples as f64;
		self.examples += examples;
	}

	/// Mean loss over everything recorded since the last reset, `0.0` when empty.
	pub fn mean(&self) -> f32 {
		if self.examples == 0 {
			0.0
		} else {
			(self.sum / self.examples as f64) as f32
		}
	}

	pub fn examples(&self) -> usize {
		self.examples
	}

	pub fn reset(&mut self) {
		*self = Self::default();
	}
}

/// Summary of one completed epoch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EpochMetrics {
	/// Epoch number as used in the checkpoint name.
	pub epoch: usize,
	/// Mean cross-entropy over the epoch's windows.
	pub mean_loss: f32,
	/// Number of optimiser steps.
	pub batches: usize,
	/// Wall time of the epoch, checkpoint write included.
	pub elapsed: Duration,
}

/// Metrics of a whole training run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TrainingReport {
	pub epochs: Vec<EpochMetrics>,
	pub total_duration: Duration,
}

impl TrainingReport {
	/// Loss of the last completed epoch.
	pub fn final_loss(&self) -> Option<f32> {
		self.epochs.last().map(|e| e.mean_loss)
	}
}
