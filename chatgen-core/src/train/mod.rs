//! Training of the character model.
//!
//! - `trainer`: Adam over shuffled mini-batches, aborting on a non-finite loss
//! - `checkpoint`: one weights-only file per completed epoch
//! - `metrics`: running loss and the per-epoch report

pub mod checkpoint;
pub mod metrics;
pub mod trainer;

pub use checkpoint::CheckpointDir;
pub use metrics::{EpochMetrics, LossTracker, TrainingReport};
pub use trainer::{Trainer, TrainingConfig};
