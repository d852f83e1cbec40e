use crate::error::{Result, SmtError};

/// Settings shared by every EM trainer and the language-model estimator.
///
/// # Responsibilities
/// - Carry the fixed iteration budget (training never tests for convergence)
/// - Control how the corpus is partitioned across worker threads
///
/// # Invariants
/// - `workers >= 1`
/// - `batch_size >= 1`
#[derive(Clone, Debug, PartialEq)]
pub struct TrainingConfig {
	/// Number of EM iterations to run.
	pub iterations: usize,

	/// Number of worker threads a batch is split across.
	pub workers: usize,

	/// Number of sentence pairs read from the corpus before a parallel sweep.
	pub batch_size: usize,
}

impl Default for TrainingConfig {
	fn default() -> Self {
		Self { iterations: 2, workers: num_cpus::get(), batch_size: 512 }
	}
}

impl TrainingConfig {
	/// Creates a configuration with the given iteration budget and default parallelism.
	pub fn with_iterations(iterations: usize) -> Self {
		Self { iterations, ..Self::default() }
	}

	/// Checks the parallelism settings.
	///
	/// # Errors
	/// Returns an error if `workers` or `batch_size` is zero.
	pub fn validate(&self) -> Result<()> {
		if self.workers == 0 {
			return Err(SmtError::invalid_config("workers must be >= 1"));
		}
		if self.batch_size == 0 {
			return Err(SmtError::invalid_config("batch_size must be >= 1"));
		}
		Ok(())
	}
}

/// Per-order interpolation weights for the language-model scoring pass.
///
/// Index `0` holds the unigram weight, index `n - 1` the `n`-gram weight.
#[derive(Clone, Debug, PartialEq)]
pub struct LmWeights {
	weights: Vec<f64>,
}

impl LmWeights {
	pub fn new(weights: Vec<f64>) -> Self {
		Self { weights }
	}

	/// Weight applied to order `n` (1-based). Orders beyond the configured ones weigh 0.
	pub fn weight(&self, n: usize) -> f64 {
		if n == 0 {
			return 0.0;
		}
		self.weights.get(n - 1).copied().unwrap_or(0.0)
	}

	pub fn order(&self) -> usize {
		self.weights.len()
	}

	/// Checks that there is exactly one finite, non-negative weight per model order.
	///
	/// # Errors
	/// Returns an error on a length mismatch or an invalid weight.
	pub fn validate_for(&self, order: usize) -> Result<()> {
		if self.weights.len() != order {
			return Err(SmtError::invalid_config(format!(
				"expected {} language-model weights, got {}",
				order,
				self.weights.len()
			)));
		}
		if let Some(w) = self.weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
			return Err(SmtError::invalid_config(format!("invalid language-model weight {w}")));
		}
		Ok(())
	}
}

impl Default for LmWeights {
	fn default() -> Self {
		Self::new(vec![0.0, 0.6, 0.4])
	}
}
