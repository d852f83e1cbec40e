use std::collections::HashMap;
use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::TrainingConfig;
use crate::corpus::{ParallelCorpus, SentencePair};
use crate::error::Result;

use super::alignment::{Alignment, AlignmentSearch, DistortionKey, GreedyArgmax, ScoringTables};
use super::counts::{TokenPairMap, add_count};
use super::distribution::ProbabilityTable;
use super::ibm2::Model2Trainer;
use super::parallel::{Merge, merge_counts, sweep};

/// Output of [`Model3Trainer`]. Every table holds natural-log probabilities.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Model3Tables {
	/// `log t(e | f)`: outcome `e`, context `f`.
	pub lexical: ProbabilityTable<String, String>,
	/// `log d(index_e | index_f, length_e, length_f)`.
	pub distortion: ProbabilityTable<usize, (usize, usize, usize)>,
	/// `log φ(fertility | f)`.
	pub fertility: ProbabilityTable<usize, String>,
	/// Probability of not inserting a NULL-generated word.
	pub p0: f64,
}

impl Model3Tables {
	/// Prunes the three tables and returns the number of removed entries.
	pub fn prune(&mut self, threshold: f64) -> usize {
		self.lexical.prune(threshold) + self.distortion.prune(threshold) + self.fertility.prune(threshold)
	}
}

#[derive(Default)]
struct Model3Counts {
	count_t: TokenPairMap,
	total_t: HashMap<String, f64>,
	count_d: HashMap<DistortionKey, f64>,
	total_d: HashMap<(usize, usize, usize), f64>,
	count_f: HashMap<(usize, String), f64>,
	total_f: HashMap<String, f64>,
	count_p0: f64,
	count_p1: f64,
	contributed: usize,
	skipped: usize,
}

impl Merge for Model3Counts {
	fn merge(&mut self, other: Self) {
		self.count_t.merge(other.count_t);
		merge_counts(&mut self.total_t, other.total_t);
		merge_counts(&mut self.count_d, other.count_d);
		merge_counts(&mut self.total_d, other.total_d);
		merge_counts(&mut self.count_f, other.count_f);
		merge_counts(&mut self.total_f, other.total_f);
		self.count_p0 += other.count_p0;
		self.count_p1 += other.count_p1;
		self.contributed += other.contributed;
		self.skipped += other.skipped;
	}
}

/// EM trainer for IBM Model 3 with an approximate E-step.
///
/// `t` and `d` are bootstrapped from [`Model2Trainer`] run for twice the
/// iteration budget, moved to log space (zeros dropped) and `d` is re-keyed
/// from `(index_f, index_e, l_e, l_f)` to `(index_e, index_f, l_e, l_f)`.
/// Each iteration samples candidate alignments per pair with the configured
/// [`AlignmentSearch`] and collects weighted counts for `t`, `d`, the
/// fertility table and the NULL-insertion parameter.
///
/// A pair without any scorable candidate is skipped for that iteration.
#[derive(Clone, Debug)]
pub struct Model3Trainer {
	config: TrainingConfig,
	search: Arc<dyn AlignmentSearch>,
}

impl Default for Model3Trainer {
	fn default() -> Self {
		Self::new(TrainingConfig::default())
	}
}

impl Model3Trainer {
	/// Creates a trainer using [`GreedyArgmax`] sampling.
	pub fn new(config: TrainingConfig) -> Self {
		Self { config, search: Arc::new(GreedyArgmax) }
	}

	/// Replaces the alignment search strategy.
	pub fn with_search<S: AlignmentSearch + 'static>(mut self, search: S) -> Self {
		self.search = Arc::new(search);
		self
	}

	pub fn config(&self) -> &TrainingConfig {
		&self.config
	}

	/// Trains the Model 3 tables.
	///
	/// # Parameters
	/// - `corpus`: the tokenized sentence pairs, without NULL tokens
	///
	/// # Returns
	/// Log-space lexical, distortion and fertility tables plus `p0`.
	///
	/// # Behavior
	/// - Bootstraps `t` and `d` from Model 2 run for `2 × iterations`
	/// - Samples candidate alignments per pair with the configured search
	/// - Weights each candidate by its shifted, normalized log score
	/// - Re-estimates every table from the weighted counts
	///
	/// # Notes
	/// Pairs without a scorable candidate are skipped and reported once per
	/// iteration. `p0` stays at `0.5` until some counts are collected.
	///
	/// # Errors
	/// Returns an error if the configuration is invalid.
	pub fn train(&self, corpus: &ParallelCorpus) -> Result<Model3Tables> {
		self.config.validate()?;
		let bootstrap = TrainingConfig { iterations: self.config.iterations * 2, ..self.config.clone() };
		let estimate = Model2Trainer::new(bootstrap).estimate(corpus)?;

		let mut t = TokenPairMap::default();
		for (f, e, p) in estimate.t.probs().iter() {
			if p > 0.0 {
				t.insert(f, e, p.ln());
			}
		}
		let mut d: HashMap<DistortionKey, f64> = estimate
			.a
			.iter()
			.filter(|(_, p)| **p > 0.0)
			.map(|(&(index_f, index_e, length_e, length_f), p)| ((index_e, index_f, length_e, length_f), p.ln()))
			.collect();
		let mut fertility: HashMap<(usize, String), f64> = HashMap::new();
		let mut p0 = 0.5;

		info!("training IBM Model 3 for {} iteration(s) with {:?}", self.config.iterations, self.search);
		for iteration in 0..self.config.iterations {
			let counts: Model3Counts = {
				let tables = ScoringTables::new(&t, &d);
				sweep(corpus.iter(), &self.config, |acc, pair| collect(self.search.as_ref(), &tables, acc, pair))
			};

			if counts.skipped > 0 {
				warn!(
					"IBM Model 3: {} of {} sentence pair(s) had no scorable alignment",
					counts.skipped,
					counts.skipped + counts.contributed
				);
			}

			t = TokenPairMap::default();
			for (f, e, count) in counts.count_t.iter() {
				if let Some(p) = log_ratio(count, counts.total_t.get(f)) {
					t.insert(f, e, p);
				}
			}
			d = counts
				.count_d
				.iter()
				.filter_map(|(&key, &count)| {
					let (_, index_f, length_e, length_f) = key;
					log_ratio(count, counts.total_d.get(&(index_f, length_e, length_f))).map(|p| (key, p))
				})
				.collect();
			fertility = counts
				.count_f
				.iter()
				.filter_map(|(key, &count)| log_ratio(count, counts.total_f.get(&key.1)).map(|p| (key.clone(), p)))
				.collect();

			if let Some(estimate) = null_non_insertion(counts.count_p0, counts.count_p1) {
				p0 = estimate;
			}

			info!(
				"IBM Model 3: iteration {} of {} done, {} token pairs, {} distortions, {} fertilities",
				iteration + 1,
				self.config.iterations,
				t.len(),
				d.len(),
				fertility.len()
			);
		}

		Ok(Model3Tables {
			lexical: t.to_table(),
			distortion: ProbabilityTable::from_flat(
				d.into_iter()
					.map(|((index_e, index_f, length_e, length_f), p)| ((index_e, (index_f, length_e, length_f)), p)),
			),
			fertility: ProbabilityTable::from_flat(fertility),
			p0,
		})
	}
}

/// `ln(count / total)`, `None` for a missing or zero total or a zero ratio.
fn log_ratio(count: f64, total: Option<&f64>) -> Option<f64> {
	let total = *total?;
	if total <= 0.0 {
		return None;
	}
	let ratio = count / total;
	(ratio > 0.0).then(|| ratio.ln())
}

/// `p0 = 1 - count_p1 / (count_p0 + count_p1)`, `None` when nothing was counted.
fn null_non_insertion(count_p0: f64, count_p1: f64) -> Option<f64> {
	let denominator = count_p0 + count_p1;
	(denominator > 0.0).then(|| 1.0 - count_p1 / denominator)
}

/// Normalized non-negative weights from log scores: each score is shifted by
/// the minimum and divided by the sum of shifted scores. When every shifted
/// score is zero (single candidate, or all equal) the weights are uniform.
pub(crate) fn candidate_weights(scores: &[f64]) -> Vec<f64> {
	let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
	let shifted: Vec<f64> = scores.iter().map(|s| s - min).collect();
	let total: f64 = shifted.iter().sum();
	if !(total.is_finite() && total > 0.0) {
		return vec![1.0 / scores.len() as f64; scores.len()];
	}
	shifted.into_iter().map(|s| s / total).collect()
}

fn collect(search: &dyn AlignmentSearch, tables: &ScoringTables<'_>, acc: &mut Model3Counts, pair: &SentencePair) {
	let (sentence_f, sentence_e) = pair.with_null();
	let length_f = sentence_f.len();
	let length_e = sentence_e.len();

	let scored: Vec<(Alignment, f64)> = search
		.sample(&sentence_e, &sentence_f, tables)
		.unwrap_or_default()
		.into_iter()
		.filter_map(|alignment| {
			let score = alignment.score(&sentence_e, &sentence_f, tables)?;
			Some((alignment, score))
		})
		.collect();
	if scored.is_empty() {
		acc.skipped += 1;
		return;
	}
	acc.contributed += 1;

	let scores: Vec<f64> = scored.iter().map(|(_, s)| *s).collect();
	for ((alignment, _), weight) in scored.iter().zip(candidate_weights(&scores)) {
		let mut null_generated = 0usize;
		for (index_f, token_f) in sentence_f.iter().enumerate() {
			let index_e = alignment.index_e(index_f);
			acc.count_t.add(token_f, &sentence_e[index_e], weight);
			add_count(&mut acc.total_t, token_f, weight);
			*acc.count_d.entry((index_e, index_f, length_e, length_f)).or_insert(0.0) += weight;
			*acc.total_d.entry((index_f, length_e, length_f)).or_insert(0.0) += weight;

			// Slot 0 is the source NULL itself and has no fertility
			if index_f == 0 {
				continue;
			}
			if index_e == 0 {
				null_generated += 1;
			}
			let fertility = usize::from(index_e != 0);
			*acc.count_f.entry((fertility, token_f.clone())).or_insert(0.0) += weight;
			add_count(&mut acc.total_f, token_f, weight);
		}

		// Target length with NULL, unclamped: p0 may be pushed below zero
		let null_generated = null_generated as f64;
		acc.count_p1 += null_generated * weight;
		acc.count_p0 += (length_e as f64 - 2.0 * null_generated) * weight;
	}
}
