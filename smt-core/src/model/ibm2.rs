use std::collections::{HashMap, HashSet};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::TrainingConfig;
use crate::corpus::{ParallelCorpus, SentencePair};
use crate::error::Result;

use super::counts::{TokenPairMap, add_count};
use super::distribution::ProbabilityTable;
use super::ibm1::{LexicalEstimate, Model1Trainer};
use super::parallel::{Merge, merge_counts, sweep};

/// `(index_f, index_e, length_e, length_f)`, lengths counting the NULL token.
pub(crate) type AlignmentKey = (usize, usize, usize, usize);

/// Output of [`Model2Trainer`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Model2Tables {
	/// `t(e | f)`: outcome `e`, context `f`.
	pub lexical: ProbabilityTable<String, String>,
	/// `a(index_f | index_e, length_e, length_f)`.
	pub alignment: ProbabilityTable<usize, (usize, usize, usize)>,
}

pub(crate) struct Model2Estimate {
	pub(crate) t: LexicalEstimate,
	pub(crate) a: HashMap<AlignmentKey, f64>,
}

#[derive(Default)]
struct Model2Counts {
	count_t: TokenPairMap,
	total_t: HashMap<String, f64>,
	count_a: HashMap<AlignmentKey, f64>,
	total_a: HashMap<(usize, usize, usize), f64>,
}

impl Merge for Model2Counts {
	fn merge(&mut self, other: Self) {
		self.count_t.merge(other.count_t);
		merge_counts(&mut self.total_t, other.total_t);
		merge_counts(&mut self.count_a, other.count_a);
		merge_counts(&mut self.total_a, other.total_a);
	}
}

/// EM trainer for IBM Model 2.
///
/// Seeds `t` with [`Model1Trainer`] (same iteration budget), starts from a
/// uniform alignment table `1 / (length_f + 1)` over every position
/// combination seen in the corpus, then jointly re-estimates both tables.
/// NULL lexical pairs, frozen by Model 1, are re-estimated here.
#[derive(Clone, Debug, Default)]
pub struct Model2Trainer {
	config: TrainingConfig,
}

impl Model2Trainer {
	pub fn new(config: TrainingConfig) -> Self {
		Self { config }
	}

	pub fn config(&self) -> &TrainingConfig {
		&self.config
	}

	/// Trains `t` and `a`.
	///
	/// # Parameters
	/// - `corpus`: the tokenized sentence pairs, without NULL tokens
	///
	/// # Returns
	/// The lexical table and the alignment table keyed
	/// `(index_e, length_e, length_f)`.
	///
	/// # Behavior
	/// - Runs Model 1 first with the same configuration
	/// - Runs `iterations` joint EM sweeps over `t` and `a`
	///
	/// # Notes
	/// Alignment parameters exist only for sentence-length combinations seen
	/// in `corpus`.
	///
	/// # Errors
	/// Returns an error if the configuration is invalid.
	pub fn train(&self, corpus: &ParallelCorpus) -> Result<Model2Tables> {
		let estimate = self.estimate(corpus)?;
		let alignment = ProbabilityTable::from_flat(
			estimate
				.a
				.iter()
				.map(|(&(index_f, index_e, length_e, length_f), &p)| ((index_f, (index_e, length_e, length_f)), p)),
		);
		Ok(Model2Tables { lexical: estimate.t.to_table(), alignment })
	}

	pub(crate) fn estimate(&self, corpus: &ParallelCorpus) -> Result<Model2Estimate> {
		self.config.validate()?;
		let mut t = Model1Trainer::new(self.config.clone()).estimate(corpus)?;
		let mut a = uniform_alignments(corpus);
		info!(
			"training IBM Model 2 for {} iteration(s), {} alignment parameters",
			self.config.iterations,
			a.len()
		);

		for iteration in 0..self.config.iterations {
			let counts: Model2Counts = sweep(corpus.iter(), &self.config, |acc, pair| collect(&t, &a, acc, pair));

			let mut skipped = 0usize;
			for (f, e, count) in counts.count_t.iter() {
				match counts.total_t.get(f) {
					Some(&total) if total > 0.0 => t.set(e, f, count / total),
					_ => skipped += 1,
				}
			}
			for (&key, &count) in &counts.count_a {
				let (_, index_e, length_e, length_f) = key;
				match counts.total_a.get(&(index_e, length_e, length_f)) {
					Some(&total) if total > 0.0 => {
						a.insert(key, count / total);
					}
					_ => skipped += 1,
				}
			}
			if skipped > 0 {
				warn!("IBM Model 2: {skipped} update(s) skipped on a zero total");
			}
			info!("IBM Model 2: iteration {} of {} done", iteration + 1, self.config.iterations);
		}

		Ok(Model2Estimate { t, a })
	}
}

/// Uniform `1 / (length_f + 1)` for every `(index_f, index_e)` of every
/// sentence-length combination occurring in the corpus.
fn uniform_alignments(corpus: &ParallelCorpus) -> HashMap<AlignmentKey, f64> {
	let lengths: HashSet<(usize, usize)> = corpus.iter().map(|pair| (pair.e.len() + 1, pair.f.len() + 1)).collect();

	let mut a = HashMap::new();
	for (length_e, length_f) in lengths {
		let uniform = 1.0 / (length_f + 1) as f64;
		for index_f in 0..length_f {
			for index_e in 0..length_e {
				a.insert((index_f, index_e, length_e, length_f), uniform);
			}
		}
	}
	a
}

fn collect(t: &LexicalEstimate, a: &HashMap<AlignmentKey, f64>, acc: &mut Model2Counts, pair: &SentencePair) {
	let (sentence_f, sentence_e) = pair.with_null();
	let length_f = sentence_f.len();
	let length_e = sentence_e.len();
	let joint = |index_e: usize, token_e: &str, index_f: usize, token_f: &str| {
		let align = a.get(&(index_f, index_e, length_e, length_f)).copied().unwrap_or(0.0);
		t.get_or_uniform(token_e, token_f) * align
	};

	for (index_e, token_e) in sentence_e.iter().enumerate() {
		let s: f64 = sentence_f
			.iter()
			.enumerate()
			.map(|(index_f, token_f)| joint(index_e, token_e, index_f, token_f))
			.sum();
		if s <= 0.0 {
			continue;
		}
		for (index_f, token_f) in sentence_f.iter().enumerate() {
			let c = joint(index_e, token_e, index_f, token_f) / s;
			acc.count_t.add(token_f, token_e, c);
			add_count(&mut acc.total_t, token_f, c);
			*acc.count_a.entry((index_f, index_e, length_e, length_f)).or_insert(0.0) += c;
			*acc.total_a.entry((index_e, length_e, length_f)).or_insert(0.0) += c;
		}
	}
}
