use std::collections::HashMap;

use log::{info, warn};

use crate::config::TrainingConfig;
use crate::corpus::{NULL_TOKEN, ParallelCorpus, SentencePair};
use crate::error::Result;

use super::counts::{TokenPairMap, add_count};
use super::distribution::ProbabilityTable;
use super::parallel::{Merge, merge_counts, sweep};

/// Lexical translation probabilities `t(e | f)` while they are being trained.
///
/// Pairs that have not been re-estimated yet read as the uniform initial
/// value `1 / |V_f|`, where `|V_f|` is the number of distinct source token
/// types in the corpus (the NULL token excluded).
#[derive(Clone, Debug, Default)]
pub(crate) struct LexicalEstimate {
	probs: TokenPairMap,
	uniform: f64,
}

impl LexicalEstimate {
	pub(crate) fn uniform(unique_f: usize) -> Self {
		let uniform = if unique_f == 0 { 0.0 } else { 1.0 / unique_f as f64 };
		Self { probs: TokenPairMap::default(), uniform }
	}

	/// `t(e | f)`, falling back to the uniform initial value.
	pub(crate) fn get_or_uniform(&self, e: &str, f: &str) -> f64 {
		self.probs.get(f, e).unwrap_or(self.uniform)
	}

	pub(crate) fn set(&mut self, e: &str, f: &str, probability: f64) {
		self.probs.insert(f, e, probability);
	}

	/// Sets `t(e|f) = count(e, f) / total(f)` for every counted pair without
	/// NULL on either side. Counted NULL pairs are stored at the uniform value
	/// instead. Returns how many updates a zero total skipped.
	fn reestimate(&mut self, count: &TokenPairMap, total: &HashMap<String, f64>) -> usize {
		let mut skipped = 0;
		for (f, e, c) in count.iter() {
			if f == NULL_TOKEN || e == NULL_TOKEN {
				self.set(e, f, self.uniform);
				continue;
			}
			match total.get(f) {
				Some(&sum) if sum > 0.0 => self.set(e, f, c / sum),
				_ => skipped += 1,
			}
		}
		skipped
	}

	pub(crate) fn probs(&self) -> &TokenPairMap {
		&self.probs
	}

	pub(crate) fn len(&self) -> usize {
		self.probs.len()
	}

	pub(crate) fn to_table(&self) -> ProbabilityTable<String, String> {
		self.probs.to_table()
	}
}

/// Fractional counts of one Model 1 sweep.
#[derive(Default)]
struct Model1Counts {
	count: TokenPairMap,
	total: HashMap<String, f64>,
}

impl Merge for Model1Counts {
	fn merge(&mut self, other: Self) {
		self.count.merge(other.count);
		merge_counts(&mut self.total, other.total);
	}
}

/// EM trainer for IBM Model 1.
///
/// Every iteration sweeps the whole corpus, collecting for each token pair
/// the fractional count `t(e|f) / s(e)` with `s(e) = Σ_f t(e|f)` over the
/// sentence (NULL included on both sides), then re-estimates
/// `t(e|f) = count(e, f) / total(f)` for the token pairs co-occurring in the
/// corpus. Pairs involving NULL are never re-estimated: they enter the table
/// at the uniform initial value. The number of iterations is fixed.
#[derive(Clone, Debug, Default)]
pub struct Model1Trainer {
	config: TrainingConfig,
}

impl Model1Trainer {
	pub fn new(config: TrainingConfig) -> Self {
		Self { config }
	}

	pub fn config(&self) -> &TrainingConfig {
		&self.config
	}

	/// Trains `t(e | f)` and returns it as a table (outcome `e`, context `f`).
	///
	/// # Parameters
	/// - `corpus`: the tokenized sentence pairs, without NULL tokens
	///
	/// # Returns
	/// One entry per `(e, f)` token pair seen in a sentence, NULL pairs at
	/// the uniform value. An empty table comes back for zero iterations.
	///
	/// # Behavior
	/// - Starts from the uniform `1 / |V_f|`
	/// - Runs `iterations` EM sweeps, each partitioned across `workers`
	///
	/// # Notes
	/// Because NULL pairs stay uniform, `Σ_e t(e | f)` is generally not one.
	///
	/// # Errors
	/// Returns an error if the configuration is invalid.
	pub fn train(&self, corpus: &ParallelCorpus) -> Result<ProbabilityTable<String, String>> {
		Ok(self.estimate(corpus)?.to_table())
	}

	pub(crate) fn estimate(&self, corpus: &ParallelCorpus) -> Result<LexicalEstimate> {
		self.config.validate()?;
		let mut t = LexicalEstimate::uniform(corpus.count_unique_f());
		info!(
			"training IBM Model 1 for {} iteration(s) on {} sentence pair(s)",
			self.config.iterations,
			corpus.len()
		);

		for iteration in 0..self.config.iterations {
			let counts: Model1Counts = sweep(corpus.iter(), &self.config, |acc, pair| collect(&t, acc, pair));

			let skipped = t.reestimate(&counts.count, &counts.total);
			if skipped > 0 {
				warn!("IBM Model 1: {skipped} update(s) skipped on a zero total");
			}
			info!(
				"IBM Model 1: iteration {} of {} done, {} token pairs",
				iteration + 1,
				self.config.iterations,
				t.len()
			);
		}

		Ok(t)
	}
}

fn collect(t: &LexicalEstimate, acc: &mut Model1Counts, pair: &SentencePair) {
	let (sentence_f, sentence_e) = pair.with_null();
	for token_e in &sentence_e {
		let s: f64 = sentence_f.iter().map(|token_f| t.get_or_uniform(token_e, token_f)).sum();
		if s <= 0.0 {
			continue;
		}
		for token_f in &sentence_f {
			let c = t.get_or_uniform(token_e, token_f) / s;
			acc.count.add(token_f, token_e, c);
			add_count(&mut acc.total, token_f, c);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::corpus::NULL_TOKEN;

	fn toy_corpus() -> ParallelCorpus {
		ParallelCorpus::from_lines(["la maison ||| the house", "le chat ||| the cat"])
	}

	fn trainer(iterations: usize, workers: usize) -> Model1Trainer {
		Model1Trainer::new(TrainingConfig { iterations, workers, batch_size: 2 })
	}

	fn t(table: &ProbabilityTable<String, String>, e: &str, f: &str) -> f64 {
		table.get(&e.to_owned(), &f.to_owned())
	}

	#[test]
	fn function_words_split_evenly() {
		let table = trainer(2, 1).train(&toy_corpus()).unwrap();
		assert!((t(&table, "the", "la") - t(&table, "the", "le")).abs() < 1e-12);
		// With NULL frozen at 1/4, maison splits its mass between the and house
		assert!((t(&table, "house", "maison") - 12.0 / 35.0).abs() < 1e-12);
		assert!((t(&table, "the", "maison") - 12.0 / 35.0).abs() < 1e-12);
	}

	#[test]
	fn null_pairs_keep_uniform_value() {
		let estimate = trainer(2, 1).estimate(&toy_corpus()).unwrap();
		assert_eq!(estimate.probs().get("la", NULL_TOKEN), Some(0.25));
		assert_eq!(estimate.probs().get(NULL_TOKEN, "the"), Some(0.25));
		assert_eq!(estimate.probs().get(NULL_TOKEN, NULL_TOKEN), Some(0.25));
	}

	#[test]
	fn real_pairs_are_normalized_by_source_total() {
		let estimate = trainer(1, 1).estimate(&toy_corpus()).unwrap();
		// One sweep from uniform: la spreads its total evenly over NULL, the and house
		let mut sums: HashMap<&str, f64> = HashMap::new();
		for (f, e, p) in estimate.probs().iter() {
			if f != NULL_TOKEN && e != NULL_TOKEN {
				assert!((p - 1.0 / 3.0).abs() < 1e-12, "t({e:?}|{f:?}) = {p}");
				*sums.entry(f).or_insert(0.0) += p;
			}
		}
		assert_eq!(sums.len(), 4);
		for (f, sum) in sums {
			assert!((sum - 2.0 / 3.0).abs() < 1e-12, "t(.|{f:?}) sums to {sum}");
		}
	}

	#[test]
	fn unseen_pairs_read_as_uniform() {
		let estimate = LexicalEstimate::uniform(4);
		assert_eq!(estimate.get_or_uniform("house", "maison"), 0.25);
		assert_eq!(LexicalEstimate::uniform(0).get_or_uniform("a", "b"), 0.0);
	}

	#[test]
	fn zero_iterations_leave_table_empty() {
		let table = trainer(0, 1).train(&toy_corpus()).unwrap();
		assert!(table.is_empty());
	}

	#[test]
	fn parallel_sweep_matches_serial() {
		let serial = trainer(2, 1).train(&toy_corpus()).unwrap();
		let parallel = trainer(2, 4).train(&toy_corpus()).unwrap();
		for (e, f, p) in serial.entries() {
			assert!((parallel.get(e, f) - p).abs() < 1e-12);
		}
		assert_eq!(serial.len(), parallel.len());
	}

	#[test]
	fn empty_corpus_trains_nothing() {
		let table = trainer(2, 1).train(&ParallelCorpus::from_lines(Vec::<String>::new())).unwrap();
		assert!(table.is_empty());
	}
}
