use std::collections::HashMap;

use log::info;
use serde::{Deserialize, Serialize};

use crate::config::{LmWeights, TrainingConfig};
use crate::corpus::{Corpus, Sentence};
use crate::error::{Result, SmtError};

use super::distribution::ProbabilityTable;
use super::parallel::{Merge, merge_counts, sweep};

/// Marks the beginning of a sentence.
pub const SENTENCE_START: &str = "<s>";

/// Marks the end of a sentence.
pub const SENTENCE_END: &str = "</s>";

/// N-gram table: outcome is the predicted token, context the preceding
/// tokens from the most recent to the oldest.
pub type NGramTable = ProbabilityTable<String, Vec<String>>;

/// Orders `1..=N` of natural-log n-gram probabilities.
///
/// # Responsibilities
/// - Point lookups with the `1 / #unique n-grams` fallback
/// - Weighted scoring of a candidate token given its left history
///
/// # Invariants
/// - `orders[n - 1]` holds the `n`-gram table
/// - Contexts of the `n`-gram table have exactly `n - 1` tokens, newest first
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct LanguageModel {
	orders: Vec<NGramTable>,
}

impl LanguageModel {
	/// Wraps already estimated tables, unigrams first.
	pub fn from_tables(orders: Vec<NGramTable>) -> Self {
		Self { orders }
	}

	/// Highest n-gram order.
	pub fn order(&self) -> usize {
		self.orders.len()
	}

	/// The `n`-gram table (1-based).
	pub fn table(&self, n: usize) -> Option<&NGramTable> {
		self.orders.get(n.checked_sub(1)?)
	}

	pub fn tables(&self) -> &[NGramTable] {
		&self.orders
	}

	/// `ln P(token | context)` where `context` lists the preceding tokens
	/// newest first and selects the order `context.len() + 1`.
	///
	/// An unknown n-gram falls back to `ln(1 / #unique n-grams of that order)`;
	/// an empty or missing order contributes `0.0`.
	pub fn log_prob(&self, token: &str, context: &[String]) -> f64 {
		let Some(table) = self.table(context.len() + 1) else {
			return 0.0;
		};
		if table.is_empty() {
			return 0.0;
		}
		table
			.lookup(&token.to_owned(), &context.to_vec())
			.unwrap_or_else(|| (1.0 / table.len() as f64).ln())
	}

	/// Weighted sum of the `ln P` of every order usable with `history`
	/// (oldest to newest): orders `1..=min(N, history.len() + 1)`.
	pub fn score(&self, token: &str, history: &[String], weights: &LmWeights) -> f64 {
		let max_n = self.order().min(history.len() + 1);
		let mut context: Vec<String> = Vec::with_capacity(max_n);
		let mut score = 0.0;
		for n in 1..=max_n {
			if n > 1 {
				context.push(history[history.len() + 1 - n].clone());
			}
			let weight = weights.weight(n);
			if weight != 0.0 {
				score += weight * self.log_prob(token, &context);
			}
		}
		score
	}
}

/// Raw n-gram occurrence counts, orders `1..=N`.
#[derive(Debug, Default)]
struct NGramCounts {
	counts: Vec<HashMap<Vec<String>, usize>>,
}

impl NGramCounts {
	/// Counts every n-gram of the sentence wrapped in boundary markers.
	fn add_sentence(&mut self, order: usize, sentence: &Sentence) {
		if self.counts.len() < order {
			self.counts.resize_with(order, HashMap::new);
		}
		let mut tokens: Vec<String> = Vec::with_capacity(sentence.len() + 2);
		tokens.push(SENTENCE_START.to_owned());
		tokens.extend(sentence.iter().cloned());
		tokens.push(SENTENCE_END.to_owned());

		for n in 1..=order {
			for ngram in tokens.windows(n) {
				match self.counts[n - 1].get_mut(ngram) {
					Some(count) => *count += 1,
					None => {
						self.counts[n - 1].insert(ngram.to_vec(), 1);
					}
				}
			}
		}
	}

	fn get(&self, ngram: &[String]) -> Option<usize> {
		self.counts.get(ngram.len().checked_sub(1)?)?.get(ngram).copied()
	}
}

impl Merge for NGramCounts {
	fn merge(&mut self, other: Self) {
		if self.counts.len() < other.counts.len() {
			self.counts.resize_with(other.counts.len(), HashMap::new);
		}
		for (into, counts) in self.counts.iter_mut().zip(other.counts) {
			merge_counts(into, counts);
		}
	}
}

/// N-gram language-model estimator.
///
/// Orders `n > 1` use the relative frequency
/// `count(w_1..w_n) / count(w_1..w_{n-1})`. Unigrams use
/// `count(w) / #unique unigrams`: the denominator is the vocabulary size,
/// not the token count, so unigram values do not sum to one. No smoothing
/// or back-off is computed here; [`LanguageModel::log_prob`] applies the
/// fallback at query time.
#[derive(Clone, Debug)]
pub struct LmTrainer {
	order: usize,
	config: TrainingConfig,
}

impl LmTrainer {
	/// Creates an estimator for orders `1..=order`.
	pub fn new(order: usize, config: TrainingConfig) -> Self {
		Self { order, config }
	}

	pub fn order(&self) -> usize {
		self.order
	}

	/// Counts and estimates the n-gram tables of `corpus`.
	///
	/// # Parameters
	/// - `corpus`: tokenized sentences, markers added here
	///
	/// # Returns
	/// A [`LanguageModel`] holding one natural-log table per order.
	///
	/// # Behavior
	/// - Wraps every sentence in [`SENTENCE_START`] and [`SENTENCE_END`]
	/// - Counts all orders in one sweep, partitioned across workers
	/// - Estimates each order from the merged counts
	///
	/// # Notes
	/// Contexts are stored newest first; see [`LanguageModel::log_prob`].
	///
	/// # Errors
	/// Returns an error if `order` is zero or the configuration is invalid.
	pub fn train(&self, corpus: &Corpus) -> Result<LanguageModel> {
		if self.order == 0 {
			return Err(SmtError::invalid_config("language-model order must be >= 1"));
		}
		self.config.validate()?;
		info!("training {}-gram language model", self.order);

		let order = self.order;
		let counts: NGramCounts = sweep(corpus.iter(), &self.config, |acc: &mut NGramCounts, sentence| {
			acc.add_sentence(order, sentence)
		});

		let mut orders = Vec::with_capacity(order);
		for n in 1..=order {
			let ngrams = counts.counts.get(n - 1);
			let unique = ngrams.map(HashMap::len).unwrap_or(0);
			let entries = ngrams.into_iter().flatten().filter_map(|(ngram, &count)| {
				let denominator = if n == 1 { unique } else { counts.get(&ngram[..n - 1])? };
				if denominator == 0 {
					return None;
				}
				let (token, prefix) = ngram.split_last()?;
				let context: Vec<String> = prefix.iter().rev().cloned().collect();
				Some(((token.clone(), context), (count as f64 / denominator as f64).ln()))
			});
			let table = ProbabilityTable::from_flat(entries);
			info!("{}-gram table: {} entries", n, table.len());
			orders.push(table);
		}

		Ok(LanguageModel { orders })
	}
}
