use log::{debug, warn};

use crate::model::{DistortionTable, Model3Tables};

use super::{Decoder, fertility_options, lexical_candidates};

/// Partial translation: produced tokens with the source index (NULL at 0)
/// that generated them, and the cumulative log-probability.
#[derive(Clone, Debug)]
struct Hypothesis {
	tokens: Vec<(String, usize)>,
	score: f64,
}

/// Exhaustive Model 3 search, meant for short inputs.
///
/// Every source token expands each hypothesis with its `top_fertility`
/// fertility values crossed with its `top_lexical` translations. Each
/// surviving hypothesis is then scored under every distortion placement
/// of its tokens and the best `lexical + fertility + distortion` total wins.
/// The language model is not consulted.
///
/// Both stages are bounded by `max_hypotheses`: the expansion keeps the
/// best-scoring hypotheses once the budget is exceeded, and the placement
/// search of each hypothesis stops after expanding that many partial orders.
/// A hypothesis with no complete placement ranks below every placeable one;
/// only when none is placeable does the best one win in source order.
#[derive(Clone, Debug)]
pub struct BruteForceDecoder<'a> {
	tables: &'a Model3Tables,
	pub top_fertility: usize,
	pub top_lexical: usize,
	pub max_hypotheses: usize,
}

impl<'a> BruteForceDecoder<'a> {
	pub fn new(tables: &'a Model3Tables) -> Self {
		Self { tables, top_fertility: 3, top_lexical: 5, max_hypotheses: 4096 }
	}

	pub fn with_max_hypotheses(mut self, max_hypotheses: usize) -> Self {
		self.max_hypotheses = max_hypotheses.max(1);
		self
	}

	fn expand(&self, sentence: &[String]) -> Vec<Hypothesis> {
		let mut hypotheses = vec![Hypothesis { tokens: Vec::new(), score: 0.0 }];

		for (offset, token) in sentence.iter().enumerate() {
			let source = offset + 1;
			let fertilities = fertility_options(&self.tables.fertility, token, self.top_fertility);
			let mut translations = lexical_candidates(&self.tables.lexical, token, self.top_lexical);
			if translations.is_empty() {
				translations.push((token.clone(), 0.0));
			}

			let mut next = Vec::with_capacity(hypotheses.len() * fertilities.len() * translations.len());
			for hypothesis in &hypotheses {
				for &(fertility, fertility_score) in &fertilities {
					// A dropped token has no translation to choose
					if fertility == 0 {
						next.push(Hypothesis { tokens: hypothesis.tokens.clone(), score: hypothesis.score + fertility_score });
						continue;
					}
					for (translation, lexical_score) in &translations {
						let mut tokens = hypothesis.tokens.clone();
						tokens.extend(std::iter::repeat_n((translation.clone(), source), fertility));
						next.push(Hypothesis { tokens, score: hypothesis.score + fertility_score + lexical_score });
					}
				}
			}

			if next.len() > self.max_hypotheses {
				warn!(
					"brute-force decoding: {} hypotheses after token {}, keeping the best {}",
					next.len(),
					source,
					self.max_hypotheses
				);
				next.sort_by(|a, b| b.score.total_cmp(&a.score));
				next.truncate(self.max_hypotheses);
			}
			hypotheses = next;
		}
		hypotheses
	}
}

/// Depth-first enumeration of the output orders of one hypothesis.
struct Placement<'a> {
	tokens: &'a [(String, usize)],
	distortion: &'a DistortionTable,
	length_f: usize,
	budget: usize,
	expanded: usize,
	order: Vec<usize>,
	used: Vec<bool>,
	best: Option<(Vec<usize>, f64)>,
}

impl<'a> Placement<'a> {
	fn new(tokens: &'a [(String, usize)], distortion: &'a DistortionTable, length_f: usize, budget: usize) -> Self {
		Placement {
			tokens,
			distortion,
			length_f,
			budget,
			expanded: 0,
			order: Vec::with_capacity(tokens.len()),
			used: vec![false; tokens.len()],
			best: None,
		}
	}

	/// Best-scoring complete order found within the budget, with its total
	/// distortion log-probability.
	fn search(
		tokens: &'a [(String, usize)],
		distortion: &'a DistortionTable,
		length_f: usize,
		budget: usize,
	) -> Option<(Vec<usize>, f64)> {
		let mut placement = Placement::new(tokens, distortion, length_f, budget);
		placement.visit(0.0);
		if placement.exhausted() {
			debug!("placement search stopped after {} partial orders", placement.expanded);
		}
		placement.best
	}

	fn exhausted(&self) -> bool {
		self.expanded >= self.budget
	}

	/// Fills the next output position with every unused token whose
	/// distortion `d(position | source, l_e, l_f)` is known. Every call
	/// counts against the budget, dead ends included.
	fn visit(&mut self, score: f64) {
		if self.exhausted() {
			return;
		}
		self.expanded += 1;
		let position = self.order.len();
		if position == self.tokens.len() {
			if self.best.as_ref().is_none_or(|(_, best)| score > *best) {
				self.best = Some((self.order.clone(), score));
			}
			return;
		}

		let context_lengths = (self.tokens.len() + 1, self.length_f + 1);
		for index in 0..self.tokens.len() {
			if self.exhausted() {
				return;
			}
			if self.used[index] {
				continue;
			}
			let source = self.tokens[index].1;
			let Some(d) = self
				.distortion
				.lookup(&(position + 1), &(source, context_lengths.0, context_lengths.1))
			else {
				continue;
			};
			self.used[index] = true;
			self.order.push(index);
			self.visit(score + d);
			self.order.pop();
			self.used[index] = false;
		}
	}
}

/// Keeps `tokens` if `score` beats the current best.
fn keep_best(best: &mut Option<(Vec<String>, f64)>, score: f64, tokens: impl FnOnce() -> Vec<String>) {
	if best.as_ref().is_none_or(|(_, best_score)| score > *best_score) {
		*best = Some((tokens(), score));
	}
}

impl Decoder for BruteForceDecoder<'_> {
	/// Translates `sentence` by exhaustive Model 3 search.
	///
	/// # Parameters
	/// - `sentence`: the tokenized foreign sentence, NULL excluded
	///
	/// # Returns
	/// The tokens of the hypothesis maximizing
	/// `lexical + fertility + distortion`, in its best output order.
	///
	/// # Behavior
	/// - Expands hypotheses token by token, pruned to `max_hypotheses`
	/// - Searches the output orders of each hypothesis under the same budget
	/// - Ranks hypotheses without any complete placement after all others
	///
	/// # Notes
	/// When no hypothesis can be placed, the best one is emitted in source
	/// order. An empty sentence decodes to an empty output.
	fn decode_sentence(&self, sentence: &[String]) -> Vec<String> {
		let hypotheses = self.expand(sentence);
		debug!("brute-force decoding: {} hypotheses to place", hypotheses.len());

		let mut placed: Option<(Vec<String>, f64)> = None;
		let mut unplaced: Option<(Vec<String>, f64)> = None;
		for hypothesis in &hypotheses {
			match Placement::search(&hypothesis.tokens, &self.tables.distortion, sentence.len(), self.max_hypotheses) {
				Some((order, distortion)) => keep_best(&mut placed, hypothesis.score + distortion, || {
					order.into_iter().map(|index| hypothesis.tokens[index].0.clone()).collect()
				}),
				None => keep_best(&mut unplaced, hypothesis.score, || {
					hypothesis.tokens.iter().map(|(token, _)| token.clone()).collect()
				}),
			}
		}
		if placed.is_none() && unplaced.is_some() {
			debug!("brute-force decoding: no hypothesis could be placed, keeping source order");
		}
		placed.or(unplaced).map(|(tokens, _)| tokens).unwrap_or_default()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::ProbabilityTable;

	fn words(tokens: &[&str]) -> Vec<String> {
		tokens.iter().map(|t| (*t).to_owned()).collect()
	}

	#[test]
	fn single_option_is_returned_deterministically() {
		let tables = Model3Tables {
			lexical: ProbabilityTable::from_flat(vec![(("cat".to_owned(), "chat".to_owned()), -0.3)]),
			distortion: ProbabilityTable::from_flat(vec![((1, (1, 2, 2)), -0.1)]),
			fertility: ProbabilityTable::from_flat(vec![((1, "chat".to_owned()), -0.2)]),
			p0: 0.5,
		};
		let decoder = BruteForceDecoder::new(&tables);
		for _ in 0..3 {
			assert_eq!(decoder.decode_sentence(&words(&["chat"])), words(&["cat"]));
		}
	}

	#[test]
	fn distortion_reorders_tokens() {
		let tables = Model3Tables {
			lexical: ProbabilityTable::from_flat(vec![
				(("house".to_owned(), "maison".to_owned()), -0.1),
				(("blue".to_owned(), "bleue".to_owned()), -0.1),
			]),
			distortion: ProbabilityTable::from_flat(vec![
				((1, (1, 3, 3)), -2.0),
				((2, (1, 3, 3)), -0.1),
				((1, (2, 3, 3)), -0.1),
				((2, (2, 3, 3)), -2.0),
			]),
			fertility: ProbabilityTable::default(),
			p0: 0.5,
		};
		let decoder = BruteForceDecoder::new(&tables);
		assert_eq!(decoder.decode_sentence(&words(&["maison", "bleue"])), words(&["blue", "house"]));
	}

	#[test]
	fn zero_fertility_can_win() {
		let tables = Model3Tables {
			lexical: ProbabilityTable::from_flat(vec![(("do".to_owned(), "ne".to_owned()), -0.1)]),
			distortion: ProbabilityTable::default(),
			fertility: ProbabilityTable::from_flat(vec![((0, "ne".to_owned()), -0.1), ((1, "ne".to_owned()), -2.0)]),
			p0: 0.5,
		};
		let decoder = BruteForceDecoder::new(&tables);
		assert!(decoder.decode_sentence(&words(&["ne"])).is_empty());
	}

	#[test]
	fn hypothesis_budget_is_enforced() {
		let lexical = ProbabilityTable::from_flat(
			(0..5).flat_map(|i| (0..3).map(move |s| ((format!("e{i}"), format!("f{s}")), -(i as f64) - 0.1))),
		);
		let tables = Model3Tables {
			lexical,
			distortion: ProbabilityTable::default(),
			fertility: ProbabilityTable::default(),
			p0: 0.5,
		};
		let decoder = BruteForceDecoder::new(&tables).with_max_hypotheses(7);
		let hypotheses = decoder.expand(&words(&["f0", "f1", "f2"]));
		assert_eq!(hypotheses.len(), 7);
		assert_eq!(decoder.decode_sentence(&words(&["f0", "f1", "f2"])), words(&["e0", "e0", "e0"]));
	}

	#[test]
	fn budget_bounds_dead_end_search() {
		let n = 12;
		let source: Vec<String> = (0..n).map(|i| format!("f{i}")).collect();
		let lexical = ProbabilityTable::from_flat((0..n).map(|i| ((format!("e{i}"), format!("f{i}")), -0.1)));
		// The last output position has no distortion entry: every order dead-ends
		let distortion = ProbabilityTable::from_flat(
			(1..n).flat_map(|position| (1..=n).map(move |s| ((position, (s, n + 1, n + 1)), -0.1))),
		);
		let tables = Model3Tables { lexical, distortion, fertility: ProbabilityTable::default(), p0: 0.5 };

		let tokens: Vec<(String, usize)> = (0..n).map(|i| (format!("e{i}"), i + 1)).collect();
		let mut placement = Placement::new(&tokens, &tables.distortion, n, 1000);
		placement.visit(0.0);
		assert_eq!(placement.expanded, 1000);
		assert!(placement.best.is_none());

		let decoder = BruteForceDecoder::new(&tables).with_max_hypotheses(1000);
		let expected: Vec<String> = (0..n).map(|i| format!("e{i}")).collect();
		assert_eq!(decoder.decode_sentence(&source), expected);
	}

	#[test]
	fn unplaceable_hypothesis_loses() {
		let tables = Model3Tables {
			lexical: ProbabilityTable::from_flat(vec![(("cat".to_owned(), "chat".to_owned()), -0.3)]),
			// Only the one-token output can be placed
			distortion: ProbabilityTable::from_flat(vec![((1, (1, 2, 2)), -0.5)]),
			fertility: ProbabilityTable::from_flat(vec![((1, "chat".to_owned()), -0.2), ((2, "chat".to_owned()), -0.3)]),
			p0: 0.5,
		};
		let decoder = BruteForceDecoder::new(&tables);
		assert_eq!(decoder.decode_sentence(&words(&["chat"])), words(&["cat"]));
	}

	#[test]
	fn empty_sentence_decodes_to_nothing() {
		let tables = Model3Tables {
			lexical: ProbabilityTable::default(),
			distortion: ProbabilityTable::default(),
			fertility: ProbabilityTable::default(),
			p0: 0.5,
		};
		assert!(BruteForceDecoder::new(&tables).decode_sentence(&[]).is_empty());
	}
}
