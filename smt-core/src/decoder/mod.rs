//! Sentence decoders over trained, read-only tables.
//!
//! Every decoder implements [`Decoder`]. Lexical tables are expected in log
//! space (Model 3 output, or Model 1/2 output passed through
//! [`ProbabilityTable::to_log_space`](crate::model::ProbabilityTable::to_log_space)).

use crate::config::LmWeights;
use crate::corpus::{NULL_TOKEN, Sentence};
use crate::model::language_model::{LanguageModel, SENTENCE_END, SENTENCE_START};
use crate::model::parallel::parallel_map;
use crate::model::{FertilityTable, LexicalTable};

/// Top lexical translation per token, no reordering.
pub mod lexical;

/// Greedy left-to-right decoding rescored by the language model.
pub mod lexical_lm;

/// Fertility expansion, greedy distortion placement and LM rescoring.
pub mod model3_lm;

/// Exhaustive fertility × lexical × distortion search with a hypothesis budget.
pub mod brute_force;

pub use brute_force::BruteForceDecoder;
pub use lexical::LexicalDecoder;
pub use lexical_lm::LexicalLmDecoder;
pub use model3_lm::Model3LmDecoder;

/// Tokens never preferred as a translation of a non-punctuation word.
pub const PUNCTUATION: [&str; 6] = [".", "!", "?", ",", "'", "-"];

/// Translates tokenized foreign sentences.
pub trait Decoder: Sync {
	/// Decodes one sentence.
	///
	/// # Parameters
	/// - `sentence`: the tokenized foreign sentence, NULL excluded
	///
	/// # Returns
	/// The translated tokens, never the NULL token or sentence markers.
	///
	/// # Notes
	/// Never fails: unknown tokens are passed through and an empty sentence
	/// gives an empty translation.
	fn decode_sentence(&self, sentence: &[String]) -> Vec<String>;

	/// Decodes `sentences` across `workers` threads, keeping their order.
	fn decode_all(&self, sentences: &[Sentence], workers: usize) -> Vec<Sentence> {
		parallel_map(sentences, workers, |sentence| self.decode_sentence(sentence))
	}
}

pub(crate) fn is_punctuation(token: &str) -> bool {
	PUNCTUATION.contains(&token)
}

/// Up to `top` best translations of `token`, the NULL outcome excluded.
pub(crate) fn lexical_candidates(lexical: &LexicalTable, token: &str, top: usize) -> Vec<(String, f64)> {
	lexical
		.sorted_options(&token.to_owned())
		.iter()
		.filter(|(e, _)| e != NULL_TOKEN)
		.take(top)
		.cloned()
		.collect()
}

/// Lexical candidates, or the token itself with a neutral score when unknown.
pub(crate) fn candidates_or_passthrough(lexical: &LexicalTable, token: &str, top: usize) -> Vec<(String, f64)> {
	let candidates = lexical_candidates(lexical, token, top);
	if candidates.is_empty() {
		vec![(token.to_owned(), 0.0)]
	} else {
		candidates
	}
}

/// Up to `top` fertility values of `token`, or `[(1, 0.0)]` when unknown.
pub(crate) fn fertility_options(fertility: &FertilityTable, token: &str, top: usize) -> Vec<(usize, f64)> {
	let options: Vec<(usize, f64)> = fertility.sorted_options(&token.to_owned()).iter().take(top).copied().collect();
	if options.is_empty() { vec![(1, 0.0)] } else { options }
}

/// Picks one token per slot, left to right, maximizing the weighted LM score
/// plus the candidate's lexical log-probability. Empty slots emit nothing.
///
/// The history starts with [`SENTENCE_START`]; sentence markers never reach
/// the output.
pub(crate) fn choose_with_lm(slots: &[Vec<(String, f64)>], lm: &LanguageModel, weights: &LmWeights) -> Vec<String> {
	let mut history = vec![SENTENCE_START.to_owned()];
	for candidates in slots {
		let mut best: Option<(&str, f64)> = None;
		for (token, lexical) in candidates {
			let score = lm.score(token, &history, weights) + lexical;
			if best.is_none_or(|(_, best_score)| score > best_score) {
				best = Some((token.as_str(), score));
			}
		}
		if let Some((token, _)) = best {
			history.push(token.to_owned());
		}
	}
	history
		.into_iter()
		.filter(|token| token != SENTENCE_START && token != SENTENCE_END)
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::ProbabilityTable;

	fn lexical() -> LexicalTable {
		ProbabilityTable::from_flat(vec![
			((String::new(), "chat".to_owned()), -0.1),
			(("cat".to_owned(), "chat".to_owned()), -0.5),
			(("kitty".to_owned(), "chat".to_owned()), -1.5),
		])
	}

	#[test]
	fn candidates_skip_null_outcome() {
		let candidates = lexical_candidates(&lexical(), "chat", 5);
		assert_eq!(candidates.len(), 2);
		assert_eq!(candidates[0].0, "cat");
		assert_eq!(lexical_candidates(&lexical(), "chat", 1).len(), 1);
	}

	#[test]
	fn unknown_token_passes_through() {
		let candidates = candidates_or_passthrough(&lexical(), "chien", 5);
		assert_eq!(candidates, vec![("chien".to_owned(), 0.0)]);
	}

	#[test]
	fn unknown_fertility_defaults_to_one() {
		let table: FertilityTable = ProbabilityTable::default();
		assert_eq!(fertility_options(&table, "chat", 3), vec![(1, 0.0)]);
	}

	#[test]
	fn lm_choice_skips_empty_slots_and_strips_markers() {
		let lm = LanguageModel::default();
		let slots = vec![
			vec![("a".to_owned(), -2.0), ("b".to_owned(), -1.0)],
			Vec::new(),
			vec![("c".to_owned(), -1.0)],
		];
		let chosen = choose_with_lm(&slots, &lm, &LmWeights::default());
		assert_eq!(chosen, vec!["b".to_owned(), "c".to_owned()]);
	}
}
