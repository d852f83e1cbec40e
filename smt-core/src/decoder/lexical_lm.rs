use crate::config::LmWeights;
use crate::model::LexicalTable;
use crate::model::language_model::LanguageModel;

use super::{Decoder, candidates_or_passthrough, choose_with_lm};

/// Greedy left-to-right decoder rescoring the `top_lexical` translations of
/// each token with the language model.
#[derive(Clone, Debug)]
pub struct LexicalLmDecoder<'a> {
	lexical: &'a LexicalTable,
	lm: &'a LanguageModel,
	weights: LmWeights,
	/// Number of lexical candidates considered per source token.
	pub top_lexical: usize,
}

impl<'a> LexicalLmDecoder<'a> {
	pub fn new(lexical: &'a LexicalTable, lm: &'a LanguageModel, weights: LmWeights) -> Self {
		Self { lexical, lm, weights, top_lexical: 10 }
	}
}

impl Decoder for LexicalLmDecoder<'_> {
	fn decode_sentence(&self, sentence: &[String]) -> Vec<String> {
		let slots: Vec<Vec<(String, f64)>> = sentence
			.iter()
			.map(|token| candidates_or_passthrough(self.lexical, token, self.top_lexical))
			.collect();
		choose_with_lm(&slots, self.lm, &self.weights)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::TrainingConfig;
	use crate::corpus::Corpus;
	use crate::model::ProbabilityTable;
	use crate::model::language_model::LmTrainer;

	#[test]
	fn language_model_overrides_a_slightly_better_lexical_choice() {
		let lexical: LexicalTable = ProbabilityTable::from_flat(vec![
			(("the".to_owned(), "le".to_owned()), -0.1),
			(("house".to_owned(), "maison".to_owned()), -0.6),
			(("home".to_owned(), "maison".to_owned()), -0.5),
		]);
		let corpus = Corpus::from_lines(["the house", "the house is red", "a house"]);
		let lm = LmTrainer::new(2, TrainingConfig::with_iterations(1)).train(&corpus).unwrap();
		let decoder = LexicalLmDecoder::new(&lexical, &lm, LmWeights::new(vec![0.0, 1.0]));

		let sentence = vec!["le".to_owned(), "maison".to_owned()];
		assert_eq!(decoder.decode_sentence(&sentence), vec!["the".to_owned(), "house".to_owned()]);
	}

	#[test]
	fn unknown_tokens_pass_through() {
		let lexical: LexicalTable = ProbabilityTable::default();
		let lm = LanguageModel::default();
		let decoder = LexicalLmDecoder::new(&lexical, &lm, LmWeights::default());
		let sentence = vec!["bonjour".to_owned()];
		assert_eq!(decoder.decode_sentence(&sentence), sentence);
	}
}
