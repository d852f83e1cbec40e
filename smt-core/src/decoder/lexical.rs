use crate::model::LexicalTable;

use super::{Decoder, lexical_candidates};

/// Word-by-word decoder: every source token becomes its most probable
/// translation, or stays as is when the table does not know it.
#[derive(Clone, Copy, Debug)]
pub struct LexicalDecoder<'a> {
	lexical: &'a LexicalTable,
}

impl<'a> LexicalDecoder<'a> {
	pub fn new(lexical: &'a LexicalTable) -> Self {
		Self { lexical }
	}
}

impl Decoder for LexicalDecoder<'_> {
	fn decode_sentence(&self, sentence: &[String]) -> Vec<String> {
		sentence
			.iter()
			.map(|token| match lexical_candidates(self.lexical, token, 1).pop() {
				Some((translation, _)) => translation,
				None => token.clone(),
			})
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::ProbabilityTable;

	#[test]
	fn picks_best_translation_or_passes_through() {
		let lexical: LexicalTable = ProbabilityTable::from_flat(vec![
			(("house".to_owned(), "maison".to_owned()), 0.7),
			(("home".to_owned(), "maison".to_owned()), 0.3),
		]);
		let decoder = LexicalDecoder::new(&lexical);
		let sentence = vec!["la".to_owned(), "maison".to_owned()];
		assert_eq!(decoder.decode_sentence(&sentence), vec!["la".to_owned(), "house".to_owned()]);
	}

	#[test]
	fn decode_all_keeps_sentence_order() {
		let lexical: LexicalTable = ProbabilityTable::from_flat(vec![(("cat".to_owned(), "chat".to_owned()), 1.0)]);
		let decoder = LexicalDecoder::new(&lexical);
		let sentences: Vec<Vec<String>> = (0..9)
			.map(|i| if i % 2 == 0 { vec!["chat".to_owned()] } else { vec![format!("w{i}")] })
			.collect();
		let decoded = decoder.decode_all(&sentences, 3);
		assert_eq!(decoded.len(), 9);
		assert_eq!(decoded[0], vec!["cat".to_owned()]);
		assert_eq!(decoded[3], vec!["w3".to_owned()]);
	}
}
