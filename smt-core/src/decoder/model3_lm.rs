use log::trace;

use crate::config::LmWeights;
use crate::model::language_model::LanguageModel;
use crate::model::{DistortionTable, Model3Tables};

use super::{Decoder, candidates_or_passthrough, choose_with_lm, fertility_options, is_punctuation};

/// One output position before the final token choice.
#[derive(Clone, Debug)]
struct Slot {
	/// Source index of the generating token, NULL at 0.
	source: usize,
	candidates: Vec<(String, f64)>,
}

/// Model 3 decoder with greedy reordering.
///
/// # Responsibilities
/// - Expands every source token into `fertility` slots sharing its lexical
///   candidates (an empty slot for fertility zero)
/// - Moves each slot to its best distortion position, first come first served
/// - Picks the final token of every slot with the language model
///
/// # Invariants
/// - Slot placement is a permutation: no position is lost or shared
#[derive(Clone, Debug)]
pub struct Model3LmDecoder<'a> {
	tables: &'a Model3Tables,
	lm: &'a LanguageModel,
	weights: LmWeights,
	pub top_fertility: usize,
	pub top_lexical: usize,
}

impl<'a> Model3LmDecoder<'a> {
	pub fn new(tables: &'a Model3Tables, lm: &'a LanguageModel, weights: LmWeights) -> Self {
		Self { tables, lm, weights, top_fertility: 1, top_lexical: 5 }
	}

	fn expand(&self, sentence: &[String]) -> Vec<Slot> {
		let mut slots = Vec::new();
		for (offset, token) in sentence.iter().enumerate() {
			let source = offset + 1;
			let fertility = fertility_options(&self.tables.fertility, token, self.top_fertility)
				.first()
				.map(|(value, _)| *value)
				.unwrap_or(1);
			if fertility == 0 {
				slots.push(Slot { source, candidates: Vec::new() });
				continue;
			}

			let mut candidates = candidates_or_passthrough(&self.tables.lexical, token, self.top_lexical);
			if candidates.len() > 1 && !is_punctuation(token) {
				let words: Vec<(String, f64)> =
					candidates.iter().filter(|(e, _)| !is_punctuation(e)).cloned().collect();
				if !words.is_empty() {
					candidates = words;
				}
			}
			for _ in 0..fertility {
				slots.push(Slot { source, candidates: candidates.clone() });
			}
		}
		slots
	}
}

/// Assigns every slot the best distortion position `d(index_e | source,
/// l_e, l_f)` still free, falling back to its own position and then to the
/// next free one. Lengths count the NULL token.
fn place(slots: Vec<Slot>, distortion: &DistortionTable, length_f: usize) -> Vec<Slot> {
	let length = slots.len();
	let mut placed: Vec<Option<Slot>> = vec![None; length];

	for (own, slot) in slots.into_iter().enumerate() {
		let wanted = distortion
			.sorted_options(&(slot.source, length + 1, length_f + 1))
			.iter()
			.map(|(index_e, _)| *index_e)
			.find(|index_e| (1..=length).contains(index_e))
			.map(|index_e| index_e - 1)
			.filter(|position| placed[*position].is_none());
		let position = match wanted {
			Some(position) => position,
			None => (0..length)
				.map(|step| (own + step) % length)
				.find(|position| placed[*position].is_none())
				.unwrap_or(own),
		};
		trace!("slot {own} from source {} placed at {}", slot.source, position + 1);
		placed[position] = Some(slot);
	}

	placed.into_iter().flatten().collect()
}

impl Decoder for Model3LmDecoder<'_> {
	fn decode_sentence(&self, sentence: &[String]) -> Vec<String> {
		let slots = place(self.expand(sentence), &self.tables.distortion, sentence.len());
		let candidates: Vec<Vec<(String, f64)>> = slots.into_iter().map(|slot| slot.candidates).collect();
		choose_with_lm(&candidates, self.lm, &self.weights)
	}
}
