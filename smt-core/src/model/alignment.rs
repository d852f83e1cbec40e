use std::collections::{HashMap, HashSet};
use std::fmt::Debug;

use super::counts::TokenPairMap;

/// `(index_e, index_f, length_e, length_f)`, lengths counting the NULL token.
pub(crate) type DistortionKey = (usize, usize, usize, usize);

/// Read-only view on the log-space tables an alignment is scored against.
///
/// Absence is meaningful: a missing entry makes an alignment unscorable,
/// which is not the same as a zero probability.
#[derive(Clone, Copy, Debug)]
pub struct ScoringTables<'a> {
	lexical: &'a TokenPairMap,
	distortion: &'a HashMap<DistortionKey, f64>,
}

impl<'a> ScoringTables<'a> {
	pub(crate) fn new(lexical: &'a TokenPairMap, distortion: &'a HashMap<DistortionKey, f64>) -> Self {
		Self { lexical, distortion }
	}

	/// `log t(e | f)` if known.
	pub fn lexical(&self, token_e: &str, token_f: &str) -> Option<f64> {
		self.lexical.get(token_f, token_e)
	}

	/// `log d(index_e | index_f, length_e, length_f)` if known.
	pub fn distortion(&self, index_e: usize, index_f: usize, length_e: usize, length_f: usize) -> Option<f64> {
		self.distortion.get(&(index_e, index_f, length_e, length_f)).copied()
	}
}

/// Word alignment of one sentence pair.
///
/// Slot `j` (one per source token, NULL at slot 0 included) holds the index
/// of the target token that generated it, `0` standing for the target NULL.
///
/// # Invariants
/// - `links.len() == length_f`
/// - Every link is `< length_e`
///
/// Both are enforced on construction and by [`Alignment::set_index_e`]:
/// explicit links are truncated or padded with NULL links to `length_f`,
/// and out-of-range links are clamped to `length_e - 1`.
#[derive(Clone, Debug)]
pub struct Alignment {
	length_e: usize,
	length_f: usize,
	links: Vec<usize>,
}

/// Alignments are compared by links and target length only.
impl PartialEq for Alignment {
	fn eq(&self, other: &Self) -> bool {
		self.links == other.links && self.length_e == other.length_e
	}
}

impl Eq for Alignment {}

impl Alignment {
	/// Builds an alignment from explicit links, or the monotonic default
	/// `min(j, length_e - 1)` when `links` is `None`.
	///
	/// Explicit links are resized to `length_f`, padding with `0` (NULL), and
	/// out-of-range links are clamped to the last target index. Callers that
	/// must detect bad links check them before building the alignment.
	pub fn new(length_e: usize, length_f: usize, links: Option<Vec<usize>>) -> Self {
		let last_e = length_e.saturating_sub(1);
		let links = match links {
			Some(mut links) => {
				links.resize(length_f, 0);
				links.iter_mut().for_each(|link| *link = (*link).min(last_e));
				links
			}
			None => (0..length_f).map(|j| j.min(last_e)).collect(),
		};
		Self { length_e, length_f, links }
	}

	/// The monotonic default alignment.
	pub fn monotonic(length_e: usize, length_f: usize) -> Self {
		Self::new(length_e, length_f, None)
	}

	pub fn length_e(&self) -> usize {
		self.length_e
	}

	pub fn length_f(&self) -> usize {
		self.length_f
	}

	pub fn links(&self) -> &[usize] {
		&self.links
	}

	/// Target index aligned to source slot `index_f`.
	pub fn index_e(&self, index_f: usize) -> usize {
		self.links[index_f]
	}

	pub fn set_index_e(&mut self, index_f: usize, index_e: usize) {
		self.links[index_f] = index_e.min(self.length_e.saturating_sub(1));
	}

	/// Sum of the per-slot log distortions, `None` if any slot is unscorable.
	pub fn log_probability(&self, tables: &ScoringTables<'_>) -> Option<f64> {
		self.links
			.iter()
			.enumerate()
			.map(|(index_f, &index_e)| tables.distortion(index_e, index_f, self.length_e, self.length_f))
			.sum()
	}

	/// Log distortion plus log lexical probability of every link,
	/// `None` if any link references a missing entry.
	pub fn score(&self, sentence_e: &[String], sentence_f: &[String], tables: &ScoringTables<'_>) -> Option<f64> {
		let lexical: Option<f64> = self
			.links
			.iter()
			.enumerate()
			.map(|(index_f, &index_e)| tables.lexical(sentence_e.get(index_e)?, sentence_f.get(index_f)?))
			.sum();
		Some(lexical? + self.log_probability(tables)?)
	}

	/// Every alignment one move or one swap away, never touching slot `pegged`.
	///
	/// Moves re-link a single slot to another target index, swaps exchange
	/// the links of two slots. The alignment itself and duplicates are excluded.
	pub fn neighbors(&self, pegged: usize) -> Vec<Alignment> {
		let mut seen: HashSet<Vec<usize>> = HashSet::new();
		seen.insert(self.links.clone());
		let mut res = Vec::new();

		for index_f in (0..self.length_f).filter(|&j| j != pegged) {
			for index_e in 0..self.length_e {
				let mut moved = self.links.clone();
				moved[index_f] = index_e;
				if seen.insert(moved.clone()) {
					res.push(self.with_links(moved));
				}
			}
		}

		for index_f in (0..self.length_f).filter(|&j| j != pegged) {
			for index_swap in (index_f + 1..self.length_f).filter(|&j| j != pegged) {
				let mut swapped = self.links.clone();
				swapped.swap(index_f, index_swap);
				if seen.insert(swapped.clone()) {
					res.push(self.with_links(swapped));
				}
			}
		}

		res
	}

	/// One hill-climbing step on the distortion probability.
	pub fn hillclimb(&self, tables: &ScoringTables<'_>, pegged: usize) -> Alignment {
		self.hillclimb_by(pegged, |alignment| alignment.log_probability(tables))
	}

	/// One hill-climbing step: the best scorable neighbor if it beats `self`,
	/// `self` otherwise. An unscorable alignment is beaten by any scorable one.
	pub fn hillclimb_by<F>(&self, pegged: usize, score: F) -> Alignment
	where
		F: Fn(&Alignment) -> Option<f64>,
	{
		let mut best = self.clone();
		let mut best_score = score(self);
		for neighbor in self.neighbors(pegged) {
			let Some(neighbor_score) = score(&neighbor) else {
				continue;
			};
			if best_score.is_none_or(|s| neighbor_score > s) {
				best = neighbor;
				best_score = Some(neighbor_score);
			}
		}
		best
	}

	fn with_links(&self, links: Vec<usize>) -> Alignment {
		Alignment { length_e: self.length_e, length_f: self.length_f, links }
	}
}

/// Strategy producing the candidate alignments of the approximate E-step.
pub trait AlignmentSearch: Debug + Send + Sync {
	/// Candidate alignments for one pair (NULL prepended on both sides),
	/// `None` when no scorable alignment exists.
	fn sample(&self, sentence_e: &[String], sentence_f: &[String], tables: &ScoringTables<'_>) -> Option<Vec<Alignment>>;
}

/// Independent per-slot argmax of `log t(e|f) + log d(i|j, l_e, l_f)`.
///
/// Yields exactly one alignment, or `None` as soon as one source slot has no
/// target index with both values known. Ties go to the lowest target index.
#[derive(Clone, Copy, Debug, Default)]
pub struct GreedyArgmax;

impl AlignmentSearch for GreedyArgmax {
	fn sample(&self, sentence_e: &[String], sentence_f: &[String], tables: &ScoringTables<'_>) -> Option<Vec<Alignment>> {
		greedy_argmax(sentence_e, sentence_f, tables).map(|alignment| vec![alignment])
	}
}

fn greedy_argmax(sentence_e: &[String], sentence_f: &[String], tables: &ScoringTables<'_>) -> Option<Alignment> {
	let length_e = sentence_e.len();
	let length_f = sentence_f.len();
	let mut links = Vec::with_capacity(length_f);

	for (index_f, token_f) in sentence_f.iter().enumerate() {
		let mut best: Option<(usize, f64)> = None;
		for (index_e, token_e) in sentence_e.iter().enumerate() {
			let (Some(t), Some(d)) = (
				tables.lexical(token_e, token_f),
				tables.distortion(index_e, index_f, length_e, length_f),
			) else {
				continue;
			};
			if best.is_none_or(|(_, p)| t + d > p) {
				best = Some((index_e, t + d));
			}
		}
		links.push(best?.0);
	}

	Some(Alignment::new(length_e, length_f, Some(links)))
}

/// Greedy argmax refined by hill climbing once per pegged source slot.
///
/// Climbs on the full lexical + distortion score, at most `max_steps` moves
/// per pegged slot. Returns the greedy seed followed by every distinct
/// local optimum.
#[derive(Clone, Copy, Debug)]
pub struct PeggedHillclimb {
	pub max_steps: usize,
}

impl Default for PeggedHillclimb {
	fn default() -> Self {
		Self { max_steps: 8 }
	}
}

impl AlignmentSearch for PeggedHillclimb {
	fn sample(&self, sentence_e: &[String], sentence_f: &[String], tables: &ScoringTables<'_>) -> Option<Vec<Alignment>> {
		let seed = greedy_argmax(sentence_e, sentence_f, tables)?;
		let score = |alignment: &Alignment| alignment.score(sentence_e, sentence_f, tables);

		let mut res = vec![seed.clone()];
		for pegged in 0..seed.length_f() {
			let mut current = seed.clone();
			for _ in 0..self.max_steps {
				let next = current.hillclimb_by(pegged, score);
				if next == current {
					break;
				}
				current = next;
			}
			if !res.contains(&current) {
				res.push(current);
			}
		}
		Some(res)
	}
}
