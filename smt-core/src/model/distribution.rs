use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

/// A single key component that can be written to and read back from the
/// pipe-delimited export format.
pub trait Field: Clone + Eq + Ord + Hash + Debug {
	/// Textual form written to an export file.
	fn to_field(&self) -> String;

	/// Parses a trimmed export field, `None` if it does not fit this type.
	fn parse_field(raw: &str) -> Option<Self>;
}

impl Field for String {
	fn to_field(&self) -> String {
		self.clone()
	}

	fn parse_field(raw: &str) -> Option<Self> {
		Some(raw.to_owned())
	}
}

impl Field for usize {
	fn to_field(&self) -> String {
		self.to_string()
	}

	fn parse_field(raw: &str) -> Option<Self> {
		raw.parse().ok()
	}
}

/// The conditioning part of a probability key, made of zero or more fields.
pub trait ContextKey: Clone + Eq + Hash + Debug {
	fn to_fields(&self) -> Vec<String>;

	/// Rebuilds a context from all the key fields that follow the outcome.
	fn parse_fields(raw: &[&str]) -> Option<Self>;
}

impl ContextKey for String {
	fn to_fields(&self) -> Vec<String> {
		vec![self.clone()]
	}

	fn parse_fields(raw: &[&str]) -> Option<Self> {
		match raw {
			[single] => Some((*single).to_owned()),
			_ => None,
		}
	}
}

impl ContextKey for (usize, usize, usize) {
	fn to_fields(&self) -> Vec<String> {
		vec![self.0.to_field(), self.1.to_field(), self.2.to_field()]
	}

	fn parse_fields(raw: &[&str]) -> Option<Self> {
		match raw {
			[a, b, c] => Some((usize::parse_field(a)?, usize::parse_field(b)?, usize::parse_field(c)?)),
			_ => None,
		}
	}
}

/// Variable-length token context, used by the n-gram tables (empty for unigrams).
impl ContextKey for Vec<String> {
	fn to_fields(&self) -> Vec<String> {
		self.clone()
	}

	fn parse_fields(raw: &[&str]) -> Option<Self> {
		Some(raw.iter().map(|s| (*s).to_owned()).collect())
	}
}

/// Sparse conditional distribution `P(outcome | context)`.
///
/// Built once from a flat `(outcome, context) -> probability` mapping and
/// regrouped per context so that all outcomes of a context are reachable in
/// O(1). Values are opaque to the table: trainers store plain probabilities
/// (Models 1 and 2) or log-probabilities (Model 3, language model).
///
/// # Invariants
/// - At most one entry per `(context, outcome)` pair
/// - The options of every context are kept sorted by descending value, ties
///   broken by ascending outcome, so `sorted_options` is deterministic
/// - No context maps to an empty option list
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ProbabilityTable<O, C: Eq + Hash> {
	lookup: HashMap<C, Vec<(O, f64)>>,
}

impl<O: Field, C: ContextKey> Default for ProbabilityTable<O, C> {
	fn default() -> Self {
		Self { lookup: HashMap::new() }
	}
}

impl<O: Field, C: ContextKey> ProbabilityTable<O, C> {
	/// Builds a table from a flat mapping. A repeated key keeps its last value.
	pub fn from_flat<I>(entries: I) -> Self
	where
		I: IntoIterator<Item = ((O, C), f64)>,
	{
		let mut grouped: HashMap<C, HashMap<O, f64>> = HashMap::new();
		for ((outcome, context), probability) in entries {
			grouped.entry(context).or_default().insert(outcome, probability);
		}

		let lookup = grouped
			.into_iter()
			.map(|(context, options)| {
				let mut options: Vec<(O, f64)> = options.into_iter().collect();
				sort_options(&mut options);
				(context, options)
			})
			.collect();

		Self { lookup }
	}

	/// Enumerates every `(outcome, context, probability)` entry.
	pub fn entries(&self) -> impl Iterator<Item = (&O, &C, f64)> {
		self.lookup
			.iter()
			.flat_map(|(context, options)| options.iter().map(move |(outcome, p)| (outcome, context, *p)))
	}

	/// Point lookup, `None` when either the context or the outcome is unknown.
	pub fn lookup(&self, outcome: &O, context: &C) -> Option<f64> {
		self.lookup
			.get(context)?
			.iter()
			.find(|(candidate, _)| candidate == outcome)
			.map(|(_, p)| *p)
	}

	/// Point lookup where absence means "no evidence" and reads as `0.0`.
	///
	/// Callers decide their own fallback policy when they need to tell the two apart.
	pub fn get(&self, outcome: &O, context: &C) -> f64 {
		self.lookup(outcome, context).unwrap_or(0.0)
	}

	/// Outcomes of `context` by descending probability; empty if the context is unknown.
	pub fn sorted_options(&self, context: &C) -> &[(O, f64)] {
		self.lookup.get(context).map(Vec::as_slice).unwrap_or(&[])
	}

	/// Removes every entry whose value is `<= threshold` and returns how many were removed.
	///
	/// Surviving options keep their relative order.
	pub fn prune(&mut self, threshold: f64) -> usize {
		let mut removed = 0;
		self.lookup.retain(|_, options| {
			let before = options.len();
			options.retain(|(_, p)| *p > threshold);
			removed += before - options.len();
			!options.is_empty()
		});
		removed
	}

	/// Maps every value through `f`, dropping entries for which it returns `None`.
	pub fn filter_map_values<F>(&self, f: F) -> Self
	where
		F: Fn(f64) -> Option<f64>,
	{
		Self::from_flat(
			self.entries()
				.filter_map(|(outcome, context, p)| f(p).map(|v| ((outcome.clone(), context.clone()), v))),
		)
	}

	/// Converts plain probabilities to natural-log probabilities, dropping zeros.
	pub fn to_log_space(&self) -> Self {
		self.filter_map_values(|p| (p > 0.0).then(|| p.ln()))
	}

	/// Number of `(context, outcome)` entries.
	pub fn len(&self) -> usize {
		self.lookup.values().map(Vec::len).sum()
	}

	pub fn is_empty(&self) -> bool {
		self.lookup.is_empty()
	}

	/// Number of distinct contexts.
	pub fn context_count(&self) -> usize {
		self.lookup.len()
	}

	pub fn contains_context(&self, context: &C) -> bool {
		self.lookup.contains_key(context)
	}
}

fn sort_options<O: Ord>(options: &mut [(O, f64)]) {
	options.sort_by(|(oa, pa), (ob, pb)| match pb.total_cmp(pa) {
		Ordering::Equal => oa.cmp(ob),
		other => other,
	});
}
