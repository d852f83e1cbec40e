use std::collections::HashMap;

use super::distribution::ProbabilityTable;
use super::parallel::merge_counts;

/// Values indexed by a source token, then a target token.
///
/// Used both for the fractional counts of the E-step and for the lexical
/// table being re-estimated, so that lookups work on borrowed `&str`.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct TokenPairMap {
	by_f: HashMap<String, HashMap<String, f64>>,
}

impl TokenPairMap {
	pub(crate) fn get(&self, f: &str, e: &str) -> Option<f64> {
		self.by_f.get(f)?.get(e).copied()
	}

	pub(crate) fn add(&mut self, f: &str, e: &str, value: f64) {
		match self.by_f.get_mut(f) {
			Some(inner) => add_count(inner, e, value),
			None => {
				self.by_f.entry(f.to_owned()).or_default().insert(e.to_owned(), value);
			}
		}
	}

	pub(crate) fn insert(&mut self, f: &str, e: &str, value: f64) {
		match self.by_f.get_mut(f) {
			Some(inner) => {
				inner.insert(e.to_owned(), value);
			}
			None => {
				self.by_f.entry(f.to_owned()).or_default().insert(e.to_owned(), value);
			}
		}
	}

	/// Iterates `(f, e, value)`.
	pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &str, f64)> {
		self.by_f
			.iter()
			.flat_map(|(f, inner)| inner.iter().map(move |(e, v)| (f.as_str(), e.as_str(), *v)))
	}

	pub(crate) fn len(&self) -> usize {
		self.by_f.values().map(HashMap::len).sum()
	}

	pub(crate) fn merge(&mut self, other: Self) {
		if self.by_f.is_empty() {
			*self = other;
			return;
		}
		for (f, inner) in other.by_f {
			merge_counts(self.by_f.entry(f).or_default(), inner);
		}
	}

	/// Lexical table `t(e | f)`: outcome `e`, context `f`.
	pub(crate) fn to_table(&self) -> ProbabilityTable<String, String> {
		ProbabilityTable::from_flat(self.iter().map(|(f, e, v)| ((e.to_owned(), f.to_owned()), v)))
	}
}

/// Adds `value` to the entry of `key`, allocating the key only when it is new.
pub(crate) fn add_count(map: &mut HashMap<String, f64>, key: &str, value: f64) {
	match map.get_mut(key) {
		Some(count) => *count += value,
		None => {
			map.insert(key.to_owned(), value);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn add_accumulates_and_merge_sums() {
		let mut left = TokenPairMap::default();
		left.add("maison", "house", 0.5);
		left.add("maison", "house", 0.25);

		let mut right = TokenPairMap::default();
		right.add("maison", "house", 0.25);
		right.add("chat", "cat", 1.0);

		left.merge(right);
		assert_eq!(left.get("maison", "house"), Some(1.0));
		assert_eq!(left.get("chat", "cat"), Some(1.0));
		assert_eq!(left.get("chat", "house"), None);
		assert_eq!(left.len(), 2);
	}

	#[test]
	fn table_is_keyed_by_target_given_source() {
		let mut map = TokenPairMap::default();
		map.insert("maison", "house", 0.75);
		let table = map.to_table();
		assert_eq!(table.get(&"house".to_owned(), &"maison".to_owned()), 0.75);
	}
}
