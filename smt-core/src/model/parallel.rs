use std::collections::HashMap;
use std::hash::Hash;
use std::ops::AddAssign;
use std::sync::mpsc;
use std::thread;

use log::debug;

use crate::config::TrainingConfig;

/// Partial results that can be combined in any order.
pub(crate) trait Merge {
	fn merge(&mut self, other: Self);
}

/// Adds every count of `other` into `into`.
pub(crate) fn merge_counts<K, V>(into: &mut HashMap<K, V>, other: HashMap<K, V>)
where
	K: Eq + Hash,
	V: AddAssign + Default,
{
	if into.is_empty() {
		*into = other;
		return;
	}
	for (key, count) in other {
		*into.entry(key).or_default() += count;
	}
}

/// Streams `items` in batches of `config.batch_size`, splits every batch
/// across `config.workers` threads and merges the per-worker accumulators.
///
/// # Parameters
/// - `items`: consumed lazily, one batch at a time
/// - `config`: batch size (at least 1) and worker count
/// - `work`: folds one item into a worker's accumulator
///
/// # Returns
/// The merge of every accumulator, or `A::default()` for no items.
///
/// # Behavior
/// - A batch runs on the calling thread when `workers <= 1` or it holds a
///   single item
/// - Otherwise it is cut into `workers` chunks on scoped threads whose
///   results come back over a channel
///
/// # Notes
/// `work` only ever sees shared references, so any table it reads stays
/// immutable during the sweep. `A::merge` must not depend on merge order.
pub(crate) fn sweep<I, T, A, F>(items: I, config: &TrainingConfig, work: F) -> A
where
	I: Iterator<Item = T>,
	T: Sync,
	A: Default + Merge + Send,
	F: Fn(&mut A, &T) + Sync,
{
	let mut items = items;
	let mut acc = A::default();
	let mut batch: Vec<T> = Vec::with_capacity(config.batch_size);
	let mut n_batches = 0usize;

	loop {
		batch.clear();
		batch.extend(items.by_ref().take(config.batch_size.max(1)));
		if batch.is_empty() {
			break;
		}
		n_batches += 1;
		acc.merge(process_batch(&batch, config.workers, &work));
	}

	debug!("sweep finished after {n_batches} batch(es)");
	acc
}

fn process_batch<T, A, F>(batch: &[T], workers: usize, work: &F) -> A
where
	T: Sync,
	A: Default + Merge + Send,
	F: Fn(&mut A, &T) + Sync,
{
	if workers <= 1 || batch.len() < 2 {
		let mut acc = A::default();
		for item in batch {
			work(&mut acc, item);
		}
		return acc;
	}

	let chunk_size = batch.len().div_ceil(workers);
	let (tx, rx) = mpsc::channel();
	thread::scope(|scope| {
		for chunk in batch.chunks(chunk_size) {
			let tx = tx.clone();
			scope.spawn(move || {
				let mut partial = A::default();
				for item in chunk {
					work(&mut partial, item);
				}
				// The receiver lives past the scope, sending cannot fail
				let _ = tx.send(partial);
			});
		}
	});
	drop(tx);

	let mut acc = A::default();
	for partial in rx.iter() {
		acc.merge(partial);
	}
	acc
}

/// Maps `items` across `workers` threads, keeping the input order.
pub(crate) fn parallel_map<T, R, F>(items: &[T], workers: usize, f: F) -> Vec<R>
where
	T: Sync,
	R: Send,
	F: Fn(&T) -> R + Sync,
{
	if workers <= 1 || items.len() < 2 {
		return items.iter().map(f).collect();
	}

	let chunk_size = items.len().div_ceil(workers);
	let f = &f;
	thread::scope(|scope| {
		let handles: Vec<_> = items
			.chunks(chunk_size)
			.map(|chunk| scope.spawn(move || chunk.iter().map(f).collect::<Vec<R>>()))
			.collect();

		handles
			.into_iter()
			.flat_map(|handle| handle.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
			.collect()
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Default)]
	struct Totals {
		counts: HashMap<String, f64>,
		seen: usize,
	}

	impl Merge for Totals {
		fn merge(&mut self, other: Self) {
			merge_counts(&mut self.counts, other.counts);
			self.seen += other.seen;
		}
	}

	fn count_words(workers: usize, batch_size: usize) -> Totals {
		let lines = vec!["a b", "b c", "c a", "a a", "b"];
		let config = TrainingConfig { iterations: 1, workers, batch_size };
		sweep(lines.into_iter(), &config, |acc: &mut Totals, line: &&str| {
			acc.seen += 1;
			for word in line.split_whitespace() {
				*acc.counts.entry(word.to_owned()).or_insert(0.0) += 1.0;
			}
		})
	}

	#[test]
	fn sweep_result_does_not_depend_on_partitioning() {
		let serial = count_words(1, 100);
		let parallel = count_words(3, 2);
		assert_eq!(serial.seen, 5);
		assert_eq!(parallel.seen, 5);
		assert_eq!(serial.counts, parallel.counts);
		assert_eq!(serial.counts["a"], 4.0);
	}

	#[test]
	fn parallel_map_keeps_order() {
		let items: Vec<usize> = (0..37).collect();
		let doubled = parallel_map(&items, 4, |x| x * 2);
		assert_eq!(doubled, (0..37).map(|x| x * 2).collect::<Vec<_>>());
	}
}
