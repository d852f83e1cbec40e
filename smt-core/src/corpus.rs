use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use log::warn;

use crate::error::{Result, SmtError};

/// Placeholder token prepended to both sides of a pair during training.
pub const NULL_TOKEN: &str = "";

/// Separates the source and target segments of a parallel corpus line.
pub const PAIR_DELIMITER: &str = "|||";

/// A whitespace-tokenized sentence.
pub type Sentence = Vec<String>;

/// Splits a line on whitespace.
pub fn tokenize(line: &str) -> Sentence {
	line.split_whitespace().map(str::to_owned).collect()
}

/// One line of a parallel corpus: source side `f`, target side `e`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentencePair {
	pub f: Sentence,
	pub e: Sentence,
}

impl SentencePair {
	pub fn new(f: Sentence, e: Sentence) -> Self {
		Self { f, e }
	}

	/// Parses `source ||| target`. A line without delimiter has an empty target side.
	pub fn parse(line: &str) -> Self {
		let mut segments = line.split(PAIR_DELIMITER);
		let f = segments.next().map(tokenize).unwrap_or_default();
		let e = segments.next().map(tokenize).unwrap_or_default();
		Self { f, e }
	}

	/// Both sides with [`NULL_TOKEN`] prepended, as `(f, e)`.
	pub fn with_null(&self) -> (Sentence, Sentence) {
		(with_null(&self.f), with_null(&self.e))
	}
}

fn with_null(sentence: &[String]) -> Sentence {
	let mut res = Vec::with_capacity(sentence.len() + 1);
	res.push(NULL_TOKEN.to_owned());
	res.extend(sentence.iter().cloned());
	res
}

/// Where corpus lines come from.
#[derive(Clone, Debug)]
enum Source {
	File(PathBuf),
	Memory(Arc<[String]>),
}

impl Source {
	fn lines(&self) -> LineIter {
		match self {
			Source::File(path) => match File::open(path) {
				Ok(file) => LineIter::File { path: path.clone(), lines: BufReader::new(file).lines() },
				Err(e) => {
					warn!("could not open corpus `{}`: {e}", path.display());
					LineIter::Empty
				}
			},
			Source::Memory(lines) => LineIter::Memory { lines: Arc::clone(lines), pos: 0 },
		}
	}

	fn check(&self) -> Result<()> {
		match self {
			Source::File(path) => File::open(path).map(|_| ()).map_err(|e| SmtError::io("opening corpus", path, e)),
			Source::Memory(_) => Ok(()),
		}
	}

	fn path(&self) -> Option<&Path> {
		match self {
			Source::File(path) => Some(path),
			Source::Memory(_) => None,
		}
	}
}

/// Lazily reads raw lines; read failures end the iteration with a warning.
enum LineIter {
	File { path: PathBuf, lines: Lines<BufReader<File>> },
	Memory { lines: Arc<[String]>, pos: usize },
	Empty,
}

impl Iterator for LineIter {
	type Item = String;

	fn next(&mut self) -> Option<String> {
		match self {
			LineIter::File { path, lines } => match lines.next()? {
				Ok(line) => Some(line),
				Err(e) => {
					warn!("stopped reading corpus `{}`: {e}", path.display());
					*self = LineIter::Empty;
					None
				}
			},
			LineIter::Memory { lines, pos } => {
				let line = lines.get(*pos)?.clone();
				*pos += 1;
				Some(line)
			}
			LineIter::Empty => None,
		}
	}
}

fn memory_source<I, S>(lines: I) -> Source
where
	I: IntoIterator<Item = S>,
	S: Into<String>,
{
	Source::Memory(lines.into_iter().map(Into::into).collect::<Vec<String>>().into())
}

/// Monolingual corpus, one sentence per line.
///
/// # Invariants
/// - Every call to [`Corpus::iter`] restarts from the first line
/// - The file is never loaded into memory as a whole
/// - `len` needs one full pass the first time and is cached afterwards
#[derive(Debug)]
pub struct Corpus {
	source: Source,
	len: OnceLock<usize>,
}

impl Corpus {
	/// Creates a corpus backed by a file. The file is opened on each pass;
	/// an unreadable file behaves as an empty corpus.
	pub fn open<P: AsRef<Path>>(path: P) -> Self {
		Self { source: Source::File(path.as_ref().to_path_buf()), len: OnceLock::new() }
	}

	/// Creates an in-memory corpus from raw lines.
	pub fn from_lines<I, S>(lines: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self { source: memory_source(lines), len: OnceLock::new() }
	}

	/// Fails if the backing file cannot be opened.
	pub fn check(&self) -> Result<()> {
		self.source.check()
	}

	pub fn path(&self) -> Option<&Path> {
		self.source.path()
	}

	/// Iterates tokenized sentences from the beginning.
	pub fn iter(&self) -> impl Iterator<Item = Sentence> + '_ {
		self.source.lines().map(|line| tokenize(&line))
	}

	/// Number of sentences.
	pub fn len(&self) -> usize {
		*self.len.get_or_init(|| self.source.lines().count())
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[derive(Debug)]
struct ParallelStats {
	len: usize,
	unique_f: usize,
	unique_e: usize,
}

/// Parallel corpus, one `source ||| target` pair per line.
///
/// Same restart and caching rules as [`Corpus`].
#[derive(Debug)]
pub struct ParallelCorpus {
	source: Source,
	stats: OnceLock<ParallelStats>,
}

impl ParallelCorpus {
	pub fn open<P: AsRef<Path>>(path: P) -> Self {
		Self { source: Source::File(path.as_ref().to_path_buf()), stats: OnceLock::new() }
	}

	pub fn from_lines<I, S>(lines: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self { source: memory_source(lines), stats: OnceLock::new() }
	}

	/// Builds an in-memory corpus from already tokenized pairs.
	pub fn from_pairs(pairs: &[SentencePair]) -> Self {
		Self::from_lines(pairs.iter().map(|p| format!("{} {} {}", p.f.join(" "), PAIR_DELIMITER, p.e.join(" "))))
	}

	pub fn check(&self) -> Result<()> {
		self.source.check()
	}

	pub fn path(&self) -> Option<&Path> {
		self.source.path()
	}

	pub fn iter(&self) -> impl Iterator<Item = SentencePair> + '_ {
		self.source.lines().map(|line| SentencePair::parse(&line))
	}

	/// Number of sentence pairs.
	pub fn len(&self) -> usize {
		self.stats().len
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Number of distinct source-side token types.
	pub fn count_unique_f(&self) -> usize {
		self.stats().unique_f
	}

	/// Number of distinct target-side token types.
	pub fn count_unique_e(&self) -> usize {
		self.stats().unique_e
	}

	fn stats(&self) -> &ParallelStats {
		self.stats.get_or_init(|| {
			let mut unique_f: HashSet<String> = HashSet::new();
			let mut unique_e: HashSet<String> = HashSet::new();
			let mut len = 0;
			for pair in self.iter() {
				len += 1;
				unique_f.extend(pair.f);
				unique_e.extend(pair.e);
			}
			ParallelStats { len, unique_f: unique_f.len(), unique_e: unique_e.len() }
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn parses_pair_segments() {
		let pair = SentencePair::parse("la maison ||| the house");
		assert_eq!(pair.f, vec!["la", "maison"]);
		assert_eq!(pair.e, vec!["the", "house"]);

		let lonely = SentencePair::parse("bonjour");
		assert_eq!(lonely.f, vec!["bonjour"]);
		assert!(lonely.e.is_empty());
	}

	#[test]
	fn null_is_prepended_on_both_sides() {
		let (f, e) = SentencePair::parse("le chat ||| the cat").with_null();
		assert_eq!(f, vec![NULL_TOKEN, "le", "chat"]);
		assert_eq!(e, vec![NULL_TOKEN, "the", "cat"]);
	}

	#[test]
	fn iteration_restarts() {
		let corpus = ParallelCorpus::from_lines(["la maison ||| the house", "le chat ||| the cat"]);
		let first: Vec<_> = corpus.iter().collect();
		let second: Vec<_> = corpus.iter().collect();
		assert_eq!(first, second);
		assert_eq!(corpus.len(), 2);
		assert_eq!(corpus.count_unique_f(), 4);
		assert_eq!(corpus.count_unique_e(), 3);
	}

	#[test]
	fn file_corpus_is_read_lazily_and_restartable() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "the cat sat").unwrap();
		writeln!(file).unwrap();
		writeln!(file, "a dog").unwrap();

		let corpus = Corpus::open(file.path());
		assert!(corpus.check().is_ok());
		assert_eq!(corpus.len(), 3);
		let sentences: Vec<_> = corpus.iter().collect();
		assert_eq!(sentences[0], vec!["the", "cat", "sat"]);
		assert!(sentences[1].is_empty());
		assert_eq!(corpus.iter().count(), 3);
	}

	#[test]
	fn missing_file_degrades_to_empty() {
		let corpus = Corpus::open("/definitely/not/here.txt");
		assert!(corpus.check().is_err());
		assert_eq!(corpus.iter().count(), 0);
		assert!(corpus.is_empty());
	}
}
