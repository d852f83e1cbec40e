use std::ffi::OsString;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;

use crate::corpus::{PAIR_DELIMITER, Sentence};
use crate::error::{Result, SmtError};
use crate::model::distribution::{ContextKey, Field, ProbabilityTable};

/// Appends `suffix` to the last component of `prefix`.
///
/// Example:
/// `out/run` + `"_t_export.txt"` → `out/run_t_export.txt`
pub fn prefixed_path<P: AsRef<Path>>(prefix: P, suffix: &str) -> PathBuf {
	let mut name = OsString::from(prefix.as_ref().as_os_str());
	name.push(suffix);
	PathBuf::from(name)
}

fn create<P: AsRef<Path>>(path: P) -> Result<BufWriter<File>> {
	let path = path.as_ref();
	File::create(path)
		.map(BufWriter::new)
		.map_err(|e| SmtError::io("creating", path, e))
}

/// Formats one export line: the outcome, then every context field, then the value,
/// separated by ` ||| `.
fn export_line<O: Field, C: ContextKey>(outcome: &O, context: &C, value: f64) -> String {
	let mut fields = Vec::with_capacity(2);
	fields.push(outcome.to_field());
	fields.extend(context.to_fields());
	fields.push(value.to_string());
	fields.join(&format!(" {PAIR_DELIMITER} "))
}

/// Writes every entry of `table`, one per line, sorted for reproducible output.
///
/// # Errors
/// Returns an error if the file cannot be created or written.
pub fn export_probabilities<O, C, P>(table: &ProbabilityTable<O, C>, path: P) -> Result<()>
where
	O: Field,
	C: ContextKey,
	P: AsRef<Path>,
{
	let path = path.as_ref();
	let mut lines: Vec<String> = table
		.entries()
		.map(|(outcome, context, value)| export_line(outcome, context, value))
		.collect();
	lines.sort_unstable();

	let mut writer = create(path)?;
	for line in &lines {
		writeln!(writer, "{line}").map_err(|e| SmtError::io("writing", path, e))?;
	}
	writer.flush().map_err(|e| SmtError::io("writing", path, e))?;
	info!("exported {} entries to {}", lines.len(), path.display());
	Ok(())
}

/// Reads a table written by [`export_probabilities`].
///
/// Key fields are parsed into the destination table's outcome and context
/// types; blank lines are ignored.
///
/// # Errors
/// Returns [`SmtError::Io`] if the file cannot be read, and
/// [`SmtError::Parse`] for a line whose fields do not fit the table.
pub fn import_probabilities<O, C, P>(path: P) -> Result<ProbabilityTable<O, C>>
where
	O: Field,
	C: ContextKey,
	P: AsRef<Path>,
{
	let path = path.as_ref();
	let file = File::open(path).map_err(|e| SmtError::io("opening", path, e))?;

	let mut entries = Vec::new();
	for (index, line) in BufReader::new(file).lines().enumerate() {
		let line = line.map_err(|e| SmtError::io("reading", path, e))?;
		if line.trim().is_empty() {
			continue;
		}
		entries.push(parse_line(&line).map_err(|message| SmtError::parse("importing probabilities", index + 1, message))?);
	}
	Ok(ProbabilityTable::from_flat(entries))
}

fn parse_line<O: Field, C: ContextKey>(line: &str) -> std::result::Result<((O, C), f64), String> {
	let fields: Vec<&str> = line.split(PAIR_DELIMITER).map(str::trim).collect();
	let [outcome, context @ .., value] = fields.as_slice() else {
		return Err(format!("expected at least 2 fields, found {}", fields.len()));
	};
	let value: f64 = value.parse().map_err(|_| format!("invalid probability `{value}`"))?;
	let outcome = O::parse_field(outcome).ok_or_else(|| format!("invalid outcome `{outcome}`"))?;
	let context = C::parse_fields(context).ok_or_else(|| format!("invalid context `{}`", context.join(" | ")))?;
	Ok(((outcome, context), value))
}

/// Writes a single value followed by a newline.
///
/// # Errors
/// Returns an error if the file cannot be created or written.
pub fn export_scalar<P: AsRef<Path>>(value: f64, path: P) -> Result<()> {
	let path = path.as_ref();
	let mut writer = create(path)?;
	writeln!(writer, "{value}")
		.and_then(|()| writer.flush())
		.map_err(|e| SmtError::io("writing", path, e))
}

/// Writes one sentence per line, tokens joined by a single space.
///
/// # Errors
/// Returns an error if the file cannot be created or written.
pub fn export_sentences<P: AsRef<Path>>(sentences: &[Sentence], path: P) -> Result<()> {
	let path = path.as_ref();
	let mut writer = create(path)?;
	for sentence in sentences {
		writeln!(writer, "{}", sentence.join(" ")).map_err(|e| SmtError::io("writing", path, e))?;
	}
	writer.flush().map_err(|e| SmtError::io("writing", path, e))?;
	info!("wrote {} sentence(s) to {}", sentences.len(), path.display());
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn prefix_is_extended_not_replaced() {
		assert_eq!(prefixed_path("out/run", "_t_export.txt"), PathBuf::from("out/run_t_export.txt"));
		assert_eq!(prefixed_path("run.v1", "_output.txt"), PathBuf::from("run.v1_output.txt"));
	}

	#[test]
	fn export_line_puts_outcome_first() {
		let line = export_line(&2usize, &(1usize, 3usize, 4usize), -0.5);
		assert_eq!(line, "2 ||| 1 ||| 3 ||| 4 ||| -0.5");
		let null = export_line(&String::new(), &"maison".to_owned(), 0.25);
		assert_eq!(null, " ||| maison ||| 0.25");
	}

	#[test]
	fn parse_line_is_typed_by_destination() {
		let parsed: ((usize, (usize, usize, usize)), f64) = parse_line("2 ||| 1 ||| 3 ||| 4 ||| -0.5").unwrap();
		assert_eq!(parsed, ((2, (1, 3, 4)), -0.5));

		let ngram: ((String, Vec<String>), f64) = parse_line("cat ||| the ||| <s> ||| -0.7").unwrap();
		assert_eq!(ngram.0.1, vec!["the".to_owned(), "<s>".to_owned()]);

		let null: ((String, String), f64) = parse_line(" ||| maison ||| 0.25").unwrap();
		assert_eq!(null.0.0, "");
	}

	#[test]
	fn malformed_lines_are_rejected() {
		assert!(parse_line::<usize, String>("x ||| maison ||| 0.1").is_err());
		assert!(parse_line::<String, String>("house ||| maison ||| abc").is_err());
		assert!(parse_line::<String, String>("0.1").is_err());
		assert!(parse_line::<String, (usize, usize, usize)>("a ||| 1 ||| 0.1").is_err());
	}

	#[test]
	fn import_reports_line_number() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("broken.txt");
		std::fs::write(&path, "house ||| maison ||| 0.5\n\nhouse ||| maison ||| nope\n").unwrap();
		let err = import_probabilities::<String, String, _>(&path).unwrap_err();
		assert!(matches!(err, SmtError::Parse { line: 3, .. }));
	}

	#[test]
	fn import_of_missing_file_is_io_error() {
		let err = import_probabilities::<String, String, _>("/nonexistent/t_export.txt").unwrap_err();
		assert!(matches!(err, SmtError::Io { .. }));
	}
}
