use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use log::{info, warn};
use smt_core::config::{LmWeights, TrainingConfig};
use smt_core::corpus::{Corpus, ParallelCorpus, Sentence};
use smt_core::decoder::{BruteForceDecoder, Decoder, LexicalDecoder, LexicalLmDecoder, Model3LmDecoder};
use smt_core::io::{export_probabilities, export_scalar, export_sentences, prefixed_path};
use smt_core::model::{LmTrainer, Model3Trainer, TranslationModel};

/// Decoding strategy applied to the foreign corpus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum DecoderKind {
	/// Best lexical translation per token
	Lexical,
	/// Greedy decoding rescored by the language model
	LexicalLm,
	/// Fertility, distortion and language model
	Model3Lm,
	/// Exhaustive Model 3 search, short inputs only
	BruteForce,
}

/// Trains IBM Model 3 and an n-gram language model, then translates a corpus.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
	/// Parallel corpus, one `foreign ||| target` pair per line
	parallel_corpus: PathBuf,
	/// Target-language corpus for the language model
	lm_corpus: PathBuf,
	/// Foreign sentences to translate
	foreign_corpus: PathBuf,
	/// Prefix of every output file
	output_prefix: PathBuf,

	/// EM iterations for Model 3 (Model 1 and 2 run twice as many)
	#[arg(short = 'i', long, default_value_t = 2)]
	iterations: usize,
	/// Highest n-gram order of the language model
	#[arg(short = 'n', long, default_value_t = 3)]
	lm_order: usize,
	/// Comma-separated per-order LM weights, unigrams first
	#[arg(short = 'w', long, value_delimiter = ',')]
	weights: Option<Vec<f64>>,
	/// Log-probability at or below which table entries are dropped
	#[arg(short = 'p', long, default_value_t = -10.0, allow_hyphen_values = true)]
	prune: f64,
	#[arg(short = 'd', long, value_enum, default_value_t = DecoderKind::Model3Lm)]
	decoder: DecoderKind,
	/// Worker threads (defaults to the number of CPUs)
	#[arg(short = 'j', long)]
	workers: Option<usize>,
	/// Ignore an existing model snapshot
	#[arg(long, default_value_t = false)]
	retrain: bool,
	/// Hypothesis budget of the brute-force decoder
	#[arg(long, default_value_t = 4096)]
	max_hypotheses: usize,
}

/// Weights for an `order`-gram model: the given ones, the usual `0, 0.6, 0.4`
/// for trigrams, uniform otherwise.
fn lm_weights(weights: Option<Vec<f64>>, order: usize) -> LmWeights {
	match weights {
		Some(weights) => LmWeights::new(weights),
		None if order == 3 => LmWeights::default(),
		None => LmWeights::new(vec![1.0 / order.max(1) as f64; order]),
	}
}

fn train(args: &Args, config: &TrainingConfig) -> smt_core::Result<TranslationModel> {
	let parallel = ParallelCorpus::open(&args.parallel_corpus);
	info!(
		"parallel corpus: {} pair(s), {} foreign and {} target token types",
		parallel.len(),
		parallel.count_unique_f(),
		parallel.count_unique_e()
	);
	let mut tables = Model3Trainer::new(config.clone()).train(&parallel)?;
	let pruned = tables.prune(args.prune);
	info!("pruned {} entries at threshold {}", pruned, args.prune);

	let lm_corpus = Corpus::open(&args.lm_corpus);
	let language_model = LmTrainer::new(args.lm_order, config.clone()).train(&lm_corpus)?;
	Ok(TranslationModel::new(tables, language_model))
}

fn export(model: &TranslationModel, prefix: &Path) -> smt_core::Result<()> {
	export_probabilities(&model.tables.lexical, prefixed_path(prefix, "_t_export.txt"))?;
	export_probabilities(&model.tables.distortion, prefixed_path(prefix, "_d_export.txt"))?;
	export_probabilities(&model.tables.fertility, prefixed_path(prefix, "_f_export.txt"))?;
	export_scalar(model.tables.p0, prefixed_path(prefix, "_p0_export.txt"))?;
	for (index, table) in model.language_model.tables().iter().enumerate() {
		export_probabilities(table, prefixed_path(prefix, &format!("_lm{}_export.txt", index + 1)))?;
	}
	Ok(())
}

fn decode(
	kind: DecoderKind,
	model: &TranslationModel,
	weights: LmWeights,
	max_hypotheses: usize,
	sentences: &[Sentence],
	workers: usize,
) -> Vec<Sentence> {
	let tables = &model.tables;
	let lm = &model.language_model;
	match kind {
		DecoderKind::Lexical => LexicalDecoder::new(&tables.lexical).decode_all(sentences, workers),
		DecoderKind::LexicalLm => LexicalLmDecoder::new(&tables.lexical, lm, weights).decode_all(sentences, workers),
		DecoderKind::Model3Lm => Model3LmDecoder::new(tables, lm, weights).decode_all(sentences, workers),
		DecoderKind::BruteForce => BruteForceDecoder::new(tables)
			.with_max_hypotheses(max_hypotheses)
			.decode_all(sentences, workers),
	}
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
	let args = Args::parse();

	let mut config = TrainingConfig::with_iterations(args.iterations);
	if let Some(workers) = args.workers {
		config.workers = workers;
	}
	config.validate()?;

	let snapshot = prefixed_path(&args.output_prefix, "_model.bin");
	let model = TranslationModel::load_or_train(&snapshot, args.retrain, || train(&args, &config))?;
	let order = model.language_model.order();
	if order != args.lm_order {
		warn!("snapshot holds a {order}-gram model, --lm-order {} ignored (use --retrain)", args.lm_order);
	}
	let weights = lm_weights(args.weights.clone(), order);
	weights.validate_for(order)?;

	export(&model, &args.output_prefix)?;

	let foreign: Vec<Sentence> = Corpus::open(&args.foreign_corpus).iter().collect();
	info!("decoding {} sentence(s) with {:?}", foreign.len(), args.decoder);
	let decoded = decode(args.decoder, &model, weights, args.max_hypotheses, &foreign, config.workers);
	export_sentences(&decoded, prefixed_path(&args.output_prefix, "_output.txt"))?;

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn positional_arguments_and_defaults() {
		let args = Args::try_parse_from(["smt", "pairs.txt", "lm.txt", "foreign.txt", "out/run"]).unwrap();
		assert_eq!(args.output_prefix, PathBuf::from("out/run"));
		assert_eq!(args.iterations, 2);
		assert_eq!(args.lm_order, 3);
		assert_eq!(args.prune, -10.0);
		assert_eq!(args.decoder, DecoderKind::Model3Lm);
		assert!(!args.retrain);
	}

	#[test]
	fn flags_override_defaults() {
		let args = Args::try_parse_from([
			"smt",
			"a",
			"b",
			"c",
			"d",
			"--weights",
			"0.2,0.8",
			"--lm-order",
			"2",
			"--prune",
			"-5",
			"--decoder",
			"brute-force",
		])
		.unwrap();
		assert_eq!(args.weights, Some(vec![0.2, 0.8]));
		assert_eq!(args.prune, -5.0);
		assert_eq!(args.decoder, DecoderKind::BruteForce);
	}

	#[test]
	fn default_weights_follow_order() {
		assert_eq!(lm_weights(None, 3), LmWeights::default());
		assert_eq!(lm_weights(None, 2), LmWeights::new(vec![0.5, 0.5]));
		assert!(lm_weights(Some(vec![1.0]), 2).validate_for(2).is_err());
	}
}
