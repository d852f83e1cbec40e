use smt_core::config::{LmWeights, TrainingConfig};
use smt_core::corpus::{Corpus, ParallelCorpus, Sentence};
use smt_core::decoder::{BruteForceDecoder, Decoder, LexicalDecoder, LexicalLmDecoder, Model3LmDecoder};
use smt_core::io::{export_probabilities, export_scalar, export_sentences, import_probabilities, prefixed_path};
use smt_core::model::distribution::ProbabilityTable;
use smt_core::model::{LmTrainer, Model1Trainer, Model3Trainer, TranslationModel};

fn words(tokens: &[&str]) -> Sentence {
	tokens.iter().map(|t| (*t).to_owned()).collect()
}

fn config(iterations: usize) -> TrainingConfig {
	TrainingConfig { iterations, workers: 2, batch_size: 2 }
}

#[test]
fn model1_translates_maison_to_house() {
	let corpus = ParallelCorpus::from_lines(["la maison ||| the house", "le chat ||| the cat"]);
	let t = Model1Trainer::new(config(2)).train(&corpus).unwrap();

	let the_la = t.get(&"the".to_owned(), &"la".to_owned());
	let the_le = t.get(&"the".to_owned(), &"le".to_owned());
	assert!((the_la - the_le).abs() < 1e-12);
	assert!(t.get(&"house".to_owned(), &"maison".to_owned()) > 0.0);

	let decoder = LexicalDecoder::new(&t);
	assert_eq!(decoder.decode_sentence(&words(&["maison"])), words(&["house"]));

	let log_t = t.to_log_space();
	assert_eq!(LexicalDecoder::new(&log_t).decode_sentence(&words(&["maison"])), words(&["house"]));
}

#[test]
fn file_pipeline_trains_exports_and_decodes() {
	let dir = tempfile::tempdir().unwrap();
	let pairs = dir.path().join("pairs.txt");
	let lm_text = dir.path().join("lm.txt");
	let foreign = dir.path().join("foreign.txt");
	std::fs::write(
		&pairs,
		"la maison ||| the house\nle chat ||| the cat\nla maison bleue ||| the blue house\nle chat bleu ||| the blue cat\n",
	)
	.unwrap();
	std::fs::write(&lm_text, "the house\nthe cat\nthe blue house\nthe blue cat\n").unwrap();
	std::fs::write(&foreign, "la maison\nle chat bleu\n\n").unwrap();

	let mut tables = Model3Trainer::new(config(2)).train(&ParallelCorpus::open(&pairs)).unwrap();
	tables.prune(-10.0);
	assert!(tables.lexical.entries().all(|(_, _, p)| p > -10.0));
	let language_model = LmTrainer::new(3, config(1)).train(&Corpus::open(&lm_text)).unwrap();
	assert_eq!(language_model.order(), 3);
	let model = TranslationModel::new(tables, language_model);

	let prefix = dir.path().join("run");
	let t_path = prefixed_path(&prefix, "_t_export.txt");
	let d_path = prefixed_path(&prefix, "_d_export.txt");
	let lm3_path = prefixed_path(&prefix, "_lm3_export.txt");
	export_probabilities(&model.tables.lexical, &t_path).unwrap();
	export_probabilities(&model.tables.distortion, &d_path).unwrap();
	export_probabilities(model.language_model.table(3).unwrap(), &lm3_path).unwrap();
	export_scalar(model.tables.p0, prefixed_path(&prefix, "_p0_export.txt")).unwrap();

	let t: ProbabilityTable<String, String> = import_probabilities(&t_path).unwrap();
	assert_eq!(t, model.tables.lexical);
	let d: ProbabilityTable<usize, (usize, usize, usize)> = import_probabilities(&d_path).unwrap();
	assert_eq!(d, model.tables.distortion);
	let lm3: ProbabilityTable<String, Vec<String>> = import_probabilities(&lm3_path).unwrap();
	assert_eq!(&lm3, model.language_model.table(3).unwrap());

	let sentences: Vec<Sentence> = Corpus::open(&foreign).iter().collect();
	assert_eq!(sentences.len(), 3);
	assert!(sentences[2].is_empty());

	let decoders: Vec<Box<dyn Decoder + '_>> = vec![
		Box::new(LexicalDecoder::new(&model.tables.lexical)),
		Box::new(LexicalLmDecoder::new(&model.tables.lexical, &model.language_model, LmWeights::default())),
		Box::new(Model3LmDecoder::new(&model.tables, &model.language_model, LmWeights::default())),
		Box::new(BruteForceDecoder::new(&model.tables).with_max_hypotheses(256)),
	];
	for decoder in &decoders {
		let decoded = decoder.decode_all(&sentences, 2);
		assert_eq!(decoded.len(), sentences.len());
		assert!(decoded[2].is_empty());
	}

	let output = prefixed_path(&prefix, "_output.txt");
	let decoded = decoders[0].decode_all(&sentences, 2);
	export_sentences(&decoded, &output).unwrap();
	let written = std::fs::read_to_string(&output).unwrap();
	assert_eq!(written.lines().count(), 3);

	let snapshot = prefixed_path(&prefix, "_model.bin");
	model.save(&snapshot).unwrap();
	assert_eq!(TranslationModel::load(&snapshot).unwrap(), model);
}

#[test]
fn missing_corpus_degrades_to_empty_training() {
	let corpus = ParallelCorpus::open("/nonexistent/pairs.txt");
	assert!(corpus.check().is_err());
	assert!(corpus.is_empty());
	let t = Model1Trainer::new(config(1)).train(&corpus).unwrap();
	assert!(t.is_empty());
}
