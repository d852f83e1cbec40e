use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SmtError};

use super::ibm3::Model3Tables;
use super::language_model::LanguageModel;

/// Everything the decoders need, as one binary snapshot.
///
/// Serialized with `postcard`: a trained model can be reloaded without
/// rerunning EM over the corpora.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TranslationModel {
	/// Pruned Model 3 tables (lexical, distortion, fertility, `p0`).
	pub tables: Model3Tables,
	pub language_model: LanguageModel,
}

impl TranslationModel {
	pub fn new(tables: Model3Tables, language_model: LanguageModel) -> Self {
		Self { tables, language_model }
	}

	/// Writes the snapshot to `path`.
	///
	/// # Errors
	/// Returns an error if serialization or the write fails.
	pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
		let path = path.as_ref();
		let bytes = postcard::to_stdvec(self).map_err(|e| SmtError::snapshot("encoding model", e))?;
		std::fs::write(path, &bytes).map_err(|e| SmtError::io("writing snapshot", path, e))?;
		info!("saved model snapshot ({} bytes) to {}", bytes.len(), path.display());
		Ok(())
	}

	/// Reads a snapshot written by [`TranslationModel::save`].
	///
	/// # Errors
	/// Returns an error if the file cannot be read or does not decode.
	pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
		let path = path.as_ref();
		let bytes = std::fs::read(path).map_err(|e| SmtError::io("reading snapshot", path, e))?;
		let model = postcard::from_bytes(&bytes).map_err(|e| SmtError::snapshot("decoding model", e))?;
		info!("loaded model snapshot from {}", path.display());
		Ok(model)
	}

	/// Loads `path` if it exists and `retrain` is false, otherwise calls
	/// `train` and saves its result to `path`.
	///
	/// # Errors
	/// Propagates loading, training and saving errors.
	pub fn load_or_train<P, F>(path: P, retrain: bool, train: F) -> Result<Self>
	where
		P: AsRef<Path>,
		F: FnOnce() -> Result<Self>,
	{
		let path = path.as_ref();
		if !retrain && path.exists() {
			return Self::load(path);
		}
		let model = train()?;
		model.save(path)?;
		Ok(model)
	}
}
