//! Statistical machine translation library.
//!
//! This crate provides a word-based translation pipeline including:
//! - Parallel and monolingual corpus readers
//! - IBM Models 1, 2 and 3 trained by expectation-maximization
//! - An n-gram language model
//! - Lexical, LM-rescored and Model 3 decoders
//! - Text export/import of probability tables and binary model snapshots
//!
//! EM sweeps partition the corpus across worker threads and merge the
//! partial counts before every re-estimation; trained tables are read-only.

/// Error type and result alias.
pub mod error;

/// Training configuration and language-model weights.
pub mod config;

/// Whitespace-tokenized corpora, read lazily from disk or from memory.
pub mod corpus;

/// Probability tables, trainers, language model and snapshots.
pub mod model;

/// Decoders turning foreign sentences into target sentences.
pub mod decoder;

/// Text export/import of tables, scalars and sentences.
pub mod io;

pub use error::{Result, SmtError};
