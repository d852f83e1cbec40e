//! Statistical models of the translation pipeline.
//!
//! This module provides:
//! - Sparse conditional tables (`ProbabilityTable`)
//! - IBM Models 1, 2 and 3 trainers (EM over a parallel corpus)
//! - Alignments and the pluggable Model 3 alignment search
//! - The n-gram language model
//! - A binary snapshot of everything the decoders need

/// Sparse `P(outcome | context)` tables and their key field traits.
pub mod distribution;

/// Partition-then-merge sweeps over a corpus.
///
/// Not exposed
pub(crate) mod parallel;

/// Nested token-pair accumulators shared by the trainers.
mod counts;

/// IBM Model 1: lexical translation probabilities.
pub mod ibm1;

/// IBM Model 2: lexical and positional alignment probabilities.
pub mod ibm2;

/// Alignment vectors, neighborhoods and search strategies.
pub mod alignment;

/// IBM Model 3: lexical, distortion, fertility and NULL insertion.
pub mod ibm3;

/// N-gram language model estimated from a monolingual corpus.
pub mod language_model;

/// Binary persistence of trained models.
pub mod snapshot;

pub use alignment::{Alignment, AlignmentSearch, GreedyArgmax, PeggedHillclimb, ScoringTables};
pub use distribution::ProbabilityTable;
pub use ibm1::Model1Trainer;
pub use ibm2::{Model2Tables, Model2Trainer};
pub use ibm3::{Model3Tables, Model3Trainer};
pub use language_model::{LanguageModel, LmTrainer};
pub use snapshot::TranslationModel;

/// `t(e | f)`: outcome target token, context source token.
pub type LexicalTable = ProbabilityTable<String, String>;

/// `a(index_f | index_e, l_e, l_f)` or `d(index_e | index_f, l_e, l_f)`.
pub type DistortionTable = ProbabilityTable<usize, (usize, usize, usize)>;

/// `φ(fertility | f)`.
pub type FertilityTable = ProbabilityTable<usize, String>;
