//! Mutation-based fuzzing over tree programs.
//!
//! Analyses decide which edits keep a program valid, finders enumerate those edits as
//! [`Mutation`] values, and the [`MutationEngine`] applies them one clone at a time.

pub mod analysis;
pub mod engine;
pub mod finders;
pub mod mutation;
pub mod mutations;
pub mod probability;
pub mod random;
pub mod sequence;

pub use engine::{
    apply_mutation, replay, replay_sequence, EngineStatus, MutationEngine, MutationRun,
};
pub use finders::{finder_for, MutationFinder};
pub use mutation::Mutation;
pub use probability::ProbabilityContext;
pub use random::{ChaChaSource, RandomSource};
pub use sequence::{MutationSequence, SequenceHeader};
