//! Configuration types for mutation runs.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The closed set of mutation kinds the engine knows how to find and apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    ChangeBinaryOperator,
    ChangeUnaryOperator,
    DeleteStatement,
    ReplaceIdentifier,
    WrapUnaryOperator,
}

impl MutationKind {
    pub const ALL: [MutationKind; 5] = [
        MutationKind::ChangeBinaryOperator,
        MutationKind::ChangeUnaryOperator,
        MutationKind::DeleteStatement,
        MutationKind::ReplaceIdentifier,
        MutationKind::WrapUnaryOperator,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MutationKind::ChangeBinaryOperator => "change_binary_operator",
            MutationKind::ChangeUnaryOperator => "change_unary_operator",
            MutationKind::DeleteStatement => "delete_statement",
            MutationKind::ReplaceIdentifier => "replace_identifier",
            MutationKind::WrapUnaryOperator => "wrap_unary_operator",
        }
    }
}

/// Inclusive percentage range a per-run chance is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChanceRange {
    pub min: u32,
    pub max: u32,
}

impl ChanceRange {
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.min > self.max || self.max > 100 {
            return Err(Error::Config(format!(
                "chance range for {} must satisfy min <= max <= 100, got [{}, {}]",
                name, self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Chance ranges for each mutation kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbabilityConfig {
    pub change_binary_operator: ChanceRange,
    pub change_unary_operator: ChanceRange,
    pub delete_statement: ChanceRange,
    pub replace_identifier: ChanceRange,
    pub wrap_unary_operator: ChanceRange,
}

impl Default for ProbabilityConfig {
    fn default() -> Self {
        Self {
            change_binary_operator: ChanceRange::new(30, 90),
            change_unary_operator: ChanceRange::new(30, 90),
            delete_statement: ChanceRange::new(30, 70),
            replace_identifier: ChanceRange::new(30, 70),
            wrap_unary_operator: ChanceRange::new(30, 70),
        }
    }
}

impl ProbabilityConfig {
    pub fn range_for(&self, kind: MutationKind) -> ChanceRange {
        match kind {
            MutationKind::ChangeBinaryOperator => self.change_binary_operator,
            MutationKind::ChangeUnaryOperator => self.change_unary_operator,
            MutationKind::DeleteStatement => self.delete_statement,
            MutationKind::ReplaceIdentifier => self.replace_identifier,
            MutationKind::WrapUnaryOperator => self.wrap_unary_operator,
        }
    }
}

/// How the engine picks the next finder to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinderSelection {
    /// Every enabled finder is equally likely
    Uniform,
    /// Finders are weighted by their chance of applying
    Weighted,
}

/// Mutation run configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutatorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Stop after this many mutations have been applied
    pub max_mutations: usize,
    /// Stop after this many consecutive cycles that applied nothing
    pub max_consecutive_failures: usize,
    /// Enable every configured finder instead of a random subset per run
    pub enable_all_mutations: bool,
    /// Finders the run may use
    pub enabled_mutations: Vec<MutationKind>,
    /// Finder selection policy
    pub finder_selection: FinderSelection,
    /// Upper bound on the node count of an expression produced by wrapping
    pub max_expression_size: usize,
    /// Per-kind chance ranges
    pub probabilities: ProbabilityConfig,
}

impl Default for MutatorConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            max_mutations: 100,
            max_consecutive_failures: 10,
            enable_all_mutations: false,
            enabled_mutations: MutationKind::ALL.to_vec(),
            finder_selection: FinderSelection::Uniform,
            max_expression_size: 50,
            probabilities: ProbabilityConfig::default(),
        }
    }
}

impl MutatorConfig {
    /// Check the configuration for values the engine cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.max_consecutive_failures == 0 {
            return Err(Error::Config(
                "max_consecutive_failures must be at least 1".to_string(),
            ));
        }
        for kind in MutationKind::ALL {
            self.probabilities.range_for(kind).validate(kind.name())?;
        }
        Ok(())
    }

    /// Load a configuration from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: MutatorConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }
}
