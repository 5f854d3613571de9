//! Persisted record of applied mutations.

use crate::mutation::Mutation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use treemut_core::{Error, Result, RunId};

/// Bumped whenever the serialized layout changes
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceHeader {
    pub format_version: u32,
    pub run_id: RunId,
    /// Seed of the run that recorded the sequence
    pub seed: u64,
    pub created_at: DateTime<Utc>,
}

/// Append-only, ordered list of the mutations one run applied.
///
/// Replaying it against the run's initial program reproduces the run's result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationSequence {
    pub header: SequenceHeader,
    mutations: Vec<Mutation>,
}

impl MutationSequence {
    pub fn new(seed: u64) -> Self {
        Self {
            header: SequenceHeader {
                format_version: FORMAT_VERSION,
                run_id: RunId::new(),
                seed,
                created_at: Utc::now(),
            },
            mutations: Vec::new(),
        }
    }

    pub fn push(&mut self, mutation: Mutation) {
        self.mutations.push(mutation);
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Mutation> {
        self.mutations.iter()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| {
            Error::Serialization(format!("Failed to serialize mutation sequence: {}", e))
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let sequence: Self = bincode::deserialize(bytes).map_err(|e| {
            Error::Serialization(format!("Failed to deserialize mutation sequence: {}", e))
        })?;
        sequence.check_version()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let sequence: Self = serde_json::from_str(text)?;
        sequence.check_version()
    }

    /// Write as JSON if the path ends in `.json`, bincode otherwise
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let bytes = if is_json(path) {
            self.to_json()?.into_bytes()
        } else {
            self.to_bytes()?
        };
        std::fs::write(path, bytes)?;
        info!(
            "Wrote {} mutations of run {} to {:?}",
            self.len(),
            self.header.run_id,
            path
        );
        Ok(())
    }

    pub fn read_from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let sequence = if is_json(path) {
            let text = String::from_utf8(bytes)
                .map_err(|e| Error::Serialization(format!("{:?} is not UTF-8: {}", path, e)))?;
            Self::from_json(&text)?
        } else {
            Self::from_bytes(&bytes)?
        };
        info!(
            "Read {} mutations of run {} from {:?}",
            sequence.len(),
            sequence.header.run_id,
            path
        );
        Ok(sequence)
    }

    fn check_version(self) -> Result<Self> {
        if self.header.format_version != FORMAT_VERSION {
            return Err(Error::Validation(format!(
                "mutation sequence format version {} is not supported (expected {})",
                self.header.format_version, FORMAT_VERSION
            )));
        }
        Ok(self)
    }
}

impl<'a> IntoIterator for &'a MutationSequence {
    type Item = &'a Mutation;
    type IntoIter = std::slice::Iter<'a, Mutation>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "json")
}
