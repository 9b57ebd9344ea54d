use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::error::{ClassifierError, Result};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LabelMapError {
    #[error("id2label is empty")]
    Empty,

    #[error("id2label key {0:?} is not a class index")]
    InvalidIndex(String),

    #[error("id2label has duplicate entries for class {0}")]
    Duplicate(usize),

    #[error("id2label has no entry for class {missing} (expected classes 0..{expected})")]
    Missing { missing: usize, expected: usize },

    #[error("num_labels is {declared} but id2label describes {found} classes")]
    CountMismatch { declared: usize, found: usize },
}

/// The parts of a Hugging Face `config.json` the classifier reads.
#[derive(Debug, Deserialize)]
struct ModelConfig {
    #[serde(default)]
    id2label: HashMap<String, String>,
    num_labels: Option<usize>,
}

/// Class index to label table, dense over `0..len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    labels: Vec<String>,
}

impl LabelMap {
    pub fn new<I, S>(labels: I) -> std::result::Result<Self, LabelMapError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(LabelMapError::Empty);
        }
        Ok(Self { labels })
    }

    /// Builds the table from string-keyed `id2label` entries.
    ///
    /// Every index in `0..n` must appear exactly once. When `declared` is set
    /// it must agree with `n`.
    pub fn from_id2label(
        id2label: &HashMap<String, String>,
        declared: Option<usize>,
    ) -> std::result::Result<Self, LabelMapError> {
        if id2label.is_empty() {
            return Err(LabelMapError::Empty);
        }

        // Sorted so the reported key does not depend on hash order.
        let mut entries: Vec<(&String, &String)> = id2label.iter().collect();
        entries.sort();

        let mut by_index: BTreeMap<usize, &String> = BTreeMap::new();
        for (key, label) in entries {
            let idx: usize = key
                .trim()
                .parse()
                .map_err(|_| LabelMapError::InvalidIndex(key.clone()))?;
            if by_index.insert(idx, label).is_some() {
                return Err(LabelMapError::Duplicate(idx));
            }
        }

        let expected = by_index.keys().next_back().map_or(0, |max| max + 1);
        let mut labels = Vec::with_capacity(by_index.len());
        for (position, (idx, label)) in by_index.into_iter().enumerate() {
            if idx != position {
                return Err(LabelMapError::Missing {
                    missing: position,
                    expected,
                });
            }
            labels.push(label.clone());
        }

        if let Some(declared) = declared {
            if declared != labels.len() {
                return Err(LabelMapError::CountMismatch {
                    declared,
                    found: labels.len(),
                });
            }
        }

        Ok(Self { labels })
    }

    /// Reads `id2label` (and `num_labels`, if present) from a model config file.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| ClassifierError::model_load(path, e))?;
        let config: ModelConfig =
            serde_json::from_str(&raw).map_err(|e| ClassifierError::model_load(path, e))?;
        Self::from_id2label(&config.id2label, config.num_labels)
            .map_err(|e| ClassifierError::model_load(path, e))
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        self.labels.get(idx).map(String::as_str)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.labels.iter().enumerate().map(|(i, l)| (i, l.as_str()))
    }
}
