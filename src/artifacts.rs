use std::path::{Path, PathBuf};

use crate::error::{ClassifierError, Result};
use crate::mapping::LabelMap;
use crate::preprocess::PreprocessConfig;

pub const DEFAULT_MODEL_DIR: &str = "trash-classifier-biodegradable";
pub const MODEL_FILE: &str = "model.onnx";
pub const CONFIG_FILE: &str = "config.json";
pub const PREPROCESSOR_FILE: &str = "preprocessor_config.json";

/// A model directory on disk: exported network, model config and
/// image-processor config side by side.
#[derive(Debug, Clone)]
pub struct ModelDir {
    root: PathBuf,
}

impl ModelDir {
    /// Checks that the directory and every file the classifier needs exist.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(ClassifierError::model_load(&root, "model directory not found"));
        }
        for file in [MODEL_FILE, CONFIG_FILE, PREPROCESSOR_FILE] {
            if !root.join(file).is_file() {
                return Err(ClassifierError::model_load(&root, format!("{file} is missing")));
            }
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn model_path(&self) -> PathBuf {
        self.root.join(MODEL_FILE)
    }

    pub fn labels(&self) -> Result<LabelMap> {
        LabelMap::from_config_file(self.root.join(CONFIG_FILE))
    }

    pub fn preprocess_config(&self) -> Result<PreprocessConfig> {
        PreprocessConfig::from_file(self.root.join(PREPROCESSOR_FILE))
    }
}
