use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::artifacts::DEFAULT_MODEL_DIR;
use crate::model::ModelOptions;

/// Classify a base64-encoded image and print `label,confidence`.
#[derive(Parser, Clone, Debug)]
#[command(
    author,
    version,
    about,
    long_about = None,
    after_help = "ONNX Runtime is loaded at run time from ORT_DYLIB_PATH, or from the system \
                  library path when that is unset. A missing or incompatible runtime fails \
                  model loading with a non-zero exit."
)]
pub struct Args {
    /// base64-encoded image (a `data:` URL works too), or `-` to read it from stdin
    pub image: String,

    /// model directory with model.onnx, config.json and preprocessor_config.json
    /// [default: trash-classifier-biodegradable/ next to the executable]
    #[arg(long, env = "TRASH_CLASSIFIER_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    /// run on the CUDA execution provider
    #[arg(long, env = "TRASH_CLASSIFIER_CUDA")]
    pub cuda: bool,

    /// intra-op thread count
    #[arg(long, env = "TRASH_CLASSIFIER_THREADS")]
    pub threads: Option<usize>,
}

impl Args {
    pub fn model_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.model_dir {
            return Ok(dir.clone());
        }
        let exe = std::env::current_exe().context("cannot locate the running executable")?;
        let parent = exe
            .parent()
            .context("executable path has no parent directory")?;
        Ok(parent.join(DEFAULT_MODEL_DIR))
    }

    pub fn model_options(&self) -> ModelOptions {
        ModelOptions {
            cuda: self.cuda,
            intra_threads: self.threads,
        }
    }

    /// The image argument, or everything on `stdin` when the argument is `-`.
    pub fn read_payload(&self, mut stdin: impl Read) -> Result<String> {
        if self.image != "-" {
            return Ok(self.image.clone());
        }
        let mut payload = String::new();
        stdin
            .read_to_string(&mut payload)
            .context("failed to read image payload from stdin")?;
        Ok(payload)
    }
}
