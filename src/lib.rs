pub mod artifacts;
pub mod cli;
pub mod error;
pub mod mapping;
pub mod model;
pub mod payload;
pub mod postprocess;
pub mod preprocess;
pub mod service;

pub use crate::artifacts::ModelDir;
pub use crate::cli::Args;
pub use crate::error::{ClassifierError, DecodeError};
pub use crate::mapping::{LabelMap, LabelMapError};
pub use crate::model::{LogitsModel, ModelOptions, OnnxModel};
pub use crate::postprocess::{argmax_and_max, softmax};
pub use crate::preprocess::{ImageSize, PreprocessConfig, Processor};
pub use crate::service::{Classifier, Prediction};
