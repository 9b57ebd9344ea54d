use std::fmt;
use std::path::Path;
use std::time::Instant;

use image::DynamicImage;
use tracing::{debug, info};

use crate::artifacts::ModelDir;
use crate::error::{ClassifierError, Result};
use crate::mapping::LabelMap;
use crate::model::{LogitsModel, ModelOptions, OnnxModel};
use crate::payload;
use crate::postprocess::top_class;
use crate::preprocess::Processor;

/// Winning class for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub class_index: usize,
    /// Softmax probability of `label`, in `[0, 1]`.
    pub confidence: f32,
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{:.4}", self.label, self.confidence)
    }
}

/// Image classifier over immutable, fully loaded state.
///
/// Every method takes `&self`; a single instance can be shared between
/// threads and a failed call leaves it untouched.
pub struct Classifier<M = OnnxModel> {
    model: M,
    processor: Processor,
    labels: LabelMap,
}

impl<M> fmt::Debug for Classifier<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier")
            .field("model", &std::any::type_name::<M>())
            .field("processor", &self.processor)
            .field("labels", &self.labels)
            .finish()
    }
}

impl Classifier<OnnxModel> {
    /// Loads the network, label table and preprocessing config from `dir`.
    pub fn from_dir(dir: impl AsRef<Path>, options: &ModelOptions) -> Result<Self> {
        let model_dir = ModelDir::open(dir)?;
        let labels = model_dir.labels()?;
        let processor = Processor::new(model_dir.preprocess_config()?);

        let t = Instant::now();
        let model = OnnxModel::load(model_dir.model_path(), options)?;
        debug!(elapsed = ?t.elapsed(), "[model load]");

        let classifier =
            Self::new(model, processor, labels).map_err(|e| e.at_path(model_dir.root()))?;
        info!(
            dir = %model_dir.root().display(),
            classes = classifier.labels.len(),
            input_size = ?classifier.processor.input_size(),
            cuda = options.cuda,
            "classifier ready"
        );
        Ok(classifier)
    }
}

impl<M: LogitsModel> Classifier<M> {
    /// Pairs a model with its preprocessor and label table.
    ///
    /// Fails when the model declares an output width that disagrees with the labels.
    pub fn new(model: M, processor: Processor, labels: LabelMap) -> Result<Self> {
        if let Some(classes) = model.num_classes() {
            if classes != labels.len() {
                return Err(ClassifierError::incompatible_model(format!(
                    "model emits {classes} logits but the label map has {} classes",
                    labels.len()
                )));
            }
        }
        Ok(Self {
            model,
            processor,
            labels,
        })
    }

    /// Classifies a base64-encoded image (optionally a `data:` URL).
    pub fn classify(&self, base64_image: &str) -> Result<Prediction> {
        let bytes = payload::decode_base64(base64_image)?;
        self.classify_bytes(&bytes)
    }

    /// Classifies an encoded image (PNG, JPEG, ...).
    pub fn classify_bytes(&self, bytes: &[u8]) -> Result<Prediction> {
        let t = Instant::now();
        let image = payload::decode_image(bytes)?;
        debug!(
            elapsed = ?t.elapsed(),
            width = image.width(),
            height = image.height(),
            "[decode]"
        );
        self.classify_image(&image)
    }

    pub fn classify_image(&self, image: &DynamicImage) -> Result<Prediction> {
        let t = Instant::now();
        let pixel_values = self.processor.preprocess(image)?;
        debug!(elapsed = ?t.elapsed(), "[preprocessing]");

        let t = Instant::now();
        let logits = self.model.forward(pixel_values.view())?;
        debug!(elapsed = ?t.elapsed(), "[model]");

        if logits.nrows() != 1 || logits.ncols() != self.labels.len() {
            return Err(ClassifierError::inference(format!(
                "expected logits of shape [1, {}], got {:?}",
                self.labels.len(),
                logits.shape()
            )));
        }
        let (class_index, confidence) = top_class(logits.row(0))?;
        let label = self
            .labels
            .get(class_index)
            .ok_or_else(|| ClassifierError::inference(format!("no label for class {class_index}")))?;

        Ok(Prediction {
            label: label.to_string(),
            class_index,
            confidence,
        })
    }

    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    pub fn processor(&self) -> &Processor {
        &self.processor
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}
