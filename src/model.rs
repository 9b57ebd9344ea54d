use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use ndarray::{Array2, ArrayView4, Ix2};
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider, ExecutionProviderDispatch};
use ort::session::Session;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::value::ValueType;
use tracing::debug;

use crate::error::{ClassifierError, Result};

/// Where ort's `load-dynamic` feature looks for the ONNX Runtime shared library.
pub const ORT_DYLIB_PATH: &str = "ORT_DYLIB_PATH";

/// Anything that maps a preprocessed `[1, 3, H, W]` batch to `[1, num_classes]` logits.
///
/// Implementations are read-only during `forward`, so one instance can serve
/// concurrent callers.
pub trait LogitsModel: Send + Sync {
    fn forward(&self, pixel_values: ArrayView4<f32>) -> Result<Array2<f32>>;

    /// Output width, when the model declares a fixed one.
    fn num_classes(&self) -> Option<usize> {
        None
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelOptions {
    pub cuda: bool,
    /// Fixed intra-op thread count. Pinning it keeps reductions ordered the same way run to run.
    pub intra_threads: Option<usize>,
}

impl ModelOptions {
    fn execution_provider(&self) -> ExecutionProviderDispatch {
        if self.cuda {
            CUDAExecutionProvider::default().build().error_on_failure()
        } else {
            CPUExecutionProvider::default().build()
        }
    }
}

/// An ONNX Runtime session over an exported image classifier.
///
/// ONNX Runtime sessions only run inference, so there is no gradient state to toggle.
#[derive(Debug)]
pub struct OnnxModel {
    session: Session,
    num_classes: Option<usize>,
}

impl OnnxModel {
    pub fn load(model_path: impl AsRef<Path>, options: &ModelOptions) -> Result<Self> {
        let model_path = model_path.as_ref();
        check_runtime_library(model_path)?;

        // ort panics when the dynamically loaded runtime is missing or the wrong version.
        let session = panic::catch_unwind(AssertUnwindSafe(|| build_session(model_path, options)))
            .map_err(|payload| {
                ClassifierError::model_load(
                    model_path,
                    format!("ONNX Runtime failed to initialise: {}", panic_message(payload.as_ref())),
                )
            })??;

        if session.inputs.len() != 1 {
            return Err(ClassifierError::model_load(
                model_path,
                format!("expected a single pixel_values input, found {}", session.inputs.len()),
            ));
        }
        let logits = session
            .outputs
            .first()
            .ok_or_else(|| ClassifierError::model_load(model_path, "model declares no outputs"))?;
        let num_classes = match &logits.output_type {
            ValueType::Tensor { dimensions, .. } => dimensions
                .last()
                .copied()
                .filter(|d| *d > 0)
                .map(|d| d as usize),
            other => {
                return Err(ClassifierError::model_load(
                    model_path,
                    format!("output {} is not a tensor: {other:?}", logits.name),
                ));
            }
        };
        debug!(
            input = %session.inputs[0].name,
            output = %logits.name,
            ?num_classes,
            "onnx session ready"
        );

        Ok(Self { session, num_classes })
    }
}

fn build_session(model_path: &Path, options: &ModelOptions) -> Result<Session> {
    let load_err = |e: ort::Error| ClassifierError::model_load(model_path, e);

    let mut builder = SessionBuilder::new()
        .map_err(load_err)?
        .with_execution_providers([options.execution_provider()])
        .map_err(load_err)?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(load_err)?;
    if let Some(threads) = options.intra_threads {
        builder = builder.with_intra_threads(threads).map_err(load_err)?;
    }
    builder.commit_from_file(model_path).map_err(load_err)
}

/// Fails early when `ORT_DYLIB_PATH` names a library that is not there.
///
/// Unset is fine: the runtime is then looked up on the system library path.
fn check_runtime_library(model_path: &Path) -> Result<()> {
    let Some(dylib) = std::env::var_os(ORT_DYLIB_PATH) else {
        return Ok(());
    };
    let dylib = Path::new(&dylib);
    if dylib.is_file() {
        Ok(())
    } else {
        Err(ClassifierError::model_load(
            model_path,
            format!("{ORT_DYLIB_PATH} points at {}, which is not a file", dylib.display()),
        ))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic")
}

impl LogitsModel for OnnxModel {
    fn forward(&self, pixel_values: ArrayView4<f32>) -> Result<Array2<f32>> {
        let xs = pixel_values.into_dyn();
        let input_data = ort::inputs![xs].map_err(ClassifierError::inference)?;
        let ys = self.session.run(input_data).map_err(ClassifierError::inference)?;

        // The first output holds the logits.
        let (_name, logits) = ys
            .iter()
            .next()
            .ok_or_else(|| ClassifierError::inference("session produced no outputs"))?;
        let logits = logits
            .try_extract_tensor::<f32>()
            .map_err(ClassifierError::inference)?
            .into_owned();
        let shape = logits.shape().to_vec();
        logits
            .into_dimensionality::<Ix2>()
            .map_err(|_| ClassifierError::inference(format!("expected [batch, classes] logits, got {shape:?}")))
    }

    fn num_classes(&self) -> Option<usize> {
        self.num_classes
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_are_readable() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("libonnxruntime.so: cannot open"));
        assert_eq!(panic_message(owned.as_ref()), "libonnxruntime.so: cannot open");

        let borrowed: Box<dyn Any + Send> = Box::new("version mismatch");
        assert_eq!(panic_message(borrowed.as_ref()), "version mismatch");

        let other: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(other.as_ref()), "unknown panic");
    }
}
