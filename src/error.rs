use std::path::{Path, PathBuf};

use thiserror::Error;

/// Failure to turn a request payload into an image.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("payload is not a decodable image: {0}")]
    Image(#[from] image::ImageError),
}

#[derive(Debug, Error)]
pub enum ClassifierError {
    /// The model directory is missing, malformed, or rejected by the runtime.
    /// Raised only while the classifier is being built.
    #[error("failed to load model{}: {reason}", describe_path(.path))]
    ModelLoad { path: Option<PathBuf>, reason: String },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("inference failed: {0}")]
    Inference(String),
}

impl ClassifierError {
    pub fn model_load(path: impl AsRef<Path>, reason: impl ToString) -> Self {
        Self::ModelLoad {
            path: Some(path.as_ref().to_path_buf()),
            reason: reason.to_string(),
        }
    }

    /// A model that loaded but does not fit the rest of the classifier.
    pub fn incompatible_model(reason: impl ToString) -> Self {
        Self::ModelLoad {
            path: None,
            reason: reason.to_string(),
        }
    }

    /// Attaches the model directory to a load error that has none.
    pub fn at_path(self, dir: impl AsRef<Path>) -> Self {
        match self {
            Self::ModelLoad { path: None, reason } => Self::ModelLoad {
                path: Some(dir.as_ref().to_path_buf()),
                reason,
            },
            other => other,
        }
    }

    pub fn inference(reason: impl ToString) -> Self {
        Self::Inference(reason.to_string())
    }

    pub fn is_model_load(&self) -> bool {
        matches!(self, Self::ModelLoad { .. })
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }

    pub fn is_inference(&self) -> bool {
        matches!(self, Self::Inference(_))
    }
}

fn describe_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" from {}", p.display()))
        .unwrap_or_default()
}

pub type Result<T, E = ClassifierError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_load_message_names_the_directory() {
        let err = ClassifierError::model_load("/opt/models/vit", "config.json not found");
        assert!(err.is_model_load());
        assert_eq!(
            err.to_string(),
            "failed to load model from /opt/models/vit: config.json not found"
        );
    }

    #[test]
    fn path_is_attached_only_when_missing() {
        let err = ClassifierError::incompatible_model("2 labels, 3 logits");
        assert_eq!(err.to_string(), "failed to load model: 2 labels, 3 logits");

        let err = err.at_path("/srv/model");
        assert_eq!(err.to_string(), "failed to load model from /srv/model: 2 labels, 3 logits");

        let err = err.at_path("/elsewhere");
        assert!(err.to_string().contains("/srv/model"));
    }

    #[test]
    fn base64_errors_are_decode_errors() {
        let err: ClassifierError = DecodeError::from(base64::DecodeError::InvalidByte(3, b'-')).into();
        assert!(err.is_decode());
        assert!(!err.is_inference());
        assert!(matches!(err, ClassifierError::Decode(DecodeError::Base64(_))));
    }
}
