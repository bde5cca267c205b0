//! Model execution collaborator
//!
//! Artifacts are content-addressed: a model's id is the hex SHA-256 of its
//! serialized artifact, so the same bytes always resolve to the same model.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("model {0} not found")]
    NotFound(String),

    #[error("malformed model artifact: {0}")]
    Malformed(String),

    #[error("input has {actual} features, model expects {expected}")]
    ShapeMismatch { expected: usize, actual: usize },
}

/// Weights of a single dense layer, `y = W·x + b`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// One row per output.
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
}

impl ModelArtifact {
    fn validate(&self) -> Result<usize, InferenceError> {
        if self.weights.is_empty() {
            return Err(InferenceError::Malformed("no weight rows".to_string()));
        }
        if self.weights.len() != self.bias.len() {
            return Err(InferenceError::Malformed(format!(
                "{} weight rows but {} biases",
                self.weights.len(),
                self.bias.len()
            )));
        }
        let width = self.weights[0].len();
        if width == 0 || self.weights.iter().any(|row| row.len() != width) {
            return Err(InferenceError::Malformed("ragged weight matrix".to_string()));
        }
        Ok(width)
    }
}

/// A validated, invocable model.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedModel {
    id: String,
    input_width: usize,
    artifact: ModelArtifact,
}

impl LoadedModel {
    pub fn new(id: impl Into<String>, artifact: ModelArtifact) -> Result<Self, InferenceError> {
        let input_width = artifact.validate()?;
        Ok(Self {
            id: id.into(),
            input_width,
            artifact,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn input_width(&self) -> usize {
        self.input_width
    }

    pub fn output_width(&self) -> usize {
        self.artifact.bias.len()
    }

    pub fn predict(&self, input: &[f32]) -> Result<Vec<f32>, InferenceError> {
        if input.len() != self.input_width {
            return Err(InferenceError::ShapeMismatch {
                expected: self.input_width,
                actual: input.len(),
            });
        }

        Ok(self
            .artifact
            .weights
            .iter()
            .zip(&self.artifact.bias)
            .map(|(row, bias)| row.iter().zip(input).map(|(w, x)| w * x).sum::<f32>() + bias)
            .collect())
    }
}

pub trait ModelStore: Send + Sync {
    fn load_model(&self, id: &str) -> Result<LoadedModel, InferenceError>;
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryModelStore {
    artifacts: HashMap<String, Vec<u8>>,
}

impl InMemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content id for `bytes`.
    pub fn content_id(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    /// Store a JSON artifact and return its content id.
    pub fn put(&mut self, bytes: &[u8]) -> Result<String, InferenceError> {
        let artifact: ModelArtifact =
            serde_json::from_slice(bytes).map_err(|e| InferenceError::Malformed(e.to_string()))?;
        artifact.validate()?;

        let id = Self::content_id(bytes);
        self.artifacts.insert(id.clone(), bytes.to_vec());
        info!(model_id = %id, outputs = artifact.bias.len(), "model artifact stored");
        Ok(id)
    }

    pub fn put_artifact(&mut self, artifact: &ModelArtifact) -> Result<String, InferenceError> {
        let bytes = serde_json::to_vec(artifact).map_err(|e| InferenceError::Malformed(e.to_string()))?;
        self.put(&bytes)
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

impl ModelStore for InMemoryModelStore {
    fn load_model(&self, id: &str) -> Result<LoadedModel, InferenceError> {
        let bytes = self
            .artifacts
            .get(id)
            .ok_or_else(|| InferenceError::NotFound(id.to_string()))?;
        let artifact: ModelArtifact =
            serde_json::from_slice(bytes).map_err(|e| InferenceError::Malformed(e.to_string()))?;
        debug!(model_id = %id, "model loaded");
        LoadedModel::new(id, artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doubler() -> ModelArtifact {
        ModelArtifact {
            weights: vec![vec![2.0, 0.0], vec![0.0, 2.0]],
            bias: vec![1.0, -1.0],
        }
    }

    #[test]
    fn test_store_and_predict() {
        let mut store = InMemoryModelStore::new();
        let id = store.put_artifact(&doubler()).unwrap();
        assert_eq!(id.len(), 64);

        let model = store.load_model(&id).unwrap();
        assert_eq!(model.id(), id);
        assert_eq!(model.predict(&[3.0, 4.0]).unwrap(), vec![7.0, 7.0]);
    }

    #[test]
    fn test_ids_are_content_addressed() {
        let mut store = InMemoryModelStore::new();
        let a = store.put_artifact(&doubler()).unwrap();
        let b = store.put_artifact(&doubler()).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_unknown_model_not_found() {
        let store = InMemoryModelStore::new();
        assert_eq!(
            store.load_model("deadbeef"),
            Err(InferenceError::NotFound("deadbeef".to_string()))
        );
    }

    #[test]
    fn test_wrong_input_width() {
        let model = LoadedModel::new("m", doubler()).unwrap();
        assert_eq!(
            model.predict(&[1.0]),
            Err(InferenceError::ShapeMismatch {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_rejects_malformed_artifacts() {
        let mut store = InMemoryModelStore::new();
        assert!(matches!(store.put(b"not json"), Err(InferenceError::Malformed(_))));

        let ragged = ModelArtifact {
            weights: vec![vec![1.0, 2.0], vec![1.0]],
            bias: vec![0.0, 0.0],
        };
        assert!(matches!(store.put_artifact(&ragged), Err(InferenceError::Malformed(_))));
        assert!(store.is_empty());
    }
}
