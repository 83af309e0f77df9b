//! Two-layer classification head: `Linear → activation → Linear → softmax`.
//!
//! Dropout from training is an inference no-op and is not represented.

use candle_core::{DType, Device, Module, Tensor};
use candle_nn::Linear;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use urbanroute_core::ModelError;

/// Hidden-layer activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Relu,
    Gelu,
}

pub const FC1_WEIGHT: &str = "fc1.weight";
pub const FC1_BIAS: &str = "fc1.bias";
pub const FC2_WEIGHT: &str = "fc2.weight";
pub const FC2_BIAS: &str = "fc2.bias";

pub struct ClassifierHead {
    fc1: Linear,
    fc2: Linear,
    activation: Activation,
    input_dim: usize,
    hidden_size: usize,
    num_outputs: usize,
    device: Device,
}

impl ClassifierHead {
    /// Build a head from its four parameter tensors, checking that their
    /// shapes chain together.
    pub fn from_tensors(
        fc1_weight: Tensor,
        fc1_bias: Tensor,
        fc2_weight: Tensor,
        fc2_bias: Tensor,
        activation: Activation,
    ) -> Result<Self, ModelError> {
        let (hidden_size, input_dim) = dims2(&fc1_weight, FC1_WEIGHT)?;
        let (num_outputs, fc2_in) = dims2(&fc2_weight, FC2_WEIGHT)?;

        if fc2_in != hidden_size {
            return Err(ModelError::InvalidCheckpoint(format!(
                "{FC2_WEIGHT} expects {fc2_in} inputs but {FC1_WEIGHT} produces {hidden_size}"
            )));
        }
        expect_len(&fc1_bias, FC1_BIAS, hidden_size)?;
        expect_len(&fc2_bias, FC2_BIAS, num_outputs)?;

        let device = fc1_weight.device().clone();
        let cast = |t: Tensor, name: &str| {
            t.to_dtype(DType::F32).map_err(|e| invalid(name, e))
        };

        Ok(Self {
            fc1: Linear::new(cast(fc1_weight, FC1_WEIGHT)?, Some(cast(fc1_bias, FC1_BIAS)?)),
            fc2: Linear::new(cast(fc2_weight, FC2_WEIGHT)?, Some(cast(fc2_bias, FC2_BIAS)?)),
            activation,
            input_dim,
            hidden_size,
            num_outputs,
            device,
        })
    }

    /// Load `fc1.*` / `fc2.*` from a safetensors file.
    pub fn from_safetensors(path: &Path, activation: Activation) -> Result<Self, ModelError> {
        if !path.exists() {
            return Err(ModelError::InvalidCheckpoint(format!(
                "missing {}",
                path.display()
            )));
        }

        let mut tensors: HashMap<String, Tensor> =
            candle_core::safetensors::load(path, &Device::Cpu).map_err(|e| ModelError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let mut take = |name: &str| {
            tensors.remove(name).ok_or_else(|| {
                ModelError::InvalidCheckpoint(format!(
                    "{} has no tensor '{name}'",
                    path.display()
                ))
            })
        };

        Self::from_tensors(
            take(FC1_WEIGHT)?,
            take(FC1_BIAS)?,
            take(FC2_WEIGHT)?,
            take(FC2_BIAS)?,
            activation,
        )
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// Raw scores for one embedding, in checkpoint index order.
    pub fn logits(&self, embedding: &[f32]) -> Result<Vec<f32>, ModelError> {
        self.forward(embedding, false)
    }

    /// Softmax probabilities for one embedding, in checkpoint index order.
    pub fn probabilities(&self, embedding: &[f32]) -> Result<Vec<f32>, ModelError> {
        self.forward(embedding, true)
    }

    fn forward(&self, embedding: &[f32], softmax: bool) -> Result<Vec<f32>, ModelError> {
        if embedding.len() != self.input_dim {
            return Err(ModelError::Inference(format!(
                "embedding has {} values, head expects {}",
                embedding.len(),
                self.input_dim
            )));
        }

        let x = Tensor::from_slice(embedding, (1, self.input_dim), &self.device)
            .map_err(map_candle_err)?;
        let h = self.fc1.forward(&x).map_err(map_candle_err)?;
        let h = match self.activation {
            Activation::Relu => h.relu(),
            Activation::Gelu => h.gelu_erf(),
        }
        .map_err(map_candle_err)?;
        let logits = self
            .fc2
            .forward(&h)
            .and_then(|t| t.squeeze(0))
            .map_err(map_candle_err)?;

        let out = if softmax {
            candle_nn::ops::softmax(&logits, 0).map_err(map_candle_err)?
        } else {
            logits
        };
        out.to_vec1::<f32>().map_err(map_candle_err)
    }
}

fn dims2(t: &Tensor, name: &str) -> Result<(usize, usize), ModelError> {
    t.dims2().map_err(|_| {
        ModelError::InvalidCheckpoint(format!(
            "{name} must be 2-dimensional, got shape {:?}",
            t.dims()
        ))
    })
}

fn expect_len(t: &Tensor, name: &str, len: usize) -> Result<(), ModelError> {
    match t.dims() {
        [n] if *n == len => Ok(()),
        dims => Err(ModelError::InvalidCheckpoint(format!(
            "{name} must have shape [{len}], got {dims:?}"
        ))),
    }
}

fn invalid(name: &str, e: candle_core::Error) -> ModelError {
    ModelError::InvalidCheckpoint(format!("{name}: {e}"))
}

pub(crate) fn map_candle_err(e: candle_core::Error) -> ModelError {
    ModelError::Inference(format!("Candle inference error: {e}"))
}
