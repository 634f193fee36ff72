/// Dense affine projection: y[B, out] = x[B, in] @ W[in, out] + b[out].
///
/// Used for the hidden → head-parameter projections, the hidden → output
/// logits projection and the feed-forward controller. Weights are flat
/// row-major Vec<f32> so they serialize straight into checkpoints.

use serde::{Serialize, Deserialize};
use crate::error::{check_len, Result};
use crate::tensor::{matmul_f32, SimpleRng};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Linear {
    pub in_features: usize,
    pub out_features: usize,
    /// [in_features, out_features]
    pub weight: Vec<f32>,
    /// [out_features]
    pub bias: Vec<f32>,
}

impl Linear {
    /// Uniform init in ±1/sqrt(in_features) for both weight and bias.
    pub fn init(in_features: usize, out_features: usize, rng: &mut SimpleRng) -> Self {
        let scale = (1.0 / in_features.max(1) as f32).sqrt();
        let mut weight = vec![0.0f32; in_features * out_features];
        rng.fill_uniform(&mut weight, scale);
        let mut bias = vec![0.0f32; out_features];
        rng.fill_uniform(&mut bias, scale);
        Linear { in_features, out_features, weight, bias }
    }

    pub fn zeros(in_features: usize, out_features: usize) -> Self {
        Linear {
            in_features,
            out_features,
            weight: vec![0.0; in_features * out_features],
            bias: vec![0.0; out_features],
        }
    }

    pub fn num_params(&self) -> usize {
        self.weight.len() + self.bias.len()
    }

    /// Check the stored buffers agree with the declared feature counts.
    /// Loaded checkpoints go through this before use.
    pub fn validate(&self) -> Result<()> {
        check_len("linear weight", self.weight.len(), self.in_features * self.out_features)?;
        check_len("linear bias", self.bias.len(), self.out_features)
    }

    /// `x`: [batch, in_features] → [batch, out_features].
    pub fn forward(&self, x: &[f32], batch: usize) -> Result<Vec<f32>> {
        check_len("linear input", x.len(), batch * self.in_features)?;
        let mut out = vec![0.0f32; batch * self.out_features];
        matmul_f32(x, &self.weight, &mut out, batch, self.in_features, self.out_features);
        for row in out.chunks_mut(self.out_features) {
            for (y, b) in row.iter_mut().zip(&self.bias) {
                *y += b;
            }
        }
        Ok(out)
    }
}
