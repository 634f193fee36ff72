/// Controller seam: the opaque function input + state → hidden vector + state.
///
/// The memory cell only relies on this trait. Controller variants are peer
/// implementations, not a hierarchy. Parameters are an associated type so a
/// checkpoint can store whichever controller backs the cell.

use serde::{Serialize, Deserialize};
use serde::de::DeserializeOwned;

use crate::config::{ControllerConfig, NonLinearity};
use crate::error::{NtmError, Result};
use crate::linear::Linear;
use crate::tensor::SimpleRng;

pub trait Controller {
    /// Per-sequence recurrent state (unit for stateless controllers).
    type State: Clone;
    /// Learnable weights, as stored in checkpoints.
    type Params: Clone + Serialize + DeserializeOwned;

    fn input_size(&self) -> usize;
    fn hidden_size(&self) -> usize;

    /// Initial state for a batch.
    fn init(&self, batch: usize) -> Self::State;

    /// `input`: [batch, input_size] → (hidden [batch, hidden_size], new state).
    fn step(&self, input: &[f32], batch: usize, state: &Self::State) -> Result<(Vec<f32>, Self::State)>;

    fn params(&self) -> Self::Params;

    fn from_params(params: Self::Params) -> Result<Self>
    where
        Self: Sized;
}

// ── Feed-forward controller ──────────────────────────────────────────

/// Stored weights of a feed-forward controller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedForwardParams {
    pub linear: Linear,
    pub non_linearity: NonLinearity,
}

/// hidden = f(input @ W + b). Stateless: every timestep sees only its input;
/// all recurrence goes through the external memory.
pub struct FeedForwardController {
    linear: Linear,
    non_linearity: NonLinearity,
}

impl FeedForwardController {
    pub fn new(cfg: &ControllerConfig, input_size: usize, rng: &mut SimpleRng) -> Result<Self> {
        if cfg.hidden_state_size == 0 || input_size == 0 {
            return Err(NtmError::Config("controller sizes must be > 0".into()));
        }
        Ok(FeedForwardController {
            linear: Linear::init(input_size, cfg.hidden_state_size, rng),
            non_linearity: cfg.non_linearity,
        })
    }
}

impl Controller for FeedForwardController {
    type State = ();
    type Params = FeedForwardParams;

    fn input_size(&self) -> usize {
        self.linear.in_features
    }

    fn hidden_size(&self) -> usize {
        self.linear.out_features
    }

    fn init(&self, _batch: usize) -> Self::State {}

    fn step(&self, input: &[f32], batch: usize, _state: &()) -> Result<(Vec<f32>, ())> {
        let mut hidden = self.linear.forward(input, batch)?;
        for h in hidden.iter_mut() {
            *h = self.non_linearity.apply(*h);
        }
        Ok((hidden, ()))
    }

    fn params(&self) -> FeedForwardParams {
        FeedForwardParams {
            linear: self.linear.clone(),
            non_linearity: self.non_linearity,
        }
    }

    fn from_params(params: FeedForwardParams) -> Result<Self> {
        params.linear.validate()?;
        Ok(FeedForwardController {
            linear: params.linear,
            non_linearity: params.non_linearity,
        })
    }
}
