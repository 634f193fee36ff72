/// Recurrent driver: runs a cell over the time axis of [batch, time, features].
///
/// Strictly sequential: step t+1 depends on the memory written at step t.
/// Outputs are stacked into [batch, time', output] where time' counts only
/// the timesteps at which the cell produced an output.

use tracing::debug;

use crate::error::{NtmError, Result};
use crate::tensor::Tensor;

/// A cell that can be unrolled over time.
pub trait RecurrentCell {
    type State;

    fn input_size(&self) -> usize;
    fn output_size(&self) -> usize;

    /// `input`: [batch, input_size]. `None` output means "nothing to emit this step".
    fn forward_step(&self, input: &[f32], batch: usize, state: &Self::State) -> Result<(Option<Vec<f32>>, Self::State)>;
}

pub struct RecurrentLayer<C: RecurrentCell> {
    cell: C,
}

impl<C: RecurrentCell> RecurrentLayer<C> {
    pub fn new(cell: C) -> Self {
        RecurrentLayer { cell }
    }

    pub fn cell(&self) -> &C {
        &self.cell
    }

    /// Unroll over `input` [batch, time, features] starting from `state`.
    ///
    /// Returns (outputs [batch, emitted, output_size] or None if no step
    /// emitted, final state).
    pub fn forward(&self, input: &Tensor, state: C::State) -> Result<(Option<Tensor>, C::State)> {
        let (batch, time, features) = input.dims3("layer input")?;
        if features != self.cell.input_size() {
            return Err(NtmError::Shape {
                what: "layer input features",
                expected: vec![self.cell.input_size()],
                actual: vec![features],
            });
        }
        let out_size = self.cell.output_size();

        let mut state = state;
        let mut emitted: Vec<Vec<f32>> = Vec::with_capacity(time);
        let mut x_t = vec![0.0f32; batch * features];
        for t in 0..time {
            // Gather input[:, t, :] into [batch, features].
            for b in 0..batch {
                let src = (b * time + t) * features;
                x_t[b * features..(b + 1) * features].copy_from_slice(&input.data[src..src + features]);
            }
            let (y_t, next) = self.cell.forward_step(&x_t, batch, &state)?;
            state = next;
            if let Some(y_t) = y_t {
                if y_t.len() != batch * out_size {
                    return Err(NtmError::Shape {
                        what: "cell output",
                        expected: vec![batch * out_size],
                        actual: vec![y_t.len()],
                    });
                }
                emitted.push(y_t);
            }
        }
        debug!(batch, time, emitted = emitted.len(), "sequence unrolled");

        if emitted.is_empty() {
            return Ok((None, state));
        }

        // Scatter [time'][batch, out] into [batch, time', out].
        let steps = emitted.len();
        let mut out = vec![0.0f32; batch * steps * out_size];
        for (t, y_t) in emitted.iter().enumerate() {
            for b in 0..batch {
                let dst = (b * steps + t) * out_size;
                out[dst..dst + out_size].copy_from_slice(&y_t[b * out_size..(b + 1) * out_size]);
            }
        }
        Ok((Some(Tensor { data: out, shape: vec![batch, steps, out_size] }), state))
    }
}
