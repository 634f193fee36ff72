/// Memory interface: N read heads + 1 write head between controller and memory.
///
/// One `step` per timestep:
///   1. every read head addresses and reads `prev_memory`
///   2. the write head addresses `prev_memory` and produces `new_memory`
///
/// Reads never observe the write of the same timestep. The previous state and
/// memory are borrowed, never mutated; the step returns fresh buffers so the
/// recurrence stays side-effect free across timesteps.

use serde::{Serialize, Deserialize};
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::InterfaceConfig;
use crate::error::{check_len, NtmError, Result};
use crate::head::{MemoryShape, ReadHead, WriteHead};
use crate::linear::Linear;
use crate::tensor::{SimpleRng, Tensor};

/// Attention carried between timesteps. Each vector is [batch, addresses].
#[derive(Clone, Debug, PartialEq)]
pub struct InterfaceState {
    pub read_attentions: Vec<Vec<f32>>,
    pub write_attention: Vec<f32>,
}

/// Learnable interface weights: one projection per head. This is what a
/// checkpoint stores; attention state is never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InterfaceParams {
    pub read_heads: Vec<Linear>,
    pub write_head: Linear,
}

/// Output of one interface step.
pub struct InterfaceOutput {
    /// One [batch, content] vector per read head.
    pub read_vectors: Vec<Vec<f32>>,
    /// [batch, addresses, content]
    pub memory: Tensor,
    pub state: InterfaceState,
}

pub struct MemoryInterface {
    cfg: InterfaceConfig,
    read_heads: Vec<ReadHead>,
    write_head: WriteHead,
}

impl MemoryInterface {
    /// Build with freshly initialized head projections.
    pub fn new(cfg: &InterfaceConfig, rng: &mut SimpleRng) -> Result<Self> {
        cfg.validate()?;
        let read_heads = (0..cfg.num_read_heads)
            .map(|_| ReadHead::new(cfg.hidden_size, cfg.content_bits, cfg.shift_size, rng))
            .collect();
        let write_head = WriteHead::new(cfg.hidden_size, cfg.content_bits, cfg.shift_size, rng);
        Ok(MemoryInterface { cfg: cfg.clone(), read_heads, write_head })
    }

    /// Build from stored weights.
    pub fn from_params(cfg: &InterfaceConfig, params: InterfaceParams) -> Result<Self> {
        cfg.validate()?;
        if params.read_heads.len() != cfg.num_read_heads {
            return Err(NtmError::Config(format!(
                "expected {} read head projections, got {}",
                cfg.num_read_heads, params.read_heads.len()
            )));
        }
        let check_in = |lin: &Linear| -> Result<()> {
            if lin.in_features != cfg.hidden_size {
                return Err(NtmError::Config(format!(
                    "head projection takes {} inputs, hidden size is {}",
                    lin.in_features, cfg.hidden_size
                )));
            }
            Ok(())
        };
        let mut read_heads = Vec::with_capacity(params.read_heads.len());
        for lin in params.read_heads {
            check_in(&lin)?;
            read_heads.push(ReadHead::from_projection(lin, cfg.content_bits, cfg.shift_size)?);
        }
        check_in(&params.write_head)?;
        let write_head = WriteHead::from_projection(params.write_head, cfg.content_bits, cfg.shift_size)?;
        Ok(MemoryInterface { cfg: cfg.clone(), read_heads, write_head })
    }

    pub fn params(&self) -> InterfaceParams {
        InterfaceParams {
            read_heads: self.read_heads.iter().map(|h| h.projection.clone()).collect(),
            write_head: self.write_head.projection.clone(),
        }
    }

    pub fn config(&self) -> &InterfaceConfig {
        &self.cfg
    }

    pub fn num_params(&self) -> usize {
        self.read_heads.iter().map(|h| h.projection.num_params()).sum::<usize>()
            + self.write_head.projection.num_params()
    }

    /// Uniform attention (1 / addresses) for every head.
    pub fn init_state(&self, batch: usize, addresses: usize) -> Result<InterfaceState> {
        check_addresses(addresses)?;
        let uniform = vec![1.0 / addresses as f32; batch * addresses];
        Ok(InterfaceState {
            read_attentions: vec![uniform.clone(); self.cfg.num_read_heads],
            write_attention: uniform,
        })
    }

    /// One timestep.
    ///
    /// `hidden`: [batch, hidden_size]; `prev_memory`: [batch, addresses, content].
    pub fn step(
        &self,
        hidden: &[f32],
        prev_memory: &Tensor,
        prev_state: &InterfaceState,
    ) -> Result<InterfaceOutput> {
        let (batch, addresses, content) = prev_memory.dims3("memory")?;
        check_addresses(addresses)?;
        if content != self.cfg.content_bits {
            return Err(NtmError::Shape {
                what: "memory content width",
                expected: vec![self.cfg.content_bits],
                actual: vec![content],
            });
        }
        check_len("controller hidden state", hidden.len(), batch * self.cfg.hidden_size)?;
        check_len("read attention count", prev_state.read_attentions.len(), self.read_heads.len())?;
        let shape = MemoryShape { batch, addresses, content };
        let memory = &prev_memory.data;

        #[cfg(feature = "parallel")]
        let reads: Vec<(Vec<f32>, Vec<f32>)> = self
            .read_heads
            .par_iter()
            .zip(prev_state.read_attentions.par_iter())
            .map(|(head, prev)| head.forward(hidden, memory, prev, shape))
            .collect::<Result<Vec<_>>>()?;

        #[cfg(not(feature = "parallel"))]
        let reads: Vec<(Vec<f32>, Vec<f32>)> = self
            .read_heads
            .iter()
            .zip(&prev_state.read_attentions)
            .map(|(head, prev)| head.forward(hidden, memory, prev, shape))
            .collect::<Result<Vec<_>>>()?;

        let (read_vectors, read_attentions): (Vec<_>, Vec<_>) = reads.into_iter().unzip();

        let (new_memory, write_attention) =
            self.write_head.forward(hidden, memory, &prev_state.write_attention, shape)?;
        debug!(batch, addresses, content, heads = read_vectors.len(), "interface step");

        Ok(InterfaceOutput {
            read_vectors,
            memory: Tensor { data: new_memory, shape: vec![batch, addresses, content] },
            state: InterfaceState { read_attentions, write_attention },
        })
    }
}

/// Memory must have at least one address.
fn check_addresses(addresses: usize) -> Result<()> {
    if addresses == 0 {
        return Err(NtmError::Shape { what: "memory addresses", expected: vec![1], actual: vec![0] });
    }
    Ok(())
}

/// Invariant check on a post-step state: memory and attention finite, every
/// attention row non-negative and summing to 1 within `tol`.
pub fn check_state(memory: &Tensor, state: &InterfaceState, tol: f32) -> Result<()> {
    if !memory.is_finite() {
        return Err(NtmError::NonFinite("memory".into()));
    }
    let (batch, addresses, _) = memory.dims3("memory")?;
    let heads = state
        .read_attentions
        .iter()
        .enumerate()
        .map(|(i, a)| (format!("read head {i}"), a))
        .chain(std::iter::once(("write head".to_string(), &state.write_attention)));

    for (name, att) in heads {
        check_len("attention", att.len(), batch * addresses)?;
        for b in 0..batch {
            let row = &att[b * addresses..(b + 1) * addresses];
            if row.iter().any(|w| !w.is_finite()) {
                return Err(NtmError::NonFinite(format!("{name} attention")));
            }
            let sum: f32 = row.iter().sum();
            let min = row.iter().copied().fold(f32::INFINITY, f32::min);
            if (sum - 1.0).abs() > tol || min < 0.0 {
                return Err(NtmError::Simplex { head: name, batch: b, sum, min });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_interface(num_read_heads: usize) -> MemoryInterface {
        let cfg = InterfaceConfig { num_read_heads, ..InterfaceConfig::test_config() };
        MemoryInterface::new(&cfg, &mut SimpleRng::new(42)).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut rng = SimpleRng::new(1);
        let even = InterfaceConfig { shift_size: 2, ..InterfaceConfig::test_config() };
        assert!(MemoryInterface::new(&even, &mut rng).is_err());
        let none = InterfaceConfig { num_read_heads: 0, ..InterfaceConfig::test_config() };
        assert!(MemoryInterface::new(&none, &mut rng).is_err());
    }

    #[test]
    fn test_init_state_uniform() {
        let iface = test_interface(2);
        let state = iface.init_state(3, 5).unwrap();
        assert_eq!(state.read_attentions.len(), 2);
        assert!(state.write_attention.iter().all(|&w| (w - 0.2).abs() < 1e-7));
        assert_eq!(state.write_attention.len(), 15);
        assert!(check_state(&Tensor::zeros(&[3, 5, 4]), &state, 1e-5).is_ok());
    }

    #[test]
    fn test_step_shapes_and_invariants() {
        let iface = test_interface(3);
        let mut rng = SimpleRng::new(5);
        let mut memory = Tensor::zeros(&[2, 6, 4]);
        rng.fill_uniform(&mut memory.data, 1.0);
        let mut hidden = vec![0.0f32; 2 * 8];
        rng.fill_uniform(&mut hidden, 1.0);
        let state = iface.init_state(2, 6).unwrap();

        let out = iface.step(&hidden, &memory, &state).unwrap();
        assert_eq!(out.read_vectors.len(), 3);
        assert!(out.read_vectors.iter().all(|r| r.len() == 2 * 4));
        assert_eq!(out.memory.shape, vec![2, 6, 4]);
        check_state(&out.memory, &out.state, 1e-5).unwrap();
        // Inputs untouched.
        assert_eq!(state, iface.init_state(2, 6).unwrap());
    }

    #[test]
    fn test_step_rejects_wrong_hidden_width() {
        let iface = test_interface(1);
        let memory = Tensor::zeros(&[1, 4, 4]);
        let state = iface.init_state(1, 4).unwrap();
        let err = iface.step(&[0.0; 7], &memory, &state);
        assert!(matches!(err, Err(NtmError::Shape { .. })));
    }

    #[test]
    fn test_step_rejects_wrong_content_width() {
        let iface = test_interface(1);
        let memory = Tensor::zeros(&[1, 4, 5]);
        let state = iface.init_state(1, 4).unwrap();
        assert!(iface.step(&[0.0; 8], &memory, &state).is_err());
    }

    #[test]
    fn test_params_round_trip() {
        let iface = test_interface(2);
        let rebuilt = MemoryInterface::from_params(iface.config(), iface.params()).unwrap();
        assert_eq!(rebuilt.params(), iface.params());
        assert_eq!(iface.num_params(), 2 * (8 * 10 + 10) + (8 * 18 + 18));
    }

    #[test]
    fn test_from_params_rejects_head_count_mismatch() {
        let iface = test_interface(2);
        let cfg = InterfaceConfig { num_read_heads: 3, ..InterfaceConfig::test_config() };
        assert!(MemoryInterface::from_params(&cfg, iface.params()).is_err());
    }

    #[test]
    fn test_check_state_flags_nan_and_off_simplex() {
        let memory = Tensor::zeros(&[1, 2, 4]);
        let bad_sum = InterfaceState { read_attentions: vec![vec![0.5, 0.6]], write_attention: vec![0.5, 0.5] };
        assert!(matches!(check_state(&memory, &bad_sum, 1e-5), Err(NtmError::Simplex { .. })));
        let nan = InterfaceState { read_attentions: vec![vec![0.5, 0.5]], write_attention: vec![f32::NAN, 0.5] };
        assert!(matches!(check_state(&memory, &nan, 1e-5), Err(NtmError::NonFinite(_))));
        let mut bad_mem = memory.clone();
        bad_mem.data[0] = f32::INFINITY;
        let ok = InterfaceState { read_attentions: vec![vec![0.5, 0.5]], write_attention: vec![0.5, 0.5] };
        assert!(matches!(check_state(&bad_mem, &ok, 1e-5), Err(NtmError::NonFinite(_))));
    }
}
