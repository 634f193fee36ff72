/// Read and write heads.
///
/// A head owns one learned projection hidden → flat parameters and the
/// layout that splits them. Both variants share the addressing pipeline in
/// `addressing::update_attention`; the read head then reads a weighted sum of
/// memory rows, the write head applies the erase/add update.
///
/// Read:  r[b] = Σ_a w[b, a] * M[b, a, :]
/// Write: M'[b, a, c] = M[b, a, c] * (1 - w[b, a] * e[b, c]) + w[b, a] * v[b, c]

use tracing::debug;

use crate::addressing::{update_attention, AddressingParams};
use crate::error::{check_len, Result};
use crate::linear::Linear;
use crate::splitter::ParamLayout;
use crate::tensor::{sigmoid_f32, SimpleRng};

/// Shape of the memory a head operates on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryShape {
    pub batch: usize,
    pub addresses: usize,
    pub content: usize,
}

impl MemoryShape {
    pub fn numel(&self) -> usize {
        self.batch * self.addresses * self.content
    }

    pub fn attention_len(&self) -> usize {
        self.batch * self.addresses
    }
}

/// Project hidden → raw params, split, and squash the addressing part.
/// Returns (addressing params, remaining raw splits past gamma).
fn head_params(
    projection: &Linear,
    layout: &ParamLayout,
    hidden: &[f32],
    batch: usize,
    shift_size: usize,
) -> Result<(AddressingParams, Vec<Vec<f32>>)> {
    let flat = projection.forward(hidden, batch)?;
    let mut parts = layout.split(&flat)?.into_iter();
    // Layout order: query, beta, gate, shift, gamma, [erase, add]
    let query = parts.next().unwrap_or_default();
    let beta = parts.next().unwrap_or_default();
    let gate = parts.next().unwrap_or_default();
    let shift = parts.next().unwrap_or_default();
    let gamma = parts.next().unwrap_or_default();
    let params = AddressingParams::from_raw(&query, &beta, &gate, &shift, &gamma, batch, shift_size);
    Ok((params, parts.collect()))
}

// ── Read head ────────────────────────────────────────────────────────

pub struct ReadHead {
    pub projection: Linear,
    layout: ParamLayout,
    shift_size: usize,
}

impl ReadHead {
    pub fn new(hidden_size: usize, content_bits: usize, shift_size: usize, rng: &mut SimpleRng) -> Self {
        let layout = ParamLayout::read_head(content_bits, shift_size);
        let projection = Linear::init(hidden_size, layout.total(), rng);
        ReadHead { projection, layout, shift_size }
    }

    /// Rebuild from a stored projection, rejecting one whose width does not fit the layout.
    pub fn from_projection(projection: Linear, content_bits: usize, shift_size: usize) -> Result<Self> {
        let layout = ParamLayout::read_head(content_bits, shift_size);
        projection.validate()?;
        layout.check_width(projection.out_features)?;
        Ok(ReadHead { projection, layout, shift_size })
    }

    /// One read: returns (read vector [batch, content], new attention [batch, addresses]).
    pub fn forward(
        &self,
        hidden: &[f32],
        memory: &[f32],
        prev_attention: &[f32],
        shape: MemoryShape,
    ) -> Result<(Vec<f32>, Vec<f32>)> {
        check_len("read attention", prev_attention.len(), shape.attention_len())?;
        let (params, _) = head_params(&self.projection, &self.layout, hidden, shape.batch, self.shift_size)?;
        let attention = update_attention(
            &params, memory, prev_attention, shape.batch, shape.addresses, shape.content,
        );
        let read = read_memory(&attention, memory, shape);
        debug!(?read, "read vector");
        Ok((read, attention))
    }
}

// ── Write head ───────────────────────────────────────────────────────

pub struct WriteHead {
    pub projection: Linear,
    layout: ParamLayout,
    shift_size: usize,
}

impl WriteHead {
    pub fn new(hidden_size: usize, content_bits: usize, shift_size: usize, rng: &mut SimpleRng) -> Self {
        let layout = ParamLayout::write_head(content_bits, shift_size);
        let projection = Linear::init(hidden_size, layout.total(), rng);
        WriteHead { projection, layout, shift_size }
    }

    pub fn from_projection(projection: Linear, content_bits: usize, shift_size: usize) -> Result<Self> {
        let layout = ParamLayout::write_head(content_bits, shift_size);
        projection.validate()?;
        layout.check_width(projection.out_features)?;
        Ok(WriteHead { projection, layout, shift_size })
    }

    /// One write: returns (new memory [batch, addresses, content], new attention).
    /// `memory` is not modified.
    pub fn forward(
        &self,
        hidden: &[f32],
        memory: &[f32],
        prev_attention: &[f32],
        shape: MemoryShape,
    ) -> Result<(Vec<f32>, Vec<f32>)> {
        check_len("write attention", prev_attention.len(), shape.attention_len())?;
        let (params, rest) = head_params(&self.projection, &self.layout, hidden, shape.batch, self.shift_size)?;
        let mut rest = rest.into_iter();
        let erase: Vec<f32> = rest.next().unwrap_or_default().iter().map(|&x| sigmoid_f32(x)).collect();
        let add: Vec<f32> = rest.next().unwrap_or_default().iter().map(|&x| sigmoid_f32(x)).collect();

        let attention = update_attention(
            &params, memory, prev_attention, shape.batch, shape.addresses, shape.content,
        );
        let new_memory = write_memory(memory, &attention, &erase, &add, shape);
        debug!(?erase, ?add, "memory written");
        Ok((new_memory, attention))
    }
}

// ── Memory access kernels ────────────────────────────────────────────

/// r[b, c] = Σ_a attention[b, a] * memory[b, a, c]. Returns [batch, content].
pub fn read_memory(attention: &[f32], memory: &[f32], shape: MemoryShape) -> Vec<f32> {
    let MemoryShape { batch, addresses, content } = shape;
    debug_assert_eq!(attention.len(), batch * addresses);
    debug_assert_eq!(memory.len(), shape.numel());

    let mut out = vec![0.0f32; batch * content];
    for b in 0..batch {
        let r = &mut out[b * content..(b + 1) * content];
        for a in 0..addresses {
            let w = attention[b * addresses + a];
            let row = &memory[(b * addresses + a) * content..(b * addresses + a + 1) * content];
            for (rc, m) in r.iter_mut().zip(row) {
                *rc += w * m;
            }
        }
    }
    out
}

/// Erase/add update. Returns a fresh memory buffer:
///   M'[b, a, c] = M[b, a, c] * (1 - w[b, a] * erase[b, c]) + w[b, a] * add[b, c]
pub fn write_memory(
    memory: &[f32],
    attention: &[f32],
    erase: &[f32],
    add: &[f32],
    shape: MemoryShape,
) -> Vec<f32> {
    let MemoryShape { batch, addresses, content } = shape;
    debug_assert_eq!(memory.len(), shape.numel());
    debug_assert_eq!(attention.len(), batch * addresses);
    debug_assert_eq!(erase.len(), batch * content);
    debug_assert_eq!(add.len(), batch * content);

    let mut out = vec![0.0f32; shape.numel()];
    for b in 0..batch {
        let e = &erase[b * content..(b + 1) * content];
        let v = &add[b * content..(b + 1) * content];
        for a in 0..addresses {
            let w = attention[b * addresses + a];
            let base = (b * addresses + a) * content;
            for c in 0..content {
                out[base + c] = memory[base + c] * (1.0 - w * e[c]) + w * v[c];
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHAPE: MemoryShape = MemoryShape { batch: 1, addresses: 4, content: 3 };

    fn one_hot(addresses: usize, at: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; addresses];
        v[at] = 1.0;
        v
    }

    #[test]
    fn test_read_uniform_is_mean_row() {
        let memory: Vec<f32> = (0..12).map(|x| x as f32).collect();
        let r = read_memory(&[0.25; 4], &memory, SHAPE);
        assert_eq!(r, vec![4.5, 5.5, 6.5]);
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let mut rng = SimpleRng::new(3);
        let mut memory = vec![0.0f32; SHAPE.numel()];
        rng.fill_uniform(&mut memory, 5.0);
        let w = one_hot(4, 1);
        let v = [0.25, 0.5, 0.75f32];
        let written = write_memory(&memory, &w, &[1.0; 3], &v, SHAPE);
        assert_eq!(read_memory(&w, &written, SHAPE), v.to_vec());
        // Other rows untouched
        assert_eq!(&written[..3], &memory[..3]);
        assert_eq!(&written[6..], &memory[6..]);
    }

    #[test]
    fn test_zero_erase_accumulates() {
        let memory = vec![1.0f32; SHAPE.numel()];
        let written = write_memory(&memory, &one_hot(4, 0), &[0.0; 3], &[0.5; 3], SHAPE);
        assert_eq!(&written[..3], &[1.5, 1.5, 1.5]);
    }

    #[test]
    fn test_head_rejects_mismatched_projection() {
        let bad = Linear::zeros(8, 11);
        assert!(ReadHead::from_projection(bad, 4, 3).is_err());
        let good = Linear::zeros(8, 10);
        assert!(ReadHead::from_projection(good, 4, 3).is_ok());
        assert!(WriteHead::from_projection(Linear::zeros(8, 18), 4, 3).is_ok());
    }

    #[test]
    fn test_read_head_forward_shapes() {
        let mut rng = SimpleRng::new(11);
        let head = ReadHead::new(6, 3, 3, &mut rng);
        let shape = MemoryShape { batch: 2, addresses: 5, content: 3 };
        let mut hidden = vec![0.0f32; 2 * 6];
        rng.fill_uniform(&mut hidden, 1.0);
        let mut memory = vec![0.0f32; shape.numel()];
        rng.fill_uniform(&mut memory, 1.0);
        let prev = vec![0.2f32; 10];
        let (read, att) = head.forward(&hidden, &memory, &prev, shape).unwrap();
        assert_eq!(read.len(), 2 * 3);
        assert_eq!(att.len(), 10);
        assert!(head.forward(&hidden, &memory, &prev[..5], shape).is_err());
    }
}
