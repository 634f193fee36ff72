/// Parameter splitting: flat head-parameter vectors → named sub-vectors.
///
/// Each head's projection emits one flat vector per batch element. The layout
/// is an ordered list of (name, width); cumulative boundaries are computed
/// once at construction and reused every step.
///
/// Read head layout:  query [C] | beta [1] | gate [1] | shift [S] | gamma [1]
/// Write head layout: read layout | erase [C] | add [C]

use tracing::debug;

use crate::error::{NtmError, Result};

pub const QUERY: &str = "query_vector";
pub const BETA: &str = "beta";
pub const GATE: &str = "gate";
pub const SHIFT: &str = "shift";
pub const GAMMA: &str = "gamma";
pub const ERASE: &str = "erase_vector";
pub const ADD: &str = "add_vector";

/// Ordered parameter layout with precomputed boundaries.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamLayout {
    names: Vec<&'static str>,
    /// `boundaries[i]..boundaries[i+1]` is the slot of `names[i]`.
    /// Length is `names.len() + 1`, first entry is 0.
    boundaries: Vec<usize>,
}

impl ParamLayout {
    pub fn new(head: &str, widths: &[(&'static str, usize)]) -> Self {
        let mut boundaries = Vec::with_capacity(widths.len() + 1);
        boundaries.push(0);
        let mut acc = 0;
        for &(_, w) in widths {
            acc += w;
            boundaries.push(acc);
        }
        debug!(head, ?widths, ?boundaries, "parameter layout");
        ParamLayout {
            names: widths.iter().map(|&(n, _)| n).collect(),
            boundaries,
        }
    }

    pub fn read_head(content_bits: usize, shift_size: usize) -> Self {
        ParamLayout::new("read", &[
            (QUERY, content_bits),
            (BETA, 1),
            (GATE, 1),
            (SHIFT, shift_size),
            (GAMMA, 1),
        ])
    }

    pub fn write_head(content_bits: usize, shift_size: usize) -> Self {
        ParamLayout::new("write", &[
            (QUERY, content_bits),
            (BETA, 1),
            (GATE, 1),
            (SHIFT, shift_size),
            (GAMMA, 1),
            (ERASE, content_bits),
            (ADD, content_bits),
        ])
    }

    /// Total width: the output width the projection must produce.
    pub fn total(&self) -> usize {
        *self.boundaries.last().unwrap_or(&0)
    }

    pub fn names(&self) -> &[&'static str] {
        &self.names
    }

    pub fn boundaries(&self) -> &[usize] {
        &self.boundaries
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|&n| n == name)
    }

    /// Construction-time check that a projection of width `out_width` feeds this layout.
    pub fn check_width(&self, out_width: usize) -> Result<()> {
        if self.total() != out_width {
            return Err(NtmError::Config(format!(
                "parameter widths {:?} sum to {}, projection produces {}",
                self.names, self.total(), out_width
            )));
        }
        Ok(())
    }

    /// Split `flat` ([..., total]) into one buffer per parameter, in declared order.
    pub fn split(&self, flat: &[f32]) -> Result<Vec<Vec<f32>>> {
        let total = self.total();
        if total == 0 || flat.len() % total != 0 {
            return Err(NtmError::Shape {
                what: "head parameters",
                expected: vec![total],
                actual: vec![flat.len()],
            });
        }
        Ok(split_params(flat, &self.boundaries))
    }
}

/// Slice the last axis of `flat` by `boundaries`.
///
/// `flat` has any number of leading dims (`[batch, P]`, `[batch, time, P]`, ...)
/// flattened into rows of width `P = boundaries.last()`. Output `i` holds
/// `flat[.., boundaries[i]..boundaries[i+1]]` for every row, contiguously.
pub fn split_params(flat: &[f32], boundaries: &[usize]) -> Vec<Vec<f32>> {
    let width = *boundaries.last().unwrap_or(&0);
    if width == 0 {
        return Vec::new();
    }
    debug_assert_eq!(flat.len() % width, 0);
    let rows = flat.len() / width;

    boundaries
        .windows(2)
        .map(|w| {
            let (lo, hi) = (w[0], w[1]);
            let mut part = Vec::with_capacity(rows * (hi - lo));
            for r in 0..rows {
                part.extend_from_slice(&flat[r * width + lo..r * width + hi]);
            }
            part
        })
        .collect()
}
