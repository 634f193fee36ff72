/// Minimal tensor utilities for the memory interface.
///
/// All kernels are free functions on flat f32 slices with explicit dimensions.
/// Row-major layout throughout. Batched kernels take `rows` (batch elements,
/// or batch * addresses) and `cols` so the batch axis is one pass, not a
/// caller-side loop.

use crate::error::{NtmError, Result};

/// Floor for every norm division.
pub const NORM_EPS: f32 = 1e-12;

/// Flat f32 tensor with shape metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    pub data: Vec<f32>,
    pub shape: Vec<usize>,
}

impl Tensor {
    pub fn zeros(shape: &[usize]) -> Self {
        let n: usize = shape.iter().product();
        Tensor {
            data: vec![0.0; n],
            shape: shape.to_vec(),
        }
    }

    /// Wrap `data` with `shape`, rejecting a length that does not match.
    pub fn from_vec(data: Vec<f32>, shape: &[usize]) -> Result<Self> {
        let n: usize = shape.iter().product();
        if data.len() != n {
            return Err(NtmError::Shape {
                what: "tensor data",
                expected: vec![n],
                actual: vec![data.len()],
            });
        }
        Ok(Tensor { data, shape: shape.to_vec() })
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Unpack a rank-3 shape, e.g. memory `[batch, addresses, content]`.
    /// Fields are public, so the data length is re-checked against the shape.
    pub fn dims3(&self, what: &'static str) -> Result<(usize, usize, usize)> {
        let (a, b, c) = match self.shape.as_slice() {
            &[a, b, c] => (a, b, c),
            other => {
                return Err(NtmError::Shape {
                    what,
                    expected: vec![0, 0, 0],
                    actual: other.to_vec(),
                })
            }
        };
        if self.data.len() != a * b * c {
            return Err(NtmError::Shape {
                what,
                expected: vec![a * b * c],
                actual: vec![self.data.len()],
            });
        }
        Ok((a, b, c))
    }

    /// True when no element is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }
}

// ── Free-function math ops on flat slices ────────────────────────────

/// Matrix multiply: C[M,N] = A[M,K] @ B[K,N].  Row-major.
/// `out` must be pre-allocated with M*N elements (will be overwritten).
pub fn matmul_f32(a: &[f32], b: &[f32], out: &mut [f32], m: usize, k: usize, n: usize) {
    debug_assert_eq!(a.len(), m * k);
    debug_assert_eq!(b.len(), k * n);
    debug_assert_eq!(out.len(), m * n);

    for i in 0..m {
        for j in 0..n {
            let mut sum = 0.0f32;
            for p in 0..k {
                sum += a[i * k + p] * b[p * n + j];
            }
            out[i * n + j] = sum;
        }
    }
}

/// Row-wise softmax: each row of length `cols` in `scores` gets softmaxed into `out`.
/// `rows` * `cols` elements.
pub fn softmax_f32(scores: &[f32], out: &mut [f32], rows: usize, cols: usize) {
    debug_assert_eq!(scores.len(), rows * cols);
    debug_assert_eq!(out.len(), rows * cols);

    for r in 0..rows {
        let base = r * cols;
        let row = &scores[base..base + cols];

        // Numerically stable: subtract max
        let max_val = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let mut sum_exp = 0.0f32;
        for c in 0..cols {
            let e = (row[c] - max_val).exp();
            out[base + c] = e;
            sum_exp += e;
        }
        if sum_exp > 0.0 {
            for c in 0..cols {
                out[base + c] /= sum_exp;
            }
        }
    }
}

/// Row-wise L2 normalization: out[r, :] = a[r, :] / max(||a[r, :]||, NORM_EPS).
/// A zero row stays zero.
pub fn l2_normalize_rows_f32(a: &[f32], out: &mut [f32], rows: usize, cols: usize) {
    debug_assert_eq!(a.len(), rows * cols);
    debug_assert_eq!(out.len(), rows * cols);

    for r in 0..rows {
        let base = r * cols;
        let inv = 1.0 / vec_norm_f32(&a[base..base + cols]).max(NORM_EPS);
        for c in 0..cols {
            out[base + c] = a[base + c] * inv;
        }
    }
}

/// Sigmoid: 1 / (1 + exp(-x)). Clamped to avoid overflow.
#[inline]
pub fn sigmoid_f32(x: f32) -> f32 {
    if x >= 15.0 { return 1.0; }
    if x <= -15.0 { return 0.0; }
    1.0 / (1.0 + (-x).exp())
}

/// Softplus: ln(1 + exp(x)). Numerically stable.
#[inline]
pub fn softplus_f32(x: f32) -> f32 {
    if x >= 15.0 { return x; }
    if x <= -15.0 { return 0.0; }
    (1.0 + x.exp()).ln()
}

/// "Oneplus": softplus(x) + 1, the transform that keeps β and γ >= 1.
#[inline]
pub fn oneplus_f32(x: f32) -> f32 {
    softplus_f32(x) + 1.0
}

/// L2 norm of a vector: sqrt(sum(a[i]^2)).
pub fn vec_norm_f32(a: &[f32]) -> f32 {
    a.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Simple xorshift64 PRNG for deterministic weight init. Not crypto-safe.
pub struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    pub fn new(seed: u64) -> Self {
        SimpleRng { state: seed.max(1) } // avoid zero state
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    /// Uniform in [-scale, scale].
    pub fn uniform(&mut self, scale: f32) -> f32 {
        let u = (self.next_u64() as f64) / (u64::MAX as f64);
        (2.0 * u as f32 - 1.0) * scale
    }

    /// Fill slice with uniform random values in [-scale, scale].
    pub fn fill_uniform(&mut self, buf: &mut [f32], scale: f32) {
        for v in buf.iter_mut() {
            *v = self.uniform(scale);
        }
    }
}
