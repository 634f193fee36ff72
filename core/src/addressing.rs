/// NTM addressing: content-based focus, gating, circular shift, sharpening.
///
/// All kernels are batched: attention is [batch, addresses] row-major (the
/// trailing unit axis of [B, A, 1] is implicit), memory is
/// [batch, addresses, content]. Per-batch quantities (beta, gate, gamma) are
/// [batch]; shift kernels are [batch, shift_size], one kernel per batch element.
///
/// Pipeline for one head, one timestep:
///   w_c = softmax(beta * cos(query, M[a]))          content addressing
///   w_g = g * w_c + (1 - g) * w_prev                 gating
///   w_s[a] = Σ_s w_g[(a + s - S/2) mod A] * k[s]     circular convolution
///   w[a] = w_s[a]^γ / Σ w_s^γ                        sharpening
///
/// Every stage keeps each row on the probability simplex.

use tracing::debug;

use crate::tensor::{
    l2_normalize_rows_f32, softmax_f32, sigmoid_f32, oneplus_f32,
};

/// Squashed addressing parameters for one head, batched.
#[derive(Clone, Debug, PartialEq)]
pub struct AddressingParams {
    /// Query ("key") in (0, 1): [batch, content]
    pub query: Vec<f32>,
    /// Key strength, >= 1: [batch]
    pub beta: Vec<f32>,
    /// Interpolation gate in [0, 1]: [batch]
    pub gate: Vec<f32>,
    /// Shift kernel, each row a distribution: [batch, shift_size]
    pub shift: Vec<f32>,
    /// Sharpening exponent, >= 1: [batch]
    pub gamma: Vec<f32>,
}

impl AddressingParams {
    /// Apply the parameter transforms to raw projection outputs:
    /// sigmoid(query), oneplus(beta), sigmoid(gate), softmax(shift), oneplus(gamma).
    pub fn from_raw(
        query: &[f32],
        beta: &[f32],
        gate: &[f32],
        shift: &[f32],
        gamma: &[f32],
        batch: usize,
        shift_size: usize,
    ) -> Self {
        debug_assert_eq!(beta.len(), batch);
        debug_assert_eq!(gate.len(), batch);
        debug_assert_eq!(gamma.len(), batch);
        debug_assert_eq!(shift.len(), batch * shift_size);

        let mut kernel = vec![0.0f32; batch * shift_size];
        softmax_f32(shift, &mut kernel, batch, shift_size);

        AddressingParams {
            query: query.iter().map(|&x| sigmoid_f32(x)).collect(),
            beta: beta.iter().map(|&x| oneplus_f32(x)).collect(),
            gate: gate.iter().map(|&x| sigmoid_f32(x)).collect(),
            shift: kernel,
            gamma: gamma.iter().map(|&x| oneplus_f32(x)).collect(),
        }
    }
}

/// Content-based addressing.
///
/// `query`: [batch, content], `beta`: [batch], `memory`: [batch, addresses, content].
/// Returns attention [batch, addresses].
///
/// Query and memory rows are L2-normalized with an epsilon floor, so a zero
/// row (or zero query) contributes similarity 0 instead of NaN.
pub fn content_addressing(
    query: &[f32],
    beta: &[f32],
    memory: &[f32],
    batch: usize,
    addresses: usize,
    content: usize,
) -> Vec<f32> {
    debug_assert_eq!(query.len(), batch * content);
    debug_assert_eq!(beta.len(), batch);
    debug_assert_eq!(memory.len(), batch * addresses * content);

    let mut norm_query = vec![0.0f32; batch * content];
    l2_normalize_rows_f32(query, &mut norm_query, batch, content);
    let mut norm_memory = vec![0.0f32; batch * addresses * content];
    l2_normalize_rows_f32(memory, &mut norm_memory, batch * addresses, content);

    // Strengthened cosine similarity: beta[b] * <M[b,a], q[b]>
    let mut scores = vec![0.0f32; batch * addresses];
    for b in 0..batch {
        let q = &norm_query[b * content..(b + 1) * content];
        for a in 0..addresses {
            let row = &norm_memory[(b * addresses + a) * content..(b * addresses + a + 1) * content];
            let sim: f32 = row.iter().zip(q).map(|(m, q)| m * q).sum();
            scores[b * addresses + a] = beta[b] * sim;
        }
    }

    let mut attention = vec![0.0f32; batch * addresses];
    softmax_f32(&scores, &mut attention, batch, addresses);
    attention
}

/// Interpolation gate: g * content + (1 - g) * prev, g broadcast over addresses.
pub fn gate_attention(
    content_attention: &[f32],
    prev_attention: &[f32],
    gate: &[f32],
    batch: usize,
    addresses: usize,
) -> Vec<f32> {
    debug_assert_eq!(content_attention.len(), batch * addresses);
    debug_assert_eq!(prev_attention.len(), batch * addresses);
    debug_assert_eq!(gate.len(), batch);

    let mut out = vec![0.0f32; batch * addresses];
    for b in 0..batch {
        let g = gate[b];
        for a in 0..addresses {
            let i = b * addresses + a;
            out[i] = g * content_attention[i] + (1.0 - g) * prev_attention[i];
        }
    }
    out
}

/// Batched circular convolution with a per-batch-element kernel.
///
/// `attention`: [batch, addresses], `kernel`: [batch, shift_size] (odd size).
///   out[b, a] = Σ_{s=0}^{S-1} attention[b, (a + s - S/2) mod A] * kernel[b, s]
///
/// Indices wrap in both directions. Kernel index `s` moves mass by
/// `S/2 - s` addresses: index S/2 keeps the focus in place, index 0 moves it
/// S/2 addresses forward, index S-1 moves it S/2 addresses backward.
pub fn circular_convolution(
    attention: &[f32],
    kernel: &[f32],
    batch: usize,
    addresses: usize,
    shift_size: usize,
) -> Vec<f32> {
    debug_assert_eq!(attention.len(), batch * addresses);
    debug_assert_eq!(kernel.len(), batch * shift_size);

    let half = (shift_size / 2) as isize;
    let n = addresses as isize;
    let mut out = vec![0.0f32; batch * addresses];
    for b in 0..batch {
        let src = &attention[b * addresses..(b + 1) * addresses];
        let k = &kernel[b * shift_size..(b + 1) * shift_size];
        let dst = &mut out[b * addresses..(b + 1) * addresses];
        for a in 0..addresses {
            let mut acc = 0.0f32;
            for (s, &ks) in k.iter().enumerate() {
                let idx = (a as isize + s as isize - half).rem_euclid(n) as usize;
                acc += src[idx] * ks;
            }
            dst[a] = acc;
        }
    }
    out
}

/// Sharpening: w[a]^γ / Σ w^γ per batch row, γ >= 1.
///
/// Powers are taken relative to the row maximum so large γ cannot underflow
/// the whole row to zero. A row with no mass falls back to uniform.
pub fn sharpen(attention: &[f32], gamma: &[f32], batch: usize, addresses: usize) -> Vec<f32> {
    debug_assert_eq!(attention.len(), batch * addresses);
    debug_assert_eq!(gamma.len(), batch);

    let mut out = vec![0.0f32; batch * addresses];
    for b in 0..batch {
        let src = &attention[b * addresses..(b + 1) * addresses];
        let dst = &mut out[b * addresses..(b + 1) * addresses];
        let max_val = src.iter().copied().fold(0.0f32, f32::max);
        if max_val <= 0.0 || !max_val.is_finite() {
            dst.fill(1.0 / addresses as f32);
            continue;
        }
        let mut sum = 0.0f32;
        for (d, &w) in dst.iter_mut().zip(src) {
            *d = (w.max(0.0) / max_val).powf(gamma[b]);
            sum += *d;
        }
        // sum >= 1: the max entry maps to exactly 1.
        for d in dst.iter_mut() {
            *d /= sum;
        }
    }
    out
}

/// Full addressing pipeline for one head: content → gate → shift → sharpen.
///
/// Returns the new attention [batch, addresses], which replaces `prev_attention`.
pub fn update_attention(
    params: &AddressingParams,
    memory: &[f32],
    prev_attention: &[f32],
    batch: usize,
    addresses: usize,
    content: usize,
) -> Vec<f32> {
    let shift_size = params.shift.len() / batch.max(1);

    let content_attention = content_addressing(
        &params.query, &params.beta, memory, batch, addresses, content,
    );
    let gated = gate_attention(&content_attention, prev_attention, &params.gate, batch, addresses);
    let shifted = circular_convolution(&gated, &params.shift, batch, addresses, shift_size);
    let attention = sharpen(&shifted, &params.gamma, batch, addresses);

    debug!(
        batch, addresses,
        gate = ?params.gate, gamma = ?params.gamma,
        ?attention,
        "attention updated"
    );
    attention
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_simplex(att: &[f32], batch: usize, addresses: usize) {
        for b in 0..batch {
            let row = &att[b * addresses..(b + 1) * addresses];
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5, "row {b} sums to {sum}");
            assert!(row.iter().all(|&w| w >= 0.0 && w.is_finite()), "row {b}: {row:?}");
        }
    }

    fn one_hot(addresses: usize, at: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; addresses];
        v[at] = 1.0;
        v
    }

    // ── Content addressing ───────────────────────────────────────────

    #[test]
    fn test_content_addressing_prefers_matching_row() {
        // 1 batch, 3 addresses, 2 content
        let memory = [1.0, 0.0, 0.0, 1.0, 0.7, 0.7f32];
        let query = [0.0, 2.0f32];
        let att = content_addressing(&query, &[10.0], &memory, 1, 3, 2);
        assert_simplex(&att, 1, 3);
        assert!(att[1] > att[2] && att[2] > att[0], "{att:?}");
    }

    #[test]
    fn test_content_addressing_zero_memory_is_uniform() {
        let memory = [0.0f32; 8];
        let att = content_addressing(&[0.3, 0.9], &[5.0], &memory, 1, 4, 2);
        for &w in &att {
            assert!((w - 0.25).abs() < 1e-6);
        }
    }

    #[test]
    fn test_content_addressing_zero_query_no_nan() {
        let memory = [1.0, 2.0, 3.0, 4.0f32];
        let att = content_addressing(&[0.0, 0.0], &[3.0], &memory, 1, 2, 2);
        assert_simplex(&att, 1, 2);
    }

    #[test]
    fn test_strength_increases_focus() {
        let memory = [1.0, 0.0, 0.6, 0.8f32];
        let query = [1.0, 0.0f32];
        let soft = content_addressing(&query, &[1.0], &memory, 1, 2, 2);
        let hard = content_addressing(&query, &[20.0], &memory, 1, 2, 2);
        assert!(hard[0] > soft[0]);
    }

    #[test]
    fn test_content_addressing_batched_independent() {
        // batch 2: each element has its own memory and query
        let memory = [1.0, 0.0, 0.0, 1.0, /* b1 */ 0.0, 1.0, 1.0, 0.0f32];
        let query = [1.0, 0.0, 1.0, 0.0f32];
        let att = content_addressing(&query, &[10.0, 10.0], &memory, 2, 2, 2);
        assert_simplex(&att, 2, 2);
        assert!(att[0] > att[1]);
        assert!(att[3] > att[2]);
    }

    // ── Gating ───────────────────────────────────────────────────────

    #[test]
    fn test_gate_one_is_pure_content() {
        let c = [0.1, 0.2, 0.7f32];
        let p = [0.5, 0.5, 0.0f32];
        assert_eq!(gate_attention(&c, &p, &[1.0], 1, 3), c.to_vec());
    }

    #[test]
    fn test_gate_zero_is_previous() {
        let c = [0.1, 0.2, 0.7f32];
        let p = [0.5, 0.5, 0.0f32];
        assert_eq!(gate_attention(&c, &p, &[0.0], 1, 3), p.to_vec());
    }

    #[test]
    fn test_gate_half_mixes() {
        let g = gate_attention(&[1.0, 0.0], &[0.0, 1.0], &[0.5], 1, 2);
        assert_simplex(&g, 1, 2);
        assert!((g[0] - 0.5).abs() < 1e-6);
    }

    // ── Circular convolution ─────────────────────────────────────────

    #[test]
    fn test_identity_kernel_keeps_focus() {
        let att = one_hot(5, 2);
        let out = circular_convolution(&att, &[0.0, 1.0, 0.0], 1, 5, 3);
        assert_eq!(out, att);
    }

    #[test]
    fn test_one_hot_shift_moves_focus() {
        // Kernel index s shifts by k = S/2 - s.
        let a_count = 6;
        for a in 0..a_count {
            for s in 0..3usize {
                let k = 1isize - s as isize;
                let kernel = one_hot(3, s);
                let out = circular_convolution(&one_hot(a_count, a), &kernel, 1, a_count, 3);
                let expected = (a as isize + k).rem_euclid(a_count as isize) as usize;
                assert_eq!(out, one_hot(a_count, expected), "a={a} s={s}");
            }
        }
    }

    #[test]
    fn test_shift_wraps_both_directions() {
        // forward from last address wraps to 0
        let out = circular_convolution(&one_hot(4, 3), &[1.0, 0.0, 0.0], 1, 4, 3);
        assert_eq!(out, one_hot(4, 0));
        // backward from address 0 wraps to last
        let out = circular_convolution(&one_hot(4, 0), &[0.0, 0.0, 1.0], 1, 4, 3);
        assert_eq!(out, one_hot(4, 3));
    }

    #[test]
    fn test_wide_kernel_shifts_by_two() {
        // S = 5: index 0 shifts +2
        let out = circular_convolution(&one_hot(7, 6), &[1.0, 0.0, 0.0, 0.0, 0.0], 1, 7, 5);
        assert_eq!(out, one_hot(7, 1));
    }

    #[test]
    fn test_per_batch_kernels() {
        let mut att = one_hot(4, 1);
        att.extend(one_hot(4, 1));
        let kernel = [1.0, 0.0, 0.0, /* b1 */ 0.0, 0.0, 1.0f32];
        let out = circular_convolution(&att, &kernel, 2, 4, 3);
        assert_eq!(&out[..4], one_hot(4, 2).as_slice());
        assert_eq!(&out[4..], one_hot(4, 0).as_slice());
    }

    #[test]
    fn test_soft_kernel_preserves_simplex() {
        let att = [0.1, 0.2, 0.3, 0.4f32];
        let out = circular_convolution(&att, &[0.2, 0.5, 0.3], 1, 4, 3);
        assert_simplex(&out, 1, 4);
    }

    // ── Sharpening ───────────────────────────────────────────────────

    #[test]
    fn test_sharpen_gamma_one_renormalizes() {
        let att = [0.1, 0.2, 0.3, 0.4f32];
        let out = sharpen(&att, &[1.0], 1, 4);
        for (o, a) in out.iter().zip(&att) {
            assert!((o - a).abs() < 1e-6);
        }
    }

    #[test]
    fn test_sharpen_increasing_gamma_increases_peak() {
        let att = [0.1, 0.2, 0.3, 0.4f32];
        let mut prev_max = 0.4f32;
        for gamma in [1.5f32, 2.0, 4.0, 10.0] {
            let out = sharpen(&att, &[gamma], 1, 4);
            assert_simplex(&out, 1, 4);
            let m = out.iter().copied().fold(0.0f32, f32::max);
            assert!(m > prev_max, "gamma={gamma}: {m} <= {prev_max}");
            prev_max = m;
        }
    }

    #[test]
    fn test_sharpen_huge_gamma_no_underflow() {
        let att = vec![1.0f32 / 128.0; 128];
        let out = sharpen(&att, &[60.0], 1, 128);
        assert_simplex(&out, 1, 128);
    }

    #[test]
    fn test_sharpen_zero_row_falls_back_to_uniform() {
        let out = sharpen(&[0.0; 4], &[3.0], 1, 4);
        assert_eq!(out, vec![0.25; 4]);
    }

    // ── Full pipeline ────────────────────────────────────────────────

    #[test]
    fn test_update_attention_on_simplex() {
        let mut rng = crate::tensor::SimpleRng::new(9);
        let (batch, addresses, content, shift) = (3, 8, 5, 3);
        let mut memory = vec![0.0f32; batch * addresses * content];
        rng.fill_uniform(&mut memory, 1.0);
        let mut raw = vec![0.0f32; batch * (content + 3 + shift)];
        rng.fill_uniform(&mut raw, 2.0);
        let params = AddressingParams::from_raw(
            &raw[..batch * content],
            &raw[batch * content..batch * content + batch],
            &raw[batch * (content + 1)..batch * (content + 2)],
            &raw[batch * (content + 2)..batch * (content + 2 + shift)],
            &raw[batch * (content + 2 + shift)..],
            batch,
            shift,
        );
        assert!(params.beta.iter().all(|&b| b >= 1.0));
        assert!(params.gamma.iter().all(|&g| g >= 1.0));
        let prev = vec![1.0 / addresses as f32; batch * addresses];
        let att = update_attention(&params, &memory, &prev, batch, addresses, content);
        assert_simplex(&att, batch, addresses);
    }
}
