//! Direct nested-loop convolution backend.
//!
//! ```text
//! y[t] = sum(kernel[j] * x[g - j], j)   with g = start + t,
//!        j restricted to 0 <= g - j < len(x)
//! ```
//!
//! The adjoint accumulates the conjugated kernel, so it is the exact
//! conjugate transpose of the forward map for complex kernels as well.
//! Both directions run through [`batched_kernel`], which parallelizes
//! over batch columns or output ranges past the work threshold.

use num_complex::Complex64;
use num_traits::Zero;

use crate::config::ExecPolicy;
use crate::convolve::{batched_kernel, ConvMode};
use crate::error::Result;
use crate::op::{DType, LinOp};

/// Accumulate forward convolution samples `y[t0..t0 + y.len()]`.
pub(crate) fn conv_range(
    kernel: &[Complex64],
    x: &[Complex64],
    y: &mut [Complex64],
    start: usize,
    t0: usize,
) {
    let s = x.len();
    let k = kernel.len();
    for (t, yt) in y.iter_mut().enumerate() {
        let g = start + t0 + t;
        let jmax = k.min(g + 1);
        let jmin = if g >= s { g - s + 1 } else { 0 };
        let mut acc = Complex64::zero();
        for j in jmin..jmax {
            acc += kernel[j] * x[g - j];
        }
        *yt = acc;
    }
}

/// Accumulate adjoint samples `y[m0..m0 + y.len()]` from an output-sized
/// input: `y[m] = sum(conj(kernel[j]) * x[m + j - start], j)` over the
/// rows that exist in the mode's window.
pub(crate) fn adj_range(
    kernel: &[Complex64],
    x: &[Complex64],
    y: &mut [Complex64],
    start: usize,
    out_len: usize,
    m0: usize,
) {
    let k = kernel.len();
    for (m, ym) in y.iter_mut().enumerate() {
        let gm = m0 + m;
        let mut acc = Complex64::zero();
        for (j, kj) in kernel.iter().enumerate().take(k) {
            let t = gm + j;
            if t >= start && t - start < out_len {
                acc += kj.conj() * x[t - start];
            }
        }
        *ym = acc;
    }
}

pub(crate) fn direct_op(
    n: usize,
    kernel: &[Complex64],
    mode: ConvMode,
    policy: &ExecPolicy,
) -> Result<LinOp> {
    let k = kernel.len();
    let out = mode.output_len(n, k);
    let full = n + k - 1;
    let start = (full - out) / 2;
    let dtype = DType::of_slice(kernel);
    let kf = kernel.to_vec();
    let ka = kernel.to_vec();
    let (pf, pa) = (*policy, *policy);
    Ok(LinOp::new(
        out,
        n,
        dtype,
        move |x| {
            Ok(batched_kernel(x, out, out * kf.len(), &pf, |xc, ych, off| {
                conv_range(&kf, xc, ych, start, off)
            }))
        },
        move |x| {
            Ok(batched_kernel(x, n, n * ka.len(), &pa, |xc, ych, off| {
                adj_range(&ka, xc, ych, start, out, off)
            }))
        },
    ))
}
