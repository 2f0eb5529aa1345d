//! Convolution fused with regular down-sampling.
//!
//! Only every `every`-th output sample (starting at `offset`) is ever
//! computed or stored, so the operator does strictly less work than
//! convolving and then decimating. The multiresolution transforms feed on
//! exactly this decimated output.
//!
//! Equivalence contract (tested): `dsconvolve(n, k, mode, o, 2)` applied
//! to `x` equals `convolve(n, k, mode) @ x` restricted to samples
//! `o, o + 2, o + 4, ...`.

use num_complex::Complex64;
use num_traits::Zero;

use crate::config::ExecPolicy;
use crate::convolve::{batched_kernel, coerce_real, ConvMode};
use crate::error::{Error, Result};
use crate::op::{to_complex, DType, LinOp};

/// Decimated forward samples `y[t0 + t] = (k * x)[start + (t0 + t) * every]`.
fn dsconv_range(
    kernel: &[Complex64],
    x: &[Complex64],
    y: &mut [Complex64],
    start: usize,
    every: usize,
    t0: usize,
) {
    let s = x.len();
    let k = kernel.len();
    for (t, yt) in y.iter_mut().enumerate() {
        let g = start + (t0 + t) * every;
        let jmax = k.min(g + 1);
        let jmin = if g >= s { g - s + 1 } else { 0 };
        let mut acc = Complex64::zero();
        for j in jmin..jmax {
            acc += kernel[j] * x[g - j];
        }
        *yt = acc;
    }
}

/// Adjoint samples `y[m0 + m] = sum(conj(kernel[g_t - m]) * x[t], t)`
/// over the decimated rows `g_t = start + t * every` that touch `m`.
fn dsadj_range(
    kernel: &[Complex64],
    x: &[Complex64],
    y: &mut [Complex64],
    start: usize,
    every: usize,
    kept: usize,
    m0: usize,
) {
    let k = kernel.len();
    for (m, ym) in y.iter_mut().enumerate() {
        let gm = m0 + m;
        let first = if gm > start {
            (gm - start).div_ceil(every)
        } else {
            0
        };
        let mut acc = Complex64::zero();
        for t in first..kept {
            let g = start + t * every;
            if g >= gm + k {
                break;
            }
            acc += kernel[g - gm].conj() * x[t];
        }
        *ym = acc;
    }
}

/// Down-sampling convolution operator for real kernels.
///
/// `offset` is the first kept output sample (0 or 1); `every` the keep
/// stride (1 or 2). Modes are `Full`, `Valid` and `Same`.
pub fn dsconvolve(
    n: usize,
    kernel: &[f64],
    mode: ConvMode,
    offset: usize,
    every: usize,
) -> Result<LinOp> {
    build(n, &to_complex(kernel), mode, offset, every, &ExecPolicy::default())
}

/// Down-sampling convolution operator for complex kernels.
pub fn dsconvolve_complex(
    n: usize,
    kernel: &[Complex64],
    mode: ConvMode,
    offset: usize,
    every: usize,
) -> Result<LinOp> {
    build(n, kernel, mode, offset, every, &ExecPolicy::default())
}

fn build(
    n: usize,
    kernel: &[Complex64],
    mode: ConvMode,
    offset: usize,
    every: usize,
    policy: &ExecPolicy,
) -> Result<LinOp> {
    if n == 0 {
        return Err(Error::InvalidArgument {
            arg: "n",
            reason: "got 0, expected a strictly positive signal length".to_string(),
        });
    }
    if kernel.is_empty() {
        return Err(Error::InvalidArgument {
            arg: "kernel",
            reason: "got an empty kernel, expected at least one tap".to_string(),
        });
    }
    if mode == ConvMode::Circ {
        return Err(Error::InvalidArgument {
            arg: "mode",
            reason: "got circ, expected full, valid or same".to_string(),
        });
    }
    if offset > 1 {
        return Err(Error::InvalidArgument {
            arg: "offset",
            reason: format!("got {offset}, expected 0 or 1"),
        });
    }
    if every == 0 || every > 2 {
        return Err(Error::InvalidArgument {
            arg: "every",
            reason: format!("got {every}, expected 1 or 2"),
        });
    }
    let k = kernel.len();
    if mode == ConvMode::Valid && k > n {
        return Err(Error::ShapeMismatch {
            op: "dsconvolve",
            details: format!("kernel length {k} exceeds signal length {n} in valid mode"),
        });
    }
    let out = mode.output_len(n, k);
    if out <= offset {
        return Err(Error::InvalidArgument {
            arg: "offset",
            reason: format!("got {offset}, expected less than the output length {out}"),
        });
    }
    let full = n + k - 1;
    let start = (full - out) / 2 + offset;
    let kept = (out - offset).div_ceil(every);

    let dtype = DType::of_slice(kernel);
    let kf = kernel.to_vec();
    let ka = kernel.to_vec();
    let (pf, pa) = (*policy, *policy);
    let inner = LinOp::new(
        kept,
        n,
        dtype,
        move |x| {
            Ok(batched_kernel(x, kept, kept * kf.len(), &pf, |xc, ych, off| {
                dsconv_range(&kf, xc, ych, start, every, off)
            }))
        },
        move |x| {
            Ok(batched_kernel(x, n, n * ka.len(), &pa, |xc, ych, off| {
                dsadj_range(&ka, xc, ych, start, every, kept, off)
            }))
        },
    );
    Ok(coerce_real(inner, dtype))
}
