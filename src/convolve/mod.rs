//! 1D and 2D convolution operators with interchangeable backends.
//!
//! The backend is a performance/precision tradeoff, never a semantic one:
//! for a given `(signal length, kernel, mode)` every method produces
//! numerically equivalent output.
//!
//! ```text
//! convolve(n, kernel, mode, method):
//!
//! 1. Output length by mode:
//!    - full:  n + k - 1
//!    - valid: n - k + 1   (requires k <= n)
//!    - same:  n
//!    - circ:  n           (circular convolution)
//!
//! 2. Resolve the backend once at construction:
//!    - direct:      nested-loop accumulation, parallelized
//!    - toeplitz:    lazy Toeplitz matrix, circulant embedding
//!    - fft:         full-length spectral multiplication
//!    - overlap-add: blocked spectral convolution
//!    - circulant:   spectral or modular-index circular convolution
//!
//! 3. Extract the mode's centered window from the full result.
//! ```
//!
//! Real kernels make real operators: when the incoming batch is exactly
//! real, residual imaginary parts from spectral round trips are discarded
//! at the end of every computation path, not just at entry.

use ndarray::{Array2, ArrayView2, Axis};
use num_complex::Complex64;
use num_traits::Zero;
use rayon::prelude::*;

use crate::config::ExecPolicy;
use crate::error::{Error, Result};
use crate::op::{to_complex, zeros, DType, LinOp};

mod circulant;
mod conv2d;
mod direct;
mod dsconvolve;
mod overlap_add;
mod recovery;
mod toeplitz;

pub use circulant::circulant;
pub use conv2d::{convolve2d, convolve2d_apply, convolve2d_complex, Conv2dBoundary, Conv2dMethod};
pub use dsconvolve::{dsconvolve, dsconvolve_complex};
pub use overlap_add::oaconvolve;
pub use toeplitz::toeplitz;

/// Convolution output mode.
///
/// Determines the size and alignment of the output window relative to the
/// full convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConvMode {
    /// Full convolution, length `n + k - 1`.
    #[default]
    Full,
    /// Centered output that does not depend on zero padding, length
    /// `n - k + 1`. Requires the kernel not to exceed the signal.
    Valid,
    /// Centered output with the signal's length.
    Same,
    /// Circular convolution, length `n`.
    Circ,
}

impl ConvMode {
    /// Output length for a signal of length `s` and kernel of length `k`.
    ///
    /// `Valid` assumes `k <= s`; constructors validate this before sizing.
    pub fn output_len(self, s: usize, k: usize) -> usize {
        match self {
            ConvMode::Full => s + k - 1,
            ConvMode::Valid => s + 1 - k,
            ConvMode::Same => s,
            ConvMode::Circ => s,
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            ConvMode::Full => "full",
            ConvMode::Valid => "valid",
            ConvMode::Same => "same",
            ConvMode::Circ => "circ",
        }
    }
}

/// Convolution backend, resolved once at operator construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConvMethod {
    /// Pick a backend from the kernel and signal lengths.
    #[default]
    Auto,
    /// Nested-loop accumulation; parallelized over batch columns and
    /// output ranges past the work threshold.
    Direct,
    /// Lazy Toeplitz application through circulant embedding.
    Toeplitz,
    /// Single full-length spectral multiplication.
    Fft,
    /// Blocked spectral convolution with overlap-add reassembly.
    OverlapAdd,
    /// Circular convolution; only valid with [`ConvMode::Circ`].
    Circulant,
}

/// Convolution operator for real kernels.
///
/// Returns the `(output length, n)` operator for the given mode; see the
/// module docs for the mode/method contract.
pub fn convolve(n: usize, kernel: &[f64], mode: ConvMode, method: ConvMethod) -> Result<LinOp> {
    build(n, &to_complex(kernel), mode, method, &ExecPolicy::default())
}

/// Convolution operator for complex kernels.
pub fn convolve_complex(
    n: usize,
    kernel: &[Complex64],
    mode: ConvMode,
    method: ConvMethod,
) -> Result<LinOp> {
    build(n, kernel, mode, method, &ExecPolicy::default())
}

/// Convolution operator with an explicit execution policy for the
/// parallel kernels.
pub fn convolve_with(
    n: usize,
    kernel: &[Complex64],
    mode: ConvMode,
    method: ConvMethod,
    policy: &ExecPolicy,
) -> Result<LinOp> {
    build(n, kernel, mode, method, policy)
}

/// Convolve real data directly: builds the operator for `signal.len()`
/// and applies it.
pub fn convolve_apply(
    signal: &[f64],
    kernel: &[f64],
    mode: ConvMode,
    method: ConvMethod,
) -> Result<Vec<f64>> {
    let op = convolve(signal.len(), kernel, mode, method)?;
    let x = to_complex(signal);
    let y = op.apply_vec(ndarray::ArrayView1::from(&x[..]))?;
    Ok(y.iter().map(|v| v.re).collect())
}

fn build(
    n: usize,
    kernel: &[Complex64],
    mode: ConvMode,
    method: ConvMethod,
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
    let k = kernel.len();
    if mode == ConvMode::Circ
        && !matches!(
            method,
            ConvMethod::Auto | ConvMethod::Direct | ConvMethod::Circulant
        )
    {
        return Err(Error::InvalidArgument {
            arg: "method",
            reason: format!(
                "{method:?} is not available in circ mode; expected Auto, Direct or Circulant"
            ),
        });
    }
    if mode != ConvMode::Circ && method == ConvMethod::Circulant {
        return Err(Error::InvalidArgument {
            arg: "method",
            reason: format!("Circulant works only with circ mode, got mode {:?}", mode),
        });
    }
    if mode == ConvMode::Valid && k > n {
        return Err(Error::ShapeMismatch {
            op: "convolve",
            details: format!("kernel length {k} exceeds signal length {n} in valid mode"),
        });
    }

    if mode == ConvMode::Circ {
        let spectral = method != ConvMethod::Direct;
        log::debug!(
            "convolve: circ mode, {} backend",
            if spectral { "spectral" } else { "direct" }
        );
        let inner = circulant::circ_conv_op(n, kernel, spectral)?;
        return Ok(coerce_real(inner, DType::of_slice(kernel)));
    }

    // Short kernels beat the spectral paths; the crossover tracks ln(n).
    let resolved = match method {
        ConvMethod::Auto => {
            if (k as f64) < (n as f64).ln() {
                ConvMethod::Direct
            } else {
                ConvMethod::Fft
            }
        }
        other => other,
    };
    log::debug!(
        "convolve: n={n}, k={k}, mode={}, backend={resolved:?}",
        mode.name()
    );
    let inner = match resolved {
        ConvMethod::Direct => direct::direct_op(n, kernel, mode, policy)?,
        ConvMethod::Toeplitz => toeplitz::toeplitz_conv_op(n, kernel, mode)?,
        ConvMethod::Fft => overlap_add::fft_conv_op(n, kernel, mode)?,
        ConvMethod::OverlapAdd => overlap_add::oa_conv_op(n, kernel, mode, None)?,
        ConvMethod::Auto | ConvMethod::Circulant => unreachable!("resolved above"),
    };
    let inner = match resolved {
        ConvMethod::Fft | ConvMethod::OverlapAdd => {
            recovery::with_recovery(inner, kernel.to_vec(), mode, n)
        }
        _ => inner,
    };
    Ok(coerce_real(inner, DType::of_slice(kernel)))
}

/// Discard imaginary round-trip residue when both the kernel and the
/// incoming batch are real. Complex kernels pass through untouched.
pub(crate) fn coerce_real(inner: LinOp, kernel_dtype: DType) -> LinOp {
    if kernel_dtype == DType::Complex {
        return inner;
    }
    let (fwd, adj) = (inner.clone(), inner.clone());
    LinOp::new(
        inner.rows(),
        inner.cols(),
        DType::Real,
        move |x| {
            let real_in = x.iter().all(|v| v.im == 0.0);
            let y = fwd.apply(x)?;
            Ok(if real_in {
                y.mapv_into(|v| Complex64::new(v.re, 0.0))
            } else {
                y
            })
        },
        move |x| {
            let real_in = x.iter().all(|v| v.im == 0.0);
            let y = adj.apply_adjoint(x)?;
            Ok(if real_in {
                y.mapv_into(|v| Complex64::new(v.re, 0.0))
            } else {
                y
            })
        },
    )
}

/// Drive a slice-level kernel over a batch.
///
/// Parallelizes over batch columns when the whole batch clears the policy
/// threshold, or over output ranges of a single column; the callback
/// receives `(input column, output chunk, chunk offset)` and both paths
/// accumulate in the same per-sample order, so results are identical.
pub(crate) fn batched_kernel<F>(
    x: ArrayView2<Complex64>,
    out_len: usize,
    col_work: usize,
    policy: &ExecPolicy,
    f: F,
) -> Array2<Complex64>
where
    F: Fn(&[Complex64], &mut [Complex64], usize) + Sync,
{
    let bsz = x.ncols();
    let ins: Vec<Vec<Complex64>> = x.axis_iter(Axis(1)).map(|c| c.to_vec()).collect();
    let outs: Vec<Vec<Complex64>> = if bsz > 1
        && policy.should_parallelize(col_work.saturating_mul(bsz))
    {
        ins.par_iter()
            .map(|xc| {
                let mut y = vec![Complex64::zero(); out_len];
                f(xc, &mut y, 0);
                y
            })
            .collect()
    } else {
        ins.iter()
            .map(|xc| {
                let mut y = vec![Complex64::zero(); out_len];
                if out_len > 1 && policy.should_parallelize(col_work) {
                    let chunk = out_len.div_ceil(rayon::current_num_threads().max(1));
                    y.par_chunks_mut(chunk)
                        .enumerate()
                        .for_each(|(i, ch)| f(xc, ch, i * chunk));
                } else {
                    f(xc, &mut y, 0);
                }
                y
            })
            .collect()
    };
    let mut out = zeros(out_len, bsz);
    for (ci, yc) in outs.iter().enumerate() {
        for (i, v) in yc.iter().enumerate() {
            out[[i, ci]] = *v;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::testutil::{assert_adjoint_duality, assert_all_close};
    use ndarray::ArrayView1;

    fn apply_real(op: &LinOp, x: &[f64]) -> Vec<Complex64> {
        let xc = to_complex(x);
        op.apply_vec(ArrayView1::from(&xc[..])).unwrap().to_vec()
    }

    const METHODS: [ConvMethod; 4] = [
        ConvMethod::Direct,
        ConvMethod::Toeplitz,
        ConvMethod::Fft,
        ConvMethod::OverlapAdd,
    ];

    #[test]
    fn test_direct_full_literal() {
        let op = convolve(5, &[1.0, 0.0, -1.0], ConvMode::Full, ConvMethod::Direct).unwrap();
        assert_eq!(op.shape(), (7, 5));
        let y = apply_real(&op, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        let want = to_complex(&[1.0, 2.0, 2.0, 2.0, 2.0, -4.0, -5.0]);
        assert_all_close(&y, &want, 1e-12);
    }

    #[test]
    fn test_valid_literal() {
        let op = convolve(5, &[1.0, 1.0, 1.0], ConvMode::Valid, ConvMethod::Direct).unwrap();
        assert_eq!(op.shape(), (3, 5));
        let y = apply_real(&op, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_all_close(&y, &to_complex(&[6.0, 9.0, 12.0]), 1e-12);
    }

    #[test]
    fn test_backend_equivalence() {
        // Odd/even signal lengths, kernel lengths 1, typical, equal-to-signal.
        for &s in &[8usize, 9, 16] {
            for &k in &[1usize, 3, 4, s] {
                let kernel: Vec<f64> = (0..k).map(|i| (i as f64 * 0.7).sin() + 0.5).collect();
                let signal: Vec<f64> =
                    (0..s).map(|i| (i as f64 * 1.3).cos() * 2.0 - 0.3).collect();
                for &mode in &[ConvMode::Full, ConvMode::Valid, ConvMode::Same] {
                    let reference = convolve_apply(&signal, &kernel, mode, ConvMethod::Direct)
                        .unwrap();
                    for method in METHODS {
                        if method == ConvMethod::OverlapAdd && k > s {
                            continue;
                        }
                        let got = convolve_apply(&signal, &kernel, mode, method).unwrap();
                        assert_eq!(got.len(), reference.len(), "{mode:?}/{method:?}");
                        for (g, r) in got.iter().zip(reference.iter()) {
                            assert!(
                                (g - r).abs() < 1e-9,
                                "s={s} k={k} {mode:?}/{method:?}: {g} vs {r}"
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_circ_backends_agree() {
        let signal = [1.0, 2.0, 3.0, 4.0];
        let want = [
            1.0 * 1.0 + 1.0 * 4.0,
            2.0 + 1.0,
            3.0 + 2.0,
            4.0 + 3.0,
        ];
        for method in [ConvMethod::Auto, ConvMethod::Direct, ConvMethod::Circulant] {
            let got = convolve_apply(&signal, &[1.0, 1.0], ConvMode::Circ, method).unwrap();
            for (g, w) in got.iter().zip(want.iter()) {
                assert!((g - w).abs() < 1e-10, "{method:?}");
            }
        }
    }

    #[test]
    fn test_circ_kernel_longer_than_signal() {
        // The signal is zero-extended to the kernel length and the output
        // truncated back.
        let got = convolve_apply(&[1.0, 2.0], &[1.0, 0.0, 1.0], ConvMode::Circ, ConvMethod::Auto)
            .unwrap();
        // Generator length 3: y[i] = x[i] + x[(i - 2) mod 3] over the padded
        // signal [1, 2, 0], truncated to the first two samples.
        assert!((got[0] - 3.0).abs() < 1e-10);
        assert!((got[1] - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_mode_method_validation() {
        assert!(convolve(8, &[1.0, 2.0], ConvMode::Circ, ConvMethod::Fft).is_err());
        assert!(convolve(8, &[1.0, 2.0], ConvMode::Circ, ConvMethod::Toeplitz).is_err());
        assert!(convolve(8, &[1.0, 2.0], ConvMode::Same, ConvMethod::Circulant).is_err());
        assert!(convolve(3, &[1.0; 4], ConvMode::Valid, ConvMethod::Direct).is_err());
        assert!(convolve(0, &[1.0], ConvMode::Full, ConvMethod::Direct).is_err());
        assert!(convolve(4, &[], ConvMode::Full, ConvMethod::Direct).is_err());
    }

    #[test]
    fn test_adjoint_duality_per_backend() {
        let kernel = [0.5, -1.0, 2.0, 0.25];
        for &mode in &[ConvMode::Full, ConvMode::Valid, ConvMode::Same] {
            for method in METHODS {
                let op = convolve(12, &kernel, mode, method).unwrap();
                assert_adjoint_duality(&op, 1e-9);
            }
        }
        let op = convolve(12, &kernel, ConvMode::Circ, ConvMethod::Auto).unwrap();
        assert_adjoint_duality(&op, 1e-9);
    }

    #[test]
    fn test_complex_kernel_adjoint_duality() {
        let kernel = [
            Complex64::new(1.0, 0.5),
            Complex64::new(-0.25, 1.0),
            Complex64::new(0.0, -2.0),
        ];
        for method in [ConvMethod::Direct, ConvMethod::Toeplitz, ConvMethod::Fft] {
            let op = convolve_complex(10, &kernel, ConvMode::Same, method).unwrap();
            assert_eq!(op.dtype(), DType::Complex);
            assert_adjoint_duality(&op, 1e-9);
        }
    }

    #[test]
    fn test_real_coercion_kills_spectral_residue() {
        let op = convolve(16, &[0.3, -0.6, 0.9], ConvMode::Same, ConvMethod::Fft).unwrap();
        assert_eq!(op.dtype(), DType::Real);
        let y = apply_real(&op, &(0..16).map(|i| i as f64).collect::<Vec<_>>());
        for v in &y {
            assert_eq!(v.im, 0.0);
        }
    }

    #[test]
    fn test_complex_input_is_not_coerced() {
        let op = convolve(8, &[1.0, 1.0], ConvMode::Same, ConvMethod::Direct).unwrap();
        let x: Vec<Complex64> = (0..8).map(|i| Complex64::new(0.0, i as f64)).collect();
        let y = op.apply_vec(ArrayView1::from(&x[..])).unwrap();
        assert!(y.iter().any(|v| v.im != 0.0));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let kernel: Vec<f64> = (0..9).map(|i| (i as f64).sin()).collect();
        let signal: Vec<f64> = (0..4096).map(|i| (i as f64 * 0.01).cos()).collect();
        let k = to_complex(&kernel);
        let eager = convolve_with(
            signal.len(),
            &k,
            ConvMode::Same,
            ConvMethod::Direct,
            &ExecPolicy { min_parallel_work: 1 },
        )
        .unwrap();
        let lazy = convolve_with(
            signal.len(),
            &k,
            ConvMode::Same,
            ConvMethod::Direct,
            &ExecPolicy::SEQUENTIAL,
        )
        .unwrap();
        let x = to_complex(&signal);
        let yp = eager.apply_vec(ArrayView1::from(&x[..])).unwrap();
        let ys = lazy.apply_vec(ArrayView1::from(&x[..])).unwrap();
        for (a, b) in yp.iter().zip(ys.iter()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_batched_columns_independent() {
        let op = convolve(6, &[1.0, 2.0], ConvMode::Full, ConvMethod::Direct).unwrap();
        let mut x = Array2::from_elem((6, 2), Complex64::zero());
        for i in 0..6 {
            x[[i, 0]] = Complex64::new(i as f64, 0.0);
            x[[i, 1]] = Complex64::new((5 - i) as f64, 0.0);
        }
        let y = op.apply(x.view()).unwrap();
        let y0 = op.apply_vec(x.column(0)).unwrap();
        let y1 = op.apply_vec(x.column(1)).unwrap();
        for i in 0..7 {
            assert_eq!(y[[i, 0]], y0[i]);
            assert_eq!(y[[i, 1]], y1[i]);
        }
    }
}
