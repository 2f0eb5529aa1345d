//! Degraded-quality recovery for the spectral convolution paths.
//!
//! A spectral backend can return non-finite samples when a transform
//! overflows on extreme inputs. One bad chunk must not invalidate an
//! entire large-signal transform, so the wrapper scans each output
//! column, isolates failing sub-ranges with an explicit bisection work
//! stack (depth bounded by `log2(len) + 4`), and recomputes just those
//! ranges with the direct kernel. A failure that survives recomputation
//! is reported as a hard numerical error naming the sample range.

use ndarray::ArrayView2;
use num_complex::Complex64;

use crate::convolve::direct::{adj_range, conv_range};
use crate::convolve::ConvMode;
use crate::error::{Error, Result};
use crate::op::LinOp;

const LEAF: usize = 16;

fn log2_ceil(n: usize) -> usize {
    (usize::BITS - n.max(1).leading_zeros()) as usize
}

fn finite(v: &Complex64) -> bool {
    v.re.is_finite() && v.im.is_finite()
}

/// Recompute the non-finite sub-ranges of one output column.
///
/// `recompute(lo, hi, buf)` must fill `buf` with the exact samples
/// `lo..hi` of the reference (direct) result.
fn recover_column<F>(col: &mut [Complex64], op_name: &'static str, recompute: F) -> Result<()>
where
    F: Fn(usize, usize, &mut [Complex64]),
{
    let len = col.len();
    let max_depth = log2_ceil(len) + 4;
    let mut stack = vec![(0usize, len, 0usize)];
    while let Some((lo, hi, depth)) = stack.pop() {
        if col[lo..hi].iter().all(finite) {
            continue;
        }
        if depth > max_depth {
            return Err(Error::Numerical {
                op: op_name,
                reason: format!("bisection exceeded depth {max_depth} in samples {lo}..{hi}"),
            });
        }
        if hi - lo <= LEAF {
            log::warn!("{op_name}: recomputing samples {lo}..{hi} with the direct kernel");
            let mut buf = vec![Complex64::new(0.0, 0.0); hi - lo];
            recompute(lo, hi, &mut buf);
            col[lo..hi].copy_from_slice(&buf);
            if let Some(bad) = col[lo..hi].iter().position(|v| !finite(v)) {
                return Err(Error::Numerical {
                    op: op_name,
                    reason: format!("sample {} is not finite after direct recomputation", lo + bad),
                });
            }
            continue;
        }
        let mid = lo + (hi - lo) / 2;
        stack.push((lo, mid, depth + 1));
        stack.push((mid, hi, depth + 1));
    }
    Ok(())
}

/// Wrap a spectral convolution operator with per-column finiteness
/// recovery in both directions.
pub(crate) fn with_recovery(inner: LinOp, kernel: Vec<Complex64>, mode: ConvMode, n: usize) -> LinOp {
    let k = kernel.len();
    let out = mode.output_len(n, k);
    let full = n + k - 1;
    let start = (full - out) / 2;
    let (fwd_inner, adj_inner) = (inner.clone(), inner.clone());
    let (fwd_kernel, adj_kernel) = (kernel.clone(), kernel);

    LinOp::new(
        inner.rows(),
        inner.cols(),
        inner.dtype(),
        move |x: ArrayView2<Complex64>| {
            let mut y = fwd_inner.apply(x)?;
            for ci in 0..y.ncols() {
                if y.column(ci).iter().all(finite) {
                    continue;
                }
                let xc: Vec<Complex64> = x.column(ci).to_vec();
                let mut col: Vec<Complex64> = y.column(ci).to_vec();
                recover_column(&mut col, "convolve", |lo, _hi, buf| {
                    conv_range(&fwd_kernel, &xc, buf, start, lo)
                })?;
                for (i, v) in col.iter().enumerate() {
                    y[[i, ci]] = *v;
                }
            }
            Ok(y)
        },
        move |x: ArrayView2<Complex64>| {
            let mut y = adj_inner.apply_adjoint(x)?;
            for ci in 0..y.ncols() {
                if y.column(ci).iter().all(finite) {
                    continue;
                }
                let xc: Vec<Complex64> = x.column(ci).to_vec();
                let mut col: Vec<Complex64> = y.column(ci).to_vec();
                recover_column(&mut col, "convolve adjoint", |lo, _hi, buf| {
                    adj_range(&adj_kernel, &xc, buf, start, out, lo)
                })?;
                for (i, v) in col.iter().enumerate() {
                    y[[i, ci]] = *v;
                }
            }
            Ok(y)
        },
    )
}
