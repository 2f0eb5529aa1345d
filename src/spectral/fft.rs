//! DFT operators: 1D complex and real-input, 2D, and an explicit radix-2
//! butterfly.
//!
//! The real-input kind keeps only the non-negative frequencies
//! (`n/2 + 1` rows for even `n`, `(n + 1)/2` for odd); its adjoint
//! zero-pads the truncated spectrum back to length `n` before the
//! unnormalized inverse, which is the exact conjugate transpose of the
//! row-truncated DFT matrix.

use ndarray::{Array2, ArrayView2, Axis};
use num_complex::Complex64;
use std::f64::consts::PI;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::op::{zeros, DType, LinOp};
use crate::spectral::{is_power_of_two, Dft, FftNorm};

/// Input kind of the 1D DFT operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FftKind {
    /// Full complex DFT, shape `(n, n)`.
    #[default]
    Complex,
    /// Real-input DFT: only the non-negative frequency rows are kept.
    Real,
}

/// DFT operator of size `n`.
///
/// Batched: applies per column to 2D input.
pub fn fft(n: usize, kind: FftKind, norm: FftNorm) -> Result<LinOp> {
    if n == 0 {
        return Err(Error::InvalidArgument {
            arg: "n",
            reason: "got 0, expected a strictly positive transform size".to_string(),
        });
    }
    let rows = match kind {
        FftKind::Complex => n,
        FftKind::Real => {
            if n % 2 == 0 {
                n / 2 + 1
            } else {
                n.div_ceil(2)
            }
        }
    };
    let scale = norm.forward_scale(n);
    let plans = Dft::new(n);
    let plans_adj = Arc::clone(&plans);

    let forward = move |x: ArrayView2<Complex64>| {
        let mut out = zeros(rows, x.ncols());
        for (ci, col) in x.axis_iter(Axis(1)).enumerate() {
            let spec = plans.dft(col.to_vec().as_slice());
            for (i, v) in spec.iter().take(rows).enumerate() {
                out[[i, ci]] = *v * scale;
            }
        }
        Ok(out)
    };
    let adjoint = move |x: ArrayView2<Complex64>| {
        let mut out = zeros(n, x.ncols());
        for (ci, col) in x.axis_iter(Axis(1)).enumerate() {
            let mut buf = vec![Complex64::new(0.0, 0.0); n];
            for (i, v) in col.iter().enumerate() {
                buf[i] = *v;
            }
            plans_adj.inv.process(&mut buf);
            for (i, v) in buf.iter().enumerate() {
                out[[i, ci]] = *v * scale;
            }
        }
        Ok(out)
    };
    Ok(LinOp::new(rows, n, DType::Complex, forward, adjoint))
}

/// 2D DFT operator on a flattened `(rows, cols)` image.
///
/// Row transforms followed by column transforms; forward/adjoint follow
/// the same convention as [`fft`] with `N = rows * cols`.
pub fn fft2(shape: (usize, usize), norm: FftNorm) -> Result<LinOp> {
    let (r, c) = shape;
    if r == 0 || c == 0 {
        return Err(Error::InvalidArgument {
            arg: "shape",
            reason: format!("got {shape:?}, expected strictly positive dimensions"),
        });
    }
    let size = r * c;
    let scale = norm.forward_scale(size);
    let row_plans = Dft::new(c);
    let col_plans = Dft::new(r);
    let (rp_adj, cp_adj) = (Arc::clone(&row_plans), Arc::clone(&col_plans));

    fn transform_2d(
        data: &mut [Complex64],
        r: usize,
        c: usize,
        row: &Dft,
        col: &Dft,
        inverse: bool,
        scale: f64,
    ) {
        for chunk in data.chunks_mut(c) {
            if inverse {
                row.inv.process(chunk);
            } else {
                row.fwd.process(chunk);
            }
        }
        let mut scratch = vec![Complex64::new(0.0, 0.0); r];
        for j in 0..c {
            for i in 0..r {
                scratch[i] = data[i * c + j];
            }
            if inverse {
                col.inv.process(&mut scratch);
            } else {
                col.fwd.process(&mut scratch);
            }
            for i in 0..r {
                data[i * c + j] = scratch[i] * scale;
            }
        }
    }

    let forward = move |x: ArrayView2<Complex64>| {
        let mut out = zeros(size, x.ncols());
        for (ci, col) in x.axis_iter(Axis(1)).enumerate() {
            let mut data = col.to_vec();
            transform_2d(&mut data, r, c, &row_plans, &col_plans, false, scale);
            for (i, v) in data.iter().enumerate() {
                out[[i, ci]] = *v;
            }
        }
        Ok(out)
    };
    let adjoint = move |x: ArrayView2<Complex64>| {
        let mut out = zeros(size, x.ncols());
        for (ci, col) in x.axis_iter(Axis(1)).enumerate() {
            let mut data = col.to_vec();
            transform_2d(&mut data, r, c, &rp_adj, &cp_adj, true, scale);
            for (i, v) in data.iter().enumerate() {
                out[[i, ci]] = *v;
            }
        }
        Ok(out)
    };
    Ok(LinOp::new(size, size, DType::Complex, forward, adjoint))
}

/// DFT of a power-of-two size through an explicit iterative radix-2
/// butterfly (bit-reversal permutation plus `log2 n` stages).
///
/// Numerically equal to `fft(n, FftKind::Complex, FftNorm::Backward)`;
/// kept as an independently-implemented reference transform.
pub fn fft_radix2(n: usize) -> Result<LinOp> {
    if !is_power_of_two(n) {
        return Err(Error::InvalidArgument {
            arg: "n",
            reason: format!("got {n}, expected a power of two"),
        });
    }

    fn butterfly(buf: &mut [Complex64], sign: f64) {
        let n = buf.len();
        if n < 2 {
            return;
        }
        // Bit-reversal permutation.
        let mut j = 0usize;
        for i in 1..n {
            let mut bit = n >> 1;
            while j & bit != 0 {
                j ^= bit;
                bit >>= 1;
            }
            j |= bit;
            if i < j {
                buf.swap(i, j);
            }
        }
        let mut len = 2;
        while len <= n {
            let ang = sign * 2.0 * PI / len as f64;
            let wlen = Complex64::new(ang.cos(), ang.sin());
            for start in (0..n).step_by(len) {
                let mut w = Complex64::new(1.0, 0.0);
                for k in start..start + len / 2 {
                    let u = buf[k];
                    let v = buf[k + len / 2] * w;
                    buf[k] = u + v;
                    buf[k + len / 2] = u - v;
                    w *= wlen;
                }
            }
            len <<= 1;
        }
    }

    fn per_column(x: ArrayView2<Complex64>, n: usize, sign: f64) -> Result<Array2<Complex64>> {
        let mut out = zeros(n, x.ncols());
        for (ci, col) in x.axis_iter(Axis(1)).enumerate() {
            let mut buf = col.to_vec();
            butterfly(&mut buf, sign);
            for (i, v) in buf.iter().enumerate() {
                out[[i, ci]] = *v;
            }
        }
        Ok(out)
    }
    Ok(LinOp::new(
        n,
        n,
        DType::Complex,
        move |x| per_column(x, n, -1.0),
        move |x| per_column(x, n, 1.0),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::testutil::{assert_adjoint_duality, assert_all_close, test_batch};
    use crate::op::to_complex;
    use ndarray::ArrayView1;

    #[test]
    fn test_fft_impulse_is_flat() {
        let op = fft(4, FftKind::Complex, FftNorm::Backward).unwrap();
        let x = to_complex(&[1.0, 0.0, 0.0, 0.0]);
        let y = op.apply_vec(ArrayView1::from(&x[..])).unwrap();
        assert_all_close(&y.to_vec(), &to_complex(&[1.0, 1.0, 1.0, 1.0]), 1e-12);
    }

    #[test]
    fn test_fft_roundtrip_backward_scales_by_n() {
        let op = fft(8, FftKind::Complex, FftNorm::Backward).unwrap();
        let x = test_batch(8, 2, true, 3);
        let y = op.apply(x.view()).unwrap();
        let back = op.apply_adjoint(y.view()).unwrap();
        for (b, x0) in back.iter().zip(x.iter()) {
            assert!((b - *x0 * 8.0).norm() < 1e-10);
        }
    }

    #[test]
    fn test_fft_roundtrip_ortho_is_identity() {
        let op = fft(8, FftKind::Complex, FftNorm::Ortho).unwrap();
        let x = test_batch(8, 1, true, 5);
        let y = op.apply(x.view()).unwrap();
        let back = op.apply_adjoint(y.view()).unwrap();
        for (b, x0) in back.iter().zip(x.iter()) {
            assert!((b - x0).norm() < 1e-12);
        }
    }

    #[test]
    fn test_real_fft_row_counts() {
        assert_eq!(fft(8, FftKind::Real, FftNorm::Backward).unwrap().rows(), 5);
        assert_eq!(fft(7, FftKind::Real, FftNorm::Backward).unwrap().rows(), 4);
    }

    #[test]
    fn test_real_fft_matches_complex_prefix() {
        let full = fft(8, FftKind::Complex, FftNorm::Backward).unwrap();
        let real = fft(8, FftKind::Real, FftNorm::Backward).unwrap();
        let x = test_batch(8, 1, false, 9);
        let yf = full.apply(x.view()).unwrap();
        let yr = real.apply(x.view()).unwrap();
        for i in 0..5 {
            assert!((yf[[i, 0]] - yr[[i, 0]]).norm() < 1e-12);
        }
        assert_adjoint_duality(&real, 1e-10);
    }

    #[test]
    fn test_fft2_matches_direct_dft_2x2() {
        let op = fft2((2, 2), FftNorm::Backward).unwrap();
        // [[a, b], [c, d]] -> [[a+b+c+d, a-b+c-d], [a+b-c-d, a-b-c+d]]
        let x = to_complex(&[1.0, 2.0, 3.0, 4.0]);
        let y = op.apply_vec(ArrayView1::from(&x[..])).unwrap();
        assert_all_close(
            &y.to_vec(),
            &to_complex(&[10.0, -2.0, -4.0, 0.0]),
            1e-12,
        );
        assert_adjoint_duality(&op, 1e-10);
    }

    #[test]
    fn test_fft2_ortho_roundtrip() {
        let op = fft2((4, 3), FftNorm::Ortho).unwrap();
        let x = test_batch(12, 2, true, 4);
        let y = op.apply(x.view()).unwrap();
        let back = op.apply_adjoint(y.view()).unwrap();
        for (b, x0) in back.iter().zip(x.iter()) {
            assert!((b - x0).norm() < 1e-10);
        }
    }

    #[test]
    fn test_radix2_matches_fft() {
        let reference = fft(16, FftKind::Complex, FftNorm::Backward).unwrap();
        let radix = fft_radix2(16).unwrap();
        let x = test_batch(16, 3, true, 6);
        let yr = reference.apply(x.view()).unwrap();
        let yb = radix.apply(x.view()).unwrap();
        for (a, b) in yr.iter().zip(yb.iter()) {
            assert!((a - b).norm() < 1e-9);
        }
        assert_adjoint_duality(&radix, 1e-10);
    }

    #[test]
    fn test_radix2_rejects_non_power_of_two() {
        assert!(fft_radix2(12).is_err());
    }

    #[test]
    fn test_fft_rejects_zero_size() {
        assert!(fft(0, FftKind::Complex, FftNorm::Backward).is_err());
        assert!(fft2((0, 4), FftNorm::Backward).is_err());
    }
}
