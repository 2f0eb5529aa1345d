//! Lazy Toeplitz operator and the Toeplitz convolution backend.
//!
//! A Toeplitz matrix is fully determined by its first column and first
//! row; its action embeds into a circulant of size `rows + cols - 1`,
//! which the DFT diagonalizes. The generator's spectrum is computed once
//! at construction; the adjoint multiplies by the conjugate spectrum,
//! which is exactly the embedding of the conjugate-transpose Toeplitz
//! matrix. The dense matrix is never formed.

use ndarray::{ArrayView2, Axis};
use num_complex::Complex64;
use num_traits::Zero;
use std::sync::Arc;

use crate::convolve::ConvMode;
use crate::error::{Error, Result};
use crate::op::algebra::slice_rows;
use crate::op::{zeros, DType, LinOp};
use crate::spectral::Dft;

/// Lazy Toeplitz operator from its first column and first row.
///
/// `T[i, j] = col[i - j]` below the diagonal and `row[j - i]` above it;
/// `col[0]` and `row[0]` must agree.
pub fn toeplitz(col: &[Complex64], row: &[Complex64]) -> Result<LinOp> {
    if col.is_empty() || row.is_empty() {
        return Err(Error::InvalidArgument {
            arg: "col/row",
            reason: "got an empty generator, expected at least one entry each".to_string(),
        });
    }
    if col[0] != row[0] {
        return Err(Error::InvalidArgument {
            arg: "row",
            reason: format!(
                "corner entries disagree: col[0] = {}, row[0] = {}",
                col[0], row[0]
            ),
        });
    }
    let rows = col.len();
    let cols = row.len();
    let p = rows + cols - 1;

    // Circulant embedding: generator [col, reverse(row[1..])].
    let mut gen = Vec::with_capacity(p);
    gen.extend_from_slice(col);
    gen.extend(row[1..].iter().rev());
    let plans = Dft::new(p);
    let spectrum = Arc::new(plans.dft(&gen));
    let dtype = DType::of_slice(&gen);

    let apply = {
        let plans = Arc::clone(&plans);
        let spectrum = Arc::clone(&spectrum);
        move |x: ArrayView2<Complex64>, in_len: usize, out_len: usize, conj: bool| {
            let mut out = zeros(out_len, x.ncols());
            for (ci, xc) in x.axis_iter(Axis(1)).enumerate() {
                let mut buf = vec![Complex64::zero(); p];
                for (i, v) in xc.iter().take(in_len).enumerate() {
                    buf[i] = *v;
                }
                plans.fwd.process(&mut buf);
                for (b, s) in buf.iter_mut().zip(spectrum.iter()) {
                    *b *= if conj { s.conj() } else { *s };
                }
                plans.inv.process(&mut buf);
                let scale = 1.0 / p as f64;
                for i in 0..out_len {
                    out[[i, ci]] = buf[i] * scale;
                }
            }
            Ok(out)
        }
    };
    let apply_adj = apply.clone();
    Ok(LinOp::new(
        rows,
        cols,
        dtype,
        move |x| apply(x, cols, rows, false),
        move |x| apply_adj(x, rows, cols, true),
    ))
}

/// Convolution through a lazily-applied Toeplitz matrix: the padded
/// kernel is the first column, and the mode's centered rows are selected
/// by composition.
pub(crate) fn toeplitz_conv_op(n: usize, kernel: &[Complex64], mode: ConvMode) -> Result<LinOp> {
    let k = kernel.len();
    let full = n + k - 1;
    let out = mode.output_len(n, k);
    let start = (full - out) / 2;

    let mut col = kernel.to_vec();
    col.resize(full, Complex64::zero());
    let mut row = vec![Complex64::zero(); n];
    row[0] = kernel[0];
    let t = toeplitz(&col, &row)?;
    if start == 0 && out == full {
        Ok(t)
    } else {
        slice_rows(&t, start, start + out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::testutil::{assert_adjoint_duality, assert_all_close, test_batch};
    use crate::op::to_complex;
    use ndarray::ArrayView1;

    #[test]
    fn test_toeplitz_matches_dense_definition() {
        let col = [
            Complex64::new(1.0, 0.0),
            Complex64::new(2.0, 0.0),
            Complex64::new(3.0, 0.0),
        ];
        let row = [
            Complex64::new(1.0, 0.0),
            Complex64::new(-1.0, 0.0),
        ];
        let op = toeplitz(&col, &row).unwrap();
        assert_eq!(op.shape(), (3, 2));
        let dense = op.to_dense().unwrap();
        // [[ 1, -1], [2, 1], [3, 2]]
        let want = [1.0, -1.0, 2.0, 1.0, 3.0, 2.0];
        let got: Vec<f64> = dense.iter().map(|v| v.re).collect();
        for (g, w) in got.iter().zip(want.iter()) {
            assert!((g - w).abs() < 1e-10);
        }
        assert_adjoint_duality(&op, 1e-10);
    }

    #[test]
    fn test_toeplitz_corner_check() {
        let a = [Complex64::new(1.0, 0.0)];
        let b = [Complex64::new(2.0, 0.0)];
        assert!(toeplitz(&a, &b).is_err());
        assert!(toeplitz(&[], &a).is_err());
    }

    #[test]
    fn test_toeplitz_complex_adjoint() {
        let col: Vec<Complex64> = (0..4)
            .map(|i| Complex64::new(i as f64, -(i as f64) * 0.5))
            .collect();
        let mut row = vec![Complex64::zero(); 3];
        row[0] = col[0];
        row[1] = Complex64::new(0.25, 1.0);
        row[2] = Complex64::new(-2.0, 0.0);
        let op = toeplitz(&col, &row).unwrap();
        let dense = op.to_dense().unwrap();
        let adj = op.h().to_dense().unwrap();
        for i in 0..3 {
            for j in 0..4 {
                assert!((adj[[i, j]] - dense[[j, i]].conj()).norm() < 1e-10);
            }
        }
        assert_adjoint_duality(&op, 1e-10);
    }

    #[test]
    fn test_toeplitz_conv_matches_direct_formula() {
        let kernel = to_complex(&[1.0, 2.0, 3.0]);
        let op = toeplitz_conv_op(4, &kernel, ConvMode::Full).unwrap();
        let x = to_complex(&[1.0, 1.0, 1.0, 1.0]);
        let y = op.apply_vec(ArrayView1::from(&x[..])).unwrap();
        let want = to_complex(&[1.0, 3.0, 6.0, 6.0, 5.0, 3.0]);
        assert_all_close(&y.to_vec(), &want, 1e-10);
    }

    #[test]
    fn test_toeplitz_batch() {
        let kernel = to_complex(&[0.5, 1.5]);
        let op = toeplitz_conv_op(6, &kernel, ConvMode::Same).unwrap();
        let x = test_batch(6, 3, true, 12);
        let y = op.apply(x.view()).unwrap();
        for c in 0..3 {
            let yc = op.apply_vec(x.column(c)).unwrap();
            for i in 0..6 {
                assert!((y[[i, c]] - yc[i]).norm() < 1e-12);
            }
        }
    }
}
