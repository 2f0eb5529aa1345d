//! Circular convolution backend.
//!
//! A circulant matrix is diagonalized by the DFT, so the spectral path
//! multiplies by the generator's spectrum between a forward and an
//! unnormalized inverse transform. A modular-index direct path exists as
//! an independently-derived equivalent for short kernels and testing.
//!
//! When the kernel is longer than the signal, the generator length is
//! `max(signal, kernel)`; the input is zero-extended and the output
//! truncated back to the signal length through composition.

use ndarray::{ArrayView2, Axis};
use num_complex::Complex64;
use num_traits::Zero;
use std::sync::Arc;

use crate::elementary::eye;
use crate::error::{Error, Result};
use crate::op::algebra::{compose, slice_rows};
use crate::op::{zeros, DType, LinOp};
use crate::spectral::Dft;

/// Circulant operator from its first column, applied spectrally.
pub fn circulant(col: &[Complex64]) -> Result<LinOp> {
    if col.is_empty() {
        return Err(Error::InvalidArgument {
            arg: "col",
            reason: "got an empty generator, expected at least one entry".to_string(),
        });
    }
    let p = col.len();
    let plans = Dft::new(p);
    let spectrum = Arc::new(plans.dft(col));
    let dtype = DType::of_slice(col);

    let apply = {
        let plans = Arc::clone(&plans);
        let spectrum = Arc::clone(&spectrum);
        move |x: ArrayView2<Complex64>, conj: bool| {
            let mut out = zeros(p, x.ncols());
            let scale = 1.0 / p as f64;
            for (ci, xc) in x.axis_iter(Axis(1)).enumerate() {
                let mut buf = xc.to_vec();
                plans.fwd.process(&mut buf);
                for (b, s) in buf.iter_mut().zip(spectrum.iter()) {
                    *b *= if conj { s.conj() } else { *s };
                }
                plans.inv.process(&mut buf);
                for (i, v) in buf.iter().enumerate() {
                    out[[i, ci]] = *v * scale;
                }
            }
            Ok(out)
        }
    };
    let apply_adj = apply.clone();
    Ok(LinOp::new(
        p,
        p,
        dtype,
        move |x| apply(x, false),
        move |x| apply_adj(x, true),
    ))
}

/// Circulant operator from its first column, modular-index direct path.
fn circulant_direct(col: &[Complex64]) -> LinOp {
    let p = col.len();
    // Skip trailing zero taps from generator padding.
    let taps = col
        .iter()
        .rposition(|v| !v.is_zero())
        .map_or(0, |i| i + 1);
    let dtype = DType::of_slice(col);
    let kf: Vec<Complex64> = col[..taps].to_vec();
    let ka = kf.clone();
    LinOp::new(
        p,
        p,
        dtype,
        move |x: ArrayView2<Complex64>| {
            let mut out = zeros(p, x.ncols());
            for (ci, xc) in x.axis_iter(Axis(1)).enumerate() {
                let xv = xc.to_vec();
                for i in 0..p {
                    let mut acc = Complex64::zero();
                    for (j, kj) in kf.iter().enumerate() {
                        acc += kj * xv[(p + i - j) % p];
                    }
                    out[[i, ci]] = acc;
                }
            }
            Ok(out)
        },
        move |x: ArrayView2<Complex64>| {
            let mut out = zeros(p, x.ncols());
            for (ci, xc) in x.axis_iter(Axis(1)).enumerate() {
                let xv = xc.to_vec();
                for i in 0..p {
                    let mut acc = Complex64::zero();
                    for (j, kj) in ka.iter().enumerate() {
                        acc += kj.conj() * xv[(i + j) % p];
                    }
                    out[[i, ci]] = acc;
                }
            }
            Ok(out)
        },
    )
}

/// Circular convolution of a length-`n` signal with `kernel`.
pub(crate) fn circ_conv_op(n: usize, kernel: &[Complex64], spectral: bool) -> Result<LinOp> {
    let p = n.max(kernel.len());
    let mut gen = kernel.to_vec();
    gen.resize(p, Complex64::zero());
    let c = if spectral {
        circulant(&gen)?
    } else {
        circulant_direct(&gen)
    };
    if p > n {
        slice_rows(&compose(&c, &eye(p, n, 0))?, 0, n)
    } else {
        Ok(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::testutil::{assert_adjoint_duality, test_batch};
    use crate::op::to_complex;
    use ndarray::ArrayView1;

    #[test]
    fn test_circulant_rotates() {
        // Generator e_1 is the cyclic shift.
        let mut gen = to_complex(&[0.0, 1.0, 0.0, 0.0]);
        let op = circulant(&gen).unwrap();
        let x = to_complex(&[1.0, 2.0, 3.0, 4.0]);
        let y = op.apply_vec(ArrayView1::from(&x[..])).unwrap();
        let want = [4.0, 1.0, 2.0, 3.0];
        for (g, w) in y.iter().zip(want.iter()) {
            assert!((g.re - w).abs() < 1e-10);
            assert!(g.im.abs() < 1e-10);
        }
        gen.clear();
        assert!(circulant(&gen).is_err());
    }

    #[test]
    fn test_spectral_and_direct_agree() {
        let kernel: Vec<Complex64> = (0..3)
            .map(|i| Complex64::new(1.0 + i as f64, -(i as f64)))
            .collect();
        let a = circ_conv_op(8, &kernel, true).unwrap();
        let b = circ_conv_op(8, &kernel, false).unwrap();
        let x = test_batch(8, 2, true, 21);
        let ya = a.apply(x.view()).unwrap();
        let yb = b.apply(x.view()).unwrap();
        for (va, vb) in ya.iter().zip(yb.iter()) {
            assert!((va - vb).norm() < 1e-9);
        }
        assert_adjoint_duality(&a, 1e-9);
        assert_adjoint_duality(&b, 1e-9);
    }

    #[test]
    fn test_circulant_adjoint_is_conjugate_transpose() {
        let gen: Vec<Complex64> = (0..4)
            .map(|i| Complex64::new(i as f64 - 1.5, 0.5 * i as f64))
            .collect();
        let op = circulant(&gen).unwrap();
        let dense = op.to_dense().unwrap();
        let adj = op.h().to_dense().unwrap();
        for i in 0..4 {
            for j in 0..4 {
                assert!((adj[[i, j]] - dense[[j, i]].conj()).norm() < 1e-10);
            }
        }
    }
}
