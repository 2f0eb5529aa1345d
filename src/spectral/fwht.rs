//! Fast Walsh-Hadamard transform.
//!
//! Two interchangeable constructions of the same operator: a direct
//! O(N log N) in-place butterfly (the default), and a slow reference
//! built by folding the Kronecker product over the 2x2 Hadamard block.
//! Hadamard matrices are symmetric, so the operator is self-adjoint.

use ndarray::{array, ArrayView2, Axis};
use num_complex::Complex64;

use crate::error::{Error, Result};
use crate::op::algebra::kron;
use crate::op::{zeros, DType, LinOp};
use crate::spectral::is_power_of_two;

/// Which construction of the Walsh-Hadamard operator to use.
///
/// Both produce numerically identical results; `Kronecker` exists as an
/// independently-derived reference for testing the fast path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FwhtBackend {
    /// In-place butterfly.
    #[default]
    Direct,
    /// `log2(n)`-fold Kronecker product of the 2x2 block.
    Kronecker,
}

/// Walsh-Hadamard transform of a power-of-two size `n >= 2`.
///
/// With `normalize` each stage scales by `1/sqrt(2)`, making the operator
/// an involution; unnormalized, applying it twice multiplies by `n`.
pub fn fwht(n: usize, normalize: bool, backend: FwhtBackend) -> Result<LinOp> {
    if !is_power_of_two(n) || n < 2 {
        return Err(Error::InvalidArgument {
            arg: "n",
            reason: format!("got {n}, expected a power of two >= 2"),
        });
    }
    let stages = n.trailing_zeros() as usize;

    match backend {
        FwhtBackend::Direct => {
            let scale = if normalize {
                (2.0f64).powf(-(stages as f64) / 2.0)
            } else {
                1.0
            };
            let apply = move |x: ArrayView2<Complex64>| {
                let mut out = zeros(n, x.ncols());
                for (ci, col) in x.axis_iter(Axis(1)).enumerate() {
                    let mut buf = col.to_vec();
                    let mut h = 1;
                    while h < n {
                        for i in (0..n).step_by(2 * h) {
                            for j in i..i + h {
                                let u = buf[j];
                                let v = buf[j + h];
                                buf[j] = u + v;
                                buf[j + h] = u - v;
                            }
                        }
                        h *= 2;
                    }
                    for (i, v) in buf.iter().enumerate() {
                        out[[i, ci]] = *v * scale;
                    }
                }
                Ok(out)
            };
            Ok(LinOp::new(n, n, DType::Real, apply, apply))
        }
        FwhtBackend::Kronecker => {
            let h = if normalize {
                std::f64::consts::FRAC_1_SQRT_2
            } else {
                1.0
            };
            let block = array![
                [Complex64::new(h, 0.0), Complex64::new(h, 0.0)],
                [Complex64::new(h, 0.0), Complex64::new(-h, 0.0)]
            ];
            let h1 = LinOp::from_dense(&block);
            let mut op = h1.clone();
            for _ in 1..stages {
                op = kron(&h1, &op);
            }
            Ok(op)
        }
    }
}
