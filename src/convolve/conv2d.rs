//! 2D convolution operators on flattened images.
//!
//! The Kronecker-sum identity is what keeps the 2D operator lazy: a
//! convolution with a `(K, L)` kernel is exactly
//!
//! ```text
//! sum(kron(shift_by_row_i, convolve_rows_with(kernel[i, :])), i = 0..K)
//! ```
//!
//! a sum of `K` Kronecker products of a shifted identity with a 1D
//! convolution operator, so the direct and Toeplitz backends never form a
//! 2D Toeplitz matrix. The FFT backend instead runs a padded 2D spectral
//! multiplication. Non-zero boundaries (`Wrap`, `Symm`) pre-extend the
//! image with [`bc2d`] and the centered window of the true output is
//! extracted afterwards.

use ndarray::Array2;
use num_complex::Complex64;

use crate::config::ExecPolicy;
use crate::convolve::{coerce_real, direct, toeplitz, ConvMode};
use crate::elementary::boundary::{bc2d, Boundary};
use crate::elementary::{eye, diag, mslices};
use crate::error::{Error, Result};
use crate::op::algebra::{add, compose, compose_all, kron};
use crate::op::{lift_real, DType, LinOp};
use crate::spectral::fft::fft2;
use crate::spectral::FftNorm;

/// Boundary handling before convolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Conv2dBoundary {
    /// Zero-fill outside the image.
    #[default]
    Fill,
    /// Periodic extension.
    Wrap,
    /// Mirror-symmetric extension.
    Symm,
}

/// 2D convolution backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Conv2dMethod {
    /// Resolves to the FFT backend.
    #[default]
    Auto,
    /// Kronecker sum over kernel rows with direct 1D convolutions.
    Direct,
    /// Kronecker sum over kernel rows with lazy Toeplitz 1D convolutions.
    Toeplitz,
    /// Padded 2D spectral multiplication.
    Fft,
}

/// 2D convolution operator for a real kernel, acting on a row-major
/// flattened `(rows, cols)` image.
pub fn convolve2d(
    shape: (usize, usize),
    kernel: &Array2<f64>,
    mode: ConvMode,
    boundary: Conv2dBoundary,
    method: Conv2dMethod,
) -> Result<LinOp> {
    build(shape, &lift_real(kernel.view()), mode, boundary, method)
}

/// 2D convolution operator for a complex kernel.
pub fn convolve2d_complex(
    shape: (usize, usize),
    kernel: &Array2<Complex64>,
    mode: ConvMode,
    boundary: Conv2dBoundary,
    method: Conv2dMethod,
) -> Result<LinOp> {
    build(shape, kernel, mode, boundary, method)
}

/// Convolve an image directly: builds the operator for `image.dim()` and
/// applies it, returning the mode-sized output image.
pub fn convolve2d_apply(
    image: &Array2<f64>,
    kernel: &Array2<f64>,
    mode: ConvMode,
    boundary: Conv2dBoundary,
    method: Conv2dMethod,
) -> Result<Array2<f64>> {
    let (x, y) = image.dim();
    let op = convolve2d((x, y), kernel, mode, boundary, method)?;
    let flat: Vec<Complex64> = image.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    let out = op.apply_vec(ndarray::ArrayView1::from(&flat[..]))?;
    let (k, l) = kernel.dim();
    let (tx, ty) = (mode.output_len(x, k), mode.output_len(y, l));
    Array2::from_shape_vec((tx, ty), out.iter().map(|v| v.re).collect()).map_err(|e| {
        Error::ShapeMismatch {
            op: "convolve2d",
            details: e.to_string(),
        }
    })
}

/// Zero-pad a flattened `(rows, cols)` image to `(out_rows, out_cols)`
/// at the top-left corner.
fn pad2d(rows: usize, cols: usize, out_rows: usize, out_cols: usize) -> LinOp {
    kron(&eye(out_rows, rows, 0), &eye(out_cols, cols, 0))
}

fn build(
    shape: (usize, usize),
    kernel: &Array2<Complex64>,
    mode: ConvMode,
    boundary: Conv2dBoundary,
    method: Conv2dMethod,
) -> Result<LinOp> {
    let (x, y) = shape;
    let (k, l) = kernel.dim();
    if x == 0 || y == 0 || k == 0 || l == 0 {
        return Err(Error::InvalidArgument {
            arg: "shape",
            reason: format!(
                "got image {shape:?} and kernel {:?}, expected strictly positive dimensions",
                kernel.dim()
            ),
        });
    }
    if mode == ConvMode::Circ {
        return Err(Error::InvalidArgument {
            arg: "mode",
            reason: "got circ, expected full, valid or same".to_string(),
        });
    }
    if k > x || l > y {
        return Err(Error::ShapeMismatch {
            op: "convolve2d",
            details: format!(
                "kernel {:?} exceeds image {shape:?}",
                kernel.dim()
            ),
        });
    }

    // Wrap and symm extend the image by one copy on each side before
    // convolving; fill convolves the bare image.
    let b = if boundary == Conv2dBoundary::Fill { 1 } else { 3 };
    let (xs, ys) = (b * x, b * y);
    let (xf, yf) = (xs + k - 1, ys + l - 1);
    let (tx, ty) = (mode.output_len(x, k), mode.output_len(y, l));
    let (i1, i2) = ((xf - tx) / 2, (yf - ty) / 2);

    let resolved = if method == Conv2dMethod::Auto {
        Conv2dMethod::Fft
    } else {
        method
    };
    log::debug!(
        "convolve2d: image {shape:?}, kernel {:?}, mode {}, backend {resolved:?}",
        kernel.dim(),
        mode.name()
    );

    let mut op = match resolved {
        Conv2dMethod::Direct | Conv2dMethod::Toeplitz => {
            let policy = ExecPolicy::default();
            let terms: Vec<LinOp> = (0..k)
                .map(|i| {
                    let row: Vec<Complex64> = kernel.row(i).to_vec();
                    let conv_row = match resolved {
                        Conv2dMethod::Direct => {
                            direct::direct_op(ys, &row, ConvMode::Full, &policy)?
                        }
                        _ => toeplitz::toeplitz_conv_op(ys, &row, ConvMode::Full)?,
                    };
                    Ok(kron(&eye(xf, xs, -(i as isize)), &conv_row))
                })
                .collect::<Result<_>>()?;
            add(&terms)?
        }
        Conv2dMethod::Fft => {
            let f = fft2((xf, yf), FftNorm::Ortho)?;
            let kernel_flat: Vec<Complex64> = kernel.iter().cloned().collect();
            let padded_kernel = pad2d(k, l, xf, yf)
                .apply_vec(ndarray::ArrayView1::from(&kernel_flat[..]))?;
            let mut spectrum = f.apply_vec(padded_kernel.view())?;
            let root = ((xf * yf) as f64).sqrt();
            spectrum.mapv_inplace(|v| v * root);
            compose_all(&[
                f.h(),
                diag(spectrum.as_slice().ok_or_else(|| Error::ShapeMismatch {
                    op: "convolve2d",
                    details: "kernel spectrum is not contiguous".to_string(),
                })?),
                f,
                pad2d(xs, ys, xf, yf),
            ])?
        }
        Conv2dMethod::Auto => unreachable!("resolved above"),
    };

    if b == 3 {
        let ext = match boundary {
            Conv2dBoundary::Wrap => Boundary::Periodic,
            Conv2dBoundary::Symm => Boundary::Symmetric,
            Conv2dBoundary::Fill => unreachable!("fill keeps b == 1"),
        };
        op = compose(&op, &bc2d((x, y), 1, 1, 0, 0, ext)?)?;
    }

    // Centered window of the true output inside the extended full grid.
    let starts: Vec<usize> = (i1..i1 + tx).map(|r| r * yf + i2).collect();
    let ends: Vec<usize> = (i1..i1 + tx).map(|r| r * yf + i2 + ty - 1).collect();
    let op = compose(&mslices(xf * yf, &starts, &ends)?, &op)?;

    let dtype = if kernel.iter().any(|v| v.im != 0.0) {
        DType::Complex
    } else {
        DType::Real
    };
    Ok(coerce_real(op, dtype))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::testutil::assert_adjoint_duality;
    use ndarray::array;

    const METHODS: [Conv2dMethod; 3] = [
        Conv2dMethod::Direct,
        Conv2dMethod::Toeplitz,
        Conv2dMethod::Fft,
    ];

    #[test]
    fn test_full_literal() {
        let image = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
        let kernel = array![[1.0, 0.0], [0.0, 1.0]];
        // y[r, c] = x[r, c] + x[r - 1, c - 1]
        let want = array![
            [1.0, 2.0, 3.0, 0.0],
            [4.0, 6.0, 8.0, 3.0],
            [7.0, 12.0, 14.0, 6.0],
            [0.0, 7.0, 8.0, 9.0]
        ];
        for method in METHODS {
            let got = convolve2d_apply(
                &image,
                &kernel,
                ConvMode::Full,
                Conv2dBoundary::Fill,
                method,
            )
            .unwrap();
            assert_eq!(got.dim(), (4, 4));
            for (g, w) in got.iter().zip(want.iter()) {
                assert!((g - w).abs() < 1e-9, "{method:?}");
            }
        }
    }

    #[test]
    fn test_methods_agree_all_modes_and_boundaries() {
        let image = Array2::from_shape_fn((6, 5), |(i, j)| {
            ((i * 5 + j) as f64 * 0.7).sin() + 0.2 * j as f64
        });
        let kernel = Array2::from_shape_fn((3, 2), |(i, j)| 1.0 - (i + 2 * j) as f64 * 0.4);
        for &mode in &[ConvMode::Full, ConvMode::Valid, ConvMode::Same] {
            for &boundary in &[
                Conv2dBoundary::Fill,
                Conv2dBoundary::Wrap,
                Conv2dBoundary::Symm,
            ] {
                let reference =
                    convolve2d_apply(&image, &kernel, mode, boundary, Conv2dMethod::Direct)
                        .unwrap();
                for method in [Conv2dMethod::Toeplitz, Conv2dMethod::Fft] {
                    let got = convolve2d_apply(&image, &kernel, mode, boundary, method).unwrap();
                    assert_eq!(got.dim(), reference.dim());
                    for (g, r) in got.iter().zip(reference.iter()) {
                        assert!(
                            (g - r).abs() < 1e-8,
                            "{mode:?}/{boundary:?}/{method:?}: {g} vs {r}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_valid_mode_shape() {
        let op = convolve2d(
            (5, 4),
            &array![[1.0, 1.0], [1.0, 1.0]],
            ConvMode::Valid,
            Conv2dBoundary::Fill,
            Conv2dMethod::Direct,
        )
        .unwrap();
        assert_eq!(op.shape(), (4 * 3, 20));
    }

    #[test]
    fn test_wrap_boundary_literal() {
        // Periodic boundary: same-mode output of a 2x2 averaging kernel on
        // a 2x2 image wraps around.
        let image = array![[1.0, 2.0], [3.0, 4.0]];
        let kernel = array![[1.0, 1.0], [1.0, 1.0]];
        let got = convolve2d_apply(
            &image,
            &kernel,
            ConvMode::Same,
            Conv2dBoundary::Wrap,
            Conv2dMethod::Direct,
        )
        .unwrap();
        for v in got.iter() {
            assert!((v - 10.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_validation() {
        let kernel = array![[1.0, 1.0], [1.0, 1.0]];
        assert!(convolve2d(
            (1, 5),
            &kernel,
            ConvMode::Full,
            Conv2dBoundary::Fill,
            Conv2dMethod::Direct
        )
        .is_err());
        assert!(convolve2d(
            (5, 5),
            &kernel,
            ConvMode::Circ,
            Conv2dBoundary::Fill,
            Conv2dMethod::Direct
        )
        .is_err());
    }

    #[test]
    fn test_adjoint_duality_per_method() {
        let kernel = array![[0.5, -1.0], [0.25, 2.0]];
        for method in METHODS {
            for &boundary in &[Conv2dBoundary::Fill, Conv2dBoundary::Symm] {
                let op =
                    convolve2d((4, 5), &kernel, ConvMode::Same, boundary, method).unwrap();
                assert_adjoint_duality(&op, 1e-9);
            }
        }
    }

    #[test]
    fn test_complex_kernel_dtype() {
        let kernel = array![[Complex64::new(0.0, 1.0)]];
        let op = convolve2d_complex(
            (3, 3),
            &kernel,
            ConvMode::Same,
            Conv2dBoundary::Fill,
            Conv2dMethod::Fft,
        )
        .unwrap();
        assert_eq!(op.dtype(), DType::Complex);
        assert_adjoint_duality(&op, 1e-9);
    }
}
