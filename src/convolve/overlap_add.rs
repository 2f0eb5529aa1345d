//! Spectral convolution backends: single full-length FFT and blocked
//! overlap-add.
//!
//! Both are assembled from the crate's own operators rather than ad-hoc
//! loops:
//!
//! ```text
//! fft:         extract o F^H o diag(F k) o F o zero-pad
//! overlap-add: extract o oa o block_diag(F_b, ..., F_b) o mpad o zero-pad
//! ```
//!
//! where `F_b` is the per-block circular convolution by the padded kernel.
//! For overlap-add the signal is cut into chunks of the block size, each
//! chunk is zero-padded to twice the block size, convolved independently,
//! and the trailing halves are summed into the next chunk's leading
//! samples.

use num_complex::Complex64;
use num_traits::Zero;

use crate::convolve::ConvMode;
use crate::elementary::{diag, eye, mpad, overlap_add};
use crate::error::{Error, Result};
use crate::op::algebra::{block_diag, compose, compose_all, slice_rows};
use crate::op::LinOp;
use crate::spectral::fft::{fft, FftKind};
use crate::spectral::{is_power_of_two, Dft, FftNorm};

/// Per-block circular convolution `F^H o diag(F kernel) o F` at length
/// `size`, with the inverse carrying the `1/size` normalization.
fn spectral_block(size: usize, kernel: &[Complex64]) -> Result<LinOp> {
    let mut padded = kernel.to_vec();
    padded.resize(size, Complex64::zero());
    let spectrum = Dft::new(size).dft(&padded);
    let analysis = fft(size, FftKind::Complex, FftNorm::Backward)?;
    let synthesis = fft(size, FftKind::Complex, FftNorm::Forward)?.h();
    compose_all(&[synthesis, diag(&spectrum), analysis])
}

/// Centered window of the full convolution for the requested mode.
fn extract_mode(op: LinOp, n: usize, k: usize, mode: ConvMode) -> Result<LinOp> {
    let full = n + k - 1;
    let out = mode.output_len(n, k);
    let start = (full - out) / 2;
    if start == 0 && out == op.rows() {
        Ok(op)
    } else {
        slice_rows(&op, start, start + out)
    }
}

/// Single full-length spectral convolution.
pub(crate) fn fft_conv_op(n: usize, kernel: &[Complex64], mode: ConvMode) -> Result<LinOp> {
    let k = kernel.len();
    let full = n + k - 1;
    let block = spectral_block(full, kernel)?;
    let padded = compose(&block, &eye(full, n, 0))?;
    extract_mode(padded, n, k, mode)
}

/// Blocked spectral convolution with overlap-add reassembly.
///
/// `block_size` must be a power of two no smaller than the kernel; by
/// default the smallest power of two at least `min(n, 2k)` is used. When
/// the signal is not longer than twice the kernel, blocking would not
/// help and the single full-length path is used instead.
pub(crate) fn oa_conv_op(
    n: usize,
    kernel: &[Complex64],
    mode: ConvMode,
    block_size: Option<usize>,
) -> Result<LinOp> {
    let k = kernel.len();
    if k > n {
        return Err(Error::ShapeMismatch {
            op: "oaconvolve",
            details: format!("kernel length {k} exceeds signal length {n}"),
        });
    }
    let step = match block_size {
        Some(b) => {
            if !is_power_of_two(b) {
                return Err(Error::InvalidArgument {
                    arg: "block_size",
                    reason: format!("got {b}, expected a power of two"),
                });
            }
            if b < k {
                return Err(Error::InvalidArgument {
                    arg: "block_size",
                    reason: format!("got {b}, expected at least the kernel length {k}"),
                });
            }
            b
        }
        None => {
            let mut b = k.max(1);
            while b < n.min(2 * k) || !is_power_of_two(b) {
                b += 1;
            }
            b
        }
    };

    if n <= 2 * k {
        return fft_conv_op(n, kernel, mode);
    }

    let big = 2 * step;
    let overlap = big - step;
    let chunks = n.div_ceil(step);
    log::debug!("oaconvolve: n={n}, k={k}, block={step}, chunks={chunks}");

    let block = spectral_block(big, kernel)?;
    let blocks: Vec<LinOp> = vec![block; chunks];
    let mut op = compose_all(&[
        overlap_add(big, chunks, overlap)?,
        block_diag(&blocks)?,
        mpad(step, chunks, overlap)?,
    ])?;
    if chunks * step > n {
        op = compose(&op, &eye(chunks * step, n, 0))?;
    }
    extract_mode(op, n, kernel.len(), mode)
}

/// Overlap-add convolution operator with an explicit block-size knob.
///
/// Equivalent to `convolve` with the overlap-add method; exposed
/// separately so callers can tune the block size.
pub fn oaconvolve(
    n: usize,
    kernel: &[Complex64],
    mode: ConvMode,
    block_size: Option<usize>,
) -> Result<LinOp> {
    if mode == ConvMode::Circ {
        return Err(Error::InvalidArgument {
            arg: "mode",
            reason: "overlap-add computes linear convolution; circ is not available".to_string(),
        });
    }
    let inner = oa_conv_op(n, kernel, mode, block_size)?;
    let inner = super::recovery::with_recovery(inner, kernel.to_vec(), mode, n);
    Ok(super::coerce_real(inner, crate::op::DType::of_slice(kernel)))
}
