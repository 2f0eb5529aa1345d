//! Discrete wavelet transform operators, built compositionally.
//!
//! Each decomposition level is a composition of a boundary stage, a
//! same-mode convolution by the low/high-pass pair, decimation by 2 with
//! the family's phase offset, and band extraction; deeper levels thread
//! only the approximation band through `block_diag`. The coefficient
//! layout matches the reference wavelet library:
//!
//! ```text
//! dwt1d, level L: [cA_L, cD_L, cD_{L-1}, ..., cD_1]
//! dwt2d, level L: [cA_L, cH_L, cV_L, cD_L, ..., cH_1, cV_1, cD_1]
//! ```

use crate::convolve::{convolve, ConvMethod, ConvMode};
use crate::elementary::boundary::{bc, Boundary};
use crate::elementary::{decimate, eye, mslices};
use crate::error::{Error, Result};
use crate::op::algebra::{block_diag, compose, kron, vstack};
use crate::op::LinOp;

mod types;

pub use types::{Wavelet, WaveletFamily};

/// Signal extension rule at the boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtensionMode {
    /// Pad with zeros.
    #[default]
    Zero,
    /// Mirror the signal.
    Symmetric,
    /// Treat the signal as periodic.
    Periodic,
}

/// Maximum useful decomposition level for a length-`n` signal:
/// `floor(log2(n / (filter_len - 1)))`, 0 when nothing can be decomposed.
pub fn max_level(n: usize, wavelet: &Wavelet) -> usize {
    let w = wavelet.filter_length();
    if w < 2 || w > n {
        return 0;
    }
    (n as f64 / (w - 1) as f64).log2().floor() as usize
}

/// Stacked decimated low/high filter pair for one axis of length `cur`.
///
/// Returns `(V, extended length, band length)`: `V` maps `cur` samples to
/// the concatenated decimated low-pass and high-pass bands, each of
/// `extended length / 2` samples.
fn filter_bank(cur: usize, wavelet: &Wavelet, mode: ExtensionMode) -> Result<(LinOp, usize, usize)> {
    let w = wavelet.filter_length();
    let npd = w - 2;
    let mut o = cur + 2 * npd;
    let boundary_stage = match mode {
        ExtensionMode::Zero => {
            o += o % 2;
            eye(o, cur, -(npd as isize))
        }
        ExtensionMode::Symmetric | ExtensionMode::Periodic => {
            let parity = o % 2;
            let after = npd + parity;
            o += parity;
            let rule = if mode == ExtensionMode::Periodic {
                Boundary::Periodic
            } else {
                Boundary::Symmetric
            };
            bc(cur, 0, npd, after, rule)?
        }
    };

    let lo = compose(
        &convolve(o, wavelet.dec_lo(), ConvMode::Same, ConvMethod::Fft)?,
        &boundary_stage,
    )?;
    let hi = compose(
        &convolve(o, wavelet.dec_hi(), ConvMode::Same, ConvMethod::Fft)?,
        &boundary_stage,
    )?;

    // Filter-length parity fixes which decimation phase the reference
    // library keeps; the even-order named families shift by one more.
    let mut phase = usize::from(npd % 2 == 0);
    if wavelet.even_phase() {
        phase = 0;
    }
    let down = decimate(o, phase, None, 2)?;
    let v = vstack(&[compose(&down, &lo)?, compose(&down, &hi)?])?;
    let half = (cur + w - 1) / 2;
    Ok((v, o, half))
}

/// One level of the 1D bank with `[cA, cD]` extraction; returns the
/// `(2 * half, cur)` level operator and the band length `half`.
fn dwt_level(cur: usize, wavelet: &Wavelet, mode: ExtensionMode) -> Result<(LinOp, usize)> {
    let (v, o, half) = filter_bank(cur, wavelet, mode)?;
    let mut offset = (o / 2 - half) / 2;
    if wavelet.even_phase() {
        offset += 1;
    }
    let approx = mslices(o, &[offset], &[offset + half - 1])?;
    let detail = mslices(o, &[offset + o / 2], &[offset + o / 2 + half - 1])?;
    let bands = vstack(&[approx, detail])?;
    Ok((compose(&bands, &v)?, half))
}

fn check_level(level: Option<usize>, maximum: usize) -> Result<usize> {
    if let Some(lv) = level {
        if lv < 1 {
            return Err(Error::InvalidArgument {
                arg: "level",
                reason: format!("got {lv}, expected at least 1"),
            });
        }
        if lv > maximum {
            return Err(Error::InvalidArgument {
                arg: "level",
                reason: format!("got {lv}, expected at most the maximum level {maximum}"),
            });
        }
    }
    Ok(level.unwrap_or(maximum))
}

/// Multi-level 1D discrete wavelet transform of a length-`n` signal.
///
/// `level` of `None` decomposes down to [`max_level`]; an explicit level
/// beyond the maximum is rejected. If the filter is longer than the
/// signal, or the maximum level is 0, the identity is returned.
///
/// ```
/// use linopr::wavelet::{dwt1d, ExtensionMode, Wavelet, WaveletFamily};
/// use linopr::to_complex;
/// use ndarray::ArrayView1;
///
/// let haar = Wavelet::new(WaveletFamily::Haar).unwrap();
/// let op = dwt1d(8, &haar, ExtensionMode::Periodic, Some(1)).unwrap();
/// let x = to_complex(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
/// let y = op.apply_vec(ArrayView1::from(&x[..])).unwrap();
/// assert!((y[0].re - 2.12132034).abs() < 1e-7); // first approximation
/// assert!((y[4].re + 0.70710678).abs() < 1e-7); // first detail
/// ```
pub fn dwt1d(
    n: usize,
    wavelet: &Wavelet,
    mode: ExtensionMode,
    level: Option<usize>,
) -> Result<LinOp> {
    if n == 0 {
        return Err(Error::InvalidArgument {
            arg: "n",
            reason: "got 0, expected a strictly positive signal length".to_string(),
        });
    }
    if wavelet.filter_length() > n {
        // Nothing to decompose.
        return Ok(eye(n, n, 0));
    }
    let depth = check_level(level, max_level(n, wavelet))?;
    if depth == 0 {
        return Ok(eye(n, n, 0));
    }

    let (mut op, mut cur) = dwt_level(n, wavelet, mode)?;
    for _ in 1..depth {
        let (lvl, half) = dwt_level(cur, wavelet, mode)?;
        // Deeper levels transform only the approximation band, which the
        // extraction keeps in front.
        let tail = op.rows() - lvl.cols();
        op = compose(&block_diag(&[lvl, eye(tail, tail, 0)])?, &op)?;
        cur = half;
    }
    Ok(op)
}

/// Multi-level 2D discrete wavelet transform of a flattened
/// `(rows, cols)` image.
///
/// Each level combines the row and column filter banks as
/// `kron(V_rows, V_cols)` on the flattened image and extracts the four
/// sub-bands with slice selections; recursion continues on `LL` only.
pub fn dwt2d(
    shape: (usize, usize),
    wavelet: &Wavelet,
    mode: ExtensionMode,
    level: Option<usize>,
) -> Result<LinOp> {
    let (rows, cols) = shape;
    if rows == 0 || cols == 0 {
        return Err(Error::InvalidArgument {
            arg: "shape",
            reason: format!("got {shape:?}, expected strictly positive dimensions"),
        });
    }
    let w = wavelet.filter_length();
    if w > rows || w > cols {
        return Ok(eye(rows * cols, rows * cols, 0));
    }
    let maximum = max_level(rows, wavelet).min(max_level(cols, wavelet));
    let depth = check_level(level, maximum)?;
    if depth == 0 {
        return Ok(eye(rows * cols, rows * cols, 0));
    }

    let mut op: Option<LinOp> = None;
    let (mut cx, mut cy) = (rows, cols);
    for _ in 0..depth {
        let (vx, fx, hx) = filter_bank(cx, wavelet, mode)?;
        let (vy, fy, hy) = filter_bank(cy, wavelet, mode)?;
        let banks = kron(&vx, &vy);

        // Sub-band windows inside the (fx, fy) stacked grid: rows below
        // fx/2 are the row-low-pass half, columns below fy/2 the
        // column-low-pass half.
        let mut off_x = (fx / 2 - hx) / 2;
        let mut off_y = (fy / 2 - hy) / 2;
        if wavelet.even_phase() {
            off_x += 1;
            off_y += 1;
        }
        let band = |row0: usize, col0: usize| -> Result<LinOp> {
            let starts: Vec<usize> = (row0..row0 + hx).map(|r| r * fy + col0).collect();
            let ends: Vec<usize> = (row0..row0 + hx).map(|r| r * fy + col0 + hy - 1).collect();
            mslices(fx * fy, &starts, &ends)
        };
        let ll = band(off_x, off_y)?;
        let hl = band(fx / 2 + off_x, off_y)?;
        let lh = band(off_x, fy / 2 + off_y)?;
        let hh = band(fx / 2 + off_x, fy / 2 + off_y)?;
        let bands = vstack(&[ll, hl, lh, hh])?;
        let lvl = compose(&bands, &banks)?;

        op = Some(match op {
            None => lvl,
            Some(prev) => {
                let tail = prev.rows() - lvl.cols();
                compose(&block_diag(&[lvl, eye(tail, tail, 0)])?, &prev)?
            }
        });
        (cx, cy) = (hx, hy);
    }
    op.ok_or_else(|| Error::InvalidArgument {
        arg: "level",
        reason: "decomposition produced no levels".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::testutil::assert_adjoint_duality;
    use crate::op::to_complex;
    use ndarray::ArrayView1;

    fn haar() -> Wavelet {
        Wavelet::new(WaveletFamily::Haar).unwrap()
    }

    fn apply(op: &LinOp, x: &[f64]) -> Vec<f64> {
        let xc = to_complex(x);
        op.apply_vec(ArrayView1::from(&xc[..]))
            .unwrap()
            .iter()
            .map(|v| v.re)
            .collect()
    }

    #[test]
    fn test_haar_periodic_level1_reference_values() {
        let op = dwt1d(8, &haar(), ExtensionMode::Periodic, Some(1)).unwrap();
        assert_eq!(op.shape(), (8, 8));
        let y = apply(&op, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        let want = [
            2.12132034,
            4.94974747,
            7.77817459,
            10.60660172,
            -0.70710678,
            -0.70710678,
            -0.70710678,
            -0.70710678,
        ];
        for (g, w) in y.iter().zip(want.iter()) {
            assert!((g - w).abs() < 1e-7, "got {g}, want {w}");
        }
    }

    #[test]
    fn test_haar_zero_mode_level1() {
        let op = dwt1d(4, &haar(), ExtensionMode::Zero, Some(1)).unwrap();
        let y = apply(&op, &[1.0, 2.0, 3.0, 4.0]);
        let want = [2.12132034, 4.94974747, -0.70710678, -0.70710678];
        for (g, w) in y.iter().zip(want.iter()) {
            assert!((g - w).abs() < 1e-7, "got {g}, want {w}");
        }
    }

    #[test]
    fn test_haar_periodic_level2_layout() {
        // [cA2, cD2, cD1]: the approximation band of level 1 decomposed
        // again, details appended coarsest first.
        let op = dwt1d(8, &haar(), ExtensionMode::Periodic, Some(2)).unwrap();
        assert_eq!(op.shape(), (8, 8));
        let y = apply(&op, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        let want = [
            5.0, 13.0, // cA2
            -2.0, -2.0, // cD2
            -0.70710678, -0.70710678, -0.70710678, -0.70710678, // cD1
        ];
        for (g, w) in y.iter().zip(want.iter()) {
            assert!((g - w).abs() < 1e-7, "got {g}, want {w}");
        }
    }

    #[test]
    fn test_max_level_rule() {
        let h = haar();
        assert_eq!(max_level(8, &h), 3);
        assert_eq!(max_level(1, &h), 0);
        let db2 = Wavelet::new(WaveletFamily::Daubechies(2)).unwrap();
        assert_eq!(max_level(16, &db2), 2);
    }

    #[test]
    fn test_level_validation_and_identity_cases() {
        let h = haar();
        assert!(dwt1d(8, &h, ExtensionMode::Periodic, Some(0)).is_err());
        assert!(dwt1d(8, &h, ExtensionMode::Periodic, Some(4)).is_err());
        // Filter longer than the signal: identity.
        let db4 = Wavelet::new(WaveletFamily::Daubechies(4)).unwrap();
        let op = dwt1d(4, &db4, ExtensionMode::Zero, None).unwrap();
        let y = apply(&op, &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(y, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_db2_periodic_shapes() {
        // The extension grows the bands: each level keeps
        // (len + W - 1) / 2 coefficients per band.
        let db2 = Wavelet::new(WaveletFamily::Daubechies(2)).unwrap();
        let op = dwt1d(16, &db2, ExtensionMode::Periodic, Some(1)).unwrap();
        assert_eq!(op.shape(), (2 * ((16 + 3) / 2), 16));
        assert_adjoint_duality(&op, 1e-8);
    }

    #[test]
    fn test_dwt1d_adjoint_duality() {
        for mode in [
            ExtensionMode::Zero,
            ExtensionMode::Symmetric,
            ExtensionMode::Periodic,
        ] {
            let op = dwt1d(16, &haar(), mode, Some(2)).unwrap();
            assert_adjoint_duality(&op, 1e-8);
        }
    }

    #[test]
    fn test_dwt2d_haar_2x2_reference() {
        // [[1, 2], [3, 4]] -> [cA, cH, cV, cD] = [5, -2, -1, 0].
        let op = dwt2d((2, 2), &haar(), ExtensionMode::Periodic, Some(1)).unwrap();
        assert_eq!(op.shape(), (4, 4));
        let y = apply(&op, &[1.0, 2.0, 3.0, 4.0]);
        let want = [5.0, -2.0, -1.0, 0.0];
        for (g, w) in y.iter().zip(want.iter()) {
            assert!((g - w).abs() < 1e-9, "got {g}, want {w}");
        }
    }

    #[test]
    fn test_dwt2d_level2_shape() {
        let op = dwt2d((8, 8), &haar(), ExtensionMode::Periodic, Some(2)).unwrap();
        // Level 1: four 4x4 bands (64 outputs); level 2 re-expands the
        // 16-sample LL into four 2x2 bands: 16 + 48 = 64 outputs.
        assert_eq!(op.shape(), (64, 64));
        assert_adjoint_duality(&op, 1e-8);
    }

    #[test]
    fn test_dwt2d_identity_when_filter_too_long() {
        let db4 = Wavelet::new(WaveletFamily::Daubechies(4)).unwrap();
        let op = dwt2d((4, 4), &db4, ExtensionMode::Zero, None).unwrap();
        let x: Vec<f64> = (0..16).map(|i| i as f64).collect();
        assert_eq!(apply(&op, &x), x);
    }

    #[test]
    fn test_dwt2d_rectangular_image() {
        let op = dwt2d((4, 8), &haar(), ExtensionMode::Zero, Some(1)).unwrap();
        // Bands are 2x4 each.
        assert_eq!(op.shape(), (32, 32));
        assert_adjoint_duality(&op, 1e-8);
    }
}
