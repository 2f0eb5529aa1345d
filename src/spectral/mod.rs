//! Spectral operators: DFT, 2D DFT, radix-2 FFT, Walsh-Hadamard and the
//! short-time Fourier transform.
//!
//! # Normalization and adjoints
//!
//! Every DFT-backed operator is `s * DFT_unnormalized` where `s` is fixed
//! by the [`FftNorm`] convention. The adjoint is the exact conjugate
//! transpose, `s * IDFT_unnormalized`, so the round trips are
//!
//! ```text
//! backward: F^H (F x) = N x
//! ortho:    F^H (F x) = x
//! forward:  F^H (F x) = x / N
//! ```
//!
//! and adjoint duality holds to rounding for every normalization.

use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

pub mod fft;
pub mod fwht;
pub mod stft;

/// DFT normalization convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FftNorm {
    /// No scaling on the forward transform.
    #[default]
    Backward,
    /// `1/sqrt(N)` on the forward transform; the operator is unitary.
    Ortho,
    /// `1/N` on the forward transform.
    Forward,
}

impl FftNorm {
    /// Scale applied to the unnormalized forward transform (and to the
    /// unnormalized inverse in the adjoint).
    pub(crate) fn forward_scale(self, n: usize) -> f64 {
        match self {
            FftNorm::Backward => 1.0,
            FftNorm::Ortho => 1.0 / (n as f64).sqrt(),
            FftNorm::Forward => 1.0 / n as f64,
        }
    }
}

/// Forward/inverse plans of one transform length, cached at operator
/// construction and shared by the apply closures.
pub(crate) struct Dft {
    pub fwd: Arc<dyn Fft<f64>>,
    pub inv: Arc<dyn Fft<f64>>,
    pub len: usize,
}

impl Dft {
    pub fn new(len: usize) -> Arc<Dft> {
        let mut planner = FftPlanner::<f64>::new();
        Arc::new(Dft {
            fwd: planner.plan_fft_forward(len),
            inv: planner.plan_fft_inverse(len),
            len,
        })
    }

    /// Unnormalized DFT of a slice (copies, then transforms in place).
    pub fn dft(&self, v: &[Complex64]) -> Vec<Complex64> {
        debug_assert_eq!(v.len(), self.len);
        let mut buf = v.to_vec();
        self.fwd.process(&mut buf);
        buf
    }

    /// Unnormalized inverse DFT of a slice.
    pub fn idft(&self, v: &[Complex64]) -> Vec<Complex64> {
        debug_assert_eq!(v.len(), self.len);
        let mut buf = v.to_vec();
        self.inv.process(&mut buf);
        buf
    }
}

/// `n` is a positive power of two.
pub(crate) fn is_power_of_two(n: usize) -> bool {
    n > 0 && (n & (n - 1)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_scales() {
        assert_eq!(FftNorm::Backward.forward_scale(8), 1.0);
        assert!((FftNorm::Ortho.forward_scale(4) - 0.5).abs() < 1e-15);
        assert!((FftNorm::Forward.forward_scale(4) - 0.25).abs() < 1e-15);
    }

    #[test]
    fn test_is_power_of_two() {
        assert!(is_power_of_two(1));
        assert!(is_power_of_two(64));
        assert!(!is_power_of_two(0));
        assert!(!is_power_of_two(12));
    }

    #[test]
    fn test_dft_idft_roundtrip_is_n_times_input() {
        let plans = Dft::new(4);
        let x: Vec<Complex64> = (0..4).map(|i| Complex64::new(i as f64, 0.0)).collect();
        let back = plans.idft(&plans.dft(&x));
        for (b, x0) in back.iter().zip(x.iter()) {
            assert!((b - *x0 * 4.0).norm() < 1e-12);
        }
    }
}
