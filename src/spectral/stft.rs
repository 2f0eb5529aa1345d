//! Short-time Fourier transform operator.
//!
//! Built entirely by composition: frame scatter, per-frame windowing
//! (`kron` of an identity over frames with a diagonal), per-frame
//! real-input DFT (`kron` with the DFT block), and a final scaling
//! diagonal picked by the scaling convention.

use std::f64::consts::PI;

use crate::elementary::{diag, scatter_windows};
use crate::error::{Error, Result};
use crate::op::algebra::{compose_all, kron};
use crate::op::{to_complex, LinOp};
use crate::spectral::fft::{fft, FftKind};
use crate::spectral::FftNorm;
use num_complex::Complex64;

/// Analysis window shape, periodic formulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StftWindow {
    /// `0.5 - 0.5 cos(2 pi n / N)`.
    #[default]
    Hann,
    /// `0.54 - 0.46 cos(2 pi n / N)`.
    Hamming,
    /// `0.42 - 0.5 cos(2 pi n / N) + 0.08 cos(4 pi n / N)`.
    Blackman,
}

impl StftWindow {
    /// Window values as f64, periodic formulation (suitable for FFT
    /// analysis).
    pub fn generate(self, size: usize) -> Vec<f64> {
        if size == 0 {
            return vec![];
        }
        if size == 1 {
            return vec![1.0];
        }
        let n = size as f64;
        (0..size)
            .map(|i| {
                let x = 2.0 * PI * (i as f64) / n;
                match self {
                    StftWindow::Hann => 0.5 - 0.5 * x.cos(),
                    StftWindow::Hamming => 0.54 - 0.46 * x.cos(),
                    StftWindow::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
                }
            })
            .collect()
    }
}

/// Output scaling convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StftScaling {
    /// Scale by `1 / sum(w)^2` (magnitude spectrum).
    #[default]
    Spectrum,
    /// Scale by `1 / (fs * sum(w^2))` (power spectral density).
    Psd,
}

/// Short-time Fourier transform parameters.
#[derive(Debug, Clone, Copy)]
pub struct StftConfig {
    /// Sampling frequency, used by the `Psd` scaling.
    pub fs: f64,
    /// Analysis window shape.
    pub window: StftWindow,
    /// Samples per frame.
    pub nperseg: usize,
    /// Overlap between consecutive frames; defaults to `nperseg / 2`.
    pub noverlap: Option<usize>,
    /// Output scaling convention.
    pub scaling: StftScaling,
}

impl Default for StftConfig {
    fn default() -> Self {
        StftConfig {
            fs: 1.0,
            window: StftWindow::Hann,
            nperseg: 256,
            noverlap: None,
            scaling: StftScaling::Spectrum,
        }
    }
}

/// Short-time Fourier transform of a length-`n` signal.
///
/// The operator maps `n` samples to `nseg * nfreq` stacked frame spectra,
/// with `nseg = 1 + (n - nperseg) / nhop` frames of `nfreq` non-negative
/// frequencies each.
pub fn stft(n: usize, config: &StftConfig) -> Result<LinOp> {
    let nperseg = config.nperseg;
    if nperseg < 1 {
        return Err(Error::InvalidArgument {
            arg: "nperseg",
            reason: format!("got {nperseg}, expected a value greater than 0"),
        });
    }
    let noverlap = config.noverlap.unwrap_or(nperseg / 2);
    if noverlap >= nperseg {
        return Err(Error::InvalidArgument {
            arg: "noverlap",
            reason: format!("got {noverlap}, expected a value less than nperseg ({nperseg})"),
        });
    }
    if nperseg > n {
        return Err(Error::InvalidArgument {
            arg: "nperseg",
            reason: format!("got {nperseg}, expected at most the signal length {n}"),
        });
    }

    let window = config.window.generate(nperseg);
    let nhop = nperseg - noverlap;
    let nseg = 1 + (n - nperseg) / nhop;
    let nfreq = if nperseg % 2 == 0 {
        nperseg / 2 + 1
    } else {
        nperseg.div_ceil(2)
    };

    // Frame scatter, per-frame window, per-frame spectrum, final scale.
    let gather = scatter_windows(n, nperseg, nhop)?;
    let frames = crate::elementary::eye(nseg, nseg, 0);
    let windowing = kron(&frames, &diag(&to_complex(&window)));
    let spectrum = kron(&frames, &fft(nperseg, FftKind::Real, FftNorm::Backward)?);
    let sqscale = match config.scaling {
        StftScaling::Psd => 1.0 / (config.fs * window.iter().map(|w| w * w).sum::<f64>()),
        StftScaling::Spectrum => {
            let s: f64 = window.iter().sum();
            1.0 / (s * s)
        }
    };
    let scaling = diag(&vec![
        Complex64::new(sqscale.sqrt(), 0.0);
        nseg * nfreq
    ]);

    compose_all(&[scaling, spectrum, windowing, gather])
}
