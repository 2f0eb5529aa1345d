//! Wavelet filter families.
//!
//! Decomposition filter values follow the reference wavelet library's
//! tables: `dec_lo` is stored in decomposition order and `dec_hi` is
//! derived by the quadrature-mirror rule
//! `dec_hi[k] = (-1)^(k+1) * dec_lo[W-1-k]`.

use std::f64::consts::FRAC_1_SQRT_2;

use crate::error::{Error, Result};

/// Wavelet family enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaveletFamily {
    /// Haar wavelet (simplest orthogonal wavelet).
    #[default]
    Haar,
    /// Daubechies wavelets (dbN where N is the order).
    Daubechies(usize),
    /// Symlet wavelets (symN, near-symmetric Daubechies).
    Symlet(usize),
    /// Coiflet wavelets (coifN).
    Coiflet(usize),
}

/// Wavelet with decomposition filter coefficients.
#[derive(Debug, Clone)]
pub struct Wavelet {
    family: Option<WaveletFamily>,
    dec_lo: Vec<f64>,
    dec_hi: Vec<f64>,
}

impl Wavelet {
    /// Create a wavelet from a family specification.
    pub fn new(family: WaveletFamily) -> Result<Self> {
        let dec_lo = match family {
            WaveletFamily::Haar => vec![FRAC_1_SQRT_2; 2],
            WaveletFamily::Daubechies(n) => daubechies_dec_lo(n)?,
            WaveletFamily::Symlet(n) => symlet_dec_lo(n)?,
            WaveletFamily::Coiflet(n) => coiflet_dec_lo(n)?,
        };
        let dec_hi = mirror_high_pass(&dec_lo);
        Ok(Wavelet {
            family: Some(family),
            dec_lo,
            dec_hi,
        })
    }

    /// Wavelet from a custom quadrature-mirror low-pass filter.
    ///
    /// The high-pass filter is derived with the standard qmf sign rule;
    /// custom filters never get the named families' decimation-phase
    /// exception.
    pub fn from_lowpass(dec_lo: &[f64]) -> Result<Self> {
        if dec_lo.len() < 2 {
            return Err(Error::InvalidArgument {
                arg: "dec_lo",
                reason: format!(
                    "got {} taps, expected a filter of at least 2",
                    dec_lo.len()
                ),
            });
        }
        let w = dec_lo.len();
        let dec_hi: Vec<f64> = (0..w)
            .map(|k| dec_lo[w - 1 - k] * if k % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        Ok(Wavelet {
            family: None,
            dec_lo: dec_lo.to_vec(),
            dec_hi,
        })
    }

    /// Low-pass decomposition filter.
    pub fn dec_lo(&self) -> &[f64] {
        &self.dec_lo
    }

    /// High-pass decomposition filter.
    pub fn dec_hi(&self) -> &[f64] {
        &self.dec_hi
    }

    /// Filter length.
    pub fn filter_length(&self) -> usize {
        self.dec_lo.len()
    }

    /// Whether this family keeps the even decimation phase.
    ///
    /// The reference library aligns the even-order Daubechies, Symlet and
    /// Coiflet families one sample differently from the rest; getting this
    /// wrong produces a valid-looking but misaligned transform.
    pub(crate) fn even_phase(&self) -> bool {
        matches!(
            self.family,
            Some(WaveletFamily::Daubechies(n))
            | Some(WaveletFamily::Symlet(n))
            | Some(WaveletFamily::Coiflet(n)) if n % 2 == 0
        )
    }
}

/// `dec_hi[k] = (-1)^(k+1) * dec_lo[W-1-k]`, the reference library's
/// orthogonal high-pass convention.
fn mirror_high_pass(dec_lo: &[f64]) -> Vec<f64> {
    let w = dec_lo.len();
    (0..w)
        .map(|k| dec_lo[w - 1 - k] * if k % 2 == 0 { -1.0 } else { 1.0 })
        .collect()
}

fn daubechies_dec_lo(order: usize) -> Result<Vec<f64>> {
    let lo = match order {
        1 => vec![FRAC_1_SQRT_2; 2],
        2 => vec![
            -0.12940952255092145,
            0.22414386804185735,
            0.836516303737469,
            0.48296291314469025,
        ],
        3 => vec![
            0.035226291882100656,
            -0.08544127388224149,
            -0.13501102001039084,
            0.4598775021193313,
            0.8068915093133388,
            0.3326705529509569,
        ],
        4 => vec![
            -0.010597401784997278,
            0.032883011666982945,
            0.030841381835986965,
            -0.18703481171888114,
            -0.02798376941698385,
            0.6308807679295904,
            0.7148465705525415,
            0.23037781330885523,
        ],
        _ => {
            return Err(Error::InvalidArgument {
                arg: "family",
                reason: format!("Daubechies order {order} is not in the filter table (1..=4)"),
            })
        }
    };
    Ok(lo)
}

fn symlet_dec_lo(order: usize) -> Result<Vec<f64>> {
    let lo = match order {
        2 => vec![
            -0.12940952255092145,
            0.22414386804185735,
            0.836516303737469,
            0.48296291314469025,
        ],
        3 => vec![
            0.035226291882100656,
            -0.08544127388224149,
            -0.13501102001039084,
            0.4598775021193313,
            0.8068915093133388,
            0.3326705529509569,
        ],
        4 => vec![
            -0.07576571478927333,
            -0.02963552764599851,
            0.49761866763201545,
            0.8037387518059161,
            0.29785779560527736,
            -0.09921954357684722,
            -0.012603967262037833,
            0.0322231006040427,
        ],
        _ => {
            return Err(Error::InvalidArgument {
                arg: "family",
                reason: format!("Symlet order {order} is not in the filter table (2..=4)"),
            })
        }
    };
    Ok(lo)
}

fn coiflet_dec_lo(order: usize) -> Result<Vec<f64>> {
    let lo = match order {
        1 => vec![
            -0.01565572813546454,
            -0.0727326195128539,
            0.38486484686420286,
            0.8525720202122554,
            0.3378976624578092,
            -0.0727326195128539,
        ],
        2 => vec![
            -0.0007205494453645122,
            -0.0018232088707029932,
            0.0056114348193944995,
            0.023680171946334084,
            -0.0594344186464569,
            -0.0764885990783064,
            0.41700518442169254,
            0.8127236354455423,
            0.3861100668211622,
            -0.06737255472196302,
            -0.04146493678175915,
            0.016387336463522112,
        ],
        _ => {
            return Err(Error::InvalidArgument {
                arg: "family",
                reason: format!("Coiflet order {order} is not in the filter table (1..=2)"),
            })
        }
    };
    Ok(lo)
}
