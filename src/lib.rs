//! linopr - composable matrix-free linear operators for signal processing
//!
//! linopr represents large structured linear transforms (Toeplitz,
//! circulant, Kronecker, DFT, wavelet banks) by their *action* instead of
//! their matrix: a [`LinOp`] carries a shape, a semantic element type, a
//! forward-apply function and an adjoint-apply function, and compositions
//! build new operators without ever materializing anything dense.
//!
//! # Architecture
//!
//! ```text
//! +---------------------------------------------------------------+
//! |                    wavelet  (dwt1d, dwt2d)                    |
//! +------------------------+--------------------------------------+
//! |  convolve              |  spectral                            |
//! |  (direct, toeplitz,    |  (fft, fft2, radix-2, fwht, stft)    |
//! |   fft, overlap-add,    |                                      |
//! |   circulant, 2d)       |                                      |
//! +------------------------+--------------------------------------+
//! |        elementary  (eye, flip, diag, decimate, mslices,       |
//! |         mpad, overlap_add, scatter_windows, bc, bc2d)         |
//! +---------------------------------------------------------------+
//! |        op  (LinOp core + compose/add/kron/stack algebra)      |
//! +---------------------------------------------------------------+
//! ```
//!
//! Every constructor returns a [`LinOp`]; the layers above reuse the
//! layers below by composition, so adjoint consistency and shape algebra
//! are preserved by construction. The convolution engine offers several
//! interchangeable backends for the same mathematical operator; backend
//! choice is a performance tradeoff, never a semantic one.
//!
//! # Example
//!
//! ```
//! use linopr::{convolve, ConvMode, ConvMethod, to_complex};
//! use ndarray::ArrayView1;
//!
//! let op = convolve(5, &[1.0, 0.0, -1.0], ConvMode::Full, ConvMethod::Direct).unwrap();
//! assert_eq!(op.shape(), (7, 5));
//!
//! let x = to_complex(&[1.0, 2.0, 3.0, 4.0, 5.0]);
//! let y = op.apply_vec(ArrayView1::from(&x[..])).unwrap();
//! assert_eq!(y[1].re, 2.0);
//!
//! // The adjoint view is free and exact.
//! let yh = op.h().apply_vec(y.view()).unwrap();
//! assert_eq!(yh.len(), 5);
//! ```
//!
//! # Batched input
//!
//! Every operator applies to a single vector or to a `(len, batch)`
//! matrix whose columns are independent vectors. Storage is `Complex64`
//! throughout; operators with real semantics coerce residual imaginary
//! parts back to zero at their boundary (see [`convolve`]).
//!
//! # Errors
//!
//! Shape and configuration problems are raised at construction wherever
//! detectable ([`Error::ShapeMismatch`], [`Error::InvalidArgument`]);
//! non-finite spectral output is repaired per sub-range during apply and
//! only surfaces as [`Error::Numerical`] when direct recomputation fails
//! too.

pub mod config;
pub mod convolve;
pub mod elementary;
pub mod error;
pub mod op;
pub mod spectral;
pub mod wavelet;

pub use config::ExecPolicy;
pub use error::{Error, Result};

pub use op::algebra::{
    add, block_diag, compose, compose_all, hstack, kron, scale, slice_rows, vstack,
};
pub use op::{lift_real, real_part, to_complex, DType, LinOp};

pub use elementary::boundary::{bc, bc2d, Boundary};
pub use elementary::{
    anti_identity, decimate, diag, eye, flip, mpad, mslices, overlap_add, scatter_windows,
};

pub use spectral::fft::{fft, fft2, fft_radix2, FftKind};
pub use spectral::fwht::{fwht, FwhtBackend};
pub use spectral::stft::{stft, StftConfig, StftScaling, StftWindow};
pub use spectral::FftNorm;

pub use convolve::{
    circulant, convolve, convolve2d, convolve2d_apply, convolve2d_complex, convolve_apply,
    convolve_complex, convolve_with, dsconvolve, dsconvolve_complex, oaconvolve, toeplitz,
    Conv2dBoundary, Conv2dMethod, ConvMethod, ConvMode,
};

pub use wavelet::{dwt1d, dwt2d, max_level, ExtensionMode, Wavelet, WaveletFamily};
