//! Matrix-free linear operator core.
//!
//! A [`LinOp`] represents a linear transform by its action: a forward-apply
//! function and an adjoint-apply function, together with a shape and a
//! semantic element type. No operator in this crate ever materializes a
//! dense matrix internally; [`LinOp::to_dense`] is the explicit opt-in for
//! callers who really want one.
//!
//! # Storage convention
//!
//! Inputs and outputs are `Complex64` batches of shape `(len, batch)` whose
//! columns are independent vectors. Operators whose semantic element type
//! is real ([`DType::Real`]) still flow through complex storage; the
//! convolution constructors coerce residual imaginary parts back to zero
//! at the operator boundary (see the `convolve` module).
//!
//! # Purity and concurrency
//!
//! Every apply call is a pure function of its input and the operator's
//! immutable captured parameters, so concurrent applies of one operator on
//! different inputs need no locking. `Clone` is an `Arc` bump.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use num_complex::Complex64;
use num_traits::Zero;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};

pub mod algebra;

/// Semantic element type of an operator.
///
/// Storage is always `Complex64`; the dtype records whether the operator
/// preserves real inputs, which drives the real/complex promotion rules of
/// the convolution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DType {
    /// The operator maps real inputs to real outputs.
    #[default]
    Real,
    /// The operator's coefficients or outputs are genuinely complex.
    Complex,
}

impl DType {
    /// Standard promotion: complex wins.
    pub fn promote(self, other: DType) -> DType {
        if self == DType::Complex || other == DType::Complex {
            DType::Complex
        } else {
            DType::Real
        }
    }

    /// Classify a coefficient slice: complex iff any imaginary part is set.
    pub fn of_slice(values: &[Complex64]) -> DType {
        if values.iter().any(|v| v.im != 0.0) {
            DType::Complex
        } else {
            DType::Real
        }
    }

    /// Whether this is the real dtype.
    pub fn is_real(self) -> bool {
        self == DType::Real
    }
}

/// Signature shared by the forward and adjoint actions.
pub type ApplyFn = dyn Fn(ArrayView2<Complex64>) -> Result<Array2<Complex64>> + Send + Sync;

/// A shape-carrying, dtype-carrying lazy linear operator.
///
/// Constructed once from a pair of closures plus a shape and dtype, and
/// immutable thereafter. Compositions (see [`algebra`]) produce new
/// operators that close over clones of their constituents.
#[derive(Clone)]
pub struct LinOp {
    rows: usize,
    cols: usize,
    dtype: DType,
    forward: Arc<ApplyFn>,
    adjoint: Arc<ApplyFn>,
}

impl LinOp {
    /// Wrap a forward/adjoint pair as an operator.
    ///
    /// The closures receive standard-layout views of shape `(len, batch)`
    /// and must produce `(rows, batch)` / `(cols, batch)` outputs.
    pub fn new<F, G>(rows: usize, cols: usize, dtype: DType, forward: F, adjoint: G) -> Self
    where
        F: Fn(ArrayView2<Complex64>) -> Result<Array2<Complex64>> + Send + Sync + 'static,
        G: Fn(ArrayView2<Complex64>) -> Result<Array2<Complex64>> + Send + Sync + 'static,
    {
        LinOp {
            rows,
            cols,
            dtype,
            forward: Arc::new(forward),
            adjoint: Arc::new(adjoint),
        }
    }

    /// Output length of the forward action.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Input length of the forward action.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Semantic element type.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Apply to a batch: `(cols, B)` in, `(rows, B)` out.
    pub fn apply(&self, x: ArrayView2<Complex64>) -> Result<Array2<Complex64>> {
        if x.nrows() != self.cols {
            return Err(Error::ShapeMismatch {
                op: "apply",
                details: format!(
                    "operator is {}x{} but input has {} rows",
                    self.rows,
                    self.cols,
                    x.nrows()
                ),
            });
        }
        let x = x.as_standard_layout();
        let y = (self.forward)(x.view())?;
        debug_assert_eq!(y.nrows(), self.rows);
        Ok(y)
    }

    /// Apply the conjugate-transpose action: `(rows, B)` in, `(cols, B)` out.
    pub fn apply_adjoint(&self, x: ArrayView2<Complex64>) -> Result<Array2<Complex64>> {
        if x.nrows() != self.rows {
            return Err(Error::ShapeMismatch {
                op: "apply_adjoint",
                details: format!(
                    "operator is {}x{} but adjoint input has {} rows",
                    self.rows,
                    self.cols,
                    x.nrows()
                ),
            });
        }
        let x = x.as_standard_layout();
        let y = (self.adjoint)(x.view())?;
        debug_assert_eq!(y.nrows(), self.cols);
        Ok(y)
    }

    /// Rank-1 convenience over [`LinOp::apply`].
    pub fn apply_vec(&self, x: ArrayView1<Complex64>) -> Result<Array1<Complex64>> {
        let y = self.apply(x.insert_axis(Axis(1)))?;
        Ok(y.index_axis_move(Axis(1), 0))
    }

    /// Rank-1 convenience over [`LinOp::apply_adjoint`].
    pub fn apply_adjoint_vec(&self, x: ArrayView1<Complex64>) -> Result<Array1<Complex64>> {
        let y = self.apply_adjoint(x.insert_axis(Axis(1)))?;
        Ok(y.index_axis_move(Axis(1), 0))
    }

    /// Adjoint view: swaps the two actions and transposes the shape.
    ///
    /// O(1): two `Arc` clones, no data copy.
    pub fn h(&self) -> LinOp {
        LinOp {
            rows: self.cols,
            cols: self.rows,
            dtype: self.dtype,
            forward: Arc::clone(&self.adjoint),
            adjoint: Arc::clone(&self.forward),
        }
    }

    /// Wrap a dense matrix as an operator.
    ///
    /// Forward is matrix multiplication, adjoint is conjugate-transpose
    /// multiplication. Intended for small blocks (reference backends,
    /// tests); large transforms should use the structured constructors.
    pub fn from_dense(m: &Array2<Complex64>) -> LinOp {
        let dtype = if m.iter().any(|v| v.im != 0.0) {
            DType::Complex
        } else {
            DType::Real
        };
        let mh = m.t().mapv(|v| v.conj());
        let m = m.to_owned();
        let (rows, cols) = (m.nrows(), m.ncols());
        LinOp::new(
            rows,
            cols,
            dtype,
            move |x| Ok(m.dot(&x)),
            move |x| Ok(mh.dot(&x)),
        )
    }

    /// Materialize the operator by applying it to the identity.
    ///
    /// Explicit opt-in; cost is `rows * cols` storage plus one batched
    /// apply of width `cols`.
    pub fn to_dense(&self) -> Result<Array2<Complex64>> {
        let mut id = Array2::<Complex64>::zeros((self.cols, self.cols));
        for i in 0..self.cols {
            id[[i, i]] = Complex64::new(1.0, 0.0);
        }
        self.apply(id.view())
    }
}

impl fmt::Debug for LinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinOp")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("dtype", &self.dtype)
            .finish()
    }
}

/// Lift a real slice into complex storage.
pub fn to_complex(values: &[f64]) -> Vec<Complex64> {
    values.iter().map(|&v| Complex64::new(v, 0.0)).collect()
}

/// Lift a real batch into complex storage.
pub fn lift_real(x: ArrayView2<f64>) -> Array2<Complex64> {
    x.mapv(|v| Complex64::new(v, 0.0))
}

/// Real parts of a complex batch (imaginary parts are dropped).
pub fn real_part(x: &Array2<Complex64>) -> Array2<f64> {
    x.mapv(|v| v.re)
}

/// Zero batch helper shared by the elementary kernels.
pub(crate) fn zeros(rows: usize, batch: usize) -> Array2<Complex64> {
    Array2::from_elem((rows, batch), Complex64::zero())
}
