//! Periodic and mirror-symmetric boundary extension operators.
//!
//! `bc` extends a length-`l` signal by stacking shifted and flipped copies
//! of itself; `bc2d` is the separable 2D version built as a Kronecker
//! product of two 1D extensions, applied to a flattened image. Both are
//! the padding stage in front of windowed convolution and wavelet steps.

use crate::elementary::{eye, flip};
use crate::error::{Error, Result};
use crate::op::algebra::{compose, kron, vstack};
use crate::op::LinOp;

/// Boundary extension rule.
///
/// Periodic tiles the signal (`x1..xN | x1..xN | x1..xN`); symmetric
/// alternates mirrored and plain copies (`xN..x1 | x1..xN | xN..x1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Boundary {
    /// Wrap-around tiling.
    #[default]
    Periodic,
    /// Mirror tiling.
    Symmetric,
}

/// Boundary extension of a length-`l` signal.
///
/// The output stacks `2n + 1` copies of the signal (the original in the
/// middle), plus `before` extra samples on top and `after` extra samples
/// at the bottom taken from the adjacent copy under the chosen rule.
///
/// ```
/// use linopr::{bc, Boundary, to_complex};
/// use ndarray::ArrayView1;
///
/// let x = to_complex(&[0.0, 1.0, 2.0]);
/// let op = bc(3, 1, 0, 0, Boundary::Periodic).unwrap();
/// let y = op.apply_vec(ArrayView1::from(&x[..])).unwrap();
/// let got: Vec<f64> = y.iter().map(|v| v.re).collect();
/// assert_eq!(got, [0.0, 1.0, 2.0, 0.0, 1.0, 2.0, 0.0, 1.0, 2.0]);
///
/// let op = bc(3, 1, 0, 0, Boundary::Symmetric).unwrap();
/// let y = op.apply_vec(ArrayView1::from(&x[..])).unwrap();
/// let got: Vec<f64> = y.iter().map(|v| v.re).collect();
/// assert_eq!(got, [2.0, 1.0, 0.0, 0.0, 1.0, 2.0, 2.0, 1.0, 0.0]);
/// ```
pub fn bc(l: usize, n: usize, before: usize, after: usize, boundary: Boundary) -> Result<LinOp> {
    if l == 0 {
        return Err(Error::InvalidArgument {
            arg: "l",
            reason: "got 0, expected a strictly positive signal length".to_string(),
        });
    }
    if before > l {
        return Err(Error::InvalidArgument {
            arg: "before",
            reason: format!("got {before}, expected before <= signal length {l}"),
        });
    }
    if after > l {
        return Err(Error::InvalidArgument {
            arg: "after",
            reason: format!("got {after}, expected after <= signal length {l}"),
        });
    }

    let id = eye(l, l, 0);
    match boundary {
        Boundary::Periodic => {
            let mut blocks = Vec::with_capacity(2 * n + 3);
            if before > 0 {
                blocks.push(eye(before, l, (l - before) as isize));
            }
            for _ in 0..(2 * n + 1) {
                blocks.push(id.clone());
            }
            if after > 0 {
                blocks.push(eye(after, l, 0));
            }
            vstack(&blocks)
        }
        Boundary::Symmetric => {
            let mirror = flip(l, 0, Some(l))?;
            // The copy adjacent to an original is always mirrored, so the
            // alternation parity depends on n.
            let mut blocks = Vec::with_capacity(2 * n + 3);
            let mut flipped = if n % 2 == 0 {
                blocks.push(id.clone());
                true
            } else {
                blocks.push(mirror.clone());
                false
            };
            for _ in 0..(2 * n) {
                if flipped {
                    blocks.push(mirror.clone());
                    flipped = false;
                } else {
                    blocks.push(id.clone());
                    flipped = true;
                }
            }
            if before > 0 {
                let head = if n % 2 == 0 {
                    compose(&eye(before, l, (l - before) as isize), &mirror)?
                } else {
                    eye(before, l, (l - before) as isize)
                };
                blocks.insert(0, head);
            }
            if after > 0 {
                let tail = if n % 2 == 0 {
                    compose(&eye(after, l, 0), &mirror)?
                } else {
                    eye(after, l, 0)
                };
                blocks.push(tail);
            }
            vstack(&blocks)
        }
    }
}

/// Separable 2D boundary extension of a flattened `(rows, cols)` image.
///
/// Stacks `2x + 1` copies along the rows and `2y + 1` along the columns,
/// plus `ax` extra rows and `ay` extra columns on each side, as
/// `kron(row extension, column extension)` through the vec-trick.
pub fn bc2d(
    shape: (usize, usize),
    x: usize,
    y: usize,
    ax: usize,
    ay: usize,
    boundary: Boundary,
) -> Result<LinOp> {
    let (rows, cols) = shape;
    if ax >= rows || ay >= cols {
        return Err(Error::InvalidArgument {
            arg: "ax/ay",
            reason: format!(
                "got ax {ax}, ay {ay}, expected ax < rows ({rows}) and ay < cols ({cols})"
            ),
        });
    }
    let row_ext = bc(rows, x, ax, ax, boundary)?;
    let col_ext = bc(cols, y, ay, ay, boundary)?;
    Ok(kron(&row_ext, &col_ext))
}
