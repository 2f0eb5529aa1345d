//! Algebraic composition of lazy operators.
//!
//! Every combinator here builds a new [`LinOp`] that closes over clones of
//! its constituents (cheap `Arc` bumps) and derives both the forward and
//! the adjoint action from the constituents' actions, so adjoint
//! consistency is preserved by construction. Shape algebra is validated at
//! construction time.
//!
//! The Kronecker product uses the vec-trick
//! `kron(A, B) @ vec(X) = vec(A @ X @ B^T)` (row-major `vec`) instead of
//! forming the product operator's matrix, which would be asymptotically
//! worse in both time and memory.

use ndarray::{concatenate, s, Array2, ArrayView1, Axis};
use num_complex::Complex64;

use crate::elementary::eye;
use crate::error::{Error, Result};
use crate::op::{zeros, DType, LinOp};

/// `A` then `B` from the right: the operator `x -> A(B(x))`.
///
/// Requires `A.cols == B.rows`.
pub fn compose(a: &LinOp, b: &LinOp) -> Result<LinOp> {
    if a.cols() != b.rows() {
        return Err(Error::ShapeMismatch {
            op: "compose",
            details: format!(
                "cannot chain {}x{} with {}x{} ({} != {})",
                a.rows(),
                a.cols(),
                b.rows(),
                b.cols(),
                a.cols(),
                b.rows()
            ),
        });
    }
    let dtype = a.dtype().promote(b.dtype());
    let (a1, b1) = (a.clone(), b.clone());
    let (a2, b2) = (a.clone(), b.clone());
    Ok(LinOp::new(
        a.rows(),
        b.cols(),
        dtype,
        move |x| {
            let t = b1.apply(x)?;
            a1.apply(t.view())
        },
        move |x| {
            let t = a2.apply_adjoint(x)?;
            b2.apply_adjoint(t.view())
        },
    ))
}

/// Left-to-right composition chain: `compose_all(&[A, B, C]) = A o B o C`.
pub fn compose_all(ops: &[LinOp]) -> Result<LinOp> {
    let (first, rest) = ops.split_first().ok_or_else(|| Error::InvalidArgument {
        arg: "ops",
        reason: "compose_all needs at least one operator".to_string(),
    })?;
    let mut acc = first.clone();
    for op in rest {
        acc = compose(&acc, op)?;
    }
    Ok(acc)
}

/// Elementwise sum of same-shape operators.
pub fn add(ops: &[LinOp]) -> Result<LinOp> {
    let first = ops.first().ok_or_else(|| Error::InvalidArgument {
        arg: "ops",
        reason: "add needs at least one operator".to_string(),
    })?;
    let shape = first.shape();
    for op in ops {
        if op.shape() != shape {
            return Err(Error::ShapeMismatch {
                op: "add",
                details: format!(
                    "all summands must share a shape, got {:?} and {:?}",
                    shape,
                    op.shape()
                ),
            });
        }
    }
    let dtype = ops
        .iter()
        .fold(DType::Real, |d, op| d.promote(op.dtype()));
    let fwd_ops: Vec<LinOp> = ops.to_vec();
    let adj_ops: Vec<LinOp> = ops.to_vec();
    Ok(LinOp::new(
        shape.0,
        shape.1,
        dtype,
        move |x| {
            let mut acc = fwd_ops[0].apply(x)?;
            for op in &fwd_ops[1..] {
                acc += &op.apply(x)?;
            }
            Ok(acc)
        },
        move |x| {
            let mut acc = adj_ops[0].apply_adjoint(x)?;
            for op in &adj_ops[1..] {
                acc += &op.apply_adjoint(x)?;
            }
            Ok(acc)
        },
    ))
}

/// Scalar multiple `alpha * A`; the adjoint scales by `conj(alpha)`.
pub fn scale(alpha: Complex64, a: &LinOp) -> LinOp {
    let dtype = if alpha.im != 0.0 {
        DType::Complex
    } else {
        a.dtype()
    };
    let (a1, a2) = (a.clone(), a.clone());
    let conj = alpha.conj();
    LinOp::new(
        a.rows(),
        a.cols(),
        dtype,
        move |x| Ok(a1.apply(x)?.mapv_into(|v| v * alpha)),
        move |x| Ok(a2.apply_adjoint(x)?.mapv_into(|v| v * conj)),
    )
}

/// Vertical stack: forward concatenates the blocks' outputs, adjoint
/// splits its input into row blocks and sums the blocks' adjoints.
pub fn vstack(ops: &[LinOp]) -> Result<LinOp> {
    let first = ops.first().ok_or_else(|| Error::InvalidArgument {
        arg: "ops",
        reason: "vstack needs at least one operator".to_string(),
    })?;
    let cols = first.cols();
    for op in ops {
        if op.cols() != cols {
            return Err(Error::ShapeMismatch {
                op: "vstack",
                details: format!(
                    "all blocks must share the input length, got {} and {}",
                    cols,
                    op.cols()
                ),
            });
        }
    }
    let rows: usize = ops.iter().map(|op| op.rows()).sum();
    let dtype = ops
        .iter()
        .fold(DType::Real, |d, op| d.promote(op.dtype()));
    let fwd_ops: Vec<LinOp> = ops.to_vec();
    let adj_ops: Vec<LinOp> = ops.to_vec();
    Ok(LinOp::new(
        rows,
        cols,
        dtype,
        move |x| {
            let parts: Vec<Array2<Complex64>> = fwd_ops
                .iter()
                .map(|op| op.apply(x))
                .collect::<Result<_>>()?;
            let views: Vec<_> = parts.iter().map(|p| p.view()).collect();
            concatenate(Axis(0), &views).map_err(|e| Error::ShapeMismatch {
                op: "vstack",
                details: e.to_string(),
            })
        },
        move |x| {
            let mut acc = zeros(cols, x.ncols());
            let mut r0 = 0;
            for op in &adj_ops {
                let r1 = r0 + op.rows();
                acc += &op.apply_adjoint(x.slice(s![r0..r1, ..]))?;
                r0 = r1;
            }
            Ok(acc)
        },
    ))
}

/// Horizontal stack: the dual of [`vstack`] along columns.
pub fn hstack(ops: &[LinOp]) -> Result<LinOp> {
    // [A B] = vstack([A^H; B^H])^H, block by block.
    let adjoints: Vec<LinOp> = ops.iter().map(|op| op.h()).collect();
    Ok(vstack(&adjoints)?.h())
}

/// Kronecker product of two operators, applied through the vec-trick.
///
/// Shape is `(A.rows * B.rows, A.cols * B.cols)`; neither the product nor
/// the factors are materialized.
pub fn kron(a: &LinOp, b: &LinOp) -> LinOp {
    let (ar, ac) = a.shape();
    let (br, bc) = b.shape();
    let dtype = a.dtype().promote(b.dtype());
    let (a1, b1) = (a.clone(), b.clone());
    let (a2, b2) = (a.clone(), b.clone());
    LinOp::new(
        ar * br,
        ac * bc,
        dtype,
        move |x| {
            let mut out = zeros(ar * br, x.ncols());
            for (ci, col) in x.axis_iter(Axis(1)).enumerate() {
                // vec(A @ X @ B^T) with X = unvec(col), row-major.
                let xm = col
                    .to_owned()
                    .into_shape((ac, bc))
                    .map_err(|e| Error::ShapeMismatch {
                        op: "kron",
                        details: e.to_string(),
                    })?;
                let y1 = a1.apply(xm.view())?; // (ar, bc)
                let y2 = b1.apply(y1.t())?; // (br, ar)
                let flat: Vec<Complex64> = y2.t().iter().cloned().collect();
                out.column_mut(ci).assign(&ArrayView1::from(&flat[..]));
            }
            Ok(out)
        },
        move |x| {
            // kron(A, B)^H = kron(A^H, B^H).
            let mut out = zeros(ac * bc, x.ncols());
            for (ci, col) in x.axis_iter(Axis(1)).enumerate() {
                let xm = col
                    .to_owned()
                    .into_shape((ar, br))
                    .map_err(|e| Error::ShapeMismatch {
                        op: "kron",
                        details: e.to_string(),
                    })?;
                let y1 = a2.apply_adjoint(xm.view())?; // (ac, br)
                let y2 = b2.apply_adjoint(y1.t())?; // (bc, ac)
                let flat: Vec<Complex64> = y2.t().iter().cloned().collect();
                out.column_mut(ci).assign(&ArrayView1::from(&flat[..]));
            }
            Ok(out)
        },
    )
}

/// Block-diagonal concatenation: forward splits the input into segments
/// matching each block's `cols`, applies each block, and concatenates.
pub fn block_diag(ops: &[LinOp]) -> Result<LinOp> {
    if ops.is_empty() {
        return Err(Error::InvalidArgument {
            arg: "ops",
            reason: "block_diag needs at least one operator".to_string(),
        });
    }
    let rows: usize = ops.iter().map(|op| op.rows()).sum();
    let cols: usize = ops.iter().map(|op| op.cols()).sum();
    let dtype = ops
        .iter()
        .fold(DType::Real, |d, op| d.promote(op.dtype()));
    let fwd_ops: Vec<LinOp> = ops.to_vec();
    let adj_ops: Vec<LinOp> = ops.to_vec();
    Ok(LinOp::new(
        rows,
        cols,
        dtype,
        move |x| {
            let mut parts = Vec::with_capacity(fwd_ops.len());
            let mut c0 = 0;
            for op in &fwd_ops {
                let c1 = c0 + op.cols();
                parts.push(op.apply(x.slice(s![c0..c1, ..]))?);
                c0 = c1;
            }
            let views: Vec<_> = parts.iter().map(|p| p.view()).collect();
            concatenate(Axis(0), &views).map_err(|e| Error::ShapeMismatch {
                op: "block_diag",
                details: e.to_string(),
            })
        },
        move |x| {
            let mut parts = Vec::with_capacity(adj_ops.len());
            let mut r0 = 0;
            for op in &adj_ops {
                let r1 = r0 + op.rows();
                parts.push(op.apply_adjoint(x.slice(s![r0..r1, ..]))?);
                r0 = r1;
            }
            let views: Vec<_> = parts.iter().map(|p| p.view()).collect();
            concatenate(Axis(0), &views).map_err(|e| Error::ShapeMismatch {
                op: "block_diag",
                details: e.to_string(),
            })
        },
    ))
}

/// Contiguous row window `A[start..end, :]` as a composed operator.
///
/// Implemented as a left-multiplication by a selection operator; no dense
/// submatrix is ever formed.
pub fn slice_rows(a: &LinOp, start: usize, end: usize) -> Result<LinOp> {
    if start >= end || end > a.rows() {
        return Err(Error::InvalidArgument {
            arg: "start/end",
            reason: format!(
                "row window {}..{} is invalid for an operator with {} rows",
                start,
                end,
                a.rows()
            ),
        });
    }
    compose(&eye(end - start, a.rows(), start as isize), a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::testutil::{assert_adjoint_duality, assert_all_close, test_batch};
    use crate::op::to_complex;
    use ndarray::ArrayView1;

    fn dense(rows: usize, cols: usize, seed: u64) -> LinOp {
        LinOp::from_dense(&test_batch(rows, cols, true, seed))
    }

    #[test]
    fn test_compose_shape_check() {
        let a = dense(4, 3, 1);
        let b = dense(5, 2, 2);
        let err = compose(&a, &b).unwrap_err();
        assert!(err.to_string().contains("3 != 5"));
    }

    #[test]
    fn test_compose_associativity() {
        let a = dense(3, 4, 1);
        let b = dense(4, 5, 2);
        let c = dense(5, 2, 3);
        let left = compose(&compose(&a, &b).unwrap(), &c).unwrap();
        let right = compose(&a, &compose(&b, &c).unwrap()).unwrap();
        let x = test_batch(2, 3, true, 4);
        let yl = left.apply(x.view()).unwrap();
        let yr = right.apply(x.view()).unwrap();
        assert_all_close(
            yl.as_slice().unwrap(),
            yr.as_slice().unwrap(),
            1e-12,
        );
        assert_adjoint_duality(&left, 1e-12);
    }

    #[test]
    fn test_add_sums_pointwise() {
        let a = dense(3, 3, 1);
        let sum = add(&[a.clone(), a.clone()]).unwrap();
        let x = test_batch(3, 1, true, 5);
        let y1 = a.apply(x.view()).unwrap();
        let y2 = sum.apply(x.view()).unwrap();
        for (v1, v2) in y1.iter().zip(y2.iter()) {
            assert!((v2 - *v1 * 2.0).norm() < 1e-12);
        }
        assert_adjoint_duality(&sum, 1e-12);
    }

    #[test]
    fn test_add_rejects_mixed_shapes() {
        assert!(add(&[dense(3, 3, 1), dense(2, 3, 2)]).is_err());
    }

    #[test]
    fn test_vstack_and_hstack() {
        let a = dense(2, 3, 1);
        let b = dense(4, 3, 2);
        let v = vstack(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(v.shape(), (6, 3));
        let x = test_batch(3, 2, true, 6);
        let y = v.apply(x.view()).unwrap();
        let ya = a.apply(x.view()).unwrap();
        let yb = b.apply(x.view()).unwrap();
        assert_all_close(
            y.slice(s![0..2, ..]).to_owned().as_slice().unwrap(),
            ya.as_slice().unwrap(),
            1e-12,
        );
        assert_all_close(
            y.slice(s![2..6, ..]).to_owned().as_slice().unwrap(),
            yb.as_slice().unwrap(),
            1e-12,
        );
        assert_adjoint_duality(&v, 1e-12);

        let hs = hstack(&[a.clone(), dense(2, 5, 3)]).unwrap();
        assert_eq!(hs.shape(), (2, 8));
        assert_adjoint_duality(&hs, 1e-12);
    }

    #[test]
    fn test_kron_vec_trick_matches_dense_kron() {
        let am = test_batch(2, 3, true, 1);
        let bm = test_batch(3, 2, true, 2);
        let a = LinOp::from_dense(&am);
        let b = LinOp::from_dense(&bm);
        let k = kron(&a, &b);
        assert_eq!(k.shape(), (6, 6));

        // Dense reference: kron entry [(i*br + p), (j*bc + q)] = a[i,j] b[p,q].
        let mut dense_k = Array2::zeros((6, 6));
        for i in 0..2 {
            for j in 0..3 {
                for p in 0..3 {
                    for q in 0..2 {
                        dense_k[[i * 3 + p, j * 2 + q]] = am[[i, j]] * bm[[p, q]];
                    }
                }
            }
        }
        let x = test_batch(6, 2, true, 9);
        let got = k.apply(x.view()).unwrap();
        let want = dense_k.dot(&x);
        assert_all_close(
            got.as_slice().unwrap(),
            want.as_slice().unwrap(),
            1e-12,
        );
        assert_adjoint_duality(&k, 1e-12);
    }

    #[test]
    fn test_block_diag_segments() {
        let a = dense(2, 2, 1);
        let b = dense(3, 4, 2);
        let bd = block_diag(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(bd.shape(), (5, 6));
        let x = test_batch(6, 1, true, 3);
        let y = bd.apply(x.view()).unwrap();
        let ya = a.apply(x.slice(s![0..2, ..])).unwrap();
        let yb = b.apply(x.slice(s![2..6, ..])).unwrap();
        assert_all_close(
            y.slice(s![0..2, ..]).to_owned().as_slice().unwrap(),
            ya.as_slice().unwrap(),
            1e-12,
        );
        assert_all_close(
            y.slice(s![2..5, ..]).to_owned().as_slice().unwrap(),
            yb.as_slice().unwrap(),
            1e-12,
        );
        assert_adjoint_duality(&bd, 1e-12);
    }

    #[test]
    fn test_slice_rows_selects_window() {
        let a = dense(5, 3, 1);
        let sliced = slice_rows(&a, 1, 4).unwrap();
        assert_eq!(sliced.shape(), (3, 3));
        let x = test_batch(3, 1, true, 2);
        let full = a.apply(x.view()).unwrap();
        let win = sliced.apply(x.view()).unwrap();
        assert_all_close(
            win.as_slice().unwrap(),
            full.slice(s![1..4, ..]).to_owned().as_slice().unwrap(),
            1e-12,
        );
        assert!(slice_rows(&a, 4, 4).is_err());
        assert!(slice_rows(&a, 0, 6).is_err());
    }

    #[test]
    fn test_scale_adjoint_conjugates() {
        let a = dense(3, 3, 1);
        let alpha = Complex64::new(0.5, -2.0);
        let s = scale(alpha, &a);
        assert_adjoint_duality(&s, 1e-12);
        let x = to_complex(&[1.0, 0.0, 0.0]);
        let y = s.apply_vec(ArrayView1::from(&x[..])).unwrap();
        let y0 = a.apply_vec(ArrayView1::from(&x[..])).unwrap();
        assert!((y[0] - y0[0] * alpha).norm() < 1e-12);
    }
}
