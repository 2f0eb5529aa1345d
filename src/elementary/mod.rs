//! Elementary lazy operators.
//!
//! Shifted identities, reversals, diagonal scaling, decimation, slice
//! selection, block padding and overlap-add reassembly. These are the
//! zero-cost building blocks the spectral, convolution and wavelet
//! constructors compose; none of them stores a matrix.

use ndarray::{s, ArrayView2};
use num_complex::Complex64;

use crate::error::{Error, Result};
use crate::op::{zeros, DType, LinOp};

pub mod boundary;

/// Shifted rectangular identity of shape `(rows, cols)`.
///
/// Forward copies `x[i + k]` into `y[i]` where the index is in range and
/// leaves zeros elsewhere; the adjoint scatters back. Used pervasively as
/// the "extract or place a contiguous window" primitive: `eye(m, n, k)`
/// extracts `m` samples starting at `k >= 0`, and `eye(n, m, -k)` places
/// `m` samples at offset `k` inside a length-`n` zero vector.
pub fn eye(rows: usize, cols: usize, k: isize) -> LinOp {
    let forward = move |x: ArrayView2<Complex64>| {
        let mut y = zeros(rows, x.ncols());
        for i in 0..rows {
            let j = i as isize + k;
            if j >= 0 && (j as usize) < cols {
                y.row_mut(i).assign(&x.row(j as usize));
            }
        }
        Ok(y)
    };
    let adjoint = move |x: ArrayView2<Complex64>| {
        let mut y = zeros(cols, x.ncols());
        for i in 0..rows {
            let j = i as isize + k;
            if j >= 0 && (j as usize) < cols {
                y.row_mut(j as usize).assign(&x.row(i));
            }
        }
        Ok(y)
    };
    LinOp::new(rows, cols, DType::Real, forward, adjoint)
}

/// Full reversal of a length-`n` vector; self-adjoint.
pub fn anti_identity(n: usize) -> Result<LinOp> {
    if n < 2 {
        return Err(Error::InvalidArgument {
            arg: "n",
            reason: format!("got {n}, expected n >= 2"),
        });
    }
    flip(n, 0, Some(n))
}

/// Reverse the window `[start, end)` of a length-`n` vector, identity
/// elsewhere; self-adjoint.
pub fn flip(n: usize, start: usize, end: Option<usize>) -> Result<LinOp> {
    let end = end.unwrap_or(n);
    if start > n {
        return Err(Error::InvalidArgument {
            arg: "start",
            reason: format!("got {start}, expected start <= {n}"),
        });
    }
    if end < 1 || end > n {
        return Err(Error::InvalidArgument {
            arg: "end",
            reason: format!("got {end}, expected 1 <= end <= {n}"),
        });
    }
    if end <= start {
        return Err(Error::InvalidArgument {
            arg: "end",
            reason: format!("got end {end} <= start {start}"),
        });
    }
    let apply = move |x: ArrayView2<Complex64>| {
        let mut y = x.to_owned();
        for i in start..end {
            y.row_mut(i).assign(&x.row(end - 1 - (i - start)));
        }
        Ok(y)
    };
    Ok(LinOp::new(n, n, DType::Real, apply, apply))
}

/// Pointwise multiplication by a fixed vector; the adjoint multiplies by
/// the elementwise conjugate.
pub fn diag(values: &[Complex64]) -> LinOp {
    let n = values.len();
    let dtype = DType::of_slice(values);
    let v: Vec<Complex64> = values.to_vec();
    let vc: Vec<Complex64> = values.iter().map(|c| c.conj()).collect();
    let forward = move |x: ArrayView2<Complex64>| {
        let mut y = x.to_owned();
        for (i, &vi) in v.iter().enumerate() {
            y.row_mut(i).mapv_inplace(|e| e * vi);
        }
        Ok(y)
    };
    let adjoint = move |x: ArrayView2<Complex64>| {
        let mut y = x.to_owned();
        for (i, &vi) in vc.iter().enumerate() {
            y.row_mut(i).mapv_inplace(|e| e * vi);
        }
        Ok(y)
    };
    LinOp::new(n, n, dtype, forward, adjoint)
}

/// Keep `x[start + i * every]` for indices below `end` (default `n`).
///
/// Shape is `(ceil((end - start) / every), n)`; the adjoint scatters the
/// kept samples back to their original positions in a length-`n` zero
/// vector.
pub fn decimate(n: usize, start: usize, end: Option<usize>, every: usize) -> Result<LinOp> {
    if every < 1 {
        return Err(Error::InvalidArgument {
            arg: "every",
            reason: format!("got {every}, expected every >= 1"),
        });
    }
    let end = end.unwrap_or(n);
    if start > n {
        return Err(Error::InvalidArgument {
            arg: "start",
            reason: format!("got {start}, expected start <= {n}"),
        });
    }
    if end > n {
        return Err(Error::InvalidArgument {
            arg: "end",
            reason: format!("got {end}, expected end <= {n}"),
        });
    }
    if end <= start {
        return Err(Error::InvalidArgument {
            arg: "end",
            reason: format!("got end {end} <= start {start}"),
        });
    }
    let kept = (end - start).div_ceil(every);
    let forward = move |x: ArrayView2<Complex64>| {
        let mut y = zeros(kept, x.ncols());
        for i in 0..kept {
            y.row_mut(i).assign(&x.row(start + i * every));
        }
        Ok(y)
    };
    let adjoint = move |x: ArrayView2<Complex64>| {
        let mut y = zeros(n, x.ncols());
        for i in 0..kept {
            y.row_mut(start + i * every).assign(&x.row(i));
        }
        Ok(y)
    };
    Ok(LinOp::new(kept, n, DType::Real, forward, adjoint))
}

/// Concatenate multiple disjoint closed intervals `[start_i, end_i]` of a
/// length-`n` vector, in input order.
///
/// Intervals must be strictly increasing (`end[i-1] < start[i]`) and lie
/// inside `[0, n)`. The adjoint places each extracted segment back at its
/// original offset; disjointness rules out aliasing.
pub fn mslices(n: usize, starts: &[usize], ends: &[usize]) -> Result<LinOp> {
    if starts.len() != ends.len() {
        return Err(Error::InvalidArgument {
            arg: "starts/ends",
            reason: format!(
                "got {} starts and {} ends, expected equal lengths",
                starts.len(),
                ends.len()
            ),
        });
    }
    if starts.is_empty() {
        return Err(Error::InvalidArgument {
            arg: "starts",
            reason: "expected at least one interval".to_string(),
        });
    }
    let mut total = 0usize;
    for (i, (&s0, &e0)) in starts.iter().zip(ends.iter()).enumerate() {
        if e0 < s0 {
            return Err(Error::InvalidArgument {
                arg: "ends",
                reason: format!("interval {i}: end {e0} < start {s0}"),
            });
        }
        if e0 >= n {
            return Err(Error::InvalidArgument {
                arg: "ends",
                reason: format!("interval {i}: end {e0} >= input length {n}"),
            });
        }
        if i > 0 && ends[i - 1] >= s0 {
            return Err(Error::InvalidArgument {
                arg: "starts",
                reason: format!(
                    "interval {i}: start {s0} must exceed previous end {}",
                    ends[i - 1]
                ),
            });
        }
        total += e0 - s0 + 1;
    }
    let starts: Vec<usize> = starts.to_vec();
    let ends: Vec<usize> = ends.to_vec();
    let (s2, e2) = (starts.clone(), ends.clone());
    let forward = move |x: ArrayView2<Complex64>| {
        let mut y = zeros(total, x.ncols());
        let mut offset = 0;
        for (&s0, &e0) in starts.iter().zip(ends.iter()) {
            let len = e0 - s0 + 1;
            y.slice_mut(s![offset..offset + len, ..])
                .assign(&x.slice(s![s0..=e0, ..]));
            offset += len;
        }
        Ok(y)
    };
    let adjoint = move |x: ArrayView2<Complex64>| {
        let mut y = zeros(n, x.ncols());
        let mut offset = 0;
        for (&s0, &e0) in s2.iter().zip(e2.iter()) {
            let len = e0 - s0 + 1;
            y.slice_mut(s![s0..=e0, ..])
                .assign(&x.slice(s![offset..offset + len, ..]));
            offset += len;
        }
        Ok(y)
    };
    Ok(LinOp::new(total, n, DType::Real, forward, adjoint))
}

/// Append `pad_after` zeros to each of `count` equal-length blocks.
///
/// Shape is `((block + pad_after) * count, block * count)`. This is the
/// per-block padding stage in front of blocked spectral convolution.
pub fn mpad(block: usize, count: usize, pad_after: usize) -> Result<LinOp> {
    if block < 1 || count < 1 {
        return Err(Error::InvalidArgument {
            arg: "block/count",
            reason: format!("got block {block}, count {count}, expected both >= 1"),
        });
    }
    let out = (block + pad_after) * count;
    let inp = block * count;
    let forward = move |x: ArrayView2<Complex64>| {
        let mut y = zeros(out, x.ncols());
        for c in 0..count {
            y.slice_mut(s![c * (block + pad_after)..c * (block + pad_after) + block, ..])
                .assign(&x.slice(s![c * block..(c + 1) * block, ..]));
        }
        Ok(y)
    };
    let adjoint = move |x: ArrayView2<Complex64>| {
        let mut y = zeros(inp, x.ncols());
        for c in 0..count {
            y.slice_mut(s![c * block..(c + 1) * block, ..]).assign(
                &x.slice(s![c * (block + pad_after)..c * (block + pad_after) + block, ..]),
            );
        }
        Ok(y)
    };
    Ok(LinOp::new(out, inp, DType::Real, forward, adjoint))
}

/// Overlap-add reassembly of `count` blocks of length `block`.
///
/// The trailing `overlap` samples of block `i` are summed into the leading
/// `overlap` samples of block `i + 1`; block 0 is copied unchanged. Shape
/// is `(block * count - (count - 1) * overlap, block * count)`.
pub fn overlap_add(block: usize, count: usize, overlap: usize) -> Result<LinOp> {
    if block == 0 {
        return Err(Error::InvalidArgument {
            arg: "block",
            reason: "got 0, expected a strictly positive block length".to_string(),
        });
    }
    if count == 0 {
        return Err(Error::InvalidArgument {
            arg: "count",
            reason: "got 0, expected a strictly positive block count".to_string(),
        });
    }
    if overlap > block {
        return Err(Error::InvalidArgument {
            arg: "overlap",
            reason: format!("got {overlap}, expected overlap <= block ({block})"),
        });
    }
    let out = block * count - (count - 1) * overlap;
    let inp = block * count;
    let hop = block - overlap;
    let forward = move |x: ArrayView2<Complex64>| {
        let mut y = zeros(out, x.ncols());
        y.slice_mut(s![0..block, ..]).assign(&x.slice(s![0..block, ..]));
        let mut offset = hop;
        for i in 1..count {
            let mut window = y.slice_mut(s![offset..offset + block, ..]);
            window += &x.slice(s![i * block..(i + 1) * block, ..]);
            offset += hop;
        }
        Ok(y)
    };
    let adjoint = move |x: ArrayView2<Complex64>| {
        let mut y = zeros(inp, x.ncols());
        for i in 0..count {
            y.slice_mut(s![i * block..(i + 1) * block, ..])
                .assign(&x.slice(s![i * hop..i * hop + block, ..]));
        }
        Ok(y)
    };
    Ok(LinOp::new(out, inp, DType::Real, forward, adjoint))
}

/// Replicate overlapping frames of a length-`n` signal into one long
/// vector of `nwindows * window` samples.
///
/// Built as a vertical stack of shifted identities, one per frame, with
/// `nwindows = 1 + (n - window) / nhop`; the adjoint gathers overlapping
/// frames back by summation. This is the window-scatter stage of the
/// short-time Fourier transform.
pub fn scatter_windows(n: usize, window: usize, nhop: usize) -> Result<LinOp> {
    if window == 0 || window > n {
        return Err(Error::InvalidArgument {
            arg: "window",
            reason: format!("got {window}, expected 0 < window <= signal length {n}"),
        });
    }
    if nhop == 0 || nhop > window {
        return Err(Error::InvalidArgument {
            arg: "nhop",
            reason: format!("got {nhop}, expected 0 < nhop <= window ({window})"),
        });
    }
    let nwindows = 1 + (n - window) / nhop;
    let frames: Vec<LinOp> = (0..nwindows)
        .map(|i| eye(window, n, (i * nhop) as isize))
        .collect();
    crate::op::algebra::vstack(&frames)
}
