//! Element-wise evaluation over broadcast views.
//!
//! Every kernel here resolves the broadcast shape first, builds one stride-0
//! view per operand, and then walks the output in row-major order. The output
//! never aliases an input: it is either freshly allocated or taken by `&mut`.
//!
//! Operand storage is copied out before the closure first runs and no lock is
//! held while it runs. A closure may therefore write to its own inputs through
//! [`Buffer::set`]; it keeps seeing the values from the start of the call.

use tracing::trace;

use crate::broadcast::promote_shape;
use crate::buffer::Buffer;
use crate::shape::{broadcast_shape, Shape};
use crate::view::StridedView;
use crate::{Result, StridedError};

/// Apply `f` to every element of `src`, producing a new buffer of the same shape.
pub fn map<T, U, F>(src: &StridedView<'_, T>, f: F) -> Buffer<U>
where
    T: Copy + Send + Sync,
    U: Send,
    F: Fn(T) -> U + Sync,
{
    let data = src.buffer().to_vec();
    let out = fill(src, None, &data, &data, src.len(), |a, _| f(a));
    Buffer::from_parts(out, src.shape())
}

/// Broadcast `a` and `b` against each other and combine them element-wise.
///
/// The result has the broadcast shape of the two operands and is always a newly
/// allocated buffer. `a` and `b` may view the same buffer.
///
/// # Errors
/// Returns [`StridedError::IncompatibleShape`] if the shapes do not broadcast,
/// or [`StridedError::OffsetOverflow`] if the broadcast element count does not
/// fit in `usize`.
///
/// # Example
/// ```
/// use strided_broadcast::{zip_map2, Buffer};
///
/// let pred = Buffer::from_vec(vec![0.5f32, 1.5, 2.0], &[3]).unwrap();
/// let target = Buffer::from_vec(vec![1.0f32], &[]).unwrap();
///
/// let sq = zip_map2(&pred.view(), &target.view(), |p, t| (p - t) * (p - t)).unwrap();
/// assert_eq!(sq.to_vec(), vec![0.25, 0.25, 1.0]);
/// ```
pub fn zip_map2<T, U, F>(a: &StridedView<'_, T>, b: &StridedView<'_, T>, f: F) -> Result<Buffer<U>>
where
    T: Copy + Send + Sync,
    U: Send,
    F: Fn(T, T) -> U + Sync,
{
    let (target, a_view, b_view) = promote_shape(a, b)?;
    trace!(
        lhs = ?a.dims(),
        rhs = ?b.dims(),
        target = %target,
        "zip_map2"
    );

    let (a_data, b_data) = snapshot_pair(&a_view, &b_view);
    let b_data = b_data.as_deref().unwrap_or(&a_data);

    let out = fill(&a_view, Some(&b_view), &a_data, b_data, target.len(), f);
    Ok(Buffer::from_parts(out, target))
}

/// Broadcast `a` and `b` and write `f(a, b)` into `dest`.
///
/// # Errors
/// Returns [`StridedError::IncompatibleShape`] if the operands do not broadcast
/// or if `dest` does not have exactly the broadcast shape.
pub fn zip_map2_into<T, F>(
    dest: &mut Buffer<T>,
    a: &StridedView<'_, T>,
    b: &StridedView<'_, T>,
    f: F,
) -> Result<()>
where
    T: Copy,
    F: Fn(T, T) -> T,
{
    let target = broadcast_shape(a.dims(), b.dims())?;
    ensure_dest_shape(dest.shape(), &target)?;
    let a_view = a.broadcast(&target)?;
    let b_view = b.broadcast(&target)?;

    let (a_data, b_data) = snapshot_pair(&a_view, &b_view);
    let b_data = b_data.as_deref().unwrap_or(&a_data);

    for ((slot, oa), ob) in dest
        .data_mut()
        .iter_mut()
        .zip(a_view.offsets())
        .zip(b_view.offsets())
    {
        *slot = f(a_data[oa], b_data[ob]);
    }
    Ok(())
}

/// Copy both operands' storage out, once when they share a buffer.
fn snapshot_pair<T: Copy>(
    a: &StridedView<'_, T>,
    b: &StridedView<'_, T>,
) -> (Vec<T>, Option<Vec<T>>) {
    let a_data = a.buffer().to_vec();
    if b.buffer().same_storage(a.buffer()) {
        (a_data, None)
    } else {
        (a_data, Some(b.buffer().to_vec()))
    }
}

fn ensure_dest_shape(dest: &Shape, target: &Shape) -> Result<()> {
    if dest == target {
        return Ok(());
    }
    let axis = dest
        .iter()
        .zip(target.iter())
        .position(|(d, t)| d != t)
        .unwrap_or_else(|| dest.ndim().min(target.ndim()));
    Err(StridedError::IncompatibleShape {
        lhs: dest.to_vec(),
        rhs: target.to_vec(),
        axis,
        reason: "destination shape differs from the broadcast result".to_string(),
    })
}

/// Row-major evaluation of one or two same-shaped views.
///
/// With a single view the closure receives the same element twice and
/// `b_data` is not read.
fn fill<T, U, F>(
    a: &StridedView<'_, T>,
    b: Option<&StridedView<'_, T>>,
    a_data: &[T],
    b_data: &[T],
    len: usize,
    f: F,
) -> Vec<U>
where
    T: Copy + Send + Sync,
    U: Send,
    F: Fn(T, T) -> U + Sync,
{
    #[cfg(feature = "parallel")]
    if len > crate::MIN_THREAD_LENGTH {
        return fill_threaded(a, b, a_data, b_data, len, &f);
    }

    fill_range(a, b, a_data, b_data, 0, len, &f)
}

fn fill_range<T, U, F>(
    a: &StridedView<'_, T>,
    b: Option<&StridedView<'_, T>>,
    a_data: &[T],
    b_data: &[T],
    start: usize,
    end: usize,
    f: &F,
) -> Vec<U>
where
    T: Copy,
    F: Fn(T, T) -> U,
{
    let n = end.saturating_sub(start);
    let mut out = Vec::with_capacity(n);
    match b {
        Some(b) => out.extend(
            a.offsets_from(start)
                .zip(b.offsets_from(start))
                .take(n)
                .map(|(oa, ob)| f(a_data[oa], b_data[ob])),
        ),
        None => out.extend(
            a.offsets_from(start)
                .take(n)
                .map(|oa| f(a_data[oa], a_data[oa])),
        ),
    }
    out
}

#[cfg(feature = "parallel")]
fn fill_threaded<T, U, F>(
    a: &StridedView<'_, T>,
    b: Option<&StridedView<'_, T>>,
    a_data: &[T],
    b_data: &[T],
    len: usize,
    f: &F,
) -> Vec<U>
where
    T: Copy + Send + Sync,
    U: Send,
    F: Fn(T, T) -> U + Sync,
{
    use rayon::prelude::*;

    let nthreads = rayon::current_num_threads().max(1);
    let chunk = len.div_ceil(nthreads).max(crate::MIN_THREAD_LENGTH / 4);
    let nchunks = len.div_ceil(chunk);

    (0..nchunks)
        .into_par_iter()
        .map(|c| {
            let start = c * chunk;
            let end = (start + chunk).min(len);
            fill_range(a, b, a_data, b_data, start, end, f)
        })
        .flatten_iter()
        .collect()
}
