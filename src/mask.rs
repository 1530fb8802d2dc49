//! Boolean masks: building them from a predicate and assigning through them.

use crate::buffer::Buffer;
use crate::view::StridedView;
use crate::{Result, StridedError};

/// Evaluate `pred` on every element of `src`, producing a mask of the same shape.
///
/// `pred` runs without holding the buffer's lock, on a copy taken at the start
/// of the call.
pub fn mask_where<T, P>(src: &StridedView<'_, T>, pred: P) -> Buffer<bool>
where
    T: Copy,
    P: Fn(T) -> bool,
{
    let data = src.buffer().to_vec();
    let out = src.offsets().map(|off| pred(data[off])).collect();
    Buffer::from_parts(out, src.shape())
}

/// Number of `true` entries in a mask.
pub fn mask_count(mask: &Buffer<bool>) -> usize {
    mask.read().iter().filter(|&&m| m).count()
}

/// Write `value` to every element of `dst` whose mask entry is `true`.
///
/// The assignment happens in place and is visible through every view of `dst`.
/// Returns the number of elements written.
///
/// The mask is copied before `dst` is locked for writing, so no call ever
/// holds two locks and a buffer may be filled through itself.
///
/// # Errors
/// Returns [`StridedError::IndexRange`] if the mask shape differs from the
/// buffer shape.
pub fn masked_fill<T: Copy>(dst: &Buffer<T>, mask: &Buffer<bool>, value: T) -> Result<usize> {
    if mask.dims() != dst.dims() {
        return Err(mask_shape_error(mask.dims(), dst.dims()));
    }
    let keep = mask.to_vec();
    Ok(fill_where(&mut dst.write(), &keep, value))
}

fn fill_where<T: Copy>(data: &mut [T], keep: &[bool], value: T) -> usize {
    let mut written = 0;
    for (slot, &k) in data.iter_mut().zip(keep) {
        if k {
            *slot = value;
            written += 1;
        }
    }
    written
}

pub(crate) fn mask_shape_error(mask: &[usize], base: &[usize]) -> StridedError {
    let axis = mask
        .iter()
        .zip(base.iter())
        .position(|(m, b)| m != b)
        .unwrap_or_else(|| mask.len().min(base.len()));
    StridedError::IndexRange {
        axis,
        reason: format!("mask shape {mask:?} does not match base shape {base:?}"),
    }
}
