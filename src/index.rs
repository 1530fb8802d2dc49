//! Indexing that reports whether the result is a view or a copy.
//!
//! The distinction is decided when the result is built, not queried afterwards:
//!
//! | [`IndexSpec`]      | result                         | why                                   |
//! |--------------------|--------------------------------|---------------------------------------|
//! | `RangeSlice`       | [`IndexResult::SharesBuffer`]  | offset + original strides describe it |
//! | `IndexList`        | [`IndexResult::Owned`]         | selected rows are not evenly strided  |
//! | `BooleanMask`      | [`IndexResult::Owned`]         | compaction is a gather                |
//!
//! # Example
//!
//! ```rust
//! use strided_broadcast::{classify, mask_where, Buffer, IndexSpec};
//!
//! let base = Buffer::<f64>::zeros(&[1000, 1000]);
//!
//! let rows = classify(&base, &IndexSpec::RangeSlice(vec![0..500])).unwrap();
//! assert!(rows.is_view());
//!
//! let fancy = classify(&base, &IndexSpec::take(vec![0, 1, 2, 7, 5])).unwrap();
//! assert!(fancy.is_copy());
//! assert_eq!(fancy.dims(), &[5, 1000]);
//!
//! let gt3 = mask_where(&base.view(), |x| x > 3.0);
//! let picked = classify(&base, &IndexSpec::BooleanMask(&gt3)).unwrap();
//! assert!(picked.is_copy());
//! assert_eq!(picked.len(), 0);
//! ```

use std::ops::Range;

use tracing::debug;

use crate::buffer::Buffer;
use crate::mask::mask_shape_error;
use crate::shape::Shape;
use crate::view::StridedView;
use crate::{Result, StridedError};

/// An index expression against a base buffer.
#[derive(Debug, Clone)]
pub enum IndexSpec<'m> {
    /// One contiguous `start..stop` per leading dimension. Dimensions without a
    /// range are kept whole.
    RangeSlice(Vec<Range<usize>>),
    /// Explicit positions along `axis`, in output order. Duplicates repeat data.
    IndexList { axis: usize, indices: Vec<usize> },
    /// Keep the entries (or trailing blocks) whose mask value is `true`. The
    /// mask shape must equal the base shape or a leading prefix of it.
    BooleanMask(&'m Buffer<bool>),
}

impl<'m> IndexSpec<'m> {
    /// Fancy indexing along axis 0.
    pub fn take(indices: Vec<usize>) -> Self {
        IndexSpec::IndexList { axis: 0, indices }
    }

    /// Fancy indexing along `axis`.
    pub fn take_along(axis: usize, indices: Vec<usize>) -> Self {
        IndexSpec::IndexList { axis, indices }
    }

    /// Row range along axis 0.
    pub fn rows(range: Range<usize>) -> Self {
        IndexSpec::RangeSlice(vec![range])
    }
}

/// Outcome of [`classify`].
#[derive(Debug)]
pub enum IndexResult<'a, T> {
    /// A view sharing the base buffer. Writes on either side are visible on
    /// the other.
    SharesBuffer(StridedView<'a, T>),
    /// An independent buffer; later writes to the base do not reach it.
    Owned(Buffer<T>),
}

impl<'a, T> IndexResult<'a, T> {
    /// Whether the result shares the base buffer.
    #[inline]
    pub fn is_view(&self) -> bool {
        matches!(self, IndexResult::SharesBuffer(_))
    }

    /// Whether the result is an independent copy.
    #[inline]
    pub fn is_copy(&self) -> bool {
        matches!(self, IndexResult::Owned(_))
    }

    pub fn dims(&self) -> &[usize] {
        match self {
            IndexResult::SharesBuffer(view) => view.dims(),
            IndexResult::Owned(buffer) => buffer.dims(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            IndexResult::SharesBuffer(view) => view.len(),
            IndexResult::Owned(buffer) => buffer.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The view, if the result shares the base buffer.
    pub fn as_view(&self) -> Option<&StridedView<'a, T>> {
        match self {
            IndexResult::SharesBuffer(view) => Some(view),
            IndexResult::Owned(_) => None,
        }
    }
}

impl<T: Copy> IndexResult<'_, T> {
    /// Elements in row-major order.
    pub fn to_vec(&self) -> Vec<T> {
        match self {
            IndexResult::SharesBuffer(view) => view.to_vec(),
            IndexResult::Owned(buffer) => buffer.to_vec(),
        }
    }

    /// Turn the result into an owned buffer, copying only if it is a view.
    pub fn into_owned(self) -> Buffer<T> {
        match self {
            IndexResult::SharesBuffer(view) => view.to_buffer(),
            IndexResult::Owned(buffer) => buffer,
        }
    }
}

/// Apply an index expression to `base`.
///
/// # Errors
/// Returns [`StridedError::IndexRange`] for reversed or out-of-bounds slice
/// ranges, out-of-bounds list entries or axis, and masks whose shape is not a
/// leading prefix of the base shape. Nothing is clamped.
pub fn classify<'a, T: Copy>(
    base: &'a Buffer<T>,
    spec: &IndexSpec<'_>,
) -> Result<IndexResult<'a, T>> {
    let result = match spec {
        IndexSpec::RangeSlice(ranges) => IndexResult::SharesBuffer(range_slice(base, ranges)?),
        IndexSpec::IndexList { axis, indices } => {
            IndexResult::Owned(index_list(base, *axis, indices)?)
        }
        IndexSpec::BooleanMask(mask) => IndexResult::Owned(boolean_mask(base, mask)?),
    };
    debug!(
        base = %base.shape(),
        view = result.is_view(),
        result = ?result.dims(),
        "classified index"
    );
    Ok(result)
}

fn range_slice<'a, T>(
    base: &'a Buffer<T>,
    ranges: &[Range<usize>],
) -> Result<StridedView<'a, T>> {
    if ranges.len() > base.ndim() {
        return Err(StridedError::IndexRange {
            axis: base.ndim(),
            reason: format!("{} slice ranges for rank {}", ranges.len(), base.ndim()),
        });
    }
    ranges
        .iter()
        .enumerate()
        .try_fold(base.view(), |view, (axis, range)| {
            view.slice_axis(axis, range.clone())
        })
}

fn index_list<T: Copy>(base: &Buffer<T>, axis: usize, indices: &[usize]) -> Result<Buffer<T>> {
    let dims = base.dims();
    let Some(&dim) = dims.get(axis) else {
        return Err(StridedError::IndexRange {
            axis,
            reason: format!("axis {axis} out of range for rank {}", dims.len()),
        });
    };
    if let Some(&bad) = indices.iter().find(|&&i| i >= dim) {
        return Err(StridedError::IndexRange {
            axis,
            reason: format!("index {bad} out of bounds for dimension size {dim}"),
        });
    }

    let mut out_dims = dims.to_vec();
    out_dims[axis] = indices.len();
    if base.is_empty() {
        // a zero dimension either stays in the output or forbids every index
        return Ok(Buffer::from_parts(Vec::new(), Shape::from(out_dims)));
    }

    let outer: usize = dims[..axis].iter().product();
    let inner: usize = dims[axis + 1..].iter().product();
    let data = base.read();
    let mut out = Vec::with_capacity(outer * indices.len() * inner);
    for o in 0..outer {
        for &i in indices {
            let start = (o * dim + i) * inner;
            out.extend_from_slice(&data[start..start + inner]);
        }
    }
    Ok(Buffer::from_parts(out, Shape::from(out_dims)))
}

fn boolean_mask<T: Copy>(base: &Buffer<T>, mask: &Buffer<bool>) -> Result<Buffer<T>> {
    let dims = base.dims();
    let k = mask.ndim();
    if k > dims.len() || mask.dims() != &dims[..k] {
        return Err(mask_shape_error(mask.dims(), dims));
    }

    // copied first so a mask indexing itself never holds two guards on one lock
    let keep = mask.to_vec();
    let count = keep.iter().filter(|&&m| m).count();
    let mut out_dims = Vec::with_capacity(1 + dims.len() - k);
    out_dims.push(count);
    out_dims.extend_from_slice(&dims[k..]);
    if base.is_empty() {
        return Ok(Buffer::from_parts(Vec::new(), Shape::from(out_dims)));
    }

    let inner: usize = dims[k..].iter().product();
    let data = base.read();
    let mut out = Vec::with_capacity(count * inner);
    for (i, &m) in keep.iter().enumerate() {
        if m {
            out.extend_from_slice(&data[i * inner..(i + 1) * inner]);
        }
    }
    Ok(Buffer::from_parts(out, Shape::from(out_dims)))
}
