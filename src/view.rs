//! Dynamic-rank strided views over a [`Buffer`].
//!
//! A [`StridedView`] is `(buffer, dims, strides, offset)`. It borrows the buffer
//! and never owns or copies it:
//!
//! - Zero-copy slicing along any axis ([`StridedView::slice_axis`])
//! - Stride-0 broadcasting of size-1 dimensions ([`StridedView::broadcast`])
//! - Row-major offset iteration ([`OffsetIter`]) for element-wise kernels

use std::fmt;
use std::ops::{Range, RangeFrom, RangeFull, RangeInclusive, RangeTo};
use std::sync::Arc;

use smallvec::SmallVec;

use crate::buffer::Buffer;
use crate::shape::{element_count, Shape};
use crate::{Result, StridedError};

// ============================================================================
// Validation helpers
// ============================================================================

/// Validate that all accessed offsets stay within `[0, len)`.
fn validate_bounds(len: usize, dims: &[usize], strides: &[isize], offset: isize) -> Result<()> {
    if dims.len() != strides.len() {
        return Err(StridedError::StrideLengthMismatch);
    }
    // Empty array - no access needed
    if dims.iter().any(|&d| d == 0) {
        return Ok(());
    }
    checked_count(dims)?;
    let mut min_offset = offset;
    let mut max_offset = offset;
    for (&dim, &stride) in dims.iter().zip(strides.iter()) {
        if dim > 1 {
            let end = stride
                .checked_mul(dim as isize - 1)
                .ok_or(StridedError::OffsetOverflow)?;
            if end >= 0 {
                max_offset = max_offset
                    .checked_add(end)
                    .ok_or(StridedError::OffsetOverflow)?;
            } else {
                min_offset = min_offset
                    .checked_add(end)
                    .ok_or(StridedError::OffsetOverflow)?;
            }
        }
    }
    if min_offset < 0 || max_offset < 0 {
        return Err(StridedError::OffsetOverflow);
    }
    if max_offset as usize >= len {
        return Err(StridedError::OffsetOverflow);
    }
    Ok(())
}

/// Element count of a non-empty view, which must fit in `usize` even when
/// stride-0 dimensions repeat a single element.
fn checked_count(dims: &[usize]) -> Result<usize> {
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or(StridedError::OffsetOverflow)
}

// ============================================================================
// StridedView
// ============================================================================

/// Dynamic-rank strided view borrowing a [`Buffer`].
///
/// The element at index `i` lives at `offset + Σ i[d] * strides[d]` in the
/// buffer's row-major storage. A stride of 0 repeats the same source element
/// along that dimension.
///
/// Writes to the buffer (through [`Buffer::set`] or [`StridedView::set`]) are
/// visible through every view of it.
pub struct StridedView<'a, T> {
    buffer: &'a Buffer<T>,
    dims: Arc<[usize]>,
    strides: Arc<[isize]>,
    offset: isize,
}

impl<T> Clone for StridedView<'_, T> {
    fn clone(&self) -> Self {
        Self {
            buffer: self.buffer,
            dims: self.dims.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
        }
    }
}

impl<T> fmt::Debug for StridedView<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StridedView")
            .field("dims", &self.dims)
            .field("strides", &self.strides)
            .field("offset", &self.offset)
            .finish()
    }
}

impl<'a, T> StridedView<'a, T> {
    /// Create a view with explicit dims, strides and offset.
    ///
    /// # Errors
    /// Returns an error if the view would address elements outside the buffer.
    pub fn new(
        buffer: &'a Buffer<T>,
        dims: &[usize],
        strides: &[isize],
        offset: isize,
    ) -> Result<Self> {
        validate_bounds(buffer.len(), dims, strides, offset)?;
        Ok(Self {
            buffer,
            dims: Arc::from(dims),
            strides: Arc::from(strides),
            offset,
        })
    }

    pub(crate) fn full(buffer: &'a Buffer<T>) -> Self {
        Self {
            buffer,
            dims: Arc::from(buffer.dims()),
            strides: Arc::from(buffer.strides()),
            offset: 0,
        }
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    #[inline]
    pub fn offset(&self) -> isize {
        self.offset
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        element_count(&self.dims)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dims.iter().any(|&d| d == 0)
    }

    #[inline]
    pub fn shape(&self) -> Shape {
        Shape::new(&self.dims)
    }

    /// The buffer this view borrows.
    #[inline]
    pub fn buffer(&self) -> &'a Buffer<T> {
        self.buffer
    }

    /// Whether this view reads from `buffer`'s storage.
    #[inline]
    pub fn shares_buffer(&self, buffer: &Buffer<T>) -> bool {
        self.buffer.same_storage(buffer)
    }

    /// Check if the view is contiguous in memory (row-major order).
    pub fn is_contiguous(&self) -> bool {
        let mut expected = 1isize;
        for i in (0..self.ndim()).rev() {
            if self.dims[i] <= 1 {
                continue;
            }
            if self.strides[i] != expected {
                return false;
            }
            expected *= self.dims[i] as isize;
        }
        true
    }

    /// Storage offset of a multi-dimensional index.
    ///
    /// # Panics
    /// Panics if the index has the wrong rank or any coordinate is out of
    /// range. Both indicate a caller bug, not a data error.
    #[inline]
    pub fn linear_index(&self, indices: &[usize]) -> usize {
        assert_eq!(indices.len(), self.dims.len(), "wrong number of indices");
        let mut idx = self.offset;
        for (i, &index) in indices.iter().enumerate() {
            assert!(
                index < self.dims[i],
                "index {} out of bounds for dim {}",
                index,
                self.dims[i]
            );
            idx += index as isize * self.strides[i];
        }
        idx as usize
    }

    /// Storage offsets of every element in row-major order.
    pub fn offsets(&self) -> OffsetIter {
        self.offsets_from(0)
    }

    /// Storage offsets in row-major order, starting at flat position `start`.
    pub fn offsets_from(&self, start: usize) -> OffsetIter {
        OffsetIter::new(self.dims.clone(), self.strides.clone(), self.offset, start)
    }

    /// Broadcast this view to a target shape.
    ///
    /// Shapes are right-aligned. New leading dimensions and size-1 dimensions
    /// that stretch get stride 0; every other dimension must already match.
    /// Only the `O(rank)` metadata is allocated.
    ///
    /// # Errors
    /// Returns [`StridedError::IncompatibleShape`] if a dimension cannot
    /// stretch, or [`StridedError::OffsetOverflow`] if the target's element
    /// count does not fit in `usize`.
    pub fn broadcast(&self, target_dims: &[usize]) -> Result<StridedView<'a, T>> {
        let rank = self.ndim();
        if target_dims.len() < rank {
            return Err(StridedError::IncompatibleShape {
                lhs: self.dims.to_vec(),
                rhs: target_dims.to_vec(),
                axis: 0,
                reason: format!(
                    "cannot broadcast rank {} to lower rank {}",
                    rank,
                    target_dims.len()
                ),
            });
        }

        if !target_dims.contains(&0) {
            checked_count(target_dims)?;
        }

        let pad = target_dims.len() - rank;
        let mut new_strides = vec![0isize; target_dims.len()];
        for i in 0..rank {
            let src = self.dims[i];
            let dst = target_dims[pad + i];
            if src == dst {
                new_strides[pad + i] = self.strides[i];
            } else if src != 1 {
                return Err(StridedError::IncompatibleShape {
                    lhs: self.dims.to_vec(),
                    rhs: target_dims.to_vec(),
                    axis: pad + i,
                    reason: format!("source size {src} cannot stretch to {dst}"),
                });
            }
        }

        Ok(StridedView {
            buffer: self.buffer,
            dims: Arc::from(target_dims),
            strides: Arc::from(new_strides),
            offset: self.offset,
        })
    }

    /// Restrict one axis to a contiguous sub-range, sharing the buffer.
    ///
    /// # Errors
    /// Returns [`StridedError::IndexRange`] if `axis` is not a dimension of the
    /// view, or if the range is reversed or extends past the dimension. Ranges
    /// are never clamped.
    pub fn slice_axis<I: SliceIndex>(&self, axis: usize, index: I) -> Result<StridedView<'a, T>> {
        let Some(&dim) = self.dims.get(axis) else {
            return Err(StridedError::IndexRange {
                axis,
                reason: format!("axis {axis} out of range for rank {}", self.ndim()),
            });
        };
        let range = index.to_range(dim);
        if range.start > range.end {
            return Err(StridedError::IndexRange {
                axis,
                reason: format!("slice start {} exceeds stop {}", range.start, range.end),
            });
        }
        if range.end > dim {
            return Err(StridedError::IndexRange {
                axis,
                reason: format!("slice stop {} exceeds dimension size {dim}", range.end),
            });
        }

        let mut new_dims = self.dims.to_vec();
        new_dims[axis] = range.end - range.start;
        let new_offset = if range.start < range.end {
            self.offset + range.start as isize * self.strides[axis]
        } else {
            self.offset
        };

        Ok(StridedView {
            buffer: self.buffer,
            dims: Arc::from(new_dims),
            strides: self.strides.clone(),
            offset: new_offset,
        })
    }
}

impl<T: Copy> StridedView<'_, T> {
    /// Get an element.
    ///
    /// Costs `O(rank)` regardless of the view's size.
    ///
    /// # Panics
    /// Panics if the index has the wrong rank or is out of bounds.
    pub fn get(&self, indices: &[usize]) -> T {
        let idx = self.linear_index(indices);
        self.buffer.read()[idx]
    }

    /// Set an element. The write lands in the shared buffer.
    ///
    /// On a broadcast view every position that aliases the same source
    /// element observes the write.
    ///
    /// # Panics
    /// Panics if the index has the wrong rank or is out of bounds.
    pub fn set(&self, indices: &[usize], value: T) {
        let idx = self.linear_index(indices);
        self.buffer.write()[idx] = value;
    }

    /// Gather the elements in row-major order into a new vector.
    ///
    /// Contiguous views are copied as one slice.
    pub fn to_vec(&self) -> Vec<T> {
        if self.is_empty() {
            return Vec::new();
        }
        let data = self.buffer.read();
        if self.is_contiguous() {
            let start = self.offset as usize;
            return data[start..start + self.len()].to_vec();
        }
        self.offsets().map(|off| data[off]).collect()
    }

    /// Materialize the view into a new contiguous buffer.
    pub fn to_buffer(&self) -> Buffer<T> {
        Buffer::from_parts(self.to_vec(), self.shape())
    }
}

// ============================================================================
// Offset iteration
// ============================================================================

/// Iterator over the storage offsets of a view in row-major order (last
/// index varies fastest).
///
/// The offset is updated incrementally, so each step is amortized `O(1)`.
pub struct OffsetIter {
    dims: Arc<[usize]>,
    strides: Arc<[isize]>,
    indices: SmallVec<[usize; 4]>,
    pos: isize,
    remaining: usize,
}

impl OffsetIter {
    fn new(dims: Arc<[usize]>, strides: Arc<[isize]>, offset: isize, start: usize) -> Self {
        let total = element_count(&dims);
        let mut indices: SmallVec<[usize; 4]> = SmallVec::from_elem(0, dims.len());
        let mut pos = offset;
        if start < total {
            // total > 0 here, so no dimension is zero
            let mut rem = start;
            for i in (0..dims.len()).rev() {
                indices[i] = rem % dims[i];
                rem /= dims[i];
                pos += indices[i] as isize * strides[i];
            }
        }
        Self {
            dims,
            strides,
            indices,
            pos,
            remaining: total.saturating_sub(start),
        }
    }
}

impl Iterator for OffsetIter {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.pos as usize;
        self.remaining -= 1;

        if self.remaining > 0 {
            for i in (0..self.dims.len()).rev() {
                self.indices[i] += 1;
                self.pos += self.strides[i];
                if self.indices[i] < self.dims[i] {
                    break;
                }
                self.pos -= self.strides[i] * self.dims[i] as isize;
                self.indices[i] = 0;
            }
        }

        Some(current)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for OffsetIter {}

// ============================================================================
// Slice indices
// ============================================================================

/// Types that can select a contiguous range along one axis.
pub trait SliceIndex {
    /// Convert to a range given the dimension size.
    fn to_range(&self, dim_size: usize) -> Range<usize>;
}

impl SliceIndex for RangeFull {
    fn to_range(&self, dim_size: usize) -> Range<usize> {
        0..dim_size
    }
}

impl SliceIndex for Range<usize> {
    fn to_range(&self, _dim_size: usize) -> Range<usize> {
        self.clone()
    }
}

impl SliceIndex for RangeFrom<usize> {
    fn to_range(&self, dim_size: usize) -> Range<usize> {
        self.start..dim_size
    }
}

impl SliceIndex for RangeTo<usize> {
    fn to_range(&self, _dim_size: usize) -> Range<usize> {
        0..self.end
    }
}

impl SliceIndex for RangeInclusive<usize> {
    fn to_range(&self, _dim_size: usize) -> Range<usize> {
        *self.start()..self.end().saturating_add(1)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn iota(dims: &[usize]) -> Buffer<f64> {
        let n: usize = dims.iter().product();
        Buffer::from_vec((0..n).map(|x| x as f64).collect(), dims).unwrap()
    }

    #[test]
    fn test_strided_view_new() {
        let b = iota(&[2, 3]);
        let view = StridedView::new(&b, &[2, 3], &[3, 1], 0).unwrap();
        assert_eq!(view.ndim(), 2);
        assert_eq!(view.dims(), &[2, 3]);
        assert_eq!(view.strides(), &[3, 1]);
        assert_eq!(view.len(), 6);
        assert!(view.is_contiguous());
    }

    #[test]
    fn test_strided_view_col_major() {
        let b = iota(&[6]);
        let view = StridedView::new(&b, &[2, 3], &[1, 2], 0).unwrap();
        assert_eq!(view.get(&[0, 0]), 0.0);
        assert_eq!(view.get(&[1, 0]), 1.0);
        assert_eq!(view.get(&[0, 1]), 2.0);
        assert_eq!(view.get(&[1, 2]), 5.0);
        assert!(!view.is_contiguous());
        assert_eq!(view.to_vec(), vec![0.0, 2.0, 4.0, 1.0, 3.0, 5.0]);
    }

    #[test]
    fn test_to_vec_contiguous_slice() {
        let b = iota(&[4, 3]);
        let rows = b.view().slice_axis(0, 1..3).unwrap();
        assert!(rows.is_contiguous());
        assert_eq!(rows.to_vec(), vec![3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);

        let cols = b.view().slice_axis(1, 1..2).unwrap();
        assert!(!cols.is_contiguous());
        assert_eq!(cols.to_vec(), vec![1.0, 4.0, 7.0, 10.0]);

        let empty = StridedView::new(&b, &[0, 3], &[3, 1], 50).unwrap();
        assert!(empty.to_vec().is_empty());
    }

    #[test]
    fn test_element_count_overflow_rejected() {
        let big = 1usize << 40;
        let b = iota(&[1]);
        assert!(matches!(
            StridedView::new(&b, &[big, big], &[0, 0], 0),
            Err(StridedError::OffsetOverflow)
        ));
        assert!(matches!(
            b.view().broadcast(&[big, big]),
            Err(StridedError::OffsetOverflow)
        ));
        let empty = b.view().broadcast(&[big, big, 0]).unwrap();
        assert_eq!(empty.len(), 0);
        assert_eq!(empty.offsets().count(), 0);
    }

    #[test]
    fn test_new_rejects_out_of_bounds() {
        let b = iota(&[5]);
        assert!(matches!(
            StridedView::new(&b, &[2, 3], &[3, 1], 0),
            Err(StridedError::OffsetOverflow)
        ));
        assert!(matches!(
            StridedView::new(&b, &[2], &[1, 1], 0),
            Err(StridedError::StrideLengthMismatch)
        ));
        assert!(StridedView::new(&b, &[0, 3], &[3, 1], 0).is_ok());
    }

    #[test]
    fn test_validate_bounds_with_offset() {
        assert!(validate_bounds(7, &[2, 3], &[3, 1], 1).is_ok());
        assert!(validate_bounds(6, &[2, 3], &[3, 1], 1).is_err());
        assert!(validate_bounds(3, &[3], &[-1], 2).is_ok());
        assert!(validate_bounds(3, &[3], &[-1], 1).is_err());
    }

    #[test]
    fn test_broadcast_row_vector() {
        let b = Buffer::from_vec(vec![1.0, 2.0, 3.0], &[1, 3]).unwrap();
        let broad = b.view().broadcast(&[4, 3]).unwrap();
        assert_eq!(broad.dims(), &[4, 3]);
        assert_eq!(broad.strides(), &[0, 1]);
        for i in 0..4 {
            assert_eq!(broad.get(&[i, 0]), 1.0);
            assert_eq!(broad.get(&[i, 1]), 2.0);
            assert_eq!(broad.get(&[i, 2]), 3.0);
        }
    }

    #[test]
    fn test_broadcast_adds_leading_dims() {
        let b = Buffer::from_vec(vec![7, 8], &[2]).unwrap();
        let broad = b.view().broadcast(&[3, 1, 2]).unwrap();
        assert_eq!(broad.strides(), &[0, 0, 1]);
        assert_eq!(broad.to_vec(), vec![7, 8, 7, 8, 7, 8]);
        assert!(broad.shares_buffer(&b));
    }

    #[test]
    fn test_broadcast_incompatible() {
        let b = iota(&[2, 3]);
        let err = b.view().broadcast(&[2, 4]).unwrap_err();
        assert!(matches!(
            err,
            StridedError::IncompatibleShape { axis: 1, .. }
        ));
        assert!(b.view().broadcast(&[3]).is_err());
    }

    #[test]
    fn test_broadcast_to_empty() {
        let b = Buffer::from_vec(vec![1], &[1]).unwrap();
        let empty = b.view().broadcast(&[0]).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.offsets().count(), 0);
        assert!(empty.to_vec().is_empty());
    }

    #[test]
    fn test_slice_axis() {
        let b = iota(&[4, 3]);
        let v = b.view().slice_axis(0, 1..3).unwrap();
        assert_eq!(v.dims(), &[2, 3]);
        assert_eq!(v.offset(), 3);
        assert_eq!(v.to_vec(), vec![3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);

        let col = v.slice_axis(1, 2..).unwrap();
        assert_eq!(col.dims(), &[2, 1]);
        assert_eq!(col.to_vec(), vec![5.0, 8.0]);

        let all = b.view().slice_axis(1, ..).unwrap();
        assert_eq!(all.dims(), &[4, 3]);
        let incl = b.view().slice_axis(0, 0..=1).unwrap();
        assert_eq!(incl.dims(), &[2, 3]);
    }

    #[test]
    fn test_slice_axis_errors() {
        let b = iota(&[4, 3]);
        assert!(matches!(
            b.view().slice_axis(2, ..),
            Err(StridedError::IndexRange { axis: 2, .. })
        ));
        #[allow(clippy::reversed_empty_ranges)]
        let reversed = b.view().slice_axis(0, 3..1);
        assert!(matches!(
            reversed,
            Err(StridedError::IndexRange { axis: 0, .. })
        ));
        assert!(b.view().slice_axis(1, 0..4).is_err());
        assert!(b.view().slice_axis(1, ..=3).is_err());
    }

    #[test]
    fn test_slice_then_broadcast() {
        let b = iota(&[3, 4]);
        let row = b.view().slice_axis(0, 2..3).unwrap();
        let broad = row.broadcast(&[2, 4]).unwrap();
        assert_eq!(
            broad.to_vec(),
            vec![8.0, 9.0, 10.0, 11.0, 8.0, 9.0, 10.0, 11.0]
        );
    }

    #[test]
    fn test_set_through_view() {
        let b = Buffer::<i32>::zeros(&[2, 2]);
        let v = b.view().slice_axis(0, 1..2).unwrap();
        v.set(&[0, 1], 5);
        assert_eq!(b.get(&[1, 1]), 5);
    }

    #[test]
    fn test_offsets_from() {
        let b = iota(&[2, 3]);
        let v = b.view();
        let tail: Vec<usize> = v.offsets_from(4).collect();
        assert_eq!(tail, vec![4, 5]);
        assert_eq!(v.offsets_from(6).count(), 0);
        assert_eq!(v.offsets_from(9).len(), 0);

        let t = StridedView::new(&b, &[3, 2], &[1, 3], 0).unwrap();
        let all: Vec<usize> = t.offsets().collect();
        assert_eq!(all, vec![0, 3, 1, 4, 2, 5]);
        let mid: Vec<usize> = t.offsets_from(3).collect();
        assert_eq!(mid, vec![4, 2, 5]);
    }

    #[test]
    fn test_scalar_view() {
        let b = Buffer::from_vec(vec![3.5], &[]).unwrap();
        let v = b.view();
        assert_eq!(v.len(), 1);
        assert_eq!(v.get(&[]), 3.5);
        assert_eq!(v.offsets().collect::<Vec<_>>(), vec![0]);
        let broad = v.broadcast(&[2, 2]).unwrap();
        assert_eq!(broad.to_vec(), vec![3.5; 4]);
    }

    #[test]
    #[should_panic(expected = "wrong number of indices")]
    fn test_get_wrong_rank() {
        let b = iota(&[2, 2]);
        b.view().get(&[0]);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_broadcast_get_out_of_bounds() {
        let b = Buffer::from_vec(vec![1.0], &[1]).unwrap();
        let v = b.view().broadcast(&[3]).unwrap();
        v.get(&[3]);
    }
}
