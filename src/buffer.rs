//! Owned row-major storage.

use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::shape::Shape;
use crate::view::StridedView;
use crate::{Result, StridedError};

/// Owned, contiguous, row-major buffer.
///
/// The element count is fixed at construction and always equals the product of
/// the shape. Elements can be written through a shared reference
/// ([`Buffer::set`]), so views borrowed from the buffer observe later writes.
/// Each write takes the buffer's write lock for that single call only.
pub struct Buffer<T> {
    data: RwLock<Vec<T>>,
    shape: Shape,
    strides: Vec<isize>,
}

impl<T> Buffer<T> {
    /// Create a buffer from row-major data.
    ///
    /// # Errors
    /// Returns [`StridedError::LengthMismatch`] if `data.len()` is not the
    /// product of `dims`, or [`StridedError::OffsetOverflow`] if that product
    /// overflows.
    pub fn from_vec(data: Vec<T>, dims: &[usize]) -> Result<Self> {
        let shape = Shape::new(dims);
        let expected = shape.checked_len().ok_or(StridedError::OffsetOverflow)?;
        if data.len() != expected {
            return Err(StridedError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self::from_parts(data, shape))
    }

    /// Create a buffer with values produced by a function.
    ///
    /// The function is called with indices in row-major iteration order.
    pub fn from_fn_row_major(dims: &[usize], mut f: impl FnMut(&[usize]) -> T) -> Result<Self> {
        let shape = Shape::new(dims);
        let total = shape.checked_len().ok_or(StridedError::OffsetOverflow)?;
        let rank = dims.len();
        let mut data = Vec::with_capacity(total);
        let mut idx = vec![0usize; rank];
        for _ in 0..total {
            data.push(f(&idx));
            for d in (0..rank).rev() {
                idx[d] += 1;
                if idx[d] < dims[d] {
                    break;
                }
                idx[d] = 0;
            }
        }
        Ok(Self::from_parts(data, shape))
    }

    pub(crate) fn from_parts(data: Vec<T>, shape: Shape) -> Self {
        let strides = shape.row_major_strides();
        Self {
            data: RwLock::new(data),
            shape,
            strides,
        }
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    /// Row-major strides of the storage.
    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.ndim()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.shape.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Full zero-copy view over this buffer.
    pub fn view(&self) -> StridedView<'_, T> {
        StridedView::full(self)
    }

    /// Mutable access to the storage without locking.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [T] {
        self.data.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    /// Consume the buffer, returning the row-major data.
    pub fn into_vec(self) -> Vec<T> {
        self.data
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether `self` and `other` are the same storage.
    #[inline]
    pub fn same_storage(&self, other: &Buffer<T>) -> bool {
        std::ptr::eq(self, other)
    }

    // Element values are plain data, so a panic while a lock was held cannot
    // leave the vector half-updated; poisoning is ignored.
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Vec<T>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Linear position of a row-major index.
    ///
    /// # Panics
    /// Panics if the index has the wrong rank or is out of bounds.
    fn linear_index(&self, indices: &[usize]) -> usize {
        assert_eq!(indices.len(), self.ndim(), "wrong number of indices");
        let mut idx = 0usize;
        for (i, &index) in indices.iter().enumerate() {
            assert!(
                index < self.dims()[i],
                "index {} out of bounds for dim {}",
                index,
                self.dims()[i]
            );
            idx += index * self.strides[i] as usize;
        }
        idx
    }
}

impl<T: Clone> Buffer<T> {
    /// Create a buffer with every element set to `value`.
    pub fn filled(dims: &[usize], value: T) -> Result<Self> {
        let shape = Shape::new(dims);
        let total = shape.checked_len().ok_or(StridedError::OffsetOverflow)?;
        Ok(Self::from_parts(vec![value; total], shape))
    }

    /// Copy the elements out in row-major order.
    pub fn to_vec(&self) -> Vec<T> {
        self.read().clone()
    }
}

impl<T: Clone + Default> Buffer<T> {
    /// Create a buffer filled with `T::default()`.
    ///
    /// # Panics
    /// Panics if the element count overflows `usize`.
    pub fn zeros(dims: &[usize]) -> Self {
        let shape = Shape::new(dims);
        let total = shape.len();
        Self::from_parts(vec![T::default(); total], shape)
    }
}

impl<T: Copy> Buffer<T> {
    /// Get an element by multi-dimensional index.
    ///
    /// # Panics
    /// Panics if the index has the wrong rank or is out of bounds.
    pub fn get(&self, indices: &[usize]) -> T {
        let idx = self.linear_index(indices);
        self.read()[idx]
    }

    /// Set an element by multi-dimensional index.
    ///
    /// The write is visible through every view borrowed from this buffer.
    ///
    /// # Panics
    /// Panics if the index has the wrong rank or is out of bounds.
    pub fn set(&self, indices: &[usize], value: T) {
        let idx = self.linear_index(indices);
        self.write()[idx] = value;
    }
}

impl<T: Clone> Clone for Buffer<T> {
    fn clone(&self) -> Self {
        Self::from_parts(self.to_vec(), self.shape.clone())
    }
}

impl<T: fmt::Debug> fmt::Debug for Buffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("dims", &self.shape)
            .field("data", &*self.read())
            .finish()
    }
}
