//! NumPy-style broadcasting and view/copy-classified indexing over strided buffers.
//!
//! The crate is built around a single owned storage type and a borrowed strided
//! view over it:
//!
//! # Core Types
//!
//! - [`Shape`]: Validated dimension list with row-major stride helpers
//! - [`Buffer`]: Owned, contiguous, row-major storage whose elements can be
//!   updated in place through a shared reference
//! - [`StridedView`]: Zero-copy `(buffer, dims, strides, offset)` view; a stride
//!   of 0 repeats a dimension without touching memory
//! - [`IndexResult`]: Either a view that shares the base buffer or an owned copy
//!
//! # Broadcasting
//!
//! - [`broadcast_shape`] / [`broadcast_shapes`]: Resolve the common shape of two
//!   or more operands (right-aligned, size-1 dimensions stretch)
//! - [`broadcast_view`]: Stride-0 view of a buffer at a larger target shape
//! - [`zip_map2`], [`map`], [`zip_map2_into`]: Element-wise evaluation into a
//!   freshly allocated (or caller-provided) buffer
//!
//! # Indexing
//!
//! - [`classify`] with [`IndexSpec::RangeSlice`] returns a shared view
//! - [`IndexSpec::IndexList`] (fancy indexing) and [`IndexSpec::BooleanMask`]
//!   always return an owned copy
//! - [`mask_where`] and [`masked_fill`] build masks and assign through them in place
//!
//! # Example
//!
//! ```rust
//! use strided_broadcast::{zip_map2, Buffer};
//!
//! // [[10], [20]] + [[5]]
//! let a = Buffer::from_vec(vec![10, 20], &[2, 1]).unwrap();
//! let b = Buffer::from_vec(vec![5], &[1, 1]).unwrap();
//!
//! let c = zip_map2(&a.view(), &b.view(), |x, y| x + y).unwrap();
//! assert_eq!(c.dims(), &[2, 1]);
//! assert_eq!(c.to_vec(), vec![15, 25]);
//! ```
//!
//! # View or copy
//!
//! ```rust
//! use strided_broadcast::{classify, Buffer, IndexSpec};
//!
//! let base = Buffer::<f64>::zeros(&[4, 4]);
//! let rows = classify(&base, &IndexSpec::RangeSlice(vec![0..2])).unwrap();
//! assert!(rows.is_view());
//!
//! base.set(&[0, 0], 1.0);
//! assert_eq!(rows.to_vec()[0], 1.0);
//!
//! let picked = classify(&base, &IndexSpec::take(vec![3, 0])).unwrap();
//! assert!(picked.is_copy());
//! ```

pub mod broadcast;
mod buffer;
pub mod index;
mod map;
mod mask;
mod reduce;
mod shape;
pub mod view;

pub use broadcast::{broadcast_view, promote_shape, BroadcastView};
pub use buffer::Buffer;
pub use index::{classify, IndexResult, IndexSpec};
pub use map::{map, zip_map2, zip_map2_into};
pub use mask::{mask_count, mask_where, masked_fill};
pub use reduce::{mean, reduce, sum};
pub use shape::{broadcast_shape, broadcast_shapes, row_major_strides, Shape};
pub use view::{OffsetIter, SliceIndex, StridedView};

// ============================================================================
// Constants
// ============================================================================

/// Minimum number of output elements before element-wise kernels split work
/// across rayon threads.
///
/// Only consulted when the `parallel` feature is enabled.
pub const MIN_THREAD_LENGTH: usize = 1 << 15;

// ============================================================================
// Error types
// ============================================================================

/// Errors that can occur while broadcasting, viewing, or indexing buffers.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StridedError {
    /// Two shapes cannot be broadcast together.
    #[error("incompatible shapes {lhs:?} and {rhs:?} at axis {axis}: {reason}")]
    IncompatibleShape {
        lhs: Vec<usize>,
        rhs: Vec<usize>,
        axis: usize,
        reason: String,
    },

    /// A slice, index list, or mask does not fit the base shape.
    #[error("index out of range on axis {axis}: {reason}")]
    IndexRange { axis: usize, reason: String },

    /// Element count does not match the product of the dimensions.
    #[error("buffer length mismatch: dims require {expected} elements, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Stride array length doesn't match dimensions.
    #[error("stride and dims length mismatch")]
    StrideLengthMismatch,

    /// Integer overflow while computing an element count or offset.
    #[error("offset overflow while computing element position")]
    OffsetOverflow,
}

/// Result type for strided buffer operations.
pub type Result<T> = std::result::Result<T, StridedError>;
