//! Broadcast views.
//!
//! A broadcast view reads a buffer as if its size-1 dimensions were repeated to
//! fill a larger target shape. Nothing is copied: stretched dimensions get a
//! stride of 0, so every coordinate along them maps back to source index 0.
//!
//! # Example
//!
//! ```rust
//! use strided_broadcast::{broadcast_shape, broadcast_view, Buffer};
//!
//! let col = Buffer::from_vec(vec![10, 20], &[2, 1]).unwrap();
//! let row = Buffer::from_vec(vec![1, 2, 3], &[3]).unwrap();
//!
//! let target = broadcast_shape(col.dims(), row.dims()).unwrap();
//! let c = broadcast_view(&col, &target).unwrap();
//! let r = broadcast_view(&row, &target).unwrap();
//!
//! assert_eq!(c.get(&[1, 2]), 20);
//! assert_eq!(r.get(&[1, 2]), 3);
//! ```

use tracing::trace;

use crate::buffer::Buffer;
use crate::shape::{broadcast_shape, Shape};
use crate::view::StridedView;
use crate::Result;

/// A [`StridedView`] whose stride-0 dimensions were derived from broadcasting.
pub type BroadcastView<'a, T> = StridedView<'a, T>;

/// Broadcast the whole of `buffer` to `target`.
///
/// `target` must already be a valid broadcast result for the buffer's shape,
/// i.e. `broadcast_shape(buffer.dims(), target) == target`. A target that the
/// buffer cannot stretch to is reported as
/// [`StridedError::IncompatibleShape`](crate::StridedError::IncompatibleShape).
pub fn broadcast_view<'a, T>(
    buffer: &'a Buffer<T>,
    target: &[usize],
) -> Result<BroadcastView<'a, T>> {
    let view = buffer.view().broadcast(target)?;
    trace!(
        source = ?buffer.dims(),
        target = ?target,
        strides = ?view.strides(),
        "broadcast view"
    );
    Ok(view)
}

/// Resolve the common shape of two views and broadcast both to it.
pub fn promote_shape<'a, 'b, T, U>(
    a: &StridedView<'a, T>,
    b: &StridedView<'b, U>,
) -> Result<(Shape, BroadcastView<'a, T>, BroadcastView<'b, U>)> {
    let target = broadcast_shape(a.dims(), b.dims())?;
    let a_view = a.broadcast(&target)?;
    let b_view = b.broadcast(&target)?;
    Ok((target, a_view, b_view))
}
