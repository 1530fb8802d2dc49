//! Full reductions over strided views.

use std::ops::Add;

use num_traits::{Float, FromPrimitive, Zero};

use crate::view::StridedView;

/// Full reduction with map function: `reduce(init, op, map.(src))`.
///
/// Elements are visited in row-major order, so stride-0 (broadcast)
/// dimensions contribute their repeated element once per position. The
/// closures run on a copy of the storage taken at the start of the call.
pub fn reduce<T, M, R, U>(src: &StridedView<'_, T>, map_fn: M, reduce_fn: R, init: U) -> U
where
    T: Copy,
    M: Fn(T) -> U,
    R: Fn(U, U) -> U,
{
    let data = src.buffer().to_vec();
    src.offsets()
        .fold(init, |acc, off| reduce_fn(acc, map_fn(data[off])))
}

/// Sum of all elements.
pub fn sum<T>(src: &StridedView<'_, T>) -> T
where
    T: Copy + Zero + Add<Output = T>,
{
    reduce(src, |x| x, |a, b| a + b, T::zero())
}

/// Arithmetic mean of all elements, or `None` for an empty view.
pub fn mean<T>(src: &StridedView<'_, T>) -> Option<T>
where
    T: Float + FromPrimitive,
{
    if src.is_empty() {
        return None;
    }
    let n = T::from_usize(src.len())?;
    Some(sum(src) / n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Buffer;
    use approx::assert_relative_eq;

    #[test]
    fn test_sum_contiguous() {
        let b = Buffer::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        assert_relative_eq!(sum(&b.view()), 10.0);
    }

    #[test]
    fn test_sum_broadcast_counts_repeats() {
        let b = Buffer::from_vec(vec![2, 3], &[2]).unwrap();
        let v = b.view().broadcast(&[4, 2]).unwrap();
        assert_eq!(sum(&v), 20);
    }

    #[test]
    fn test_reduce_max() {
        let b = Buffer::from_vec(vec![3, 9, -1, 4], &[4]).unwrap();
        let m = reduce(&b.view(), |x| x, i32::max, i32::MIN);
        assert_eq!(m, 9);
    }

    #[test]
    fn test_reduce_closure_may_write_source() {
        let b = Buffer::from_vec(vec![1, 2, 3], &[3]).unwrap();
        let total = reduce(
            &b.view(),
            |x| {
                b.set(&[2], 0);
                x
            },
            |a, c| a + c,
            0,
        );
        assert_eq!(total, 6);
        assert_eq!(b.get(&[2]), 0);
    }

    #[test]
    fn test_mean() {
        let b = Buffer::from_vec(vec![1.0f32, 2.0, 3.0, 6.0], &[4]).unwrap();
        assert_relative_eq!(mean(&b.view()).unwrap(), 3.0);
        let empty = Buffer::<f64>::zeros(&[0]);
        assert!(mean(&empty.view()).is_none());
    }
}
