use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

use strided_broadcast::{
    classify, mask_count, mask_where, masked_fill, Buffer, IndexResult, IndexSpec, StridedError,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("strided_broadcast=debug"))
        .with_test_writer()
        .try_init();
}

fn make_grid(rows: usize, cols: usize) -> Buffer<f64> {
    Buffer::from_fn_row_major(&[rows, cols], |idx| (idx[0] * cols + idx[1]) as f64).unwrap()
}

#[test]
fn test_range_slice_shares_large_buffer() {
    init_tracing();
    let base = Buffer::<f64>::zeros(&[1000, 1000]);
    let rows = classify(&base, &IndexSpec::RangeSlice(vec![0..500])).unwrap();
    assert!(rows.is_view());
    assert_eq!(rows.dims(), &[500, 1000]);

    base.set(&[0, 0], 7.0);
    let view = rows.as_view().unwrap();
    assert_eq!(view.get(&[0, 0]), 7.0);
    assert!(view.shares_buffer(&base));
}

#[test]
fn test_index_list_is_independent_copy() {
    let base = make_grid(10, 4);
    let picked = classify(&base, &IndexSpec::take(vec![0, 1, 2, 7, 5])).unwrap();
    assert!(picked.is_copy());
    assert_eq!(picked.dims(), &[5, 4]);

    let before = picked.to_vec();
    base.set(&[7, 0], -1.0);
    base.set(&[0, 3], -1.0);
    assert_eq!(picked.to_vec(), before);
    assert_eq!(&before[12..16], &[28.0, 29.0, 30.0, 31.0]);
}

#[test]
fn test_boolean_mask_with_no_matches() {
    let base = Buffer::<f64>::zeros(&[1000, 1000]);
    let gt3 = mask_where(&base.view(), |x| x > 3.0);
    assert_eq!(mask_count(&gt3), 0);

    let picked = classify(&base, &IndexSpec::BooleanMask(&gt3)).unwrap();
    assert!(picked.is_copy());
    assert_eq!(picked.len(), 0);
    assert_eq!(picked.dims(), &[0]);
}

#[test]
fn test_classification_is_stable() {
    init_tracing();
    let base = make_grid(6, 3);
    let mask = mask_where(&base.view(), |x| x >= 9.0);
    let specs = [
        IndexSpec::rows(1..4),
        IndexSpec::take(vec![5, 5, 0]),
        IndexSpec::BooleanMask(&mask),
    ];
    for spec in &specs {
        let first = classify(&base, spec).unwrap();
        let second = classify(&base, spec).unwrap();
        assert_eq!(first.is_view(), second.is_view());
        assert_eq!(first.dims(), second.dims());
        assert_eq!(first.to_vec(), second.to_vec());
    }
}

#[test]
fn test_random_range_slices_match_gather() {
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);
    let base = make_grid(12, 9);
    for _ in 0..100 {
        let r0 = rng.gen_range(0..=12);
        let r1 = rng.gen_range(r0..=12);
        let c0 = rng.gen_range(0..=9);
        let c1 = rng.gen_range(c0..=9);

        let sliced = classify(&base, &IndexSpec::RangeSlice(vec![r0..r1, c0..c1])).unwrap();
        assert!(sliced.is_view());

        let rows: Vec<usize> = (r0..r1).collect();
        let gathered = classify(&base, &IndexSpec::take(rows))
            .unwrap()
            .into_owned();
        let cols: Vec<usize> = (c0..c1).collect();
        let gathered = classify(&gathered, &IndexSpec::take_along(1, cols)).unwrap();
        assert!(gathered.is_copy());

        assert_eq!(sliced.dims(), gathered.dims());
        assert_eq!(sliced.to_vec(), gathered.to_vec());
    }
}

#[test]
fn test_out_of_range_is_not_clamped() {
    let base = make_grid(4, 4);
    let err = classify(&base, &IndexSpec::RangeSlice(vec![0..4, 2..6])).unwrap_err();
    assert!(matches!(err, StridedError::IndexRange { axis: 1, .. }));

    let err = classify(&base, &IndexSpec::take(vec![1, 4])).unwrap_err();
    assert!(matches!(err, StridedError::IndexRange { axis: 0, .. }));
}

#[test]
fn test_relu_through_mask_updates_views() {
    let mut rng = StdRng::seed_from_u64(3);
    let data: Vec<f32> = (0..64).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let act = Buffer::from_vec(data.clone(), &[8, 8]).unwrap();

    let top = match classify(&act, &IndexSpec::rows(0..4)).unwrap() {
        IndexResult::SharesBuffer(view) => view,
        IndexResult::Owned(_) => panic!("row range should be a view"),
    };

    let neg = mask_where(&act.view(), |x| x < 0.0);
    let expected_writes = data.iter().filter(|&&x| x < 0.0).count();
    assert_eq!(masked_fill(&act, &neg, 0.0).unwrap(), expected_writes);

    for (got, want) in act.to_vec().iter().zip(&data) {
        assert_eq!(*got, (*want).max(0.0));
    }
    assert!(top.to_vec().iter().all(|&x| x >= 0.0));
}
