extern crate blas_src;
extern crate lapack_src;

use std::sync::Arc;

use approx::assert_relative_eq;
use rand::prelude::*;
use rand::SeedableRng;
use rlst::{rlst_dynamic_array2, DynamicArray, RandomAccessMut};
use series_expansion::bound::HRectBound;
use series_expansion::far_field::FarFieldExpansion;
use series_expansion::kernel::{ExpansionOptions, GaussianKernelAux};
use series_expansion::local::LocalExpansion;

// Points sampled uniformly in a box of half width `radius` around `center`, returned both as a
// `[dim, npoints]` matrix and as a point-contiguous slice for direct summation.
fn box_fixture(
    center: &[f64],
    radius: f64,
    npoints: usize,
    seed: u64,
) -> (DynamicArray<f64, 2>, Vec<f64>) {
    let dim = center.len();
    let mut rng = StdRng::seed_from_u64(seed);
    let between = rand::distributions::Uniform::from(-radius..radius);

    let mut points = rlst_dynamic_array2!(f64, [dim, npoints]);
    let mut flat = Vec::with_capacity(dim * npoints);
    for i in 0..npoints {
        for (d, c) in center.iter().enumerate() {
            let value = c + between.sample(&mut rng);
            *points.get_mut([d, i]).unwrap() = value;
            flat.push(value);
        }
    }
    (points, flat)
}

#[test]
fn test_single_point_far_field_to_local() {
    let aux = Arc::new(GaussianKernelAux::new(2, 1.0, 10).unwrap());
    let mut point = rlst_dynamic_array2!(f64, [2, 1]);
    *point.get_mut([0, 0]).unwrap() = 0.05;
    *point.get_mut([1, 0]).unwrap() = -0.05;

    let mut far = FarFieldExpansion::new(&[0.0, 0.0], aux.clone()).unwrap();
    far.accumulate(&point, &[1.0], 0, 1, 10).unwrap();

    let mut local = LocalExpansion::new(&[1.0, 0.5], aux.clone()).unwrap();
    far.translate_to_local(&mut local).unwrap();

    let query = [1.05, 0.45];
    let dist_sq = (1.05 - 0.05_f64).powi(2) + (0.45 + 0.05_f64).powi(2);
    assert_relative_eq!(
        local.evaluate_field(&query),
        aux.kernel().evaluate_unnorm_on_sq(dist_sq),
        max_relative = 1e-8
    );
}

#[test]
fn test_two_level_pipeline() {
    let dim = 2;
    let order = 8;
    let mut options = ExpansionOptions::default();
    options
        .set_dimension(dim)
        .set_max_order(order)
        .set_bandwidth(1.0);
    let aux = Arc::new(GaussianKernelAux::from_options(&options).unwrap());

    // Two source leaves under one source parent.
    let leaf_centers = [[-0.15, 0.0], [0.15, 0.0]];
    let npoints = 40;
    let mut all_sources = Vec::new();
    let mut all_weights = Vec::new();

    let mut source_parent = FarFieldExpansion::new(&[0.0, 0.0], aux.clone()).unwrap();
    for (seed, leaf_center) in leaf_centers.iter().enumerate() {
        let (points, flat) = box_fixture(leaf_center, 0.1, npoints, seed as u64);
        let weights = (0..npoints)
            .map(|i| 0.5 + (i % 3) as f64)
            .collect::<Vec<_>>();

        let mut leaf = FarFieldExpansion::new(leaf_center, aux.clone()).unwrap();
        leaf.accumulate(&points, &weights, 0, npoints, order)
            .unwrap();
        source_parent.translate_from_far_field(&leaf).unwrap();

        all_sources.extend(flat);
        all_weights.extend(weights);
    }

    // One target parent with two target children.
    let mut target_parent = LocalExpansion::new(&[1.5, 1.0], aux.clone()).unwrap();
    target_parent
        .translate_from_far_field(&source_parent)
        .unwrap();
    assert_eq!(target_parent.order(), Some(order));

    for (seed, child_center) in [[1.45, 1.0], [1.55, 1.0]].iter().enumerate() {
        let mut child = LocalExpansion::new(child_center, aux.clone()).unwrap();
        target_parent.translate_to_local(&mut child).unwrap();

        let (_, targets) = box_fixture(child_center, 0.05, 10, 100 + seed as u64);
        let mut approx = vec![0.0; 10];
        let mut direct = vec![0.0; 10];
        child.evaluate_mt(&targets, &mut approx);
        aux.kernel()
            .evaluate_st(&all_sources, &targets, &all_weights, &mut direct);

        for (a, d) in approx.iter().zip(&direct) {
            assert_relative_eq!(a, d, max_relative = 1e-4);
        }
    }
}

#[test]
fn test_recommended_order_meets_error_bound() {
    let dim = 2;
    let aux = Arc::new(GaussianKernelAux::new(dim, 1.0, 10).unwrap());

    let npoints = 30;
    let (points, sources) = box_fixture(&[2.1, 2.1], 0.1, npoints, 7);
    let weights = vec![1.0; npoints];
    let far_region = HRectBound::from_points(dim, &sources);
    let local_region = HRectBound::from_corners(&[0.0, 0.0], &[0.1, 0.1]);

    let max_error = 1e-6;
    let mut local = LocalExpansion::new(&local_region.centroid(), aux.clone()).unwrap();
    let (order, bound) = local
        .order_for_evaluating(
            &far_region,
            &local_region,
            far_region.min_distance_sq_to(&local_region),
            far_region.max_distance_sq_to(&local_region),
            max_error,
        )
        .unwrap();
    assert!(bound <= max_error);

    local
        .accumulate(&points, &weights, 0, npoints, order)
        .unwrap();
    assert_eq!(local.order(), Some(order));

    let (_, targets) = box_fixture(&local_region.centroid(), 0.05, 20, 8);
    let mut approx = vec![0.0; 20];
    let mut direct = vec![0.0; 20];
    local.evaluate_st(&targets, &mut approx);
    aux.kernel()
        .evaluate_st(&sources, &targets, &weights, &mut direct);

    let total_weight: f64 = weights.iter().sum();
    for (a, d) in approx.iter().zip(&direct) {
        assert!((a - d).abs() <= max_error * total_weight);
    }
}
