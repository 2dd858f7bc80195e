//! Implementation of the Gaussian kernel
use log::warn;
use rayon::prelude::*;

use crate::bound::HRectBound;
use crate::kernel::{DerivativeMap, ExpansionOptions, KernelAux};
use crate::multi_index::{factorial, MultiIndexCatalog};
use crate::types::{ExpansionError, RealScalar, Result};

/// The unnormalised Gaussian kernel `exp(-|x - y|^2 / (2 h^2))`.
#[derive(Debug, Clone)]
pub struct GaussianKernel<T: RealScalar> {
    dim: usize,
    bandwidth: T,
    bandwidth_sq: T,
    neg_inv_bandwidth_2sq: T,
}

impl<T: RealScalar> GaussianKernel<T> {
    /// Create a Gaussian kernel with bandwidth `h` in `dim` dimensions.
    pub fn new(dim: usize, bandwidth: T) -> Result<Self> {
        if dim == 0 {
            return Err(ExpansionError::InvalidDimension(dim));
        }
        if !(bandwidth > T::zero() && bandwidth.is_finite()) {
            return Err(ExpansionError::InvalidBandwidth(format!("{:?}", bandwidth)));
        }
        let bandwidth_sq = bandwidth * bandwidth;
        Ok(Self {
            dim,
            bandwidth,
            bandwidth_sq,
            neg_inv_bandwidth_2sq: -T::one() / (T::from(2.0).unwrap() * bandwidth_sq),
        })
    }

    /// Space dimension.
    pub fn space_dimension(&self) -> usize {
        self.dim
    }

    /// Bandwidth `h`.
    pub fn bandwidth(&self) -> T {
        self.bandwidth
    }

    /// Squared bandwidth `h^2`.
    pub fn bandwidth_sq(&self) -> T {
        self.bandwidth_sq
    }

    /// Kernel value for a squared distance.
    pub fn evaluate_unnorm_on_sq(&self, dist_sq: T) -> T {
        (dist_sq * self.neg_inv_bandwidth_2sq).exp()
    }

    /// Kernel value for a distance.
    pub fn evaluate_unnorm_on_scalar(&self, dist: T) -> T {
        self.evaluate_unnorm_on_sq(dist * dist)
    }

    /// Single threaded direct summation `result[j] = Σ_i charges[i] K(targets[j], sources[i])`.
    ///
    /// - `sources`, `targets`: point-contiguous coordinates `[x_1, y_1, ..., x_2, y_2, ...]`.
    /// - `charges`: one weight per source.
    /// - `result`: one value per target.
    pub fn evaluate_st(&self, sources: &[T], targets: &[T], charges: &[T], result: &mut [T]) {
        check_dimensions_evaluate(self.dim, sources, targets, charges, result);
        result
            .iter_mut()
            .zip(targets.chunks_exact(self.dim))
            .for_each(|(value, target)| {
                *value = self.evaluate_one_target(target, sources, charges);
            });
    }

    /// Multi-threaded direct summation, parallelised over the targets.
    pub fn evaluate_mt(&self, sources: &[T], targets: &[T], charges: &[T], result: &mut [T]) {
        check_dimensions_evaluate(self.dim, sources, targets, charges, result);
        result
            .par_iter_mut()
            .zip(targets.par_chunks_exact(self.dim))
            .for_each(|(value, target)| {
                *value = self.evaluate_one_target(target, sources, charges);
            });
    }

    fn evaluate_one_target(&self, target: &[T], sources: &[T], charges: &[T]) -> T {
        sources
            .chunks_exact(self.dim)
            .zip(charges)
            .fold(T::zero(), |acc, (source, &charge)| {
                let dist_sq = source
                    .iter()
                    .zip(target)
                    .fold(T::zero(), |d, (&s, &t)| d + (s - t) * (s - t));
                acc + charge * self.evaluate_unnorm_on_sq(dist_sq)
            })
    }
}

fn check_dimensions_evaluate<T>(
    dim: usize,
    sources: &[T],
    targets: &[T],
    charges: &[T],
    result: &[T],
) {
    assert!(
        sources.len() % dim == 0,
        "Length of sources {} is not a multiple of space dimension {}.",
        sources.len(),
        dim
    );
    assert!(
        targets.len() % dim == 0,
        "Length of targets {} is not a multiple of space dimension {}.",
        targets.len(),
        dim
    );
    assert_eq!(
        charges.len(),
        sources.len() / dim,
        "Wrong dimension for `charges`. {} != {} ",
        charges.len(),
        sources.len() / dim,
    );
    assert_eq!(
        result.len(),
        targets.len() / dim,
        "Wrong dimension for `result`. {} != {} ",
        result.len(),
        targets.len() / dim,
    );
}

/// Gaussian kernel together with its multi-index catalog.
///
/// Derivatives are taken with respect to the displacement scaled by `sqrt(2 h^2)`, where the
/// kernel becomes `exp(-|x|^2)` and its one-dimensional derivatives are Hermite functions.
#[derive(Debug, Clone)]
pub struct GaussianKernelAux<T: RealScalar> {
    kernel: GaussianKernel<T>,
    catalog: MultiIndexCatalog<T>,
}

impl<T: RealScalar> GaussianKernelAux<T> {
    /// Create the bundle for a Gaussian of bandwidth `h` in `dim` dimensions, with expansions
    /// truncated at most at `max_order`.
    pub fn new(dim: usize, bandwidth: T, max_order: usize) -> Result<Self> {
        Ok(Self {
            kernel: GaussianKernel::new(dim, bandwidth)?,
            catalog: MultiIndexCatalog::new(dim, max_order)?,
        })
    }

    /// Create the bundle from a set of options.
    pub fn from_options(options: &ExpansionOptions<T>) -> Result<Self> {
        Self::new(options.dimension(), options.bandwidth(), options.max_order())
    }

    /// The underlying kernel.
    pub fn kernel(&self) -> &GaussianKernel<T> {
        &self.kernel
    }

    /// Smallest order `p` whose truncation error bound, scaled by `scale`, is within `max_error`
    /// for a region of the given width.
    fn order_for_width(
        &self,
        width: T,
        min_dist_sq_regions: T,
        max_error: T,
        scale: T,
    ) -> Option<(usize, T)> {
        let dim = self.catalog.dimension();
        let max_order = self.catalog.max_order();
        let two = T::from(2.0).unwrap();
        let four = T::from(4.0).unwrap();

        let frontfactor = (-min_dist_sq_regions / (four * self.kernel.bandwidth_sq())).exp();
        let r = width / (two * self.kernel.bandwidth());
        if r >= T::one() {
            return None;
        }

        let mut r_raised_to_p_alpha = T::one();
        for order in 0..max_order {
            // The error of truncating at `order` is bounded by the first omitted degree.
            let p_alpha = order + 1;
            r_raised_to_p_alpha = r_raised_to_p_alpha * r;

            let floor_fact = factorial::<T>(p_alpha / dim);
            let ceil_fact = factorial::<T>((p_alpha + dim - 1) / dim);
            let remainder = p_alpha % dim;
            let ncoeffs = T::from(self.catalog.total_num_coeffs(p_alpha).ok()?)?;

            let error = scale * frontfactor * ncoeffs * r_raised_to_p_alpha
                / (floor_fact.powi((dim - remainder) as i32) * ceil_fact.powi(remainder as i32))
                    .sqrt();

            if error <= max_error {
                return Some((order, error));
            }
        }

        warn!(
            "No truncation order up to {} achieves the error bound {:?}",
            max_order, max_error
        );
        None
    }
}

impl<T: RealScalar> KernelAux for GaussianKernelAux<T> {
    type T = T;

    fn catalog(&self) -> &MultiIndexCatalog<T> {
        &self.catalog
    }

    fn bandwidth_sq(&self) -> T {
        self.kernel.bandwidth_sq()
    }

    fn bandwidth_factor(&self, bandwidth_sq: T) -> T {
        (T::from(2.0).unwrap() * bandwidth_sq).sqrt()
    }

    fn compute_directional_derivatives(
        &self,
        x: &[T],
        derivative_map: &mut DerivativeMap<T>,
        order: usize,
    ) {
        assert!(
            derivative_map.order() >= order,
            "Derivative map of order {} cannot hold order {}",
            derivative_map.order(),
            order
        );
        assert_eq!(x.len(), derivative_map.dimension());

        let two = T::from(2.0).unwrap();

        // Hermite functions h_n(x) = H_n(x) exp(-x^2) through their three-term recurrence.
        for (d, &coord) in x.iter().enumerate() {
            let two_x = two * coord;
            let base = (-coord * coord).exp();
            *derivative_map.get_mut(d, 0) = base;
            if order > 0 {
                *derivative_map.get_mut(d, 1) = two_x * base;
            }
            for n in 1..order {
                let next = two_x * derivative_map.get(d, n)
                    - two * T::from(n).unwrap() * derivative_map.get(d, n - 1);
                *derivative_map.get_mut(d, n + 1) = next;
            }
        }
    }

    fn compute_partial_derivative(
        &self,
        derivative_map: &DerivativeMap<T>,
        multi_index: &[usize],
    ) -> T {
        multi_index
            .iter()
            .enumerate()
            .fold(T::one(), |acc, (d, &n)| acc * derivative_map.get(d, n))
    }

    fn order_for_evaluating_far_field(
        &self,
        far_field_region: &HRectBound<T>,
        _local_field_region: &HRectBound<T>,
        min_dist_sq_regions: T,
        _max_dist_sq_regions: T,
        max_error: T,
    ) -> Option<(usize, T)> {
        self.order_for_width(
            far_field_region.widest_width(),
            min_dist_sq_regions,
            max_error,
            T::one(),
        )
    }

    fn order_for_converting_to_local(
        &self,
        far_field_region: &HRectBound<T>,
        local_field_region: &HRectBound<T>,
        min_dist_sq_regions: T,
        _max_dist_sq_regions: T,
        max_error: T,
    ) -> Option<(usize, T)> {
        // Both the far-field and the local truncation contribute to the error.
        let width = far_field_region
            .widest_width()
            .max(local_field_region.widest_width());
        self.order_for_width(
            width,
            min_dist_sq_regions,
            max_error,
            T::from(2.0).unwrap(),
        )
    }

    fn order_for_evaluating_local(
        &self,
        _far_field_region: &HRectBound<T>,
        local_field_region: &HRectBound<T>,
        min_dist_sq_regions: T,
        _max_dist_sq_regions: T,
        max_error: T,
    ) -> Option<(usize, T)> {
        self.order_for_width(
            local_field_region.widest_width(),
            min_dist_sq_regions,
            max_error,
            T::one(),
        )
    }
}

#[cfg(test)]
mod test {
    use super::{GaussianKernel, GaussianKernelAux};
    use crate::bound::HRectBound;
    use crate::kernel::{ExpansionOptions, KernelAux};
    use crate::types::ExpansionError;
    use approx::assert_relative_eq;
    use rand::prelude::*;
    use rand::SeedableRng;

    #[test]
    fn test_kernel_value() {
        let kernel = GaussianKernel::new(2, 0.5).unwrap();
        assert_relative_eq!(kernel.evaluate_unnorm_on_sq(0.0), 1.0);
        assert_relative_eq!(kernel.evaluate_unnorm_on_sq(0.25), (-0.5f64).exp());
        assert_relative_eq!(kernel.evaluate_unnorm_on_scalar(0.5), (-0.5f64).exp());
    }

    #[test]
    fn test_invalid_bandwidth() {
        assert!(matches!(
            GaussianKernel::new(2, 0.0),
            Err(ExpansionError::InvalidBandwidth(_))
        ));
        assert!(matches!(
            GaussianKernel::new(2, f64::NAN),
            Err(ExpansionError::InvalidBandwidth(_))
        ));
    }

    #[test]
    fn test_evaluate_st_mt_agree() {
        let dim = 3;
        let nsources = 50;
        let ntargets = 20;
        let mut rng = StdRng::seed_from_u64(0);
        let between = rand::distributions::Uniform::from(0.0_f64..1.0_f64);

        let sources: Vec<f64> = (0..nsources * dim).map(|_| between.sample(&mut rng)).collect();
        let targets: Vec<f64> = (0..ntargets * dim).map(|_| between.sample(&mut rng)).collect();
        let charges: Vec<f64> = (0..nsources).map(|_| between.sample(&mut rng)).collect();

        let kernel = GaussianKernel::new(dim, 0.3).unwrap();
        let mut result_st = vec![0.0; ntargets];
        let mut result_mt = vec![0.0; ntargets];
        kernel.evaluate_st(&sources, &targets, &charges, &mut result_st);
        kernel.evaluate_mt(&sources, &targets, &charges, &mut result_mt);

        for (a, b) in result_st.iter().zip(&result_mt) {
            assert_relative_eq!(a, b, epsilon = 1e-14);
        }

        // Direct check of the first target.
        let target = &targets[0..dim];
        let mut expected = 0.0;
        for (source, charge) in sources.chunks_exact(dim).zip(&charges) {
            let dist_sq: f64 = source.iter().zip(target).map(|(s, t)| (s - t) * (s - t)).sum();
            expected += charge * (-dist_sq / (2.0 * 0.09)).exp();
        }
        assert_relative_eq!(result_st[0], expected, epsilon = 1e-12);
    }

    #[test]
    fn test_bandwidth_factor() {
        let aux = GaussianKernelAux::new(2, 2.0, 4).unwrap();
        assert_relative_eq!(aux.bandwidth_sq(), 4.0);
        assert_relative_eq!(aux.bandwidth_factor(aux.bandwidth_sq()), 8.0f64.sqrt());
    }

    #[test]
    fn test_hermite_derivatives() {
        let aux = GaussianKernelAux::new(2, 1.0, 4).unwrap();
        let x = [0.3, -0.7];
        let mut map = aux.allocate_derivative_map(2, 4);
        aux.compute_directional_derivatives(&x, &mut map, 4);

        for (d, &t) in x.iter().enumerate() {
            let e = (-t * t).exp();
            assert_relative_eq!(map.get(d, 0), e, epsilon = 1e-14);
            assert_relative_eq!(map.get(d, 1), 2.0 * t * e, epsilon = 1e-14);
            assert_relative_eq!(map.get(d, 2), (4.0 * t * t - 2.0) * e, epsilon = 1e-14);
            assert_relative_eq!(
                map.get(d, 3),
                (8.0 * t * t * t - 12.0 * t) * e,
                epsilon = 1e-14
            );
            assert_relative_eq!(
                map.get(d, 4),
                (16.0 * t.powi(4) - 48.0 * t * t + 12.0) * e,
                epsilon = 1e-13
            );
        }

        let partial = aux.compute_partial_derivative(&map, &[2, 1]);
        assert_relative_eq!(partial, map.get(0, 2) * map.get(1, 1), epsilon = 1e-14);
    }

    #[test]
    fn test_hermite_matches_finite_difference() {
        // h_n(x) = (-1)^n d^n/dx^n exp(-x^2); check n = 1 and n = 2 numerically.
        let aux = GaussianKernelAux::new(1, 1.0, 2).unwrap();
        let x = 0.4_f64;
        let eps = 1e-4;
        let f = |t: f64| (-t * t).exp();

        let mut map = aux.allocate_derivative_map(1, 2);
        aux.compute_directional_derivatives(&[x], &mut map, 2);

        let first = (f(x + eps) - f(x - eps)) / (2.0 * eps);
        let second = (f(x + eps) - 2.0 * f(x) + f(x - eps)) / (eps * eps);
        assert_relative_eq!(map.get(0, 1), -first, epsilon = 1e-6);
        assert_relative_eq!(map.get(0, 2), second, epsilon = 1e-5);
    }

    #[test]
    fn test_order_selection() {
        let aux = GaussianKernelAux::new(2, 1.0, 10).unwrap();
        let near = HRectBound::from_corners(&[0.0, 0.0], &[0.2, 0.2]);
        let far = HRectBound::from_corners(&[3.0, 3.0], &[3.2, 3.2]);
        let min_dist_sq = near.min_distance_sq_to(&far);
        let max_dist_sq = near.max_distance_sq_to(&far);

        let (loose, loose_error) = aux
            .order_for_evaluating_local(&far, &near, min_dist_sq, max_dist_sq, 1e-2)
            .unwrap();
        let (tight, tight_error) = aux
            .order_for_evaluating_local(&far, &near, min_dist_sq, max_dist_sq, 1e-8)
            .unwrap();
        assert!(loose <= tight);
        assert!(loose_error <= 1e-2);
        assert!(tight_error <= 1e-8);

        let (conversion, _) = aux
            .order_for_converting_to_local(&far, &near, min_dist_sq, max_dist_sq, 1e-8)
            .unwrap();
        assert!(conversion >= tight);

        // A region as wide as twice the bandwidth never converges.
        let wide = HRectBound::from_corners(&[0.0, 0.0], &[2.0, 2.0]);
        assert!(aux
            .order_for_evaluating_far_field(&wide, &near, min_dist_sq, max_dist_sq, 1e-2)
            .is_none());

        // Unreachable precision within the maximum order.
        assert!(aux
            .order_for_evaluating_local(&far, &near, 0.0, max_dist_sq, 1e-300)
            .is_none());
    }

    #[test]
    fn test_from_options() {
        let mut options = ExpansionOptions::default();
        options.set_dimension(2).set_max_order(5).set_bandwidth(0.5);
        let aux = GaussianKernelAux::from_options(&options).unwrap();
        assert_eq!(aux.dimension(), 2);
        assert_eq!(aux.catalog().max_order(), 5);
        assert_relative_eq!(aux.bandwidth_sq(), 0.25);

        options.set_dimension(0);
        assert_eq!(
            GaussianKernelAux::from_options(&options).unwrap_err(),
            ExpansionError::InvalidDimension(0)
        );
    }
}
