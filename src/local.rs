//! Local (Taylor) expansions of a Gaussian kernel sum.
//!
//! A local expansion approximates `f(x_q) = Σ_r w_r K(x_q, x_r)` for queries near its center
//! `x_Q` by the truncated series
//!
//! `f(x_q) ≈ Σ_β c_β ((x_q - x_Q) / s)^β`
//!
//! where `s` is the bandwidth factor of the kernel and `β` runs over the multi-indices of the
//! shared [MultiIndexCatalog](crate::multi_index::MultiIndexCatalog) up to the current order.
//! Contributions arrive either directly from weighted points, from a far-field expansion of a
//! well separated region, or from a local expansion of an enclosing region. All three are
//! additive updates of the coefficients.
use std::fmt;
use std::sync::Arc;

use log::{debug, trace};
use num::Float;
use rayon::prelude::*;
use rlst::{RandomAccessByRef, Shape};

use crate::bound::HRectBound;
use crate::common::{check_dimension, check_point_range, compute_monomials, raised_order, SplitSum};
use crate::far_field::FarFieldExpansion;
use crate::kernel::KernelAux;
use crate::types::{ExpansionError, Result};

/// Truncated Taylor expansion around a fixed center.
#[derive(Debug, Clone)]
pub struct LocalExpansion<A: KernelAux> {
    center: Vec<A::T>,

    /// `None` until the first contribution arrives.
    order: Option<usize>,

    /// One coefficient per catalog id up to the maximum order.
    coeffs: Vec<A::T>,

    aux: Arc<A>,
}

impl<A: KernelAux> LocalExpansion<A> {
    /// Create an empty expansion around `center`.
    pub fn new(center: &[A::T], aux: Arc<A>) -> Result<Self> {
        check_dimension(aux.dimension(), center.len())?;
        let ncoeffs = aux.catalog().max_total_num_coeffs();
        Ok(Self {
            center: center.to_vec(),
            order: None,
            coeffs: vec![num::zero::<A::T>(); ncoeffs],
            aux,
        })
    }

    /// Create an empty expansion centered at the origin.
    pub fn from_aux(aux: Arc<A>) -> Self {
        let dim = aux.dimension();
        let ncoeffs = aux.catalog().max_total_num_coeffs();
        Self {
            center: vec![num::zero::<A::T>(); dim],
            order: None,
            coeffs: vec![num::zero::<A::T>(); ncoeffs],
            aux,
        }
    }

    /// Center of the expansion.
    pub fn center(&self) -> &[A::T] {
        &self.center
    }

    /// Move the center. Only allowed while the expansion holds no contributions.
    pub fn set_center(&mut self, center: &[A::T]) -> Result<()> {
        check_dimension(self.aux.dimension(), center.len())?;
        if self.order.is_some() {
            return Err(ExpansionError::CenterFixed);
        }
        self.center.copy_from_slice(center);
        Ok(())
    }

    /// Current truncation order, `None` for an expansion without contributions.
    pub fn order(&self) -> Option<usize> {
        self.order
    }

    /// Raise the truncation order to at least `order`. The order never decreases.
    pub fn raise_order(&mut self, order: usize) -> Result<()> {
        self.order = Some(raised_order(self.order, order, self.aux.catalog().max_order())?);
        Ok(())
    }

    /// Coefficients, indexed by catalog id. Ids beyond the current order are zero.
    pub fn coeffs(&self) -> &[A::T] {
        &self.coeffs
    }

    /// The kernel bundle of this expansion.
    pub fn aux(&self) -> &Arc<A> {
        &self.aux
    }

    /// Squared bandwidth of the kernel.
    pub fn bandwidth_sq(&self) -> A::T {
        self.aux.bandwidth_sq()
    }

    /// Add the contributions of the points `begin..end` of `points` (shape `[dim, npoints]`,
    /// one point per column) with the matching `weights`.
    ///
    /// `c_β += w_r (-1)^|β| / β! ∂^β K((x_Q - x_r) / s)` for every `β` up to the current order,
    /// after the order has been raised to at least `order`.
    pub fn accumulate<Array2>(
        &mut self,
        points: &Array2,
        weights: &[A::T],
        begin: usize,
        end: usize,
        order: usize,
    ) -> Result<()>
    where
        Array2: RandomAccessByRef<2, Item = A::T> + Shape<2>,
    {
        let dim = self.aux.dimension();
        check_point_range(dim, points, weights, begin, end)?;
        self.raise_order(order)?;

        let aux = &*self.aux;
        let catalog = aux.catalog();
        let order = self.order.unwrap_or(order);
        let ncoeffs = catalog.num_coeffs(order);
        trace!(
            "Accumulating {} points into local expansion of order {} ({} coefficients)",
            end - begin,
            order,
            ncoeffs
        );

        let bandwidth_factor = aux.bandwidth_factor(aux.bandwidth_sq());
        let neg_inv_multiindex_factorials = catalog.neg_inv_multiindex_factorials();
        let mut derivative_map = aux.allocate_derivative_map(dim, order);
        let mut x_r_minus_x_q = vec![num::zero::<A::T>(); dim];

        for r in begin..end {
            for (d, x) in x_r_minus_x_q.iter_mut().enumerate() {
                *x = (self.center[d] - *points.get([d, r]).unwrap()) / bandwidth_factor;
            }

            aux.compute_directional_derivatives(&x_r_minus_x_q, &mut derivative_map, order);

            let weight = weights[r];
            for (j, coeff) in self.coeffs.iter_mut().enumerate().take(ncoeffs) {
                let derivative =
                    aux.compute_partial_derivative(&derivative_map, catalog.multi_index(j));
                *coeff = *coeff + neg_inv_multiindex_factorials[j] * weight * derivative;
            }
        }

        Ok(())
    }

    /// Evaluate the series at `x_q`. An expansion without contributions evaluates to zero.
    pub fn evaluate_field(&self, x_q: &[A::T]) -> A::T {
        let Some(order) = self.order else {
            return num::zero::<A::T>();
        };

        let dim = self.aux.dimension();
        assert_eq!(
            x_q.len(),
            dim,
            "Query of dimension {} for an expansion of dimension {}",
            x_q.len(),
            dim
        );

        let aux = &*self.aux;
        let ncoeffs = aux.catalog().num_coeffs(order);
        let bandwidth_factor = aux.bandwidth_factor(aux.bandwidth_sq());

        let x_big_q_to_x_q = x_q
            .iter()
            .zip(&self.center)
            .map(|(&q, &c)| (q - c) / bandwidth_factor)
            .collect::<Vec<_>>();

        let mut monomials = vec![num::zero::<A::T>(); ncoeffs];
        compute_monomials(&x_big_q_to_x_q, order, &mut monomials);

        self.coeffs
            .iter()
            .zip(&monomials)
            .fold(num::zero::<A::T>(), |sum, (&c, &m)| sum + c * m)
    }

    /// Evaluate the series at several point-contiguous targets `[x_1, y_1, ..., x_2, ...]`.
    pub fn evaluate_st(&self, targets: &[A::T], result: &mut [A::T]) {
        let dim = self.aux.dimension();
        check_dimensions_evaluate(dim, targets, result);
        result
            .iter_mut()
            .zip(targets.chunks_exact(dim))
            .for_each(|(value, target)| *value = self.evaluate_field(target));
    }

    /// Multi-threaded version of [Self::evaluate_st], parallelised over the targets.
    pub fn evaluate_mt(&self, targets: &[A::T], result: &mut [A::T]) {
        let dim = self.aux.dimension();
        check_dimensions_evaluate(dim, targets, result);
        result
            .par_iter_mut()
            .zip(targets.par_chunks_exact(dim))
            .for_each(|(value, target)| *value = self.evaluate_field(target));
    }

    /// Order needed for this expansion to represent the points of `far_field_region` over
    /// `local_field_region` within `max_error`, with the achieved error bound.
    pub fn order_for_evaluating(
        &self,
        far_field_region: &HRectBound<A::T>,
        local_field_region: &HRectBound<A::T>,
        min_dist_sq_regions: A::T,
        max_dist_sq_regions: A::T,
        max_error: A::T,
    ) -> Option<(usize, A::T)> {
        self.aux.order_for_evaluating_local(
            far_field_region,
            local_field_region,
            min_dist_sq_regions,
            max_dist_sq_regions,
            max_error,
        )
    }

    /// Add the far-field expansion `far` to this expansion.
    ///
    /// `c_β += (-1)^|β| / β! Σ_α a_α h_{α+β}((x_Q - x_R) / s)`, with the positive and negative
    /// products of each inner sum accumulated separately.
    pub fn translate_from_far_field(&mut self, far: &FarFieldExpansion<A>) -> Result<()> {
        let dim = self.aux.dimension();
        check_dimension(dim, far.center().len())?;

        let Some(far_order) = far.order() else {
            return Ok(());
        };
        self.raise_order(far_order)?;
        let order = self.order.unwrap_or(far_order);

        let aux = &*self.aux;
        let catalog = aux.catalog();
        let ncoeffs = catalog.num_coeffs(order);
        let far_ncoeffs = catalog.num_coeffs(far_order);
        debug!(
            "Far-field to local translation: {} x {} coefficients",
            ncoeffs, far_ncoeffs
        );

        let bandwidth_factor = aux.bandwidth_factor(far.bandwidth_sq());
        let cent_diff = self
            .center
            .iter()
            .zip(far.center())
            .map(|(&local, &far)| (local - far) / bandwidth_factor)
            .collect::<Vec<_>>();

        // Multi-indices up to degree order + far_order appear in the sums below.
        let mut derivative_map = aux.allocate_derivative_map(dim, 2 * order);
        aux.compute_directional_derivatives(&cent_diff, &mut derivative_map, 2 * order);

        let far_coeffs = far.coeffs();
        let neg_inv_multiindex_factorials = catalog.neg_inv_multiindex_factorials();
        let mut beta_plus_alpha = vec![0; dim];

        for (j, coeff) in self.coeffs.iter_mut().enumerate().take(ncoeffs) {
            let beta_mapping = catalog.multi_index(j);
            let mut sum = SplitSum::new();

            for (k, &far_coeff) in far_coeffs.iter().enumerate().take(far_ncoeffs) {
                let alpha_mapping = catalog.multi_index(k);
                for d in 0..dim {
                    beta_plus_alpha[d] = beta_mapping[d] + alpha_mapping[d];
                }
                let derivative_factor =
                    aux.compute_partial_derivative(&derivative_map, &beta_plus_alpha);
                sum.add(far_coeff * derivative_factor);
            }

            *coeff = *coeff + sum.total() * neg_inv_multiindex_factorials[j];
        }

        Ok(())
    }

    /// Re-center this expansion onto the center of `target` and add it there.
    ///
    /// `c'_α += Σ_{β ≥ α} c_β C(β, α) ((x_Q' - x_Q) / s)^(β - α)`. The target order is raised
    /// first; the dominance list of each `α` is then scanned up to the target's coefficient
    /// count. Does nothing if this expansion holds no contributions.
    pub fn translate_to_local(&self, target: &mut LocalExpansion<A>) -> Result<()> {
        let Some(order) = self.order else {
            return Ok(());
        };

        let dim = self.aux.dimension();
        check_dimension(dim, target.center.len())?;

        target.raise_order(order)?;
        let target_order = target.order.unwrap_or(order);

        let aux = &*self.aux;
        let catalog = aux.catalog();
        let ncoeffs = catalog.num_coeffs(order);
        // Coefficients of this expansion beyond its own catalog are zero.
        let limit = catalog.num_coeffs(target_order.min(catalog.max_order()));
        debug!(
            "Local to local translation of order {} into order {}",
            order, target_order
        );

        let bandwidth_factor = aux.bandwidth_factor(aux.bandwidth_sq());
        let center_diff = target
            .center
            .iter()
            .zip(&self.center)
            .map(|(&new, &old)| (new - old) / bandwidth_factor)
            .collect::<Vec<_>>();

        for (j, new_coeff) in target.coeffs.iter_mut().enumerate().take(ncoeffs) {
            let alpha_mapping = catalog.multi_index(j);
            let upper_mappings_for_alpha = catalog.upper_mapping(j);
            let multichoose = catalog.upper_multichoose(j);
            let mut sum = SplitSum::new();

            for (&k, &n_multichoose_k) in upper_mappings_for_alpha.iter().zip(multichoose) {
                // The list is sorted, so no later entry is within the target's range either.
                if k >= limit {
                    break;
                }

                let beta_mapping = catalog.multi_index(k);
                let diff = beta_mapping
                    .iter()
                    .zip(alpha_mapping)
                    .zip(&center_diff)
                    .fold(num::one::<A::T>(), |acc, ((&b, &a), &c)| {
                        acc * c.powi((b - a) as i32)
                    });

                sum.add(self.coeffs[k] * diff * n_multichoose_k);
            }

            *new_coeff = *new_coeff + sum.total();
        }

        Ok(())
    }
}

fn check_dimensions_evaluate<T>(dim: usize, targets: &[T], result: &[T]) {
    assert!(
        targets.len() % dim == 0,
        "Length of targets {} is not a multiple of space dimension {}.",
        targets.len(),
        dim
    );
    assert_eq!(
        result.len(),
        targets.len() / dim,
        "Wrong dimension for `result`. {} != {} ",
        result.len(),
        targets.len() / dim,
    );
}

impl<A: KernelAux> fmt::Display for LocalExpansion<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dim = self.aux.dimension();
        let catalog = self.aux.catalog();
        let ncoeffs = self.order.map_or(0, |order| catalog.num_coeffs(order));

        writeln!(f, "----- SERIESEXPANSION ------")?;
        writeln!(f, "Local expansion")?;
        write!(f, "Center: ")?;
        for c in &self.center {
            write!(f, "{:?} ", c)?;
        }
        writeln!(f)?;

        write!(f, "f(")?;
        for d in 0..dim {
            write!(f, "x_q{}", d)?;
            if d + 1 < dim {
                write!(f, ",")?;
            }
        }
        write!(f, ") = \\sum\\limits_{{x_r \\in R}} K(||x_q - x_r||) = ")?;

        for j in 0..ncoeffs {
            write!(f, "{:?}", self.coeffs[j])?;
            for (d, exponent) in catalog.multi_index(j).iter().enumerate() {
                write!(f, "(x_q{} - ({:?}))^{} ", d, self.center[d], exponent)?;
            }
            if j + 1 < ncoeffs {
                write!(f, " + ")?;
            }
        }
        writeln!(f)
    }
}
