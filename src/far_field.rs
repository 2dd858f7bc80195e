//! Far-field (multipole) expansions of a Gaussian kernel sum.
//!
//! The far-field expansion of the points `x_r` of a region with center `x_R` is
//!
//! `f(x_q) ≈ Σ_α a_α ∂-basis_α((x_q - x_R) / s)`, `a_α = Σ_r w_r ((x_r - x_R) / s)^α / α!`
//!
//! where the basis functions are the partial derivatives supplied by the kernel bundle (Hermite
//! functions for the Gaussian). It is the source of
//! [LocalExpansion::translate_from_far_field](crate::local::LocalExpansion::translate_from_far_field).
use std::sync::Arc;

use log::debug;
use num::Float;
use rlst::{RandomAccessByRef, Shape};

use crate::common::{check_dimension, check_point_range, compute_monomials, raised_order, SplitSum};
use crate::kernel::KernelAux;
use crate::local::LocalExpansion;
use crate::types::Result;

/// Truncated far-field expansion around a fixed center.
#[derive(Debug, Clone)]
pub struct FarFieldExpansion<A: KernelAux> {
    center: Vec<A::T>,
    order: Option<usize>,
    coeffs: Vec<A::T>,
    aux: Arc<A>,
}

impl<A: KernelAux> FarFieldExpansion<A> {
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

    /// Current truncation order, `None` for an expansion without contributions.
    pub fn order(&self) -> Option<usize> {
        self.order
    }

    /// Raise the truncation order to at least `order`.
    pub fn raise_order(&mut self, order: usize) -> Result<()> {
        self.order = Some(raised_order(self.order, order, self.aux.catalog().max_order())?);
        Ok(())
    }

    /// Coefficients, indexed by catalog id.
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

    /// Add the points `begin..end` of `points` (shape `[dim, npoints]`) with their `weights`.
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

        let bandwidth_factor = aux.bandwidth_factor(aux.bandwidth_sq());
        let inv_multiindex_factorials = catalog.inv_multiindex_factorials();
        let mut x_r = vec![num::zero::<A::T>(); dim];
        let mut monomials = vec![num::zero::<A::T>(); ncoeffs];

        for r in begin..end {
            for (d, x) in x_r.iter_mut().enumerate() {
                *x = (*points.get([d, r]).unwrap() - self.center[d]) / bandwidth_factor;
            }
            compute_monomials(&x_r, order, &mut monomials);

            let weight = weights[r];
            for (j, coeff) in self.coeffs.iter_mut().enumerate().take(ncoeffs) {
                *coeff = *coeff + weight * monomials[j] * inv_multiindex_factorials[j];
            }
        }

        Ok(())
    }

    /// Evaluate the expansion at `x_q`. An expansion without contributions evaluates to zero.
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
        let catalog = aux.catalog();
        let ncoeffs = catalog.num_coeffs(order);
        let bandwidth_factor = aux.bandwidth_factor(aux.bandwidth_sq());

        let x_q_minus_x_r = x_q
            .iter()
            .zip(&self.center)
            .map(|(&q, &c)| (q - c) / bandwidth_factor)
            .collect::<Vec<_>>();

        let mut derivative_map = aux.allocate_derivative_map(dim, order);
        aux.compute_directional_derivatives(&x_q_minus_x_r, &mut derivative_map, order);

        let mut sum = SplitSum::new();
        for (j, &coeff) in self.coeffs.iter().enumerate().take(ncoeffs) {
            let derivative =
                aux.compute_partial_derivative(&derivative_map, catalog.multi_index(j));
            sum.add(coeff * derivative);
        }
        sum.total()
    }

    /// Re-center the far-field expansion `source` onto this expansion's center and add it.
    ///
    /// `a_β += Σ_{α ≤ β} a'_α e^(β - α) / (β - α)!` with `e = (x_R' - x_R) / s`.
    pub fn translate_from_far_field(&mut self, source: &FarFieldExpansion<A>) -> Result<()> {
        let dim = self.aux.dimension();
        check_dimension(dim, source.center.len())?;

        let Some(source_order) = source.order else {
            return Ok(());
        };
        self.raise_order(source_order)?;
        let order = self.order.unwrap_or(source_order);

        let aux = &*self.aux;
        let catalog = aux.catalog();
        let ncoeffs = catalog.num_coeffs(order);
        let source_ncoeffs = catalog.num_coeffs(source_order);
        debug!(
            "Far-field to far-field translation of order {} into order {}",
            source_order, order
        );

        let bandwidth_factor = aux.bandwidth_factor(aux.bandwidth_sq());
        let center_diff = source
            .center
            .iter()
            .zip(&self.center)
            .map(|(&old, &new)| (old - new) / bandwidth_factor)
            .collect::<Vec<_>>();

        for (j, coeff) in self.coeffs.iter_mut().enumerate().take(ncoeffs) {
            let beta_mapping = catalog.multi_index(j);
            let mut sum = SplitSum::new();

            for &k in catalog.lower_mapping(j) {
                if k >= source_ncoeffs {
                    break;
                }
                let alpha_mapping = catalog.multi_index(k);
                let factor = beta_mapping
                    .iter()
                    .zip(alpha_mapping)
                    .zip(&center_diff)
                    .fold(num::one::<A::T>(), |acc, ((&b, &a), &c)| {
                        acc * c.powi((b - a) as i32) / catalog.factorial(b - a)
                    });
                sum.add(source.coeffs[k] * factor);
            }

            *coeff = *coeff + sum.total();
        }

        Ok(())
    }

    /// Convert this expansion into a local expansion and add it to `local`.
    pub fn translate_to_local(&self, local: &mut LocalExpansion<A>) -> Result<()> {
        local.translate_from_far_field(self)
    }
}
