//! Kernel auxiliary data consumed by the series expansions.
//!
//! An expansion never evaluates its kernel in closed form. It asks a [KernelAux] bundle for the
//! bandwidth scaling, for tables of partial derivatives at a displacement and for the truncation
//! order that meets an error bound. The bundle also owns the shared [MultiIndexCatalog].
pub mod gaussian;

pub use gaussian::{GaussianKernel, GaussianKernelAux};

use crate::bound::HRectBound;
use crate::multi_index::MultiIndexCatalog;
use crate::types::RealScalar;

/// Table of one-dimensional derivatives, `dimension x (order + 1)`.
///
/// The table is a workspace allocated by the caller for a single accumulation or translation
/// and filled by [KernelAux::compute_directional_derivatives].
#[derive(Debug, Clone)]
pub struct DerivativeMap<T: RealScalar> {
    dim: usize,
    order: usize,
    data: Vec<T>,
}

impl<T: RealScalar> DerivativeMap<T> {
    /// Allocate a zeroed table.
    pub fn new(dim: usize, order: usize) -> Self {
        Self {
            dim,
            order,
            data: vec![T::zero(); dim * (order + 1)],
        }
    }

    /// Number of dimensions.
    pub fn dimension(&self) -> usize {
        self.dim
    }

    /// Highest derivative order stored.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Derivative of order `n` along dimension `d`.
    pub fn get(&self, d: usize, n: usize) -> T {
        self.data[d * (self.order + 1) + n]
    }

    /// Mutable access to the derivative of order `n` along dimension `d`.
    pub fn get_mut(&mut self, d: usize, n: usize) -> &mut T {
        &mut self.data[d * (self.order + 1) + n]
    }
}

/// Kernel-specific capabilities required by the expansions.
pub trait KernelAux: Send + Sync {
    /// Scalar type
    type T: RealScalar;

    /// The multi-index catalog shared by all expansions built on this bundle.
    fn catalog(&self) -> &MultiIndexCatalog<Self::T>;

    /// Space dimension.
    fn dimension(&self) -> usize {
        self.catalog().dimension()
    }

    /// Squared bandwidth of the kernel.
    fn bandwidth_sq(&self) -> Self::T;

    /// Factor by which displacements are divided before derivatives are taken.
    fn bandwidth_factor(&self, bandwidth_sq: Self::T) -> Self::T;

    /// Allocate a derivative table for `dim` dimensions and orders up to `order`.
    fn allocate_derivative_map(&self, dim: usize, order: usize) -> DerivativeMap<Self::T> {
        DerivativeMap::new(dim, order)
    }

    /// Fill `derivative_map` with the derivatives of the kernel at the normalised displacement `x`.
    fn compute_directional_derivatives(
        &self,
        x: &[Self::T],
        derivative_map: &mut DerivativeMap<Self::T>,
        order: usize,
    );

    /// Combine one-dimensional derivatives into the partial derivative for `multi_index`.
    fn compute_partial_derivative(
        &self,
        derivative_map: &DerivativeMap<Self::T>,
        multi_index: &[usize],
    ) -> Self::T;

    /// Truncation order for evaluating a far-field expansion of `far_field_region` at points of
    /// `local_field_region`, together with the achieved error bound.
    ///
    /// Returns `None` if no order up to the catalog maximum meets `max_error`.
    fn order_for_evaluating_far_field(
        &self,
        far_field_region: &HRectBound<Self::T>,
        local_field_region: &HRectBound<Self::T>,
        min_dist_sq_regions: Self::T,
        max_dist_sq_regions: Self::T,
        max_error: Self::T,
    ) -> Option<(usize, Self::T)>;

    /// Truncation order for converting a far-field expansion into a local expansion.
    fn order_for_converting_to_local(
        &self,
        far_field_region: &HRectBound<Self::T>,
        local_field_region: &HRectBound<Self::T>,
        min_dist_sq_regions: Self::T,
        max_dist_sq_regions: Self::T,
        max_error: Self::T,
    ) -> Option<(usize, Self::T)>;

    /// Truncation order for accumulating the points of `far_field_region` into a local expansion
    /// that is evaluated over `local_field_region`.
    fn order_for_evaluating_local(
        &self,
        far_field_region: &HRectBound<Self::T>,
        local_field_region: &HRectBound<Self::T>,
        min_dist_sq_regions: Self::T,
        max_dist_sq_regions: Self::T,
        max_error: Self::T,
    ) -> Option<(usize, Self::T)>;
}

/// Configuration of a kernel bundle.
#[derive(Debug, Clone)]
pub struct ExpansionOptions<T: RealScalar> {
    /// Space dimension
    dimension: usize,
    /// Largest truncation order any expansion may reach
    max_order: usize,
    /// Kernel bandwidth
    bandwidth: T,
}

impl<T: RealScalar> Default for ExpansionOptions<T> {
    fn default() -> Self {
        Self {
            dimension: 3,
            max_order: 8,
            bandwidth: T::one(),
        }
    }
}

impl<T: RealScalar> ExpansionOptions<T> {
    /// Set the space dimension
    pub fn set_dimension(&mut self, dimension: usize) -> &mut Self {
        self.dimension = dimension;
        self
    }

    /// Set the maximum truncation order
    pub fn set_max_order(&mut self, max_order: usize) -> &mut Self {
        self.max_order = max_order;
        self
    }

    /// Set the kernel bandwidth
    pub fn set_bandwidth(&mut self, bandwidth: T) -> &mut Self {
        self.bandwidth = bandwidth;
        self
    }

    /// Space dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Maximum truncation order
    pub fn max_order(&self) -> usize {
        self.max_order
    }

    /// Kernel bandwidth
    pub fn bandwidth(&self) -> T {
        self.bandwidth
    }
}
