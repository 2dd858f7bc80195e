//! Enumeration of multi-indices and the combinatorial constants of the series expansions.
//!
//! Every expansion in the crate indexes its coefficients by the ids assigned here. The
//! enumeration is graded: all multi-indices of total degree `k` come before those of degree
//! `k + 1`, so the ids needed for a truncation order `p` are always a prefix of the ids needed
//! for `p + 1`. Within a degree the multi-indices are produced by the same head-cursor
//! recurrence that [LocalExpansion::evaluate_field](crate::local::LocalExpansion::evaluate_field)
//! uses to tabulate monomials, which keeps both in lockstep.
use itertools::Itertools;

use crate::types::{ExpansionError, RealScalar, Result};

/// Largest `n` for which `n!` is finite in double precision.
pub const MAX_FACTORIAL: usize = 170;

lazy_static! {
    static ref FACTORIALS: Vec<f64> = {
        let mut table = vec![1.0; MAX_FACTORIAL + 1];
        for n in 1..=MAX_FACTORIAL {
            table[n] = table[n - 1] * n as f64;
        }
        table
    };
}

/// Return `n!`, or infinity once it overflows.
pub fn factorial<T: RealScalar>(n: usize) -> T {
    if n > MAX_FACTORIAL {
        T::infinity()
    } else {
        T::from(FACTORIALS[n]).unwrap_or_else(T::infinity)
    }
}

/// Immutable table of multi-indices up to a maximum order.
///
/// A catalog is built once per kernel configuration and shared read-only by all expansions.
#[derive(Debug, Clone)]
pub struct MultiIndexCatalog<T: RealScalar> {
    dim: usize,
    max_order: usize,

    /// Exponent tuples, indexed by id.
    multi_indices: Vec<Vec<usize>>,

    /// Total number of coefficients for each order `0..=max_order`.
    list_total_num_coeffs: Vec<usize>,

    inv_multiindex_factorials: Vec<T>,
    neg_inv_multiindex_factorials: Vec<T>,

    /// Pascal triangle, row major with `max_order + 1` columns.
    n_choose_k: Vec<T>,

    /// For each id, the ids of all dominating multi-indices in ascending order.
    upper_mapping_index: Vec<Vec<usize>>,

    /// Multi-binomial coefficients, parallel to `upper_mapping_index`.
    n_multichoose_k: Vec<Vec<T>>,

    /// For each id, the ids of all dominated multi-indices in ascending order.
    lower_mapping_index: Vec<Vec<usize>>,
}

impl<T: RealScalar> MultiIndexCatalog<T> {
    /// Build the catalog for `dim` dimensions and truncation orders up to `max_order`.
    pub fn new(dim: usize, max_order: usize) -> Result<Self> {
        if dim == 0 {
            return Err(ExpansionError::InvalidDimension(dim));
        }

        let list_total_num_coeffs = (0..=max_order)
            .map(|order| binomial_count(order + dim, dim))
            .collect_vec();

        let multi_indices = enumerate_multi_indices(dim, max_order);
        debug_assert_eq!(multi_indices.len(), list_total_num_coeffs[max_order]);

        let mut n_choose_k = vec![T::zero(); (max_order + 1) * (max_order + 1)];
        for n in 0..=max_order {
            n_choose_k[n * (max_order + 1)] = T::one();
            for k in 1..=n {
                let above_left = n_choose_k[(n - 1) * (max_order + 1) + k - 1];
                let above = n_choose_k[(n - 1) * (max_order + 1) + k];
                n_choose_k[n * (max_order + 1) + k] = above_left + above;
            }
        }

        let mut inv_multiindex_factorials = Vec::with_capacity(multi_indices.len());
        let mut neg_inv_multiindex_factorials = Vec::with_capacity(multi_indices.len());
        for mapping in &multi_indices {
            let inv = mapping
                .iter()
                .fold(T::one(), |acc, &n| acc / factorial::<T>(n));
            let degree: usize = mapping.iter().sum();
            inv_multiindex_factorials.push(inv);
            neg_inv_multiindex_factorials.push(if degree % 2 == 0 { inv } else { -inv });
        }

        let ncoeffs = multi_indices.len();
        let mut upper_mapping_index = vec![Vec::new(); ncoeffs];
        let mut n_multichoose_k = vec![Vec::new(); ncoeffs];
        let mut lower_mapping_index = vec![Vec::new(); ncoeffs];

        for (lower, alpha) in multi_indices.iter().enumerate() {
            for (upper, beta) in multi_indices.iter().enumerate() {
                if dominates(beta, alpha) {
                    upper_mapping_index[lower].push(upper);
                    let multichoose = beta
                        .iter()
                        .zip(alpha)
                        .map(|(&n, &k)| n_choose_k[n * (max_order + 1) + k])
                        .fold(T::one(), |acc, c| acc * c);
                    n_multichoose_k[lower].push(multichoose);
                }
                if dominates(alpha, beta) {
                    lower_mapping_index[lower].push(upper);
                }
            }
        }

        Ok(Self {
            dim,
            max_order,
            multi_indices,
            list_total_num_coeffs,
            inv_multiindex_factorials,
            neg_inv_multiindex_factorials,
            n_choose_k,
            upper_mapping_index,
            n_multichoose_k,
            lower_mapping_index,
        })
    }

    /// Number of dimensions of each multi-index.
    pub fn dimension(&self) -> usize {
        self.dim
    }

    /// Largest truncation order supported.
    pub fn max_order(&self) -> usize {
        self.max_order
    }

    /// Number of coefficients of an expansion truncated at `order`.
    pub fn total_num_coeffs(&self, order: usize) -> Result<usize> {
        self.list_total_num_coeffs
            .get(order)
            .copied()
            .ok_or(ExpansionError::OrderExceedsMaximum {
                requested: order,
                maximum: self.max_order,
            })
    }

    /// Coefficient count for an order already validated against the maximum.
    pub(crate) fn num_coeffs(&self, order: usize) -> usize {
        self.list_total_num_coeffs[order]
    }

    /// Number of coefficients at the maximum order; the length of every coefficient vector.
    pub fn max_total_num_coeffs(&self) -> usize {
        self.multi_indices.len()
    }

    /// Exponent tuple of the multi-index with the given id.
    pub fn multi_index(&self, id: usize) -> &[usize] {
        &self.multi_indices[id]
    }

    /// Total degree of the multi-index with the given id.
    pub fn degree(&self, id: usize) -> usize {
        self.multi_indices[id].iter().sum()
    }

    /// Id of an exponent tuple, if it is part of the catalog.
    pub fn position(&self, mapping: &[usize]) -> Option<usize> {
        if mapping.len() != self.dim {
            return None;
        }
        let degree: usize = mapping.iter().sum();
        if degree > self.max_order {
            return None;
        }
        let start = if degree == 0 {
            0
        } else {
            self.list_total_num_coeffs[degree - 1]
        };
        let end = self.list_total_num_coeffs[degree];
        (start..end).find(|&id| self.multi_indices[id] == mapping)
    }

    /// `n!` as a scalar.
    pub fn factorial(&self, n: usize) -> T {
        factorial(n)
    }

    /// `α! = ∏ α_i!` for the multi-index with the given id.
    pub fn multiindex_factorial(&self, id: usize) -> T {
        T::one() / self.inv_multiindex_factorials[id]
    }

    /// `1 / α!`
    pub fn inv_multiindex_factorial(&self, id: usize) -> T {
        self.inv_multiindex_factorials[id]
    }

    /// `(-1)^|α| / α!`
    pub fn neg_inv_multiindex_factorial(&self, id: usize) -> T {
        self.neg_inv_multiindex_factorials[id]
    }

    /// All `1 / α!`, indexed by id.
    pub fn inv_multiindex_factorials(&self) -> &[T] {
        &self.inv_multiindex_factorials
    }

    /// All `(-1)^|α| / α!`, indexed by id.
    pub fn neg_inv_multiindex_factorials(&self) -> &[T] {
        &self.neg_inv_multiindex_factorials
    }

    /// Binomial coefficient `C(n, k)` for `n <= max_order`.
    pub fn n_choose_k(&self, n: usize, k: usize) -> T {
        assert!(n <= self.max_order, "n = {} exceeds the maximum order", n);
        if k > n {
            T::zero()
        } else {
            self.n_choose_k[n * (self.max_order + 1) + k]
        }
    }

    /// Ids of all multi-indices dominating `id` component-wise, in ascending order.
    pub fn upper_mapping(&self, id: usize) -> &[usize] {
        &self.upper_mapping_index[id]
    }

    /// Multi-binomial coefficients `∏ C(β_i, α_i)` parallel to [Self::upper_mapping].
    pub fn upper_multichoose(&self, id: usize) -> &[T] {
        &self.n_multichoose_k[id]
    }

    /// Ids of all multi-indices dominated by `id` component-wise, in ascending order.
    pub fn lower_mapping(&self, id: usize) -> &[usize] {
        &self.lower_mapping_index[id]
    }

    /// `∏ C(β_i, α_i)` for `β = upper` and `α = lower`; zero unless `β` dominates `α`.
    pub fn n_multichoose_k(&self, upper: usize, lower: usize) -> T {
        match self.upper_mapping_index[lower].binary_search(&upper) {
            Ok(pos) => self.n_multichoose_k[lower][pos],
            Err(_) => T::zero(),
        }
    }
}

/// `C(n, k)` for the coefficient counts, computed without overflow for moderate sizes.
fn binomial_count(n: usize, k: usize) -> usize {
    let k = k.min(n - k);
    (0..k).fold(1, |acc, i| acc * (n - i) / (i + 1))
}

/// `true` if every component of `upper` is at least the matching component of `lower`.
fn dominates(upper: &[usize], lower: &[usize]) -> bool {
    upper.iter().zip(lower.iter()).all(|(u, l)| u >= l)
}

/// Graded enumeration: each degree block is built from the previous one by adding a unit to
/// each dimension in turn, starting at that dimension's head cursor.
fn enumerate_multi_indices(dim: usize, max_order: usize) -> Vec<Vec<usize>> {
    let mut multi_indices = vec![vec![0; dim]];
    let mut heads = vec![0; dim];
    let mut tail = 1;

    for _ in 1..=max_order {
        for (i, head) in heads.iter_mut().enumerate() {
            let start = *head;
            *head = multi_indices.len();
            for j in start..tail {
                let mut next = multi_indices[j].clone();
                next[i] += 1;
                multi_indices.push(next);
            }
        }
        tail = multi_indices.len();
    }

    multi_indices
}
