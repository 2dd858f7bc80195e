//! Common utility functions
use rlst::Shape;

use crate::types::{ExpansionError, RealScalar, Result};

pub(crate) fn check_dimension(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(ExpansionError::DimensionMismatch { expected, actual })
    }
}

/// `max(current, requested)`, rejecting orders beyond the catalog maximum.
pub(crate) fn raised_order(
    current: Option<usize>,
    requested: usize,
    maximum: usize,
) -> Result<usize> {
    if requested > maximum {
        return Err(ExpansionError::OrderExceedsMaximum {
            requested,
            maximum,
        });
    }
    Ok(current.map_or(requested, |order| order.max(requested)))
}

/// Validate a point matrix of shape `[dim, npoints]`, its weights and the range `[begin, end)`.
pub(crate) fn check_point_range<Array2: Shape<2>, T>(
    dim: usize,
    points: &Array2,
    weights: &[T],
    begin: usize,
    end: usize,
) -> Result<()> {
    let [rows, npoints] = points.shape();
    check_dimension(dim, rows)?;
    let npoints = npoints.min(weights.len());
    if begin > end || end > npoints {
        return Err(ExpansionError::InvalidRange {
            begin,
            end,
            npoints,
        });
    }
    Ok(())
}

/// Tabulate `monomials[id] = ∏ x[d]^(α_id)[d]` for all ids of orders up to `order`.
///
/// Degree `k` entries are the degree `k - 1` entries from the head cursor of dimension `i`
/// onwards, multiplied by `x[i]`. This is the enumeration of
/// [MultiIndexCatalog](crate::multi_index::MultiIndexCatalog), so `monomials` is indexed by
/// catalog id.
pub(crate) fn compute_monomials<T: RealScalar>(x: &[T], order: usize, monomials: &mut [T]) {
    let mut heads = vec![0; x.len()];
    let mut t = 1;
    let mut tail = 1;

    monomials[0] = T::one();
    for _ in 1..=order {
        for (i, head) in heads.iter_mut().enumerate() {
            let start = *head;
            *head = t;
            for j in start..tail {
                monomials[t] = monomials[j] * x[i];
                t += 1;
            }
        }
        tail = t;
    }
}

/// Sum of positive and negative contributions, each accumulated on its own.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SplitSum<T: RealScalar> {
    pos: T,
    neg: T,
}

impl<T: RealScalar> SplitSum<T> {
    pub(crate) fn new() -> Self {
        Self {
            pos: T::zero(),
            neg: T::zero(),
        }
    }

    pub(crate) fn add(&mut self, value: T) {
        if value > T::zero() {
            self.pos = self.pos + value;
        } else {
            self.neg = self.neg + value;
        }
    }

    pub(crate) fn total(&self) -> T {
        self.pos + self.neg
    }
}

#[cfg(test)]
mod test {
    use super::{check_point_range, compute_monomials, SplitSum};
    use crate::multi_index::MultiIndexCatalog;
    use crate::types::ExpansionError;
    use approx::assert_relative_eq;
    use rlst::rlst_dynamic_array2;

    #[test]
    fn test_monomials_follow_catalog() {
        let dim = 3;
        let order = 4;
        let catalog = MultiIndexCatalog::<f64>::new(dim, order).unwrap();
        let x = [0.5, -1.5, 2.0];
        let mut monomials = vec![0.0; catalog.max_total_num_coeffs()];
        compute_monomials(&x, order, &mut monomials);

        for (id, value) in monomials.iter().enumerate() {
            let expected: f64 = catalog
                .multi_index(id)
                .iter()
                .zip(&x)
                .map(|(&n, &c)| c.powi(n as i32))
                .product();
            assert_relative_eq!(*value, expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_split_sum() {
        let mut sum = SplitSum::new();
        for value in [1.0, -2.0, 3.5, -0.5, 0.0] {
            sum.add(value);
        }
        assert_relative_eq!(sum.pos, 4.5);
        assert_relative_eq!(sum.neg, -2.5);
        assert_relative_eq!(sum.total(), 2.0);
    }

    #[test]
    fn test_check_point_range() {
        let points = rlst_dynamic_array2!(f64, [2, 5]);
        let weights = vec![1.0; 5];
        assert!(check_point_range(2, &points, &weights, 0, 5).is_ok());
        assert!(check_point_range(2, &points, &weights, 3, 3).is_ok());
        assert_eq!(
            check_point_range(2, &points, &weights, 4, 6),
            Err(ExpansionError::InvalidRange {
                begin: 4,
                end: 6,
                npoints: 5
            })
        );
        assert_eq!(
            check_point_range(2, &points, &weights[..3], 0, 4),
            Err(ExpansionError::InvalidRange {
                begin: 0,
                end: 4,
                npoints: 3
            })
        );
        assert_eq!(
            check_point_range(3, &points, &weights, 0, 1),
            Err(ExpansionError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        );
    }
}
