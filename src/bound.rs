//! Axis-aligned bounds of the regions that own expansions.

use crate::types::RealScalar;

/// A hyper-rectangle given by a closed interval per dimension.
///
/// A freshly created bound is empty (`lo > hi` in every dimension) and grows through
/// [HRectBound::expand_to_include].
#[derive(Debug, Clone, PartialEq)]
pub struct HRectBound<T: RealScalar> {
    lo: Vec<T>,
    hi: Vec<T>,
}

impl<T: RealScalar> HRectBound<T> {
    /// Create an empty bound.
    pub fn new(dim: usize) -> Self {
        Self {
            lo: vec![T::infinity(); dim],
            hi: vec![T::neg_infinity(); dim],
        }
    }

    /// Create a bound from explicit lower and upper corners.
    pub fn from_corners(lo: &[T], hi: &[T]) -> Self {
        assert_eq!(
            lo.len(),
            hi.len(),
            "Corners of different dimension: {} != {}",
            lo.len(),
            hi.len()
        );
        Self {
            lo: lo.to_vec(),
            hi: hi.to_vec(),
        }
    }

    /// Smallest bound containing all points of a point-contiguous slice
    /// `[x_1, y_1, ..., x_2, y_2, ...]`.
    pub fn from_points(dim: usize, points: &[T]) -> Self {
        assert!(
            points.len() % dim == 0,
            "Length of points {} is not a multiple of dimension {}.",
            points.len(),
            dim
        );
        let mut bound = Self::new(dim);
        for point in points.chunks_exact(dim) {
            bound.expand_to_include(point);
        }
        bound
    }

    /// Number of dimensions.
    pub fn dimension(&self) -> usize {
        self.lo.len()
    }

    /// Lower corner.
    pub fn lo(&self) -> &[T] {
        &self.lo
    }

    /// Upper corner.
    pub fn hi(&self) -> &[T] {
        &self.hi
    }

    /// `true` if no point has been added.
    pub fn is_empty(&self) -> bool {
        self.lo.iter().zip(&self.hi).any(|(l, h)| l > h)
    }

    /// Width along dimension `d`; zero for empty bounds.
    pub fn width(&self, d: usize) -> T {
        (self.hi[d] - self.lo[d]).max(T::zero())
    }

    /// Largest width over all dimensions.
    pub fn widest_width(&self) -> T {
        (0..self.dimension()).fold(T::zero(), |acc, d| acc.max(self.width(d)))
    }

    /// Midpoint of the box, the natural center of an expansion over this region.
    pub fn centroid(&self) -> Vec<T> {
        let two = T::from(2.0).unwrap();
        self.lo
            .iter()
            .zip(&self.hi)
            .map(|(&l, &h)| (l + h) / two)
            .collect()
    }

    /// Grow the bound so that it contains `point`.
    pub fn expand_to_include(&mut self, point: &[T]) {
        assert_eq!(point.len(), self.dimension());
        for (d, &x) in point.iter().enumerate() {
            self.lo[d] = self.lo[d].min(x);
            self.hi[d] = self.hi[d].max(x);
        }
    }

    /// `true` if `point` lies inside the box (boundary included).
    pub fn contains(&self, point: &[T]) -> bool {
        assert_eq!(point.len(), self.dimension());
        point
            .iter()
            .enumerate()
            .all(|(d, &x)| self.lo[d] <= x && x <= self.hi[d])
    }

    /// Squared distance from `point` to the nearest point of the box.
    pub fn min_distance_sq(&self, point: &[T]) -> T {
        assert_eq!(point.len(), self.dimension());
        point.iter().enumerate().fold(T::zero(), |acc, (d, &x)| {
            let below = (self.lo[d] - x).max(T::zero());
            let above = (x - self.hi[d]).max(T::zero());
            let gap = below + above;
            acc + gap * gap
        })
    }

    /// Squared distance from `point` to the farthest corner of the box.
    pub fn max_distance_sq(&self, point: &[T]) -> T {
        assert_eq!(point.len(), self.dimension());
        point.iter().enumerate().fold(T::zero(), |acc, (d, &x)| {
            let gap = (x - self.lo[d]).abs().max((self.hi[d] - x).abs());
            acc + gap * gap
        })
    }

    /// Squared minimum distance between two boxes.
    pub fn min_distance_sq_to(&self, other: &Self) -> T {
        assert_eq!(other.dimension(), self.dimension());
        (0..self.dimension()).fold(T::zero(), |acc, d| {
            let below = (other.lo[d] - self.hi[d]).max(T::zero());
            let above = (self.lo[d] - other.hi[d]).max(T::zero());
            let gap = below + above;
            acc + gap * gap
        })
    }

    /// Squared maximum distance between two boxes.
    pub fn max_distance_sq_to(&self, other: &Self) -> T {
        assert_eq!(other.dimension(), self.dimension());
        (0..self.dimension()).fold(T::zero(), |acc, d| {
            let gap = (other.hi[d] - self.lo[d])
                .abs()
                .max((self.hi[d] - other.lo[d]).abs());
            acc + gap * gap
        })
    }
}

/// Insertion heuristic of an R-tree: the cost of descending into the child with this bound
/// is zero if it already contains the point, and the minimum distance to the box otherwise.
pub fn descent_heuristic<T: RealScalar>(bound: &HRectBound<T>, point: &[T]) -> T {
    if bound.contains(point) {
        T::zero()
    } else {
        bound.min_distance_sq(point).sqrt()
    }
}
