//! Guide paths that particles are drawn along.
//!
//! A [`GuidePath`] is an immutable polyline. Particles target one of its
//! interior points at a time and walk the target forward or backward as
//! they catch up with it.
//!
//! Points come from a [`GuidePathSource`]: either an already ordered point
//! list, or an [`EdgeChain`] that recovers the order from an unordered
//! polyline mesh (vertices plus edges).

use crate::error::ConfigError;
use crate::spatial::{KdTree, Neighbor};
use glam::DVec3;
use std::ops::RangeInclusive;

/// Minimum number of points a guide path needs.
pub const MIN_GUIDE_POINTS: usize = 3;

/// Supplies the ordered point sequence of a guide path.
pub trait GuidePathSource {
    /// Produce the points in path order.
    fn guide_points(&self) -> Result<Vec<DVec3>, ConfigError>;
}

impl GuidePathSource for Vec<DVec3> {
    fn guide_points(&self) -> Result<Vec<DVec3>, ConfigError> {
        Ok(self.clone())
    }
}

impl GuidePathSource for [DVec3] {
    fn guide_points(&self) -> Result<Vec<DVec3>, ConfigError> {
        Ok(self.to_vec())
    }
}

impl<const N: usize> GuidePathSource for [DVec3; N] {
    fn guide_points(&self) -> Result<Vec<DVec3>, ConfigError> {
        Ok(self.to_vec())
    }
}

/// Fixed polyline with a nearest-point index built once at construction.
#[derive(Clone, Debug)]
pub struct GuidePath {
    points: Vec<DVec3>,
    tree: KdTree,
}

impl GuidePath {
    /// Create a guide path from ordered points.
    ///
    /// Fails when fewer than [`MIN_GUIDE_POINTS`] points are given or any
    /// coordinate is not finite.
    pub fn new(points: Vec<DVec3>) -> Result<Self, ConfigError> {
        if points.len() < MIN_GUIDE_POINTS {
            return Err(ConfigError::GuideTooShort(points.len()));
        }
        if let Some(bad) = points.iter().position(|p| !p.is_finite()) {
            return Err(ConfigError::NonFiniteGuidePoint(bad));
        }
        if points.windows(2).any(|w| w[0] == w[1]) {
            log::warn!("guide path contains consecutive duplicate points");
        }

        let tree = KdTree::build(&points);
        log::debug!("guide path indexed with {} points", points.len());
        Ok(Self { points, tree })
    }

    /// Create a guide path from any [`GuidePathSource`].
    pub fn from_source<S: GuidePathSource + ?Sized>(source: &S) -> Result<Self, ConfigError> {
        Self::new(source.guide_points()?)
    }

    /// Number of points.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always `false`: construction rejects short paths.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Index of the final point.
    #[inline]
    pub fn last_index(&self) -> usize {
        self.points.len() - 1
    }

    /// Indices a particle may target: every point except the two ends.
    #[inline]
    pub fn target_range(&self) -> RangeInclusive<usize> {
        1..=self.points.len() - 2
    }

    /// Point at `index`, clamped to the path.
    #[inline]
    pub fn point_at(&self, index: usize) -> DVec3 {
        self.points[index.min(self.last_index())]
    }

    /// All points in order.
    pub fn points(&self) -> &[DVec3] {
        &self.points
    }

    /// Closest guide point to `position`.
    pub fn nearest(&self, position: DVec3) -> Neighbor {
        // The tree always holds at least MIN_GUIDE_POINTS entries.
        self.tree.nearest(position).unwrap_or(Neighbor {
            position: self.points[0],
            index: 0,
            distance: self.points[0].distance(position),
        })
    }
}

/// An unordered polyline mesh to be walked into guide order.
///
/// Starting at `start`, each step follows the first unused edge touching
/// the current vertex. Every vertex must be reached exactly once.
#[derive(Clone, Debug, Default)]
pub struct EdgeChain {
    pub vertices: Vec<DVec3>,
    pub edges: Vec<[usize; 2]>,
    pub start: usize,
}

impl EdgeChain {
    pub fn new(vertices: Vec<DVec3>, edges: Vec<[usize; 2]>, start: usize) -> Self {
        Self { vertices, edges, start }
    }

    /// Vertex indices in walk order.
    pub fn order(&self) -> Result<Vec<usize>, ConfigError> {
        let count = self.vertices.len();
        if self.start >= count {
            return Err(ConfigError::ChainStart { start: self.start, count });
        }

        let mut adjacency: Vec<Vec<(usize, usize)>> = vec![Vec::new(); count];
        for (edge, &[a, b]) in self.edges.iter().enumerate() {
            for vertex in [a, b] {
                if vertex >= count {
                    return Err(ConfigError::ChainEdge { edge, vertex, count });
                }
            }
            adjacency[a].push((edge, b));
            adjacency[b].push((edge, a));
        }

        let mut used_edge = vec![false; self.edges.len()];
        let mut visited = vec![false; count];
        let mut order = Vec::with_capacity(count);

        let mut current = self.start;
        visited[current] = true;
        order.push(current);

        while order.len() < count {
            let next = adjacency[current]
                .iter()
                .find(|(edge, other)| !used_edge[*edge] && !visited[*other])
                .copied();
            match next {
                Some((edge, other)) => {
                    used_edge[edge] = true;
                    visited[other] = true;
                    order.push(other);
                    current = other;
                }
                None => {
                    return Err(ConfigError::BrokenChain { visited: order.len(), count });
                }
            }
        }

        Ok(order)
    }
}

impl GuidePathSource for EdgeChain {
    fn guide_points(&self) -> Result<Vec<DVec3>, ConfigError> {
        Ok(self.order()?.into_iter().map(|i| self.vertices[i]).collect())
    }
}
