//! Static k-d tree for neighbor queries over 3D points.
//!
//! The tree is rebuilt from a snapshot whenever the indexed points move
//! (once per frame for particles, once per run for the guide path) and is
//! then queried many times. Nodes are stored implicitly: each subslice
//! of `entries` is a subtree whose root sits at the slice midpoint.

use glam::DVec3;

/// A point returned by a spatial query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbor {
    /// Indexed position.
    pub position: DVec3,
    /// Identifier supplied when the tree was built.
    pub index: usize,
    /// Euclidean distance to the query point.
    pub distance: f64,
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    position: DVec3,
    index: usize,
    /// Split axis for the subtree rooted at this entry.
    axis: u8,
}

/// Balanced k-d tree over a fixed set of points.
#[derive(Clone, Debug, Default)]
pub struct KdTree {
    entries: Vec<Entry>,
}

impl KdTree {
    /// Build a tree whose identifiers are the slice positions of `points`.
    pub fn build(points: &[DVec3]) -> Self {
        Self::from_entries(points.iter().copied().enumerate().map(|(i, p)| (p, i)))
    }

    /// Build a tree from explicit `(position, identifier)` pairs.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (DVec3, usize)>,
    {
        let mut entries: Vec<Entry> = entries
            .into_iter()
            .map(|(position, index)| Entry { position, index, axis: 0 })
            .collect();
        Self::build_recursive(&mut entries);
        Self { entries }
    }

    fn build_recursive(entries: &mut [Entry]) {
        if entries.len() <= 1 {
            return;
        }

        // Split along the widest axis of this subtree
        let (min, max) = entries.iter().fold(
            (DVec3::splat(f64::INFINITY), DVec3::splat(f64::NEG_INFINITY)),
            |(lo, hi), e| (lo.min(e.position), hi.max(e.position)),
        );
        let size = max - min;
        let axis = if size.x >= size.y && size.x >= size.z {
            0
        } else if size.y >= size.z {
            1
        } else {
            2
        };

        let mid = entries.len() / 2;
        entries.select_nth_unstable_by(mid, |a, b| {
            a.position[axis]
                .total_cmp(&b.position[axis])
                .then(a.index.cmp(&b.index))
        });
        entries[mid].axis = axis as u8;

        let (left, rest) = entries.split_at_mut(mid);
        Self::build_recursive(left);
        Self::build_recursive(&mut rest[1..]);
    }

    /// Number of indexed points.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the tree indexes no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(position, identifier)` pairs in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (DVec3, usize)> + '_ {
        self.entries.iter().map(|e| (e.position, e.index))
    }

    /// All points within `radius` of `center` (inclusive), unordered.
    pub fn within_radius(&self, center: DVec3, radius: f64) -> Vec<Neighbor> {
        let mut found = Vec::new();
        self.for_each_within(center, radius, |n| found.push(n));
        found
    }

    /// Visit every point within `radius` of `center` without allocating.
    pub fn for_each_within<F>(&self, center: DVec3, radius: f64, mut visit: F)
    where
        F: FnMut(Neighbor),
    {
        if radius < 0.0 || radius.is_nan() {
            return;
        }
        Self::range_recursive(&self.entries, center, radius, radius * radius, &mut visit);
    }

    fn range_recursive<F>(entries: &[Entry], center: DVec3, radius: f64, radius_sq: f64, visit: &mut F)
    where
        F: FnMut(Neighbor),
    {
        if entries.is_empty() {
            return;
        }
        let mid = entries.len() / 2;
        let node = &entries[mid];

        let dist_sq = node.position.distance_squared(center);
        if dist_sq <= radius_sq {
            visit(Neighbor {
                position: node.position,
                index: node.index,
                distance: dist_sq.sqrt(),
            });
        }

        let axis = node.axis as usize;
        let delta = center[axis] - node.position[axis];
        if delta - radius <= 0.0 {
            Self::range_recursive(&entries[..mid], center, radius, radius_sq, visit);
        }
        if delta + radius >= 0.0 {
            Self::range_recursive(&entries[mid + 1..], center, radius, radius_sq, visit);
        }
    }

    /// The closest indexed point, or `None` for an empty tree.
    ///
    /// Equidistant points resolve to the lowest identifier.
    pub fn nearest(&self, point: DVec3) -> Option<Neighbor> {
        let mut best: Option<(f64, &Entry)> = None;
        Self::nearest_recursive(&self.entries, point, &mut best);
        best.map(|(dist_sq, e)| Neighbor {
            position: e.position,
            index: e.index,
            distance: dist_sq.sqrt(),
        })
    }

    fn nearest_recursive<'a>(entries: &'a [Entry], point: DVec3, best: &mut Option<(f64, &'a Entry)>) {
        if entries.is_empty() {
            return;
        }
        let mid = entries.len() / 2;
        let node = &entries[mid];

        let dist_sq = node.position.distance_squared(point);
        let better = match best {
            None => true,
            Some((best_sq, best_entry)) => {
                dist_sq < *best_sq || (dist_sq == *best_sq && node.index < best_entry.index)
            }
        };
        if better {
            *best = Some((dist_sq, node));
        }

        let axis = node.axis as usize;
        let delta = point[axis] - node.position[axis];
        let (near, far) = if delta <= 0.0 {
            (&entries[..mid], &entries[mid + 1..])
        } else {
            (&entries[mid + 1..], &entries[..mid])
        };

        Self::nearest_recursive(near, point, best);

        // The far side can only win if the splitting plane is within reach
        let plane_sq = delta * delta;
        if best.map_or(true, |(best_sq, _)| plane_sq <= best_sq) {
            Self::nearest_recursive(far, point, best);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn random_cloud(count: usize, seed: u64) -> Vec<DVec3> {
        let mut rng = SmallRng::seed_from_u64(seed);
        (0..count)
            .map(|_| {
                DVec3::new(
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                )
            })
            .collect()
    }

    fn brute_nearest(points: &[DVec3], q: DVec3) -> (usize, f64) {
        let mut best = (usize::MAX, f64::INFINITY);
        for (i, p) in points.iter().enumerate() {
            let d = p.distance(q);
            if d < best.1 {
                best = (i, d);
            }
        }
        best
    }

    #[test]
    fn test_empty_tree() {
        let tree = KdTree::build(&[]);
        assert!(tree.is_empty());
        assert!(tree.nearest(DVec3::ZERO).is_none());
        assert!(tree.within_radius(DVec3::ZERO, 10.0).is_empty());
    }

    #[test]
    fn test_nearest_matches_brute_force() {
        let points = random_cloud(300, 7);
        let tree = KdTree::build(&points);
        assert_eq!(tree.len(), 300);

        for q in random_cloud(100, 99) {
            let found = tree.nearest(q).unwrap();
            let (idx, dist) = brute_nearest(&points, q);
            assert_eq!(found.index, idx);
            assert!((found.distance - dist).abs() < 1e-12);
            assert_eq!(found.position, points[idx]);
        }
    }

    #[test]
    fn test_range_matches_brute_force() {
        let points = random_cloud(400, 3);
        let tree = KdTree::build(&points);

        for q in random_cloud(30, 11) {
            let mut found: Vec<usize> = tree.within_radius(q, 0.3).iter().map(|n| n.index).collect();
            found.sort_unstable();
            let expected: Vec<usize> = points
                .iter()
                .enumerate()
                .filter(|(_, p)| p.distance(q) <= 0.3)
                .map(|(i, _)| i)
                .collect();
            assert_eq!(found, expected);
        }
    }

    #[test]
    fn test_range_reports_distances() {
        let points = vec![DVec3::ZERO, DVec3::new(0.5, 0.0, 0.0), DVec3::new(3.0, 0.0, 0.0)];
        let tree = KdTree::build(&points);
        let mut found = tree.within_radius(DVec3::ZERO, 1.0);
        found.sort_by_key(|n| n.index);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].distance, 0.0);
        assert!((found[1].distance - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_nearest_tie_prefers_lowest_index() {
        let points = vec![
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(-1.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
        ];
        let tree = KdTree::build(&points);
        assert_eq!(tree.nearest(DVec3::ZERO).unwrap().index, 0);
        assert_eq!(tree.nearest(DVec3::new(2.0, 0.0, 0.0)).unwrap().index, 0);
    }

    #[test]
    fn test_collinear_points() {
        let points: Vec<DVec3> = (0..50).map(|i| DVec3::new(i as f64, 0.0, 0.0)).collect();
        let tree = KdTree::build(&points);
        let n = tree.nearest(DVec3::new(17.4, 2.0, 0.0)).unwrap();
        assert_eq!(n.index, 17);
    }

    #[test]
    fn test_explicit_identifiers() {
        let tree = KdTree::from_entries(vec![(DVec3::ZERO, 10), (DVec3::ONE, 20)]);
        assert_eq!(tree.nearest(DVec3::splat(0.9)).unwrap().index, 20);
        let ids: Vec<usize> = tree.iter().map(|(_, id)| id).collect();
        assert_eq!(ids.len(), 2);
    }
}
