// SPDX-License-Identifier: GPL-3.0-only

//! Static 3D k-d tree
//!
//! The tree is stored implicitly: each slice is split at its median along
//! `depth % 3`, the median element is the node and the halves are its
//! children. The first [`KD_PARALLEL_DEPTH`] levels build their halves on
//! scoped threads, so at most `2^KD_PARALLEL_DEPTH` threads run at once.

use crate::constants::point_cloud::KD_PARALLEL_DEPTH;

pub struct KdTree {
    points: Vec<[f32; 3]>,
}

fn distance_squared(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    (0..3).map(|i| (a[i] - b[i]) * (a[i] - b[i])).sum()
}

fn build(points: &mut [[f32; 3]], depth: usize) {
    if points.len() <= 1 {
        return;
    }
    let axis = depth % 3;
    let mid = points.len() / 2;
    points.select_nth_unstable_by(mid, |a, b| a[axis].total_cmp(&b[axis]));

    let (left, rest) = points.split_at_mut(mid);
    let right = &mut rest[1..];

    if depth < KD_PARALLEL_DEPTH {
        std::thread::scope(|s| {
            s.spawn(|| build(left, depth + 1));
            build(right, depth + 1);
        });
    } else {
        build(left, depth + 1);
        build(right, depth + 1);
    }
}

impl KdTree {
    pub fn build(mut points: Vec<[f32; 3]>) -> Self {
        build(&mut points, 0);
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Closest stored point and its squared distance
    pub fn nearest(&self, query: &[f32; 3]) -> Option<([f32; 3], f32)> {
        let mut best: Option<([f32; 3], f32)> = None;
        Self::search(&self.points, 0, query, &mut best);
        best
    }

    fn search(nodes: &[[f32; 3]], depth: usize, query: &[f32; 3], best: &mut Option<([f32; 3], f32)>) {
        if nodes.is_empty() {
            return;
        }
        let mid = nodes.len() / 2;
        let node = &nodes[mid];
        let d = distance_squared(node, query);
        if best.is_none_or(|(_, b)| d < b) {
            *best = Some((*node, d));
        }

        let axis = depth % 3;
        let delta = query[axis] - node[axis];
        let (near, far) = if delta < 0.0 {
            (&nodes[..mid], &nodes[mid + 1..])
        } else {
            (&nodes[mid + 1..], &nodes[..mid])
        };

        Self::search(near, depth + 1, query, best);
        if best.is_none_or(|(_, b)| delta * delta < b) {
            Self::search(far, depth + 1, query, best);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brute_force(points: &[[f32; 3]], q: &[f32; 3]) -> f32 {
        points
            .iter()
            .map(|p| distance_squared(p, q))
            .fold(f32::INFINITY, f32::min)
    }

    #[test]
    fn test_matches_brute_force() {
        // Deterministic pseudo random cloud
        let mut state = 12345u32;
        let mut next = || {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
            (state >> 8) as f32 / (1u32 << 24) as f32
        };
        let points: Vec<[f32; 3]> = (0..2000).map(|_| [next(), next(), next()]).collect();
        let queries: Vec<[f32; 3]> = (0..50).map(|_| [next(), next(), next()]).collect();

        let tree = KdTree::build(points.clone());
        assert_eq!(tree.len(), 2000);
        for q in &queries {
            let (_, d) = tree.nearest(q).unwrap();
            assert_eq!(d, brute_force(&points, q));
        }
    }

    #[test]
    fn test_empty_tree() {
        let tree = KdTree::build(Vec::new());
        assert!(tree.is_empty());
        assert!(tree.nearest(&[0.0, 0.0, 0.0]).is_none());
    }
}
