//! Bounding-volume hierarchy for closest-point-on-surface queries.

use crate::mesh::{Aabb, TriangleMesh};
use nalgebra::Point3;

const MAX_LEAF_TRIANGLES: usize = 4;

#[derive(Clone, Copy, Debug)]
struct BvhNode {
    bounds: Aabb,
    left_or_start: u32,  // left child index (internal) or first triangle slot (leaf)
    right_or_count: u32, // right child index (internal) or triangle count (leaf)
    is_leaf: bool,
}

/// Result of a closest-point query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClosestHit {
    pub point: Point3<f64>,
    pub distance_squared: f64,
    /// Face index in the mesh the hierarchy was built from.
    pub face: usize,
}

/// Static BVH over the triangles of a mesh.
///
/// Built once and queried read-only, so a single instance can be shared
/// between threads.
#[derive(Clone, Debug)]
pub struct TriangleBvh {
    nodes: Vec<BvhNode>,
    triangle_indices: Vec<u32>,
    triangles: Vec<[Point3<f64>; 3]>,
}

impl TriangleBvh {
    pub fn build(mesh: &TriangleMesh) -> Self {
        let triangles: Vec<[Point3<f64>; 3]> =
            (0..mesh.face_count()).map(|f| mesh.triangle(f)).collect();
        let n = triangles.len();
        let mut triangle_indices: Vec<u32> = (0..n as u32).collect();
        let mut nodes = Vec::new();

        if n > 0 {
            let centroids: Vec<Point3<f64>> = triangles
                .iter()
                .map(|[a, b, c]| Point3::from((a.coords + b.coords + c.coords) / 3.0))
                .collect();
            let tri_bounds: Vec<Aabb> = triangles
                .iter()
                .filter_map(|t| Aabb::from_points(t.iter()))
                .collect();
            build_recursive(
                &mut nodes,
                &mut triangle_indices,
                &centroids,
                &tri_bounds,
                0,
                n,
            );
        }

        Self {
            nodes,
            triangle_indices,
            triangles,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Closest point on any triangle to `p`.
    pub fn closest_point(&self, p: &Point3<f64>) -> Option<ClosestHit> {
        if self.nodes.is_empty() {
            return None;
        }

        let mut best: Option<ClosestHit> = None;
        let mut best_d2 = f64::INFINITY;
        let mut stack: Vec<u32> = Vec::with_capacity(64);
        stack.push(0);

        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx as usize];
            if node.bounds.distance_squared(p) >= best_d2 {
                continue;
            }

            if node.is_leaf {
                let start = node.left_or_start as usize;
                let end = start + node.right_or_count as usize;
                for &ti in &self.triangle_indices[start..end] {
                    let [a, b, c] = self.triangles[ti as usize];
                    let q = closest_point_on_triangle(p, &a, &b, &c);
                    let d2 = (q - p).norm_squared();
                    if d2 < best_d2 {
                        best_d2 = d2;
                        best = Some(ClosestHit {
                            point: q,
                            distance_squared: d2,
                            face: ti as usize,
                        });
                    }
                }
                continue;
            }

            let left = node.left_or_start;
            let right = node.right_or_count;
            let dl = self.nodes[left as usize].bounds.distance_squared(p);
            let dr = self.nodes[right as usize].bounds.distance_squared(p);
            // push the farther child first so the nearer one is visited next
            if dl <= dr {
                stack.push(right);
                stack.push(left);
            } else {
                stack.push(left);
                stack.push(right);
            }
        }

        best
    }

    /// Squared distance from `p` to the surface; `None` for an empty mesh.
    #[inline]
    pub fn distance_squared(&self, p: &Point3<f64>) -> Option<f64> {
        self.closest_point(p).map(|h| h.distance_squared)
    }
}

fn build_recursive(
    nodes: &mut Vec<BvhNode>,
    indices: &mut [u32],
    centroids: &[Point3<f64>],
    tri_bounds: &[Aabb],
    start: usize,
    end: usize,
) -> u32 {
    let count = end - start;

    let mut bounds = tri_bounds[indices[start] as usize];
    for &ti in &indices[start + 1..end] {
        bounds = bounds.union(&tri_bounds[ti as usize]);
    }

    let node_idx = nodes.len() as u32;
    if count <= MAX_LEAF_TRIANGLES {
        nodes.push(BvhNode {
            bounds,
            left_or_start: start as u32,
            right_or_count: count as u32,
            is_leaf: true,
        });
        return node_idx;
    }

    // Median split along the longest axis of the centroid bounds.
    let centroid_bounds =
        Aabb::from_points(indices[start..end].iter().map(|&i| &centroids[i as usize]))
            .unwrap_or(bounds);
    let extent = centroid_bounds.extent();
    let axis = if extent.x >= extent.y && extent.x >= extent.z {
        0
    } else if extent.y >= extent.z {
        1
    } else {
        2
    };

    let mid_rel = count / 2;
    indices[start..end].select_nth_unstable_by(mid_rel, |&a, &b| {
        centroids[a as usize][axis].total_cmp(&centroids[b as usize][axis])
    });
    let mid = start + mid_rel;

    nodes.push(BvhNode {
        bounds,
        left_or_start: 0,
        right_or_count: 0,
        is_leaf: false,
    });

    let left = build_recursive(nodes, indices, centroids, tri_bounds, start, mid);
    let right = build_recursive(nodes, indices, centroids, tri_bounds, mid, end);
    nodes[node_idx as usize].left_or_start = left;
    nodes[node_idx as usize].right_or_count = right;

    node_idx
}

/// Closest point to `p` on triangle `abc` (Voronoi-region walk).
pub fn closest_point_on_triangle(
    p: &Point3<f64>,
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
) -> Point3<f64> {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;

    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return *a;
    }

    let bp = p - b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return *b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    let cp = p - c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return *c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = va + vb + vc;
    if denom == 0.0 || !denom.is_finite() {
        // zero-area triangle that slipped past the region tests
        return [*a, *b, *c]
            .into_iter()
            .min_by(|x, y| (x - p).norm_squared().total_cmp(&(y - p).norm_squared()))
            .unwrap_or(*a);
    }
    let v = vb / denom;
    let w = vc / denom;
    a + ab * v + ac * w
}
