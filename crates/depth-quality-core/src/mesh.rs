//! Indexed triangle meshes.

use nalgebra::{Point3, Unit, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Aabb {
    pub fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    /// Tight box around `points`; `None` if the iterator is empty.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3<f64>>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        let mut out = Self::new(first, first);
        for p in iter {
            out.grow(p);
        }
        Some(out)
    }

    #[inline]
    pub fn grow(&mut self, p: &Point3<f64>) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    #[inline]
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb::new(self.min.inf(&other.min), self.max.sup(&other.max))
    }

    /// Inclusive containment test on all three axes.
    #[inline]
    pub fn contains(&self, p: &Point3<f64>) -> bool {
        (0..3).all(|k| p[k] >= self.min[k] && p[k] <= self.max[k])
    }

    /// Uniformly scale both corners about the origin.
    pub fn scaled(&self, s: f64) -> Aabb {
        let a = self.min * s;
        let b = self.max * s;
        // negative scales swap the corners
        Aabb::new(a.inf(&b), a.sup(&b))
    }

    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn extent(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Squared distance from `p` to the box (zero inside).
    #[inline]
    pub fn distance_squared(&self, p: &Point3<f64>) -> f64 {
        let mut d2 = 0.0;
        for k in 0..3 {
            let v = p[k];
            if v < self.min[k] {
                let d = self.min[k] - v;
                d2 += d * d;
            } else if v > self.max[k] {
                let d = v - self.max[k];
                d2 += d * d;
            }
        }
        d2
    }
}

/// Triangle soup with shared vertices.
///
/// Faces store vertex indices in counter-clockwise order when seen from the
/// outside, so `(b - a) x (c - a)` is the outward normal.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TriangleMesh {
    pub vertices: Vec<Point3<f64>>,
    pub faces: Vec<[u32; 3]>,
}

impl TriangleMesh {
    pub fn new(vertices: Vec<Point3<f64>>, faces: Vec<[u32; 3]>) -> Self {
        Self { vertices, faces }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Corner positions of face `f`.
    #[inline]
    pub fn triangle(&self, f: usize) -> [Point3<f64>; 3] {
        let [a, b, c] = self.faces[f];
        [
            self.vertices[a as usize],
            self.vertices[b as usize],
            self.vertices[c as usize],
        ]
    }

    #[inline]
    fn face_cross(&self, f: usize) -> Vector3<f64> {
        let [a, b, c] = self.triangle(f);
        (b - a).cross(&(c - a))
    }

    /// Unit outward normal of face `f`, `None` for zero-area faces.
    pub fn face_normal(&self, f: usize) -> Option<Unit<Vector3<f64>>> {
        Unit::try_new(self.face_cross(f), 1e-300)
    }

    #[inline]
    pub fn face_area(&self, f: usize) -> f64 {
        0.5 * self.face_cross(f).norm()
    }

    pub fn surface_area(&self) -> f64 {
        (0..self.faces.len()).map(|f| self.face_area(f)).sum()
    }

    /// Bounding box of the vertices referenced by faces.
    pub fn bbox(&self) -> Option<Aabb> {
        Aabb::from_points(
            self.faces
                .iter()
                .flat_map(|face| face.iter().map(|&i| &self.vertices[i as usize])),
        )
    }

    /// Append another mesh, re-indexing its faces.
    pub fn append(&mut self, other: &TriangleMesh) {
        let offset = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.faces.extend(
            other
                .faces
                .iter()
                .map(|f| [f[0] + offset, f[1] + offset, f[2] + offset]),
        );
    }

    fn edge_faces(&self) -> HashMap<(u32, u32), Vec<usize>> {
        let mut edges: HashMap<(u32, u32), Vec<usize>> = HashMap::new();
        for (fi, face) in self.faces.iter().enumerate() {
            for k in 0..3 {
                let a = face[k];
                let b = face[(k + 1) % 3];
                let key = if a < b { (a, b) } else { (b, a) };
                edges.entry(key).or_default().push(fi);
            }
        }
        edges
    }

    /// Number of edges used by exactly one face.
    pub fn boundary_edge_count(&self) -> usize {
        self.edge_faces().values().filter(|f| f.len() == 1).count()
    }

    /// A mesh is closed when it has no boundary edges.
    pub fn is_closed(&self) -> bool {
        !self.is_empty() && self.boundary_edge_count() == 0
    }

    /// Split into edge-connected components.
    ///
    /// Two faces belong to the same component when they share an edge
    /// (a pair of vertex indices). Components are ordered by their lowest
    /// face index and each carries only the vertices it references.
    pub fn connected_components(&self) -> Vec<TriangleMesh> {
        let n = self.faces.len();
        let mut parent: Vec<usize> = (0..n).collect();

        fn find(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }

        for faces in self.edge_faces().values() {
            let Some((&first, rest)) = faces.split_first() else {
                continue;
            };
            for &other in rest {
                let ra = find(&mut parent, first);
                let rb = find(&mut parent, other);
                if ra != rb {
                    // keep the smaller index as root so ordering is stable
                    let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
                    parent[hi] = lo;
                }
            }
        }

        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut group_of_root: HashMap<usize, usize> = HashMap::new();
        for f in 0..n {
            let root = find(&mut parent, f);
            let g = *group_of_root.entry(root).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[g].push(f);
        }

        groups.iter().map(|faces| self.submesh(faces)).collect()
    }

    /// Extract the given faces into a standalone mesh with compact vertices.
    pub fn submesh(&self, face_indices: &[usize]) -> TriangleMesh {
        let mut remap: HashMap<u32, u32> = HashMap::new();
        let mut vertices = Vec::new();
        let mut faces = Vec::with_capacity(face_indices.len());
        for &fi in face_indices {
            let mut out = [0u32; 3];
            for (k, &vi) in self.faces[fi].iter().enumerate() {
                out[k] = *remap.entry(vi).or_insert_with(|| {
                    vertices.push(self.vertices[vi as usize]);
                    (vertices.len() - 1) as u32
                });
            }
            faces.push(out);
        }
        TriangleMesh { vertices, faces }
    }
}
