//! Final per-chunk mesh buffers, assembled from the raw triangle stream.

use glam::Vec3;
use rustc_hash::FxHashMap;

use crate::vertex::{EdgeId, Triangle, Vertex};

/// How surface normals are presented in the assembled mesh.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Shading {
    /// Vertices on the same grid edge are welded into one.
    #[default]
    Smooth,
    /// Every triangle owns its three vertices.
    Flat,
}

impl From<bool> for Shading {
    /// `true` selects flat shading.
    fn from(flat: bool) -> Self {
        if flat { Shading::Flat } else { Shading::Smooth }
    }
}

/// Vertex, normal and index buffers of one chunk, ready for a renderer or a
/// collider builder.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChunkMesh {
    /// World-space vertex positions.
    pub positions: Vec<Vec3>,
    /// One normal per position.
    pub normals: Vec<Vec3>,
    /// Triangle list, three indices per triangle, in emission winding order.
    pub indices: Vec<u32>,
}

impl ChunkMesh {
    /// Creates an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the buffers for `triangles`.
    ///
    /// With [`Shading::Smooth`] the first vertex seen on an edge claims an
    /// output slot and later vertices with the same [`EdgeId`] reuse it, so
    /// its position and normal win. With [`Shading::Flat`] nothing is shared.
    pub fn assemble(triangles: &[Triangle], shading: Shading) -> Self {
        let vertex_hint = triangles.len() * 3;
        let mut mesh = Self {
            positions: Vec::with_capacity(vertex_hint),
            normals: Vec::with_capacity(vertex_hint),
            indices: Vec::with_capacity(vertex_hint),
        };

        match shading {
            Shading::Flat => {
                for vertex in triangles.iter().flat_map(|t| t.vertices.iter()) {
                    let index = mesh.push_vertex(vertex);
                    mesh.indices.push(index);
                }
            }
            Shading::Smooth => {
                let mut welded: FxHashMap<EdgeId, u32> = FxHashMap::default();
                for vertex in triangles.iter().flat_map(|t| t.vertices.iter()) {
                    let index = match welded.get(&vertex.id) {
                        Some(&index) => index,
                        None => {
                            let index = mesh.push_vertex(vertex);
                            welded.insert(vertex.id, index);
                            index
                        }
                    };
                    mesh.indices.push(index);
                }
            }
        }

        mesh
    }

    fn push_vertex(&mut self, vertex: &Vertex) -> u32 {
        let index = self.positions.len() as u32;
        self.positions.push(vertex.position);
        self.normals.push(vertex.normal);
        index
    }

    /// Replace each triangle's vertex normals with its face normal.
    ///
    /// The face normal is flipped where it disagrees with the interpolated
    /// normals it replaces. Degenerate triangles keep their normals. Meant for
    /// flat-shaded meshes, where no vertex is shared between triangles.
    pub fn recalculate_flat_normals(&mut self) {
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let face = (self.positions[b] - self.positions[a])
                .cross(self.positions[c] - self.positions[a])
                .normalize_or_zero();
            if face == Vec3::ZERO {
                continue;
            }

            let interpolated = self.normals[a] + self.normals[b] + self.normals[c];
            let face = if face.dot(interpolated) < 0.0 { -face } else { face };
            for i in [a, b, c] {
                self.normals[i] = face;
            }
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Axis-aligned bounds of the vertex positions, `None` for an empty mesh.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.positions.first()?;
        Some(
            self.positions
                .iter()
                .fold((first, first), |(min, max), &p| (min.min(p), max.max(p))),
        )
    }
}
