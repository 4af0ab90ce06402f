//! Raw marcher output: vertices keyed by the grid edge they lie on.

use glam::Vec3;

/// Identity of the grid edge a vertex was interpolated on.
///
/// Holds the chunk-local linear indices of the edge's two endpoints, ordered
/// so that the same edge reached from any neighbouring cube gives the same id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId {
    pub low: u32,
    pub high: u32,
}

impl EdgeId {
    /// Build the id of the edge between grid points `a` and `b`.
    pub fn new(a: u32, b: u32) -> Self {
        Self {
            low: a.min(b),
            high: a.max(b),
        }
    }
}

/// One interpolated surface vertex.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vertex {
    /// World-space position.
    pub position: Vec3,
    /// Unit normal (zero only where the density field is perfectly flat).
    pub normal: Vec3,
    /// Edge this vertex lies on.
    pub id: EdgeId,
}

/// Three vertices by value, in emission (winding) order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle {
    pub vertices: [Vertex; 3],
}

impl Triangle {
    pub fn new(a: Vertex, b: Vertex, c: Vertex) -> Self {
        Self {
            vertices: [a, b, c],
        }
    }

    /// Unnormalized geometric normal following the winding order.
    pub fn face_normal(&self) -> Vec3 {
        let [a, b, c] = self.vertices;
        (b.position - a.position).cross(c.position - a.position)
    }
}
