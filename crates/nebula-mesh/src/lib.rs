//! Isosurface meshing: marching-cubes tables, the per-chunk cube marcher, and
//! assembly of the raw triangle stream into indexed mesh buffers.

pub mod chunk_mesh;
pub mod marcher;
pub mod tables;
pub mod vertex;

pub use chunk_mesh::{ChunkMesh, Shading};
pub use marcher::{CubeMarcher, interpolation_factor};
pub use tables::{
    CORNER_INDEX_A_FROM_EDGE, CORNER_INDEX_B_FROM_EDGE, CORNER_OFFSETS, MAX_TRIANGLES_PER_CUBE,
    SENTINEL, TRIANGULATION,
    edge_corners, flat_triangulation_table, triangle_count, triangles_for,
};
pub use vertex::{EdgeId, Triangle, Vertex};
