//! Partition of the terrain cube into a regular grid of chunks.

use glam::{IVec3, Vec3};
use nebula_terrain::{ChunkAttributes, PlanetAttributes};

/// World-space centre of the chunk with grid coordinate `id`.
///
/// The grid is centred on the origin: `id * size + size / 2 - terrain_size / 2`.
pub fn chunk_centre(id: IVec3, attributes: &PlanetAttributes) -> Vec3 {
    let size = attributes.chunk_size();
    id.as_vec3() * size + Vec3::splat(size * 0.5 - attributes.terrain_size * 0.5)
}

/// Every chunk of the planet, x-major then y then z.
///
/// The chunk at `(x, y, z)` sits at index `x * n² + y * n + z`.
pub fn chunk_grid(attributes: &PlanetAttributes) -> Vec<ChunkAttributes> {
    let n = attributes.num_chunks_per_axis as i32;
    let size = attributes.chunk_size();
    let mut chunks = Vec::with_capacity(attributes.chunk_count());

    for x in 0..n {
        for y in 0..n {
            for z in 0..n {
                let id = IVec3::new(x, y, z);
                chunks.push(ChunkAttributes {
                    id,
                    centre: chunk_centre(id, attributes),
                    size,
                });
            }
        }
    }
    chunks
}
