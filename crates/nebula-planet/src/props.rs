//! Scene prop placement on the finished planet surface.
//!
//! Runs after every chunk mesh exists and before the planet is reported
//! ready. Placement is deterministic for a given seed and surface.

use glam::{IVec3, Vec3};
use nebula_config::PropConfig;
use nebula_mesh::ChunkMesh;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::generator::GeneratedChunk;

/// Attempts made per requested prop before giving up on steep surfaces.
const ATTEMPTS_PER_PROP: u64 = 8;

/// Parameters for one prop placement pass.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropSettings {
    /// Props requested. Zero disables placement.
    pub count: u32,
    /// Seed for the placement RNG.
    pub seed: u64,
    /// Steepest surface, relative to the local up direction, a prop may stand on.
    pub max_slope_degrees: f32,
    /// Number of distinct prop kinds to choose from.
    pub kinds: u32,
}

impl Default for PropSettings {
    fn default() -> Self {
        Self {
            count: 0,
            seed: 0,
            max_slope_degrees: 35.0,
            kinds: 1,
        }
    }
}

impl PropSettings {
    pub fn from_config(config: &PropConfig, seed: u64) -> Self {
        Self {
            count: config.count,
            seed,
            max_slope_degrees: config.max_slope_degrees,
            kinds: config.kinds,
        }
    }
}

/// One placed prop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PropPlacement {
    /// World-space position on the surface.
    pub position: Vec3,
    /// Unit direction away from the planet centre.
    pub up: Vec3,
    /// Chunk whose mesh the prop stands on.
    pub chunk_id: IVec3,
    /// Prop kind in `0..kinds`.
    pub kind: u32,
}

/// Scatter up to `settings.count` props over the surface of `chunks`.
///
/// Candidate spots are centroids of uniformly chosen triangles. A spot is
/// kept when the averaged surface normal is within the slope limit of the
/// radial up direction; the planet centre is the origin.
pub fn place_props(chunks: &[GeneratedChunk], settings: &PropSettings) -> Vec<PropPlacement> {
    let mut placements = Vec::new();
    if settings.count == 0 {
        return placements;
    }

    // Running triangle totals, so a global triangle index maps to its chunk.
    let mut ends = Vec::with_capacity(chunks.len());
    let mut total = 0usize;
    for chunk in chunks {
        total += chunk.mesh.triangle_count();
        ends.push(total);
    }
    if total == 0 {
        return placements;
    }

    let min_cos = settings.max_slope_degrees.clamp(0.0, 180.0).to_radians().cos();
    let mut rng = ChaCha8Rng::seed_from_u64(settings.seed);
    let attempts = settings.count as u64 * ATTEMPTS_PER_PROP;

    for _ in 0..attempts {
        if placements.len() == settings.count as usize {
            break;
        }

        let global = rng.random_range(0..total);
        let chunk_index = ends.partition_point(|&end| end <= global);
        let chunk = &chunks[chunk_index];
        let start = if chunk_index == 0 { 0 } else { ends[chunk_index - 1] };
        let kind = if settings.kinds > 1 {
            rng.random_range(0..settings.kinds)
        } else {
            0
        };

        let Some((position, normal)) = triangle_spot(&chunk.mesh, global - start) else {
            continue;
        };
        let up = position.normalize_or_zero();
        if up == Vec3::ZERO || normal.dot(up) < min_cos {
            continue;
        }

        placements.push(PropPlacement {
            position,
            up,
            chunk_id: chunk.attributes.id,
            kind,
        });
    }

    debug!(
        "Placed {}/{} props in {attempts} attempts",
        placements.len(),
        settings.count
    );
    placements
}

/// Centroid and averaged unit normal of one triangle.
fn triangle_spot(mesh: &ChunkMesh, triangle: usize) -> Option<(Vec3, Vec3)> {
    let tri = mesh.indices.get(triangle * 3..triangle * 3 + 3)?;
    let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
    let centroid = (mesh.positions[a] + mesh.positions[b] + mesh.positions[c]) / 3.0;
    let normal = (mesh.normals[a] + mesh.normals[b] + mesh.normals[c]).normalize_or_zero();
    (normal != Vec3::ZERO).then_some((centroid, normal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_terrain::ChunkAttributes;

    /// A single upward-facing triangle hovering at `height` above the origin.
    fn plate(height: f32, normal: Vec3) -> GeneratedChunk {
        GeneratedChunk {
            attributes: ChunkAttributes {
                id: IVec3::new(0, 1, 0),
                centre: Vec3::new(0.0, height, 0.0),
                size: 1.0,
            },
            mesh: ChunkMesh {
                positions: vec![
                    Vec3::new(-0.1, height, -0.1),
                    Vec3::new(0.1, height, -0.1),
                    Vec3::new(0.0, height, 0.1),
                ],
                normals: vec![normal; 3],
                indices: vec![0, 1, 2],
            },
        }
    }

    fn settings(count: u32) -> PropSettings {
        PropSettings {
            count,
            seed: 9,
            max_slope_degrees: 30.0,
            kinds: 4,
        }
    }

    #[test]
    fn test_no_surface_no_props() {
        assert!(place_props(&[], &settings(10)).is_empty());
        let empty = GeneratedChunk {
            attributes: plate(1.0, Vec3::Y).attributes,
            mesh: ChunkMesh::new(),
        };
        assert!(place_props(&[empty], &settings(10)).is_empty());
    }

    #[test]
    fn test_flat_ground_accepts_all() {
        let chunks = [plate(10.0, Vec3::Y)];
        let props = place_props(&chunks, &settings(5));
        assert_eq!(props.len(), 5);
        for prop in &props {
            assert_eq!(prop.chunk_id, IVec3::new(0, 1, 0));
            assert!(prop.kind < 4);
            assert!((prop.up - Vec3::Y).length() < 1e-2);
            assert!((prop.position.y - 10.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_steep_surface_rejected() {
        let chunks = [plate(10.0, Vec3::X)];
        assert!(place_props(&chunks, &settings(5)).is_empty());
    }

    #[test]
    fn test_deterministic_for_seed() {
        let chunks = [plate(10.0, Vec3::Y), plate(12.0, Vec3::Y)];
        assert_eq!(
            place_props(&chunks, &settings(8)),
            place_props(&chunks, &settings(8))
        );
    }

    #[test]
    fn test_zero_count_disabled() {
        let chunks = [plate(10.0, Vec3::Y)];
        assert!(place_props(&chunks, &PropSettings::default()).is_empty());
    }
}
