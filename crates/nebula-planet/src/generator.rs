//! Whole-planet generation pass: density readback, chunk partition, and the
//! per-chunk march and assemble pipeline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use nebula_mesh::{ChunkMesh, CubeMarcher, Shading};
use nebula_terrain::{
    AttributeError, ChunkAttributes, DensityError, DensityField, DensitySource, PlanetAttributes,
};
use rayon::prelude::*;
use tracing::{debug, info, instrument};

use crate::grid::chunk_grid;
use crate::props::{PropPlacement, PropSettings, place_props};

/// Fatal failure of a generation pass. No chunk of a failed pass is kept.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanetError {
    #[error("invalid planet attributes: {0}")]
    Attributes(#[from] AttributeError),

    #[error("density field unavailable: {0}")]
    Density(#[from] DensityError),

    #[error("planet generation was cancelled")]
    Cancelled,

    /// The pass panicked on a worker thread.
    #[error("planet generation panicked: {0}")]
    Panicked(String),
}

/// Receives finished chunk meshes, e.g. a renderer or a collider builder.
pub trait ChunkMeshConsumer {
    fn consume(&mut self, chunk: &ChunkAttributes, mesh: &ChunkMesh);
}

/// One chunk of a finished planet.
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratedChunk {
    pub attributes: ChunkAttributes,
    pub mesh: ChunkMesh,
}

/// Every chunk mesh of a planet, plus the props placed on it.
#[derive(Clone, Debug)]
pub struct GeneratedPlanet {
    pub attributes: PlanetAttributes,
    pub shading: Shading,
    /// Chunks in grid order (see [`chunk_grid`]).
    pub chunks: Vec<GeneratedChunk>,
    pub props: Vec<PropPlacement>,
}

impl GeneratedPlanet {
    pub fn vertex_count(&self) -> usize {
        self.chunks.iter().map(|c| c.mesh.vertex_count()).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.chunks.iter().map(|c| c.mesh.triangle_count()).sum()
    }

    /// Chunks the surface does not pass through.
    pub fn empty_chunk_count(&self) -> usize {
        self.chunks.iter().filter(|c| c.mesh.is_empty()).count()
    }

    /// Give every chunk mesh, in grid order, to `consumer`.
    pub fn hand_off(&self, consumer: &mut impl ChunkMeshConsumer) {
        for chunk in &self.chunks {
            consumer.consume(&chunk.attributes, &chunk.mesh);
        }
    }
}

/// Drives one planet from density field to finished chunk meshes.
#[derive(Clone, Debug)]
pub struct PlanetGenerator {
    attributes: PlanetAttributes,
    shading: Shading,
    props: PropSettings,
}

impl PlanetGenerator {
    pub fn new(attributes: PlanetAttributes, shading: Shading) -> Self {
        Self {
            attributes,
            shading,
            props: PropSettings::default(),
        }
    }

    /// Place props on the finished surface using `props`.
    pub fn with_props(mut self, props: PropSettings) -> Self {
        self.props = props;
        self
    }

    pub fn attributes(&self) -> &PlanetAttributes {
        &self.attributes
    }

    pub fn shading(&self) -> Shading {
        self.shading
    }

    /// Run a full generation pass.
    pub fn generate(&self, source: &dyn DensitySource) -> Result<GeneratedPlanet, PlanetError> {
        self.generate_with_cancel(source, &AtomicBool::new(false))
    }

    /// Run a full generation pass, giving up as soon as `cancel` is set.
    ///
    /// The flag is checked after the readback, before each chunk and before
    /// prop placement. A cancelled pass drops every mesh built so far.
    #[instrument(skip_all)]
    pub fn generate_with_cancel(
        &self,
        source: &dyn DensitySource,
        cancel: &AtomicBool,
    ) -> Result<GeneratedPlanet, PlanetError> {
        let start = Instant::now();
        self.attributes.validate()?;

        let field = source.read_density(&self.attributes)?;
        let expected = self.attributes.texture_size() as usize;
        if field.size() != expected {
            return Err(DensityError::SizeMismatch {
                expected,
                actual: field.size(),
            }
            .into());
        }
        if cancel.load(Ordering::Relaxed) {
            return Err(PlanetError::Cancelled);
        }

        let chunks = chunk_grid(&self.attributes)
            .into_par_iter()
            .map(|chunk| {
                if cancel.load(Ordering::Relaxed) {
                    return None;
                }
                Some(self.generate_chunk(chunk, &field))
            })
            .collect::<Option<Vec<_>>>()
            .ok_or(PlanetError::Cancelled)?;

        if cancel.load(Ordering::Relaxed) {
            return Err(PlanetError::Cancelled);
        }
        let props = place_props(&chunks, &self.props);

        let planet = GeneratedPlanet {
            attributes: self.attributes,
            shading: self.shading,
            chunks,
            props,
        };
        info!(
            "Generated planet: {} chunks ({} empty), {} vertices, {} triangles, {} props in {:.2} ms",
            planet.chunks.len(),
            planet.empty_chunk_count(),
            planet.vertex_count(),
            planet.triangle_count(),
            planet.props.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(planet)
    }

    /// March and assemble a single chunk against an already-read field.
    pub fn generate_chunk(&self, chunk: ChunkAttributes, field: &DensityField) -> GeneratedChunk {
        let triangles = CubeMarcher::new(&self.attributes, &chunk, field).march_chunk();
        let mut mesh = ChunkMesh::assemble(&triangles, self.shading);
        if self.shading == Shading::Flat {
            mesh.recalculate_flat_normals();
        }

        debug!(
            "Chunk {} meshed: {} triangles, {} vertices",
            chunk.id,
            mesh.triangle_count(),
            mesh.vertex_count()
        );
        GeneratedChunk {
            attributes: chunk,
            mesh,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_terrain::SphereDensity;

    fn attributes() -> PlanetAttributes {
        PlanetAttributes {
            terrain_size: 20.0,
            num_chunks_per_axis: 2,
            points_per_axis: 5,
            iso_level: 0.0,
            noise_scale: 1.0,
            noise_height_multiplier: 1.0,
        }
    }

    struct Collector(Vec<(ChunkAttributes, usize)>);

    impl ChunkMeshConsumer for Collector {
        fn consume(&mut self, chunk: &ChunkAttributes, mesh: &ChunkMesh) {
            self.0.push((*chunk, mesh.triangle_count()));
        }
    }

    #[test]
    fn test_sphere_produces_every_chunk() {
        let planet = PlanetGenerator::new(attributes(), Shading::Smooth)
            .generate(&SphereDensity { radius: 6.0 })
            .unwrap();
        assert_eq!(planet.chunks.len(), 8);
        // The sphere crosses all octants.
        assert_eq!(planet.empty_chunk_count(), 0);
        assert!(planet.triangle_count() > 0);
        assert!(planet.props.is_empty());
    }

    #[test]
    fn test_invalid_attributes_rejected() {
        let mut attrs = attributes();
        attrs.points_per_axis = 1;
        let err = PlanetGenerator::new(attrs, Shading::Smooth)
            .generate(&SphereDensity { radius: 6.0 })
            .unwrap_err();
        assert_eq!(
            err,
            PlanetError::Attributes(AttributeError::PointsPerAxisTooSmall(1))
        );
    }

    #[test]
    fn test_mismatched_field_rejected() {
        let field = DensityField::filled(4, 0.0).unwrap();
        let err = PlanetGenerator::new(attributes(), Shading::Smooth)
            .generate(&field)
            .unwrap_err();
        assert!(matches!(
            err,
            PlanetError::Density(DensityError::SizeMismatch {
                expected: 9,
                actual: 4
            })
        ));
    }

    #[test]
    fn test_cancel_before_start() {
        let cancel = AtomicBool::new(true);
        let err = PlanetGenerator::new(attributes(), Shading::Smooth)
            .generate_with_cancel(&SphereDensity { radius: 6.0 }, &cancel)
            .unwrap_err();
        assert_eq!(err, PlanetError::Cancelled);
    }

    #[test]
    fn test_flat_normals_are_face_normals() {
        let planet = PlanetGenerator::new(attributes(), Shading::Flat)
            .generate(&SphereDensity { radius: 6.0 })
            .unwrap();
        for chunk in &planet.chunks {
            let mesh = &chunk.mesh;
            assert_eq!(mesh.vertex_count(), mesh.indices.len());
            for tri in mesh.indices.chunks_exact(3) {
                let n = mesh.normals[tri[0] as usize];
                assert_eq!(n, mesh.normals[tri[1] as usize]);
                assert_eq!(n, mesh.normals[tri[2] as usize]);
            }
        }
    }

    #[test]
    fn test_hand_off_in_grid_order() {
        let planet = PlanetGenerator::new(attributes(), Shading::Smooth)
            .generate(&SphereDensity { radius: 6.0 })
            .unwrap();
        let mut collector = Collector(Vec::new());
        planet.hand_off(&mut collector);
        assert_eq!(collector.0.len(), 8);
        for ((chunk, triangles), generated) in collector.0.iter().zip(&planet.chunks) {
            assert_eq!(*chunk, generated.attributes);
            assert_eq!(*triangles, generated.mesh.triangle_count());
        }
    }

    #[test]
    fn test_props_placed_after_meshing() {
        let props = PropSettings {
            count: 6,
            seed: 1,
            max_slope_degrees: 60.0,
            kinds: 2,
        };
        let planet = PlanetGenerator::new(attributes(), Shading::Smooth)
            .with_props(props)
            .generate(&SphereDensity { radius: 6.0 })
            .unwrap();
        assert!(!planet.props.is_empty());
        for prop in &planet.props {
            assert!((prop.position.length() - 6.0).abs() < 1.0);
        }
    }
}
