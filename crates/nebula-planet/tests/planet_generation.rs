//! End-to-end generation properties, from density field to chunk meshes.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;

use glam::{IVec3, Vec3};
use nebula_config::PlanetConfig;
use nebula_mesh::{ChunkMesh, CubeMarcher, EdgeId, Shading, TRIANGULATION, triangle_count};
use nebula_planet::{PlanetError, PlanetGenerator, PropSettings, chunk_grid};
use nebula_terrain::{
    AttributeError, DensityError, DensityField, DensitySource, PlanetAttributes,
    PlanetNoiseDensity, SphereDensity,
};

fn sphere_attributes() -> PlanetAttributes {
    PlanetAttributes {
        terrain_size: 20.0,
        num_chunks_per_axis: 2,
        points_per_axis: 17,
        iso_level: 0.0,
        noise_scale: 1.0,
        noise_height_multiplier: 1.0,
    }
}

struct FailingReadback;

impl DensitySource for FailingReadback {
    fn read_density(&self, _attributes: &PlanetAttributes) -> Result<DensityField, DensityError> {
        Err(DensityError::Readback("device lost".into()))
    }
}

#[test]
fn test_every_table_row_is_terminated() {
    for row in TRIANGULATION.iter() {
        let valid = row.iter().take_while(|&&edge| edge != -1).count();
        assert!(valid <= 15);
        assert_eq!(valid % 3, 0);
        assert_eq!(row[15], -1);
    }
}

#[test]
fn test_uniform_fields_produce_no_triangles() {
    let mut attrs = sphere_attributes();
    attrs.iso_level = 0.5;
    let size = attrs.texture_size() as usize;

    for value in [0.0, 1.0] {
        let field = DensityField::filled(size, value).unwrap();
        let planet = PlanetGenerator::new(attrs, Shading::Smooth)
            .generate(&field)
            .unwrap();
        assert_eq!(planet.chunks.len(), 8);
        assert_eq!(planet.empty_chunk_count(), 8);
        assert_eq!(planet.triangle_count(), 0);
        assert_eq!(planet.vertex_count(), 0);
    }
}

#[test]
fn test_sphere_vertices_lie_on_radius() {
    let attrs = sphere_attributes();
    let radius = 6.0;
    let planet = PlanetGenerator::new(attrs, Shading::Smooth)
        .generate(&SphereDensity { radius })
        .unwrap();

    assert_eq!(planet.empty_chunk_count(), 0);
    for chunk in &planet.chunks {
        assert!(chunk.mesh.triangle_count() <= attrs.cubes_per_chunk() * 5);
        for p in &chunk.mesh.positions {
            assert!((p.length() - radius).abs() < 0.05, "vertex {p} off the sphere");
        }
    }

    let area: f32 = planet.chunks.iter().map(|c| mesh_area(&c.mesh)).sum();
    let expected = 4.0 * std::f32::consts::PI * radius * radius;
    assert!((area - expected).abs() / expected < 0.05, "area {area} vs {expected}");
}

fn mesh_area(mesh: &ChunkMesh) -> f32 {
    mesh.indices
        .chunks_exact(3)
        .map(|tri| {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| mesh.positions[i as usize]);
            (b - a).cross(c - a).length() * 0.5
        })
        .sum()
}

#[test]
fn test_generation_is_repeatable() {
    let attrs = sphere_attributes();
    let generator = PlanetGenerator::new(attrs, Shading::Smooth);
    let source = SphereDensity { radius: 7.3 };
    let a = generator.generate(&source).unwrap();
    let b = generator.generate(&source).unwrap();

    assert_eq!(a.chunks.len(), b.chunks.len());
    for (x, y) in a.chunks.iter().zip(&b.chunks) {
        assert_eq!(x.attributes, y.attributes);
        assert_eq!(x.mesh.vertex_count(), y.mesh.vertex_count());
        assert_eq!(x.mesh.triangle_count(), y.mesh.triangle_count());
        assert_eq!(x.mesh.bounds(), y.mesh.bounds());
    }
}

#[test]
fn test_smooth_shares_and_flat_splits_edge_vertices() {
    let attrs = sphere_attributes();
    let field = SphereDensity { radius: 5.0 }.read_density(&attrs).unwrap();
    let chunk = chunk_grid(&attrs)[0];
    let triangles = CubeMarcher::new(&attrs, &chunk, &field).march_chunk();
    assert!(!triangles.is_empty());

    let smooth = ChunkMesh::assemble(&triangles, Shading::Smooth);
    let mut by_id: HashMap<EdgeId, u32> = HashMap::new();
    let mut by_index: HashMap<u32, EdgeId> = HashMap::new();
    for (tri, indices) in triangles.iter().zip(smooth.indices.chunks_exact(3)) {
        for (vertex, &index) in tri.vertices.iter().zip(indices) {
            assert_eq!(*by_id.entry(vertex.id).or_insert(index), index);
            assert_eq!(*by_index.entry(index).or_insert(vertex.id), vertex.id);
        }
    }
    assert_eq!(smooth.vertex_count(), by_id.len());
    assert!(smooth.vertex_count() < triangles.len() * 3);

    let flat = ChunkMesh::assemble(&triangles, Shading::Flat);
    assert_eq!(flat.vertex_count(), triangles.len() * 3);
    let mut seen = vec![false; flat.vertex_count()];
    for &index in &flat.indices {
        assert!(!seen[index as usize], "flat mesh reuses vertex {index}");
        seen[index as usize] = true;
    }
}

#[test]
fn test_query_beyond_extent_is_clamped() {
    let field = DensityField::from_fn(6, |c| (c.x * 7 + c.y * 3 + c.z) as f32).unwrap();
    let max = IVec3::splat(5);
    assert_eq!(field.sample(max + IVec3::ONE), field.sample(max));
    assert_eq!(field.sample(max + IVec3::X), field.sample(max));
}

#[test]
fn test_single_inside_corner_scenario() {
    let attrs = PlanetAttributes {
        terrain_size: 2.0,
        num_chunks_per_axis: 1,
        points_per_axis: 3,
        iso_level: 0.5,
        noise_scale: 1.0,
        noise_height_multiplier: 1.0,
    };
    let mut field = DensityField::filled(attrs.texture_size() as usize, 0.0).unwrap();
    field.set(IVec3::ZERO, 1.0);

    let planet = PlanetGenerator::new(attrs, Shading::Smooth)
        .generate(&field)
        .unwrap();
    let mesh = &planet.chunks[0].mesh;

    // Every other corner sits below the iso level, so only corner 0 differs.
    assert_eq!(mesh.triangle_count(), triangle_count(0b1111_1110));
    assert_eq!(mesh.vertex_count(), 3);

    let corner = attrs.coord_to_world(IVec3::ZERO);
    for p in &mesh.positions {
        let offset = *p - corner;
        let axes = [offset.x, offset.y, offset.z]
            .iter()
            .filter(|c| c.abs() > 1e-6)
            .count();
        assert_eq!(axes, 1, "vertex {p} is not on an edge of the corner");
        assert!((offset.length() - 0.5).abs() < 1e-5);
    }
}

#[test]
fn test_readback_failure_aborts_pass() {
    let err = PlanetGenerator::new(sphere_attributes(), Shading::Smooth)
        .with_props(PropSettings {
            count: 4,
            ..Default::default()
        })
        .generate(&FailingReadback)
        .unwrap_err();
    assert_eq!(
        err,
        PlanetError::Density(DensityError::Readback("device lost".into()))
    );
}

#[test]
fn test_malformed_configuration_rejected() {
    let mut attrs = sphere_attributes();
    attrs.num_chunks_per_axis = 0;
    let err = PlanetGenerator::new(attrs, Shading::Smooth)
        .generate(&FailingReadback)
        .unwrap_err();
    assert_eq!(err, PlanetError::Attributes(AttributeError::NoChunks));

    let mut attrs = sphere_attributes();
    attrs.points_per_axis = 1;
    let err = PlanetGenerator::new(attrs, Shading::Smooth)
        .generate(&SphereDensity { radius: 1.0 })
        .unwrap_err();
    assert_eq!(
        err,
        PlanetError::Attributes(AttributeError::PointsPerAxisTooSmall(1))
    );

    let mut attrs = sphere_attributes();
    attrs.points_per_axis = u32::MAX;
    let err = PlanetGenerator::new(attrs, Shading::Smooth)
        .generate(&SphereDensity { radius: 1.0 })
        .unwrap_err();
    assert_eq!(
        err,
        PlanetError::Attributes(AttributeError::GridTooLarge {
            points_per_axis: u32::MAX,
            num_chunks_per_axis: 2
        })
    );
}

#[test]
fn test_cancelled_pass_yields_nothing() {
    let cancel = AtomicBool::new(true);
    let err = PlanetGenerator::new(sphere_attributes(), Shading::Flat)
        .generate_with_cancel(&SphereDensity { radius: 6.0 }, &cancel)
        .unwrap_err();
    assert_eq!(err, PlanetError::Cancelled);
}

#[test]
fn test_configured_noise_planet() {
    let config = PlanetConfig {
        num_chunks_per_axis: 2,
        points_per_axis: 9,
        flat_shading: true,
        seed: 42,
        ..Default::default()
    };
    let attrs = PlanetAttributes::from(&config);
    let source = PlanetNoiseDensity {
        seed: config.seed,
        octaves: config.octaves,
    };

    let planet = PlanetGenerator::new(attrs, Shading::from(config.flat_shading))
        .with_props(PropSettings {
            count: 10,
            seed: config.seed,
            max_slope_degrees: 60.0,
            kinds: 3,
        })
        .generate(&source)
        .unwrap();

    assert_eq!(planet.shading, Shading::Flat);
    assert_eq!(planet.chunks.len(), 8);
    assert!(planet.triangle_count() > 0);
    for chunk in &planet.chunks {
        assert_eq!(chunk.mesh.vertex_count(), chunk.mesh.indices.len());
        for n in &chunk.mesh.normals {
            assert!(n.length() < 1e-6 || (n.length() - 1.0).abs() < 1e-4);
        }
    }
    for prop in &planet.props {
        assert!(prop.kind < 3);
        assert!((prop.up.length() - 1.0).abs() < 1e-4);
        assert_ne!(prop.position, Vec3::ZERO);
    }
}
