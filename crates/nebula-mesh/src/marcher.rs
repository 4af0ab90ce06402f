//! Per-cube isosurface extraction over one chunk of the density field.
//!
//! Every cube is an independent unit of work: it reads the shared, immutable
//! density field and appends to its own worker-local triangle buffer. The
//! buffers are joined once all cubes of the chunk have been marched, so no
//! state is shared between workers while marching.

use glam::IVec3;
use nebula_terrain::{ChunkAttributes, DensityField, PlanetAttributes};
use rayon::prelude::*;
use tracing::trace;

use crate::tables::{CORNER_OFFSETS, edge_corners, triangles_for};
use crate::vertex::{EdgeId, Triangle, Vertex};

/// Interpolation factor placing the surface between densities `da` and `db`.
///
/// Equal densities would divide by zero; the surface is then put halfway
/// along the edge. The factor is clamped to the edge.
#[inline]
pub fn interpolation_factor(iso_level: f32, da: f32, db: f32) -> f32 {
    let delta = db - da;
    if delta.abs() <= f32::EPSILON {
        return 0.5;
    }
    let t = (iso_level - da) / delta;
    if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.5 }
}

/// Marches the cubes of one chunk.
pub struct CubeMarcher<'a, S = Vec<f32>> {
    planet: &'a PlanetAttributes,
    field: &'a DensityField<S>,
    origin: IVec3,
    cubes_per_axis: usize,
}

impl<'a, S: AsRef<[f32]> + Sync> CubeMarcher<'a, S> {
    pub fn new(
        planet: &'a PlanetAttributes,
        chunk: &ChunkAttributes,
        field: &'a DensityField<S>,
    ) -> Self {
        let cubes = planet.num_cubes_per_axis();
        Self {
            planet,
            field,
            origin: chunk.voxel_origin(cubes),
            cubes_per_axis: cubes as usize,
        }
    }

    /// Density grid coordinate of the chunk's first sample.
    pub fn origin(&self) -> IVec3 {
        self.origin
    }

    /// Number of cubes in the chunk.
    pub fn cube_count(&self) -> usize {
        self.cubes_per_axis.pow(3)
    }

    /// Chunk-local coordinate of the cube with flattened index `index`.
    pub fn cube_local_coord(&self, index: usize) -> IVec3 {
        let n = self.cubes_per_axis;
        IVec3::new(
            (index % n) as i32,
            ((index / n) % n) as i32,
            (index / (n * n)) as i32,
        )
    }

    /// Density grid coordinates of the 8 corners of a cube.
    pub fn corner_coords(&self, local: IVec3) -> [IVec3; 8] {
        let base = self.origin + local;
        CORNER_OFFSETS.map(|offset| base + offset)
    }

    /// 8-bit inside/outside pattern; bit `i` is set when corner `i` lies
    /// below the iso level.
    pub fn cube_configuration(&self, corners: &[IVec3; 8]) -> u8 {
        corners
            .iter()
            .enumerate()
            .filter(|&(_, &corner)| self.field.sample(corner) < self.planet.iso_level)
            .fold(0u8, |config, (i, _)| config | (1 << i))
    }

    /// Chunk-local linear index of a grid point, `x + y*p + z*p²`.
    pub fn index_from_coord(&self, coord: IVec3) -> u32 {
        let local = coord - self.origin;
        let p = self.planet.points_per_axis;
        local.x as u32 + local.y as u32 * p + local.z as u32 * p * p
    }

    /// Append the triangles of the cube at chunk-local `local` to `out`.
    pub fn march_cube(&self, local: IVec3, out: &mut Vec<Triangle>) {
        let corners = self.corner_coords(local);
        let configuration = self.cube_configuration(&corners);

        for [ea, eb, ec] in triangles_for(configuration) {
            out.push(Triangle::new(
                self.edge_vertex(&corners, ea),
                self.edge_vertex(&corners, eb),
                self.edge_vertex(&corners, ec),
            ));
        }
    }

    fn edge_vertex(&self, corners: &[IVec3; 8], edge: usize) -> Vertex {
        let (a, b) = edge_corners(edge);
        self.create_vertex(corners[a], corners[b])
    }

    /// Surface vertex on the grid edge between `a` and `b`.
    pub fn create_vertex(&self, a: IVec3, b: IVec3) -> Vertex {
        let da = self.field.sample(a);
        let db = self.field.sample(b);
        let t = interpolation_factor(self.planet.iso_level, da, db);

        let position = self
            .planet
            .coord_to_world(a)
            .lerp(self.planet.coord_to_world(b), t);

        let normal_a = self.field.gradient(a);
        let normal_b = self.field.gradient(b);
        let normal = normal_a.lerp(normal_b, t).normalize_or_zero();

        Vertex {
            position,
            normal,
            id: EdgeId::new(self.index_from_coord(a), self.index_from_coord(b)),
        }
    }

    /// March every cube of the chunk in parallel and join the results.
    ///
    /// Each rayon split folds into its own buffer; buffers are concatenated
    /// after all cubes finish and dropped when this call returns.
    pub fn march_chunk(&self) -> Vec<Triangle> {
        let triangles = (0..self.cube_count())
            .into_par_iter()
            .fold(Vec::new, |mut triangles, index| {
                self.march_cube(self.cube_local_coord(index), &mut triangles);
                triangles
            })
            .reduce(Vec::new, |mut left, mut right| {
                left.append(&mut right);
                left
            });

        trace!(
            origin = ?self.origin,
            triangles = triangles.len(),
            "Marched chunk"
        );
        triangles
    }

    /// Single-threaded equivalent of [`march_chunk`](Self::march_chunk).
    pub fn march_chunk_sequential(&self) -> Vec<Triangle> {
        let mut triangles = Vec::new();
        for index in 0..self.cube_count() {
            self.march_cube(self.cube_local_coord(index), &mut triangles);
        }
        triangles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::triangle_count;
    use glam::Vec3;

    fn planet(points_per_axis: u32, chunks: u32, iso_level: f32) -> PlanetAttributes {
        PlanetAttributes {
            terrain_size: 10.0,
            num_chunks_per_axis: chunks,
            points_per_axis,
            iso_level,
            noise_scale: 1.0,
            noise_height_multiplier: 1.0,
        }
    }

    fn chunk(id: IVec3) -> ChunkAttributes {
        ChunkAttributes {
            id,
            centre: Vec3::ZERO,
            size: 10.0,
        }
    }

    #[test]
    fn test_interpolation_factor() {
        assert_eq!(interpolation_factor(0.5, 0.0, 1.0), 0.5);
        assert!((interpolation_factor(0.25, 0.0, 1.0) - 0.25).abs() < 1e-6);
        assert_eq!(interpolation_factor(0.5, 0.3, 0.3), 0.5);
        assert_eq!(interpolation_factor(2.0, 0.0, 1.0), 1.0);
        assert_eq!(interpolation_factor(-1.0, 0.0, 1.0), 0.0);
    }

    #[test]
    fn test_cube_local_coord_roundtrip() {
        let attrs = planet(5, 1, 0.5);
        let field = DensityField::filled(attrs.texture_size() as usize, 0.0).unwrap();
        let marcher = CubeMarcher::new(&attrs, &chunk(IVec3::ZERO), &field);
        assert_eq!(marcher.cube_count(), 64);
        assert_eq!(marcher.cube_local_coord(0), IVec3::ZERO);
        assert_eq!(marcher.cube_local_coord(1), IVec3::X);
        assert_eq!(marcher.cube_local_coord(4), IVec3::Y);
        assert_eq!(marcher.cube_local_coord(16), IVec3::Z);
        assert_eq!(marcher.cube_local_coord(63), IVec3::splat(3));
    }

    #[test]
    fn test_corner_coords_offset_by_chunk_origin() {
        let attrs = planet(3, 2, 0.5);
        let field = DensityField::filled(attrs.texture_size() as usize, 0.0).unwrap();
        let marcher = CubeMarcher::new(&attrs, &chunk(IVec3::new(1, 0, 1)), &field);
        assert_eq!(marcher.origin(), IVec3::new(2, 0, 2));
        let corners = marcher.corner_coords(IVec3::ZERO);
        assert_eq!(corners[0], IVec3::new(2, 0, 2));
        assert_eq!(corners[2], IVec3::new(3, 0, 3));
        assert_eq!(corners[6], IVec3::new(3, 1, 3));
    }

    #[test]
    fn test_uniform_field_emits_nothing() {
        let attrs = planet(5, 1, 0.5);
        for value in [0.0, 1.0] {
            let field = DensityField::filled(attrs.texture_size() as usize, value).unwrap();
            let marcher = CubeMarcher::new(&attrs, &chunk(IVec3::ZERO), &field);
            assert!(marcher.march_chunk().is_empty());
        }
    }

    #[test]
    fn test_single_corner_configuration() {
        let attrs = planet(3, 1, 0.5);
        let mut field = DensityField::filled(attrs.texture_size() as usize, 0.0).unwrap();
        field.set(IVec3::ZERO, 1.0);
        let marcher = CubeMarcher::new(&attrs, &chunk(IVec3::ZERO), &field);

        let corners = marcher.corner_coords(IVec3::ZERO);
        assert_eq!(marcher.cube_configuration(&corners), 0b1111_1110);

        let triangles = marcher.march_chunk();
        assert_eq!(triangles.len(), triangle_count(0b1111_1110));
        let corner = attrs.coord_to_world(IVec3::ZERO);
        let spacing = attrs.terrain_size / (attrs.texture_size() - 1) as f32;
        for vertex in triangles.iter().flat_map(|t| t.vertices) {
            let offset = vertex.position - corner;
            let on_axes = [offset.x, offset.y, offset.z]
                .iter()
                .filter(|c| c.abs() > 1e-6)
                .count();
            assert_eq!(on_axes, 1, "vertex {offset:?} is not on a corner edge");
            assert!((offset.length() - spacing * 0.5).abs() < 1e-5);
        }
    }

    #[test]
    fn test_vertex_id_is_shared_between_cubes() {
        let attrs = planet(4, 1, 0.5);
        let field = DensityField::from_fn(attrs.texture_size() as usize, |c| c.x as f32 * 0.4)
            .unwrap();
        let marcher = CubeMarcher::new(&attrs, &chunk(IVec3::ZERO), &field);

        let a = marcher.create_vertex(IVec3::new(1, 1, 1), IVec3::new(2, 1, 1));
        let b = marcher.create_vertex(IVec3::new(2, 1, 1), IVec3::new(1, 1, 1));
        assert_eq!(a.id, b.id);
        assert_eq!(a.id, EdgeId::new(1 + 4 + 16, 2 + 4 + 16));
        assert!((a.position - b.position).length() < 1e-5);
    }

    #[test]
    fn test_equal_densities_stay_finite() {
        let attrs = planet(3, 1, 0.5);
        let field = DensityField::filled(attrs.texture_size() as usize, 0.5).unwrap();
        let marcher = CubeMarcher::new(&attrs, &chunk(IVec3::ZERO), &field);
        let vertex = marcher.create_vertex(IVec3::ZERO, IVec3::X);
        assert!(vertex.position.is_finite());
        assert!(vertex.normal.is_finite());
    }

    #[test]
    fn test_normals_are_unit_length() {
        let attrs = planet(9, 1, 0.0);
        let field = DensityField::from_fn(attrs.texture_size() as usize, |c| {
            attrs.coord_to_world(c).length() - 3.0
        })
        .unwrap();
        let marcher = CubeMarcher::new(&attrs, &chunk(IVec3::ZERO), &field);
        let triangles = marcher.march_chunk();
        assert!(!triangles.is_empty());
        for vertex in triangles.iter().flat_map(|t| t.vertices) {
            assert!((vertex.normal.length() - 1.0).abs() < 1e-4);
            // Density grows outward, so the gradient points away from the centre.
            assert!(vertex.normal.dot(vertex.position) > 0.0);
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let attrs = planet(9, 1, 0.0);
        let field = DensityField::from_fn(attrs.texture_size() as usize, |c| {
            attrs.coord_to_world(c).length() - 3.5
        })
        .unwrap();
        let marcher = CubeMarcher::new(&attrs, &chunk(IVec3::ZERO), &field);
        assert_eq!(marcher.march_chunk(), marcher.march_chunk_sequential());
    }
}
