//! Immutable per-generation planet configuration and per-chunk placement.

use glam::{IVec3, Vec3};
use nebula_config::PlanetConfig;
use serde::{Deserialize, Serialize};

/// Configuration rejected at generation start.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AttributeError {
    /// A chunk needs at least two samples per edge to contain one cube.
    #[error("points_per_axis must be at least 2, got {0}")]
    PointsPerAxisTooSmall(u32),

    /// The terrain must be divided into at least one chunk.
    #[error("num_chunks_per_axis must be at least 1")]
    NoChunks,

    /// Terrain size must be finite and positive.
    #[error("terrain_size must be finite and positive, got {0}")]
    InvalidTerrainSize(f32),

    /// Iso level must be finite.
    #[error("iso_level must be finite, got {0}")]
    InvalidIsoLevel(f32),

    /// The density grid or a chunk's local index space does not fit.
    #[error(
        "grid of {num_chunks_per_axis} chunks with {points_per_axis} points per axis is too large"
    )]
    GridTooLarge {
        points_per_axis: u32,
        num_chunks_per_axis: u32,
    },
}

/// Planet-wide generation settings, fixed for one generation pass.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanetAttributes {
    /// World-space edge length of the terrain cube (centred on the origin).
    pub terrain_size: f32,
    /// Chunks along each axis.
    pub num_chunks_per_axis: u32,
    /// Density samples along each chunk edge.
    pub points_per_axis: u32,
    /// Surface threshold: a corner is inside when its density is below it.
    pub iso_level: f32,
    /// Overall scale of the surface noise.
    pub noise_scale: f32,
    /// Scale of the surface noise height.
    pub noise_height_multiplier: f32,
}

impl PlanetAttributes {
    /// Reject configurations that cannot produce a chunk grid.
    pub fn validate(&self) -> Result<(), AttributeError> {
        if self.points_per_axis < 2 {
            return Err(AttributeError::PointsPerAxisTooSmall(self.points_per_axis));
        }
        if self.num_chunks_per_axis == 0 {
            return Err(AttributeError::NoChunks);
        }
        if !self.terrain_size.is_finite() || self.terrain_size <= 0.0 {
            return Err(AttributeError::InvalidTerrainSize(self.terrain_size));
        }
        if !self.iso_level.is_finite() {
            return Err(AttributeError::InvalidIsoLevel(self.iso_level));
        }
        if self.checked_sample_count().is_none() || self.checked_chunk_index_space().is_none() {
            return Err(AttributeError::GridTooLarge {
                points_per_axis: self.points_per_axis,
                num_chunks_per_axis: self.num_chunks_per_axis,
            });
        }
        Ok(())
    }

    /// Samples in the whole field, `texture_size³`, if the grid fits.
    ///
    /// The texture size must be addressable by `i32` grid coordinates.
    pub fn checked_sample_count(&self) -> Option<usize> {
        let size = self
            .num_chunks_per_axis
            .checked_mul(self.num_cubes_per_axis())?
            .checked_add(1)
            .filter(|&size| size <= i32::MAX as u32)? as usize;
        size.checked_mul(size)?.checked_mul(size)
    }

    /// `points_per_axis³`, if a chunk's local grid indices fit in `u32`.
    fn checked_chunk_index_space(&self) -> Option<u32> {
        let p = self.points_per_axis;
        p.checked_mul(p)?.checked_mul(p)
    }

    /// Cubes along each chunk edge.
    pub fn num_cubes_per_axis(&self) -> u32 {
        self.points_per_axis.saturating_sub(1)
    }

    /// Cubes in one chunk.
    pub fn cubes_per_chunk(&self) -> usize {
        let n = self.num_cubes_per_axis() as usize;
        n * n * n
    }

    /// Density samples along each axis of the whole field.
    ///
    /// Neighbouring chunks share their boundary row of samples.
    pub fn texture_size(&self) -> u32 {
        self.num_chunks_per_axis * self.num_cubes_per_axis() + 1
    }

    /// World-space edge length of one chunk.
    pub fn chunk_size(&self) -> f32 {
        self.terrain_size / self.num_chunks_per_axis as f32
    }

    /// Total number of chunks in the grid.
    pub fn chunk_count(&self) -> usize {
        let n = self.num_chunks_per_axis as usize;
        n * n * n
    }

    /// Map a density grid coordinate to world space.
    ///
    /// The grid spans the whole terrain cube, centred on the origin.
    pub fn coord_to_world(&self, coord: IVec3) -> Vec3 {
        let extent = (self.texture_size() - 1).max(1) as f32;
        (coord.as_vec3() / extent - Vec3::splat(0.5)) * self.terrain_size
    }
}

impl From<&PlanetConfig> for PlanetAttributes {
    fn from(config: &PlanetConfig) -> Self {
        Self {
            terrain_size: config.terrain_size,
            num_chunks_per_axis: config.num_chunks_per_axis,
            points_per_axis: config.points_per_axis,
            iso_level: config.iso_level,
            noise_scale: config.noise_scale,
            noise_height_multiplier: config.noise_height_multiplier,
        }
    }
}

/// Placement of one chunk in the planet grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChunkAttributes {
    /// Grid coordinate, unique per chunk.
    pub id: IVec3,
    /// World-space centre.
    pub centre: Vec3,
    /// World-space edge length.
    pub size: f32,
}

impl ChunkAttributes {
    /// First density grid coordinate covered by this chunk.
    pub fn voxel_origin(&self, num_cubes_per_axis: u32) -> IVec3 {
        self.id * num_cubes_per_axis as i32
    }
}
