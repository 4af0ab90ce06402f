//! Read-only accessor over a flattened cubical grid of density samples.
//!
//! Samples are stored x-fastest: `index = x + y * size + z * size²`. Every
//! producer and consumer in the workspace uses this order.

use std::fmt;

use glam::{IVec3, Vec3};
use rayon::prelude::*;

/// Errors raised while building or retrieving a density field.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DensityError {
    /// A field must contain at least one sample per axis.
    #[error("density field must have at least one sample per axis")]
    EmptyField,

    /// The requested edge length does not fit the index space.
    #[error("density field of edge {size} is too large")]
    TooLarge { size: usize },

    /// The sample buffer does not hold `size³` values.
    #[error("density buffer holds {actual} samples, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    /// The field's edge does not match the planet's texture size.
    #[error("density field edge is {actual}, planet expects {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    /// The producer failed to hand over its samples.
    #[error("density readback failed: {0}")]
    Readback(String),
}

/// A cubical scalar field over any contiguous float storage.
///
/// Coordinates outside the grid are clamped to the nearest edge sample,
/// never wrapped. The field is immutable once built, so it can be shared by
/// reference across all marching workers.
#[derive(Clone)]
pub struct DensityField<S = Vec<f32>> {
    size: usize,
    samples: S,
}

impl<S: AsRef<[f32]>> DensityField<S> {
    /// Wrap an existing sample buffer of edge `size`.
    pub fn from_samples(size: usize, samples: S) -> Result<Self, DensityError> {
        let expected = checked_volume(size)?;
        let actual = samples.as_ref().len();
        if actual != expected {
            return Err(DensityError::LengthMismatch { expected, actual });
        }
        Ok(Self { size, samples })
    }

    /// Samples along each axis.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The raw samples in linear order.
    pub fn samples(&self) -> &[f32] {
        self.samples.as_ref()
    }

    /// Give back the underlying storage.
    pub fn into_inner(self) -> S {
        self.samples
    }

    /// Clamp each component into `[0, size - 1]`.
    pub fn clamp_coord(&self, coord: IVec3) -> IVec3 {
        let max = self.size as i32 - 1;
        coord.clamp(IVec3::ZERO, IVec3::splat(max))
    }

    /// Linear index of a coordinate, after clamping.
    pub fn index_of(&self, coord: IVec3) -> usize {
        let c = self.clamp_coord(coord);
        let size = self.size;
        c.x as usize + c.y as usize * size + c.z as usize * size * size
    }

    /// Grid coordinate of a linear index.
    pub fn coord_of(&self, index: usize) -> IVec3 {
        let size = self.size;
        IVec3::new(
            (index % size) as i32,
            ((index / size) % size) as i32,
            (index / (size * size)) as i32,
        )
    }

    /// Density at `coord`, clamped to the grid edges.
    #[inline]
    pub fn sample(&self, coord: IVec3) -> f32 {
        self.samples.as_ref()[self.index_of(coord)]
    }

    /// Normalized central-difference gradient at `coord`.
    ///
    /// Points toward increasing density. A flat neighbourhood yields
    /// `Vec3::ZERO` rather than NaN.
    pub fn gradient(&self, coord: IVec3) -> Vec3 {
        let dx = self.sample(coord + IVec3::X) - self.sample(coord - IVec3::X);
        let dy = self.sample(coord + IVec3::Y) - self.sample(coord - IVec3::Y);
        let dz = self.sample(coord + IVec3::Z) - self.sample(coord - IVec3::Z);
        Vec3::new(dx, dy, dz).normalize_or_zero()
    }
}

impl DensityField<Vec<f32>> {
    /// Build a field by evaluating `f` at every grid coordinate.
    ///
    /// Z-slabs are filled in parallel.
    pub fn from_fn<F>(size: usize, f: F) -> Result<Self, DensityError>
    where
        F: Fn(IVec3) -> f32 + Sync,
    {
        let volume = checked_volume(size)?;
        let mut samples = vec![0.0_f32; volume];
        samples
            .par_chunks_mut(size * size)
            .enumerate()
            .for_each(|(z, slab)| {
                for y in 0..size {
                    for x in 0..size {
                        slab[x + y * size] = f(IVec3::new(x as i32, y as i32, z as i32));
                    }
                }
            });
        Ok(Self { size, samples })
    }

    /// A field holding the same value everywhere.
    pub fn filled(size: usize, value: f32) -> Result<Self, DensityError> {
        let volume = checked_volume(size)?;
        Ok(Self {
            size,
            samples: vec![value; volume],
        })
    }

    /// Overwrite one sample. Out-of-range coordinates are clamped.
    pub fn set(&mut self, coord: IVec3, value: f32) {
        let index = self.index_of(coord);
        self.samples[index] = value;
    }
}

impl<S> fmt::Debug for DensityField<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DensityField")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

fn checked_volume(size: usize) -> Result<usize, DensityError> {
    if size == 0 {
        return Err(DensityError::EmptyField);
    }
    if size > i32::MAX as usize {
        return Err(DensityError::TooLarge { size });
    }
    size.checked_mul(size)
        .and_then(|area| area.checked_mul(size))
        .ok_or(DensityError::TooLarge { size })
}
