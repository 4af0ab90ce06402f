//! Producers of the density field consumed by the marcher.
//!
//! A [`DensitySource`] stands in for the asynchronous density readback: the
//! planet orchestrator asks it for a field once per generation pass and treats
//! an error as fatal for the whole pass.

use std::time::Instant;

use glam::IVec3;
use tracing::debug;

use crate::attributes::PlanetAttributes;
use crate::density::{DensityError, DensityField};
use crate::fbm::{FbmParams, FbmSampler};

/// Something that can hand over a planet's density field.
pub trait DensitySource: Send + Sync {
    /// Produce the field for `attributes`, with edge `attributes.texture_size()`.
    fn read_density(&self, attributes: &PlanetAttributes) -> Result<DensityField, DensityError>;
}

/// Signed distance to a sphere centred on the origin (negative inside).
///
/// Pair with an `iso_level` of zero to extract the sphere itself.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SphereDensity {
    /// Sphere radius in world units.
    pub radius: f32,
}

impl DensitySource for SphereDensity {
    fn read_density(&self, attributes: &PlanetAttributes) -> Result<DensityField, DensityError> {
        let size = attributes.texture_size() as usize;
        DensityField::from_fn(size, |coord| {
            attributes.coord_to_world(coord).length() - self.radius
        })
    }
}

/// Share of the terrain size taken by the undisplaced planet radius.
const BASE_RADIUS_FRACTION: f32 = 0.3;

/// Share of the terrain size a full-amplitude noise peak displaces the surface.
const HEIGHT_FRACTION: f32 = 0.08;

/// Noise-displaced planet: a sphere whose radius varies with fBm sampled on
/// the unit direction.
///
/// Density is `iso_level + (|p| - R(p)) / terrain_size`, so the surface lies
/// exactly at the iso level and density grows outward from the core.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlanetNoiseDensity {
    /// Noise seed.
    pub seed: u64,
    /// Noise octaves.
    pub octaves: u32,
}

impl PlanetNoiseDensity {
    /// Surface radius along the direction of `coord`.
    pub fn surface_radius(
        &self,
        sampler: &FbmSampler,
        attributes: &PlanetAttributes,
        coord: IVec3,
    ) -> f32 {
        let direction = attributes.coord_to_world(coord).normalize_or_zero();
        let height = sampler.sample_normalized(direction) as f32;
        attributes.terrain_size
            * (BASE_RADIUS_FRACTION
                + height * attributes.noise_height_multiplier * HEIGHT_FRACTION)
    }

    fn sampler(&self, attributes: &PlanetAttributes) -> FbmSampler {
        FbmSampler::new(FbmParams {
            seed: self.seed,
            octaves: self.octaves,
            base_frequency: attributes.noise_scale as f64 * 2.0,
            ..Default::default()
        })
    }
}

impl DensitySource for PlanetNoiseDensity {
    fn read_density(&self, attributes: &PlanetAttributes) -> Result<DensityField, DensityError> {
        let start = Instant::now();
        let sampler = self.sampler(attributes);
        let size = attributes.texture_size() as usize;

        let field = DensityField::from_fn(size, |coord| {
            let distance = attributes.coord_to_world(coord).length();
            let radius = self.surface_radius(&sampler, attributes, coord);
            attributes.iso_level + (distance - radius) / attributes.terrain_size
        })?;

        debug!(
            "Computed {size}^3 density samples in {:.2} ms",
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(field)
    }
}

impl DensitySource for DensityField {
    fn read_density(&self, attributes: &PlanetAttributes) -> Result<DensityField, DensityError> {
        let expected = attributes.texture_size() as usize;
        if self.size() != expected {
            return Err(DensityError::SizeMismatch {
                expected,
                actual: self.size(),
            });
        }
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attributes() -> PlanetAttributes {
        PlanetAttributes {
            terrain_size: 100.0,
            num_chunks_per_axis: 2,
            points_per_axis: 9,
            iso_level: 0.5,
            noise_scale: 1.0,
            noise_height_multiplier: 1.0,
        }
    }

    #[test]
    fn test_sphere_density_sign() {
        let attrs = attributes();
        let field = SphereDensity { radius: 30.0 }.read_density(&attrs).unwrap();
        assert_eq!(field.size(), attrs.texture_size() as usize);

        let centre = IVec3::splat(attrs.texture_size() as i32 / 2);
        assert!((field.sample(centre) + 30.0).abs() < 1e-4);
        assert!(field.sample(IVec3::ZERO) > 0.0);
    }

    #[test]
    fn test_planet_noise_density_core_and_corner() {
        let attrs = attributes();
        let source = PlanetNoiseDensity { seed: 3, octaves: 4 };
        let field = source.read_density(&attrs).unwrap();

        let centre = IVec3::splat(attrs.texture_size() as i32 / 2);
        assert!(field.sample(centre) < attrs.iso_level);
        assert!(field.sample(IVec3::ZERO) > attrs.iso_level);
    }

    #[test]
    fn test_planet_noise_density_deterministic() {
        let attrs = attributes();
        let source = PlanetNoiseDensity { seed: 11, octaves: 3 };
        let a = source.read_density(&attrs).unwrap();
        let b = source.read_density(&attrs).unwrap();
        assert_eq!(a.samples(), b.samples());
    }

    #[test]
    fn test_surface_radius_within_terrain() {
        let attrs = attributes();
        let source = PlanetNoiseDensity { seed: 1, octaves: 4 };
        let sampler = source.sampler(&attrs);
        let max = attrs.texture_size() as i32 - 1;
        for coord in [IVec3::ZERO, IVec3::new(max, 0, 3), IVec3::new(2, max, max)] {
            let radius = source.surface_radius(&sampler, &attrs, coord);
            assert!(radius > 0.0 && radius < attrs.terrain_size * 0.5);
        }
    }

    #[test]
    fn test_precomputed_field_size_checked() {
        let attrs = attributes();
        let field = DensityField::filled(5, 1.0).unwrap();
        assert_eq!(
            field.read_density(&attrs).unwrap_err(),
            DensityError::SizeMismatch {
                expected: 17,
                actual: 5
            }
        );

        let field = DensityField::filled(17, 1.0).unwrap();
        assert_eq!(field.read_density(&attrs).unwrap().size(), 17);
    }
}
