//! Multi-octave fractal Brownian motion (fBm) over 3D simplex noise.
//!
//! Drives the planet surface displacement. Sampling happens on points of the
//! unit sphere so the surface has no seams between chunks or cube faces.

use glam::Vec3;
use noise::{NoiseFn, Simplex};

/// Configuration for multi-octave fBm noise.
#[derive(Clone, Debug, PartialEq)]
pub struct FbmParams {
    /// Seed for deterministic generation.
    pub seed: u64,
    /// Number of noise octaves to composite.
    pub octaves: u32,
    /// Frequency multiplier between successive octaves. Default: 2.0.
    pub lacunarity: f64,
    /// Amplitude multiplier between successive octaves. Default: 0.5.
    pub persistence: f64,
    /// Frequency of the first (lowest) octave.
    pub base_frequency: f64,
    /// Amplitude of the first octave.
    pub amplitude: f64,
}

impl Default for FbmParams {
    fn default() -> Self {
        Self {
            seed: 0,
            octaves: 4,
            lacunarity: 2.0,
            persistence: 0.5,
            base_frequency: 1.0,
            amplitude: 1.0,
        }
    }
}

/// Samples fBm noise: each octave doubles in frequency and halves in
/// amplitude (with the default lacunarity and persistence).
pub struct FbmSampler {
    noise: Simplex,
    params: FbmParams,
}

impl FbmSampler {
    /// Create a new sampler with the given parameters.
    pub fn new(params: FbmParams) -> Self {
        let noise = Simplex::new(params.seed as u32);
        Self { noise, params }
    }

    /// Sample at a 3D point.
    ///
    /// The result lies within `[-max_amplitude, +max_amplitude]`.
    pub fn sample(&self, point: Vec3) -> f64 {
        let p = point.as_dvec3();
        let mut total = 0.0;
        let mut frequency = self.params.base_frequency;
        let mut amplitude = self.params.amplitude;

        for _ in 0..self.params.octaves {
            let noise_val = self.noise.get([p.x * frequency, p.y * frequency, p.z * frequency]);
            total += noise_val * amplitude;

            frequency *= self.params.lacunarity;
            amplitude *= self.params.persistence;
        }

        total
    }

    /// Sample normalized into `[-1, 1]` by the geometric amplitude sum.
    pub fn sample_normalized(&self, point: Vec3) -> f64 {
        let max = self.max_amplitude();
        if max <= 0.0 {
            return 0.0;
        }
        (self.sample(point) / max).clamp(-1.0, 1.0)
    }

    /// Theoretical maximum absolute amplitude (geometric series sum).
    pub fn max_amplitude(&self) -> f64 {
        let mut sum = 0.0;
        let mut amp = self.params.amplitude;
        for _ in 0..self.params.octaves {
            sum += amp;
            amp *= self.params.persistence;
        }
        sum
    }

    /// Return a reference to the current parameters.
    pub fn params(&self) -> &FbmParams {
        &self.params
    }
}
