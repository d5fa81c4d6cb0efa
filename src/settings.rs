//! Render settings loaded from JSON.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::sampling::{sample_dimensions, SamplingAlgorithm};
use crate::util::{Error, Result, Vec3};

/// Camera placement and lens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub position: [f32; 3],
    pub look_at: [f32; 3],
    pub up: [f32; 3],
    /// Vertical field of view in degrees
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 1.0],
            look_at: [0.0, 0.0, 0.0],
            up: [0.0, 1.0, 0.0],
            fov_y: 90.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl CameraSettings {
    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn look_at(&self) -> Vec3 {
        Vec3::from_array(self.look_at)
    }

    pub fn up(&self) -> Vec3 {
        Vec3::from_array(self.up)
    }
}

/// Everything the renderer needs besides the scene itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    // Output
    pub width: u32,
    pub height: u32,

    // Integrator
    pub samples_per_pixel: u32,
    pub max_depth: u32,
    pub algorithm: SamplingAlgorithm,

    // QMC: number of scrambled tables the shader indexes into
    pub qmc_replications: u32,
    pub qmc_seed: u64,

    // Environment (None = constant white)
    pub env_map: Option<PathBuf>,

    pub camera: CameraSettings,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 800,
            height: 450,
            samples_per_pixel: 100,
            max_depth: 5,
            algorithm: SamplingAlgorithm::PathTracing,
            qmc_replications: 64,
            qmc_seed: scrambled_hammersley::DEFAULT_SEED,
            env_map: None,
            camera: CameraSettings::default(),
        }
    }
}

impl RenderSettings {
    /// `<config dir>/rtprep/settings.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("rtprep");
            p.push("settings.json");
            p
        })
    }

    /// Read and validate settings from a JSON file. Missing fields take defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let json = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&json)?;
        settings.validate()?;
        tracing::debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    /// Write pretty JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(Error::InvalidSettings(msg));

        if self.width == 0 || self.height == 0 {
            return fail(format!("screen size {}x{} must be positive", self.width, self.height));
        }
        if self.samples_per_pixel == 0 {
            return fail("samples_per_pixel must be positive".into());
        }
        if self.qmc_replications == 0 {
            return fail("qmc_replications must be positive".into());
        }
        let dims = self.sampling_dimensions();
        if dims > scrambled_hammersley::MAX_DIMENSIONS {
            return fail(format!(
                "max_depth {} needs {dims} sample dimensions, at most {} are supported",
                self.max_depth,
                scrambled_hammersley::MAX_DIMENSIONS
            ));
        }
        let cam = &self.camera;
        if !(cam.fov_y > 0.0 && cam.fov_y < 180.0) {
            return fail(format!("camera fov_y {} must be in (0, 180)", cam.fov_y));
        }
        if !(cam.near > 0.0 && cam.far > cam.near) {
            return fail(format!("camera clip range {}..{} is invalid", cam.near, cam.far));
        }
        let forward = cam.look_at() - cam.position();
        if forward.length_squared() == 0.0 || forward.cross(cam.up()).length_squared() == 0.0 {
            return fail("camera look_at/up do not define a view direction".into());
        }
        Ok(())
    }

    /// Dimensions of each QMC point for this `max_depth`.
    pub fn sampling_dimensions(&self) -> usize {
        sample_dimensions(self.max_depth)
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_valid() {
        let s = RenderSettings::default();
        assert!(s.validate().is_ok());
        assert_eq!(s.sampling_dimensions(), 17);
        assert_eq!(s.qmc_seed, 12345);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let s: RenderSettings = serde_json::from_str(r#"{"algorithm": "qmc", "camera": {"fov_y": 45.0}}"#).unwrap();
        assert_eq!(s.algorithm, SamplingAlgorithm::QuasiMonteCarlo);
        assert_eq!(s.camera.fov_y, 45.0);
        assert_eq!(s.camera.up, [0.0, 1.0, 0.0]);
        assert_eq!(s.samples_per_pixel, 100);
    }

    #[test]
    fn test_validate_rejects() {
        let mut s = RenderSettings {
            max_depth: 40,
            ..Default::default()
        };
        assert!(matches!(s.validate(), Err(Error::InvalidSettings(_))));

        s.max_depth = 5;
        s.camera.up = [0.0, 0.0, -1.0];
        assert!(s.validate().is_err());

        s.camera = CameraSettings::default();
        s.samples_per_pixel = 0;
        assert!(s.validate().is_err());
    }
}
