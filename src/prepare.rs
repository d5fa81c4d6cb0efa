//! One-call preparation of everything the GPU layer uploads.

use crate::envmap::EnvMap;
use crate::sampling::{QmcSequence, SamplingAlgorithm};
use crate::scene::{flatten, shapes, Node, SceneBuffers, SceneDataStore};
use crate::settings::{CameraSettings, RenderSettings};
use crate::uniform::RayTracingUniform;
use crate::util::{Error, Result};

/// Flattened scene, environment tables, QMC buffer and uniform block.
#[derive(Debug)]
pub struct RenderInputs {
    settings: RenderSettings,
    scene: SceneDataStore,
    buffers: SceneBuffers,
    qmc: Option<QmcSequence>,
    uniform: RayTracingUniform,
}

impl RenderInputs {
    /// Flatten `root`, install `env` (constant white when `None`) and derive
    /// the sampling buffers for `settings`.
    #[tracing::instrument(skip_all, fields(algorithm = %settings.algorithm, spp = settings.samples_per_pixel))]
    pub fn build(settings: RenderSettings, root: &Node, env: Option<EnvMap>) -> Result<Self> {
        settings.validate()?;

        let mut scene = flatten(root)?;
        scene.set_env_map(env.unwrap_or_else(EnvMap::white))?;

        let qmc = match settings.algorithm {
            SamplingAlgorithm::QuasiMonteCarlo => Some(QmcSequence::new(
                settings.max_depth,
                settings.samples_per_pixel,
                settings.qmc_replications,
                settings.qmc_seed,
            )?),
            SamplingAlgorithm::PathTracing => None,
        };

        let mut uniform = RayTracingUniform {
            samples_per_pixel: settings.samples_per_pixel,
            env_map_texture_idx: scene.env_texture_index(),
            max_depth: settings.max_depth,
            ..Default::default()
        };
        uniform.set_algorithm(settings.algorithm);
        uniform.set_camera_settings(&settings.camera, settings.aspect_ratio());

        let buffers = scene.export();
        tracing::info!(
            objects = buffers.objects.len(),
            bytes = buffers.total_bytes(),
            qmc_floats = qmc.as_ref().map_or(0, |q| q.as_slice().len()),
            "render inputs ready"
        );

        Ok(Self {
            settings,
            scene,
            buffers,
            qmc,
            uniform,
        })
    }

    /// Default scene plus the environment map named in `settings`, if any.
    pub fn from_settings(settings: RenderSettings) -> Result<Self> {
        let env = settings.env_map.as_ref().map(EnvMap::load).transpose()?;
        Self::build(settings, &shapes::default_scene(), env)
    }

    /// Update the sample count. Returns `true` if the QMC buffer was regenerated
    /// and needs to be uploaded again.
    pub fn set_samples_per_pixel(&mut self, samples: u32) -> Result<bool> {
        if samples == 0 {
            return Err(Error::InvalidSettings("samples_per_pixel must be positive".into()));
        }
        let regenerated = match &mut self.qmc {
            Some(qmc) => qmc.set_samples(samples)?,
            None => false,
        };
        self.settings.samples_per_pixel = samples;
        self.uniform.samples_per_pixel = samples;
        Ok(regenerated)
    }

    pub fn set_camera(&mut self, camera: CameraSettings) {
        self.uniform.set_camera_settings(&camera, self.settings.aspect_ratio());
        self.settings.camera = camera;
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn scene(&self) -> &SceneDataStore {
        &self.scene
    }

    pub fn buffers(&self) -> &SceneBuffers {
        &self.buffers
    }

    pub fn qmc(&self) -> Option<&QmcSequence> {
        self.qmc.as_ref()
    }

    pub fn uniform(&self) -> &RayTracingUniform {
        &self.uniform
    }
}
