//! # rtprep
//!
//! CPU-side preparation of scenes and sampling tables for GPU ray tracing.
//!
//! ## Modules
//!
//! - [`scene`] - Scene graph, flattening into concatenated GPU buffers, BLAS/TLAS
//! - [`envmap`] - Environment maps and their importance-sampling tables
//! - [`sampling`] - Sampling algorithm selection and the QMC point-set cache
//! - [`settings`] - Render settings (JSON)
//! - [`uniform`] - Ray-generation uniform block
//! - [`prepare`] - All of the above in one call
//! - [`util`] - Errors and math types
//!
//! The scrambled Hammersley generator lives in its own crate and is
//! re-exported as [`hammersley`].
//!
//! ## Example
//!
//! ```
//! use rtprep::prelude::*;
//!
//! let scene = Node::transform(
//!     Mat4::from_translation(Vec3::X),
//!     vec![Node::geometry(shapes::quad(Vec3::ZERO, Vec3::Z, Vec3::Y, 1.0, 1.0))],
//! );
//! let store = flatten(&scene)?;
//! assert_eq!(store.objects()[0].vertex_offset, 0);
//!
//! let env = EnvMapSamplingData::build(&EnvMap::constant(8, 4, Vec3::ONE))?;
//! assert!((env.marginal_cdf()[3] - 1.0).abs() < 1e-6);
//! # Ok::<(), rtprep::Error>(())
//! ```

pub mod util;
pub mod scene;
pub mod envmap;
pub mod sampling;
pub mod settings;
pub mod uniform;
pub mod prepare;

pub use scrambled_hammersley as hammersley;

// Re-export commonly used types
pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Error, Result, Mat4, Vec2, Vec3, Vec4};
    pub use crate::scene::{
        flatten, flatten_with, shapes, FlattenOptions, Material, Mesh, Node, SceneDataStore, SceneFlattener,
        VertexSpace,
    };
    pub use crate::envmap::{EnvMap, EnvMapSamplingData};
    pub use crate::sampling::{QmcSequence, SamplingAlgorithm};
    pub use crate::settings::RenderSettings;
    pub use crate::prepare::RenderInputs;
}
