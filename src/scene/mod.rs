//! Scene graph and its flattened, GPU-facing form.
//!
//! A [`Node`] tree is walked by [`SceneFlattener`], which appends every
//! geometry leaf to a [`SceneDataStore`] together with its accumulated world
//! transform and the nearest enclosing [`Material`].
//!
//! ```
//! use rtprep::scene::{flatten, shapes};
//!
//! let store = flatten(&shapes::default_scene()).unwrap();
//! assert_eq!(store.object_count(), 4);
//! ```

pub mod accel;
mod flatten;
mod material;
mod mesh;
mod node;
pub mod shapes;
mod store;
mod texture;

pub use accel::{BlasBuilder, BoundsOnlyBuilder, BottomLevel, CpuBvhBuilder, GpuInstance, Instance, TopLevel};
pub use flatten::{
    flatten, flatten_with, walk, FlattenOptions, SceneFlattener, SceneStats, SceneVisitor, VertexSpace,
};
pub use material::{AlphaMode, Material, NO_TEXTURE};
pub use mesh::{Mesh, MAX_VERTICES};
pub use node::Node;
pub use store::{ObjectRecord, SceneBuffers, SceneDataStore};
pub use texture::{AddressMode, Filter, SamplerDesc, Texture, TextureImage};
