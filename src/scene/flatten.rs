//! Depth-first scene traversal and flattening.
//!
//! [`walk`] switches on the node variant and drives a [`SceneVisitor`].
//! [`SceneFlattener`] is the visitor that feeds a [`SceneDataStore`]: it keeps
//! a transform stack (`world = parent_world * local`) and a material stack
//! whose top is assigned to each geometry leaf.

use super::material::Material;
use super::mesh::Mesh;
use super::node::Node;
use super::store::SceneDataStore;
use crate::util::{Error, Mat4, Result};

/// Callbacks for [`walk`].
pub trait SceneVisitor {
    fn push_transform(&mut self, _matrix: &Mat4) {}

    fn pop_transform(&mut self) {}

    /// Enter a material scope. Visitors that do not track materials keep the
    /// default `false`, and the scope is then walked as a plain group.
    fn push_material(&mut self, _material: &Material) -> bool {
        false
    }

    fn pop_material(&mut self) {}

    fn geometry(&mut self, mesh: &Mesh) -> Result<()>;
}

/// Visit `node` and its subtree depth-first, children in order.
///
/// Push/pop calls are always balanced, also when a child fails.
pub fn walk<V: SceneVisitor + ?Sized>(node: &Node, visitor: &mut V) -> Result<()> {
    match node {
        Node::Group(children) => walk_children(children, visitor),
        Node::Transform { matrix, children } => {
            visitor.push_transform(matrix);
            let result = walk_children(children, visitor);
            visitor.pop_transform();
            result
        }
        Node::MaterialScope { material, children } => {
            if visitor.push_material(material) {
                let result = walk_children(children, visitor);
                visitor.pop_material();
                result
            } else {
                walk_children(children, visitor)
            }
        }
        Node::Geometry(mesh) => visitor.geometry(mesh),
    }
}

fn walk_children<V: SceneVisitor + ?Sized>(children: &[Node], visitor: &mut V) -> Result<()> {
    children.iter().try_for_each(|child| walk(child, visitor))
}

/// Space the stored vertex attributes live in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum VertexSpace {
    /// Attributes stay in object space; each instance carries the world transform.
    #[default]
    Object,
    /// Attributes are baked to world space; instances get the identity.
    World,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct FlattenOptions {
    pub vertex_space: VertexSpace,
    /// Log and skip meshes that fail validation instead of aborting.
    pub skip_invalid: bool,
}

/// Visitor that appends every geometry leaf to a [`SceneDataStore`].
#[derive(Debug)]
pub struct SceneFlattener {
    store: SceneDataStore,
    options: FlattenOptions,
    world: Mat4,
    transform_stack: Vec<Mat4>,
    material: Material,
    material_stack: Vec<Material>,
    skipped: usize,
}

impl Default for SceneFlattener {
    fn default() -> Self {
        Self::new(FlattenOptions::default())
    }
}

impl SceneFlattener {
    pub fn new(options: FlattenOptions) -> Self {
        Self::with_store(SceneDataStore::new(), options)
    }

    /// Append to an existing store, e.g. one with textures already loaded.
    pub fn with_store(store: SceneDataStore, options: FlattenOptions) -> Self {
        Self {
            store,
            options,
            world: Mat4::IDENTITY,
            transform_stack: Vec::new(),
            material: Material::default(),
            material_stack: Vec::new(),
            skipped: 0,
        }
    }

    /// Walk `root`, appending its geometry.
    #[tracing::instrument(skip_all, fields(nodes = root.node_count()))]
    pub fn visit(&mut self, root: &Node) -> Result<()> {
        walk(root, self)?;
        tracing::info!(
            objects = self.store.object_count(),
            indices = self.store.index_count(),
            vertices = self.store.vertex_count(),
            skipped = self.skipped,
            "scene flattened"
        );
        Ok(())
    }

    /// Current accumulated transform.
    pub fn world_transform(&self) -> Mat4 {
        self.world
    }

    /// Material a geometry leaf visited now would get.
    pub fn current_material(&self) -> &Material {
        &self.material
    }

    /// Meshes dropped under [`FlattenOptions::skip_invalid`].
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn store(&self) -> &SceneDataStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut SceneDataStore {
        &mut self.store
    }

    pub fn finish(self) -> SceneDataStore {
        self.store
    }
}

impl SceneVisitor for SceneFlattener {
    fn push_transform(&mut self, matrix: &Mat4) {
        self.transform_stack.push(self.world);
        self.world *= *matrix;
    }

    fn pop_transform(&mut self) {
        if let Some(parent) = self.transform_stack.pop() {
            self.world = parent;
        }
    }

    fn push_material(&mut self, material: &Material) -> bool {
        self.material_stack.push(self.material);
        self.material = *material;
        true
    }

    fn pop_material(&mut self) {
        if let Some(outer) = self.material_stack.pop() {
            self.material = outer;
        }
    }

    fn geometry(&mut self, mesh: &Mesh) -> Result<()> {
        let (transform, mesh) = match self.options.vertex_space {
            VertexSpace::Object => (self.world, mesh.clone()),
            VertexSpace::World => (Mat4::IDENTITY, mesh.transformed(&self.world)),
        };

        match self.store.add_mesh(transform, mesh, self.material) {
            Ok(_) => Ok(()),
            Err(err @ (Error::InvalidMesh { .. } | Error::TextureOutOfBounds { .. }))
                if self.options.skip_invalid =>
            {
                tracing::warn!("skipping mesh: {err}");
                self.skipped += 1;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

/// Flatten `root` into a new store with default options.
pub fn flatten(root: &Node) -> Result<SceneDataStore> {
    flatten_with(root, FlattenOptions::default())
}

pub fn flatten_with(root: &Node, options: FlattenOptions) -> Result<SceneDataStore> {
    let mut flattener = SceneFlattener::new(options);
    flattener.visit(root)?;
    Ok(flattener.finish())
}

/// Counts what a traversal would produce without building anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SceneStats {
    pub meshes: usize,
    pub triangles: usize,
    pub vertices: usize,
    pub transforms: usize,
    pub material_scopes: usize,
    /// Deepest transform nesting seen.
    pub max_depth: usize,
    depth: usize,
}

impl SceneStats {
    pub fn collect(root: &Node) -> Result<Self> {
        let mut stats = Self::default();
        walk(root, &mut stats)?;
        Ok(stats)
    }
}

impl SceneVisitor for SceneStats {
    fn push_transform(&mut self, _matrix: &Mat4) {
        self.transforms += 1;
        self.depth += 1;
        self.max_depth = self.max_depth.max(self.depth);
    }

    fn pop_transform(&mut self) {
        self.depth -= 1;
    }

    fn push_material(&mut self, _material: &Material) -> bool {
        self.material_scopes += 1;
        true
    }

    fn geometry(&mut self, mesh: &Mesh) -> Result<()> {
        self.meshes += 1;
        self.triangles += mesh.triangle_count();
        self.vertices += mesh.vertex_count();
        Ok(())
    }
}
