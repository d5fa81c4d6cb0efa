//! Flattened scene storage.
//!
//! [`SceneDataStore`] keeps one entry per object in every per-object list
//! (records, instances, indices, vertices, normals, texcoords, tangents) and
//! concatenates them on export. Offsets in each [`ObjectRecord`] are running
//! totals of the index/vertex counts of all earlier objects.

use std::fmt;

use bytemuck::{Pod, Zeroable};

use super::accel::{BlasBuilder, CpuBvhBuilder, GpuInstance, TopLevel};
use super::material::{Material, NO_TEXTURE};
use super::mesh::Mesh;
use super::texture::{SamplerDesc, Texture, TextureImage};
use crate::envmap::{EnvMap, EnvMapSamplingData};
use crate::util::{Error, Mat4, Result, Vec2, Vec3, Vec4};

/// Per-object record read by the closest-hit shader (80 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ObjectRecord {
    /// First index of this object in the concatenated index buffer
    pub index_offset: u32,
    /// First vertex of this object in the concatenated vertex buffers
    pub vertex_offset: u32,
    pub _pad: [u32; 2],
    pub material: Material,
}

impl ObjectRecord {
    pub fn new(index_offset: u32, vertex_offset: u32, material: Material) -> Self {
        Self {
            index_offset,
            vertex_offset,
            _pad: [0; 2],
            material,
        }
    }
}

/// Concatenated GPU buffers, one binding slot each.
#[derive(Debug, Clone, Default)]
pub struct SceneBuffers {
    pub objects: Vec<ObjectRecord>,
    pub indices: Vec<u16>,
    pub vertices: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub tex_coords: Vec<Vec2>,
    pub tangents: Vec<Vec4>,
    pub instances: Vec<GpuInstance>,
}

impl SceneBuffers {
    pub fn object_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.objects)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn normal_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.normals)
    }

    pub fn tex_coord_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.tex_coords)
    }

    pub fn tangent_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.tangents)
    }

    pub fn instance_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.instances)
    }

    /// Total size of all buffers in bytes.
    pub fn total_bytes(&self) -> usize {
        self.object_bytes().len()
            + self.index_bytes().len()
            + self.vertex_bytes().len()
            + self.normal_bytes().len()
            + self.tex_coord_bytes().len()
            + self.tangent_bytes().len()
            + self.instance_bytes().len()
    }
}

/// Everything the GPU resource layer needs from a flattened scene.
pub struct SceneDataStore {
    blas_builder: Box<dyn BlasBuilder>,
    tlas: TopLevel,
    objects: Vec<ObjectRecord>,
    indices: Vec<Vec<u16>>,
    vertices: Vec<Vec<Vec3>>,
    normals: Vec<Vec<Vec3>>,
    tex_coords: Vec<Vec<Vec2>>,
    tangents: Vec<Vec<Vec4>>,
    num_indices: u32,
    num_vertices: u32,
    textures: Vec<Texture>,
    env_sampling: Option<EnvMapSamplingData>,
    env_texture: Option<u32>,
}

impl Default for SceneDataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SceneDataStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneDataStore")
            .field("blas_builder", &self.blas_builder.name())
            .field("objects", &self.objects.len())
            .field("num_indices", &self.num_indices)
            .field("num_vertices", &self.num_vertices)
            .field("textures", &self.textures.len())
            .field("env_texture", &self.env_texture)
            .finish()
    }
}

impl SceneDataStore {
    /// Empty store building CPU BVHs.
    pub fn new() -> Self {
        Self::with_builder(Box::new(CpuBvhBuilder))
    }

    pub fn with_builder(blas_builder: Box<dyn BlasBuilder>) -> Self {
        Self {
            blas_builder,
            tlas: TopLevel::default(),
            objects: Vec::new(),
            indices: Vec::new(),
            vertices: Vec::new(),
            normals: Vec::new(),
            tex_coords: Vec::new(),
            tangents: Vec::new(),
            num_indices: 0,
            num_vertices: 0,
            textures: Vec::new(),
            env_sampling: None,
            env_texture: None,
        }
    }

    /// Append one object and return its sequential id.
    ///
    /// Builds the BLAS, places an instance with `transform`, and records the
    /// current index/vertex totals as the object's offsets. Nothing is stored
    /// if validation or the BLAS build fails.
    pub fn add_mesh(&mut self, transform: Mat4, mesh: Mesh, material: Material) -> Result<u32> {
        let id = self.objects.len() as u32;
        mesh.validate(id)?;
        self.check_material(&material)?;

        let index_count = mesh.index_count() as u32;
        let vertex_count = mesh.vertex_count() as u32;
        let (Some(next_indices), Some(next_vertices)) = (
            self.num_indices.checked_add(index_count),
            self.num_vertices.checked_add(vertex_count),
        ) else {
            return Err(Error::invalid_mesh(id, "scene exceeds 32-bit buffer offsets"));
        };

        let indices = mesh.resolved_indices().into_owned();
        let tangents = mesh.resolved_tangents().into_owned();
        let blas = self.blas_builder.build(&mesh.positions, &indices)?;

        let blas = self.tlas.add_blas(blas);
        self.tlas.add_instance(transform, blas);
        self.objects
            .push(ObjectRecord::new(self.num_indices, self.num_vertices, material));

        let Mesh {
            positions,
            normals,
            tex_coords,
            ..
        } = mesh;
        self.indices.push(indices);
        self.vertices.push(positions);
        self.normals.push(normals);
        self.tex_coords.push(tex_coords);
        self.tangents.push(tangents);

        self.num_indices = next_indices;
        self.num_vertices = next_vertices;

        tracing::debug!(id, index_count, vertex_count, "object added");
        self.check_invariants()?;
        debug_assert!(self.verify_offsets().is_ok(), "{:?}", self.verify_offsets());
        Ok(id)
    }

    fn check_material(&self, material: &Material) -> Result<()> {
        let count = self.textures.len();
        for slot in material.texture_slots() {
            if slot != NO_TEXTURE && (slot < 0 || slot as usize >= count) {
                return Err(Error::TextureOutOfBounds { index: slot, count });
            }
        }
        Ok(())
    }

    /// Every per-object list has one entry per object, and the running totals
    /// match the last record.
    pub fn check_invariants(&self) -> Result<()> {
        let n = self.objects.len();
        let lengths = [
            ("instances", self.tlas.instances.len()),
            ("indices", self.indices.len()),
            ("vertices", self.vertices.len()),
            ("normals", self.normals.len()),
            ("tex_coords", self.tex_coords.len()),
            ("tangents", self.tangents.len()),
        ];
        for (name, len) in lengths {
            if len != n {
                return Err(Error::invariant(format!("{len} {name} lists for {n} objects")));
            }
        }

        if let Some((last, k)) = self.objects.last().zip(n.checked_sub(1)) {
            let end_index = last.index_offset as usize + self.indices[k].len();
            let end_vertex = last.vertex_offset as usize + self.vertices[k].len();
            if end_index != self.num_indices as usize || end_vertex != self.num_vertices as usize {
                return Err(Error::invariant(format!(
                    "running totals ({}, {}) disagree with last object end ({end_index}, {end_vertex})",
                    self.num_indices, self.num_vertices
                )));
            }
        }
        Ok(())
    }

    /// Full prefix-sum check of every record's offsets.
    pub fn verify_offsets(&self) -> Result<()> {
        self.check_invariants()?;
        let (mut index_total, mut vertex_total) = (0usize, 0usize);
        for (k, record) in self.objects.iter().enumerate() {
            if record.index_offset as usize != index_total || record.vertex_offset as usize != vertex_total {
                return Err(Error::invariant(format!(
                    "object {k} offsets ({}, {}) expected ({index_total}, {vertex_total})",
                    record.index_offset, record.vertex_offset
                )));
            }
            if self.tlas.instances[k].id as usize != k {
                return Err(Error::invariant(format!("instance {k} has id {}", self.tlas.instances[k].id)));
            }
            let vertex_count = self.vertices[k].len();
            for (name, len) in [
                ("normals", self.normals[k].len()),
                ("tex_coords", self.tex_coords[k].len()),
                ("tangents", self.tangents[k].len()),
            ] {
                if len != vertex_count {
                    return Err(Error::invariant(format!(
                        "object {k} has {len} {name} for {vertex_count} vertices"
                    )));
                }
            }
            index_total += self.indices[k].len();
            vertex_total += vertex_count;
        }
        Ok(())
    }

    /// Append a texture and return its index for use in material slots.
    pub fn add_texture(&mut self, texture: Texture) -> u32 {
        self.textures.push(texture);
        (self.textures.len() - 1) as u32
    }

    /// Build the sampling tables for `env` and install it as the environment.
    ///
    /// The environment also occupies one texture slot, reused when the map is
    /// replaced. Returns that slot. On failure the previous environment stays.
    /// The texels move into the texture table; [`env_map`](Self::env_map) reads
    /// them back from there.
    #[tracing::instrument(skip_all, fields(width = env.width(), height = env.height()))]
    pub fn set_env_map(&mut self, env: EnvMap) -> Result<u32> {
        let sampling = EnvMapSamplingData::build(&env)?;
        let texture = Texture::new(
            TextureImage {
                width: env.width(),
                height: env.height(),
                texels: env.into_texels(),
            },
            SamplerDesc::equirect(),
        );

        let slot = match self.env_texture {
            Some(slot) => {
                self.textures[slot as usize] = texture;
                slot
            }
            None => self.add_texture(texture),
        };
        self.env_texture = Some(slot);
        self.env_sampling = Some(sampling);
        tracing::info!(slot, "environment map installed");
        Ok(slot)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn index_count(&self) -> u32 {
        self.num_indices
    }

    pub fn vertex_count(&self) -> u32 {
        self.num_vertices
    }

    pub fn objects(&self) -> &[ObjectRecord] {
        &self.objects
    }

    pub fn tlas(&self) -> &TopLevel {
        &self.tlas
    }

    pub fn textures(&self) -> &[Texture] {
        &self.textures
    }

    /// The environment texture, stored in its texture-table slot.
    pub fn env_map(&self) -> Option<&Texture> {
        self.env_texture.and_then(|slot| self.textures.get(slot as usize))
    }

    pub fn env_sampling(&self) -> Option<&EnvMapSamplingData> {
        self.env_sampling.as_ref()
    }

    /// Environment texture slot, or -1 when no environment is set.
    pub fn env_texture_index(&self) -> i32 {
        self.env_texture.map_or(NO_TEXTURE, |slot| slot as i32)
    }

    pub fn indices(&self) -> Vec<u16> {
        concat(&self.indices)
    }

    /// Positions of all objects, in the space chosen by the flattener.
    ///
    /// With the default object-space flattening the transform lives in the TLAS
    /// instance, so a translated mesh exports untranslated positions here. Use
    /// [`world_vertices`](Self::world_vertices) for world positions, or flatten
    /// with `VertexSpace::World` to bake them into this buffer.
    pub fn vertices(&self) -> Vec<Vec3> {
        concat(&self.vertices)
    }

    pub fn normals(&self) -> Vec<Vec3> {
        concat(&self.normals)
    }

    pub fn tex_coords(&self) -> Vec<Vec2> {
        concat(&self.tex_coords)
    }

    pub fn tangents(&self) -> Vec<Vec4> {
        concat(&self.tangents)
    }

    pub fn object_info(&self) -> Vec<ObjectRecord> {
        self.objects.clone()
    }

    /// Positions with each object's instance transform applied.
    pub fn world_vertices(&self) -> Vec<Vec3> {
        let mut out = Vec::with_capacity(self.num_vertices as usize);
        for (positions, instance) in self.vertices.iter().zip(&self.tlas.instances) {
            out.extend(positions.iter().map(|&p| instance.transform.transform_point3(p)));
        }
        out
    }

    /// All buffers concatenated in insertion order.
    pub fn export(&self) -> SceneBuffers {
        SceneBuffers {
            objects: self.object_info(),
            indices: self.indices(),
            vertices: self.vertices(),
            normals: self.normals(),
            tex_coords: self.tex_coords(),
            tangents: self.tangents(),
            instances: self.tlas.gpu_instances(),
        }
    }
}

/// Copy every list end to end.
fn concat<T: Copy>(lists: &[Vec<T>]) -> Vec<T> {
    let mut out = Vec::with_capacity(lists.iter().map(Vec::len).sum());
    for list in lists {
        out.extend_from_slice(list);
    }
    out
}
