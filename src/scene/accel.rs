//! Bottom/top-level acceleration structures.
//!
//! The BLAS build sits behind [`BlasBuilder`] so a GPU backend can replace the
//! CPU SAH builder. Nodes use a flat 32-byte layout:
//! - internal node: `left_or_first` = left child index, `count` = 0
//! - leaf node: `left_or_first` = first entry in `tri_indices`, `count` > 0

use bytemuck::{Pod, Zeroable};

use crate::util::{to_row_major_3x4, BBox3f, Mat4, Result, Vec3};

/// Number of SAH bins for split evaluation.
const NUM_BINS: usize = 12;

const TRAVERSAL_COST: f32 = 1.0;
const INTERSECT_COST: f32 = 1.0;

/// Maximum triangles per leaf before forcing a split.
const MAX_LEAF_SIZE: usize = 4;

/// Disable back-face culling for the instance.
pub const INSTANCE_TRIANGLE_FACING_CULL_DISABLE: u8 = 0x01;
/// Treat every geometry in the instance as opaque.
pub const INSTANCE_FORCE_OPAQUE: u8 = 0x04;

/// GPU-friendly BVH node (32 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BvhNode {
    pub aabb_min: [f32; 3],
    pub left_or_first: u32,
    pub aabb_max: [f32; 3],
    pub count: u32,
}

impl BvhNode {
    fn new(bounds: &BBox3f, left_or_first: u32, count: u32) -> Self {
        Self {
            aabb_min: bounds.min.to_array(),
            aabb_max: bounds.max.to_array(),
            left_or_first,
            count,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.count > 0
    }
}

/// Flat BVH over the triangles of one mesh.
#[derive(Debug, Clone, Default)]
pub struct Bvh {
    /// Node array, index 0 = root.
    pub nodes: Vec<BvhNode>,
    /// Triangle numbers in leaf order.
    pub tri_indices: Vec<u32>,
}

struct Bin {
    bounds: BBox3f,
    count: usize,
}

/// Build a BVH over the triangles `indices.chunks(3)` using binned SAH.
///
/// Triangles are not reordered; leaves reference `tri_indices`.
#[tracing::instrument(skip_all, fields(tri_count = indices.len() / 3))]
pub fn build_bvh(positions: &[Vec3], indices: &[u16]) -> Bvh {
    let n = indices.len() / 3;
    if n == 0 {
        return Bvh {
            nodes: vec![BvhNode::zeroed()],
            tri_indices: vec![],
        };
    }

    let aabbs: Vec<BBox3f> = indices
        .chunks_exact(3)
        .map(|tri| {
            let mut b = BBox3f::EMPTY;
            for &i in tri {
                b.expand_by_point(positions[i as usize]);
            }
            b
        })
        .collect();
    let centroids: Vec<Vec3> = aabbs.iter().map(BBox3f::center).collect();

    let mut order: Vec<u32> = (0..n as u32).collect();
    let mut nodes: Vec<BvhNode> = Vec::with_capacity(2 * n);
    nodes.push(BvhNode::zeroed());

    struct Task {
        node_idx: usize,
        start: usize,
        end: usize,
    }

    let mut stack = vec![Task {
        node_idx: 0,
        start: 0,
        end: n,
    }];

    while let Some(Task { node_idx, start, end }) = stack.pop() {
        let count = end - start;

        let mut node_bounds = BBox3f::EMPTY;
        let mut centroid_bounds = BBox3f::EMPTY;
        for &t in &order[start..end] {
            node_bounds.expand_by_box(&aabbs[t as usize]);
            centroid_bounds.expand_by_point(centroids[t as usize]);
        }

        let leaf = BvhNode::new(&node_bounds, start as u32, count as u32);
        if count <= MAX_LEAF_SIZE {
            nodes[node_idx] = leaf;
            continue;
        }

        let split = find_best_split(&order[start..end], &aabbs, &centroids, &centroid_bounds);
        let leaf_cost = count as f32 * INTERSECT_COST * node_bounds.area();
        let Some((axis, pos, cost)) = split.filter(|&(_, _, cost)| cost < leaf_cost) else {
            nodes[node_idx] = leaf;
            continue;
        };
        tracing::trace!(node_idx, axis, cost, "split");

        let mid = start + partition(&mut order[start..end], |&t| centroids[t as usize][axis] < pos);
        // Degenerate partition: split in the middle.
        let mid = if mid == start || mid == end { (start + end) / 2 } else { mid };

        let left_idx = nodes.len();
        nodes.push(BvhNode::zeroed());
        nodes.push(BvhNode::zeroed());
        nodes[node_idx] = BvhNode::new(&node_bounds, left_idx as u32, 0);

        stack.push(Task {
            node_idx: left_idx + 1,
            start: mid,
            end,
        });
        stack.push(Task {
            node_idx: left_idx,
            start,
            end: mid,
        });
    }

    Bvh {
        nodes,
        tri_indices: order,
    }
}

/// Binned SAH split search across all three axes.
/// Returns `(axis, position, cost)`, or `None` when every axis is degenerate.
fn find_best_split(
    order: &[u32],
    aabbs: &[BBox3f],
    centroids: &[Vec3],
    centroid_bounds: &BBox3f,
) -> Option<(usize, f32, f32)> {
    let mut best: Option<(usize, f32, f32)> = None;
    let extent = centroid_bounds.size();

    for axis in 0..3 {
        if extent[axis] < 1e-8 {
            continue;
        }

        let mut bins: Vec<Bin> = (0..NUM_BINS)
            .map(|_| Bin {
                bounds: BBox3f::EMPTY,
                count: 0,
            })
            .collect();
        let inv_extent = NUM_BINS as f32 / extent[axis];

        for &t in order {
            let c = centroids[t as usize][axis];
            let bin = (((c - centroid_bounds.min[axis]) * inv_extent) as usize).min(NUM_BINS - 1);
            bins[bin].bounds.expand_by_box(&aabbs[t as usize]);
            bins[bin].count += 1;
        }

        let mut left_area = [0.0f32; NUM_BINS - 1];
        let mut left_count = [0usize; NUM_BINS - 1];
        let mut sweep = BBox3f::EMPTY;
        let mut sweep_count = 0;
        for i in 0..NUM_BINS - 1 {
            sweep.expand_by_box(&bins[i].bounds);
            sweep_count += bins[i].count;
            left_area[i] = sweep.area();
            left_count[i] = sweep_count;
        }

        sweep = BBox3f::EMPTY;
        sweep_count = 0;
        for i in (1..NUM_BINS).rev() {
            sweep.expand_by_box(&bins[i].bounds);
            sweep_count += bins[i].count;
            let cost = TRAVERSAL_COST
                + INTERSECT_COST
                    * (left_count[i - 1] as f32 * left_area[i - 1] + sweep_count as f32 * sweep.area());

            if best.map_or(true, |(_, _, c)| cost < c) {
                let pos = centroid_bounds.min[axis] + (i as f32 / NUM_BINS as f32) * extent[axis];
                best = Some((axis, pos, cost));
            }
        }
    }

    best
}

/// Partition in place. Returns the number of elements for which `pred` holds.
fn partition<T, F>(slice: &mut [T], pred: F) -> usize
where
    F: Fn(&T) -> bool,
{
    let mut left = 0;
    let mut right = slice.len();
    while left < right {
        if pred(&slice[left]) {
            left += 1;
        } else {
            right -= 1;
            slice.swap(left, right);
        }
    }
    left
}

/// Bottom-level structure for one vertex/index pair, in object space.
#[derive(Debug, Clone, Default)]
pub struct BottomLevel {
    pub bounds: BBox3f,
    pub vertex_count: u32,
    pub triangle_count: u32,
    /// Empty when the BVH is built elsewhere (see [`BoundsOnlyBuilder`]).
    pub bvh: Bvh,
}

impl BottomLevel {
    pub fn node_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.bvh.nodes)
    }
}

/// Builds a [`BottomLevel`] from a mesh's vertex/index pair.
pub trait BlasBuilder {
    fn build(&mut self, positions: &[Vec3], indices: &[u16]) -> Result<BottomLevel>;

    /// Short label for logs.
    fn name(&self) -> &'static str;
}

/// Builds a full SAH BVH on the CPU.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuBvhBuilder;

impl BlasBuilder for CpuBvhBuilder {
    fn build(&mut self, positions: &[Vec3], indices: &[u16]) -> Result<BottomLevel> {
        let bvh = build_bvh(positions, indices);
        Ok(BottomLevel {
            bounds: BBox3f::from_points(positions),
            vertex_count: positions.len() as u32,
            triangle_count: (indices.len() / 3) as u32,
            bvh,
        })
    }

    fn name(&self) -> &'static str {
        "cpu-sah"
    }
}

/// Records bounds and counts only; the GPU driver builds the hierarchy.
#[derive(Debug, Default, Clone, Copy)]
pub struct BoundsOnlyBuilder;

impl BlasBuilder for BoundsOnlyBuilder {
    fn build(&mut self, positions: &[Vec3], indices: &[u16]) -> Result<BottomLevel> {
        Ok(BottomLevel {
            bounds: BBox3f::from_points(positions),
            vertex_count: positions.len() as u32,
            triangle_count: (indices.len() / 3) as u32,
            bvh: Bvh::default(),
        })
    }

    fn name(&self) -> &'static str {
        "bounds-only"
    }
}

/// One placement of a BLAS in the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instance {
    pub transform: Mat4,
    /// Index into [`TopLevel::blases`]
    pub blas: u32,
    /// Sequential object id
    pub id: u32,
}

/// Vulkan-layout instance record (64 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuInstance {
    /// Row-major 3x4 affine transform
    pub transform: [[f32; 4]; 3],
    /// Bits 0..24: custom index, bits 24..32: visibility mask
    pub custom_index_and_mask: u32,
    /// Bits 0..24: SBT record offset, bits 24..32: instance flags
    pub sbt_offset_and_flags: u32,
    /// Device address or handle of the BLAS
    pub blas_reference: u64,
}

impl GpuInstance {
    pub fn new(transform: &Mat4, custom_index: u32, mask: u8, sbt_offset: u32, flags: u8, blas_reference: u64) -> Self {
        Self {
            transform: to_row_major_3x4(transform),
            custom_index_and_mask: (custom_index & 0x00FF_FFFF) | ((mask as u32) << 24),
            sbt_offset_and_flags: (sbt_offset & 0x00FF_FFFF) | ((flags as u32) << 24),
            blas_reference,
        }
    }

    #[inline]
    pub fn custom_index(&self) -> u32 {
        self.custom_index_and_mask & 0x00FF_FFFF
    }

    #[inline]
    pub fn mask(&self) -> u8 {
        (self.custom_index_and_mask >> 24) as u8
    }

    #[inline]
    pub fn flags(&self) -> u8 {
        (self.sbt_offset_and_flags >> 24) as u8
    }
}

/// Instance list plus the bottom-level structures it references.
#[derive(Debug, Clone, Default)]
pub struct TopLevel {
    pub blases: Vec<BottomLevel>,
    pub instances: Vec<Instance>,
}

impl TopLevel {
    /// Store a BLAS and return its index.
    pub fn add_blas(&mut self, blas: BottomLevel) -> u32 {
        self.blases.push(blas);
        (self.blases.len() - 1) as u32
    }

    /// Place an existing BLAS. The id is the instance's position in the list.
    pub fn add_instance(&mut self, transform: Mat4, blas: u32) -> u32 {
        let id = self.instances.len() as u32;
        self.instances.push(Instance { transform, blas, id });
        id
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// GPU records; the BLAS reference is the BLAS index until the GPU layer
    /// patches in device addresses.
    pub fn gpu_instances(&self) -> Vec<GpuInstance> {
        self.instances
            .iter()
            .map(|inst| {
                GpuInstance::new(
                    &inst.transform,
                    inst.id,
                    0xFF,
                    0,
                    INSTANCE_TRIANGLE_FACING_CULL_DISABLE,
                    inst.blas as u64,
                )
            })
            .collect()
    }

    /// World-space bounds of every instance.
    pub fn bounds(&self) -> BBox3f {
        let mut out = BBox3f::EMPTY;
        for inst in &self.instances {
            if let Some(blas) = self.blases.get(inst.blas as usize) {
                out.expand_by_box(&blas.bounds.transformed(&inst.transform));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One triangle per entry of `centers`, in the z=0 plane.
    fn tris(centers: &[Vec3]) -> (Vec<Vec3>, Vec<u16>) {
        let mut positions = Vec::new();
        for &c in centers {
            positions.push(c + Vec3::new(-0.5, -0.5, 0.0));
            positions.push(c + Vec3::new(0.5, -0.5, 0.0));
            positions.push(c + Vec3::new(0.0, 0.5, 0.0));
        }
        let indices = (0..positions.len() as u16).collect();
        (positions, indices)
    }

    #[test]
    fn test_layout() {
        assert_eq!(std::mem::size_of::<BvhNode>(), 32);
        assert_eq!(std::mem::size_of::<GpuInstance>(), 64);
        assert_eq!(std::mem::offset_of!(GpuInstance, blas_reference), 56);
    }

    #[test]
    fn test_empty_bvh() {
        let bvh = build_bvh(&[], &[]);
        assert_eq!(bvh.nodes.len(), 1);
        assert!(bvh.tri_indices.is_empty());
    }

    #[test]
    fn test_single_triangle() {
        let (p, i) = tris(&[Vec3::ZERO]);
        let bvh = build_bvh(&p, &i);
        assert_eq!(bvh.nodes.len(), 1);
        assert_eq!(bvh.nodes[0].count, 1);
        assert_eq!(bvh.tri_indices, vec![0]);
    }

    #[test]
    fn test_small_mesh_is_one_leaf() {
        let (p, i) = tris(&[Vec3::ZERO, Vec3::X, Vec3::X * 2.0]);
        let bvh = build_bvh(&p, &i);
        assert!(bvh.nodes[0].is_leaf());
        assert_eq!(bvh.nodes[0].count, 3);
    }

    #[test]
    fn test_many_triangles_builds_tree() {
        let centers: Vec<Vec3> = (0..100).map(|i| Vec3::new(i as f32 * 2.0, 0.0, 0.0)).collect();
        let (p, i) = tris(&centers);
        let bvh = build_bvh(&p, &i);

        assert!(bvh.nodes.len() > 1);
        assert!(!bvh.nodes[0].is_leaf());

        let mut sorted = bvh.tri_indices.clone();
        sorted.sort();
        assert_eq!(sorted, (0..100).collect::<Vec<u32>>());

        let root = &bvh.nodes[0];
        assert!(root.aabb_min[0] < 0.0);
        assert!(root.aabb_max[0] > 198.0);

        // Leaves cover every triangle exactly once.
        let leaf_total: u32 = bvh.nodes.iter().filter(|n| n.is_leaf()).map(|n| n.count).sum();
        assert_eq!(leaf_total, 100);
    }

    #[test]
    fn test_builders_agree_on_bounds() {
        let (p, i) = tris(&[Vec3::ZERO, Vec3::new(3.0, 1.0, 0.0)]);
        let cpu = CpuBvhBuilder.build(&p, &i).unwrap();
        let deferred = BoundsOnlyBuilder.build(&p, &i).unwrap();
        assert_eq!(cpu.bounds, deferred.bounds);
        assert_eq!(cpu.triangle_count, 2);
        assert_eq!(deferred.vertex_count, 6);
        assert!(deferred.bvh.nodes.is_empty());
        assert!(!cpu.bvh.nodes.is_empty());
    }

    #[test]
    fn test_gpu_instance_packing() {
        let t = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let inst = GpuInstance::new(&t, 0x0123_4567, 0xAB, 5, INSTANCE_FORCE_OPAQUE, 9);
        assert_eq!(inst.custom_index(), 0x0023_4567);
        assert_eq!(inst.mask(), 0xAB);
        assert_eq!(inst.flags(), INSTANCE_FORCE_OPAQUE);
        assert_eq!(inst.transform[0], [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(inst.transform[1], [0.0, 1.0, 0.0, 2.0]);
        assert_eq!(inst.transform[2], [0.0, 0.0, 1.0, 3.0]);
    }

    #[test]
    fn test_top_level_bounds() {
        let (p, i) = tris(&[Vec3::ZERO]);
        let mut tlas = TopLevel::default();
        let blas = tlas.add_blas(CpuBvhBuilder.build(&p, &i).unwrap());
        assert_eq!(tlas.add_instance(Mat4::IDENTITY, blas), 0);
        assert_eq!(tlas.add_instance(Mat4::from_translation(Vec3::X * 10.0), blas), 1);

        let b = tlas.bounds();
        assert_eq!(b.min.x, -0.5);
        assert_eq!(b.max.x, 10.5);
        let gpu = tlas.gpu_instances();
        assert_eq!(gpu.len(), 2);
        assert_eq!(gpu[1].custom_index(), 1);
        assert_eq!(gpu[1].blas_reference, 0);
    }
}
