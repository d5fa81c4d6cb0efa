//! Triangle meshes handed to the flattener.

use std::borrow::Cow;

use crate::util::{Error, Mat3, Mat4, Result, Vec2, Vec3, Vec4};

/// Largest vertex count addressable by 16-bit indices.
pub const MAX_VERTICES: usize = u16::MAX as usize + 1;

/// Indexed (or implicitly indexed) triangle list with per-vertex attributes.
///
/// `positions`, `normals` and `tex_coords` must have the same length. When
/// `indices` is `None`, vertices are consumed three at a time. Missing
/// tangents are filled with zero vectors when the mesh is flattened.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mesh {
    pub indices: Option<Vec<u16>>,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub tex_coords: Vec<Vec2>,
    pub tangents: Option<Vec<Vec4>>,
}

impl Mesh {
    /// Indexed triangle list.
    pub fn new(indices: Vec<u16>, positions: Vec<Vec3>, normals: Vec<Vec3>, tex_coords: Vec<Vec2>) -> Self {
        Self {
            indices: Some(indices),
            positions,
            normals,
            tex_coords,
            tangents: None,
        }
    }

    /// Triangle list without a separate index buffer.
    pub fn non_indexed(positions: Vec<Vec3>, normals: Vec<Vec3>, tex_coords: Vec<Vec2>) -> Self {
        Self {
            indices: None,
            positions,
            normals,
            tex_coords,
            tangents: None,
        }
    }

    pub fn with_tangents(mut self, tangents: Vec<Vec4>) -> Self {
        self.tangents = Some(tangents);
        self
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn index_count(&self) -> usize {
        self.indices.as_ref().map_or(self.positions.len(), Vec::len)
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.index_count() / 3
    }

    /// Explicit indices, or `0..vertex_count` for non-indexed meshes.
    pub fn resolved_indices(&self) -> Cow<'_, [u16]> {
        match &self.indices {
            Some(indices) => Cow::Borrowed(indices),
            None => Cow::Owned((0..self.positions.len()).map(|i| i as u16).collect()),
        }
    }

    /// Tangents, or one zero vector per vertex.
    pub fn resolved_tangents(&self) -> Cow<'_, [Vec4]> {
        match &self.tangents {
            Some(t) => Cow::Borrowed(t),
            None => Cow::Owned(vec![Vec4::ZERO; self.positions.len()]),
        }
    }

    /// Check that the mesh describes a well-formed triangle list.
    ///
    /// `object` is only used to label the error.
    pub fn validate(&self, object: u32) -> Result<()> {
        let n = self.positions.len();
        if n == 0 {
            return Err(Error::invalid_mesh(object, "mesh has no vertices"));
        }
        if n > MAX_VERTICES {
            return Err(Error::invalid_mesh(
                object,
                format!("{n} vertices exceed the 16-bit index range"),
            ));
        }
        if self.normals.len() != n {
            return Err(Error::invalid_mesh(
                object,
                format!("{} normals for {n} vertices", self.normals.len()),
            ));
        }
        if self.tex_coords.len() != n {
            return Err(Error::invalid_mesh(
                object,
                format!("{} texcoords for {n} vertices", self.tex_coords.len()),
            ));
        }
        if let Some(tangents) = &self.tangents {
            if tangents.len() != n {
                return Err(Error::invalid_mesh(
                    object,
                    format!("{} tangents for {n} vertices", tangents.len()),
                ));
            }
        }

        let count = self.index_count();
        if count == 0 || count % 3 != 0 {
            return Err(Error::invalid_mesh(
                object,
                format!("index count {count} is not a positive multiple of 3"),
            ));
        }
        if let Some(indices) = &self.indices {
            if let Some(&bad) = indices.iter().find(|&&i| i as usize >= n) {
                return Err(Error::invalid_mesh(
                    object,
                    format!("index {bad} out of range for {n} vertices"),
                ));
            }
        }
        Ok(())
    }

    /// Copy with positions, normals and tangents moved into the space of `m`.
    pub fn transformed(&self, m: &Mat4) -> Self {
        let linear = Mat3::from_mat4(*m);
        let normal_mat = linear.inverse().transpose();

        Self {
            indices: self.indices.clone(),
            positions: self.positions.iter().map(|&p| m.transform_point3(p)).collect(),
            normals: self
                .normals
                .iter()
                .map(|&n| (normal_mat * n).normalize_or_zero())
                .collect(),
            tex_coords: self.tex_coords.clone(),
            tangents: self.tangents.as_ref().map(|tangents| {
                tangents
                    .iter()
                    .map(|t| (linear * t.truncate()).normalize_or_zero().extend(t.w))
                    .collect()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Mesh {
        Mesh::new(
            vec![0, 1, 2],
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![Vec3::Z; 3],
            vec![Vec2::ZERO, Vec2::X, Vec2::Y],
        )
    }

    #[test]
    fn test_counts() {
        let m = triangle();
        assert_eq!(m.vertex_count(), 3);
        assert_eq!(m.index_count(), 3);
        assert_eq!(m.triangle_count(), 1);
        assert!(m.validate(0).is_ok());
    }

    #[test]
    fn test_non_indexed_resolves_sequential() {
        let m = Mesh::non_indexed(vec![Vec3::ZERO; 6], vec![Vec3::Z; 6], vec![Vec2::ZERO; 6]);
        assert_eq!(m.resolved_indices().as_ref(), &[0, 1, 2, 3, 4, 5]);
        assert_eq!(m.triangle_count(), 2);
        assert!(m.validate(0).is_ok());
    }

    #[test]
    fn test_missing_tangents_are_zero() {
        let m = triangle();
        assert_eq!(m.resolved_tangents().as_ref(), &[Vec4::ZERO; 3]);
        let t = vec![Vec4::new(1.0, 0.0, 0.0, 1.0); 3];
        let m = triangle().with_tangents(t.clone());
        assert_eq!(m.resolved_tangents().as_ref(), t.as_slice());
    }

    #[test]
    fn test_validate_rejects() {
        let mut m = triangle();
        m.normals.pop();
        assert!(matches!(m.validate(4), Err(Error::InvalidMesh { object: 4, .. })));

        let mut m = triangle();
        m.indices = Some(vec![0, 1]);
        assert!(m.validate(0).is_err());

        let mut m = triangle();
        m.indices = Some(vec![0, 1, 3]);
        assert!(m.validate(0).unwrap_err().to_string().contains("out of range"));

        let mut m = triangle();
        m.tangents = Some(vec![Vec4::ZERO; 2]);
        assert!(m.validate(0).is_err());

        assert!(Mesh::default().validate(0).is_err());
    }

    #[test]
    fn test_transformed() {
        let m = triangle().with_tangents(vec![Vec4::new(1.0, 0.0, 0.0, -1.0); 3]);
        let t = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0))
            * Mat4::from_rotation_z(std::f32::consts::FRAC_PI_2);
        let w = m.transformed(&t);
        assert!((w.positions[1] - Vec3::new(1.0, 1.0, 0.0)).length() < 1e-6);
        assert!((w.normals[0] - Vec3::Z).length() < 1e-6);
        let tangent = w.tangents.unwrap()[0];
        assert!((tangent.truncate() - Vec3::Y).length() < 1e-6);
        assert_eq!(tangent.w, -1.0);
    }
}
