//! Procedural meshes and the built-in demo scene.

use std::f32::consts::PI;

use super::material::Material;
use super::mesh::Mesh;
use super::node::Node;
use crate::util::{Vec2, Vec3};

const SPHERE_THETA_SEGMENTS: usize = 32;
const SPHERE_PHI_SEGMENTS: usize = 64;

/// UV sphere with `(32 + 1) * 64` vertices and `6 * 32 * 64` indices.
///
/// Rows run from the +Z pole (v = 0) to the -Z pole (v = 1); the seam at
/// phi = 0 is shared rather than duplicated.
pub fn sphere(center: Vec3, radius: f32) -> Mesh {
    let (n_theta, n_phi) = (SPHERE_THETA_SEGMENTS, SPHERE_PHI_SEGMENTS);
    let n_vertices = (n_theta + 1) * n_phi;

    let mut positions = Vec::with_capacity(n_vertices);
    let mut normals = Vec::with_capacity(n_vertices);
    let mut tex_coords = Vec::with_capacity(n_vertices);
    let mut indices = Vec::with_capacity(6 * n_theta * n_phi);

    for i in 0..=n_theta {
        let v = i as f32 / n_theta as f32;
        let theta = PI * v;

        for j in 0..n_phi {
            let u = j as f32 / n_phi as f32;
            let phi = 2.0 * PI * u;

            let normal = Vec3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos());
            positions.push(normal * radius + center);
            normals.push(normal);
            tex_coords.push(Vec2::new(u, v));

            if i < n_theta {
                let next_j = (j + 1) % n_phi;
                let a = (n_phi * i + j) as u16;
                let b = (n_phi * (i + 1) + j) as u16;
                let c = (n_phi * (i + 1) + next_j) as u16;
                let d = (n_phi * i + next_j) as u16;
                indices.extend_from_slice(&[a, b, c, a, c, d]);
            }
        }
    }

    Mesh::new(indices, positions, normals, tex_coords)
}

/// Two-triangle rectangle facing `normal`, `height` along `up`.
///
/// Tangents point along the width axis.
pub fn quad(center: Vec3, normal: Vec3, up: Vec3, width: f32, height: f32) -> Mesh {
    let normal = normal.normalize_or_zero();
    let right = up.cross(normal).try_normalize().unwrap_or_else(|| normal.any_orthonormal_vector());
    let up = normal.cross(right);

    let (hw, hh) = (right * (width * 0.5), up * (height * 0.5));
    let positions = vec![center - hw - hh, center + hw - hh, center + hw + hh, center - hw + hh];
    let tex_coords = vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(0.0, 1.0)];

    Mesh::new(vec![0, 1, 2, 0, 2, 3], positions, vec![normal; 4], tex_coords)
        .with_tangents(vec![right.extend(1.0); 4])
}

/// Ground, center, left and right spheres, each under its own material scope.
pub fn default_scene() -> Node {
    let ground = Material::dielectric(Vec3::new(0.8, 0.8, 0.0), 1.0);
    let center = Material::dielectric(Vec3::new(0.1, 0.2, 0.5), 0.1);
    let left = Material::metal(Vec3::new(1.0, 1.0, 1.0), 0.5);
    let right = Material::metal(Vec3::new(0.8, 0.6, 0.2), 0.0);

    Node::group(vec![
        Node::material(ground, vec![Node::geometry(sphere(Vec3::new(0.0, -100.5, -1.0), 100.0))]),
        Node::material(center, vec![Node::geometry(sphere(Vec3::new(0.0, 0.0, -1.0), 0.5))]),
        Node::material(left, vec![Node::geometry(sphere(Vec3::new(-1.0, 0.0, -1.0), 0.5))]),
        Node::material(right, vec![Node::geometry(sphere(Vec3::new(1.0, 0.0, -1.0), 0.5))]),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::Vec4;

    #[test]
    fn test_sphere_counts() {
        let m = sphere(Vec3::ZERO, 1.0);
        assert_eq!(m.vertex_count(), 2112);
        assert_eq!(m.index_count(), 12288);
        assert!(m.validate(0).is_ok());
    }

    #[test]
    fn test_sphere_on_surface() {
        let center = Vec3::new(1.0, 2.0, 3.0);
        let m = sphere(center, 2.0);
        for (p, n) in m.positions.iter().zip(&m.normals) {
            assert!(((*p - center).length() - 2.0).abs() < 1e-4);
            assert!((n.length() - 1.0).abs() < 1e-4);
        }
        assert!((m.positions[0] - Vec3::new(1.0, 2.0, 5.0)).length() < 1e-5);
    }

    #[test]
    fn test_quad_frame() {
        let m = quad(Vec3::ZERO, Vec3::Z, Vec3::Y, 2.0, 4.0);
        assert!(m.validate(0).is_ok());
        assert_eq!(m.positions[0], Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(m.positions[2], Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(m.tangents.as_ref().unwrap()[0], Vec4::new(1.0, 0.0, 0.0, 1.0));

        // Counter-clockwise seen from the normal.
        let e1 = m.positions[1] - m.positions[0];
        let e2 = m.positions[2] - m.positions[0];
        assert!(e1.cross(e2).dot(Vec3::Z) > 0.0);
    }

    #[test]
    fn test_quad_degenerate_up() {
        let m = quad(Vec3::ZERO, Vec3::Y, Vec3::Y, 1.0, 1.0);
        assert!(m.positions.iter().all(|p| p.is_finite()));
        assert!(m.positions.iter().all(|p| p.y.abs() < 1e-6));
    }

    #[test]
    fn test_default_scene() {
        let scene = default_scene();
        assert_eq!(scene.children().len(), 4);
        assert!(scene
            .children()
            .iter()
            .all(|c| matches!(c, Node::MaterialScope { children, .. } if children.len() == 1)));
    }
}
