//! Scene graph nodes.

use super::material::Material;
use super::mesh::Mesh;
use crate::util::Mat4;

/// A node of the scene tree.
///
/// The node set is closed: traversal switches on the variant instead of
/// dispatching on a type hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Plain container.
    Group(Vec<Node>),
    /// Applies `matrix` in the parent's space: `world = parent_world * matrix`.
    Transform { matrix: Mat4, children: Vec<Node> },
    /// Geometry below uses `material` unless a nearer scope overrides it.
    MaterialScope { material: Material, children: Vec<Node> },
    /// Triangle mesh leaf.
    Geometry(Mesh),
}

impl Node {
    pub fn group(children: Vec<Node>) -> Self {
        Self::Group(children)
    }

    pub fn transform(matrix: Mat4, children: Vec<Node>) -> Self {
        Self::Transform { matrix, children }
    }

    pub fn material(material: Material, children: Vec<Node>) -> Self {
        Self::MaterialScope { material, children }
    }

    pub fn geometry(mesh: Mesh) -> Self {
        Self::Geometry(mesh)
    }

    /// Child nodes; empty for geometry leaves.
    pub fn children(&self) -> &[Node] {
        match self {
            Self::Group(children)
            | Self::Transform { children, .. }
            | Self::MaterialScope { children, .. } => children,
            Self::Geometry(_) => &[],
        }
    }

    /// Append a child. Returns `false` (and drops nothing) on a geometry leaf.
    pub fn add_child(&mut self, child: Node) -> bool {
        match self {
            Self::Group(children)
            | Self::Transform { children, .. }
            | Self::MaterialScope { children, .. } => {
                children.push(child);
                true
            }
            Self::Geometry(_) => false,
        }
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(Node::node_count).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children_and_count() {
        let mut root = Node::group(vec![Node::geometry(Mesh::default())]);
        assert!(root.add_child(Node::transform(
            Mat4::IDENTITY,
            vec![Node::material(Material::default(), vec![])],
        )));
        assert_eq!(root.children().len(), 2);
        assert_eq!(root.node_count(), 4);

        let mut leaf = Node::geometry(Mesh::default());
        assert!(!leaf.add_child(Node::group(vec![])));
        assert!(leaf.children().is_empty());
    }
}
