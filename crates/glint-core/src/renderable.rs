//! Rasterized scene objects: meshes, materials, and pass tags.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::math::{Aabb, Frustum};

/// Pass tag naming which pipeline may draw an object.
///
/// The opaque pass only draws objects whose material carries the tag the
/// pass was configured with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RenderTag(pub &'static str);

impl RenderTag {
    /// Tag drawn by the built-in opaque lit pass.
    pub const OPAQUE_LIT: Self = Self("OpaqueLit");
}

/// Surface properties for rasterized objects.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    /// Pass tag this material is drawn in
    pub tag: RenderTag,
    /// Base albedo color (RGB, 0-1)
    pub base_color: Vec3,
}

impl Material {
    /// Opaque lit material with the given base color.
    pub const fn opaque(base_color: Vec3) -> Self {
        Self {
            tag: RenderTag::OPAQUE_LIT,
            base_color,
        }
    }
}

/// Vertex format for built-in meshes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Object-space normal
    pub normal: [f32; 3],
}

impl Vertex {
    /// Size in bytes (vertex buffer stride)
    pub const SIZE: usize = 24;

    const fn new(position: [f32; 3], normal: [f32; 3]) -> Self {
        Self { position, normal }
    }
}

/// Built-in mesh shapes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MeshKind {
    /// Unit quad in the XZ plane, normal +Y
    Quad,
    /// Unit cube centered at the origin
    Cube,
}

impl MeshKind {
    /// Object-space bounds of the mesh.
    pub fn local_aabb(self) -> Aabb {
        match self {
            Self::Quad => Aabb::new(Vec3::new(-0.5, 0.0, -0.5), Vec3::new(0.5, 0.0, 0.5)),
            Self::Cube => Aabb::from_half_extents(Vec3::splat(0.5)),
        }
    }

    /// Triangle-list vertices for the mesh.
    pub fn vertices(self) -> Vec<Vertex> {
        match self {
            Self::Quad => quad_vertices(),
            Self::Cube => cube_vertices(),
        }
    }
}

fn quad_vertices() -> Vec<Vertex> {
    let up = [0.0, 1.0, 0.0];
    vec![
        Vertex::new([-0.5, 0.0, -0.5], up),
        Vertex::new([-0.5, 0.0, 0.5], up),
        Vertex::new([0.5, 0.0, 0.5], up),
        Vertex::new([-0.5, 0.0, -0.5], up),
        Vertex::new([0.5, 0.0, 0.5], up),
        Vertex::new([0.5, 0.0, -0.5], up),
    ]
}

fn cube_vertices() -> Vec<Vertex> {
    // One entry per face: outward normal plus four corners in fan order.
    const FACES: [([f32; 3], [[f32; 3]; 4]); 6] = [
        (
            [0.0, 0.0, -1.0],
            [
                [-0.5, -0.5, -0.5],
                [-0.5, 0.5, -0.5],
                [0.5, 0.5, -0.5],
                [0.5, -0.5, -0.5],
            ],
        ),
        (
            [0.0, 0.0, 1.0],
            [
                [0.5, -0.5, 0.5],
                [0.5, 0.5, 0.5],
                [-0.5, 0.5, 0.5],
                [-0.5, -0.5, 0.5],
            ],
        ),
        (
            [-1.0, 0.0, 0.0],
            [
                [-0.5, -0.5, 0.5],
                [-0.5, 0.5, 0.5],
                [-0.5, 0.5, -0.5],
                [-0.5, -0.5, -0.5],
            ],
        ),
        (
            [1.0, 0.0, 0.0],
            [
                [0.5, -0.5, -0.5],
                [0.5, 0.5, -0.5],
                [0.5, 0.5, 0.5],
                [0.5, -0.5, 0.5],
            ],
        ),
        (
            [0.0, -1.0, 0.0],
            [
                [-0.5, -0.5, 0.5],
                [-0.5, -0.5, -0.5],
                [0.5, -0.5, -0.5],
                [0.5, -0.5, 0.5],
            ],
        ),
        (
            [0.0, 1.0, 0.0],
            [
                [-0.5, 0.5, -0.5],
                [-0.5, 0.5, 0.5],
                [0.5, 0.5, 0.5],
                [0.5, 0.5, -0.5],
            ],
        ),
    ];

    let mut vertices = Vec::with_capacity(36);
    for (normal, corners) in FACES {
        for index in [0, 1, 2, 0, 2, 3] {
            vertices.push(Vertex::new(corners[index], normal));
        }
    }
    vertices
}

/// A rasterized object: mesh shape, material, and world transform.
#[derive(Clone, Copy, Debug)]
pub struct RenderObject {
    /// Mesh shape to draw
    pub mesh: MeshKind,
    /// Surface material
    pub material: Material,
    /// Object-to-world transform
    pub transform: Mat4,
}

impl RenderObject {
    /// Create a new render object
    pub const fn new(mesh: MeshKind, material: Material, transform: Mat4) -> Self {
        Self {
            mesh,
            material,
            transform,
        }
    }

    /// World-space bounds of the transformed mesh.
    pub fn world_aabb(&self) -> Aabb {
        self.mesh.local_aabb().transform(self.transform)
    }
}

/// Indices of objects visible to `frustum` and tagged for the pass, sorted
/// front to back by squared distance from `camera_position`.
pub fn cull_and_sort(
    objects: &[RenderObject],
    frustum: &Frustum,
    tag: RenderTag,
    camera_position: Vec3,
) -> Vec<usize> {
    let mut visible: Vec<(usize, f32)> = objects
        .iter()
        .enumerate()
        .filter(|(_, object)| object.material.tag == tag)
        .filter(|(_, object)| frustum.test_aabb(&object.world_aabb()))
        .map(|(index, object)| {
            let distance = object
                .world_aabb()
                .center()
                .distance_squared(camera_position);
            (index, distance)
        })
        .collect();

    // Front to back for early depth rejection.
    visible.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    visible.into_iter().map(|(index, _)| index).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    fn test_frustum() -> Frustum {
        // Camera at origin looking along +Z, 90 degree vertical FOV.
        let view = Mat4::look_to_lh(Vec3::ZERO, Vec3::Z, Vec3::Y);
        let projection = Mat4::perspective_lh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0);
        Frustum::from_view_projection(projection * view)
    }

    #[test]
    fn vertex_layout() {
        assert_eq!(size_of::<Vertex>(), Vertex::SIZE);
        assert_eq!(offset_of!(Vertex, position), 0);
        assert_eq!(offset_of!(Vertex, normal), 12);
    }

    #[test]
    fn mesh_vertices_stay_in_local_bounds() {
        for mesh in [MeshKind::Quad, MeshKind::Cube] {
            let aabb = mesh.local_aabb();
            let vertices = mesh.vertices();
            assert_eq!(vertices.len() % 3, 0);
            for vertex in &vertices {
                assert!(aabb.contains_point(Vec3::from(vertex.position)));
            }
        }
        assert_eq!(MeshKind::Quad.vertices().len(), 6);
        assert_eq!(MeshKind::Cube.vertices().len(), 36);
    }

    #[test]
    fn cull_drops_objects_behind_camera() {
        let material = Material::opaque(Vec3::ONE);
        let objects = [
            RenderObject::new(
                MeshKind::Cube,
                material,
                Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0)),
            ),
            RenderObject::new(
                MeshKind::Cube,
                material,
                Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0)),
            ),
        ];

        let visible = cull_and_sort(&objects, &test_frustum(), RenderTag::OPAQUE_LIT, Vec3::ZERO);
        assert_eq!(visible, vec![0]);
    }

    #[test]
    fn cull_filters_by_tag() {
        let objects = [RenderObject::new(
            MeshKind::Quad,
            Material {
                tag: RenderTag("Custom"),
                base_color: Vec3::ONE,
            },
            Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0)),
        )];

        let frustum = test_frustum();
        assert!(cull_and_sort(&objects, &frustum, RenderTag::OPAQUE_LIT, Vec3::ZERO).is_empty());
        assert_eq!(
            cull_and_sort(&objects, &frustum, RenderTag("Custom"), Vec3::ZERO),
            vec![0]
        );
    }

    #[test]
    fn cull_sorts_front_to_back() {
        let material = Material::opaque(Vec3::ONE);
        let objects = [
            RenderObject::new(
                MeshKind::Cube,
                material,
                Mat4::from_translation(Vec3::new(0.0, 0.0, 20.0)),
            ),
            RenderObject::new(
                MeshKind::Cube,
                material,
                Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0)),
            ),
            RenderObject::new(
                MeshKind::Cube,
                material,
                Mat4::from_translation(Vec3::new(0.0, 0.0, 12.0)),
            ),
        ];

        let visible = cull_and_sort(&objects, &test_frustum(), RenderTag::OPAQUE_LIT, Vec3::ZERO);
        assert_eq!(visible, vec![1, 2, 0]);
    }
}
