//! Analytic sphere scene in struct-of-arrays form.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::error::{Error, Result};

/// A single traced sphere.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sphere {
    /// World-space center
    pub center: Vec3,
    /// Radius in world units
    pub radius: f32,
    /// Base albedo color (RGB, 0-1)
    pub color: Vec3,
}

impl Sphere {
    /// Create a new sphere
    #[inline]
    pub const fn new(center: Vec3, radius: f32, color: Vec3) -> Self {
        Self {
            center,
            radius,
            color,
        }
    }
}

/// Sphere scene stored as parallel arrays.
///
/// Centers, radii, and colors live in separate arrays matching the three
/// storage buffers the trace kernel binds, so uploads are straight copies.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SphereScene {
    centers: Vec<Vec3>,
    radii: Vec<f32>,
    colors: Vec<Vec3>,
}

impl SphereScene {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a scene from a slice of spheres.
    pub fn from_spheres(spheres: &[Sphere]) -> Self {
        let mut scene = Self::new();
        for sphere in spheres {
            scene.push(*sphere);
        }
        scene
    }

    /// Build a scene from pre-split arrays.
    ///
    /// Fails if the arrays disagree on length.
    pub fn from_arrays(centers: Vec<Vec3>, radii: Vec<f32>, colors: Vec<Vec3>) -> Result<Self> {
        if centers.len() != radii.len() || centers.len() != colors.len() {
            return Err(Error::SceneArrayMismatch {
                centers: centers.len(),
                radii: radii.len(),
                colors: colors.len(),
            });
        }

        Ok(Self {
            centers,
            radii,
            colors,
        })
    }

    /// Append a sphere to the scene.
    #[inline]
    pub fn push(&mut self, sphere: Sphere) {
        self.centers.push(sphere.center);
        self.radii.push(sphere.radius);
        self.colors.push(sphere.color);
    }

    /// Number of spheres in the scene.
    #[inline]
    pub fn len(&self) -> usize {
        self.centers.len()
    }

    /// Returns true if the scene holds no spheres.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    /// Sphere centers, one entry per sphere.
    #[inline]
    pub fn centers(&self) -> &[Vec3] {
        &self.centers
    }

    /// Sphere radii, one entry per sphere.
    #[inline]
    pub fn radii(&self) -> &[f32] {
        &self.radii
    }

    /// Sphere colors, one entry per sphere.
    #[inline]
    pub fn colors(&self) -> &[Vec3] {
        &self.colors
    }

    /// Sphere at `index`, or None past the end.
    pub fn get(&self, index: usize) -> Option<Sphere> {
        Some(Sphere {
            center: *self.centers.get(index)?,
            radius: *self.radii.get(index)?,
            color: *self.colors.get(index)?,
        })
    }

    /// Iterate spheres in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = Sphere> + '_ {
        (0..self.len()).filter_map(|index| self.get(index))
    }
}

/// GPU-layout vec3 padded to the 16-byte std430 array stride.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuVec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Stride padding, always zero
    pub _padding: f32,
}

impl GpuVec3 {
    /// Size in bytes (std430 array stride for vec3)
    pub const SIZE: usize = 16;
}

impl From<Vec3> for GpuVec3 {
    fn from(v: Vec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
            _padding: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    #[test]
    fn gpu_vec3_layout() {
        assert_eq!(size_of::<GpuVec3>(), GpuVec3::SIZE);
        assert_eq!(offset_of!(GpuVec3, x), 0);
        assert_eq!(offset_of!(GpuVec3, y), 4);
        assert_eq!(offset_of!(GpuVec3, z), 8);
        assert_eq!(offset_of!(GpuVec3, _padding), 12);
    }

    #[test]
    fn gpu_vec3_from_vec3() {
        let v = GpuVec3::from(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(v.x, 1.0);
        assert_eq!(v.y, 2.0);
        assert_eq!(v.z, 3.0);
        assert_eq!(v._padding, 0.0);
    }

    #[test]
    fn scene_push_and_get() {
        let mut scene = SphereScene::new();
        assert!(scene.is_empty());

        scene.push(Sphere::new(Vec3::new(0.0, 0.0, 5.0), 1.0, Vec3::X));
        scene.push(Sphere::new(Vec3::new(3.0, 0.0, 5.0), 1.5, Vec3::Z));

        assert_eq!(scene.len(), 2);
        let second = scene.get(1).unwrap();
        assert_eq!(second.radius, 1.5);
        assert_eq!(second.center, Vec3::new(3.0, 0.0, 5.0));
        assert!(scene.get(2).is_none());
    }

    #[test]
    fn scene_from_arrays_checks_lengths() {
        let result = SphereScene::from_arrays(
            vec![Vec3::ZERO, Vec3::ONE],
            vec![1.0],
            vec![Vec3::X, Vec3::Y],
        );
        assert!(matches!(
            result,
            Err(Error::SceneArrayMismatch {
                centers: 2,
                radii: 1,
                colors: 2
            })
        ));

        let scene = SphereScene::from_arrays(vec![Vec3::ZERO], vec![1.0], vec![Vec3::X]).unwrap();
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn scene_iter_preserves_order() {
        let spheres = [
            Sphere::new(Vec3::ZERO, 1.0, Vec3::X),
            Sphere::new(Vec3::ONE, 2.0, Vec3::Y),
        ];
        let scene = SphereScene::from_spheres(&spheres);
        let collected: Vec<Sphere> = scene.iter().collect();
        assert_eq!(collected.as_slice(), &spheres);
    }
}
