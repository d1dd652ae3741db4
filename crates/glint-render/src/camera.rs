//! Camera types and per-camera uniform data.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use glint_core::Frustum;

/// Identifier for a camera across frames.
///
/// Render targets are cached per id, so a camera that keeps its id
/// between frames reuses its GPU resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CameraId(pub u32);

/// Output dimensions for a camera, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height.
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// How the color target is filled before geometry is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearMode {
    /// Clear to a constant color.
    Solid(Vec3),
    /// Clear to black, then draw the procedural sky gradient.
    Skybox,
}

impl ClearMode {
    /// Clear color for the color attachment. The target is always
    /// cleared, even in skybox mode, so unrendered regions are defined.
    pub fn clear_color(&self) -> [f32; 4] {
        match self {
            Self::Solid(color) => [color.x, color.y, color.z, 1.0],
            Self::Skybox => [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Camera for hybrid rendering.
///
/// Left-handed convention: `direction` is forward, +y is up in world
/// space. Aspect ratio comes from the viewport at render time and is
/// deliberately not stored here.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Camera position in world space.
    pub position: Vec3,
    /// Forward direction (does not need to be normalized).
    pub direction: Vec3,
    /// Up vector.
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov: f32,
    /// Near clip plane distance.
    pub near: f32,
    /// Far clip plane distance.
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            direction: Vec3::Z,
            up: Vec3::Y,
            fov: std::f32::consts::FRAC_PI_3,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl Camera {
    pub fn new(position: Vec3, direction: Vec3) -> Self {
        Self {
            position,
            direction,
            ..Self::default()
        }
    }

    /// World to view transform.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_lh(self.position, self.direction, self.up)
    }

    /// View to clip transform with [0, 1] depth.
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_lh(self.fov, aspect, self.near, self.far)
    }

    /// Combined world to clip transform.
    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    /// Frustum for culling, derived from the view projection.
    pub fn frustum(&self, aspect: f32) -> Frustum {
        Frustum::from_view_projection(self.view_projection(aspect))
    }
}

/// One camera's worth of work in a frame.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub id: CameraId,
    pub camera: Camera,
    pub viewport: Viewport,
    pub clear: ClearMode,
}

impl CameraFrame {
    pub fn new(id: CameraId, camera: Camera, viewport: Viewport, clear: ClearMode) -> Self {
        Self {
            id,
            camera,
            viewport,
            clear,
        }
    }
}

/// Uniform data for the sphere trace kernel.
///
/// Must match the `TraceUniforms` block in `sphere_trace.comp`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct TraceUniforms {
    /// World to view transform.
    pub view: [[f32; 4]; 4],
    /// View to world transform, used to generate rays.
    pub inverse_view: [[f32; 4]; 4],
    /// xyz: unit vector from surface toward the light.
    pub light_direction: [f32; 4],
    /// x: tan(fov / 2), y: aspect ratio.
    pub ray_params: [f32; 4],
}

impl TraceUniforms {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Build uniforms for a camera. `light_direction` must be normalized.
    pub fn new(camera: &Camera, aspect: f32, light_direction: Vec3) -> Self {
        let view = camera.view_matrix();
        let inverse_view = view.inverse();

        Self {
            view: view.to_cols_array_2d(),
            inverse_view: inverse_view.to_cols_array_2d(),
            light_direction: [light_direction.x, light_direction.y, light_direction.z, 0.0],
            ray_params: [(camera.fov * 0.5).tan(), aspect, 0.0, 0.0],
        }
    }
}

/// Uniform data shared by the sky and opaque raster pipelines.
///
/// Must match the `RasterUniforms` block in `opaque.vert`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct RasterUniforms {
    /// World to clip transform.
    pub view_projection: [[f32; 4]; 4],
    /// xyz: unit vector from surface toward the light.
    pub light_direction: [f32; 4],
}

impl RasterUniforms {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Build uniforms for a camera. `light_direction` must be normalized.
    pub fn new(camera: &Camera, aspect: f32, light_direction: Vec3) -> Self {
        Self {
            view_projection: camera.view_projection(aspect).to_cols_array_2d(),
            light_direction: [light_direction.x, light_direction.y, light_direction.z, 0.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Vec4;
    use std::mem::offset_of;

    #[test]
    fn trace_uniforms_layout() {
        assert_eq!(offset_of!(TraceUniforms, view), 0);
        assert_eq!(offset_of!(TraceUniforms, inverse_view), 64);
        assert_eq!(offset_of!(TraceUniforms, light_direction), 128);
        assert_eq!(offset_of!(TraceUniforms, ray_params), 144);
        assert_eq!(TraceUniforms::SIZE, 160);
    }

    #[test]
    fn raster_uniforms_layout() {
        assert_eq!(offset_of!(RasterUniforms, view_projection), 0);
        assert_eq!(offset_of!(RasterUniforms, light_direction), 64);
        assert_eq!(RasterUniforms::SIZE, 80);
    }

    #[test]
    fn inverse_view_recovers_camera_position() {
        let camera = Camera::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.3, -0.1, 1.0));
        let uniforms = TraceUniforms::new(&camera, 1.5, Vec3::Y);

        let inverse_view = Mat4::from_cols_array_2d(&uniforms.inverse_view);
        let origin = inverse_view * Vec4::new(0.0, 0.0, 0.0, 1.0);

        assert_relative_eq!(origin.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(origin.y, 2.0, epsilon = 1e-5);
        assert_relative_eq!(origin.z, 3.0, epsilon = 1e-5);
    }

    #[test]
    fn forward_point_projects_to_screen_center() {
        let camera = Camera::new(Vec3::new(0.0, 1.0, -4.0), Vec3::new(0.0, 0.0, 1.0));
        let vp = camera.view_projection(16.0 / 9.0);

        let ahead = camera.position + camera.direction * 5.0;
        let clip = vp * ahead.extend(1.0);

        assert_relative_eq!(clip.x / clip.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(clip.y / clip.w, 0.0, epsilon = 1e-5);
        assert!(clip.z / clip.w > 0.0 && clip.z / clip.w < 1.0);
    }

    #[test]
    fn ray_params_hold_fov_and_aspect() {
        let camera = Camera {
            fov: std::f32::consts::FRAC_PI_2,
            ..Camera::default()
        };
        let uniforms = TraceUniforms::new(&camera, 2.0, Vec3::Y);

        assert_relative_eq!(uniforms.ray_params[0], 1.0, epsilon = 1e-5);
        assert_relative_eq!(uniforms.ray_params[1], 2.0, epsilon = 1e-5);
    }

    #[test]
    fn clear_mode_colors() {
        let solid = ClearMode::Solid(Vec3::new(0.2, 0.4, 0.6));
        assert_eq!(solid.clear_color(), [0.2, 0.4, 0.6, 1.0]);
        assert_eq!(ClearMode::Skybox.clear_color(), [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn viewport_aspect() {
        assert_relative_eq!(Viewport::new(1920, 1080).aspect(), 16.0 / 9.0);
        // Degenerate height must not divide by zero.
        assert_relative_eq!(Viewport::new(64, 0).aspect(), 64.0);
    }
}
