//! Test harness for headless rendering.
//!
//! Wraps a GPU context and a [`HybridRenderer`] so tests can render
//! frames and read pixels without a display.

use glam::Vec3;
use image::RgbaImage;

use glint_core::{RenderObject, SphereScene};
use glint_gpu::{GpuContext, GpuContextBuilder};
use glint_render::{Camera, CameraFrame, CameraId, HybridRenderer, RendererConfig};

use crate::{Result, TestError};

/// Headless renderer for testing.
pub struct HeadlessRenderer {
    context: GpuContext,
    renderer: Option<HybridRenderer>,
}

impl HeadlessRenderer {
    /// Create a headless GPU context and renderer with validation on.
    pub fn new() -> Result<Self> {
        let context = GpuContextBuilder::new()
            .app_name("glint-test")
            .validation(true)
            .build()
            .map_err(|e| TestError::Gpu(e.to_string()))?;

        let renderer = unsafe { HybridRenderer::new(&context, RendererConfig::default()) }
            .map_err(|e| TestError::Gpu(e.to_string()))?;

        Ok(Self {
            context,
            renderer: Some(renderer),
        })
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    /// Render the given camera frames and wait for completion.
    pub fn render(
        &mut self,
        scene: &SphereScene,
        objects: &[RenderObject],
        frames: &[CameraFrame],
        light_direction: Vec3,
    ) -> Result<()> {
        let renderer = self.renderer.as_mut().ok_or_else(renderer_destroyed)?;
        unsafe { renderer.render(&self.context, scene, objects, frames, light_direction) }
            .map_err(|e| TestError::Gpu(e.to_string()))
    }

    /// Read a camera's last rendered frame.
    pub fn read_rgba(&self, id: CameraId) -> Result<RgbaImage> {
        let renderer = self.renderer.as_ref().ok_or_else(renderer_destroyed)?;
        let (width, height) = renderer
            .target_extent(id)
            .ok_or_else(|| TestError::Gpu(format!("Camera {} has not rendered", id.0)))?;
        let data = renderer
            .read_target(id)
            .map_err(|e| TestError::Gpu(e.to_string()))?;

        RgbaImage::from_raw(width, height, data)
            .ok_or_else(|| TestError::Gpu("Failed to create image from raw data".to_string()))
    }

    /// Free a camera's targets.
    pub fn release_camera(&mut self, id: CameraId) -> Result<()> {
        let renderer = self.renderer.as_mut().ok_or_else(renderer_destroyed)?;
        unsafe { renderer.release_camera(&self.context, id) }
            .map_err(|e| TestError::Gpu(e.to_string()))
    }

    /// Number of cameras with cached targets.
    pub fn camera_count(&self) -> usize {
        self.renderer
            .as_ref()
            .map_or(0, HybridRenderer::camera_count)
    }
}

fn renderer_destroyed() -> TestError {
    TestError::Gpu("Renderer already destroyed".to_string())
}

impl Drop for HeadlessRenderer {
    fn drop(&mut self) {
        if let Some(renderer) = self.renderer.take() {
            if let Err(e) = unsafe { renderer.destroy(&self.context) } {
                tracing::warn!("Failed to destroy renderer: {e}");
            }
        }
    }
}

/// Build a camera at `position` looking at `target`.
pub fn create_test_camera(position: Vec3, target: Vec3) -> Camera {
    Camera {
        position,
        direction: target - position,
        ..Camera::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::assert_images_match;
    use crate::reference;
    use glint_core::Sphere;
    use glint_render::{ClearMode, Viewport};

    // These tests require a GPU and will be skipped in CI without GPU support

    fn two_sphere_scene() -> SphereScene {
        SphereScene::from_spheres(&[
            Sphere::new(Vec3::new(0.0, 0.0, 5.0), 1.0, Vec3::new(1.0, 0.1, 0.1)),
            Sphere::new(Vec3::new(3.0, 0.0, 5.0), 1.5, Vec3::new(0.1, 0.2, 1.0)),
        ])
    }

    fn forward_frame(id: u32, size: u32, clear: ClearMode) -> CameraFrame {
        let camera = Camera {
            fov: std::f32::consts::FRAC_PI_2,
            ..create_test_camera(Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0))
        };
        CameraFrame::new(CameraId(id), camera, Viewport::new(size, size), clear)
    }

    #[test]
    #[ignore = "Requires GPU hardware"]
    fn headless_renderer_creation() {
        let _renderer = HeadlessRenderer::new().unwrap();
    }

    #[test]
    #[ignore = "Requires GPU hardware"]
    fn render_and_read_back() {
        let mut renderer = HeadlessRenderer::new().unwrap();
        let frames = [forward_frame(0, 256, ClearMode::Solid(Vec3::new(0.1, 0.1, 0.1)))];

        renderer
            .render(&two_sphere_scene(), &[], &frames, Vec3::new(0.0, 0.0, -1.0))
            .unwrap();
        let image = renderer.read_rgba(CameraId(0)).unwrap();

        assert_eq!(image.dimensions(), (256, 256));
        // Red sphere in the middle, clear color in the corner.
        assert!(image.get_pixel(128, 128)[0] > 128);
        assert!(image.get_pixel(0, 0)[0] < 50);
    }

    #[test]
    #[ignore = "Requires GPU hardware"]
    fn empty_scene_renders_clear_color() {
        let mut renderer = HeadlessRenderer::new().unwrap();
        let frames = [forward_frame(0, 64, ClearMode::Solid(Vec3::new(0.0, 1.0, 0.0)))];

        renderer
            .render(&SphereScene::new(), &[], &frames, Vec3::Y)
            .unwrap();
        let image = renderer.read_rgba(CameraId(0)).unwrap();

        let pixel = image.get_pixel(32, 32);
        assert_eq!(pixel[0], 0);
        assert_eq!(pixel[1], 255);
    }

    #[test]
    #[ignore = "Requires GPU hardware"]
    fn matches_cpu_reference() {
        let mut renderer = HeadlessRenderer::new().unwrap();
        let scene = two_sphere_scene();
        let light = Vec3::new(0.2, 0.8, -0.5);
        let frames = [forward_frame(0, 128, ClearMode::Skybox)];

        renderer.render(&scene, &[], &frames, light).unwrap();
        let gpu = renderer.read_rgba(CameraId(0)).unwrap();

        let cpu = reference::render_frame(
            &scene,
            &frames[0].camera,
            128,
            128,
            light,
            ClearMode::Skybox,
        );
        let cpu = RgbaImage::from_raw(128, 128, cpu.to_rgba8()).unwrap();

        // Allow for float rounding between GPU and CPU shading.
        assert_images_match(&gpu, &cpu, 0.01).unwrap();
    }

    #[test]
    #[ignore = "Requires GPU hardware"]
    fn resize_recreates_targets() {
        let mut renderer = HeadlessRenderer::new().unwrap();
        let scene = two_sphere_scene();

        let frames = [forward_frame(0, 128, ClearMode::Skybox)];
        renderer.render(&scene, &[], &frames, Vec3::Y).unwrap();
        assert_eq!(renderer.read_rgba(CameraId(0)).unwrap().dimensions(), (128, 128));

        let frames = [forward_frame(0, 200, ClearMode::Skybox)];
        renderer.render(&scene, &[], &frames, Vec3::Y).unwrap();
        assert_eq!(renderer.read_rgba(CameraId(0)).unwrap().dimensions(), (200, 200));
        assert_eq!(renderer.camera_count(), 1);
    }

    #[test]
    #[ignore = "Requires GPU hardware"]
    fn renders_multiple_cameras() {
        let mut renderer = HeadlessRenderer::new().unwrap();
        let frames = [
            forward_frame(0, 64, ClearMode::Skybox),
            forward_frame(1, 96, ClearMode::Solid(Vec3::ZERO)),
        ];

        renderer
            .render(&two_sphere_scene(), &[], &frames, Vec3::Y)
            .unwrap();

        assert_eq!(renderer.camera_count(), 2);
        assert_eq!(renderer.read_rgba(CameraId(0)).unwrap().dimensions(), (64, 64));
        assert_eq!(renderer.read_rgba(CameraId(1)).unwrap().dimensions(), (96, 96));
    }

    #[test]
    #[ignore = "Requires GPU hardware"]
    fn release_camera_twice_is_safe() {
        let mut renderer = HeadlessRenderer::new().unwrap();
        let frames = [forward_frame(0, 64, ClearMode::Skybox)];

        renderer
            .render(&two_sphere_scene(), &[], &frames, Vec3::Y)
            .unwrap();
        assert_eq!(renderer.camera_count(), 1);

        renderer.release_camera(CameraId(0)).unwrap();
        renderer.release_camera(CameraId(0)).unwrap();
        assert_eq!(renderer.camera_count(), 0);
    }

    #[test]
    #[ignore = "Requires GPU hardware"]
    fn scene_growth_between_frames() {
        let mut renderer = HeadlessRenderer::new().unwrap();
        let frames = [forward_frame(0, 64, ClearMode::Solid(Vec3::ZERO))];

        let mut scene = SphereScene::from_spheres(&[Sphere::new(
            Vec3::new(0.0, 0.0, 5.0),
            1.0,
            Vec3::new(1.0, 0.0, 0.0),
        )]);
        renderer.render(&scene, &[], &frames, Vec3::Y).unwrap();

        // Force a reallocation and make sure the trace still sees
        // every sphere afterwards.
        for i in 0..8 {
            scene.push(Sphere::new(
                Vec3::new(-3.0, 0.0, 4.0 + i as f32),
                0.5,
                Vec3::new(0.0, 1.0, 0.0),
            ));
        }
        renderer.render(&scene, &[], &frames, Vec3::Y).unwrap();

        let image = renderer.read_rgba(CameraId(0)).unwrap();
        assert!(image.get_pixel(32, 32)[0] > 0);
    }

    #[test]
    #[ignore = "Requires GPU hardware"]
    fn opaque_mesh_draws_into_color_target() {
        use glam::Mat4;
        use glint_core::{Material, MeshKind};

        let mut renderer = HeadlessRenderer::new().unwrap();
        let frames = [forward_frame(0, 128, ClearMode::Solid(Vec3::ZERO))];

        let cube = RenderObject::new(
            MeshKind::Cube,
            Material::opaque(Vec3::new(1.0, 1.0, 0.0)),
            Mat4::from_translation(Vec3::new(0.0, 0.0, 4.0)),
        );
        renderer
            .render(&SphereScene::new(), &[cube], &frames, Vec3::new(0.0, 0.3, -1.0))
            .unwrap();

        let image = renderer.read_rgba(CameraId(0)).unwrap();
        // Lit yellow cube front face in the middle of a black frame.
        let center = image.get_pixel(64, 64);
        assert!(center[0] > 30);
        assert!(center[1] > 30);
        assert_eq!(image.get_pixel(2, 2)[0], 0);
    }
}
