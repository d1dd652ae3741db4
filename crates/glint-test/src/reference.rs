//! CPU reference renderer.
//!
//! Mirrors the GPU frame pixel for pixel for scenes without opaque
//! meshes: the sphere trace kernel, the sky gradient, and the
//! composite blend. GPU readbacks are compared against these images,
//! so the math here must stay in lockstep with `sphere_trace.comp`
//! and `sky.frag`.

use glam::Vec3;
use glint_core::{Ray, Sphere, SphereScene};
use glint_render::{Camera, ClearMode};

/// Ambient term of the trace kernel.
const AMBIENT: f32 = 0.1;

/// Sky gradient endpoints from `sky.frag`.
const SKY_HORIZON: Vec3 = Vec3::new(0.82, 0.86, 0.92);
const SKY_ZENITH: Vec3 = Vec3::new(0.18, 0.38, 0.72);

/// A float RGBA image, row 0 at the top.
#[derive(Debug, Clone)]
pub struct CpuImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[f32; 4]>,
}

impl CpuImage {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0.0; 4]; (width * height) as usize],
        }
    }

    pub fn fill(&mut self, color: [f32; 4]) {
        self.pixels.fill(color);
    }

    pub fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        self.pixels[(y * self.width + x) as usize]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, value: [f32; 4]) {
        self.pixels[(y * self.width + x) as usize] = value;
    }

    /// Quantize to RGBA8 the way the UNORM color target stores values.
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|pixel| pixel.map(|channel| (channel.clamp(0.0, 1.0) * 255.0).round() as u8))
            .collect()
    }
}

/// Trace the sphere scene exactly like the compute kernel.
///
/// `light_direction` must be normalized; alpha is coverage, 1 on a
/// hit and 0 on a miss.
pub fn trace_overlay(
    scene: &SphereScene,
    camera: &Camera,
    width: u32,
    height: u32,
    light_direction: Vec3,
) -> CpuImage {
    let inverse_view = camera.view_matrix().inverse();
    let origin = inverse_view.transform_point3(Vec3::ZERO);
    let tan_half_fov = (camera.fov * 0.5).tan();
    let aspect = width as f32 / height as f32;

    let mut overlay = CpuImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let u = (x as f32 + 0.5) / width as f32;
            let v = (y as f32 + 0.5) / height as f32;
            let camera_dir = Vec3::new(
                (u * 2.0 - 1.0) * tan_half_fov * aspect,
                -(v * 2.0 - 1.0) * tan_half_fov,
                1.0,
            )
            .normalize();
            let ray = Ray::new(origin, inverse_view.transform_vector3(camera_dir));

            overlay.set_pixel(x, y, shade_nearest_hit(scene, &ray, light_direction));
        }
    }

    overlay
}

fn shade_nearest_hit(scene: &SphereScene, ray: &Ray, light: Vec3) -> [f32; 4] {
    let mut nearest: Option<(f32, Sphere)> = None;
    for sphere in scene.iter() {
        if let Some(t) = ray.intersect_sphere(sphere.center, sphere.radius) {
            if nearest.is_none_or(|(best, _)| t < best) {
                nearest = Some((t, sphere));
            }
        }
    }

    match nearest {
        Some((t, sphere)) => {
            let normal = (ray.at(t) - sphere.center).normalize();
            let diffuse = normal.dot(light).max(0.0);
            let color = sphere.color * (AMBIENT + (1.0 - AMBIENT) * diffuse);
            [color.x, color.y, color.z, 1.0]
        }
        None => [0.0; 4],
    }
}

/// Sky gradient color at an output row, matching `sky.frag` drawn
/// through the flipped geometry viewport (zenith at row 0).
pub fn sky_color(y: u32, height: u32) -> [f32; 4] {
    let uv_y = 1.0 - (y as f32 + 0.5) / height as f32;
    let color = SKY_HORIZON.lerp(SKY_ZENITH, uv_y);
    [color.x, color.y, color.z, 1.0]
}

/// Blend `overlay` over `frame` with the composite pipeline's
/// operator: straight alpha for color, Porter-Duff over for alpha.
pub fn composite_over(frame: &mut CpuImage, overlay: &CpuImage) {
    debug_assert_eq!(frame.pixels.len(), overlay.pixels.len());

    for (dst, src) in frame.pixels.iter_mut().zip(overlay.pixels.iter()) {
        let alpha = src[3];
        for channel in 0..3 {
            dst[channel] = src[channel] * alpha + dst[channel] * (1.0 - alpha);
        }
        dst[3] = alpha + dst[3] * (1.0 - alpha);
    }
}

/// Render a full frame on the CPU: clear, sky, trace, composite.
///
/// Opaque meshes are not modeled; compare against GPU frames rendered
/// without objects.
pub fn render_frame(
    scene: &SphereScene,
    camera: &Camera,
    width: u32,
    height: u32,
    light_direction: Vec3,
    clear: ClearMode,
) -> CpuImage {
    let light = light_direction.try_normalize().unwrap_or(Vec3::Y);

    let mut frame = CpuImage::new(width, height);
    frame.fill(clear.clear_color());
    if clear == ClearMode::Skybox {
        for y in 0..height {
            let sky = sky_color(y, height);
            for x in 0..width {
                frame.set_pixel(x, y, sky);
            }
        }
    }

    let overlay = trace_overlay(scene, camera, width, height, light);
    composite_over(&mut frame, &overlay);

    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn forward_camera() -> Camera {
        Camera {
            fov: std::f32::consts::FRAC_PI_2,
            ..Camera::new(Vec3::ZERO, Vec3::Z)
        }
    }

    /// Red sphere dead ahead, blue sphere off to the right.
    fn two_sphere_scene() -> SphereScene {
        SphereScene::from_spheres(&[
            Sphere::new(Vec3::new(0.0, 0.0, 5.0), 1.0, Vec3::new(1.0, 0.0, 0.0)),
            Sphere::new(Vec3::new(3.0, 0.0, 5.0), 1.5, Vec3::new(0.0, 0.0, 1.0)),
        ])
    }

    #[test]
    fn center_pixel_hits_front_lit_sphere() {
        let overlay = trace_overlay(
            &two_sphere_scene(),
            &forward_camera(),
            128,
            128,
            Vec3::new(0.0, 0.0, -1.0),
        );

        let pixel = overlay.pixel(64, 64);
        // Front-lit: diffuse is close to 1, so nearly full red.
        assert!(pixel[0] > 0.95, "red channel was {}", pixel[0]);
        assert_eq!(pixel[1], 0.0);
        assert_eq!(pixel[2], 0.0);
        assert_eq!(pixel[3], 1.0);
    }

    #[test]
    fn offset_sphere_lands_at_projected_center() {
        // The blue sphere center is at x/z = 0.6, so with tan(fov/2) = 1
        // its ndc x is 0.6, which is pixel column 0.8 * 128 ~ 102.
        let overlay = trace_overlay(
            &two_sphere_scene(),
            &forward_camera(),
            128,
            128,
            Vec3::new(0.0, 0.0, -1.0),
        );

        let pixel = overlay.pixel(102, 64);
        assert_eq!(pixel[0], 0.0);
        assert!(pixel[2] > 0.05, "blue channel was {}", pixel[2]);
        assert_eq!(pixel[3], 1.0);
    }

    #[test]
    fn corner_pixel_misses_everything() {
        let overlay = trace_overlay(
            &two_sphere_scene(),
            &forward_camera(),
            128,
            128,
            Vec3::new(0.0, 0.0, -1.0),
        );

        assert_eq!(overlay.pixel(0, 0), [0.0; 4]);
        assert_eq!(overlay.pixel(127, 127), [0.0; 4]);
    }

    #[test]
    fn nearest_sphere_wins() {
        let scene = SphereScene::from_spheres(&[
            Sphere::new(Vec3::new(0.0, 0.0, 8.0), 1.0, Vec3::new(0.0, 0.0, 1.0)),
            Sphere::new(Vec3::new(0.0, 0.0, 5.0), 1.0, Vec3::new(1.0, 0.0, 0.0)),
        ]);
        let overlay =
            trace_overlay(&scene, &forward_camera(), 64, 64, Vec3::new(0.0, 0.0, -1.0));

        let pixel = overlay.pixel(32, 32);
        assert!(pixel[0] > 0.0);
        assert_eq!(pixel[2], 0.0);
    }

    #[test]
    fn empty_scene_overlay_is_fully_transparent() {
        let scene = SphereScene::new();
        let overlay = trace_overlay(&scene, &forward_camera(), 32, 32, Vec3::Y);

        assert!(overlay.pixels.iter().all(|pixel| *pixel == [0.0; 4]));
    }

    #[test]
    fn composite_keeps_destination_where_overlay_misses() {
        let mut frame = CpuImage::new(1, 1);
        frame.fill([0.2, 0.3, 0.4, 1.0]);
        let overlay = CpuImage::new(1, 1);

        composite_over(&mut frame, &overlay);
        assert_eq!(frame.pixel(0, 0), [0.2, 0.3, 0.4, 1.0]);
    }

    #[test]
    fn composite_replaces_destination_where_overlay_hits() {
        let mut frame = CpuImage::new(1, 1);
        frame.fill([0.2, 0.3, 0.4, 1.0]);
        let mut overlay = CpuImage::new(1, 1);
        overlay.fill([1.0, 0.0, 0.5, 1.0]);

        composite_over(&mut frame, &overlay);
        assert_eq!(frame.pixel(0, 0), [1.0, 0.0, 0.5, 1.0]);
    }

    #[test]
    fn composite_blends_partial_coverage() {
        let mut frame = CpuImage::new(1, 1);
        frame.fill([0.0, 0.0, 0.0, 1.0]);
        let mut overlay = CpuImage::new(1, 1);
        overlay.fill([1.0, 1.0, 1.0, 0.5]);

        composite_over(&mut frame, &overlay);
        let pixel = frame.pixel(0, 0);
        assert_relative_eq!(pixel[0], 0.5);
        assert_relative_eq!(pixel[3], 1.0);
    }

    #[test]
    fn sky_gradient_puts_zenith_on_top() {
        let top = sky_color(0, 128);
        let bottom = sky_color(127, 128);

        // Zenith is the darker, bluer end of the gradient.
        assert!(top[0] < bottom[0]);
        assert_relative_eq!(top[0], 0.18, epsilon = 0.01);
        assert_relative_eq!(bottom[0], 0.82, epsilon = 0.01);
    }

    #[test]
    fn skybox_frame_shows_sky_on_miss_and_sphere_on_hit() {
        let frame = render_frame(
            &two_sphere_scene(),
            &forward_camera(),
            128,
            128,
            Vec3::new(0.0, 0.0, -1.0),
            ClearMode::Skybox,
        );

        let sky = frame.pixel(0, 0);
        assert_relative_eq!(sky[0], sky_color(0, 128)[0]);
        assert_eq!(sky[3], 1.0);

        let sphere = frame.pixel(64, 64);
        assert!(sphere[0] > 0.95);
        assert_eq!(sphere[3], 1.0);
    }

    #[test]
    fn solid_clear_shows_through_misses() {
        let frame = render_frame(
            &SphereScene::new(),
            &forward_camera(),
            16,
            16,
            Vec3::Y,
            ClearMode::Solid(Vec3::new(0.25, 0.5, 0.75)),
        );

        assert_eq!(frame.pixel(8, 8), [0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn rgba8_conversion_clamps_and_rounds() {
        let mut image = CpuImage::new(1, 1);
        image.fill([2.0, -1.0, 0.5, 1.0]);

        assert_eq!(image.to_rgba8(), vec![255, 0, 128, 255]);
    }
}
