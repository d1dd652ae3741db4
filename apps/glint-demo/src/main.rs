//! Glint Hybrid Renderer Demo
//!
//! Renders ray traced spheres composited over a rasterized floor and cube,
//! headless, and saves each frame as a PNG. The camera orbits the scene so
//! multi-frame runs show the composite from different angles.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p glint-demo -- [OPTIONS]
//! ```
//!
//! ## Options
//!
//! - `-o, --output <PATTERN>`: Output path pattern (use `{}` for frame number)
//! - `-f, --frames <N>`: Number of frames to render (default: 1)
//! - `-s, --size <WxH>`: Output resolution (default: 1280x720)
//! - `-h, --help`: Print help message
//!
//! ## Examples
//!
//! ```bash
//! # Single frame at the default resolution
//! cargo run -p glint-demo
//!
//! # Eight frames of the orbit at 1920x1080
//! cargo run -p glint-demo -- -f 8 -s 1920x1080 -o orbit_{}.png
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

use std::path::PathBuf;

use glam::{Mat4, Quat, Vec3};
use glint_core::{Material, MeshKind, RenderObject, Sphere, SphereScene};
use glint_gpu::{GpuContext, GpuContextBuilder};
use glint_render::{
    save_screenshot, Camera, CameraFrame, CameraId, ClearMode, HybridRenderer, RendererConfig,
    Viewport,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_WIDTH: u32 = 1280;
const DEFAULT_HEIGHT: u32 = 720;

/// Point the orbiting camera looks at.
const ORBIT_TARGET: Vec3 = Vec3::new(0.0, 0.0, 5.0);
/// Distance from the orbit target.
const ORBIT_RADIUS: f32 = 5.0;
/// Orbit angle advanced per frame, in radians.
const ORBIT_STEP: f32 = 0.05;

/// Demo configuration parsed from command line arguments.
#[derive(Clone, Debug, PartialEq)]
struct DemoConfig {
    /// Output path pattern (use `{}` for frame number placeholder).
    output_pattern: String,
    /// Number of frames to render.
    frames: u32,
    /// Output width in pixels.
    width: u32,
    /// Output height in pixels.
    height: u32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            output_pattern: "demo_{}.png".to_string(),
            frames: 1,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

impl DemoConfig {
    /// Parse from command line arguments.
    fn from_args() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::parse_args(&args)
    }

    /// Parse from a slice of arguments.
    fn parse_args(args: &[String]) -> Self {
        let mut config = Self::default();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "-o" | "--output" => {
                    if i + 1 < args.len() {
                        config.output_pattern = args[i + 1].clone();
                        i += 1;
                    }
                }
                "-f" | "--frames" => {
                    if i + 1 < args.len() {
                        if let Ok(frames) = args[i + 1].parse() {
                            config.frames = frames;
                        }
                        i += 1;
                    }
                }
                "-s" | "--size" => {
                    if i + 1 < args.len() {
                        if let Some((width, height)) = parse_size(&args[i + 1]) {
                            config.width = width;
                            config.height = height;
                        }
                        i += 1;
                    }
                }
                _ => {}
            }
            i += 1;
        }

        config
    }

    /// Get the output path for a specific frame.
    fn output_path(&self, frame: u32) -> PathBuf {
        PathBuf::from(self.output_pattern.replace("{}", &frame.to_string()))
    }
}

/// Parse a resolution string like "1280x720".
fn parse_size(s: &str) -> Option<(u32, u32)> {
    let mut iter = s.splitn(2, 'x');
    let width = iter.next()?.parse().ok()?;
    let height = iter.next()?.parse().ok()?;
    if width == 0 || height == 0 {
        return None;
    }
    Some((width, height))
}

fn demo_scene() -> SphereScene {
    SphereScene::from_spheres(&[
        Sphere::new(Vec3::new(-1.2, 0.4, 5.0), 1.0, Vec3::new(0.9, 0.2, 0.15)),
        Sphere::new(Vec3::new(1.6, 0.1, 6.5), 1.3, Vec3::new(0.2, 0.35, 0.95)),
        Sphere::new(Vec3::new(0.4, -0.6, 3.8), 0.45, Vec3::new(0.95, 0.75, 0.2)),
    ])
}

fn demo_objects() -> Vec<RenderObject> {
    let floor = RenderObject::new(
        MeshKind::Quad,
        Material::opaque(Vec3::new(0.45, 0.45, 0.48)),
        Mat4::from_scale_rotation_translation(
            Vec3::new(20.0, 1.0, 20.0),
            Quat::IDENTITY,
            Vec3::new(0.0, -1.2, 5.0),
        ),
    );
    let cube = RenderObject::new(
        MeshKind::Cube,
        Material::opaque(Vec3::new(0.2, 0.7, 0.6)),
        Mat4::from_translation(Vec3::new(-2.8, -0.7, 6.5)),
    );
    vec![floor, cube]
}

/// Camera on the orbit for the given frame, slightly above the target plane.
fn orbit_camera(frame: u32) -> Camera {
    let angle = frame as f32 * ORBIT_STEP;
    let offset = Vec3::new(angle.sin(), 0.0, -angle.cos()) * ORBIT_RADIUS;
    let position = ORBIT_TARGET + offset + Vec3::new(0.0, 0.8, 0.0);
    Camera::new(position, ORBIT_TARGET - position)
}

fn render_frames(
    gpu: &GpuContext,
    renderer: &mut HybridRenderer,
    config: &DemoConfig,
) -> anyhow::Result<()> {
    let scene = demo_scene();
    let objects = demo_objects();
    let light = Vec3::new(0.25, 0.9, -0.35);
    let viewport = Viewport::new(config.width, config.height);

    for frame in 0..config.frames {
        let camera_frame = CameraFrame::new(
            CameraId(0),
            orbit_camera(frame),
            viewport,
            ClearMode::Skybox,
        );
        unsafe { renderer.render(gpu, &scene, &objects, &[camera_frame], light)? };

        let data = renderer.read_target(CameraId(0))?;
        save_screenshot(data, config.width, config.height, config.output_path(frame))?;
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    // Check for help flag before touching the GPU
    if std::env::args().any(|arg| arg == "-h" || arg == "--help") {
        print_help();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = DemoConfig::from_args();
    info!(
        frames = config.frames,
        width = config.width,
        height = config.height,
        "Glint demo starting"
    );

    let gpu = GpuContextBuilder::new()
        .app_name("glint-demo")
        .validation(cfg!(debug_assertions))
        .build()?;

    let mut renderer = unsafe { HybridRenderer::new(&gpu, RendererConfig::default())? };

    let result = render_frames(&gpu, &mut renderer, &config);

    // Tear down even if a frame failed
    unsafe { renderer.destroy(&gpu)? };

    result
}

fn print_help() {
    eprintln!(
        "Glint Hybrid Renderer Demo

USAGE:
    cargo run -p glint-demo -- [OPTIONS]

OPTIONS:
    -o, --output <PATTERN>  Output path pattern (use {{}} for frame number)
                            Default: demo_{{}}.png
    -f, --frames <N>        Number of frames to render (default: 1)
    -s, --size <WxH>        Output resolution (default: 1280x720)
    -h, --help              Print this help message

EXAMPLES:
    # Single frame at the default resolution
    cargo run -p glint-demo

    # Eight frames of the orbit at 1920x1080
    cargo run -p glint-demo -- -f 8 -s 1920x1080 -o orbit_{{}}.png

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log level (e.g., info, debug, trace)"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("glint-demo".to_string())
            .chain(list.iter().map(|s| (*s).to_string()))
            .collect()
    }

    #[test]
    fn defaults_render_one_frame() {
        let config = DemoConfig::parse_args(&args(&[]));
        assert_eq!(config, DemoConfig::default());
        assert_eq!(config.frames, 1);
        assert_eq!((config.width, config.height), (1280, 720));
    }

    #[test]
    fn parses_output_frames_and_size() {
        let config =
            DemoConfig::parse_args(&args(&["-o", "orbit_{}.png", "-f", "8", "-s", "640x480"]));
        assert_eq!(config.output_pattern, "orbit_{}.png");
        assert_eq!(config.frames, 8);
        assert_eq!((config.width, config.height), (640, 480));
    }

    #[test]
    fn long_flags_match_short_flags() {
        let short = DemoConfig::parse_args(&args(&["-f", "4", "-s", "320x240"]));
        let long = DemoConfig::parse_args(&args(&["--frames", "4", "--size", "320x240"]));
        assert_eq!(short, long);
    }

    #[test]
    fn invalid_size_keeps_default() {
        for bad in ["640", "640x", "x480", "0x480", "640x0", "wide"] {
            let config = DemoConfig::parse_args(&args(&["-s", bad]));
            assert_eq!((config.width, config.height), (1280, 720), "input {bad:?}");
        }
    }

    #[test]
    fn output_path_substitutes_frame_number() {
        let config = DemoConfig::parse_args(&args(&["-o", "shots/frame_{}.png"]));
        assert_eq!(
            config.output_path(12),
            PathBuf::from("shots/frame_12.png")
        );
    }

    #[test]
    fn missing_flag_value_is_ignored() {
        let config = DemoConfig::parse_args(&args(&["-f"]));
        assert_eq!(config.frames, 1);
    }

    #[test]
    fn orbit_starts_behind_the_target() {
        let camera = orbit_camera(0);
        assert!((camera.position.z - 0.0).abs() < 1e-5);
        assert!((camera.position.y - 0.8).abs() < 1e-5);
        // Looking toward +z at the target
        assert!(camera.direction.z > 0.0);
    }
}
