//! Hybrid rendering pipeline for Glint.
//!
//! Each frame runs two image sources per camera and merges them:
//! a compute shader ray traces the sphere scene into a float overlay
//! texture, a raster pass draws the sky and opaque meshes into the
//! color target, and a final fullscreen pass blends the overlay on
//! top using its coverage alpha. All passes are recorded into a
//! single command buffer so submission order sequences them.

pub mod camera;
pub mod composite;
pub mod hybrid;
pub mod plan;
pub mod raster;
pub mod scene_upload;
pub mod screenshot;
pub mod sphere_trace;
pub mod target;

pub use camera::{Camera, CameraFrame, CameraId, ClearMode, RasterUniforms, TraceUniforms, Viewport};
pub use composite::CompositePass;
pub use hybrid::{HybridRenderer, RendererConfig};
pub use plan::{ClearFlags, FramePlan, PassCommand, WORKGROUP_SIZE};
pub use raster::{ObjectPushConstants, RasterPass};
pub use scene_upload::SceneBuffers;
pub use screenshot::{save_screenshot, ScreenshotError};
pub use sphere_trace::{SphereTracePass, TracePushConstants};
pub use target::CameraTargets;
