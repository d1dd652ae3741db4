//! Hybrid renderer.
//!
//! Owns the three passes, the sphere scene buffers, and the cached
//! per-camera targets. Each call to [`HybridRenderer::render`] uploads
//! the scene once, then records and submits one command buffer per
//! camera: trace dispatch, clear plus geometry, composite, readback.

use ash::vk;
use glam::Vec3;
use hashbrown::HashMap;
use tracing::{debug, info};

use glint_core::{RenderObject, RenderTag, SphereScene};
use glint_gpu::{
    begin_command_buffer, create_fence, end_command_buffer, reset_fence, submit_command_buffers,
    wait_for_fence, CommandPool, DescriptorPool, GpuBuffer, GpuContext, GpuError, Result,
};

use crate::camera::{CameraFrame, CameraId, RasterUniforms, TraceUniforms};
use crate::composite::CompositePass;
use crate::plan::FramePlan;
use crate::raster::RasterPass;
use crate::scene_upload::SceneBuffers;
use crate::sphere_trace::{SphereTracePass, TracePushConstants};
use crate::target::CameraTargets;

/// Descriptor pool headroom, in cameras.
const MAX_CAMERAS: u32 = 16;
const SETS_PER_CAMERA: u32 = 3;

/// Renderer configuration.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Material tag the opaque pass draws.
    pub render_tag: RenderTag,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            render_tag: RenderTag::OPAQUE_LIT,
        }
    }
}

/// The hybrid trace and raster renderer.
pub struct HybridRenderer {
    trace: SphereTracePass,
    raster: RasterPass,
    composite: CompositePass,
    scene: SceneBuffers,
    targets: HashMap<CameraId, CameraTargets>,
    descriptor_pool: DescriptorPool,
    command_pool: CommandPool,
    command_buffer: vk::CommandBuffer,
    fence: vk::Fence,
    config: RendererConfig,
}

impl HybridRenderer {
    /// Create the renderer.
    ///
    /// # Safety
    /// The context must outlive the renderer, and [`Self::destroy`]
    /// must be called before the context is dropped.
    pub unsafe fn new(gpu: &GpuContext, config: RendererConfig) -> Result<Self> {
        let device = gpu.device();

        // 1. Create the passes
        let trace = SphereTracePass::new(device)?;
        let raster = {
            let mut allocator = gpu.allocator().lock();
            RasterPass::new(device, &mut allocator)?
        };
        let composite = CompositePass::new(device)?;

        // 2. Create the descriptor pool with camera headroom
        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: MAX_CAMERAS * 2,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::STORAGE_BUFFER,
                descriptor_count: MAX_CAMERAS * 3,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::STORAGE_IMAGE,
                descriptor_count: MAX_CAMERAS,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: MAX_CAMERAS,
            },
        ];
        let descriptor_pool =
            DescriptorPool::new(device, MAX_CAMERAS * SETS_PER_CAMERA, &pool_sizes)?;

        // 3. Create the command pool and primary command buffer
        let command_pool = CommandPool::new(
            device,
            gpu.queue_family(),
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        )?;
        let command_buffer =
            command_pool.allocate_command_buffer(device, vk::CommandBufferLevel::PRIMARY)?;

        // 4. Create the submission fence
        let fence = create_fence(device, false)?;

        info!(tag = config.render_tag.0, "hybrid renderer ready");

        Ok(Self {
            trace,
            raster,
            composite,
            scene: SceneBuffers::new(),
            targets: HashMap::new(),
            descriptor_pool,
            command_pool,
            command_buffer,
            fence,
            config,
        })
    }

    /// Render every camera frame against the given scene.
    ///
    /// Cameras are rendered in order, one submission each, and the
    /// call returns once the last submission completed. Results stay
    /// readable via [`Self::read_target`] until the next render.
    ///
    /// # Safety
    /// The context must be the one the renderer was created with.
    pub unsafe fn render(
        &mut self,
        gpu: &GpuContext,
        scene: &SphereScene,
        objects: &[RenderObject],
        frames: &[CameraFrame],
        light_direction: Vec3,
    ) -> Result<()> {
        let device = gpu.device();
        let light = normalized_light(light_direction);

        // 1. Upload the sphere scene once for all cameras
        let grew = {
            let mut allocator = gpu.allocator().lock();
            self.scene.upload(&mut allocator, scene)?
        };

        // 2. Growth moved the buffers, so cached trace sets are stale
        if grew {
            self.rewrite_trace_sets(device)?;
        }

        // 3. Render each camera
        for frame in frames {
            if frame.viewport.width == 0 || frame.viewport.height == 0 {
                return Err(GpuError::InvalidState(format!(
                    "Camera {} has a zero sized viewport",
                    frame.id.0
                )));
            }

            self.prepare_targets(gpu, frame)?;
            self.render_camera(gpu, scene, objects, frame, light)?;
        }

        Ok(())
    }

    /// Read a camera's rendered image as tightly packed RGBA8 bytes.
    pub fn read_target(&self, id: CameraId) -> Result<Vec<u8>> {
        self.targets
            .get(&id)
            .ok_or_else(|| GpuError::InvalidState(format!("No targets for camera {}", id.0)))?
            .read_output()
    }

    /// Dimensions of a camera's cached target, if it has rendered.
    pub fn target_extent(&self, id: CameraId) -> Option<(u32, u32)> {
        self.targets
            .get(&id)
            .map(|targets| (targets.extent().width, targets.extent().height))
    }

    /// Number of cameras with cached targets.
    pub fn camera_count(&self) -> usize {
        self.targets.len()
    }

    /// Free a camera's targets. Releasing an unknown camera is a no-op.
    ///
    /// # Safety
    /// The context must be the one the renderer was created with.
    pub unsafe fn release_camera(&mut self, gpu: &GpuContext, id: CameraId) -> Result<()> {
        if let Some(mut targets) = self.targets.remove(&id) {
            gpu.wait_idle()?;
            let mut allocator = gpu.allocator().lock();
            targets.release(gpu.device(), &mut allocator, &self.descriptor_pool)?;
            debug!(camera = id.0, "released camera targets");
        }
        Ok(())
    }

    /// Destroy all GPU resources.
    ///
    /// # Safety
    /// The context must be the one the renderer was created with.
    pub unsafe fn destroy(mut self, gpu: &GpuContext) -> Result<()> {
        gpu.wait_idle()?;
        let device = gpu.device();

        {
            let mut allocator = gpu.allocator().lock();
            for (_, mut targets) in self.targets.drain() {
                targets.release(device, &mut allocator, &self.descriptor_pool)?;
            }
            self.scene.release(&mut allocator)?;
            self.raster.destroy(device, &mut allocator)?;
        }

        self.trace.destroy(device);
        self.composite.destroy(device);
        self.descriptor_pool.destroy(device);
        self.command_pool.destroy(device);
        device.destroy_fence(self.fence, None);

        Ok(())
    }

    /// Ensure a camera has targets matching its viewport, writing
    /// descriptors when they were created or resized.
    unsafe fn prepare_targets(&mut self, gpu: &GpuContext, frame: &CameraFrame) -> Result<()> {
        let device = gpu.device();
        let width = frame.viewport.width;
        let height = frame.viewport.height;

        if let Some(targets) = self.targets.get_mut(&frame.id) {
            if targets.matches(width, height) {
                return Ok(());
            }
            debug!(camera = frame.id.0, width, height, "resizing camera targets");
            let mut allocator = gpu.allocator().lock();
            targets.resize(device, &mut allocator, width, height)?;
        } else {
            debug!(camera = frame.id.0, width, height, "creating camera targets");
            let mut allocator = gpu.allocator().lock();
            let targets = CameraTargets::new(
                device,
                &mut allocator,
                &self.descriptor_pool,
                self.trace.descriptor_set_layout(),
                self.raster.descriptor_set_layout(),
                self.composite.descriptor_set_layout(),
                width,
                height,
            )?;
            drop(allocator);
            self.targets.insert(frame.id, targets);
        }

        let targets = self
            .targets
            .get(&frame.id)
            .ok_or_else(|| GpuError::InvalidState(format!("No targets for camera {}", frame.id.0)))?;
        let (centers, radii, colors) = self.scene_bindings()?;
        let trace_ubo = ubo(&targets.trace_ubo)?;
        let raster_ubo = ubo(&targets.raster_ubo)?;

        self.trace.write_descriptors(
            device,
            targets.trace_set,
            trace_ubo,
            centers,
            radii,
            colors,
            targets.overlay_view,
        );
        self.raster
            .write_descriptors(device, targets.raster_set, raster_ubo);
        self.composite
            .write_descriptors(device, targets.composite_set, targets.overlay_view);

        Ok(())
    }

    /// Record and submit one camera's frame, then wait for it.
    unsafe fn render_camera(
        &self,
        gpu: &GpuContext,
        scene: &SphereScene,
        objects: &[RenderObject],
        frame: &CameraFrame,
        light: Vec3,
    ) -> Result<()> {
        let device = gpu.device();
        let targets = self
            .targets
            .get(&frame.id)
            .ok_or_else(|| GpuError::InvalidState(format!("No targets for camera {}", frame.id.0)))?;

        let aspect = frame.viewport.aspect();
        targets.write_uniforms(
            &TraceUniforms::new(&frame.camera, aspect, light),
            &RasterUniforms::new(&frame.camera, aspect, light),
        )?;

        let plan = FramePlan::build(frame, scene, objects, self.config.render_tag);
        let (groups_x, groups_y) = plan.dispatch_groups();
        let extent = targets.extent();

        let overlay_image = image(&targets.overlay)?;
        let color_image = image(&targets.color)?;
        let depth_image = image(&targets.depth)?;

        begin_command_buffer(
            device,
            self.command_buffer,
            vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
        )?;

        let push = TracePushConstants::new(extent.width, extent.height, plan.sphere_count());
        self.trace.record(
            device,
            self.command_buffer,
            targets.trace_set,
            &push,
            overlay_image,
            groups_x,
            groups_y,
        );
        self.raster.record(
            device,
            self.command_buffer,
            targets.raster_set,
            color_image,
            targets.color_view,
            depth_image,
            targets.depth_view,
            extent,
            &plan,
            objects,
        )?;
        self.composite.record(
            device,
            self.command_buffer,
            targets.composite_set,
            color_image,
            targets.color_view,
            overlay_image,
            extent,
        );
        targets.record_readback(device, self.command_buffer)?;

        end_command_buffer(device, self.command_buffer)?;

        submit_command_buffers(device, gpu.queue(), &[self.command_buffer], self.fence)?;
        wait_for_fence(device, self.fence, u64::MAX)?;
        reset_fence(device, self.fence)?;

        Ok(())
    }

    /// Rewrite the trace descriptor set of every cached camera.
    unsafe fn rewrite_trace_sets(&self, device: &ash::Device) -> Result<()> {
        let (centers, radii, colors) = self.scene_bindings()?;

        for targets in self.targets.values() {
            self.trace.write_descriptors(
                device,
                targets.trace_set,
                ubo(&targets.trace_ubo)?,
                centers,
                radii,
                colors,
                targets.overlay_view,
            );
        }

        Ok(())
    }

    fn scene_bindings(&self) -> Result<(&GpuBuffer, &GpuBuffer, &GpuBuffer)> {
        match (self.scene.centers(), self.scene.radii(), self.scene.colors()) {
            (Some(centers), Some(radii), Some(colors)) => Ok((centers, radii, colors)),
            _ => Err(GpuError::InvalidState(
                "Scene buffers not allocated".to_string(),
            )),
        }
    }
}

fn ubo(buffer: &Option<GpuBuffer>) -> Result<&GpuBuffer> {
    buffer
        .as_ref()
        .ok_or_else(|| GpuError::InvalidState("Uniform buffer released".to_string()))
}

fn image(image: &Option<glint_gpu::GpuImage>) -> Result<vk::Image> {
    image
        .as_ref()
        .map(|image| image.image)
        .ok_or_else(|| GpuError::InvalidState("Render target released".to_string()))
}

/// Unit light vector, falling back to straight down lighting ("up"
/// toward the light) when the input cannot be normalized.
fn normalized_light(light: Vec3) -> Vec3 {
    light.try_normalize().unwrap_or(Vec3::Y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn default_config_draws_opaque_lit() {
        let config = RendererConfig::default();
        assert_eq!(config.render_tag, RenderTag::OPAQUE_LIT);
    }

    #[test]
    fn zero_light_falls_back_to_up() {
        assert_eq!(normalized_light(Vec3::ZERO), Vec3::Y);
    }

    #[test]
    fn light_is_normalized() {
        let light = normalized_light(Vec3::new(0.0, 3.0, 4.0));
        assert_relative_eq!(light.length(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(light.y, 0.6, epsilon = 1e-6);
        assert_relative_eq!(light.z, 0.8, epsilon = 1e-6);
    }
}
