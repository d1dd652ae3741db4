//! Sphere trace compute pass.
//!
//! Dispatches `sphere_trace.comp` over the camera's viewport. The
//! kernel writes hit color with coverage alpha into the float overlay,
//! which the composite pass later blends over the raster output.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glint_gpu::{
    write_storage_buffer, write_storage_image, write_uniform_buffer, ComputePipeline,
    DescriptorSetLayoutBuilder, GpuBuffer, Result,
};

use crate::target::color_subresource_range;

/// Push constants for the trace kernel.
///
/// Must match the `TracePushConstants` block in `sphere_trace.comp`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct TracePushConstants {
    pub texture_width: u32,
    pub texture_height: u32,
    pub sphere_count: u32,
    pub _padding: u32,
}

impl TracePushConstants {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub const fn new(texture_width: u32, texture_height: u32, sphere_count: u32) -> Self {
        Self {
            texture_width,
            texture_height,
            sphere_count,
            _padding: 0,
        }
    }
}

/// Compute pipeline that ray traces the sphere scene.
pub struct SphereTracePass {
    descriptor_set_layout: vk::DescriptorSetLayout,
    pipeline: ComputePipeline,
}

impl SphereTracePass {
    /// Create the trace pipeline.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(device: &ash::Device) -> Result<Self> {
        // 1. Create descriptor set layout
        let descriptor_set_layout = DescriptorSetLayoutBuilder::new()
            .uniform_buffer(0, vk::ShaderStageFlags::COMPUTE)
            .storage_buffer(1, vk::ShaderStageFlags::COMPUTE)
            .storage_buffer(2, vk::ShaderStageFlags::COMPUTE)
            .storage_buffer(3, vk::ShaderStageFlags::COMPUTE)
            .storage_image(4, vk::ShaderStageFlags::COMPUTE)
            .build(device)?;

        // 2. Create compute pipeline
        let push_constant_range = vk::PushConstantRange::default()
            .stage_flags(vk::ShaderStageFlags::COMPUTE)
            .offset(0)
            .size(TracePushConstants::SIZE as u32);

        let pipeline = ComputePipeline::new(
            device,
            glint_shaders::sphere_trace_shader(),
            &[descriptor_set_layout],
            &[push_constant_range],
        )?;

        Ok(Self {
            descriptor_set_layout,
            pipeline,
        })
    }

    pub fn descriptor_set_layout(&self) -> vk::DescriptorSetLayout {
        self.descriptor_set_layout
    }

    /// Point a camera's trace descriptor set at the current scene
    /// buffers and overlay image.
    ///
    /// # Safety
    /// All handles must be valid and not in use by in-flight work.
    pub unsafe fn write_descriptors(
        &self,
        device: &ash::Device,
        set: vk::DescriptorSet,
        uniforms: &GpuBuffer,
        centers: &GpuBuffer,
        radii: &GpuBuffer,
        colors: &GpuBuffer,
        overlay_view: vk::ImageView,
    ) {
        write_uniform_buffer(device, set, 0, uniforms.buffer, 0, uniforms.size);
        write_storage_buffer(device, set, 1, centers.buffer, 0, centers.size);
        write_storage_buffer(device, set, 2, radii.buffer, 0, radii.size);
        write_storage_buffer(device, set, 3, colors.buffer, 0, colors.size);
        write_storage_image(device, set, 4, overlay_view, vk::ImageLayout::GENERAL);
    }

    /// Record the trace dispatch.
    ///
    /// # Safety
    /// The command buffer must be in the recording state and the
    /// descriptor set must have been written for this frame's overlay.
    pub unsafe fn record(
        &self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        set: vk::DescriptorSet,
        push_constants: &TracePushConstants,
        overlay_image: vk::Image,
        groups_x: u32,
        groups_y: u32,
    ) {
        // Overlay to GENERAL for storage writes. Old contents are
        // discarded; the kernel writes every pixel.
        let barrier = vk::ImageMemoryBarrier2::default()
            .src_stage_mask(vk::PipelineStageFlags2::TOP_OF_PIPE)
            .src_access_mask(vk::AccessFlags2::empty())
            .dst_stage_mask(vk::PipelineStageFlags2::COMPUTE_SHADER)
            .dst_access_mask(vk::AccessFlags2::SHADER_STORAGE_WRITE)
            .old_layout(vk::ImageLayout::UNDEFINED)
            .new_layout(vk::ImageLayout::GENERAL)
            .image(overlay_image)
            .subresource_range(color_subresource_range());

        let dependency =
            vk::DependencyInfo::default().image_memory_barriers(std::slice::from_ref(&barrier));
        device.cmd_pipeline_barrier2(cmd, &dependency);

        device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::COMPUTE, self.pipeline.pipeline);
        device.cmd_bind_descriptor_sets(
            cmd,
            vk::PipelineBindPoint::COMPUTE,
            self.pipeline.layout,
            0,
            &[set],
            &[],
        );
        device.cmd_push_constants(
            cmd,
            self.pipeline.layout,
            vk::ShaderStageFlags::COMPUTE,
            0,
            bytemuck::bytes_of(push_constants),
        );
        device.cmd_dispatch(cmd, groups_x, groups_y, 1);
    }

    /// Destroy the pipeline and layout.
    ///
    /// # Safety
    /// The device must be valid and the pipeline must not be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        self.pipeline.destroy(device);
        device.destroy_descriptor_set_layout(self.descriptor_set_layout, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::offset_of;

    #[test]
    fn push_constants_layout() {
        assert_eq!(offset_of!(TracePushConstants, texture_width), 0);
        assert_eq!(offset_of!(TracePushConstants, texture_height), 4);
        assert_eq!(offset_of!(TracePushConstants, sphere_count), 8);
        assert_eq!(TracePushConstants::SIZE, 16);
    }

    #[test]
    fn push_constants_zero_padding() {
        let push = TracePushConstants::new(640, 480, 7);
        assert_eq!(push._padding, 0);
        assert_eq!(bytemuck::bytes_of(&push).len(), 16);
    }
}
