//! Composite pass.
//!
//! Fullscreen triangle that samples the trace overlay and alpha
//! blends it over the raster output. Overlay alpha is coverage, so
//! traced spheres replace the color target where they hit and leave
//! it untouched where they miss.

use ash::vk;
use glint_gpu::{
    write_sampled_image, BlendMode, DescriptorSetLayoutBuilder, GraphicsPipeline,
    GraphicsPipelineConfig, Result,
};

use crate::target::{color_subresource_range, COLOR_FORMAT};

/// Fullscreen blend of the trace overlay onto the color target.
pub struct CompositePass {
    descriptor_set_layout: vk::DescriptorSetLayout,
    sampler: vk::Sampler,
    pipeline: GraphicsPipeline,
}

impl CompositePass {
    /// Create the composite pipeline.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(device: &ash::Device) -> Result<Self> {
        // 1. Create descriptor set layout
        let descriptor_set_layout = DescriptorSetLayoutBuilder::new()
            .sampled_image(0, vk::ShaderStageFlags::FRAGMENT)
            .build(device)?;

        // 2. Create sampler. The overlay matches the target pixel for
        // pixel, so nearest sampling is exact.
        let sampler_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::NEAREST)
            .min_filter(vk::Filter::NEAREST)
            .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
            .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE);
        let sampler = device.create_sampler(&sampler_info, None)?;

        // 3. Create alpha blended fullscreen pipeline, no depth
        let config = GraphicsPipelineConfig {
            vertex_shader: glint_shaders::composite_vert_shader().to_vec(),
            fragment_shader: glint_shaders::composite_frag_shader().to_vec(),
            cull_mode: vk::CullModeFlags::NONE,
            depth_test: false,
            depth_write: false,
            blend: BlendMode::Alpha,
            color_formats: vec![COLOR_FORMAT],
            depth_format: None,
            ..GraphicsPipelineConfig::default()
        };
        let pipeline = GraphicsPipeline::new(device, &config, &[descriptor_set_layout], &[])?;

        Ok(Self {
            descriptor_set_layout,
            sampler,
            pipeline,
        })
    }

    pub fn descriptor_set_layout(&self) -> vk::DescriptorSetLayout {
        self.descriptor_set_layout
    }

    /// Point a camera's composite descriptor set at its overlay.
    ///
    /// # Safety
    /// All handles must be valid and not in use by in-flight work.
    pub unsafe fn write_descriptors(
        &self,
        device: &ash::Device,
        set: vk::DescriptorSet,
        overlay_view: vk::ImageView,
    ) {
        write_sampled_image(
            device,
            set,
            0,
            overlay_view,
            self.sampler,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        );
    }

    /// Record the overlay blend.
    ///
    /// # Safety
    /// Must be recorded after the trace dispatch and the raster pass
    /// in the same command buffer, outside a rendering scope.
    pub unsafe fn record(
        &self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        set: vk::DescriptorSet,
        color_image: vk::Image,
        color_view: vk::ImageView,
        overlay_image: vk::Image,
        extent: vk::Extent2D,
    ) {
        // 1. Overlay readable by the fragment shader, raster writes
        // visible to the blend (it reads the destination)
        let barriers = [
            vk::ImageMemoryBarrier2::default()
                .src_stage_mask(vk::PipelineStageFlags2::COMPUTE_SHADER)
                .src_access_mask(vk::AccessFlags2::SHADER_STORAGE_WRITE)
                .dst_stage_mask(vk::PipelineStageFlags2::FRAGMENT_SHADER)
                .dst_access_mask(vk::AccessFlags2::SHADER_SAMPLED_READ)
                .old_layout(vk::ImageLayout::GENERAL)
                .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .image(overlay_image)
                .subresource_range(color_subresource_range()),
            vk::ImageMemoryBarrier2::default()
                .src_stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
                .src_access_mask(vk::AccessFlags2::COLOR_ATTACHMENT_WRITE)
                .dst_stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
                .dst_access_mask(
                    vk::AccessFlags2::COLOR_ATTACHMENT_READ
                        | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
                )
                .old_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .new_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .image(color_image)
                .subresource_range(color_subresource_range()),
        ];
        let dependency = vk::DependencyInfo::default().image_memory_barriers(&barriers);
        device.cmd_pipeline_barrier2(cmd, &dependency);

        // 2. Blend over the existing color
        let color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(color_view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::LOAD)
            .store_op(vk::AttachmentStoreOp::STORE);

        let rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent,
            })
            .layer_count(1)
            .color_attachments(std::slice::from_ref(&color_attachment));

        device.cmd_begin_rendering(cmd, &rendering_info);

        // Standard viewport: overlay row zero is the top of the image,
        // matching the flipped geometry passes.
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        device.cmd_set_viewport(cmd, 0, &[viewport]);
        device.cmd_set_scissor(
            cmd,
            0,
            &[vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent,
            }],
        );

        device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline.pipeline);
        device.cmd_bind_descriptor_sets(
            cmd,
            vk::PipelineBindPoint::GRAPHICS,
            self.pipeline.layout,
            0,
            &[set],
            &[],
        );
        device.cmd_draw(cmd, 3, 1, 0, 0);

        device.cmd_end_rendering(cmd);
    }

    /// Destroy the pipeline, sampler, and layout.
    ///
    /// # Safety
    /// The device must be valid and the pipeline must not be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        self.pipeline.destroy(device);
        device.destroy_sampler(self.sampler, None);
        device.destroy_descriptor_set_layout(self.descriptor_set_layout, None);
    }
}
