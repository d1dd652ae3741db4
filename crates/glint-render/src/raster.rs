//! Raster pass for the sky gradient and opaque meshes.
//!
//! One dynamic rendering scope covers the clear, the optional sky
//! draw, and the opaque draws. The viewport is flipped (negative
//! height) so world +y points up in the stored image; both pipelines
//! disable culling because the flip inverts triangle winding.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glint_core::{MeshKind, RenderObject, Vertex};
use glint_gpu::{
    DescriptorSetLayoutBuilder, GpuAllocator, GpuBuffer, GpuError, GraphicsPipeline,
    GraphicsPipelineConfig, Result,
};
use gpu_allocator::MemoryLocation;

use crate::plan::{ClearFlags, FramePlan};
use crate::target::{
    color_subresource_range, depth_subresource_range, COLOR_FORMAT, DEPTH_FORMAT,
};

/// Per-object push constants for the opaque pipeline.
///
/// Must match the `ObjectPushConstants` block in `opaque.vert`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ObjectPushConstants {
    /// Model to world transform.
    pub model: [[f32; 4]; 4],
    /// rgb: material base color.
    pub base_color: [f32; 4],
}

impl ObjectPushConstants {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn new(object: &RenderObject) -> Self {
        let color = object.material.base_color;
        Self {
            model: object.transform.to_cols_array_2d(),
            base_color: [color.x, color.y, color.z, 1.0],
        }
    }
}

/// Graphics pipelines for the geometry portion of a frame.
pub struct RasterPass {
    descriptor_set_layout: vk::DescriptorSetLayout,
    sky_pipeline: GraphicsPipeline,
    opaque_pipeline: GraphicsPipeline,
    quad_vertices: Option<GpuBuffer>,
    quad_vertex_count: u32,
    cube_vertices: Option<GpuBuffer>,
    cube_vertex_count: u32,
}

impl RasterPass {
    /// Create the sky and opaque pipelines and the shared mesh
    /// vertex buffers.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(device: &ash::Device, allocator: &mut GpuAllocator) -> Result<Self> {
        // 1. Create descriptor set layout
        let descriptor_set_layout = DescriptorSetLayoutBuilder::new()
            .uniform_buffer(
                0,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            )
            .build(device)?;

        // Both pipelines declare the same push range so descriptor
        // bindings stay valid across the pipeline switch.
        let push_constant_range = vk::PushConstantRange::default()
            .stage_flags(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)
            .offset(0)
            .size(ObjectPushConstants::SIZE as u32);

        // 2. Create sky pipeline (fullscreen triangle, no depth)
        let sky_config = GraphicsPipelineConfig {
            vertex_shader: glint_shaders::sky_vert_shader().to_vec(),
            fragment_shader: glint_shaders::sky_frag_shader().to_vec(),
            cull_mode: vk::CullModeFlags::NONE,
            depth_test: false,
            depth_write: false,
            color_formats: vec![COLOR_FORMAT],
            depth_format: Some(DEPTH_FORMAT),
            ..GraphicsPipelineConfig::default()
        };
        let sky_pipeline = GraphicsPipeline::new(
            device,
            &sky_config,
            &[descriptor_set_layout],
            std::slice::from_ref(&push_constant_range),
        )?;

        // 3. Create opaque pipeline
        let vertex_bindings = vec![vk::VertexInputBindingDescription::default()
            .binding(0)
            .stride(Vertex::SIZE as u32)
            .input_rate(vk::VertexInputRate::VERTEX)];
        let vertex_attributes = vec![
            vk::VertexInputAttributeDescription::default()
                .location(0)
                .binding(0)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(0),
            vk::VertexInputAttributeDescription::default()
                .location(1)
                .binding(0)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(12),
        ];

        let opaque_config = GraphicsPipelineConfig {
            vertex_shader: glint_shaders::opaque_vert_shader().to_vec(),
            fragment_shader: glint_shaders::opaque_frag_shader().to_vec(),
            vertex_bindings,
            vertex_attributes,
            cull_mode: vk::CullModeFlags::NONE,
            color_formats: vec![COLOR_FORMAT],
            depth_format: Some(DEPTH_FORMAT),
            ..GraphicsPipelineConfig::default()
        };
        let opaque_pipeline = GraphicsPipeline::new(
            device,
            &opaque_config,
            &[descriptor_set_layout],
            std::slice::from_ref(&push_constant_range),
        )?;

        // 4. Upload the built-in mesh vertex buffers
        let (quad_vertices, quad_vertex_count) =
            upload_mesh(allocator, MeshKind::Quad, "quad_vertices")?;
        let (cube_vertices, cube_vertex_count) =
            upload_mesh(allocator, MeshKind::Cube, "cube_vertices")?;

        Ok(Self {
            descriptor_set_layout,
            sky_pipeline,
            opaque_pipeline,
            quad_vertices: Some(quad_vertices),
            quad_vertex_count,
            cube_vertices: Some(cube_vertices),
            cube_vertex_count,
        })
    }

    pub fn descriptor_set_layout(&self) -> vk::DescriptorSetLayout {
        self.descriptor_set_layout
    }

    /// Point a camera's raster descriptor set at its uniform buffer.
    ///
    /// # Safety
    /// All handles must be valid and not in use by in-flight work.
    pub unsafe fn write_descriptors(
        &self,
        device: &ash::Device,
        set: vk::DescriptorSet,
        uniforms: &GpuBuffer,
    ) {
        glint_gpu::write_uniform_buffer(device, set, 0, uniforms.buffer, 0, uniforms.size);
    }

    /// Record the clear, sky, and opaque draws.
    ///
    /// # Safety
    /// The command buffer must be in the recording state, outside a
    /// rendering scope.
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn record(
        &self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        set: vk::DescriptorSet,
        color_image: vk::Image,
        color_view: vk::ImageView,
        depth_image: vk::Image,
        depth_view: vk::ImageView,
        extent: vk::Extent2D,
        plan: &FramePlan,
        objects: &[RenderObject],
    ) -> Result<()> {
        // 1. Attachments to their rendering layouts
        let barriers = [
            vk::ImageMemoryBarrier2::default()
                .src_stage_mask(vk::PipelineStageFlags2::TOP_OF_PIPE)
                .src_access_mask(vk::AccessFlags2::empty())
                .dst_stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
                .dst_access_mask(vk::AccessFlags2::COLOR_ATTACHMENT_WRITE)
                .old_layout(vk::ImageLayout::UNDEFINED)
                .new_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .image(color_image)
                .subresource_range(color_subresource_range()),
            vk::ImageMemoryBarrier2::default()
                .src_stage_mask(vk::PipelineStageFlags2::TOP_OF_PIPE)
                .src_access_mask(vk::AccessFlags2::empty())
                .dst_stage_mask(
                    vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS
                        | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
                )
                .dst_access_mask(vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE)
                .old_layout(vk::ImageLayout::UNDEFINED)
                .new_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
                .image(depth_image)
                .subresource_range(depth_subresource_range()),
        ];
        let dependency = vk::DependencyInfo::default().image_memory_barriers(&barriers);
        device.cmd_pipeline_barrier2(cmd, &dependency);

        // 2. One rendering scope for clear, sky, and opaque draws
        let clear_flags = plan.clear_flags();
        let clear_color = plan.clear_color();

        let color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(color_view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(load_op(clear_flags.contains(ClearFlags::COLOR)))
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: clear_color,
                },
            });

        let depth_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(depth_view)
            .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
            .load_op(load_op(clear_flags.contains(ClearFlags::DEPTH)))
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            });

        let rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent,
            })
            .layer_count(1)
            .color_attachments(std::slice::from_ref(&color_attachment))
            .depth_attachment(&depth_attachment);

        device.cmd_begin_rendering(cmd, &rendering_info);

        // Negative height flips clip y so world +y is up in the image.
        let viewport = vk::Viewport {
            x: 0.0,
            y: extent.height as f32,
            width: extent.width as f32,
            height: -(extent.height as f32),
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

        device.cmd_bind_descriptor_sets(
            cmd,
            vk::PipelineBindPoint::GRAPHICS,
            self.opaque_pipeline.layout,
            0,
            &[set],
            &[],
        );

        // 3. Sky gradient behind everything
        if plan.has_skybox() {
            device.cmd_bind_pipeline(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                self.sky_pipeline.pipeline,
            );
            device.cmd_draw(cmd, 3, 1, 0, 0);
        }

        // 4. Opaque objects, front to back
        device.cmd_bind_pipeline(
            cmd,
            vk::PipelineBindPoint::GRAPHICS,
            self.opaque_pipeline.pipeline,
        );

        for &index in plan.visible_indices() {
            let object = &objects[index];
            let (buffer, vertex_count) = self.vertex_buffer(object.mesh)?;

            device.cmd_bind_vertex_buffers(cmd, 0, &[buffer.buffer], &[0]);

            let push = ObjectPushConstants::new(object);
            device.cmd_push_constants(
                cmd,
                self.opaque_pipeline.layout,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                0,
                bytemuck::bytes_of(&push),
            );
            device.cmd_draw(cmd, vertex_count, 1, 0, 0);
        }

        device.cmd_end_rendering(cmd);

        Ok(())
    }

    /// Destroy the pipelines and free the mesh buffers.
    ///
    /// # Safety
    /// The device must be valid and the pipelines must not be in use.
    pub unsafe fn destroy(
        mut self,
        device: &ash::Device,
        allocator: &mut GpuAllocator,
    ) -> Result<()> {
        if let Some(mut buffer) = self.quad_vertices.take() {
            allocator.free_buffer(&mut buffer)?;
        }
        if let Some(mut buffer) = self.cube_vertices.take() {
            allocator.free_buffer(&mut buffer)?;
        }

        self.sky_pipeline.destroy(device);
        self.opaque_pipeline.destroy(device);
        device.destroy_descriptor_set_layout(self.descriptor_set_layout, None);

        Ok(())
    }

    fn vertex_buffer(&self, mesh: MeshKind) -> Result<(&GpuBuffer, u32)> {
        match mesh {
            MeshKind::Quad => self
                .quad_vertices
                .as_ref()
                .map(|buffer| (buffer, self.quad_vertex_count)),
            MeshKind::Cube => self
                .cube_vertices
                .as_ref()
                .map(|buffer| (buffer, self.cube_vertex_count)),
        }
        .ok_or_else(|| GpuError::InvalidState("Mesh vertex buffers released".to_string()))
    }
}

fn load_op(clear: bool) -> vk::AttachmentLoadOp {
    if clear {
        vk::AttachmentLoadOp::CLEAR
    } else {
        vk::AttachmentLoadOp::LOAD
    }
}

fn upload_mesh(
    allocator: &mut GpuAllocator,
    mesh: MeshKind,
    name: &str,
) -> Result<(GpuBuffer, u32)> {
    let vertices = mesh.vertices();
    let buffer = allocator.create_buffer(
        std::mem::size_of_val(vertices.as_slice()) as u64,
        vk::BufferUsageFlags::VERTEX_BUFFER,
        MemoryLocation::CpuToGpu,
        name,
    )?;
    buffer.write(&vertices)?;

    Ok((buffer, vertices.len() as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec3};
    use glint_core::Material;
    use std::mem::offset_of;

    #[test]
    fn object_push_constants_layout() {
        assert_eq!(offset_of!(ObjectPushConstants, model), 0);
        assert_eq!(offset_of!(ObjectPushConstants, base_color), 64);
        // Must fit the 128 byte push constant minimum every device guarantees.
        assert_eq!(ObjectPushConstants::SIZE, 80);
    }

    #[test]
    fn push_constants_capture_object_state() {
        let object = RenderObject::new(
            MeshKind::Cube,
            Material::opaque(Vec3::new(0.5, 0.25, 0.75)),
            Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)),
        );
        let push = ObjectPushConstants::new(&object);

        assert_eq!(push.base_color, [0.5, 0.25, 0.75, 1.0]);
        // Translation lives in the fourth column.
        assert_eq!(push.model[3][0], 1.0);
        assert_eq!(push.model[3][1], 2.0);
        assert_eq!(push.model[3][2], 3.0);
    }
}
