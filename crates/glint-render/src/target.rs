//! Per-camera render targets.
//!
//! Each camera owns a color target, a depth target, the float overlay
//! the trace kernel writes, a host-visible readback buffer, and its
//! uniform buffers and descriptor sets. Targets are cached by
//! [`CameraId`](crate::CameraId) and recreated when the viewport
//! changes; descriptor sets and uniform buffers survive a resize.

use ash::vk;
use glint_gpu::{DescriptorPool, GpuAllocator, GpuBuffer, GpuError, GpuImage, Result};
use gpu_allocator::MemoryLocation;

use crate::camera::{RasterUniforms, TraceUniforms};

/// Format of the color target. Blendable and byte-addressable, so the
/// composite pass and the readback path both work on it.
pub const COLOR_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

/// Format of the depth target.
pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Format of the trace overlay. Float so coverage alpha survives
/// untouched between the kernel and the composite pass.
pub const OVERLAY_FORMAT: vk::Format = vk::Format::R32G32B32A32_SFLOAT;

const BYTES_PER_PIXEL: u64 = 4;

struct Attachments {
    color: GpuImage,
    color_view: vk::ImageView,
    depth: GpuImage,
    depth_view: vk::ImageView,
    overlay: GpuImage,
    overlay_view: vk::ImageView,
    readback: GpuBuffer,
}

/// GPU resources backing one camera.
pub struct CameraTargets {
    pub(crate) extent: vk::Extent2D,
    pub(crate) color: Option<GpuImage>,
    pub(crate) color_view: vk::ImageView,
    pub(crate) depth: Option<GpuImage>,
    pub(crate) depth_view: vk::ImageView,
    pub(crate) overlay: Option<GpuImage>,
    pub(crate) overlay_view: vk::ImageView,
    pub(crate) readback: Option<GpuBuffer>,
    pub(crate) trace_ubo: Option<GpuBuffer>,
    pub(crate) raster_ubo: Option<GpuBuffer>,
    pub(crate) trace_set: vk::DescriptorSet,
    pub(crate) raster_set: vk::DescriptorSet,
    pub(crate) composite_set: vk::DescriptorSet,
}

impl CameraTargets {
    /// Create targets for a camera.
    ///
    /// # Safety
    /// The device must be valid and the layouts must match the pass
    /// pipelines this camera will be recorded with.
    pub unsafe fn new(
        device: &ash::Device,
        allocator: &mut GpuAllocator,
        pool: &DescriptorPool,
        trace_layout: vk::DescriptorSetLayout,
        raster_layout: vk::DescriptorSetLayout,
        composite_layout: vk::DescriptorSetLayout,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        // 1. Allocate one descriptor set per pass
        let sets = pool.allocate(device, &[trace_layout, raster_layout, composite_layout])?;

        // 2. Create uniform buffers
        let trace_ubo = allocator.create_buffer(
            TraceUniforms::SIZE as u64,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            MemoryLocation::CpuToGpu,
            "trace_uniforms",
        )?;
        let raster_ubo = allocator.create_buffer(
            RasterUniforms::SIZE as u64,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            MemoryLocation::CpuToGpu,
            "raster_uniforms",
        )?;

        // 3. Create the sized attachments and readback buffer
        let attachments = Self::create_attachments(device, allocator, width, height)?;

        Ok(Self {
            extent: vk::Extent2D { width, height },
            color: Some(attachments.color),
            color_view: attachments.color_view,
            depth: Some(attachments.depth),
            depth_view: attachments.depth_view,
            overlay: Some(attachments.overlay),
            overlay_view: attachments.overlay_view,
            readback: Some(attachments.readback),
            trace_ubo: Some(trace_ubo),
            raster_ubo: Some(raster_ubo),
            trace_set: sets[0],
            raster_set: sets[1],
            composite_set: sets[2],
        })
    }

    /// Current target dimensions.
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Whether the targets already match the given viewport.
    pub fn matches(&self, width: u32, height: u32) -> bool {
        self.extent.width == width && self.extent.height == height
    }

    /// Recreate the sized attachments for a new viewport.
    ///
    /// Descriptor sets and uniform buffers are kept; the caller must
    /// rewrite image descriptors afterwards since the views changed.
    ///
    /// # Safety
    /// The device must be valid and the targets must not be in use.
    pub unsafe fn resize(
        &mut self,
        device: &ash::Device,
        allocator: &mut GpuAllocator,
        width: u32,
        height: u32,
    ) -> Result<()> {
        self.release_attachments(device, allocator)?;

        let attachments = Self::create_attachments(device, allocator, width, height)?;
        self.extent = vk::Extent2D { width, height };
        self.color = Some(attachments.color);
        self.color_view = attachments.color_view;
        self.depth = Some(attachments.depth);
        self.depth_view = attachments.depth_view;
        self.overlay = Some(attachments.overlay);
        self.overlay_view = attachments.overlay_view;
        self.readback = Some(attachments.readback);

        Ok(())
    }

    /// Write the per-camera uniform buffers.
    pub(crate) fn write_uniforms(
        &self,
        trace: &TraceUniforms,
        raster: &RasterUniforms,
    ) -> Result<()> {
        self.trace_ubo
            .as_ref()
            .ok_or_else(|| GpuError::InvalidState("Trace uniforms released".to_string()))?
            .write(std::slice::from_ref(trace))?;
        self.raster_ubo
            .as_ref()
            .ok_or_else(|| GpuError::InvalidState("Raster uniforms released".to_string()))?
            .write(std::slice::from_ref(raster))?;
        Ok(())
    }

    /// Record the color target copy into the readback buffer.
    ///
    /// # Safety
    /// Must be recorded after the composite pass in the same command
    /// buffer.
    pub unsafe fn record_readback(
        &self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
    ) -> Result<()> {
        let color = self
            .color
            .as_ref()
            .ok_or_else(|| GpuError::InvalidState("Color target released".to_string()))?;
        let readback = self
            .readback
            .as_ref()
            .ok_or_else(|| GpuError::InvalidState("Readback buffer released".to_string()))?;

        let barrier = vk::ImageMemoryBarrier2::default()
            .src_stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags2::COLOR_ATTACHMENT_WRITE)
            .dst_stage_mask(vk::PipelineStageFlags2::COPY)
            .dst_access_mask(vk::AccessFlags2::TRANSFER_READ)
            .old_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .new_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
            .image(color.image)
            .subresource_range(color_subresource_range());

        let dependency =
            vk::DependencyInfo::default().image_memory_barriers(std::slice::from_ref(&barrier));
        device.cmd_pipeline_barrier2(cmd, &dependency);

        let region = vk::BufferImageCopy::default()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(
                vk::ImageSubresourceLayers::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .mip_level(0)
                    .base_array_layer(0)
                    .layer_count(1),
            )
            .image_offset(vk::Offset3D::default())
            .image_extent(vk::Extent3D {
                width: self.extent.width,
                height: self.extent.height,
                depth: 1,
            });

        device.cmd_copy_image_to_buffer(
            cmd,
            color.image,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            readback.buffer,
            &[region],
        );

        Ok(())
    }

    /// Read the rendered image as tightly packed RGBA8 bytes.
    ///
    /// Valid after the submission that recorded the readback has
    /// completed.
    pub fn read_output(&self) -> Result<Vec<u8>> {
        let readback = self
            .readback
            .as_ref()
            .ok_or_else(|| GpuError::InvalidState("Readback buffer released".to_string()))?;
        let ptr = readback
            .mapped_ptr()
            .ok_or_else(|| GpuError::InvalidState("Readback buffer not mapped".to_string()))?;

        let size = (u64::from(self.extent.width) * u64::from(self.extent.height)
            * BYTES_PER_PIXEL) as usize;
        let data = unsafe { std::slice::from_raw_parts(ptr, size) };
        Ok(data.to_vec())
    }

    /// Free all resources. Safe to call more than once.
    ///
    /// # Safety
    /// The device must be valid and the targets must not be in use.
    pub unsafe fn release(
        &mut self,
        device: &ash::Device,
        allocator: &mut GpuAllocator,
        pool: &DescriptorPool,
    ) -> Result<()> {
        self.release_attachments(device, allocator)?;

        if let Some(mut buffer) = self.trace_ubo.take() {
            allocator.free_buffer(&mut buffer)?;
        }
        if let Some(mut buffer) = self.raster_ubo.take() {
            allocator.free_buffer(&mut buffer)?;
        }

        if self.trace_set != vk::DescriptorSet::null() {
            pool.free(
                device,
                &[self.trace_set, self.raster_set, self.composite_set],
            )?;
            self.trace_set = vk::DescriptorSet::null();
            self.raster_set = vk::DescriptorSet::null();
            self.composite_set = vk::DescriptorSet::null();
        }

        Ok(())
    }

    unsafe fn release_attachments(
        &mut self,
        device: &ash::Device,
        allocator: &mut GpuAllocator,
    ) -> Result<()> {
        if self.color_view != vk::ImageView::null() {
            device.destroy_image_view(self.color_view, None);
            self.color_view = vk::ImageView::null();
        }
        if self.depth_view != vk::ImageView::null() {
            device.destroy_image_view(self.depth_view, None);
            self.depth_view = vk::ImageView::null();
        }
        if self.overlay_view != vk::ImageView::null() {
            device.destroy_image_view(self.overlay_view, None);
            self.overlay_view = vk::ImageView::null();
        }

        if let Some(mut image) = self.color.take() {
            allocator.free_image(&mut image)?;
        }
        if let Some(mut image) = self.depth.take() {
            allocator.free_image(&mut image)?;
        }
        if let Some(mut image) = self.overlay.take() {
            allocator.free_image(&mut image)?;
        }
        if let Some(mut buffer) = self.readback.take() {
            allocator.free_buffer(&mut buffer)?;
        }

        Ok(())
    }

    unsafe fn create_attachments(
        device: &ash::Device,
        allocator: &mut GpuAllocator,
        width: u32,
        height: u32,
    ) -> Result<Attachments> {
        let color = create_image_2d(
            allocator,
            width,
            height,
            COLOR_FORMAT,
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_SRC,
            "camera_color",
        )?;
        let color_view = create_view(device, color.image, COLOR_FORMAT, vk::ImageAspectFlags::COLOR)?;

        let depth = create_image_2d(
            allocator,
            width,
            height,
            DEPTH_FORMAT,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            "camera_depth",
        )?;
        let depth_view = create_view(device, depth.image, DEPTH_FORMAT, vk::ImageAspectFlags::DEPTH)?;

        let overlay = create_image_2d(
            allocator,
            width,
            height,
            OVERLAY_FORMAT,
            vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::SAMPLED,
            "trace_overlay",
        )?;
        let overlay_view =
            create_view(device, overlay.image, OVERLAY_FORMAT, vk::ImageAspectFlags::COLOR)?;

        let readback = allocator.create_buffer(
            u64::from(width) * u64::from(height) * BYTES_PER_PIXEL,
            vk::BufferUsageFlags::TRANSFER_DST,
            MemoryLocation::GpuToCpu,
            "camera_readback",
        )?;

        Ok(Attachments {
            color,
            color_view,
            depth,
            depth_view,
            overlay,
            overlay_view,
            readback,
        })
    }
}

pub(crate) fn color_subresource_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange::default()
        .aspect_mask(vk::ImageAspectFlags::COLOR)
        .base_mip_level(0)
        .level_count(1)
        .base_array_layer(0)
        .layer_count(1)
}

pub(crate) fn depth_subresource_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange::default()
        .aspect_mask(vk::ImageAspectFlags::DEPTH)
        .base_mip_level(0)
        .level_count(1)
        .base_array_layer(0)
        .layer_count(1)
}

fn create_image_2d(
    allocator: &mut GpuAllocator,
    width: u32,
    height: u32,
    format: vk::Format,
    usage: vk::ImageUsageFlags,
    name: &str,
) -> Result<GpuImage> {
    let create_info = vk::ImageCreateInfo::default()
        .image_type(vk::ImageType::TYPE_2D)
        .format(format)
        .extent(vk::Extent3D {
            width,
            height,
            depth: 1,
        })
        .mip_levels(1)
        .array_layers(1)
        .samples(vk::SampleCountFlags::TYPE_1)
        .tiling(vk::ImageTiling::OPTIMAL)
        .usage(usage)
        .sharing_mode(vk::SharingMode::EXCLUSIVE)
        .initial_layout(vk::ImageLayout::UNDEFINED);

    allocator.create_image(&create_info, MemoryLocation::GpuOnly, name)
}

unsafe fn create_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
    aspect: vk::ImageAspectFlags,
) -> Result<vk::ImageView> {
    let range = vk::ImageSubresourceRange::default()
        .aspect_mask(aspect)
        .base_mip_level(0)
        .level_count(1)
        .base_array_layer(0)
        .layer_count(1);

    let create_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .subresource_range(range);

    let view = device.create_image_view(&create_info, None)?;
    Ok(view)
}
