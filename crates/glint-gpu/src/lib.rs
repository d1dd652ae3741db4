//! Vulkan abstraction layer for the Glint renderer.
//!
//! This crate provides:
//! - Headless Vulkan instance and device management
//! - GPU capability detection
//! - Memory allocation via gpu-allocator
//! - Pipeline, descriptor, and command buffer helpers

pub mod capabilities;
pub mod command;
pub mod context;
pub mod descriptors;
pub mod error;
pub mod instance;
pub mod memory;
pub mod pipeline;
pub mod sync;

pub use capabilities::{GpuCapabilities, GpuVendor};
pub use command::{begin_command_buffer, end_command_buffer, submit_command_buffers, CommandPool};
pub use context::{GpuContext, GpuContextBuilder};
pub use descriptors::{
    write_sampled_image, write_storage_buffer, write_storage_image, write_uniform_buffer,
    DescriptorPool, DescriptorSetLayoutBuilder,
};
pub use error::{GpuError, Result};
pub use memory::{GpuAllocator, GpuBuffer, GpuImage};
pub use pipeline::{BlendMode, ComputePipeline, GraphicsPipeline, GraphicsPipelineConfig};
pub use sync::{create_fence, reset_fence, wait_for_fence};
