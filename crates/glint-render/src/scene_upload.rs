//! Sphere scene upload.
//!
//! The trace kernel reads the scene as three parallel storage buffers
//! (centers, radii, colors). Buffers are allocated lazily on first
//! upload and grow geometrically, so a scene that stays the same size
//! never reallocates mid-run.

use ash::vk;
use glint_core::{GpuVec3, SphereScene};
use glint_gpu::{GpuAllocator, GpuBuffer, GpuError, Result};
use gpu_allocator::MemoryLocation;
use tracing::{debug, warn};

const CENTER_STRIDE: u64 = GpuVec3::SIZE as u64;
const RADIUS_STRIDE: u64 = std::mem::size_of::<f32>() as u64;
const COLOR_STRIDE: u64 = GpuVec3::SIZE as u64;

/// GPU-resident copy of a [`SphereScene`].
#[derive(Default)]
pub struct SceneBuffers {
    centers: Option<GpuBuffer>,
    radii: Option<GpuBuffer>,
    colors: Option<GpuBuffer>,
    /// Allocated capacity in spheres.
    capacity: usize,
}

impl SceneBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capacity in spheres, zero before the first upload.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn centers(&self) -> Option<&GpuBuffer> {
        self.centers.as_ref()
    }

    pub fn radii(&self) -> Option<&GpuBuffer> {
        self.radii.as_ref()
    }

    pub fn colors(&self) -> Option<&GpuBuffer> {
        self.colors.as_ref()
    }

    /// Write the scene into the buffers, reallocating if needed.
    ///
    /// Returns `true` when buffers were (re)allocated, in which case
    /// any descriptor sets referencing them must be rewritten. An empty
    /// scene still allocates one-sphere buffers so descriptors always
    /// have something valid to bind.
    pub fn upload(&mut self, allocator: &mut GpuAllocator, scene: &SphereScene) -> Result<bool> {
        let required = scene.len();
        let grew = if required > self.capacity || self.centers.is_none() {
            self.reallocate(allocator, required)?;
            true
        } else {
            false
        };

        if !scene.is_empty() {
            let centers: Vec<GpuVec3> =
                scene.centers().iter().copied().map(GpuVec3::from).collect();
            let colors: Vec<GpuVec3> = scene.colors().iter().copied().map(GpuVec3::from).collect();

            self.centers
                .as_ref()
                .ok_or_else(|| GpuError::InvalidState("Scene buffers not allocated".to_string()))?
                .write(&centers)?;
            self.radii
                .as_ref()
                .ok_or_else(|| GpuError::InvalidState("Scene buffers not allocated".to_string()))?
                .write(scene.radii())?;
            self.colors
                .as_ref()
                .ok_or_else(|| GpuError::InvalidState("Scene buffers not allocated".to_string()))?
                .write(&colors)?;
        }

        Ok(grew)
    }

    /// Free the buffers. Safe to call more than once.
    pub fn release(&mut self, allocator: &mut GpuAllocator) -> Result<()> {
        for mut buffer in self.drain() {
            allocator.free_buffer(&mut buffer)?;
        }
        Ok(())
    }

    fn reallocate(&mut self, allocator: &mut GpuAllocator, required: usize) -> Result<()> {
        let new_capacity = grown_capacity(self.capacity, required);

        if self.capacity == 0 {
            debug!(spheres = new_capacity, "scene buffer initial allocation");
        } else {
            warn!(
                old_spheres = self.capacity,
                new_spheres = new_capacity,
                "scene buffer reallocation (potential frame hitch)"
            );
        }

        // The renderer waits for the previous submission before
        // uploading, so the old buffers are no longer in flight.
        for mut buffer in self.drain() {
            allocator.free_buffer(&mut buffer)?;
        }

        let entries = new_capacity as u64;
        let usage = vk::BufferUsageFlags::STORAGE_BUFFER;

        self.centers = Some(allocator.create_buffer(
            entries * CENTER_STRIDE,
            usage,
            MemoryLocation::CpuToGpu,
            "sphere_centers",
        )?);
        self.radii = Some(allocator.create_buffer(
            entries * RADIUS_STRIDE,
            usage,
            MemoryLocation::CpuToGpu,
            "sphere_radii",
        )?);
        self.colors = Some(allocator.create_buffer(
            entries * COLOR_STRIDE,
            usage,
            MemoryLocation::CpuToGpu,
            "sphere_colors",
        )?);
        self.capacity = new_capacity;

        Ok(())
    }

    /// Take ownership of any live buffers, leaving the set empty.
    fn drain(&mut self) -> Vec<GpuBuffer> {
        self.capacity = 0;
        [self.centers.take(), self.radii.take(), self.colors.take()]
            .into_iter()
            .flatten()
            .collect()
    }
}

/// Capacity after growing to hold `required` spheres.
fn grown_capacity(capacity: usize, required: usize) -> usize {
    if capacity == 0 {
        required.max(1)
    } else {
        (capacity * 2).max(required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_buffer(size: u64) -> GpuBuffer {
        GpuBuffer {
            buffer: vk::Buffer::null(),
            allocation: None,
            size,
        }
    }

    #[test]
    fn initial_allocation_fits_exactly() {
        assert_eq!(grown_capacity(0, 3), 3);
        assert_eq!(grown_capacity(0, 100), 100);
    }

    #[test]
    fn empty_scene_gets_one_slot() {
        assert_eq!(grown_capacity(0, 0), 1);
    }

    #[test]
    fn growth_doubles_capacity() {
        assert_eq!(grown_capacity(4, 5), 8);
        assert_eq!(grown_capacity(8, 9), 16);
    }

    #[test]
    fn large_jump_wins_over_doubling() {
        assert_eq!(grown_capacity(4, 50), 50);
    }

    #[test]
    fn drain_empties_and_is_idempotent() {
        let mut buffers = SceneBuffers::new();
        buffers.centers = Some(fake_buffer(48));
        buffers.radii = Some(fake_buffer(12));
        buffers.colors = Some(fake_buffer(48));
        buffers.capacity = 3;

        assert_eq!(buffers.drain().len(), 3);
        assert_eq!(buffers.capacity(), 0);
        assert_eq!(buffers.drain().len(), 0);
    }
}
