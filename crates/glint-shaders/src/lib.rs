//! Shader compilation for the Glint renderer.
//!
//! This crate contains GLSL shaders and their compiled SPIR-V bytecode.
//! Shaders are compiled at build time using shaderc.

use std::sync::OnceLock;

/// Embedded SPIR-V shader bytecode (raw bytes, may not be aligned).
mod spirv_bytes {
    /// Sphere trace compute shader (compiled SPIR-V).
    pub static SPHERE_TRACE_COMP: &[u8] =
        include_bytes!(concat!(env!("OUT_DIR"), "/sphere_trace.spv"));

    /// Composite blit vertex shader (compiled SPIR-V).
    pub static COMPOSITE_VERT: &[u8] =
        include_bytes!(concat!(env!("OUT_DIR"), "/composite_vert.spv"));

    /// Composite blit fragment shader (compiled SPIR-V).
    pub static COMPOSITE_FRAG: &[u8] =
        include_bytes!(concat!(env!("OUT_DIR"), "/composite_frag.spv"));

    /// Opaque geometry vertex shader (compiled SPIR-V).
    pub static OPAQUE_VERT: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/opaque_vert.spv"));

    /// Opaque geometry fragment shader (compiled SPIR-V).
    pub static OPAQUE_FRAG: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/opaque_frag.spv"));

    /// Sky gradient vertex shader (compiled SPIR-V).
    pub static SKY_VERT: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/sky_vert.spv"));

    /// Sky gradient fragment shader (compiled SPIR-V).
    pub static SKY_FRAG: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/sky_frag.spv"));
}

/// Convert byte slice to aligned u32 Vec (SPIR-V requires 4-byte alignment).
fn bytes_to_spirv(bytes: &[u8]) -> Vec<u32> {
    assert!(
        bytes.len() % 4 == 0,
        "SPIR-V bytecode must be 4-byte aligned"
    );
    bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

static SPHERE_TRACE_SPIRV: OnceLock<Vec<u32>> = OnceLock::new();
static COMPOSITE_VERT_SPIRV: OnceLock<Vec<u32>> = OnceLock::new();
static COMPOSITE_FRAG_SPIRV: OnceLock<Vec<u32>> = OnceLock::new();
static OPAQUE_VERT_SPIRV: OnceLock<Vec<u32>> = OnceLock::new();
static OPAQUE_FRAG_SPIRV: OnceLock<Vec<u32>> = OnceLock::new();
static SKY_VERT_SPIRV: OnceLock<Vec<u32>> = OnceLock::new();
static SKY_FRAG_SPIRV: OnceLock<Vec<u32>> = OnceLock::new();

/// Get the sphere trace compute shader as u32 slice for Vulkan.
pub fn sphere_trace_shader() -> &'static [u32] {
    SPHERE_TRACE_SPIRV.get_or_init(|| bytes_to_spirv(spirv_bytes::SPHERE_TRACE_COMP))
}

/// Get the composite blit vertex shader as u32 slice for Vulkan.
pub fn composite_vert_shader() -> &'static [u32] {
    COMPOSITE_VERT_SPIRV.get_or_init(|| bytes_to_spirv(spirv_bytes::COMPOSITE_VERT))
}

/// Get the composite blit fragment shader as u32 slice for Vulkan.
pub fn composite_frag_shader() -> &'static [u32] {
    COMPOSITE_FRAG_SPIRV.get_or_init(|| bytes_to_spirv(spirv_bytes::COMPOSITE_FRAG))
}

/// Get the opaque geometry vertex shader as u32 slice for Vulkan.
pub fn opaque_vert_shader() -> &'static [u32] {
    OPAQUE_VERT_SPIRV.get_or_init(|| bytes_to_spirv(spirv_bytes::OPAQUE_VERT))
}

/// Get the opaque geometry fragment shader as u32 slice for Vulkan.
pub fn opaque_frag_shader() -> &'static [u32] {
    OPAQUE_FRAG_SPIRV.get_or_init(|| bytes_to_spirv(spirv_bytes::OPAQUE_FRAG))
}

/// Get the sky gradient vertex shader as u32 slice for Vulkan.
pub fn sky_vert_shader() -> &'static [u32] {
    SKY_VERT_SPIRV.get_or_init(|| bytes_to_spirv(spirv_bytes::SKY_VERT))
}

/// Get the sky gradient fragment shader as u32 slice for Vulkan.
pub fn sky_frag_shader() -> &'static [u32] {
    SKY_FRAG_SPIRV.get_or_init(|| bytes_to_spirv(spirv_bytes::SKY_FRAG))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_shader_loads() {
        let shader = sphere_trace_shader();
        assert_eq!(shader[0], 0x0723_0203, "Invalid SPIR-V magic number");
        assert!(shader.len() > 100, "Shader too small");
    }

    #[test]
    fn raster_shaders_load() {
        for shader in [
            composite_vert_shader(),
            composite_frag_shader(),
            opaque_vert_shader(),
            opaque_frag_shader(),
            sky_vert_shader(),
            sky_frag_shader(),
        ] {
            assert_eq!(shader[0], 0x0723_0203, "Invalid SPIR-V magic number");
            assert!(shader.len() > 10, "Shader too small");
        }
    }
}
