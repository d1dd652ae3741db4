//! Core types and math for the Glint renderer.
//!
//! This crate provides the foundational types used throughout the renderer:
//! - Analytic sphere scenes in struct-of-arrays form
//! - Rasterized scene objects (meshes, materials, pass tags)
//! - Math utilities for rays, bounding boxes, and frustum culling

pub mod error;
pub mod math;
pub mod renderable;
pub mod scene;

pub use error::{Error, Result};
pub use math::{Aabb, Frustum, Ray};
pub use renderable::{cull_and_sort, Material, MeshKind, RenderObject, RenderTag, Vertex};
pub use scene::{GpuVec3, Sphere, SphereScene};
