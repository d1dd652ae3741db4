//! Test harness for the Glint renderer.
//!
//! Provides headless rendering, a CPU reference implementation of the
//! trace and composite stages, and image comparison helpers.

pub mod compare;
pub mod harness;
pub mod reference;

pub use compare::{assert_images_match, mean_absolute_diff};
pub use harness::{create_test_camera, HeadlessRenderer};
pub use reference::CpuImage;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TestError {
    #[error("GPU error: {0}")]
    Gpu(String),
    #[error("Image comparison failed: {0}")]
    ImageComparison(String),
}

pub type Result<T> = std::result::Result<T, TestError>;
