//! Error types for the renderer core.

use thiserror::Error;

/// Core error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Scene arrays disagree on sphere count
    #[error("mismatched scene arrays: {centers} centers, {radii} radii, {colors} colors")]
    SceneArrayMismatch {
        /// Number of center entries
        centers: usize,
        /// Number of radius entries
        radii: usize,
        /// Number of color entries
        colors: usize,
    },
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
