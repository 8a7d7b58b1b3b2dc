//! Error types for the mask-inpaint crate.

/// Errors that can occur while validating input or loading and saving images.
///
/// Conditions the engine can recover from (an empty mask, a region with no
/// matching source patch) are never reported here; see
/// [`Status`](crate::Status) for the cancellation outcome.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The mask does not have the same dimensions as the image.
    #[error(
        "mask dimensions ({mask_width}x{mask_height}) do not match image dimensions ({image_width}x{image_height})"
    )]
    DimensionMismatch {
        /// Image width in pixels.
        image_width: u32,
        /// Image height in pixels.
        image_height: u32,
        /// Mask width in pixels.
        mask_width: u32,
        /// Mask height in pixels.
        mask_height: u32,
    },

    /// The patch size is even or outside the accepted range.
    #[error("invalid patch size {0}: must be odd and between 3 and 31")]
    InvalidPatchSize(u32),

    /// A mask image or shape argument could not be turned into a mask.
    #[error("failed to build mask: {0}")]
    MaskDecode(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An error occurred during image processing (load, save, encode).
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
