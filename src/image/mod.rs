//! Image generation module.

pub mod data_uri;
mod provider;
pub mod providers;
pub mod scan;
mod types;

pub use provider::ImageProvider;
pub use types::{
    AspectRatio, GeneratedImage, GenerationRequest, ImageFormat, ReferenceImage,
    MAX_REFERENCE_IMAGE_BYTES,
};
pub(crate) use types::oversized_reference;
