#![warn(missing_docs)]
//! Luminia - a prompt-to-image studio on top of Gemini image generation.
//!
//! The crate has two layers:
//!
//! - an [`ImageProvider`] adapter that turns a prompt, an aspect ratio and an
//!   optional reference image into a data URI, and
//! - a [`Session`] that owns the studio state (prompt, history, last error,
//!   progress) and allows one request in flight at a time.
//!
//! # Quick Start
//!
//! ```no_run
//! use luminia::{AspectRatio, GeminiProvider, Session, SubmitOutcome};
//!
//! #[tokio::main]
//! async fn main() -> luminia::Result<()> {
//!     let provider = GeminiProvider::builder().build()?;
//!     let session = Session::new(provider);
//!
//!     session.set_prompt("A lighthouse in a storm");
//!     session.set_aspect_ratio(AspectRatio::Landscape);
//!     session.select_style("Cinematic");
//!
//!     match session.submit().await {
//!         SubmitOutcome::Generated(image) => {
//!             session.download(&image, ".").await?;
//!         }
//!         SubmitOutcome::Failed(message) => eprintln!("{message}"),
//!         SubmitOutcome::Skipped(reason) => eprintln!("skipped: {reason:?}"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Credentials
//!
//! The API key is read on every request from a [`KeySource`]; by default the
//! `GOOGLE_API_KEY` or `GEMINI_API_KEY` environment variable.
//!
//! # Features
//!
//! - `cli` (default): the `luminia` command-line studio

pub mod credentials;
mod error;
pub mod image;
pub mod session;

// Re-export error types at crate root
pub use error::{LuminiaError, Result};

pub use credentials::{
    select_api_key, EnvKey, EnvKeySelector, KeySelector, KeySource, StaticKey,
};
pub use image::providers::{GeminiModel, GeminiProvider, GeminiProviderBuilder};
pub use image::{
    AspectRatio, GeneratedImage, GenerationRequest, ImageFormat, ImageProvider, ReferenceImage,
};
pub use session::{
    ProgressIndicator, ProgressSnapshot, Session, SessionState, SimulatedProgress, SkipReason,
    StaticProgress, SubmitOutcome,
};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{LuminiaError, Result};
    pub use crate::image::providers::GeminiProvider;
    pub use crate::image::{AspectRatio, GeneratedImage, GenerationRequest, ImageProvider};
    pub use crate::session::{Session, SubmitOutcome};
}
