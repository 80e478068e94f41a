//! Basic image generation example.
//!
//! Run with: `cargo run --example generate_image`
//!
//! Requires `GOOGLE_API_KEY` environment variable.

use luminia::{AspectRatio, GeminiProvider, ImageProvider, Session, SubmitOutcome};

#[tokio::main]
async fn main() -> luminia::Result<()> {
    let provider = GeminiProvider::builder().build()?;
    let model = provider.model().to_string();

    let session = Session::new(provider);
    session.set_prompt("A golden retriever puppy playing in snow");
    session.set_aspect_ratio(AspectRatio::Landscape);

    match session.submit().await {
        SubmitOutcome::Generated(image) => {
            let path = session.download(&image, ".").await?;
            println!("Generated image via {model} saved to {}", path.display());
        }
        SubmitOutcome::Failed(message) => eprintln!("Generation failed: {message}"),
        SubmitOutcome::Skipped(reason) => eprintln!("Nothing submitted: {reason:?}"),
    }

    Ok(())
}
