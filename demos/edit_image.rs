//! Image editing example - restyles an existing image through a studio session.
//!
//! Run with: `cargo run --example edit_image -- <input_image.png>`
//!
//! Requires `GOOGLE_API_KEY` environment variable.

use luminia::{GeminiProvider, Session, SubmitOutcome};

#[tokio::main]
async fn main() -> luminia::Result<()> {
    let input_path = std::env::args()
        .nth(1)
        .expect("Usage: edit_image <input_image.png>");

    let session = Session::new(GeminiProvider::builder().build()?);
    session.set_reference_image_file(&input_path).await?;
    session.set_prompt("Make the colors more vibrant and add a warm sunset glow");
    session.select_style("Oil Painting");

    match session.submit().await {
        SubmitOutcome::Generated(image) => {
            let path = session.download(&image, ".").await?;
            println!("Edited image saved to {}", path.display());
        }
        SubmitOutcome::Failed(message) => eprintln!("Generation failed: {message}"),
        SubmitOutcome::Skipped(reason) => eprintln!("Nothing submitted: {reason:?}"),
    }

    Ok(())
}
