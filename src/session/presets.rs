//! Captions and style tags offered by the studio.

/// Status captions cycled while a generation is in flight.
pub const LOADING_PHASES: [&str; 7] = [
    "INITIALIZING NEURAL PATHWAYS...",
    "ANALYZING VISUAL REFERENCE...",
    "PARSING SEMANTIC STRUCTURES...",
    "SYNTHESIZING GEOMETRY...",
    "CALCULATING LIGHT & REFLECTIONS...",
    "REFINING TEXTURE DETAILS...",
    "POLISHING FINAL COMPOSITION...",
];

/// One-click style tags appended to the prompt.
pub const STYLE_PRESETS: [&str; 8] = [
    "Cinematic",
    "Photorealistic",
    "Cyberpunk",
    "Studio Lighting",
    "Oil Painting",
    "Minimalist",
    "Noir",
    "Vaporwave",
];

/// Appends `tag` to `prompt` as `", <tag>"`.
///
/// Returns `None` when the tag already occurs anywhere in the prompt. The
/// check is plain substring containment, so "Noir" counts as present inside
/// "Noirish".
pub fn append_style(prompt: &str, tag: &str) -> Option<String> {
    if prompt.contains(tag) {
        return None;
    }
    if prompt.is_empty() {
        return Some(tag.to_string());
    }
    Some(format!("{prompt}, {tag}"))
}
