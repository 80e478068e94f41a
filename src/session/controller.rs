//! Session controller: the studio's observable state and its transitions.

use crate::error::{LuminiaError, Result};
use crate::image::{
    oversized_reference, AspectRatio, GeneratedImage, GenerationRequest, ImageFormat,
    ImageProvider, ReferenceImage, MAX_REFERENCE_IMAGE_BYTES,
};
use crate::session::presets;
use crate::session::progress::{ProgressIndicator, ProgressSnapshot, SimulatedProgress};
use parking_lot::Mutex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Recorded when the provider fails without saying why.
const FALLBACK_ERROR: &str = "An unexpected error occurred during creation.";

/// Everything the studio displays.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Editable prompt text.
    pub prompt: String,
    /// Selected output proportions.
    pub aspect_ratio: AspectRatio,
    /// Selected reference image, if any.
    #[serde(skip)]
    pub reference_image: Option<ReferenceImage>,
    /// True for exactly the lifetime of one outstanding request.
    pub is_generating: bool,
    /// Image on display.
    pub current_result: Option<GeneratedImage>,
    /// Successful generations, newest first.
    pub history: Vec<GeneratedImage>,
    /// Message from the most recent failure.
    pub last_error: Option<String>,
}

/// Why a submission did not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Blank prompt and no reference image.
    EmptySubmission,
    /// Another request is still in flight.
    AlreadyGenerating,
}

/// Result of [`Session::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing was sent and state is unchanged.
    Skipped(SkipReason),
    /// A new image was recorded as the current result and history head.
    Generated(GeneratedImage),
    /// The request failed; the message is now the session's last error.
    Failed(String),
}

/// Owns the studio state and serializes generation requests.
pub struct Session<P> {
    provider: P,
    state: Mutex<SessionState>,
    progress: Box<dyn ProgressIndicator>,
    last_timestamp: AtomicU64,
}

impl<P: ImageProvider> Session<P> {
    /// Creates a session with a timer-driven progress indicator.
    pub fn new(provider: P) -> Self {
        Self::with_progress(provider, SimulatedProgress::new())
    }

    /// Creates a session with the given progress indicator.
    pub fn with_progress(provider: P, progress: impl ProgressIndicator + 'static) -> Self {
        Self {
            provider,
            state: Mutex::new(SessionState::default()),
            progress: Box::new(progress),
            last_timestamp: AtomicU64::new(0),
        }
    }

    /// The provider requests go to.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> SessionState {
        self.state.lock().clone()
    }

    /// Current progress indicator state.
    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    /// Whether a request is in flight.
    pub fn is_generating(&self) -> bool {
        self.state.lock().is_generating
    }

    /// Current prompt text.
    pub fn prompt(&self) -> String {
        self.state.lock().prompt.clone()
    }

    /// Successful generations, newest first.
    pub fn history(&self) -> Vec<GeneratedImage> {
        self.state.lock().history.clone()
    }

    /// Image on display.
    pub fn current_result(&self) -> Option<GeneratedImage> {
        self.state.lock().current_result.clone()
    }

    /// Message from the most recent failure.
    pub fn last_error(&self) -> Option<String> {
        self.state.lock().last_error.clone()
    }

    /// Replaces the prompt text.
    pub fn set_prompt(&self, prompt: impl Into<String>) {
        self.state.lock().prompt = prompt.into();
    }

    /// Selects the output proportions for the next request.
    pub fn set_aspect_ratio(&self, ratio: AspectRatio) {
        self.state.lock().aspect_ratio = ratio;
    }

    /// Appends a style tag to the prompt unless the prompt already contains it.
    ///
    /// Returns whether the prompt changed.
    pub fn select_style(&self, tag: &str) -> bool {
        let mut state = self.state.lock();
        match presets::append_style(&state.prompt, tag) {
            Some(prompt) => {
                state.prompt = prompt;
                true
            }
            None => false,
        }
    }

    /// Sends the current prompt, ratio and reference image to the provider.
    ///
    /// At most one request is in flight per session: a call made while one is
    /// outstanding, or with nothing to send, returns
    /// [`SubmitOutcome::Skipped`] without touching state.
    pub async fn submit(&self) -> SubmitOutcome {
        let request = {
            let mut state = self.state.lock();
            if state.is_generating {
                tracing::debug!("submission ignored, request already in flight");
                return SubmitOutcome::Skipped(SkipReason::AlreadyGenerating);
            }
            if state.prompt.trim().is_empty() && state.reference_image.is_none() {
                return SubmitOutcome::Skipped(SkipReason::EmptySubmission);
            }
            state.last_error = None;
            state.is_generating = true;
            GenerationRequest {
                prompt: state.prompt.clone(),
                aspect_ratio: state.aspect_ratio,
                reference_image: state.reference_image.clone(),
            }
        };

        let mut in_flight = InFlight::begin(&self.state, self.progress.as_ref());
        tracing::debug!(
            model = self.provider.model(),
            aspect_ratio = %request.aspect_ratio,
            has_reference = request.reference_image.is_some(),
            "generation started"
        );
        let result = self.provider.generate(&request).await;

        let outcome = {
            let mut state = self.state.lock();
            let outcome = match result {
                Ok(url) => {
                    let image = GeneratedImage {
                        url,
                        prompt: request.prompt,
                        aspect_ratio: request.aspect_ratio,
                        timestamp: self.next_timestamp(),
                    };
                    state.current_result = Some(image.clone());
                    state.history.insert(0, image.clone());
                    SubmitOutcome::Generated(image)
                }
                Err(e) => {
                    let mut message = e.to_string();
                    if message.trim().is_empty() {
                        message = FALLBACK_ERROR.to_string();
                    }
                    state.last_error = Some(message.clone());
                    SubmitOutcome::Failed(message)
                }
            };
            state.is_generating = false;
            outcome
        };
        in_flight.settled = true;
        outcome
    }

    /// Reads an image file and makes it the reference image.
    ///
    /// Files over 5 MB are rejected before being read; the rejection is
    /// recorded as the last error and the previous reference image is kept.
    pub async fn set_reference_image_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let loaded = load_reference_image(path).await;
        match loaded {
            Ok(image) => {
                tracing::debug!(path = %path.display(), "reference image loaded");
                self.state.lock().reference_image = Some(image);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "reference image rejected");
                self.state.lock().last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Uses in-memory bytes as the reference image, with the same size cap
    /// as [`set_reference_image_file`](Self::set_reference_image_file).
    pub fn set_reference_image_bytes(&self, bytes: &[u8], mime_type: &str) -> Result<()> {
        let mut state = self.state.lock();
        match ReferenceImage::from_bytes(bytes, mime_type) {
            Ok(image) => {
                state.reference_image = Some(image);
                Ok(())
            }
            Err(e) => {
                state.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Removes the reference image.
    pub fn clear_reference_image(&self) {
        self.state.lock().reference_image = None;
    }

    /// Clears prompt, reference image, current result and error. History stays.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.prompt.clear();
        state.reference_image = None;
        state.current_result = None;
        state.last_error = None;
    }

    /// Shows a past image again and restores its prompt and ratio for editing.
    ///
    /// History order is untouched. Returns `None` if no entry has that timestamp.
    pub fn select_from_history(&self, timestamp: u64) -> Option<GeneratedImage> {
        let mut state = self.state.lock();
        let image = state
            .history
            .iter()
            .find(|img| img.timestamp == timestamp)
            .cloned()?;
        state.prompt = image.prompt.clone();
        state.aspect_ratio = image.aspect_ratio;
        state.current_result = Some(image.clone());
        Some(image)
    }

    /// Hides the error banner.
    pub fn dismiss_error(&self) {
        self.state.lock().last_error = None;
    }

    /// The last error verbatim, for copying into a bug report.
    pub fn error_report(&self) -> Option<String> {
        self.last_error()
    }

    /// Writes `image` into `dir` as `luminia-tomo-art-<timestamp>.png`.
    pub async fn download(&self, image: &GeneratedImage, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let path = dir.as_ref().join(image.download_filename());
        tokio::fs::write(&path, image.bytes()?).await?;
        tracing::debug!(path = %path.display(), "image downloaded");
        Ok(path)
    }

    /// Milliseconds since the epoch, strictly increasing within this session.
    fn next_timestamp(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        let prev = self
            .last_timestamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        now.max(prev + 1)
    }
}

async fn load_reference_image(path: &Path) -> Result<ReferenceImage> {
    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > MAX_REFERENCE_IMAGE_BYTES {
        return Err(oversized_reference());
    }
    let bytes = tokio::fs::read(path).await?;
    ReferenceImage::from_bytes(&bytes, &sniff_mime_type(path, &bytes))
}

fn sniff_mime_type(path: &Path, bytes: &[u8]) -> String {
    ImageFormat::from_magic_bytes(bytes)
        .or_else(|| {
            path.extension()
                .and_then(|e| e.to_str())
                .and_then(ImageFormat::from_extension)
        })
        .map(|f| f.mime_type().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

/// Marks one request in flight. Dropping it stops the progress timers; if the
/// request never settled (the submit future was dropped) it also clears the
/// generating flag so the session stays usable.
struct InFlight<'a> {
    state: &'a Mutex<SessionState>,
    progress: &'a dyn ProgressIndicator,
    settled: bool,
}

impl<'a> InFlight<'a> {
    fn begin(state: &'a Mutex<SessionState>, progress: &'a dyn ProgressIndicator) -> Self {
        progress.start();
        Self {
            state,
            progress,
            settled: false,
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.progress.finish();
        if !self.settled {
            self.state.lock().is_generating = false;
        }
    }
}

impl From<SkipReason> for LuminiaError {
    fn from(reason: SkipReason) -> Self {
        match reason {
            SkipReason::EmptySubmission => {
                LuminiaError::Validation("Enter a prompt or add a reference image.".into())
            }
            SkipReason::AlreadyGenerating => {
                LuminiaError::Validation("A generation is already in progress.".into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::data_uri;
    use crate::session::progress::StaticProgress;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;
    use tokio::sync::Notify;

    const PNG: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    /// Replays canned results and records what it was asked.
    #[derive(Default)]
    struct ScriptedProvider {
        results: Mutex<VecDeque<Result<String>>>,
        requests: Mutex<Vec<GenerationRequest>>,
        calls: AtomicU32,
        gate: Option<(Arc<Notify>, Arc<Notify>)>,
    }

    impl ScriptedProvider {
        fn new(results: impl IntoIterator<Item = Result<String>>) -> Self {
            Self {
                results: Mutex::new(results.into_iter().collect()),
                ..Self::default()
            }
        }

        /// Blocks each call until `release` is notified; signals `started` first.
        fn gated(mut self, started: Arc<Notify>, release: Arc<Notify>) -> Self {
            self.gate = Some((started, release));
            self
        }
    }

    #[async_trait]
    impl ImageProvider for ScriptedProvider {
        async fn generate(&self, request: &GenerationRequest) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().push(request.clone());
            if let Some((started, release)) = &self.gate {
                started.notify_one();
                release.notified().await;
            }
            self.results
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(LuminiaError::Content("script exhausted".into())))
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    fn ok(payload: &str) -> Result<String> {
        Ok(format!("data:image/png;base64,{payload}"))
    }

    fn session(results: impl IntoIterator<Item = Result<String>>) -> Session<ScriptedProvider> {
        Session::with_progress(ScriptedProvider::new(results), StaticProgress::new())
    }

    #[tokio::test]
    async fn test_submit_success_prepends_history() {
        let session = session([ok("AAAA"), ok("BBBB")]);
        session.set_prompt("a cat");
        session.set_aspect_ratio(AspectRatio::Landscape);

        let first = match session.submit().await {
            SubmitOutcome::Generated(image) => image,
            other => panic!("unexpected outcome: {other:?}"),
        };
        assert_eq!(first.url, "data:image/png;base64,AAAA");
        assert_eq!(first.prompt, "a cat");
        assert_eq!(first.aspect_ratio, AspectRatio::Landscape);

        session.set_prompt("a dog");
        let second = match session.submit().await {
            SubmitOutcome::Generated(image) => image,
            other => panic!("unexpected outcome: {other:?}"),
        };

        let state = session.snapshot();
        assert!(!state.is_generating);
        assert_eq!(state.current_result.as_ref(), Some(&second));
        assert_eq!(state.history, vec![second.clone(), first.clone()]);
        assert!(second.timestamp > first.timestamp);
        assert_eq!(session.progress().percent, 100.0);
    }

    #[tokio::test]
    async fn test_submit_failure_keeps_history() {
        let session = session([
            ok("AAAA"),
            Err(LuminiaError::Content(
                "Model returned text instead of image: blocked".into(),
            )),
        ]);
        session.set_prompt("a cat");
        session.submit().await;
        let before = session.snapshot();

        let outcome = session.submit().await;
        assert_eq!(
            outcome,
            SubmitOutcome::Failed("Model returned text instead of image: blocked".into())
        );

        let after = session.snapshot();
        assert_eq!(after.history, before.history);
        assert_eq!(after.current_result, before.current_result);
        assert_eq!(
            after.last_error.as_deref(),
            Some("Model returned text instead of image: blocked")
        );
        assert!(!after.is_generating);
    }

    #[tokio::test]
    async fn test_next_submit_clears_error() {
        let session = session([Err(LuminiaError::Content("nope".into())), ok("AAAA")]);
        session.set_prompt("a cat");
        session.submit().await;
        assert_eq!(session.last_error().as_deref(), Some("nope"));

        session.submit().await;
        assert_eq!(session.last_error(), None);
    }

    #[tokio::test]
    async fn test_empty_failure_message_gets_fallback() {
        let session = session([Err(LuminiaError::Content(String::new()))]);
        session.set_prompt("a cat");
        assert_eq!(
            session.submit().await,
            SubmitOutcome::Failed(FALLBACK_ERROR.into())
        );
    }

    #[tokio::test]
    async fn test_empty_submission_is_noop() {
        let session = session([ok("AAAA")]);
        session.set_prompt("   \t");

        assert_eq!(
            session.submit().await,
            SubmitOutcome::Skipped(SkipReason::EmptySubmission)
        );
        assert_eq!(session.provider().calls.load(Ordering::SeqCst), 0);
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_reference_image_alone_is_enough() {
        let session = session([ok("AAAA")]);
        session.set_reference_image_bytes(&PNG, "image/png").unwrap();

        assert!(matches!(session.submit().await, SubmitOutcome::Generated(_)));
        let requests = session.provider().requests.lock();
        assert_eq!(requests[0].prompt, "");
        assert!(requests[0].reference_image.is_some());
    }

    #[tokio::test]
    async fn test_second_submit_while_generating_is_noop() {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let provider = ScriptedProvider::new([ok("AAAA")])
            .gated(Arc::clone(&started), Arc::clone(&release));
        let session = Arc::new(Session::with_progress(provider, StaticProgress::new()));
        session.set_prompt("a cat");

        let first = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.submit().await }
        });
        started.notified().await;

        assert!(session.is_generating());
        assert_eq!(session.progress().percent, 0.0);
        let before = session.snapshot();
        assert_eq!(
            session.submit().await,
            SubmitOutcome::Skipped(SkipReason::AlreadyGenerating)
        );
        assert_eq!(session.provider().calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.snapshot().history, before.history);

        release.notify_one();
        assert!(matches!(first.await.unwrap(), SubmitOutcome::Generated(_)));
        assert!(!session.is_generating());
        assert_eq!(session.progress().percent, 100.0);
    }

    #[tokio::test]
    async fn test_dropped_submit_returns_to_idle() {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let provider = ScriptedProvider::new([ok("AAAA")])
            .gated(Arc::clone(&started), Arc::clone(&release));
        let session = Arc::new(Session::with_progress(provider, StaticProgress::new()));
        session.set_prompt("a cat");

        let task = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.submit().await }
        });
        started.notified().await;
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        assert!(!session.is_generating());
        assert_eq!(session.progress().percent, 100.0);
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_select_style() {
        let session = session([]);
        session.set_prompt("a cat");
        assert!(session.select_style("Noir"));
        assert!(!session.select_style("Noir"));
        assert_eq!(session.prompt(), "a cat, Noir");
    }

    #[tokio::test]
    async fn test_oversized_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let small = dir.path().join("small.png");
        std::fs::write(&small, PNG).unwrap();
        let big = dir.path().join("big.png");
        std::fs::write(&big, vec![0u8; 6 * 1024 * 1024]).unwrap();

        let session = session([]);
        session.set_reference_image_file(&small).await.unwrap();
        let kept = session.snapshot().reference_image;

        let err = session.set_reference_image_file(&big).await.unwrap_err();
        assert!(err.is_validation());
        let state = session.snapshot();
        assert_eq!(state.reference_image, kept);
        assert_eq!(
            state.last_error.as_deref(),
            Some("Image size too large. Please select an image under 5MB.")
        );
    }

    #[tokio::test]
    async fn test_reference_file_mime_detection() {
        let dir = tempfile::tempdir().unwrap();
        let jpeg = dir.path().join("photo.bin");
        std::fs::write(&jpeg, [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        let webp = dir.path().join("tiny.webp");
        std::fs::write(&webp, b"tiny").unwrap();

        let session = session([]);
        session.set_reference_image_file(&jpeg).await.unwrap();
        let image = session.snapshot().reference_image.unwrap();
        assert_eq!(image.mime_type(), Some("image/jpeg"));

        session.set_reference_image_file(&webp).await.unwrap();
        let image = session.snapshot().reference_image.unwrap();
        assert_eq!(image.mime_type(), Some("image/webp"));
    }

    #[tokio::test]
    async fn test_missing_file_records_error() {
        let session = session([]);
        let err = session
            .set_reference_image_file("/definitely/not/here.png")
            .await
            .unwrap_err();
        assert!(matches!(err, LuminiaError::Io(_)));
        assert!(session.last_error().is_some());
        assert!(session.snapshot().reference_image.is_none());
    }

    #[tokio::test]
    async fn test_reset_preserves_history() {
        let session = session([ok("AAAA")]);
        session.set_prompt("a cat");
        session.set_reference_image_bytes(&PNG, "image/png").unwrap();
        session.submit().await;
        session.state.lock().last_error = Some("old".into());

        session.reset();
        let state = session.snapshot();
        assert_eq!(state.prompt, "");
        assert!(state.reference_image.is_none());
        assert!(state.current_result.is_none());
        assert!(state.last_error.is_none());
        assert_eq!(state.history.len(), 1);
    }

    #[tokio::test]
    async fn test_select_from_history() {
        let session = session([ok("AAAA"), ok("BBBB")]);
        session.set_prompt("first");
        session.set_aspect_ratio(AspectRatio::Tall);
        session.submit().await;
        session.set_prompt("second");
        session.set_aspect_ratio(AspectRatio::Wide);
        session.submit().await;

        let history = session.history();
        let older = history[1].clone();
        assert_eq!(session.select_from_history(older.timestamp), Some(older.clone()));

        let state = session.snapshot();
        assert_eq!(state.current_result, Some(older));
        assert_eq!(state.prompt, "first");
        assert_eq!(state.aspect_ratio, AspectRatio::Tall);
        assert_eq!(state.history, history);

        assert_eq!(session.select_from_history(0), None);
    }

    #[tokio::test]
    async fn test_clear_reference_and_dismiss_error() {
        let session = session([]);
        session.set_reference_image_bytes(&PNG, "image/png").unwrap();
        session.clear_reference_image();
        assert!(session.snapshot().reference_image.is_none());

        let too_big = vec![0u8; MAX_REFERENCE_IMAGE_BYTES as usize + 1];
        assert!(session.set_reference_image_bytes(&too_big, "image/png").is_err());
        assert!(session.error_report().is_some());
        session.dismiss_error();
        assert_eq!(session.error_report(), None);
    }

    #[tokio::test]
    async fn test_download() {
        let dir = tempfile::tempdir().unwrap();
        let session = session([Ok(data_uri::encode("image/png", &PNG))]);
        session.set_prompt("a cat");
        let image = match session.submit().await {
            SubmitOutcome::Generated(image) => image,
            other => panic!("unexpected outcome: {other:?}"),
        };

        let path = session.download(&image, dir.path()).await.unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            format!("luminia-tomo-art-{}.png", image.timestamp)
        );
        assert_eq!(std::fs::read(path).unwrap(), PNG);
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let session = session([]);
        let a = session.next_timestamp();
        let b = session.next_timestamp();
        let c = session.next_timestamp();
        assert!(a < b && b < c);
    }
}
