//! Recording: capture-device control for a practice session.
//!
//! Acquisition is the only step that may wait on the outside world (a
//! permission prompt on the recorder side). It runs outside the session lock
//! and is bounded by `CAPTURE_ACQUIRE_TIMEOUT`. Denial is recoverable: the
//! session carries on text-only. Release is tied to `CaptureGuard::drop`, so
//! every exit path gives the device back.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Longest a start request waits for the user to answer the permission prompt.
pub const CAPTURE_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-request bound for calls to the recorder sidecar.
const RECORDER_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceAccessError {
    #[error("Capture permission denied: {0}")]
    Denied(String),

    #[error("No capture device available")]
    Unavailable,

    #[error("Capture device did not respond within {0:?}")]
    TimedOut(Duration),

    #[error("Recorder request failed: {0}")]
    Transport(String),
}

/// A live audio+video stream. `release` must be safe to call once; the guard
/// makes sure it is never called twice.
pub trait CaptureStream: Send {
    fn set_audio_enabled(&mut self, enabled: bool);
    fn set_video_enabled(&mut self, enabled: bool);
    fn release(&mut self);
}

#[async_trait]
pub trait CaptureDevice: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn CaptureStream>, DeviceAccessError>;
}

/// Runs `device.acquire()` for at most `limit`.
pub async fn acquire_within(
    device: &dyn CaptureDevice,
    limit: Duration,
) -> Result<Box<dyn CaptureStream>, DeviceAccessError> {
    match tokio::time::timeout(limit, device.acquire()).await {
        Ok(acquired) => acquired,
        Err(_) => Err(DeviceAccessError::TimedOut(limit)),
    }
}

/// Owns a stream and releases it exactly once, on drop at the latest.
pub struct CaptureGuard {
    stream: Option<Box<dyn CaptureStream>>,
}

impl CaptureGuard {
    pub fn new(stream: Box<dyn CaptureStream>) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    fn stream_mut(&mut self) -> Option<&mut (dyn CaptureStream + 'static)> {
        self.stream.as_deref_mut()
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.release();
        }
    }
}

pub struct RecordingController {
    guard: Option<CaptureGuard>,
    audio_enabled: bool,
    video_enabled: bool,
}

impl RecordingController {
    pub fn new() -> Self {
        Self {
            guard: None,
            audio_enabled: false,
            video_enabled: false,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.guard.is_some()
    }

    pub fn is_audio_enabled(&self) -> bool {
        self.audio_enabled
    }

    pub fn is_video_enabled(&self) -> bool {
        self.video_enabled
    }

    /// Takes ownership of an acquisition result. On failure both flags are
    /// cleared and the error is handed back for display; the caller continues
    /// without recording. A second stream is released straight away.
    pub fn attach(
        &mut self,
        acquired: Result<Box<dyn CaptureStream>, DeviceAccessError>,
    ) -> Result<(), DeviceAccessError> {
        match acquired {
            Ok(stream) if self.guard.is_some() => {
                debug!("Capture device already attached; releasing duplicate stream");
                drop(CaptureGuard::new(stream));
                Ok(())
            }
            Ok(mut stream) => {
                stream.set_audio_enabled(true);
                stream.set_video_enabled(true);
                self.guard = Some(CaptureGuard::new(stream));
                self.audio_enabled = true;
                self.video_enabled = true;
                info!("Capture device acquired");
                Ok(())
            }
            Err(e) => {
                if self.guard.is_none() {
                    self.audio_enabled = false;
                    self.video_enabled = false;
                }
                warn!("Capture device unavailable, continuing text-only: {e}");
                Err(e)
            }
        }
    }

    pub fn stop(&mut self) {
        if self.guard.take().is_some() {
            debug!("Capture device released");
        }
        self.audio_enabled = false;
        self.video_enabled = false;
    }

    /// Flips the audio track. Without a live stream the flag stays off.
    pub fn toggle_audio(&mut self) -> bool {
        if let Some(stream) = self.guard.as_mut().and_then(CaptureGuard::stream_mut) {
            self.audio_enabled = !self.audio_enabled;
            stream.set_audio_enabled(self.audio_enabled);
        }
        self.audio_enabled
    }

    /// Flips the video track. Without a live stream the flag stays off.
    pub fn toggle_video(&mut self) -> bool {
        if let Some(stream) = self.guard.as_mut().and_then(CaptureGuard::stream_mut) {
            self.video_enabled = !self.video_enabled;
            stream.set_video_enabled(self.video_enabled);
        }
        self.video_enabled
    }
}

impl Default for RecordingController {
    fn default() -> Self {
        Self::new()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Devices
// ────────────────────────────────────────────────────────────────────────────

/// Used when no recorder is configured. Every acquisition is refused.
pub struct UnavailableDevice;

#[async_trait]
impl CaptureDevice for UnavailableDevice {
    async fn acquire(&self) -> Result<Box<dyn CaptureStream>, DeviceAccessError> {
        Err(DeviceAccessError::Unavailable)
    }
}

/// Recorder sidecar reached over HTTP.
///
/// `POST {base}/streams` opens a stream (403 means the user refused the
/// permission prompt), `PATCH {base}/streams/{id}` switches tracks and
/// `DELETE {base}/streams/{id}` closes it.
#[derive(Clone)]
pub struct MediaServerDevice {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct OpenStreamResponse {
    stream_id: String,
}

impl MediaServerDevice {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        // The recorder is a sidecar on the local network.
        let client = Client::builder()
            .timeout(RECORDER_REQUEST_TIMEOUT)
            .no_proxy()
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl CaptureDevice for MediaServerDevice {
    async fn acquire(&self) -> Result<Box<dyn CaptureStream>, DeviceAccessError> {
        let response = self
            .client
            .post(format!("{}/streams", self.base_url))
            .json(&serde_json::json!({ "audio": true, "video": true }))
            .send()
            .await
            .map_err(|e| DeviceAccessError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(DeviceAccessError::Denied(body));
        }
        if !status.is_success() {
            return Err(DeviceAccessError::Transport(format!(
                "recorder returned {status}"
            )));
        }

        let opened: OpenStreamResponse = response
            .json()
            .await
            .map_err(|e| DeviceAccessError::Transport(e.to_string()))?;

        let url = format!("{}/streams/{}", self.base_url, opened.stream_id);
        let (commands, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_stream_commands(self.client.clone(), url, rx));
        Ok(Box::new(MediaServerStream { commands }))
    }
}

#[derive(Debug)]
enum StreamCommand {
    Tracks(serde_json::Value),
    Release,
}

/// Sends track switches and the final release to the recorder one at a time,
/// in the order they were issued. Ends after `Release` or when the stream is
/// gone.
async fn run_stream_commands(
    client: Client,
    url: String,
    mut rx: mpsc::UnboundedReceiver<StreamCommand>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            StreamCommand::Tracks(body) => {
                if let Err(e) = client.patch(&url).json(&body).send().await {
                    warn!("Recorder track update failed for {url}: {e}");
                }
            }
            StreamCommand::Release => {
                if let Err(e) = client.delete(&url).send().await {
                    warn!("Recorder release failed for {url}: {e}");
                }
                break;
            }
        }
    }
    debug!("Recorder stream {url} closed");
}

struct MediaServerStream {
    commands: mpsc::UnboundedSender<StreamCommand>,
}

impl MediaServerStream {
    fn send(&self, command: StreamCommand) {
        if self.commands.send(command).is_err() {
            warn!("Recorder stream worker is gone; command dropped");
        }
    }
}

impl CaptureStream for MediaServerStream {
    fn set_audio_enabled(&mut self, enabled: bool) {
        self.send(StreamCommand::Tracks(serde_json::json!({ "audio": enabled })));
    }

    fn set_video_enabled(&mut self, enabled: bool) {
        self.send(StreamCommand::Tracks(serde_json::json!({ "video": enabled })));
    }

    fn release(&mut self) {
        self.send(StreamCommand::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Log {
        events: Vec<String>,
    }

    struct FakeStream(Arc<Mutex<Log>>);

    impl CaptureStream for FakeStream {
        fn set_audio_enabled(&mut self, enabled: bool) {
            self.0.lock().unwrap().events.push(format!("audio:{enabled}"));
        }
        fn set_video_enabled(&mut self, enabled: bool) {
            self.0.lock().unwrap().events.push(format!("video:{enabled}"));
        }
        fn release(&mut self) {
            self.0.lock().unwrap().events.push("release".to_string());
        }
    }

    struct FakeDevice(Arc<Mutex<Log>>);

    #[async_trait]
    impl CaptureDevice for FakeDevice {
        async fn acquire(&self) -> Result<Box<dyn CaptureStream>, DeviceAccessError> {
            Ok(Box::new(FakeStream(self.0.clone())))
        }
    }

    fn releases(log: &Arc<Mutex<Log>>) -> usize {
        log.lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| *e == "release")
            .count()
    }

    #[tokio::test]
    async fn test_start_enables_both_tracks() {
        let log = Arc::new(Mutex::new(Log::default()));
        let mut recorder = RecordingController::new();
        recorder.attach(FakeDevice(log.clone()).acquire().await).unwrap();
        assert!(recorder.is_recording());
        assert!(recorder.is_audio_enabled());
        assert!(recorder.is_video_enabled());
    }

    #[tokio::test]
    async fn test_denied_device_degrades_to_text_only() {
        let mut recorder = RecordingController::new();
        let err = recorder
            .attach(UnavailableDevice.acquire().await)
            .unwrap_err();
        assert_eq!(err, DeviceAccessError::Unavailable);
        assert!(!recorder.is_recording());
        assert!(!recorder.is_audio_enabled());
        assert!(!recorder.is_video_enabled());
    }

    #[tokio::test]
    async fn test_toggles_are_independent() {
        let log = Arc::new(Mutex::new(Log::default()));
        let mut recorder = RecordingController::new();
        recorder.attach(FakeDevice(log.clone()).acquire().await).unwrap();

        assert!(!recorder.toggle_audio());
        assert!(recorder.is_video_enabled());
        assert!(!recorder.toggle_video());
        assert!(recorder.toggle_audio());
        assert!(!recorder.is_video_enabled());
    }

    #[test]
    fn test_toggle_without_stream_stays_off() {
        let mut recorder = RecordingController::new();
        assert!(!recorder.toggle_audio());
        assert!(!recorder.toggle_video());
    }

    #[tokio::test]
    async fn test_stop_releases_once() {
        let log = Arc::new(Mutex::new(Log::default()));
        let mut recorder = RecordingController::new();
        recorder.attach(FakeDevice(log.clone()).acquire().await).unwrap();

        recorder.stop();
        recorder.stop();
        assert_eq!(releases(&log), 1);
        assert!(!recorder.is_audio_enabled());
    }

    #[tokio::test]
    async fn test_drop_releases_device() {
        let log = Arc::new(Mutex::new(Log::default()));
        {
            let mut recorder = RecordingController::new();
            recorder.attach(FakeDevice(log.clone()).acquire().await).unwrap();
        }
        assert_eq!(releases(&log), 1);
    }

    #[tokio::test]
    async fn test_second_attach_releases_the_extra_stream() {
        let log = Arc::new(Mutex::new(Log::default()));
        let mut recorder = RecordingController::new();
        let device = FakeDevice(log.clone());
        recorder.attach(device.acquire().await).unwrap();
        recorder.attach(device.acquire().await).unwrap();
        assert_eq!(releases(&log), 1);
        assert!(recorder.is_recording());

        drop(recorder);
        assert_eq!(releases(&log), 2);
    }

    struct PromptNeverAnswered;

    #[async_trait]
    impl CaptureDevice for PromptNeverAnswered {
        async fn acquire(&self) -> Result<Box<dyn CaptureStream>, DeviceAccessError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquisition_gives_up_after_the_limit() {
        let limit = Duration::from_secs(5);
        let err = acquire_within(&PromptNeverAnswered, limit)
            .await
            .err()
            .unwrap();
        assert_eq!(err, DeviceAccessError::TimedOut(limit));

        let mut recorder = RecordingController::new();
        assert!(recorder.attach(Err(err)).is_err());
        assert!(!recorder.is_recording());
    }

    // ── recorder sidecar over HTTP ──────────────────────────────────────────

    type RequestLog = Arc<Mutex<Vec<String>>>;

    async fn spawn_recorder(deny: bool) -> (String, RequestLog) {
        use axum::extract::State;
        use axum::http::StatusCode;
        use axum::routing::{patch, post};
        use axum::{Json, Router};

        async fn open(
            State((log, deny)): State<(RequestLog, bool)>,
        ) -> Result<Json<serde_json::Value>, (StatusCode, &'static str)> {
            log.lock().unwrap().push("POST".to_string());
            if deny {
                return Err((StatusCode::FORBIDDEN, "user declined"));
            }
            Ok(Json(serde_json::json!({ "stream_id": "s1" })))
        }

        async fn tracks(
            State((log, _)): State<(RequestLog, bool)>,
            Json(body): Json<serde_json::Value>,
        ) -> StatusCode {
            log.lock().unwrap().push(format!("PATCH {body}"));
            StatusCode::NO_CONTENT
        }

        async fn close(State((log, _)): State<(RequestLog, bool)>) -> StatusCode {
            log.lock().unwrap().push("DELETE".to_string());
            StatusCode::NO_CONTENT
        }

        let log: RequestLog = Arc::default();
        let app = Router::new()
            .route("/streams", post(open))
            .route("/streams/:id", patch(tracks).delete(close))
            .with_state((log.clone(), deny));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (format!("http://{addr}"), log)
    }

    #[tokio::test]
    async fn test_media_server_requests_arrive_in_issue_order() {
        let (base_url, log) = spawn_recorder(false).await;
        let device = MediaServerDevice::new(base_url).unwrap();

        let mut stream = device.acquire().await.unwrap();
        stream.set_audio_enabled(false);
        stream.set_video_enabled(false);
        stream.set_audio_enabled(true);
        stream.release();

        for _ in 0..200 {
            if log.lock().unwrap().len() == 5 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "POST".to_string(),
                r#"PATCH {"audio":false}"#.to_string(),
                r#"PATCH {"video":false}"#.to_string(),
                r#"PATCH {"audio":true}"#.to_string(),
                "DELETE".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_media_server_forbidden_means_denied() {
        let (base_url, _log) = spawn_recorder(true).await;
        let device = MediaServerDevice::new(base_url).unwrap();
        let err = device.acquire().await.err().unwrap();
        assert_eq!(err, DeviceAccessError::Denied("user declined".to_string()));
    }
}
