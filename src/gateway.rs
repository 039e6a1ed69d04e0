//! Client for the remote sentiment service.
//!
//! Both operations share one in-flight flag: while a call is running, any
//! other call on the same gateway (or a clone of it) fails with
//! [`AnalysisError::Busy`] without touching the network.

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AnalysisError;
use crate::state::{Sentiment, SentimentMetadata};

pub const TEXT_ENDPOINT: &str = "/api/sentiment/text";
pub const CSV_ENDPOINT: &str = "/api/sentiment/csv";

#[derive(Serialize)]
struct TextRequest<'a> {
    text: &'a str,
}

/// FastAPI error body. `detail` is a string for handler errors and a list for
/// validation errors.
#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SentimentResult {
    pub sentiment: Sentiment,
    pub clean_text: String,
    pub insight: String,
}

impl From<SentimentResult> for SentimentMetadata {
    fn from(result: SentimentResult) -> Self {
        SentimentMetadata {
            sentiment: result.sentiment,
            clean_text: result.clean_text,
            insight: result.insight,
        }
    }
}

/// A CSV file to upload for batch analysis.
#[derive(Debug, Clone)]
pub struct CsvUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl CsvUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self, AnalysisError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                AnalysisError::request_failed(format!("{} is not a file", path.display()))
            })?;

        let bytes = tokio::fs::read(path).await.map_err(|e| {
            AnalysisError::request_failed(format!("Could not read {}: {}", path.display(), e))
        })?;

        Ok(Self { file_name, bytes })
    }
}

/// Shared "analysis in progress" flag.
#[derive(Debug, Clone, Default)]
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn acquire(&self) -> Option<InFlightGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard(self.0.clone()))
    }
}

/// Clears the flag when the call settles or its future is dropped.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Analyzed CSV payload behind a downloadable handle.
///
/// The handle must be released once the download has been triggered.
/// Dropping an unreleased artifact releases it too.
pub struct Artifact {
    handle: String,
    bytes: Vec<u8>,
    live: Arc<AtomicUsize>,
    released: bool,
}

impl Artifact {
    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn release(mut self) {
        self.revoke();
    }

    fn revoke(&mut self) {
        if !self.released {
            self.released = true;
            self.live.fetch_sub(1, Ordering::AcqRel);
            debug!(handle = %self.handle, "artifact released");
        }
    }
}

impl Drop for Artifact {
    fn drop(&mut self) {
        if !self.released {
            warn!(handle = %self.handle, "artifact dropped without release");
            self.revoke();
        }
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("handle", &self.handle)
            .field("len", &self.bytes.len())
            .field("released", &self.released)
            .finish()
    }
}

#[derive(Clone)]
pub struct AnalysisGateway {
    client: Client,
    base_url: String,
    in_flight: InFlight,
    live_artifacts: Arc<AtomicUsize>,
}

impl AnalysisGateway {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            in_flight: InFlight::default(),
            live_artifacts: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// True while a text or CSV analysis is running.
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_set()
    }

    /// Number of artifacts handed out and not yet released.
    pub fn live_artifacts(&self) -> usize {
        self.live_artifacts.load(Ordering::Acquire)
    }

    pub async fn analyze_text(&self, text: &str) -> Result<SentimentResult, AnalysisError> {
        let _guard = self.in_flight.acquire().ok_or(AnalysisError::Busy)?;
        let url = format!("{}{}", self.base_url, TEXT_ENDPOINT);
        debug!(%url, chars = text.chars().count(), "analyzing text");

        let response = self
            .client
            .post(&url)
            .json(&TextRequest { text })
            .send()
            .await?;

        let response = ensure_success(response, "Failed to analyze text").await?;
        let result: SentimentResult = response.json().await?;

        info!(sentiment = %result.sentiment, "text analysis complete");
        Ok(result)
    }

    pub async fn analyze_csv(&self, upload: CsvUpload) -> Result<Artifact, AnalysisError> {
        let _guard = self.in_flight.acquire().ok_or(AnalysisError::Busy)?;
        let url = format!("{}{}", self.base_url, CSV_ENDPOINT);
        debug!(%url, file = %upload.file_name, bytes = upload.bytes.len(), "analyzing csv");

        let part = Part::bytes(upload.bytes)
            .file_name(upload.file_name.clone())
            .mime_str("text/csv")?;
        let form = Form::new().part("file", part);

        let response = self.client.post(&url).multipart(form).send().await?;
        let response = ensure_success(response, "Failed to analyze CSV").await?;
        let bytes = response.bytes().await?.to_vec();

        info!(file = %upload.file_name, bytes = bytes.len(), "csv analysis complete");
        Ok(self.register_artifact(bytes))
    }

    fn register_artifact(&self, bytes: Vec<u8>) -> Artifact {
        self.live_artifacts.fetch_add(1, Ordering::AcqRel);
        Artifact {
            handle: format!("blob:{}", Uuid::new_v4()),
            bytes,
            live: self.live_artifacts.clone(),
            released: false,
        }
    }
}

async fn ensure_success(response: Response, context: &str) -> Result<Response, AnalysisError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .map(|body| match body.detail {
            serde_json::Value::String(detail) => detail,
            other => other.to_string(),
        });

    warn!(%status, ?detail, "{}", context);
    Err(AnalysisError::RequestFailed(match detail {
        Some(detail) => format!("{} ({}): {}", context, status, detail),
        None => format!("{} ({})", context, status),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn test_analyze_text_returns_fields_verbatim() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", TEXT_ENDPOINT)
            .match_body(Matcher::Json(json!({ "text": "Sản phẩm này rất tốt" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "input_text": "Sản phẩm này rất tốt",
                    "label": 2,
                    "sentiment": "positive",
                    "clean_text": "san pham nay rat tot",
                    "insight": "Customer satisfaction expressed"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let gateway = AnalysisGateway::new(&server.url());
        let result = gateway.analyze_text("Sản phẩm này rất tốt").await.unwrap();

        assert_eq!(result.sentiment, Sentiment::Positive);
        assert_eq!(result.clean_text, "san pham nay rat tot");
        assert_eq!(result.insight, "Customer satisfaction expressed");
        assert!(!gateway.is_busy());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_analyze_text_keeps_unknown_label() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", TEXT_ENDPOINT)
            .with_status(200)
            .with_body(r#"{"sentiment":"mixed","clean_text":"x","insight":"y"}"#)
            .create_async()
            .await;

        let gateway = AnalysisGateway::new(&server.url());
        let result = gateway.analyze_text("x").await.unwrap();
        assert_eq!(result.sentiment, Sentiment::Other("mixed".to_string()));
    }

    #[tokio::test]
    async fn test_non_success_status_is_request_failed_with_detail() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", CSV_ENDPOINT)
            .with_status(400)
            .with_body(r#"{"detail":"CSV phải có cột 'comment'"}"#)
            .create_async()
            .await;

        let gateway = AnalysisGateway::new(&server.url());
        let err = gateway
            .analyze_csv(CsvUpload::new("reviews.csv", b"text\nhi\n".to_vec()))
            .await
            .unwrap_err();

        match err {
            AnalysisError::RequestFailed(message) => {
                assert!(message.starts_with("Failed to analyze CSV (400"));
                assert!(message.ends_with("CSV phải có cột 'comment'"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!gateway.is_busy());
        assert_eq!(gateway.live_artifacts(), 0);
    }

    #[tokio::test]
    async fn test_server_error_without_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", TEXT_ENDPOINT)
            .with_status(500)
            .create_async()
            .await;

        let gateway = AnalysisGateway::new(&format!("{}/", server.url()));
        let err = gateway.analyze_text("hello").await.unwrap_err();
        assert!(err.to_string().starts_with("Failed to analyze text (500"));
        assert!(!gateway.is_busy());
    }

    #[tokio::test]
    async fn test_transport_failure_is_request_failed() {
        let gateway = AnalysisGateway::new("http://127.0.0.1:1");
        let err = gateway.analyze_text("hello").await.unwrap_err();
        assert!(matches!(err, AnalysisError::RequestFailed(ref m) if !m.is_empty()));
        assert!(!gateway.is_busy());
    }

    #[tokio::test]
    async fn test_analyze_csv_sends_multipart_and_tracks_artifact() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", CSV_ENDPOINT)
            .match_header("content-type", Matcher::Regex("multipart/form-data".to_string()))
            .match_body(Matcher::Regex(
                r#"name="file"; filename="reviews.csv""#.to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "text/csv; charset=utf-8")
            .with_body("comment,sentiment\nhay,positive\n")
            .create_async()
            .await;

        let gateway = AnalysisGateway::new(&server.url());
        let artifact = gateway
            .analyze_csv(CsvUpload::new("reviews.csv", b"comment\nhay\n".to_vec()))
            .await
            .unwrap();

        assert!(artifact.handle().starts_with("blob:"));
        assert_eq!(artifact.bytes(), b"comment,sentiment\nhay,positive\n");
        assert_eq!(gateway.live_artifacts(), 1);

        artifact.release();
        assert_eq!(gateway.live_artifacts(), 0);
        mock.assert_async().await;
    }

    #[test]
    fn test_dropped_artifact_is_released() {
        let gateway = AnalysisGateway::new("http://localhost");
        let artifact = gateway.register_artifact(vec![1, 2, 3]);
        assert_eq!(gateway.live_artifacts(), 1);
        drop(artifact);
        assert_eq!(gateway.live_artifacts(), 0);
    }

    #[tokio::test]
    async fn test_text_and_csv_calls_never_overlap() {
        let mut server = mockito::Server::new_async().await;
        let text_mock = server
            .mock("POST", TEXT_ENDPOINT)
            .with_status(200)
            .with_body(r#"{"sentiment":"neutral","clean_text":"a","insight":"b"}"#)
            .expect(1)
            .create_async()
            .await;
        let csv_mock = server
            .mock("POST", CSV_ENDPOINT)
            .expect(0)
            .create_async()
            .await;

        let gateway = AnalysisGateway::new(&server.url());
        let (text, csv) = tokio::join!(
            gateway.analyze_text("a"),
            gateway.analyze_csv(CsvUpload::new("a.csv", b"comment\na\n".to_vec())),
        );

        assert!(text.is_ok());
        assert!(matches!(csv, Err(AnalysisError::Busy)));
        assert!(!gateway.is_busy());
        text_mock.assert_async().await;
        csv_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_from_missing_path_fails() {
        let err = CsvUpload::from_path(Path::new("/definitely/not/here.csv"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Could not read"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_upload_keeps_non_utf8_file_name() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(OsStr::from_bytes(b"caf\xe9.csv"));
        std::fs::write(&path, "comment\nngon\n").unwrap();

        let upload = CsvUpload::from_path(&path).await.unwrap();
        assert_eq!(upload.file_name, "caf\u{FFFD}.csv");
        assert_eq!(upload.bytes, b"comment\nngon\n");
    }
}
