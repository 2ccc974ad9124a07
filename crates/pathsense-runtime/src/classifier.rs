//! [`SceneClassifier`] – turns a still camera frame into a [`SceneAnalysis`].
//!
//! Two implementations ship:
//!
//! - [`GeminiClassifier`] – posts the frame to a Gemini-style
//!   `generateContent` endpoint with a JSON response schema.
//! - [`MockClassifier`] – waits a fixed latency and returns a canned result.
//!   Used whenever no API key is configured.
//!
//! Callers on the navigation path go through [`classify_with_fallback`],
//! which bounds the call with a timeout and converts every failure into
//! [`SceneAnalysis::placeholder`].  A scan therefore always produces a
//! result.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use pathsense_runtime::classifier::{MockClassifier, classify_with_fallback};
//!
//! # async fn demo() {
//! let classifier = MockClassifier::default();
//! let analysis = classify_with_fallback(&classifier, None, Duration::from_secs(5)).await;
//! assert_eq!(analysis.location_context, "IOBM Main Corridor - Block B");
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use pathsense_hal::camera::CameraFrame;
use pathsense_types::{NavError, SceneAnalysis};
use schemars::r#gen::SchemaSettings;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Default inference endpoint.
pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com";
/// Default multimodal model.
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
/// Latency of [`MockClassifier`].
pub const MOCK_LATENCY: Duration = Duration::from_secs(2);

/// Instruction sent next to the frame.
pub const LOCATION_PROMPT: &str = "\
You are PathSense AR, an indoor navigation AI for IOBM university.
Analyze this image frame from a student's camera.
Identify if there are corridors, doors, or signs.";

const UNKNOWN_AREA: &str = "Unknown Area";
const DEFAULT_CONFIDENCE: f32 = 0.5;

// ─────────────────────────────────────────────────────────────────────────────
// Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Location recognition from a single frame.
#[async_trait]
pub trait SceneClassifier: Send + Sync {
    /// Short name for logs, e.g. `"gemini"`.
    fn name(&self) -> &str;

    /// Classify `frame`.  `None` means no frame could be captured.
    ///
    /// # Errors
    ///
    /// [`NavError::Classification`] when the endpoint is unreachable or its
    /// reply has no usable content.
    async fn classify(&self, frame: Option<&CameraFrame>) -> Result<SceneAnalysis, NavError>;
}

/// Classify with a time bound; any failure degrades to the placeholder.
pub async fn classify_with_fallback(
    classifier: &dyn SceneClassifier,
    frame: Option<&CameraFrame>,
    timeout: Duration,
) -> SceneAnalysis {
    match tokio::time::timeout(timeout, classifier.classify(frame)).await {
        Ok(Ok(analysis)) => analysis.clamp_confidence(),
        Ok(Err(e)) => {
            warn!(classifier = classifier.name(), error = %e, "classification failed; using placeholder");
            SceneAnalysis::placeholder()
        }
        Err(_) => {
            warn!(
                classifier = classifier.name(),
                timeout_ms = timeout.as_millis() as u64,
                "classification timed out; using placeholder"
            );
            SceneAnalysis::placeholder()
        }
    }
}

/// Settings needed to pick a classifier.
#[derive(Debug, Clone, Default)]
pub struct ClassifierSettings {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub model: Option<String>,
}

/// Gemini when an API key is present, otherwise the mock.
pub fn classifier_from_config(settings: &ClassifierSettings) -> Arc<dyn SceneClassifier> {
    match settings.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => {
            let classifier = GeminiClassifier::new(
                settings.api_url.as_deref().unwrap_or(DEFAULT_API_URL),
                settings.model.as_deref().unwrap_or(DEFAULT_MODEL),
                key,
            );
            info!(model = %classifier.model, "using remote scene classifier");
            Arc::new(classifier)
        }
        _ => {
            warn!("no API key configured; using mock scene classifier");
            Arc::new(MockClassifier::default())
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock
// ─────────────────────────────────────────────────────────────────────────────

/// Offline stand-in returning [`SceneAnalysis::canned`].
#[derive(Debug, Clone)]
pub struct MockClassifier {
    latency: Duration,
}

impl MockClassifier {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new(MOCK_LATENCY)
    }
}

#[async_trait]
impl SceneClassifier for MockClassifier {
    fn name(&self) -> &str {
        "mock"
    }

    async fn classify(&self, _frame: Option<&CameraFrame>) -> Result<SceneAnalysis, NavError> {
        tokio::time::sleep(self.latency).await;
        Ok(SceneAnalysis::canned())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire shapes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Content,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum Part {
    InlineData {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: &'static str,
    },
    Text(String),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: serde_json::Value,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// Lenient view of the model's JSON; absent fields get defaults.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    #[serde(default)]
    location_context: Option<String>,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    detected_features: Option<Vec<String>>,
}

// ─────────────────────────────────────────────────────────────────────────────
// GeminiClassifier
// ─────────────────────────────────────────────────────────────────────────────

/// Remote multimodal classifier.
pub struct GeminiClassifier {
    base_url: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiClassifier {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }

    fn request_body(frame: &CameraFrame) -> GenerateRequest {
        GenerateRequest {
            contents: Content {
                parts: vec![
                    Part::InlineData {
                        data: BASE64.encode(&frame.data),
                        mime_type: frame.format.mime_type(),
                    },
                    Part::Text(LOCATION_PROMPT.to_string()),
                ],
            },
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: response_schema(),
            },
        }
    }
}

#[async_trait]
impl SceneClassifier for GeminiClassifier {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn classify(&self, frame: Option<&CameraFrame>) -> Result<SceneAnalysis, NavError> {
        let frame = frame.ok_or_else(|| NavError::Classification("no camera frame".into()))?;
        let body = Self::request_body(frame);
        debug!(model = %self.model, bytes = frame.data.len(), "sending frame for classification");

        let response = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| NavError::Classification(format!("request failed: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NavError::Classification(format!("HTTP {status}")));
        }

        let reply: GenerateResponse = response
            .json()
            .await
            .map_err(|e| NavError::Classification(format!("bad response body: {}", e.without_url())))?;

        let text = reply
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().find_map(|p| p.text))
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| NavError::Classification("no response text".into()))?;

        Ok(parse_analysis(&text))
    }
}

/// Interpret the model's reply text.
///
/// Missing fields take defaults; text that is not a JSON object yields
/// [`SceneAnalysis::unparsed`].
pub fn parse_analysis(text: &str) -> SceneAnalysis {
    match serde_json::from_str::<RawAnalysis>(text) {
        Ok(raw) => SceneAnalysis {
            location_context: raw
                .location_context
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_AREA.to_string()),
            confidence: raw.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            detected_features: raw.detected_features.unwrap_or_default(),
        }
        .clamp_confidence(),
        Err(e) => {
            warn!(error = %e, "classifier reply was not valid JSON");
            SceneAnalysis::unparsed()
        }
    }
}

/// OpenAPI-flavoured schema of [`SceneAnalysis`] for `responseSchema`.
pub fn response_schema() -> serde_json::Value {
    let settings = SchemaSettings::openapi3().with(|s| {
        s.inline_subschemas = true;
        s.meta_schema = None;
    });
    let root = settings.into_generator().into_root_schema_for::<SceneAnalysis>();
    serde_json::to_value(root.schema).unwrap_or(serde_json::Value::Null)
}
