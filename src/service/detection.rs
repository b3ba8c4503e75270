//! Fallacy classification service client
//!
//! Thin wrapper over the external classifier. Detection is best-effort
//! enrichment: every public call degrades to "no result" instead of
//! returning an error to the caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::model::{Annotation, DetectionConfig, LabeledText, TopicContext};

#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),

    #[error("Request timed out")]
    Timeout,

    #[error("Unexpected status {0}")]
    Status(u16),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Request rejected by service: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for DetectionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DetectionError::Timeout
        } else if err.is_decode() {
            DetectionError::Parse(err.to_string())
        } else {
            DetectionError::Http(err)
        }
    }
}

/// Body of `POST {base}/detect`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionRequest {
    pub text: String,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_description: Option<String>,
}

impl DetectionRequest {
    pub fn new(text: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: language.into(),
            topic_title: None,
            topic_description: None,
        }
    }

    pub fn with_topic(mut self, topic: TopicContext) -> Self {
        self.topic_title = topic.title;
        self.topic_description = topic.description;
        self
    }
}

// Response models - only the fields we need
#[derive(Debug, Deserialize)]
struct DetectResponse {
    has_fallacy: bool,
    #[serde(default)]
    fallacy_type: Option<String>,
    confidence: f64,
    explanation: String,
}

impl DetectResponse {
    /// A positive judgment without a fallacy type is treated as malformed
    fn into_annotation(self) -> Result<Annotation, DetectionError> {
        let fallacy_type = self.fallacy_type.filter(|t| !t.trim().is_empty());

        if self.has_fallacy && fallacy_type.is_none() {
            return Err(DetectionError::Parse(
                "has_fallacy=true without fallacy_type".to_string(),
            ));
        }

        Ok(Annotation {
            has_fallacy: self.has_fallacy,
            fallacy_type,
            confidence: self.confidence,
            explanation: self.explanation,
        })
    }
}

#[derive(Debug, Serialize)]
struct BatchDetectRequest<'a> {
    texts: &'a [String],
    language: &'a str,
}

#[derive(Debug, Deserialize)]
struct BatchDetectResponse {
    results: Vec<DetectResponse>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
}

#[derive(Debug, Serialize)]
struct RetrainRequest<'a> {
    training_data: &'a [LabeledText],
}

/// Anything that can classify a single text
#[async_trait]
pub trait FallacyDetector: Send + Sync {
    async fn classify(&self, request: &DetectionRequest) -> Result<Annotation, DetectionError>;
}

/// The batch retraining endpoint
#[async_trait]
pub trait RetrainingEndpoint: Send + Sync {
    /// Submit one batch; `Ok` only when the service reports success
    async fn submit_batch(&self, batch: &[LabeledText]) -> Result<(), DetectionError>;
}

/// Result of a detection run as seen by background completions
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionOutcome {
    Detected(Annotation),
    /// The call exceeded the configured timeout
    TimedOut,
    /// Transport failure, non-success status or malformed response
    Unavailable(String),
}

impl DetectionOutcome {
    pub fn into_annotation(self) -> Option<Annotation> {
        match self {
            DetectionOutcome::Detected(annotation) => Some(annotation),
            _ => None,
        }
    }
}

/// Classify with an upper bound on wall time.
///
/// Both the local deadline and a transport-level timeout map to
/// [`DetectionOutcome::TimedOut`].
pub async fn run_detection(
    detector: &dyn FallacyDetector,
    request: &DetectionRequest,
    timeout: Duration,
) -> DetectionOutcome {
    match tokio::time::timeout(timeout, detector.classify(request)).await {
        Ok(Ok(annotation)) => DetectionOutcome::Detected(annotation),
        Ok(Err(DetectionError::Timeout)) | Err(_) => DetectionOutcome::TimedOut,
        Ok(Err(e)) => DetectionOutcome::Unavailable(e.to_string()),
    }
}

/// Client for the fallacy detection service
pub struct DetectionClient {
    client: Client,
    config: DetectionConfig,
}

impl DetectionClient {
    /// Create a new client; requests are bounded by `config.timeout_ms`
    pub fn new(config: DetectionConfig) -> Result<Self, DetectionError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(DetectionError::Http)?;

        tracing::debug!(url = %config.service_url, timeout_ms = config.timeout_ms, "Fallacy detection client configured");

        Ok(Self { client, config })
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    pub fn language(&self) -> &str {
        &self.config.language
    }

    /// Classify one text synchronously.
    ///
    /// Returns `None` on any failure; the cause is logged.
    pub async fn detect(
        &self,
        text: &str,
        language: &str,
        topic_title: Option<&str>,
        topic_description: Option<&str>,
    ) -> Option<Annotation> {
        let request = DetectionRequest {
            text: text.to_string(),
            language: language.to_string(),
            topic_title: topic_title.map(str::to_string),
            topic_description: topic_description.map(str::to_string),
        };

        match self.classify(&request).await {
            Ok(annotation) => Some(annotation),
            Err(DetectionError::Timeout) => {
                tracing::warn!(timeout_ms = self.config.timeout_ms, "Fallacy detection timed out");
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "Error calling fallacy detection service");
                None
            }
        }
    }

    /// Schedule detection on the runtime's worker pool.
    ///
    /// Standalone entry point for one-off callers; argument annotation goes
    /// through `AnnotationQueue` instead.
    ///
    /// The returned handle resolves on a worker thread, never on the caller's.
    pub fn detect_async(self: &Arc<Self>, request: DetectionRequest) -> JoinHandle<DetectionOutcome> {
        let client = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = run_detection(client.as_ref(), &request, client.timeout()).await;
            match &outcome {
                DetectionOutcome::Detected(a) => {
                    tracing::debug!(has_fallacy = a.has_fallacy, fallacy_type = ?a.fallacy_type, "Fallacy detection result")
                }
                DetectionOutcome::TimedOut => {
                    tracing::warn!(timeout_ms = client.config.timeout_ms, "Fallacy detection timed out")
                }
                DetectionOutcome::Unavailable(e) => {
                    tracing::error!(error = %e, "Fallacy detection failed")
                }
            }
            outcome
        })
    }

    /// Classify several texts in one call.
    ///
    /// Any failure, including a single malformed item, yields an empty list.
    pub async fn batch_detect(&self, texts: &[String], language: &str) -> Vec<Annotation> {
        match self.try_batch_detect(texts, language).await {
            Ok(annotations) => annotations,
            Err(e) => {
                tracing::error!(error = %e, count = texts.len(), "Error calling batch fallacy detection service");
                Vec::new()
            }
        }
    }

    async fn try_batch_detect(
        &self,
        texts: &[String],
        language: &str,
    ) -> Result<Vec<Annotation>, DetectionError> {
        let url = self.config.endpoint("detect/batch");

        tracing::debug!(url = %url, count = texts.len(), "Calling batch fallacy detection service");

        let response = self
            .client
            .post(&url)
            .json(&BatchDetectRequest { texts, language })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DetectionError::Status(response.status().as_u16()));
        }

        let body: BatchDetectResponse = response.json().await?;
        body.results
            .into_iter()
            .map(DetectResponse::into_annotation)
            .collect()
    }

    /// Operational probe; true only for `{"status": "healthy"}`
    pub async fn health_check(&self) -> bool {
        let url = self.config.endpoint("health");

        let result: Result<StatusResponse, DetectionError> = async {
            let response = self.client.get(&url).send().await?;
            if !response.status().is_success() {
                return Err(DetectionError::Status(response.status().as_u16()));
            }
            Ok(response.json().await?)
        }
        .await;

        match result {
            Ok(body) => body.status == "healthy",
            Err(e) => {
                tracing::error!(error = %e, url = %url, "Health check failed");
                false
            }
        }
    }

    /// Submit a retraining batch; true only when the service reports success.
    ///
    /// Standalone entry point; the retraining cycle uses `submit_batch`.
    pub async fn retrain(&self, batch: &[LabeledText]) -> bool {
        match self.submit_batch(batch).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, count = batch.len(), "Failed to trigger retraining");
                false
            }
        }
    }
}

#[async_trait]
impl FallacyDetector for DetectionClient {
    async fn classify(&self, request: &DetectionRequest) -> Result<Annotation, DetectionError> {
        let url = self.config.endpoint("detect");

        tracing::debug!(url = %url, has_topic = request.topic_title.is_some(), "Calling fallacy detection service");

        let response = self.client.post(&url).json(request).send().await?;

        if !response.status().is_success() {
            return Err(DetectionError::Status(response.status().as_u16()));
        }

        let body: DetectResponse = response.json().await?;
        body.into_annotation()
    }
}

#[async_trait]
impl RetrainingEndpoint for DetectionClient {
    async fn submit_batch(&self, batch: &[LabeledText]) -> Result<(), DetectionError> {
        let url = self.config.endpoint("retrain");

        tracing::debug!(url = %url, count = batch.len(), "Submitting retraining batch");

        let response = self
            .client
            .post(&url)
            .json(&RetrainRequest {
                training_data: batch,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DetectionError::Status(response.status().as_u16()));
        }

        let body: StatusResponse = response.json().await?;
        if body.status == "success" {
            Ok(())
        } else {
            Err(DetectionError::Rejected(body.status))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, HttpResponse, HttpServer, rt, web};
    use serde_json::{Value, json};
    use url::Url;

    async fn mock_detect(body: web::Json<Value>) -> HttpResponse {
        match body["text"].as_str().unwrap_or_default() {
            "slow" => {
                rt::time::sleep(Duration::from_secs(3)).await;
                HttpResponse::Ok().json(json!({"has_fallacy": false, "confidence": 0.1, "explanation": ""}))
            }
            "broken" => HttpResponse::InternalServerError().finish(),
            "garbage" => HttpResponse::Ok().content_type("application/json").body("{not json"),
            "untyped" => HttpResponse::Ok().json(json!({"has_fallacy": true, "confidence": 0.7, "explanation": "x"})),
            "unexplained" => HttpResponse::Ok().json(json!({"has_fallacy": true, "fallacy_type": "ad_hominem"})),
            _ if body.get("topic_title").is_some() => HttpResponse::Ok().json(json!({
                "has_fallacy": true,
                "fallacy_type": "red_herring",
                "confidence": 0.66,
                "explanation": "drifts off topic"
            })),
            _ => HttpResponse::Ok().json(json!({
                "has_fallacy": true,
                "fallacy_type": "ad_hominem",
                "confidence": 0.9,
                "explanation": "attacks the person"
            })),
        }
    }

    async fn mock_batch(body: web::Json<Value>) -> HttpResponse {
        let texts = body["texts"].as_array().cloned().unwrap_or_default();
        if texts.iter().any(|t| t == "broken") {
            return HttpResponse::BadGateway().finish();
        }
        let results: Vec<Value> = texts
            .iter()
            .map(|t| {
                if t == "untyped" {
                    json!({"has_fallacy": true, "confidence": 0.5, "explanation": ""})
                } else {
                    json!({"has_fallacy": false, "fallacy_type": null, "confidence": 0.8, "explanation": "sound"})
                }
            })
            .collect();
        HttpResponse::Ok().json(json!({ "results": results }))
    }

    async fn mock_health() -> HttpResponse {
        HttpResponse::Ok().json(json!({"status": "healthy"}))
    }

    async fn mock_retrain(body: web::Json<Value>) -> HttpResponse {
        let data = body["training_data"].as_array().cloned().unwrap_or_default();
        if data.is_empty() {
            HttpResponse::Ok().json(json!({"status": "error"}))
        } else {
            HttpResponse::Ok().json(json!({"status": "success"}))
        }
    }

    fn spawn_mock_classifier() -> Url {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = HttpServer::new(|| {
            App::new()
                .route("/api/v1/detect", web::post().to(mock_detect))
                .route("/api/v1/detect/batch", web::post().to(mock_batch))
                .route("/api/v1/health", web::get().to(mock_health))
                .route("/api/v1/retrain", web::post().to(mock_retrain))
        })
        .workers(2)
        .listen(listener)
        .unwrap()
        .run();
        rt::spawn(server);

        Url::parse(&format!("http://127.0.0.1:{}/api/v1", port)).unwrap()
    }

    fn client_for(service_url: Url, timeout_ms: u64) -> DetectionClient {
        DetectionClient::new(DetectionConfig {
            service_url,
            timeout_ms,
            language: "ko".to_string(),
        })
        .unwrap()
    }

    #[actix_web::test]
    async fn test_detect_parses_judgment() {
        let client = client_for(spawn_mock_classifier(), 2000);

        let annotation = client.detect("You're an idiot, so you're wrong", "en", None, None).await;

        assert_eq!(
            annotation,
            Some(Annotation::fallacy("ad_hominem", 0.9, "attacks the person"))
        );
    }

    #[actix_web::test]
    async fn test_detect_forwards_topic_context() {
        let client = client_for(spawn_mock_classifier(), 2000);

        let annotation = client
            .detect("But what about the budget?", "en", Some("School uniforms"), None)
            .await
            .unwrap();

        assert_eq!(annotation.fallacy_type.as_deref(), Some("red_herring"));
    }

    #[actix_web::test]
    async fn test_detect_failures_degrade_to_none() {
        let client = client_for(spawn_mock_classifier(), 2000);

        for text in ["broken", "garbage", "untyped", "unexplained"] {
            assert_eq!(client.detect(text, "ko", None, None).await, None, "text: {}", text);
        }
    }

    #[actix_web::test]
    async fn test_detect_unreachable_service() {
        // Port 9 (discard) is not served by anything in the test environment
        let client = client_for(Url::parse("http://127.0.0.1:9/api/v1").unwrap(), 500);
        assert_eq!(client.detect("text", "ko", None, None).await, None);
        assert!(!client.health_check().await);
    }

    #[actix_web::test]
    async fn test_detect_async_reports_timeout() {
        let client = Arc::new(client_for(spawn_mock_classifier(), 200));

        let outcome = client
            .detect_async(DetectionRequest::new("slow", "ko"))
            .await
            .unwrap();

        assert_eq!(outcome, DetectionOutcome::TimedOut);
    }

    #[actix_web::test]
    async fn test_detect_async_success() {
        let client = Arc::new(client_for(spawn_mock_classifier(), 2000));

        let outcome = client
            .detect_async(DetectionRequest::new("Only a fool disagrees", "en"))
            .await
            .unwrap();

        assert!(matches!(outcome, DetectionOutcome::Detected(ref a) if a.has_fallacy));
    }

    #[actix_web::test]
    async fn test_batch_detect_is_all_or_nothing() {
        let client = client_for(spawn_mock_classifier(), 2000);

        let ok = client
            .batch_detect(&["a".to_string(), "b".to_string()], "ko")
            .await;
        assert_eq!(ok.len(), 2);
        assert!(ok.iter().all(|a| !a.has_fallacy));

        let malformed = client
            .batch_detect(&["a".to_string(), "untyped".to_string()], "ko")
            .await;
        assert!(malformed.is_empty());

        let failed = client.batch_detect(&["broken".to_string()], "ko").await;
        assert!(failed.is_empty());
    }

    #[actix_web::test]
    async fn test_health_check() {
        let client = client_for(spawn_mock_classifier(), 2000);
        assert!(client.health_check().await);
    }

    #[actix_web::test]
    async fn test_retrain_requires_success_status() {
        let client = client_for(spawn_mock_classifier(), 2000);

        let batch = vec![LabeledText {
            text: "Everyone does it".to_string(),
            label: "bandwagon".to_string(),
        }];
        assert!(client.retrain(&batch).await);
        assert!(!client.retrain(&[]).await);
        assert!(matches!(
            client.submit_batch(&[]).await,
            Err(DetectionError::Rejected(status)) if status == "error"
        ));
    }

    #[test]
    fn test_clean_response_keeps_empty_type() {
        let response: DetectResponse =
            serde_json::from_value(json!({"has_fallacy": false, "fallacy_type": "", "confidence": 0.4, "explanation": ""})).unwrap();
        let annotation = response.into_annotation().unwrap();
        assert_eq!(annotation, Annotation::clean(0.4, ""));
    }

    #[test]
    fn test_response_requires_confidence_and_explanation() {
        let partial = json!({"has_fallacy": true, "fallacy_type": "ad_hominem"});
        assert!(serde_json::from_value::<DetectResponse>(partial).is_err());

        let no_explanation = json!({"has_fallacy": false, "fallacy_type": null, "confidence": 0.3});
        assert!(serde_json::from_value::<DetectResponse>(no_explanation).is_err());
    }

    #[test]
    fn test_request_omits_absent_topic() {
        let json = serde_json::to_value(DetectionRequest::new("t", "ko")).unwrap();
        assert!(json.get("topic_title").is_none());
        assert_eq!(json["language"], "ko");
    }
}
