//! HTTP vision classifier.
//!
//! Posts `{"image_base64", "model"}` to a configured endpoint and expects
//! `{"item_type", "damage_tags", "severity", "confidence"}` back. The API
//! key is wrapped in [`SecretString`] and only exposed in the request header.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use fixwise_core::capability::VisionClassifier;
use fixwise_types::assessment::{ItemAssessment, Severity};
use fixwise_types::error::VisionError;

pub struct HttpVisionClassifier {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<SecretString>,
    model: Option<String>,
    timeout: Duration,
}

impl HttpVisionClassifier {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        api_key: Option<SecretString>,
        model: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            model,
            timeout,
        }
    }
}

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    image_base64: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    item_type: String,
    #[serde(default)]
    damage_tags: Vec<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    confidence: f64,
}

impl ClassifyResponse {
    fn into_assessment(self) -> Result<ItemAssessment, VisionError> {
        if !self.confidence.is_finite() {
            return Err(VisionError::InvalidResponse(
                "confidence is not a number".to_string(),
            ));
        }
        // Unknown or missing severity reads as moderate.
        let severity = self
            .severity
            .as_deref()
            .and_then(|s| s.parse::<Severity>().ok())
            .unwrap_or(Severity::Moderate);
        Ok(ItemAssessment::new(
            self.item_type,
            self.damage_tags,
            severity,
            self.confidence,
        ))
    }
}

impl VisionClassifier for HttpVisionClassifier {
    fn name(&self) -> &str {
        "http-vision"
    }

    async fn classify(&self, image: &[u8]) -> Result<ItemAssessment, VisionError> {
        if image.is_empty() {
            return Err(VisionError::InvalidResponse("empty image".to_string()));
        }

        let body = ClassifyRequest {
            image_base64: STANDARD.encode(image),
            model: self.model.as_deref(),
        };

        let mut request = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .timeout(self.timeout)
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                VisionError::Timeout {
                    after_ms: self.timeout.as_millis() as u64,
                }
            } else {
                VisionError::Unavailable(format!("HTTP request failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let error_body: String = error_body.chars().take(200).collect();
            return Err(VisionError::Unavailable(format!("HTTP {status}: {error_body}")));
        }

        let parsed: ClassifyResponse = response.json().await.map_err(|e| {
            VisionError::InvalidResponse(format!("failed to parse response: {e}"))
        })?;
        parsed.into_assessment()
    }
}
