// src/analysis/capability.rs
use crate::config::InferenceConfig;
use crate::utils::error::CapabilityError;
use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// A document-understanding service: given a PDF and an instruction, returns free-form text.
#[async_trait]
pub trait ExtractionCapability: Send + Sync {
    async fn extract(&self, document: &[u8], instruction: &str) -> Result<String, CapabilityError>;

    fn name(&self) -> &str;
}

const API_KEY_HEADER: &str = "x-goog-api-key";

/// reqwest errors render the request URL; keep it out of anything user facing.
fn request_error(err: reqwest::Error) -> CapabilityError {
    CapabilityError::Request(err.without_url())
}

/// `generateContent` client for the Gemini REST API.
pub struct GeminiCapability {
    client: reqwest::Client,
    config: InferenceConfig,
}

impl std::fmt::Debug for GeminiCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiCapability")
            .field("client", &"<reqwest::Client>")
            .field("config", &self.config)
            .finish()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiCapability {
    pub fn new(config: InferenceConfig) -> Result<Self, CapabilityError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(request_error)?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl ExtractionCapability for GeminiCapability {
    async fn extract(&self, document: &[u8], instruction: &str) -> Result<String, CapabilityError> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: instruction },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: "application/pdf",
                            data: base64::engine::general_purpose::STANDARD.encode(document),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                top_p: self.config.top_p,
                top_k: self.config.top_k,
                max_output_tokens: self.config.max_output_tokens,
            },
        };

        tracing::info!(
            "Sending {} byte document to {} ({})",
            document.len(),
            self.name(),
            self.config.model
        );
        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, self.config.api_key.as_str())
            .json(&request)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Inference endpoint returned {}: {}", status, body);
            return Err(CapabilityError::Status { status, body });
        }

        let parsed: GenerateResponse = response.json().await.map_err(request_error)?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(CapabilityError::EmptyResponse);
        }
        Ok(text)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn capability(server: &MockServer) -> GeminiCapability {
        let mut config = InferenceConfig::new("test-key");
        config.base_url = server.uri();
        GeminiCapability::new(config).unwrap()
    }

    #[tokio::test]
    async fn sends_pdf_inline_with_deterministic_settings() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-1.5-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(json!({
                "contents": [{"parts": [
                    {"text": "extract"},
                    {"inline_data": {"mime_type": "application/pdf", "data": "JVBERg=="}}
                ]}],
                "generationConfig": {"topK": 16, "maxOutputTokens": 2048}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "Here you go: "}, {"text": "{}"}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = capability(&server).extract(b"%PDF", "extract").await.unwrap();
        assert_eq!(text, "Here you go: {}");
    }

    #[tokio::test]
    async fn transport_failure_does_not_reveal_api_key() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut config = InferenceConfig::new("SUPER-SECRET-KEY");
        config.base_url = format!("http://127.0.0.1:{port}");
        let capability = GeminiCapability::new(config).unwrap();

        let err = capability.extract(b"%PDF", "extract").await.unwrap_err();
        assert!(matches!(err, CapabilityError::Request(_)));

        let envelope = crate::utils::error::PipelineError::from(err).to_string();
        assert!(!envelope.contains("SUPER-SECRET-KEY"), "{envelope}");
        assert!(!envelope.contains("127.0.0.1"), "{envelope}");
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad key"))
            .mount(&server)
            .await;

        let result = capability(&server).extract(b"%PDF", "extract").await;
        assert!(matches!(
            result,
            Err(CapabilityError::Status { body, .. }) if body == "bad key"
        ));
    }

    #[tokio::test]
    async fn no_candidates_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
            .mount(&server)
            .await;

        let result = capability(&server).extract(b"%PDF", "extract").await;
        assert!(matches!(result, Err(CapabilityError::EmptyResponse)));
    }
}
