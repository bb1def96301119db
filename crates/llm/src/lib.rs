use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Marker the local provider uses to find the product name inside a prompt.
pub const PRODUCT_MARKER: &str = "end-of-support timeline for:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Gemini,
    Local,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "gemini",
            LlmProvider::Local => "local",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "gemini" | "google" => Some(LlmProvider::Gemini),
            "local" | "offline" => Some(LlmProvider::Local),
            _ => None,
        }
    }
}

/// One text-generation call with optional web-search grounding.
#[derive(Clone, Copy)]
pub struct GenerateRequest<'a> {
    pub model: &'a str,
    pub api_key: Option<&'a SecretString>,
    pub prompt: &'a str,
    pub system_instruction: &'a str,
    pub web_search: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateResponse {
    pub text: Option<String>,
    pub grounding_chunks: Vec<GroundingChunk>,
}

/// Grounding entry attached to a response. Only chunks carrying `web` point
/// at a browsable page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GroundingChunk {
    #[serde(default)]
    pub web: Option<WebReference>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WebReference {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
}

/// Failure raised by a collaborator. `message` is the raw upstream text and
/// may itself be a serialized JSON error payload.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct CollaboratorError {
    pub status: Option<u16>,
    pub message: String,
}

impl CollaboratorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

/// Text-generation backend used by the lifecycle query client.
pub trait Collaborator {
    /// Whether calls need an API key. Offline backends return `false`.
    fn requires_credential(&self) -> bool {
        true
    }

    fn generate(
        &self,
        request: &GenerateRequest<'_>,
    ) -> impl Future<Output = Result<GenerateResponse, CollaboratorError>> + Send;
}

#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    provider: LlmProvider,
    config: ProviderConfig,
}

#[derive(Clone)]
enum ProviderConfig {
    Gemini(GeminiConfig),
    Local,
}

#[derive(Clone)]
struct GeminiConfig {
    base_url: String,
}

impl LlmClient {
    pub fn new(provider: LlmProvider) -> Result<Self, CollaboratorError> {
        Self::with_options(provider, DEFAULT_GEMINI_BASE_URL, DEFAULT_TIMEOUT)
    }

    pub fn with_options(
        provider: LlmProvider,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| CollaboratorError::new(format!("failed to build http client: {err}")))?;
        let config = match provider {
            LlmProvider::Gemini => ProviderConfig::Gemini(GeminiConfig {
                base_url: base_url.into(),
            }),
            LlmProvider::Local => ProviderConfig::Local,
        };
        Ok(Self {
            http,
            provider,
            config,
        })
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    async fn generate_gemini(
        &self,
        cfg: &GeminiConfig,
        req: &GenerateRequest<'_>,
    ) -> Result<GenerateResponse, CollaboratorError> {
        let api_key = req
            .api_key
            .ok_or_else(|| CollaboratorError::new("gemini request requires an API key"))?;
        let mut payload = json!({
            "contents": [
                {
                    "role": "user",
                    "parts": [ { "text": req.prompt } ]
                }
            ],
            "systemInstruction": {
                "parts": [ { "text": req.system_instruction } ]
            }
        });
        if req.web_search {
            payload["tools"] = json!([{ "google_search": {} }]);
        }
        let url = format!(
            "{}/models/{}:generateContent",
            cfg.base_url.trim_end_matches('/'),
            req.model
        );
        debug!(model = req.model, web_search = req.web_search, "sending gemini request");
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", api_key.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|err| CollaboratorError::new(format!("gemini request failed: {err}")))?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            debug!(status = status.as_u16(), "gemini returned an error");
            return Err(CollaboratorError::with_status(status.as_u16(), body));
        }
        parse_gemini_body(&body)
    }
}

impl Collaborator for LlmClient {
    fn requires_credential(&self) -> bool {
        !matches!(self.config, ProviderConfig::Local)
    }

    async fn generate(
        &self,
        request: &GenerateRequest<'_>,
    ) -> Result<GenerateResponse, CollaboratorError> {
        match &self.config {
            ProviderConfig::Gemini(cfg) => self.generate_gemini(cfg, request).await,
            ProviderConfig::Local => Ok(synthesize_local_response(request)),
        }
    }
}

fn synthesize_local_response(req: &GenerateRequest<'_>) -> GenerateResponse {
    let product = extract_product(req.prompt);
    let text = format!(
        "# {product} Lifecycle Overview\n\
         \n\
         This report was generated offline without web grounding. Confirm every date with the vendor before planning an upgrade.\n\
         \n\
         ## Version History\n\
         \n\
         | Version | Release Date | End of Support | End of Life |\n\
         |---|---|---|---|\n\
         | {product} | Unknown | Unknown | Unknown |\n\
         \n\
         ## Migration Path\n\
         \n\
         - Check the vendor's published support policy for {product}.\n\
         - Plan upgrades before the End of Support date, not the End of Life date.\n"
    );
    GenerateResponse {
        text: Some(text),
        grounding_chunks: Vec::new(),
    }
}

fn extract_product(prompt: &str) -> String {
    match prompt.find(PRODUCT_MARKER) {
        Some(idx) => prompt[idx + PRODUCT_MARKER.len()..].trim().to_string(),
        None => prompt.trim().to_string(),
    }
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

impl GeminiResponse {
    fn into_response(self) -> GenerateResponse {
        let Some(candidate) = self.candidates.into_iter().next() else {
            return GenerateResponse::default();
        };
        let texts: Vec<String> = candidate
            .content
            .map(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
            .filter(|part| !part.thought)
            .filter_map(|part| part.text)
            .collect();
        let text = if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        };
        let grounding_chunks = candidate
            .grounding_metadata
            .map(|meta| meta.grounding_chunks)
            .unwrap_or_default();
        GenerateResponse {
            text,
            grounding_chunks,
        }
    }
}

#[derive(Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(rename = "groundingMetadata", default)]
    grounding_metadata: Option<GeminiGroundingMetadata>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Deserialize)]
struct GeminiGroundingMetadata {
    #[serde(rename = "groundingChunks", default)]
    grounding_chunks: Vec<GroundingChunk>,
}

/// Parses a successful `generateContent` body.
pub fn parse_gemini_body(body: &str) -> Result<GenerateResponse, CollaboratorError> {
    let decoded: GeminiResponse = serde_json::from_str(body).map_err(|err| {
        CollaboratorError::new(format!("failed to decode gemini response: {err}"))
    })?;
    Ok(decoded.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request<'a>(key: Option<&'a SecretString>, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            model: "gemini-test",
            api_key: key,
            prompt,
            system_instruction: "be precise",
            web_search: true,
        }
    }

    fn gemini(server: &MockServer) -> LlmClient {
        LlmClient::with_options(LlmProvider::Gemini, server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn provider_names_roundtrip() {
        assert_eq!(LlmProvider::from_str("Gemini"), Some(LlmProvider::Gemini));
        assert_eq!(LlmProvider::from_str(" offline "), Some(LlmProvider::Local));
        assert_eq!(LlmProvider::from_str("openai"), None);
        assert_eq!(LlmProvider::Local.as_str(), "local");
    }

    #[test]
    fn parses_text_and_grounding_from_first_candidate() {
        let body = json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "thinking", "thought": true },
                    { "text": "# Java 8" },
                    { "text": " Lifecycle" }
                ]},
                "groundingMetadata": {
                    "groundingChunks": [
                        { "web": { "uri": "https://a.example", "title": "A" } },
                        { "retrievedContext": { "uri": "gs://b" } },
                        { "web": { "uri": "https://c.example" } }
                    ]
                }
            }]
        });
        let parsed = parse_gemini_body(&body.to_string()).unwrap();
        assert_eq!(parsed.text.as_deref(), Some("# Java 8 Lifecycle"));
        assert_eq!(parsed.grounding_chunks.len(), 3);
        assert!(parsed.grounding_chunks[1].web.is_none());
        assert_eq!(
            parsed.grounding_chunks[2].web.as_ref().unwrap().title,
            None
        );
    }

    #[test]
    fn empty_candidates_yield_no_text() {
        let parsed = parse_gemini_body("{}").unwrap();
        assert_eq!(parsed, GenerateResponse::default());
    }

    #[tokio::test]
    async fn local_provider_echoes_product_without_credential() {
        let client = LlmClient::new(LlmProvider::Local).unwrap();
        assert!(!client.requires_credential());
        let prompt = format!("Provide a lifecycle overview and {PRODUCT_MARKER} Node.js 18");
        let response = client.generate(&request(None, &prompt)).await.unwrap();
        let text = response.text.unwrap();
        assert!(text.starts_with("# Node.js 18 Lifecycle Overview"));
        assert!(text.contains("| Version | Release Date | End of Support | End of Life |"));
    }

    #[tokio::test]
    async fn gemini_request_carries_key_instruction_and_search_tool() {
        let server = MockServer::start().await;
        let body = json!({
            "candidates": [{
                "content": { "parts": [ { "text": "report" } ] },
                "groundingMetadata": { "groundingChunks": [
                    { "web": { "uri": "https://vendor.example/eol", "title": "Vendor" } }
                ]}
            }]
        });
        Mock::given(method("POST"))
            .and(path("/models/gemini-test:generateContent"))
            .and(header("x-goog-api-key", "AIza-test"))
            .and(body_partial_json(json!({
                "contents": [{ "role": "user", "parts": [{ "text": "hello" }] }],
                "systemInstruction": { "parts": [{ "text": "be precise" }] },
                "tools": [{ "google_search": {} }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;

        let key = SecretString::new("AIza-test".to_string());
        let response = gemini(&server)
            .generate(&request(Some(&key), "hello"))
            .await
            .unwrap();
        assert_eq!(response.text.as_deref(), Some("report"));
        assert_eq!(response.grounding_chunks.len(), 1);
    }

    #[tokio::test]
    async fn search_tool_omitted_when_grounding_is_off() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-test:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let key = SecretString::new("AIza-test".to_string());
        let plain = GenerateRequest {
            web_search: false,
            ..request(Some(&key), "hello")
        };
        let response = gemini(&server).generate(&plain).await.unwrap();
        assert_eq!(response, GenerateResponse::default());

        let received = server.received_requests().await.unwrap();
        let sent: Value = serde_json::from_slice(&received[0].body).unwrap();
        assert!(sent.get("tools").is_none());
        assert_eq!(sent["systemInstruction"]["parts"][0]["text"], "be precise");
    }

    #[tokio::test]
    async fn gemini_error_body_is_surfaced_verbatim() {
        let server = MockServer::start().await;
        let body = r#"{"error":{"code":429,"message":"Resource exhausted"}}"#;
        Mock::given(method("POST"))
            .and(path("/models/gemini-test:generateContent"))
            .respond_with(ResponseTemplate::new(429).set_body_string(body))
            .mount(&server)
            .await;

        let key = SecretString::new("AIza-test".to_string());
        let err = gemini(&server)
            .generate(&request(Some(&key), "hello"))
            .await
            .unwrap_err();
        assert_eq!(err.status, Some(429));
        assert_eq!(err.message, body);
    }

    #[tokio::test]
    async fn gemini_without_key_fails_before_sending() {
        let client = LlmClient::new(LlmProvider::Gemini).unwrap();
        let err = client.generate(&request(None, "hello")).await.unwrap_err();
        assert!(err.message.contains("API key"));
    }
}
