use lifecycle_llm::{
    Collaborator, CollaboratorError, GenerateRequest, GenerateResponse, PRODUCT_MARKER,
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::QueryError;
use crate::model::{LifecycleResult, Source};

pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
pub const NO_INFORMATION: &str = "No information found.";

const PLACEHOLDER_KEYS: [&str; 5] = [
    "undefined",
    "null",
    "placeholder_api_key",
    "your_api_key",
    "your-api-key",
];

pub const SYSTEM_INSTRUCTION: &str = "\
You are an expert in IT Asset Management and Product Lifecycles.
Your goal is to provide a comprehensive view of technology product lifecycles (software and hardware).

CRITICAL REQUIREMENT:
You MUST provide a detailed historical table of versions.
Include as many past and current versions as possible to show the product's evolution.
Format the table in Markdown with exactly these columns:
| Version | Release Date | End of Support | End of Life |

For each version, include:
1. Version Number/Name
2. Release Date (General Availability)
3. End of Support (EOS) / End of Mainstream Support
4. End of Life (EOL) / End of Extended Support

Structure your response:
- Heading: # [Product Name] Lifecycle Overview
- Summary: Brief current status (e.g., \"Version X is the current stable release, Version Y reached EOL on...\")
- Table: Detailed Version History with all milestones.
- Migration Path: Recommendations for moving from older versions to supported ones.

Use the provided search tools to ensure the data is accurate and up-to-date.";

pub fn build_prompt(product_name: &str) -> String {
    format!("Provide a comprehensive version history and {PRODUCT_MARKER} {product_name}")
}

/// Blank values and well-known placeholders do not count as credentials.
pub fn is_usable_credential(key: &SecretString) -> bool {
    let value = key.expose_secret().trim();
    !value.is_empty()
        && !PLACEHOLDER_KEYS
            .iter()
            .any(|placeholder| value.eq_ignore_ascii_case(placeholder))
}

/// Asks the collaborator for a lifecycle report and normalizes the answer.
pub struct LifecycleClient<C> {
    collaborator: C,
    credential: Option<SecretString>,
    model: String,
}

impl<C: Collaborator> LifecycleClient<C> {
    pub fn new(collaborator: C, credential: Option<SecretString>) -> Self {
        Self {
            collaborator,
            credential,
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn collaborator(&self) -> &C {
        &self.collaborator
    }

    pub fn set_credential(&mut self, credential: Option<SecretString>) {
        self.credential = credential;
    }

    pub fn has_credential(&self) -> bool {
        !self.collaborator.requires_credential()
            || self.credential.as_ref().is_some_and(is_usable_credential)
    }

    pub async fn query(&self, product_name: &str) -> Result<LifecycleResult, QueryError> {
        if !self.has_credential() {
            debug!(product = product_name, "no usable credential, skipping request");
            return Err(QueryError::CredentialMissing);
        }
        let prompt = build_prompt(product_name);
        let request = GenerateRequest {
            model: &self.model,
            api_key: self.credential.as_ref(),
            prompt: &prompt,
            system_instruction: SYSTEM_INSTRUCTION,
            web_search: true,
        };
        debug!(product = product_name, model = %self.model, "querying lifecycle data");
        match self.collaborator.generate(&request).await {
            Ok(response) => {
                let result = normalize_response(product_name, response);
                info!(
                    product = product_name,
                    sources = result.sources.len(),
                    "lifecycle query succeeded"
                );
                Ok(result)
            }
            Err(err) => {
                let classified = classify_error(&err);
                info!(product = product_name, error = ?classified, "lifecycle query failed");
                Err(classified)
            }
        }
    }
}

pub fn normalize_response(product_name: &str, response: GenerateResponse) -> LifecycleResult {
    let summary = response
        .text
        .filter(|text| !text.trim().is_empty())
        .unwrap_or_else(|| NO_INFORMATION.to_string());
    let sources = response
        .grounding_chunks
        .into_iter()
        .filter_map(|chunk| chunk.web)
        .map(|web| Source::new(web.title, web.uri))
        .collect();
    LifecycleResult {
        product_name: product_name.to_string(),
        summary,
        sources,
    }
}

pub fn classify_error(err: &CollaboratorError) -> QueryError {
    let payload: Option<Value> = serde_json::from_str(&err.message).ok();
    let payload_code = payload.as_ref().and_then(|value| {
        value
            .get("error")
            .and_then(|e| e.get("code"))
            .or_else(|| value.get("code"))
            .and_then(Value::as_i64)
    });
    let lower = err.message.to_lowercase();
    if payload_code == Some(429)
        || err.status == Some(429)
        || lower.contains("quota")
        || lower.contains("429")
    {
        return QueryError::QuotaExhausted;
    }
    if lower.contains("not found") {
        return QueryError::ModelUnavailable;
    }
    let message = payload
        .as_ref()
        .and_then(|value| {
            value
                .get("error")
                .and_then(|e| e.get("message"))
                .or_else(|| value.get("message"))
                .and_then(Value::as_str)
        })
        .map(str::to_string)
        .unwrap_or_else(|| err.message.clone());
    QueryError::Unknown(message)
}
