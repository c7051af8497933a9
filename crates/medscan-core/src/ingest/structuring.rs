use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::Config;
use crate::document::{FailureKind, StructuredResult};
use crate::{Error, Result};

pub const RATE_LIMIT_MESSAGE: &str =
    "The AI service is receiving too many requests. Please try again later.";
pub const NO_CONTENT_MESSAGE: &str = "Sorry, I couldn't process your request.";
pub const GENERIC_FAILURE_MESSAGE: &str = "AI analysis failed. See server logs for details.";
pub const TIMEOUT_MESSAGE: &str = "AI analysis timed out. Please try again later.";

const API_KEY_HEADER: &str = "X-goog-api-key";

const MEDICINE_INSTRUCTIONS: &str = "Parse the following medicine information extracted from an image \
into a detailed and comprehensive structured JSON format. Return ONLY valid JSON with these fields: \
brandName, generic, manufacturer, category, uses (array), dosage, foodInstructions, \
sideEffects (object with common and serious arrays), warnings (array), isCritical (boolean). \
Provide as much detail as possible in each field. If information is not available, use reasonable \
defaults or empty arrays.";

const REPORT_INSTRUCTIONS: &str = "Analyze this medical report text and return ONLY a valid JSON object. \
The JSON object should have two keys: 'summary' (a brief summary of the findings) and 'testResults' \
(an array of objects). Each object in 'testResults' should have the following keys: 'testName', \
'value', 'unit', 'referenceRange', and 'status' ('normal', 'high', or 'low'). If information for a \
field is not available, use an empty string or an empty array.";

/// What the model is asked to produce
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainPrompt {
    MedicineLabel,
    MedicalReport { report_type: String },
}

impl DomainPrompt {
    fn instructions(&self) -> &'static str {
        match self {
            Self::MedicineLabel => MEDICINE_INSTRUCTIONS,
            Self::MedicalReport { .. } => REPORT_INSTRUCTIONS,
        }
    }

    fn hint(&self) -> String {
        match self {
            Self::MedicineLabel => "Task: parse medicine label.".to_string(),
            Self::MedicalReport { report_type } => format!("Report type: {report_type}."),
        }
    }

    /// Instruction template, then the domain hint, then the extracted text
    pub fn build(&self, language: &str, text: &str) -> String {
        format!(
            "{} Respond in {}.\n{}\nExtracted text:\n{}",
            self.instructions(),
            language,
            self.hint(),
            text
        )
    }
}

/// Strip a surrounding markdown code fence (with optional language tag).
/// Purely textual: the result is not checked for being JSON.
pub fn sanitize(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```") {
        let tag_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+')))
            .unwrap_or(rest.len());
        text = rest[tag_len..].trim_start();
    }

    if let Some(rest) = text.strip_suffix("```") {
        text = rest.trim_end();
    }

    text.to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum StructuringError {
    #[error("Rate limited by upstream")]
    RateLimited,
    #[error("Upstream returned {status}: {body}")]
    Upstream { status: StatusCode, body: String },
    #[error("Malformed upstream response ({status}): {detail}")]
    MalformedResponse { status: StatusCode, detail: String },
    #[error("Upstream response has no candidate text")]
    NoContent,
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl StructuringError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::RateLimited => FailureKind::UpstreamRateLimited,
            Self::Upstream { .. } | Self::MalformedResponse { .. } | Self::NoContent => {
                FailureKind::UpstreamError
            }
            Self::Transport(_) => FailureKind::UnexpectedFailure,
        }
    }

    /// Fallback text recorded in place of the model's answer
    pub fn fallback_message(&self) -> String {
        match self {
            Self::RateLimited => RATE_LIMIT_MESSAGE.to_string(),
            Self::NoContent => NO_CONTENT_MESSAGE.to_string(),
            Self::Upstream { status, .. } => {
                format!("AI analysis failed: upstream service returned {status}.")
            }
            Self::MalformedResponse { status, .. } => {
                format!("AI analysis failed: malformed response from upstream service ({status}).")
            }
            Self::Transport(e) if e.is_timeout() => TIMEOUT_MESSAGE.to_string(),
            Self::Transport(_) => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}

/// Turns extracted text into structured JSON text
#[async_trait::async_trait]
pub trait Structurer: Send + Sync {
    async fn structure(
        &self,
        text: &str,
        prompt: &DomainPrompt,
        timeout: Duration,
    ) -> StructuredResult;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

impl<'a> GenerateRequest<'a> {
    fn single(prompt: &'a str) -> Self {
        Self {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    /// First candidate's first part, if it carries any text
    fn into_first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
            .filter(|t| !t.trim().is_empty())
    }
}

/// Client for a Gemini-style `generateContent` endpoint. One request per
/// call and no retries.
pub struct StructuringClient {
    http: Client,
    url: String,
    api_key: String,
    language: String,
}

impl StructuringClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Config(format!("http client: {e}")))?;

        Ok(Self {
            http,
            url: config.ai_url.clone(),
            api_key: config.ai_api_key.clone(),
            language: config.response_language.clone(),
        })
    }

    /// Send one prompt and return the raw text of the first candidate
    pub async fn generate(
        &self,
        prompt: &str,
        timeout: Duration,
    ) -> std::result::Result<String, StructuringError> {
        let response = self
            .http
            .post(&self.url)
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(timeout)
            .json(&GenerateRequest::single(prompt))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(StructuringError::RateLimited);
        }

        let body = response.text().await?;
        if !status.is_success() {
            if body.contains("RESOURCE_EXHAUSTED") {
                return Err(StructuringError::RateLimited);
            }
            return Err(StructuringError::Upstream { status, body });
        }

        let parsed: GenerateResponse = serde_json::from_str(&body).map_err(|e| {
            StructuringError::MalformedResponse {
                status,
                detail: e.to_string(),
            }
        })?;

        parsed.into_first_text().ok_or(StructuringError::NoContent)
    }
}

#[async_trait::async_trait]
impl Structurer for StructuringClient {
    async fn structure(
        &self,
        text: &str,
        prompt: &DomainPrompt,
        timeout: Duration,
    ) -> StructuredResult {
        let prompt = prompt.build(&self.language, text);

        match self.generate(&prompt, timeout).await {
            Ok(raw) => StructuredResult::success(sanitize(&raw)),
            Err(e) => {
                tracing::warn!("Structuring failed ({}): {}", e.kind(), e);
                match e {
                    StructuringError::RateLimited => {
                        StructuredResult::rate_limited(e.fallback_message())
                    }
                    _ => StructuredResult::error(e.fallback_message()),
                }
            }
        }
    }
}
