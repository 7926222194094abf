//! GreenScore audit API client
//!
//! - `GET  {api}/generate-audit?company=...` → audit payload
//! - `POST {api}/check` with `{"claim": "..."}` → claim-check payload
//! - `GET  {api}/` → connectivity check
//!
//! Payloads are returned as opaque JSON; required fields are checked by the
//! caller before a report is recorded.

use async_trait::async_trait;
use ecov_common::config::{ClientSettings, DEFAULT_MAX_CLAIM_CHARS, DEFAULT_MAX_INPUT_CHARS};
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("EcoVerifier/", env!("CARGO_PKG_VERSION"));
const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Audit API errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuditError {
    #[error("Input is empty")]
    EmptyInput,

    #[error("Input exceeds {max} characters")]
    TooLong { max: usize },

    #[error("Company rejected: {0}")]
    CompanyRejected(String),

    #[error("Invalid company: {0}")]
    InvalidCompany(String),

    #[error("Claim rejected: {0}")]
    ClaimRejected(String),

    #[error("Validation service unavailable: {0}")]
    ValidationUnavailable(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Request rejected ({status}): {message}")]
    Rejected {
        status: u16,
        code: Option<String>,
        message: String,
    },
}

impl AuditError {
    /// Whether re-issuing the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AuditError::ValidationUnavailable(_)
                | AuditError::RateLimited
                | AuditError::Server { .. }
                | AuditError::Timeout
                | AuditError::Network(_)
        )
    }

    /// Stable identifier for logs and user-facing errors
    pub fn code(&self) -> &'static str {
        match self {
            AuditError::EmptyInput => "EMPTY_INPUT",
            AuditError::TooLong { .. } => "TOO_LONG",
            AuditError::CompanyRejected(_) => "COMPANY_REJECTED",
            AuditError::InvalidCompany(_) => "INVALID_COMPANY",
            AuditError::ClaimRejected(_) => "CLAIM_REJECTED",
            AuditError::ValidationUnavailable(_) => "VALIDATION_SYSTEM_ERROR",
            AuditError::RateLimited => "RATE_LIMITED",
            AuditError::Server { .. } => "SERVER_ERROR",
            AuditError::Timeout => "TIMEOUT",
            AuditError::Network(_) => "NETWORK_ERROR",
            AuditError::MalformedResponse(_) => "MALFORMED_RESPONSE",
            AuditError::Rejected { .. } => "REJECTED",
        }
    }

    /// Message shown to the user
    pub fn user_message(&self) -> String {
        match self {
            AuditError::EmptyInput => "Please enter a company name or claim.".to_string(),
            AuditError::TooLong { max } => {
                format!("That is too long. Shorten it to {max} characters or fewer.")
            }
            AuditError::CompanyRejected(reason) => {
                format!("This company cannot be audited ({reason}). Try a different company.")
            }
            AuditError::InvalidCompany(reason) => {
                format!("That does not look like a company name ({reason}). Check the spelling and try again.")
            }
            AuditError::ClaimRejected(reason) => {
                format!("This claim cannot be checked ({reason}). Rephrase it as a sustainability claim.")
            }
            AuditError::ValidationUnavailable(_) => {
                "Company validation is temporarily unavailable. Please retry.".to_string()
            }
            AuditError::RateLimited => {
                "Too many requests right now. Wait a moment and retry.".to_string()
            }
            AuditError::Server { .. } => {
                "The audit service had a problem. Please retry.".to_string()
            }
            AuditError::Timeout => {
                "The audit took too long to finish. Please retry.".to_string()
            }
            AuditError::Network(_) => {
                "Could not reach the audit service. Check your connection and retry.".to_string()
            }
            AuditError::MalformedResponse(_) => {
                "The audit service returned an incomplete result. Try a different query.".to_string()
            }
            AuditError::Rejected { message, .. } => {
                format!("The request was rejected: {message}. Adjust the input and try again.")
            }
        }
    }
}

/// Client-side input limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputLimits {
    pub max_input_chars: usize,
    pub max_claim_chars: usize,
}

impl Default for InputLimits {
    fn default() -> Self {
        Self {
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            max_claim_chars: DEFAULT_MAX_CLAIM_CHARS,
        }
    }
}

impl InputLimits {
    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self {
            max_input_chars: settings.max_input_chars,
            max_claim_chars: settings.max_claim_chars,
        }
    }
}

/// Trimmed input, or the validation error the server would return
pub fn validate_input(input: &str, max: usize) -> Result<String, AuditError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AuditError::EmptyInput);
    }
    if trimmed.chars().count() > max {
        return Err(AuditError::TooLong { max });
    }
    Ok(trimmed.to_string())
}

/// `(code, message)` from any of the error body shapes the API uses:
/// `{"error": {"code", "message"}}`, `{"code", "error"}`, `{"error": "text"}`
fn parse_error_body(body: &Value) -> Option<(Option<String>, String)> {
    let error = body.get("error")?;
    let top_code = body.get("code").and_then(Value::as_str).map(str::to_string);

    match error {
        Value::Object(inner) => {
            let code = inner
                .get("code")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or(top_code);
            let message = inner
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error")
                .to_string();
            Some((code, message))
        }
        Value::String(text) => Some((top_code, text.clone())),
        Value::Null | Value::Bool(false) => None,
        other => Some((top_code, other.to_string())),
    }
}

/// Map a failed (or error-carrying) response to the error taxonomy
pub fn classify_failure(status: u16, body: &str, max_chars: usize) -> AuditError {
    let parsed = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| parse_error_body(&v));
    let (code, message) = match parsed {
        Some((code, message)) => (code, message),
        None if body.trim().is_empty() => (None, format!("HTTP {status}")),
        None => (None, body.trim().to_string()),
    };

    if status == 429 {
        return AuditError::RateLimited;
    }

    match code.as_deref() {
        Some("EMPTY_INPUT") => return AuditError::EmptyInput,
        Some("TOO_LONG") => return AuditError::TooLong { max: max_chars },
        Some("COMPANY_REJECTED") => return AuditError::CompanyRejected(message),
        Some("INVALID_COMPANY") => return AuditError::InvalidCompany(message),
        Some("CLAIM_REJECTED") => return AuditError::ClaimRejected(message),
        Some("VALIDATION_SYSTEM_ERROR") => return AuditError::ValidationUnavailable(message),
        _ => {}
    }

    if status >= 500 {
        AuditError::Server { status, message }
    } else {
        AuditError::Rejected {
            status,
            code,
            message,
        }
    }
}

fn classify_transport(e: reqwest::Error) -> AuditError {
    if e.is_timeout() {
        AuditError::Timeout
    } else {
        AuditError::Network(e.to_string())
    }
}

/// Audit API operations
#[async_trait]
pub trait AuditService: Send + Sync {
    async fn generate_audit(&self, company: &str) -> Result<Value, AuditError>;

    async fn check_claim(&self, claim: &str) -> Result<Value, AuditError>;

    /// HTTP status of the API root
    async fn health(&self) -> Result<u16, AuditError>;
}

/// HTTP client for the audit API
pub struct AuditClient {
    http_client: reqwest::Client,
    base_url: String,
    audit_timeout: Duration,
    limits: InputLimits,
}

impl AuditClient {
    pub fn new(
        base_url: impl Into<String>,
        audit_timeout: Duration,
        limits: InputLimits,
    ) -> Result<Self, AuditError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AuditError::Network(e.to_string()))?;

        let base_url = base_url.into();
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            audit_timeout,
            limits,
        })
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self, AuditError> {
        Self::new(
            settings.api_base_url.clone(),
            settings.audit_timeout,
            InputLimits::from_settings(settings),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn read_payload(&self, response: Response, max_chars: usize) -> Result<Value, AuditError> {
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify_transport)?;

        if !(200..300).contains(&status) {
            let err = classify_failure(status, &body, max_chars);
            tracing::warn!(status, code = err.code(), "Audit API request failed");
            return Err(err);
        }

        let payload: Value = serde_json::from_str(&body)
            .map_err(|e| AuditError::MalformedResponse(format!("Response is not JSON: {e}")))?;

        if parse_error_body(&payload).is_some() {
            let err = classify_failure(status, &body, max_chars);
            tracing::warn!(status, code = err.code(), "Audit API returned an error body");
            return Err(err);
        }

        Ok(payload)
    }
}

#[async_trait]
impl AuditService for AuditClient {
    async fn generate_audit(&self, company: &str) -> Result<Value, AuditError> {
        let company = validate_input(company, self.limits.max_input_chars)?;
        tracing::debug!(company = %company, "Requesting audit");

        let response = self
            .http_client
            .get(format!("{}/generate-audit", self.base_url))
            .query(&[("company", company.as_str())])
            .timeout(self.audit_timeout)
            .send()
            .await
            .map_err(classify_transport)?;

        let payload = self.read_payload(response, self.limits.max_input_chars).await?;
        tracing::info!(company = %company, "Audit received");
        Ok(payload)
    }

    async fn check_claim(&self, claim: &str) -> Result<Value, AuditError> {
        let claim = validate_input(claim, self.limits.max_claim_chars)?;
        tracing::debug!(chars = claim.chars().count(), "Requesting claim check");

        let response = self
            .http_client
            .post(format!("{}/check", self.base_url))
            .json(&json!({ "claim": claim }))
            .timeout(self.audit_timeout)
            .send()
            .await
            .map_err(classify_transport)?;

        let payload = self.read_payload(response, self.limits.max_claim_chars).await?;
        tracing::info!("Claim check received");
        Ok(payload)
    }

    async fn health(&self) -> Result<u16, AuditError> {
        let response = self
            .http_client
            .get(format!("{}/", self.base_url))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(classify_transport)?;
        Ok(response.status().as_u16())
    }
}
