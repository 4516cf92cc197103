//! Reqwest-backed proofreading gateway.
//!
//! Owns transport details only: JSON-RPC request building, timeout and
//! HTTP error mapping, and decoding into domain suggestions.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use uuid::Uuid;

use super::dto::{ProofreadRequestDto, ProofreadResponseDto};
use crate::domain::ports::{ProofreadingGateway, ProofreadingGatewayError, ProofreadingSuggestion};

/// Public endpoint of the proofreading service.
pub const DEFAULT_PROOFREADING_ENDPOINT: &str = "https://jlp.yahooapis.jp/KouseiService/V2/kousei";

/// Proofreading adapter posting JSON-RPC requests to one endpoint.
pub struct HttpProofreadingGateway {
    client: Client,
    endpoint: Url,
    user_agent: String,
}

impl HttpProofreadingGateway {
    /// Build a gateway authenticating with `app_id`.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(endpoint: Url, app_id: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            user_agent: format!("Yahoo AppID: {app_id}"),
        })
    }
}

#[async_trait]
impl ProofreadingGateway for HttpProofreadingGateway {
    async fn check(
        &self,
        text: &str,
    ) -> Result<Vec<ProofreadingSuggestion>, ProofreadingGatewayError> {
        let request = ProofreadRequestDto::new(Uuid::new_v4().to_string(), text);
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(reqwest::header::USER_AGENT, self.user_agent.as_str())
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }
        parse_suggestions(body.as_ref())
    }
}

fn parse_suggestions(body: &[u8]) -> Result<Vec<ProofreadingSuggestion>, ProofreadingGatewayError> {
    let decoded: ProofreadResponseDto = serde_json::from_slice(body).map_err(|error| {
        ProofreadingGatewayError::decode(format!("invalid proofreading JSON payload: {error}"))
    })?;
    if let Some(error) = decoded.error {
        return Err(ProofreadingGatewayError::rejected(format!(
            "JSON-RPC error {}: {}",
            error.code, error.message
        )));
    }
    let result = decoded.result.ok_or_else(|| {
        ProofreadingGatewayError::decode("response has neither result nor error")
    })?;
    Ok(result.suggestions.into_iter().map(Into::into).collect())
}

fn map_transport_error(error: reqwest::Error) -> ProofreadingGatewayError {
    if error.is_timeout() {
        ProofreadingGatewayError::timeout(error.to_string())
    } else {
        ProofreadingGatewayError::transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> ProofreadingGatewayError {
    let body_preview = body_preview(body);
    let message = if body_preview.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {}", status.as_u16(), body_preview)
    };

    match status {
        StatusCode::TOO_MANY_REQUESTS => ProofreadingGatewayError::rate_limited(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            ProofreadingGatewayError::timeout(message)
        }
        _ if status.is_client_error() => ProofreadingGatewayError::rejected(message),
        _ => ProofreadingGatewayError::transport(message),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}
