//! JSON-RPC DTOs for the proofreading service.
//!
//! The service reports `offset` and `length` as strings in some API
//! versions and as numbers in others, so both are accepted.

use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::ports::ProofreadingSuggestion;

pub(super) const JSON_RPC_VERSION: &str = "2.0";
pub(super) const PROOFREAD_METHOD: &str = "jlp.kouseiservice.kousei";

#[derive(Debug, Serialize)]
pub(super) struct ProofreadRequestDto<'a> {
    pub(super) id: String,
    pub(super) jsonrpc: &'static str,
    pub(super) method: &'static str,
    pub(super) params: ProofreadParamsDto<'a>,
}

#[derive(Debug, Serialize)]
pub(super) struct ProofreadParamsDto<'a> {
    pub(super) q: &'a str,
}

impl<'a> ProofreadRequestDto<'a> {
    pub(super) fn new(id: String, text: &'a str) -> Self {
        Self {
            id,
            jsonrpc: JSON_RPC_VERSION,
            method: PROOFREAD_METHOD,
            params: ProofreadParamsDto { q: text },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ProofreadResponseDto {
    pub(super) result: Option<ProofreadResultDto>,
    pub(super) error: Option<JsonRpcErrorDto>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct ProofreadResultDto {
    #[serde(default)]
    pub(super) suggestions: Vec<SuggestionDto>,
}

#[derive(Debug, Deserialize)]
pub(super) struct JsonRpcErrorDto {
    pub(super) code: i64,
    #[serde(default)]
    pub(super) message: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct SuggestionDto {
    #[serde(default, deserialize_with = "lenient_u32")]
    offset: u32,
    #[serde(default, deserialize_with = "lenient_u32")]
    length: u32,
    #[serde(default, alias = "note")]
    message: String,
    #[serde(default)]
    suggestion: String,
    #[serde(default, alias = "word")]
    surface_form: String,
}

impl From<SuggestionDto> for ProofreadingSuggestion {
    fn from(value: SuggestionDto) -> Self {
        Self {
            offset: value.offset,
            length: value.length,
            message: value.message,
            suggestion: value.suggestion,
            surface_form: value.surface_form,
        }
    }
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u32),
        Text(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(value) => Ok(value),
        NumberOrString::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("expected an unsigned integer, got {text:?}"))),
    }
}
