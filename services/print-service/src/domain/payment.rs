use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

lazy_static! {
    static ref TXN_RE: Regex = Regex::new(r"TXN[0-9]{20}").unwrap();
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Transport(String),

    #[error("gateway answered {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("unexpected gateway response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Transport(err.to_string())
    }
}

/// What a gateway status means for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GatewayOutcome {
    Success,
    Pending,
    Failure,
}

pub fn map_gateway_status(status: &str) -> GatewayOutcome {
    match status.trim().to_ascii_uppercase().as_str() {
        "SUCCESS" | "PAID" | "CAPTURED" => GatewayOutcome::Success,
        "PENDING" | "CREATED" => GatewayOutcome::Pending,
        _ => GatewayOutcome::Failure,
    }
}

// Body of POST {GATEWAY_API_URL}/transactions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRequest {
    pub transaction_id: String,
    pub amount_paise: i64,
    pub currency: String,
    pub customer_email: String,
    pub description: String,
    pub redirect_url: String,
    pub callback_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySession {
    pub gateway_ref: String,
    pub payment_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayTransaction {
    pub transaction_id: String,
    pub status: String,
    pub gateway_ref: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct WebhookPayload {
    pub transaction_id: String,
    pub status: String,
    pub gateway_ref: Option<String>,
}

/// Best effort extraction of a transaction id from a body that failed to parse.
pub fn recover_transaction_id(body: &[u8]) -> Option<String> {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        if let Some(txn) = value.get("transaction_id").and_then(|v| v.as_str()) {
            if TXN_RE.is_match(txn) {
                return Some(txn.to_string());
            }
        }
    }

    let text = String::from_utf8_lossy(body);
    TXN_RE.find(&text).map(|m| m.as_str().to_string())
}
