use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha256;

use crate::domain::{
    checkout::PaymentGateway,
    payment::{GatewayError, GatewaySession, GatewayTransaction, SessionRequest},
};

type HmacSha256 = Hmac<Sha256>;

// HTTP client for the payment gateway
#[derive(Clone)]
pub struct GatewayClient {
    client: Client,
    api_url: String,
    merchant_id: String,
    secret_key: String,
}

impl GatewayClient {
    pub fn new(client: Client, api_url: &str, merchant_id: &str, secret_key: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            merchant_id: merchant_id.to_string(),
            secret_key: secret_key.to_string(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for GatewayClient {
    async fn create_session(&self, request: &SessionRequest) -> Result<GatewaySession, GatewayError> {
        tracing::debug!("📤 Opening gateway session for {}", request.transaction_id);

        let response = self
            .client
            .post(format!("{}/transactions", self.api_url))
            .basic_auth(&self.merchant_id, Some(&self.secret_key))
            .header("Accept", "application/json")
            .json(request)
            .send()
            .await?;

        Self::read_json(response).await
    }

    async fn fetch_status(&self, transaction_id: &str) -> Result<GatewayTransaction, GatewayError> {
        let response = self
            .client
            .get(format!("{}/transactions/{}", self.api_url, transaction_id))
            .basic_auth(&self.merchant_id, Some(&self.secret_key))
            .header("Accept", "application/json")
            .send()
            .await?;

        Self::read_json(response).await
    }
}

/// Check a hex HMAC-SHA256 of the raw webhook body. Comparison is constant time.
pub fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let Ok(expected) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

pub fn sign_body(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "gw_test_secret";

    #[test]
    fn test_signature_roundtrip() {
        let body = br#"{"transaction_id":"TXN20250101120000123456","status":"SUCCESS"}"#;
        let signature = sign_body(SECRET, body).unwrap();
        assert_eq!(signature.len(), 64);
        assert!(verify_signature(SECRET, body, &signature));
        assert!(verify_signature(SECRET, body, &signature.to_uppercase()));
    }

    #[test]
    fn test_signature_rejects_tampering() {
        let body = br#"{"transaction_id":"TXN20250101120000123456","status":"FAILED"}"#;
        let signature = sign_body(SECRET, body).unwrap();

        let tampered = br#"{"transaction_id":"TXN20250101120000123456","status":"SUCCESS"}"#;
        assert!(!verify_signature(SECRET, tampered, &signature));
        assert!(!verify_signature("other_secret", body, &signature));
        assert!(!verify_signature(SECRET, body, "not-hex"));
        assert!(!verify_signature(SECRET, body, ""));
    }

    #[test]
    fn test_api_url_is_normalised() {
        let gateway = GatewayClient::new(Client::new(), "https://pay.example/v1/", "m_1", "s_1");
        assert_eq!(gateway.api_url(), "https://pay.example/v1");
    }
}
