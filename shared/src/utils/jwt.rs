use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use uuid::Uuid;

use crate::models::claims::{Role, TokenClaims};

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Token invalid or expired")]
    InvalidToken,

    #[error("Token type not accepted for this endpoint")]
    InvalidTokenType,

    #[error("Failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Issue an access token. Returns the encoded token together with its JTI.
pub fn generate_access_token(
    user_id: i32,
    email: &str,
    role: Role,
    jwt_secret: &str,
    expiry_seconds: i64,
) -> Result<(String, String), JwtError> {
    let now = Utc::now();
    let exp = now + Duration::seconds(expiry_seconds);
    let jti = Uuid::new_v4().to_string();

    let claims = TokenClaims {
        sub: user_id,
        email: email.to_string(),
        role: role.as_str().to_string(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
        token_type: "access".to_string(),
        jti: jti.clone(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )?;

    Ok((token, jti))
}

/// Validate an HS256 token and make sure it is an access token
pub fn validate_token(token: &str, jwt_secret: &str) -> Result<TokenClaims, JwtError> {
    let validation = Validation::new(Algorithm::HS256);

    let token_data = decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|_| JwtError::InvalidToken)?;

    if !token_data.claims.is_access_token() {
        return Err(JwtError::InvalidTokenType);
    }

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "test-secret-key-for-unit-tests";

    #[test]
    fn test_generate_and_validate() {
        let (token, jti) =
            generate_access_token(7, "staff@fastcopy.in", Role::Staff, TEST_SECRET, 900).unwrap();

        let claims = validate_token(&token, TEST_SECRET).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.role(), Role::Staff);
        assert_eq!(claims.jti, jti);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let (token, _) =
            generate_access_token(7, "a@b.in", Role::Customer, TEST_SECRET, 900).unwrap();
        assert!(matches!(
            validate_token(&token, "another-secret"),
            Err(JwtError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let (token, _) =
            generate_access_token(7, "a@b.in", Role::Customer, TEST_SECRET, -3600).unwrap();
        assert!(validate_token(&token, TEST_SECRET).is_err());
    }
}
