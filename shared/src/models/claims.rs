use serde::{Deserialize, Serialize};

/// Account roles, ordered by how much of the shop they can see
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Dealer,
    Delivery,
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Dealer => "dealer",
            Role::Delivery => "delivery",
            Role::Staff => "staff",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "customer" => Some(Role::Customer),
            "dealer" => Some(Role::Dealer),
            "delivery" => Some(Role::Delivery),
            "staff" => Some(Role::Staff),
            _ => None,
        }
    }

    /// Derive the effective role from account flags. Staff wins over dealer, dealer over delivery.
    pub fn from_flags(is_staff: bool, is_dealer: bool, is_delivery: bool) -> Self {
        if is_staff {
            Role::Staff
        } else if is_dealer {
            Role::Dealer
        } else if is_delivery {
            Role::Delivery
        } else {
            Role::Customer
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT claims issued by the print service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenClaims {
    pub sub: i32,
    pub email: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
    pub token_type: String,
    pub jti: String,
}

impl TokenClaims {
    pub fn is_access_token(&self) -> bool {
        self.token_type == "access"
    }

    /// Unknown role strings fall back to the least privileged role
    pub fn role(&self) -> Role {
        Role::parse(&self.role).unwrap_or(Role::Customer)
    }

    pub fn is_staff(&self) -> bool {
        self.role() == Role::Staff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_claims() -> TokenClaims {
        let now = chrono::Utc::now().timestamp();
        TokenClaims {
            sub: 42,
            email: "reader@example.com".to_string(),
            role: "customer".to_string(),
            exp: now + 900,
            iat: now,
            token_type: "access".to_string(),
            jti: "jti-42".to_string(),
        }
    }

    #[test]
    fn test_is_access_token() {
        let mut claims = create_test_claims();
        assert!(claims.is_access_token());
        claims.token_type = "refresh".to_string();
        assert!(!claims.is_access_token());
    }

    #[test]
    fn test_role_helpers() {
        let mut claims = create_test_claims();
        assert_eq!(claims.role(), Role::Customer);

        claims.role = "staff".to_string();
        assert!(claims.is_staff());

        claims.role = "dealer".to_string();
        assert_eq!(claims.role(), Role::Dealer);
        assert!(!claims.is_staff());
    }

    #[test]
    fn test_unknown_role_is_customer() {
        let mut claims = create_test_claims();
        claims.role = "superuser".to_string();
        assert_eq!(claims.role(), Role::Customer);
    }

    #[test]
    fn test_role_from_flags_precedence() {
        assert_eq!(Role::from_flags(true, true, true), Role::Staff);
        assert_eq!(Role::from_flags(false, true, true), Role::Dealer);
        assert_eq!(Role::from_flags(false, false, true), Role::Delivery);
        assert_eq!(Role::from_flags(false, false, false), Role::Customer);
    }
}
