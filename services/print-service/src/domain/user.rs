use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::models::claims::Role;
use shared::utils::validation;
use utoipa::ToSchema;

// User row joined with its profile
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Account {
    pub id: i32,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_staff: bool,
    pub is_active: bool,
    pub mobile: Option<String>,
    pub address: Option<String>,
    pub is_dealer: bool,
    pub is_delivery: bool,
    pub dealer_locations: Vec<String>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn role(&self) -> Role {
        Role::from_flags(self.is_staff, self.is_dealer, self.is_delivery)
    }

    pub fn serves_location(&self, location: Option<&str>) -> bool {
        match location {
            Some(loc) => self.dealer_locations.iter().any(|l| l.eq_ignore_ascii_case(loc)),
            None => false,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub mobile: Option<String>,
}

impl RegisterRequest {
    /// Returns the normalized mobile number on success.
    pub fn validate(&self) -> Result<Option<String>, String> {
        if !validation::is_valid_username(&self.username) {
            return Err("Username must be 3-30 letters, digits, dots or underscores".to_string());
        }
        if !validation::is_valid_email(&self.email) {
            return Err("Invalid email address".to_string());
        }
        if !validation::is_strong_password(&self.password) {
            return Err("Password must be at least 8 characters with letters and digits".to_string());
        }
        match self.mobile.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
            Some(mobile) => validation::normalize_mobile(mobile)
                .map(Some)
                .ok_or_else(|| "Invalid mobile number".to_string()),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username_or_email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub mobile: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRolesRequest {
    pub is_dealer: bool,
    pub is_delivery: bool,
    #[serde(default)]
    pub locations: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub role: String,
    pub mobile: Option<String>,
    pub address: Option<String>,
    pub locations: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Account> for ProfileResponse {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            email: account.email.clone(),
            role: account.role().to_string(),
            mobile: account.mobile.clone(),
            address: account.address.clone(),
            locations: account.dealer_locations.clone(),
            created_at: account.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(mobile: Option<&str>) -> RegisterRequest {
        RegisterRequest {
            username: "ravi.k".to_string(),
            email: "ravi@example.in".to_string(),
            password: "prints4all".to_string(),
            mobile: mobile.map(str::to_string),
        }
    }

    #[test]
    fn test_register_validation() {
        assert_eq!(register(None).validate(), Ok(None));
        assert_eq!(
            register(Some("+91 98765 43210".replace(' ', "").as_str())).validate(),
            Ok(Some("9876543210".to_string()))
        );
        assert!(register(Some("12345")).validate().is_err());

        let mut weak = register(None);
        weak.password = "password".to_string();
        assert!(weak.validate().is_err());
    }

    #[test]
    fn test_role_and_locations() {
        let account = Account {
            id: 3,
            username: "north_dealer".to_string(),
            email: "dealer@example.in".to_string(),
            password_hash: String::new(),
            is_staff: false,
            is_active: true,
            mobile: None,
            address: None,
            is_dealer: true,
            is_delivery: true,
            dealer_locations: vec!["Main Campus".to_string()],
            last_login_at: None,
            created_at: Utc::now(),
        };
        assert_eq!(account.role(), Role::Dealer);
        assert!(account.serves_location(Some("main campus")));
        assert!(!account.serves_location(Some("City Centre")));
        assert!(!account.serves_location(None));
    }
}
