use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
    // Indian mobile: optional +91 / 91 / 0 prefix, then 10 digits starting 6-9
    static ref MOBILE_RE: Regex = Regex::new(r"^(\+91|91|0)?[6-9][0-9]{9}$").unwrap();
    static ref USERNAME_RE: Regex = Regex::new(r"^[a-zA-Z0-9_.]{3,30}$").unwrap();
}

// Validate email format
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

// Validate Indian mobile number
pub fn is_valid_mobile(mobile: &str) -> bool {
    MOBILE_RE.is_match(mobile)
}

/// Strip country/trunk prefix so the same number is always stored the same way
pub fn normalize_mobile(mobile: &str) -> Option<String> {
    if !is_valid_mobile(mobile) {
        return None;
    }
    let digits: String = mobile.chars().filter(|c| c.is_ascii_digit()).collect();
    Some(digits[digits.len() - 10..].to_string())
}

// Validate username (3-30 chars, letters, digits, underscore, dot)
pub fn is_valid_username(username: &str) -> bool {
    USERNAME_RE.is_match(username)
}

// Validate password strength (min 8 chars, letters and digits)
pub fn is_strong_password(password: &str) -> bool {
    if password.len() < 8 {
        return false;
    }

    let has_letter = password.chars().any(|c| c.is_alphabetic());
    let has_number = password.chars().any(|c| c.is_numeric());

    has_letter && has_number
}

// Sanitize free text to prevent XSS
pub fn sanitize_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("test@example.com"));
        assert!(is_valid_email("user.name+tag@example.co.in"));
        assert!(!is_valid_email("invalid.email"));
        assert!(!is_valid_email("@example.com"));
    }

    #[test]
    fn test_mobile_validation() {
        assert!(is_valid_mobile("9876543210"));
        assert!(is_valid_mobile("+919876543210"));
        assert!(is_valid_mobile("09876543210"));
        assert!(!is_valid_mobile("5876543210"));
        assert!(!is_valid_mobile("98765"));
    }

    #[test]
    fn test_normalize_mobile() {
        assert_eq!(normalize_mobile("+919876543210"), Some("9876543210".to_string()));
        assert_eq!(normalize_mobile("09876543210"), Some("9876543210".to_string()));
        assert_eq!(normalize_mobile("12345"), None);
    }

    #[test]
    fn test_username_validation() {
        assert!(is_valid_username("print_master"));
        assert!(!is_valid_username("ab"));
        assert!(!is_valid_username("has space"));
    }

    #[test]
    fn test_password_strength() {
        assert!(is_strong_password("password123"));
        assert!(!is_strong_password("short1"));
        assert!(!is_strong_password("onlyletters"));
        assert!(!is_strong_password("12345678"));
    }

    #[test]
    fn test_sanitize_html() {
        assert_eq!(
            sanitize_html("<b>Near gate</b> & 'back'"),
            "&lt;b&gt;Near gate&lt;/b&gt; &amp; &#x27;back&#x27;"
        );
    }
}
