// Shared building blocks for FastCopy services: token claims, JWT helpers, input validation

pub mod models {
    pub mod claims;
}

pub mod utils {
    pub mod jwt;
    pub mod token_extraction;
    pub mod validation;
}
