use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Longest short code accepted anywhere in the service
pub const MAX_SHORT_CODE_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Link {
    pub id: i64,
    pub short_code: String,
    pub destination_url: String,
    pub owner_id: String,
    pub name: Option<String>,
    pub created_at: i64,
    pub clicks: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLinkRequest {
    pub url: String,
    pub custom_code: Option<String>,
    pub name: Option<String>,
}

/// Short codes are exact-match keys: ASCII letters, digits, `-` and `_`.
pub fn is_valid_short_code(code: &str) -> bool {
    !code.is_empty()
        && code.len() <= MAX_SHORT_CODE_LEN
        && code
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
