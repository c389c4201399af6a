//! Link creation shared by the HTTP API and the admin CLI

use thiserror::Error;
use url::Url;

use crate::models::{is_valid_short_code, CreateLinkRequest, Link, MAX_SHORT_CODE_LEN};
use crate::storage::{LinkStore, StorageError};

pub const GENERATED_CODE_LEN: usize = 8;
pub const MAX_GENERATE_ATTEMPTS: usize = 10;

const CODE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Debug, Error)]
pub enum CreateLinkError {
    #[error("invalid destination URL: {0}")]
    InvalidUrl(String),
    #[error("custom code must be 1-{} characters of letters, digits, '-' or '_'", MAX_SHORT_CODE_LEN)]
    InvalidCode,
    #[error("short code already exists")]
    CodeTaken,
    #[error("failed to generate a unique short code")]
    Exhausted,
    #[error(transparent)]
    Storage(StorageError),
}

/// Random 8-character code over `[a-z0-9]`
pub fn generate_short_code() -> String {
    (0..GENERATED_CODE_LEN)
        .map(|_| CODE_ALPHABET[rand::random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Destinations must be absolute http(s) URLs
pub fn validate_destination(raw: &str) -> Result<String, CreateLinkError> {
    let raw = raw.trim();
    let url = Url::parse(raw).map_err(|e| CreateLinkError::InvalidUrl(e.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(raw.to_string()),
        scheme => Err(CreateLinkError::InvalidUrl(format!(
            "unsupported scheme or missing host ({scheme})"
        ))),
    }
}

pub async fn create_link(
    store: &dyn LinkStore,
    owner_id: &str,
    request: &CreateLinkRequest,
) -> Result<Link, CreateLinkError> {
    let destination = validate_destination(&request.url)?;
    let name = request
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());

    if let Some(custom) = request.custom_code.as_deref().map(str::trim) {
        if !is_valid_short_code(custom) {
            return Err(CreateLinkError::InvalidCode);
        }
        return match store.create_with_code(custom, &destination, owner_id, name).await {
            Ok(link) => Ok(link),
            Err(StorageError::Conflict) => Err(CreateLinkError::CodeTaken),
            Err(e) => Err(CreateLinkError::Storage(e)),
        };
    }

    for _ in 0..MAX_GENERATE_ATTEMPTS {
        let code = generate_short_code();
        match store.create_with_code(&code, &destination, owner_id, name).await {
            Ok(link) => return Ok(link),
            Err(StorageError::Conflict) => continue,
            Err(e) => return Err(CreateLinkError::Storage(e)),
        }
    }

    Err(CreateLinkError::Exhausted)
}
