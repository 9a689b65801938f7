use url::Url;

use crate::error::ApiError;

/// Accept only absolute `http`/`https` URLs with a host. Returns the trimmed
/// input unchanged so stored records keep what the caller sent.
pub fn validate_scan_url(raw: &str) -> Result<String, ApiError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation("URL cannot be empty".to_string()));
    }

    let parsed = Url::parse(trimmed)
        .map_err(|e| ApiError::Validation(format!("Invalid URL '{}': {}", trimmed, e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ApiError::Validation(format!(
                "Unsupported URL scheme '{}'",
                other
            )))
        }
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(ApiError::Validation("URL must include a host".to_string()));
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_http_and_https() {
        assert_eq!(
            validate_scan_url(" https://example.com ").unwrap(),
            "https://example.com"
        );
        assert!(validate_scan_url("http://127.0.0.1:8080/login?next=/").is_ok());
    }

    #[test]
    fn test_rejects_bad_urls() {
        assert!(validate_scan_url("").is_err());
        assert!(validate_scan_url("example.com").is_err());
        assert!(validate_scan_url("ftp://example.com").is_err());
        assert!(validate_scan_url("javascript:alert(1)").is_err());
    }
}
