// AWS session handling shared by the ECR and STS clients

pub mod credentials;
mod region;

pub use credentials::{CredentialResolver, Session};

/// Extract a clean error message from an AWS SDK error's Debug output
///
/// The AWS SDK errors have verbose Debug output, but we can extract just the
/// meaningful message by parsing for the `message: Some("...")` pattern.
pub(crate) fn format_sdk_error<E: std::fmt::Debug>(err: &E) -> String {
    let debug_str = format!("{:?}", err);

    // Pattern: message: Some("actual error message")
    if let Some(start) = debug_str.find("message: Some(\"") {
        let start = start + 15;
        if let Some(end) = debug_str[start..].find("\")") {
            return debug_str[start..start + end].to_string();
        }
    }

    // Fallback: a Message field as found in raw JSON responses
    if let Some(start) = debug_str.find("\"Message\":\"") {
        let start = start + 11;
        if let Some(end) = debug_str[start..].find('"') {
            return debug_str[start..start + end].to_string();
        }
    }

    match debug_str.char_indices().nth(200) {
        Some((cut, _)) => format!("{}...", &debug_str[..cut]),
        None => debug_str,
    }
}
