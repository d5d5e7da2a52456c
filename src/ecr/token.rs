use base64::Engine;

use super::{RegistryAuth, RegistryError};

/// Decode an ECR authorization token (base64 of `username:password`)
///
/// Only the first `:` separates the parts, so passwords containing `:` survive intact.
pub fn decode_authorization_token(
    token: &str,
    proxy_endpoint: &str,
) -> Result<RegistryAuth, RegistryError> {
    let decoded = base64::engine::general_purpose::STANDARD.decode(token)?;
    let decoded = String::from_utf8_lossy(&decoded);

    let parts: Vec<&str> = decoded.splitn(2, ':').collect();
    if parts.len() < 2 {
        return Err(RegistryError::InvalidToken { parts: parts.len() });
    }

    Ok(RegistryAuth {
        proxy_endpoint: proxy_endpoint.to_string(),
        username: parts[0].to_string(),
        password: parts[1].to_string(),
    })
}
