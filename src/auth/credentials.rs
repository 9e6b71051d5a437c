//! HTTP Basic credential parsing.

use base64::{engine::general_purpose::STANDARD, Engine};

/// Email and password supplied through `Authorization: Basic`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub email: String,
    pub password: String,
}

/// Parse the value of an `Authorization` header of the form `Basic <base64(email:password)>`.
///
/// The decoded text is split at the first `:`, so passwords may contain colons.
/// Returns `None` for any other scheme or malformed payload.
pub fn parse_basic_credentials(header: &str) -> Option<BasicCredentials> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (email, password) = decoded.split_once(':')?;

    Some(BasicCredentials {
        email: email.to_string(),
        password: password.to_string(),
    })
}
