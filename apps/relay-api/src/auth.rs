//! Bearer-token verification with ordered secret-encoding fallbacks.
//!
//! Deployments have historically configured the signing secret in three
//! different representations; tokens signed under any of them must keep
//! verifying, so the decoding attempts are an explicit ordered list.

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// An authenticated identity. Produced only by [`verify`]; lives only on a
/// session, never persisted on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
}

/// Token claims. `displayName` is optional on the wire; the user id stands in
/// when absent.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Claims {
    id: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    avatar_ref: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    org_id: Option<String>,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        let display_name = claims.display_name.unwrap_or_else(|| claims.id.clone());
        Self {
            id: claims.id,
            display_name,
            avatar_ref: claims.avatar_ref,
            role: claims.role,
            org_id: claims.org_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Secret encodings
// ---------------------------------------------------------------------------

/// One interpretation of the configured secret as HMAC key bytes.
///
/// The order of [`DEFAULT_ENCODINGS`] is load-bearing: tokens in the wild were
/// signed under whichever representation their issuer happened to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretEncoding {
    /// The secret's UTF-8 bytes as configured.
    Utf8,
    /// The secret base64-decoded to raw key bytes.
    Base64,
    /// The secret base64-decoded, read as a unicode string, and re-encoded as
    /// UTF-8. Differs from `Base64` for decoded bytes >= 0x80.
    Base64Text,
}

pub const DEFAULT_ENCODINGS: &[SecretEncoding] = &[
    SecretEncoding::Utf8,
    SecretEncoding::Base64,
    SecretEncoding::Base64Text,
];

impl SecretEncoding {
    /// Derive key bytes from the configured secret, or `None` when the secret
    /// cannot be read under this encoding.
    fn derive(&self, secret: &str) -> Option<Vec<u8>> {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;

        match self {
            SecretEncoding::Utf8 => Some(secret.as_bytes().to_vec()),
            SecretEncoding::Base64 => STANDARD.decode(secret).ok(),
            SecretEncoding::Base64Text => {
                let raw = STANDARD.decode(secret).ok()?;
                let text: String = raw.iter().map(|&b| b as char).collect();
                Some(text.into_bytes())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Returned when no configured secret encoding verifies the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthFailure;

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("token did not verify under any configured secret encoding")
    }
}

/// Verify a bearer token against the configured secret, trying
/// [`DEFAULT_ENCODINGS`] in order.
pub fn verify(token: &str, secret: &str) -> Result<Identity, AuthFailure> {
    verify_with(token, secret, DEFAULT_ENCODINGS)
}

/// Verify a bearer token against an explicit list of secret encodings. The
/// first encoding that decodes the token wins.
pub fn verify_with(
    token: &str,
    secret: &str,
    encodings: &[SecretEncoding],
) -> Result<Identity, AuthFailure> {
    let mut validation = Validation::new(Algorithm::HS256);
    // Tokens from older issuers carry no `exp`; validate it only when present.
    validation.required_spec_claims = std::collections::HashSet::new();
    validation.validate_exp = true;

    for encoding in encodings {
        let Some(key) = encoding.derive(secret) else {
            continue;
        };
        match jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&key), &validation) {
            Ok(data) => {
                tracing::debug!(?encoding, "token verified");
                return Ok(data.claims.into());
            }
            Err(err) => {
                tracing::trace!(?encoding, %err, "token rejected under encoding");
            }
        }
    }

    Err(AuthFailure)
}
