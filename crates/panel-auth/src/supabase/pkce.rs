//! PKCE (RFC 7636) verifier/challenge pairs and CSRF nonces.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

use super::SupabaseError;

/// Challenge method sent to the authorize endpoint.
pub const CHALLENGE_METHOD: &str = "s256";

/// A code verifier and its S256 challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

impl Pkce {
    /// Generate a fresh pair from 32 random bytes (43-char verifier).
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::BrowserFlow` if the OS RNG is unavailable.
    pub fn generate() -> Result<Self, SupabaseError> {
        let mut bytes = [0u8; 32];
        getrandom::fill(&mut bytes).map_err(|e| {
            SupabaseError::BrowserFlow(format!("failed to generate PKCE verifier: {e}"))
        })?;
        Ok(Self::from_verifier(URL_SAFE_NO_PAD.encode(bytes)))
    }

    #[must_use]
    pub fn from_verifier(verifier: String) -> Self {
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }
}

/// Random 16-byte hex nonce for the callback `state` parameter.
///
/// # Errors
///
/// Returns `SupabaseError::BrowserFlow` if the OS RNG is unavailable.
pub fn state_nonce() -> Result<String, SupabaseError> {
    let mut bytes = [0u8; 16];
    getrandom::fill(&mut bytes)
        .map_err(|e| SupabaseError::BrowserFlow(format!("failed to generate CSRF nonce: {e}")))?;
    Ok(bytes.iter().map(|b| format!("{b:02x}")).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rfc7636_appendix_b_vector() {
        let pkce = Pkce::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wkoAA6u1zZkZ".into());
        assert_eq!(pkce.challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn generated_verifier_is_url_safe_and_long_enough() {
        let pkce = Pkce::generate().unwrap();
        assert_eq!(pkce.verifier.len(), 43);
        assert!(
            pkce.verifier
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert_ne!(pkce.verifier, Pkce::generate().unwrap().verifier);
    }

    #[test]
    fn nonce_is_32_hex_chars() {
        let nonce = state_nonce().unwrap();
        assert_eq!(nonce.len(), 32);
        assert!(nonce.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
