//! PKCE (Proof Key for Code Exchange) for the authorization-code flow.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use sha2::{Digest, Sha256};

use super::OAuthError;

/// S256 verifier and challenge pair.
#[derive(Debug, Clone)]
pub struct Pkce {
    verifier: String,
    challenge: String,
}

impl Pkce {
    /// Generate a fresh pair from 32 random bytes.
    #[must_use]
    pub fn new() -> Self {
        let bytes: [u8; 32] = rand::random();
        let verifier = URL_SAFE_NO_PAD.encode(bytes);
        let challenge = compute_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }

    /// Rebuild from a stored verifier.
    pub fn from_verifier(verifier: &str) -> Result<Self, OAuthError> {
        // 43-128 characters per RFC 7636
        if verifier.len() < 43 || verifier.len() > 128 {
            return Err(OAuthError::Pkce(format!(
                "Verifier must be 43-128 characters, got {}",
                verifier.len()
            )));
        }

        if !verifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~'))
        {
            return Err(OAuthError::Pkce(
                "Verifier contains invalid characters".to_string(),
            ));
        }

        Ok(Self {
            verifier: verifier.to_string(),
            challenge: compute_challenge(verifier),
        })
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    pub fn method(&self) -> &'static str {
        "S256"
    }
}

impl Default for Pkce {
    fn default() -> Self {
        Self::new()
    }
}

fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_pair() {
        let pkce = Pkce::new();
        assert_eq!(pkce.verifier().len(), 43);
        assert_ne!(pkce.verifier(), pkce.challenge());
        assert_eq!(pkce.method(), "S256");
        assert!(Pkce::from_verifier(pkce.verifier()).is_ok());
    }

    #[test]
    fn test_known_challenge() {
        let pkce = Pkce::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk").unwrap();
        assert_eq!(pkce.challenge(), "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn test_invalid_verifiers() {
        assert!(Pkce::from_verifier("short").is_err());
        assert!(Pkce::from_verifier(&" ".repeat(50)).is_err());
    }
}
