//! Key signing service
//!
//! Every issued key carries an HMAC-SHA256 tag over its key code, computed
//! with a service-held secret. Verification recomputes the tag and compares;
//! a mismatch means the record was tampered with or the secret changed, and
//! rotating the secret invalidates every previously issued key.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Computes and checks key signatures
#[derive(Clone)]
pub struct SigningService {
    secret: String,
}

impl SigningService {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Hex-encoded HMAC-SHA256 of the key code
    pub fn sign(&self, key_code: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(key_code.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Whether the stored signature matches the key code
    pub fn verify(&self, key_code: &str, signature: &str) -> bool {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(key_code.as_bytes());
        match hex::decode(signature) {
            Ok(bytes) => mac.verify_slice(&bytes).is_ok(),
            Err(_) => false,
        }
    }
}

impl std::fmt::Debug for SigningService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningService").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_is_deterministic() {
        let signing = SigningService::new("secret");
        assert_eq!(signing.sign("KEY-ABC123-XY12"), signing.sign("KEY-ABC123-XY12"));
    }

    #[test]
    fn test_sign_and_verify_roundtrip() {
        let signing = SigningService::new("secret");
        let sig = signing.sign("KEY-ABC123-XY12");
        assert!(signing.verify("KEY-ABC123-XY12", &sig));
    }

    #[test]
    fn test_verify_rejects_wrong_code() {
        let signing = SigningService::new("secret");
        let sig = signing.sign("KEY-ABC123-XY12");
        assert!(!signing.verify("KEY-ABC123-XY13", &sig));
    }

    #[test]
    fn test_different_secret_invalidates_signature() {
        let sig = SigningService::new("old-secret").sign("KEY-ABC123-XY12");
        assert!(!SigningService::new("new-secret").verify("KEY-ABC123-XY12", &sig));
    }

    #[test]
    fn test_verify_rejects_non_hex_signature() {
        let signing = SigningService::new("secret");
        assert!(!signing.verify("KEY-ABC123-XY12", "not hex at all"));
    }

    #[test]
    fn test_signature_is_hex_sha256_length() {
        let sig = SigningService::new("secret").sign("KEY-ABC123-XY12");
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
