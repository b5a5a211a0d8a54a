//! Key and API code generation
//!
//! Key codes are `{TAG}-{6 alnum}-{4 alnum}`, uppercase. Random segments are
//! drawn from A-Z0-9, so the space for one tag is 36^10; collisions are
//! vanishingly rare but checked anyway, with a bounded retry instead of an
//! unbounded loop.

use std::collections::HashSet;

use rand::Rng;

use crate::utils::error::{AppError, AppResult};

const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Collision retries before giving up. At 36^10 codes per tag this only
/// trips when the collection is pathologically saturated or randomness is
/// broken.
const MAX_GENERATION_ATTEMPTS: u32 = 16;

/// Generates key codes and API credentials
#[derive(Debug, Clone, Default)]
pub struct KeyFactory;

impl KeyFactory {
    pub fn new() -> Self {
        Self
    }

    /// Generate a key code unique against `existing`, retrying on collision
    /// up to the attempt bound.
    pub fn generate_key_code(
        &self,
        tag: &str,
        existing: &HashSet<String>,
    ) -> AppResult<String> {
        self.generate_with(existing, || {
            format!("{}-{}-{}", tag, random_chunk(6), random_chunk(4))
        })
    }

    /// `API-` followed by 32 uppercase hex characters (16 random bytes)
    pub fn generate_api_code(&self) -> String {
        let bytes: [u8; 16] = rand::thread_rng().gen();
        format!("API-{}", hex::encode_upper(bytes))
    }

    fn generate_with<F>(&self, existing: &HashSet<String>, mut candidate: F) -> AppResult<String>
    where
        F: FnMut() -> String,
    {
        for _ in 0..MAX_GENERATION_ATTEMPTS {
            let code = candidate();
            if !existing.contains(&code) {
                return Ok(code);
            }
        }
        Err(AppError::KeyGenerationExhausted {
            attempts: MAX_GENERATION_ATTEMPTS,
        })
    }
}

fn random_chunk(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use regex::Regex;

    static KEY_CODE_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^[A-Z0-9]{1,12}-[A-Z0-9]{6}-[A-Z0-9]{4}$").unwrap());

    #[test]
    fn test_key_code_format() {
        let factory = KeyFactory::new();
        let code = factory.generate_key_code("KEY", &HashSet::new()).unwrap();
        assert!(KEY_CODE_RE.is_match(&code), "bad code: {}", code);
        assert!(code.starts_with("KEY-"));
    }

    #[test]
    fn test_custom_tag_prefix() {
        let factory = KeyFactory::new();
        let code = factory.generate_key_code("VIP", &HashSet::new()).unwrap();
        assert!(code.starts_with("VIP-"));
    }

    #[test]
    fn test_collision_retries_until_unique() {
        let factory = KeyFactory::new();
        let mut existing = HashSet::new();
        for _ in 0..50 {
            let code = factory.generate_key_code("KEY", &existing).unwrap();
            assert!(existing.insert(code));
        }
    }

    #[test]
    fn test_exhaustion_after_bounded_attempts() {
        let factory = KeyFactory::new();
        let mut existing = HashSet::new();
        existing.insert("KEY-AAAAAA-AAAA".to_string());

        let err = factory
            .generate_with(&existing, || "KEY-AAAAAA-AAAA".to_string())
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::KeyGenerationExhausted { attempts: MAX_GENERATION_ATTEMPTS }
        ));
    }

    #[test]
    fn test_api_code_format() {
        let factory = KeyFactory::new();
        let code = factory.generate_api_code();
        assert!(code.starts_with("API-"));
        let hex_part = &code[4..];
        assert_eq!(hex_part.len(), 32);
        assert!(hex_part
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn test_api_codes_are_unique() {
        let factory = KeyFactory::new();
        let a = factory.generate_api_code();
        let b = factory.generate_api_code();
        assert_ne!(a, b);
    }
}
