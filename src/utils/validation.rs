//! Input validation utilities

use once_cell::sync::Lazy;
use regex::Regex;

/// Regex for validating usernames
static USERNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9._-]*$").unwrap());

/// Regex for validating key type tags
static TYPE_TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z0-9]{1,12}$").unwrap());

/// Validate a username (3-32 chars, alphanumeric plus `._-`)
pub fn validate_username(username: &str) -> bool {
    username.len() >= 3 && username.len() <= 32 && USERNAME_REGEX.is_match(username)
}

/// Validate a key type tag (uppercase alphanumeric, at most 12 chars)
pub fn validate_type_tag(tag: &str) -> bool {
    TYPE_TAG_REGEX.is_match(tag)
}

/// Validate a custom key code: non-empty after trimming, bounded length
pub fn validate_custom_code(code: &str) -> bool {
    let trimmed = code.trim();
    !trimmed.is_empty() && trimmed.len() <= 128
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("alice", true)]
    #[case("bob.smith", true)]
    #[case("user_01", true)]
    #[case("", false)]
    #[case("ab", false)] // Too short
    #[case(".leading-dot", false)]
    #[case("has spaces", false)]
    fn test_validate_username(#[case] username: &str, #[case] expected: bool) {
        assert_eq!(validate_username(username), expected);
    }

    #[rstest]
    #[case("KEY", true)]
    #[case("VIP2", true)]
    #[case("", false)]
    #[case("lowercase", false)]
    #[case("WAY-TOO-LONG-TAG", false)]
    fn test_validate_type_tag(#[case] tag: &str, #[case] expected: bool) {
        assert_eq!(validate_type_tag(tag), expected);
    }

    #[test]
    fn test_validate_custom_code() {
        assert!(validate_custom_code("MY-SPECIAL-KEY"));
        assert!(validate_custom_code("  padded  "));
        assert!(!validate_custom_code(""));
        assert!(!validate_custom_code("   "));
        assert!(!validate_custom_code(&"x".repeat(200)));
    }
}
