//! Upload token minting and validation.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;

/// Random bytes per token (43 URL-safe base64 characters).
const TOKEN_BYTES: usize = 32;

/// Mint an unpredictable upload token from the OS-seeded CSPRNG.
#[must_use]
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compare a presented token with the issued one in constant time.
#[must_use]
pub fn validate_token(received: &str, expected: &str) -> bool {
    if received.len() != expected.len() {
        return false;
    }
    let mut diff = 0u8;
    for (a, b) in received.bytes().zip(expected.bytes()) {
        diff |= a ^ b;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_length() {
        assert_eq!(generate_token().len(), 43);
    }

    #[test]
    fn test_token_is_url_safe() {
        let token = generate_token();
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn test_validate_matching() {
        let token = generate_token();
        assert!(validate_token(&token, &token));
    }

    #[test]
    fn test_validate_mismatch() {
        assert!(!validate_token(&generate_token(), &generate_token()));
        assert!(!validate_token("short", "this_is_longer"));
        assert!(!validate_token("", "x"));
    }
}
