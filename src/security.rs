//! Constant-time comparisons for anything that looks like a credential.
//! Centralized so every call site — the HTTP bearer check today, anything
//! else later — goes through the same primitive instead of `==`.

use subtle::ConstantTimeEq;

pub fn tokens_equal(provided: &str, expected: &str) -> bool {
    provided.len() == expected.len() && bool::from(provided.as_bytes().ct_eq(expected.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_tokens_match() {
        assert!(tokens_equal("abc123", "abc123"));
    }

    #[test]
    fn differing_tokens_do_not_match() {
        assert!(!tokens_equal("abc123", "abc124"));
        assert!(!tokens_equal("short", "a-much-longer-token"));
    }
}
