//! Bitcoin address format check
//!
//! A shape check only; checksums are not verified.

use std::sync::LazyLock;

use regex::Regex;

static ADDRESS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(bc1|[13])[a-zA-HJ-NP-Z0-9]{25,62}$").expect("valid Bitcoin address regex")
});

pub fn is_valid_bitcoin_address(address: &str) -> bool {
    ADDRESS_PATTERN.is_match(address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_addresses() {
        assert!(is_valid_bitcoin_address("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"));
        assert!(is_valid_bitcoin_address("3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy"));
        assert!(is_valid_bitcoin_address(
            "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq"
        ));
    }

    #[test]
    fn test_invalid_addresses() {
        assert!(!is_valid_bitcoin_address(""));
        assert!(!is_valid_bitcoin_address("2A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"));
        assert!(!is_valid_bitcoin_address("1short"));
        // Uppercase O and I are excluded
        assert!(!is_valid_bitcoin_address("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNO"));
        assert!(!is_valid_bitcoin_address("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNI"));
        assert!(!is_valid_bitcoin_address(&format!("bc1{}", "q".repeat(63))));
        assert!(!is_valid_bitcoin_address("bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5md!"));
    }
}
