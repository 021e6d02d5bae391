//! Free-text wallet input normalization
//!
//! Turns pasted wallet lists into typed, deduplicated entries before any
//! network call happens. Pure and idempotent: normalizing already-normalized
//! output returns the same set.

use serde::{Deserialize, Serialize};

use std::collections::HashSet;

/// Classification of a single input token.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Address,
    Ens,
    Invalid,
}

/// One token of user input, classified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletInputEntry {
    /// The token exactly as the user typed it
    pub raw: String,
    pub kind: InputKind,
    /// Lowercased canonical form; absent for invalid tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized: Option<String>,
}

/// Result of normalizing a block of free text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizedInput {
    pub inputs: Vec<WalletInputEntry>,
    /// Deduplicated lowercase addresses, in first-seen order
    pub addresses: Vec<String>,
    /// Deduplicated lowercase ENS names, in first-seen order
    pub ens_names: Vec<String>,
    /// Unrecognized tokens, original casing preserved for display
    pub invalid: Vec<String>,
}

/// `0x` followed by exactly 40 hex characters; `value` must already be
/// lowercased.
pub fn is_valid_address(value: &str) -> bool {
    let Some(hex) = value.strip_prefix("0x") else {
        return false;
    };
    hex.len() == 40 && hex.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Lowercase ENS name ending in `.eth`: dot-separated labels of
/// `[a-z0-9-]`, total length 5..=255.
pub fn is_valid_ens_name(value: &str) -> bool {
    if !value.ends_with(".eth") || value.len() < 5 || value.len() > 255 {
        return false;
    }
    value.split('.').all(|label| {
        !label.is_empty()
            && label
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    })
}

/// Tokenize on whitespace and commas, classify each token, and deduplicate
/// case-insensitively within each kind. First occurrence wins for ordering.
pub fn normalize_wallet_input(raw_text: &str) -> NormalizedInput {
    let mut result = NormalizedInput::default();
    let mut seen_addresses: HashSet<String> = HashSet::new();
    let mut seen_ens: HashSet<String> = HashSet::new();
    let mut seen_invalid: HashSet<String> = HashSet::new();

    let tokens = raw_text
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty());

    for token in tokens {
        let normalized = token.to_lowercase();

        if is_valid_address(&normalized) {
            if seen_addresses.insert(normalized.clone()) {
                result.inputs.push(WalletInputEntry {
                    raw: token.to_string(),
                    kind: InputKind::Address,
                    normalized: Some(normalized.clone()),
                });
                result.addresses.push(normalized);
            }
            continue;
        }

        if is_valid_ens_name(&normalized) {
            if seen_ens.insert(normalized.clone()) {
                result.inputs.push(WalletInputEntry {
                    raw: token.to_string(),
                    kind: InputKind::Ens,
                    normalized: Some(normalized.clone()),
                });
                result.ens_names.push(normalized);
            }
            continue;
        }

        if seen_invalid.insert(token.to_string()) {
            result.inputs.push(WalletInputEntry {
                raw: token.to_string(),
                kind: InputKind::Invalid,
                normalized: None,
            });
            result.invalid.push(token.to_string());
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "0x52908400098527886e0f7030069857d2e4169ee7";

    #[test]
    fn classifies_address_ens_and_garbage() {
        let text = format!("{ADDR}\nvitalik.eth\nnotanaddress");
        let normalized = normalize_wallet_input(&text);

        assert_eq!(normalized.addresses, vec![ADDR.to_string()]);
        assert_eq!(normalized.ens_names, vec!["vitalik.eth".to_string()]);
        assert_eq!(normalized.invalid, vec!["notanaddress".to_string()]);
        assert_eq!(normalized.inputs.len(), 3);
    }

    #[test]
    fn deduplicates_case_insensitively_first_wins() {
        let upper = ADDR.to_uppercase().replace("0X", "0x");
        let text = format!("{ADDR}, {upper} Vitalik.eth vitalik.eth");
        let normalized = normalize_wallet_input(&text);

        assert_eq!(normalized.addresses.len(), 1);
        assert_eq!(normalized.ens_names.len(), 1);
        // First occurrence's raw casing is the one kept.
        assert_eq!(normalized.inputs[1].raw, "Vitalik.eth");
    }

    #[test]
    fn invalid_tokens_keep_original_casing() {
        let normalized = normalize_wallet_input("NotAnAddress NotAnAddress");
        assert_eq!(normalized.invalid, vec!["NotAnAddress".to_string()]);
    }

    #[test]
    fn address_validation_is_strict() {
        assert!(is_valid_address(ADDR));
        // 39 hex chars
        assert!(!is_valid_address("0x52908400098527886e0f7030069857d2e4169ee"));
        // non-hex character
        assert!(!is_valid_address("0x52908400098527886e0f7030069857d2e4169ezz"));
        // missing prefix
        assert!(!is_valid_address("52908400098527886e0f7030069857d2e4169ee7"));
    }

    #[test]
    fn ens_validation_rejects_malformed_names() {
        assert!(is_valid_ens_name("vitalik.eth"));
        assert!(is_valid_ens_name("sub.domain-1.eth"));
        assert!(is_valid_ens_name("a.eth"));
        assert!(!is_valid_ens_name(".eth"));
        assert!(!is_valid_ens_name("a..eth"));
        assert!(!is_valid_ens_name("vitalik.com"));
        assert!(!is_valid_ens_name("has_underscore.eth"));
        let too_long = format!("{}.eth", "a".repeat(255));
        assert!(!is_valid_ens_name(&too_long));
    }

    #[test]
    fn normalization_is_idempotent() {
        let text = format!("{ADDR} {} junk", ADDR.to_uppercase().replace("0X", "0x"));
        let first = normalize_wallet_input(&text);
        let second = normalize_wallet_input(&first.addresses.join("\n"));
        assert_eq!(first.addresses, second.addresses);
        assert!(second.invalid.is_empty());
    }

    #[test]
    fn empty_input_yields_nothing() {
        let normalized = normalize_wallet_input("  \n\t, ,");
        assert!(normalized.inputs.is_empty());
        assert!(normalized.addresses.is_empty());
    }
}
