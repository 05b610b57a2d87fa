//! Contract address validation

use std::fmt;

use alloy_primitives::Address;
use thiserror::Error;

/// Message shown for any rejected address input, malformed or duplicate.
pub const INVALID_ADDRESS_MESSAGE: &str = "Please enter a valid Ethereum address starting with 0x";

/// Rejected address input.
///
/// Malformed and duplicate input intentionally surface the same message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{}", INVALID_ADDRESS_MESSAGE)]
    Malformed { input: String },
    #[error("{}", INVALID_ADDRESS_MESSAGE)]
    Duplicate { address: TokenAddress },
}

/// A validated `0x`-prefixed, 40 hex digit address.
///
/// Case is kept exactly as supplied and equality is case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenAddress {
    text: String,
    raw: Address,
}

impl TokenAddress {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The parsed 20-byte address
    pub fn address(&self) -> Address {
        self.raw
    }

    /// Abbreviated form for narrow layouts, e.g. `0xAbCd..1234`
    pub fn short(&self) -> String {
        format!("{}..{}", &self.text[..6], &self.text[self.text.len() - 4..])
    }
}

impl fmt::Display for TokenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl AsRef<str> for TokenAddress {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

impl std::str::FromStr for TokenAddress {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate(s)
    }
}

/// Accept exactly `0x` followed by 40 characters of `[0-9a-fA-F]`.
pub fn validate(input: &str) -> Result<TokenAddress, ValidationError> {
    let malformed = || ValidationError::Malformed {
        input: input.to_string(),
    };
    let rest = input.strip_prefix("0x").ok_or_else(malformed)?;
    if rest.len() != 40 || !rest.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return Err(malformed());
    }
    // No checksum check: mixed case is accepted as typed
    let raw = input.parse::<Address>().map_err(|_| malformed())?;
    Ok(TokenAddress {
        text: input.to_string(),
        raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_mixed_case() {
        let addr = validate("0xABCDEF0123456789ABCDEF0123456789ABCDEF01").unwrap();
        assert_eq!(addr.as_str(), "0xABCDEF0123456789ABCDEF0123456789ABCDEF01");

        let lower = validate("0xabcdef0123456789abcdef0123456789abcdef01").unwrap();
        assert_ne!(addr, lower);
    }

    #[test]
    fn test_rejects_malformed() {
        for input in [
            "",
            "0x",
            "0x1234",
            "0X1111111111111111111111111111111111111111",
            "1111111111111111111111111111111111111111",
            "0x111111111111111111111111111111111111111g",
            "0x11111111111111111111111111111111111111111",
            " 0x1111111111111111111111111111111111111111",
            "0x1111111111111111111111111111111111111111 ",
        ] {
            assert!(validate(input).is_err(), "accepted {input:?}");
        }
    }

    #[test]
    fn test_error_message_is_shared() {
        let malformed = validate("nope").unwrap_err();
        let addr = validate("0x1111111111111111111111111111111111111111").unwrap();
        let duplicate = ValidationError::Duplicate { address: addr };
        assert_eq!(malformed.to_string(), duplicate.to_string());
        assert_eq!(malformed.to_string(), INVALID_ADDRESS_MESSAGE);
    }

    #[test]
    fn test_parsed_address() {
        let addr = validate("0x00000000000000000000000000000000000000fF").unwrap();
        assert_eq!(addr.address(), Address::with_last_byte(0xff));
        assert_eq!(addr.as_str(), "0x00000000000000000000000000000000000000fF");
    }

    #[test]
    fn test_short() {
        let addr = validate("0xAbCd00000000000000000000000000000000Ef12").unwrap();
        assert_eq!(addr.short(), "0xAbCd..Ef12");
    }
}
