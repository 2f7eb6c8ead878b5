use ethers::{types::Address, utils::to_checksum};
use std::str::FromStr;

use crate::error::WalletError;

/// Parses an account string returned by a wallet. All-lowercase and
/// all-uppercase hex are accepted as-is; mixed case must be a valid EIP-55
/// checksum.
pub fn parse_address(raw: &str) -> Result<Address, WalletError> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .ok_or_else(|| WalletError::InvalidAddress(format!("missing 0x prefix: {}", trimmed)))?;

    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(WalletError::InvalidAddress(trimmed.to_string()));
    }

    let address = Address::from_str(trimmed)
        .map_err(|_| WalletError::InvalidAddress(trimmed.to_string()))?;

    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper && to_checksum(&address, None) != trimmed {
        return Err(WalletError::InvalidAddress(format!(
            "checksum mismatch: {}",
            trimmed
        )));
    }

    Ok(address)
}

/// Canonical lowercase form used for storage and comparisons.
pub fn format_address(address: &Address) -> String {
    format!("{:#x}", address)
}

pub fn checksum_address(address: &Address) -> String {
    to_checksum(address, None)
}
