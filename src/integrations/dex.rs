use url::Url;

use crate::{
    error::{AppError, Result},
    models::TokenDescriptor,
    network::NetworkProfile,
    wallet::address::format_address,
};

const UNISWAP_SWAP_URL: &str = "https://app.uniswap.org/swap";
const ZORA_MAINNET_URL: &str = "https://zora.co/explore";
const ZORA_TESTNET_URL: &str = "https://testnet.zora.co/explore";

// Internal helper that maps a profile to Uniswap's chain slug.
fn uniswap_chain(profile: &NetworkProfile) -> &'static str {
    if profile.is_testnet() {
        "base_sepolia"
    } else {
        "base"
    }
}

/// Builds the Uniswap swap link for `token`.
///
/// # Arguments
/// * `token` - token to buy.
/// * `profile` - network the link should open on.
///
/// # Returns
/// * `Ok(Url)` with `chain` and `outputCurrency` query parameters.
/// * `Err(AppError)` if the base URL cannot be parsed.
pub fn swap_url(token: &TokenDescriptor, profile: &NetworkProfile) -> Result<Url> {
    let mut url = Url::parse(UNISWAP_SWAP_URL)
        .map_err(|e| AppError::Internal(format!("Invalid Uniswap URL: {}", e)))?;
    url.query_pairs_mut()
        .append_pair("chain", uniswap_chain(profile))
        .append_pair("outputCurrency", &format_address(&token.address));
    Ok(url)
}

/// Zora collection page for the profile's network.
pub fn collection_url(profile: &NetworkProfile) -> Result<Url> {
    let base = if profile.is_testnet() {
        ZORA_TESTNET_URL
    } else {
        ZORA_MAINNET_URL
    };
    Url::parse(base).map_err(|e| AppError::Internal(format!("Invalid Zora URL: {}", e)))
}

pub fn explorer_token_url(token: &TokenDescriptor, profile: &NetworkProfile) -> Result<Url> {
    let explorer = profile.explorer_url().ok_or_else(|| {
        AppError::Internal(format!("No block explorer for {}", profile.chain_name))
    })?;
    let base = Url::parse(&format!("{}/", explorer.trim_end_matches('/')))
        .map_err(|e| AppError::Internal(format!("Invalid explorer URL: {}", e)))?;
    base.join(&format!("token/{}", format_address(&token.address)))
        .map_err(|e| AppError::Internal(format!("Invalid explorer token URL: {}", e)))
}
