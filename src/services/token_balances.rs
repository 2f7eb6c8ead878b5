use ethers::{
    abi::{AbiDecode, AbiEncode},
    types::{Address, Bytes, U256},
    utils::format_units,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::{
    constants::{BALANCE_DISPLAY_DECIMALS, BALANCE_READ_TIMEOUT_SECS},
    models::{BalanceReading, TokenBalance, TokenDescriptor},
    wallet::{address::format_address, WalletTransport},
};

ethers::contract::abigen!(
    Erc20,
    r#"[
        function balanceOf(address account) view returns (uint256)
        function decimals() view returns (uint8)
    ]"#
);

/// Reads ERC-20 balances through the connected wallet transport.
#[derive(Debug, Clone, Copy)]
pub struct TokenBalanceReader {
    read_timeout: Duration,
}

impl Default for TokenBalanceReader {
    fn default() -> Self {
        Self::new(Duration::from_secs(BALANCE_READ_TIMEOUT_SECS))
    }
}

impl TokenBalanceReader {
    pub fn new(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }

    /// Reads every token concurrently. Never fails as a whole: a token whose
    /// read errors or times out is recorded as unavailable.
    pub async fn read_balances(
        &self,
        owner: Address,
        transport: &dyn WalletTransport,
        tokens: &[TokenDescriptor],
    ) -> BTreeMap<String, BalanceReading> {
        let reads = tokens.iter().map(|token| async move {
            let reading = match tokio::time::timeout(
                self.read_timeout,
                fetch_erc20_balance(transport, owner, token),
            )
            .await
            {
                Ok(Ok(balance)) => BalanceReading::Available(balance),
                Ok(Err(reason)) => {
                    tracing::warn!(
                        "balance read failed token={} owner={}: {}",
                        token.symbol,
                        format_address(&owner),
                        reason
                    );
                    BalanceReading::Unavailable { reason }
                }
                Err(_) => {
                    tracing::warn!(
                        "balance read for {} timed out after {}s",
                        token.symbol,
                        self.read_timeout.as_secs()
                    );
                    BalanceReading::Unavailable {
                        reason: format!("timed out after {}s", self.read_timeout.as_secs()),
                    }
                }
            };
            (token.symbol.clone(), reading)
        });

        futures_util::future::join_all(reads)
            .await
            .into_iter()
            .collect()
    }
}

async fn fetch_erc20_balance(
    transport: &dyn WalletTransport,
    owner: Address,
    token: &TokenDescriptor,
) -> Result<TokenBalance, String> {
    let data = Bytes::from(BalanceOfCall { account: owner }.encode());
    let params = json!([
        {
            "to": format_address(&token.address),
            "data": data,
        },
        "latest"
    ]);

    let result = transport
        .request("eth_call", params)
        .await
        .map_err(|e| e.to_string())?;
    let raw: Bytes =
        serde_json::from_value(result).map_err(|e| format!("malformed eth_call result: {}", e))?;
    let raw_balance =
        U256::decode(raw.as_ref()).map_err(|e| format!("undecodable balanceOf result: {}", e))?;

    Ok(TokenBalance {
        token_symbol: token.symbol.clone(),
        address: token.address,
        decimals: token.decimals,
        raw_balance,
        formatted_balance: format_balance(raw_balance, token.decimals),
    })
}

/// Human-readable balance truncated to a fixed number of fractional digits.
pub fn format_balance(raw: U256, decimals: u8) -> String {
    let full = match format_units(raw, decimals as u32) {
        Ok(text) => text,
        Err(_) => return raw.to_string(),
    };
    match full.split_once('.') {
        Some((whole, fraction)) => {
            let digits: String = fraction.chars().take(BALANCE_DISPLAY_DECIMALS).collect();
            format!("{}.{:0<width$}", whole, digits, width = BALANCE_DISPLAY_DECIMALS)
        }
        None => full,
    }
}

/// Balance scaled by decimals, for derived metrics only.
pub fn balance_as_f64(raw: U256, decimals: u8) -> f64 {
    format_units(raw, decimals as u32)
        .ok()
        .and_then(|text| text.parse::<f64>().ok())
        .unwrap_or(0.0)
}
