use ethers::types::Address;
use serde::Deserialize;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    constants::{
        RESYNC_INTERVAL_SECS, TOKEN_CREATOR, TOKEN_CREATOR_ADDRESS, TOKEN_DEFAULT_DECIMALS,
        TOKEN_TRUTH, TOKEN_TRUTH_ADDRESS, WALLET_POLL_INTERVAL_SECS,
    },
    models::TokenDescriptor,
    services::SyncIntervals,
    wallet::{
        HttpTransport, PreferredWallet, TransportInfo, WalletEnvironment, WalletTransport,
    },
};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub environment: String,
    /// Hostname the site is served from; drives network selection.
    pub site_hostname: String,

    // Wallet endpoints
    pub wallet_rpc_url: Option<String>,
    pub wallet_name: String,
    pub wallet_provider_urls: Vec<String>,
    pub wallet_sdk_rpc_url: Option<String>,
    pub preferred_wallet: String,

    // Token contracts
    pub truth_token_address: String,
    pub creator_token_address: String,

    // Persistence
    pub state_dir: String,

    // Sync
    pub resync_interval_secs: u64,
    pub wallet_poll_interval_secs: u64,

    // CORS
    pub cors_allowed_origins: String,
}

// Internal helper that splits a comma separated env value.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let optional = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Ok(Config {
            host: var("HOST", "0.0.0.0"),
            port: var("PORT", "3000").parse()?,
            environment: var("ENVIRONMENT", "development"),
            site_hostname: var("SITE_HOSTNAME", "localhost"),

            wallet_rpc_url: optional("WALLET_RPC_URL"),
            wallet_name: var("WALLET_NAME", "MetaMask"),
            wallet_provider_urls: split_list(&var("WALLET_PROVIDER_URLS", "")),
            wallet_sdk_rpc_url: optional("WALLET_SDK_RPC_URL"),
            preferred_wallet: var("PREFERRED_WALLET", "metamask"),

            truth_token_address: var("TRUTH_TOKEN_ADDRESS", TOKEN_TRUTH_ADDRESS),
            creator_token_address: var("CREATOR_TOKEN_ADDRESS", TOKEN_CREATOR_ADDRESS),

            state_dir: var("STATE_DIR", ".truth-state"),

            resync_interval_secs: var("RESYNC_INTERVAL_SECS", &RESYNC_INTERVAL_SECS.to_string())
                .parse()?,
            wallet_poll_interval_secs: var(
                "WALLET_POLL_INTERVAL_SECS",
                &WALLET_POLL_INTERVAL_SECS.to_string(),
            )
            .parse()?,

            cors_allowed_origins: var("CORS_ALLOWED_ORIGINS", "*"),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.resync_interval_secs == 0 || self.wallet_poll_interval_secs == 0 {
            anyhow::bail!("Sync intervals must be > 0");
        }
        if self.site_hostname.trim().is_empty() {
            anyhow::bail!("SITE_HOSTNAME is empty");
        }
        self.preferred_wallet()?;
        self.tokens()?;

        if self.truth_token_address == TOKEN_TRUTH_ADDRESS {
            tracing::warn!("Using placeholder TRUTH token address");
        }
        if self.creator_token_address == TOKEN_CREATOR_ADDRESS {
            tracing::warn!("Using placeholder CREATOR token address");
        }

        if self.wallet_environment()?.is_empty() {
            tracing::warn!("No wallet endpoint configured; wallet connect will report no provider");
        }

        if self.cors_allowed_origins.trim().is_empty() {
            tracing::warn!("CORS_ALLOWED_ORIGINS is empty; requests may be blocked");
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn preferred_wallet(&self) -> anyhow::Result<PreferredWallet> {
        self.preferred_wallet.parse()
    }

    /// Tracked tokens in display order.
    pub fn tokens(&self) -> anyhow::Result<Vec<TokenDescriptor>> {
        let parse = |symbol: &str, raw: &str| -> anyhow::Result<TokenDescriptor> {
            let address: Address = raw
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid {} token address {}: {}", symbol, raw, e))?;
            Ok(TokenDescriptor {
                symbol: symbol.to_string(),
                address,
                decimals: TOKEN_DEFAULT_DECIMALS,
            })
        };
        Ok(vec![
            parse(TOKEN_TRUTH, &self.truth_token_address)?,
            parse(TOKEN_CREATOR, &self.creator_token_address)?,
        ])
    }

    pub fn sync_intervals(&self) -> SyncIntervals {
        SyncIntervals {
            resync: Duration::from_secs(self.resync_interval_secs),
            wallet_poll: Duration::from_secs(self.wallet_poll_interval_secs),
        }
    }

    /// Wallet transports reachable from this process. Provider list entries are
    /// `Name=url` or a bare url.
    pub fn wallet_environment(&self) -> anyhow::Result<WalletEnvironment> {
        let mut environment = WalletEnvironment::default();

        if let Some(url) = &self.wallet_rpc_url {
            let transport = HttpTransport::new(TransportInfo::named(&self.wallet_name), url)?;
            environment.injected = Some(Arc::new(transport));
        }

        for entry in &self.wallet_provider_urls {
            let (name, url) = match entry.split_once('=') {
                Some((name, url)) => (name.trim(), url.trim()),
                None => (self.wallet_name.as_str(), entry.as_str()),
            };
            let transport: Arc<dyn WalletTransport> =
                Arc::new(HttpTransport::new(TransportInfo::named(name), url)?);
            environment.providers.push(transport);
        }

        if let Some(url) = &self.wallet_sdk_rpc_url {
            let transport = HttpTransport::new(TransportInfo::named("Coinbase Wallet"), url)?;
            environment.sdk = Some(Arc::new(transport));
        }

        Ok(environment)
    }
}
