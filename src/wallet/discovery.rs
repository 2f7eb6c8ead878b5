use std::str::FromStr;
use std::sync::Arc;

use super::transport::{TransportInfo, WalletTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreferredWallet {
    #[default]
    MetaMask,
    Coinbase,
}

impl PreferredWallet {
    pub fn matches(&self, info: &TransportInfo) -> bool {
        match self {
            PreferredWallet::MetaMask => info.is_metamask,
            PreferredWallet::Coinbase => info.is_coinbase_wallet,
        }
    }
}

impl FromStr for PreferredWallet {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "metamask" => Ok(PreferredWallet::MetaMask),
            "coinbase" | "coinbase_wallet" | "coinbase-wallet" => Ok(PreferredWallet::Coinbase),
            other => anyhow::bail!("Unknown preferred wallet: {}", other),
        }
    }
}

/// Every wallet transport visible to the app.
#[derive(Clone, Default)]
pub struct WalletEnvironment {
    /// The wallet object injected by an extension, if any.
    pub injected: Option<Arc<dyn WalletTransport>>,
    /// Injected wallets when several extensions compete for the page.
    pub providers: Vec<Arc<dyn WalletTransport>>,
    /// Provider constructed by the wallet SDK.
    pub sdk: Option<Arc<dyn WalletTransport>>,
}

impl WalletEnvironment {
    pub fn is_empty(&self) -> bool {
        self.injected.is_none() && self.providers.is_empty() && self.sdk.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryStrategy {
    FlaggedInjected,
    MultiProviderList,
    SdkFallback,
}

impl DiscoveryStrategy {
    pub const RANKED: [DiscoveryStrategy; 3] = [
        DiscoveryStrategy::FlaggedInjected,
        DiscoveryStrategy::MultiProviderList,
        DiscoveryStrategy::SdkFallback,
    ];

    pub fn discover(
        &self,
        env: &WalletEnvironment,
        preferred: PreferredWallet,
    ) -> Option<Arc<dyn WalletTransport>> {
        match self {
            DiscoveryStrategy::FlaggedInjected => env
                .injected
                .as_ref()
                .filter(|transport| preferred.matches(&transport.info()))
                .cloned(),
            DiscoveryStrategy::MultiProviderList => env
                .providers
                .iter()
                .find(|transport| preferred.matches(&transport.info()))
                .cloned(),
            DiscoveryStrategy::SdkFallback => env.sdk.clone(),
        }
    }
}

/// Tries each strategy in rank order and returns the first transport found.
#[derive(Clone)]
pub struct ProviderDiscovery {
    env: WalletEnvironment,
    preferred: PreferredWallet,
    strategies: Vec<DiscoveryStrategy>,
}

impl ProviderDiscovery {
    pub fn new(env: WalletEnvironment, preferred: PreferredWallet) -> Self {
        Self {
            env,
            preferred,
            strategies: DiscoveryStrategy::RANKED.to_vec(),
        }
    }

    pub fn discover(&self) -> Option<(DiscoveryStrategy, Arc<dyn WalletTransport>)> {
        self.strategies.iter().find_map(|strategy| {
            strategy
                .discover(&self.env, self.preferred)
                .map(|transport| (*strategy, transport))
        })
    }
}
