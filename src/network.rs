//! Deployment hostname to target chain resolution.

use serde::Serialize;
use std::sync::OnceLock;

use crate::constants::{CHAIN_ID_BASE_MAINNET, CHAIN_ID_BASE_SEPOLIA};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Chain parameters in EIP-3085 shape, so a profile can be handed to
/// `wallet_addEthereumChain` as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkProfile {
    #[serde(rename = "chainId")]
    pub chain_id_hex: String,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
}

impl NetworkProfile {
    pub fn chain_id(&self) -> u64 {
        parse_chain_id(&self.chain_id_hex).unwrap_or_default()
    }

    pub fn is_testnet(&self) -> bool {
        self.chain_id() == CHAIN_ID_BASE_SEPOLIA
    }

    pub fn explorer_url(&self) -> Option<&str> {
        self.block_explorer_urls.first().map(String::as_str)
    }
}

/// Parses a chain id reported by a wallet (`"0x2105"`) or typed by a user (`"8453"`).
pub fn parse_chain_id(value: &str) -> Option<u64> {
    let trimmed = value.trim();
    match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex_digits) => u64::from_str_radix(hex_digits, 16).ok(),
        None => trimmed.parse().ok(),
    }
}

pub fn chain_id_to_hex(chain_id: u64) -> String {
    format!("0x{:x}", chain_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkClass {
    Mainnet,
    Testnet,
}

struct HostRule {
    needle: &'static str,
    class: NetworkClass,
}

// Evaluated top to bottom; the first matching rule wins.
const HOST_RULES: &[HostRule] = &[
    HostRule {
        needle: "vercel.app",
        class: NetworkClass::Mainnet,
    },
    HostRule {
        needle: "netlify.app",
        class: NetworkClass::Mainnet,
    },
    HostRule {
        needle: "pages.dev",
        class: NetworkClass::Mainnet,
    },
    HostRule {
        needle: "replit.dev",
        class: NetworkClass::Testnet,
    },
    HostRule {
        needle: "repl.co",
        class: NetworkClass::Testnet,
    },
];

const DEVELOPMENT_HOSTS: &[&str] = &["localhost", "127.0.0.1", "0.0.0.0", "[::1]"];

static BASE_MAINNET: OnceLock<NetworkProfile> = OnceLock::new();
static BASE_SEPOLIA: OnceLock<NetworkProfile> = OnceLock::new();

pub fn base_mainnet() -> &'static NetworkProfile {
    BASE_MAINNET.get_or_init(|| NetworkProfile {
        chain_id_hex: chain_id_to_hex(CHAIN_ID_BASE_MAINNET),
        chain_name: "Base".to_string(),
        native_currency: NativeCurrency {
            name: "Ether".to_string(),
            symbol: "ETH".to_string(),
            decimals: 18,
        },
        rpc_urls: vec!["https://mainnet.base.org".to_string()],
        block_explorer_urls: vec!["https://basescan.org".to_string()],
    })
}

pub fn base_sepolia() -> &'static NetworkProfile {
    BASE_SEPOLIA.get_or_init(|| NetworkProfile {
        chain_id_hex: chain_id_to_hex(CHAIN_ID_BASE_SEPOLIA),
        chain_name: "Base Sepolia".to_string(),
        native_currency: NativeCurrency {
            name: "Sepolia Ether".to_string(),
            symbol: "ETH".to_string(),
            decimals: 18,
        },
        rpc_urls: vec!["https://sepolia.base.org".to_string()],
        block_explorer_urls: vec!["https://sepolia.basescan.org".to_string()],
    })
}

pub fn profile_for(class: NetworkClass) -> &'static NetworkProfile {
    match class {
        NetworkClass::Mainnet => base_mainnet(),
        NetworkClass::Testnet => base_sepolia(),
    }
}

/// Looks up a built-in profile by numeric chain id.
pub fn profile_by_chain_id(chain_id: u64) -> Option<&'static NetworkProfile> {
    match chain_id {
        CHAIN_ID_BASE_MAINNET => Some(base_mainnet()),
        CHAIN_ID_BASE_SEPOLIA => Some(base_sepolia()),
        _ => None,
    }
}

// Internal helper that strips scheme-less port suffixes and lowercases.
fn normalize_host(hostname: &str) -> String {
    let host = hostname.trim().to_ascii_lowercase();
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => host[..=end].to_string(),
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name.to_string(),
        _ => host,
    }
}

pub fn is_development_host(hostname: &str) -> bool {
    let host = normalize_host(hostname);
    host.is_empty() || DEVELOPMENT_HOSTS.contains(&host.as_str()) || host.ends_with(".local")
}

pub fn classify_host(hostname: &str, production: bool) -> NetworkClass {
    let host = normalize_host(hostname);
    if let Some(rule) = HOST_RULES.iter().find(|rule| host.contains(rule.needle)) {
        return rule.class;
    }
    if is_development_host(&host) || !production {
        NetworkClass::Testnet
    } else {
        NetworkClass::Mainnet
    }
}

/// Maps a deployment hostname to the chain the site should target. Total: every
/// input resolves to some profile.
pub fn resolve_network(hostname: &str, production: bool) -> &'static NetworkProfile {
    profile_for(classify_host(hostname, production))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hosted_providers_resolve_to_their_fixed_profiles() {
        assert_eq!(resolve_network("myapp.vercel.app", false).chain_id_hex, "0x2105");
        assert_eq!(resolve_network("myapp.replit.dev", true).chain_id_hex, "0x14a34");
        assert_eq!(resolve_network("truth.netlify.app", false).chain_id_hex, "0x2105");
    }

    #[test]
    fn localhost_resolves_to_testnet_even_in_production() {
        let profile = resolve_network("localhost", true);
        assert_eq!(profile.chain_id_hex, "0x14a34");
        assert!(profile.is_testnet());
        assert_eq!(resolve_network("localhost:5173", true).chain_id(), CHAIN_ID_BASE_SEPOLIA);
    }

    #[test]
    fn bracketed_ipv6_loopback_with_port_is_development() {
        assert!(is_development_host("[::1]"));
        assert!(is_development_host("[::1]:5173"));
        assert_eq!(classify_host("[::1]:5173", true), NetworkClass::Testnet);
        assert!(resolve_network("[::1]:5173", true).is_testnet());
        assert_eq!(classify_host("[2001:db8::1]:443", true), NetworkClass::Mainnet);
    }

    #[test]
    fn unknown_host_falls_back_on_production_flag() {
        assert_eq!(classify_host("thetruth.xyz", true), NetworkClass::Mainnet);
        assert_eq!(classify_host("thetruth.xyz", false), NetworkClass::Testnet);
    }

    #[test]
    fn first_matching_rule_wins() {
        // Both needles present; vercel is listed first.
        let host = "preview-replit.dev.vercel.app";
        assert_eq!(classify_host(host, false), NetworkClass::Mainnet);
    }

    #[test]
    fn profile_serializes_as_add_chain_params() {
        let value = serde_json::to_value(base_sepolia()).unwrap();
        assert_eq!(value["chainId"], "0x14a34");
        assert_eq!(value["chainName"], "Base Sepolia");
        assert_eq!(value["nativeCurrency"]["decimals"], 18);
        assert!(value["rpcUrls"].is_array());
        assert!(value["blockExplorerUrls"].is_array());
    }

    #[test]
    fn parse_chain_id_accepts_hex_and_decimal() {
        assert_eq!(parse_chain_id("0x2105"), Some(8453));
        assert_eq!(parse_chain_id("8453"), Some(8453));
        assert_eq!(parse_chain_id("0xzz"), None);
        assert_eq!(chain_id_to_hex(84532), "0x14a34");
    }
}
