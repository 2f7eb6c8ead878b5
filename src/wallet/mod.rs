// Wallet access: transports, discovery and the provider adapter.
pub mod adapter;
pub mod address;
pub mod discovery;
pub mod http_transport;
#[cfg(test)]
pub mod scripted;
pub mod transport;

pub use adapter::{AdapterTimeouts, WalletConnection, WalletProviderAdapter};
pub use discovery::{PreferredWallet, ProviderDiscovery, WalletEnvironment};
pub use http_transport::HttpTransport;
pub use transport::{ProviderEvent, TransportInfo, WalletTransport};
