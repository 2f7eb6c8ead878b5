/// Application constants

// Chain ids (EIP-155)
pub const CHAIN_ID_BASE_MAINNET: u64 = 8453;
pub const CHAIN_ID_BASE_SEPOLIA: u64 = 84532;

// Token symbols
pub const TOKEN_TRUTH: &str = "TRUTH";
pub const TOKEN_CREATOR: &str = "CREATOR";

// Token addresses (Base), overridable via config
pub const TOKEN_TRUTH_ADDRESS: &str = "0x0000000000000000000000000000000000000001";
pub const TOKEN_CREATOR_ADDRESS: &str = "0x0000000000000000000000000000000000000002";
pub const TOKEN_DEFAULT_DECIMALS: u8 = 18;

// Governance weighting
pub const GOVERNANCE_WEIGHT_TRUTH: f64 = 1.0;
pub const GOVERNANCE_WEIGHT_CREATOR: f64 = 0.5;
pub const VOTING_TIER_MEMBER: f64 = 1.0; // any voting power
pub const VOTING_TIER_DELEGATE: f64 = 10_000.0;
pub const VOTING_TIER_COUNCIL: f64 = 100_000.0;

// Provider error codes (EIP-1193 / EIP-3326)
pub const PROVIDER_CODE_USER_REJECTED: i64 = 4001;
pub const PROVIDER_CODE_UNRECOGNIZED_CHAIN: i64 = 4902;
pub const PROVIDER_CODE_INTERNAL: i64 = -32603;

// Timeouts
pub const CONNECT_TIMEOUT_SECS: u64 = 30;
pub const PROVIDER_CALL_TIMEOUT_SECS: u64 = 10;
pub const BALANCE_READ_TIMEOUT_SECS: u64 = 10;

// Background sync intervals
pub const RESYNC_INTERVAL_SECS: u64 = 30;
pub const WALLET_POLL_INTERVAL_SECS: u64 = 5;

// Persistence
pub const STATE_STORAGE_KEY: &str = "truth_ecosystem_state";
pub const DEFAULT_PAGE: &str = "home";

// Event channel capacity for wallet transports
pub const PROVIDER_EVENT_CAPACITY: usize = 64;

// Formatting
pub const BALANCE_DISPLAY_DECIMALS: usize = 4;

// API version
pub const API_VERSION: &str = "v1";
