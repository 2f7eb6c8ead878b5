// src/models/mod.rs
pub mod ecosystem;

use serde::Serialize;

pub use ecosystem::{
    BalanceReading, ConnectionStatus, DerivedMetrics, EcosystemState, StateDiff, StateField,
    StateUpdate, TokenBalance, TokenDescriptor, VotingTier, WalletSession,
};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}
