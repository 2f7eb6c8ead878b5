use crate::{
    constants::{
        GOVERNANCE_WEIGHT_CREATOR, GOVERNANCE_WEIGHT_TRUTH, TOKEN_CREATOR, TOKEN_TRUTH,
        VOTING_TIER_COUNCIL, VOTING_TIER_DELEGATE, VOTING_TIER_MEMBER,
    },
    models::{BalanceReading, DerivedMetrics, EcosystemState, VotingTier},
    services::token_balances::balance_as_f64,
};

// Internal helper that reads one symbol's scaled balance, unavailable as zero.
fn scaled(state: &EcosystemState, symbol: &str) -> f64 {
    state
        .balances
        .get(symbol)
        .and_then(BalanceReading::balance)
        .map(|balance| balance_as_f64(balance.raw_balance, balance.decimals))
        .unwrap_or(0.0)
}

pub fn voting_tier(governance_power: f64) -> VotingTier {
    if governance_power >= VOTING_TIER_COUNCIL {
        VotingTier::Council
    } else if governance_power >= VOTING_TIER_DELEGATE {
        VotingTier::Delegate
    } else if governance_power >= VOTING_TIER_MEMBER {
        VotingTier::Member
    } else {
        VotingTier::None
    }
}

/// Derived metrics as a pure function of the whole state. A disconnected
/// session has no metrics regardless of any balances still held.
pub fn compute_derived(state: &EcosystemState) -> DerivedMetrics {
    if !state.session.is_connected() {
        return DerivedMetrics::default();
    }

    let truth_balance = scaled(state, TOKEN_TRUTH);
    let creator_balance = scaled(state, TOKEN_CREATOR);
    let governance_power =
        truth_balance * GOVERNANCE_WEIGHT_TRUTH + creator_balance * GOVERNANCE_WEIGHT_CREATOR;
    let balances_complete = [TOKEN_TRUTH, TOKEN_CREATOR].iter().all(|symbol| {
        state
            .balances
            .get(*symbol)
            .map(BalanceReading::is_available)
            .unwrap_or(false)
    });

    DerivedMetrics {
        truth_balance,
        creator_balance,
        governance_power,
        voting_tier: voting_tier(governance_power),
        is_holder: truth_balance > 0.0 || creator_balance > 0.0,
        balances_complete,
    }
}
