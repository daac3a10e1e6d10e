//! Swap strategies.
//!
//! The routing engine treats a swap venue as a capability with two operations:
//! - `route`: quote an off-chain plan and produce the opaque encoded trade
//! - `swap`: execute an encoded trade on-chain, returning a typed result
//!
//! A failed swap never moves funds and never aborts the caller.

pub mod constant_product;
pub mod passthrough;
pub mod signed_order;

pub use constant_product::{ConstantProduct, Pool};
pub use passthrough::Passthrough;
pub use signed_order::SignedOrder;

use alloy_primitives::{Address, Bytes, U256};
use ledger::LedgerError;
use thiserror::Error;

/// Result of quoting a trade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    /// Strategy-specific encoded trade, stored in `Hop.trade`
    pub trade: Bytes,
    /// Gas the swap is expected to consume
    pub gas_estimate: u64,
    /// Expected output for the quoted input
    pub amount_out: U256,
}

/// Result of an executed swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapOutcome {
    pub token_out: Address,
    pub amount_out: U256,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SwapError {
    #[error("invalid trade: {0}")]
    InvalidTrade(String),

    #[error("no route from {token_in} to {token_out}")]
    NoRoute { token_in: Address, token_out: Address },

    #[error("amount must not be zero")]
    ZeroAmount,

    #[error("trade expects {expected} as input, got {actual}")]
    TokenMismatch { expected: Address, actual: Address },

    #[error("output {actual} below minimum {minimum}")]
    Slippage { minimum: U256, actual: U256 },

    #[error("insufficient liquidity")]
    InsufficientLiquidity,

    #[error("amount overflow")]
    Overflow,

    #[error("order signature does not match maker {maker}")]
    InvalidSignature { maker: Address },

    #[error("order expired at {expiry}, now {now}")]
    Expired { expiry: u64, now: u64 },

    #[error("order nonce {nonce} of {maker} already used")]
    NonceUsed { maker: Address, nonce: U256 },

    #[error("input {amount} exceeds order size {available}")]
    OrderTooSmall { amount: U256, available: U256 },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// A swap venue the routing engine can call.
pub trait SwapStrategy: Send + Sync {
    /// Quote `amount_in` of `token_in` into `token_out`.
    ///
    /// `extra_params` carries strategy-specific planner hints and may be empty.
    fn route(
        &self,
        amount_in: U256,
        token_in: Address,
        token_out: Address,
        extra_params: &[u8],
    ) -> Result<Quote, SwapError>;

    /// Execute `trade`, taking `amount_in` of `token_in` from `payer` and
    /// crediting the output to `payer`.
    fn swap(
        &self,
        payer: Address,
        token_in: Address,
        amount_in: U256,
        trade: &[u8],
    ) -> Result<SwapOutcome, SwapError>;

    /// Get a human-readable description of this strategy.
    fn description(&self) -> String;
}

/// Scale `minimum` by `actual / planned`, used when the executed input differs
/// from the planned one (fees taken upstream).
pub(crate) fn scale_minimum(minimum: U256, planned: U256, actual: U256) -> U256 {
    if planned.is_zero() || planned == actual {
        return minimum;
    }
    minimum.saturating_mul(actual) / planned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_minimum() {
        assert_eq!(
            scale_minimum(U256::from(900), U256::from(1000), U256::from(1000)),
            U256::from(900)
        );
        assert_eq!(
            scale_minimum(U256::from(900), U256::from(1000), U256::from(500)),
            U256::from(450)
        );
        assert_eq!(
            scale_minimum(U256::from(900), U256::ZERO, U256::from(500)),
            U256::from(900)
        );
    }
}
