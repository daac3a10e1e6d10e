//! Per-chain token accounting.
//!
//! Every collaborator that moves value on one chain (the routing engine, swap
//! strategies, the bridge) shares that chain's [`Ledger`]. Native currency and
//! ERC20-style tokens are tracked separately; the wrapped-native token is an
//! ordinary token whose contract holds the native currency backing it.

pub mod book;

pub use book::{Ledger, Snapshot};

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Asset marker used in [`Balance`] for native currency.
pub const NATIVE: Address = Address::ZERO;

/// A balance at the time it was queried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// The address holding the balance
    pub holder: Address,
    /// The asset address (zero address for native currency)
    pub asset: Address,
    /// The balance amount
    pub amount: U256,
}

/// Type of balance query to perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceQuery {
    /// Query ERC20 token balance for an account or contract
    ERC20Balance {
        /// Token contract address
        token: Address,
        /// Holder address
        holder: Address,
    },
    /// Query native currency balance
    NativeBalance {
        /// Account address
        address: Address,
    },
}

/// Trait for reading balances.
pub trait Monitor: Send + Sync {
    /// Query a single balance.
    fn query_balance(&self, query: BalanceQuery) -> Balance;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient balance of {asset} for {holder}: need {needed}, have {available}")]
    InsufficientBalance {
        asset: Address,
        holder: Address,
        needed: U256,
        available: U256,
    },

    #[error("balance overflow for {holder}")]
    Overflow { holder: Address },

    #[error("{0} is not a token")]
    NotAToken(Address),
}
