use crate::{fees::FeeError, payload::PayloadError};
use alloy_primitives::{Address, U256};
use bridge::BridgeError;
use ledger::LedgerError;
use swap::SwapError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CellError {
    /// Neither a token amount nor native value was supplied
    #[error("invalid amount")]
    InvalidAmount,

    #[error("invalid instructions: {0}")]
    InvalidInstructions(String),

    /// Native value attached to an ERC20 initiation must equal the fixed fees
    #[error("attached value {actual} does not match fixed fees {expected}")]
    FeeMismatch { expected: U256, actual: U256 },

    #[error("fee {fee} must be below amount {amount}")]
    InsufficientAmountForFee { fee: U256, amount: U256 },

    #[error("native-only bridge requires the wrapped native token, got {token}")]
    NotWrappedNative { token: Address },

    #[error("swap failed: {0}")]
    SwapFailed(SwapError),

    #[error("{caller} is not the owner")]
    Unauthorized { caller: Address },

    #[error("reentrant call")]
    Reentrancy,

    #[error("zero address for {0}")]
    ZeroAddress(&'static str),

    #[error(transparent)]
    Fee(#[from] FeeError),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("bridge: {0}")]
    Bridge(#[from] BridgeError),
}
