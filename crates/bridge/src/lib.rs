//! Bridge transferrer collaborator.
//!
//! The routing engine only needs three things from the bridge layer:
//! - `send`: move tokens to a recipient on another chain
//! - `send_and_call`: move tokens and invoke a contract there with a payload
//! - a topology query telling whether a transferrer is a remote of some home chain
//!
//! [`network::BridgeNetwork`] is an in-process implementation spanning several
//! chains. Outbound messages are published on a channel and delivered later by
//! a relayer, so every hop of a multi-chain operation runs as its own call.

pub mod message;
pub mod network;

pub use message::{BridgeMessage, Delivery, MessageKind, MultiHopLeg};
pub use network::{BridgeInfo, BridgeNetwork, ChainTransferrer, HomeRef};

use alloy_primitives::{Address, B256, U256};
use binding::transferrer::{SendAndCallInput, SendTokensInput};
use ledger::LedgerError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("unknown chain {0}")]
    UnknownChain(B256),

    #[error("no transferrer {bridge} on chain {blockchain_id}")]
    UnknownBridge { blockchain_id: B256, bridge: Address },

    #[error("invalid transfer input: {0}")]
    InvalidInput(String),

    #[error("message {0} already delivered")]
    AlreadyDelivered(B256),

    #[error("no receiver registered for {0}")]
    NoReceiver(Address),

    #[error("receiver busy, retry later")]
    ReceiverBusy,

    #[error("outbound channel closed")]
    ChannelClosed,

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Why a receiving contract did not accept a delivery.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReceiveError {
    /// The receiver is executing another call; nothing was consumed.
    #[error("receiver busy")]
    Busy,

    /// The receiver reverted; the bridge pays the fallback recipient instead.
    #[error("receiver rejected delivery: {0}")]
    Rejected(String),
}

/// Call metadata handed to a receiving contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveContext {
    /// Local transferrer making the call; the receiver pulls tokens from it
    pub bridge: Address,
    /// Chain the message was sent from
    pub source_blockchain_id: B256,
    /// Transferrer on the source chain that sent the message
    pub origin_transferrer: Address,
    /// Account that called `send_and_call` on the source chain
    pub origin_sender: Address,
}

/// Outbound half of the bridge, as seen by a contract on one chain.
pub trait TokenTransferrer: Send + Sync {
    /// Send `amount` through `bridge` to `input.recipient` on another chain.
    ///
    /// `sender` pays `amount` plus `input.primaryFee`. Returns the message id.
    fn send(
        &self,
        sender: Address,
        bridge: Address,
        input: SendTokensInput,
        amount: U256,
    ) -> Result<B256, BridgeError>;

    /// Send `amount` through `bridge` and call `input.recipientContract` with
    /// `input.recipientPayload` on arrival.
    fn send_and_call(
        &self,
        sender: Address,
        bridge: Address,
        input: SendAndCallInput,
        amount: U256,
    ) -> Result<B256, BridgeError>;

    /// Blockchain id of the home chain `bridge` belongs to. A home transferrer
    /// returns its own chain.
    fn home_blockchain_id(&self, bridge: Address) -> Result<B256, BridgeError>;
}

/// Inbound half: contracts that accept `send_and_call` deliveries.
pub trait TokenReceiver {
    /// What the receiver reports for an accepted delivery.
    type Receipt;

    fn receive_tokens(
        &self,
        ctx: ReceiveContext,
        token: Address,
        amount: U256,
        payload: &[u8],
    ) -> Result<Self::Receipt, ReceiveError>;

    fn receive_native_tokens(
        &self,
        ctx: ReceiveContext,
        amount: U256,
        payload: &[u8],
    ) -> Result<Self::Receipt, ReceiveError>;
}
