use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// What the destination transferrer does with the tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    /// Plain transfer to `recipient`.
    Transfer { recipient: Address },
    /// Transfer to `recipient_contract` and invoke it with `payload`. If the
    /// call reverts the tokens go to `fallback_recipient`.
    Call {
        recipient_contract: Address,
        payload: Bytes,
        recipient_gas_limit: U256,
        fallback_recipient: Address,
    },
}

/// Onward leg of a message routed through its home chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiHopLeg {
    pub final_blockchain_id: B256,
    pub final_bridge: Address,
    /// Paid on the home chain when the onward leg cannot be sent
    pub fallback: Address,
    /// Deducted from the amount on the home chain to pay for the onward leg
    pub secondary_fee: U256,
}

/// A cross-chain message waiting for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeMessage {
    pub id: B256,
    pub source_blockchain_id: B256,
    pub origin_bridge: Address,
    pub origin_sender: Address,
    pub destination_blockchain_id: B256,
    pub destination_bridge: Address,
    pub amount: U256,
    pub required_gas_limit: U256,
    pub kind: MessageKind,
    pub multi_hop: Option<MultiHopLeg>,
}

impl BridgeMessage {
    /// Address the tokens are ultimately meant for.
    pub const fn recipient(&self) -> Address {
        match &self.kind {
            MessageKind::Transfer { recipient } => *recipient,
            MessageKind::Call {
                recipient_contract, ..
            } => *recipient_contract,
        }
    }
}

/// Result of delivering one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery<R> {
    /// Tokens credited to a plain recipient.
    Transferred {
        recipient: Address,
        token: Address,
        amount: U256,
    },
    /// The receiving contract accepted the call.
    Called(R),
    /// The receiving contract reverted; tokens went to the fallback recipient.
    FallbackPaid {
        recipient: Address,
        token: Address,
        amount: U256,
        reason: String,
    },
    /// The home chain re-sent the message on its onward leg.
    Relayed { message_id: B256 },
    /// The home chain could not send the onward leg and paid the multi-hop
    /// fallback instead.
    MultiHopFallback {
        recipient: Address,
        token: Address,
        amount: U256,
        reason: String,
    },
}
