//! Plan and continuation types.

use crate::{fees::FeeSchedule, CellError};
use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a cell does with the hop it is executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Bridge the working token to the receiver. Terminal.
    Hop,
    /// Bridge the working token to the next cell, which runs the next hop.
    HopAndCall,
    /// Swap, then bridge to the receiver (last hop) or to the next cell.
    SwapAndHop,
    /// Swap and deliver to the receiver on this chain. Terminal.
    SwapAndTransfer,
}

impl Action {
    pub const fn swaps(self) -> bool {
        matches!(self, Self::SwapAndHop | Self::SwapAndTransfer)
    }

    pub const fn bridges(self) -> bool {
        !matches!(self, Self::SwapAndTransfer)
    }

    /// Actions that can only appear as the last hop of a plan.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Hop | Self::SwapAndTransfer)
    }

    /// Numeric tag used on the wire.
    pub const fn tag(self) -> u8 {
        match self {
            Self::Hop => 0,
            Self::HopAndCall => 1,
            Self::SwapAndHop => 2,
            Self::SwapAndTransfer => 3,
        }
    }

    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Hop),
            1 => Some(Self::HopAndCall),
            2 => Some(Self::SwapAndHop),
            3 => Some(Self::SwapAndTransfer),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Hop => "hop",
            Self::HopAndCall => "hop_and_call",
            Self::SwapAndHop => "swap_and_hop",
            Self::SwapAndTransfer => "swap_and_transfer",
        };
        f.write_str(name)
    }
}

/// Where and how tokens leave the chain executing a hop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgePath {
    /// Transferrer on the chain executing the hop
    pub bridge_source_chain: Address,
    /// Whether that transferrer moves native currency instead of a token
    pub source_bridge_is_native: bool,
    /// Paired transferrer on the destination chain
    pub bridge_destination_chain: Address,
    /// Cell to invoke on the destination chain (forwarding hops only)
    pub cell_destination_chain: Address,
    pub destination_blockchain_id: B256,
    /// Messaging fee, paid in the bridged token
    pub teleporter_fee: U256,
    /// Fee for the second leg of a home-routed transfer
    pub secondary_teleporter_fee: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hop {
    pub action: Action,
    pub required_gas_limit: u64,
    pub recipient_gas_limit: u64,
    /// Strategy-specific encoded trade; empty when the hop does not swap
    pub trade: Bytes,
    pub bridge_path: BridgePath,
}

/// Referrer fee attached to a single operation.
pub type ThirdPartyFee = FeeSchedule;

/// The complete plan of an operation, fixed once submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instructions {
    /// Opaque frontend identifier, for attribution only
    pub source_id: u64,
    pub receiver: Address,
    /// Deliver wrapped native as native currency
    pub payable_receiver: bool,
    pub rollback_receiver: Address,
    pub rollback_teleporter_fee: U256,
    pub rollback_gas_limit: u64,
    pub hops: Vec<Hop>,
    #[serde(default)]
    pub third_party_fee: Option<ThirdPartyFee>,
}

impl Instructions {
    /// Check the plan is executable as a whole.
    ///
    /// Run at initiation, and again on every chain for the hops still left.
    pub fn validate(&self) -> Result<(), CellError> {
        let invalid = |msg: String| Err(CellError::InvalidInstructions(msg));

        if self.hops.is_empty() {
            return invalid("no hops".into());
        }
        if self.receiver == Address::ZERO {
            return invalid("zero receiver".into());
        }
        if self.rollback_receiver == Address::ZERO {
            return invalid("zero rollback receiver".into());
        }

        let last = self.hops.len() - 1;
        for (i, hop) in self.hops.iter().enumerate() {
            let action = hop.action;
            if action.is_terminal() && i != last {
                return invalid(format!("{action} at hop {i} must be the last hop"));
            }
            if action == Action::HopAndCall && i == last {
                return invalid(format!("{action} cannot be the last hop"));
            }
            if action.swaps() && hop.trade.is_empty() {
                return invalid(format!("{action} at hop {i} has no trade"));
            }
            if action.bridges() {
                let path = &hop.bridge_path;
                if path.bridge_source_chain == Address::ZERO
                    || path.bridge_destination_chain == Address::ZERO
                    || path.destination_blockchain_id == B256::ZERO
                {
                    return invalid(format!("hop {i} has an incomplete bridge path"));
                }
                if hop.required_gas_limit == 0 {
                    return invalid(format!("hop {i} has no gas limit"));
                }
            }
            if forwards(action, i, last) {
                if hop.bridge_path.cell_destination_chain == Address::ZERO {
                    return invalid(format!("hop {i} forwards to no cell"));
                }
                if hop.required_gas_limit <= hop.recipient_gas_limit {
                    return invalid(format!(
                        "hop {i} required gas limit {} must exceed recipient gas limit {}",
                        hop.required_gas_limit, hop.recipient_gas_limit
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Whether the hop at `index` hands the remaining plan to another cell.
pub(crate) const fn forwards(action: Action, index: usize, last: usize) -> bool {
    match action {
        Action::HopAndCall => true,
        Action::SwapAndHop => index != last,
        Action::Hop | Action::SwapAndTransfer => false,
    }
}

/// Continuation state carried by every bridge message of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellPayload {
    /// Remaining plan; `hops[0]` is executed by the receiving cell
    pub instructions: Instructions,
    /// Delivery index: 0 for the message sent by the origin chain
    pub hop: u64,
    pub source_blockchain_id: B256,
    /// Transferrer on the origin chain a refund is sent back to
    pub rollback_destination: Address,
    pub operation_id: B256,
}

impl CellPayload {
    /// Payload for the next cell once `hops[0]` has been executed here,
    /// carried by the message with delivery index `delivery`.
    pub fn advance(&self, delivery: u64) -> Self {
        let mut next = self.clone();
        next.instructions.hops.remove(0);
        next.hop = delivery;
        next
    }
}
