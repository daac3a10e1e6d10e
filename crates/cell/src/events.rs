use crate::fees::{FeeBreakdown, FeeSchedule};
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info, warn};

/// Why funds stayed in a cell instead of reaching anyone.
///
/// Stranded funds can only be moved by the owner's recovery sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrandReason {
    /// The delivering chain or transferrer is not the recorded origin
    ForgedOrigin {
        source_blockchain_id: B256,
        origin_transferrer: Address,
    },
    /// Rollback messaging fee does not leave anything to refund
    RollbackFeeTooHigh { fee: U256, amount: U256 },
    /// The refund transfer itself was refused by the bridge
    RollbackSendFailed(String),
}

impl fmt::Display for StrandReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForgedOrigin {
                source_blockchain_id,
                origin_transferrer,
            } => write!(
                f,
                "origin {origin_transferrer} on {source_blockchain_id} does not match rollback destination"
            ),
            Self::RollbackFeeTooHigh { fee, amount } => {
                write!(f, "rollback fee {fee} not below amount {amount}")
            }
            Self::RollbackSendFailed(reason) => write!(f, "rollback send failed: {reason}"),
        }
    }
}

/// Structured record of everything a cell does.
///
/// Events of a rejected call are discarded together with its state changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellEvent {
    Initiated {
        operation_id: B256,
        sender: Address,
        token: Address,
        amount: U256,
        hops: usize,
        source_id: u64,
    },
    FeesCollected {
        operation_id: B256,
        token: Address,
        fees: FeeBreakdown,
    },
    CellReceived {
        operation_id: B256,
        source_blockchain_id: B256,
        token: Address,
        amount: U256,
        hop: u64,
        remaining_hops: usize,
    },
    SwapFailed {
        operation_id: B256,
        hop: u64,
        token: Address,
        amount: U256,
        reason: String,
    },
    Delivered {
        operation_id: B256,
        receiver: Address,
        token: Address,
        amount: U256,
        native: bool,
    },
    Bridged {
        operation_id: B256,
        message_id: B256,
        destination_blockchain_id: B256,
        receiver: Address,
        token: Address,
        amount: U256,
    },
    Forwarded {
        operation_id: B256,
        message_id: B256,
        destination_blockchain_id: B256,
        cell: Address,
        token: Address,
        amount: U256,
        remaining_hops: usize,
    },
    RolledBack {
        operation_id: B256,
        message_id: B256,
        destination_blockchain_id: B256,
        receiver: Address,
        token: Address,
        amount: U256,
    },
    Salvaged {
        operation_id: B256,
        receiver: Address,
        token: Address,
        amount: U256,
    },
    Stranded {
        operation_id: B256,
        token: Address,
        amount: U256,
        reason: StrandReason,
    },
    MultiHopDetectionFailed {
        operation_id: B256,
        bridge: Address,
        reason: String,
    },
    FeeScheduleUpdated {
        schedule: FeeSchedule,
    },
    OwnershipTransferred {
        previous: Address,
        owner: Address,
    },
    Recovered {
        asset: Address,
        to: Address,
        amount: U256,
    },
}

impl CellEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Initiated { .. } => "initiated",
            Self::FeesCollected { .. } => "fees_collected",
            Self::CellReceived { .. } => "cell_received",
            Self::SwapFailed { .. } => "swap_failed",
            Self::Delivered { .. } => "delivered",
            Self::Bridged { .. } => "bridged",
            Self::Forwarded { .. } => "forwarded",
            Self::RolledBack { .. } => "rolled_back",
            Self::Salvaged { .. } => "salvaged",
            Self::Stranded { .. } => "stranded",
            Self::MultiHopDetectionFailed { .. } => "multi_hop_detection_failed",
            Self::FeeScheduleUpdated { .. } => "fee_schedule_updated",
            Self::OwnershipTransferred { .. } => "ownership_transferred",
            Self::Recovered { .. } => "recovered",
        }
    }

    pub const fn operation_id(&self) -> Option<B256> {
        match self {
            Self::Initiated { operation_id, .. }
            | Self::FeesCollected { operation_id, .. }
            | Self::CellReceived { operation_id, .. }
            | Self::SwapFailed { operation_id, .. }
            | Self::Delivered { operation_id, .. }
            | Self::Bridged { operation_id, .. }
            | Self::Forwarded { operation_id, .. }
            | Self::RolledBack { operation_id, .. }
            | Self::Salvaged { operation_id, .. }
            | Self::Stranded { operation_id, .. }
            | Self::MultiHopDetectionFailed { operation_id, .. } => Some(*operation_id),
            Self::FeeScheduleUpdated { .. }
            | Self::OwnershipTransferred { .. }
            | Self::Recovered { .. } => None,
        }
    }

    /// Emit the event as a log line attributed to `blockchain_id`.
    pub fn log(&self, blockchain_id: B256) {
        match self {
            Self::Initiated {
                operation_id,
                sender,
                token,
                amount,
                hops,
                source_id,
            } => info!(
                %blockchain_id, %operation_id, %sender, %token, %amount, hops, source_id,
                "Operation initiated"
            ),
            Self::FeesCollected {
                operation_id,
                token,
                fees,
            } => info!(
                %blockchain_id, %operation_id, %token,
                fixed = %fees.total_fixed(),
                proportional = %fees.total_proportional(),
                "Fees collected"
            ),
            Self::CellReceived {
                operation_id,
                source_blockchain_id,
                token,
                amount,
                hop,
                remaining_hops,
            } => info!(
                %blockchain_id, %operation_id, %source_blockchain_id, %token, %amount, hop, remaining_hops,
                "Cell received"
            ),
            Self::SwapFailed {
                operation_id,
                hop,
                token,
                amount,
                reason,
            } => warn!(
                %blockchain_id, %operation_id, hop, %token, %amount, %reason,
                "Swap failed"
            ),
            Self::Delivered {
                operation_id,
                receiver,
                token,
                amount,
                native,
            } => info!(
                %blockchain_id, %operation_id, %receiver, %token, %amount, native,
                "Delivered to receiver"
            ),
            Self::Bridged {
                operation_id,
                message_id,
                destination_blockchain_id,
                receiver,
                token,
                amount,
            } => info!(
                %blockchain_id, %operation_id, %message_id, %destination_blockchain_id, %receiver, %token, %amount,
                "Bridged to receiver"
            ),
            Self::Forwarded {
                operation_id,
                message_id,
                destination_blockchain_id,
                cell,
                token,
                amount,
                remaining_hops,
            } => info!(
                %blockchain_id, %operation_id, %message_id, %destination_blockchain_id, %cell, %token, %amount, remaining_hops,
                "Forwarded to next cell"
            ),
            Self::RolledBack {
                operation_id,
                message_id,
                destination_blockchain_id,
                receiver,
                token,
                amount,
            } => info!(
                %blockchain_id, %operation_id, %message_id, %destination_blockchain_id, %receiver, %token, %amount,
                "Rolled back to sender"
            ),
            Self::Salvaged {
                operation_id,
                receiver,
                token,
                amount,
            } => warn!(
                %blockchain_id, %operation_id, %receiver, %token, %amount,
                "Delivered un-swapped token to receiver"
            ),
            Self::Stranded {
                operation_id,
                token,
                amount,
                reason,
            } => error!(
                %blockchain_id, %operation_id, %token, %amount, %reason,
                "Funds stranded in cell"
            ),
            Self::MultiHopDetectionFailed {
                operation_id,
                bridge,
                reason,
            } => warn!(
                %blockchain_id, %operation_id, %bridge, %reason,
                "Multi-hop detection failed, assuming direct route"
            ),
            Self::FeeScheduleUpdated { schedule } => info!(
                %blockchain_id,
                collector = %schedule.collector,
                fixed_fee = %schedule.fixed_fee,
                base_fee_bips = schedule.base_fee_bips,
                exempt_single_hop = schedule.exempt_single_hop,
                "Fee schedule updated"
            ),
            Self::OwnershipTransferred { previous, owner } => info!(
                %blockchain_id, %previous, %owner,
                "Ownership transferred"
            ),
            Self::Recovered { asset, to, amount } => info!(
                %blockchain_id, %asset, %to, %amount,
                "Funds recovered"
            ),
        }
    }
}
