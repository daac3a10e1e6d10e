//! Payload codec.
//!
//! Converts between the domain types in [`crate::types`] and their ABI wire
//! form from `binding::cell`.

use crate::{
    fees::FeeSchedule,
    types::{Action, BridgePath, CellPayload, Hop, Instructions},
};
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::SolValue;
use binding::cell as wire;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("unknown action tag {0}")]
    UnknownAction(u8),

    #[error("{field} {value} does not fit in 64 bits")]
    OutOfRange { field: &'static str, value: U256 },
}

pub fn encode(payload: &CellPayload) -> Bytes {
    wire::CellPayload::from(payload).abi_encode().into()
}

pub fn decode(data: &[u8]) -> Result<CellPayload, PayloadError> {
    let raw = wire::CellPayload::abi_decode(data)
        .map_err(|e| PayloadError::Malformed(e.to_string()))?;
    CellPayload::try_from(raw)
}

/// Identifier correlating every event of one operation across chains.
pub fn operation_id(
    source_blockchain_id: B256,
    cell: Address,
    sender: Address,
    nonce: u64,
) -> B256 {
    let seed = wire::OperationSeed {
        sourceBlockchainID: source_blockchain_id,
        cell,
        sender,
        nonce: U256::from(nonce),
    };
    keccak256(seed.abi_encode())
}

fn narrow(field: &'static str, value: U256) -> Result<u64, PayloadError> {
    u64::try_from(value).map_err(|_| PayloadError::OutOfRange { field, value })
}

impl From<&BridgePath> for wire::BridgePath {
    fn from(path: &BridgePath) -> Self {
        Self {
            bridgeSourceChain: path.bridge_source_chain,
            sourceBridgeIsNative: path.source_bridge_is_native,
            bridgeDestinationChain: path.bridge_destination_chain,
            cellDestinationChain: path.cell_destination_chain,
            destinationBlockchainID: path.destination_blockchain_id,
            teleporterFee: path.teleporter_fee,
            secondaryTeleporterFee: path.secondary_teleporter_fee,
        }
    }
}

impl From<wire::BridgePath> for BridgePath {
    fn from(path: wire::BridgePath) -> Self {
        Self {
            bridge_source_chain: path.bridgeSourceChain,
            source_bridge_is_native: path.sourceBridgeIsNative,
            bridge_destination_chain: path.bridgeDestinationChain,
            cell_destination_chain: path.cellDestinationChain,
            destination_blockchain_id: path.destinationBlockchainID,
            teleporter_fee: path.teleporterFee,
            secondary_teleporter_fee: path.secondaryTeleporterFee,
        }
    }
}

impl From<&Hop> for wire::Hop {
    fn from(hop: &Hop) -> Self {
        Self {
            action: hop.action.tag(),
            requiredGasLimit: U256::from(hop.required_gas_limit),
            recipientGasLimit: U256::from(hop.recipient_gas_limit),
            trade: hop.trade.clone(),
            bridgePath: (&hop.bridge_path).into(),
        }
    }
}

impl TryFrom<wire::Hop> for Hop {
    type Error = PayloadError;

    fn try_from(hop: wire::Hop) -> Result<Self, Self::Error> {
        Ok(Self {
            action: Action::from_tag(hop.action).ok_or(PayloadError::UnknownAction(hop.action))?,
            required_gas_limit: narrow("required gas limit", hop.requiredGasLimit)?,
            recipient_gas_limit: narrow("recipient gas limit", hop.recipientGasLimit)?,
            trade: hop.trade,
            bridge_path: hop.bridgePath.into(),
        })
    }
}

/// An absent fee travels as the all-zero struct.
fn fee_to_wire(fee: Option<&FeeSchedule>) -> wire::ThirdPartyFee {
    let fee = fee.copied().unwrap_or_default();
    wire::ThirdPartyFee {
        feeCollector: fee.collector,
        fixedFee: fee.fixed_fee,
        baseFeeBips: fee.base_fee_bips,
        exemptSingleHop: fee.exempt_single_hop,
    }
}

fn fee_from_wire(fee: wire::ThirdPartyFee) -> Option<FeeSchedule> {
    let schedule = FeeSchedule {
        collector: fee.feeCollector,
        fixed_fee: fee.fixedFee,
        base_fee_bips: fee.baseFeeBips,
        exempt_single_hop: fee.exemptSingleHop,
    };
    (schedule != FeeSchedule::default()).then_some(schedule)
}

impl From<&Instructions> for wire::Instructions {
    fn from(instructions: &Instructions) -> Self {
        Self {
            sourceId: instructions.source_id,
            receiver: instructions.receiver,
            payableReceiver: instructions.payable_receiver,
            rollbackReceiver: instructions.rollback_receiver,
            rollbackTeleporterFee: instructions.rollback_teleporter_fee,
            rollbackGasLimit: U256::from(instructions.rollback_gas_limit),
            hops: instructions.hops.iter().map(Into::into).collect(),
            thirdPartyFee: fee_to_wire(instructions.third_party_fee.as_ref()),
        }
    }
}

impl TryFrom<wire::Instructions> for Instructions {
    type Error = PayloadError;

    fn try_from(instructions: wire::Instructions) -> Result<Self, Self::Error> {
        Ok(Self {
            source_id: instructions.sourceId,
            receiver: instructions.receiver,
            payable_receiver: instructions.payableReceiver,
            rollback_receiver: instructions.rollbackReceiver,
            rollback_teleporter_fee: instructions.rollbackTeleporterFee,
            rollback_gas_limit: narrow("rollback gas limit", instructions.rollbackGasLimit)?,
            hops: instructions
                .hops
                .into_iter()
                .map(Hop::try_from)
                .collect::<Result<_, _>>()?,
            third_party_fee: fee_from_wire(instructions.thirdPartyFee),
        })
    }
}

impl From<&CellPayload> for wire::CellPayload {
    fn from(payload: &CellPayload) -> Self {
        Self {
            instructions: (&payload.instructions).into(),
            hop: U256::from(payload.hop),
            sourceBlockchainID: payload.source_blockchain_id,
            rollbackDestination: payload.rollback_destination,
            operationId: payload.operation_id,
        }
    }
}

impl TryFrom<wire::CellPayload> for CellPayload {
    type Error = PayloadError;

    fn try_from(payload: wire::CellPayload) -> Result<Self, Self::Error> {
        Ok(Self {
            instructions: payload.instructions.try_into()?,
            hop: narrow("hop index", payload.hop)?,
            source_blockchain_id: payload.sourceBlockchainID,
            rollback_destination: payload.rollbackDestination,
            operation_id: payload.operationId,
        })
    }
}
