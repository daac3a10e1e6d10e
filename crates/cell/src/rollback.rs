//! Refunds for operations whose first remote swap fails.
//!
//! Only the first cell after the origin chain may roll back, and only for a
//! delivery that provably comes from the origin's transferrer. Anything else
//! that cannot be refunded stays in the cell.

use crate::{
    engine::{Frame, Origin},
    events::{CellEvent, StrandReason},
    types::CellPayload,
    Cell, CellError, Outcome,
};
use alloy_primitives::{Address, U256};
use binding::transferrer::SendTokensInput;
use bridge::ReceiveContext;

/// Whether `ctx` is the delivery the origin chain sent for `payload`.
pub(crate) fn is_authentic(ctx: &ReceiveContext, payload: &CellPayload) -> bool {
    ctx.source_blockchain_id == payload.source_blockchain_id
        && ctx.origin_transferrer == payload.rollback_destination
}

impl Cell {
    /// Send `amount` of `token` back to the rollback receiver on the origin
    /// chain, through the transferrer that delivered it.
    pub(crate) fn roll_back(
        &self,
        frame: &mut Frame<'_>,
        origin: Origin,
        token: Address,
        amount: U256,
    ) -> Result<Outcome, CellError> {
        if !is_authentic(&origin.ctx, &frame.payload) {
            let reason = StrandReason::ForgedOrigin {
                source_blockchain_id: origin.ctx.source_blockchain_id,
                origin_transferrer: origin.ctx.origin_transferrer,
            };
            return Ok(self.strand(frame, token, amount, reason));
        }

        let fee = frame.instructions().rollback_teleporter_fee;
        if fee >= amount {
            let reason = StrandReason::RollbackFeeTooHigh { fee, amount };
            return Ok(self.strand(frame, token, amount, reason));
        }

        let snapshot = self.ledger.snapshot();
        match self.send_refund(frame, origin, token, amount - fee, fee) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.ledger.restore(snapshot);
                let reason = StrandReason::RollbackSendFailed(e.to_string());
                Ok(self.strand(frame, token, amount, reason))
            }
        }
    }

    fn send_refund(
        &self,
        frame: &mut Frame<'_>,
        origin: Origin,
        token: Address,
        amount: U256,
        fee: U256,
    ) -> Result<Outcome, CellError> {
        if origin.native {
            self.native.unwrap(self.address, amount)?;
        }

        let bridge = origin.ctx.bridge;
        let destination = frame.payload.source_blockchain_id;
        let receiver = frame.instructions().rollback_receiver;
        let multi_hop_fallback = self.multi_hop_fallback(frame, bridge, destination, receiver);

        let input = SendTokensInput {
            destinationBlockchainID: destination,
            destinationTokenTransferrerAddress: frame.payload.rollback_destination,
            recipient: receiver,
            primaryFeeTokenAddress: token,
            primaryFee: fee,
            secondaryFee: U256::ZERO,
            requiredGasLimit: U256::from(frame.instructions().rollback_gas_limit),
            multiHopFallback: multi_hop_fallback,
        };
        let message_id = self.transferrer.send(self.address, bridge, input, amount)?;

        frame.events.push(CellEvent::RolledBack {
            operation_id: frame.operation_id(),
            message_id,
            destination_blockchain_id: destination,
            receiver,
            token,
            amount,
        });
        Ok(Outcome::RolledBack {
            message_id,
            receiver,
            amount,
        })
    }
}
