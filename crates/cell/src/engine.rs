use crate::{
    admin::AdminConfig,
    events::{CellEvent, StrandReason},
    fees::{self, FeeBreakdown, FeeSchedule},
    guard::ReentrancyGuard,
    native::NativeAdapter,
    payload,
    types::{forwards, Action, CellPayload, Hop, Instructions},
    CellError,
};
use alloy_primitives::{Address, B256, U256};
use binding::transferrer::{SendAndCallInput, SendTokensInput};
use bridge::{ReceiveContext, ReceiveError, TokenReceiver, TokenTransferrer};
use ledger::Ledger;
use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, PoisonError, RwLock,
};
use swap::{SwapError, SwapStrategy};
use tracing::{debug, warn};

/// Static settings of one cell deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellConfig {
    pub address: Address,
    pub blockchain_id: B256,
    pub wrapped_native: Address,
    pub owner: Address,
    pub fees: FeeSchedule,
}

/// Caller of [`Cell::initiate`] and the native currency attached to the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    pub sender: Address,
    pub value: U256,
}

/// How a cell finished its part of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Tokens handed to the receiver on this chain.
    Delivered {
        receiver: Address,
        token: Address,
        amount: U256,
        native: bool,
    },
    /// Tokens sent to the receiver on another chain.
    Bridged {
        message_id: B256,
        destination_blockchain_id: B256,
        receiver: Address,
        token: Address,
        amount: U256,
    },
    /// Remaining plan sent to the next cell.
    Forwarded {
        message_id: B256,
        destination_blockchain_id: B256,
        cell: Address,
        amount: U256,
        remaining_hops: usize,
    },
    /// First-hop swap failed; input sent back to the rollback receiver.
    RolledBack {
        message_id: B256,
        receiver: Address,
        amount: U256,
    },
    /// Later swap failed; un-swapped input handed to the receiver here.
    Salvaged {
        receiver: Address,
        token: Address,
        amount: U256,
    },
    /// Funds kept by the cell until the owner recovers them.
    Stranded {
        token: Address,
        amount: U256,
        reason: StrandReason,
    },
}

impl Outcome {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Delivered { .. } => "delivered",
            Self::Bridged { .. } => "bridged",
            Self::Forwarded { .. } => "forwarded",
            Self::RolledBack { .. } => "rolled_back",
            Self::Salvaged { .. } => "salvaged",
            Self::Stranded { .. } => "stranded",
        }
    }

    /// Whether the operation ends with this outcome.
    pub const fn is_final(&self) -> bool {
        !matches!(self, Self::Forwarded { .. })
    }
}

/// The delivery a resumed call is handling.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Origin {
    pub(crate) ctx: ReceiveContext,
    /// Delivered as native currency by a native-only transferrer
    pub(crate) native: bool,
}

/// State of one entrypoint call.
pub(crate) struct Frame<'a> {
    /// `instructions.hops[0]` is the hop executing here
    pub(crate) payload: CellPayload,
    /// `None` on the chain that initiated the operation
    pub(crate) origin: Option<Origin>,
    pub(crate) events: &'a mut Vec<CellEvent>,
}

impl Frame<'_> {
    pub(crate) const fn operation_id(&self) -> B256 {
        self.payload.operation_id
    }

    pub(crate) const fn instructions(&self) -> &Instructions {
        &self.payload.instructions
    }

    /// Delivery index of the message this call sends on.
    const fn next_delivery(&self) -> u64 {
        match self.origin {
            Some(_) => self.payload.hop + 1,
            None => 0,
        }
    }
}

/// Token leaving through a transferrer, after messaging fees.
struct Departure {
    amount: U256,
    fee: U256,
    multi_hop_fallback: Address,
}

/// The routing engine instance of one chain.
pub struct Cell {
    pub(crate) address: Address,
    pub(crate) blockchain_id: B256,
    pub(crate) ledger: Ledger,
    pub(crate) native: NativeAdapter,
    strategy: Arc<dyn SwapStrategy>,
    pub(crate) transferrer: Arc<dyn TokenTransferrer>,
    pub(crate) admin: RwLock<AdminConfig>,
    nonce: AtomicU64,
    pub(crate) guard: ReentrancyGuard,
    events: Mutex<Vec<CellEvent>>,
}

impl Cell {
    pub fn new(
        config: CellConfig,
        ledger: Ledger,
        strategy: Arc<dyn SwapStrategy>,
        transferrer: Arc<dyn TokenTransferrer>,
    ) -> Result<Self, CellError> {
        if config.address == Address::ZERO {
            return Err(CellError::ZeroAddress("cell"));
        }
        if config.owner == Address::ZERO {
            return Err(CellError::ZeroAddress("owner"));
        }
        if config.wrapped_native == Address::ZERO {
            return Err(CellError::ZeroAddress("wrapped native"));
        }
        config.fees.validate()?;

        debug!(
            cell = %config.address,
            blockchain_id = %config.blockchain_id,
            strategy = %strategy.description(),
            "Cell deployed"
        );

        Ok(Self {
            address: config.address,
            blockchain_id: config.blockchain_id,
            native: NativeAdapter::new(config.wrapped_native, ledger.clone()),
            ledger,
            strategy,
            transferrer,
            admin: RwLock::new(AdminConfig {
                owner: config.owner,
                fees: config.fees,
            }),
            nonce: AtomicU64::new(0),
            guard: ReentrancyGuard::default(),
            events: Mutex::default(),
        })
    }

    pub const fn address(&self) -> Address {
        self.address
    }

    pub const fn blockchain_id(&self) -> B256 {
        self.blockchain_id
    }

    pub const fn wrapped_native(&self) -> Address {
        self.native.wrapped()
    }

    pub const fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn strategy(&self) -> &Arc<dyn SwapStrategy> {
        &self.strategy
    }

    /// Drain the events emitted since the last call.
    pub fn take_events(&self) -> Vec<CellEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub(crate) fn commit(&self, events: Vec<CellEvent>) {
        for event in &events {
            event.log(self.blockchain_id);
        }
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(events);
    }

    /// Run `call` as one atomic unit: its ledger changes and events are kept
    /// only if it succeeds.
    fn atomically(
        &self,
        call: impl FnOnce(&mut Vec<CellEvent>) -> Result<Outcome, CellError>,
    ) -> Result<Outcome, CellError> {
        let snapshot = self.ledger.snapshot();
        let mut events = Vec::new();
        match call(&mut events) {
            Ok(outcome) => {
                self.commit(events);
                Ok(outcome)
            }
            Err(e) => {
                self.ledger.restore(snapshot);
                warn!(blockchain_id = %self.blockchain_id, error = %e, "Call reverted");
                Err(e)
            }
        }
    }

    /// Start a new operation on this chain.
    ///
    /// With `amount == 0` the native currency in `ctx.value` is the input and
    /// `token` is ignored. Otherwise `amount` of `token` is pulled from the
    /// sender and `ctx.value` must cover exactly the fixed fees.
    pub fn initiate(
        &self,
        ctx: CallContext,
        token: Address,
        amount: U256,
        instructions: Instructions,
    ) -> Result<Outcome, CellError> {
        let _entered = self.guard.enter()?;
        self.atomically(|events| self.start(ctx, token, amount, instructions, events))
    }

    /// Continue an operation delivered by `ctx.bridge` as tokens.
    pub fn receive_tokens(
        &self,
        ctx: ReceiveContext,
        token: Address,
        amount: U256,
        payload: &[u8],
    ) -> Result<Outcome, CellError> {
        let _entered = self.guard.enter()?;
        self.atomically(|events| {
            self.ledger.transfer(token, ctx.bridge, self.address, amount)?;
            self.resume(
                Origin { ctx, native: false },
                token,
                amount,
                payload,
                events,
            )
        })
    }

    /// Continue an operation delivered by `ctx.bridge` as native currency.
    pub fn receive_native_tokens(
        &self,
        ctx: ReceiveContext,
        amount: U256,
        payload: &[u8],
    ) -> Result<Outcome, CellError> {
        let _entered = self.guard.enter()?;
        self.atomically(|events| {
            self.ledger
                .transfer_native(ctx.bridge, self.address, amount)?;
            self.native.wrap(self.address, amount)?;
            self.resume(
                Origin { ctx, native: true },
                self.native.wrapped(),
                amount,
                payload,
                events,
            )
        })
    }

    fn start(
        &self,
        ctx: CallContext,
        token: Address,
        amount: U256,
        instructions: Instructions,
        events: &mut Vec<CellEvent>,
    ) -> Result<Outcome, CellError> {
        instructions.validate()?;

        let nonce = self.nonce.fetch_add(1, Ordering::Relaxed);
        let operation_id =
            payload::operation_id(self.blockchain_id, self.address, ctx.sender, nonce);

        let (token, gross) = self.take_input(ctx, token, amount, &instructions)?;
        let fees = self.collect_fees(&instructions, token, gross)?;
        let amount = gross - fees.total_proportional();

        events.push(CellEvent::Initiated {
            operation_id,
            sender: ctx.sender,
            token,
            amount: gross,
            hops: instructions.hops.len(),
            source_id: instructions.source_id,
        });
        if !fees.total_fixed().is_zero() || !fees.total_proportional().is_zero() {
            events.push(CellEvent::FeesCollected {
                operation_id,
                token,
                fees,
            });
        }

        let payload = CellPayload {
            rollback_destination: instructions.hops[0].bridge_path.bridge_source_chain,
            instructions,
            hop: 0,
            source_blockchain_id: self.blockchain_id,
            operation_id,
        };
        let mut frame = Frame {
            payload,
            origin: None,
            events,
        };
        self.execute(&mut frame, token, amount)
    }

    /// Move the input into the cell; returns the working token and amount
    /// before proportional fees.
    fn take_input(
        &self,
        ctx: CallContext,
        token: Address,
        amount: U256,
        instructions: &Instructions,
    ) -> Result<(Address, U256), CellError> {
        if amount.is_zero() && ctx.value.is_zero() {
            return Err(CellError::InvalidAmount);
        }
        let admin = self.admin();
        let fixed = fees::fixed_fees(&admin.fees, instructions.third_party_fee.as_ref())?;

        if !ctx.value.is_zero() {
            self.ledger
                .transfer_native(ctx.sender, self.address, ctx.value)?;
        }

        if amount.is_zero() {
            let wrapped = ctx
                .value
                .checked_sub(fixed)
                .filter(|w| !w.is_zero())
                .ok_or(CellError::InvalidAmount)?;
            self.native.wrap(self.address, wrapped)?;
            return Ok((self.native.wrapped(), wrapped));
        }

        if ctx.value != fixed {
            return Err(CellError::FeeMismatch {
                expected: fixed,
                actual: ctx.value,
            });
        }
        self.ledger
            .transfer(token, ctx.sender, self.address, amount)?;
        Ok((token, amount))
    }

    /// Pay protocol and third-party fees out of the cell's balance.
    fn collect_fees(
        &self,
        instructions: &Instructions,
        token: Address,
        amount: U256,
    ) -> Result<FeeBreakdown, CellError> {
        let admin = self.admin();
        let fees = fees::compute_fees(
            &admin.fees,
            instructions.third_party_fee.as_ref(),
            amount,
            instructions.hops.len(),
        )?;
        for charge in fees.charges() {
            if !charge.fixed.is_zero() {
                self.ledger
                    .transfer_native(self.address, charge.collector, charge.fixed)?;
            }
            if !charge.proportional.is_zero() {
                self.ledger
                    .transfer(token, self.address, charge.collector, charge.proportional)?;
            }
        }
        Ok(fees)
    }

    fn resume(
        &self,
        origin: Origin,
        token: Address,
        amount: U256,
        data: &[u8],
        events: &mut Vec<CellEvent>,
    ) -> Result<Outcome, CellError> {
        let payload = payload::decode(data)?;
        payload.instructions.validate()?;

        events.push(CellEvent::CellReceived {
            operation_id: payload.operation_id,
            source_blockchain_id: origin.ctx.source_blockchain_id,
            token,
            amount,
            hop: payload.hop,
            remaining_hops: payload.instructions.hops.len(),
        });

        let mut frame = Frame {
            payload,
            origin: Some(origin),
            events,
        };
        self.execute(&mut frame, token, amount)
    }

    /// Execute `hops[0]` with `amount` of `token` held by the cell.
    fn execute(
        &self,
        frame: &mut Frame<'_>,
        token: Address,
        amount: U256,
    ) -> Result<Outcome, CellError> {
        let hop = frame.instructions().hops[0].clone();

        let (token, amount) = if hop.action.swaps() {
            match self.strategy.swap(self.address, token, amount, &hop.trade) {
                Ok(swapped) => (swapped.token_out, swapped.amount_out),
                Err(e) => return self.swap_failed(frame, token, amount, e),
            }
        } else {
            (token, amount)
        };

        let last = frame.instructions().hops.len() - 1;
        match hop.action {
            Action::SwapAndTransfer => self.deliver(frame, token, amount),
            action if forwards(action, 0, last) => self.forward(frame, &hop, token, amount),
            _ => self.bridge(frame, &hop, token, amount),
        }
    }

    fn swap_failed(
        &self,
        frame: &mut Frame<'_>,
        token: Address,
        amount: U256,
        error: SwapError,
    ) -> Result<Outcome, CellError> {
        let Some(origin) = frame.origin else {
            // nothing has left this chain yet, reverting refunds the sender
            return Err(CellError::SwapFailed(error));
        };

        frame.events.push(CellEvent::SwapFailed {
            operation_id: frame.operation_id(),
            hop: frame.payload.hop,
            token,
            amount,
            reason: error.to_string(),
        });

        if frame.payload.hop == 0 {
            return self.roll_back(frame, origin, token, amount);
        }
        self.salvage(frame, token, amount)
    }

    /// Hand the un-swapped input to the receiver on this chain.
    fn salvage(
        &self,
        frame: &mut Frame<'_>,
        token: Address,
        amount: U256,
    ) -> Result<Outcome, CellError> {
        let receiver = frame.instructions().receiver;
        self.native.deliver(
            self.address,
            receiver,
            token,
            amount,
            frame.instructions().payable_receiver,
        )?;
        frame.events.push(CellEvent::Salvaged {
            operation_id: frame.operation_id(),
            receiver,
            token,
            amount,
        });
        Ok(Outcome::Salvaged {
            receiver,
            token,
            amount,
        })
    }

    fn deliver(
        &self,
        frame: &mut Frame<'_>,
        token: Address,
        amount: U256,
    ) -> Result<Outcome, CellError> {
        let receiver = frame.instructions().receiver;
        let native = self.native.deliver(
            self.address,
            receiver,
            token,
            amount,
            frame.instructions().payable_receiver,
        )?;
        frame.events.push(CellEvent::Delivered {
            operation_id: frame.operation_id(),
            receiver,
            token,
            amount,
            native,
        });
        Ok(Outcome::Delivered {
            receiver,
            token,
            amount,
            native,
        })
    }

    /// Take the messaging fee out of `amount` and prepare the token for the
    /// transferrer in `hop`.
    fn depart(
        &self,
        frame: &mut Frame<'_>,
        hop: &Hop,
        token: Address,
        amount: U256,
    ) -> Result<Departure, CellError> {
        let path = &hop.bridge_path;
        let fee = path.teleporter_fee;
        if fee >= amount {
            return Err(CellError::InsufficientAmountForFee { fee, amount });
        }
        let amount = amount - fee;

        if path.source_bridge_is_native {
            self.native.require_wrapped(token)?;
            self.native.unwrap(self.address, amount)?;
        }

        let receiver = frame.instructions().receiver;
        let multi_hop_fallback = self.multi_hop_fallback(
            frame,
            path.bridge_source_chain,
            path.destination_blockchain_id,
            receiver,
        );
        Ok(Departure {
            amount,
            fee,
            multi_hop_fallback,
        })
    }

    /// Send the working token to the receiver on the destination chain.
    fn bridge(
        &self,
        frame: &mut Frame<'_>,
        hop: &Hop,
        token: Address,
        amount: U256,
    ) -> Result<Outcome, CellError> {
        let departure = self.depart(frame, hop, token, amount)?;
        let path = &hop.bridge_path;
        let receiver = frame.instructions().receiver;

        let input = SendTokensInput {
            destinationBlockchainID: path.destination_blockchain_id,
            destinationTokenTransferrerAddress: path.bridge_destination_chain,
            recipient: receiver,
            primaryFeeTokenAddress: token,
            primaryFee: departure.fee,
            secondaryFee: path.secondary_teleporter_fee,
            requiredGasLimit: U256::from(hop.required_gas_limit),
            multiHopFallback: departure.multi_hop_fallback,
        };
        let message_id =
            self.transferrer
                .send(self.address, path.bridge_source_chain, input, departure.amount)?;

        frame.events.push(CellEvent::Bridged {
            operation_id: frame.operation_id(),
            message_id,
            destination_blockchain_id: path.destination_blockchain_id,
            receiver,
            token,
            amount: departure.amount,
        });
        Ok(Outcome::Bridged {
            message_id,
            destination_blockchain_id: path.destination_blockchain_id,
            receiver,
            token,
            amount: departure.amount,
        })
    }

    /// Send the working token and the remaining plan to the next cell.
    fn forward(
        &self,
        frame: &mut Frame<'_>,
        hop: &Hop,
        token: Address,
        amount: U256,
    ) -> Result<Outcome, CellError> {
        let departure = self.depart(frame, hop, token, amount)?;
        let path = &hop.bridge_path;
        let next = frame.payload.advance(frame.next_delivery());
        let remaining_hops = next.instructions.hops.len();

        let input = SendAndCallInput {
            destinationBlockchainID: path.destination_blockchain_id,
            destinationTokenTransferrerAddress: path.bridge_destination_chain,
            recipientContract: path.cell_destination_chain,
            recipientPayload: payload::encode(&next),
            requiredGasLimit: U256::from(hop.required_gas_limit),
            recipientGasLimit: U256::from(hop.recipient_gas_limit),
            multiHopFallback: departure.multi_hop_fallback,
            fallbackRecipient: frame.instructions().receiver,
            primaryFeeTokenAddress: token,
            primaryFee: departure.fee,
            secondaryFee: path.secondary_teleporter_fee,
        };
        let message_id = self.transferrer.send_and_call(
            self.address,
            path.bridge_source_chain,
            input,
            departure.amount,
        )?;

        frame.events.push(CellEvent::Forwarded {
            operation_id: frame.operation_id(),
            message_id,
            destination_blockchain_id: path.destination_blockchain_id,
            cell: path.cell_destination_chain,
            token,
            amount: departure.amount,
            remaining_hops,
        });
        Ok(Outcome::Forwarded {
            message_id,
            destination_blockchain_id: path.destination_blockchain_id,
            cell: path.cell_destination_chain,
            amount: departure.amount,
            remaining_hops,
        })
    }

    /// Record funds the cell keeps custody of.
    pub(crate) fn strand(
        &self,
        frame: &mut Frame<'_>,
        token: Address,
        amount: U256,
        reason: StrandReason,
    ) -> Outcome {
        frame.events.push(CellEvent::Stranded {
            operation_id: frame.operation_id(),
            token,
            amount,
            reason: reason.clone(),
        });
        Outcome::Stranded {
            token,
            amount,
            reason,
        }
    }
}

impl From<CellError> for ReceiveError {
    fn from(e: CellError) -> Self {
        match e {
            CellError::Reentrancy => Self::Busy,
            e => Self::Rejected(e.to_string()),
        }
    }
}

impl TokenReceiver for Cell {
    type Receipt = Outcome;

    fn receive_tokens(
        &self,
        ctx: ReceiveContext,
        token: Address,
        amount: U256,
        payload: &[u8],
    ) -> Result<Outcome, ReceiveError> {
        Self::receive_tokens(self, ctx, token, amount, payload).map_err(Into::into)
    }

    fn receive_native_tokens(
        &self,
        ctx: ReceiveContext,
        amount: U256,
        payload: &[u8],
    ) -> Result<Outcome, ReceiveError> {
        Self::receive_native_tokens(self, ctx, amount, payload).map_err(Into::into)
    }
}
