use crate::{
    BridgeError, BridgeMessage, Delivery, MessageKind, MultiHopLeg, ReceiveContext,
    ReceiveError, TokenReceiver, TokenTransferrer,
};
use alloy_primitives::{keccak256, Address, B256, U256};
use binding::transferrer::{SendAndCallInput, SendTokensInput};
use ledger::{Ledger, NATIVE};
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError, RwLock,
    },
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

/// Home transferrer a remote transferrer is paired with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HomeRef {
    pub blockchain_id: B256,
    pub bridge: Address,
}

/// Registration of one token transferrer.
///
/// A home transferrer escrows the canonical token and releases it on
/// delivery. A remote transferrer mints a representation on delivery and
/// burns it when sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeInfo {
    pub address: Address,
    pub blockchain_id: B256,
    /// Token moved on this chain; [`NATIVE`] for a native-token home
    pub token: Address,
    /// `None` for a home transferrer
    pub home: Option<HomeRef>,
}

impl BridgeInfo {
    pub fn is_native(&self) -> bool {
        self.token == NATIVE
    }

    pub const fn home_blockchain_id(&self) -> B256 {
        match self.home {
            Some(home) => home.blockchain_id,
            None => self.blockchain_id,
        }
    }

    const fn home_ref(&self) -> HomeRef {
        match self.home {
            Some(home) => home,
            None => HomeRef {
                blockchain_id: self.blockchain_id,
                bridge: self.address,
            },
        }
    }

    /// Whether tokens can move directly between the two transferrers.
    fn pairs_with(&self, other: &Self) -> bool {
        self.home == Some(other.home_ref()) || other.home == Some(self.home_ref())
    }
}

struct Outbound {
    sender: Address,
    amount: U256,
    fee_token: Address,
    fee: U256,
    secondary_fee: U256,
    required_gas_limit: U256,
    destination_blockchain_id: B256,
    destination_bridge: Address,
    multi_hop_fallback: Address,
    kind: MessageKind,
}

/// In-process token bridge spanning several chains.
///
/// Sends are settled on the source ledger immediately and published on an
/// unbounded channel; [`BridgeNetwork::deliver`] settles them on the
/// destination. Messaging fees are paid to a single relayer address.
pub struct BridgeNetwork {
    ledgers: RwLock<HashMap<B256, Ledger>>,
    bridges: RwLock<HashMap<(B256, Address), BridgeInfo>>,
    delivered: Mutex<HashSet<B256>>,
    nonce: AtomicU64,
    fee_recipient: Address,
    outbox: UnboundedSender<BridgeMessage>,
}

impl BridgeNetwork {
    pub fn new(fee_recipient: Address) -> (Self, UnboundedReceiver<BridgeMessage>) {
        let (outbox, inbox) = mpsc::unbounded_channel();
        let network = Self {
            ledgers: RwLock::default(),
            bridges: RwLock::default(),
            delivered: Mutex::default(),
            nonce: AtomicU64::new(0),
            fee_recipient,
            outbox,
        };
        (network, inbox)
    }

    pub const fn fee_recipient(&self) -> Address {
        self.fee_recipient
    }

    pub fn register_chain(&self, blockchain_id: B256, ledger: Ledger) {
        self.ledgers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(blockchain_id, ledger);
    }

    pub fn register_bridge(&self, info: BridgeInfo) -> Result<(), BridgeError> {
        self.ledger(info.blockchain_id)?;
        if let Some(home) = info.home {
            if home.blockchain_id == info.blockchain_id {
                return Err(BridgeError::InvalidInput(
                    "remote transferrer must live on another chain than its home".into(),
                ));
            }
        }
        debug!(
            bridge = %info.address,
            chain = %info.blockchain_id,
            token = %info.token,
            remote = info.home.is_some(),
            "Registered transferrer"
        );
        self.bridges
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((info.blockchain_id, info.address), info);
        Ok(())
    }

    pub fn ledger(&self, blockchain_id: B256) -> Result<Ledger, BridgeError> {
        self.ledgers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&blockchain_id)
            .cloned()
            .ok_or(BridgeError::UnknownChain(blockchain_id))
    }

    pub fn bridge(&self, blockchain_id: B256, address: Address) -> Result<BridgeInfo, BridgeError> {
        self.bridges
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(blockchain_id, address))
            .copied()
            .ok_or(BridgeError::UnknownBridge {
                blockchain_id,
                bridge: address,
            })
    }

    /// Transferrer handle for contracts living on `blockchain_id`.
    pub fn transferrer(self: &Arc<Self>, blockchain_id: B256) -> ChainTransferrer {
        ChainTransferrer {
            blockchain_id,
            network: Arc::clone(self),
        }
    }

    pub fn home_blockchain_id(
        &self,
        blockchain_id: B256,
        bridge: Address,
    ) -> Result<B256, BridgeError> {
        Ok(self.bridge(blockchain_id, bridge)?.home_blockchain_id())
    }

    pub fn send(
        &self,
        blockchain_id: B256,
        sender: Address,
        bridge: Address,
        input: SendTokensInput,
        amount: U256,
    ) -> Result<B256, BridgeError> {
        if input.recipient == Address::ZERO {
            return Err(BridgeError::InvalidInput("zero recipient".into()));
        }
        self.dispatch(
            blockchain_id,
            bridge,
            Outbound {
                sender,
                amount,
                fee_token: input.primaryFeeTokenAddress,
                fee: input.primaryFee,
                secondary_fee: input.secondaryFee,
                required_gas_limit: input.requiredGasLimit,
                destination_blockchain_id: input.destinationBlockchainID,
                destination_bridge: input.destinationTokenTransferrerAddress,
                multi_hop_fallback: input.multiHopFallback,
                kind: MessageKind::Transfer {
                    recipient: input.recipient,
                },
            },
        )
    }

    pub fn send_and_call(
        &self,
        blockchain_id: B256,
        sender: Address,
        bridge: Address,
        input: SendAndCallInput,
        amount: U256,
    ) -> Result<B256, BridgeError> {
        if input.recipientContract == Address::ZERO {
            return Err(BridgeError::InvalidInput("zero recipient contract".into()));
        }
        if input.fallbackRecipient == Address::ZERO {
            return Err(BridgeError::InvalidInput("zero fallback recipient".into()));
        }
        if input.recipientGasLimit.is_zero() || input.recipientGasLimit >= input.requiredGasLimit
        {
            return Err(BridgeError::InvalidInput(format!(
                "recipient gas limit {} must be non-zero and below required gas limit {}",
                input.recipientGasLimit, input.requiredGasLimit
            )));
        }
        self.dispatch(
            blockchain_id,
            bridge,
            Outbound {
                sender,
                amount,
                fee_token: input.primaryFeeTokenAddress,
                fee: input.primaryFee,
                secondary_fee: input.secondaryFee,
                required_gas_limit: input.requiredGasLimit,
                destination_blockchain_id: input.destinationBlockchainID,
                destination_bridge: input.destinationTokenTransferrerAddress,
                multi_hop_fallback: input.multiHopFallback,
                kind: MessageKind::Call {
                    recipient_contract: input.recipientContract,
                    payload: input.recipientPayload,
                    recipient_gas_limit: input.recipientGasLimit,
                    fallback_recipient: input.fallbackRecipient,
                },
            },
        )
    }

    fn dispatch(
        &self,
        blockchain_id: B256,
        bridge: Address,
        out: Outbound,
    ) -> Result<B256, BridgeError> {
        let info = self.bridge(blockchain_id, bridge)?;
        let ledger = self.ledger(blockchain_id)?;

        if out.amount.is_zero() {
            return Err(BridgeError::InvalidInput("zero amount".into()));
        }
        if out.required_gas_limit.is_zero() {
            return Err(BridgeError::InvalidInput("zero required gas limit".into()));
        }
        if out.destination_blockchain_id == blockchain_id {
            return Err(BridgeError::InvalidInput(
                "destination is the sending chain".into(),
            ));
        }

        let (destination_blockchain_id, destination_bridge, multi_hop) = match info.home {
            Some(home) if home.blockchain_id != out.destination_blockchain_id => {
                if out.multi_hop_fallback == Address::ZERO {
                    return Err(BridgeError::InvalidInput(
                        "multi-hop send requires a fallback".into(),
                    ));
                }
                let leg = MultiHopLeg {
                    final_blockchain_id: out.destination_blockchain_id,
                    final_bridge: out.destination_bridge,
                    fallback: out.multi_hop_fallback,
                    secondary_fee: out.secondary_fee,
                };
                (home.blockchain_id, home.bridge, Some(leg))
            }
            _ => {
                let destination =
                    self.bridge(out.destination_blockchain_id, out.destination_bridge)?;
                if !info.pairs_with(&destination) {
                    return Err(BridgeError::InvalidInput(format!(
                        "transferrer {} is not paired with {}",
                        info.address, destination.address
                    )));
                }
                (out.destination_blockchain_id, out.destination_bridge, None)
            }
        };

        let snapshot = ledger.snapshot();
        if let Err(e) = self.escrow(&ledger, &info, &out) {
            ledger.restore(snapshot);
            return Err(e);
        }

        let message = BridgeMessage {
            id: self.next_message_id(blockchain_id),
            source_blockchain_id: blockchain_id,
            origin_bridge: info.address,
            origin_sender: out.sender,
            destination_blockchain_id,
            destination_bridge,
            amount: out.amount,
            required_gas_limit: out.required_gas_limit,
            kind: out.kind,
            multi_hop,
        };
        self.publish(message, Some((ledger, snapshot)))
    }

    /// Take `amount` and the messaging fee from the sender.
    fn escrow(&self, ledger: &Ledger, info: &BridgeInfo, out: &Outbound) -> Result<(), BridgeError> {
        if !out.fee.is_zero() {
            ledger.transfer(out.fee_token, out.sender, self.fee_recipient, out.fee)?;
        }
        if info.is_native() {
            ledger.transfer_native(out.sender, info.address, out.amount)?;
        } else {
            ledger.transfer(info.token, out.sender, info.address, out.amount)?;
        }
        if info.home.is_some() {
            ledger.burn(info.token, info.address, out.amount)?;
        }
        Ok(())
    }

    fn next_message_id(&self, blockchain_id: B256) -> B256 {
        let nonce = self.nonce.fetch_add(1, Ordering::Relaxed);
        keccak256([blockchain_id.as_slice(), &nonce.to_be_bytes()].concat())
    }

    fn publish(
        &self,
        message: BridgeMessage,
        undo: Option<(Ledger, ledger::Snapshot)>,
    ) -> Result<B256, BridgeError> {
        let id = message.id;
        info!(
            message_id = %id,
            from = %message.source_blockchain_id,
            to = %message.destination_blockchain_id,
            recipient = %message.recipient(),
            amount = %message.amount,
            multi_hop = message.multi_hop.is_some(),
            "Message sent"
        );
        if self.outbox.send(message).is_err() {
            if let Some((ledger, snapshot)) = undo {
                ledger.restore(snapshot);
            }
            return Err(BridgeError::ChannelClosed);
        }
        Ok(id)
    }

    /// Settle `message` on its destination chain.
    ///
    /// `receiver` is the contract addressed by a call message, if one exists
    /// there. A busy receiver leaves the message undelivered so it can be
    /// retried.
    pub fn deliver<R: TokenReceiver>(
        &self,
        message: &BridgeMessage,
        receiver: Option<&R>,
    ) -> Result<Delivery<R::Receipt>, BridgeError> {
        let inserted = self
            .delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(message.id);
        if !inserted {
            return Err(BridgeError::AlreadyDelivered(message.id));
        }

        let result = self.settle(message, receiver);
        if result.is_err() {
            self.delivered
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&message.id);
        }
        result
    }

    fn settle<R: TokenReceiver>(
        &self,
        message: &BridgeMessage,
        receiver: Option<&R>,
    ) -> Result<Delivery<R::Receipt>, BridgeError> {
        let info = self.bridge(message.destination_blockchain_id, message.destination_bridge)?;
        let ledger = self.ledger(message.destination_blockchain_id)?;
        let snapshot = ledger.snapshot();

        let result = self.credit(&ledger, &info, message).and_then(|()| {
            match message.multi_hop {
                Some(leg) => self.route_onward(&ledger, &info, message, leg),
                None => self.hand_over(&ledger, &info, message, receiver),
            }
        });

        if result.is_err() {
            ledger.restore(snapshot);
        }
        result
    }

    /// Make the delivered amount available at the destination transferrer.
    fn credit(
        &self,
        ledger: &Ledger,
        info: &BridgeInfo,
        message: &BridgeMessage,
    ) -> Result<(), BridgeError> {
        if info.home.is_some() {
            ledger.mint(info.token, info.address, message.amount)?;
        }
        Ok(())
    }

    fn release(
        ledger: &Ledger,
        info: &BridgeInfo,
        to: Address,
        amount: U256,
    ) -> Result<(), BridgeError> {
        if info.is_native() {
            ledger.transfer_native(info.address, to, amount)?;
        } else {
            ledger.transfer(info.token, info.address, to, amount)?;
        }
        Ok(())
    }

    fn held(ledger: &Ledger, info: &BridgeInfo) -> U256 {
        if info.is_native() {
            ledger.native_balance(info.address)
        } else {
            ledger.balance_of(info.token, info.address)
        }
    }

    /// Second leg of a multi-hop message, executed by the home transferrer.
    fn route_onward<T>(
        &self,
        ledger: &Ledger,
        info: &BridgeInfo,
        message: &BridgeMessage,
        leg: MultiHopLeg,
    ) -> Result<Delivery<T>, BridgeError> {
        let onward = self
            .bridge(leg.final_blockchain_id, leg.final_bridge)
            .map_err(|e| e.to_string())
            .and_then(|destination| {
                if destination.home == Some(info.home_ref()) {
                    Ok(destination)
                } else {
                    Err(format!("{} is not a remote of this home", destination.address))
                }
            })
            .and_then(|destination| {
                message
                    .amount
                    .checked_sub(leg.secondary_fee)
                    .filter(|net| !net.is_zero())
                    .map(|net| (destination, net))
                    .ok_or_else(|| "amount does not cover secondary fee".to_string())
            });

        let (destination, net) = match onward {
            Ok(found) => found,
            Err(reason) => {
                warn!(
                    message_id = %message.id,
                    fallback = %leg.fallback,
                    %reason,
                    "Multi-hop leg failed, paying fallback"
                );
                Self::release(ledger, info, leg.fallback, message.amount)?;
                return Ok(Delivery::MultiHopFallback {
                    recipient: leg.fallback,
                    token: info.token,
                    amount: message.amount,
                    reason,
                });
            }
        };

        if !leg.secondary_fee.is_zero() {
            Self::release(ledger, info, self.fee_recipient, leg.secondary_fee)?;
        }

        let onward = BridgeMessage {
            id: self.next_message_id(info.blockchain_id),
            destination_blockchain_id: destination.blockchain_id,
            destination_bridge: destination.address,
            amount: net,
            multi_hop: None,
            ..message.clone()
        };
        let message_id = self.publish(onward, None)?;
        Ok(Delivery::Relayed { message_id })
    }

    fn hand_over<R: TokenReceiver>(
        &self,
        ledger: &Ledger,
        info: &BridgeInfo,
        message: &BridgeMessage,
        receiver: Option<&R>,
    ) -> Result<Delivery<R::Receipt>, BridgeError> {
        let (recipient_contract, payload, fallback_recipient) = match &message.kind {
            MessageKind::Transfer { recipient } => {
                Self::release(ledger, info, *recipient, message.amount)?;
                info!(message_id = %message.id, %recipient, amount = %message.amount, "Tokens delivered");
                return Ok(Delivery::Transferred {
                    recipient: *recipient,
                    token: info.token,
                    amount: message.amount,
                });
            }
            MessageKind::Call {
                recipient_contract,
                payload,
                fallback_recipient,
                ..
            } => (*recipient_contract, payload, *fallback_recipient),
        };

        let ctx = ReceiveContext {
            bridge: info.address,
            source_blockchain_id: message.source_blockchain_id,
            origin_transferrer: message.origin_bridge,
            origin_sender: message.origin_sender,
        };
        let before = Self::held(ledger, info);
        let called = match receiver {
            Some(receiver) if info.is_native() => {
                receiver.receive_native_tokens(ctx, message.amount, payload)
            }
            Some(receiver) => receiver.receive_tokens(ctx, info.token, message.amount, payload),
            None => Err(ReceiveError::Rejected(format!(
                "no contract at {recipient_contract}"
            ))),
        };

        match called {
            Ok(receipt) => {
                let pulled = before.saturating_sub(Self::held(ledger, info));
                let leftover = message.amount.saturating_sub(pulled);
                if !leftover.is_zero() {
                    debug!(message_id = %message.id, %leftover, "Returning unspent tokens to fallback");
                    Self::release(ledger, info, fallback_recipient, leftover)?;
                }
                info!(message_id = %message.id, contract = %recipient_contract, "Call delivered");
                Ok(Delivery::Called(receipt))
            }
            Err(ReceiveError::Busy) => Err(BridgeError::ReceiverBusy),
            Err(ReceiveError::Rejected(reason)) => {
                warn!(
                    message_id = %message.id,
                    contract = %recipient_contract,
                    fallback = %fallback_recipient,
                    %reason,
                    "Call reverted, paying fallback recipient"
                );
                Self::release(ledger, info, fallback_recipient, message.amount)?;
                Ok(Delivery::FallbackPaid {
                    recipient: fallback_recipient,
                    token: info.token,
                    amount: message.amount,
                    reason,
                })
            }
        }
    }
}

/// [`TokenTransferrer`] bound to one chain of a [`BridgeNetwork`].
#[derive(Clone)]
pub struct ChainTransferrer {
    blockchain_id: B256,
    network: Arc<BridgeNetwork>,
}

impl ChainTransferrer {
    pub const fn blockchain_id(&self) -> B256 {
        self.blockchain_id
    }
}

impl TokenTransferrer for ChainTransferrer {
    fn send(
        &self,
        sender: Address,
        bridge: Address,
        input: SendTokensInput,
        amount: U256,
    ) -> Result<B256, BridgeError> {
        self.network
            .send(self.blockchain_id, sender, bridge, input, amount)
    }

    fn send_and_call(
        &self,
        sender: Address,
        bridge: Address,
        input: SendAndCallInput,
        amount: U256,
    ) -> Result<B256, BridgeError> {
        self.network
            .send_and_call(self.blockchain_id, sender, bridge, input, amount)
    }

    fn home_blockchain_id(&self, bridge: Address) -> Result<B256, BridgeError> {
        self.network.home_blockchain_id(self.blockchain_id, bridge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    const HOME: B256 = B256::repeat_byte(0xaa);
    const LEFT: B256 = B256::repeat_byte(0xbb);
    const RIGHT: B256 = B256::repeat_byte(0xcc);

    const USDC: Address = Address::repeat_byte(0x01);
    const USDC_LEFT: Address = Address::repeat_byte(0x02);
    const USDC_RIGHT: Address = Address::repeat_byte(0x03);
    const FEE_TOKEN: Address = Address::repeat_byte(0x0f);

    const HOME_BRIDGE: Address = Address::repeat_byte(0x10);
    const LEFT_BRIDGE: Address = Address::repeat_byte(0x20);
    const RIGHT_BRIDGE: Address = Address::repeat_byte(0x30);
    const NATIVE_BRIDGE: Address = Address::repeat_byte(0x40);

    const ALICE: Address = Address::repeat_byte(0xa1);
    const BOB: Address = Address::repeat_byte(0xb0);
    const CONTRACT: Address = Address::repeat_byte(0xc0);
    const FALLBACK: Address = Address::repeat_byte(0xfb);
    const RELAYER: Address = Address::repeat_byte(0xee);

    struct Net {
        network: Arc<BridgeNetwork>,
        inbox: UnboundedReceiver<BridgeMessage>,
        home: Ledger,
        left: Ledger,
        right: Ledger,
    }

    fn net() -> Net {
        let (network, inbox) = BridgeNetwork::new(RELAYER);
        let network = Arc::new(network);
        let (home, left, right) = (Ledger::new(), Ledger::new(), Ledger::new());
        network.register_chain(HOME, home.clone());
        network.register_chain(LEFT, left.clone());
        network.register_chain(RIGHT, right.clone());

        let home_ref = Some(HomeRef {
            blockchain_id: HOME,
            bridge: HOME_BRIDGE,
        });
        for info in [
            BridgeInfo {
                address: HOME_BRIDGE,
                blockchain_id: HOME,
                token: USDC,
                home: None,
            },
            BridgeInfo {
                address: LEFT_BRIDGE,
                blockchain_id: LEFT,
                token: USDC_LEFT,
                home: home_ref,
            },
            BridgeInfo {
                address: RIGHT_BRIDGE,
                blockchain_id: RIGHT,
                token: USDC_RIGHT,
                home: home_ref,
            },
            BridgeInfo {
                address: NATIVE_BRIDGE,
                blockchain_id: HOME,
                token: NATIVE,
                home: None,
            },
        ] {
            network.register_bridge(info).unwrap();
        }

        home.mint(USDC, ALICE, U256::from(1_000)).unwrap();
        home.mint(FEE_TOKEN, ALICE, U256::from(100)).unwrap();
        Net {
            network,
            inbox,
            home,
            left,
            right,
        }
    }

    fn transfer(destination: B256, bridge: Address, recipient: Address) -> SendTokensInput {
        SendTokensInput {
            destinationBlockchainID: destination,
            destinationTokenTransferrerAddress: bridge,
            recipient,
            primaryFeeTokenAddress: FEE_TOKEN,
            primaryFee: U256::ZERO,
            secondaryFee: U256::ZERO,
            requiredGasLimit: U256::from(250_000),
            multiHopFallback: Address::ZERO,
        }
    }

    fn call(destination: B256, bridge: Address) -> SendAndCallInput {
        SendAndCallInput {
            destinationBlockchainID: destination,
            destinationTokenTransferrerAddress: bridge,
            recipientContract: CONTRACT,
            recipientPayload: vec![1, 2, 3].into(),
            requiredGasLimit: U256::from(500_000),
            recipientGasLimit: U256::from(400_000),
            multiHopFallback: Address::ZERO,
            fallbackRecipient: FALLBACK,
            primaryFeeTokenAddress: FEE_TOKEN,
            primaryFee: U256::ZERO,
            secondaryFee: U256::ZERO,
        }
    }

    /// Contract that pulls part of each delivery, or refuses it.
    struct Sink {
        ledger: Ledger,
        pull: U256,
        reject: bool,
        busy: AtomicBool,
    }

    impl Sink {
        fn new(ledger: Ledger, pull: u64) -> Self {
            Self {
                ledger,
                pull: U256::from(pull),
                reject: false,
                busy: AtomicBool::new(false),
            }
        }
    }

    impl TokenReceiver for Sink {
        type Receipt = U256;

        fn receive_tokens(
            &self,
            ctx: ReceiveContext,
            token: Address,
            _amount: U256,
            _payload: &[u8],
        ) -> Result<U256, ReceiveError> {
            if self.busy.load(Ordering::SeqCst) {
                return Err(ReceiveError::Busy);
            }
            if self.reject {
                return Err(ReceiveError::Rejected("nope".into()));
            }
            self.ledger
                .transfer(token, ctx.bridge, CONTRACT, self.pull)
                .map_err(|e| ReceiveError::Rejected(e.to_string()))?;
            Ok(self.pull)
        }

        fn receive_native_tokens(
            &self,
            ctx: ReceiveContext,
            _amount: U256,
            _payload: &[u8],
        ) -> Result<U256, ReceiveError> {
            self.ledger
                .transfer_native(ctx.bridge, CONTRACT, self.pull)
                .map_err(|e| ReceiveError::Rejected(e.to_string()))?;
            Ok(self.pull)
        }
    }

    fn no_receiver() -> Option<&'static Sink> {
        None
    }

    #[test]
    fn test_home_to_remote_transfer() {
        let mut net = net();
        let mut input = transfer(LEFT, LEFT_BRIDGE, BOB);
        input.primaryFee = U256::from(5);
        net.network
            .send(HOME, ALICE, HOME_BRIDGE, input, U256::from(400))
            .unwrap();

        assert_eq!(net.home.balance_of(USDC, HOME_BRIDGE), U256::from(400));
        assert_eq!(net.home.balance_of(FEE_TOKEN, RELAYER), U256::from(5));

        let message = net.inbox.try_recv().unwrap();
        assert_eq!(message.origin_sender, ALICE);
        let delivery = net.network.deliver(&message, no_receiver()).unwrap();
        assert_eq!(
            delivery,
            Delivery::Transferred {
                recipient: BOB,
                token: USDC_LEFT,
                amount: U256::from(400)
            }
        );
        assert_eq!(net.left.total_supply(USDC_LEFT), U256::from(400));
    }

    #[test]
    fn test_duplicate_delivery_rejected() {
        let mut net = net();
        net.network
            .send(HOME, ALICE, HOME_BRIDGE, transfer(LEFT, LEFT_BRIDGE, BOB), U256::from(1))
            .unwrap();
        let message = net.inbox.try_recv().unwrap();

        net.network.deliver(&message, no_receiver()).unwrap();
        let err = net.network.deliver(&message, no_receiver()).unwrap_err();
        assert_eq!(err, BridgeError::AlreadyDelivered(message.id));
        assert_eq!(net.left.balance_of(USDC_LEFT, BOB), U256::from(1));
    }

    #[test]
    fn test_remote_to_remote_routes_through_home() {
        let mut net = net();
        net.network
            .send(HOME, ALICE, HOME_BRIDGE, transfer(LEFT, LEFT_BRIDGE, ALICE), U256::from(500))
            .unwrap();
        let first = net.inbox.try_recv().unwrap();
        net.network.deliver(&first, no_receiver()).unwrap();

        let mut input = transfer(RIGHT, RIGHT_BRIDGE, BOB);
        input.multiHopFallback = FALLBACK;
        input.secondaryFee = U256::from(10);
        net.network
            .send(LEFT, ALICE, LEFT_BRIDGE, input, U256::from(200))
            .unwrap();
        assert_eq!(net.left.total_supply(USDC_LEFT), U256::from(300));

        let to_home = net.inbox.try_recv().unwrap();
        assert_eq!(to_home.destination_blockchain_id, HOME);
        let relayed = net.network.deliver(&to_home, no_receiver()).unwrap();
        assert!(matches!(relayed, Delivery::Relayed { .. }));

        let onward = net.inbox.try_recv().unwrap();
        assert_eq!(onward.source_blockchain_id, LEFT);
        assert_eq!(onward.origin_bridge, LEFT_BRIDGE);
        net.network.deliver(&onward, no_receiver()).unwrap();

        assert_eq!(net.right.balance_of(USDC_RIGHT, BOB), U256::from(190));
        assert_eq!(net.home.balance_of(USDC, RELAYER), U256::from(10));
        assert_eq!(net.home.balance_of(USDC, HOME_BRIDGE), U256::from(490));
    }

    #[test]
    fn test_multi_hop_requires_fallback() {
        let net = net();
        net.left.mint(USDC_LEFT, ALICE, U256::from(10)).unwrap();
        let err = net
            .network
            .send(LEFT, ALICE, LEFT_BRIDGE, transfer(RIGHT, RIGHT_BRIDGE, BOB), U256::from(10))
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidInput(_)));
        assert_eq!(net.left.balance_of(USDC_LEFT, ALICE), U256::from(10));
    }

    #[test]
    fn test_unroutable_multi_hop_pays_fallback_on_home() {
        let mut net = net();
        net.network
            .send(HOME, ALICE, HOME_BRIDGE, transfer(LEFT, LEFT_BRIDGE, ALICE), U256::from(50))
            .unwrap();
        let first = net.inbox.try_recv().unwrap();
        net.network.deliver(&first, no_receiver()).unwrap();

        let mut input = transfer(B256::repeat_byte(0xdd), Address::repeat_byte(0x99), BOB);
        input.multiHopFallback = FALLBACK;
        net.network
            .send(LEFT, ALICE, LEFT_BRIDGE, input, U256::from(50))
            .unwrap();
        let to_home = net.inbox.try_recv().unwrap();
        let delivery = net.network.deliver(&to_home, no_receiver()).unwrap();

        assert!(matches!(delivery, Delivery::MultiHopFallback { .. }));
        assert_eq!(net.home.balance_of(USDC, FALLBACK), U256::from(50));
    }

    #[test]
    fn test_rejected_call_pays_fallback() {
        let mut net = net();
        net.network
            .send_and_call(HOME, ALICE, HOME_BRIDGE, call(LEFT, LEFT_BRIDGE), U256::from(70))
            .unwrap();
        let message = net.inbox.try_recv().unwrap();

        let mut sink = Sink::new(net.left.clone(), 70);
        sink.reject = true;
        let delivery = net.network.deliver(&message, Some(&sink)).unwrap();

        assert!(matches!(delivery, Delivery::FallbackPaid { .. }));
        assert_eq!(net.left.balance_of(USDC_LEFT, FALLBACK), U256::from(70));
        assert_eq!(net.left.balance_of(USDC_LEFT, CONTRACT), U256::ZERO);
    }

    #[test]
    fn test_call_leftover_goes_to_fallback() {
        let mut net = net();
        net.network
            .send_and_call(HOME, ALICE, HOME_BRIDGE, call(LEFT, LEFT_BRIDGE), U256::from(70))
            .unwrap();
        let message = net.inbox.try_recv().unwrap();

        let sink = Sink::new(net.left.clone(), 60);
        let delivery = net.network.deliver(&message, Some(&sink)).unwrap();

        assert_eq!(delivery, Delivery::Called(U256::from(60)));
        assert_eq!(net.left.balance_of(USDC_LEFT, CONTRACT), U256::from(60));
        assert_eq!(net.left.balance_of(USDC_LEFT, FALLBACK), U256::from(10));
    }

    #[test]
    fn test_busy_receiver_can_retry() {
        let mut net = net();
        net.network
            .send_and_call(HOME, ALICE, HOME_BRIDGE, call(LEFT, LEFT_BRIDGE), U256::from(70))
            .unwrap();
        let message = net.inbox.try_recv().unwrap();

        let sink = Sink::new(net.left.clone(), 70);
        sink.busy.store(true, Ordering::SeqCst);
        let err = net.network.deliver(&message, Some(&sink)).unwrap_err();
        assert_eq!(err, BridgeError::ReceiverBusy);
        assert_eq!(net.left.total_supply(USDC_LEFT), U256::ZERO);

        sink.busy.store(false, Ordering::SeqCst);
        net.network.deliver(&message, Some(&sink)).unwrap();
        assert_eq!(net.left.balance_of(USDC_LEFT, CONTRACT), U256::from(70));
    }

    #[test]
    fn test_call_gas_limits_validated() {
        let net = net();
        let mut input = call(LEFT, LEFT_BRIDGE);
        input.recipientGasLimit = input.requiredGasLimit;
        let err = net
            .network
            .send_and_call(HOME, ALICE, HOME_BRIDGE, input, U256::from(1))
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidInput(_)));
    }

    #[test]
    fn test_unpaired_transferrers_rejected() {
        let net = net();
        net.home.mint_native(ALICE, U256::from(30)).unwrap();
        let err = net
            .network
            .send(HOME, ALICE, NATIVE_BRIDGE, transfer(LEFT, LEFT_BRIDGE, BOB), U256::from(30))
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidInput(_)));
        assert_eq!(net.home.native_balance(ALICE), U256::from(30));
    }

    #[test]
    fn test_home_blockchain_id() {
        let net = net();
        let left = net.network.transferrer(LEFT);
        assert_eq!(left.home_blockchain_id(LEFT_BRIDGE).unwrap(), HOME);
        let home = net.network.transferrer(HOME);
        assert_eq!(home.home_blockchain_id(HOME_BRIDGE).unwrap(), HOME);
        assert!(home.home_blockchain_id(Address::repeat_byte(0x77)).is_err());
    }
}
