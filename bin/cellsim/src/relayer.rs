//! Delivers bridge messages to their destination chains.

use crate::metrics::Metrics;
use alloy_primitives::{Address, B256};
use bridge::{BridgeError, BridgeMessage, BridgeNetwork, Delivery, MessageKind, TokenReceiver};
use cell::{payload, Action, Cell, Outcome};
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_retry::{strategy::ExponentialBackoff, RetryIf};
use tracing::{info, warn};

/// Backoff for deliveries to a busy receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// First delay in milliseconds; later delays grow as its powers
    pub base_ms: u64,
    pub max_delay: Duration,
    pub max_retries: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_ms: 10,
            max_delay: Duration::from_secs(1),
            max_retries: 5,
        }
    }
}

/// Deliver `message`, retrying while the receiver reports it is busy.
///
/// Any other error is returned immediately.
pub async fn deliver_with_retry<R: TokenReceiver>(
    network: &BridgeNetwork,
    message: &BridgeMessage,
    receiver: Option<&R>,
    policy: RetryPolicy,
) -> Result<Delivery<R::Receipt>, BridgeError> {
    let retry_strategy = ExponentialBackoff::from_millis(policy.base_ms)
        .max_delay(policy.max_delay)
        .take(policy.max_retries);

    RetryIf::spawn(
        retry_strategy,
        move || async move {
            network.deliver(message, receiver).inspect_err(|e| {
                if matches!(e, BridgeError::ReceiverBusy) {
                    warn!(message_id = %message.id, "Receiver busy, will retry");
                }
            })
        },
        |e: &BridgeError| matches!(e, BridgeError::ReceiverBusy),
    )
    .await
}

/// A delivered message and what happened on arrival.
#[derive(Debug, Clone)]
pub struct Relayed {
    pub message: BridgeMessage,
    pub delivery: Delivery<Outcome>,
}

impl Relayed {
    /// Outcome reported by the receiving cell, if a cell was called.
    pub const fn outcome(&self) -> Option<&Outcome> {
        match &self.delivery {
            Delivery::Called(outcome) => Some(outcome),
            _ => None,
        }
    }
}

/// Relays every message the network publishes to the cells of a simulation.
///
/// A message that cannot be delivered is held back and retried first on the
/// next [`Relayer::run_until_idle`].
pub struct Relayer<R = Cell> {
    network: Arc<BridgeNetwork>,
    cells: HashMap<(B256, Address), Arc<R>>,
    inbox: UnboundedReceiver<BridgeMessage>,
    deferred: VecDeque<BridgeMessage>,
    metrics: Metrics,
    retry: RetryPolicy,
}

impl<R: TokenReceiver<Receipt = Outcome>> Relayer<R> {
    pub fn new(
        network: Arc<BridgeNetwork>,
        cells: HashMap<(B256, Address), Arc<R>>,
        inbox: UnboundedReceiver<BridgeMessage>,
        metrics: Metrics,
    ) -> Self {
        Self {
            network,
            cells,
            inbox,
            deferred: VecDeque::new(),
            metrics,
            retry: RetryPolicy::default(),
        }
    }

    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Messages published and not yet relayed, including held back ones.
    pub fn pending(&self) -> usize {
        self.inbox.len() + self.deferred.len()
    }

    /// Relay until the inbox is empty, including messages published by the
    /// deliveries themselves.
    ///
    /// Held back messages go first. Each message is attempted at most once
    /// per call; one that still fails is held back again.
    pub async fn run_until_idle(&mut self) -> Vec<Relayed> {
        let mut relayed = Vec::new();
        let mut held = VecDeque::new();
        while let Some(message) = self
            .deferred
            .pop_front()
            .or_else(|| self.inbox.try_recv().ok())
        {
            match self.relay(&message).await {
                Ok(delivery) => relayed.push(Relayed { message, delivery }),
                Err(BridgeError::AlreadyDelivered(id)) => {
                    warn!(message_id = %id, "Message already delivered, dropping");
                }
                Err(e) => {
                    warn!(message_id = %message.id, error = %e, "Delivery failed, holding message");
                    held.push_back(message);
                }
            }
        }
        self.deferred = held;
        relayed
    }

    pub async fn relay(&self, message: &BridgeMessage) -> Result<Delivery<Outcome>, BridgeError> {
        let started = Instant::now();
        let (receiver, action) = match (&message.kind, message.multi_hop) {
            (
                MessageKind::Call {
                    recipient_contract,
                    payload,
                    ..
                },
                None,
            ) => (
                self.cells
                    .get(&(message.destination_blockchain_id, *recipient_contract))
                    .map(Arc::as_ref),
                hop_action(payload),
            ),
            _ => (None, None),
        };

        let delivery = deliver_with_retry(&self.network, message, receiver, self.retry)
            .await
            .inspect_err(|_| self.metrics.record_message("failed", started.elapsed()))?;

        let status = match &delivery {
            Delivery::Transferred { .. } => "transferred",
            Delivery::Called(_) => "called",
            Delivery::FallbackPaid { .. } => "fallback_paid",
            Delivery::Relayed { .. } => "relayed",
            Delivery::MultiHopFallback { .. } => "multi_hop_fallback",
        };
        self.metrics.record_message(status, started.elapsed());
        if let (Delivery::Called(outcome), Some(action)) = (&delivery, action) {
            self.metrics.record_hop(action, outcome);
        }
        info!(
            message_id = %message.id,
            destination = %message.destination_blockchain_id,
            status,
            "Message relayed"
        );

        Ok(delivery)
    }
}

/// Action of the hop a call payload asks the receiving cell to run.
fn hop_action(data: &[u8]) -> Option<Action> {
    let payload = payload::decode(data).ok()?;
    payload.instructions.hops.first().map(|hop| hop.action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;
    use binding::transferrer::{SendAndCallInput, SendTokensInput};
    use bridge::{BridgeInfo, HomeRef, ReceiveContext, ReceiveError};
    use ledger::Ledger;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const HOME: B256 = B256::repeat_byte(0x01);
    const REMOTE: B256 = B256::repeat_byte(0x02);
    const TOKEN: Address = Address::repeat_byte(0x70);
    const HOME_BRIDGE: Address = Address::repeat_byte(0xb0);
    const REMOTE_BRIDGE: Address = Address::repeat_byte(0xb1);
    const SENDER: Address = Address::repeat_byte(0x5e);
    const CONTRACT: Address = Address::repeat_byte(0xc0);
    const FALLBACK: Address = Address::repeat_byte(0xfb);

    /// Reports busy a fixed number of times, then pulls the tokens.
    struct Flaky {
        ledger: Ledger,
        busy: AtomicUsize,
    }

    impl TokenReceiver for Flaky {
        type Receipt = Outcome;

        fn receive_tokens(
            &self,
            ctx: ReceiveContext,
            token: Address,
            amount: U256,
            _payload: &[u8],
        ) -> Result<Outcome, ReceiveError> {
            if self
                .busy
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(ReceiveError::Busy);
            }
            self.ledger
                .transfer(token, ctx.bridge, CONTRACT, amount)
                .map_err(|e| ReceiveError::Rejected(e.to_string()))?;
            Ok(delivered(token, amount))
        }

        fn receive_native_tokens(
            &self,
            _ctx: ReceiveContext,
            _amount: U256,
            _payload: &[u8],
        ) -> Result<Outcome, ReceiveError> {
            Err(ReceiveError::Rejected("tokens only".into()))
        }
    }

    fn delivered(token: Address, amount: U256) -> Outcome {
        Outcome::Delivered {
            receiver: CONTRACT,
            token,
            amount,
            native: false,
        }
    }

    fn policy(max_retries: usize) -> RetryPolicy {
        RetryPolicy {
            base_ms: 1,
            max_delay: Duration::from_millis(5),
            max_retries,
        }
    }

    fn setup() -> (Arc<BridgeNetwork>, UnboundedReceiver<BridgeMessage>, Ledger) {
        let (network, inbox) = BridgeNetwork::new(Address::repeat_byte(0xfe));
        let network = Arc::new(network);
        let home = Ledger::new();
        let remote = Ledger::new();
        network.register_chain(HOME, home.clone());
        network.register_chain(REMOTE, remote.clone());
        network
            .register_bridge(BridgeInfo {
                address: HOME_BRIDGE,
                blockchain_id: HOME,
                token: TOKEN,
                home: None,
            })
            .unwrap();
        network
            .register_bridge(BridgeInfo {
                address: REMOTE_BRIDGE,
                blockchain_id: REMOTE,
                token: TOKEN,
                home: Some(HomeRef {
                    blockchain_id: HOME,
                    bridge: HOME_BRIDGE,
                }),
            })
            .unwrap();
        home.mint(TOKEN, SENDER, U256::from(1_000u64)).unwrap();

        network
            .send_and_call(
                HOME,
                SENDER,
                HOME_BRIDGE,
                SendAndCallInput {
                    destinationBlockchainID: REMOTE,
                    destinationTokenTransferrerAddress: REMOTE_BRIDGE,
                    recipientContract: CONTRACT,
                    recipientPayload: vec![0x01].into(),
                    requiredGasLimit: U256::from(300_000u64),
                    recipientGasLimit: U256::from(200_000u64),
                    multiHopFallback: Address::ZERO,
                    fallbackRecipient: FALLBACK,
                    primaryFeeTokenAddress: TOKEN,
                    primaryFee: U256::ZERO,
                    secondaryFee: U256::ZERO,
                },
                U256::from(400u64),
            )
            .unwrap();
        (network, inbox, remote)
    }

    #[tokio::test]
    async fn test_retries_busy_receiver() {
        let (network, mut inbox, remote) = setup();
        let message = inbox.try_recv().unwrap();
        let receiver = Flaky {
            ledger: remote.clone(),
            busy: AtomicUsize::new(2),
        };

        let delivery = deliver_with_retry(&network, &message, Some(&receiver), policy(3))
            .await
            .unwrap();

        assert_eq!(delivery, Delivery::Called(delivered(TOKEN, U256::from(400u64))));
        assert_eq!(remote.balance_of(TOKEN, CONTRACT), U256::from(400u64));
    }

    #[tokio::test]
    async fn test_gives_up_after_retries() {
        let (network, mut inbox, remote) = setup();
        let message = inbox.try_recv().unwrap();
        let receiver = Flaky {
            ledger: remote.clone(),
            busy: AtomicUsize::new(10),
        };

        let result = deliver_with_retry(&network, &message, Some(&receiver), policy(2)).await;
        assert_eq!(result, Err(BridgeError::ReceiverBusy));
        assert_eq!(remote.balance_of(TOKEN, CONTRACT), U256::ZERO);

        // the message stays deliverable once the receiver frees up
        receiver.busy.store(0, Ordering::SeqCst);
        let delivery = deliver_with_retry(&network, &message, Some(&receiver), policy(0))
            .await
            .unwrap();
        assert_eq!(delivery, Delivery::Called(delivered(TOKEN, U256::from(400u64))));
    }

    #[tokio::test]
    async fn test_missing_receiver_pays_fallback() {
        let (network, mut inbox, remote) = setup();
        let message = inbox.try_recv().unwrap();

        let delivery = deliver_with_retry::<Flaky>(&network, &message, None, policy(1))
            .await
            .unwrap();

        assert!(matches!(delivery, Delivery::FallbackPaid { recipient, .. } if recipient == FALLBACK));
        assert_eq!(remote.balance_of(TOKEN, FALLBACK), U256::from(400u64));
    }

    #[tokio::test]
    async fn test_busy_message_relayed_on_next_run() {
        let (network, inbox, remote) = setup();
        let receiver = Arc::new(Flaky {
            ledger: remote.clone(),
            busy: AtomicUsize::new(10),
        });
        let cells = HashMap::from([((REMOTE, CONTRACT), Arc::clone(&receiver))]);
        let mut relayer =
            Relayer::new(network, cells, inbox, Metrics::new()).with_retry(policy(2));

        assert!(relayer.run_until_idle().await.is_empty());
        assert_eq!(relayer.pending(), 1);
        assert_eq!(remote.balance_of(TOKEN, CONTRACT), U256::ZERO);

        receiver.busy.store(0, Ordering::SeqCst);
        let relayed = relayer.run_until_idle().await;
        assert_eq!(relayed.len(), 1);
        assert_eq!(
            relayed[0].outcome(),
            Some(&delivered(TOKEN, U256::from(400u64)))
        );
        assert_eq!(relayer.pending(), 0);
        assert_eq!(remote.balance_of(TOKEN, CONTRACT), U256::from(400u64));
    }

    #[tokio::test]
    async fn test_held_message_does_not_block_later_ones() {
        let (network, inbox, remote) = setup();
        let receiver = Arc::new(Flaky {
            ledger: remote.clone(),
            busy: AtomicUsize::new(10),
        });
        let cells = HashMap::from([((REMOTE, CONTRACT), Arc::clone(&receiver))]);
        let mut relayer =
            Relayer::new(Arc::clone(&network), cells, inbox, Metrics::new())
                .with_retry(policy(1));

        assert!(relayer.run_until_idle().await.is_empty());

        // a plain transfer published after the held call still goes through
        network
            .send(
                HOME,
                SENDER,
                HOME_BRIDGE,
                SendTokensInput {
                    destinationBlockchainID: REMOTE,
                    destinationTokenTransferrerAddress: REMOTE_BRIDGE,
                    recipient: FALLBACK,
                    primaryFeeTokenAddress: TOKEN,
                    primaryFee: U256::ZERO,
                    secondaryFee: U256::ZERO,
                    requiredGasLimit: U256::from(100_000u64),
                    multiHopFallback: Address::ZERO,
                },
                U256::from(50u64),
            )
            .unwrap();

        let relayed = relayer.run_until_idle().await;
        assert_eq!(relayed.len(), 1);
        assert!(matches!(relayed[0].delivery, Delivery::Transferred { .. }));
        assert_eq!(remote.balance_of(TOKEN, FALLBACK), U256::from(50u64));
        assert_eq!(relayer.pending(), 1);
    }
}
