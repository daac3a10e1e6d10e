//! Scripted collaborators for engine tests.

use crate::{
    types::{fixtures, Action, Instructions},
    Cell, CellConfig, FeeSchedule,
};
use alloy_primitives::{Address, B256, U256};
use binding::transferrer::{SendAndCallInput, SendTokensInput};
use bridge::{BridgeError, TokenTransferrer};
use ledger::{Ledger, NATIVE};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
};
use swap::{Quote, SwapError, SwapOutcome, SwapStrategy};

pub const HERE: B256 = B256::repeat_byte(0x0a);
pub const ORIGIN: B256 = B256::repeat_byte(0x0b);
pub const FAR: B256 = B256::repeat_byte(0x0c);

pub const CELL: Address = Address::repeat_byte(0xce);
pub const OWNER: Address = Address::repeat_byte(0x0e);
pub const COLLECTOR: Address = Address::repeat_byte(0xfe);
pub const RELAYER: Address = Address::repeat_byte(0xaa);

pub const WRAPPED: Address = Address::repeat_byte(0x77);
pub const TOKEN_A: Address = Address::repeat_byte(0x01);
pub const TOKEN_B: Address = Address::repeat_byte(0x02);

/// Local transferrer of `TOKEN_A`, paired with `ORIGIN_BRIDGE`.
pub const BRIDGE: Address = Address::repeat_byte(0xb1);
pub const ORIGIN_BRIDGE: Address = Address::repeat_byte(0xb0);
pub const NATIVE_BRIDGE: Address = Address::repeat_byte(0xb9);

pub use fixtures::{RECEIVER, SENDER};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Tokens {
        bridge: Address,
        input: SendTokensInput,
        amount: U256,
    },
    Call {
        bridge: Address,
        input: SendAndCallInput,
        amount: U256,
    },
}

/// Transferrer that escrows locally and records every send.
pub struct Recorder {
    ledger: Ledger,
    tokens: HashMap<Address, Address>,
    homes: HashMap<Address, B256>,
    pub refuse: AtomicBool,
    pub sent: Mutex<Vec<Sent>>,
}

impl Recorder {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger,
            tokens: HashMap::from([
                (BRIDGE, TOKEN_A),
                (NATIVE_BRIDGE, NATIVE),
                (Address::repeat_byte(0xb2), TOKEN_B),
            ]),
            homes: HashMap::from([(BRIDGE, ORIGIN), (NATIVE_BRIDGE, HERE)]),
            refuse: AtomicBool::new(false),
            sent: Mutex::default(),
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn escrow(
        &self,
        sender: Address,
        bridge: Address,
        fee_token: Address,
        fee: U256,
        amount: U256,
    ) -> Result<(), BridgeError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(BridgeError::InvalidInput("refused".into()));
        }
        let token = self
            .tokens
            .get(&bridge)
            .copied()
            .ok_or(BridgeError::UnknownBridge {
                blockchain_id: HERE,
                bridge,
            })?;
        if !fee.is_zero() {
            self.ledger.transfer(fee_token, sender, RELAYER, fee)?;
        }
        if token == NATIVE {
            self.ledger.transfer_native(sender, bridge, amount)?;
        } else {
            self.ledger.transfer(token, sender, bridge, amount)?;
        }
        Ok(())
    }
}

impl TokenTransferrer for Recorder {
    fn send(
        &self,
        sender: Address,
        bridge: Address,
        input: SendTokensInput,
        amount: U256,
    ) -> Result<B256, BridgeError> {
        self.escrow(
            sender,
            bridge,
            input.primaryFeeTokenAddress,
            input.primaryFee,
            amount,
        )?;
        let mut sent = self.sent.lock().unwrap_or_else(PoisonError::into_inner);
        sent.push(Sent::Tokens {
            bridge,
            input,
            amount,
        });
        Ok(B256::with_last_byte(sent.len() as u8))
    }

    fn send_and_call(
        &self,
        sender: Address,
        bridge: Address,
        input: SendAndCallInput,
        amount: U256,
    ) -> Result<B256, BridgeError> {
        self.escrow(
            sender,
            bridge,
            input.primaryFeeTokenAddress,
            input.primaryFee,
            amount,
        )?;
        let mut sent = self.sent.lock().unwrap_or_else(PoisonError::into_inner);
        sent.push(Sent::Call {
            bridge,
            input,
            amount,
        });
        Ok(B256::with_last_byte(sent.len() as u8))
    }

    fn home_blockchain_id(&self, bridge: Address) -> Result<B256, BridgeError> {
        self.homes
            .get(&bridge)
            .copied()
            .ok_or(BridgeError::UnknownBridge {
                blockchain_id: HERE,
                bridge,
            })
    }
}

/// Converts any input into `TOKEN_B` at a fixed 2:1 rate.
pub struct Halving {
    ledger: Ledger,
    pub fail: AtomicBool,
}

impl SwapStrategy for Halving {
    fn route(
        &self,
        amount_in: U256,
        _token_in: Address,
        _token_out: Address,
        _extra_params: &[u8],
    ) -> Result<Quote, SwapError> {
        Ok(Quote {
            trade: vec![0xab].into(),
            gas_estimate: 1,
            amount_out: amount_in / U256::from(2u64),
        })
    }

    fn swap(
        &self,
        payer: Address,
        token_in: Address,
        amount_in: U256,
        _trade: &[u8],
    ) -> Result<SwapOutcome, SwapError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SwapError::InsufficientLiquidity);
        }
        let amount_out = amount_in / U256::from(2u64);
        self.ledger.burn(token_in, payer, amount_in)?;
        self.ledger.mint(TOKEN_B, payer, amount_out)?;
        Ok(SwapOutcome {
            token_out: TOKEN_B,
            amount_out,
        })
    }

    fn description(&self) -> String {
        "halving".into()
    }
}

pub struct Kit {
    pub ledger: Ledger,
    pub cell: Cell,
    pub bridge: Arc<Recorder>,
    pub strategy: Arc<Halving>,
}

pub fn kit() -> Kit {
    kit_with_fees(FeeSchedule::default())
}

pub fn kit_with_fees(fees: FeeSchedule) -> Kit {
    let ledger = Ledger::new();
    let bridge = Arc::new(Recorder::new(ledger.clone()));
    let strategy = Arc::new(Halving {
        ledger: ledger.clone(),
        fail: AtomicBool::new(false),
    });
    let cell = Cell::new(
        CellConfig {
            address: CELL,
            blockchain_id: HERE,
            wrapped_native: WRAPPED,
            owner: OWNER,
            fees,
        },
        ledger.clone(),
        strategy.clone(),
        bridge.clone(),
    )
    .unwrap();

    ledger.mint(TOKEN_A, SENDER, U256::from(1_000_000u64)).unwrap();
    ledger.mint_native(SENDER, U256::from(1_000_000u64)).unwrap();
    Kit {
        ledger,
        cell,
        bridge,
        strategy,
    }
}

/// Plan whose bridging hops leave through `BRIDGE` towards `FAR`.
pub fn plan(actions: &[Action]) -> Instructions {
    let mut instructions = fixtures::instructions(actions);
    for hop in &mut instructions.hops {
        hop.bridge_path.bridge_source_chain = BRIDGE;
        hop.bridge_path.destination_blockchain_id = FAR;
    }
    instructions
}
