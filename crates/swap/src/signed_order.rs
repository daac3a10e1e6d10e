use crate::{Quote, SwapError, SwapOutcome, SwapStrategy};
use alloy_primitives::{keccak256, Address, Signature, B256, U256};
use alloy_sol_types::SolValue;
use binding::trade::{Order, SignedOrderTrade};
use ledger::Ledger;
use std::{
    sync::{Arc, Mutex, PoisonError},
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::debug;

const GAS_ESTIMATE: u64 = 120_000;

type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Hash a maker signs to authorize an order.
pub fn order_hash(order: &Order) -> B256 {
    keccak256(order.abi_encode())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// RFQ venue settling maker-signed orders.
///
/// Makers post signed orders off-chain; `route` picks the best live order
/// and `swap` settles it against the maker's ledger balance.
pub struct SignedOrder {
    ledger: Ledger,
    book: Mutex<Vec<SignedOrderTrade>>,
    clock: Clock,
}

impl SignedOrder {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger,
            book: Mutex::new(Vec::new()),
            clock: Arc::new(unix_now),
        }
    }

    /// Replace the wall clock, e.g. to evaluate expiries deterministically.
    pub fn with_clock(mut self, clock: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Make an order available for quoting.
    pub fn post(&self, order: SignedOrderTrade) {
        self.book
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(order);
    }

    /// Ledger flag recording that the maker's nonce was filled.
    ///
    /// Kept in the ledger so a reverted call frees the order again.
    fn nonce_key(order: &Order) -> B256 {
        B256::from(order.nonce.to_be_bytes::<32>())
    }

    fn is_used(&self, order: &Order) -> bool {
        self.ledger.is_flagged(order.maker, Self::nonce_key(order))
    }

    fn fill_amount(order: &Order, amount_in: U256) -> Result<U256, SwapError> {
        order
            .makerAmount
            .checked_mul(amount_in)
            .map(|product| product / order.takerAmount)
            .ok_or(SwapError::Overflow)
    }

    /// Check everything about an order except the requested token and size.
    fn verify(&self, trade: &SignedOrderTrade) -> Result<(), SwapError> {
        let order = &trade.order;
        if order.takerAmount.is_zero() {
            return Err(SwapError::InvalidTrade("order has zero taker amount".into()));
        }

        let signature = Signature::try_from(&trade.signature[..])
            .map_err(|e| SwapError::InvalidTrade(format!("malformed signature: {e}")))?;
        let signer = signature
            .recover_address_from_prehash(&order_hash(order))
            .map_err(|_| SwapError::InvalidSignature { maker: order.maker })?;
        if signer != order.maker {
            return Err(SwapError::InvalidSignature { maker: order.maker });
        }

        let now = (self.clock)();
        if order.expiry <= now {
            return Err(SwapError::Expired {
                expiry: order.expiry,
                now,
            });
        }

        if self.is_used(order) {
            return Err(SwapError::NonceUsed {
                maker: order.maker,
                nonce: order.nonce,
            });
        }
        Ok(())
    }
}

impl SwapStrategy for SignedOrder {
    fn route(
        &self,
        amount_in: U256,
        token_in: Address,
        token_out: Address,
        _extra_params: &[u8],
    ) -> Result<Quote, SwapError> {
        if amount_in.is_zero() {
            return Err(SwapError::ZeroAmount);
        }
        let book = self.book.lock().unwrap_or_else(PoisonError::into_inner);
        let best = book
            .iter()
            .filter(|t| t.order.takerToken == token_in && t.order.makerToken == token_out)
            .filter(|t| t.order.takerAmount >= amount_in)
            .filter(|t| self.verify(t).is_ok())
            .filter_map(|t| Some((t, Self::fill_amount(&t.order, amount_in).ok()?)))
            .filter(|(t, out)| {
                !out.is_zero() && self.ledger.balance_of(token_out, t.order.maker) >= *out
            })
            .max_by_key(|(_, out)| *out)
            .ok_or(SwapError::NoRoute {
                token_in,
                token_out,
            })?;

        debug!(
            maker = %best.0.order.maker,
            nonce = %best.0.order.nonce,
            amount_out = %best.1,
            "Signed order selected"
        );

        Ok(Quote {
            trade: best.0.abi_encode().into(),
            gas_estimate: GAS_ESTIMATE,
            amount_out: best.1,
        })
    }

    fn swap(
        &self,
        payer: Address,
        token_in: Address,
        amount_in: U256,
        trade: &[u8],
    ) -> Result<SwapOutcome, SwapError> {
        if amount_in.is_zero() {
            return Err(SwapError::ZeroAmount);
        }
        let trade = SignedOrderTrade::abi_decode(trade)
            .map_err(|e| SwapError::InvalidTrade(e.to_string()))?;
        self.verify(&trade)?;

        let order = &trade.order;
        if order.takerToken != token_in {
            return Err(SwapError::TokenMismatch {
                expected: order.takerToken,
                actual: token_in,
            });
        }
        if amount_in > order.takerAmount {
            return Err(SwapError::OrderTooSmall {
                amount: amount_in,
                available: order.takerAmount,
            });
        }
        let amount_out = Self::fill_amount(order, amount_in)?;
        if amount_out.is_zero() {
            return Err(SwapError::InsufficientLiquidity);
        }

        let snapshot = self.ledger.snapshot();
        let settled = self
            .ledger
            .transfer(token_in, payer, order.maker, amount_in)
            .and_then(|()| {
                self.ledger
                    .transfer(order.makerToken, order.maker, payer, amount_out)
            });
        if let Err(e) = settled {
            self.ledger.restore(snapshot);
            return Err(e.into());
        }
        self.ledger.set_flag(order.maker, Self::nonce_key(order));

        debug!(
            maker = %order.maker,
            %payer,
            %amount_in,
            %amount_out,
            "Signed order settled"
        );

        Ok(SwapOutcome {
            token_out: order.makerToken,
            amount_out,
        })
    }

    fn description(&self) -> String {
        let orders = self.book.lock().unwrap_or_else(PoisonError::into_inner).len();
        format!("Signed-order RFQ venue with {orders} posted orders")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_signer::SignerSync;
    use alloy_signer_local::PrivateKeySigner;

    const USDC: Address = Address::repeat_byte(0x01);
    const BTC: Address = Address::repeat_byte(0x03);
    const TAKER: Address = Address::repeat_byte(0x7a);
    const NOW: u64 = 1_700_000_000;
    const MAKER_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    fn maker() -> PrivateKeySigner {
        MAKER_KEY.parse().unwrap()
    }

    fn signed(order: Order, signer: &PrivateKeySigner) -> SignedOrderTrade {
        let signature = signer.sign_hash_sync(&order_hash(&order)).unwrap();
        SignedOrderTrade {
            order,
            signature: signature.as_bytes().to_vec().into(),
        }
    }

    fn order(maker: Address, nonce: u64) -> Order {
        Order {
            maker,
            takerToken: USDC,
            makerToken: BTC,
            takerAmount: U256::from(1_000u64),
            makerAmount: U256::from(50u64),
            expiry: NOW + 60,
            nonce: U256::from(nonce),
        }
    }

    fn setup() -> (Ledger, SignedOrder, PrivateKeySigner) {
        let signer = maker();
        let ledger = Ledger::new();
        ledger.mint(BTC, signer.address(), U256::from(100u64)).unwrap();
        ledger.mint(USDC, TAKER, U256::from(5_000u64)).unwrap();
        let venue = SignedOrder::new(ledger.clone()).with_clock(|| NOW);
        (ledger, venue, signer)
    }

    #[test]
    fn test_route_and_fill() {
        let (ledger, venue, signer) = setup();
        venue.post(signed(order(signer.address(), 1), &signer));

        let quote = venue.route(U256::from(1_000u64), USDC, BTC, &[]).unwrap();
        assert_eq!(quote.amount_out, U256::from(50u64));

        let outcome = venue
            .swap(TAKER, USDC, U256::from(1_000u64), &quote.trade)
            .unwrap();
        assert_eq!(outcome.token_out, BTC);
        assert_eq!(outcome.amount_out, U256::from(50u64));
        assert_eq!(ledger.balance_of(BTC, TAKER), U256::from(50u64));
        assert_eq!(ledger.balance_of(USDC, signer.address()), U256::from(1_000u64));
    }

    #[test]
    fn test_partial_fill_is_pro_rata() {
        let (_, venue, signer) = setup();
        let trade = signed(order(signer.address(), 1), &signer).abi_encode();

        let outcome = venue
            .swap(TAKER, USDC, U256::from(400u64), &trade)
            .unwrap();
        assert_eq!(outcome.amount_out, U256::from(20u64));
    }

    #[test]
    fn test_replay_rejected() {
        let (_, venue, signer) = setup();
        let trade = signed(order(signer.address(), 7), &signer).abi_encode();

        venue.swap(TAKER, USDC, U256::from(100u64), &trade).unwrap();
        let err = venue
            .swap(TAKER, USDC, U256::from(100u64), &trade)
            .unwrap_err();
        assert_eq!(
            err,
            SwapError::NonceUsed {
                maker: signer.address(),
                nonce: U256::from(7)
            }
        );
    }

    #[test]
    fn test_restored_ledger_frees_nonce() {
        let (ledger, venue, signer) = setup();
        venue.post(signed(order(signer.address(), 3), &signer));
        let trade = signed(order(signer.address(), 3), &signer).abi_encode();
        let snapshot = ledger.snapshot();

        venue
            .swap(TAKER, USDC, U256::from(1_000u64), &trade)
            .unwrap();
        assert!(venue.route(U256::from(1_000u64), USDC, BTC, &[]).is_err());

        // the caller reverted: the order is live again
        ledger.restore(snapshot);
        let quote = venue.route(U256::from(1_000u64), USDC, BTC, &[]).unwrap();
        venue
            .swap(TAKER, USDC, U256::from(1_000u64), &quote.trade)
            .unwrap();
        assert_eq!(ledger.balance_of(BTC, TAKER), U256::from(50u64));
    }

    #[test]
    fn test_forged_maker_rejected() {
        let (_, venue, signer) = setup();
        let victim = Address::repeat_byte(0x66);
        let trade = signed(order(victim, 1), &signer).abi_encode();

        let err = venue
            .swap(TAKER, USDC, U256::from(100u64), &trade)
            .unwrap_err();
        assert_eq!(err, SwapError::InvalidSignature { maker: victim });
    }

    #[test]
    fn test_expired_order_rejected() {
        let (ledger, _, signer) = setup();
        let venue = SignedOrder::new(ledger.clone()).with_clock(|| NOW + 61);
        let trade = signed(order(signer.address(), 1), &signer).abi_encode();

        let err = venue
            .swap(TAKER, USDC, U256::from(100u64), &trade)
            .unwrap_err();
        assert!(matches!(err, SwapError::Expired { .. }));
        assert_eq!(ledger.balance_of(USDC, TAKER), U256::from(5_000u64));
    }

    #[test]
    fn test_oversized_fill_rejected() {
        let (_, venue, signer) = setup();
        let trade = signed(order(signer.address(), 1), &signer).abi_encode();
        let err = venue
            .swap(TAKER, USDC, U256::from(1_001u64), &trade)
            .unwrap_err();
        assert!(matches!(err, SwapError::OrderTooSmall { .. }));
    }

    #[test]
    fn test_unfunded_maker_moves_nothing() {
        let (ledger, venue, signer) = setup();
        let mut big = order(signer.address(), 2);
        big.makerAmount = U256::from(1_000u64);
        let trade = signed(big, &signer).abi_encode();

        let err = venue
            .swap(TAKER, USDC, U256::from(1_000u64), &trade)
            .unwrap_err();
        assert!(matches!(err, SwapError::Ledger(_)));
        assert_eq!(ledger.balance_of(USDC, TAKER), U256::from(5_000u64));
        assert_eq!(ledger.balance_of(USDC, signer.address()), U256::ZERO);
    }

    #[test]
    fn test_route_skips_unusable_orders() {
        let (_, venue, signer) = setup();
        let mut expired = order(signer.address(), 1);
        expired.expiry = NOW - 1;
        venue.post(signed(expired, &signer));

        assert!(venue.route(U256::from(100u64), USDC, BTC, &[]).is_err());

        venue.post(signed(order(signer.address(), 2), &signer));
        let quote = venue.route(U256::from(100u64), USDC, BTC, &[]).unwrap();
        assert_eq!(quote.amount_out, U256::from(5u64));
    }
}
