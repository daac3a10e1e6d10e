use crate::{scale_minimum, Quote, SwapError, SwapOutcome, SwapStrategy};
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolValue;
use binding::trade::{ConstantProductParams, ConstantProductTrade};
use ledger::Ledger;
use tracing::debug;

const BIPS: u64 = 10_000;
const DEFAULT_SLIPPAGE_BIPS: u16 = 50;
const GAS_PER_STEP: u64 = 80_000;
const GAS_BASE: u64 = 25_000;

/// An x*y=k pool. Reserves are the pool address's balances in the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pool {
    pub address: Address,
    pub token_a: Address,
    pub token_b: Address,
    /// Swap fee charged on input, in basis points
    pub fee_bips: u16,
}

impl Pool {
    fn other(&self, token: Address) -> Option<Address> {
        if token == self.token_a {
            Some(self.token_b)
        } else if token == self.token_b {
            Some(self.token_a)
        } else {
            None
        }
    }
}

/// Output of `amount_in` against the given reserves (Uniswap V2 formula).
pub fn amount_out(
    amount_in: U256,
    reserve_in: U256,
    reserve_out: U256,
    fee_bips: u16,
) -> Result<U256, SwapError> {
    if amount_in.is_zero() || reserve_in.is_zero() || reserve_out.is_zero() {
        return Ok(U256::ZERO);
    }
    let fee_factor = U256::from(BIPS.saturating_sub(u64::from(fee_bips)));
    let amount_in_with_fee = amount_in
        .checked_mul(fee_factor)
        .ok_or(SwapError::Overflow)?;
    let numerator = amount_in_with_fee
        .checked_mul(reserve_out)
        .ok_or(SwapError::Overflow)?;
    let denominator = reserve_in
        .checked_mul(U256::from(BIPS))
        .and_then(|r| r.checked_add(amount_in_with_fee))
        .ok_or(SwapError::Overflow)?;
    Ok(numerator / denominator)
}

/// Constant-product AMM router with multi-pool path finding.
pub struct ConstantProduct {
    ledger: Ledger,
    pools: Vec<Pool>,
    max_steps: usize,
}

struct Path {
    tokens: Vec<Address>,
    pools: Vec<Address>,
    amount_out: U256,
}

impl ConstantProduct {
    pub const fn new(ledger: Ledger, max_steps: usize) -> Self {
        Self {
            ledger,
            pools: Vec::new(),
            max_steps,
        }
    }

    pub fn with_pool(mut self, pool: Pool) -> Self {
        self.pools.push(pool);
        self
    }

    pub fn pools(&self) -> &[Pool] {
        &self.pools
    }

    fn pool(&self, address: Address) -> Result<&Pool, SwapError> {
        self.pools
            .iter()
            .find(|p| p.address == address)
            .ok_or_else(|| SwapError::InvalidTrade(format!("unknown pool {address}")))
    }

    fn step_out(&self, pool: &Pool, token_in: Address, amount_in: U256) -> Result<U256, SwapError> {
        let Some(token_out) = pool.other(token_in) else {
            return Ok(U256::ZERO);
        };
        let reserve_in = self.ledger.balance_of(token_in, pool.address);
        let reserve_out = self.ledger.balance_of(token_out, pool.address);
        amount_out(amount_in, reserve_in, reserve_out, pool.fee_bips)
    }

    /// Depth-first search for the best-output path of at most `max_steps` pools.
    fn best_path(&self, amount_in: U256, token_in: Address, token_out: Address) -> Option<Path> {
        let mut best: Option<Path> = None;
        let mut tokens = vec![token_in];
        let mut pools = Vec::new();
        self.search(amount_in, token_out, &mut tokens, &mut pools, &mut best);
        best
    }

    fn search(
        &self,
        amount: U256,
        target: Address,
        tokens: &mut Vec<Address>,
        pools: &mut Vec<Address>,
        best: &mut Option<Path>,
    ) {
        if pools.len() >= self.max_steps {
            return;
        }
        let Some(&current) = tokens.last() else {
            return;
        };
        for pool in &self.pools {
            let Some(next) = pool.other(current) else {
                continue;
            };
            if tokens.contains(&next) || pools.contains(&pool.address) {
                continue;
            }
            let out = match self.step_out(pool, current, amount) {
                Ok(out) if !out.is_zero() => out,
                _ => continue,
            };
            tokens.push(next);
            pools.push(pool.address);
            if next == target {
                if best.as_ref().is_none_or(|b| out > b.amount_out) {
                    *best = Some(Path {
                        tokens: tokens.clone(),
                        pools: pools.clone(),
                        amount_out: out,
                    });
                }
            } else {
                self.search(out, target, tokens, pools, best);
            }
            tokens.pop();
            pools.pop();
        }
    }

    /// Amounts after each step of `trade` for an input of `amount_in`.
    fn simulate(&self, trade: &ConstantProductTrade, amount_in: U256) -> Result<Vec<U256>, SwapError> {
        let mut amounts = vec![amount_in];
        let mut amount = amount_in;
        for (i, pool_address) in trade.pools.iter().enumerate() {
            let pool = self.pool(*pool_address)?;
            let token_in = trade.path[i];
            if pool.other(token_in) != Some(trade.path[i + 1]) {
                return Err(SwapError::InvalidTrade(format!(
                    "pool {pool_address} does not pair {token_in} with {}",
                    trade.path[i + 1]
                )));
            }
            amount = self.step_out(pool, token_in, amount)?;
            if amount.is_zero() {
                return Err(SwapError::InsufficientLiquidity);
            }
            amounts.push(amount);
        }
        Ok(amounts)
    }

    fn validate_trade(trade: &ConstantProductTrade) -> Result<(), SwapError> {
        if trade.pools.is_empty() {
            return Err(SwapError::InvalidTrade("empty route".into()));
        }
        if trade.path.len() != trade.pools.len() + 1 {
            return Err(SwapError::InvalidTrade(format!(
                "path of {} tokens does not match {} pools",
                trade.path.len(),
                trade.pools.len()
            )));
        }
        Ok(())
    }
}

impl SwapStrategy for ConstantProduct {
    fn route(
        &self,
        amount_in: U256,
        token_in: Address,
        token_out: Address,
        extra_params: &[u8],
    ) -> Result<Quote, SwapError> {
        if amount_in.is_zero() {
            return Err(SwapError::ZeroAmount);
        }
        let slippage_bips = if extra_params.is_empty() {
            DEFAULT_SLIPPAGE_BIPS
        } else {
            ConstantProductParams::abi_decode(extra_params)
                .map_err(|e| SwapError::InvalidTrade(e.to_string()))?
                .slippageBips
        };
        if u64::from(slippage_bips) > BIPS {
            return Err(SwapError::InvalidTrade(format!(
                "slippage {slippage_bips} bips exceeds 100%"
            )));
        }

        let path = self
            .best_path(amount_in, token_in, token_out)
            .ok_or(SwapError::NoRoute {
                token_in,
                token_out,
            })?;

        let min_amount_out = path.amount_out.saturating_mul(U256::from(
            BIPS - u64::from(slippage_bips),
        )) / U256::from(BIPS);

        debug!(
            %token_in,
            %token_out,
            %amount_in,
            amount_out = %path.amount_out,
            %min_amount_out,
            steps = path.pools.len(),
            "Constant-product route found"
        );

        let gas_estimate = GAS_BASE + GAS_PER_STEP * path.pools.len() as u64;
        let trade = ConstantProductTrade {
            amountIn: amount_in,
            minAmountOut: min_amount_out,
            path: path.tokens,
            pools: path.pools,
        };

        Ok(Quote {
            trade: trade.abi_encode().into(),
            gas_estimate,
            amount_out: path.amount_out,
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
        let trade = ConstantProductTrade::abi_decode(trade)
            .map_err(|e| SwapError::InvalidTrade(e.to_string()))?;
        Self::validate_trade(&trade)?;
        if trade.path[0] != token_in {
            return Err(SwapError::TokenMismatch {
                expected: trade.path[0],
                actual: token_in,
            });
        }

        let amounts = self.simulate(&trade, amount_in)?;
        let amount_out = amounts[amounts.len() - 1];
        let minimum = scale_minimum(trade.minAmountOut, trade.amountIn, amount_in);
        if amount_out < minimum {
            return Err(SwapError::Slippage {
                minimum,
                actual: amount_out,
            });
        }

        // All checks passed; apply the hops. Undo everything if any leg fails.
        let snapshot = self.ledger.snapshot();
        let applied = (|| {
            self.ledger
                .transfer(token_in, payer, trade.pools[0], amount_in)?;
            for (i, pool) in trade.pools.iter().enumerate() {
                let to = trade.pools.get(i + 1).copied().unwrap_or(payer);
                self.ledger
                    .transfer(trade.path[i + 1], *pool, to, amounts[i + 1])?;
            }
            Ok::<_, SwapError>(())
        })();
        if let Err(e) = applied {
            self.ledger.restore(snapshot);
            return Err(e);
        }

        let token_out = trade.path[trade.path.len() - 1];
        debug!(%payer, %token_in, %amount_in, %token_out, %amount_out, "Constant-product swap executed");

        Ok(SwapOutcome {
            token_out,
            amount_out,
        })
    }

    fn description(&self) -> String {
        format!(
            "Constant-product router over {} pools (max {} steps)",
            self.pools.len(),
            self.max_steps
        )
    }
}
