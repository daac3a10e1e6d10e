use crate::{Quote, SwapError, SwapOutcome, SwapStrategy};
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolValue;
use binding::trade::PassthroughTrade;

/// Identity strategy for hops that only need to move a token, not change it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl SwapStrategy for Passthrough {
    fn route(
        &self,
        amount_in: U256,
        token_in: Address,
        token_out: Address,
        _extra_params: &[u8],
    ) -> Result<Quote, SwapError> {
        if token_in != token_out {
            return Err(SwapError::NoRoute {
                token_in,
                token_out,
            });
        }
        Ok(Quote {
            trade: PassthroughTrade { tokenOut: token_out }.abi_encode().into(),
            gas_estimate: 0,
            amount_out: amount_in,
        })
    }

    fn swap(
        &self,
        _payer: Address,
        token_in: Address,
        amount_in: U256,
        trade: &[u8],
    ) -> Result<SwapOutcome, SwapError> {
        let trade = PassthroughTrade::abi_decode(trade)
            .map_err(|e| SwapError::InvalidTrade(e.to_string()))?;
        if trade.tokenOut != token_in {
            return Err(SwapError::TokenMismatch {
                expected: trade.tokenOut,
                actual: token_in,
            });
        }
        Ok(SwapOutcome {
            token_out: token_in,
            amount_out: amount_in,
        })
    }

    fn description(&self) -> String {
        "Pass-through (no swap)".to_string()
    }
}
