//! Entry fees.
//!
//! Fees are charged once, when an operation is initiated. Each schedule has a
//! fixed part, paid in native currency, and a proportional part, paid in the
//! input token. Downstream hops only ever see the amount left after fees.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_BIPS: u64 = 10_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeeError {
    #[error("base fee {0} bips exceeds {MAX_BIPS}")]
    BipsOutOfRange(u64),

    #[error("fees configured without a collector")]
    ZeroCollector,

    #[error("proportional fees {fee} consume the whole amount {amount}")]
    ExceedsAmount { fee: U256, amount: U256 },

    #[error("fee overflow")]
    Overflow,
}

/// A fee tier: who collects, and how much.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub collector: Address,
    /// Flat fee in native currency
    pub fixed_fee: U256,
    /// Proportional fee on the input amount, in basis points
    pub base_fee_bips: u64,
    /// Waive the proportional fee for single-hop plans
    pub exempt_single_hop: bool,
}

impl FeeSchedule {
    pub fn is_free(&self) -> bool {
        self.fixed_fee.is_zero() && self.base_fee_bips == 0
    }

    pub fn validate(&self) -> Result<(), FeeError> {
        if self.base_fee_bips > MAX_BIPS {
            return Err(FeeError::BipsOutOfRange(self.base_fee_bips));
        }
        if !self.is_free() && self.collector == Address::ZERO {
            return Err(FeeError::ZeroCollector);
        }
        Ok(())
    }

    fn proportional(&self, amount: U256, hop_count: usize) -> Result<U256, FeeError> {
        if self.exempt_single_hop && hop_count == 1 {
            return Ok(U256::ZERO);
        }
        amount
            .checked_mul(U256::from(self.base_fee_bips))
            .map(|fee| fee / U256::from(MAX_BIPS))
            .ok_or(FeeError::Overflow)
    }
}

/// Amount owed to one collector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeCharge {
    pub collector: Address,
    pub fixed: U256,
    pub proportional: U256,
}

/// Fees owed by one operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub protocol: FeeCharge,
    pub third_party: Option<FeeCharge>,
}

impl FeeBreakdown {
    pub fn charges(&self) -> impl Iterator<Item = &FeeCharge> {
        std::iter::once(&self.protocol).chain(self.third_party.as_ref())
    }

    /// Native currency owed.
    pub fn total_fixed(&self) -> U256 {
        self.charges().map(|c| c.fixed).sum()
    }

    /// Input token owed.
    pub fn total_proportional(&self) -> U256 {
        self.charges().map(|c| c.proportional).sum()
    }
}

/// Fixed fees owed regardless of the amount.
pub fn fixed_fees(protocol: &FeeSchedule, third_party: Option<&FeeSchedule>) -> Result<U256, FeeError> {
    protocol
        .fixed_fee
        .checked_add(third_party.map(|s| s.fixed_fee).unwrap_or_default())
        .ok_or(FeeError::Overflow)
}

/// Compute what an operation of `amount` over `hop_count` hops owes.
///
/// Pure: identical inputs always give identical fees.
pub fn compute_fees(
    protocol: &FeeSchedule,
    third_party: Option<&FeeSchedule>,
    amount: U256,
    hop_count: usize,
) -> Result<FeeBreakdown, FeeError> {
    protocol.validate()?;
    if let Some(schedule) = third_party {
        schedule.validate()?;
    }
    fixed_fees(protocol, third_party)?;

    let charge = |schedule: &FeeSchedule| -> Result<FeeCharge, FeeError> {
        Ok(FeeCharge {
            collector: schedule.collector,
            fixed: schedule.fixed_fee,
            proportional: schedule.proportional(amount, hop_count)?,
        })
    };
    let breakdown = FeeBreakdown {
        protocol: charge(protocol)?,
        third_party: third_party
            .filter(|s| !s.is_free())
            .map(charge)
            .transpose()?,
    };

    let fee = breakdown
        .charges()
        .try_fold(U256::ZERO, |total, c| total.checked_add(c.proportional))
        .ok_or(FeeError::Overflow)?;
    if !fee.is_zero() && fee >= amount {
        return Err(FeeError::ExceedsAmount { fee, amount });
    }
    Ok(breakdown)
}
