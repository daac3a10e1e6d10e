//! Owner-gated configuration and recovery.

use crate::{events::CellEvent, fees::FeeSchedule, Cell, CellError};
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::sync::PoisonError;

/// Mutable settings of a cell, written only by its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminConfig {
    pub owner: Address,
    pub fees: FeeSchedule,
}

impl Cell {
    pub(crate) fn admin(&self) -> AdminConfig {
        self.admin
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn owner(&self) -> Address {
        self.admin().owner
    }

    pub fn fee_schedule(&self) -> FeeSchedule {
        self.admin().fees
    }

    /// Apply `update` to the configuration if `caller` is the owner.
    fn administer<T>(
        &self,
        caller: Address,
        update: impl FnOnce(&mut AdminConfig) -> Result<T, CellError>,
    ) -> Result<T, CellError> {
        let mut admin = self.admin.write().unwrap_or_else(PoisonError::into_inner);
        if caller != admin.owner {
            return Err(CellError::Unauthorized { caller });
        }
        update(&mut admin)
    }

    /// Replace the protocol fee schedule. The collector must be set even when
    /// the new schedule charges nothing.
    pub fn set_fee_schedule(&self, caller: Address, schedule: FeeSchedule) -> Result<(), CellError> {
        if schedule.collector == Address::ZERO {
            return Err(CellError::ZeroAddress("fee collector"));
        }
        schedule.validate()?;
        self.administer(caller, |admin| {
            admin.fees = schedule;
            Ok(())
        })?;
        self.commit(vec![CellEvent::FeeScheduleUpdated { schedule }]);
        Ok(())
    }

    pub fn set_fee_collector(&self, caller: Address, collector: Address) -> Result<(), CellError> {
        if collector == Address::ZERO {
            return Err(CellError::ZeroAddress("fee collector"));
        }
        let schedule = self.administer(caller, |admin| {
            admin.fees.collector = collector;
            Ok(admin.fees)
        })?;
        self.commit(vec![CellEvent::FeeScheduleUpdated { schedule }]);
        Ok(())
    }

    pub fn transfer_ownership(&self, caller: Address, owner: Address) -> Result<(), CellError> {
        if owner == Address::ZERO {
            return Err(CellError::ZeroAddress("owner"));
        }
        let previous = self.administer(caller, |admin| {
            Ok(std::mem::replace(&mut admin.owner, owner))
        })?;
        self.commit(vec![CellEvent::OwnershipTransferred { previous, owner }]);
        Ok(())
    }

    /// Sweep `amount` of `token` held by the cell to `to`.
    pub fn recover_erc20(
        &self,
        caller: Address,
        token: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), CellError> {
        let _entered = self.guard.enter()?;
        self.administer(caller, |_| Ok(()))?;
        self.ledger.transfer(token, self.address, to, amount)?;
        self.commit(vec![CellEvent::Recovered {
            asset: token,
            to,
            amount,
        }]);
        Ok(())
    }

    /// Sweep `amount` of native currency held by the cell to `to`.
    pub fn recover_native(&self, caller: Address, to: Address, amount: U256) -> Result<(), CellError> {
        let _entered = self.guard.enter()?;
        self.administer(caller, |_| Ok(()))?;
        self.ledger.transfer_native(self.address, to, amount)?;
        self.commit(vec![CellEvent::Recovered {
            asset: ledger::NATIVE,
            to,
            amount,
        }]);
        Ok(())
    }
}
