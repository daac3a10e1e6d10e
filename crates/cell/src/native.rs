//! Native currency adapter.
//!
//! The engine only ever works with tokens. Native currency entering a cell is
//! wrapped straight away, and unwrapped again right before it leaves through a
//! native-only bridge or reaches a receiver that accepts native currency.

use crate::CellError;
use alloy_primitives::{Address, U256};
use ledger::{Ledger, LedgerError};

#[derive(Debug, Clone)]
pub struct NativeAdapter {
    wrapped: Address,
    ledger: Ledger,
}

impl NativeAdapter {
    pub const fn new(wrapped: Address, ledger: Ledger) -> Self {
        Self { wrapped, ledger }
    }

    /// Wrapped native token of this chain.
    pub const fn wrapped(&self) -> Address {
        self.wrapped
    }

    pub fn is_wrapped(&self, token: Address) -> bool {
        token == self.wrapped
    }

    pub fn wrap(&self, holder: Address, amount: U256) -> Result<(), LedgerError> {
        self.ledger.wrap(self.wrapped, holder, amount)
    }

    pub fn unwrap(&self, holder: Address, amount: U256) -> Result<(), LedgerError> {
        self.ledger.unwrap(self.wrapped, holder, amount)
    }

    /// Reject anything but the wrapped native token ahead of a native-only bridge.
    pub fn require_wrapped(&self, token: Address) -> Result<(), CellError> {
        if self.is_wrapped(token) {
            Ok(())
        } else {
            Err(CellError::NotWrappedNative { token })
        }
    }

    /// Hand `amount` of `token` held by `from` to `to`.
    ///
    /// Wrapped native is unwrapped first when `payable` is set. Returns whether
    /// the receiver got native currency.
    pub fn deliver(
        &self,
        from: Address,
        to: Address,
        token: Address,
        amount: U256,
        payable: bool,
    ) -> Result<bool, LedgerError> {
        if payable && self.is_wrapped(token) {
            self.ledger.unwrap(self.wrapped, from, amount)?;
            self.ledger.transfer_native(from, to, amount)?;
            Ok(true)
        } else {
            self.ledger.transfer(token, from, to, amount)?;
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WRAPPED: Address = Address::repeat_byte(0x77);
    const TOKEN: Address = Address::repeat_byte(0x01);
    const CELL: Address = Address::repeat_byte(0xce);
    const RECEIVER: Address = Address::repeat_byte(0xee);

    fn adapter() -> (Ledger, NativeAdapter) {
        let ledger = Ledger::new();
        ledger.mint_native(CELL, U256::from(100u64)).unwrap();
        let adapter = NativeAdapter::new(WRAPPED, ledger.clone());
        adapter.wrap(CELL, U256::from(100u64)).unwrap();
        (ledger, adapter)
    }

    #[test]
    fn test_payable_receiver_gets_native() {
        let (ledger, adapter) = adapter();
        let native = adapter
            .deliver(CELL, RECEIVER, WRAPPED, U256::from(40u64), true)
            .unwrap();
        assert!(native);
        assert_eq!(ledger.native_balance(RECEIVER), U256::from(40u64));
        assert_eq!(ledger.balance_of(WRAPPED, CELL), U256::from(60u64));
        assert_eq!(ledger.native_balance(WRAPPED), U256::from(60u64));
    }

    #[test]
    fn test_non_payable_receiver_gets_wrapped() {
        let (ledger, adapter) = adapter();
        let native = adapter
            .deliver(CELL, RECEIVER, WRAPPED, U256::from(40u64), false)
            .unwrap();
        assert!(!native);
        assert_eq!(ledger.balance_of(WRAPPED, RECEIVER), U256::from(40u64));
        assert_eq!(ledger.native_balance(RECEIVER), U256::ZERO);
    }

    #[test]
    fn test_payable_flag_ignored_for_other_tokens() {
        let (ledger, adapter) = adapter();
        ledger.mint(TOKEN, CELL, U256::from(5u64)).unwrap();
        let native = adapter
            .deliver(CELL, RECEIVER, TOKEN, U256::from(5u64), true)
            .unwrap();
        assert!(!native);
        assert_eq!(ledger.balance_of(TOKEN, RECEIVER), U256::from(5u64));
    }

    #[test]
    fn test_require_wrapped() {
        let (_, adapter) = adapter();
        adapter.require_wrapped(WRAPPED).unwrap();
        assert_eq!(
            adapter.require_wrapped(TOKEN),
            Err(CellError::NotWrappedNative { token: TOKEN })
        );
    }
}
