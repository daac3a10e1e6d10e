use crate::{Balance, BalanceQuery, LedgerError, Monitor, NATIVE};
use alloy_primitives::{Address, B256, U256};
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};
use tracing::trace;

#[derive(Debug, Clone, Default)]
struct Book {
    tokens: HashMap<(Address, Address), U256>,
    native: HashMap<Address, U256>,
    /// One-shot storage flags, keyed by owning account
    flags: HashSet<(Address, B256)>,
}

impl Book {
    fn token(&self, token: Address, holder: Address) -> U256 {
        self.tokens
            .get(&(token, holder))
            .copied()
            .unwrap_or_default()
    }

    fn native(&self, holder: Address) -> U256 {
        self.native.get(&holder).copied().unwrap_or_default()
    }

    fn debit_token(
        &mut self,
        token: Address,
        holder: Address,
        amount: U256,
    ) -> Result<(), LedgerError> {
        let available = self.token(token, holder);
        let remaining =
            available
                .checked_sub(amount)
                .ok_or(LedgerError::InsufficientBalance {
                    asset: token,
                    holder,
                    needed: amount,
                    available,
                })?;
        self.tokens.insert((token, holder), remaining);
        Ok(())
    }

    fn credit_token(
        &mut self,
        token: Address,
        holder: Address,
        amount: U256,
    ) -> Result<(), LedgerError> {
        let updated = self
            .token(token, holder)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { holder })?;
        self.tokens.insert((token, holder), updated);
        Ok(())
    }

    fn debit_native(&mut self, holder: Address, amount: U256) -> Result<(), LedgerError> {
        let available = self.native(holder);
        let remaining =
            available
                .checked_sub(amount)
                .ok_or(LedgerError::InsufficientBalance {
                    asset: NATIVE,
                    holder,
                    needed: amount,
                    available,
                })?;
        self.native.insert(holder, remaining);
        Ok(())
    }

    fn credit_native(&mut self, holder: Address, amount: U256) -> Result<(), LedgerError> {
        let updated = self
            .native(holder)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { holder })?;
        self.native.insert(holder, updated);
        Ok(())
    }
}

/// Frozen copy of a ledger, used to undo a rejected call.
#[derive(Debug, Clone)]
pub struct Snapshot(Book);

/// Shared handle to the balances of one chain.
///
/// Cloning the handle shares the underlying book. A ledger models a chain that
/// executes one call at a time: [`Ledger::restore`] replaces the whole book.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    inner: Arc<RwLock<Book>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Book> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Book> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create `amount` of `token` out of thin air (genesis funding, remote bridge mints).
    pub fn mint(&self, token: Address, to: Address, amount: U256) -> Result<(), LedgerError> {
        if token == NATIVE {
            return Err(LedgerError::NotAToken(token));
        }
        trace!(%token, %to, %amount, "mint");
        self.write().credit_token(token, to, amount)
    }

    /// Destroy `amount` of `token` held by `from`.
    pub fn burn(&self, token: Address, from: Address, amount: U256) -> Result<(), LedgerError> {
        trace!(%token, %from, %amount, "burn");
        self.write().debit_token(token, from, amount)
    }

    /// Create native currency (genesis funding).
    pub fn mint_native(&self, to: Address, amount: U256) -> Result<(), LedgerError> {
        trace!(%to, %amount, "mint native");
        self.write().credit_native(to, amount)
    }

    /// Move `amount` of `token` from `from` to `to`.
    pub fn transfer(
        &self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), LedgerError> {
        if token == NATIVE {
            return Err(LedgerError::NotAToken(token));
        }
        trace!(%token, %from, %to, %amount, "transfer");
        let mut book = self.write();
        book.debit_token(token, from, amount)?;
        book.credit_token(token, to, amount)
    }

    /// Move native currency from `from` to `to`.
    pub fn transfer_native(
        &self,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), LedgerError> {
        trace!(%from, %to, %amount, "transfer native");
        let mut book = self.write();
        book.debit_native(from, amount)?;
        book.credit_native(to, amount)
    }

    /// Wrap `amount` of `holder`'s native currency into `wrapped` tokens.
    ///
    /// The wrapped token contract keeps the native currency as backing.
    pub fn wrap(&self, wrapped: Address, holder: Address, amount: U256) -> Result<(), LedgerError> {
        trace!(%wrapped, %holder, %amount, "wrap");
        let mut book = self.write();
        book.debit_native(holder, amount)?;
        book.credit_native(wrapped, amount)?;
        book.credit_token(wrapped, holder, amount)
    }

    /// Redeem `amount` of `holder`'s `wrapped` tokens for native currency.
    pub fn unwrap(
        &self,
        wrapped: Address,
        holder: Address,
        amount: U256,
    ) -> Result<(), LedgerError> {
        trace!(%wrapped, %holder, %amount, "unwrap");
        let mut book = self.write();
        book.debit_token(wrapped, holder, amount)?;
        book.debit_native(wrapped, amount)?;
        book.credit_native(holder, amount)
    }

    pub fn balance_of(&self, token: Address, holder: Address) -> U256 {
        self.read().token(token, holder)
    }

    pub fn native_balance(&self, holder: Address) -> U256 {
        self.read().native(holder)
    }

    /// Set flag `key` in `account`'s storage.
    ///
    /// Returns `false` if it was already set. Flags are part of the book, so a
    /// restored snapshot clears flags set after it was taken.
    pub fn set_flag(&self, account: Address, key: B256) -> bool {
        trace!(%account, %key, "set flag");
        self.write().flags.insert((account, key))
    }

    pub fn is_flagged(&self, account: Address, key: B256) -> bool {
        self.read().flags.contains(&(account, key))
    }

    /// Sum of all balances of `token`.
    pub fn total_supply(&self, token: Address) -> U256 {
        self.read()
            .tokens
            .iter()
            .filter(|((t, _), _)| *t == token)
            .map(|(_, amount)| *amount)
            .sum()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot(self.read().clone())
    }

    pub fn restore(&self, snapshot: Snapshot) {
        trace!("restoring ledger snapshot");
        *self.write() = snapshot.0;
    }
}

impl Monitor for Ledger {
    fn query_balance(&self, query: BalanceQuery) -> Balance {
        match query {
            BalanceQuery::ERC20Balance { token, holder } => Balance {
                holder,
                asset: token,
                amount: self.balance_of(token, holder),
            },
            BalanceQuery::NativeBalance { address } => Balance {
                holder: address,
                asset: NATIVE,
                amount: self.native_balance(address),
            },
        }
    }
}
