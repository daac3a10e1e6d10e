use crate::CellError;
use std::sync::atomic::{AtomicBool, Ordering};

/// Rejects a call into a cell while another call is executing.
#[derive(Debug, Default)]
pub(crate) struct ReentrancyGuard {
    entered: AtomicBool,
}

/// Held for the duration of one entrypoint call.
#[must_use]
pub(crate) struct Entered<'a> {
    guard: &'a ReentrancyGuard,
}

impl ReentrancyGuard {
    pub(crate) fn enter(&self) -> Result<Entered<'_>, CellError> {
        self.entered
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map(|_| Entered { guard: self })
            .map_err(|_| CellError::Reentrancy)
    }
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        self.guard.entered.store(false, Ordering::Release);
    }
}
