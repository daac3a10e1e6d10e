//! Home-routed transfer detection.
//!
//! Two remote transferrers of the same token are not paired with each other;
//! a transfer between them is relayed by their common home transferrer. If
//! the second leg cannot be delivered, the home chain pays the multi-hop
//! fallback recipient.

use crate::{engine::Frame, events::CellEvent, Cell};
use alloy_primitives::{Address, B256};
use tracing::trace;

/// Whether a transfer from a transferrer on `current` to `destination` goes
/// through the transferrer's `home` chain.
pub(crate) fn requires_multi_hop(current: B256, home: B256, destination: B256) -> bool {
    home != current && destination != home
}

impl Cell {
    /// Fallback to attach to a transfer leaving through `bridge`, or the zero
    /// address when the transfer is direct.
    ///
    /// A transferrer that cannot report its home chain is treated as direct.
    pub(crate) fn multi_hop_fallback(
        &self,
        frame: &mut Frame<'_>,
        bridge: Address,
        destination: B256,
        fallback: Address,
    ) -> Address {
        match self.transferrer.home_blockchain_id(bridge) {
            Ok(home) if requires_multi_hop(self.blockchain_id, home, destination) => {
                trace!(%bridge, %home, %destination, "multi-hop route");
                fallback
            }
            Ok(_) => Address::ZERO,
            Err(e) => {
                frame.events.push(CellEvent::MultiHopDetectionFailed {
                    operation_id: frame.operation_id(),
                    bridge,
                    reason: e.to_string(),
                });
                Address::ZERO
            }
        }
    }
}
