//! Cross-chain swap routing engine.
//!
//! A [`Cell`] lives on every participating chain. An operation starts with
//! [`Cell::initiate`] on the source chain, which consumes the first [`Hop`] of
//! the plan and either finishes locally or hands the rest of the plan to the
//! bridge. Each following chain resumes in [`Cell::receive_tokens`] (or its
//! native variant) with the [`CellPayload`] carried by the bridge message.
//!
//! All continuation state travels inside the payload; a cell keeps nothing
//! per operation between calls.

mod admin;
mod engine;
mod error;
mod events;
pub mod fees;
mod guard;
mod multihop;
pub mod native;
pub mod payload;
mod rollback;
pub mod types;

#[cfg(test)]
mod testkit;

pub use admin::AdminConfig;
pub use engine::{CallContext, Cell, CellConfig, Outcome};
pub use error::CellError;
pub use events::{CellEvent, StrandReason};
pub use fees::{compute_fees, FeeBreakdown, FeeError, FeeSchedule};
pub use payload::PayloadError;
pub use types::{Action, BridgePath, CellPayload, Hop, Instructions, ThirdPartyFee};

pub use bridge::ReceiveContext;
