//! ABI bindings for everything that crosses a contract or chain boundary.
//!
//! This crate consolidates the Solidity-shaped types used across the project:
//! - Cell payload and instruction structs (the continuation carried by bridge messages)
//! - Token transferrer inputs (the bridge collaborator)
//! - Encoded trade formats understood by the bundled swap strategies
//!
//! All bindings are generated using alloy's `sol!` macro.

pub mod cell;
pub mod trade;
pub mod transferrer;
