//! Configuration types for a simulated cell network.
//!
//! This crate provides:
//! - Chain configurations (cell, wrapped native token, fees, strategy, bridges)
//! - A local three-chain preset
//! - Configuration loading and validation

pub mod network;

pub use network::{
    AccountConfig, BridgeConfig, ChainConfig, ChainConfigBuilder, ConfigError, FeeConfig,
    HomeConfig, NetworkConfig, PoolConfig, StrategyConfig, TokenBalance,
};
