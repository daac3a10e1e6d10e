//! Network configuration for a simulated cell deployment.
//!
//! Describes every chain taking part: its cell, wrapped native token, fee
//! schedule, swap venue, token transferrers and genesis balances.

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::Path};
use thiserror::Error;

const MAX_BIPS: u64 = 10_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no chains configured")]
    NoChains,

    #[error("blockchain id {0} configured twice")]
    DuplicateChain(B256),

    #[error("chain {chain}: zero blockchain id")]
    ZeroBlockchainId { chain: String },

    #[error("chain {chain}: zero address for {field}")]
    ZeroAddress { chain: String, field: &'static str },

    #[error("chain {chain}: {bips} bips exceeds 10000")]
    BipsOutOfRange { chain: String, bips: u64 },

    #[error("chain {chain}: pool {pool} trades a token against itself")]
    DegeneratePool { chain: String, pool: Address },

    #[error("chain {chain}: transferrer {bridge} configured twice")]
    DuplicateBridge { chain: String, bridge: Address },

    #[error("chain {chain}: transferrer {bridge} has an invalid home: {reason}")]
    InvalidHome {
        chain: String,
        bridge: Address,
        reason: String,
    },
}

/// Fee schedule of a cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeConfig {
    pub collector: Address,
    /// Flat fee in native currency
    pub fixed_fee: U256,
    pub base_fee_bips: u64,
    pub exempt_single_hop: bool,
}

/// Swap venue backing a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// x*y=k pools with path search up to `max_steps` pools deep
    ConstantProduct { max_steps: usize },
    /// Maker-signed RFQ orders
    SignedOrder,
    /// Token in equals token out
    Passthrough,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self::ConstantProduct { max_steps: 3 }
    }
}

/// Constant-product pool and its genesis reserves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub address: Address,
    pub token_a: Address,
    pub token_b: Address,
    pub reserve_a: U256,
    pub reserve_b: U256,
    #[serde(default = "default_pool_fee")]
    pub fee_bips: u16,
}

const fn default_pool_fee() -> u16 {
    30
}

/// Home transferrer a remote transferrer is paired with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeConfig {
    pub blockchain_id: B256,
    pub bridge: Address,
}

/// Token transferrer deployed on a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub address: Address,
    /// Token moved by the transferrer; the zero address for native currency
    pub token: Address,
    /// Absent for a home transferrer
    #[serde(default)]
    pub home: Option<HomeConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub token: Address,
    pub amount: U256,
}

/// Genesis funding of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    pub address: Address,
    #[serde(default)]
    pub native: U256,
    #[serde(default)]
    pub tokens: Vec<TokenBalance>,
}

/// One chain of the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub name: String,
    pub blockchain_id: B256,
    /// Cell contract address
    pub cell: Address,
    pub wrapped_native: Address,
    pub owner: Address,
    #[serde(default)]
    pub fees: FeeConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub pools: Vec<PoolConfig>,
    #[serde(default)]
    pub bridges: Vec<BridgeConfig>,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

impl ChainConfig {
    pub fn bridge(&self, address: Address) -> Option<&BridgeConfig> {
        self.bridges.iter().find(|b| b.address == address)
    }

    /// Transferrer on this chain moving `token`.
    pub fn bridge_for(&self, token: Address) -> Option<&BridgeConfig> {
        self.bridges.iter().find(|b| b.token == token)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let chain = || self.name.clone();
        let zero = |field| ConfigError::ZeroAddress {
            chain: chain(),
            field,
        };

        if self.blockchain_id == B256::ZERO {
            return Err(ConfigError::ZeroBlockchainId { chain: chain() });
        }
        if self.cell == Address::ZERO {
            return Err(zero("cell"));
        }
        if self.wrapped_native == Address::ZERO {
            return Err(zero("wrapped native"));
        }
        if self.owner == Address::ZERO {
            return Err(zero("owner"));
        }

        if self.fees.base_fee_bips > MAX_BIPS {
            return Err(ConfigError::BipsOutOfRange {
                chain: chain(),
                bips: self.fees.base_fee_bips,
            });
        }
        let charges = !self.fees.fixed_fee.is_zero() || self.fees.base_fee_bips != 0;
        if charges && self.fees.collector == Address::ZERO {
            return Err(zero("fee collector"));
        }

        for pool in &self.pools {
            if pool.address == Address::ZERO {
                return Err(zero("pool"));
            }
            if pool.token_a == pool.token_b {
                return Err(ConfigError::DegeneratePool {
                    chain: chain(),
                    pool: pool.address,
                });
            }
            if u64::from(pool.fee_bips) > MAX_BIPS {
                return Err(ConfigError::BipsOutOfRange {
                    chain: chain(),
                    bips: pool.fee_bips.into(),
                });
            }
        }

        let mut seen = HashSet::new();
        for bridge in &self.bridges {
            if bridge.address == Address::ZERO {
                return Err(zero("bridge"));
            }
            if !seen.insert(bridge.address) {
                return Err(ConfigError::DuplicateBridge {
                    chain: chain(),
                    bridge: bridge.address,
                });
            }
        }
        Ok(())
    }
}

/// Complete configuration of a simulated network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Receives every messaging fee paid to the bridge
    pub relayer: Address,
    pub chains: Vec<ChainConfig>,
}

impl NetworkConfig {
    pub fn from_file(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> eyre::Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;

        Ok(config)
    }

    pub fn to_toml(&self) -> eyre::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn chain(&self, name: &str) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.name == name)
    }

    pub fn chain_by_id(&self, blockchain_id: B256) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.blockchain_id == blockchain_id)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chains.is_empty() {
            return Err(ConfigError::NoChains);
        }
        if self.relayer == Address::ZERO {
            return Err(ConfigError::ZeroAddress {
                chain: "network".into(),
                field: "relayer",
            });
        }

        let mut ids = HashSet::new();
        for chain in &self.chains {
            chain.validate()?;
            if !ids.insert(chain.blockchain_id) {
                return Err(ConfigError::DuplicateChain(chain.blockchain_id));
            }
        }

        for chain in &self.chains {
            for bridge in &chain.bridges {
                if let Some(home) = bridge.home {
                    self.validate_home(chain, bridge, home)?;
                }
            }
        }
        Ok(())
    }

    fn validate_home(
        &self,
        chain: &ChainConfig,
        bridge: &BridgeConfig,
        home: HomeConfig,
    ) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidHome {
            chain: chain.name.clone(),
            bridge: bridge.address,
            reason,
        };
        if home.blockchain_id == chain.blockchain_id {
            return Err(invalid("home is on the same chain".into()));
        }
        let home_chain = self
            .chain_by_id(home.blockchain_id)
            .ok_or_else(|| invalid(format!("unknown chain {}", home.blockchain_id)))?;
        match home_chain.bridge(home.bridge) {
            Some(target) if target.home.is_none() => Ok(()),
            Some(_) => Err(invalid(format!("{} is itself a remote", home.bridge))),
            None => Err(invalid(format!(
                "no transferrer {} on {}",
                home.bridge, home_chain.name
            ))),
        }
    }
}

/// Builder for custom chain configurations.
#[derive(Debug, Clone)]
pub struct ChainConfigBuilder {
    chain: ChainConfig,
}

impl ChainConfigBuilder {
    pub fn new(name: impl Into<String>, blockchain_id: B256) -> Self {
        Self {
            chain: ChainConfig {
                name: name.into(),
                blockchain_id,
                cell: Address::ZERO,
                wrapped_native: Address::ZERO,
                owner: Address::ZERO,
                fees: FeeConfig::default(),
                strategy: StrategyConfig::default(),
                pools: Vec::new(),
                bridges: Vec::new(),
                accounts: Vec::new(),
            },
        }
    }

    /// Start from an existing chain.
    pub const fn from_chain(chain: ChainConfig) -> Self {
        Self { chain }
    }

    pub const fn cell(mut self, address: Address) -> Self {
        self.chain.cell = address;
        self
    }

    pub const fn wrapped_native(mut self, address: Address) -> Self {
        self.chain.wrapped_native = address;
        self
    }

    pub const fn owner(mut self, address: Address) -> Self {
        self.chain.owner = address;
        self
    }

    pub const fn fees(mut self, fees: FeeConfig) -> Self {
        self.chain.fees = fees;
        self
    }

    pub const fn strategy(mut self, strategy: StrategyConfig) -> Self {
        self.chain.strategy = strategy;
        self
    }

    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.chain.pools.push(pool);
        self
    }

    pub fn home_bridge(mut self, address: Address, token: Address) -> Self {
        self.chain.bridges.push(BridgeConfig {
            address,
            token,
            home: None,
        });
        self
    }

    pub fn remote_bridge(mut self, address: Address, token: Address, home: HomeConfig) -> Self {
        self.chain.bridges.push(BridgeConfig {
            address,
            token,
            home: Some(home),
        });
        self
    }

    /// Fund `holder` with `amount` of `token` at genesis.
    pub fn fund(mut self, holder: Address, token: Address, amount: U256) -> Self {
        self.account(holder).tokens.push(TokenBalance { token, amount });
        self
    }

    /// Fund `holder` with native currency at genesis.
    pub fn fund_native(mut self, holder: Address, amount: U256) -> Self {
        let account = self.account(holder);
        account.native = account.native.saturating_add(amount);
        self
    }

    fn account(&mut self, holder: Address) -> &mut AccountConfig {
        let accounts = &mut self.chain.accounts;
        let index = match accounts.iter().position(|a| a.address == holder) {
            Some(index) => index,
            None => {
                accounts.push(AccountConfig {
                    address: holder,
                    native: U256::ZERO,
                    tokens: Vec::new(),
                });
                accounts.len() - 1
            }
        };
        &mut accounts[index]
    }

    pub fn build(self) -> ChainConfig {
        self.chain
    }
}

/// Addresses and ids of the [`NetworkConfig::local`] preset.
pub mod local {
    use alloy_primitives::{address, b256, Address, B256};

    /// Native-home chain
    pub const C_CHAIN: B256 =
        b256!("0x7fc93d85c6d62c5b2ac0b519c87010ea5294012d1e407030d6acd0021cac10d5");
    pub const ALPHA: B256 =
        b256!("0x9f3be606497285d0ffbb5ac9ba24aa60346a9b1812479ed66cb329f394a4b1c7");
    pub const BETA: B256 =
        b256!("0x1278d1be4b987e847be3465940eb5066c4604a7fbd6e086900823597d81af4c1");

    pub const OWNER: Address = address!("0x0e00000000000000000000000000000000000001");
    pub const FEE_COLLECTOR: Address = address!("0xfee0000000000000000000000000000000000001");
    pub const RELAYER: Address = address!("0x7e1a000000000000000000000000000000000001");
    pub const ALICE: Address = address!("0xa11ce00000000000000000000000000000000001");
    pub const BOB: Address = address!("0xb0b0000000000000000000000000000000000001");

    pub const C_CELL: Address = address!("0xce11000000000000000000000000000000000c00");
    pub const A_CELL: Address = address!("0xce11000000000000000000000000000000000a00");
    pub const B_CELL: Address = address!("0xce11000000000000000000000000000000000b00");

    /// Wrapped native of each chain
    pub const C_WNATIVE: Address = address!("0x7700000000000000000000000000000000000c00");
    pub const A_WNATIVE: Address = address!("0x7700000000000000000000000000000000000a00");
    pub const B_WNATIVE: Address = address!("0x7700000000000000000000000000000000000b00");

    /// Stablecoin, canonical on the C-chain
    pub const C_USDC: Address = address!("0x05dc000000000000000000000000000000000c00");
    pub const A_USDC: Address = address!("0x05dc000000000000000000000000000000000a00");
    pub const B_USDC: Address = address!("0x05dc000000000000000000000000000000000b00");

    /// C-chain native currency as bridged to the remotes
    pub const A_CNATIVE: Address = address!("0xc0a7000000000000000000000000000000000a00");
    pub const B_CNATIVE: Address = address!("0xc0a7000000000000000000000000000000000b00");

    /// Tokens local to one remote chain
    pub const A_TOKEN: Address = address!("0x70ce000000000000000000000000000000000a00");
    pub const B_TOKEN: Address = address!("0x70ce000000000000000000000000000000000b00");

    pub const C_USDC_HOME: Address = address!("0xb41d000000000000000000000000000000000c01");
    pub const C_NATIVE_HOME: Address = address!("0xb41d000000000000000000000000000000000c02");
    pub const A_USDC_REMOTE: Address = address!("0xb41d000000000000000000000000000000000a01");
    pub const A_NATIVE_REMOTE: Address = address!("0xb41d000000000000000000000000000000000a02");
    pub const B_USDC_REMOTE: Address = address!("0xb41d000000000000000000000000000000000b01");
    pub const B_NATIVE_REMOTE: Address = address!("0xb41d000000000000000000000000000000000b02");

    pub const C_POOL: Address = address!("0x9001000000000000000000000000000000000c00");
    pub const A_POOL: Address = address!("0x9001000000000000000000000000000000000a00");
    pub const B_POOL: Address = address!("0x9001000000000000000000000000000000000b00");
}

impl NetworkConfig {
    /// Three chains: a native-home C-chain holding the canonical stablecoin,
    /// and two remote chains each with a local token pooled against it.
    pub fn local() -> Self {
        use local::*;

        let units = |n: u64| U256::from(n) * U256::from(1_000_000u64);
        let fees = FeeConfig {
            collector: FEE_COLLECTOR,
            fixed_fee: U256::ZERO,
            base_fee_bips: 10,
            exempt_single_hop: true,
        };
        let usdc_home = HomeConfig {
            blockchain_id: C_CHAIN,
            bridge: C_USDC_HOME,
        };
        let native_home = HomeConfig {
            blockchain_id: C_CHAIN,
            bridge: C_NATIVE_HOME,
        };

        let c_chain = ChainConfigBuilder::new("c-chain", C_CHAIN)
            .cell(C_CELL)
            .wrapped_native(C_WNATIVE)
            .owner(OWNER)
            .fees(fees)
            .pool(PoolConfig {
                address: C_POOL,
                token_a: C_USDC,
                token_b: C_WNATIVE,
                reserve_a: units(2_000_000),
                reserve_b: units(100_000),
                fee_bips: 30,
            })
            .home_bridge(C_USDC_HOME, C_USDC)
            .home_bridge(C_NATIVE_HOME, Address::ZERO)
            .fund(ALICE, C_USDC, units(10_000))
            .fund_native(ALICE, units(1_000))
            .build();

        let alpha = ChainConfigBuilder::new("alpha", ALPHA)
            .cell(A_CELL)
            .wrapped_native(A_WNATIVE)
            .owner(OWNER)
            .fees(fees)
            .pool(PoolConfig {
                address: A_POOL,
                token_a: A_USDC,
                token_b: A_TOKEN,
                reserve_a: units(1_000_000),
                reserve_b: units(4_000_000),
                fee_bips: 30,
            })
            .remote_bridge(A_USDC_REMOTE, A_USDC, usdc_home)
            .remote_bridge(A_NATIVE_REMOTE, A_CNATIVE, native_home)
            .fund(ALICE, A_TOKEN, units(10_000))
            .fund_native(ALICE, units(1_000))
            .build();

        let beta = ChainConfigBuilder::new("beta", BETA)
            .cell(B_CELL)
            .wrapped_native(B_WNATIVE)
            .owner(OWNER)
            .fees(fees)
            .pool(PoolConfig {
                address: B_POOL,
                token_a: B_USDC,
                token_b: B_TOKEN,
                reserve_a: units(1_000_000),
                reserve_b: units(500_000),
                fee_bips: 30,
            })
            .remote_bridge(B_USDC_REMOTE, B_USDC, usdc_home)
            .remote_bridge(B_NATIVE_REMOTE, B_CNATIVE, native_home)
            .fund(ALICE, B_TOKEN, units(10_000))
            .fund_native(ALICE, units(1_000))
            .build();

        Self {
            relayer: RELAYER,
            chains: vec![c_chain, alpha, beta],
        }
    }
}
