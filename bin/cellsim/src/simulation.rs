//! In-process network of chains, each running a cell.

use crate::{
    metrics::Metrics,
    plan::{Plan, PlanRequest, Planner},
    relayer::Relayer,
};
use alloy_primitives::{Address, B256, U256};
use bridge::{BridgeInfo, BridgeNetwork, HomeRef};
use cell::{fees, CallContext, Cell, CellConfig, CellEvent, FeeSchedule, Outcome};
use config::{ChainConfig, FeeConfig, NetworkConfig, StrategyConfig};
use eyre::{eyre, OptionExt};
use ledger::{BalanceQuery, Ledger, Monitor, NATIVE};
use std::sync::Arc;
use swap::{ConstantProduct, Passthrough, Pool, SignedOrder, SwapStrategy};
use tracing::{debug, info};

/// The swap venue of one chain.
#[derive(Clone)]
pub enum Venue {
    ConstantProduct(Arc<ConstantProduct>),
    SignedOrder(Arc<SignedOrder>),
    Passthrough(Arc<Passthrough>),
}

impl Venue {
    fn from_config(chain: &ChainConfig, ledger: &Ledger) -> Self {
        match chain.strategy {
            StrategyConfig::ConstantProduct { max_steps } => {
                let venue = chain.pools.iter().fold(
                    ConstantProduct::new(ledger.clone(), max_steps),
                    |venue, pool| {
                        venue.with_pool(Pool {
                            address: pool.address,
                            token_a: pool.token_a,
                            token_b: pool.token_b,
                            fee_bips: pool.fee_bips,
                        })
                    },
                );
                Self::ConstantProduct(Arc::new(venue))
            }
            StrategyConfig::SignedOrder => {
                Self::SignedOrder(Arc::new(SignedOrder::new(ledger.clone())))
            }
            StrategyConfig::Passthrough => Self::Passthrough(Arc::new(Passthrough)),
        }
    }

    pub fn strategy(&self) -> Arc<dyn SwapStrategy> {
        match self {
            Self::ConstantProduct(venue) => venue.clone(),
            Self::SignedOrder(venue) => venue.clone(),
            Self::Passthrough(venue) => venue.clone(),
        }
    }

    /// Order book to post RFQ orders to.
    pub fn signed_order(&self) -> Option<&SignedOrder> {
        match self {
            Self::SignedOrder(venue) => Some(&**venue),
            _ => None,
        }
    }
}

/// One simulated chain.
pub struct Chain {
    pub config: ChainConfig,
    pub ledger: Ledger,
    pub cell: Arc<Cell>,
    pub venue: Venue,
}

impl Chain {
    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub const fn blockchain_id(&self) -> B256 {
        self.config.blockchain_id
    }

    /// Balance of `holder`; `token` [`NATIVE`] for native currency.
    pub fn balance(&self, holder: Address, token: Address) -> U256 {
        let query = if token == NATIVE {
            BalanceQuery::NativeBalance { address: holder }
        } else {
            BalanceQuery::ERC20Balance { token, holder }
        };
        self.ledger.query_balance(query).amount
    }
}

/// An initiated operation.
#[derive(Debug, Clone)]
pub struct Submitted {
    pub plan: Plan,
    pub outcome: Outcome,
}

pub struct Simulation {
    config: NetworkConfig,
    network: Arc<BridgeNetwork>,
    chains: Vec<Chain>,
    metrics: Metrics,
}

impl Simulation {
    /// Assemble every configured chain and the relayer serving them.
    pub fn from_config(config: NetworkConfig) -> eyre::Result<(Self, Relayer)> {
        config.validate()?;
        let (network, inbox) = BridgeNetwork::new(config.relayer);
        let network = Arc::new(network);

        let ledgers: Vec<Ledger> = config
            .chains
            .iter()
            .map(|chain| {
                let ledger = Ledger::new();
                network.register_chain(chain.blockchain_id, ledger.clone());
                ledger
            })
            .collect();

        for chain in &config.chains {
            for bridge in &chain.bridges {
                network.register_bridge(BridgeInfo {
                    address: bridge.address,
                    blockchain_id: chain.blockchain_id,
                    token: bridge.token,
                    home: bridge.home.map(|home| HomeRef {
                        blockchain_id: home.blockchain_id,
                        bridge: home.bridge,
                    }),
                })?;
            }
        }

        for (chain, ledger) in config.chains.iter().zip(&ledgers) {
            Self::fund_genesis(&network, chain, ledger)?;
        }

        let metrics = Metrics::new();
        let mut chains = Vec::with_capacity(config.chains.len());
        for (chain, ledger) in config.chains.iter().zip(ledgers) {
            let venue = Venue::from_config(chain, &ledger);
            let cell = Cell::new(
                CellConfig {
                    address: chain.cell,
                    blockchain_id: chain.blockchain_id,
                    wrapped_native: chain.wrapped_native,
                    owner: chain.owner,
                    fees: fee_schedule(chain.fees),
                },
                ledger.clone(),
                venue.strategy(),
                Arc::new(network.transferrer(chain.blockchain_id)),
            )?;
            info!(
                chain = %chain.name,
                blockchain_id = %chain.blockchain_id,
                cell = %chain.cell,
                strategy = %venue.strategy().description(),
                "Chain ready"
            );
            chains.push(Chain {
                config: chain.clone(),
                ledger,
                cell: Arc::new(cell),
                venue,
            });
        }

        let cells = chains
            .iter()
            .map(|c| ((c.blockchain_id(), c.cell.address()), Arc::clone(&c.cell)))
            .collect();
        let relayer = Relayer::new(Arc::clone(&network), cells, inbox, metrics.clone());

        let simulation = Self {
            config,
            network,
            chains,
            metrics,
        };
        Ok((simulation, relayer))
    }

    /// Simulation of [`NetworkConfig::local`].
    pub fn local() -> eyre::Result<(Self, Relayer)> {
        Self::from_config(NetworkConfig::local())
    }

    /// Genesis balances: pool reserves and funded accounts.
    fn fund_genesis(
        network: &BridgeNetwork,
        chain: &ChainConfig,
        ledger: &Ledger,
    ) -> eyre::Result<()> {
        for pool in &chain.pools {
            Self::fund(network, chain, ledger, pool.address, pool.token_a, pool.reserve_a)?;
            Self::fund(network, chain, ledger, pool.address, pool.token_b, pool.reserve_b)?;
        }
        for account in &chain.accounts {
            if !account.native.is_zero() {
                ledger.mint_native(account.address, account.native)?;
            }
            for balance in &account.tokens {
                Self::fund(network, chain, ledger, account.address, balance.token, balance.amount)?;
            }
        }
        Ok(())
    }

    /// Mint `amount` of `token` to `holder`.
    ///
    /// Wrapped native is minted as native currency and wrapped. A token
    /// minted by a remote transferrer is backed by the same amount escrowed in
    /// its home transferrer.
    fn fund(
        network: &BridgeNetwork,
        chain: &ChainConfig,
        ledger: &Ledger,
        holder: Address,
        token: Address,
        amount: U256,
    ) -> eyre::Result<()> {
        if token == chain.wrapped_native {
            ledger.mint_native(holder, amount)?;
            ledger.wrap(token, holder, amount)?;
            return Ok(());
        }
        ledger.mint(token, holder, amount)?;

        let Some(home) = chain.bridge_for(token).and_then(|b| b.home) else {
            return Ok(());
        };
        let home_bridge = network.bridge(home.blockchain_id, home.bridge)?;
        let home_ledger = network.ledger(home.blockchain_id)?;
        if home_bridge.is_native() {
            home_ledger.mint_native(home_bridge.address, amount)?;
        } else {
            home_ledger.mint(home_bridge.token, home_bridge.address, amount)?;
        }
        debug!(%token, %holder, %amount, home = %home_bridge.address, "Backed remote balance");
        Ok(())
    }

    pub const fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub const fn network(&self) -> &Arc<BridgeNetwork> {
        &self.network
    }

    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    pub fn chain(&self, name: &str) -> eyre::Result<&Chain> {
        self.chains
            .iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| eyre!("unknown chain {name}"))
    }

    pub fn chain_by_id(&self, blockchain_id: B256) -> eyre::Result<&Chain> {
        self.chains
            .iter()
            .find(|c| c.blockchain_id() == blockchain_id)
            .ok_or_else(|| eyre!("unknown blockchain id {blockchain_id}"))
    }

    pub const fn planner(&self) -> Planner<'_> {
        Planner::new(self)
    }

    /// Plan `request` and initiate it on its source chain.
    ///
    /// The caller attaches exactly the fixed fees, plus the input itself for
    /// native input.
    pub fn submit(&self, request: &PlanRequest) -> eyre::Result<Submitted> {
        let plan = self.planner().plan(request)?;
        let chain = self.chain(&request.source)?;
        let fixed = fees::fixed_fees(
            &chain.cell.fee_schedule(),
            plan.instructions.third_party_fee.as_ref(),
        )?;

        let (token, amount, value) = if request.native {
            let value = request
                .amount_in
                .checked_add(fixed)
                .ok_or_eyre("native input overflows")?;
            (NATIVE, U256::ZERO, value)
        } else {
            (request.token_in, request.amount_in, fixed)
        };

        let ctx = CallContext {
            sender: request.sender,
            value,
        };
        let outcome = chain
            .cell
            .initiate(ctx, token, amount, plan.instructions.clone())?;

        self.metrics.record_initiated();
        if let Some(hop) = plan.instructions.hops.first() {
            self.metrics.record_hop(hop.action, &outcome);
        }
        info!(
            chain = %chain.name(),
            outcome = outcome.name(),
            hops = plan.instructions.hops.len(),
            expected_out = %plan.amount_out,
            "Operation submitted"
        );
        Ok(Submitted { plan, outcome })
    }

    /// Drain the events of every cell, tagged with the chain name.
    pub fn take_events(&self) -> Vec<(String, CellEvent)> {
        self.chains
            .iter()
            .flat_map(|chain| {
                chain
                    .cell
                    .take_events()
                    .into_iter()
                    .map(|event| (chain.config.name.clone(), event))
            })
            .collect()
    }
}

const fn fee_schedule(fees: FeeConfig) -> FeeSchedule {
    FeeSchedule {
        collector: fees.collector,
        fixed_fee: fees.fixed_fee,
        base_fee_bips: fees.base_fee_bips,
        exempt_single_hop: fees.exempt_single_hop,
    }
}
