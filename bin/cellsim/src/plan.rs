//! Off-chain planning: turns a route request into [`Instructions`].

use crate::simulation::{Chain, Simulation};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolValue;
use binding::trade::ConstantProductParams;
use cell::{compute_fees, Action, BridgePath, FeeBreakdown, FeeSchedule, Hop, Instructions};
use config::{BridgeConfig, HomeConfig};
use eyre::{bail, eyre};
use ledger::NATIVE;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

/// Gas a transferrer needs to credit a plain recipient.
pub const TRANSFER_GAS: u64 = 250_000;
/// Gas a cell needs for a hop, excluding its swap.
pub const CELL_GAS: u64 = 300_000;

/// One leg of a requested route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LegSpec {
    /// Swap on the current chain.
    Swap { token_out: Address },
    /// Move the current token to chain `to`.
    Bridge { to: String },
    SwapAndBridge { token_out: Address, to: String },
}

impl FromStr for LegSpec {
    type Err = eyre::Report;

    /// Parse `swap:<token>`, `bridge:<chain>` or `swap-bridge:<token>:<chain>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        match parts.as_slice() {
            ["swap", token] => Ok(Self::Swap {
                token_out: token.parse()?,
            }),
            ["bridge", chain] => Ok(Self::Bridge {
                to: (*chain).to_string(),
            }),
            ["swap-bridge", token, chain] => Ok(Self::SwapAndBridge {
                token_out: token.parse()?,
                to: (*chain).to_string(),
            }),
            _ => Err(eyre!(
                "invalid leg {s:?}, expected swap:<token>, bridge:<chain> or swap-bridge:<token>:<chain>"
            )),
        }
    }
}

/// What a user asks to be routed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanRequest {
    /// Name of the chain the operation starts on
    pub source: String,
    /// Ignored for native input
    #[serde(default)]
    pub token_in: Address,
    pub amount_in: U256,
    pub sender: Address,
    pub receiver: Address,
    /// Pay the input as native currency
    #[serde(default)]
    pub native: bool,
    /// Deliver wrapped native output as native currency
    #[serde(default)]
    pub payable_receiver: bool,
    /// Messaging fee per bridge leg, in the bridged token
    #[serde(default)]
    pub teleporter_fee: U256,
    #[serde(default)]
    pub rollback_fee: U256,
    #[serde(default)]
    pub slippage_bips: Option<u16>,
    #[serde(default)]
    pub source_id: u64,
    #[serde(default)]
    pub third_party_fee: Option<FeeSchedule>,
    pub legs: Vec<LegSpec>,
}

/// A planned operation and what it is expected to deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub instructions: Instructions,
    pub fees: FeeBreakdown,
    /// Chain the receiver is paid on
    pub destination: String,
    /// [`NATIVE`] for native currency
    pub token_out: Address,
    pub amount_out: U256,
}

/// Legs grouped into the work of one cell.
#[derive(Debug, PartialEq, Eq)]
struct Step {
    swap: Option<Address>,
    to: Option<String>,
}

impl Step {
    const fn action(&self, last: bool) -> Action {
        match (self.swap.is_some(), self.to.is_some(), last) {
            (true, true, _) => Action::SwapAndHop,
            (true, false, _) => Action::SwapAndTransfer,
            (false, _, true) => Action::Hop,
            (false, _, false) => Action::HopAndCall,
        }
    }
}

fn steps(legs: &[LegSpec]) -> eyre::Result<Vec<Step>> {
    let mut steps: Vec<Step> = Vec::with_capacity(legs.len());
    for leg in legs {
        match leg {
            LegSpec::Swap { token_out } => steps.push(Step {
                swap: Some(*token_out),
                to: None,
            }),
            LegSpec::Bridge { to } => match steps.last_mut() {
                Some(step) if step.to.is_none() => step.to = Some(to.clone()),
                _ => steps.push(Step {
                    swap: None,
                    to: Some(to.clone()),
                }),
            },
            LegSpec::SwapAndBridge { token_out, to } => steps.push(Step {
                swap: Some(*token_out),
                to: Some(to.clone()),
            }),
        }
    }

    let Some((_, init)) = steps.split_last() else {
        bail!("route has no legs");
    };
    if let Some(i) = init.iter().position(|s| s.to.is_none()) {
        bail!("swap at step {i} must bridge before the route continues");
    }
    Ok(steps)
}

/// Transferrers one bridge step goes through.
struct BridgeLeg {
    source: Address,
    source_is_native: bool,
    destination: Address,
    /// Token the destination transferrer pays out; [`NATIVE`] for native
    delivered: Address,
    /// Both ends are remotes, so the transfer is routed through their home
    multi_hop: bool,
}

fn home_of(chain: &Chain, bridge: &BridgeConfig) -> HomeConfig {
    bridge.home.unwrap_or(HomeConfig {
        blockchain_id: chain.blockchain_id(),
        bridge: bridge.address,
    })
}

fn bridge_leg(from: &Chain, to: &Chain, token: Address) -> eyre::Result<BridgeLeg> {
    if from.blockchain_id() == to.blockchain_id() {
        bail!("cannot bridge from {} to itself", from.name());
    }
    let (source, source_is_native) = match from.config.bridge_for(token) {
        Some(bridge) => (bridge, false),
        None if token == from.config.wrapped_native => {
            let bridge = from
                .config
                .bridge_for(NATIVE)
                .ok_or_else(|| eyre!("no native transferrer on {}", from.name()))?;
            (bridge, true)
        }
        None => bail!("no transferrer for {token} on {}", from.name()),
    };

    let home = home_of(from, source);
    let destination = to
        .config
        .bridges
        .iter()
        .find(|b| home_of(to, b) == home)
        .ok_or_else(|| {
            eyre!(
                "no transferrer on {} paired with {} on {}",
                to.name(),
                source.address,
                from.name()
            )
        })?;

    Ok(BridgeLeg {
        source: source.address,
        source_is_native,
        destination: destination.address,
        delivered: destination.token,
        multi_hop: source.home.is_some() && destination.home.is_some(),
    })
}

pub struct Planner<'a> {
    sim: &'a Simulation,
}

impl<'a> Planner<'a> {
    pub const fn new(sim: &'a Simulation) -> Self {
        Self { sim }
    }

    /// Quote every swap against the current venue state and lay out the hops.
    ///
    /// Amounts are tracked net of entry fees, messaging fees and the
    /// secondary fee of home-routed transfers.
    pub fn plan(&self, request: &PlanRequest) -> eyre::Result<Plan> {
        let steps = steps(&request.legs)?;
        let mut chain = self.sim.chain(&request.source)?;

        let mut token = if request.native {
            chain.cell.wrapped_native()
        } else if request.token_in == NATIVE {
            bail!("token_in is required for token input");
        } else {
            request.token_in
        };

        let fees = compute_fees(
            &chain.cell.fee_schedule(),
            request.third_party_fee.as_ref(),
            request.amount_in,
            steps.len(),
        )?;
        let mut amount = request.amount_in.saturating_sub(fees.total_proportional());
        let mut delivered = token;

        let extra_params = request
            .slippage_bips
            .map(|bips| {
                ConstantProductParams {
                    slippageBips: bips,
                }
                .abi_encode()
            })
            .unwrap_or_default();

        let last = steps.len() - 1;
        let mut hops = Vec::with_capacity(steps.len());
        let mut swap_gas = Vec::with_capacity(steps.len());
        for (i, step) in steps.iter().enumerate() {
            let action = step.action(i == last);
            let mut trade = Bytes::new();
            let mut gas = 0;

            if let Some(token_out) = step.swap {
                let quote = chain
                    .venue
                    .strategy()
                    .route(amount, token, token_out, &extra_params)?;
                debug!(
                    chain = %chain.name(),
                    %token, %token_out, amount_in = %amount, amount_out = %quote.amount_out,
                    "Quoted swap"
                );
                trade = quote.trade;
                gas = quote.gas_estimate;
                amount = quote.amount_out;
                token = token_out;
                delivered = if request.payable_receiver && token == chain.cell.wrapped_native() {
                    NATIVE
                } else {
                    token
                };
            }
            swap_gas.push(gas);

            let mut bridge_path = BridgePath::default();
            if let Some(to) = &step.to {
                let destination = self.sim.chain(to)?;
                let leg = bridge_leg(chain, destination, token)?;
                let fee = request.teleporter_fee;
                let secondary = if leg.multi_hop { fee } else { U256::ZERO };
                amount = fee
                    .checked_add(secondary)
                    .and_then(|total| amount.checked_sub(total))
                    .filter(|net| !net.is_zero())
                    .ok_or_else(|| eyre!("{amount} does not cover the bridge fees of step {i}"))?;

                bridge_path = BridgePath {
                    bridge_source_chain: leg.source,
                    source_bridge_is_native: leg.source_is_native,
                    bridge_destination_chain: leg.destination,
                    cell_destination_chain: if i == last {
                        Address::ZERO
                    } else {
                        destination.cell.address()
                    },
                    destination_blockchain_id: destination.blockchain_id(),
                    teleporter_fee: fee,
                    secondary_teleporter_fee: secondary,
                };
                delivered = leg.delivered;
                token = if leg.delivered == NATIVE {
                    destination.cell.wrapped_native()
                } else {
                    leg.delivered
                };
                chain = destination;
            }

            hops.push(Hop {
                action,
                required_gas_limit: 0,
                recipient_gas_limit: 0,
                trade,
                bridge_path,
            });
        }

        for (i, hop) in hops.iter_mut().enumerate() {
            if !hop.action.bridges() {
                continue;
            }
            match swap_gas.get(i + 1) {
                Some(next_swap) if i != last => {
                    hop.recipient_gas_limit = CELL_GAS + next_swap;
                    hop.required_gas_limit = hop.recipient_gas_limit + TRANSFER_GAS;
                }
                _ => hop.required_gas_limit = TRANSFER_GAS,
            }
        }

        let instructions = Instructions {
            source_id: request.source_id,
            receiver: request.receiver,
            payable_receiver: request.payable_receiver,
            rollback_receiver: request.sender,
            rollback_teleporter_fee: request.rollback_fee,
            rollback_gas_limit: TRANSFER_GAS,
            hops,
            third_party_fee: request.third_party_fee,
        };
        instructions.validate()?;

        Ok(Plan {
            instructions,
            fees,
            destination: chain.name().to_string(),
            token_out: delivered,
            amount_out: amount,
        })
    }
}
