//! Native currency in and out of the cells.


use alloy_primitives::U256;
use bridge::Delivery;
use cell::Outcome;
use cellsim::Relayed;
use config::network::local::*;
use ledger::NATIVE;
use setup::{local, outcomes, request, settle, units};

#[tokio::test]
async fn test_native_home_to_remote() {
    let (sim, mut relayer) = local();
    let c_chain = sim.chain("c-chain").unwrap();
    let alice_before = c_chain.balance(ALICE, NATIVE);
    let escrow_before = c_chain.balance(C_NATIVE_HOME, NATIVE);

    let mut request = request("c-chain", NATIVE, units(10), &["bridge:alpha"]);
    request.native = true;
    let submitted = sim.submit(&request).expect("Failed to submit");
    assert!(matches!(
        submitted.outcome,
        Outcome::Bridged { receiver, amount, .. } if receiver == BOB && amount == units(10)
    ));
    assert_eq!(submitted.plan.token_out, A_CNATIVE);

    let relayed = settle(&mut relayer).await;
    assert!(matches!(
        relayed[..],
        [Relayed { delivery: Delivery::Transferred { recipient, token, amount }, .. }]
            if recipient == BOB && token == A_CNATIVE && amount == units(10)
    ));

    assert_eq!(c_chain.balance(ALICE, NATIVE), alice_before - units(10));
    assert_eq!(
        c_chain.balance(C_NATIVE_HOME, NATIVE),
        escrow_before + units(10)
    );
    // the native sent is unwrapped again before it reaches the transferrer
    assert_eq!(c_chain.balance(C_CELL, C_WNATIVE), U256::ZERO);
    assert_eq!(sim.chain("alpha").unwrap().balance(BOB, A_CNATIVE), units(10));
}

#[tokio::test]
async fn test_swap_to_payable_receiver() {
    let (sim, mut relayer) = local();
    let c_chain = sim.chain("c-chain").unwrap();
    let mut request = request("c-chain", C_USDC, units(200), &[&format!("swap:{C_WNATIVE}")]);
    request.payable_receiver = true;

    let submitted = sim.submit(&request).expect("Failed to submit");
    assert_eq!(submitted.plan.token_out, NATIVE);
    assert_eq!(
        submitted.outcome,
        Outcome::Delivered {
            receiver: BOB,
            token: C_WNATIVE,
            amount: submitted.plan.amount_out,
            native: true,
        }
    );
    assert_eq!(c_chain.balance(BOB, NATIVE), submitted.plan.amount_out);
    assert_eq!(c_chain.balance(BOB, C_WNATIVE), U256::ZERO);
    assert!(settle(&mut relayer).await.is_empty());
}

#[tokio::test]
async fn test_bridged_native_swapped_on_home() {
    let (sim, mut relayer) = local();

    // alice first moves native currency to her own account on alpha
    let mut funding = request("c-chain", NATIVE, units(10), &["bridge:alpha"]);
    funding.native = true;
    funding.receiver = ALICE;
    sim.submit(&funding).expect("Failed to fund alpha");
    settle(&mut relayer).await;
    let alpha = sim.chain("alpha").unwrap();
    assert_eq!(alpha.balance(ALICE, A_CNATIVE), units(10));

    let request = request(
        "alpha",
        A_CNATIVE,
        units(10),
        &["bridge:c-chain", &format!("swap:{C_USDC}")],
    );
    let submitted = sim.submit(&request).expect("Failed to submit");
    // two hops pay the 10 bips protocol fee
    let fee = U256::from(10_000u64);
    assert!(matches!(
        submitted.outcome,
        Outcome::Forwarded { cell, amount, .. } if cell == C_CELL && amount == units(10) - fee
    ));

    let relayed = settle(&mut relayer).await;
    assert_eq!(
        outcomes(&relayed),
        vec![Outcome::Delivered {
            receiver: BOB,
            token: C_USDC,
            amount: submitted.plan.amount_out,
            native: false,
        }]
    );

    let c_chain = sim.chain("c-chain").unwrap();
    assert_eq!(c_chain.balance(BOB, C_USDC), submitted.plan.amount_out);
    assert_eq!(alpha.balance(FEE_COLLECTOR, A_CNATIVE), fee);
    // only the collected fee is still bridged out
    assert_eq!(alpha.ledger.total_supply(A_CNATIVE), fee);
    assert_eq!(c_chain.balance(C_NATIVE_HOME, NATIVE), fee);
}
