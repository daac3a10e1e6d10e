//! A swap failing on the first chain after the origin refunds the sender.


use alloy_primitives::{Address, U256};
use bridge::{Delivery, MessageKind, ReceiveContext};
use cell::{payload, CellEvent, Outcome, StrandReason};
use config::network::local::*;
use setup::{drain_pool, local, outcomes, request, settle, units};

#[tokio::test]
async fn test_first_remote_swap_failure_rolls_back() {
    let (sim, mut relayer) = local();
    let rollback_fee = U256::from(5_000u64);
    let mut request = request(
        "c-chain",
        C_USDC,
        units(500),
        &["bridge:alpha", &format!("swap:{A_TOKEN}")],
    );
    request.rollback_fee = rollback_fee;

    let submitted = sim.submit(&request).expect("Failed to submit");
    let Outcome::Forwarded { amount, .. } = submitted.outcome else {
        panic!("expected a forwarded outcome, got {:?}", submitted.outcome);
    };
    // two hops pay the 10 bips protocol fee
    assert_eq!(amount, units(500) - U256::from(500_000u64));

    drain_pool(&sim, "alpha", A_POOL, A_TOKEN, U256::from(1u64));
    let relayed = settle(&mut relayer).await;
    assert_eq!(relayed.len(), 2);

    let outcomes = outcomes(&relayed);
    assert!(matches!(
        outcomes[..],
        [Outcome::RolledBack { receiver, amount: refunded, .. }]
            if receiver == ALICE && refunded == amount - rollback_fee
    ));
    assert_eq!(
        relayed[1].delivery,
        Delivery::Transferred {
            recipient: ALICE,
            token: C_USDC,
            amount: amount - rollback_fee,
        }
    );

    let c_chain = sim.chain("c-chain").unwrap();
    assert_eq!(
        c_chain.balance(ALICE, C_USDC),
        units(10_000) - U256::from(500_000u64) - rollback_fee
    );
    let alpha = sim.chain("alpha").unwrap();
    assert_eq!(alpha.balance(A_CELL, A_USDC), U256::ZERO);
    assert_eq!(alpha.balance(BOB, A_TOKEN), U256::ZERO);
    assert_eq!(alpha.balance(RELAYER, A_USDC), rollback_fee);

    let events = sim.take_events();
    assert!(events
        .iter()
        .any(|(chain, event)| chain == "alpha" && matches!(event, CellEvent::SwapFailed { hop: 0, .. })));
    assert!(events
        .iter()
        .any(|(chain, event)| chain == "alpha" && matches!(event, CellEvent::RolledBack { .. })));
}

#[tokio::test]
async fn test_rollback_fee_above_amount_strands() {
    let (sim, mut relayer) = local();
    let mut request = request(
        "c-chain",
        C_USDC,
        units(500),
        &["bridge:alpha", &format!("swap:{A_TOKEN}")],
    );
    request.rollback_fee = units(1_000);

    let submitted = sim.submit(&request).expect("Failed to submit");
    let Outcome::Forwarded { amount, .. } = submitted.outcome else {
        panic!("expected a forwarded outcome, got {:?}", submitted.outcome);
    };

    drain_pool(&sim, "alpha", A_POOL, A_TOKEN, U256::from(1u64));
    let relayed = settle(&mut relayer).await;
    assert_eq!(relayed.len(), 1);
    assert!(matches!(
        &outcomes(&relayed)[..],
        [Outcome::Stranded { token, amount: kept, reason: StrandReason::RollbackFeeTooHigh { .. } }]
            if *token == A_USDC && *kept == amount
    ));

    // the owner can recover what the cell kept
    let alpha = sim.chain("alpha").unwrap();
    assert_eq!(alpha.balance(A_CELL, A_USDC), amount);
    alpha
        .cell
        .recover_erc20(OWNER, A_USDC, ALICE, amount)
        .expect("Failed to recover");
    assert_eq!(alpha.balance(ALICE, A_USDC), amount);
    assert!(alpha
        .cell
        .recover_erc20(BOB, A_USDC, BOB, U256::from(1u64))
        .is_err());
}

#[tokio::test]
async fn test_forged_origin_strands() {
    let (sim, mut relayer) = local();
    let request = request(
        "c-chain",
        C_USDC,
        units(500),
        &["bridge:alpha", &format!("swap:{A_TOKEN}")],
    );
    sim.submit(&request).expect("Failed to submit");

    drain_pool(&sim, "alpha", A_POOL, A_TOKEN, U256::from(1u64));
    let relayed = settle(&mut relayer).await;

    // replay the genuine payload as if it came from another chain
    let MessageKind::Call { payload: data, .. } = &relayed[0].message.kind else {
        panic!("expected a call message");
    };
    let decoded = payload::decode(data).expect("Failed to decode payload");
    assert_eq!(decoded.hop, 0);
    assert_eq!(decoded.source_blockchain_id, C_CHAIN);
    assert_eq!(decoded.rollback_destination, C_USDC_HOME);

    let alpha = sim.chain("alpha").unwrap();
    let amount = units(10);
    alpha
        .ledger
        .mint(A_USDC, A_USDC_REMOTE, amount)
        .expect("Failed to mint");
    let outcome = alpha
        .cell
        .receive_tokens(
            ReceiveContext {
                bridge: A_USDC_REMOTE,
                source_blockchain_id: BETA,
                origin_transferrer: B_USDC_REMOTE,
                origin_sender: Address::repeat_byte(0x66),
            },
            A_USDC,
            amount,
            data,
        )
        .expect("Failed to receive");

    assert!(matches!(
        outcome,
        Outcome::Stranded { reason: StrandReason::ForgedOrigin { .. }, amount: kept, .. } if kept == amount
    ));
    assert_eq!(alpha.balance(A_CELL, A_USDC), amount);
}
