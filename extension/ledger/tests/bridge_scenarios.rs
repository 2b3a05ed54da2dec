// Copyright (c) 2024 Botho Foundation
//
//! Bridge Scenario Integration Tests
//!
//! End-to-end flows through the extension ledger:
//! - Peg-in followed by a long run of empty blocks
//! - Confidential transfer with a fee
//! - The peg-in maturity boundary
//! - Peg-out to a transparent destination
//! - Cut-through of outputs created and spent in one block

mod common;

use assert_matches::assert_matches;
use bth_extension_ledger::{
    builder::{SpendableInput, TransactionBuilder},
    BaseLedgerOutput, ExtensionBlockDelta, LedgerError, Script,
};

use common::{pegout_destination, wallet, TestChain, PEGIN_MATURITY, PEGOUT_SCRIPT};

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_pegin_survives_long_chain() {
    let mut chain = TestChain::new(1);
    let alice = wallet("alice");

    // Coinbase funds arrive through the bridge at the first block.
    chain.peg_in(&alice, 50);
    chain.advance_to(100);

    let applied = chain.peg_in(&alice, 10);
    assert_eq!(applied.height, 101);
    assert_eq!(applied.scheduled.len(), 1);

    chain.advance_to(101 + 700);

    assert_eq!(chain.height(), 801);
    assert_eq!(chain.spendable_values(&alice), vec![10, 50]);
    let snapshot = chain.ledger.snapshot();
    assert_eq!(snapshot.outputs().len(), 2);
    assert!(snapshot.maturity().is_empty());
    assert_eq!(snapshot.supply().supply(), Some(60));
    chain.ledger.validate_state().unwrap();
}

#[test]
fn test_transfer_pays_recipient_and_fee() {
    let mut chain = TestChain::new(2);
    let alice = wallet("alice");
    let bob = wallet("bob");

    chain.peg_in(&alice, 50);
    chain.peg_in(&alice, 10);
    chain.mine_empty(PEGIN_MATURITY);
    let original = chain.balance(&alice);
    assert_eq!(original, 60);

    let applied = chain.transfer(&alice, &bob, 5, 1);
    assert_eq!(applied.created.len(), 2);
    chain.mine_empty(1);

    let sender = chain.balance(&alice);
    assert!(sender < original - 5);
    assert_eq!(sender, 54);
    assert_eq!(chain.spendable_values(&bob), vec![5]);
    assert_eq!(chain.ledger.snapshot().supply().fees, 1);
    chain.ledger.validate_state().unwrap();
}

#[test]
fn test_pegin_maturity_boundary() {
    let mut chain = TestChain::new(3);
    let alice = wallet("alice");
    chain.mine_empty(5);

    let included = chain.peg_in(&alice, 50).height;
    chain.mine_empty(1);
    assert!(chain.spendable_values(&alice).is_empty());
    assert_eq!(chain.pending_balance(&alice), 50);

    chain.advance_to(included + PEGIN_MATURITY - 1);
    assert!(chain.spendable_values(&alice).is_empty());

    let applied = chain.mine(&ExtensionBlockDelta::empty());
    assert_eq!(applied.height, included + PEGIN_MATURITY);
    assert_eq!(applied.matured.len(), 1);
    assert_eq!(chain.spendable_values(&alice), vec![50]);
    assert_eq!(chain.pending_balance(&alice), 0);
}

#[test]
fn test_immature_pegin_cannot_be_spent() {
    let mut chain = TestChain::new(4);
    let alice = wallet("alice");
    let bob = wallet("bob");

    let pegin = chain.peg_in(&alice, 50);
    let pending = &pegin.scheduled[0];
    let opening = pending.rewind(&alice).unwrap();

    let spend = TransactionBuilder::new()
        .input(SpendableInput {
            commitment: pending.commitment,
            opening,
        })
        .output(bob.public(), 50)
        .build(&mut chain.rng)
        .unwrap();
    let before = chain.ledger.snapshot().state_digest();

    let err = chain
        .try_mine(&ExtensionBlockDelta::new(vec![spend.transaction], vec![]))
        .unwrap_err();
    assert_matches!(err, LedgerError::ImmatureSpend { .. });
    assert_eq!(chain.ledger.snapshot().state_digest(), before);
}

#[test]
fn test_pegout_creates_base_output() {
    let mut chain = TestChain::new(5);
    let alice = wallet("alice");

    chain.peg_in(&alice, 50);
    chain.mine_empty(PEGIN_MATURITY);
    let funding: Vec<_> = chain
        .ledger
        .spendable_outputs(Some(&alice.public()))
        .commitments();
    assert_eq!(funding.len(), 1);

    let applied = chain.peg_out(&alice, 2, 0);

    assert_eq!(
        applied.pegouts,
        vec![BaseLedgerOutput {
            script: Script::new(PEGOUT_SCRIPT.to_vec()),
            amount: 2,
        }]
    );
    assert!(!chain.ledger.snapshot().outputs().is_live(&funding[0]));
    assert_eq!(chain.spendable_values(&alice), vec![48]);
    assert_eq!(chain.ledger.snapshot().supply().pegged_out, 2);
    chain.ledger.validate_state().unwrap();
}

#[test]
fn test_pegout_without_funds_is_rejected() {
    let mut chain = TestChain::new(6);
    let alice = wallet("alice");
    chain.peg_in(&alice, 1);

    let err = chain
        .ledger
        .build_peg_out(&alice, &[], &pegout_destination(), 2, 0, &mut chain.rng)
        .unwrap_err();
    assert_matches!(err, LedgerError::InsufficientFunds { .. });
}

#[test]
fn test_cut_through_within_block() {
    let mut chain = TestChain::new(7);
    let alice = wallet("alice");
    let bob = wallet("bob");
    let carol = wallet("carol");

    chain.peg_in(&alice, 20);
    chain.mine_empty(PEGIN_MATURITY);

    let first = chain
        .ledger
        .build_transfer(
            &alice,
            &bob.public().into(),
            20,
            0,
            &mut chain.rng,
        )
        .unwrap();
    let intermediate = first.transaction.outputs[0].commitment;
    let second = TransactionBuilder::new()
        .input(SpendableInput {
            commitment: intermediate,
            opening: first.openings[0].clone(),
        })
        .output(carol.public(), 19)
        .fee(1)
        .build(&mut chain.rng)
        .unwrap();

    let applied = chain.mine_transactions(vec![first.transaction, second.transaction]);

    assert_eq!(applied.cut_through, vec![intermediate]);
    let snapshot = chain.ledger.snapshot();
    assert!(!snapshot.outputs().is_live(&intermediate));
    assert!(chain.spendable_values(&bob).is_empty());
    assert_eq!(chain.spendable_values(&carol), vec![19]);
    assert_eq!(chain.balance(&alice), 0);
    chain.ledger.validate_state().unwrap();
}
