//! Replays a peg-in, waits out maturity, then pegs part of it back out.

use anyhow::{Context, Result};
use bth_crypto_commitment::ViewKey;
use rand::thread_rng;
use tracing::info;

use crate::{
    address::{Address, Script},
    builder::build_peg_in,
    config::LedgerConfig,
    delta::ExtensionBlockDelta,
    ExtensionLedger,
};

/// Run the simulate command
pub fn run(mut config: LedgerConfig, pegin: u64, pegout: u64, fee: u64, persist: bool) -> Result<()> {
    if !persist {
        config.data_dir = None;
    }
    let mut ledger = ExtensionLedger::open_configured(config).context("Failed to open ledger")?;
    let mut rng = thread_rng();
    let wallet = ViewKey::random(&mut rng);

    let peg_in = build_peg_in(&wallet.public(), pegin, &mut rng)?;
    let included = ledger.next_context();
    ledger.apply_block(
        &ExtensionBlockDelta::new(vec![peg_in.transaction], vec![peg_in.record]),
        &included,
    )?;
    let included = included.height;
    println!(
        "Peg-in of {pegin} included at height {included}; spendable outputs: {}",
        ledger.spendable_outputs(Some(&wallet.public())).len()
    );

    let maturity = included + ledger.config().pegin_maturity;
    while ledger.height() < maturity {
        let next = ledger.next_context();
        ledger.apply_block(&ExtensionBlockDelta::empty(), &next)?;
    }
    let spendable = ledger.spendable_outputs(Some(&wallet.public()));
    println!(
        "Height {}: {} spendable output(s) worth {}",
        ledger.height(),
        spendable.len(),
        spendable.balance(&wallet)
    );

    let destination = Address::Transparent(Script::new([0x00, 0x14].repeat(11)));
    let peg_out = ledger.build_peg_out(&wallet, &[], &destination, pegout, fee, &mut rng)?;
    let applied = ledger.apply_block(
        &ExtensionBlockDelta::new(vec![peg_out.transaction().clone()], vec![]),
        &ledger.next_context(),
    )?;
    for base_output in &applied.pegouts {
        println!(
            "Base ledger pays {} to {}",
            base_output.amount, base_output.script
        );
    }

    let spendable = ledger.spendable_outputs(Some(&wallet.public()));
    println!(
        "Height {}: {} spendable output(s) worth {}",
        ledger.height(),
        spendable.len(),
        spendable.balance(&wallet)
    );
    for output in &spendable {
        println!("  {} (created at {})", output.commitment, output.creation_height);
    }

    ledger.validate_state()?;
    info!(height = ledger.height(), "Simulation finished with a consistent ledger");
    Ok(())
}
