use colored::Colorize;
use serde_json::json;

use tollgate_sdk::{AccountId, EvmAddress, ProofFilter, Tollgate};
use tollgate_types::AddressSeed;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Demo(args) => cmd_demo(args, &cli.format),
        Command::Derive(args) => cmd_derive(args, &cli.format),
    }
}

fn cmd_demo(args: DemoArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let tg = Tollgate::new();
    let provider = AccountId::ephemeral();
    let agent = AccountId::ephemeral();

    let gateway = tg.register_gateway(
        &provider,
        &args.slug,
        args.price,
        EvmAddress::new([0xaa; 20]),
    )?;
    let (_sub, mut stream) = tg.subscribe_settlements(ProofFilter::default());

    let opened = tg.open_session(
        &agent,
        &args.slug,
        args.deposit,
        args.duration,
        None,
        EvmAddress::new([0xbb; 20]),
    )?;

    for _ in 0..args.requests {
        tg.record_usage(&provider, &opened.address, args.amount)?;
    }

    let proof = tg.settle_session(&provider, &opened.address)?;
    let delivered = stream.try_recv().is_ok();
    let report = tg.audit()?;

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "gateway": gateway.to_hex(),
                    "session": opened.address.to_hex(),
                    "nonce": opened.nonce,
                    "proof": proof,
                    "proof_id": proof.id().to_hex(),
                    "delivered": delivered,
                    "audit_clean": report.is_clean(),
                }))?
            );
        }
        OutputFormat::Text => {
            println!(
                "{} Gateway {} registered at {}",
                "✓".green().bold(),
                args.slug.yellow(),
                gateway.to_string().cyan()
            );
            println!(
                "{} Session {} opened (deposit {}, {}s, nonce {})",
                "✓".green().bold(),
                opened.address.to_string().cyan(),
                args.deposit.to_string().bold(),
                args.duration,
                opened.nonce
            );
            println!(
                "{} Recorded {} × {} usage",
                "✓".green().bold(),
                args.requests,
                args.amount
            );
            println!("{} Session settled", "✓".green().bold());
            println!("  Proof: {}", proof.id().to_string().yellow());
            println!("  used_amount: {}", proof.used_amount.to_string().bold());
            println!("  agent_evm: {}", proof.agent_evm_address.to_string().blue());
            println!(
                "  provider_evm: {}",
                proof.provider_evm_address.to_string().blue()
            );
            println!(
                "  delivered to subscriber: {}",
                if delivered { "yes".green() } else { "no".red() }
            );
            println!(
                "{} Audit: {}",
                "✓".green().bold(),
                if report.is_clean() {
                    "clean".green()
                } else {
                    "violations found".red()
                }
            );
        }
    }
    Ok(())
}

fn cmd_derive(args: DeriveArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let (address, bump) = AddressSeed::Gateway {
        slug: args.slug.clone(),
    }
    .derive()?;

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "slug": args.slug,
                    "address": address.to_hex(),
                    "bump": bump,
                }))?
            );
        }
        OutputFormat::Text => {
            println!("Gateway {}", args.slug.yellow());
            println!("  Address: {}", address.to_hex().cyan());
            println!("  Bump: {}", bump.to_string().bold());
        }
    }
    Ok(())
}
