//! CLI commands: `metergate usage` and `metergate recent`
//!
//! Open the configured store directly and print a user's usage, either as
//! a table or as JSON for scripting.

use anyhow::Context;
use metergate_ledger::{UsageAggregate, UsageEvent};

use crate::server::{build_ledger, load_config};

/// Run the usage subcommand.
pub async fn run_totals(user_id: &str, json: bool) -> anyhow::Result<()> {
    let config = load_config().context("Failed to load configuration")?;
    let ledger = build_ledger(&config).await?;
    let usage = ledger.query_usage(user_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&usage)?);
    } else {
        print_totals(user_id, &usage);
    }
    Ok(())
}

/// Run the recent subcommand.
pub async fn run_recent(user_id: &str, limit: i64, json: bool) -> anyhow::Result<()> {
    let config = load_config().context("Failed to load configuration")?;
    let ledger = build_ledger(&config).await?;
    let events = ledger.recent_usage(user_id, limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&events)?);
    } else {
        print_recent(user_id, &events);
    }
    Ok(())
}

fn print_totals(user_id: &str, usage: &[UsageAggregate]) {
    println!();
    println!("  Usage for {user_id}");
    println!("  {}", "-".repeat(64));
    println!(
        "  {:<24} {:>12} {:>12} {:>10}",
        "Model", "Input", "Output", "Requests"
    );
    println!("  {}", "-".repeat(64));

    if usage.is_empty() {
        println!("  (no usage recorded)");
    } else {
        for row in usage {
            println!(
                "  {:<24} {:>12} {:>12} {:>10}",
                row.model_name, row.input_tokens, row.output_tokens, row.request_count
            );
        }
    }

    // Per-model sums each fit in i64; their total may not.
    let input: i128 = usage.iter().map(|r| i128::from(r.input_tokens)).sum();
    let output: i128 = usage.iter().map(|r| i128::from(r.output_tokens)).sum();
    println!("  {}", "-".repeat(64));
    println!("  Total Tokens: {}  (in {input} / out {output})", input + output);
    println!();
}

fn print_recent(user_id: &str, events: &[UsageEvent]) {
    println!();
    println!("  Recent usage for {user_id}");
    println!("  {}", "-".repeat(72));
    println!(
        "  {:<28} {:<20} {:>10} {:>10}",
        "Timestamp", "Model", "Input", "Output"
    );
    println!("  {}", "-".repeat(72));

    if events.is_empty() {
        println!("  (no usage recorded)");
    }
    for event in events {
        println!(
            "  {:<28} {:<20} {:>10} {:>10}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            event.model_name,
            event.input_tokens,
            event.output_tokens
        );
    }
    println!();
}
