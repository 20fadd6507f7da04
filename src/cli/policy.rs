use anyhow::Result;
use clap::Args;
use serde_json::json;

use trolley_policy::PolicySource;

use super::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct PolicyArgs {
    /// Output JSON instead of a human summary
    #[arg(long)]
    pub json: bool,
}

pub async fn cmd_policy(args: PolicyArgs, ctx: &CliContext) -> Result<()> {
    let snapshot = ctx.snapshot();

    if args.json {
        let payload = json!({
            "policy": snapshot,
            "policy_file": ctx.policy_path().map(|p| p.display().to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!("Policy Revision: {}", snapshot.rev);
    match ctx.policy_path() {
        Some(path) if path.exists() => println!("Policy File: {}", path.display()),
        Some(path) => println!("Policy File: {} (absent)", path.display()),
        None => println!("Policy File: (none)"),
    }
    println!();
    println!(
        "Exec → max_attempts={}, backoff_ms={}, step_timeout_ms={}, action_timeout_ms={}, settle_ms={}",
        snapshot.exec.max_attempts,
        snapshot.exec.backoff_ms,
        snapshot.exec.step_timeout_ms,
        snapshot.exec.action_timeout_ms,
        snapshot.exec.settle_ms
    );
    println!(
        "Verify → verify_timeout_ms={}, poll_interval_ms={}, confirm_window_ms={}",
        snapshot.verify.verify_timeout_ms,
        snapshot.verify.poll_interval_ms,
        snapshot.verify.confirm_window_ms
    );
    println!(
        "Queue → capacity={}, event_buffer={}",
        snapshot.queue.capacity, snapshot.queue.event_buffer
    );

    let mut from_file = 0usize;
    let mut from_env = 0usize;
    for entry in snapshot.provenance.values() {
        match entry.source {
            PolicySource::File => from_file += 1,
            PolicySource::Env => from_env += 1,
            PolicySource::Builtin => {}
        }
    }
    println!("Overrides → file={from_file}, env={from_env}");

    Ok(())
}
