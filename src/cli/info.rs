use anyhow::Result;

use super::context::CliContext;

pub async fn cmd_info(ctx: &CliContext) -> Result<()> {
    println!("Trolley");
    println!("=======");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!("Build Date: {}", env!("TROLLEY_BUILD_DATE", "unknown"));
    println!("Git Commit: {}", env!("TROLLEY_GIT_HASH", "unknown"));
    println!();

    println!("Configuration:");
    match ctx.policy_path() {
        Some(path) if path.exists() => println!("- Policy File: {}", path.display()),
        Some(path) => println!("- Policy File: {} (absent)", path.display()),
        None => println!("- Policy File: (none)"),
    }
    println!("- Policy Revision: {}", ctx.snapshot().rev);

    println!("- Profiles: {}", ctx.registry().len());
    for id in ctx.registry().ids() {
        println!("  - {id}");
    }

    match ctx.store() {
        Ok(store) => println!("- Credential File: {}", store.path().display()),
        Err(err) => println!("- Credential File: unavailable ({err})"),
    }

    Ok(())
}
