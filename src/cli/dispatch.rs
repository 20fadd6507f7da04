use anyhow::Result;

use super::commands::Commands;
use super::context::CliContext;
use super::credentials::cmd_credentials;
use super::env::CliArgs;
use super::exercise::cmd_exercise;
use super::info::cmd_info;
use super::policy::cmd_policy;
use super::profiles::cmd_profiles;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Exercise(args) => cmd_exercise(args, ctx).await,
        Commands::Profiles(args) => cmd_profiles(args, ctx).await,
        Commands::Policy(args) => cmd_policy(args, ctx).await,
        Commands::Credentials(args) => cmd_credentials(args, ctx).await,
        Commands::Info => cmd_info(ctx).await,
    }
}
