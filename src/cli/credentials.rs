use anyhow::{bail, Result};
use chrono::Utc;
use clap::{Args, Subcommand};

use trolley_core_types::SiteId;
use trolley_credential_store::{CredentialStore, LoginKind, SavedIdentifier};

use super::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct CredentialsArgs {
    #[command(subcommand)]
    pub command: CredentialsCommand,
}

#[derive(Subcommand, Clone, Debug)]
pub enum CredentialsCommand {
    /// Save the login identifier for a site
    Save(CredentialsSaveArgs),

    /// Show what is saved for a site
    Show(CredentialsShowArgs),

    /// Forget a site's saved identifier
    Forget(CredentialsForgetArgs),

    /// List the sites with a saved identifier
    List,
}

#[derive(Args, Clone, Debug)]
pub struct CredentialsSaveArgs {
    /// Site id the identifier belongs to
    pub site: String,

    /// Email or username typed into the identifier field
    pub username: String,

    /// Mark the site as password-based instead of OTP. Only the identifier
    /// is stored either way; Trolley never records a password you type.
    #[arg(long)]
    pub password: bool,
}

#[derive(Args, Clone, Debug)]
pub struct CredentialsShowArgs {
    /// Site id to look up
    pub site: String,
}

#[derive(Args, Clone, Debug)]
pub struct CredentialsForgetArgs {
    /// Site id to forget
    pub site: String,
}

pub async fn cmd_credentials(args: CredentialsArgs, ctx: &CliContext) -> Result<()> {
    let store = ctx.store()?;

    match args.command {
        CredentialsCommand::Save(save) => {
            let identifier = if save.password {
                SavedIdentifier {
                    username: save.username.clone(),
                    kind: LoginKind::Password,
                    saved_at: Utc::now(),
                }
            } else {
                SavedIdentifier::otp(save.username.clone())
            };
            let site = SiteId::new(save.site.as_str());
            store.save(&site, identifier).await?;
            println!(
                "Saved '{}' for '{}' ({})",
                save.username,
                save.site,
                if save.password { "password" } else { "otp" }
            );
        }
        CredentialsCommand::Show(show) => {
            let site = SiteId::new(show.site.as_str());
            match store.get(&site).await? {
                Some(identifier) => {
                    println!("Site: {}", show.site);
                    println!("Username: {}", identifier.username);
                    println!(
                        "Login: {}",
                        match identifier.kind {
                            LoginKind::Otp => "one-time code",
                            LoginKind::Password => "password",
                        }
                    );
                    println!("Saved: {}", identifier.saved_at.to_rfc3339());
                }
                None => bail!("no identifier saved for '{}'", show.site),
            }
        }
        CredentialsCommand::Forget(forget) => {
            let site = SiteId::new(forget.site.as_str());
            store.forget(&site).await?;
            println!("Forgot '{}'", forget.site);
        }
        CredentialsCommand::List => {
            let sites = store.sites().await?;
            if sites.is_empty() {
                println!("No saved identifiers ({})", store.path().display());
            } else {
                for site in sites {
                    println!("{site}");
                }
            }
        }
    }

    Ok(())
}
