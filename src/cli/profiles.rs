use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use serde_json::json;

use trolley_core_types::SiteId;
use trolley_site_profiles::{SiteProfile, TargetSlot};

use super::context::CliContext;

const SLOTS: [TargetSlot; 16] = [
    TargetSlot::SearchBox,
    TargetSlot::SearchResults,
    TargetSlot::AddToCart,
    TargetSlot::CartBadge,
    TargetSlot::CartItemNames,
    TargetSlot::CartItemPrices,
    TargetSlot::CartItemQuantities,
    TargetSlot::RemoveItem,
    TargetSlot::RemoveConfirm,
    TargetSlot::IdentifierField,
    TargetSlot::IdentifierSubmit,
    TargetSlot::OtpField,
    TargetSlot::OtpSubmit,
    TargetSlot::SignedInMarker,
    TargetSlot::OtpChallengeMarker,
    TargetSlot::DialogConfirm,
];

#[derive(Args, Clone, Debug)]
pub struct ProfilesArgs {
    #[command(subcommand)]
    pub command: ProfilesCommand,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ProfilesCommand {
    /// List every profile the registry knows
    List(ProfilesListArgs),

    /// Show one profile's targets and barrier rules
    Show(ProfilesShowArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ProfilesListArgs {
    /// Output JSON instead of a human summary
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone, Debug)]
pub struct ProfilesShowArgs {
    /// Profile id, e.g. demo
    pub site: String,

    /// Output JSON instead of a human summary
    #[arg(long)]
    pub json: bool,
}

pub async fn cmd_profiles(args: ProfilesArgs, ctx: &CliContext) -> Result<()> {
    match args.command {
        ProfilesCommand::List(list) => cmd_list(list, ctx),
        ProfilesCommand::Show(show) => cmd_show(show, ctx),
    }
}

fn cmd_list(args: ProfilesListArgs, ctx: &CliContext) -> Result<()> {
    let registry = ctx.registry();

    if args.json {
        let profiles: Vec<&SiteProfile> = registry
            .ids()
            .iter()
            .filter_map(|id| registry.get(id))
            .collect();
        println!("{}", serde_json::to_string_pretty(&json!({ "profiles": profiles }))?);
        return Ok(());
    }

    println!("Profiles: {}", registry.len());
    for id in registry.ids() {
        let Some(profile) = registry.get(&id) else {
            continue;
        };
        println!(
            "- {} ({}) → {} targets={}/{} barriers={}",
            profile.id,
            profile.display_name,
            profile.base_url,
            configured_slots(profile),
            SLOTS.len(),
            profile.barriers.len()
        );
    }
    Ok(())
}

fn cmd_show(args: ProfilesShowArgs, ctx: &CliContext) -> Result<()> {
    let site = SiteId::new(args.site.as_str());
    let Some(profile) = ctx.registry().get(&site) else {
        bail!("no profile named '{}'", args.site);
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(profile)?);
        return Ok(());
    }

    println!("Profile: {} ({})", profile.id, profile.display_name);
    println!("Base URL: {}", profile.base_url);
    if let Some(login) = &profile.login_url {
        println!("Login URL: {login}");
    }
    println!("Cart URL: {}", profile.cart_url);
    println!();
    println!("Targets:");
    for slot in SLOTS {
        match profile.target(slot) {
            Some(spec) => {
                let strategies: Vec<String> = spec
                    .strategies()
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                println!("- {} → {}", slot, strategies.join(" | "));
            }
            None => println!("- {slot} → (not configured)"),
        }
    }
    println!();
    println!("Barriers:");
    for rule in &profile.barriers {
        println!(
            "- {}{} → phrases: {}",
            rule.reason,
            if rule.fatal { " (fatal)" } else { "" },
            rule.phrases.join(", ")
        );
    }
    if !profile.empty_cart_markers.is_empty() {
        println!();
        println!("Empty-cart markers: {}", profile.empty_cart_markers.join(", "));
    }
    Ok(())
}

fn configured_slots(profile: &SiteProfile) -> usize {
    SLOTS
        .iter()
        .filter(|slot| profile.target(**slot).is_some())
        .count()
}
