use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trolley_policy::load_snapshot;
use trolley_site_profiles::ProfileRegistry;

use super::context::CliContext;
use super::env::CliArgs;

pub fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("invalid log level")?
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// `--config` wins; otherwise `./trolley.yaml`, then the per-user config
/// directory. The file may be absent: builtin defaults and the
/// `TROLLEY_POLICY__` environment overlay still apply.
pub fn resolve_policy_path(cli_path: Option<&PathBuf>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.clone());
    }
    let local = PathBuf::from("trolley.yaml");
    if local.exists() {
        return Some(local);
    }
    dirs::config_dir().map(|mut path| {
        path.push("trolley");
        path.push("policy.yaml");
        path
    })
}

fn default_profiles_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|mut path| {
        path.push("trolley");
        path.push("profiles");
        path
    })
}

/// Policy snapshot plus profile registry, resolved once per invocation.
pub fn load_stack(cli: &CliArgs) -> Result<CliContext> {
    let policy_path = resolve_policy_path(cli.config.as_ref());
    let snapshot = load_snapshot(policy_path.as_deref()).context("failed to load policy")?;
    debug!(rev = snapshot.rev, "policy loaded");

    let mut registry = ProfileRegistry::builtin();
    match &cli.profiles {
        Some(dir) => {
            // An explicitly named directory must exist and parse.
            let added = registry
                .merge_dir(dir)
                .with_context(|| format!("failed to load profiles from {}", dir.display()))?;
            info!(added, dir = %dir.display(), "merged profile directory");
        }
        None => {
            if let Some(dir) = default_profiles_dir() {
                if dir.is_dir() {
                    let added = registry.merge_dir(&dir).with_context(|| {
                        format!("failed to load profiles from {}", dir.display())
                    })?;
                    info!(added, dir = %dir.display(), "merged profile directory");
                }
            }
        }
    }

    Ok(CliContext::new(
        snapshot,
        policy_path,
        registry,
        cli.credentials.clone(),
    ))
}
