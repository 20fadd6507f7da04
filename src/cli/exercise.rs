//! A scripted end-to-end shopping trip.
//!
//! Runs the whole action vocabulary against the in-memory scripted driver
//! and streams session events while it goes: search, two adds, a confirmed
//! removal, the OTP login walk and a dialog dismissal. No browser and no
//! network; what it proves is the wiring from CLI flag down to verified
//! outcome, against the same read-back rules real sessions run under.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::warn;

use trolley_core_types::{ActionKind, ActionOutcome, ActionRequest, SiteId};
use trolley_credential_store::{CredentialStore, SavedIdentifier};
use trolley_driver_port::{Driver, ScriptedDriver, ScriptedEffect, ScriptedElement, ScriptedPage};
use trolley_session::{EventDetail, SessionEvent, SessionHandle, SessionSupervisor};

use super::context::CliContext;

const HOME: &str = "https://shop.example/";
const CART: &str = "https://shop.example/cart";
const LOGIN: &str = "https://shop.example/login";

const DEMO_EMAIL: &str = "demo@example.com";

#[derive(Args, Clone, Debug)]
pub struct ExerciseArgs {
    /// Profile to run against; the builtin demo world matches `demo`
    #[arg(long, default_value = "demo")]
    pub site: String,

    /// YAML list of scripted pages replacing the builtin demo world
    #[arg(long, value_name = "FILE")]
    pub world: Option<PathBuf>,

    /// Query typed into the search box
    #[arg(long, default_value = "earphones")]
    pub query: String,

    /// Identifier for the login walk; defaults to the saved one, then a
    /// demo value
    #[arg(long)]
    pub email: Option<String>,

    /// One-time code typed once the challenge appears
    #[arg(long, default_value = "424242")]
    pub otp: String,

    /// Skip the login walk
    #[arg(long)]
    pub skip_login: bool,

    /// Save the identifier after a successful login walk
    #[arg(long)]
    pub remember: bool,

    /// How long each action gets to resolve before the trip is abandoned
    #[arg(long, default_value = "30s", value_parser = humantime::parse_duration)]
    pub timeout: Duration,
}

pub async fn cmd_exercise(args: ExerciseArgs, ctx: &CliContext) -> Result<()> {
    let site = SiteId::new(args.site.as_str());
    let profile = ctx.registry().require(&site)?.clone();

    let pages = match &args.world {
        Some(path) => load_world(path)?,
        None => demo_world(),
    };

    // The CLI plays the shopper steering pages; the session performs on
    // whatever page the driver is on, exactly as a real embedding would.
    let driver = Arc::new(ScriptedDriver::with_pages(pages));
    let supervisor = SessionSupervisor::new(ctx.view());
    let session = supervisor.open(Box::new(Arc::clone(&driver)), profile.clone());

    println!(
        "Session {} on '{}' ({})",
        session.id(),
        profile.id,
        profile.display_name
    );

    let printer = spawn_event_printer(session.subscribe());
    let mut results: Vec<(&'static str, ActionOutcome)> = Vec::new();

    driver.navigate(&profile.base_url).await?;
    results.push((
        "search",
        run_step(
            &session,
            ActionRequest::new(ActionKind::Search).with_text(args.query.clone()),
            args.timeout,
        )
        .await?,
    ));
    results.push((
        "add to cart",
        run_step(&session, ActionRequest::new(ActionKind::AddToCart), args.timeout).await?,
    ));
    results.push((
        "add to cart (again)",
        run_step(&session, ActionRequest::new(ActionKind::AddToCart), args.timeout).await?,
    ));
    results.push((
        "remove from cart",
        run_step(
            &session,
            ActionRequest::new(ActionKind::RemoveFromCart).with_index(0),
            args.timeout,
        )
        .await?,
    ));

    if !args.skip_login {
        if let Some(login_url) = profile.login_url.clone() {
            let email = resolve_email(&args, ctx, &site).await;
            driver.navigate(&login_url).await?;

            let identifier = run_step(
                &session,
                ActionRequest::new(ActionKind::SubmitCredential).with_text(email.clone()),
                args.timeout,
            )
            .await?;
            let code = run_step(
                &session,
                ActionRequest::new(ActionKind::SubmitCredential).with_text(args.otp.clone()),
                args.timeout,
            )
            .await?;
            let login_ok = identifier.is_success() && code.is_success();
            results.push(("submit identifier", identifier));
            results.push(("submit one-time code", code));
            results.push((
                "dismiss welcome dialog",
                run_step(&session, ActionRequest::new(ActionKind::ConfirmDialog), args.timeout)
                    .await?,
            ));

            if args.remember && login_ok {
                let store = ctx.store()?;
                store.save(&site, SavedIdentifier::otp(email.clone())).await?;
                println!("Remembered '{email}' for '{site}'");
            }
        } else {
            println!("Profile '{site}' has no login URL; skipping the login walk");
        }
    }

    let auth = session.auth();
    let cart = session.cart();

    supervisor.close(session.id());
    drop(session);
    let _ = printer.await;

    println!();
    println!("Results:");
    let mut failures = 0usize;
    for (label, outcome) in &results {
        if !outcome.is_success() {
            failures += 1;
        }
        println!(
            "{} {:<24} {} — {} (attempts={})",
            if outcome.is_success() { "ok " } else { "ERR" },
            label,
            outcome.status,
            outcome.message,
            outcome.attempts
        );
    }
    match cart {
        Some(cart) => println!("Cart → {} item(s), {} unit(s)", cart.len(), cart.total_units()),
        None => println!("Cart → never observed"),
    }
    println!("Auth → {auth}");

    if failures > 0 {
        bail!("{failures} of {} actions did not succeed", results.len());
    }
    Ok(())
}

async fn run_step(
    session: &SessionHandle,
    request: ActionRequest,
    timeout: Duration,
) -> Result<ActionOutcome> {
    let kind = request.kind;
    let handle = session.submit(request)?;
    let outcome = tokio::time::timeout(timeout, handle.outcome())
        .await
        .with_context(|| format!("{kind} did not resolve within {timeout:?}"))??;
    Ok(outcome)
}

async fn resolve_email(args: &ExerciseArgs, ctx: &CliContext, site: &SiteId) -> String {
    if let Some(email) = &args.email {
        return email.clone();
    }
    match ctx.store() {
        Ok(store) => match store.get(site).await {
            Ok(Some(saved)) => {
                println!("Using saved identifier '{}'", saved.username);
                saved.username
            }
            Ok(None) => DEMO_EMAIL.to_string(),
            Err(err) => {
                warn!(%err, "credential lookup failed; using the demo identifier");
                DEMO_EMAIL.to_string()
            }
        },
        Err(err) => {
            warn!(%err, "credential store unavailable; using the demo identifier");
            DEMO_EMAIL.to_string()
        }
    }
}

fn spawn_event_printer(mut events: broadcast::Receiver<SessionEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => println!(
                    "  [{}] {}",
                    event.at.format("%H:%M:%S%.3f"),
                    describe(&event.detail)
                ),
                Err(RecvError::Lagged(missed)) => warn!(missed, "event stream lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn describe(detail: &EventDetail) -> String {
    match detail {
        EventDetail::Accepted { action, kind } => {
            format!("accepted {kind} ({})", short(action.as_str()))
        }
        EventDetail::Started { action, kind } => {
            format!("started {kind} ({})", short(action.as_str()))
        }
        EventDetail::AttemptStarted { action, attempt } => {
            format!("attempt {attempt} ({})", short(action.as_str()))
        }
        EventDetail::TargetResolved {
            action,
            target,
            strategy_index,
        } => format!(
            "resolved '{target}' via strategy {strategy_index} ({})",
            short(action.as_str())
        ),
        EventDetail::AttemptFinished {
            action,
            status,
            attempt,
        } => format!("attempt {attempt} → {status} ({})", short(action.as_str())),
        EventDetail::Finished { action, status } => {
            format!("finished → {status} ({})", short(action.as_str()))
        }
        EventDetail::Cancelled { action } => {
            format!("cancelled while queued ({})", short(action.as_str()))
        }
        EventDetail::AuthChanged { from, to } => format!("auth {from} → {to}"),
        EventDetail::Failed { reason } => format!("session failed: {reason}"),
        EventDetail::Closed => "session closed".to_string(),
    }
}

fn short(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn load_world(path: &Path) -> Result<Vec<ScriptedPage>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read world file {}", path.display()))?;
    serde_yaml::from_str(&text).context("world file must be a YAML list of scripted pages")
}

/// The builtin world behind the `demo` profile: a storefront whose add
/// button keeps the badge and the cart page row in sync, a cart with a
/// confirmed removal, and an OTP login that ends in a welcome dialog.
fn demo_world() -> Vec<ScriptedPage> {
    let storefront = ScriptedPage::new(HOME)
        .text("Demo Shop. Wireless Earphones, deal of the day.")
        .element(
            ScriptedElement::new("search")
                .selector("input#search")
                .on_enter(ScriptedEffect::InsertElement {
                    page: None,
                    element: ScriptedElement::new("results")
                        .selector("div.results")
                        .text("2 results"),
                }),
        )
        .element(
            ScriptedElement::new("badge")
                .selector("span.cart-badge")
                .text("0"),
        )
        .element(
            ScriptedElement::new("add")
                .selector("button.add-to-cart")
                .text("ADD TO CART")
                .on_click(ScriptedEffect::IncrementText {
                    page: None,
                    label: "badge".to_string(),
                    by: 1,
                })
                .on_click(ScriptedEffect::IncrementText {
                    page: Some(CART.to_string()),
                    label: "cart_qty".to_string(),
                    by: 1,
                }),
        );

    let confirm = ScriptedElement::new("confirm")
        .selector("button.confirm-remove")
        .text("Yes, remove")
        .on_click(ScriptedEffect::RemoveElement {
            page: None,
            label: "cart_name".to_string(),
        })
        .on_click(ScriptedEffect::RemoveElement {
            page: None,
            label: "cart_price".to_string(),
        })
        .on_click(ScriptedEffect::RemoveElement {
            page: None,
            label: "cart_qty".to_string(),
        })
        .on_click(ScriptedEffect::RemoveElement {
            page: None,
            label: "confirm".to_string(),
        })
        .on_click(ScriptedEffect::SetPageText {
            page: None,
            text: "Your cart is empty".to_string(),
        });
    let cart = ScriptedPage::new(CART)
        .element(
            ScriptedElement::new("cart_name")
                .selector("div.cart-item-name")
                .text("Wireless Earphones"),
        )
        .element(
            ScriptedElement::new("cart_price")
                .selector("div.cart-item-price")
                .text("₹1,299"),
        )
        .element(
            ScriptedElement::new("cart_qty")
                .selector("div.cart-item-qty")
                .text("0"),
        )
        .element(
            ScriptedElement::new("remove")
                .selector("button.remove-item")
                .text("Remove")
                .on_click(ScriptedEffect::InsertElement {
                    page: None,
                    element: confirm,
                }),
        );

    let verify = ScriptedElement::new("verify")
        .selector("button.verify-otp")
        .text("Verify")
        .on_click(ScriptedEffect::InsertElement {
            page: None,
            element: ScriptedElement::new("menu")
                .selector("a.account-menu")
                .text("My Account"),
        })
        .on_click(ScriptedEffect::InsertElement {
            page: None,
            element: ScriptedElement::new("welcome_ok")
                .selector("button.dialog-ok")
                .text("OK")
                .on_click(ScriptedEffect::RemoveElement {
                    page: None,
                    label: "welcome_ok".to_string(),
                }),
        });
    let login = ScriptedPage::new(LOGIN)
        .text("Sign in with your email")
        .element(ScriptedElement::new("email").selector("input#email"))
        .element(
            ScriptedElement::new("request_otp")
                .selector("button.request-otp")
                .text("Request OTP")
                .on_click(ScriptedEffect::InsertElement {
                    page: None,
                    element: ScriptedElement::new("otp").selector("input#otp"),
                })
                .on_click(ScriptedEffect::InsertElement {
                    page: None,
                    element: verify,
                }),
        );

    vec![storefront, cart, login]
}
