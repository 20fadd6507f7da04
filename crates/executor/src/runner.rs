//! The attempt loop and the per-kind pipelines.

use std::time::{Duration, Instant};

use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument, trace, warn};

use trolley_core_types::{
    ActionKind, ActionOutcome, ActionRequest, AuthState, CartState, TargetSpec,
};
use trolley_driver_port::DriverError;
use trolley_locator::{LocatorError, Resolution, ResolveOptions};
use trolley_site_profiles::TargetSlot;

use crate::auth::{self, PageAuthSignal};
use crate::cart::{CartProbe, CartReader};
use crate::errors::ExecError;
use crate::model::{ExecCtx, ExecDeps, ExecReport};

/// One attempt's result before the retry loop weighs in.
struct Attempt {
    outcome: ActionOutcome,
    auth: Option<AuthState>,
    cart: Option<CartState>,
    fatal_barrier: bool,
}

impl Attempt {
    fn of(outcome: ActionOutcome) -> Self {
        Self {
            outcome,
            auth: None,
            cart: None,
            fatal_barrier: false,
        }
    }
}

/// Runs one action to a terminal outcome.
///
/// Transient failures (stale handle, verify timeout) get a fresh attempt
/// with linear backoff until the attempt budget or the deadline runs out.
/// `NotFound` and `Blocked` end the action on the first strike; a barrier
/// is a property of the page, not of the attempt, and retrying into a wall
/// only digs the hole deeper.
#[instrument(skip_all, fields(action_id = %ctx.action_id, site = %ctx.site, kind = %request.kind))]
pub async fn execute(
    ctx: &ExecCtx,
    request: &ActionRequest,
    deps: &ExecDeps<'_>,
) -> Result<ExecReport, ExecError> {
    if ctx.cancel.is_cancelled() {
        return Err(ExecError::Cancelled);
    }

    let started_at = Instant::now();
    let max_attempts = deps.policy.max_attempts();
    let mut attempt: u32 = 0;

    let result = loop {
        attempt += 1;
        deps.events
            .attempt_started(&ctx.action_id, request.kind, attempt)
            .await;

        let budget = step_budget(ctx, deps);
        let mut result = if budget.is_zero() {
            Attempt::of(ActionOutcome::timeout("action deadline exhausted"))
        } else {
            match timeout(budget, run_once(ctx, request, deps)).await {
                Ok(Ok(result)) => result,
                Ok(Err(err)) => return Err(err),
                Err(_) => Attempt::of(ActionOutcome::timeout(format!(
                    "attempt {attempt} still running after {budget:?}"
                ))),
            }
        };

        // A failed attempt may really be a barrier the step could not see:
        // a wall that replaced the page also makes every selector miss.
        if !result.outcome.is_success() && result.outcome.blocked_reason().is_none() {
            if let Some(hit) = auth::detect_barrier(deps).await? {
                let mut outcome = ActionOutcome::blocked(hit.reason.clone(), hit.detail);
                outcome.strategy_index = result.outcome.strategy_index;
                result = Attempt {
                    outcome,
                    auth: barrier_auth(&hit.reason).or(result.auth),
                    cart: result.cart,
                    fatal_barrier: hit.fatal,
                };
            }
        }

        deps.events
            .attempt_finished(&ctx.action_id, &result.outcome.status, attempt)
            .await;

        let retryable = result.outcome.status.is_transient()
            && attempt < max_attempts
            && !ctx.expired()
            && !ctx.cancel.is_cancelled();
        if !retryable {
            break result;
        }

        let pause = deps.policy.backoff() * attempt;
        debug!(
            target: "executor",
            status = %result.outcome.status,
            attempt,
            pause_ms = pause.as_millis() as u64,
            "transient failure, retrying"
        );
        sleep(pause).await;
    };

    let Attempt {
        outcome,
        auth,
        cart,
        fatal_barrier,
    } = result;
    let mut report = ExecReport::new(outcome.with_attempts(attempt), started_at);
    report.auth_observed = auth;
    report.cart = cart;
    report.fatal_barrier = fatal_barrier;
    let report = report.finish(Instant::now());

    info!(
        target: "executor",
        status = %report.outcome.status,
        attempts = report.outcome.attempts,
        strategy_index = ?report.outcome.strategy_index,
        latency_ms = report.latency_ms as u64,
        "action finished"
    );
    Ok(report)
}

async fn run_once(
    ctx: &ExecCtx,
    request: &ActionRequest,
    deps: &ExecDeps<'_>,
) -> Result<Attempt, ExecError> {
    match request.kind {
        ActionKind::Search => run_search(ctx, request, deps).await,
        ActionKind::AddToCart => run_add_to_cart(ctx, request, deps).await,
        ActionKind::RemoveFromCart => run_remove_from_cart(ctx, request, deps).await,
        ActionKind::SubmitCredential => run_submit_credential(ctx, request, deps).await,
        ActionKind::ConfirmDialog => run_confirm_dialog(ctx, request, deps).await,
    }
}

async fn run_search(
    ctx: &ExecCtx,
    request: &ActionRequest,
    deps: &ExecDeps<'_>,
) -> Result<Attempt, ExecError> {
    let Some(query) = request.text() else {
        return Err(ExecError::InvalidRequest(
            "search needs a text payload".into(),
        ));
    };
    let target = match required_target(request, deps, TargetSlot::SearchBox) {
        Ok(target) => target,
        Err(outcome) => return Ok(Attempt::of(outcome)),
    };
    let res = match resolve_target(deps, target, &ResolveOptions::clickable()).await? {
        Resolved::Hit(res) => res,
        Resolved::Miss(outcome) => return Ok(Attempt::of(outcome)),
    };
    deps.events
        .target_resolved(&ctx.action_id, target.label(), res.strategy_index)
        .await;

    if let Err(err) = deps.driver.send_text(&res.handle, query, true).await {
        return step_failed(err, "search box", Some(res.strategy_index));
    }
    if let Err(err) = deps.driver.press_enter(&res.handle).await {
        return step_failed(err, "search box", Some(res.strategy_index));
    }
    sleep(deps.policy.settle()).await;

    let Some(results) = deps.profile.target(TargetSlot::SearchResults) else {
        // Nothing configured to verify against; report the dispatch itself.
        return Ok(Attempt::of(
            ActionOutcome::success(format!(
                "search '{query}' dispatched; no results marker configured"
            ))
            .with_strategy(res.strategy_index),
        ));
    };

    let deadline = Instant::now() + verify_budget(ctx, deps);
    loop {
        match deps
            .resolver
            .resolve(deps.driver, results, &ResolveOptions::marker())
            .await
        {
            Ok(_) => {
                return Ok(Attempt::of(
                    ActionOutcome::success(format!("search '{query}' produced results"))
                        .with_strategy(res.strategy_index),
                ));
            }
            Err(LocatorError::NotFound { .. }) => {}
            Err(LocatorError::Driver(err)) if err.is_fatal() => return Err(err.into()),
            Err(LocatorError::Driver(_)) => {}
        }
        if Instant::now() >= deadline {
            return Ok(Attempt::of(
                ActionOutcome::timeout(format!(
                    "no search results within {:?}",
                    deps.policy.verify_timeout()
                ))
                .with_strategy(res.strategy_index),
            ));
        }
        sleep(deps.policy.poll_interval()).await;
    }
}

async fn run_add_to_cart(
    ctx: &ExecCtx,
    request: &ActionRequest,
    deps: &ExecDeps<'_>,
) -> Result<Attempt, ExecError> {
    let quantity = request.quantity.max(1);
    let target = match required_target(request, deps, TargetSlot::AddToCart) {
        Ok(target) => target,
        Err(outcome) => return Ok(Attempt::of(outcome)),
    };

    let before = match CartReader::unit_count(deps).await? {
        CartProbe::Read(count) => count,
        CartProbe::Failed(outcome) => return Ok(Attempt::of(outcome)),
    };

    let mut strategy_index = None;
    for unit in 0..quantity {
        // Fresh resolution for every unit; the click's own page effects can
        // kill the previous handle.
        let res = match resolve_target(deps, target, &ResolveOptions::clickable()).await? {
            Resolved::Hit(res) => res,
            Resolved::Miss(outcome) => {
                return Ok(Attempt::of(apply_strategy(outcome, strategy_index)))
            }
        };
        if strategy_index.is_none() {
            strategy_index = Some(res.strategy_index);
            deps.events
                .target_resolved(&ctx.action_id, target.label(), res.strategy_index)
                .await;
        }
        if let Err(err) = deps.driver.click(&res.handle).await {
            let outcome = driver_failure(err, "add-to-cart click")?;
            return Ok(Attempt::of(apply_strategy(outcome, strategy_index)));
        }
        if unit + 1 < quantity {
            sleep(deps.policy.settle()).await;
        }
    }
    sleep(deps.policy.settle()).await;

    let expected = before + quantity;
    let deadline = Instant::now() + verify_budget(ctx, deps);
    let mut last_seen = before;
    loop {
        match CartReader::unit_count(deps).await? {
            CartProbe::Read(count) => {
                last_seen = count;
                if count == expected {
                    break;
                }
            }
            CartProbe::Failed(outcome) => {
                return Ok(Attempt::of(apply_strategy(outcome, strategy_index)))
            }
        }
        if Instant::now() >= deadline {
            return Ok(Attempt::of(apply_strategy(
                ActionOutcome::timeout(format!(
                    "cart shows {last_seen} unit(s), expected {expected}"
                )),
                strategy_index,
            )));
        }
        sleep(deps.policy.poll_interval()).await;
    }

    // Full read-back for the session's cart state. The count already proved
    // the mutation; a snapshot hiccup here must not trigger a retry that
    // would add the item twice.
    let cart = match CartReader::rebuild(deps).await? {
        CartProbe::Read(state) => Some(state),
        CartProbe::Failed(failed) => {
            warn!(
                target: "executor",
                message = %failed.message,
                "cart snapshot after a verified add failed"
            );
            None
        }
    };

    let mut attempt = Attempt::of(apply_strategy(
        ActionOutcome::success(format!("cart went from {before} to {expected} unit(s)")),
        strategy_index,
    ));
    attempt.cart = cart;
    Ok(attempt)
}

async fn run_remove_from_cart(
    ctx: &ExecCtx,
    request: &ActionRequest,
    deps: &ExecDeps<'_>,
) -> Result<Attempt, ExecError> {
    if let Err(err) = deps.driver.navigate(&deps.profile.cart_url).await {
        return step_failed(err, "cart page", None);
    }
    sleep(deps.policy.settle()).await;

    let before = match CartReader::read_current(deps).await? {
        CartProbe::Read(state) => state,
        CartProbe::Failed(outcome) => return Ok(Attempt::of(outcome)),
    };
    if before.is_empty() {
        return Ok(Attempt::of(ActionOutcome::not_found(
            "cart is empty, nothing to remove",
        )));
    }
    let index = request.index().unwrap_or(0);
    if index >= before.len() {
        return Ok(Attempt::of(ActionOutcome::not_found(format!(
            "cart has {} row(s), no index {index}",
            before.len()
        ))));
    }
    let removing = before.items[index].name.clone();

    let target = match required_target(request, deps, TargetSlot::RemoveItem) {
        Ok(target) => target,
        Err(outcome) => return Ok(Attempt::of(outcome)),
    };
    let opts = ResolveOptions::clickable().at_index(Some(index));
    let res = match resolve_target(deps, target, &opts).await? {
        Resolved::Hit(res) => res,
        Resolved::Miss(outcome) => return Ok(Attempt::of(outcome)),
    };
    deps.events
        .target_resolved(&ctx.action_id, target.label(), res.strategy_index)
        .await;
    if let Err(err) = deps.driver.click(&res.handle).await {
        return step_failed(err, "remove click", Some(res.strategy_index));
    }

    // Confirmation dialogs are resolved from scratch once they exist, never
    // through a handle cached from before the dialog was on the page.
    if let Some(confirm) = deps.profile.target(TargetSlot::RemoveConfirm) {
        if let Some(outcome) = click_confirmation(ctx, deps, confirm).await? {
            return Ok(Attempt::of(outcome.with_strategy(res.strategy_index)));
        }
    }
    sleep(deps.policy.settle()).await;

    let deadline = Instant::now() + verify_budget(ctx, deps);
    loop {
        match CartReader::read_current(deps).await? {
            CartProbe::Read(after)
                if after.len() < before.len() || after.total_units() < before.total_units() =>
            {
                let mut attempt = Attempt::of(
                    ActionOutcome::success(format!("removed '{removing}' from the cart"))
                        .with_strategy(res.strategy_index),
                );
                attempt.cart = Some(after);
                return Ok(attempt);
            }
            CartProbe::Read(_) => {}
            CartProbe::Failed(outcome) => {
                return Ok(Attempt::of(outcome.with_strategy(res.strategy_index)))
            }
        }
        if Instant::now() >= deadline {
            return Ok(Attempt::of(
                ActionOutcome::timeout(format!(
                    "cart still shows {} row(s) with {} unit(s)",
                    before.len(),
                    before.total_units()
                ))
                .with_strategy(res.strategy_index),
            ));
        }
        sleep(deps.policy.poll_interval()).await;
    }
}

async fn run_submit_credential(
    ctx: &ExecCtx,
    request: &ActionRequest,
    deps: &ExecDeps<'_>,
) -> Result<Attempt, ExecError> {
    let Some(secret) = request.text() else {
        return Err(ExecError::InvalidRequest(
            "submit_credential needs a text payload".into(),
        ));
    };

    let (field_slot, submit_slot) = match ctx.auth {
        AuthState::Anonymous => (TargetSlot::IdentifierField, TargetSlot::IdentifierSubmit),
        AuthState::AwaitingOtp => (TargetSlot::OtpField, TargetSlot::OtpSubmit),
        AuthState::Authenticated => {
            return Ok(Attempt::of(ActionOutcome::success(
                "session is already authenticated",
            )));
        }
        AuthState::RateLimited => {
            // The session worker refuses these before they get this far;
            // backstop for direct executor callers.
            return Ok(Attempt::of(ActionOutcome::blocked(
                "rate_limited",
                "session is rate limited; credential submission refused",
            )));
        }
    };

    let target = match required_target(request, deps, field_slot) {
        Ok(target) => target,
        Err(outcome) => return Ok(Attempt::of(outcome)),
    };
    let res = match resolve_target(deps, target, &ResolveOptions::clickable()).await? {
        Resolved::Hit(res) => res,
        Resolved::Miss(outcome) => return Ok(Attempt::of(outcome)),
    };
    deps.events
        .target_resolved(&ctx.action_id, target.label(), res.strategy_index)
        .await;
    if let Err(err) = deps.driver.send_text(&res.handle, secret, true).await {
        return step_failed(err, field_slot.name(), Some(res.strategy_index));
    }

    if let Some(submit) = deps.profile.target(submit_slot) {
        let button = match resolve_target(deps, submit, &ResolveOptions::clickable()).await? {
            Resolved::Hit(button) => button,
            Resolved::Miss(outcome) => {
                return Ok(Attempt::of(outcome.with_strategy(res.strategy_index)))
            }
        };
        if let Err(err) = deps.driver.click(&button.handle).await {
            return step_failed(err, submit_slot.name(), Some(res.strategy_index));
        }
    } else if let Err(err) = deps.driver.press_enter(&res.handle).await {
        // No dedicated button; enter in the field submits.
        return step_failed(err, field_slot.name(), Some(res.strategy_index));
    }
    sleep(deps.policy.settle()).await;

    let deadline = Instant::now() + verify_budget(ctx, deps);
    loop {
        match auth::classify(deps).await? {
            PageAuthSignal::Barrier { reason, fatal } => {
                let mut attempt = Attempt::of(
                    ActionOutcome::blocked(
                        reason.clone(),
                        format!("credential submit ran into a '{reason}' barrier"),
                    )
                    .with_strategy(res.strategy_index),
                );
                attempt.auth = barrier_auth(&reason);
                attempt.fatal_barrier = fatal;
                return Ok(attempt);
            }
            PageAuthSignal::SignedIn => {
                let mut attempt = Attempt::of(
                    ActionOutcome::success("credential accepted, session is authenticated")
                        .with_strategy(res.strategy_index),
                );
                attempt.auth = Some(AuthState::Authenticated);
                return Ok(attempt);
            }
            PageAuthSignal::OtpChallenge if ctx.auth == AuthState::Anonymous => {
                let mut attempt = Attempt::of(
                    ActionOutcome::success("identifier accepted, one-time code challenge shown")
                        .with_strategy(res.strategy_index),
                );
                attempt.auth = Some(AuthState::AwaitingOtp);
                return Ok(attempt);
            }
            // Still on the challenge after an OTP submit, or no evidence
            // yet: keep watching until the window closes.
            PageAuthSignal::OtpChallenge | PageAuthSignal::Indeterminate => {}
        }
        if Instant::now() >= deadline {
            return Ok(Attempt::of(
                ActionOutcome::timeout("page did not advance after the credential submit")
                    .with_strategy(res.strategy_index),
            ));
        }
        sleep(deps.policy.poll_interval()).await;
    }
}

async fn run_confirm_dialog(
    ctx: &ExecCtx,
    request: &ActionRequest,
    deps: &ExecDeps<'_>,
) -> Result<Attempt, ExecError> {
    let target = match required_target(request, deps, TargetSlot::DialogConfirm) {
        Ok(target) => target,
        Err(outcome) => return Ok(Attempt::of(outcome)),
    };
    let res = match resolve_target(deps, target, &ResolveOptions::clickable()).await? {
        Resolved::Hit(res) => res,
        Resolved::Miss(outcome) => return Ok(Attempt::of(outcome)),
    };
    deps.events
        .target_resolved(&ctx.action_id, target.label(), res.strategy_index)
        .await;
    if let Err(err) = deps.driver.click(&res.handle).await {
        return step_failed(err, "dialog confirm", Some(res.strategy_index));
    }
    sleep(deps.policy.settle()).await;

    // Verified by absence: the dialog control must stop resolving.
    let deadline = Instant::now() + verify_budget(ctx, deps);
    loop {
        match deps
            .resolver
            .resolve(deps.driver, target, &ResolveOptions::marker())
            .await
        {
            Err(LocatorError::NotFound { .. }) => {
                return Ok(Attempt::of(
                    ActionOutcome::success("dialog dismissed").with_strategy(res.strategy_index),
                ));
            }
            Ok(_) => {}
            Err(LocatorError::Driver(err)) if err.is_fatal() => return Err(err.into()),
            // The dismissal itself mutates the page; handle noise while it
            // settles reads as "still present".
            Err(LocatorError::Driver(err)) => {
                trace!(target: "executor", %err, "dialog probe noise");
            }
        }
        if Instant::now() >= deadline {
            return Ok(Attempt::of(
                ActionOutcome::timeout("dialog still present after the confirm click")
                    .with_strategy(res.strategy_index),
            ));
        }
        sleep(deps.policy.poll_interval()).await;
    }
}

/// Waits out the confirm window for a dialog, clicking it if it shows.
/// `None` means the flow proceeds (dialog clicked, or none appeared);
/// `Some` is the outcome that ends the attempt.
async fn click_confirmation(
    ctx: &ExecCtx,
    deps: &ExecDeps<'_>,
    confirm: &TargetSpec,
) -> Result<Option<ActionOutcome>, ExecError> {
    let deadline = Instant::now() + deps.policy.confirm_window().min(ctx.remaining());
    loop {
        match deps
            .resolver
            .resolve(deps.driver, confirm, &ResolveOptions::clickable())
            .await
        {
            Ok(res) => {
                return match deps.driver.click(&res.handle).await {
                    Ok(()) => Ok(None),
                    Err(err) => driver_failure(err, "confirmation click").map(Some),
                };
            }
            Err(LocatorError::NotFound { .. }) => {}
            Err(LocatorError::Driver(err)) if err.is_fatal() => return Err(err.into()),
            Err(LocatorError::Driver(err)) => {
                trace!(target: "executor", %err, "confirmation probe noise, dialog may be mid-paint");
            }
        }
        if Instant::now() >= deadline {
            debug!(target: "executor", "no confirmation dialog inside the window");
            return Ok(None);
        }
        sleep(deps.policy.poll_interval()).await;
    }
}

/// The request's inline target, or the profile's entry for `slot`.
fn required_target<'a>(
    request: &'a ActionRequest,
    deps: &ExecDeps<'a>,
    slot: TargetSlot,
) -> Result<&'a TargetSpec, ActionOutcome> {
    if let Some(target) = &request.target {
        return Ok(target);
    }
    deps.profile.target(slot).ok_or_else(|| {
        ActionOutcome::not_found(format!(
            "site '{}' has no '{slot}' target and the request supplied none",
            deps.profile.id
        ))
    })
}

enum Resolved {
    Hit(Resolution),
    Miss(ActionOutcome),
}

async fn resolve_target(
    deps: &ExecDeps<'_>,
    target: &TargetSpec,
    opts: &ResolveOptions,
) -> Result<Resolved, ExecError> {
    match deps.resolver.resolve(deps.driver, target, opts).await {
        Ok(res) => Ok(Resolved::Hit(res)),
        Err(err @ LocatorError::NotFound { .. }) => {
            Ok(Resolved::Miss(ActionOutcome::not_found(err.to_string())))
        }
        Err(LocatorError::Driver(err)) => driver_failure(err, target.label()).map(Resolved::Miss),
    }
}

/// Maps a driver failure mid-step to the outcome it means for the attempt.
/// Fatal errors escape instead; they end the session, not the action.
fn driver_failure(err: DriverError, what: &str) -> Result<ActionOutcome, ExecError> {
    if err.is_fatal() {
        return Err(err.into());
    }
    if err.is_stale() {
        return Ok(ActionOutcome::stale(format!("{what}: {err}")));
    }
    Ok(ActionOutcome::timeout(format!("{what}: {err}")))
}

fn step_failed(
    err: DriverError,
    what: &str,
    strategy_index: Option<usize>,
) -> Result<Attempt, ExecError> {
    let outcome = driver_failure(err, what)?;
    Ok(Attempt::of(apply_strategy(outcome, strategy_index)))
}

fn apply_strategy(outcome: ActionOutcome, index: Option<usize>) -> ActionOutcome {
    match index {
        Some(index) => outcome.with_strategy(index),
        None => outcome,
    }
}

/// `"rate_limited"` is the one barrier tag the auth machine reacts to.
fn barrier_auth(reason: &str) -> Option<AuthState> {
    (reason == "rate_limited").then_some(AuthState::RateLimited)
}

fn step_budget(ctx: &ExecCtx, deps: &ExecDeps<'_>) -> Duration {
    deps.policy.step_timeout().min(ctx.remaining())
}

fn verify_budget(ctx: &ExecCtx, deps: &ExecDeps<'_>) -> Duration {
    deps.policy.verify_timeout().min(ctx.remaining())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use trolley_core_types::{LocatorStrategy, OutcomeStatus, SiteId};
    use trolley_driver_port::{
        Driver, ScriptedDriver, ScriptedEffect, ScriptedElement, ScriptedPage,
    };
    use trolley_locator::{DriverResolver, ElementResolver, ResolutionSet};
    use trolley_policy::PolicyView;
    use trolley_site_profiles::{default_barriers, SiteProfile, TargetTable};

    use crate::events::NoopEvents;

    const ITEM: &str = "https://shop.example/item";
    const CART: &str = "https://shop.example/cart";
    const LOGIN: &str = "https://shop.example/login";

    fn fast_policy() -> PolicyView {
        let mut policy = PolicyView::default();
        policy.exec.max_attempts = 3;
        policy.exec.backoff_ms = 5;
        policy.exec.step_timeout_ms = 2_000;
        policy.exec.action_timeout_ms = 8_000;
        policy.exec.settle_ms = 5;
        policy.verify.verify_timeout_ms = 300;
        policy.verify.poll_interval_ms = 10;
        policy.verify.confirm_window_ms = 150;
        policy
    }

    fn shop_profile() -> SiteProfile {
        SiteProfile {
            id: SiteId::new("shop"),
            display_name: "Shop".to_string(),
            base_url: "https://shop.example/".to_string(),
            login_url: Some(LOGIN.to_string()),
            cart_url: CART.to_string(),
            targets: TargetTable {
                search_box: Some(TargetSpec::single(
                    "search box",
                    LocatorStrategy::css("input#search"),
                )),
                search_results: Some(TargetSpec::single(
                    "search results",
                    LocatorStrategy::css("div.results"),
                )),
                add_to_cart: Some(TargetSpec::single(
                    "add to cart",
                    LocatorStrategy::css("button.add-to-cart"),
                )),
                cart_badge: Some(TargetSpec::single(
                    "cart badge",
                    LocatorStrategy::css("span.cart-badge"),
                )),
                cart_item_names: Some(TargetSpec::single(
                    "cart item names",
                    LocatorStrategy::css("div.cart-item-name"),
                )),
                cart_item_prices: Some(TargetSpec::single(
                    "cart item prices",
                    LocatorStrategy::css("div.cart-item-price"),
                )),
                cart_item_quantities: Some(TargetSpec::single(
                    "cart item quantities",
                    LocatorStrategy::css("div.cart-item-qty"),
                )),
                remove_item: Some(TargetSpec::single(
                    "remove item",
                    LocatorStrategy::css("button.remove-item"),
                )),
                remove_confirm: Some(TargetSpec::single(
                    "remove confirmation",
                    LocatorStrategy::css("button.confirm-remove"),
                )),
                identifier_field: Some(TargetSpec::single(
                    "identifier field",
                    LocatorStrategy::css("input#email"),
                )),
                identifier_submit: Some(TargetSpec::single(
                    "request otp",
                    LocatorStrategy::css("button.request-otp"),
                )),
                otp_field: Some(TargetSpec::single(
                    "otp field",
                    LocatorStrategy::css("input#otp"),
                )),
                otp_submit: Some(TargetSpec::single(
                    "verify otp",
                    LocatorStrategy::css("button.verify-otp"),
                )),
                signed_in_marker: Some(TargetSpec::single(
                    "signed-in marker",
                    LocatorStrategy::css("a.account-menu"),
                )),
                otp_challenge_marker: None,
                dialog_confirm: Some(TargetSpec::single(
                    "dialog confirm",
                    LocatorStrategy::css("button.dialog-ok"),
                )),
            },
            empty_cart_markers: vec!["your cart is empty".to_string()],
            barriers: default_barriers(),
        }
    }

    /// Product page whose add button keeps the badge and the cart page row
    /// in sync, the way a real site's frontend would.
    fn item_page() -> ScriptedPage {
        ScriptedPage::new(ITEM)
            .text("Wireless Earphones. Great sound, no wires.")
            .element(
                ScriptedElement::new("search")
                    .selector("input#search")
                    .on_enter(ScriptedEffect::InsertElement {
                        page: None,
                        element: ScriptedElement::new("results")
                            .selector("div.results")
                            .text("3 results"),
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
                    .selector("//button[contains(text(),'ADD TO CART')]")
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
            )
    }

    fn cart_row_page(qty: u32) -> ScriptedPage {
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
        ScriptedPage::new(CART)
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
                    .text(qty.to_string()),
            )
            .element(
                ScriptedElement::new("remove")
                    .selector("button.remove-item")
                    .text("Remove")
                    .on_click(ScriptedEffect::InsertElement {
                        page: None,
                        element: confirm,
                    }),
            )
    }

    fn login_page() -> ScriptedPage {
        let verify = ScriptedElement::new("verify")
            .selector("button.verify-otp")
            .text("Verify")
            .on_click(ScriptedEffect::InsertElement {
                page: None,
                element: ScriptedElement::new("menu")
                    .selector("a.account-menu")
                    .text("My Account"),
            });
        let otp = ScriptedElement::new("otp").selector("input#otp");
        ScriptedPage::new(LOGIN)
            .text("Sign in with your email")
            .element(ScriptedElement::new("email").selector("input#email"))
            .element(
                ScriptedElement::new("request_otp")
                    .selector("button.request-otp")
                    .text("Request OTP")
                    .on_click(ScriptedEffect::InsertElement {
                        page: None,
                        element: otp,
                    })
                    .on_click(ScriptedEffect::InsertElement {
                        page: None,
                        element: verify,
                    }),
            )
    }

    struct Rig {
        driver: ScriptedDriver,
        resolver: DriverResolver,
        profile: SiteProfile,
        policy: PolicyView,
        events: NoopEvents,
    }

    impl Rig {
        fn new(pages: Vec<ScriptedPage>) -> Self {
            Self {
                driver: ScriptedDriver::with_pages(pages),
                resolver: DriverResolver::new(),
                profile: shop_profile(),
                policy: fast_policy(),
                events: NoopEvents,
            }
        }

        async fn open(&self, url: &str) {
            self.driver.navigate(url).await.unwrap();
        }

        fn deps(&self) -> ExecDeps<'_> {
            ExecDeps {
                driver: &self.driver,
                resolver: &self.resolver,
                profile: &self.profile,
                policy: &self.policy,
                events: &self.events,
            }
        }
    }

    fn ctx(auth: AuthState) -> ExecCtx {
        ExecCtx::new(SiteId::new("shop"), auth, Duration::from_secs(10))
    }

    #[tokio::test]
    async fn add_to_cart_verifies_the_unit_count_increase() {
        let rig = Rig::new(vec![item_page(), cart_row_page(0)]);
        rig.open(ITEM).await;

        let request = ActionRequest::new(ActionKind::AddToCart);
        let report = execute(&ctx(AuthState::Anonymous), &request, &rig.deps())
            .await
            .unwrap();

        assert!(report.outcome.is_success(), "{:?}", report.outcome);
        assert_eq!(report.outcome.attempts, 1);
        assert_eq!(report.outcome.strategy_index, Some(0));
        let cart = report.cart.expect("read-back cart");
        assert_eq!(cart.total_units(), 1);
        assert!(cart.contains_named("wireless earphones"));
        assert_eq!(rig.driver.clicks_on(ITEM, "add"), 1);
    }

    #[tokio::test]
    async fn quantity_clicks_once_per_unit() {
        let rig = Rig::new(vec![item_page(), cart_row_page(0)]);
        rig.open(ITEM).await;

        let request = ActionRequest::new(ActionKind::AddToCart).with_quantity(2);
        let report = execute(&ctx(AuthState::Anonymous), &request, &rig.deps())
            .await
            .unwrap();

        assert!(report.outcome.is_success(), "{:?}", report.outcome);
        assert_eq!(rig.driver.clicks_on(ITEM, "add"), 2);
        assert_eq!(report.cart.expect("read-back cart").total_units(), 2);
    }

    #[tokio::test]
    async fn fallback_strategy_carries_the_add() {
        let rig = Rig::new(vec![item_page(), cart_row_page(0)]);
        rig.open(ITEM).await;

        // First selector drifted off the markup; the xpath fallback holds.
        let target = TargetSpec::new(
            "add to cart",
            vec![
                LocatorStrategy::css("button.pdp-add-cart"),
                LocatorStrategy::xpath("//button[contains(text(),'ADD TO CART')]"),
            ],
        )
        .unwrap();
        let request = ActionRequest::new(ActionKind::AddToCart).with_target(target);
        let report = execute(&ctx(AuthState::Anonymous), &request, &rig.deps())
            .await
            .unwrap();

        assert!(report.outcome.is_success(), "{:?}", report.outcome);
        assert_eq!(report.outcome.strategy_index, Some(1));
        assert_eq!(report.cart.expect("read-back cart").total_units(), 1);
    }

    #[tokio::test]
    async fn unverified_add_times_out_and_retries_until_attempts_run_out() {
        // The button clicks fine but nothing ever lands in the cart.
        let dead_button = ScriptedPage::new(ITEM)
            .element(
                ScriptedElement::new("badge")
                    .selector("span.cart-badge")
                    .text("0"),
            )
            .element(
                ScriptedElement::new("add")
                    .selector("button.add-to-cart")
                    .text("ADD TO CART"),
            );
        let rig = Rig::new(vec![dead_button]);
        rig.open(ITEM).await;

        let request = ActionRequest::new(ActionKind::AddToCart);
        let report = execute(&ctx(AuthState::Anonymous), &request, &rig.deps())
            .await
            .unwrap();

        assert_eq!(report.outcome.status, OutcomeStatus::Timeout);
        assert_eq!(report.outcome.attempts, 3);
        assert_eq!(rig.driver.clicks_on(ITEM, "add"), 3);
    }

    #[tokio::test]
    async fn missing_profile_slot_reads_as_not_found() {
        let rig = {
            let mut rig = Rig::new(vec![item_page()]);
            rig.profile.targets.add_to_cart = None;
            rig
        };
        rig.open(ITEM).await;

        let request = ActionRequest::new(ActionKind::AddToCart);
        let report = execute(&ctx(AuthState::Anonymous), &request, &rig.deps())
            .await
            .unwrap();

        assert_eq!(report.outcome.status, OutcomeStatus::NotFound);
        assert_eq!(report.outcome.attempts, 1);
        assert!(report.outcome.message.contains("add_to_cart"));
    }

    #[tokio::test]
    async fn removal_clicks_through_the_confirmation_dialog() {
        let rig = Rig::new(vec![item_page(), cart_row_page(1)]);
        rig.open(ITEM).await;

        let request = ActionRequest::new(ActionKind::RemoveFromCart).with_index(0);
        let report = execute(&ctx(AuthState::Anonymous), &request, &rig.deps())
            .await
            .unwrap();

        assert!(report.outcome.is_success(), "{:?}", report.outcome);
        assert!(report.outcome.message.contains("Wireless Earphones"));
        assert!(report.cart.expect("read-back cart").is_empty());
        assert_eq!(rig.driver.clicks_on(CART, "remove"), 1);
        assert_eq!(rig.driver.clicks_on(CART, "confirm"), 1);
    }

    #[tokio::test]
    async fn removing_from_an_empty_cart_is_not_found() {
        let rig = Rig::new(vec![item_page(), cart_row_page(1)]);
        rig.open(ITEM).await;

        let request = ActionRequest::new(ActionKind::RemoveFromCart);
        let first = execute(&ctx(AuthState::Anonymous), &request, &rig.deps())
            .await
            .unwrap();
        assert!(first.outcome.is_success());

        let second = execute(&ctx(AuthState::Anonymous), &request, &rig.deps())
            .await
            .unwrap();
        assert_eq!(second.outcome.status, OutcomeStatus::NotFound);
        assert!(second.outcome.message.contains("empty"));
    }

    #[tokio::test]
    async fn remove_index_beyond_the_rows_is_not_found() {
        let rig = Rig::new(vec![cart_row_page(1)]);
        rig.open(CART).await;

        let request = ActionRequest::new(ActionKind::RemoveFromCart).with_index(4);
        let report = execute(&ctx(AuthState::Anonymous), &request, &rig.deps())
            .await
            .unwrap();

        assert_eq!(report.outcome.status, OutcomeStatus::NotFound);
        assert!(report.outcome.message.contains("no index 4"));
    }

    #[tokio::test]
    async fn search_is_verified_by_the_results_marker() {
        let rig = Rig::new(vec![item_page()]);
        rig.open(ITEM).await;

        let request = ActionRequest::new(ActionKind::Search).with_text("earphones");
        let report = execute(&ctx(AuthState::Anonymous), &request, &rig.deps())
            .await
            .unwrap();

        assert!(report.outcome.is_success(), "{:?}", report.outcome);
        assert_eq!(report.outcome.strategy_index, Some(0));
        assert_eq!(
            rig.driver.typed_into(ITEM, "search"),
            vec!["earphones".to_string()]
        );
    }

    #[tokio::test]
    async fn search_without_a_query_is_an_invalid_request() {
        let rig = Rig::new(vec![item_page()]);
        rig.open(ITEM).await;

        let request = ActionRequest::new(ActionKind::Search);
        let err = execute(&ctx(AuthState::Anonymous), &request, &rig.deps())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn login_walks_anonymous_to_awaiting_to_authenticated() {
        let rig = Rig::new(vec![login_page()]);
        rig.open(LOGIN).await;

        let identifier =
            ActionRequest::new(ActionKind::SubmitCredential).with_text("user@example.com");
        let first = execute(&ctx(AuthState::Anonymous), &identifier, &rig.deps())
            .await
            .unwrap();
        assert!(first.outcome.is_success(), "{:?}", first.outcome);
        assert_eq!(first.auth_observed, Some(AuthState::AwaitingOtp));
        assert_eq!(
            rig.driver.typed_into(LOGIN, "email"),
            vec!["user@example.com".to_string()]
        );

        let otp = ActionRequest::new(ActionKind::SubmitCredential).with_text("123456");
        let second = execute(&ctx(AuthState::AwaitingOtp), &otp, &rig.deps())
            .await
            .unwrap();
        assert!(second.outcome.is_success(), "{:?}", second.outcome);
        assert_eq!(second.auth_observed, Some(AuthState::Authenticated));
        assert_eq!(
            rig.driver.typed_into(LOGIN, "otp"),
            vec!["123456".to_string()]
        );
    }

    #[tokio::test]
    async fn rate_limit_wall_blocks_and_never_retries() {
        let walled = ScriptedPage::new(LOGIN)
            .element(ScriptedElement::new("email").selector("input#email"))
            .element(
                ScriptedElement::new("request_otp")
                    .selector("button.request-otp")
                    .text("Request OTP")
                    .on_click(ScriptedEffect::AppendPageText {
                        page: None,
                        text: "Limit reached. Try again later.".to_string(),
                    }),
            );
        let rig = Rig::new(vec![walled]);
        rig.open(LOGIN).await;

        let request =
            ActionRequest::new(ActionKind::SubmitCredential).with_text("user@example.com");
        let report = execute(&ctx(AuthState::Anonymous), &request, &rig.deps())
            .await
            .unwrap();

        assert_eq!(report.outcome.blocked_reason(), Some("rate_limited"));
        assert_eq!(report.outcome.attempts, 1);
        assert_eq!(report.auth_observed, Some(AuthState::RateLimited));
        assert!(!report.fatal_barrier);
    }

    #[tokio::test]
    async fn a_wall_after_the_otp_submit_is_blocked_not_retried() {
        let walled = ScriptedPage::new(LOGIN)
            .element(ScriptedElement::new("otp").selector("input#otp"))
            .element(
                ScriptedElement::new("verify")
                    .selector("button.verify-otp")
                    .text("Verify")
                    .on_click(ScriptedEffect::AppendPageText {
                        page: None,
                        text: "Limit reached. Try again later.".to_string(),
                    }),
            );
        let rig = Rig::new(vec![walled]);
        rig.open(LOGIN).await;

        let request = ActionRequest::new(ActionKind::SubmitCredential).with_text("123456");
        let report = execute(&ctx(AuthState::AwaitingOtp), &request, &rig.deps())
            .await
            .unwrap();

        assert_eq!(report.outcome.blocked_reason(), Some("rate_limited"));
        assert_eq!(report.outcome.attempts, 1);
        assert_eq!(report.auth_observed, Some(AuthState::RateLimited));
        assert_eq!(
            rig.driver.typed_into(LOGIN, "otp"),
            vec!["123456".to_string()]
        );
    }

    #[tokio::test]
    async fn rate_limited_session_refuses_credentials_without_touching_the_page() {
        let rig = Rig::new(vec![login_page()]);
        rig.open(LOGIN).await;

        let request = ActionRequest::new(ActionKind::SubmitCredential).with_text("123456");
        let report = execute(&ctx(AuthState::RateLimited), &request, &rig.deps())
            .await
            .unwrap();

        assert_eq!(report.outcome.blocked_reason(), Some("rate_limited"));
        assert!(rig.driver.typed_into(LOGIN, "email").is_empty());
        assert!(rig.driver.typed_into(LOGIN, "otp").is_empty());
        assert_eq!(rig.driver.clicks_on(LOGIN, "request_otp"), 0);
    }

    #[tokio::test]
    async fn barrier_sweep_reclassifies_a_generic_failure() {
        let page = ScriptedPage::new(ITEM).text("Please verify you are human to continue");
        let rig = Rig::new(vec![page]);
        rig.open(ITEM).await;

        let request = ActionRequest::new(ActionKind::AddToCart);
        let report = execute(&ctx(AuthState::Anonymous), &request, &rig.deps())
            .await
            .unwrap();

        assert_eq!(report.outcome.blocked_reason(), Some("captcha"));
        assert_eq!(report.outcome.attempts, 1);
    }

    #[tokio::test]
    async fn dialog_dismissal_is_verified_by_absence() {
        let page = ScriptedPage::new(ITEM).element(
            ScriptedElement::new("ok")
                .selector("button.dialog-ok")
                .text("OK")
                .on_click(ScriptedEffect::RemoveElement {
                    page: None,
                    label: "ok".to_string(),
                }),
        );
        let rig = Rig::new(vec![page]);
        rig.open(ITEM).await;

        let request = ActionRequest::new(ActionKind::ConfirmDialog);
        let first = execute(&ctx(AuthState::Anonymous), &request, &rig.deps())
            .await
            .unwrap();
        assert!(first.outcome.is_success(), "{:?}", first.outcome);

        let second = execute(&ctx(AuthState::Anonymous), &request, &rig.deps())
            .await
            .unwrap();
        assert_eq!(second.outcome.status, OutcomeStatus::NotFound);
    }

    #[tokio::test]
    async fn cancelled_before_start_never_touches_the_driver() {
        let rig = Rig::new(vec![item_page()]);
        rig.open(ITEM).await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = ctx(AuthState::Anonymous).with_cancel(cancel);

        let request = ActionRequest::new(ActionKind::AddToCart);
        let err = execute(&ctx, &request, &rig.deps()).await.unwrap_err();
        assert!(matches!(err, ExecError::Cancelled));
        assert_eq!(rig.driver.clicks_on(ITEM, "add"), 0);
    }

    #[tokio::test]
    async fn dead_driver_is_fatal_not_an_outcome() {
        let rig = Rig::new(vec![item_page()]);
        rig.open(ITEM).await;
        rig.driver.disconnect("connection reset");

        let request = ActionRequest::new(ActionKind::AddToCart);
        let err = execute(&ctx(AuthState::Anonymous), &request, &rig.deps())
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    /// Fails the first `failures` resolutions with a stale handle, then
    /// behaves. Exercises the retry path without scripting a page race.
    struct FlakyResolver {
        inner: DriverResolver,
        failures: AtomicU32,
    }

    impl FlakyResolver {
        fn new(failures: u32) -> Self {
            Self {
                inner: DriverResolver::new(),
                failures: AtomicU32::new(failures),
            }
        }

        fn take_failure(&self) -> bool {
            self.failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                    left.checked_sub(1)
                })
                .is_ok()
        }
    }

    #[async_trait]
    impl ElementResolver for FlakyResolver {
        async fn resolve(
            &self,
            driver: &dyn Driver,
            target: &TargetSpec,
            opts: &ResolveOptions,
        ) -> Result<Resolution, LocatorError> {
            if self.take_failure() {
                return Err(DriverError::stale("injected").into());
            }
            self.inner.resolve(driver, target, opts).await
        }

        async fn resolve_all(
            &self,
            driver: &dyn Driver,
            target: &TargetSpec,
            opts: &ResolveOptions,
        ) -> Result<ResolutionSet, LocatorError> {
            self.inner.resolve_all(driver, target, opts).await
        }
    }

    #[tokio::test]
    async fn stale_resolution_is_retried_with_a_fresh_attempt() {
        let rig = Rig::new(vec![item_page(), cart_row_page(0)]);
        rig.open(ITEM).await;
        let resolver = FlakyResolver::new(1);
        let deps = ExecDeps {
            driver: &rig.driver,
            resolver: &resolver,
            profile: &rig.profile,
            policy: &rig.policy,
            events: &rig.events,
        };

        let request = ActionRequest::new(ActionKind::AddToCart);
        let report = execute(&ctx(AuthState::Anonymous), &request, &deps)
            .await
            .unwrap();

        assert!(report.outcome.is_success(), "{:?}", report.outcome);
        assert_eq!(report.outcome.attempts, 2);
        assert_eq!(rig.driver.clicks_on(ITEM, "add"), 1);
    }
}
