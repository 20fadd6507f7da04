//! Page-evidence classification for the auth machine.
//!
//! The executor never decides the session's lane; it reports what the page
//! shows and the session commits the transition. Barriers outrank every
//! other signal, and a signed-in marker outranks a lingering OTP input.

use tracing::trace;

use trolley_core_types::TargetSpec;
use trolley_locator::{LocatorError, ResolveOptions};
use trolley_site_profiles::TargetSlot;

use crate::errors::ExecError;
use crate::model::ExecDeps;

/// What the current page says about the session's auth lane.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PageAuthSignal {
    /// A barrier rule fired. The reason tag `"rate_limited"` additionally
    /// flips the session into its terminal rate-limited lane.
    Barrier { reason: String, fatal: bool },
    SignedIn,
    OtpChallenge,
    /// No recognizable evidence either way.
    Indeterminate,
}

/// A matched barrier with enough context for the outcome message.
#[derive(Clone, Debug)]
pub struct BarrierHit {
    pub reason: String,
    pub fatal: bool,
    pub detail: String,
}

/// Checks the page against the profile's barrier rules: phrase sweep over
/// the rendered text first, marker probes second.
pub async fn detect_barrier(deps: &ExecDeps<'_>) -> Result<Option<BarrierHit>, ExecError> {
    let text = match deps.driver.page_text().await {
        Ok(text) => text,
        Err(err) if err.is_fatal() => return Err(err.into()),
        Err(err) => {
            trace!(target: "executor", %err, "page text unavailable for barrier sweep");
            return Ok(None);
        }
    };
    if let Some(rule) = deps.profile.detect_barrier(&text) {
        return Ok(Some(BarrierHit {
            reason: rule.reason.clone(),
            fatal: rule.fatal,
            detail: format!("page matched a '{}' barrier phrase", rule.reason),
        }));
    }
    for rule in &deps.profile.barriers {
        let Some(marker) = &rule.marker else { continue };
        if probe(deps, marker).await? {
            return Ok(Some(BarrierHit {
                reason: rule.reason.clone(),
                fatal: rule.fatal,
                detail: format!("barrier marker '{}' is on the page", marker.label()),
            }));
        }
    }
    Ok(None)
}

/// Classifies the page for the auth machine.
pub async fn classify(deps: &ExecDeps<'_>) -> Result<PageAuthSignal, ExecError> {
    if let Some(hit) = detect_barrier(deps).await? {
        return Ok(PageAuthSignal::Barrier {
            reason: hit.reason,
            fatal: hit.fatal,
        });
    }
    if let Some(marker) = deps.profile.target(TargetSlot::SignedInMarker) {
        if probe(deps, marker).await? {
            return Ok(PageAuthSignal::SignedIn);
        }
    }
    if let Some(marker) = deps.profile.target(TargetSlot::OtpChallengeMarker) {
        if probe(deps, marker).await? {
            return Ok(PageAuthSignal::OtpChallenge);
        }
    } else if let Some(field) = deps.profile.target(TargetSlot::OtpField) {
        // The OTP input doubles as challenge evidence for profiles without
        // a dedicated marker.
        if probe(deps, field).await? {
            return Ok(PageAuthSignal::OtpChallenge);
        }
    }
    Ok(PageAuthSignal::Indeterminate)
}

/// True when `target` resolves to a visible element right now. Resolution
/// noise (nothing matched, stale mid-probe) reads as "not present".
async fn probe(deps: &ExecDeps<'_>, target: &TargetSpec) -> Result<bool, ExecError> {
    match deps
        .resolver
        .resolve(deps.driver, target, &ResolveOptions::marker())
        .await
    {
        Ok(_) => Ok(true),
        Err(LocatorError::NotFound { .. }) => Ok(false),
        Err(LocatorError::Driver(err)) if err.is_fatal() => Err(err.into()),
        Err(LocatorError::Driver(_)) => Ok(false),
    }
}
