//! Cart read-back.
//!
//! Cart state is never patched incrementally. After any cart-changing
//! action the cart page is re-read and the parsed rows replace whatever
//! the session held before; an optimistic local update that the page later
//! contradicts cannot happen because there is no local update. Prices stay
//! the display strings the site rendered.

use tracing::{debug, trace};

use trolley_core_types::{ActionOutcome, CartItem, CartState};
use trolley_driver_port::DriverError;
use trolley_locator::{LocatorError, ResolveOptions};
use trolley_site_profiles::TargetSlot;

use crate::errors::ExecError;
use crate::model::ExecDeps;

/// A cart probe either produces its value or the terminal outcome
/// explaining why it could not (stale mid-read, mostly). Fatal driver
/// errors escape as [`ExecError`] instead.
pub enum CartProbe<T> {
    Read(T),
    Failed(ActionOutcome),
}

fn op_failed<T>(err: DriverError, what: &str) -> Result<CartProbe<T>, ExecError> {
    if err.is_fatal() {
        return Err(err.into());
    }
    if err.is_stale() {
        return Ok(CartProbe::Failed(ActionOutcome::stale(format!(
            "{what}: {err}"
        ))));
    }
    Ok(CartProbe::Failed(ActionOutcome::timeout(format!(
        "{what}: {err}"
    ))))
}

pub struct CartReader;

impl CartReader {
    /// Parses the cart rows off the page the driver is looking at right
    /// now. The caller is responsible for being on the cart page.
    pub async fn read_current(deps: &ExecDeps<'_>) -> Result<CartProbe<CartState>, ExecError> {
        let page_text = match deps.driver.page_text().await {
            Ok(text) => text,
            Err(err) => return op_failed(err, "cart page text"),
        };
        if deps.profile.cart_reads_empty(&page_text) {
            return Ok(CartProbe::Read(CartState::empty()));
        }

        let names = match Self::column(deps, TargetSlot::CartItemNames).await? {
            CartProbe::Read(names) => names,
            CartProbe::Failed(outcome) => return Ok(CartProbe::Failed(outcome)),
        };
        if names.is_empty() {
            // No rows and no empty marker: read it as empty rather than
            // invent rows the page does not show.
            debug!(target: "executor", "cart shows neither rows nor an empty marker");
            return Ok(CartProbe::Read(CartState::empty()));
        }
        let prices = match Self::column(deps, TargetSlot::CartItemPrices).await? {
            CartProbe::Read(prices) => prices,
            CartProbe::Failed(outcome) => return Ok(CartProbe::Failed(outcome)),
        };
        let quantities = match Self::column(deps, TargetSlot::CartItemQuantities).await? {
            CartProbe::Read(quantities) => quantities,
            CartProbe::Failed(outcome) => return Ok(CartProbe::Failed(outcome)),
        };

        // Columns zip by document order. A row missing its price or
        // quantity cell degrades that one field, not the read.
        let items = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| CartItem {
                name,
                price: prices.get(i).cloned().unwrap_or_default(),
                quantity: quantities
                    .get(i)
                    .and_then(|q| parse_count(q))
                    .unwrap_or(1),
            })
            .collect();
        Ok(CartProbe::Read(CartState::new(items)))
    }

    /// Opens the cart page in a scratch tab, reads it, and restores focus.
    /// Keeps the page the action was working on intact.
    pub async fn rebuild(deps: &ExecDeps<'_>) -> Result<CartProbe<CartState>, ExecError> {
        let home = match deps.driver.current_tab().await {
            Ok(tab) => tab,
            Err(err) => return op_failed(err, "current tab"),
        };
        let scratch = match deps.driver.open_tab(&deps.profile.cart_url).await {
            Ok(tab) => tab,
            Err(err) => return op_failed(err, "open cart tab"),
        };
        let read = Self::read_current(deps).await;
        // Focus back before closing so a close failure cannot strand the
        // session on the scratch tab.
        if let Err(err) = deps.driver.switch_tab(home).await {
            if err.is_fatal() {
                return Err(err.into());
            }
            trace!(target: "executor", %err, "could not switch back after cart read");
        }
        if let Err(err) = deps.driver.close_tab(scratch).await {
            if err.is_fatal() {
                return Err(err.into());
            }
            trace!(target: "executor", %err, "scratch cart tab left open");
        }
        read
    }

    /// Cheap unit count for before/after comparisons: the badge when the
    /// profile has one, a full rebuild otherwise. A missing badge element
    /// reads as zero; sites hide it when the cart is empty.
    pub async fn unit_count(deps: &ExecDeps<'_>) -> Result<CartProbe<u32>, ExecError> {
        if let Some(badge) = deps.profile.target(TargetSlot::CartBadge) {
            let res = match deps
                .resolver
                .resolve(deps.driver, badge, &ResolveOptions::marker())
                .await
            {
                Ok(res) => res,
                Err(LocatorError::NotFound { .. }) => return Ok(CartProbe::Read(0)),
                Err(LocatorError::Driver(err)) => return op_failed(err, "cart badge"),
            };
            let text = match deps.driver.text_of(&res.handle).await {
                Ok(text) => text,
                Err(err) => return op_failed(err, "cart badge"),
            };
            return Ok(CartProbe::Read(parse_count(&text).unwrap_or(0)));
        }
        match Self::rebuild(deps).await? {
            CartProbe::Read(state) => Ok(CartProbe::Read(state.total_units())),
            CartProbe::Failed(outcome) => Ok(CartProbe::Failed(outcome)),
        }
    }

    /// Texts of every match of one row column, document order. A column
    /// the profile does not define reads as no rows.
    async fn column(
        deps: &ExecDeps<'_>,
        slot: TargetSlot,
    ) -> Result<CartProbe<Vec<String>>, ExecError> {
        let Some(target) = deps.profile.target(slot) else {
            return Ok(CartProbe::Read(Vec::new()));
        };
        let set = match deps
            .resolver
            .resolve_all(deps.driver, target, &ResolveOptions::marker())
            .await
        {
            Ok(set) => set,
            Err(LocatorError::NotFound { .. }) => return Ok(CartProbe::Read(Vec::new())),
            Err(LocatorError::Driver(err)) => return op_failed(err, slot.name()),
        };
        let mut texts = Vec::with_capacity(set.handles.len());
        for handle in &set.handles {
            match deps.driver.text_of(handle).await {
                Ok(text) => texts.push(text.trim().to_string()),
                Err(err) => return op_failed(err, slot.name()),
            }
        }
        Ok(CartProbe::Read(texts))
    }
}

/// First run of digits in `text`: "Cart (3)" is 3, "12 items" is 12.
pub(crate) fn parse_count(text: &str) -> Option<u32> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
