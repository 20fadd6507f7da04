use async_trait::async_trait;
use tracing::{debug, trace};

use trolley_core_types::{LocatorStrategy, TargetSpec};
use trolley_driver_port::{Driver, DriverError, ElementHandle};

use crate::errors::LocatorError;

/// Filters applied to raw driver matches before one is chosen.
#[derive(Clone, Debug)]
pub struct ResolveOptions {
    /// Pick the n-th (zero-based) usable match instead of the first.
    pub index: Option<usize>,
    pub require_visible: bool,
    pub require_enabled: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            index: None,
            require_visible: true,
            require_enabled: false,
        }
    }
}

impl ResolveOptions {
    /// For elements that are about to be clicked or typed into.
    pub fn clickable() -> Self {
        Self {
            require_enabled: true,
            ..Self::default()
        }
    }

    /// For markers that only have to exist and be visible.
    pub fn marker() -> Self {
        Self::default()
    }

    pub fn at_index(mut self, index: Option<usize>) -> Self {
        self.index = index;
        self
    }
}

/// A successful resolution. `strategy_index` is the telemetry the outcome
/// carries upward: which entry of the fallback list still works.
#[derive(Clone, Debug)]
pub struct Resolution {
    pub handle: ElementHandle,
    pub strategy_index: usize,
    pub strategy: LocatorStrategy,
    /// Usable candidates the winning strategy produced.
    pub candidates: usize,
}

/// Every usable match the winning strategy produced, in document order.
/// Cart reads use this to walk item rows.
#[derive(Clone, Debug)]
pub struct ResolutionSet {
    pub handles: Vec<ElementHandle>,
    pub strategy_index: usize,
    pub strategy: LocatorStrategy,
}

#[async_trait]
pub trait ElementResolver: Send + Sync {
    async fn resolve(
        &self,
        driver: &dyn Driver,
        target: &TargetSpec,
        opts: &ResolveOptions,
    ) -> Result<Resolution, LocatorError>;

    /// Like [`resolve`](Self::resolve) but keeps every usable match of the
    /// winning strategy instead of choosing one. `opts.index` is ignored.
    async fn resolve_all(
        &self,
        driver: &dyn Driver,
        target: &TargetSpec,
        opts: &ResolveOptions,
    ) -> Result<ResolutionSet, LocatorError>;
}

/// Default resolver: walks the strategy list against the live page through
/// the driver port.
#[derive(Clone, Copy, Debug, Default)]
pub struct DriverResolver;

enum StrategyScan {
    /// Usable handles, in document order. Never empty.
    Kept(Vec<ElementHandle>),
    /// Note for the tried ledger: why this strategy produced nothing.
    Skipped(String),
}

impl DriverResolver {
    pub fn new() -> Self {
        Self
    }

    async fn usable(
        &self,
        driver: &dyn Driver,
        handle: &ElementHandle,
        opts: &ResolveOptions,
    ) -> Result<bool, DriverError> {
        if opts.require_visible && !driver.is_visible(handle).await? {
            return Ok(false);
        }
        if opts.require_enabled && !driver.is_enabled(handle).await? {
            return Ok(false);
        }
        Ok(true)
    }

    async fn scan(
        &self,
        driver: &dyn Driver,
        strategy: &LocatorStrategy,
        opts: &ResolveOptions,
    ) -> Result<StrategyScan, LocatorError> {
        let found = match driver.find(strategy).await {
            Ok(found) => found,
            Err(err) if err.is_fatal() => return Err(err.into()),
            Err(err) => {
                trace!(target: "locator", %strategy, %err, "strategy failed in driver");
                return Ok(StrategyScan::Skipped(format!("{strategy} -> {err}")));
            }
        };
        let raw = found.len();

        let mut kept = Vec::new();
        for handle in found {
            match self.usable(driver, &handle, opts).await {
                Ok(true) => kept.push(handle),
                Ok(false) => {}
                // The page shifted while we were filtering; the whole
                // resolution is suspect, let the caller rerun it.
                Err(err) => return Err(err.into()),
            }
        }

        if kept.is_empty() {
            return Ok(StrategyScan::Skipped(format!("{strategy} -> 0 usable of {raw}")));
        }
        Ok(StrategyScan::Kept(kept))
    }

    fn not_found(target: &TargetSpec, tried: Vec<String>) -> LocatorError {
        LocatorError::NotFound {
            target: target.label().to_string(),
            tried: if tried.is_empty() {
                "no strategies".to_string()
            } else {
                tried.join("; ")
            },
        }
    }
}

#[async_trait]
impl ElementResolver for DriverResolver {
    async fn resolve(
        &self,
        driver: &dyn Driver,
        target: &TargetSpec,
        opts: &ResolveOptions,
    ) -> Result<Resolution, LocatorError> {
        let mut tried: Vec<String> = Vec::new();

        for (strategy_index, strategy) in target.strategies().iter().enumerate() {
            let mut kept = match self.scan(driver, strategy, opts).await? {
                StrategyScan::Kept(kept) => kept,
                StrategyScan::Skipped(note) => {
                    tried.push(note);
                    continue;
                }
            };

            let candidates = kept.len();
            let chosen = match opts.index {
                None => kept.swap_remove(0),
                Some(i) if i < candidates => kept.swap_remove(i),
                Some(i) => {
                    tried.push(format!("{strategy} -> index {i} beyond {candidates} matches"));
                    continue;
                }
            };

            debug!(
                target: "locator",
                target_label = target.label(),
                %strategy,
                strategy_index,
                candidates,
                "resolved"
            );
            return Ok(Resolution {
                handle: chosen,
                strategy_index,
                strategy: strategy.clone(),
                candidates,
            });
        }

        Err(Self::not_found(target, tried))
    }

    async fn resolve_all(
        &self,
        driver: &dyn Driver,
        target: &TargetSpec,
        opts: &ResolveOptions,
    ) -> Result<ResolutionSet, LocatorError> {
        let mut tried: Vec<String> = Vec::new();

        for (strategy_index, strategy) in target.strategies().iter().enumerate() {
            let kept = match self.scan(driver, strategy, opts).await? {
                StrategyScan::Kept(kept) => kept,
                StrategyScan::Skipped(note) => {
                    tried.push(note);
                    continue;
                }
            };

            debug!(
                target: "locator",
                target_label = target.label(),
                %strategy,
                strategy_index,
                matches = kept.len(),
                "resolved all"
            );
            return Ok(ResolutionSet {
                handles: kept,
                strategy_index,
                strategy: strategy.clone(),
            });
        }

        Err(Self::not_found(target, tried))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use trolley_driver_port::{ScriptedDriver, ScriptedElement, ScriptedPage};

    const URL: &str = "https://shop.example/item";

    fn page() -> ScriptedPage {
        ScriptedPage::new(URL)
            .element(
                ScriptedElement::new("hidden_add")
                    .selector("button.hidden-add")
                    .text("ADD TO CART")
                    .hidden(),
            )
            .element(
                ScriptedElement::new("add_btn")
                    .selector("//button[contains(text(),\"ADD TO CART\")]")
                    .text("ADD TO CART"),
            )
            .element(
                ScriptedElement::new("row_a")
                    .selector("div.cart-row")
                    .text("first row"),
            )
            .element(
                ScriptedElement::new("row_b")
                    .selector("div.cart-row")
                    .text("second row"),
            )
            .element(
                ScriptedElement::new("dead_btn")
                    .selector("button.dead")
                    .disabled(),
            )
    }

    async fn driver() -> ScriptedDriver {
        let d = ScriptedDriver::with_pages(vec![page()]);
        d.navigate(URL).await.unwrap();
        d
    }

    fn spec(strategies: Vec<LocatorStrategy>) -> TargetSpec {
        TargetSpec::new("add to cart", strategies).unwrap()
    }

    #[tokio::test]
    async fn first_strategy_wins_when_it_matches() {
        let driver = driver().await;
        let target = spec(vec![
            LocatorStrategy::css("div.cart-row"),
            LocatorStrategy::text("add to cart"),
        ]);
        let res = DriverResolver::new()
            .resolve(&driver, &target, &ResolveOptions::default())
            .await
            .unwrap();
        assert_eq!(res.strategy_index, 0);
        assert_eq!(res.candidates, 2);
    }

    #[tokio::test]
    async fn falls_back_when_earlier_strategies_match_nothing() {
        let driver = driver().await;
        let target = spec(vec![
            LocatorStrategy::css("button.pdp-add-cart"),
            LocatorStrategy::xpath("//button[contains(text(),\"ADD TO CART\")]"),
        ]);
        let res = DriverResolver::new()
            .resolve(&driver, &target, &ResolveOptions::clickable())
            .await
            .unwrap();
        assert_eq!(res.strategy_index, 1);
    }

    #[tokio::test]
    async fn invisible_only_matches_fall_through() {
        let driver = driver().await;
        let target = spec(vec![
            LocatorStrategy::css("button.hidden-add"),
            LocatorStrategy::css("div.cart-row"),
        ]);
        let res = DriverResolver::new()
            .resolve(&driver, &target, &ResolveOptions::default())
            .await
            .unwrap();
        assert_eq!(res.strategy_index, 1);
    }

    #[tokio::test]
    async fn disabled_elements_fail_clickable_resolution() {
        let driver = driver().await;
        let target = spec(vec![LocatorStrategy::css("button.dead")]);
        let err = DriverResolver::new()
            .resolve(&driver, &target, &ResolveOptions::clickable())
            .await
            .unwrap_err();
        assert!(matches!(err, LocatorError::NotFound { .. }));

        // Without the enabled requirement the same element resolves.
        let res = DriverResolver::new()
            .resolve(&driver, &target, &ResolveOptions::default())
            .await
            .unwrap();
        assert_eq!(res.strategy_index, 0);
    }

    #[tokio::test]
    async fn index_addresses_the_nth_match() {
        let driver = driver().await;
        let target = spec(vec![LocatorStrategy::css("div.cart-row")]);
        let opts = ResolveOptions::default().at_index(Some(1));
        let res = DriverResolver::new()
            .resolve(&driver, &target, &opts)
            .await
            .unwrap();
        assert_eq!(driver.text_of(&res.handle).await.unwrap(), "second row");
    }

    #[tokio::test]
    async fn resolve_all_keeps_every_match_in_document_order() {
        let driver = driver().await;
        let target = spec(vec![
            LocatorStrategy::css("div.absent"),
            LocatorStrategy::css("div.cart-row"),
        ]);
        let set = DriverResolver::new()
            .resolve_all(&driver, &target, &ResolveOptions::default())
            .await
            .unwrap();
        assert_eq!(set.strategy_index, 1);
        assert_eq!(set.handles.len(), 2);
        assert_eq!(driver.text_of(&set.handles[0]).await.unwrap(), "first row");
        assert_eq!(driver.text_of(&set.handles[1]).await.unwrap(), "second row");
    }

    #[tokio::test]
    async fn out_of_range_index_reports_not_found() {
        let driver = driver().await;
        let target = spec(vec![LocatorStrategy::css("div.cart-row")]);
        let opts = ResolveOptions::default().at_index(Some(5));
        let err = DriverResolver::new()
            .resolve(&driver, &target, &opts)
            .await
            .unwrap_err();
        let LocatorError::NotFound { tried, .. } = err else {
            panic!("expected NotFound");
        };
        assert!(tried.contains("index 5"));
    }

    #[tokio::test]
    async fn not_found_lists_every_strategy_tried() {
        let driver = driver().await;
        let target = spec(vec![
            LocatorStrategy::css("button.one"),
            LocatorStrategy::css("button.two"),
        ]);
        let err = DriverResolver::new()
            .resolve(&driver, &target, &ResolveOptions::default())
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("button.one"));
        assert!(msg.contains("button.two"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn fatal_driver_errors_abort_resolution() {
        let driver = driver().await;
        driver.disconnect("connection reset");
        let target = spec(vec![LocatorStrategy::css("div.cart-row")]);
        let err = DriverResolver::new()
            .resolve(&driver, &target, &ResolveOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
