//! Builtin profiles and default rule sets.
//!
//! Real production selector strings are operator data shipped as profile
//! files; the builtins exist so the workspace runs out of the box: `demo`
//! drives the scripted driver, `generic-retail` is the template operators
//! copy.

use once_cell::sync::Lazy;

use trolley_core_types::{LocatorStrategy, SiteId, TargetSpec};

use crate::model::{BarrierRule, SiteProfile, TargetTable};

/// Rate-limit and interstitial phrasing that shows up across retail sites.
pub fn default_barriers() -> Vec<BarrierRule> {
    vec![
        BarrierRule::new(
            "rate_limited",
            vec![
                "too many attempts",
                "temporarily blocked",
                "rate limit",
                "try again later",
                "account locked",
                "limit reached",
            ],
        ),
        BarrierRule::new(
            "captcha",
            vec!["verify you are human", "unusual traffic", "captcha"],
        ),
    ]
}

pub fn default_empty_cart_markers() -> Vec<String> {
    ["your cart is empty", "missing cart items", "no items in your cart"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

static BUILTINS: Lazy<Vec<SiteProfile>> = Lazy::new(|| vec![demo_profile(), generic_retail()]);

pub fn builtin_profiles() -> Vec<SiteProfile> {
    BUILTINS.clone()
}

/// Wired to the scripted world the CLI `exercise` command and the workspace
/// tests build: stable selectors, no markup drift.
fn demo_profile() -> SiteProfile {
    SiteProfile {
        id: SiteId::new("demo"),
        display_name: "Demo Shop".to_string(),
        base_url: "https://shop.example/".to_string(),
        login_url: Some("https://shop.example/login".to_string()),
        cart_url: "https://shop.example/cart".to_string(),
        targets: TargetTable {
            search_box: Some(TargetSpec::single(
                "search box",
                LocatorStrategy::css("input#search"),
            )),
            search_results: Some(TargetSpec::single(
                "search results",
                LocatorStrategy::css("div.results"),
            )),
            add_to_cart: Some(
                TargetSpec::single("add to cart", LocatorStrategy::css("button.add-to-cart"))
                    .with_fallback(LocatorStrategy::text("add to cart")),
            ),
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
            identifier_submit: Some(
                TargetSpec::single("request otp", LocatorStrategy::css("button.request-otp"))
                    .with_fallback(LocatorStrategy::text("request otp")),
            ),
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
            otp_challenge_marker: Some(TargetSpec::single(
                "otp challenge",
                LocatorStrategy::css("input#otp"),
            )),
            dialog_confirm: Some(
                TargetSpec::single("dialog confirm", LocatorStrategy::css("button.dialog-ok"))
                    .with_fallback(LocatorStrategy::text("ok")),
            ),
        },
        empty_cart_markers: default_empty_cart_markers(),
        barriers: default_barriers(),
    }
}

/// Starting point for a real site: the selector patterns that survive
/// longest across retail markup, ordered sturdy-first.
fn generic_retail() -> SiteProfile {
    SiteProfile {
        id: SiteId::new("generic-retail"),
        display_name: "Generic Retail Template".to_string(),
        base_url: "https://www.example.com/".to_string(),
        login_url: Some("https://www.example.com/login".to_string()),
        cart_url: "https://www.example.com/cart".to_string(),
        targets: TargetTable {
            search_box: Some(
                TargetSpec::single("search box", LocatorStrategy::css("input[name='q']"))
                    .with_fallback(LocatorStrategy::css("input[type='search']"))
                    .with_fallback(LocatorStrategy::xpath("//input[@placeholder]")),
            ),
            search_results: Some(
                TargetSpec::single(
                    "search results",
                    LocatorStrategy::css("[data-component='search-results']"),
                )
                .with_fallback(LocatorStrategy::css("div.search-results")),
            ),
            add_to_cart: Some(
                TargetSpec::single(
                    "add to cart",
                    LocatorStrategy::css("[data-testid='add-to-cart']"),
                )
                .with_fallback(LocatorStrategy::xpath(
                    "//button[contains(translate(text(),'ADD','add'),'add')]",
                ))
                .with_fallback(LocatorStrategy::text("add to cart")),
            ),
            cart_badge: Some(
                TargetSpec::single("cart badge", LocatorStrategy::css("[data-testid='cart-count']"))
                    .with_fallback(LocatorStrategy::css("span.cart-count")),
            ),
            cart_item_names: Some(TargetSpec::single(
                "cart item names",
                LocatorStrategy::css("[data-testid='cart-item-title']"),
            )),
            cart_item_prices: Some(TargetSpec::single(
                "cart item prices",
                LocatorStrategy::css("[data-testid='cart-item-price']"),
            )),
            cart_item_quantities: Some(TargetSpec::single(
                "cart item quantities",
                LocatorStrategy::css("[data-testid='cart-item-qty']"),
            )),
            remove_item: Some(
                TargetSpec::single("remove item", LocatorStrategy::css("[data-testid='remove']"))
                    .with_fallback(LocatorStrategy::text("remove")),
            ),
            remove_confirm: Some(
                TargetSpec::single(
                    "remove confirmation",
                    LocatorStrategy::css("[data-testid='confirm-remove']"),
                )
                .with_fallback(LocatorStrategy::text("remove")),
            ),
            identifier_field: Some(
                TargetSpec::single(
                    "identifier field",
                    LocatorStrategy::css("input[type='email']"),
                )
                .with_fallback(LocatorStrategy::css("input[name='email']"))
                .with_fallback(LocatorStrategy::css("input[type='tel']")),
            ),
            identifier_submit: Some(
                TargetSpec::single("continue", LocatorStrategy::text("request otp"))
                    .with_fallback(LocatorStrategy::text("continue"))
                    .with_fallback(LocatorStrategy::css("button[type='submit']")),
            ),
            otp_field: Some(
                TargetSpec::single(
                    "otp field",
                    LocatorStrategy::xpath("//input[@maxlength='6' and @type='text']"),
                )
                .with_fallback(LocatorStrategy::css("input[autocomplete='one-time-code']")),
            ),
            otp_submit: Some(
                TargetSpec::single("verify", LocatorStrategy::text("verify"))
                    .with_fallback(LocatorStrategy::css("button[type='submit']")),
            ),
            signed_in_marker: Some(
                TargetSpec::single("account menu", LocatorStrategy::css("[data-testid='account']"))
                    .with_fallback(LocatorStrategy::text("my account")),
            ),
            otp_challenge_marker: Some(TargetSpec::single(
                "otp challenge",
                LocatorStrategy::xpath("//input[@maxlength='6' and @type='text']"),
            )),
            dialog_confirm: Some(
                TargetSpec::single("dialog confirm", LocatorStrategy::text("confirm"))
                    .with_fallback(LocatorStrategy::text("ok")),
            ),
        },
        empty_cart_markers: default_empty_cart_markers(),
        barriers: default_barriers(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TargetSlot;

    #[test]
    fn builtins_cover_the_demo_and_the_template() {
        let profiles = builtin_profiles();
        let ids: Vec<&str> = profiles.iter().map(|p| p.id.as_str()).collect();
        assert!(ids.contains(&"demo"));
        assert!(ids.contains(&"generic-retail"));
    }

    #[test]
    fn every_builtin_detects_rate_limiting() {
        for profile in builtin_profiles() {
            let hit = profile.detect_barrier("Too many attempts, try again later");
            assert_eq!(
                hit.map(|r| r.reason.as_str()),
                Some("rate_limited"),
                "profile {} misses the default barrier",
                profile.id
            );
        }
    }

    #[test]
    fn demo_profile_has_the_full_cart_path() {
        let profiles = builtin_profiles();
        let demo = profiles.iter().find(|p| p.id.as_str() == "demo").unwrap();
        for slot in [
            TargetSlot::AddToCart,
            TargetSlot::CartItemNames,
            TargetSlot::RemoveItem,
            TargetSlot::RemoveConfirm,
        ] {
            assert!(demo.target(slot).is_some(), "demo profile misses {slot}");
        }
    }
}
