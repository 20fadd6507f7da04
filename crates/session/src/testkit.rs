//! Scripted shop worlds shared by the test modules in this crate.

use std::sync::Arc;

use trolley_core_types::{LocatorStrategy, SiteId, TargetSpec};
use trolley_driver_port::{ScriptedDriver, ScriptedEffect, ScriptedElement, ScriptedPage};
use trolley_policy::PolicyView;
use trolley_site_profiles::{default_barriers, SiteProfile, TargetTable};

use crate::api::SessionHandle;

pub(crate) const ITEM: &str = "https://shop.example/item";
pub(crate) const CART: &str = "https://shop.example/cart";
pub(crate) const LOGIN: &str = "https://shop.example/login";

pub(crate) fn fast_policy() -> PolicyView {
    let mut policy = PolicyView::default();
    policy.exec.max_attempts = 2;
    policy.exec.backoff_ms = 5;
    policy.exec.step_timeout_ms = 2_000;
    policy.exec.action_timeout_ms = 8_000;
    policy.exec.settle_ms = 5;
    policy.verify.verify_timeout_ms = 300;
    policy.verify.poll_interval_ms = 10;
    policy.verify.confirm_window_ms = 150;
    policy
}

pub(crate) fn shop_profile() -> SiteProfile {
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

/// Product page whose add button keeps the badge and the cart row in sync.
pub(crate) fn item_page() -> ScriptedPage {
    ScriptedPage::new(ITEM)
        .text("Wireless Earphones. Great sound, no wires.")
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
        )
}

/// Product page whose add button kills the browser connection. The click
/// itself lands; the verification read-back after it is what dies.
pub(crate) fn dead_add_page() -> ScriptedPage {
    ScriptedPage::new(ITEM)
        .text("Wireless Earphones. Great sound, no wires.")
        .element(
            ScriptedElement::new("badge")
                .selector("span.cart-badge")
                .text("0"),
        )
        .element(
            ScriptedElement::new("add")
                .selector("button.add-to-cart")
                .text("ADD TO CART")
                .on_click(ScriptedEffect::Disconnect {
                    reason: "chrome went away".to_string(),
                }),
        )
}

pub(crate) fn cart_row_page(qty: u32) -> ScriptedPage {
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

/// The OTP walk: request-otp reveals the code field, verify reveals the
/// signed-in account menu.
pub(crate) fn login_page() -> ScriptedPage {
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

/// Login page that throws up the rate-limit wall on the first submit.
pub(crate) fn walled_login_page() -> ScriptedPage {
    ScriptedPage::new(LOGIN)
        .text("Sign in with your email")
        .element(ScriptedElement::new("email").selector("input#email"))
        .element(
            ScriptedElement::new("request_otp")
                .selector("button.request-otp")
                .text("Request OTP")
                .on_click(ScriptedEffect::AppendPageText {
                    page: None,
                    text: " Limit reached. Try again later.".to_string(),
                }),
        )
}

/// Opens a session over a scripted shop and keeps a spy handle on the
/// driver for steering pages and reading the interaction ledgers.
pub(crate) fn open_session(
    pages: Vec<ScriptedPage>,
    policy: PolicyView,
) -> (SessionHandle, Arc<ScriptedDriver>) {
    let driver = Arc::new(ScriptedDriver::with_pages(pages));
    let spy = Arc::clone(&driver);
    let session = SessionHandle::open(Box::new(driver), shop_profile(), policy);
    (session, spy)
}
