use std::fmt;

use serde::{Deserialize, Serialize};

use trolley_core_types::{SiteId, TargetSpec};

/// The element roles the executor knows how to ask a profile for.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TargetSlot {
    SearchBox,
    SearchResults,
    AddToCart,
    CartBadge,
    CartItemNames,
    CartItemPrices,
    CartItemQuantities,
    RemoveItem,
    RemoveConfirm,
    IdentifierField,
    IdentifierSubmit,
    OtpField,
    OtpSubmit,
    SignedInMarker,
    OtpChallengeMarker,
    DialogConfirm,
}

impl TargetSlot {
    pub fn name(&self) -> &'static str {
        match self {
            TargetSlot::SearchBox => "search_box",
            TargetSlot::SearchResults => "search_results",
            TargetSlot::AddToCart => "add_to_cart",
            TargetSlot::CartBadge => "cart_badge",
            TargetSlot::CartItemNames => "cart_item_names",
            TargetSlot::CartItemPrices => "cart_item_prices",
            TargetSlot::CartItemQuantities => "cart_item_quantities",
            TargetSlot::RemoveItem => "remove_item",
            TargetSlot::RemoveConfirm => "remove_confirm",
            TargetSlot::IdentifierField => "identifier_field",
            TargetSlot::IdentifierSubmit => "identifier_submit",
            TargetSlot::OtpField => "otp_field",
            TargetSlot::OtpSubmit => "otp_submit",
            TargetSlot::SignedInMarker => "signed_in_marker",
            TargetSlot::OtpChallengeMarker => "otp_challenge_marker",
            TargetSlot::DialogConfirm => "dialog_confirm",
        }
    }
}

impl fmt::Display for TargetSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One strategy list per element role. Roles a site does not have stay
/// `None`; asking for them yields a clean "this site can't do that".
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TargetTable {
    #[serde(default)]
    pub search_box: Option<TargetSpec>,
    #[serde(default)]
    pub search_results: Option<TargetSpec>,
    #[serde(default)]
    pub add_to_cart: Option<TargetSpec>,
    #[serde(default)]
    pub cart_badge: Option<TargetSpec>,
    #[serde(default)]
    pub cart_item_names: Option<TargetSpec>,
    #[serde(default)]
    pub cart_item_prices: Option<TargetSpec>,
    #[serde(default)]
    pub cart_item_quantities: Option<TargetSpec>,
    #[serde(default)]
    pub remove_item: Option<TargetSpec>,
    #[serde(default)]
    pub remove_confirm: Option<TargetSpec>,
    #[serde(default)]
    pub identifier_field: Option<TargetSpec>,
    #[serde(default)]
    pub identifier_submit: Option<TargetSpec>,
    #[serde(default)]
    pub otp_field: Option<TargetSpec>,
    #[serde(default)]
    pub otp_submit: Option<TargetSpec>,
    #[serde(default)]
    pub signed_in_marker: Option<TargetSpec>,
    #[serde(default)]
    pub otp_challenge_marker: Option<TargetSpec>,
    #[serde(default)]
    pub dialog_confirm: Option<TargetSpec>,
}

impl TargetTable {
    pub fn get(&self, slot: TargetSlot) -> Option<&TargetSpec> {
        match slot {
            TargetSlot::SearchBox => self.search_box.as_ref(),
            TargetSlot::SearchResults => self.search_results.as_ref(),
            TargetSlot::AddToCart => self.add_to_cart.as_ref(),
            TargetSlot::CartBadge => self.cart_badge.as_ref(),
            TargetSlot::CartItemNames => self.cart_item_names.as_ref(),
            TargetSlot::CartItemPrices => self.cart_item_prices.as_ref(),
            TargetSlot::CartItemQuantities => self.cart_item_quantities.as_ref(),
            TargetSlot::RemoveItem => self.remove_item.as_ref(),
            TargetSlot::RemoveConfirm => self.remove_confirm.as_ref(),
            TargetSlot::IdentifierField => self.identifier_field.as_ref(),
            TargetSlot::IdentifierSubmit => self.identifier_submit.as_ref(),
            TargetSlot::OtpField => self.otp_field.as_ref(),
            TargetSlot::OtpSubmit => self.otp_submit.as_ref(),
            TargetSlot::SignedInMarker => self.signed_in_marker.as_ref(),
            TargetSlot::OtpChallengeMarker => self.otp_challenge_marker.as_ref(),
            TargetSlot::DialogConfirm => self.dialog_confirm.as_ref(),
        }
    }
}

/// A page condition that must stop execution. Matching is by lowercase
/// phrase against the page text; `marker` lets a site pin the rule to an
/// element instead of (or in addition to) text. `fatal` rules tear the whole
/// session down, not just the action.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BarrierRule {
    pub reason: String,
    #[serde(default)]
    pub phrases: Vec<String>,
    #[serde(default)]
    pub marker: Option<TargetSpec>,
    #[serde(default)]
    pub fatal: bool,
}

impl BarrierRule {
    pub fn new(reason: impl Into<String>, phrases: Vec<&str>) -> Self {
        Self {
            reason: reason.into(),
            phrases: phrases.into_iter().map(str::to_string).collect(),
            marker: None,
            fatal: false,
        }
    }

    /// `page_text` must already be lowercased by the caller.
    pub fn matches_text(&self, page_text: &str) -> bool {
        self.phrases
            .iter()
            .any(|phrase| page_text.contains(&phrase.to_lowercase()))
    }
}

/// Everything Trolley knows about one site. Pure data, serde round-trips.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SiteProfile {
    pub id: SiteId,
    pub display_name: String,
    pub base_url: String,
    #[serde(default)]
    pub login_url: Option<String>,
    pub cart_url: String,
    #[serde(default)]
    pub targets: TargetTable,
    /// Lowercase phrases whose presence on the cart page means "empty".
    #[serde(default)]
    pub empty_cart_markers: Vec<String>,
    #[serde(default)]
    pub barriers: Vec<BarrierRule>,
}

impl SiteProfile {
    pub fn target(&self, slot: TargetSlot) -> Option<&TargetSpec> {
        self.targets.get(slot)
    }

    /// First barrier rule whose phrases appear in the page text.
    pub fn detect_barrier(&self, page_text: &str) -> Option<&BarrierRule> {
        let lower = page_text.to_lowercase();
        self.barriers.iter().find(|rule| rule.matches_text(&lower))
    }

    pub fn cart_reads_empty(&self, page_text: &str) -> bool {
        let lower = page_text.to_lowercase();
        self.empty_cart_markers
            .iter()
            .any(|marker| lower.contains(&marker.to_lowercase()))
    }
}
