//! Site profiles: everything site-specific, as data.
//!
//! A profile maps the well-known element roles (search box, add-to-cart
//! button, cart rows, OTP field, ...) to ordered strategy lists, and carries
//! the site's barrier rules and cart-page markers. Supporting a new site or
//! chasing a markup change means editing a profile file, not code.

mod builtin;
mod errors;
mod loader;
mod model;

pub use builtin::{builtin_profiles, default_barriers, default_empty_cart_markers};
pub use errors::ProfileError;
pub use loader::{load_dir, load_file, ProfileRegistry};
pub use model::{BarrierRule, SiteProfile, TargetSlot, TargetTable};
