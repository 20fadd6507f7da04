use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use trolley_core_types::LocatorStrategy;

use crate::errors::DriverError;

/// Opaque driver-issued token for one element. Valid only until the page
/// mutates; after that every operation on it answers
/// [`DriverError::StaleHandle`].
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ElementHandle(String);

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TabId(pub u64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab-{}", self.0)
    }
}

/// Everything the executor is allowed to ask of a browser. One session owns
/// exactly one driver; implementations must be safe to call from that one
/// task ([`Send`] + [`Sync`] because the trait object crosses spawn
/// boundaries, not because calls run concurrently).
#[async_trait]
pub trait Driver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    /// All matches for one strategy, in document order. Empty means "no
    /// match"; it is not an error.
    async fn find(&self, strategy: &LocatorStrategy) -> Result<Vec<ElementHandle>, DriverError>;

    async fn click(&self, element: &ElementHandle) -> Result<(), DriverError>;

    async fn send_text(
        &self,
        element: &ElementHandle,
        text: &str,
        clear_first: bool,
    ) -> Result<(), DriverError>;

    async fn press_enter(&self, element: &ElementHandle) -> Result<(), DriverError>;

    async fn is_visible(&self, element: &ElementHandle) -> Result<bool, DriverError>;

    async fn is_enabled(&self, element: &ElementHandle) -> Result<bool, DriverError>;

    async fn text_of(&self, element: &ElementHandle) -> Result<String, DriverError>;

    async fn attr(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DriverError>;

    /// Full rendered text of the current page; what barrier phrase matching
    /// runs against.
    async fn page_text(&self) -> Result<String, DriverError>;

    async fn page_html(&self) -> Result<String, DriverError>;

    async fn current_url(&self) -> Result<String, DriverError>;

    async fn current_tab(&self) -> Result<TabId, DriverError>;

    /// Opens `url` in a new tab and switches to it.
    async fn open_tab(&self, url: &str) -> Result<TabId, DriverError>;

    async fn switch_tab(&self, tab: TabId) -> Result<(), DriverError>;

    async fn close_tab(&self, tab: TabId) -> Result<(), DriverError>;
}

/// Forwarding impl so a shared driver can be handed out as `Box<dyn Driver>`
/// while the owner keeps a handle for inspection or teardown.
#[async_trait]
impl<D> Driver for Arc<D>
where
    D: Driver + ?Sized,
{
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        (**self).navigate(url).await
    }

    async fn find(&self, strategy: &LocatorStrategy) -> Result<Vec<ElementHandle>, DriverError> {
        (**self).find(strategy).await
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), DriverError> {
        (**self).click(element).await
    }

    async fn send_text(
        &self,
        element: &ElementHandle,
        text: &str,
        clear_first: bool,
    ) -> Result<(), DriverError> {
        (**self).send_text(element, text, clear_first).await
    }

    async fn press_enter(&self, element: &ElementHandle) -> Result<(), DriverError> {
        (**self).press_enter(element).await
    }

    async fn is_visible(&self, element: &ElementHandle) -> Result<bool, DriverError> {
        (**self).is_visible(element).await
    }

    async fn is_enabled(&self, element: &ElementHandle) -> Result<bool, DriverError> {
        (**self).is_enabled(element).await
    }

    async fn text_of(&self, element: &ElementHandle) -> Result<String, DriverError> {
        (**self).text_of(element).await
    }

    async fn attr(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        (**self).attr(element, name).await
    }

    async fn page_text(&self) -> Result<String, DriverError> {
        (**self).page_text().await
    }

    async fn page_html(&self) -> Result<String, DriverError> {
        (**self).page_html().await
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        (**self).current_url().await
    }

    async fn current_tab(&self) -> Result<TabId, DriverError> {
        (**self).current_tab().await
    }

    async fn open_tab(&self, url: &str) -> Result<TabId, DriverError> {
        (**self).open_tab(url).await
    }

    async fn switch_tab(&self, tab: TabId) -> Result<(), DriverError> {
        (**self).switch_tab(tab).await
    }

    async fn close_tab(&self, tab: TabId) -> Result<(), DriverError> {
        (**self).close_tab(tab).await
    }
}
