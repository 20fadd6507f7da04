//! Deterministic in-memory driver.
//!
//! A `ScriptedDriver` holds a set of scripted pages and plays back the
//! effects a click or an enter key has on them. It honors the full trait
//! contract, stale handles included: any mutation of a page bumps its
//! revision and every handle issued before that answers
//! [`DriverError::StaleHandle`]. Used by the workspace tests and by the CLI
//! `exercise` command; never by production wiring.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use trolley_core_types::{LocatorStrategy, SelectorKind};

use crate::errors::DriverError;
use crate::port::{Driver, ElementHandle, TabId};

fn default_true() -> bool {
    true
}

/// One scripted element. `selectors` lists the css/xpath expressions this
/// element answers to; text strategies match against `text` instead.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScriptedElement {
    pub label: String,
    #[serde(default)]
    pub selectors: Vec<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub attrs: HashMap<String, String>,
    #[serde(default)]
    pub on_click: Vec<ScriptedEffect>,
    #[serde(default)]
    pub on_enter: Vec<ScriptedEffect>,
}

impl ScriptedElement {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            selectors: Vec::new(),
            text: String::new(),
            visible: true,
            enabled: true,
            attrs: HashMap::new(),
            on_click: Vec::new(),
            on_enter: Vec::new(),
        }
    }

    pub fn selector(mut self, expression: impl Into<String>) -> Self {
        self.selectors.push(expression.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn on_click(mut self, effect: ScriptedEffect) -> Self {
        self.on_click.push(effect);
        self
    }

    pub fn on_enter(mut self, effect: ScriptedEffect) -> Self {
        self.on_enter.push(effect);
        self
    }

    fn matches(&self, strategy: &LocatorStrategy) -> bool {
        match strategy.kind {
            SelectorKind::Css | SelectorKind::XPath => self
                .selectors
                .iter()
                .any(|sel| sel == &strategy.expression),
            SelectorKind::Text => {
                !strategy.expression.is_empty()
                    && self
                        .text
                        .to_lowercase()
                        .contains(&strategy.expression.to_lowercase())
            }
        }
    }
}

/// One scripted page, keyed by its URL.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScriptedPage {
    pub url: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub elements: Vec<ScriptedElement>,
}

impl ScriptedPage {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            text: String::new(),
            elements: Vec::new(),
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn element(mut self, element: ScriptedElement) -> Self {
        self.elements.push(element);
        self
    }

    fn find_element(&self, label: &str) -> Option<&ScriptedElement> {
        self.elements.iter().find(|el| el.label == label)
    }

    fn find_element_mut(&mut self, label: &str) -> Option<&mut ScriptedElement> {
        self.elements.iter_mut().find(|el| el.label == label)
    }
}

/// What clicking (or pressing enter on) an element does to the scripted
/// world. `page: None` targets the page the interaction happened on.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum ScriptedEffect {
    Navigate { url: String },
    RemoveElement { page: Option<String>, label: String },
    Reveal { page: Option<String>, label: String },
    Hide { page: Option<String>, label: String },
    SetEnabled {
        page: Option<String>,
        label: String,
        enabled: bool,
    },
    SetElementText {
        page: Option<String>,
        label: String,
        text: String,
    },
    /// Parses the element's text as an integer (first run of digits, else 0)
    /// and adds `by`. Handy for cart badges.
    IncrementText {
        page: Option<String>,
        label: String,
        by: i64,
    },
    SetPageText { page: Option<String>, text: String },
    AppendPageText { page: Option<String>, text: String },
    InsertElement {
        page: Option<String>,
        element: ScriptedElement,
    },
    /// Simulates the browser dying mid-flight.
    Disconnect { reason: String },
}

struct PageState {
    def: ScriptedPage,
    revision: u64,
}

struct HandleRef {
    url: String,
    label: String,
    revision: u64,
}

struct TabState {
    id: TabId,
    url: String,
}

struct ScriptState {
    pages: HashMap<String, PageState>,
    tabs: Vec<TabState>,
    active: usize,
    next_tab: u64,
    next_handle: u64,
    handles: HashMap<String, HandleRef>,
    offline: Option<String>,
    clicks: HashMap<(String, String), u32>,
    typed: Vec<(String, String, String)>,
    navigations: Vec<String>,
}

impl ScriptState {
    fn active_url(&self) -> String {
        self.tabs[self.active].url.clone()
    }

    fn ensure_page(&mut self, url: &str) -> &mut PageState {
        self.pages
            .entry(url.to_string())
            .or_insert_with(|| PageState {
                def: ScriptedPage::new(url),
                revision: 0,
            })
    }

    fn load(&mut self, url: &str) {
        // A load is a fresh DOM; handles issued against the old one die.
        self.ensure_page(url).revision += 1;
        self.tabs[self.active].url = url.to_string();
        self.navigations.push(url.to_string());
    }
}

/// See the module docs. Construct with [`ScriptedDriver::new`] and feed it
/// pages, or deserialize `ScriptedPage`s straight from YAML.
pub struct ScriptedDriver {
    state: Mutex<ScriptState>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        let state = ScriptState {
            pages: HashMap::new(),
            tabs: vec![TabState {
                id: TabId(0),
                url: "about:blank".to_string(),
            }],
            active: 0,
            next_tab: 1,
            next_handle: 0,
            handles: HashMap::new(),
            offline: None,
            clicks: HashMap::new(),
            typed: Vec::new(),
            navigations: Vec::new(),
        };
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn with_pages(pages: Vec<ScriptedPage>) -> Self {
        let driver = Self::new();
        {
            let mut state = driver.state.lock();
            for page in pages {
                let url = page.url.clone();
                state.pages.insert(url, PageState { def: page, revision: 0 });
            }
        }
        driver
    }

    pub fn add_page(&self, page: ScriptedPage) {
        let mut state = self.state.lock();
        let url = page.url.clone();
        state.pages.insert(url, PageState { def: page, revision: 0 });
    }

    /// Cuts the connection: every call from here on fails fatally.
    pub fn disconnect(&self, reason: impl Into<String>) {
        self.state.lock().offline = Some(reason.into());
    }

    pub fn clicks_on(&self, url: &str, label: &str) -> u32 {
        self.state
            .lock()
            .clicks
            .get(&(url.to_string(), label.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn typed_into(&self, url: &str, label: &str) -> Vec<String> {
        self.state
            .lock()
            .typed
            .iter()
            .filter(|(u, l, _)| u == url && l == label)
            .map(|(_, _, text)| text.clone())
            .collect()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().navigations.clone()
    }

    fn guard(state: &ScriptState) -> Result<(), DriverError> {
        match &state.offline {
            Some(reason) => Err(DriverError::io(reason.clone())),
            None => Ok(()),
        }
    }

    fn resolve_handle<'a>(
        state: &'a ScriptState,
        handle: &ElementHandle,
    ) -> Result<(&'a HandleRef, &'a ScriptedElement), DriverError> {
        let meta = state
            .handles
            .get(handle.as_str())
            .ok_or_else(|| DriverError::stale(handle.as_str()))?;
        let current = &state.tabs[state.active].url;
        if &meta.url != current {
            return Err(DriverError::stale(handle.as_str()));
        }
        let page = state
            .pages
            .get(&meta.url)
            .ok_or_else(|| DriverError::stale(handle.as_str()))?;
        if page.revision != meta.revision {
            return Err(DriverError::stale(handle.as_str()));
        }
        let element = page
            .def
            .find_element(&meta.label)
            .ok_or_else(|| DriverError::stale(handle.as_str()))?;
        Ok((meta, element))
    }

    fn apply_effects(
        state: &mut ScriptState,
        origin_url: &str,
        effects: Vec<ScriptedEffect>,
    ) {
        for effect in effects {
            match effect {
                ScriptedEffect::Navigate { url } => {
                    state.load(&url);
                }
                ScriptedEffect::RemoveElement { page, label } => {
                    let url = page.unwrap_or_else(|| origin_url.to_string());
                    let page = state.ensure_page(&url);
                    page.def.elements.retain(|el| el.label != label);
                    page.revision += 1;
                }
                ScriptedEffect::Reveal { page, label } => {
                    let url = page.unwrap_or_else(|| origin_url.to_string());
                    let page = state.ensure_page(&url);
                    if let Some(el) = page.def.find_element_mut(&label) {
                        el.visible = true;
                    }
                    page.revision += 1;
                }
                ScriptedEffect::Hide { page, label } => {
                    let url = page.unwrap_or_else(|| origin_url.to_string());
                    let page = state.ensure_page(&url);
                    if let Some(el) = page.def.find_element_mut(&label) {
                        el.visible = false;
                    }
                    page.revision += 1;
                }
                ScriptedEffect::SetEnabled { page, label, enabled } => {
                    let url = page.unwrap_or_else(|| origin_url.to_string());
                    let page = state.ensure_page(&url);
                    if let Some(el) = page.def.find_element_mut(&label) {
                        el.enabled = enabled;
                    }
                    page.revision += 1;
                }
                ScriptedEffect::SetElementText { page, label, text } => {
                    let url = page.unwrap_or_else(|| origin_url.to_string());
                    let page = state.ensure_page(&url);
                    if let Some(el) = page.def.find_element_mut(&label) {
                        el.text = text;
                    }
                    page.revision += 1;
                }
                ScriptedEffect::IncrementText { page, label, by } => {
                    let url = page.unwrap_or_else(|| origin_url.to_string());
                    let page = state.ensure_page(&url);
                    if let Some(el) = page.def.find_element_mut(&label) {
                        let current: i64 = el
                            .text
                            .chars()
                            .skip_while(|c| !c.is_ascii_digit())
                            .take_while(|c| c.is_ascii_digit())
                            .collect::<String>()
                            .parse()
                            .unwrap_or(0);
                        el.text = (current + by).to_string();
                    }
                    page.revision += 1;
                }
                ScriptedEffect::SetPageText { page, text } => {
                    let url = page.unwrap_or_else(|| origin_url.to_string());
                    let page = state.ensure_page(&url);
                    page.def.text = text;
                    page.revision += 1;
                }
                ScriptedEffect::AppendPageText { page, text } => {
                    let url = page.unwrap_or_else(|| origin_url.to_string());
                    let page = state.ensure_page(&url);
                    page.def.text.push('\n');
                    page.def.text.push_str(&text);
                    page.revision += 1;
                }
                ScriptedEffect::InsertElement { page, element } => {
                    let url = page.unwrap_or_else(|| origin_url.to_string());
                    let page = state.ensure_page(&url);
                    page.def.elements.push(element);
                    page.revision += 1;
                }
                ScriptedEffect::Disconnect { reason } => {
                    state.offline = Some(reason);
                }
            }
        }
    }
}

impl Default for ScriptedDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        Self::guard(&state)?;
        debug!(target: "scripted_driver", url, "navigate");
        state.load(url);
        Ok(())
    }

    async fn find(&self, strategy: &LocatorStrategy) -> Result<Vec<ElementHandle>, DriverError> {
        let mut state = self.state.lock();
        Self::guard(&state)?;
        let url = state.active_url();
        let revision = state.ensure_page(&url).revision;
        let matched: Vec<String> = state
            .pages
            .get(&url)
            .map(|page| {
                page.def
                    .elements
                    .iter()
                    .filter(|el| el.matches(strategy))
                    .map(|el| el.label.clone())
                    .collect()
            })
            .unwrap_or_default();
        let mut handles = Vec::with_capacity(matched.len());
        for label in matched {
            let id = format!("h-{}", state.next_handle);
            state.next_handle += 1;
            state.handles.insert(
                id.clone(),
                HandleRef {
                    url: url.clone(),
                    label,
                    revision,
                },
            );
            handles.push(ElementHandle::new(id));
        }
        Ok(handles)
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        Self::guard(&state)?;
        let (url, label, effects) = {
            let (meta, el) = Self::resolve_handle(&state, element)?;
            (meta.url.clone(), meta.label.clone(), el.on_click.clone())
        };
        debug!(target: "scripted_driver", %url, %label, "click");
        *state
            .clicks
            .entry((url.clone(), label.clone()))
            .or_insert(0) += 1;
        Self::apply_effects(&mut state, &url, effects);
        Ok(())
    }

    async fn send_text(
        &self,
        element: &ElementHandle,
        text: &str,
        clear_first: bool,
    ) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        Self::guard(&state)?;
        let (url, label) = {
            let (meta, _) = Self::resolve_handle(&state, element)?;
            (meta.url.clone(), meta.label.clone())
        };
        if let Some(page) = state.pages.get_mut(&url) {
            if let Some(el) = page.def.find_element_mut(&label) {
                let value = el.attrs.entry("value".to_string()).or_default();
                if clear_first {
                    value.clear();
                }
                value.push_str(text);
            }
        }
        state.typed.push((url, label, text.to_string()));
        Ok(())
    }

    async fn press_enter(&self, element: &ElementHandle) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        Self::guard(&state)?;
        let (url, effects) = {
            let (meta, el) = Self::resolve_handle(&state, element)?;
            (meta.url.clone(), el.on_enter.clone())
        };
        Self::apply_effects(&mut state, &url, effects);
        Ok(())
    }

    async fn is_visible(&self, element: &ElementHandle) -> Result<bool, DriverError> {
        let state = self.state.lock();
        Self::guard(&state)?;
        let (_, el) = Self::resolve_handle(&state, element)?;
        Ok(el.visible)
    }

    async fn is_enabled(&self, element: &ElementHandle) -> Result<bool, DriverError> {
        let state = self.state.lock();
        Self::guard(&state)?;
        let (_, el) = Self::resolve_handle(&state, element)?;
        Ok(el.enabled)
    }

    async fn text_of(&self, element: &ElementHandle) -> Result<String, DriverError> {
        let state = self.state.lock();
        Self::guard(&state)?;
        let (_, el) = Self::resolve_handle(&state, element)?;
        Ok(el.text.clone())
    }

    async fn attr(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        let state = self.state.lock();
        Self::guard(&state)?;
        let (_, el) = Self::resolve_handle(&state, element)?;
        Ok(el.attrs.get(name).cloned())
    }

    async fn page_text(&self) -> Result<String, DriverError> {
        let state = self.state.lock();
        Self::guard(&state)?;
        let url = state.tabs[state.active].url.clone();
        let Some(page) = state.pages.get(&url) else {
            return Ok(String::new());
        };
        let mut text = page.def.text.clone();
        for el in page.def.elements.iter().filter(|el| el.visible) {
            if !el.text.is_empty() {
                text.push('\n');
                text.push_str(&el.text);
            }
        }
        Ok(text)
    }

    async fn page_html(&self) -> Result<String, DriverError> {
        let state = self.state.lock();
        Self::guard(&state)?;
        let url = state.tabs[state.active].url.clone();
        let Some(page) = state.pages.get(&url) else {
            return Ok(String::new());
        };
        let mut html = format!("<html data-url=\"{}\"><body>", page.def.url);
        for el in &page.def.elements {
            html.push_str(&format!(
                "<div data-label=\"{}\" data-visible=\"{}\">{}</div>",
                el.label, el.visible, el.text
            ));
        }
        html.push_str(&format!("<p>{}</p></body></html>", page.def.text));
        Ok(html)
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        let state = self.state.lock();
        Self::guard(&state)?;
        Ok(state.tabs[state.active].url.clone())
    }

    async fn current_tab(&self) -> Result<TabId, DriverError> {
        let state = self.state.lock();
        Self::guard(&state)?;
        Ok(state.tabs[state.active].id)
    }

    async fn open_tab(&self, url: &str) -> Result<TabId, DriverError> {
        let mut state = self.state.lock();
        Self::guard(&state)?;
        let id = TabId(state.next_tab);
        state.next_tab += 1;
        state.tabs.push(TabState {
            id,
            url: "about:blank".to_string(),
        });
        state.active = state.tabs.len() - 1;
        state.load(url);
        Ok(id)
    }

    async fn switch_tab(&self, tab: TabId) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        Self::guard(&state)?;
        match state.tabs.iter().position(|t| t.id == tab) {
            Some(index) => {
                state.active = index;
                Ok(())
            }
            None => Err(DriverError::UnknownTab {
                tab: tab.to_string(),
            }),
        }
    }

    async fn close_tab(&self, tab: TabId) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        Self::guard(&state)?;
        let Some(index) = state.tabs.iter().position(|t| t.id == tab) else {
            return Err(DriverError::UnknownTab {
                tab: tab.to_string(),
            });
        };
        let active_id = state.tabs[state.active].id;
        state.tabs.remove(index);
        if state.tabs.is_empty() {
            let next_tab = state.next_tab;
            state.tabs.push(TabState {
                id: TabId(next_tab),
                url: "about:blank".to_string(),
            });
            state.next_tab += 1;
            state.active = 0;
        } else if active_id == tab {
            state.active = 0;
        } else if let Some(pos) = state.tabs.iter().position(|t| t.id == active_id) {
            state.active = pos;
        }
        Ok(())
    }
}
