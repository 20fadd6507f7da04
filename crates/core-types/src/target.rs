use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TrolleyError;

/// How a selector expression is interpreted by the driver.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
    Css,
    XPath,
    /// Case-insensitive substring match against element text.
    Text,
}

impl SelectorKind {
    pub fn name(&self) -> &'static str {
        match self {
            SelectorKind::Css => "css",
            SelectorKind::XPath => "xpath",
            SelectorKind::Text => "text",
        }
    }
}

/// One way of finding an element: a selector expression plus the kind that
/// says how to interpret it. Strategies are data; sites ship ordered lists
/// of them and the resolver walks the list.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct LocatorStrategy {
    pub kind: SelectorKind,
    pub expression: String,
}

impl LocatorStrategy {
    pub fn new(kind: SelectorKind, expression: impl Into<String>) -> Self {
        Self {
            kind,
            expression: expression.into(),
        }
    }

    pub fn css(expression: impl Into<String>) -> Self {
        Self::new(SelectorKind::Css, expression)
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Self::new(SelectorKind::XPath, expression)
    }

    pub fn text(expression: impl Into<String>) -> Self {
        Self::new(SelectorKind::Text, expression)
    }
}

impl fmt::Display for LocatorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.name(), self.expression)
    }
}

/// Ordered, never-empty list of strategies for one logical page element.
/// The first entry is the preferred way in; the rest are fallbacks tried in
/// order when earlier ones match nothing.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTargetSpec")]
pub struct TargetSpec {
    label: String,
    strategies: Vec<LocatorStrategy>,
}

impl TargetSpec {
    pub fn new(
        label: impl Into<String>,
        strategies: Vec<LocatorStrategy>,
    ) -> Result<Self, TrolleyError> {
        if strategies.is_empty() {
            return Err(TrolleyError::new("target spec needs at least one strategy"));
        }
        Ok(Self {
            label: label.into(),
            strategies,
        })
    }

    pub fn single(label: impl Into<String>, strategy: LocatorStrategy) -> Self {
        Self {
            label: label.into(),
            strategies: vec![strategy],
        }
    }

    pub fn with_fallback(mut self, strategy: LocatorStrategy) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Short human-readable name used in diagnostics and events.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn strategies(&self) -> &[LocatorStrategy] {
        &self.strategies
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} strategies)", self.label, self.strategies.len())
    }
}

#[derive(Deserialize)]
struct RawTargetSpec {
    label: String,
    strategies: Vec<LocatorStrategy>,
}

impl TryFrom<RawTargetSpec> for TargetSpec {
    type Error = TrolleyError;

    fn try_from(raw: RawTargetSpec) -> Result<Self, Self::Error> {
        TargetSpec::new(raw.label, raw.strategies)
    }
}
