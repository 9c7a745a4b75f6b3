//! Selectors, locator registries and resolved locators.
//!
//! A page object never hands raw selector strings to the driver. It names its
//! elements once, in a [`LocatorRegistry`], and every action looks the
//! element up by that semantic name.
//!
//! # Design
//!
//! - **Validated at construction**: a malformed selector fails when the page
//!   object is built, not halfway through a scenario
//! - **Immutable**: registries have no mutation API after `build()`
//! - **Pluggable**: a [`SelectorStrategy`] decides how a name becomes a
//!   selector, so brittle generated ids can be swapped for `data-testid`
//!   attributes without touching callers

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::result::{PageflowError, PageflowResult};

/// Selector type for locating elements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum Selector {
    /// CSS selector (e.g., "li.todo_list_item")
    Css(String),
    /// XPath selector
    XPath(String),
    /// Nodes whose own text contains the string
    Text(String),
    /// Test ID selector (`data-testid` attribute)
    TestId(String),
    /// Arbitrary attribute equality
    Attribute {
        /// Attribute name
        name: String,
        /// Expected value
        value: String,
    },
    /// CSS selector filtered by (descendant) text content
    CssWithText {
        /// Base CSS selector
        css: String,
        /// Text content to match
        text: String,
    },
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create an XPath selector
    #[must_use]
    pub fn xpath(path: impl Into<String>) -> Self {
        Self::XPath(path.into())
    }

    /// Create a test ID selector
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::TestId(id.into())
    }

    /// Create a text selector
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create an attribute selector
    #[must_use]
    pub fn attribute(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Attribute {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Narrow a CSS selector to nodes containing `text`.
    ///
    /// Non-CSS selectors are returned unchanged.
    #[must_use]
    pub fn with_text(self, text: impl Into<String>) -> Self {
        match self {
            Self::Css(css) => Self::CssWithText {
                css,
                text: text.into(),
            },
            other => other,
        }
    }

    /// Check the selector is well-formed
    pub fn validate(&self) -> PageflowResult<()> {
        let invalid = |reason: &str| {
            Err(PageflowError::InvalidSelector {
                selector: self.to_string(),
                reason: reason.to_string(),
            })
        };
        match self {
            Self::Css(css) | Self::CssWithText { css, .. } => {
                if css.trim().is_empty() {
                    return invalid("empty css selector");
                }
                if let Err(reason) = check_balanced(css) {
                    return invalid(reason);
                }
                Ok(())
            }
            Self::XPath(path) => {
                let path = path.trim();
                if path.is_empty() {
                    return invalid("empty xpath");
                }
                if !(path.starts_with('/') || path.starts_with('(')) {
                    return invalid("xpath must start with '/' or '('");
                }
                if let Err(reason) = check_balanced(path) {
                    return invalid(reason);
                }
                Ok(())
            }
            Self::Text(text) if text.trim().is_empty() => invalid("empty text"),
            Self::TestId(id) if id.trim().is_empty() => invalid("empty test id"),
            Self::Attribute { name, .. }
                if name.is_empty() || name.chars().any(char::is_whitespace) =>
            {
                invalid("attribute name must be a single token")
            }
            _ => Ok(()),
        }
    }

    /// JavaScript expression evaluating to an array of matching elements.
    ///
    /// `scope` is a JS expression for the root node (e.g. `document`). Every
    /// selector value is emitted as a JSON string literal.
    #[must_use]
    pub fn to_query_all(&self, scope: &str) -> String {
        match self {
            Self::Css(s) => format!("Array.from({scope}.querySelectorAll({}))", js_str(s)),
            Self::XPath(s) => format!(
                "(() => {{ const r = document.evaluate({}, {scope}, null, \
                 XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); \
                 const out = []; for (let i = 0; i < r.snapshotLength; i++) out.push(r.snapshotItem(i)); \
                 return out; }})()",
                js_str(s)
            ),
            Self::Text(t) => format!(
                "Array.from({scope}.querySelectorAll('*')).filter(el => Array.from(el.childNodes)\
                 .filter(n => n.nodeType === 3).map(n => n.textContent).join('').trim().includes({}))",
                js_str(t)
            ),
            Self::TestId(id) => {
                let css = format!("[data-testid=\"{}\"]", css_escape(id));
                format!("Array.from({scope}.querySelectorAll({}))", js_str(&css))
            }
            Self::Attribute { name, value } => {
                let css = format!("[{name}=\"{}\"]", css_escape(value));
                format!("Array.from({scope}.querySelectorAll({}))", js_str(&css))
            }
            Self::CssWithText { css, text } => format!(
                "Array.from({scope}.querySelectorAll({})).filter(el => el.textContent.includes({}))",
                js_str(css),
                js_str(text)
            ),
        }
    }
}

/// JSON string literal, valid in JavaScript
pub(crate) fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// Escape a value for a double-quoted CSS attribute string
fn css_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\a "),
            _ => out.push(c),
        }
    }
    out
}

fn check_balanced(s: &str) -> Result<(), &'static str> {
    let mut stack = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in s.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
            continue;
        }
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '[' | '(' => stack.push(c),
            ']' => {
                if stack.pop() != Some('[') {
                    return Err("unbalanced brackets");
                }
            }
            ')' => {
                if stack.pop() != Some('(') {
                    return Err("unbalanced parentheses");
                }
            }
            _ => {}
        }
    }
    if quote.is_some() {
        return Err("unterminated quote");
    }
    if !stack.is_empty() {
        return Err("unbalanced brackets");
    }
    Ok(())
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(s) => write!(f, "css({s})"),
            Self::XPath(s) => write!(f, "xpath({s})"),
            Self::Text(t) => write!(f, "text({t:?})"),
            Self::TestId(id) => write!(f, "testid({id})"),
            Self::Attribute { name, value } => write!(f, "attr({name}={value:?})"),
            Self::CssWithText { css, text } => write!(f, "css({css}) >> text({text:?})"),
        }
    }
}

/// Maps a semantic element name to a selector
pub trait SelectorStrategy: Send + Sync {
    /// Strategy name, for diagnostics
    fn name(&self) -> &str;

    /// Selector for `element`, or `None` if the strategy has no mapping
    fn selector_for(&self, element: &str) -> Option<Selector>;
}

/// Raw CSS/id mapping, typically generated ids such as `#ctl00_Main_Save`
#[derive(Debug, Clone, Default)]
pub struct CssIdStrategy {
    ids: HashMap<String, String>,
}

impl CssIdStrategy {
    /// Create an empty mapping
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map an element name to a CSS selector
    #[must_use]
    pub fn with(mut self, element: impl Into<String>, css: impl Into<String>) -> Self {
        self.ids.insert(element.into(), css.into());
        self
    }
}

impl SelectorStrategy for CssIdStrategy {
    fn name(&self) -> &str {
        "css-id"
    }

    fn selector_for(&self, element: &str) -> Option<Selector> {
        self.ids.get(element).map(Selector::css)
    }
}

/// `data-testid` convention: element `save` maps to `[data-testid="{prefix}save"]`
#[derive(Debug, Clone, Default)]
pub struct TestIdStrategy {
    prefix: String,
}

impl TestIdStrategy {
    /// Strategy without a prefix
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend `prefix` to every test id
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl SelectorStrategy for TestIdStrategy {
    fn name(&self) -> &str {
        "test-id"
    }

    fn selector_for(&self, element: &str) -> Option<Selector> {
        Some(Selector::test_id(format!("{}{element}", self.prefix)))
    }
}

/// Immutable name → selector table owned by one page object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorRegistry {
    page: String,
    entries: BTreeMap<String, Selector>,
}

impl LocatorRegistry {
    /// Start building a registry for `page`
    #[must_use]
    pub fn builder(page: impl Into<String>) -> RegistryBuilder {
        RegistryBuilder {
            page: page.into(),
            strategy: None,
            entries: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Page this registry belongs to
    #[must_use]
    pub fn page(&self) -> &str {
        &self.page
    }

    /// Selector for `element`.
    ///
    /// # Panics
    ///
    /// An unknown element name is a bug in the page object, so this panics
    /// with the page and element name.
    #[must_use]
    pub fn get(&self, element: &str) -> &Selector {
        match self.entries.get(element) {
            Some(selector) => selector,
            None => panic!(
                "page '{}' has no locator named '{element}' (known: {})",
                self.page,
                self.names().join(", ")
            ),
        }
    }

    /// Selector for `element`, if registered
    #[must_use]
    pub fn try_get(&self, element: &str) -> Option<&Selector> {
        self.entries.get(element)
    }

    /// Registered element names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolved locator for `element`
    #[must_use]
    pub fn locator(&self, element: &str) -> Locator {
        Locator::new(element, self.get(element).clone())
    }
}

/// Builder for [`LocatorRegistry`]
pub struct RegistryBuilder {
    page: String,
    strategy: Option<Box<dyn SelectorStrategy>>,
    entries: Vec<(String, Selector)>,
    errors: Vec<String>,
}

impl fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("page", &self.page)
            .field("strategy", &self.strategy.as_ref().map(|s| s.name()))
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl RegistryBuilder {
    /// Strategy used by [`Self::element`]
    #[must_use]
    pub fn strategy(mut self, strategy: impl SelectorStrategy + 'static) -> Self {
        self.strategy = Some(Box::new(strategy));
        self
    }

    /// Register an explicit selector
    #[must_use]
    pub fn with(mut self, element: impl Into<String>, selector: Selector) -> Self {
        self.entries.push((element.into(), selector));
        self
    }

    /// Register an element resolved through the strategy
    #[must_use]
    pub fn element(mut self, element: impl Into<String>) -> Self {
        let element = element.into();
        let resolved = self
            .strategy
            .as_ref()
            .map(|s| (s.name().to_string(), s.selector_for(&element)));
        match resolved {
            Some((_, Some(selector))) => self.entries.push((element, selector)),
            Some((strategy, None)) => self
                .errors
                .push(format!("strategy '{strategy}' has no selector for '{element}'")),
            None => self
                .errors
                .push(format!("no strategy configured for '{element}'")),
        }
        self
    }

    /// Validate and freeze the registry
    pub fn build(self) -> PageflowResult<LocatorRegistry> {
        if let Some(err) = self.errors.into_iter().next() {
            return Err(PageflowError::config(format!("page '{}': {err}", self.page)));
        }
        let mut entries = BTreeMap::new();
        for (name, selector) in self.entries {
            selector.validate()?;
            if entries.insert(name.clone(), selector).is_some() {
                return Err(PageflowError::config(format!(
                    "page '{}': duplicate locator '{name}'",
                    self.page
                )));
            }
        }
        Ok(LocatorRegistry {
            page: self.page,
            entries,
        })
    }
}

/// A resolvable reference to one element: a registry entry, optionally
/// narrowed to the n-th match and then to a child within it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    label: String,
    selector: Selector,
    nth: Option<usize>,
    child: Option<(String, Selector)>,
}

impl Locator {
    /// Create a locator
    #[must_use]
    pub fn new(label: impl Into<String>, selector: Selector) -> Self {
        Self {
            label: label.into(),
            selector,
            nth: None,
            child: None,
        }
    }

    /// Pick the n-th (zero-based) match instead of requiring exactly one
    #[must_use]
    pub fn nth(mut self, index: usize) -> Self {
        self.nth = Some(index);
        self
    }

    /// Resolve `selector` inside the matched element
    #[must_use]
    pub fn child(mut self, label: impl Into<String>, selector: Selector) -> Self {
        self.child = Some((label.into(), selector));
        self
    }

    /// Semantic label
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Root selector
    #[must_use]
    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Index filter
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        self.nth
    }

    /// Child selector, if any
    #[must_use]
    pub fn child_selector(&self) -> Option<&Selector> {
        self.child.as_ref().map(|(_, s)| s)
    }

    /// Label plus the selectors involved, used in error messages
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = format!("{} [{}]", self.label, self.selector);
        if let Some(i) = self.nth {
            out.push_str(&format!(" nth={i}"));
        }
        if let Some((label, selector)) = &self.child {
            out.push_str(&format!(" >> {label} [{selector}]"));
        }
        out
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)?;
        if let Some(i) = self.nth {
            write!(f, "[{i}]")?;
        }
        if let Some((label, _)) = &self.child {
            write!(f, " >> {label}")?;
        }
        Ok(())
    }
}
