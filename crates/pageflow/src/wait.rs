//! Wait mechanisms.
//!
//! Everything that suspends a scenario goes through a [`Waiter`]: a deadline
//! plus a poll interval. Waiting for a selector, a URL or any other
//! [`Postcondition`] is a poll loop over plain driver primitives.

use regex::Regex;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

use crate::driver::BrowserDriver;
use crate::locator::Selector;
use crate::result::{PageflowError, PageflowResult};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default per-action timeout (5 seconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Default polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

// =============================================================================
// WAIT OPTIONS
// =============================================================================

/// Options for wait operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Timeout as a Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Poll interval as a Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// =============================================================================
// WAITER
// =============================================================================

/// Deadline-bound poll clock
#[derive(Debug)]
pub struct Waiter {
    deadline: Instant,
    poll: Duration,
    timeout_ms: u64,
}

impl Waiter {
    /// Start a waiter at the current instant
    #[must_use]
    pub fn new(options: &WaitOptions) -> Self {
        Self {
            deadline: Instant::now() + options.timeout(),
            poll: options.poll_interval().max(Duration::from_millis(1)),
            timeout_ms: options.timeout_ms,
        }
    }

    /// Sleep until the next poll. Returns `false` once the deadline has passed,
    /// after which the caller must give up.
    pub async fn tick(&mut self) -> bool {
        let now = Instant::now();
        if now >= self.deadline {
            return false;
        }
        let remaining = self.deadline - now;
        tokio::time::sleep(self.poll.min(remaining)).await;
        true
    }

    /// Configured timeout, for error messages
    #[must_use]
    pub const fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }
}

// =============================================================================
// URL PATTERNS
// =============================================================================

/// Expected URL for navigation waits
#[derive(Debug, Clone)]
pub enum UrlPattern {
    /// Whole URL equality (a trailing slash is not significant)
    Exact(String),
    /// Compares only the path of the current URL (`/App/Campaigns`)
    Path(String),
    /// `*` matches any run of characters; a leading `/` matches against the path
    Glob {
        /// Source pattern
        glob: String,
        /// Compiled, anchored form
        compiled: Regex,
    },
    /// Regular expression searched in the whole URL
    Regex(Regex),
}

impl UrlPattern {
    /// Interpret a pattern string.
    ///
    /// `regex:` prefix → regex, contains `*` → glob, leading `/` → path,
    /// anything else → exact.
    pub fn parse(pattern: &str) -> PageflowResult<Self> {
        if let Some(re) = pattern.strip_prefix("regex:") {
            return Regex::new(re)
                .map(Self::Regex)
                .map_err(|e| PageflowError::config(format!("invalid url regex {re:?}: {e}")));
        }
        if pattern.contains('*') {
            let body = pattern
                .split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(".*");
            let compiled = Regex::new(&format!("^{body}$"))
                .map_err(|e| PageflowError::config(format!("invalid url glob {pattern:?}: {e}")))?;
            return Ok(Self::Glob {
                glob: pattern.to_string(),
                compiled,
            });
        }
        if pattern.starts_with('/') {
            return Ok(Self::Path(pattern.to_string()));
        }
        Ok(Self::Exact(pattern.to_string()))
    }

    /// Whether `url` satisfies the pattern
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        match self {
            Self::Exact(expected) => {
                url == expected || url.trim_end_matches('/') == expected.trim_end_matches('/')
            }
            Self::Path(expected) => {
                let path = url_path(url);
                path == expected || path.trim_end_matches('/') == expected.trim_end_matches('/')
            }
            Self::Glob { glob, compiled } => {
                let subject = if glob.starts_with('/') { url_path(url) } else { url };
                compiled.is_match(subject)
            }
            Self::Regex(re) => re.is_match(url),
        }
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(s) | Self::Path(s) | Self::Glob { glob: s, .. } => write!(f, "{s}"),
            Self::Regex(re) => write!(f, "regex:{}", re.as_str()),
        }
    }
}

/// Path component of an absolute URL, without query or fragment
fn url_path(url: &str) -> &str {
    let rest = match url.find("://") {
        Some(i) => {
            let after = &url[i + 3..];
            match after.find('/') {
                Some(j) => &after[j..],
                None => "/",
            }
        }
        None => url,
    };
    let end = rest.find(['?', '#']).unwrap_or(rest.len());
    &rest[..end]
}

// =============================================================================
// POSTCONDITIONS
// =============================================================================

/// State a scenario waits for after an action
#[derive(Debug, Clone)]
pub enum Postcondition {
    /// At least one visible match
    ElementVisible(Selector),
    /// No visible match
    ElementHidden(Selector),
    /// Current URL matches
    UrlMatches(UrlPattern),
    /// Exactly `n` matches
    ElementCount(Selector, usize),
}

impl Postcondition {
    /// Evaluate once
    pub async fn check(&self, driver: &dyn BrowserDriver) -> PageflowResult<bool> {
        Ok(match self {
            Self::ElementVisible(sel) => driver.query(sel, None).await?.iter().any(|e| e.visible),
            Self::ElementHidden(sel) => !driver.query(sel, None).await?.iter().any(|e| e.visible),
            Self::UrlMatches(pattern) => pattern.matches(&driver.current_url().await?),
            Self::ElementCount(sel, n) => driver.query(sel, None).await?.len() == *n,
        })
    }
}

impl fmt::Display for Postcondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ElementVisible(sel) => write!(f, "{sel} to be visible"),
            Self::ElementHidden(sel) => write!(f, "{sel} to be hidden"),
            Self::UrlMatches(pattern) => write!(f, "url to match {pattern}"),
            Self::ElementCount(sel, n) => write!(f, "{sel} to match {n} elements"),
        }
    }
}

/// Poll `condition` until it holds or the timeout elapses (→ `WaitTimeout`)
pub async fn wait_until(
    driver: &dyn BrowserDriver,
    condition: &Postcondition,
    options: &WaitOptions,
) -> PageflowResult<()> {
    let mut waiter = Waiter::new(options);
    loop {
        if condition.check(driver).await? {
            return Ok(());
        }
        if !waiter.tick().await {
            return Err(PageflowError::WaitTimeout {
                condition: condition.to_string(),
                ms: waiter.timeout_ms(),
            });
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod options_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let opts = WaitOptions::default();
            assert_eq!(opts.timeout_ms, DEFAULT_TIMEOUT_MS);
            assert_eq!(opts.poll_interval(), Duration::from_millis(50));
        }

        #[test]
        fn test_builder() {
            let opts = WaitOptions::new().with_timeout(100).with_poll_interval(5);
            assert_eq!(opts.timeout(), Duration::from_millis(100));
            assert_eq!(opts.poll_interval_ms, 5);
        }
    }

    mod waiter_tests {
        use super::*;

        #[tokio::test]
        async fn test_waiter_expires() {
            let mut waiter = Waiter::new(&WaitOptions::new().with_timeout(20).with_poll_interval(5));
            let mut ticks = 0;
            while waiter.tick().await {
                ticks += 1;
                assert!(ticks < 1000);
            }
            assert!(ticks >= 1);
        }

        #[tokio::test]
        async fn test_zero_timeout_gives_up_immediately() {
            let mut waiter = Waiter::new(&WaitOptions::new().with_timeout(0));
            assert!(!waiter.tick().await);
        }
    }

    mod url_pattern_tests {
        use super::*;

        #[test]
        fn test_parse_kinds() {
            assert!(matches!(UrlPattern::parse("/App/Campaigns").unwrap(), UrlPattern::Path(_)));
            assert!(matches!(UrlPattern::parse("**/login*").unwrap(), UrlPattern::Glob { .. }));
            assert!(matches!(UrlPattern::parse("regex:^https://").unwrap(), UrlPattern::Regex(_)));
            assert!(matches!(UrlPattern::parse("http://x/").unwrap(), UrlPattern::Exact(_)));
        }

        #[test]
        fn test_invalid_regex() {
            assert_eq!(UrlPattern::parse("regex:(").unwrap_err().kind(), "config");
        }

        #[test]
        fn test_path_ignores_origin_and_query() {
            let p = UrlPattern::parse("/App/Campaigns").unwrap();
            assert!(p.matches("https://saas.example.com/App/Campaigns"));
            assert!(p.matches("https://saas.example.com/App/Campaigns/?tab=1"));
            assert!(!p.matches("https://saas.example.com/App/Dashboard"));
        }

        #[test]
        fn test_root_path() {
            let p = UrlPattern::parse("/").unwrap();
            assert!(p.matches("http://localhost:3000"));
            assert!(p.matches("http://localhost:3000/"));
        }

        #[test]
        fn test_glob() {
            let p = UrlPattern::parse("http://localhost:*/items").unwrap();
            assert!(p.matches("http://localhost:8000/items"));
            assert!(!p.matches("http://localhost:8000/items/1"));
            let path_glob = UrlPattern::parse("/App/*").unwrap();
            assert!(path_glob.matches("https://x.test/App/Reports"));
        }

        #[test]
        fn test_glob_escapes_metacharacters() {
            let p = UrlPattern::parse("http://a.b/?q=*").unwrap();
            assert!(p.matches("http://a.b/?q=1"));
            assert!(!p.matches("http://aXb/?q=1"));
        }

        #[test]
        fn test_display() {
            assert_eq!(UrlPattern::parse("regex:dash").unwrap().to_string(), "regex:dash");
        }
    }

    mod postcondition_tests {
        use super::*;

        #[test]
        fn test_display() {
            let c = Postcondition::ElementCount(Selector::css("li"), 6);
            assert_eq!(c.to_string(), "css(li) to match 6 elements");
            let u = Postcondition::UrlMatches(UrlPattern::parse("/done").unwrap());
            assert_eq!(u.to_string(), "url to match /done");
        }
    }
}
