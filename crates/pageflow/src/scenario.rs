//! Scenarios and the step runner.
//!
//! A scenario is an ordered list of (action, expected post-condition) pairs
//! executed top to bottom against one session. The first failing step stops
//! the scenario; its error is wrapped with the step label.

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use crate::result::PageflowResult;
use crate::session::Session;
use crate::wait::Postcondition;

/// A runnable acceptance scenario
#[async_trait]
pub trait Scenario: Send + Sync {
    /// Scenario name, unique within its suite
    fn name(&self) -> &str;

    /// Suite (file) the scenario belongs to
    fn suite(&self) -> &str;

    /// Selection tags
    fn tags(&self) -> &[String] {
        &[]
    }

    /// Stable id, `suite::name`
    fn id(&self) -> String {
        format!("{}::{}", self.suite(), self.name())
    }

    /// Drive the session through the scenario
    async fn run(&self, session: Arc<Session>) -> PageflowResult<()>;
}

type StepFn = Arc<dyn Fn(Arc<Session>) -> BoxFuture<'static, PageflowResult<()>> + Send + Sync>;

/// One scenario step: an action plus an optional post-condition
#[derive(Clone)]
pub struct Step {
    label: String,
    action: StepFn,
    expect: Option<Postcondition>,
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("label", &self.label)
            .field("expect", &self.expect)
            .finish_non_exhaustive()
    }
}

impl Step {
    /// Create a step from an async closure over the session
    pub fn new<F, Fut>(label: impl Into<String>, action: F) -> Self
    where
        F: Fn(Arc<Session>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PageflowResult<()>> + Send + 'static,
    {
        Self {
            label: label.into(),
            action: Arc::new(move |session| action(session).boxed()),
            expect: None,
        }
    }

    /// Wait for `condition` after the action
    #[must_use]
    pub fn expect(mut self, condition: Postcondition) -> Self {
        self.expect = Some(condition);
        self
    }

    /// Step label
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    async fn execute(&self, session: Arc<Session>) -> PageflowResult<()> {
        (self.action)(Arc::clone(&session))
            .await
            .map_err(|e| e.in_step(&self.label))?;
        if let Some(condition) = &self.expect {
            session
                .wait_for(condition)
                .await
                .map_err(|e| e.in_step(&self.label))?;
        }
        Ok(())
    }
}

/// Scenario built from sequential steps
#[derive(Debug, Clone)]
pub struct StepScenario {
    name: String,
    suite: String,
    tags: Vec<String>,
    steps: Vec<Step>,
}

impl StepScenario {
    /// Empty scenario in the `default` suite
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            suite: "default".to_string(),
            tags: Vec::new(),
            steps: Vec::new(),
        }
    }

    /// Set the suite
    #[must_use]
    pub fn in_suite(mut self, suite: impl Into<String>) -> Self {
        self.suite = suite.into();
        self
    }

    /// Add a tag
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Append a step
    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Append an action without a post-condition
    #[must_use]
    pub fn then<F, Fut>(self, label: impl Into<String>, action: F) -> Self
    where
        F: Fn(Arc<Session>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PageflowResult<()>> + Send + 'static,
    {
        self.step(Step::new(label, action))
    }

    /// Steps in execution order
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

#[async_trait]
impl Scenario for StepScenario {
    fn name(&self) -> &str {
        &self.name
    }

    fn suite(&self) -> &str {
        &self.suite
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }

    async fn run(&self, session: Arc<Session>) -> PageflowResult<()> {
        for (index, step) in self.steps.iter().enumerate() {
            debug!(scenario = %self.id(), step = index + 1, label = %step.label, "step");
            step.execute(Arc::clone(&session)).await?;
        }
        Ok(())
    }
}

/// Scenario backed by a single async closure
pub struct FnScenario {
    name: String,
    suite: String,
    tags: Vec<String>,
    body: StepFn,
}

impl fmt::Debug for FnScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnScenario")
            .field("suite", &self.suite)
            .field("name", &self.name)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

impl FnScenario {
    /// Create a closure scenario
    pub fn new<F, Fut>(suite: impl Into<String>, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(Arc<Session>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PageflowResult<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            suite: suite.into(),
            tags: Vec::new(),
            body: Arc::new(move |session| body(session).boxed()),
        }
    }

    /// Add a tag
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

#[async_trait]
impl Scenario for FnScenario {
    fn name(&self) -> &str {
        &self.name
    }

    fn suite(&self) -> &str {
        &self.suite
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }

    async fn run(&self, session: Arc<Session>) -> PageflowResult<()> {
        (self.body)(session).await
    }
}

/// Scenario selection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioFilter {
    /// Keep scenarios carrying any of these tags (empty = all)
    pub tags: Vec<String>,
    /// Keep only this suite
    pub suite: Option<String>,
    /// Keep ids containing this substring
    pub grep: Option<String>,
}

impl ScenarioFilter {
    /// Select everything
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Require one of the tags
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Restrict to a suite
    #[must_use]
    pub fn with_suite(mut self, suite: impl Into<String>) -> Self {
        self.suite = Some(suite.into());
        self
    }

    /// Restrict by id substring
    #[must_use]
    pub fn with_grep(mut self, pattern: impl Into<String>) -> Self {
        self.grep = Some(pattern.into());
        self
    }

    /// Whether a scenario is selected
    #[must_use]
    pub fn matches(&self, scenario: &dyn Scenario) -> bool {
        if !self.tags.is_empty() && !scenario.tags().iter().any(|t| self.tags.contains(t)) {
            return false;
        }
        if let Some(suite) = &self.suite {
            if scenario.suite() != suite {
                return false;
            }
        }
        if let Some(grep) = &self.grep {
            if !scenario.id().contains(grep.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Ordered collection of registered scenarios
#[derive(Clone, Default)]
pub struct ScenarioCatalog {
    scenarios: Vec<Arc<dyn Scenario>>,
}

impl fmt::Debug for ScenarioCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.scenarios.iter().map(|s| s.id()))
            .finish()
    }
}

impl ScenarioCatalog {
    /// Empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scenario
    #[must_use]
    pub fn with(mut self, scenario: impl Scenario + 'static) -> Self {
        self.add(scenario);
        self
    }

    /// Register a scenario in place
    pub fn add(&mut self, scenario: impl Scenario + 'static) {
        self.scenarios.push(Arc::new(scenario));
    }

    /// Append all scenarios of another catalog
    pub fn extend(&mut self, other: Self) {
        self.scenarios.extend(other.scenarios);
    }

    /// Number of scenarios
    #[must_use]
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    /// Whether the catalog is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    /// All scenarios in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Scenario>> {
        self.scenarios.iter()
    }

    /// Suite names in first-seen order
    #[must_use]
    pub fn suites(&self) -> Vec<String> {
        let mut suites: Vec<String> = Vec::new();
        for s in &self.scenarios {
            if !suites.iter().any(|known| known == s.suite()) {
                suites.push(s.suite().to_string());
            }
        }
        suites
    }

    /// Scenarios matching `filter`, in registration order
    #[must_use]
    pub fn select(&self, filter: &ScenarioFilter) -> Vec<Arc<dyn Scenario>> {
        self.scenarios
            .iter()
            .filter(|s| filter.matches(s.as_ref()))
            .cloned()
            .collect()
    }
}
