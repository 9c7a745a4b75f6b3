//! Native dialog interception (alert, confirm, prompt, beforeunload).
//!
//! Drivers push every dialog the page opens through [`DialogHandler::handle`].
//! A test that expects a confirmation arms the handler *before* triggering the
//! action and awaits the returned [`ArmedDialog`] afterwards:
//!
//! ```ignore
//! let armed = page.confirm_dialog("Are you sure you want to delete?");
//! page.click("delete").await?;
//! armed.confirmed(timeout).await?;
//! ```

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

use crate::result::{PageflowError, PageflowResult};

/// Type of browser dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialogType {
    /// Alert dialog (OK button only)
    Alert,
    /// Confirm dialog (OK/Cancel buttons)
    Confirm,
    /// Prompt dialog (text input + OK/Cancel)
    Prompt,
    /// Before unload dialog (Leave/Stay buttons)
    BeforeUnload,
}

impl std::fmt::Display for DialogType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alert => write!(f, "alert"),
            Self::Confirm => write!(f, "confirm"),
            Self::Prompt => write!(f, "prompt"),
            Self::BeforeUnload => write!(f, "beforeunload"),
        }
    }
}

/// Decision taken on a dialog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogAction {
    /// Accepted (OK/Yes/Leave)
    Accept,
    /// Accepted with prompt text
    AcceptWith(String),
    /// Dismissed (Cancel/No/Stay)
    Dismiss,
    /// Not yet decided
    Pending,
}

impl DialogAction {
    /// Whether the page sees this as a positive answer
    #[must_use]
    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept | Self::AcceptWith(_))
    }
}

/// A dialog raised by the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dialog {
    kind: DialogType,
    message: String,
    default_value: Option<String>,
    action: DialogAction,
}

impl Dialog {
    /// Create a pending dialog
    #[must_use]
    pub fn new(kind: DialogType, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            default_value: None,
            action: DialogAction::Pending,
        }
    }

    /// Create an alert dialog
    #[must_use]
    pub fn alert(message: impl Into<String>) -> Self {
        Self::new(DialogType::Alert, message)
    }

    /// Create a confirm dialog
    #[must_use]
    pub fn confirm(message: impl Into<String>) -> Self {
        Self::new(DialogType::Confirm, message)
    }

    /// Create a prompt dialog
    #[must_use]
    pub fn prompt(message: impl Into<String>, default: Option<String>) -> Self {
        let mut dialog = Self::new(DialogType::Prompt, message);
        dialog.default_value = default;
        dialog
    }

    /// Dialog type
    #[must_use]
    pub fn kind(&self) -> DialogType {
        self.kind
    }

    /// Message shown to the user
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Default prompt value
    #[must_use]
    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    /// Decision taken
    #[must_use]
    pub fn action(&self) -> &DialogAction {
        &self.action
    }

    /// Whether a decision was taken
    #[must_use]
    pub fn is_handled(&self) -> bool {
        self.action != DialogAction::Pending
    }

    /// Accept the dialog
    pub fn accept(&mut self) {
        self.action = DialogAction::Accept;
    }

    /// Accept a prompt with text
    pub fn accept_with(&mut self, text: impl Into<String>) {
        self.action = DialogAction::AcceptWith(text.into());
    }

    /// Dismiss the dialog
    pub fn dismiss(&mut self) {
        self.action = DialogAction::Dismiss;
    }
}

/// What happens to dialogs nobody armed for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutoDialogBehavior {
    /// Accept everything
    AcceptAll,
    /// Dismiss everything (browser automation default)
    #[default]
    DismissAll,
    /// Accept prompts with their default value, accept the rest
    UseDefault,
}

/// Handler function type for dialogs
pub type DialogHandlerFn = Box<dyn Fn(&mut Dialog) + Send + Sync>;

struct Armed {
    expected: String,
    tx: oneshot::Sender<Dialog>,
}

/// Per-session dialog registry.
///
/// Cloning shares state, so the session and the driver's event task see the
/// same handler.
#[derive(Clone, Default)]
pub struct DialogHandler {
    history: Arc<Mutex<Vec<Dialog>>>,
    armed: Arc<Mutex<Option<Armed>>>,
    handler: Arc<Mutex<Option<DialogHandlerFn>>>,
    auto_behavior: Arc<Mutex<AutoDialogBehavior>>,
}

impl DialogHandler {
    /// Create a handler that dismisses unexpected dialogs
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Persistent handler consulted after the armed one
    pub fn on_dialog<F>(&self, handler: F)
    where
        F: Fn(&mut Dialog) + Send + Sync + 'static,
    {
        if let Ok(mut h) = self.handler.lock() {
            *h = Some(Box::new(handler));
        }
    }

    /// Set fallback behavior
    pub fn set_auto_behavior(&self, behavior: AutoDialogBehavior) {
        if let Ok(mut b) = self.auto_behavior.lock() {
            *b = behavior;
        }
    }

    /// Intercept the next dialog.
    ///
    /// The next dialog is accepted only if it is a confirmation whose message
    /// contains `expected`; anything else is dismissed and reported as a
    /// mismatch by [`ArmedDialog::confirmed`]. Arming again replaces the
    /// previous expectation.
    #[must_use]
    pub fn arm(&self, expected: impl Into<String>) -> ArmedDialog {
        let expected = expected.into();
        let (tx, rx) = oneshot::channel();
        if let Ok(mut armed) = self.armed.lock() {
            *armed = Some(Armed {
                expected: expected.clone(),
                tx,
            });
        }
        tracing::debug!(expected = %expected, "armed confirm dialog");
        ArmedDialog { expected, rx }
    }

    /// Whether an armed expectation is waiting for a dialog
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed.lock().map(|a| a.is_some()).unwrap_or(false)
    }

    /// Decide on an incoming dialog and record it
    pub fn handle(&self, mut dialog: Dialog) -> Dialog {
        let armed = self.armed.lock().ok().and_then(|mut a| a.take());
        if let Some(armed) = armed {
            if dialog.kind() == DialogType::Confirm && dialog.message().contains(&armed.expected) {
                dialog.accept();
            } else {
                dialog.dismiss();
            }
            tracing::debug!(kind = %dialog.kind(), message = dialog.message(), action = ?dialog.action(), "armed dialog handled");
            // Receiver may already be gone if the test stopped waiting.
            let _ = armed.tx.send(dialog.clone());
            self.record(&dialog);
            return dialog;
        }

        if let Ok(handler) = self.handler.lock() {
            if let Some(h) = handler.as_ref() {
                h(&mut dialog);
            }
        }

        if !dialog.is_handled() {
            let behavior = self.auto_behavior.lock().map(|b| *b).unwrap_or_default();
            match behavior {
                AutoDialogBehavior::AcceptAll => dialog.accept(),
                AutoDialogBehavior::DismissAll => dialog.dismiss(),
                AutoDialogBehavior::UseDefault => match dialog.default_value.clone() {
                    Some(default) => dialog.accept_with(default),
                    None => dialog.accept(),
                },
            }
            tracing::debug!(kind = %dialog.kind(), message = dialog.message(), "unarmed dialog auto-handled");
        }

        self.record(&dialog);
        dialog
    }

    fn record(&self, dialog: &Dialog) {
        if let Ok(mut history) = self.history.lock() {
            history.push(dialog.clone());
        }
    }

    /// All dialogs seen so far
    #[must_use]
    pub fn dialogs(&self) -> Vec<Dialog> {
        self.history.lock().map(|d| d.clone()).unwrap_or_default()
    }

    /// Number of dialogs seen
    #[must_use]
    pub fn dialog_count(&self) -> usize {
        self.history.lock().map(|d| d.len()).unwrap_or(0)
    }

    /// Most recent dialog
    #[must_use]
    pub fn last_dialog(&self) -> Option<Dialog> {
        self.history.lock().ok().and_then(|d| d.last().cloned())
    }
}

impl std::fmt::Debug for DialogHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let auto_behavior = self.auto_behavior.lock().map(|b| *b).unwrap_or_default();
        f.debug_struct("DialogHandler")
            .field("dialog_count", &self.dialog_count())
            .field("armed", &self.is_armed())
            .field("auto_behavior", &auto_behavior)
            .finish()
    }
}

/// Handle returned by [`DialogHandler::arm`]; must be awaited after the
/// triggering action.
#[derive(Debug)]
#[must_use = "an armed dialog must be awaited with `confirmed`"]
pub struct ArmedDialog {
    expected: String,
    rx: oneshot::Receiver<Dialog>,
}

impl ArmedDialog {
    /// Expected message substring
    #[must_use]
    pub fn expected(&self) -> &str {
        &self.expected
    }

    /// Wait for the intercepted dialog and check it was the expected confirmation
    pub async fn confirmed(self, timeout: Duration) -> PageflowResult<Dialog> {
        let expected = self.expected;
        let dialog = match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(dialog)) => dialog,
            Ok(Err(_)) => {
                return Err(PageflowError::driver(
                    "dialog handler dropped before a dialog appeared",
                ))
            }
            Err(_) => {
                return Err(PageflowError::WaitTimeout {
                    condition: format!("confirm dialog containing {expected:?}"),
                    ms: timeout.as_millis() as u64,
                })
            }
        };
        if dialog.kind() != DialogType::Confirm || !dialog.message().contains(&expected) {
            return Err(PageflowError::DialogMismatch {
                expected: format!("confirm containing {expected:?}"),
                actual: format!("{} {:?}", dialog.kind(), dialog.message()),
            });
        }
        Ok(dialog)
    }
}
