//! Prompts the user for a secret or a yes/no decision.
//!
//! Calls are synchronous and may block indefinitely on user input — callers
//! must never hold the [`crate::session::SessionCache`] lock across one.
//! [`PinentryGateway`] abstracts over the dialog backend so the approval
//! pipeline never hardcodes a particular prompt mechanism.

use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Password};
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Debug, Error)]
pub enum PinentryError {
    #[error("user cancelled the prompt")]
    Cancelled,
    #[error("pinentry backend unavailable: {0}")]
    BackendUnavailable(String),
}

/// A user-entered secret. `Zeroizing` wipes the buffer on drop so a caller
/// that merely passes it on to a signer never leaves a copy lying around.
pub type Secret = Zeroizing<String>;

pub trait PinentryGateway: Send + Sync {
    /// Returns a user-entered secret string.
    fn get_password(&self, title: &str, prompt: &str) -> Result<Secret, PinentryError>;

    /// Returns a binary decision. `message` is free-form and may include the
    /// calling context so the user can tell what they are approving.
    fn get_approval(&self, title: &str, message: &str) -> Result<bool, PinentryError>;
}

/// The only backend guaranteed to be available on a headless daemon: a
/// blocking prompt on the controlling terminal.
pub struct TerminalPinentry;

impl TerminalPinentry {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TerminalPinentry {
    fn default() -> Self {
        Self::new()
    }
}

impl PinentryGateway for TerminalPinentry {
    fn get_password(&self, title: &str, prompt: &str) -> Result<Secret, PinentryError> {
        let full_prompt = format!("{title}: {prompt}");
        Password::with_theme(&ColorfulTheme::default())
            .with_prompt(full_prompt)
            .allow_empty_password(true)
            .interact()
            .map(Zeroizing::new)
            .map_err(|e| PinentryError::BackendUnavailable(e.to_string()))
    }

    fn get_approval(&self, title: &str, message: &str) -> Result<bool, PinentryError> {
        let prompt = format!("{title}\n{message}");
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(|e| PinentryError::BackendUnavailable(e.to_string()))
    }
}
