//! The read-only surface the core consumes from the password vault (§4.4).
//!
//! The core never decrypts anything itself; it asks a [`Vault`] for lock
//! state and the SSH keys it holds, and asks an [`UnlockRequestAction`] to
//! prompt the user through whatever unlock flow the vault backend needs.

pub mod bitwarden;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("vault is locked")]
    Locked,
    #[error("vault authentication failed: {0}")]
    AuthFailed(String),
    #[error("failed to fetch secret: {0}")]
    FetchFailed(String),
}

/// A single SSH key the vault holds, in OpenSSH `PRIVATE KEY` armor.
///
/// The parsed signer and its public wire encoding are deliberately not part
/// of this struct — they are derived fresh at request time (§3) rather than
/// cached in the core.
#[derive(Debug, Clone)]
pub struct SshKey {
    pub name: String,
    pub private_key_openssh: String,
}

/// Read-only accessors the core needs from the vault.
#[async_trait]
pub trait Vault: Send + Sync {
    fn is_locked(&self) -> bool;
    async fn get_ssh_keys(&self) -> Result<Vec<SshKey>, VaultError>;
}

/// Prompts the user to unlock the vault and reports whether it succeeded.
///
/// Injected at agent construction. The default never silently approves: it
/// logs a warning and refuses, so a host that forgets to wire up a real
/// unlock flow fails closed rather than open.
#[async_trait]
pub trait UnlockRequestAction: Send + Sync {
    async fn request_unlock(&self) -> bool;
}

pub struct DenyingUnlockRequestAction;

#[async_trait]
impl UnlockRequestAction for DenyingUnlockRequestAction {
    async fn request_unlock(&self) -> bool {
        log::warn!("no unlock action configured; denying unlock request");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn denying_action_always_refuses() {
        let action = DenyingUnlockRequestAction;
        assert!(!action.request_unlock().await);
    }
}
