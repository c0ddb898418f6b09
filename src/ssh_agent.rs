//! The SSH-agent wire handler (§4.5). Wire framing is delegated to
//! `ssh-agent-lib`; this module supplies the [`Session`] implementation.
//!
//! `Signers` from the original spec's inert-op list has no counterpart here:
//! it is a method on Go's `agent.Agent` server-side interface, never a wire
//! operation, so there is nothing for `ssh-agent-lib`'s wire-level `Session`
//! trait to expose it as.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::{debug, warn};
use rsa::pkcs1v15::SigningKey;
use rsa::RsaPrivateKey;
use sha2::{Sha256, Sha512};
use signature::{SignatureEncoding, Signer};
use ssh_agent_lib::agent::Session;
use ssh_agent_lib::error::AgentError;
use ssh_agent_lib::proto::{Extension, Identity, SignRequest};
use ssh_key::private::KeypairData;
use ssh_key::{Algorithm, HashAlg, PrivateKey, Signature};

use crate::approval::{ApprovalPipeline, Denial};
use crate::calling_context::CallingContext;
use crate::config::Config;
use crate::notify::Notifier;
use crate::permission::PermissionKind;
use crate::session::SessionKind;
use crate::vault::{UnlockRequestAction, Vault};

/// Byte prefix that marks a signing payload as a git object signature
/// rather than a plain SSH auth signature (§3).
const GIT_SIGNATURE_PREFIX: &[u8] = b"SSHSIG\x00\x00\x00\x03git";

fn other_err(msg: impl Into<String>) -> AgentError {
    AgentError::other(Box::new(std::io::Error::other(msg.into())))
}

fn is_git_signature(data: &[u8]) -> bool {
    data.starts_with(GIT_SIGNATURE_PREFIX)
}

fn format_approval_message(ctx: &CallingContext, key_name: &str, is_git: bool) -> String {
    let kind = if is_git { "git" } else { "ssh" };
    if ctx.error {
        format!("{} is requesting {kind} signage with key {key_name}", ctx.user_name)
    } else {
        format!(
            "{} on {}>{}>{} is requesting {kind} signage with key {key_name}",
            ctx.user_name, ctx.grandparent_process_name, ctx.parent_process_name, ctx.process_name
        )
    }
}

/// RSA-forced signing requested via the SSH-agent `flags` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RsaHash {
    Sha256,
    Sha512,
}

// Flag values from the SSH-agent protocol (draft-miller-ssh-agent).
const SSH_AGENT_RSA_SHA2_256: u32 = 0x02;
const SSH_AGENT_RSA_SHA2_512: u32 = 0x04;

fn rsa_hash_for_flags(flags: u32) -> Option<RsaHash> {
    if flags & SSH_AGENT_RSA_SHA2_512 != 0 {
        Some(RsaHash::Sha512)
    } else if flags & SSH_AGENT_RSA_SHA2_256 != 0 {
        Some(RsaHash::Sha256)
    } else {
        None
    }
}

fn sign_with_forced_rsa_hash(
    key: &PrivateKey,
    data: &[u8],
    hash: RsaHash,
) -> Result<Signature, AgentError> {
    let KeypairData::Rsa(rsa_keypair) = key.key_data() else {
        return Err(other_err("key is not RSA; cannot force RSA hash algorithm"));
    };
    let private_key = RsaPrivateKey::try_from(rsa_keypair)
        .map_err(|e| other_err(format!("invalid RSA key material: {e}")))?;

    let (algorithm, signature_bytes) = match hash {
        RsaHash::Sha256 => {
            let signing_key = SigningKey::<Sha256>::new(private_key);
            let sig = signing_key.try_sign(data).map_err(|e| other_err(e.to_string()))?;
            (Algorithm::Rsa { hash: Some(HashAlg::Sha256) }, sig.to_vec())
        }
        RsaHash::Sha512 => {
            let signing_key = SigningKey::<Sha512>::new(private_key);
            let sig = signing_key.try_sign(data).map_err(|e| other_err(e.to_string()))?;
            (Algorithm::Rsa { hash: Some(HashAlg::Sha512) }, sig.to_vec())
        }
    };

    Signature::new(algorithm, signature_bytes).map_err(|e| other_err(e.to_string()))
}

/// Resolves a matching vault key, its parsed form, and the calling context
/// for an inbound connection, and routes every sensitive operation through
/// the unlock gate and [`ApprovalPipeline`].
///
/// `peer_pid_source` is read once, at clone time: the library clones this
/// `Session` once per accepted connection, immediately after the accept
/// that populated the slot (see `daemon::PeerAwareListener`), so each clone
/// observes the pid of the connection it will actually serve.
pub struct VaultSshAgent {
    vault: Arc<dyn Vault>,
    unlock_action: Arc<dyn UnlockRequestAction>,
    approval: Arc<ApprovalPipeline>,
    notifier: Arc<dyn Notifier>,
    config: Arc<Config>,
    peer_pid: u32,
    peer_pid_source: Arc<Mutex<Option<u32>>>,
}

impl VaultSshAgent {
    pub fn new(
        vault: Arc<dyn Vault>,
        unlock_action: Arc<dyn UnlockRequestAction>,
        approval: Arc<ApprovalPipeline>,
        notifier: Arc<dyn Notifier>,
        config: Arc<Config>,
        peer_pid_source: Arc<Mutex<Option<u32>>>,
    ) -> Self {
        Self {
            vault,
            unlock_action,
            approval,
            notifier,
            config,
            peer_pid: 0,
            peer_pid_source,
        }
    }

    fn calling_context(&self) -> CallingContext {
        CallingContext::resolve(self.peer_pid)
    }

    /// Unlock-gate: if the vault is locked, invoke the unlock action; on
    /// success seed a Pin session so the immediate follow-up is not
    /// re-prompted (§4.4).
    async fn unlock_gate(&self, ctx: &CallingContext) -> Result<(), AgentError> {
        if !self.vault.is_locked() {
            return Ok(());
        }
        if self.unlock_action.request_unlock().await {
            self.approval.sessions_seed_pin(ctx);
            Ok(())
        } else {
            Err(other_err("vault is locked"))
        }
    }

    async fn parsed_keys(&self) -> Result<Vec<(String, PrivateKey)>, AgentError> {
        let keys = self
            .vault
            .get_ssh_keys()
            .await
            .map_err(|e| other_err(e.to_string()))?;
        let mut parsed = Vec::with_capacity(keys.len());
        for key in keys {
            match PrivateKey::from_openssh(&key.private_key_openssh) {
                Ok(private) => parsed.push((key.name, private)),
                Err(e) => warn!("skipping unparseable vault key {}: {e}", key.name),
            }
        }
        Ok(parsed)
    }
}

impl Clone for VaultSshAgent {
    fn clone(&self) -> Self {
        let peer_pid = self
            .peer_pid_source
            .lock()
            .unwrap()
            .take()
            .unwrap_or(self.peer_pid);
        Self {
            vault: self.vault.clone(),
            unlock_action: self.unlock_action.clone(),
            approval: self.approval.clone(),
            notifier: self.notifier.clone(),
            config: self.config.clone(),
            peer_pid,
            peer_pid_source: self.peer_pid_source.clone(),
        }
    }
}

#[async_trait]
impl Session for VaultSshAgent {
    async fn request_identities(&mut self) -> Result<Vec<Identity>, AgentError> {
        let ctx = self.calling_context();
        self.unlock_gate(&ctx).await?;

        let keys = self.parsed_keys().await?;
        Ok(keys
            .into_iter()
            .map(|(name, key)| {
                let pubkey = key.public_key();
                Identity {
                    pubkey: pubkey.key_data().clone(),
                    comment: name,
                }
            })
            .collect())
    }

    async fn sign(&mut self, request: SignRequest) -> Result<Signature, AgentError> {
        self.sign_with_flags(request).await
    }

    // Keys are managed through the vault, not the agent wire (§1 Non-goals).
    // These are accepted and logged rather than rejected, matching clients'
    // expectations that agent lifecycle calls do not hard-fail.
    async fn add_identity(
        &mut self,
        _identity: ssh_agent_lib::proto::AddIdentity,
    ) -> Result<(), AgentError> {
        warn!("add_identity is a no-op: keys are managed through the vault");
        Ok(())
    }

    async fn remove_identity(
        &mut self,
        _identity: ssh_agent_lib::proto::RemoveIdentity,
    ) -> Result<(), AgentError> {
        warn!("remove_identity is a no-op: keys are managed through the vault");
        Ok(())
    }

    async fn remove_all_identities(&mut self) -> Result<(), AgentError> {
        warn!("remove_all_identities is a no-op: keys are managed through the vault");
        Ok(())
    }

    async fn lock(&mut self, _passphrase: Vec<u8>) -> Result<(), AgentError> {
        warn!("lock is a no-op: vault lock state is managed by the vault, not the agent wire");
        Ok(())
    }

    async fn unlock(&mut self, _passphrase: Vec<u8>) -> Result<(), AgentError> {
        warn!("unlock is a no-op: vault lock state is managed by the vault, not the agent wire");
        Ok(())
    }

    async fn extension(&mut self, extension: Extension) -> Result<Option<Extension>, AgentError> {
        debug!("unsupported extension request: {}", extension.name);
        Ok(None)
    }
}

impl VaultSshAgent {
    /// `SignWithFlags` (§4.5): the full eight-step signing algorithm. The
    /// `ssh-agent-lib` `Session` trait folds `sign`/`sign_with_flags` into
    /// one method keyed by `request.flags`, so this is reached from both.
    async fn sign_with_flags(&mut self, request: SignRequest) -> Result<Signature, AgentError> {
        let ctx = self.calling_context();
        self.unlock_gate(&ctx).await?;

        let keys = self.parsed_keys().await?;
        let (name, key) = keys
            .into_iter()
            .find(|(_, key)| key.public_key().key_data() == &request.pubkey)
            .ok_or_else(|| other_err("key not found"))?;

        let is_git = is_git_signature(&request.data);
        let message = format_approval_message(&ctx, &name, is_git);
        let title = if is_git { "Git signing request" } else { "SSH signing request" };

        self.approval
            .approve(
                &ctx,
                SessionKind::Ssh,
                title,
                &message,
                PermissionKind::SSHKey,
                &self.config,
            )
            .map_err(|denial| other_err(denial_message(denial)))?;

        let verb = if is_git { "Git" } else { "SSH" };
        self.notifier.notify(
            &format!("{verb} Signing Request Approved for {name}"),
            &message,
            "",
            std::time::Duration::from_secs(5),
            None,
        );

        match rsa_hash_for_flags(request.flags) {
            Some(hash) => sign_with_forced_rsa_hash(&key, &request.data, hash),
            None => key
                .try_sign(&request.data)
                .map_err(|e| other_err(format!("signing failed: {e}"))),
        }
    }
}

fn denial_message(denial: Denial) -> String {
    denial.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn git_prefix_is_detected() {
        let mut data = GIT_SIGNATURE_PREFIX.to_vec();
        data.extend_from_slice(b"payload");
        assert!(is_git_signature(&data));
    }

    #[test]
    fn non_git_data_is_not_detected() {
        assert!(!is_git_signature(b"just some ssh auth data"));
    }

    #[test]
    fn git_prefix_matches_exact_byte_sequence() {
        let expected: &[u8] = &[
            0x53, 0x53, 0x48, 0x53, 0x49, 0x47, 0x00, 0x00, 0x00, 0x03, 0x67, 0x69, 0x74,
        ];
        assert_eq!(GIT_SIGNATURE_PREFIX, expected);
    }

    #[test]
    fn approval_message_without_error_includes_process_chain() {
        let ctx = CallingContext {
            user_name: "alice".to_string(),
            process_name: "ssh".to_string(),
            parent_process_name: "git".to_string(),
            grandparent_process_name: "bash".to_string(),
            error: false,
        };
        let msg = format_approval_message(&ctx, "work-key", false);
        assert_eq!(msg, "alice on bash>git>ssh is requesting ssh signage with key work-key");
    }

    #[test]
    fn approval_message_with_error_omits_process_chain() {
        let ctx = CallingContext::unresolved("alice");
        let msg = format_approval_message(&ctx, "work-key", true);
        assert_eq!(msg, "alice is requesting git signage with key work-key");
    }

    #[test]
    fn rsa_hash_flags_select_expected_variant() {
        assert_eq!(rsa_hash_for_flags(SSH_AGENT_RSA_SHA2_256), Some(RsaHash::Sha256));
        assert_eq!(rsa_hash_for_flags(SSH_AGENT_RSA_SHA2_512), Some(RsaHash::Sha512));
        assert_eq!(rsa_hash_for_flags(0), None);
    }
}
