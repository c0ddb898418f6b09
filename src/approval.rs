//! Gates every sensitive operation on unlock state, cached sessions,
//! interactive confirmation, and platform biometrics (§4.3).

use std::sync::Arc;

use thiserror::Error;

use crate::calling_context::CallingContext;
use crate::config::Config;
use crate::permission::{PermissionGate, PermissionKind};
use crate::pinentry::PinentryGateway;
use crate::session::{SessionCache, SessionKind, SSH_TTL};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Denial {
    #[error("approval not given")]
    ApprovalNotGiven,
    #[error("biometrics not checked")]
    BiometricsNotChecked,
}

pub struct ApprovalPipeline {
    sessions: Arc<SessionCache>,
    pinentry: Arc<dyn PinentryGateway>,
    permission: Arc<dyn PermissionGate>,
}

impl ApprovalPipeline {
    pub fn new(
        sessions: Arc<SessionCache>,
        pinentry: Arc<dyn PinentryGateway>,
        permission: Arc<dyn PermissionGate>,
    ) -> Self {
        Self {
            sessions,
            pinentry,
            permission,
        }
    }

    /// Seeds a Pin session after a successful vault unlock, so the
    /// immediate follow-up operation is not re-prompted for biometrics
    /// (§4.4). Carries `SSH_TTL`, not the shorter `PIN_TTL`: unlocking the
    /// vault stands in for the SSH session window itself, per the original's
    /// `CreatePinSession(context, systemauth.SSHTTL)`.
    pub fn sessions_seed_pin(&self, ctx: &CallingContext) {
        self.sessions.create_with_ttl(ctx, SessionKind::Pin, SSH_TTL);
    }

    /// Runs the five-step algorithm of §4.3 and either returns `Ok(())`
    /// (approved) or the reason it was denied.
    pub fn approve(
        &self,
        ctx: &CallingContext,
        kind: SessionKind,
        title: &str,
        message: &str,
        permission_kind: PermissionKind,
        config: &Config,
    ) -> Result<(), Denial> {
        if self.sessions.verify(ctx, kind) {
            log::debug!("approval cached for {}", ctx.user_name);
            return Ok(());
        }

        let approved = self
            .pinentry
            .get_approval(title, message)
            .unwrap_or(false);
        if !approved {
            return Err(Denial::ApprovalNotGiven);
        }

        if !self.sessions.verify(ctx, SessionKind::Pin) {
            let granted = self
                .permission
                .get_permission(permission_kind, ctx, config)
                .unwrap_or(false);
            if !granted {
                return Err(Denial::BiometricsNotChecked);
            }
        }

        self.sessions.create(ctx, kind);
        Ok(())
    }
}
