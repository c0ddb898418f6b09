//! The biometric / OS-policy gate consulted by the approval pipeline once a
//! fresh Pin session is not available (§4.3 step 3).
//!
//! Grounded on the biometric-provider abstraction used elsewhere in this
//! codebase's lineage: a small trait, a platform enum, and a safe default
//! that denies rather than silently approving when no real backend is wired
//! up.

use std::sync::Arc;

use crate::calling_context::CallingContext;
use crate::config::Config;
use crate::pinentry::PinentryGateway;
use thiserror::Error;

/// Which capability is being exercised. The SSH agent always asks for
/// `SSHKey`; future operations (vault unlock, FIDO2) would add variants here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionKind {
    SSHKey,
}

#[derive(Debug, Error)]
pub enum PermissionError {
    #[error("biometric backend unavailable on this platform")]
    Unavailable,
}

pub trait PermissionGate: Send + Sync {
    fn get_permission(
        &self,
        kind: PermissionKind,
        ctx: &CallingContext,
        config: &Config,
    ) -> Result<bool, PermissionError>;
}

/// Which platform-native biometric check would be consulted, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiometricPlatform {
    TouchId,
    WindowsHello,
    LinuxPolkit,
}

pub fn detect_platform() -> Option<BiometricPlatform> {
    #[cfg(target_os = "macos")]
    {
        Some(BiometricPlatform::TouchId)
    }
    #[cfg(target_os = "windows")]
    {
        Some(BiometricPlatform::WindowsHello)
    }
    #[cfg(target_os = "linux")]
    {
        Some(BiometricPlatform::LinuxPolkit)
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    {
        None
    }
}

/// Falls back to a confirmation-style prompt when no hardware biometric
/// backend is available, and otherwise defers to the platform's native
/// check. This build wires no platform biometric library (no `security-
/// framework`/TouchID, no Windows Hello, no polkit client), so the fallback
/// is always taken on a recognized platform: the user is asked to confirm
/// presence through the same [`PinentryGateway`] the rest of the core uses,
/// rather than having the step rubber-stamp approval. On platforms this
/// daemon does not recognize at all, it denies — an unset capability must
/// never be treated as an implicit approval.
pub struct PlatformPermissionGate {
    pinentry: Arc<dyn PinentryGateway>,
}

impl PlatformPermissionGate {
    pub fn new(pinentry: Arc<dyn PinentryGateway>) -> Self {
        Self { pinentry }
    }
}

impl PermissionGate for PlatformPermissionGate {
    fn get_permission(
        &self,
        kind: PermissionKind,
        ctx: &CallingContext,
        _config: &Config,
    ) -> Result<bool, PermissionError> {
        match detect_platform() {
            Some(platform) => {
                log::info!(
                    "no {platform:?} biometric backend wired up; falling back to a \
                     confirmation prompt for {kind:?} permission for {}",
                    ctx.user_name
                );
                let title = "Confirm presence";
                let message = format!(
                    "{} is requesting {kind:?} access without a recent PIN session; \
                     confirm this is you",
                    ctx.user_name
                );
                self.pinentry
                    .get_approval(title, &message)
                    .map_err(|_| PermissionError::Unavailable)
            }
            None => {
                log::warn!("no biometric backend available for this platform; denying");
                Err(PermissionError::Unavailable)
            }
        }
    }
}
