//! Binds both sockets and runs the SSH-agent and control-socket accept
//! loops concurrently (§5), unlinking both on clean shutdown.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use ssh_agent_lib::agent::{listen, Listener};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

use crate::approval::ApprovalPipeline;
use crate::config::Config;
use crate::control::{ControlRequest, ControlResponse};
use crate::notify::Notifier;
use crate::permission::PlatformPermissionGate;
use crate::pinentry::TerminalPinentry;
use crate::session::SessionCache;
use crate::ssh_agent::VaultSshAgent;
use crate::vault::{DenyingUnlockRequestAction, UnlockRequestAction, Vault};
use crate::{control, sockets};

/// Wraps a `UnixListener` so that the peer pid of the connection most
/// recently accepted can be read back by the `Session` the library clones
/// for that connection. Sound because `listen` accepts and clones the
/// session synchronously, one connection at a time, before handing the
/// clone off to its own task.
struct PeerAwareListener {
    inner: UnixListener,
    last_peer_pid: Arc<Mutex<Option<u32>>>,
}

#[async_trait::async_trait]
impl Listener for PeerAwareListener {
    type Stream = UnixStream;

    async fn accept(&mut self) -> std::io::Result<Self::Stream> {
        let (stream, _addr) = self.inner.accept().await?;
        let pid = stream
            .peer_cred()
            .ok()
            .and_then(|cred| cred.pid())
            .map(|pid| pid as u32);
        *self.last_peer_pid.lock().unwrap() = pid;
        Ok(stream)
    }
}

pub struct Daemon {
    config: Arc<Config>,
    vault: Arc<dyn Vault>,
    unlock_action: Arc<dyn UnlockRequestAction>,
}

impl Daemon {
    pub fn new(config: Config, vault: Arc<dyn Vault>) -> Self {
        Self {
            config: Arc::new(config),
            vault,
            unlock_action: Arc::new(DenyingUnlockRequestAction),
        }
    }

    pub fn with_unlock_action(mut self, action: Arc<dyn UnlockRequestAction>) -> Self {
        self.unlock_action = action;
        self
    }

    /// Runs until one of the two sockets errors out or the process is
    /// signaled to stop; always attempts socket cleanup afterward.
    pub async fn run_foreground(self) -> Result<()> {
        let ssh_agent_path = sockets::ssh_agent_socket_path(
            self.config.ssh_agent_socket_path.as_deref(),
        )?;
        let control_path =
            sockets::control_socket_path(self.config.control_socket_path.as_deref())?;

        sockets::prepare_socket_path(&ssh_agent_path)?;
        sockets::prepare_socket_path(&control_path)?;

        let ssh_agent_listener = UnixListener::bind(&ssh_agent_path)
            .with_context(|| format!("failed to bind SSH agent socket at {}", ssh_agent_path.display()))?;
        sockets::secure_socket_permissions(&ssh_agent_path)?;

        let control_listener = UnixListener::bind(&control_path)
            .with_context(|| format!("failed to bind control socket at {}", control_path.display()))?;
        sockets::secure_socket_permissions(&control_path)?;

        let sessions = Arc::new(SessionCache::new());
        let pinentry: Arc<dyn crate::pinentry::PinentryGateway> =
            Arc::new(TerminalPinentry::new());
        let approval = Arc::new(ApprovalPipeline::new(
            sessions,
            pinentry.clone(),
            Arc::new(PlatformPermissionGate::new(pinentry)),
        ));
        let notifier: Arc<dyn Notifier> = Arc::new(crate::notify::DesktopNotifier::new());

        let last_peer_pid = Arc::new(Mutex::new(None));
        let listener = PeerAwareListener {
            inner: ssh_agent_listener,
            last_peer_pid: last_peer_pid.clone(),
        };

        let agent = VaultSshAgent::new(
            self.vault.clone(),
            self.unlock_action.clone(),
            approval,
            notifier,
            self.config.clone(),
            last_peer_pid.clone(),
        );

        info!("listening for SSH agent connections on {}", ssh_agent_path.display());
        info!("listening for control connections on {}", control_path.display());

        let ssh_agent_task = tokio::spawn(async move {
            if let Err(e) = listen(listener, agent).await {
                warn!("SSH agent listener exited: {e}");
            }
        });

        let vault_for_control = self.vault.clone();
        let control_task = tokio::spawn(async move {
            loop {
                match control_listener.accept().await {
                    Ok((stream, _)) => {
                        let vault = vault_for_control.clone();
                        tokio::spawn(handle_control_connection(stream, vault));
                    }
                    Err(e) => {
                        warn!("control socket accept failed: {e}");
                        break;
                    }
                }
            }
        });

        let shutdown = tokio::signal::ctrl_c();
        tokio::select! {
            _ = ssh_agent_task => {},
            _ = control_task => {},
            _ = shutdown => {
                info!("received shutdown signal");
            },
        }

        sockets::cleanup_sockets(&ssh_agent_path, &control_path);
        Ok(())
    }
}

async fn handle_control_connection(mut stream: UnixStream, vault: Arc<dyn Vault>) {
    let mut buf = Vec::new();
    if let Err(e) = stream.read_to_end(&mut buf).await {
        debug!("control connection read failed: {e}");
        return;
    }
    let response = match serde_json::from_slice::<ControlRequest>(&buf) {
        Ok(ControlRequest::StatusRequest) => ControlResponse::StatusResponse {
            locked: vault.is_locked(),
        },
        Ok(ControlRequest::GetSshKeysRequest) => match vault.get_ssh_keys().await {
            Ok(keys) => ControlResponse::GetSshKeysResponse {
                keys: keys
                    .into_iter()
                    .map(|k| control::SshKeySummary {
                        name: k.name,
                        fingerprint: "unavailable".to_string(),
                    })
                    .collect(),
            },
            Err(e) => ControlResponse::ErrorResponse {
                message: e.to_string(),
            },
        },
        Ok(_) => ControlResponse::ErrorResponse {
            message: "operation not implemented by this daemon".to_string(),
        },
        Err(e) => ControlResponse::ErrorResponse {
            message: format!("malformed request: {e}"),
        },
    };

    if let Ok(bytes) = serde_json::to_vec(&response) {
        let _ = stream.write_all(&bytes).await;
    }
}
