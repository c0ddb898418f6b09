//! Resolves the filesystem paths of the two stream sockets this daemon
//! exposes (§6), and removes them on clean shutdown.

use anyhow::{Context, Result};
use log::debug;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Marker file `dirs`/sandboxed runtimes use to signal a flatpak sandbox.
const FLATPAK_MARKER: &str = "/.flatpak-info";
const FLATPAK_APP_ID: &str = "dev.pirafrank.VaultAgent";

const DEFAULT_SSH_AGENT_SOCKET_NAME: &str = ".vault-agent-ssh-agent.sock";
const DEFAULT_CONTROL_SOCKET_NAME: &str = ".vault-agent.sock";

fn is_flatpak_sandbox() -> bool {
    Path::new(FLATPAK_MARKER).exists()
}

fn default_path(home: &Path, name: &str) -> PathBuf {
    if is_flatpak_sandbox() {
        home.join(".var")
            .join("app")
            .join(FLATPAK_APP_ID)
            .join("data")
            .join(if name == DEFAULT_SSH_AGENT_SOCKET_NAME {
                "ssh-auth-sock"
            } else {
                "vault-agent.sock"
            })
    } else {
        home.join(name)
    }
}

/// The SSH-agent protocol socket path, honoring an explicit override from
/// config, then falling back to the flatpak-aware default.
pub fn ssh_agent_socket_path(override_path: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = override_path {
        return Ok(PathBuf::from(path));
    }
    let home = dirs::home_dir().context("Unable to determine home directory")?;
    Ok(default_path(&home, DEFAULT_SSH_AGENT_SOCKET_NAME))
}

/// The control socket path for the companion CLI.
pub fn control_socket_path(override_path: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = override_path {
        return Ok(PathBuf::from(path));
    }
    let home = dirs::home_dir().context("Unable to determine home directory")?;
    Ok(default_path(&home, DEFAULT_CONTROL_SOCKET_NAME))
}

/// Removes a stale socket file before binding, and sets owner-only
/// permissions after a successful bind.
pub fn prepare_socket_path(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("failed to remove stale socket at {}", path.display()))?;
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create socket directory {}", parent.display()))?;
    }
    Ok(())
}

pub fn secure_socket_permissions(path: &Path) -> Result<()> {
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .with_context(|| format!("failed to set permissions on socket {}", path.display()))
}

/// Unlinks both sockets on clean shutdown (§6). Errors are logged, not
/// propagated — a missing socket at shutdown time is not a failure.
pub fn cleanup_sockets(ssh_agent: &Path, control: &Path) {
    for path in [ssh_agent, control] {
        if path.exists() {
            if let Err(e) = std::fs::remove_file(path) {
                debug!("failed to unlink socket {}: {e}", path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_path_is_under_home_when_not_sandboxed() {
        if is_flatpak_sandbox() {
            return;
        }
        let home = PathBuf::from("/home/alice");
        let path = default_path(&home, DEFAULT_SSH_AGENT_SOCKET_NAME);
        assert_eq!(path, PathBuf::from("/home/alice/.vault-agent-ssh-agent.sock"));
    }

    #[test]
    fn override_path_wins_over_default() {
        let path = ssh_agent_socket_path(Some("/tmp/custom.sock")).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/custom.sock"));
    }
}
