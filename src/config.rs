//! Loads the daemon's configuration: vault connection details, the SSH keys
//! it should expose, and optional socket path overrides.
//!
//! Mirrors this codebase's existing config shape (`bws_access_token` /
//! `bw_secret_id`, env-var fallback when no file is present) and extends it
//! with the fields the approval pipeline and FIDO2 responder need.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const CONFIG_FILE: &str = ".config/vault-agent/config.yaml";

/// An SSH key exposed by the agent in addition to the primary `bw_secret_id`.
/// Lets one daemon serve more than one vault-backed key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshKeySecret {
    pub name: String,
    pub secret_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// The vault's API base URL. Its host component doubles as the FIDO2
    /// relying-party id.
    pub api_url: String,
    pub bws_access_token: String,
    pub bw_secret_id: String,
    #[serde(default)]
    pub extra_ssh_keys: Vec<SshKeySecret>,
    #[serde(default)]
    pub ssh_agent_socket_path: Option<String>,
    #[serde(default)]
    pub control_socket_path: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if config_path.exists() {
            let config_content = std::fs::read_to_string(&config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;
            let config: Config = serde_yaml::from_str(&config_content)
                .context("Failed to parse config file as YAML")?;
            return Ok(config);
        }

        Self::from_env()
    }

    /// Falls back to environment variables when no config file exists, so a
    /// container deployment need not write one to disk.
    fn from_env() -> Result<Self> {
        let api_url = std::env::var("VAULT_API_URL")
            .map_err(|_| anyhow!("config file not found and VAULT_API_URL not set"))?;
        let bws_access_token = std::env::var("BWS_ACCESS_TOKEN")
            .map_err(|_| anyhow!("config file not found and BWS_ACCESS_TOKEN not set"))?;
        let bw_secret_id = std::env::var("BW_SECRET_ID")
            .map_err(|_| anyhow!("config file not found and BW_SECRET_ID not set"))?;

        Ok(Config {
            api_url,
            bws_access_token,
            bw_secret_id,
            extra_ssh_keys: Vec::new(),
            ssh_agent_socket_path: None,
            control_socket_path: None,
        })
    }

    fn get_config_path() -> Result<PathBuf> {
        let home_dir = dirs::home_dir().context("Unable to determine home directory")?;
        Ok(home_dir.join(CONFIG_FILE))
    }

    /// Every secret id this agent should expose as an SSH identity: the
    /// primary `bw_secret_id` first, then any `extra_ssh_keys` in file order.
    pub fn ssh_secret_ids(&self) -> Vec<String> {
        let mut ids = vec![self.bw_secret_id.clone()];
        ids.extend(self.extra_ssh_keys.iter().map(|k| k.secret_id.clone()));
        ids
    }

    /// The WebAuthn relying-party id: the host component of `api_url`.
    pub fn rpid(&self) -> Result<String> {
        let url = url::Url::parse(&self.api_url)
            .with_context(|| format!("invalid vault API URL: {}", self.api_url))?;
        url.host_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("vault API URL has no host: {}", self.api_url))
    }

    #[cfg(test)]
    pub fn for_test() -> Self {
        Config {
            api_url: "https://vault.example.com".to_string(),
            bws_access_token: "test-token".to_string(),
            bw_secret_id: "550e8400-e29b-41d4-a716-446655440000".to_string(),
            extra_ssh_keys: Vec::new(),
            ssh_agent_socket_path: None,
            control_socket_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpid_extracts_host() {
        let config = Config::for_test();
        assert_eq!(config.rpid().unwrap(), "vault.example.com");
    }

    #[test]
    fn rpid_rejects_invalid_url() {
        let mut config = Config::for_test();
        config.api_url = "not a url".to_string();
        assert!(config.rpid().is_err());
    }

    #[test]
    fn ssh_secret_ids_includes_extras() {
        let mut config = Config::for_test();
        config.extra_ssh_keys.push(SshKeySecret {
            name: "work".to_string(),
            secret_id: "11111111-1111-1111-1111-111111111111".to_string(),
        });
        let ids = config.ssh_secret_ids();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], config.bw_secret_id);
        assert_eq!(ids[1], "11111111-1111-1111-1111-111111111111");
    }

    #[test]
    fn round_trips_through_yaml() {
        let config = Config::for_test();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn missing_required_field_fails_to_parse() {
        let yaml = "bws_access_token: tok\nbw_secret_id: id\n";
        let result: Result<Config, _> = serde_yaml::from_str(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn extra_fields_are_ignored() {
        let yaml = "api_url: https://vault.example.com\nbws_access_token: tok\nbw_secret_id: id\nunknown_field: ignored\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.bw_secret_id, "id");
    }
}
