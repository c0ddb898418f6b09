//! Bitwarden Secrets Manager backed [`Vault`] implementation.
//!
//! The SDK client is `Clone`-cheap (an `Arc`-wrapped handle), so handlers can
//! share one instance without a core-level lock (§5).

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bitwarden::{
    auth::login::AccessTokenLoginRequest,
    secrets_manager::{secrets::SecretGetRequest, ClientSecretsExt},
    Client,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::vault::{SshKey, Vault, VaultError};

pub struct BitwardenVault {
    client: Arc<Client>,
    locked: AtomicBool,
    keys: Vec<NamedSecret>,
}

struct NamedSecret {
    name: String,
    secret_id: Uuid,
}

impl BitwardenVault {
    /// Authenticates against the Bitwarden Secrets Manager API with the
    /// access token from `config`, then builds the key list this vault will
    /// expose: the primary `bw_secret_id` plus any `extra_ssh_keys`.
    pub async fn login(config: &Config) -> Result<Self> {
        let client = Client::new(None);
        client
            .auth()
            .login_access_token(&AccessTokenLoginRequest {
                access_token: config.bws_access_token.clone(),
                state_file: None,
            })
            .await
            .map_err(|e| {
                anyhow!(
                    "Bitwarden SDK: authentication failed; access token may be invalid, \
                     expired, or from an incompatible SDK version.\nError: {}",
                    e
                )
            })?;

        let mut keys = vec![NamedSecret {
            name: "primary".to_string(),
            secret_id: Uuid::parse_str(&config.bw_secret_id)?,
        }];
        for extra in &config.extra_ssh_keys {
            keys.push(NamedSecret {
                name: extra.name.clone(),
                secret_id: Uuid::parse_str(&extra.secret_id)?,
            });
        }

        Ok(Self {
            client: Arc::new(client),
            locked: AtomicBool::new(false),
            keys,
        })
    }

    async fn fetch_secret(&self, id: Uuid) -> Result<String, VaultError> {
        let request = SecretGetRequest { id };
        let response = self
            .client
            .secrets()
            .get(&request)
            .await
            .map_err(|e| VaultError::FetchFailed(format!("secret '{id}': {e}")))?;
        Ok(response.value)
    }

    pub fn lock(&self) {
        self.locked.store(true, Ordering::SeqCst);
    }

    pub fn unlock(&self) {
        self.locked.store(false, Ordering::SeqCst);
    }
}

impl Clone for BitwardenVault {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            locked: AtomicBool::new(self.locked.load(Ordering::SeqCst)),
            keys: self
                .keys
                .iter()
                .map(|k| NamedSecret {
                    name: k.name.clone(),
                    secret_id: k.secret_id,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl Vault for BitwardenVault {
    fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    async fn get_ssh_keys(&self) -> Result<Vec<SshKey>, VaultError> {
        if self.is_locked() {
            return Err(VaultError::Locked);
        }
        let mut out = Vec::with_capacity(self.keys.len());
        for key in &self.keys {
            let value = self.fetch_secret(key.secret_id).await?;
            out.push(SshKey {
                name: key.name.clone(),
                private_key_openssh: value,
            });
        }
        Ok(out)
    }
}
