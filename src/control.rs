//! The wire contract for the companion CLI's control socket (§6).
//!
//! The CLI dispatcher and IPC router are external collaborators; this gives
//! the control-socket listener something concrete to decode. Each variant
//! maps to one capability the daemon exposes beyond raw SSH-agent signing.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlRequest {
    GetSshKeysRequest,
    CreateSshKeyRequest { name: String, secret_id: String },
    CreateSendRequest { name: String, value: String },
    StatusRequest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshKeySummary {
    pub name: String,
    pub fingerprint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlResponse {
    GetSshKeysResponse { keys: Vec<SshKeySummary> },
    CreateSshKeyResponse { ok: bool },
    CreateSendResponse { ok: bool, url: Option<String> },
    StatusResponse { locked: bool },
    ErrorResponse { message: String },
}
