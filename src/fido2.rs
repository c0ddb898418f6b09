//! Assembles a WebAuthn assertion against a local FIDO2 HID authenticator
//! (§4.6). Ported from the two-factor flow this codebase's lineage calls
//! `Fido2TwoFactor`, preserving its byte-for-byte contract.

use std::sync::Mutex;
use std::time::Duration;

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use ctap_hid_fido2::fidokey::{AssertionExtension, GetAssertionArgsBuilder};
use ctap_hid_fido2::{Cfg, FidoKeyHidFactory};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::Config;
use crate::pinentry::PinentryGateway;

#[derive(Debug, Error)]
pub enum Fido2Error {
    #[error("invalid vault API URL: {0}")]
    InvalidUrl(String),
    #[error("no devices found")]
    NoDevices,
    #[error("failed to open authenticator: {0}")]
    DeviceOpenFailed(String),
    #[error("invalid credential id: {0}")]
    InvalidCredentialId(String),
    #[error("pin entry failed: {0}")]
    PinFailed(String),
    #[error("assertion failed: {0}")]
    AssertionFailed(String),
}

#[derive(Debug, Serialize)]
struct Extensions {
    appid: bool,
}

#[derive(Debug, Serialize)]
struct AssertionPayload {
    #[serde(rename = "authenticatorData")]
    authenticator_data: String,
    #[serde(rename = "clientDataJson")]
    client_data_json: String,
    signature: String,
}

#[derive(Debug, Serialize)]
struct Fido2Response {
    id: String,
    #[serde(rename = "rawId")]
    raw_id: String,
    #[serde(rename = "type")]
    type_: String,
    extensions: Extensions,
    response: AssertionPayload,
}

/// Device access is serialized: one assertion at a time, across all callers
/// (§5), so a single HID authenticator is never multiplexed concurrently.
pub struct Fido2Responder {
    device_lock: Mutex<()>,
    pinentry: std::sync::Arc<dyn PinentryGateway>,
}

impl Fido2Responder {
    pub fn new(pinentry: std::sync::Arc<dyn PinentryGateway>) -> Self {
        Self {
            device_lock: Mutex::new(()),
            pinentry,
        }
    }

    pub fn respond(
        &self,
        challenge_b64: &str,
        credential_ids: &[String],
        config: &Config,
    ) -> Result<String, Fido2Error> {
        let rpid = config
            .rpid()
            .map_err(|e| Fido2Error::InvalidUrl(e.to_string()))?;

        let _guard = self.device_lock.lock().unwrap();

        let devices = ctap_hid_fido2::get_fidokey_devices();
        if devices.is_empty() {
            return Err(Fido2Error::NoDevices);
        }

        let device = FidoKeyHidFactory::create(&Cfg::init())
            .map_err(|e| Fido2Error::DeviceOpenFailed(e.to_string()))?;

        let mut creds = Vec::with_capacity(credential_ids.len());
        for cred in credential_ids {
            let decoded = URL_SAFE_NO_PAD
                .decode(cred)
                .map_err(|e| Fido2Error::InvalidCredentialId(e.to_string()))?;
            creds.push(decoded);
        }

        // Field order and punctuation are part of the wire contract: the
        // server recomputes this hash independently.
        let client_data_json = format!(
            "{{\"type\":\"webauthn.get\",\"challenge\":\"{challenge_b64}\",\"origin\":\"https://{rpid}\",\"crossOrigin\":false}}"
        );
        let client_data_hash = Sha256::digest(client_data_json.as_bytes());
        let client_data_json_b64 = URL_SAFE.encode(client_data_json.as_bytes());

        let info = device
            .get_info()
            .map_err(|e| Fido2Error::DeviceOpenFailed(e.to_string()))?;
        let has_pin = info
            .options
            .iter()
            .any(|(name, value)| name == "clientPin" && *value);

        let mut builder = GetAssertionArgsBuilder::new(&rpid, &client_data_hash)
            .credential_ids(&creds)
            .extensions(&[] as &[AssertionExtension]);

        let pin = if has_pin {
            let pin = self
                .pinentry
                .get_password("Fido2 PIN", "Enter your token's PIN")
                .map_err(|e| Fido2Error::PinFailed(e.to_string()))?;
            builder = builder.without_uv();
            Some(pin)
        } else {
            None
        };
        let args = builder.build();

        let assertions = match &pin {
            Some(pin) => device.get_assertion_with_pin(&args, pin),
            None => device.get_assertion_with_pin(&args, ""),
        }
        .map_err(|e| Fido2Error::AssertionFailed(e.to_string()))?;

        let assertion = assertions
            .first()
            .ok_or_else(|| Fido2Error::AssertionFailed("no assertion returned".to_string()))?;

        // The authenticator-data bytes this library returns carry a 2-byte
        // CBOR framing prefix that is not part of the wire-compatible blob
        // (see design notes: this should eventually become a real CBOR
        // decode instead of a byte offset).
        let auth_data_raw = &assertion.auth_data.get(2..).unwrap_or(&[]);
        let auth_data_b64 = URL_SAFE.encode(auth_data_raw);
        let signature_b64 = URL_SAFE.encode(&assertion.signature);
        let credential_b64 = URL_SAFE.encode(&assertion.credential_id);

        let response = Fido2Response {
            id: credential_b64.clone(),
            raw_id: credential_b64,
            type_: "public-key".to_string(),
            extensions: Extensions { appid: false },
            response: AssertionPayload {
                authenticator_data: auth_data_b64,
                client_data_json: client_data_json_b64,
                signature: signature_b64,
            },
        };

        serde_json::to_string(&response).map_err(|e| Fido2Error::AssertionFailed(e.to_string()))
    }
}

/// The PIN-prompt timeout is bounded only by the backend; the responder
/// itself never imposes one (§5).
pub const PIN_PROMPT_TIMEOUT: Duration = Duration::from_secs(120);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_data_json_matches_exact_contract() {
        let rpid = "vault.example.com";
        let challenge = "abc";
        let json = format!(
            "{{\"type\":\"webauthn.get\",\"challenge\":\"{challenge}\",\"origin\":\"https://{rpid}\",\"crossOrigin\":false}}"
        );
        assert_eq!(
            json,
            r#"{"type":"webauthn.get","challenge":"abc","origin":"https://vault.example.com","crossOrigin":false}"#
        );
    }

    #[test]
    fn client_data_hash_is_computed_before_encoding() {
        let json = r#"{"type":"webauthn.get","challenge":"abc","origin":"https://vault.example.com","crossOrigin":false}"#;
        let hash = Sha256::digest(json.as_bytes());
        let encoded = URL_SAFE.encode(json.as_bytes());
        let decoded = URL_SAFE.decode(encoded).unwrap();
        assert_eq!(Sha256::digest(&decoded).as_slice(), hash.as_slice());
    }

    #[test]
    fn response_shape_matches_contract() {
        let response = Fido2Response {
            id: "cred".to_string(),
            raw_id: "cred".to_string(),
            type_: "public-key".to_string(),
            extensions: Extensions { appid: false },
            response: AssertionPayload {
                authenticator_data: "auth".to_string(),
                client_data_json: "cdj".to_string(),
                signature: "sig".to_string(),
            },
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["type"], "public-key");
        assert_eq!(json["extensions"]["appid"], false);
        assert_eq!(json["response"]["authenticatorData"], "auth");
    }
}
