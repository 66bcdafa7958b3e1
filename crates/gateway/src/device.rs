//! Device identity used to sign the handshake challenge.

use std::path::Path;

use {
    base64::{
        Engine,
        engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD},
    },
    ed25519_dalek::{Signer, SigningKey},
    serde::Deserialize,
};

use crate::error::{Error, Result};

/// Signs handshake payloads on behalf of a paired device.
///
/// A signer that fails is not fatal: the `connect` request is still sent,
/// just without a `signature`.
pub trait DeviceSigner: Send + Sync {
    fn device_id(&self) -> &str;

    /// Public key in base64url form, as the gateway stores it.
    fn public_key(&self) -> &str;

    /// Sign `payload`, returning the base64url signature.
    fn sign(&self, payload: &[u8]) -> Result<String>;
}

/// Ed25519 device key loaded from a JSON identity file.
pub struct Ed25519DeviceIdentity {
    device_id: String,
    public_key: String,
    key: SigningKey,
}

impl std::fmt::Debug for Ed25519DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519DeviceIdentity")
            .field("device_id", &self.device_id)
            .field("public_key", &self.public_key)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityFile {
    #[serde(alias = "id")]
    device_id: String,
    private_key: String,
}

impl Ed25519DeviceIdentity {
    pub fn from_seed(device_id: impl Into<String>, seed: [u8; 32]) -> Self {
        let key = SigningKey::from_bytes(&seed);
        let public_key = URL_SAFE_NO_PAD.encode(key.verifying_key().to_bytes());
        Self {
            device_id: device_id.into(),
            public_key,
            key,
        }
    }

    /// Load `{"deviceId": "...", "privateKey": "<base64 32-byte seed>"}`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let file: IdentityFile = serde_json::from_str(&raw)?;
        let seed = decode_seed(&file.private_key)?;
        Ok(Self::from_seed(file.device_id, seed))
    }
}

impl DeviceSigner for Ed25519DeviceIdentity {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn public_key(&self) -> &str {
        &self.public_key
    }

    fn sign(&self, payload: &[u8]) -> Result<String> {
        Ok(URL_SAFE_NO_PAD.encode(self.key.sign(payload).to_bytes()))
    }
}

fn decode_seed(encoded: &str) -> Result<[u8; 32]> {
    let encoded = encoded.trim();
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded)
        .or_else(|_| URL_SAFE.decode(encoded))
        .or_else(|_| STANDARD.decode(encoded))
        .map_err(|e| Error::message(format!("invalid device private key encoding: {e}")))?;
    <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| {
        Error::message(format!(
            "device private key must be 32 bytes, got {}",
            bytes.len()
        ))
    })
}
