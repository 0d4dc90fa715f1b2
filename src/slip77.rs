//! SLIP-0077 deterministic blinding keys.
//!
//! The master blinding key is the 64-byte SLIP-0021 node for the label `SLIP-0077`. Only its
//! second half keys the per-script HMAC, but the whole node is kept so blobs stay
//! interchangeable with other SLIP-0077 implementations.

use bitcoin::secp256k1::SecretKey;
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, SsmError};

pub const MASTER_BLINDING_KEY_LEN: usize = 64;

const SLIP21_DOMAIN: &[u8] = b"Symmetric key seed";
const SLIP77_LABEL: &[u8] = b"SLIP-0077";

#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct MasterBlindingKey([u8; MASTER_BLINDING_KEY_LEN]);

impl MasterBlindingKey {
    pub fn from_seed(seed: &[u8]) -> Result<Self> {
        let mut root = hmac_sha512(SLIP21_DOMAIN, &[seed])?;
        let node = hmac_sha512(&root[..32], &[&[0u8], SLIP77_LABEL]);
        root.zeroize();
        Ok(Self(node?))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let node: [u8; MASTER_BLINDING_KEY_LEN] = bytes.try_into().map_err(|_| {
            SsmError::UnexpectedValue(format!(
                "master blinding key is {} bytes, expected {MASTER_BLINDING_KEY_LEN}",
                bytes.len()
            ))
        })?;
        Ok(Self(node))
    }

    pub fn as_bytes(&self) -> &[u8; MASTER_BLINDING_KEY_LEN] {
        &self.0
    }

    /// Blinding private key for outputs paying to `script_pubkey`.
    pub fn blinding_private_key(&self, script_pubkey: &[u8]) -> Result<SecretKey> {
        let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(&self.0[32..])
            .map_err(|e| SsmError::CorruptKey(e.to_string()))?;
        mac.update(script_pubkey);
        let digest = mac.finalize().into_bytes();
        SecretKey::from_slice(&digest).map_err(|e| SsmError::CorruptKey(e.to_string()))
    }
}

impl std::fmt::Debug for MasterBlindingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterBlindingKey(..)")
    }
}

fn hmac_sha512(key: &[u8], parts: &[&[u8]]) -> Result<[u8; 64]> {
    let mut mac = <Hmac<Sha512> as Mac>::new_from_slice(key)
        .map_err(|e| SsmError::CorruptKey(e.to_string()))?;
    for part in parts {
        mac.update(part);
    }
    let mut out = [0u8; 64];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}
