//! Wallet creation, restore and master key lookups.

use std::str::FromStr;

use bip39::Mnemonic;
use bitcoin::bip32::{Fingerprint, Xpriv, Xpub};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha512;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::Ssm;
use crate::chain::Chain;
use crate::error::{Result, SsmError};
use crate::keystore::KeyKind;
use crate::slip77::{MASTER_BLINDING_KEY_LEN, MasterBlindingKey};

pub const SALT_LEN: usize = 32;
pub const PBKDF2_ROUNDS: u32 = 2048;
const SHORT_PASSWORD_LEN: usize = 16;

/// Stretches `password` with a fresh random salt. Returns the 64-byte stretched key and the
/// salt that produced it.
pub fn entropy_from_password(password: &str) -> Result<(Zeroizing<[u8; 64]>, [u8; SALT_LEN])> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let stretched = stretch_password(password, &salt)?;
    Ok((stretched, salt))
}

pub fn stretch_password(password: &str, salt: &[u8]) -> Result<Zeroizing<[u8; 64]>> {
    if password.is_empty() {
        return Err(SsmError::MissingValue(
            "can't generate a new seed without a password".into(),
        ));
    }
    let len = password.chars().count();
    if len < SHORT_PASSWORD_LEN {
        warn!(len, "password is short and might not be secure");
    }

    let mut out = Zeroizing::new([0u8; 64]);
    pbkdf2_hmac::<Sha512>(password.as_bytes(), salt, PBKDF2_ROUNDS, &mut out[..]);
    Ok(out)
}

/// 16 bytes of entropy give 12 words, 32 bytes give 24.
pub fn mnemonic_from_entropy(entropy: &[u8]) -> Result<Mnemonic> {
    if !matches!(entropy.len(), 16 | 32) {
        return Err(SsmError::UnexpectedValue(format!(
            "entropy is {} bytes, it must be 16 or 32 bytes",
            entropy.len()
        )));
    }
    Mnemonic::from_entropy(entropy).map_err(|e| SsmError::UnexpectedValue(e.to_string()))
}

pub fn seed_from_mnemonic(mnemonic: &Mnemonic, passphrase: &str) -> Zeroizing<[u8; 64]> {
    Zeroizing::new(mnemonic.to_seed(passphrase))
}

impl Ssm {
    /// Creates and persists a new wallet.
    ///
    /// With `is_raw_bytes`, `entropy` is hex and is used as mnemonic entropy directly.
    /// Otherwise it is a password: it gets stretched with a random salt, the first 32
    /// stretched bytes become the mnemonic entropy and the salt is stored for audit.
    pub fn new_wallet(
        &self,
        chain: Chain,
        entropy: &str,
        is_raw_bytes: bool,
    ) -> Result<Fingerprint> {
        if is_raw_bytes {
            let raw = Zeroizing::new(
                hex::decode(entropy.trim())
                    .map_err(|e| SsmError::UnexpectedValue(format!("entropy is not hex: {e}")))?,
            );
            let mnemonic = mnemonic_from_entropy(&raw)?;
            self.create_from_mnemonic(chain, &mnemonic, "", None)
        } else {
            let (stretched, salt) = entropy_from_password(entropy)?;
            let mnemonic = mnemonic_from_entropy(&stretched[..32])?;
            self.create_from_mnemonic(chain, &mnemonic, "", Some(&salt))
        }
    }

    /// Creates a wallet from an existing BIP39 phrase and passphrase.
    pub fn import_mnemonic(
        &self,
        chain: Chain,
        mnemonic: &str,
        passphrase: &str,
    ) -> Result<Fingerprint> {
        let mnemonic = Mnemonic::from_str(mnemonic.trim())
            .map_err(|e| SsmError::UnexpectedValue(format!("invalid mnemonic: {e}")))?;
        self.create_from_mnemonic(chain, &mnemonic, passphrase, None)
    }

    fn create_from_mnemonic(
        &self,
        chain: Chain,
        mnemonic: &Mnemonic,
        passphrase: &str,
        salt: Option<&[u8]>,
    ) -> Result<Fingerprint> {
        let seed = seed_from_mnemonic(mnemonic, passphrase);
        let master = Xpriv::new_master(chain.params().network_kind, &seed[..])?;
        let blinding = if chain.is_confidential() {
            Some(MasterBlindingKey::from_seed(&seed[..])?)
        } else {
            None
        };
        self.persist_wallet(chain, &master, blinding.as_ref(), salt)
    }

    /// Imports an extended private key. Confidential chains also need the 64-byte master
    /// blinding key as hex: it cannot be recovered from the extended key.
    pub fn restore_wallet(
        &self,
        chain: Chain,
        extended_key: &str,
        blinding_key_hex: Option<&str>,
    ) -> Result<Fingerprint> {
        let blinding = match (chain.is_confidential(), blinding_key_hex) {
            (true, Some(hex_key)) => {
                let bytes = Zeroizing::new(hex::decode(hex_key.trim()).map_err(|_| {
                    SsmError::UnexpectedValue(format!(
                        "a {MASTER_BLINDING_KEY_LEN}-byte hex string must be provided"
                    ))
                })?);
                Some(MasterBlindingKey::from_slice(&bytes)?)
            }
            (true, None) => {
                return Err(SsmError::UnexpectedValue(format!(
                    "{chain} wallets need a {MASTER_BLINDING_KEY_LEN}-byte master blinding key"
                )));
            }
            (false, Some(_)) => {
                warn!(%chain, "ignoring blinding key on a non-confidential chain");
                None
            }
            (false, None) => None,
        };

        let master = Xpriv::from_str(extended_key.trim())
            .map_err(|e| SsmError::UnexpectedValue(format!("invalid extended key: {e}")))?;
        let expected = chain.params().network_kind;
        if master.network != expected {
            return Err(SsmError::UnexpectedValue(format!(
                "extended key is for {:?} networks, {chain} expects {expected:?}",
                master.network
            )));
        }
        if master.depth != 0 {
            warn!(%chain, depth = master.depth, "restoring a non-master extended key");
        }

        self.persist_wallet(chain, &master, blinding.as_ref(), None)
    }

    /// Persists every blob of a wallet before its fingerprint is handed out. If a write fails
    /// the blobs written by this call are removed again.
    fn persist_wallet(
        &self,
        chain: Chain,
        master: &Xpriv,
        blinding: Option<&MasterBlindingKey>,
        salt: Option<&[u8]>,
    ) -> Result<Fingerprint> {
        let fingerprint = master.fingerprint(&self.secp);
        let encoded = Zeroizing::new(master.encode());

        let mut blobs: Vec<(KeyKind, &[u8])> = vec![(KeyKind::Master, &encoded[..])];
        if let Some(key) = blinding {
            blobs.push((KeyKind::Blinding, &key.as_bytes()[..]));
        }
        if let Some(salt) = salt {
            blobs.push((KeyKind::Salt, salt));
        }

        let mut pending = Vec::with_capacity(blobs.len());
        for (kind, blob) in blobs {
            if !self.store.contains(chain, kind, fingerprint) {
                pending.push((kind, blob));
                continue;
            }
            let existing = Zeroizing::new(self.store.get(chain, kind, fingerprint)?);
            if existing.as_slice() != blob {
                return Err(SsmError::FingerprintCollision {
                    chain,
                    kind,
                    fingerprint,
                });
            }
            debug!(%chain, %kind, %fingerprint, "identical blob already stored");
        }

        let mut written = Vec::with_capacity(pending.len());
        for (kind, blob) in pending {
            if let Err(e) = self.store.put(chain, kind, fingerprint, blob) {
                for kind in written {
                    if let Err(cleanup) = self.store.remove(chain, kind, fingerprint) {
                        warn!(%chain, %kind, %fingerprint, error = %cleanup, "rollback failed");
                    }
                }
                return Err(e);
            }
            written.push(kind);
        }

        info!(%chain, %fingerprint, "wallet stored");
        Ok(fingerprint)
    }

    pub fn get_xpub(&self, chain: Chain, fingerprint: Fingerprint) -> Result<String> {
        let master = self.load_master(chain, fingerprint)?;
        Ok(Xpub::from_priv(&self.secp, &master).to_string())
    }

    /// Reveals the master private key; refused unless the handle runs in debug mode.
    pub fn get_xprv(&self, chain: Chain, fingerprint: Fingerprint) -> Result<String> {
        if !self.debug {
            return Err(SsmError::Policy("get_xprv"));
        }
        warn!(%chain, %fingerprint, "exporting master private key");
        Ok(self.load_master(chain, fingerprint)?.to_string())
    }

    /// Salt of a password-derived wallet. Wallets created from raw entropy have none.
    pub fn salt(&self, chain: Chain, fingerprint: Fingerprint) -> Result<Vec<u8>> {
        self.store.get(chain, KeyKind::Salt, fingerprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mnemonic_vectors() {
        let m = mnemonic_from_entropy(&[0u8; 16]).unwrap();
        assert_eq!(
            m.to_string(),
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about"
        );

        let m = mnemonic_from_entropy(&[0u8; 32]).unwrap();
        let phrase = m.to_string();
        let words: Vec<_> = phrase.split_whitespace().collect();
        assert_eq!(words.len(), 24);
        assert_eq!(words[23], "art");
    }

    #[test]
    fn entropy_length_is_checked() {
        for len in [0, 15, 20, 24, 33, 64] {
            let err = mnemonic_from_entropy(&vec![0u8; len]).unwrap_err();
            assert!(matches!(err, SsmError::UnexpectedValue(_)), "len {len}");
        }
    }

    #[test]
    fn seed_vector_with_passphrase() {
        let m = mnemonic_from_entropy(&[0u8; 16]).unwrap();
        let seed = seed_from_mnemonic(&m, "TREZOR");
        assert_eq!(
            hex::encode(&seed[..]),
            "c55257c360c07c72029aebc1b53c05ed0362ada38ead3e3e9efa3708e53495531f09a6987599d18264c1e1c92f2cf141630c7a3c4ab7c81b2f001698e7463b04"
        );
    }

    #[test]
    fn empty_password_is_missing_value() {
        assert!(matches!(
            entropy_from_password(""),
            Err(SsmError::MissingValue(_))
        ));
    }

    #[test]
    fn stretching_depends_on_salt() {
        let a = stretch_password("correct horse battery staple", &[1u8; SALT_LEN]).unwrap();
        let b = stretch_password("correct horse battery staple", &[1u8; SALT_LEN]).unwrap();
        let c = stretch_password("correct horse battery staple", &[2u8; SALT_LEN]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn fresh_salts_differ() {
        let (key_a, salt_a) = entropy_from_password("hunter2hunter2hunter2").unwrap();
        let (key_b, salt_b) = entropy_from_password("hunter2hunter2hunter2").unwrap();
        assert_ne!(salt_a, salt_b);
        assert_ne!(key_a, key_b);
    }
}
