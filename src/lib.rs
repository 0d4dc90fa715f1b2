//! Software secured module: key custody and transaction signing for Bitcoin and
//! Elements/Liquid.
//!
//! Private key material stays inside [`Ssm`]; callers get fingerprints, addresses, public keys
//! and signed transactions back.

pub mod address;
pub mod chain;
pub mod config;
pub mod error;
pub mod keystore;
pub mod path;
pub mod rpc;
pub mod signer;
pub mod slip77;
pub mod wallet;

use bitcoin::bip32::{Fingerprint, Xpriv};
use bitcoin::secp256k1::{All, Secp256k1};

pub use address::DerivedAddress;
pub use chain::{Chain, ChainFamily, ChainParams};
pub use config::SsmConfig;
pub use error::{Result, SsmError};
pub use keystore::{KeyKind, KeyStore};
pub use slip77::MasterBlindingKey;

/// Handle to one key store. Every operation is synchronous; several handles (or processes)
/// on the same root are not serialized against each other.
pub struct Ssm {
    store: KeyStore,
    debug: bool,
    secp: Secp256k1<All>,
}

impl Ssm {
    pub fn new(config: SsmConfig) -> Self {
        Self {
            store: KeyStore::new(config.keys_dir),
            debug: config.debug,
            secp: Secp256k1::new(),
        }
    }

    pub fn store(&self) -> &KeyStore {
        &self.store
    }

    pub(crate) fn load_master(&self, chain: Chain, fingerprint: Fingerprint) -> Result<Xpriv> {
        let blob = self.store.get(chain, KeyKind::Master, fingerprint)?;
        Xpriv::decode(&blob).map_err(|e| {
            SsmError::CorruptKey(format!("master key {fingerprint} on {chain}: {e}"))
        })
    }

    pub(crate) fn load_master_blinding_key(
        &self,
        chain: Chain,
        fingerprint: Fingerprint,
    ) -> Result<MasterBlindingKey> {
        let blob = self.store.get(chain, KeyKind::Blinding, fingerprint)?;
        MasterBlindingKey::from_slice(&blob).map_err(|e| {
            SsmError::CorruptKey(format!(
                "master blinding key {fingerprint} on {chain}: {e}"
            ))
        })
    }
}
