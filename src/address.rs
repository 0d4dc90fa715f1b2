//! Child key and address derivation from stored master keys.

use bitcoin::bip32::{Fingerprint, Xpriv};
use bitcoin::secp256k1::{PublicKey, SecretKey};
use bitcoin::{Address, CompressedPublicKey};
use tracing::debug;

use crate::Ssm;
use crate::chain::{Chain, ChainFamily};
use crate::error::{Result, SsmError};
use crate::path;

/// Native segwit address for a derived child key. On confidential chains `address` is the
/// confidential form and `blinding_key` holds the private half of the key it embeds.
#[derive(Debug, Clone)]
pub struct DerivedAddress {
    pub address: String,
    pub pubkey: PublicKey,
    pub blinding_key: Option<SecretKey>,
}

impl Ssm {
    /// Walks `path` from the stored master key one level at a time.
    pub fn get_child(&self, chain: Chain, fingerprint: Fingerprint, path: &str) -> Result<Xpriv> {
        let path = path::parse(path)?;
        let mut current = self.load_master(chain, fingerprint)?;
        for child in path.as_ref() {
            current = current.derive_priv(&self.secp, &[*child])?;
        }
        Ok(current)
    }

    pub fn get_address(
        &self,
        chain: Chain,
        fingerprint: Fingerprint,
        path: &str,
    ) -> Result<DerivedAddress> {
        let child = self.get_child(chain, fingerprint, path)?;
        let pubkey = child.private_key.public_key(&self.secp);

        let derived = match chain.params().family {
            ChainFamily::Bitcoin(network) => DerivedAddress {
                address: Address::p2wpkh(&CompressedPublicKey(pubkey), network).to_string(),
                pubkey,
                blinding_key: None,
            },
            ChainFamily::Elements(params) => {
                let key = bitcoin::PublicKey::new(pubkey);
                let script_pubkey = elements::Address::p2wpkh(&key, None, params).script_pubkey();
                let master_blinding = self.load_master_blinding_key(chain, fingerprint)?;
                let blinding_key = master_blinding.blinding_private_key(script_pubkey.as_bytes())?;
                let blinder = blinding_key.public_key(&self.secp);
                let address = elements::Address::p2wpkh(&key, Some(blinder), params).to_string();
                DerivedAddress {
                    address,
                    pubkey,
                    blinding_key: Some(blinding_key),
                }
            }
        };

        debug!(%chain, %fingerprint, path, address = %derived.address, "derived address");
        Ok(derived)
    }

    /// Blinding private key for one of this wallet's addresses, confidential or not.
    pub fn blinding_key(
        &self,
        chain: Chain,
        fingerprint: Fingerprint,
        address: &str,
    ) -> Result<SecretKey> {
        let params = chain.params();
        if !params.is_confidential() {
            return Err(SsmError::UnexpectedValue(format!(
                "{chain} has no confidential addresses"
            )));
        }
        let address: elements::Address = address
            .parse()
            .map_err(|e| SsmError::UnexpectedValue(format!("invalid address: {e}")))?;
        if address.params.bech_hrp != params.segwit_hrp() {
            return Err(SsmError::UnexpectedValue(format!(
                "address {address} does not belong to {chain}"
            )));
        }
        let master_blinding = self.load_master_blinding_key(chain, fingerprint)?;
        master_blinding.blinding_private_key(address.script_pubkey().as_bytes())
    }
}
