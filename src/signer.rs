//! Multi-input transaction signing for P2WPKH inputs.
//!
//! Instructions come as three whitespace-separated lists (fingerprints, paths, values)
//! aligned with the transaction inputs. Inputs that already carry a witness are left alone,
//! so the list entries at those positions are never parsed and may be placeholders.

use std::str::FromStr;

use bitcoin::bip32::Fingerprint;
use bitcoin::consensus::encode as btc_encode;
use bitcoin::ecdsa::Signature;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::Message;
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::{Amount, Denomination, ScriptBuf, Witness};
use elements::confidential;
use elements::encode as elements_encode;
use tracing::{debug, info};

use crate::Ssm;
use crate::chain::{Chain, ChainFamily};
use crate::error::{Result, SsmError};

/// One signing instruction, still in its textual form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningInstruction<'a> {
    pub fingerprint: &'a str,
    pub path: &'a str,
    pub value: &'a str,
}

impl SigningInstruction<'_> {
    fn fingerprint(&self) -> Result<Fingerprint> {
        Fingerprint::from_str(self.fingerprint).map_err(|e| {
            SsmError::UnexpectedValue(format!("invalid fingerprint {:?}: {e}", self.fingerprint))
        })
    }
}

/// Splits and aligns the three instruction lists. They must have exactly `inputs` entries.
pub fn instructions<'a>(
    inputs: usize,
    fingerprints: &'a str,
    paths: &'a str,
    values: &'a str,
) -> Result<Vec<SigningInstruction<'a>>> {
    let fingerprints: Vec<_> = fingerprints.split_whitespace().collect();
    let paths: Vec<_> = paths.split_whitespace().collect();
    let values: Vec<_> = values.split_whitespace().collect();

    if fingerprints.len() != inputs || paths.len() != inputs || values.len() != inputs {
        return Err(SsmError::MissingValue(format!(
            "tx has {inputs} inputs, {} fingerprints, {} paths and {} values were provided; \
             they must be the same number",
            fingerprints.len(),
            paths.len(),
            values.len()
        )));
    }

    Ok(fingerprints
        .into_iter()
        .zip(paths)
        .zip(values)
        .map(|((fingerprint, path), value)| SigningInstruction {
            fingerprint,
            path,
            value,
        })
        .collect())
}

/// A transaction whose inputs can be signed as P2WPKH spends.
trait SegwitTransaction {
    fn input_count(&self) -> usize;

    fn has_witness(&self, index: usize) -> bool;

    /// SIGHASH_ALL segwit v0 digest of input `index` for the given script code.
    fn sighash(&self, index: usize, script_code: &ScriptBuf, value: &str) -> Result<Message>;

    fn set_witness(&mut self, index: usize, stack: Vec<Vec<u8>>);

    fn to_hex(&self) -> String;
}

impl SegwitTransaction for bitcoin::Transaction {
    fn input_count(&self) -> usize {
        self.input.len()
    }

    fn has_witness(&self, index: usize) -> bool {
        !self.input[index].witness.is_empty()
    }

    fn sighash(&self, index: usize, script_code: &ScriptBuf, value: &str) -> Result<Message> {
        let amount = bitcoin_value(value)?;
        let sighash = SighashCache::new(self)
            .p2wsh_signature_hash(index, script_code, amount, EcdsaSighashType::All)
            .map_err(|e| SsmError::InvalidTransaction(e.to_string()))?;
        Ok(Message::from_digest(sighash.to_byte_array()))
    }

    fn set_witness(&mut self, index: usize, stack: Vec<Vec<u8>>) {
        self.input[index].witness = Witness::from_slice(&stack);
    }

    fn to_hex(&self) -> String {
        btc_encode::serialize_hex(self)
    }
}

impl SegwitTransaction for elements::Transaction {
    fn input_count(&self) -> usize {
        self.input.len()
    }

    fn has_witness(&self, index: usize) -> bool {
        !self.input[index].witness.script_witness.is_empty()
    }

    fn sighash(&self, index: usize, script_code: &ScriptBuf, value: &str) -> Result<Message> {
        let value = elements_value(value)?;
        let script_code = elements::Script::from(script_code.to_bytes());
        let sighash = elements::sighash::SighashCache::new(self).segwitv0_sighash(
            index,
            &script_code,
            value,
            elements::EcdsaSighashType::All,
        );
        Ok(Message::from_digest(sighash.to_byte_array()))
    }

    fn set_witness(&mut self, index: usize, stack: Vec<Vec<u8>>) {
        self.input[index].witness.script_witness = stack;
    }

    fn to_hex(&self) -> String {
        hex::encode(elements_encode::serialize(self))
    }
}

/// Plain decimal BTC amount, e.g. `1.00000000`.
fn bitcoin_value(value: &str) -> Result<Amount> {
    Amount::from_str_in(value, Denomination::Bitcoin)
        .map_err(|e| SsmError::UnexpectedValue(format!("invalid amount {value:?}: {e}")))
}

/// Hex-encoded confidential value (explicit or committed), falling back to a decimal BTC
/// amount wrapped as an explicit value.
fn elements_value(value: &str) -> Result<confidential::Value> {
    let committed = hex::decode(value)
        .ok()
        .and_then(|bytes| elements_encode::deserialize::<confidential::Value>(&bytes).ok());
    match committed {
        Some(value) => Ok(value),
        None => Ok(confidential::Value::Explicit(bitcoin_value(value)?.to_sat())),
    }
}

fn decode_hex(tx_hex: &str) -> Result<Vec<u8>> {
    hex::decode(tx_hex.trim())
        .map_err(|e| SsmError::InvalidTransaction(format!("transaction is not hex: {e}")))
}

impl Ssm {
    /// Signs every witness-less input of `tx_hex` and returns the re-serialized transaction.
    pub fn sign_tx(
        &self,
        chain: Chain,
        tx_hex: &str,
        fingerprints: &str,
        paths: &str,
        values: &str,
    ) -> Result<String> {
        let bytes = decode_hex(tx_hex)?;
        match chain.params().family {
            ChainFamily::Bitcoin(_) => {
                let tx: bitcoin::Transaction = btc_encode::deserialize(&bytes)
                    .map_err(|e| SsmError::InvalidTransaction(e.to_string()))?;
                self.sign_inputs(chain, tx, fingerprints, paths, values)
            }
            ChainFamily::Elements(_) => {
                let tx: elements::Transaction = elements_encode::deserialize(&bytes)
                    .map_err(|e| SsmError::InvalidTransaction(e.to_string()))?;
                self.sign_inputs(chain, tx, fingerprints, paths, values)
            }
        }
    }

    fn sign_inputs<T: SegwitTransaction>(
        &self,
        chain: Chain,
        mut tx: T,
        fingerprints: &str,
        paths: &str,
        values: &str,
    ) -> Result<String> {
        let instructions = instructions(tx.input_count(), fingerprints, paths, values)?;

        let mut signed = 0usize;
        for (index, instruction) in instructions.iter().enumerate() {
            if tx.has_witness(index) {
                debug!(input = index, "input already has a witness, skipping");
                continue;
            }

            let child = self.get_child(chain, instruction.fingerprint()?, instruction.path)?;
            let pubkey = bitcoin::PublicKey::new(child.private_key.public_key(&self.secp));
            let script_code = ScriptBuf::new_p2pkh(&pubkey.pubkey_hash());

            let message = tx.sighash(index, &script_code, instruction.value)?;
            let signature = self.secp.sign_ecdsa_low_r(&message, &child.private_key);
            let signature = Signature::sighash_all(signature).to_vec();

            tx.set_witness(index, vec![signature, pubkey.to_bytes()]);
            debug!(input = index, fingerprint = instruction.fingerprint, "input signed");
            signed += 1;
        }

        info!(%chain, inputs = instructions.len(), signed, "transaction signed");
        Ok(tx.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instructions_align_by_position() {
        let list = instructions(2, "a2ef94f8 -", "0h/1 -", "1.5 -").unwrap();
        assert_eq!(
            list[0],
            SigningInstruction {
                fingerprint: "a2ef94f8",
                path: "0h/1",
                value: "1.5"
            }
        );
        assert_eq!(list[1].fingerprint, "-");
    }

    #[test]
    fn instruction_count_must_match_inputs() {
        for (fps, paths, values) in [
            ("a b", "0 1", "1"),
            ("a", "0 1", "1 2"),
            ("a b c", "0 1 2", "1 2 3"),
            ("", "", ""),
        ] {
            let err = instructions(2, fps, paths, values).unwrap_err();
            assert!(matches!(err, SsmError::MissingValue(_)));
        }
    }

    #[test]
    fn bitcoin_values_are_decimal_btc() {
        assert_eq!(bitcoin_value("1.00000000").unwrap(), Amount::from_sat(100_000_000));
        assert_eq!(bitcoin_value("0.0001").unwrap(), Amount::from_sat(10_000));
        assert!(bitcoin_value("0.000000001").is_err());
        assert!(bitcoin_value("one").is_err());
    }

    #[test]
    fn elements_values_accept_hex_or_decimal() {
        assert_eq!(
            elements_value("1.00000000").unwrap(),
            confidential::Value::Explicit(100_000_000)
        );
        assert_eq!(
            elements_value("010000000005f5e100").unwrap(),
            confidential::Value::Explicit(100_000_000)
        );

        // generator x coordinate, a valid commitment point
        let commitment = "0879be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
        assert!(elements_value(commitment).unwrap().is_confidential());

        assert!(elements_value("not-a-value").is_err());
    }
}
