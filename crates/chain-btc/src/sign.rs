use bitcoin::hashes::Hash;
use bitcoin::script::ScriptBuf;
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::{Amount, Transaction, WPubkeyHash, Witness};
use crypto_utils::hash::hash160;
use k256::ecdsa::{signature::hazmat::PrehashSigner, Signature, SigningKey};
use k256::SecretKey;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::address::{p2wpkh_redeem_script, AddressEncoding};
use crate::error::BtcError;
use crate::hd::{compress, parse_public_key, ExtendedKey};
use crate::params::ChainParams;
use crate::transaction::RawTransaction;
use crate::utxo::Utxo;

const SIGHASH_ALL: u8 = 0x01;

/// DER signature (with sighash byte) and the compressed key that made it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerSignature {
    pub signature: Vec<u8>,
    pub public_key: [u8; 33],
}

impl DerSignature {
    pub fn with_encoding(self, encoding: AddressEncoding) -> SignatureMetadata {
        SignatureMetadata {
            signature: self.signature,
            public_key: self.public_key.to_vec(),
            encoding,
        }
    }
}

/// Per-input data needed to finalize a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureMetadata {
    pub signature: Vec<u8>,
    pub public_key: Vec<u8>,
    pub encoding: AddressEncoding,
}

/// Produces one BIP143 `SIGHASH_ALL` signature per input.
///
/// `utxos[i]` describes the output spent by input `i`; its key is derived
/// from `root` along the UTXO's own path.
pub fn generate_der_signatures(
    tx: &Transaction,
    utxos: &[Utxo],
    root: &ExtendedKey,
) -> Result<Vec<DerSignature>, BtcError> {
    if tx.input.len() != utxos.len() {
        return Err(BtcError::InputCountMismatch {
            expected: tx.input.len(),
            actual: utxos.len(),
        });
    }
    if !root.is_private() {
        return Err(BtcError::InvalidPrivateKey(
            "signing requires an extended private key".into(),
        ));
    }

    let mut cache = SighashCache::new(tx);
    let signatures = utxos
        .iter()
        .enumerate()
        .map(|(idx, utxo)| {
            let key = root.derive_path(&utxo.path)?;
            let secret = key
                .secret_bytes()
                .ok_or_else(|| BtcError::InvalidPrivateKey("derived key is public".into()))?;
            let public_key = key.public_key_bytes();
            let digest = segwit_sighash(&mut cache, idx, utxo, &public_key)?;
            Ok(DerSignature {
                signature: sign_digest(&secret, &digest)?,
                public_key,
            })
        })
        .collect::<Result<Vec<_>, BtcError>>()?;

    debug!(inputs = signatures.len(), "generated signatures");
    Ok(signatures)
}

/// BIP143 digest for input `idx`.
///
/// A P2WPKH prevout is hashed with its implied P2PKH script code. An empty or
/// P2SH prevout is treated as (nested) P2WPKH of the signing key. Any other
/// script is used verbatim as the witness script.
fn segwit_sighash(
    cache: &mut SighashCache<&Transaction>,
    idx: usize,
    utxo: &Utxo,
    public_key: &[u8; 33],
) -> Result<[u8; 32], BtcError> {
    let script = ScriptBuf::from_bytes(utxo.script.clone());
    let value = Amount::from_sat(utxo.value);
    let sighash = if script.is_p2wpkh() {
        cache
            .p2wpkh_signature_hash(idx, &script, value, EcdsaSighashType::All)
            .map_err(|e| BtcError::SigningError(format!("sighash computation failed: {e}")))?
    } else if script.is_empty() || script.is_p2sh() {
        let program = ScriptBuf::new_p2wpkh(&WPubkeyHash::from_byte_array(hash160(public_key)));
        cache
            .p2wpkh_signature_hash(idx, &program, value, EcdsaSighashType::All)
            .map_err(|e| BtcError::SigningError(format!("sighash computation failed: {e}")))?
    } else {
        cache
            .p2wsh_signature_hash(idx, &script, value, EcdsaSighashType::All)
            .map_err(|e| BtcError::SigningError(format!("sighash computation failed: {e}")))?
    };
    Ok(sighash.to_byte_array())
}

fn sign_digest(secret: &[u8; 32], digest: &[u8; 32]) -> Result<Vec<u8>, BtcError> {
    let secret = SecretKey::from_slice(secret)
        .map_err(|_| BtcError::InvalidPrivateKey("scalar out of range".into()))?;
    let signing_key = SigningKey::from(&secret);
    let sig: Signature = signing_key
        .sign_prehash(digest)
        .map_err(|e| BtcError::SigningError(format!("ECDSA signing failed: {e}")))?;
    let sig = sig.normalize_s().unwrap_or(sig);

    // DER-encode the signature + sighash type byte
    let mut out = sig.to_der().as_bytes().to_vec();
    out.push(SIGHASH_ALL);
    Ok(out)
}

/// Attaches scriptSig and witness data to every input of `tx`.
pub fn finalize_transaction(
    tx: &Transaction,
    params: &ChainParams,
    signatures: &[SignatureMetadata],
) -> Result<Transaction, BtcError> {
    if tx.input.len() != signatures.len() {
        return Err(BtcError::InputCountMismatch {
            expected: tx.input.len(),
            actual: signatures.len(),
        });
    }

    let mut signed = tx.clone();
    for (txin, meta) in signed.input.iter_mut().zip(signatures) {
        let public_key = compress(&parse_public_key(&meta.public_key)?);

        txin.script_sig = match meta.encoding {
            AddressEncoding::P2shP2wpkh => {
                // Single push of the P2WPKH redeem script.
                let redeem = p2wpkh_redeem_script(&hash160(&public_key));
                let mut script_sig = Vec::with_capacity(1 + redeem.len());
                script_sig.push(redeem.len() as u8);
                script_sig.extend_from_slice(&redeem);
                ScriptBuf::from_bytes(script_sig)
            }
            AddressEncoding::P2wpkh | AddressEncoding::P2pkh => ScriptBuf::new(),
        };

        let mut witness = Witness::new();
        witness.push(&meta.signature);
        witness.push(public_key);
        txin.witness = witness;
    }

    debug!(network = params.name, inputs = signed.input.len(), "finalized transaction");
    Ok(signed)
}

/// Finalizes `tx` and returns its serialization and hashes.
pub fn sign_transaction(
    tx: &Transaction,
    params: &ChainParams,
    signatures: &[SignatureMetadata],
) -> Result<RawTransaction, BtcError> {
    let signed = finalize_transaction(tx, params, signatures)?;
    Ok(RawTransaction::from_tx(&signed))
}
