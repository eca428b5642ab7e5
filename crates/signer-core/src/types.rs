//! Request and response messages of the service boundary.
//!
//! Byte strings travel as lowercase hex and satoshi amounts as decimal
//! strings, so the messages survive any JSON transport unchanged.

use crypto_utils::zeroizing::ZeroizingString;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

// ─── Addresses ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateAddressRequest {
    pub address: String,
    pub network: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateAddressResponse {
    pub address: String,
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeAddressRequest {
    /// Compressed or uncompressed SEC1 public key.
    pub public_key: String,
    /// `P2PKH`, `P2SH_P2WPKH` or `P2WPKH`.
    pub encoding: String,
    pub network: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeAddressResponse {
    pub address: String,
}

// ─── Keys ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeriveExtendedKeyRequest {
    /// Base58 xpub/xprv (or any registered network's equivalent).
    pub extended_key: ZeroizingString,
    #[serde(default)]
    pub derivation: Vec<u32>,
}

/// The derived key keeps the kind of its parent: a private parent yields a
/// private child.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeriveExtendedKeyResponse {
    pub extended_key: ZeroizingString,
    pub public_key: String,
    pub chain_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetAccountExtendedKeyRequest {
    pub public_key: String,
    pub chain_code: String,
    pub account_index: u32,
    pub network: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetAccountExtendedKeyResponse {
    pub extended_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetKeypairRequest {
    /// Hex seed. Empty draws a fresh random seed.
    #[serde(default)]
    pub seed: ZeroizingString,
    pub network: String,
    #[serde(default)]
    pub derivation: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetKeypairResponse {
    pub extended_private_key: ZeroizingString,
    pub extended_public_key: String,
}

// ─── Transactions ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputMessage {
    /// Previous transaction id, display (reversed) byte order.
    pub output_hash: String,
    pub output_index: u32,
    /// Locking script of the spent output, hex.
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub sequence: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputMessage {
    pub address: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTransactionRequest {
    pub inputs: Vec<InputMessage>,
    pub outputs: Vec<OutputMessage>,
    #[serde(default)]
    pub lock_time: u32,
    pub network: String,
    /// Enables fee computation together with `change_address`.
    #[serde(default)]
    pub fee_sat_per_kb: Option<String>,
    #[serde(default)]
    pub change_address: Option<String>,
    /// Pick a subset of the inputs largest-first.
    #[serde(default)]
    pub select_coins: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransactionMessage {
    pub hex: String,
    pub hash: String,
    pub witness_hash: String,
}

impl From<chain_btc::RawTransaction> for RawTransactionMessage {
    fn from(raw: chain_btc::RawTransaction) -> Self {
        Self {
            hex: raw.hex,
            hash: raw.hash,
            witness_hash: raw.witness_hash,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotEnoughUtxo {
    pub missing_amount: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTransactionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_transaction: Option<RawTransactionMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fees: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_inputs: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_enough_utxo: Option<NotEnoughUtxo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtxoMessage {
    pub script: String,
    pub value: String,
    #[serde(default)]
    pub derivation: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateDerSignaturesRequest {
    pub raw_transaction: String,
    pub utxos: Vec<UtxoMessage>,
    pub private_key: ZeroizingString,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerSignatureMessage {
    pub der_signature: String,
    pub public_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateDerSignaturesResponse {
    pub signatures: Vec<DerSignatureMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureMetadataMessage {
    pub der_signature: String,
    pub public_key: String,
    pub address_encoding: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignTransactionRequest {
    pub raw_transaction: String,
    pub network: String,
    pub signatures: Vec<SignatureMetadataMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeserializeTransactionRequest {
    pub raw_transaction: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInputView {
    pub output_hash: String,
    pub output_index: u32,
    pub sequence: u32,
    pub script_sig: String,
    pub witness: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutputView {
    pub value: String,
    pub script: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeserializeTransactionResponse {
    pub version: i32,
    pub lock_time: u32,
    pub hash: String,
    pub witness_hash: String,
    pub inputs: Vec<TransactionInputView>,
    pub outputs: Vec<TransactionOutputView>,
}

// ─── Field parsing ───────────────────────────────────────────────────

/// Parses a decimal satoshi amount. Values must fit in an `i64` and be
/// non-negative.
pub fn parse_amount(field: &str, value: &str) -> Result<u64, ServiceError> {
    let parsed: i64 = value
        .trim()
        .parse()
        .map_err(|_| ServiceError::InvalidArgument(format!("invalid {field}: {value}")))?;
    u64::try_from(parsed)
        .map_err(|_| ServiceError::InvalidArgument(format!("negative {field}: {value}")))
}

/// Decodes a hex field, naming it in the error.
pub fn parse_hex(field: &str, value: &str) -> Result<Vec<u8>, ServiceError> {
    hex::decode(value.trim())
        .map_err(|e| ServiceError::InvalidArgument(format!("invalid {field}: {e}")))
}
