//! # signer-core
//!
//! Request/response boundary of the signing engine. Every method takes a
//! serde message with hex byte fields and decimal amounts, resolves the
//! network through the configured registry and hands the typed values to
//! `chain-btc`.

pub mod config;
pub mod error;
pub mod types;

use chain_btc::address::{self, AddressEncoding};
use chain_btc::hd::{self, parse_extended_key};
use chain_btc::params::{ChainParams, ChainRegistry};
use chain_btc::sign::{self, SignatureMetadata};
use chain_btc::transaction::{self, FeeOptions, Recipient, TxRequest, UnsignedInput};
use chain_btc::utxo::Utxo;
use chain_btc::BtcError;
use crypto_utils::random::generate_seed;
use crypto_utils::zeroizing::ZeroizingString;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

pub use config::{EngineConfig, EngineConfigBuilder};
pub use error::ServiceError;
use types::*;

/// Stateless signing service over the networks enabled in its config.
#[derive(Debug, Clone)]
pub struct SignerService {
    config: EngineConfig,
    registry: ChainRegistry,
}

impl SignerService {
    pub fn new(config: EngineConfig) -> Result<Self, ServiceError> {
        config.validate()?;
        let registry = ChainRegistry::with_networks(&config.networks);
        info!(networks = ?registry.networks(), "signer service ready");
        Ok(Self { config, registry })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn params(&self, network: &str) -> Result<&'static ChainParams, ServiceError> {
        Ok(self.registry.lookup_name(network)?)
    }

    // ─── Addresses ───────────────────────────────────────────────────

    /// Checks an address against a network. A malformed address is not an
    /// error: the response carries the reason instead.
    pub fn validate_address(
        &self,
        request: &ValidateAddressRequest,
    ) -> Result<ValidateAddressResponse, ServiceError> {
        let params = self.params(&request.network)?;
        match address::validate_address(&request.address, params) {
            Ok(canonical) => Ok(ValidateAddressResponse {
                address: canonical,
                is_valid: true,
                invalid_reason: None,
            }),
            Err(e) => {
                debug!(network = params.name, reason = %e, "address rejected");
                Ok(ValidateAddressResponse {
                    address: request.address.clone(),
                    is_valid: false,
                    invalid_reason: Some(e.to_string()),
                })
            }
        }
    }

    pub fn encode_address(
        &self,
        request: &EncodeAddressRequest,
    ) -> Result<EncodeAddressResponse, ServiceError> {
        let params = self.params(&request.network)?;
        let encoding = request.encoding.parse::<AddressEncoding>()?;
        let public_key = parse_hex("public_key", &request.public_key)?;

        let address = address::encode_address(&public_key, encoding, params)?;
        debug!(network = params.name, %encoding, "encoded address");
        Ok(EncodeAddressResponse { address })
    }

    // ─── Keys ────────────────────────────────────────────────────────

    /// Derives `derivation` below an extended key. The child keeps the
    /// network of its parent.
    pub fn derive_extended_key(
        &self,
        request: &DeriveExtendedKeyRequest,
    ) -> Result<DeriveExtendedKeyResponse, ServiceError> {
        let parent = parse_extended_key(&request.extended_key)?;
        let child = parent.derive_path(&request.derivation)?;
        debug!(
            depth = child.depth(),
            private = child.is_private(),
            "derived extended key"
        );

        Ok(DeriveExtendedKeyResponse {
            extended_key: ZeroizingString::new(child.to_string()),
            public_key: hex::encode(child.public_key_bytes()),
            chain_code: hex::encode(child.chain_code()),
        })
    }

    /// Rebuilds the account-level xpub for a raw public key and chain code.
    pub fn get_account_extended_key(
        &self,
        request: &GetAccountExtendedKeyRequest,
    ) -> Result<GetAccountExtendedKeyResponse, ServiceError> {
        let params = self.params(&request.network)?;
        let public_key = parse_hex("public_key", &request.public_key)?;
        let chain_code = parse_hex("chain_code", &request.chain_code)?;

        let key =
            hd::reconstruct_account_key(&public_key, &chain_code, request.account_index, params)?;
        debug!(
            network = params.name,
            account = request.account_index,
            "reconstructed account key"
        );
        Ok(GetAccountExtendedKeyResponse {
            extended_key: key.to_string(),
        })
    }

    /// Returns the extended key pair at `derivation` below the master key of
    /// the given seed, or of a fresh random seed when none is given.
    pub fn get_keypair(
        &self,
        request: &GetKeypairRequest,
    ) -> Result<GetKeypairResponse, ServiceError> {
        let params = self.params(&request.network)?;
        let seed = if request.seed.trim().is_empty() {
            Zeroizing::new(generate_seed(self.config.seed_len)?.to_vec())
        } else {
            Zeroizing::new(parse_hex("seed", &request.seed)?)
        };

        let pair = hd::get_keypair(&seed, params, &request.derivation)?;
        debug!(
            network = params.name,
            depth = request.derivation.len(),
            "derived key pair"
        );
        Ok(GetKeypairResponse {
            extended_private_key: pair.xprv,
            extended_public_key: pair.xpub,
        })
    }

    // ─── Transactions ────────────────────────────────────────────────

    /// Builds an unsigned transaction. A shortfall is reported in
    /// `not_enough_utxo` rather than as an error.
    pub fn create_transaction(
        &self,
        request: &CreateTransactionRequest,
    ) -> Result<CreateTransactionResponse, ServiceError> {
        let params = self.params(&request.network)?;
        let tx_request = self.tx_request(request)?;

        match transaction::create_transaction(&tx_request, params) {
            Ok(build) => {
                info!(
                    network = params.name,
                    txid = %build.raw.hash,
                    inputs = build.selected_inputs,
                    fees = ?build.fees,
                    "transaction created"
                );
                Ok(CreateTransactionResponse {
                    raw_transaction: Some(build.raw.into()),
                    change: build.change.map(|c| c.to_string()),
                    fees: build.fees.map(|f| f.to_string()),
                    selected_inputs: Some(build.selected_inputs as u32),
                    not_enough_utxo: None,
                })
            }
            Err(BtcError::InsufficientFunds { missing }) => {
                warn!(network = params.name, missing, "not enough utxo");
                Ok(CreateTransactionResponse {
                    not_enough_utxo: Some(NotEnoughUtxo {
                        missing_amount: missing.to_string(),
                    }),
                    ..Default::default()
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn tx_request(&self, request: &CreateTransactionRequest) -> Result<TxRequest, ServiceError> {
        let inputs = request
            .inputs
            .iter()
            .map(|input| {
                Ok(UnsignedInput {
                    txid: input.output_hash.clone(),
                    vout: input.output_index,
                    script: input
                        .script
                        .as_deref()
                        .map(|s| parse_hex("input script", s))
                        .transpose()?,
                    value: input
                        .value
                        .as_deref()
                        .map(|v| parse_amount("input value", v))
                        .transpose()?,
                    sequence: Some(input.sequence.unwrap_or(self.config.default_sequence)),
                })
            })
            .collect::<Result<Vec<_>, ServiceError>>()?;

        let recipients = request
            .outputs
            .iter()
            .map(|output| {
                Ok(Recipient {
                    address: output.address.clone(),
                    value: parse_amount("output value", &output.value)?,
                })
            })
            .collect::<Result<Vec<_>, ServiceError>>()?;

        let fee = match (&request.fee_sat_per_kb, &request.change_address) {
            (Some(rate), Some(change_address)) => Some(FeeOptions {
                fee_rate_sat_per_kvb: parse_amount("fee_sat_per_kb", rate)?,
                change_address: change_address.clone(),
                dust_threshold_sat: self.config.dust_threshold_sat,
                select_coins: request.select_coins,
            }),
            (None, None) if !request.select_coins => None,
            (None, None) => {
                return Err(ServiceError::InvalidArgument(
                    "select_coins requires fee_sat_per_kb and change_address".into(),
                ))
            }
            _ => {
                return Err(ServiceError::InvalidArgument(
                    "fee_sat_per_kb and change_address must be given together".into(),
                ))
            }
        };

        Ok(TxRequest {
            inputs,
            recipients,
            lock_time: request.lock_time,
            fee,
        })
    }

    /// Signs every input of an unsigned transaction with keys derived from
    /// the given private extended key.
    pub fn generate_der_signatures(
        &self,
        request: &GenerateDerSignaturesRequest,
    ) -> Result<GenerateDerSignaturesResponse, ServiceError> {
        let tx = transaction::deserialize_transaction(&request.raw_transaction)?;
        let utxos = request
            .utxos
            .iter()
            .map(|utxo| {
                Ok(Utxo {
                    script: parse_hex("utxo script", &utxo.script)?,
                    value: parse_amount("utxo value", &utxo.value)?,
                    path: utxo.derivation.clone(),
                })
            })
            .collect::<Result<Vec<_>, ServiceError>>()?;

        let root = parse_extended_key(&request.private_key)?;
        let signatures = sign::generate_der_signatures(&tx, &utxos, &root)?;
        drop(root);

        info!(
            txid = %tx.compute_txid(),
            inputs = signatures.len(),
            "generated signatures"
        );
        Ok(GenerateDerSignaturesResponse {
            signatures: signatures
                .into_iter()
                .map(|s| DerSignatureMessage {
                    der_signature: hex::encode(&s.signature),
                    public_key: hex::encode(s.public_key),
                })
                .collect(),
        })
    }

    /// Attaches signatures to an unsigned transaction.
    pub fn sign_transaction(
        &self,
        request: &SignTransactionRequest,
    ) -> Result<RawTransactionMessage, ServiceError> {
        let params = self.params(&request.network)?;
        let tx = transaction::deserialize_transaction(&request.raw_transaction)?;
        let signatures = request
            .signatures
            .iter()
            .map(|s| {
                Ok(SignatureMetadata {
                    signature: parse_hex("der_signature", &s.der_signature)?,
                    public_key: parse_hex("public_key", &s.public_key)?,
                    encoding: s.address_encoding.parse::<AddressEncoding>()?,
                })
            })
            .collect::<Result<Vec<_>, ServiceError>>()?;

        let raw = sign::sign_transaction(&tx, params, &signatures)?;
        info!(network = params.name, txid = %raw.hash, "transaction signed");
        Ok(raw.into())
    }

    /// Decodes a raw transaction into its fields.
    pub fn deserialize_transaction(
        &self,
        request: &DeserializeTransactionRequest,
    ) -> Result<DeserializeTransactionResponse, ServiceError> {
        let tx = transaction::deserialize_transaction(&request.raw_transaction)?;

        Ok(DeserializeTransactionResponse {
            version: tx.version.0,
            lock_time: tx.lock_time.to_consensus_u32(),
            hash: tx.compute_txid().to_string(),
            witness_hash: tx.compute_wtxid().to_string(),
            inputs: tx
                .input
                .iter()
                .map(|txin| TransactionInputView {
                    output_hash: txin.previous_output.txid.to_string(),
                    output_index: txin.previous_output.vout,
                    sequence: txin.sequence.0,
                    script_sig: hex::encode(txin.script_sig.as_bytes()),
                    witness: txin.witness.iter().map(hex::encode).collect(),
                })
                .collect(),
            outputs: tx
                .output
                .iter()
                .map(|txout| TransactionOutputView {
                    value: txout.value.to_sat().to_string(),
                    script: hex::encode(txout.script_pubkey.as_bytes()),
                })
                .collect(),
        })
    }
}
