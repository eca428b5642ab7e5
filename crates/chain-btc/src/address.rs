use std::fmt;
use std::str::FromStr;

use bitcoin::hashes::Hash;
use bitcoin::{PubkeyHash, ScriptBuf, ScriptHash, WPubkeyHash, WScriptHash};
use crypto_utils::hash::{checksum, hash160};
use serde::{Deserialize, Serialize};

use crate::bech32;
use crate::error::{BtcError, DecodeError};
use crate::hd::{compress, parse_public_key};
use crate::params::{ChainParams, ChainRegistry};

/// Length of a Base58Check address payload: version byte, hash, checksum.
const BASE58_ADDRESS_LEN: usize = 1 + 20 + 4;

/// Output script type used when turning a public key into an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressEncoding {
    #[serde(rename = "P2PKH")]
    P2pkh,
    #[serde(rename = "P2SH_P2WPKH")]
    P2shP2wpkh,
    #[serde(rename = "P2WPKH")]
    P2wpkh,
}

impl AddressEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressEncoding::P2pkh => "P2PKH",
            AddressEncoding::P2shP2wpkh => "P2SH_P2WPKH",
            AddressEncoding::P2wpkh => "P2WPKH",
        }
    }
}

impl FromStr for AddressEncoding {
    type Err = BtcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "P2PKH" => Ok(AddressEncoding::P2pkh),
            "P2SH_P2WPKH" => Ok(AddressEncoding::P2shP2wpkh),
            "P2WPKH" => Ok(AddressEncoding::P2wpkh),
            _ => Err(BtcError::UnknownAddressEncoding(s.to_string())),
        }
    }
}

impl fmt::Display for AddressEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an address commits to, independent of its network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    PubkeyHash([u8; 20]),
    ScriptHash([u8; 20]),
    WitnessPubkeyHash([u8; 20]),
    WitnessScriptHash([u8; 32]),
}

impl Payload {
    /// The locking script paying to this payload.
    pub fn script_pubkey(&self) -> ScriptBuf {
        match self {
            Payload::PubkeyHash(h) => ScriptBuf::new_p2pkh(&PubkeyHash::from_byte_array(*h)),
            Payload::ScriptHash(h) => ScriptBuf::new_p2sh(&ScriptHash::from_byte_array(*h)),
            Payload::WitnessPubkeyHash(h) => {
                ScriptBuf::new_p2wpkh(&WPubkeyHash::from_byte_array(*h))
            }
            Payload::WitnessScriptHash(h) => {
                ScriptBuf::new_p2wsh(&WScriptHash::from_byte_array(*h))
            }
        }
    }

    /// Canonical address string for `params`. Bech32 output is lowercase.
    pub fn encode(&self, params: &ChainParams) -> Result<String, DecodeError> {
        match self {
            Payload::PubkeyHash(h) => Ok(base58_encode(params.pubkey_hash_version, h)),
            Payload::ScriptHash(h) => Ok(base58_encode(params.script_hash_version, h)),
            Payload::WitnessPubkeyHash(h) => bech32::encode_segwit(params.bech32_hrp, h),
            Payload::WitnessScriptHash(h) => bech32::encode_segwit(params.bech32_hrp, h),
        }
    }
}

fn base58_encode(version: u8, hash: &[u8; 20]) -> String {
    let mut payload = Vec::with_capacity(21);
    payload.push(version);
    payload.extend_from_slice(hash);
    bs58::encode(payload).with_check().into_string()
}

/// `OP_0 <20-byte hash>`: the P2WPKH program nested inside P2SH.
pub fn p2wpkh_redeem_script(pubkey_hash: &[u8; 20]) -> [u8; 22] {
    let mut script = [0u8; 22];
    script[0] = 0x00;
    script[1] = 0x14;
    script[2..].copy_from_slice(pubkey_hash);
    script
}

/// Payload for `pubkey` under `encoding`. HASH160 is taken over the
/// compressed key even when an uncompressed key is supplied.
pub fn payload_for_pubkey(pubkey: &[u8], encoding: AddressEncoding) -> Result<Payload, BtcError> {
    let pk = parse_public_key(pubkey)?;
    let pubkey_hash = hash160(&compress(&pk));
    Ok(match encoding {
        AddressEncoding::P2pkh => Payload::PubkeyHash(pubkey_hash),
        AddressEncoding::P2shP2wpkh => {
            Payload::ScriptHash(hash160(&p2wpkh_redeem_script(&pubkey_hash)))
        }
        AddressEncoding::P2wpkh => Payload::WitnessPubkeyHash(pubkey_hash),
    })
}

/// Derives the address of `pubkey` for `params`.
pub fn encode_address(
    pubkey: &[u8],
    encoding: AddressEncoding,
    params: &ChainParams,
) -> Result<String, BtcError> {
    Ok(payload_for_pubkey(pubkey, encoding)?.encode(params)?)
}

/// Decodes `address` against the version bytes and HRP of `params`.
pub fn decode_address(address: &str, params: &ChainParams) -> Result<Payload, DecodeError> {
    if let Some(sep) = address.rfind('1') {
        let prefix = address[..sep].to_ascii_lowercase();
        if prefix == params.bech32_hrp {
            return decode_segwit(address, params);
        }
        if ChainRegistry::all_hrps().any(|hrp| hrp == prefix) {
            return Err(DecodeError::UnknownPrefix {
                expected: params.bech32_hrp.to_string(),
                found: prefix,
            });
        }
    }
    decode_base58(address, params)
}

fn decode_segwit(address: &str, params: &ChainParams) -> Result<Payload, DecodeError> {
    let (hrp, _version, program) = bech32::decode_segwit(address)?;
    if hrp != params.bech32_hrp {
        return Err(DecodeError::UnknownPrefix {
            expected: params.bech32_hrp.to_string(),
            found: hrp,
        });
    }
    match program.len() {
        20 => {
            let mut h = [0u8; 20];
            h.copy_from_slice(&program);
            Ok(Payload::WitnessPubkeyHash(h))
        }
        32 => {
            let mut h = [0u8; 32];
            h.copy_from_slice(&program);
            Ok(Payload::WitnessScriptHash(h))
        }
        n => Err(DecodeError::InvalidWitnessProgram(n)),
    }
}

fn decode_base58(address: &str, params: &ChainParams) -> Result<Payload, DecodeError> {
    let data = bs58::decode(address)
        .into_vec()
        .map_err(|e| DecodeError::Base58(e.to_string()))?;
    if data.len() != BASE58_ADDRESS_LEN {
        return Err(DecodeError::InvalidLength(data.len()));
    }
    let (payload, check) = data.split_at(21);
    let expected = checksum(payload);
    if check != &expected[..] {
        let mut actual = [0u8; 4];
        actual.copy_from_slice(check);
        return Err(DecodeError::Base58Checksum { expected, actual });
    }

    let mut hash = [0u8; 20];
    hash.copy_from_slice(&payload[1..]);
    match payload[0] {
        v if v == params.pubkey_hash_version => Ok(Payload::PubkeyHash(hash)),
        v if v == params.script_hash_version => Ok(Payload::ScriptHash(hash)),
        v => Err(DecodeError::UnknownVersion(v)),
    }
}

/// Validates `address` for `params` and returns its canonical form.
pub fn validate_address(address: &str, params: &ChainParams) -> Result<String, DecodeError> {
    decode_address(address, params)?.encode(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{
        BITCOIN_CASH_MAINNET, BITCOIN_MAINNET, BITCOIN_REGTEST, BITCOIN_TESTNET3,
        LITECOIN_MAINNET,
    };

    const PUBKEY: &str = "0250863ad64a87ae8a2fe83c1af1a8403cb53f53e486d8511dad8a04887e5b2352";
    const GENERATOR_PUBKEY: &str =
        "0279BE667EF9DCBBAC55A06295CE870B07029BFCDB2DCE28D959F2815B16F81798";

    fn pubkey() -> Vec<u8> {
        hex::decode(PUBKEY).unwrap()
    }

    #[test]
    fn p2pkh_mainnet_vector() {
        let address = encode_address(&pubkey(), AddressEncoding::P2pkh, &BITCOIN_MAINNET).unwrap();
        assert_eq!(address, "1PMycacnJaSqwwJqjawXBErnLsZ7RkXUAs");
    }

    #[test]
    fn p2wpkh_mainnet_vector() {
        let pk = hex::decode(GENERATOR_PUBKEY).unwrap();
        let address = encode_address(&pk, AddressEncoding::P2wpkh, &BITCOIN_MAINNET).unwrap();
        assert_eq!(address, "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4");
    }

    #[test]
    fn nested_segwit_addresses() {
        let pk = pubkey();
        assert_eq!(
            encode_address(&pk, AddressEncoding::P2shP2wpkh, &BITCOIN_MAINNET).unwrap(),
            "3BxwGNjvG4CP14tAZodgYyZ7UTjruYDyAM"
        );
        assert_eq!(
            encode_address(&pk, AddressEncoding::P2shP2wpkh, &BITCOIN_TESTNET3).unwrap(),
            "2N3X9L7fwsWhjCrWiEwFZAvYNgox2gdssG5"
        );
    }

    #[test]
    fn per_network_prefixes() {
        let pk = pubkey();
        assert_eq!(
            encode_address(&pk, AddressEncoding::P2pkh, &LITECOIN_MAINNET).unwrap(),
            "LhavsnvcPEguCjzzuivpTFvYZ5vPWWHpbx"
        );
        assert_eq!(
            encode_address(&pk, AddressEncoding::P2pkh, &BITCOIN_TESTNET3).unwrap(),
            "n3svudhm7bt6j3nTT9uu1A57Cs9pKK3iXW"
        );
        assert_eq!(
            encode_address(&pk, AddressEncoding::P2wpkh, &BITCOIN_REGTEST).unwrap(),
            "bcrt1q7499s50fxu4c0qg23esvm5h8elvqkm33t9fnw8"
        );
        assert_eq!(
            encode_address(&pk, AddressEncoding::P2wpkh, &LITECOIN_MAINNET).unwrap(),
            "ltc1q7499s50fxu4c0qg23esvm5h8elvqkm338k3f6d"
        );
    }

    #[test]
    fn uncompressed_key_hashes_compressed_form() {
        let pk = parse_public_key(&pubkey()).unwrap();
        let uncompressed = k256::elliptic_curve::sec1::ToEncodedPoint::to_encoded_point(&pk, false);
        let address = encode_address(
            uncompressed.as_bytes(),
            AddressEncoding::P2pkh,
            &BITCOIN_MAINNET,
        )
        .unwrap();
        assert_eq!(address, "1PMycacnJaSqwwJqjawXBErnLsZ7RkXUAs");
    }

    #[test]
    fn invalid_pubkeys_are_rejected() {
        assert!(matches!(
            encode_address(&[0u8; 33], AddressEncoding::P2wpkh, &BITCOIN_MAINNET),
            Err(BtcError::InvalidPublicKey(_))
        ));
        assert!(matches!(
            encode_address(&pubkey()[..32], AddressEncoding::P2wpkh, &BITCOIN_MAINNET),
            Err(BtcError::InvalidPublicKey(_))
        ));
    }

    #[test]
    fn encode_then_validate_is_identity() {
        for params in [
            &BITCOIN_MAINNET,
            &BITCOIN_TESTNET3,
            &BITCOIN_REGTEST,
            &LITECOIN_MAINNET,
            &BITCOIN_CASH_MAINNET,
        ] {
            for encoding in [
                AddressEncoding::P2pkh,
                AddressEncoding::P2shP2wpkh,
                AddressEncoding::P2wpkh,
            ] {
                let address = encode_address(&pubkey(), encoding, params).unwrap();
                assert_eq!(validate_address(&address, params).unwrap(), address);
            }
        }
    }

    #[test]
    fn validate_known_mainnet_address() {
        assert_eq!(
            validate_address("1MirQ9bwyQcGVJPwKUgapu5ouK2E2Ey4gX", &BITCOIN_MAINNET).unwrap(),
            "1MirQ9bwyQcGVJPwKUgapu5ouK2E2Ey4gX"
        );
    }

    #[test]
    fn validate_lowercases_bech32() {
        assert_eq!(
            validate_address("BC1QW508D6QEJXTDG4Y5R3ZARVARY0C5XW7KV8F3T4", &BITCOIN_MAINNET)
                .unwrap(),
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"
        );
    }

    #[test]
    fn validate_reports_bech32_checksum() {
        let err = validate_address("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t5", &BITCOIN_MAINNET)
            .unwrap_err();
        assert_eq!(err.to_string(), "checksum failed. Expected v8f3t4, got v8f3t5.");
    }

    #[test]
    fn validate_reports_mixed_case() {
        let err = validate_address(
            "tb1qrp33g0q5c5txsp9arysrx4k6zdkfs4nce4xj0gdcccefvpysxf3q0sL5k7",
            &BITCOIN_TESTNET3,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "string not all lowercase or all uppercase");
    }

    #[test]
    fn mainnet_bech32_on_testnet_is_wrong_prefix() {
        let err = validate_address("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4", &BITCOIN_TESTNET3)
            .unwrap_err();
        assert_eq!(
            err,
            DecodeError::UnknownPrefix {
                expected: "tb".into(),
                found: "bc".into()
            }
        );
    }

    #[test]
    fn mainnet_base58_on_litecoin_is_unknown_version() {
        let err = validate_address("1MirQ9bwyQcGVJPwKUgapu5ouK2E2Ey4gX", &LITECOIN_MAINNET)
            .unwrap_err();
        assert_eq!(err, DecodeError::UnknownVersion(0x00));
    }

    #[test]
    fn base58_checksum_mismatch_is_reported() {
        // Last character altered.
        let err = validate_address("1MirQ9bwyQcGVJPwKUgapu5ouK2E2Ey4gY", &BITCOIN_MAINNET)
            .unwrap_err();
        assert!(matches!(err, DecodeError::Base58Checksum { .. }));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            validate_address("notanaddress!!!", &BITCOIN_MAINNET),
            Err(DecodeError::Base58(_))
        ));
        assert!(matches!(
            validate_address("1111", &BITCOIN_MAINNET),
            Err(DecodeError::InvalidLength(4))
        ));
    }

    #[test]
    fn script_pubkeys_match_payloads() {
        let p2pkh = decode_address("1PMycacnJaSqwwJqjawXBErnLsZ7RkXUAs", &BITCOIN_MAINNET).unwrap();
        assert_eq!(
            hex::encode(p2pkh.script_pubkey().as_bytes()),
            "76a914f54a5851e9372b87810a8e60cdd2e7cfd80b6e3188ac"
        );
        let p2wpkh =
            decode_address("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4", &BITCOIN_MAINNET).unwrap();
        assert_eq!(
            hex::encode(p2wpkh.script_pubkey().as_bytes()),
            "0014751e76e8199196d454941c45d1b3a323f1433bd6"
        );
        let p2wsh = decode_address(
            "tb1qrp33g0q5c5txsp9arysrx4k6zdkfs4nce4xj0gdcccefvpysxf3q0sl5k7",
            &BITCOIN_TESTNET3,
        )
        .unwrap();
        assert!(p2wsh.script_pubkey().is_p2wsh());
    }

    #[test]
    fn encoding_names_parse_and_reject_unknown() {
        assert_eq!("P2PKH".parse::<AddressEncoding>().unwrap(), AddressEncoding::P2pkh);
        assert_eq!(
            "p2sh_p2wpkh".parse::<AddressEncoding>().unwrap(),
            AddressEncoding::P2shP2wpkh
        );
        assert!(matches!(
            "P2TR".parse::<AddressEncoding>(),
            Err(BtcError::UnknownAddressEncoding(ref s)) if s == "P2TR"
        ));
        assert_eq!(AddressEncoding::P2wpkh.to_string(), "P2WPKH");
    }

    #[test]
    fn witness_payloads_encode_under_network_hrp() {
        let p2wsh = Payload::WitnessScriptHash([0u8; 32]);
        assert_eq!(
            p2wsh.encode(&BITCOIN_MAINNET).unwrap(),
            "bc1qqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqthqst8"
        );
        let p2wpkh = Payload::WitnessPubkeyHash([0u8; 20]);
        assert_eq!(
            validate_address(&p2wpkh.encode(&BITCOIN_CASH_MAINNET).unwrap(), &BITCOIN_CASH_MAINNET)
                .unwrap(),
            p2wpkh.encode(&BITCOIN_CASH_MAINNET).unwrap()
        );
    }

    #[test]
    fn redeem_script_layout() {
        let script = p2wpkh_redeem_script(&[0xab; 20]);
        assert_eq!(script[..2], [0x00, 0x14]);
        assert_eq!(script[2..], [0xab; 20]);
    }
}
