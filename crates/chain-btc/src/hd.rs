//! BIP32 hierarchical deterministic keys.
//!
//! Derivation and the 78-byte layout come from `bitcoin::bip32`. This module
//! adds per-network version bytes, Base58Check with checksum reporting,
//! master keys from seeds and synthetic account-key reconstruction.

use std::fmt;
use std::str::FromStr;

use bitcoin::bip32::{self, ChainCode, ChildNumber, Fingerprint, Xpriv, Xpub};
use bitcoin::secp256k1::{self, Secp256k1};
use bitcoin::NetworkKind;
use crypto_utils::hash::checksum;
use crypto_utils::random::{generate_seed, MAX_SEED_LEN, MIN_SEED_LEN, RECOMMENDED_SEED_LEN};
use crypto_utils::zeroizing::ZeroizingString;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::PublicKey;
use zeroize::Zeroizing;

use crate::error::{BtcError, DecodeError};
use crate::params::{hd_public_version_for, hd_version_is_private, ChainParams, BITCOIN_MAINNET};

/// Child indexes at or above this value are hardened.
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Serialized extended key length without the Base58Check checksum.
const SERIALIZED_LEN: usize = 78;

// Version bytes live on `ExtendedKey`; the bip32 network kind is only a
// placeholder for its own encoder and is always overwritten.
const PLACEHOLDER_KIND: NetworkKind = NetworkKind::Main;

#[derive(Clone)]
enum KeyMaterial {
    Public(Xpub),
    Private(Xpriv),
}

/// A BIP32 extended key. Derivation never mutates; it returns a new key.
#[derive(Clone)]
pub struct ExtendedKey {
    version: [u8; 4],
    key: KeyMaterial,
}

impl Drop for ExtendedKey {
    fn drop(&mut self) {
        if let KeyMaterial::Private(xprv) = &mut self.key {
            xprv.private_key.non_secure_erase();
        }
    }
}

impl ExtendedKey {
    pub fn version(&self) -> [u8; 4] {
        self.version
    }

    pub fn depth(&self) -> u8 {
        match &self.key {
            KeyMaterial::Public(xpub) => xpub.depth,
            KeyMaterial::Private(xprv) => xprv.depth,
        }
    }

    pub fn parent_fingerprint(&self) -> [u8; 4] {
        match &self.key {
            KeyMaterial::Public(xpub) => xpub.parent_fingerprint.to_bytes(),
            KeyMaterial::Private(xprv) => xprv.parent_fingerprint.to_bytes(),
        }
    }

    pub fn child_number(&self) -> u32 {
        match &self.key {
            KeyMaterial::Public(xpub) => u32::from(xpub.child_number),
            KeyMaterial::Private(xprv) => u32::from(xprv.child_number),
        }
    }

    pub fn chain_code(&self) -> [u8; 32] {
        match &self.key {
            KeyMaterial::Public(xpub) => xpub.chain_code.to_bytes(),
            KeyMaterial::Private(xprv) => xprv.chain_code.to_bytes(),
        }
    }

    pub fn is_private(&self) -> bool {
        matches!(self.key, KeyMaterial::Private(_))
    }

    fn xpub(&self) -> Xpub {
        match &self.key {
            KeyMaterial::Public(xpub) => *xpub,
            KeyMaterial::Private(xprv) => Xpub::from_priv(&Secp256k1::signing_only(), xprv),
        }
    }

    /// Compressed SEC1 serialization of the public key.
    pub fn public_key_bytes(&self) -> [u8; 33] {
        self.xpub().public_key.serialize()
    }

    /// The private scalar, if this is a private key.
    pub fn secret_bytes(&self) -> Option<Zeroizing<[u8; 32]>> {
        match &self.key {
            KeyMaterial::Private(xprv) => Some(Zeroizing::new(xprv.private_key.secret_bytes())),
            KeyMaterial::Public(_) => None,
        }
    }

    /// First four bytes of HASH160 of the compressed public key.
    pub fn fingerprint(&self) -> [u8; 4] {
        self.xpub().fingerprint().to_bytes()
    }

    /// Returns the public counterpart of this key. Public keys are returned
    /// unchanged.
    pub fn neuter(&self) -> Result<ExtendedKey, BtcError> {
        match &self.key {
            KeyMaterial::Public(_) => Ok(self.clone()),
            KeyMaterial::Private(_) => {
                let version = hd_public_version_for(self.version)
                    .ok_or(DecodeError::UnknownKeyVersion(self.version))?;
                Ok(ExtendedKey {
                    version,
                    key: KeyMaterial::Public(self.xpub()),
                })
            }
        }
    }

    /// BIP32 child key derivation (CKDpriv or CKDpub depending on the key).
    pub fn derive_child(&self, index: u32) -> Result<ExtendedKey, BtcError> {
        self.derive_path(&[index])
    }

    /// Derives each index in turn, left to right. An empty path returns a
    /// copy of the key.
    pub fn derive_path(&self, path: &[u32]) -> Result<ExtendedKey, BtcError> {
        let secp = Secp256k1::new();
        path.iter()
            .try_fold(self.clone(), |key, &index| key.child(&secp, index))
    }

    fn child<C: secp256k1::Signing + secp256k1::Verification>(
        &self,
        secp: &Secp256k1<C>,
        index: u32,
    ) -> Result<ExtendedKey, BtcError> {
        let number = ChildNumber::from(index);
        let key = match &self.key {
            KeyMaterial::Private(xprv) => xprv
                .derive_priv(secp, &[number])
                .map(KeyMaterial::Private),
            KeyMaterial::Public(xpub) => xpub.ckd_pub(secp, number).map(KeyMaterial::Public),
        }
        .map_err(|e| match e {
            bip32::Error::CannotDeriveFromHardenedKey => BtcError::CannotDeriveHardenedFromPublic,
            _ => BtcError::InvalidChild(index),
        })?;
        Ok(ExtendedKey {
            version: self.version,
            key,
        })
    }

    fn serialize(&self) -> Zeroizing<[u8; SERIALIZED_LEN]> {
        let mut buf = Zeroizing::new(match &self.key {
            KeyMaterial::Private(xprv) => xprv.encode(),
            KeyMaterial::Public(xpub) => xpub.encode(),
        });
        buf[..4].copy_from_slice(&self.version);
        buf
    }
}

impl FromStr for ExtendedKey {
    type Err = BtcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Checksum is verified by hand so the mismatch can be reported.
        let data = Zeroizing::new(
            bs58::decode(s)
                .into_vec()
                .map_err(|e| DecodeError::Base58(e.to_string()))?,
        );
        if data.len() != SERIALIZED_LEN + 4 {
            return Err(DecodeError::InvalidKeyLength(data.len()).into());
        }
        let (payload, check) = data.split_at(SERIALIZED_LEN);
        let expected = checksum(payload);
        if check != &expected[..] {
            let mut actual = [0u8; 4];
            actual.copy_from_slice(check);
            return Err(DecodeError::Base58Checksum { expected, actual }.into());
        }

        let mut version = [0u8; 4];
        version.copy_from_slice(&payload[0..4]);
        let is_private =
            hd_version_is_private(version).ok_or(DecodeError::UnknownKeyVersion(version))?;

        let depth = payload[4];
        if depth == 0 && payload[5..13] != [0u8; 8] {
            return Err(DecodeError::InvalidKeyData(
                "zero depth with non-zero parent fingerprint or child number",
            )
            .into());
        }

        // The bip32 decoder only knows Bitcoin's version bytes.
        let mut raw = Zeroizing::new([0u8; SERIALIZED_LEN]);
        raw.copy_from_slice(payload);
        let key = if is_private {
            if raw[45] != 0x00 {
                return Err(DecodeError::InvalidKeyData("private key data must start with 0x00").into());
            }
            raw[..4].copy_from_slice(&BITCOIN_MAINNET.hd_private_version);
            let xprv = Xpriv::decode(&raw[..])
                .map_err(|_| DecodeError::InvalidKeyData("private key out of range"))?;
            KeyMaterial::Private(xprv)
        } else {
            if !matches!(raw[45], 0x02 | 0x03) {
                return Err(DecodeError::InvalidKeyData("public key must be compressed").into());
            }
            raw[..4].copy_from_slice(&BITCOIN_MAINNET.hd_public_version);
            let xpub = Xpub::decode(&raw[..])
                .map_err(|_| DecodeError::InvalidKeyData("public key is not on the curve"))?;
            KeyMaterial::Public(xpub)
        };

        Ok(ExtendedKey { version, key })
    }
}

impl fmt::Display for ExtendedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = Zeroizing::new(bs58::encode(&self.serialize()[..]).with_check().into_string());
        f.write_str(&encoded)
    }
}

impl fmt::Debug for ExtendedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ExtendedKey");
        s.field("version", &hex::encode(self.version))
            .field("depth", &self.depth())
            .field("parent_fingerprint", &hex::encode(self.parent_fingerprint()))
            .field("child_number", &self.child_number());
        match &self.key {
            KeyMaterial::Private(_) => s.field("key", &"[REDACTED]"),
            KeyMaterial::Public(_) => s.field("key", &hex::encode(self.public_key_bytes())),
        };
        s.finish()
    }
}

/// Parses an extended key string.
pub fn parse_extended_key(s: &str) -> Result<ExtendedKey, BtcError> {
    s.parse()
}

/// Parses a SEC1 public key (33-byte compressed or 65-byte uncompressed).
pub fn parse_public_key(bytes: &[u8]) -> Result<PublicKey, BtcError> {
    if !matches!(bytes.len(), 33 | 65) {
        return Err(BtcError::InvalidPublicKey(format!(
            "invalid length: {}",
            bytes.len()
        )));
    }
    PublicKey::from_sec1_bytes(bytes)
        .map_err(|_| BtcError::InvalidPublicKey("point is not on the secp256k1 curve".into()))
}

/// Compressed SEC1 encoding of `pk`.
pub fn compress(pk: &PublicKey) -> [u8; 33] {
    let point = pk.to_encoded_point(true);
    let mut out = [0u8; 33];
    out.copy_from_slice(point.as_bytes());
    out
}

/// Creates a master private key for `params`.
///
/// With `None` a fresh seed of the recommended length is drawn from the OS
/// CSPRNG.
pub fn master_key_from_seed(
    seed: Option<&[u8]>,
    params: &ChainParams,
) -> Result<ExtendedKey, BtcError> {
    match seed {
        Some(seed) => master_key(seed, params),
        None => random_master_key(RECOMMENDED_SEED_LEN, params),
    }
}

/// Creates a master private key from a random seed of `seed_len` bytes.
pub fn random_master_key(seed_len: usize, params: &ChainParams) -> Result<ExtendedKey, BtcError> {
    let seed = generate_seed(seed_len).map_err(|_| BtcError::InvalidSeed(seed_len))?;
    master_key(&seed, params)
}

fn master_key(seed: &[u8], params: &ChainParams) -> Result<ExtendedKey, BtcError> {
    if !(MIN_SEED_LEN..=MAX_SEED_LEN).contains(&seed.len()) {
        return Err(BtcError::InvalidSeed(seed.len()));
    }
    let xprv = Xpriv::new_master(PLACEHOLDER_KIND, seed)
        .map_err(|_| BtcError::InvalidPrivateKey("master key out of range".into()))?;
    Ok(ExtendedKey {
        version: params.hd_private_version,
        key: KeyMaterial::Private(xprv),
    })
}

/// Builds a depth-3 account xpub (`m/purpose'/coin'/account'`) from a raw
/// public key and chain code.
///
/// The real parent key is unknown, so the parent fingerprint is taken from
/// the key's own HASH160.
pub fn reconstruct_account_key(
    pubkey: &[u8],
    chain_code: &[u8],
    account: u32,
    params: &ChainParams,
) -> Result<ExtendedKey, BtcError> {
    let compressed = compress(&parse_public_key(pubkey)?);
    let public_key = secp256k1::PublicKey::from_slice(&compressed)
        .map_err(|e| BtcError::InvalidPublicKey(e.to_string()))?;
    let chain_code: [u8; 32] = chain_code
        .try_into()
        .map_err(|_| DecodeError::InvalidLength(chain_code.len()))?;

    let xpub = Xpub {
        network: PLACEHOLDER_KIND,
        depth: 3,
        parent_fingerprint: Fingerprint::default(),
        child_number: ChildNumber::from(account | HARDENED_OFFSET),
        public_key,
        chain_code: ChainCode::from(chain_code),
    };
    Ok(ExtendedKey {
        version: params.hd_public_version,
        key: KeyMaterial::Public(Xpub {
            parent_fingerprint: xpub.fingerprint(),
            ..xpub
        }),
    })
}

/// Serialized extended private and public key at one derivation path.
pub struct KeyPair {
    pub xprv: ZeroizingString,
    pub xpub: String,
}

/// Derives `path` from the master key of `seed` and returns both
/// serializations.
pub fn get_keypair(seed: &[u8], params: &ChainParams, path: &[u32]) -> Result<KeyPair, BtcError> {
    let key = master_key(seed, params)?.derive_path(path)?;
    let xpub = key.neuter()?.to_string();
    Ok(KeyPair {
        xprv: ZeroizingString::new(key.to_string()),
        xpub,
    })
}
