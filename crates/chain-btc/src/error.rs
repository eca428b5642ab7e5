use thiserror::Error;

/// Specific defects found while decoding an address or extended key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("string not all lowercase or all uppercase")]
    MixedCase,

    #[error("invalid character {ch:?} at position {pos}")]
    InvalidCharacter { ch: char, pos: usize },

    #[error("invalid length: {0}")]
    InvalidLength(usize),

    #[error("missing bech32 separator")]
    MissingSeparator,

    #[error("checksum failed. Expected {expected}, got {actual}.")]
    Bech32Checksum { expected: String, actual: String },

    #[error("invalid bech32 padding")]
    InvalidPadding,

    #[error("invalid base58: {0}")]
    Base58(String),

    #[error(
        "checksum mismatch: expected {}, got {}",
        hex::encode(.expected),
        hex::encode(.actual)
    )]
    Base58Checksum { expected: [u8; 4], actual: [u8; 4] },

    #[error("unknown address version byte 0x{0:02x}")]
    UnknownVersion(u8),

    #[error("unknown prefix {found:?}, expected {expected:?}")]
    UnknownPrefix { expected: String, found: String },

    #[error("unsupported witness version {0}")]
    UnsupportedWitnessVersion(u8),

    #[error("invalid witness program length: {0}")]
    InvalidWitnessProgram(usize),

    #[error("the provided serialized extended key length is invalid: {0} bytes")]
    InvalidKeyLength(usize),

    #[error("unknown extended key version {}", hex::encode(.0))]
    UnknownKeyVersion([u8; 4]),

    #[error("invalid extended key data: {0}")]
    InvalidKeyData(&'static str),
}

/// Bitcoin chain operation errors.
#[derive(Debug, Error)]
pub enum BtcError {
    #[error("invalid encoding: {0}")]
    InvalidEncoding(#[from] DecodeError),

    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    #[error("unknown address encoding: {0}")]
    UnknownAddressEncoding(String),

    #[error("cannot derive a hardened key from a public key")]
    CannotDeriveHardenedFromPublic,

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid seed length: {0} bytes")]
    InvalidSeed(usize),

    #[error("invalid child at index {0}")]
    InvalidChild(u32),

    #[error("input count mismatch: transaction has {expected} inputs, got {actual}")]
    InputCountMismatch { expected: usize, actual: usize },

    #[error("insufficient funds: missing {missing} sat")]
    InsufficientFunds { missing: u64 },

    #[error("missing value for input {0}")]
    MissingInputValue(usize),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("signing error: {0}")]
    SigningError(String),
}
