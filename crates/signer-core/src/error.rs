use chain_btc::error::BtcError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Engine(#[from] BtcError),
}

impl ServiceError {
    /// Status class for transports that map errors onto codes.
    ///
    /// Everything the caller can fix by changing the request is
    /// `INVALID_ARGUMENT`; only signing faults are `INTERNAL`.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Engine(BtcError::SigningError(_)) => "INTERNAL",
            ServiceError::Config(_) => "FAILED_PRECONDITION",
            _ => "INVALID_ARGUMENT",
        }
    }
}

impl From<crypto_utils::CryptoError> for ServiceError {
    fn from(e: crypto_utils::CryptoError) -> Self {
        ServiceError::InvalidArgument(e.to_string())
    }
}
