use thiserror::Error;

/// Cryptographic primitive errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key length: {0}")]
    InvalidKeyLength(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_key_length() {
        let err = CryptoError::InvalidKeyLength(0);
        assert_eq!(err.to_string(), "invalid key length: 0");
    }

    #[test]
    fn error_trait_is_implemented() {
        let err: Box<dyn std::error::Error> = Box::new(CryptoError::InvalidKeyLength(7));
        assert!(err.to_string().contains('7'));
    }
}
