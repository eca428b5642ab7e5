use rand::RngCore;
use rand_core::OsRng;

use crate::error::CryptoError;
use crate::zeroizing::ZeroizingBytes;

/// Shortest seed accepted for BIP32 master key generation (128 bits).
pub const MIN_SEED_LEN: usize = 16;

/// Longest seed accepted for BIP32 master key generation (512 bits).
pub const MAX_SEED_LEN: usize = 64;

/// Recommended seed length (256 bits).
pub const RECOMMENDED_SEED_LEN: usize = 32;

/// Generates `len` cryptographically secure random bytes.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    OsRng.fill_bytes(&mut buf);
    buf
}

/// Generates a random seed of `len` bytes from the OS CSPRNG.
///
/// The seed is returned in a zeroizing buffer so it does not outlive the call
/// that consumes it.
pub fn generate_seed(len: usize) -> Result<ZeroizingBytes, CryptoError> {
    if !(MIN_SEED_LEN..=MAX_SEED_LEN).contains(&len) {
        return Err(CryptoError::InvalidKeyLength(len));
    }
    Ok(ZeroizingBytes::new(random_bytes(len)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_bytes_correct_length() {
        assert_eq!(random_bytes(0).len(), 0);
        assert_eq!(random_bytes(32).len(), 32);
        assert_eq!(random_bytes(1024).len(), 1024);
    }

    #[test]
    fn random_bytes_differ_between_calls() {
        let a = random_bytes(32);
        let b = random_bytes(32);
        assert_ne!(a, b, "two random 32-byte outputs should differ");
    }

    #[test]
    fn generate_seed_recommended_length() {
        let seed = generate_seed(RECOMMENDED_SEED_LEN).unwrap();
        assert_eq!(seed.len(), 32);
        // Probability of 32 random bytes all being zero is negligible (2^-256).
        assert!(seed.iter().any(|&b| b != 0));
    }

    #[test]
    fn generate_seed_bounds() {
        assert!(generate_seed(MIN_SEED_LEN).is_ok());
        assert!(generate_seed(MAX_SEED_LEN).is_ok());
        assert!(matches!(
            generate_seed(MIN_SEED_LEN - 1),
            Err(CryptoError::InvalidKeyLength(15))
        ));
        assert!(generate_seed(MAX_SEED_LEN + 1).is_err());
    }
}
