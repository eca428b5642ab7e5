//! Engine configuration.
//!
//! The service never reads the environment or the filesystem itself; callers
//! load the JSON however they like and hand it to [`EngineConfig::from_json`].

use chain_btc::params::NetworkId;
use chain_btc::transaction::{DEFAULT_DUST_THRESHOLD_SAT, DEFAULT_SEQUENCE};
use crypto_utils::random::{MAX_SEED_LEN, MIN_SEED_LEN, RECOMMENDED_SEED_LEN};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Settings for a [`crate::SignerService`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Networks requests may name. Anything else is rejected as unknown.
    pub networks: Vec<NetworkId>,

    /// Length in bytes of seeds drawn when a key pair is requested without one.
    pub seed_len: usize,

    /// Change at or below this value is dropped into the fee.
    pub dust_threshold_sat: u64,

    /// Sequence number for inputs that do not carry one.
    pub default_sequence: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            networks: NetworkId::ALL.to_vec(),
            seed_len: RECOMMENDED_SEED_LEN,
            dust_threshold_sat: DEFAULT_DUST_THRESHOLD_SAT,
            default_sequence: DEFAULT_SEQUENCE,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a JSON document. Missing fields take their
    /// defaults.
    pub fn from_json(json: &str) -> Result<Self, ServiceError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ServiceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the settings can actually be used.
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.networks.is_empty() {
            return Err(ServiceError::Config("no networks enabled".into()));
        }
        if !(MIN_SEED_LEN..=MAX_SEED_LEN).contains(&self.seed_len) {
            return Err(ServiceError::Config(format!(
                "seed_len must be between {MIN_SEED_LEN} and {MAX_SEED_LEN}, got {}",
                self.seed_len
            )));
        }
        Ok(())
    }
}

/// Builder for [`EngineConfig`].
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    pub fn networks(mut self, networks: &[NetworkId]) -> Self {
        self.config.networks = networks.to_vec();
        self
    }

    pub fn seed_len(mut self, len: usize) -> Self {
        self.config.seed_len = len;
        self
    }

    pub fn dust_threshold_sat(mut self, sat: u64) -> Self {
        self.config.dust_threshold_sat = sat;
        self
    }

    pub fn default_sequence(mut self, sequence: u32) -> Self {
        self.config.default_sequence = sequence;
        self
    }

    pub fn build(self) -> Result<EngineConfig, ServiceError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for EngineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.networks.len(), 5);
        assert_eq!(config.seed_len, 32);
        assert_eq!(config.dust_threshold_sat, 546);
        assert_eq!(config.default_sequence, 0xffff_ffff);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = EngineConfigBuilder::new()
            .networks(&[NetworkId::BitcoinTestnet3, NetworkId::BitcoinRegtest])
            .seed_len(64)
            .dust_threshold_sat(1_000)
            .default_sequence(0xffff_fffd)
            .build()
            .unwrap();

        assert_eq!(
            config.networks,
            vec![NetworkId::BitcoinTestnet3, NetworkId::BitcoinRegtest]
        );
        assert_eq!(config.seed_len, 64);
        assert_eq!(config.dust_threshold_sat, 1_000);
        assert_eq!(config.default_sequence, 0xffff_fffd);
    }

    #[test]
    fn test_builder_rejects_bad_seed_len() {
        let err = EngineConfigBuilder::new().seed_len(8).build().unwrap_err();
        assert!(matches!(err, ServiceError::Config(_)));
    }

    #[test]
    fn test_builder_rejects_no_networks() {
        let err = EngineConfigBuilder::new().networks(&[]).build().unwrap_err();
        assert!(matches!(err, ServiceError::Config(_)));
    }

    #[test]
    fn test_from_json_partial() {
        let config = EngineConfig::from_json(r#"{"networks": ["bitcoin_mainnet"]}"#).unwrap();
        assert_eq!(config.networks, vec![NetworkId::BitcoinMainnet]);
        assert_eq!(config.seed_len, 32);
        assert_eq!(config.dust_threshold_sat, 546);
    }

    #[test]
    fn test_from_json_round_trip() {
        let config = EngineConfigBuilder::new().dust_threshold_sat(0).build().unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(EngineConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            EngineConfig::from_json("{not json"),
            Err(ServiceError::Config(_))
        ));
        assert!(matches!(
            EngineConfig::from_json(r#"{"networks": ["dogecoin"]}"#),
            Err(ServiceError::Config(_))
        ));
    }
}
