use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BtcError;

/// Per-network protocol constants.
///
/// Every table below is an independent literal; nothing is derived from
/// another network's table at runtime.
#[derive(Debug, PartialEq, Eq)]
pub struct ChainParams {
    pub id: NetworkId,
    /// Canonical network name, as accepted by [`NetworkId::from_str`].
    pub name: &'static str,
    /// P2P message start bytes, little-endian as a `u32`.
    pub network_magic: u32,
    pub pubkey_hash_version: u8,
    pub script_hash_version: u8,
    /// Legacy Base58 witness pubkey-hash prefix (pre-BIP173).
    pub witness_pubkey_hash_version: u8,
    pub hd_private_version: [u8; 4],
    pub hd_public_version: [u8; 4],
    pub bip44_coin_type: u32,
    pub bech32_hrp: &'static str,
}

pub static BITCOIN_MAINNET: ChainParams = ChainParams {
    id: NetworkId::BitcoinMainnet,
    name: "bitcoin_mainnet",
    network_magic: 0xd9b4_bef9,
    pubkey_hash_version: 0x00,        // 1...
    script_hash_version: 0x05,        // 3...
    witness_pubkey_hash_version: 0x06,
    hd_private_version: [0x04, 0x88, 0xad, 0xe4], // xprv
    hd_public_version: [0x04, 0x88, 0xb2, 0x1e],  // xpub
    bip44_coin_type: 0,
    bech32_hrp: "bc",
};

pub static BITCOIN_TESTNET3: ChainParams = ChainParams {
    id: NetworkId::BitcoinTestnet3,
    name: "bitcoin_testnet3",
    network_magic: 0x0709_110b,
    pubkey_hash_version: 0x6f,        // m... or n...
    script_hash_version: 0xc4,        // 2...
    witness_pubkey_hash_version: 0x03,
    hd_private_version: [0x04, 0x35, 0x83, 0x94], // tprv
    hd_public_version: [0x04, 0x35, 0x87, 0xcf],  // tpub
    bip44_coin_type: 1,
    bech32_hrp: "tb",
};

pub static BITCOIN_REGTEST: ChainParams = ChainParams {
    id: NetworkId::BitcoinRegtest,
    name: "bitcoin_regtest",
    network_magic: 0xdab5_bffa,
    pubkey_hash_version: 0x6f,
    script_hash_version: 0xc4,
    witness_pubkey_hash_version: 0x03,
    hd_private_version: [0x04, 0x35, 0x83, 0x94],
    hd_public_version: [0x04, 0x35, 0x87, 0xcf],
    bip44_coin_type: 1,
    bech32_hrp: "bcrt",
};

pub static LITECOIN_MAINNET: ChainParams = ChainParams {
    id: NetworkId::LitecoinMainnet,
    name: "litecoin_mainnet",
    network_magic: 0xdbb6_c0fb,
    pubkey_hash_version: 0x30,        // L...
    script_hash_version: 0x32,        // M...
    witness_pubkey_hash_version: 0x06,
    // Litecoin Core keeps the Bitcoin xprv/xpub prefixes.
    hd_private_version: [0x04, 0x88, 0xad, 0xe4],
    hd_public_version: [0x04, 0x88, 0xb2, 0x1e],
    bip44_coin_type: 2,
    bech32_hrp: "ltc",
};

pub static BITCOIN_CASH_MAINNET: ChainParams = ChainParams {
    id: NetworkId::BitcoinCashMainnet,
    name: "bitcoin_cash_mainnet",
    network_magic: 0xe8f3_e1e3,
    pubkey_hash_version: 0x00,
    script_hash_version: 0x05,
    witness_pubkey_hash_version: 0x06,
    hd_private_version: [0x04, 0x88, 0xad, 0xe4],
    hd_public_version: [0x04, 0x88, 0xb2, 0x1e],
    bip44_coin_type: 145,
    bech32_hrp: "bitcoincash",
};

/// All tables known to this crate, in [`NetworkId::ALL`] order.
pub static KNOWN_PARAMS: [&ChainParams; 5] = [
    &BITCOIN_MAINNET,
    &BITCOIN_TESTNET3,
    &BITCOIN_REGTEST,
    &LITECOIN_MAINNET,
    &BITCOIN_CASH_MAINNET,
];

/// Supported (network, coin) pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkId {
    BitcoinMainnet,
    BitcoinTestnet3,
    BitcoinRegtest,
    LitecoinMainnet,
    BitcoinCashMainnet,
}

impl NetworkId {
    pub const ALL: [NetworkId; 5] = [
        NetworkId::BitcoinMainnet,
        NetworkId::BitcoinTestnet3,
        NetworkId::BitcoinRegtest,
        NetworkId::LitecoinMainnet,
        NetworkId::BitcoinCashMainnet,
    ];

    /// The literal parameter table for this network.
    pub fn params(self) -> &'static ChainParams {
        match self {
            NetworkId::BitcoinMainnet => &BITCOIN_MAINNET,
            NetworkId::BitcoinTestnet3 => &BITCOIN_TESTNET3,
            NetworkId::BitcoinRegtest => &BITCOIN_REGTEST,
            NetworkId::LitecoinMainnet => &LITECOIN_MAINNET,
            NetworkId::BitcoinCashMainnet => &BITCOIN_CASH_MAINNET,
        }
    }
}

impl FromStr for NetworkId {
    type Err = BtcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bitcoin_mainnet" | "mainnet" | "btc" => Ok(NetworkId::BitcoinMainnet),
            "bitcoin_testnet3" | "testnet3" | "testnet" => Ok(NetworkId::BitcoinTestnet3),
            "bitcoin_regtest" | "regtest" => Ok(NetworkId::BitcoinRegtest),
            "litecoin_mainnet" | "litecoin" | "ltc" => Ok(NetworkId::LitecoinMainnet),
            "bitcoin_cash_mainnet" | "bitcoin_cash" | "bch" => Ok(NetworkId::BitcoinCashMainnet),
            _ => Err(BtcError::UnknownNetwork(s.to_string())),
        }
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.params().name)
    }
}

/// Returns whether `version` is a known BIP32 private-key version, or `None`
/// when no table carries it at all.
pub fn hd_version_is_private(version: [u8; 4]) -> Option<bool> {
    KNOWN_PARAMS.iter().find_map(|p| {
        if p.hd_private_version == version {
            Some(true)
        } else if p.hd_public_version == version {
            Some(false)
        } else {
            None
        }
    })
}

/// Maps a BIP32 private version to the public version of the same table.
pub fn hd_public_version_for(private_version: [u8; 4]) -> Option<[u8; 4]> {
    KNOWN_PARAMS
        .iter()
        .find(|p| p.hd_private_version == private_version)
        .map(|p| p.hd_public_version)
}

/// Immutable set of enabled networks, built once at start-up and shared by
/// reference with every request handler.
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    enabled: Vec<NetworkId>,
}

impl ChainRegistry {
    /// Registry with every known network enabled.
    pub fn new() -> Self {
        Self::with_networks(&NetworkId::ALL)
    }

    /// Registry restricted to `networks` (duplicates are ignored).
    pub fn with_networks(networks: &[NetworkId]) -> Self {
        let mut enabled: Vec<NetworkId> = Vec::with_capacity(networks.len());
        for id in networks {
            if !enabled.contains(id) {
                enabled.push(*id);
            }
        }
        Self { enabled }
    }

    pub fn lookup(&self, id: NetworkId) -> Result<&'static ChainParams, BtcError> {
        if self.enabled.contains(&id) {
            Ok(id.params())
        } else {
            Err(BtcError::UnknownNetwork(id.to_string()))
        }
    }

    /// Parses a network name and resolves it against the enabled set.
    pub fn lookup_name(&self, name: &str) -> Result<&'static ChainParams, BtcError> {
        self.lookup(name.parse()?)
    }

    pub fn networks(&self) -> &[NetworkId] {
        &self.enabled
    }

    /// HRPs of every known network, used to tell a wrong-network bech32
    /// address apart from a malformed Base58 one.
    pub(crate) fn all_hrps() -> impl Iterator<Item = &'static str> {
        KNOWN_PARAMS.iter().map(|p| p.bech32_hrp)
    }
}

impl Default for ChainRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_id_maps_to_its_own_table() {
        for id in NetworkId::ALL {
            assert_eq!(id.params().id, id);
        }
    }

    #[test]
    fn known_params_follow_id_order() {
        for (id, params) in NetworkId::ALL.iter().zip(KNOWN_PARAMS.iter()) {
            assert_eq!(*id, params.id);
        }
    }

    #[test]
    fn bitcoin_mainnet_constants() {
        let p = NetworkId::BitcoinMainnet.params();
        assert_eq!(p.pubkey_hash_version, 0x00);
        assert_eq!(p.script_hash_version, 0x05);
        assert_eq!(p.bech32_hrp, "bc");
        assert_eq!(p.bip44_coin_type, 0);
        assert_eq!(p.network_magic, 0xd9b4bef9);
    }

    #[test]
    fn litecoin_and_bitcoin_cash_are_independent_tables() {
        let ltc = NetworkId::LitecoinMainnet.params();
        let bch = NetworkId::BitcoinCashMainnet.params();
        assert!(!std::ptr::eq(ltc, &BITCOIN_MAINNET));
        assert!(!std::ptr::eq(bch, &BITCOIN_MAINNET));
        assert_eq!(ltc.pubkey_hash_version, 0x30);
        assert_eq!(ltc.script_hash_version, 0x32);
        assert_eq!(ltc.bech32_hrp, "ltc");
        assert_eq!(ltc.bip44_coin_type, 2);
        assert_eq!(bch.bip44_coin_type, 145);
        assert_eq!(bch.network_magic, 0xe8f3e1e3);
        // The Bitcoin tables are untouched.
        assert_eq!(BITCOIN_MAINNET.bip44_coin_type, 0);
        assert_eq!(BITCOIN_MAINNET.bech32_hrp, "bc");
    }

    #[test]
    fn parse_network_names() {
        assert_eq!("mainnet".parse::<NetworkId>().unwrap(), NetworkId::BitcoinMainnet);
        assert_eq!("TESTNET3".parse::<NetworkId>().unwrap(), NetworkId::BitcoinTestnet3);
        assert_eq!("regtest".parse::<NetworkId>().unwrap(), NetworkId::BitcoinRegtest);
        assert_eq!("ltc".parse::<NetworkId>().unwrap(), NetworkId::LitecoinMainnet);
        assert_eq!(
            "bitcoin_cash_mainnet".parse::<NetworkId>().unwrap(),
            NetworkId::BitcoinCashMainnet
        );
    }

    #[test]
    fn unknown_network_name_is_rejected() {
        let err = "99999".parse::<NetworkId>().unwrap_err();
        assert!(matches!(err, BtcError::UnknownNetwork(ref n) if n == "99999"));
    }

    #[test]
    fn display_roundtrips_through_from_str() {
        for id in NetworkId::ALL {
            assert_eq!(id.to_string().parse::<NetworkId>().unwrap(), id);
        }
    }

    #[test]
    fn serde_uses_snake_case_names() {
        let json = serde_json::to_string(&NetworkId::BitcoinTestnet3).unwrap();
        assert_eq!(json, "\"bitcoin_testnet3\"");
        let back: NetworkId = serde_json::from_str("\"litecoin_mainnet\"").unwrap();
        assert_eq!(back, NetworkId::LitecoinMainnet);
    }

    #[test]
    fn registry_lookup_respects_enabled_set() {
        let registry = ChainRegistry::with_networks(&[NetworkId::BitcoinMainnet]);
        assert!(registry.lookup(NetworkId::BitcoinMainnet).is_ok());
        assert!(matches!(
            registry.lookup(NetworkId::LitecoinMainnet),
            Err(BtcError::UnknownNetwork(_))
        ));
        assert!(registry.lookup_name("regtest").is_err());
    }

    #[test]
    fn registry_ignores_duplicates() {
        let registry = ChainRegistry::with_networks(&[
            NetworkId::BitcoinRegtest,
            NetworkId::BitcoinRegtest,
        ]);
        assert_eq!(registry.networks(), &[NetworkId::BitcoinRegtest]);
    }

    #[test]
    fn default_registry_knows_all_networks() {
        let registry = ChainRegistry::default();
        for id in NetworkId::ALL {
            assert_eq!(registry.lookup(id).unwrap().id, id);
        }
    }

    #[test]
    fn hd_versions_are_classified() {
        assert_eq!(hd_version_is_private([0x04, 0x88, 0xad, 0xe4]), Some(true));
        assert_eq!(hd_version_is_private([0x04, 0x35, 0x87, 0xcf]), Some(false));
        assert_eq!(hd_version_is_private([0xde, 0xad, 0xbe, 0xef]), None);
        assert_eq!(
            hd_public_version_for([0x04, 0x35, 0x83, 0x94]),
            Some([0x04, 0x35, 0x87, 0xcf])
        );
    }
}
