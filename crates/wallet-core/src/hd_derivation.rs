use bip32::{ChildNumber, XPrv};
use k256::ecdsa::SigningKey;
use zeroize::Zeroize;

use crate::error::WalletError;
use crate::mnemonic::{self, SeedMode};

/// One step of a BIP-32 path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildStep {
    pub index: u32,
    pub hardened: bool,
}

impl ChildStep {
    pub const fn hardened(index: u32) -> Self {
        Self { index, hardened: true }
    }

    pub const fn normal(index: u32) -> Self {
        Self { index, hardened: false }
    }
}

/// BIP-84 path of the wallet's only key: m/84'/1'/0'/0/0
///
/// - 84' purpose (native SegWit P2WPKH)
/// - 1'  coin type (all test networks)
/// - 0'  account
/// - 0   external chain
/// - 0   first address
pub const BIP84_TESTNET_PATH: [ChildStep; 5] = [
    ChildStep::hardened(84),
    ChildStep::hardened(1),
    ChildStep::hardened(0),
    ChildStep::normal(0),
    ChildStep::normal(0),
];

/// Render a path as `m/84'/1'/0'/0/0`.
pub fn format_path(path: &[ChildStep]) -> String {
    let mut out = String::from("m");
    for step in path {
        out.push('/');
        out.push_str(&step.index.to_string());
        if step.hardened {
            out.push('\'');
        }
    }
    out
}

/// Root of the derivation tree (depth 0).
pub struct MasterKey {
    xprv: XPrv,
}

impl MasterKey {
    /// BIP-32 master key generation: HMAC-SHA512 keyed with "Bitcoin seed".
    pub fn from_seed(seed: &[u8]) -> Result<Self, WalletError> {
        let xprv = XPrv::new(seed)
            .map_err(|e| WalletError::DerivationFailed(format!("master key: {e}")))?;
        Ok(Self { xprv })
    }

    /// Fingerprint of the master public key; safe to log.
    pub fn fingerprint(&self) -> [u8; 4] {
        self.xprv.public_key().fingerprint()
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("fingerprint", &hex::encode(self.fingerprint()))
            .finish_non_exhaustive()
    }
}

/// Build the master key from the configured passphrase and seed mode.
pub fn derive_master_key(passphrase: &str, mode: SeedMode) -> Result<MasterKey, WalletError> {
    let phrase = mnemonic::mnemonic_for(mode)?;
    let seed = mnemonic::mnemonic_to_seed(&phrase, passphrase)?;
    MasterKey::from_seed(seed.as_slice())
}

/// Walk `path` from `master` one child derivation at a time.
pub fn derive_path(master: &MasterKey, path: &[ChildStep]) -> Result<DerivedKey, WalletError> {
    let mut xprv = master.xprv.clone();
    for step in path {
        let child = ChildNumber::new(step.index, step.hardened).map_err(|e| {
            WalletError::DerivationFailed(format!("invalid child index {}: {e}", step.index))
        })?;
        xprv = xprv.derive_child(child).map_err(|e| {
            WalletError::DerivationFailed(format!("child {} derivation: {e}", step.index))
        })?;
    }

    let mut private_key_bytes: [u8; 32] = xprv.to_bytes().into();
    let signing_key = SigningKey::from_bytes(&private_key_bytes.into());
    let signing_key = match signing_key {
        Ok(key) => key,
        Err(e) => {
            private_key_bytes.zeroize();
            return Err(WalletError::DerivationFailed(e.to_string()));
        }
    };

    let public_key_compressed: [u8; 33] = signing_key
        .verifying_key()
        .to_encoded_point(true)
        .as_bytes()
        .try_into()
        .map_err(|_| WalletError::DerivationFailed("Invalid public key length".into()))?;

    let attrs = xprv.attrs();
    Ok(DerivedKey {
        private_key: private_key_bytes,
        public_key_compressed,
        chain_code: attrs.chain_code,
        depth: attrs.depth,
        parent_fingerprint: attrs.parent_fingerprint,
        derivation_path: format_path(path),
    })
}

/// Derive the wallet's single leaf key along [`BIP84_TESTNET_PATH`].
pub fn derive_leaf_key(master: &MasterKey) -> Result<DerivedKey, WalletError> {
    derive_path(master, &BIP84_TESTNET_PATH)
}

/// Derived secp256k1 key
pub struct DerivedKey {
    pub private_key: [u8; 32],
    pub public_key_compressed: [u8; 33],
    pub chain_code: [u8; 32],
    pub depth: u8,
    pub parent_fingerprint: [u8; 4],
    pub derivation_path: String,
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.private_key.zeroize();
        self.chain_code.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mnemonic::FIXED_MNEMONIC;

    fn test_master() -> MasterKey {
        let seed = mnemonic::mnemonic_to_seed(FIXED_MNEMONIC, "").unwrap();
        MasterKey::from_seed(seed.as_slice()).unwrap()
    }

    #[test]
    fn test_path_shape() {
        assert_eq!(BIP84_TESTNET_PATH.len(), 5);
        let hardened: Vec<bool> = BIP84_TESTNET_PATH.iter().map(|s| s.hardened).collect();
        assert_eq!(hardened, vec![true, true, true, false, false]);
        assert_eq!(format_path(&BIP84_TESTNET_PATH), "m/84'/1'/0'/0/0");
    }

    #[test]
    fn test_bip84_mainnet_vector() {
        // BIP-84 reference: m/84'/0'/0'/0/0 of the "abandon ... about" mnemonic.
        let path = [
            ChildStep::hardened(84),
            ChildStep::hardened(0),
            ChildStep::hardened(0),
            ChildStep::normal(0),
            ChildStep::normal(0),
        ];
        let key = derive_path(&test_master(), &path).unwrap();
        assert_eq!(
            hex::encode(key.public_key_compressed),
            "0330d54fd0dd420a6e5f8d3624f5f3482cae350f79d5f0753bf5beef9c2d91af3c"
        );
    }

    #[test]
    fn test_leaf_key_attributes() {
        let key = derive_leaf_key(&test_master()).unwrap();
        assert_eq!(key.depth, 5);
        assert_eq!(key.derivation_path, "m/84'/1'/0'/0/0");
        assert!(key.public_key_compressed[0] == 0x02 || key.public_key_compressed[0] == 0x03);
        assert_ne!(key.parent_fingerprint, [0u8; 4]);
    }

    #[test]
    fn test_leaf_derivation_deterministic() {
        let a = derive_leaf_key(&test_master()).unwrap();
        let b = derive_leaf_key(&test_master()).unwrap();
        assert_eq!(a.private_key, b.private_key);
        assert_eq!(a.public_key_compressed, b.public_key_compressed);
    }

    #[test]
    fn test_master_from_passphrase_and_mode() {
        let a = derive_master_key("a long enough secret", SeedMode::Fixed).unwrap();
        let b = derive_master_key("a long enough secret", SeedMode::Fixed).unwrap();
        let c = derive_master_key("another long secret", SeedMode::Fixed).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_unique_mode_yields_fresh_master() {
        let a = derive_master_key("a long enough secret", SeedMode::Unique).unwrap();
        let b = derive_master_key("a long enough secret", SeedMode::Unique).unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_hardened_index_overflow_rejected() {
        let path = [ChildStep::hardened(1 << 31)];
        let result = derive_path(&test_master(), &path);
        assert!(matches!(result, Err(WalletError::DerivationFailed(_))));
    }

    #[test]
    fn test_short_seed_rejected() {
        let result = MasterKey::from_seed(&[0u8; 8]);
        assert!(matches!(result, Err(WalletError::DerivationFailed(_))));
    }

    #[test]
    fn test_debug_does_not_leak_key() {
        let debug = format!("{:?}", test_master());
        assert!(debug.starts_with("MasterKey"));
        assert!(debug.contains("fingerprint"));
    }
}
