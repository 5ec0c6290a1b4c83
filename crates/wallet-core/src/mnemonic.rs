use bip39::{Language, Mnemonic};
use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

use crate::error::WalletError;

/// Publicly known BIP-39 test mnemonic used in fixed-seed mode.
///
/// Anyone can rebuild keys from it; never send real funds to this wallet.
pub const FIXED_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

/// Where the wallet's mnemonic comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedMode {
    /// The constant [`FIXED_MNEMONIC`]; reproducible across runs.
    Fixed,
    /// 256 bits of fresh OS entropy on every start.
    Unique,
}

impl SeedMode {
    pub fn from_unique_flag(unique_seed: bool) -> Self {
        if unique_seed {
            SeedMode::Unique
        } else {
            SeedMode::Fixed
        }
    }
}

/// Generate a new 24-word BIP-39 mnemonic (256 bits of entropy)
pub fn generate_mnemonic() -> Result<Zeroizing<String>, WalletError> {
    let mut entropy = [0u8; 32];
    rand::rngs::OsRng
        .try_fill_bytes(&mut entropy)
        .map_err(|e| WalletError::DerivationFailed(format!("entropy unavailable: {e}")))?;
    let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy)
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()));
    entropy.zeroize();
    Ok(Zeroizing::new(mnemonic?.to_string()))
}

/// The mnemonic sentence for `mode`.
pub fn mnemonic_for(mode: SeedMode) -> Result<Zeroizing<String>, WalletError> {
    match mode {
        SeedMode::Fixed => Ok(Zeroizing::new(FIXED_MNEMONIC.to_owned())),
        SeedMode::Unique => generate_mnemonic(),
    }
}

/// Derive the 64-byte BIP-39 seed from mnemonic + passphrase
/// (PBKDF2-HMAC-SHA512, 2048 rounds, salt `"mnemonic" || passphrase`).
pub fn mnemonic_to_seed(phrase: &str, passphrase: &str) -> Result<Zeroizing<[u8; 64]>, WalletError> {
    let mnemonic = Mnemonic::parse_in_normalized(Language::English, phrase)
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;

    Ok(Zeroizing::new(mnemonic.to_seed(passphrase)))
}
