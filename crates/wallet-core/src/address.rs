use chain_btc::network::BtcNetwork;

use crate::error::{ChainContext, WalletError};
use crate::hd_derivation::DerivedKey;

/// Bech32 P2WPKH address of a derived key.
pub fn address_for(key: &DerivedKey, network: BtcNetwork) -> Result<String, WalletError> {
    chain_btc::address::pubkey_to_p2wpkh_address(&key.public_key_compressed, network)
        .context("encode wallet address")
}
