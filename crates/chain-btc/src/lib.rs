//! Bitcoin chain support for the testnet wallet.
//!
//! Provides P2WPKH address encoding, UTXO accounting and coin selection,
//! transaction building and signing using native SegWit (bech32)
//! conventions, and a blocking Esplora client for chain data.

pub mod address;
pub mod error;
pub mod explorer;
pub mod network;
pub mod transaction;
pub mod utxo;

pub use bitcoin::Txid;
