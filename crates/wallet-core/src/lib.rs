//! Single-address BIP-84 testnet wallet engine.
//!
//! Derives one key at m/84'/1'/0'/0/0, pins its P2WPKH address in a
//! write-once store, and sends funds through a fixed pipeline:
//! ledger query, coin selection, build, sign, broadcast.

pub mod address;
pub mod address_store;
pub mod config;
pub mod error;
pub mod hd_derivation;
pub mod mnemonic;

use chain_btc::explorer::{EsploraClient, EsploraTx};
use chain_btc::network::BtcNetwork;
use chain_btc::transaction::{self, TxBroadcaster};
use chain_btc::utxo;
use tracing::{debug, info, warn};

pub use chain_btc::utxo::{Balance, CoinSelector, FirstFit, Utxo, UtxoSource};
pub use chain_btc::Txid;
pub use error::{ErrorKind, WalletError};

use crate::address_store::AddressStore;
use crate::config::WalletConfig;
use crate::error::ChainContext;
use crate::hd_derivation::{DerivedKey, MasterKey};
use crate::mnemonic::SeedMode;

/// Supplies the wallet's signing key.
pub trait KeyProvider {
    fn leaf_key(&self) -> Result<DerivedKey, WalletError>;
}

/// Supplies the wallet's receive (and change) address.
pub trait AddressProvider {
    fn address(&self) -> Result<String, WalletError>;
}

/// Holds the master key and re-derives the leaf on every request.
#[derive(Debug)]
pub struct KeyRing {
    master: MasterKey,
}

impl KeyRing {
    pub fn new(master: MasterKey) -> Self {
        Self { master }
    }

    pub fn from_passphrase(passphrase: &str, mode: SeedMode) -> Result<Self, WalletError> {
        Ok(Self::new(hd_derivation::derive_master_key(passphrase, mode)?))
    }
}

impl KeyProvider for KeyRing {
    fn leaf_key(&self) -> Result<DerivedKey, WalletError> {
        hd_derivation::derive_leaf_key(&self.master)
    }
}

/// A transaction fetched from the explorer, seen from this wallet.
#[derive(Debug, Clone)]
pub struct TxView {
    pub tx: EsploraTx,
    /// Indices of outputs paying the wallet address.
    pub own_outputs: Vec<u32>,
    /// Sum of those outputs.
    pub received_sat: u64,
}

/// The wallet engine.
///
/// Every operation is a single synchronous call chain; nothing is cached
/// between calls except the address file written at open time.
pub struct Wallet<K, A, S, B> {
    keys: K,
    addresses: A,
    source: S,
    broadcaster: B,
    selector: Box<dyn CoinSelector>,
    network: BtcNetwork,
    fee_rate_sat_vb: u64,
}

/// The production wiring: config-derived keys, file store, Esplora client.
pub type EsploraWallet = Wallet<KeyRing, AddressStore, EsploraClient, EsploraClient>;

impl EsploraWallet {
    /// Derive keys, pin the address on first run, and connect to the explorer.
    ///
    /// Fails if the stored address no longer matches the current keys.
    pub fn open(cfg: &WalletConfig) -> Result<Self, WalletError> {
        info!(
            network = %cfg.network,
            explorer = %cfg.explorer_url,
            address_path = %cfg.address_path.display(),
            "opening wallet"
        );
        if cfg.seed_mode() == SeedMode::Unique {
            warn!("unique seed mode: the mnemonic is not saved and keys change on every start");
        }

        let keys = KeyRing::from_passphrase(cfg.passphrase(), cfg.seed_mode())?;
        let derived = address::address_for(&keys.leaf_key()?, cfg.network)?;

        let store = AddressStore::new(&cfg.address_path);
        store.ensure(&derived)?;

        let client = EsploraClient::new(&cfg.explorer_url, cfg.request_timeout)
            .context("connect to explorer")?;

        Ok(Wallet::new(
            keys,
            store,
            client.clone(),
            client,
            cfg.network,
            cfg.fee_rate_sat_vb,
        ))
    }
}

impl<K, A, S, B> Wallet<K, A, S, B>
where
    K: KeyProvider,
    A: AddressProvider,
    S: UtxoSource,
    B: TxBroadcaster,
{
    pub fn new(
        keys: K,
        addresses: A,
        source: S,
        broadcaster: B,
        network: BtcNetwork,
        fee_rate_sat_vb: u64,
    ) -> Self {
        Self {
            keys,
            addresses,
            source,
            broadcaster,
            selector: Box::new(FirstFit),
            network,
            fee_rate_sat_vb,
        }
    }

    /// Replace the default first-fit coin selection.
    pub fn with_selector(mut self, selector: impl CoinSelector + 'static) -> Self {
        self.selector = Box::new(selector);
        self
    }

    pub fn network(&self) -> BtcNetwork {
        self.network
    }

    pub fn get_address(&self) -> Result<String, WalletError> {
        self.addresses.address()
    }

    pub fn get_balance(&self) -> Result<Balance, WalletError> {
        let address = self.addresses.address()?;
        utxo::balances(&self.source, &address).context("query balance")
    }

    /// Pay `amount_sat` to `recipient` from confirmed funds.
    ///
    /// Not idempotent: UTXOs are not reserved, so retrying after an
    /// ambiguous broadcast failure may spend twice.
    pub fn send_to(&self, recipient: &str, amount_sat: u64) -> Result<Txid, WalletError> {
        chain_btc::address::parse_address(recipient, self.network).context("check recipient")?;
        let own_address = self.addresses.address()?;
        info!(recipient, amount_sat, fee_rate = self.fee_rate_sat_vb, "sending");

        let spendable = utxo::confirmed_utxos(&self.source, &own_address).context("list utxos")?;
        let selected = self.selector.select(&spendable, amount_sat);
        debug!(available = spendable.len(), selected = selected.len(), "selected inputs");

        let unsigned = transaction::build_p2wpkh_transaction(
            &selected,
            recipient,
            amount_sat,
            &own_address,
            self.fee_rate_sat_vb,
            self.network,
        )
        .context("build transaction")?;
        info!(
            inputs = unsigned.tx.input.len(),
            outputs = unsigned.tx.output.len(),
            fee_sat = unsigned.fee_sat,
            change_sat = unsigned.change_sat,
            "built transaction"
        );

        let key = self.keys.leaf_key()?;
        let signed =
            transaction::sign_transaction(&unsigned, &key.private_key).context("sign transaction")?;
        drop(key);

        transaction::broadcast(&self.broadcaster, &signed).context("broadcast transaction")
    }
}

impl<K, A, B> Wallet<K, A, EsploraClient, B>
where
    A: AddressProvider,
{
    /// Look up a transaction and pick out the outputs paying this wallet.
    pub fn get_transaction(&self, txid: &str) -> Result<TxView, WalletError> {
        let address = self.addresses.address()?;
        let tx = self.source.fetch_transaction(txid).context("fetch transaction")?;
        let own: Vec<(u32, u64)> = tx.outputs_to(&address).map(|(i, out)| (i, out.value)).collect();
        Ok(TxView {
            own_outputs: own.iter().map(|(i, _)| *i).collect(),
            received_sat: own.iter().map(|(_, v)| *v).sum(),
            tx,
        })
    }
}
