//! Wallet configuration: a YAML file overlaid by `WALLET_*` environment
//! variables.
//!
//! ```yaml
//! secret_passphrase: "at least ten characters"
//! unique_seed: false
//! address_path: wallet_address.txt
//! network: testnet
//! fee_rate_sat_vb: 2
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use chain_btc::network::BtcNetwork;
use ::config::{Config, Environment, File, FileFormat};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::WalletError;
use crate::mnemonic::SeedMode;

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";
pub const DEFAULT_ADDRESS_PATH: &str = "wallet_address.txt";
pub const DEFAULT_FEE_RATE_SAT_VB: u64 = 2;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
/// Ceiling on the configured fee rate. Far above any real testnet rate.
pub const MAX_FEE_RATE_SAT_VB: u64 = 10_000;

const PASSPHRASE_MIN_CHARS: usize = 10;
const PASSPHRASE_MAX_CHARS: usize = 100;

/// Shape of the file on disk, before validation.
///
/// The camelCase spellings of older config files are accepted too. The
/// lowercased forms cover loaders that fold key case.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(alias = "secretPassphrase", alias = "secretpassphrase")]
    secret_passphrase: String,
    #[serde(default, alias = "uniqueSeed", alias = "uniqueseed")]
    unique_seed: bool,
    #[serde(default)]
    address_path: Option<PathBuf>,
    #[serde(default)]
    network: Option<String>,
    #[serde(default)]
    explorer_url: Option<String>,
    #[serde(default)]
    fee_rate_sat_vb: Option<u64>,
    #[serde(default)]
    request_timeout_secs: Option<u64>,
}

/// Validated wallet settings.
#[derive(Debug)]
pub struct WalletConfig {
    pub secret_passphrase: SecretString,
    pub unique_seed: bool,
    pub address_path: PathBuf,
    pub network: BtcNetwork,
    pub explorer_url: String,
    pub fee_rate_sat_vb: u64,
    pub request_timeout: Duration,
}

impl WalletConfig {
    /// Defaults for everything except the passphrase.
    pub fn new(secret_passphrase: impl Into<String>) -> Result<Self, WalletError> {
        let passphrase = secret_passphrase.into();
        validate_passphrase(&passphrase)?;
        let network = BtcNetwork::default();
        Ok(Self {
            secret_passphrase: SecretString::from(passphrase),
            unique_seed: false,
            address_path: PathBuf::from(DEFAULT_ADDRESS_PATH),
            network,
            explorer_url: network.default_explorer_url().to_owned(),
            fee_rate_sat_vb: DEFAULT_FEE_RATE_SAT_VB,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        })
    }

    /// Load `path` (YAML) and apply `WALLET_*` environment overrides.
    pub fn load(path: &Path) -> Result<Self, WalletError> {
        let raw: RawConfig = Config::builder()
            .add_source(File::from(path).format(FileFormat::Yaml))
            .add_source(Environment::with_prefix("WALLET"))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| WalletError::Config(format!("{}: {e}", path.display())))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, WalletError> {
        let mut cfg = Self::new(raw.secret_passphrase)?;
        cfg.unique_seed = raw.unique_seed;

        if let Some(path) = raw.address_path {
            cfg.address_path = path;
        }
        if let Some(network) = raw.network {
            cfg.network = network
                .parse()
                .map_err(|e| WalletError::Config(format!("network: {e}")))?;
        }
        cfg.explorer_url = raw
            .explorer_url
            .unwrap_or_else(|| cfg.network.default_explorer_url().to_owned());

        let fee_rate = raw.fee_rate_sat_vb.unwrap_or(DEFAULT_FEE_RATE_SAT_VB);
        if !(1..=MAX_FEE_RATE_SAT_VB).contains(&fee_rate) {
            return Err(WalletError::Config(format!(
                "fee_rate_sat_vb must be 1-{MAX_FEE_RATE_SAT_VB}, got {fee_rate}"
            )));
        }
        cfg.fee_rate_sat_vb = fee_rate;

        if let Some(secs) = raw.request_timeout_secs {
            cfg.request_timeout = Duration::from_secs(secs);
        }
        Ok(cfg)
    }

    pub fn seed_mode(&self) -> SeedMode {
        SeedMode::from_unique_flag(self.unique_seed)
    }

    pub(crate) fn passphrase(&self) -> &str {
        self.secret_passphrase.expose_secret()
    }
}

fn validate_passphrase(passphrase: &str) -> Result<(), WalletError> {
    let chars = passphrase.chars().count();
    if !(PASSPHRASE_MIN_CHARS..=PASSPHRASE_MAX_CHARS).contains(&chars) {
        return Err(WalletError::Config(format!(
            "secret_passphrase must be {PASSPHRASE_MIN_CHARS}-{PASSPHRASE_MAX_CHARS} characters, got {chars}"
        )));
    }
    Ok(())
}
