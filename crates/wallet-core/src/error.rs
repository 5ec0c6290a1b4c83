use std::path::PathBuf;

use chain_btc::error::BtcError;
use thiserror::Error;

/// Failure classes callers can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Seed or key derivation failed. Fatal at startup.
    Derivation,
    /// The address file could not be created, read, or trusted. Fatal at startup.
    AddressStore,
    /// The chain-data service could not be queried.
    LedgerQuery,
    /// Selected funds do not cover amount plus fee.
    InsufficientFunds,
    /// An address, amount, or locking script could not be built.
    Script,
    /// Sighash or signature generation failed.
    Signing,
    /// The network rejected or never acknowledged the transaction.
    Broadcast,
    /// Configuration is missing or invalid.
    Config,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Derivation => "derivation",
            ErrorKind::AddressStore => "address store",
            ErrorKind::LedgerQuery => "ledger query",
            ErrorKind::InsufficientFunds => "insufficient funds",
            ErrorKind::Script => "script",
            ErrorKind::Signing => "signing",
            ErrorKind::Broadcast => "broadcast",
            ErrorKind::Config => "config",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Key derivation failed: {0}")]
    DerivationFailed(String),

    #[error("Address store {}: {reason}", path.display())]
    AddressStore {
        path: PathBuf,
        reason: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Stored address {stored} does not match derived address {derived}")]
    AddressMismatch { stored: String, derived: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{context}: {source}")]
    Chain {
        context: &'static str,
        #[source]
        source: BtcError,
    },
}

impl WalletError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WalletError::InvalidMnemonic(_) | WalletError::DerivationFailed(_) => {
                ErrorKind::Derivation
            }
            WalletError::AddressStore { .. } | WalletError::AddressMismatch { .. } => {
                ErrorKind::AddressStore
            }
            WalletError::Config(_) => ErrorKind::Config,
            WalletError::Chain { source, .. } => match source {
                BtcError::Explorer(_) => ErrorKind::LedgerQuery,
                BtcError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
                BtcError::InvalidAddress(_)
                | BtcError::InvalidAmount(_)
                | BtcError::InvalidPublicKey(_)
                | BtcError::InvalidNetwork(_)
                | BtcError::TransactionBuildError(_) => ErrorKind::Script,
                BtcError::InvalidPrivateKey(_) | BtcError::SigningError(_) => ErrorKind::Signing,
                BtcError::Broadcast(_) => ErrorKind::Broadcast,
            },
        }
    }

    pub(crate) fn store(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        WalletError::AddressStore {
            path: path.into(),
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn store_io(
        path: impl Into<PathBuf>,
        reason: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        WalletError::AddressStore {
            path: path.into(),
            reason: reason.into(),
            source: Some(source),
        }
    }
}

/// Attach a call-site context to a chain-level error.
pub(crate) trait ChainContext<T> {
    fn context(self, context: &'static str) -> Result<T, WalletError>;
}

impl<T> ChainContext<T> for Result<T, BtcError> {
    fn context(self, context: &'static str) -> Result<T, WalletError> {
        self.map_err(|source| WalletError::Chain { context, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn chain_errors_map_to_kinds() {
        let cases = [
            (BtcError::Explorer("503".into()), ErrorKind::LedgerQuery),
            (
                BtcError::InsufficientFunds { have: 1, need: 2 },
                ErrorKind::InsufficientFunds,
            ),
            (BtcError::InvalidAddress("x".into()), ErrorKind::Script),
            (BtcError::TransactionBuildError("x".into()), ErrorKind::Script),
            (BtcError::SigningError("x".into()), ErrorKind::Signing),
            (BtcError::Broadcast("x".into()), ErrorKind::Broadcast),
        ];
        for (source, kind) in cases {
            let err = Err::<(), _>(source).context("send").unwrap_err();
            assert_eq!(err.kind(), kind);
        }
    }

    #[test]
    fn chain_error_keeps_source() {
        let err = Err::<(), _>(BtcError::Broadcast("rejected".into()))
            .context("broadcast transaction")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "broadcast transaction: broadcast failed: rejected"
        );
        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "broadcast failed: rejected");
    }

    #[test]
    fn store_errors_are_address_store_kind() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = WalletError::store_io("/tmp/addr", "failed to create", io);
        assert_eq!(err.kind(), ErrorKind::AddressStore);
        assert!(err.source().is_some());

        let err = WalletError::AddressMismatch {
            stored: "tb1qa".into(),
            derived: "tb1qb".into(),
        };
        assert_eq!(err.kind(), ErrorKind::AddressStore);
    }

    #[test]
    fn derivation_and_config_kinds() {
        assert_eq!(
            WalletError::DerivationFailed("bad".into()).kind(),
            ErrorKind::Derivation
        );
        assert_eq!(WalletError::Config("bad".into()).kind(), ErrorKind::Config);
        assert_eq!(ErrorKind::InsufficientFunds.to_string(), "insufficient funds");
    }
}
