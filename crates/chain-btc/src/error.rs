use thiserror::Error;

/// Bitcoin chain operation errors.
#[derive(Debug, Error)]
pub enum BtcError {
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("insufficient funds: have {have} sat, need {need} sat")]
    InsufficientFunds { have: u64, need: u64 },

    #[error("transaction build error: {0}")]
    TransactionBuildError(String),

    #[error("signing error: {0}")]
    SigningError(String),

    #[error("invalid network: {0}")]
    InvalidNetwork(String),

    #[error("explorer query failed: {0}")]
    Explorer(String),

    #[error("broadcast failed: {0}")]
    Broadcast(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_private_key() {
        let err = BtcError::InvalidPrivateKey("key too short".into());
        assert_eq!(err.to_string(), "invalid private key: key too short");
    }

    #[test]
    fn display_invalid_address() {
        let err = BtcError::InvalidAddress("bad checksum".into());
        assert_eq!(err.to_string(), "invalid address: bad checksum");
    }

    #[test]
    fn display_insufficient_funds() {
        let err = BtcError::InsufficientFunds {
            have: 80_000,
            need: 90_330,
        };
        assert_eq!(
            err.to_string(),
            "insufficient funds: have 80000 sat, need 90330 sat"
        );
    }

    #[test]
    fn display_signing_error() {
        let err = BtcError::SigningError("sighash failed".into());
        assert_eq!(err.to_string(), "signing error: sighash failed");
    }

    #[test]
    fn display_explorer_and_broadcast() {
        let err = BtcError::Explorer("503 Service Unavailable".into());
        assert_eq!(err.to_string(), "explorer query failed: 503 Service Unavailable");

        let err = BtcError::Broadcast("bad-txns-inputs-missingorspent".into());
        assert!(err.to_string().starts_with("broadcast failed"));
    }

    #[test]
    fn error_trait_is_implemented() {
        let err: Box<dyn std::error::Error> =
            Box::new(BtcError::InvalidPrivateKey("test".into()));
        assert!(err.to_string().contains("test"));
    }
}
