use bitcoin::address::{Address, NetworkUnchecked};
use bitcoin::hashes::Hash;
use bitcoin::script::ScriptBuf;
use bitcoin::{CompressedPublicKey, WPubkeyHash};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::error::BtcError;
use crate::network::BtcNetwork;

/// HASH160 of a serialized public key: `RIPEMD160(SHA256(pubkey))`.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    Ripemd160::digest(sha).into()
}

/// Derive a P2WPKH (native SegWit bech32) address from a compressed public key.
///
/// The 20-byte witness program is the HASH160 of the 33-byte compressed key,
/// encoded as a segwit v0 address with the `tb` prefix on both test networks.
pub fn pubkey_to_p2wpkh_address(
    pubkey_bytes: &[u8; 33],
    network: BtcNetwork,
) -> Result<String, BtcError> {
    // Reject points that are not on the curve before hashing them.
    CompressedPublicKey::from_slice(pubkey_bytes).map_err(|e| {
        BtcError::InvalidPublicKey(format!("failed to parse compressed public key: {e}"))
    })?;

    let wpkh = WPubkeyHash::from_byte_array(hash160(pubkey_bytes));
    let script = ScriptBuf::new_p2wpkh(&wpkh);
    let address = Address::from_script(&script, network.to_bitcoin_network())
        .map_err(|e| BtcError::InvalidAddress(format!("failed to encode witness program: {e}")))?;

    Ok(address.to_string())
}

/// Parse an address and check that it belongs to `network`.
pub fn parse_address(address: &str, network: BtcNetwork) -> Result<Address, BtcError> {
    address
        .trim()
        .parse::<Address<NetworkUnchecked>>()
        .map_err(|e| BtcError::InvalidAddress(format!("failed to parse address {address}: {e}")))?
        .require_network(network.to_bitcoin_network())
        .map_err(|e| BtcError::InvalidAddress(format!("{address} is not a {network} address: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::secp256k1::Secp256k1;

    /// Generator point G (private key 1), the BIP173 reference key.
    const G_PUBKEY: &str = "0279BE667EF9DCBBAC55A06295CE870B07029BFCDB2DCE28D959F2815B16F81798";

    fn g_pubkey() -> [u8; 33] {
        hex::decode(G_PUBKEY).unwrap().try_into().unwrap()
    }

    #[test]
    fn hash160_of_generator() {
        // BIP173: the witness program for G is 751e76e8199196d454941c45d1b3a323f1433bd6.
        assert_eq!(
            hex::encode(hash160(&g_pubkey())),
            "751e76e8199196d454941c45d1b3a323f1433bd6"
        );
    }

    #[test]
    fn p2wpkh_testnet_test_vector() {
        // BIP173 testnet P2WPKH example for the same key.
        let address = pubkey_to_p2wpkh_address(&g_pubkey(), BtcNetwork::Testnet).unwrap();
        assert_eq!(address, "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx");
    }

    #[test]
    fn p2wpkh_signet_address_starts_with_tb1q() {
        let address = pubkey_to_p2wpkh_address(&g_pubkey(), BtcNetwork::Signet).unwrap();
        assert!(address.starts_with("tb1q"), "expected tb1q prefix, got {address}");
    }

    #[test]
    fn invalid_pubkey_returns_error() {
        let bad_bytes = [0u8; 33];
        let result = pubkey_to_p2wpkh_address(&bad_bytes, BtcNetwork::Testnet);
        assert!(matches!(result, Err(BtcError::InvalidPublicKey(_))));
    }

    #[test]
    fn matches_bitcoin_crate_encoding() {
        let secp = Secp256k1::new();
        let secret_key = bitcoin::secp256k1::SecretKey::from_slice(&[0xcd; 32]).unwrap();
        let public_key = bitcoin::secp256k1::PublicKey::from_secret_key(&secp, &secret_key);
        let pubkey_bytes: [u8; 33] = public_key.serialize();

        let ours = pubkey_to_p2wpkh_address(&pubkey_bytes, BtcNetwork::Testnet).unwrap();
        let reference =
            Address::p2wpkh(&CompressedPublicKey(public_key), bitcoin::Network::Testnet);
        assert_eq!(ours, reference.to_string());
    }

    #[test]
    fn parse_address_yields_p2wpkh_script() {
        let addr = parse_address("tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx", BtcNetwork::Testnet)
            .unwrap();
        assert_eq!(
            hex::encode(addr.script_pubkey().as_bytes()),
            "0014751e76e8199196d454941c45d1b3a323f1433bd6"
        );
    }

    #[test]
    fn parse_mainnet_address_on_testnet_fails() {
        let result = parse_address("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4", BtcNetwork::Testnet);
        assert!(matches!(result, Err(BtcError::InvalidAddress(_))));
    }

    #[test]
    fn parse_garbage_address_fails() {
        let result = parse_address("notanaddress!!!", BtcNetwork::Testnet);
        assert!(matches!(result, Err(BtcError::InvalidAddress(_))));
    }
}
