use bitcoin::absolute::LockTime;
use bitcoin::hashes::Hash;
use bitcoin::script::ScriptBuf;
use bitcoin::secp256k1::{Message, Secp256k1, SecretKey};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{
    Amount, CompressedPublicKey, OutPoint, Sequence, Transaction, TxIn, TxOut, Txid, Witness,
};
use tracing::{debug, info, warn};

use crate::address::parse_address;
use crate::error::BtcError;
use crate::network::BtcNetwork;
use crate::utxo::Utxo;

/// Estimated virtual size of a P2WPKH input (in vbytes).
/// Breakdown: 41 bytes non-witness + ~27 witness bytes / 4 = ~68 vbytes per input.
const P2WPKH_INPUT_VBYTES: u64 = 68;

/// Estimated virtual size of a P2WPKH output (in vbytes).
const OUTPUT_VBYTES: u64 = 31;

/// Fixed transaction overhead (in vbytes): version + locktime + counts.
const TX_OVERHEAD_VBYTES: u64 = 10;

/// Outputs assumed when pricing a transaction: payment plus change.
const ESTIMATED_OUTPUTS: usize = 2;

/// An unsigned Bitcoin transaction ready for signing.
#[derive(Debug, Clone)]
pub struct UnsignedBtcTx {
    /// The bitcoin transaction with empty witnesses.
    pub tx: Transaction,
    /// The UTXOs being spent (in the same order as the transaction inputs).
    /// Needed for computing sighashes during signing.
    pub prevouts: Vec<TxOut>,
    /// Fee paid by this transaction.
    pub fee_sat: u64,
    /// Value returned to the wallet; zero means there is no change output.
    pub change_sat: u64,
}

/// A fully witnessed transaction.
#[derive(Debug, Clone)]
pub struct SignedBtcTx {
    pub tx: Transaction,
}

impl SignedBtcTx {
    pub fn txid(&self) -> Txid {
        self.tx.compute_txid()
    }

    /// Canonical segwit wire encoding.
    pub fn to_bytes(&self) -> Vec<u8> {
        bitcoin::consensus::serialize(&self.tx)
    }

    /// Hex of the wire encoding, as accepted by `POST /tx`.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

/// Anything that can relay a raw transaction to the network.
pub trait TxBroadcaster {
    /// Submit a hex-encoded raw transaction and return the txid the remote
    /// side reports.
    fn broadcast_hex(&self, raw_tx_hex: &str) -> Result<Txid, BtcError>;
}

impl<T: TxBroadcaster + ?Sized> TxBroadcaster for &T {
    fn broadcast_hex(&self, raw_tx_hex: &str) -> Result<Txid, BtcError> {
        (**self).broadcast_hex(raw_tx_hex)
    }
}

/// Estimate the fee for a P2WPKH transaction.
///
/// `(inputs * 68 + outputs * 31 + 10) * fee_rate`. Fails with
/// [`BtcError::InvalidAmount`] if the result does not fit in a `u64`.
pub fn estimate_fee(
    num_inputs: usize,
    num_outputs: usize,
    fee_rate_sat_vbyte: u64,
) -> Result<u64, BtcError> {
    let overflow = || {
        BtcError::InvalidAmount(format!(
            "fee for {num_inputs} inputs at {fee_rate_sat_vbyte} sat/vB overflows"
        ))
    };
    let inputs = (num_inputs as u64)
        .checked_mul(P2WPKH_INPUT_VBYTES)
        .ok_or_else(overflow)?;
    let outputs = (num_outputs as u64)
        .checked_mul(OUTPUT_VBYTES)
        .ok_or_else(overflow)?;
    TX_OVERHEAD_VBYTES
        .checked_add(inputs)
        .and_then(|v| v.checked_add(outputs))
        .and_then(|vsize| vsize.checked_mul(fee_rate_sat_vbyte))
        .ok_or_else(overflow)
}

/// Build an unsigned P2WPKH Bitcoin transaction spending `selected`.
///
/// The fee is always priced for two outputs. Output 0 pays `recipient`;
/// output 1 returns the remainder to `change_address` and is present only
/// when that remainder is non-zero. All selected UTXOs must be locked to
/// `change_address`, which is the wallet's own address.
pub fn build_p2wpkh_transaction(
    selected: &[Utxo],
    recipient: &str,
    amount_sat: u64,
    change_address: &str,
    fee_rate_sat_vbyte: u64,
    network: BtcNetwork,
) -> Result<UnsignedBtcTx, BtcError> {
    if amount_sat == 0 {
        return Err(BtcError::InvalidAmount("amount must be greater than zero".into()));
    }

    let recipient_addr = parse_address(recipient, network)?;
    let change_addr = parse_address(change_address, network)?;
    let wallet_script = change_addr.script_pubkey();

    let total_sat = selected
        .iter()
        .try_fold(0u64, |acc, u| acc.checked_add(u.amount_sat))
        .ok_or_else(|| BtcError::InvalidAmount("selected utxo total overflows".into()))?;
    let fee_sat = estimate_fee(selected.len(), ESTIMATED_OUTPUTS, fee_rate_sat_vbyte)?;
    let need_sat = amount_sat
        .checked_add(fee_sat)
        .ok_or_else(|| BtcError::InvalidAmount(format!("{amount_sat} sat overflows with fee")))?;

    if selected.is_empty() || total_sat < need_sat {
        return Err(BtcError::InsufficientFunds {
            have: total_sat,
            need: need_sat,
        });
    }
    let change_sat = total_sat - need_sat;

    let mut inputs = Vec::with_capacity(selected.len());
    let mut prevouts = Vec::with_capacity(selected.len());

    for utxo in selected {
        let txid: Txid = utxo
            .txid
            .parse()
            .map_err(|e| BtcError::TransactionBuildError(format!("invalid txid {}: {e}", utxo.txid)))?;

        inputs.push(TxIn {
            previous_output: OutPoint::new(txid, utxo.vout),
            script_sig: ScriptBuf::new(), // Empty for segwit.
            sequence: Sequence::MAX,
            witness: Witness::default(),
        });

        prevouts.push(TxOut {
            value: Amount::from_sat(utxo.amount_sat),
            script_pubkey: wallet_script.clone(),
        });
    }

    let mut outputs = vec![TxOut {
        value: Amount::from_sat(amount_sat),
        script_pubkey: recipient_addr.script_pubkey(),
    }];
    if change_sat > 0 {
        outputs.push(TxOut {
            value: Amount::from_sat(change_sat),
            script_pubkey: wallet_script,
        });
    }

    debug!(
        inputs = inputs.len(),
        outputs = outputs.len(),
        total_sat,
        amount_sat,
        fee_sat,
        change_sat,
        "built unsigned transaction"
    );

    let tx = Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: inputs,
        output: outputs,
    };

    Ok(UnsignedBtcTx {
        tx,
        prevouts,
        fee_sat,
        change_sat,
    })
}

/// Sign every input of an unsigned P2WPKH transaction with one key.
///
/// Each input gets a BIP143 SIGHASH_ALL signature and a witness of
/// `[signature, compressed pubkey]`. Any prevout not locked to this key's
/// P2WPKH script aborts signing; nothing partially signed is returned.
pub fn sign_transaction(
    unsigned_tx: &UnsignedBtcTx,
    private_key: &[u8; 32],
) -> Result<SignedBtcTx, BtcError> {
    let secp = Secp256k1::new();
    let secret_key = SecretKey::from_slice(private_key)
        .map_err(|e| BtcError::InvalidPrivateKey(format!("invalid secret key: {e}")))?;
    let public_key = bitcoin::secp256k1::PublicKey::from_secret_key(&secp, &secret_key);
    let compressed_pk = CompressedPublicKey(public_key);
    let own_script = ScriptBuf::new_p2wpkh(&compressed_pk.wpubkey_hash());

    if unsigned_tx.prevouts.len() != unsigned_tx.tx.input.len() {
        return Err(BtcError::SigningError(format!(
            "{} prevouts supplied for {} inputs",
            unsigned_tx.prevouts.len(),
            unsigned_tx.tx.input.len()
        )));
    }

    let mut signed_tx = unsigned_tx.tx.clone();
    let mut sighash_cache = SighashCache::new(&unsigned_tx.tx);

    for (input_index, prevout) in unsigned_tx.prevouts.iter().enumerate() {
        if prevout.script_pubkey != own_script {
            return Err(BtcError::SigningError(format!(
                "input {input_index} is not locked to the signing key"
            )));
        }

        let sighash = sighash_cache
            .p2wpkh_signature_hash(
                input_index,
                &prevout.script_pubkey,
                prevout.value,
                EcdsaSighashType::All,
            )
            .map_err(|e| BtcError::SigningError(format!("sighash computation failed: {e}")))?;

        let msg = Message::from_digest(sighash.to_byte_array());
        let signature = secp.sign_ecdsa(&msg, &secret_key);

        // DER signature followed by the sighash type byte.
        let mut sig_bytes = signature.serialize_der().to_vec();
        sig_bytes.push(EcdsaSighashType::All as u8);

        let mut witness = Witness::new();
        witness.push(&sig_bytes);
        witness.push(public_key.serialize());

        signed_tx.input[input_index].witness = witness;
    }

    Ok(SignedBtcTx { tx: signed_tx })
}

/// Serialize and relay a signed transaction.
pub fn broadcast(broadcaster: &impl TxBroadcaster, signed: &SignedBtcTx) -> Result<Txid, BtcError> {
    let expected = signed.txid();
    let txid = broadcaster.broadcast_hex(&signed.to_hex())?;
    if txid != expected {
        warn!(%expected, reported = %txid, "explorer reported a different txid");
    }
    info!(%txid, vsize = signed.tx.vsize(), "transaction broadcast");
    Ok(txid)
}
