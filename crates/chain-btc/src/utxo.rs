use tracing::debug;

use crate::error::BtcError;

/// A single unspent transaction output (UTXO) owned by the wallet address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    /// Transaction ID as a hex string (big-endian / display order).
    pub txid: String,
    /// Output index within the transaction.
    pub vout: u32,
    /// Value in satoshis.
    pub amount_sat: u64,
    /// Whether the funding transaction has been mined.
    pub confirmed: bool,
}

/// Confirmed and unconfirmed balance of one address, in satoshis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Balance {
    pub confirmed_sat: u64,
    pub unconfirmed_sat: u64,
}

impl Balance {
    pub fn total_sat(&self) -> u64 {
        self.confirmed_sat.saturating_add(self.unconfirmed_sat)
    }
}

/// Anything that can list the unspent outputs of an address.
///
/// The returned order is the source's own and must be stable for the
/// duration of one call.
pub trait UtxoSource {
    fn unspent_outputs(&self, address: &str) -> Result<Vec<Utxo>, BtcError>;
}

impl<T: UtxoSource + ?Sized> UtxoSource for &T {
    fn unspent_outputs(&self, address: &str) -> Result<Vec<Utxo>, BtcError> {
        (**self).unspent_outputs(address)
    }
}

/// Split a UTXO set by confirmation flag and sum each side.
///
/// Every UTXO lands in exactly one bucket. A set whose sums do not fit in
/// a `u64` cannot be real and is rejected as an explorer error.
pub fn partition_balances(utxos: &[Utxo]) -> Result<Balance, BtcError> {
    utxos.iter().try_fold(Balance::default(), |mut acc, utxo| {
        let bucket = if utxo.confirmed {
            &mut acc.confirmed_sat
        } else {
            &mut acc.unconfirmed_sat
        };
        *bucket = bucket.checked_add(utxo.amount_sat).ok_or_else(|| {
            BtcError::Explorer(format!("utxo amounts overflow at {}:{}", utxo.txid, utxo.vout))
        })?;
        Ok(acc)
    })
}

/// Query `source` and return the address's confirmed/unconfirmed balance.
pub fn balances(source: &impl UtxoSource, address: &str) -> Result<Balance, BtcError> {
    let utxos = source.unspent_outputs(address)?;
    let balance = partition_balances(&utxos)?;
    debug!(
        address,
        utxos = utxos.len(),
        confirmed_sat = balance.confirmed_sat,
        unconfirmed_sat = balance.unconfirmed_sat,
        "computed balance"
    );
    Ok(balance)
}

/// Query `source` and keep only confirmed UTXOs, preserving source order.
pub fn confirmed_utxos(source: &impl UtxoSource, address: &str) -> Result<Vec<Utxo>, BtcError> {
    let confirmed: Vec<Utxo> = source
        .unspent_outputs(address)?
        .into_iter()
        .filter(|u| u.confirmed)
        .collect();
    debug!(address, confirmed = confirmed.len(), "fetched spendable utxos");
    Ok(confirmed)
}

/// Picks which UTXOs fund a payment.
pub trait CoinSelector {
    /// Return an ordered subset of `utxos` whose values sum to at least
    /// `target_sat`, or an empty list when the whole set falls short.
    fn select(&self, utxos: &[Utxo], target_sat: u64) -> Vec<Utxo>;
}

/// First-fit selection in the order the UTXOs were supplied.
///
/// Accumulates UTXOs until the running total reaches the target, including
/// the one that crosses it. No attempt is made to minimise inputs or fees.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstFit;

impl CoinSelector for FirstFit {
    fn select(&self, utxos: &[Utxo], target_sat: u64) -> Vec<Utxo> {
        let mut selected = Vec::new();
        let mut total_sat: u64 = 0;

        for utxo in utxos {
            total_sat = total_sat.saturating_add(utxo.amount_sat);
            selected.push(utxo.clone());
            if total_sat >= target_sat {
                debug!(inputs = selected.len(), total_sat, target_sat, "first-fit selection");
                return selected;
            }
        }

        debug!(available_sat = total_sat, target_sat, "first-fit selection exhausted");
        Vec::new()
    }
}
